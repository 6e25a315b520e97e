//! MSP passthrough negotiation.
//!
//! When the device hangs off a flight controller's spare UART instead
//! of being wired directly, the FC can bridge its own serial link to
//! that UART. We identify the FC firmware, check it is new enough and
//! ask it to enter passthrough mode for the OSD serial function.

use tracing::{debug, info};

use crate::connection::Osd;
use crate::error::{OsdError, Result};
use crate::message::Message;
use crate::protocol::constants::MSP_PASSTHROUGH_SERIAL_BY_FUNCTION_ID;
use crate::protocol::MspCommand;
use crate::version::Version;

struct Fc {
    identifier: &'static str,
    name: &'static str,
    min_version: Version,
    serial_function_bit: u8,
}

const SUPPORTED_FCS: &[Fc] = &[
    Fc {
        identifier: "INAV",
        name: "INAV",
        min_version: Version::new(2, 4, 0),
        serial_function_bit: 20,
    },
    Fc {
        identifier: "BTFL",
        name: "Betaflight",
        min_version: Version::new(4, 2, 0),
        serial_function_bit: 16,
    },
];

fn supported_names() -> String {
    let names: Vec<&str> = SUPPORTED_FCS.iter().map(|fc| fc.name).collect();
    names.join(" or ")
}

fn fc_firmware(osd: &mut Osd) -> Result<(String, Version)> {
    osd.send_msp(MspCommand::FcVariant, &[])?;
    let variant = match osd.await_response()? {
        Message::FcVariant(v) => v.variant,
        other => {
            return Err(OsdError::UnexpectedMessage {
                expected: "FC variant",
                got: other.name(),
            });
        }
    };
    osd.send_msp(MspCommand::FcVersion, &[])?;
    let version = match osd.await_response()? {
        Message::FcVersion(v) => v.version,
        other => {
            return Err(OsdError::UnexpectedMessage {
                expected: "FC version",
                got: other.name(),
            });
        }
    };
    Ok((variant, version))
}

/// Negotiate passthrough with the flight controller in front of the
/// device. On success the command stream reaches the OSD directly.
pub(crate) fn setup_passthrough(osd: &mut Osd) -> Result<()> {
    let (variant, version) = fc_firmware(osd)?;
    debug!(variant = %variant, version = %version, "found flight controller");

    let fc = SUPPORTED_FCS
        .iter()
        .find(|fc| fc.identifier == variant)
        .ok_or_else(|| OsdError::UnsupportedFcVariant {
            variant: variant.clone(),
            supported: supported_names(),
        })?;
    if version < fc.min_version {
        return Err(OsdError::FcVersionTooOld {
            name: fc.name,
            version,
            min: fc.min_version,
        });
    }

    osd.send_msp(
        MspCommand::SetPassthrough,
        &[MSP_PASSTHROUGH_SERIAL_BY_FUNCTION_ID, fc.serial_function_bit],
    )?;
    match osd.await_response()? {
        Message::MspRaw(raw) if raw.payload.first() == Some(&1) => {
            info!(fc = fc.name, "MSP passthrough enabled");
            Ok(())
        }
        _ => Err(OsdError::PassthroughRejected),
    }
}
