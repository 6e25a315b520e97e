use std::fs::File;
use std::path::PathBuf;

use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use osd_core::{Color, FontSource, McmFont, Osd, SettingsMessage, ToolConfig, TvStandard};
use tracing::{debug, error};

#[derive(Parser, Debug)]
#[command(author, version, about = "FrSky PixelOSD serial tool", long_about = None)]
struct Args {
    /// Serial port name or tcp:host:port address
    #[arg(short, long)]
    port: Option<String>,

    /// Path to a TOML configuration file
    #[arg(long)]
    config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// List ports that may have an OSD attached
    Ports,
    /// Query device hardware and firmware information
    Info,
    /// Read, update or persist the display settings
    Settings {
        #[command(subcommand)]
        action: SettingsAction,
    },
    /// Upload an MCM font file
    Font {
        /// Path to the .mcm file
        file: PathBuf,
    },
    /// Flash a firmware image
    Flash {
        /// Path to the firmware binary
        file: Option<PathBuf>,

        /// Erase the firmware, leaving only the bootloader
        #[arg(long)]
        erase: bool,
    },
    /// Draw a preview pattern to judge settings changes on screen
    Preview,
}

#[derive(Subcommand, Debug, Clone)]
enum SettingsAction {
    /// Print the current settings
    Get,
    /// Change settings in volatile memory
    Set {
        #[arg(long)]
        brightness: Option<i8>,

        #[arg(long)]
        horizontal_offset: Option<i8>,

        #[arg(long)]
        vertical_offset: Option<i8>,
    },
    /// Commit the current settings to non-volatile memory
    Save,
}

fn main() {
    let args = Args::parse();

    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::builder()
                .with_default_directive(if args.verbose {
                    tracing::Level::DEBUG.into()
                } else {
                    tracing::Level::INFO.into()
                })
                .from_env_lossy(),
        )
        .with_writer(std::io::stderr)
        .finish();

    tracing::subscriber::set_global_default(subscriber).expect("setting default subscriber failed");

    if let Err(e) = run(args) {
        error!("Error: {:#}", e);
        std::process::exit(1);
    }
}

fn run(args: Args) -> anyhow::Result<()> {
    let config = match &args.config {
        Some(path) => {
            ToolConfig::load_from_file(path).with_context(|| format!("loading {}", path.display()))?
        }
        None => ToolConfig::default(),
    };

    match args.command {
        Command::Ports => cmd_ports(&config),
        Command::Info => cmd_info(&mut connect(&args, &config)?),
        Command::Settings { ref action } => {
            cmd_settings(&mut connect(&args, &config)?, action.clone())
        }
        Command::Font { ref file } => cmd_font(&mut connect(&args, &config)?, file),
        Command::Flash { ref file, erase } => {
            cmd_flash(&mut connect(&args, &config)?, file.clone(), erase)
        }
        Command::Preview => cmd_preview(&mut connect(&args, &config)?),
    }
}

fn connect(args: &Args, config: &ToolConfig) -> anyhow::Result<Osd> {
    let port = args
        .port
        .clone()
        .or_else(|| config.preferred_port.clone())
        .context("no port given; use --port or set preferred_port in the config file")?;
    debug!(port = %port, "connecting");
    Ok(Osd::open(&port)?)
}

fn cmd_ports(config: &ToolConfig) -> anyhow::Result<()> {
    let ports = osd_core::transport::discover(&config.discovery_tcp_ports())?;
    if ports.is_empty() {
        println!("no candidate ports found");
    }
    for port in ports {
        println!("{port}");
    }
    Ok(())
}

fn cmd_info(osd: &mut Osd) -> anyhow::Result<()> {
    let info = osd.info()?;
    if info.is_bootloader {
        println!("mode:     bootloader");
        return Ok(());
    }
    println!("version:  {}", info.version.display_name());
    println!("grid:     {}x{}", info.grid_columns, info.grid_rows);
    println!("pixels:   {}x{}", info.pixel_width, info.pixel_height);
    let tv = match info.tv_standard {
        TvStandard::Ntsc => "NTSC",
        TvStandard::Pal => "PAL",
        TvStandard::Unknown => "unknown",
    };
    println!("standard: {tv}");
    println!(
        "camera:   {}",
        if info.has_detected_camera {
            "detected"
        } else {
            "not detected"
        }
    );
    Ok(())
}

fn print_settings(settings: &SettingsMessage) {
    println!("brightness:        {}", settings.brightness);
    println!("horizontal offset: {}", settings.horizontal_offset);
    println!("vertical offset:   {}", settings.vertical_offset);
}

fn cmd_settings(osd: &mut Osd, action: SettingsAction) -> anyhow::Result<()> {
    match action {
        SettingsAction::Get => {
            let settings = osd.read_settings()?;
            print_settings(&settings);
        }
        SettingsAction::Set {
            brightness,
            horizontal_offset,
            vertical_offset,
        } => {
            let mut settings = osd.read_settings()?;
            if let Some(v) = brightness {
                settings.brightness = v;
            }
            if let Some(v) = horizontal_offset {
                settings.horizontal_offset = v;
            }
            if let Some(v) = vertical_offset {
                settings.vertical_offset = v;
            }
            // The device may clamp the values; show what it accepted.
            let accepted = osd.set_settings(&settings)?;
            print_settings(&accepted);
        }
        SettingsAction::Save => {
            osd.save_settings()?;
            println!("settings saved");
        }
    }
    Ok(())
}

fn progress_bar(len: u64, msg: &'static str) -> anyhow::Result<ProgressBar> {
    let pb = ProgressBar::new(len);
    pb.set_style(ProgressStyle::with_template(
        "{msg} [{bar:40}] {pos}/{len}",
    )?);
    pb.set_message(msg);
    Ok(pb)
}

fn cmd_font(osd: &mut Osd, file: &PathBuf) -> anyhow::Result<()> {
    let reader = File::open(file).with_context(|| format!("opening {}", file.display()))?;
    let font = McmFont::parse(reader)?;
    let pb = progress_bar(font.char_count() as u64, "uploading font")?;
    let mut cb = |done: usize, _total: usize| pb.set_position(done as u64);
    osd.upload_font(&font, Some(&mut cb))?;
    pb.finish();
    println!("font uploaded");
    Ok(())
}

fn cmd_flash(osd: &mut Osd, file: Option<PathBuf>, erase: bool) -> anyhow::Result<()> {
    let image = match (&file, erase) {
        (Some(path), false) => {
            Some(std::fs::read(path).with_context(|| format!("reading {}", path.display()))?)
        }
        (None, true) => None,
        (Some(_), true) => bail!("--erase does not take a firmware file"),
        (None, false) => bail!("give a firmware file or --erase"),
    };

    let pb = progress_bar(image.as_deref().map_or(0, <[u8]>::len) as u64, "flashing")?;
    let mut cb = |done: usize, _total: usize| pb.set_position(done as u64);
    osd.flash_firmware(image.as_deref(), Some(&mut cb))?;
    pb.finish();
    println!(
        "{}",
        if erase {
            "firmware erased"
        } else {
            "firmware flashed"
        }
    );
    Ok(())
}

/// Draw three reference rectangles at mid-screen and a tick-marked
/// bracket in each corner, so offset and brightness changes are
/// visible against live video.
fn cmd_preview(osd: &mut Osd) -> anyhow::Result<()> {
    const RECT_SIZE: i32 = 50;
    const RECT_MARGIN: i32 = 20;
    const LINE_SIZE: i32 = 50;

    let info = osd.info()?;
    if info.is_bootloader {
        bail!("device is in bootloader mode");
    }

    osd.transaction_begin()?;
    osd.reset_drawing()?;
    osd.clear_screen()?;

    let mid_x = i32::from(info.pixel_width) / 2;
    let mid_y = i32::from(info.pixel_height) / 2;
    let rect_y = mid_y - RECT_SIZE / 2;
    osd.set_fill_color(Color::Black)?;
    osd.fill_rect(
        mid_x - RECT_SIZE / 2 - RECT_MARGIN - RECT_SIZE,
        rect_y,
        RECT_SIZE as u32,
        RECT_SIZE as u32,
    )?;
    osd.set_fill_color(Color::Gray)?;
    osd.fill_rect(mid_x - RECT_SIZE / 2, rect_y, RECT_SIZE as u32, RECT_SIZE as u32)?;
    osd.set_fill_color(Color::White)?;
    osd.fill_rect(
        mid_x + RECT_SIZE / 2 + RECT_MARGIN,
        rect_y,
        RECT_SIZE as u32,
        RECT_SIZE as u32,
    )?;

    let line_x = i32::from(info.pixel_width) - 1;
    let line_y = i32::from(info.pixel_height) - 1;
    draw_corner(osd, 0, 0, LINE_SIZE, LINE_SIZE)?;
    draw_corner(osd, 0, line_y, LINE_SIZE, -LINE_SIZE)?;
    draw_corner(osd, line_x, 0, -LINE_SIZE, LINE_SIZE)?;
    draw_corner(osd, line_x, line_y, -LINE_SIZE, -LINE_SIZE)?;

    osd.transaction_commit()?;
    println!("preview drawn");
    Ok(())
}

/// A white corner bracket with 5-pixel tick marks, shadowed in black
/// and doubled inward so it stays visible on any background.
fn draw_corner(osd: &mut Osd, x: i32, y: i32, dx: i32, dy: i32) -> anyhow::Result<()> {
    osd.set_stroke_color(Color::White)?;
    osd.move_to_point(x, y)?;
    osd.stroke_line_to_point(x + dx, y)?;
    osd.move_to_point(x, y)?;
    osd.stroke_line_to_point(x, y + dy)?;

    let ox = if dx < 0 { -1 } else { 1 };
    let oy = if dy < 0 { -1 } else { 1 };
    let mut ii = x;
    while ii != x + dx {
        if ii % 5 == 0 {
            osd.move_to_point(ii, y)?;
            osd.stroke_line_to_point(ii, y + oy * 5)?;
        }
        ii += ox;
    }
    let mut ii = y;
    while ii != y + dy {
        if ii % 5 == 0 {
            osd.move_to_point(x, ii)?;
            osd.stroke_line_to_point(x + ox * 5, ii)?;
        }
        ii += oy;
    }

    osd.set_stroke_color(Color::Black)?;
    osd.move_to_point(x + ox, y + oy)?;
    osd.stroke_line_to_point(x + dx, y + oy)?;
    osd.move_to_point(x + ox, y + oy)?;
    osd.stroke_line_to_point(x + ox, y + dy)?;

    osd.set_stroke_color(Color::White)?;
    let ox = ox * 2;
    let oy = oy * 2;
    osd.move_to_point(x + ox, y + oy)?;
    osd.stroke_line_to_point(x + dx, y + oy)?;
    osd.move_to_point(x + ox, y + oy)?;
    osd.stroke_line_to_point(x + ox, y + dy)?;
    Ok(())
}
