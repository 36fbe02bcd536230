use clap::Parser;
use std::path::PathBuf;

use crate::core::cursor::PlaybackMode;
use crate::engine::Color;

// Build version with engine info
const VERSION_INFO: &str = const_format::concatcp!(
    env!("CARGO_PKG_VERSION"), "\n",
    "Engine: preview (Lottie header, flat fill)\n",
    "Target: ", std::env::consts::ARCH, "-", std::env::consts::OS
);

/// Headless Lottie frame player
#[derive(Parser, Debug)]
#[command(author, version = VERSION_INFO, about, long_about = None)]
pub struct Args {
    /// Lottie JSON file to play (default: built-in demo animation)
    #[arg(value_name = "FILE")]
    pub file_path: Option<PathBuf>,

    /// Output size in pixels
    #[arg(short = 's', long = "size", value_name = "WxH", default_value = "256x256", value_parser = parse_size)]
    pub size: (u32, u32),

    /// Playback mode: loop, once or freeze (default: from settings)
    #[arg(short = 'm', long = "mode", value_name = "MODE")]
    pub mode: Option<PlaybackMode>,

    /// Number of presentation ticks to run
    #[arg(short = 't', long = "ticks", value_name = "N", default_value_t = 120)]
    pub ticks: u32,

    /// Display refresh rate in Hz (default: from settings)
    #[arg(short = 'r', long = "refresh", value_name = "HZ")]
    pub refresh_rate: Option<f32>,

    /// Present every second frame for 60fps+ animations
    #[arg(long = "limit-fps")]
    pub limit_fps: bool,

    /// Generate the engine frame cache after the first frame
    #[arg(long = "precache")]
    pub precache: bool,

    /// Layer color override, repeatable
    #[arg(long = "layer-color", value_name = "NAME=#AARRGGBB", value_parser = parse_layer_color)]
    pub layer_colors: Vec<(String, Color)>,

    /// Palette replacement applied at load, repeatable
    #[arg(long = "palette", value_name = "#AARRGGBB")]
    pub palette: Vec<Color>,

    /// Write every presented frame as PNG into this directory
    #[arg(short = 'o', long = "out", value_name = "DIR")]
    pub out_dir: Option<PathBuf>,

    /// Decode worker threads (default: from settings, 0 = auto)
    #[arg(long = "threads", value_name = "N")]
    pub threads: Option<usize>,

    /// Enable debug logging to file (default: rlplay.log)
    #[arg(short = 'l', long = "log", value_name = "LOG_FILE")]
    pub log_file: Option<Option<PathBuf>>,

    /// Increase logging verbosity (default: warn, -v: info, -vv: debug, -vvv+: trace)
    #[arg(short = 'v', long = "verbose", action = clap::ArgAction::Count)]
    pub verbosity: u8,

    /// Custom configuration directory (overrides default platform paths)
    #[arg(short = 'c', long = "config-dir", value_name = "DIR")]
    pub config_dir: Option<PathBuf>,
}

fn parse_size(s: &str) -> Result<(u32, u32), String> {
    let (w, h) = s
        .split_once(['x', 'X'])
        .ok_or_else(|| format!("expected WxH, got '{}'", s))?;
    let w: u32 = w.trim().parse().map_err(|e| format!("bad width '{}': {}", w, e))?;
    let h: u32 = h.trim().parse().map_err(|e| format!("bad height '{}': {}", h, e))?;
    if w == 0 || h == 0 {
        return Err(format!("size must be non-zero, got {}x{}", w, h));
    }
    Ok((w, h))
}

fn parse_layer_color(s: &str) -> Result<(String, Color), String> {
    let (name, color) = s
        .split_once('=')
        .ok_or_else(|| format!("expected NAME=#AARRGGBB, got '{}'", s))?;
    if name.is_empty() {
        return Err("layer name is empty".to_string());
    }
    Ok((name.to_string(), color.parse()?))
}
