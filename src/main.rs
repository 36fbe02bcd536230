use rlplay::cli::Args;
use rlplay::config::{CONFIG_FILE, LOG_FILE, PathConfig, PlayerConfig};
use rlplay::core::{Executors, Playback, PlaybackState, Surface};
use rlplay::engine::PreviewEngine;

use anyhow::{Context, Result, bail};
use clap::Parser;
use log::{debug, info, warn};
use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::{Duration, Instant};

/// Played when no file is given
const DEMO_ANIMATION: &str = r#"{
    "v": "5.7.4", "nm": "rlplay-demo", "fr": 30, "ip": 0, "op": 60, "w": 256, "h": 256,
    "layers": [ { "nm": "background" }, { "nm": "accent" } ]
}"#;

/// Max wait for in-flight work after recycle
const DRAIN_TIMEOUT: Duration = Duration::from_secs(2);

/// Surface without a window: real clock, counts redraw requests
struct HeadlessSurface {
    started: Instant,
    refresh_rate: f32,
    redraws: AtomicUsize,
}

impl Surface for HeadlessSurface {
    fn request_redraw(&self) {
        self.redraws.fetch_add(1, Ordering::Relaxed);
    }

    fn now(&self) -> Duration {
        self.started.elapsed()
    }

    fn refresh_rate_hint(&self) -> f32 {
        self.refresh_rate
    }
}

fn init_logging(args: &Args, path_config: &PathConfig) -> Result<()> {
    // 0 (default) = warn, 1 (-v) = info, 2 (-vv) = debug, 3+ (-vvv) = trace
    let log_level = match args.verbosity {
        0 => log::LevelFilter::Warn,
        1 => log::LevelFilter::Info,
        2 => log::LevelFilter::Debug,
        _ => log::LevelFilter::Trace,
    };

    if let Some(log_path_opt) = &args.log_file {
        let log_path = log_path_opt
            .as_ref()
            .cloned()
            .unwrap_or_else(|| path_config.data_file(LOG_FILE));
        let file = std::fs::File::create(&log_path)
            .with_context(|| format!("Failed to create log file: {}", log_path.display()))?;

        env_logger::Builder::new()
            .filter_level(log_level)
            .format_timestamp_millis()
            .target(env_logger::Target::Pipe(Box::new(file)))
            .init();

        info!("Logging to file: {} (level: {:?})", log_path.display(), log_level);
    } else {
        // Console logging (respects RUST_LOG if set)
        let default_level = match args.verbosity {
            0 => "warn",
            1 => "info",
            2 => "debug",
            _ => "trace",
        };
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_level))
            .format_timestamp_millis()
            .init();
    }
    Ok(())
}

/// CLI flags win over the settings file
fn apply_overrides(settings: &mut PlayerConfig, args: &Args) {
    if let Some(mode) = args.mode {
        settings.playback_mode = mode;
    }
    if let Some(hz) = args.refresh_rate {
        settings.refresh_rate = hz;
    }
    if let Some(threads) = args.threads {
        settings.decode_threads = threads;
    }
    settings.limit_fps |= args.limit_fps;
    settings.precache |= args.precache;
}

fn write_frame(out_dir: &Path, index: u64, playback: &Playback<PreviewEngine>) -> Result<()> {
    let Some(buffer) = playback.current_frame_buffer() else {
        return Ok(());
    };
    let image = image::RgbaImage::from_raw(buffer.width(), buffer.height(), buffer.to_rgba8())
        .context("Frame buffer size mismatch")?;
    let path = out_dir.join(format!("frame_{:04}.png", index));
    image
        .save(&path)
        .with_context(|| format!("Failed to write {}", path.display()))?;
    debug!("Wrote {}", path.display());
    Ok(())
}

fn run(args: &Args, settings: &PlayerConfig) -> Result<()> {
    let (width, height) = args.size;
    let executors = Executors::threaded(settings.resolved_decode_threads()).context("Failed to start decode workers")?;
    let engine = Arc::new(PreviewEngine::default());

    let mut options = settings.load_options(width, height);
    if !args.palette.is_empty() {
        options.palette = Some(args.palette.clone());
    }

    let mut playback = match &args.file_path {
        Some(path) => Playback::from_file(engine, path, options, executors),
        None => Playback::from_json(engine, "rlplay-demo", DEMO_ANIMATION, options, executors),
    };
    if !playback.is_loaded() {
        bail!("Failed to load animation");
    }

    let completions = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&completions);
    playback.set_waker(Some(Arc::new(move || {
        counter.fetch_add(1, Ordering::Relaxed);
    })));

    if let Some(dir) = &args.out_dir {
        std::fs::create_dir_all(dir).with_context(|| format!("Failed to create {}", dir.display()))?;
    }

    let headless = Arc::new(HeadlessSurface {
        started: Instant::now(),
        refresh_rate: settings.refresh_rate,
        redraws: AtomicUsize::new(0),
    });
    let surface: Arc<dyn Surface> = headless.clone();

    playback.attach_surface(&surface);
    playback.set_playback_mode(settings.playback_mode);
    for (layer, color) in &args.layer_colors {
        playback.set_layer_color(layer.as_str(), *color);
    }
    playback.set_allow_decode_single_frame(settings.decode_single_frame);
    playback.start();

    let meta = playback.metadata();
    info!(
        "Playing {} frames @ {}fps, mode {}, interval {:?}",
        meta.frame_count,
        meta.frame_rate,
        settings.playback_mode,
        playback.frame_interval()
    );

    let tick = Duration::from_secs_f32(1.0 / settings.refresh_rate.max(1.0));
    for _ in 0..args.ticks {
        let presented = playback.presented_frames();
        playback.draw(&surface);
        if playback.presented_frames() != presented
            && let Some(dir) = &args.out_dir
        {
            write_frame(dir, playback.presented_frames(), &playback)?;
        }
        std::thread::sleep(tick);
    }

    info!(
        "Presented {} frames in {} ticks ({} completions, {} redraw requests), cursor at {}",
        playback.presented_frames(),
        args.ticks,
        completions.load(Ordering::Relaxed),
        headless.redraws.load(Ordering::Relaxed),
        playback.cursor().frame
    );

    playback.recycle();
    let deadline = Instant::now() + DRAIN_TIMEOUT;
    while playback.state() != PlaybackState::Destroyed {
        if Instant::now() >= deadline {
            warn!("Draining timed out, exiting anyway");
            break;
        }
        playback.pump();
        std::thread::sleep(Duration::from_millis(1));
    }
    Ok(())
}

fn main() -> Result<()> {
    let args = Args::parse();

    let path_config = PathConfig::from_env_and_cli(args.config_dir.clone());
    if let Err(e) = path_config.ensure_dirs() {
        eprintln!("Warning: Failed to create application directories: {}", e);
    }
    init_logging(&args, &path_config)?;

    info!("rlplay starting...");
    debug!("Command-line args: {:?}", args);

    let settings_path = path_config.config_file(CONFIG_FILE);
    info!("Config path: {}", settings_path.display());
    let mut settings = PlayerConfig::load(&settings_path).context("Failed to load settings")?;
    apply_overrides(&mut settings, &args);
    debug!("Settings: {:?}", settings);

    run(&args, &settings)
}
