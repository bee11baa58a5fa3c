mod input;
mod media;
mod payload;
mod settings;

use std::io::BufRead;
use std::path::{Path, PathBuf};
use std::thread;
use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use clap::Parser;
use crossbeam_channel::{RecvTimeoutError, Sender, select, unbounded};

use input::{Command, KeyEvent, KeyboardHub, Shortcuts};
use media::{Player, PlayerStatus};
use payload::{EncodedAnimation, JobResult};
use settings::SettingsConfig;

/// Play a simulation animation frame by frame against its simulated time axis.
#[derive(Parser, Debug)]
#[command(name = "simreel-app", version)]
struct Cli {
    /// GIF file, base64 text (.b64/.txt) or job result JSON (.json)
    input: PathBuf,

    /// Total simulated duration in seconds (drives the time read-out)
    #[arg(long, default_value_t = 0.0)]
    duration: f64,

    /// Save the raw payload verbatim (file or directory)
    #[arg(long)]
    download: Option<PathBuf>,

    /// Export one composited frame as PNG (requires --export-path)
    #[arg(long, requires = "export_path")]
    export_frame: Option<usize>,

    #[arg(long)]
    export_path: Option<PathBuf>,

    /// Full playback cycles to run in headless mode
    #[arg(long, default_value_t = 1)]
    loops: u32,

    /// Read transport commands from stdin
    #[arg(long)]
    interactive: bool,

    #[arg(long)]
    no_autoplay: bool,

    /// Render loop rate override
    #[arg(long)]
    fps: Option<u32>,

    /// Persist the effective settings (after overrides) as the new defaults
    #[arg(long)]
    save_settings: bool,
}

fn read_input(path: &Path) -> Result<EncodedAnimation> {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or("")
        .to_lowercase();

    let animation = match ext.as_str() {
        "json" => {
            let json = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read {}", path.display()))?;
            let job = JobResult::from_json(&json)?;
            if let Some(data) = &job.data {
                if !data.graphs.is_empty() {
                    log::info!("Job result carries {} static graphs (not played)", data.graphs.len());
                }
            }
            job.animation()?
        }
        "b64" | "txt" => {
            let text = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read {}", path.display()))?;
            EncodedAnimation::from_base64(&text)?
        }
        _ => EncodedAnimation::from_bytes(
            std::fs::read(path).with_context(|| format!("Failed to read {}", path.display()))?,
        ),
    };
    Ok(animation)
}

/// Save the raw payload the player holds, whatever the decode outcome.
fn download(player: &Player, target: &Path, file_name: &str) -> Result<()> {
    let bytes = player
        .download_bytes()
        .ok_or_else(|| anyhow!("no animation loaded"))?;
    let path = if target.is_dir() {
        target.join(file_name)
    } else {
        target.to_path_buf()
    };
    payload::save_download(bytes, &path)
        .with_context(|| format!("Failed to save payload to {}", path.display()))
}

fn export_frame(player: &Player, index: usize, path: &Path) -> Result<()> {
    let frame = player
        .frame(index)
        .ok_or_else(|| anyhow!("frame {index} out of range (0..{})", player.frame_count()))?;
    let image = image::RgbaImage::from_raw(frame.width, frame.height, frame.data.clone())
        .ok_or_else(|| anyhow!("frame buffer does not match {}x{}", frame.width, frame.height))?;
    image
        .save(path)
        .with_context(|| format!("Failed to write {}", path.display()))?;
    log::info!("Exported frame {} to {}", index, path.display());
    Ok(())
}

fn log_position(player: &Player) {
    let info = player.info();
    log::info!(
        "{}  {} / {}{}",
        info.frame_label,
        info.time_label,
        info.total_time_label,
        if info.playing { "" } else { "  (paused)" }
    );
}

fn log_details(player: &Player) {
    let info = player.info();
    log::info!(
        "{} | {}x{} | frame {} of {} | progress {:.0}% | visible: {}",
        info.status.label(),
        info.canvas_width,
        info.canvas_height,
        info.current_frame,
        info.frame_count,
        info.progress * 100.0,
        player.is_visible()
    );
    if let Some(animation) = player.animation() {
        log::info!("Payload: {} bytes (downloadable: {})", animation.len(), info.downloadable);
    }
    if let Some(frame) = player.current_frame() {
        log::info!("Current frame delay: {}ms", frame.delay_ms);
    }
}

fn wait_for_decode(player: &mut Player) {
    log::info!("{}", player.status().label());
    while *player.status() == PlayerStatus::Loading {
        if !player.poll_load() {
            thread::sleep(Duration::from_millis(5));
        }
    }
}

/// Play until `loops` full cycles have been shown.
fn run_headless(player: &mut Player, loops: u32) {
    let mut completed = 0;
    log_position(player);
    while completed < loops && player.is_playing() && player.is_loop_running() {
        match player.ticks().recv_timeout(Duration::from_secs(1)) {
            Ok(now) => {
                if player.tick(now) {
                    log_position(player);
                    if player.current_index() == 0 {
                        completed += 1;
                    }
                }
            }
            Err(RecvTimeoutError::Timeout) => {}
            Err(RecvTimeoutError::Disconnected) => break,
        }
    }
}

fn spawn_stdin_reader(tx: Sender<Command>) -> Result<()> {
    thread::Builder::new()
        .name("simreel-stdin".into())
        .spawn(move || {
            let stdin = std::io::stdin();
            for line in stdin.lock().lines() {
                let Ok(line) = line else { break };
                match Command::parse(&line) {
                    Some(cmd) => {
                        if tx.send(cmd).is_err() {
                            break;
                        }
                    }
                    None => log::warn!("Unknown command: {line:?}. {}", Command::help()),
                }
            }
            // EOF ends the session
            let _ = tx.send(Command::Quit);
        })
        .context("Failed to spawn stdin reader")?;
    Ok(())
}

fn run_interactive(player: &mut Player) -> Result<()> {
    let hub = KeyboardHub::new();
    let keys = hub.subscribe();
    log::debug!("Keyboard hub: {} subscriber(s)", hub.subscriber_count());
    let (cmd_tx, cmd_rx) = unbounded::<Command>();
    spawn_stdin_reader(cmd_tx)?;

    for hint in Shortcuts::legend() {
        log::info!("{hint}");
    }
    log::info!("{}", Command::help());
    log_position(player);

    loop {
        let ticks = player.ticks();
        select! {
            recv(ticks) -> now => {
                if let Ok(now) = now {
                    if player.tick(now) {
                        log_position(player);
                    }
                }
            }
            recv(cmd_rx) -> cmd => {
                match cmd {
                    Ok(Command::Key(key)) => {
                        hub.dispatch(KeyEvent::new(key));
                        keys.drain_into(player);
                    }
                    Ok(Command::Restart) => player.restart(),
                    Ok(Command::Seek(fraction)) => player.seek_to_fraction(fraction),
                    Ok(Command::Frame(index)) => player.seek_to_frame(index),
                    Ok(Command::Visible(visible)) => player.set_visible(visible),
                    Ok(Command::Info) => log_details(player),
                    Ok(Command::Quit) | Err(_) => break,
                }
                log_position(player);
            }
        }
    }
    Ok(())
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp_millis()
        .init();

    let cli = Cli::parse();

    let mut settings = SettingsConfig::load();
    if cli.no_autoplay {
        settings.autoplay = false;
    }
    if let Some(fps) = cli.fps {
        settings.tick_rate_hz = fps;
    }
    if cli.save_settings {
        settings.save();
    }

    let animation = read_input(&cli.input)?;
    if animation.is_empty() {
        log::warn!("{} holds an empty payload", cli.input.display());
    } else if let Some((w, h)) = animation.screen_size() {
        log::info!("Payload: {} bytes, {}x{} logical screen", animation.len(), w, h);
    }

    let mut player = Player::new(settings.player_config());
    player.load_async(animation, cli.duration);
    wait_for_decode(&mut player);

    // The raw bytes stay available even when decoding failed
    if let Some(target) = &cli.download {
        download(&player, target, &settings.download_file_name)?;
    }

    match player.status() {
        PlayerStatus::Unavailable { reason } => {
            log::error!("{}: {reason}", player.status().label());
            if cli.download.is_none() {
                log::info!("Use --download to save the raw payload");
            }
            return Ok(());
        }
        PlayerStatus::Empty => {
            log::warn!("{}", player.status().label());
            log_position(&player);
            return Ok(());
        }
        _ => {}
    }

    let (w, h) = player.canvas_size();
    log::info!(
        "{} frames at {}x{}, {}s simulated",
        player.frame_count(),
        w,
        h,
        player.total_simulated_secs()
    );
    if player.unsupported_disposals() > 0 {
        log::warn!(
            "{} frames use disposal modes that are not honoured; playback may differ from a browser",
            player.unsupported_disposals()
        );
    }

    if let (Some(index), Some(path)) = (cli.export_frame, cli.export_path.as_deref()) {
        export_frame(&player, index, path)?;
    }

    if cli.interactive {
        run_interactive(&mut player)?;
    } else if cli.loops > 0 {
        run_headless(&mut player, cli.loops);
    } else {
        log_position(&player);
    }

    Ok(())
}
