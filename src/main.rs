//! Scan Engine - Terminal Host
//!
//! Runs one scan session against a JSON catalog. Frames come from the
//! hardware camera (feature `camera`) or from a still image given with
//! `--image`. Each typed line is a manual search, except the commands
//! `:confirm`, `:done`, `:cancel` and `:quit`.

use std::io::BufRead;
use std::path::PathBuf;
use std::thread;

use anyhow::{bail, Context, Result};
use crossbeam_channel::{select, tick, unbounded, Receiver};

#[cfg(not(feature = "camera"))]
use scan_engine::camera::NoCamera;
use scan_engine::camera::{CameraDevice, StillImageCamera};
use scan_engine::catalog::{CatalogEntry, StaticCatalog};
use scan_engine::config::ScanConfig;
use scan_engine::decoder::QrDecoder;
use scan_engine::session::{Phase, ScanMode, ScanObserver, ScanSession};
use scan_engine::telemetry::init_default_logging;

const USAGE: &str =
    "usage: scan-engine <catalog.json> [--config <scan.json>] [--mode add|view] [--image <file>]";

/// Command line options
#[derive(Debug, Default, PartialEq)]
struct Args {
    catalog: PathBuf,
    config: Option<PathBuf>,
    mode: Option<ScanMode>,
    image: Option<PathBuf>,
}

fn parse_args(args: impl IntoIterator<Item = String>) -> Result<Args> {
    let mut catalog = None;
    let mut parsed = Args::default();
    let mut args = args.into_iter();

    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--config" => parsed.config = Some(value(&mut args, "--config")?.into()),
            "--image" => parsed.image = Some(value(&mut args, "--image")?.into()),
            "--mode" => {
                parsed.mode = Some(match value(&mut args, "--mode")?.as_str() {
                    "add" => ScanMode::Add,
                    "view" => ScanMode::View,
                    other => bail!("unknown mode '{}'\n{}", other, USAGE),
                })
            }
            flag if flag.starts_with("--") => bail!("unknown option '{}'\n{}", flag, USAGE),
            path if catalog.is_none() => catalog = Some(PathBuf::from(path)),
            extra => bail!("unexpected argument '{}'\n{}", extra, USAGE),
        }
    }

    parsed.catalog = catalog.context(USAGE)?;
    Ok(parsed)
}

fn value(args: &mut impl Iterator<Item = String>, flag: &str) -> Result<String> {
    args.next()
        .with_context(|| format!("{} needs a value\n{}", flag, USAGE))
}

/// Operator input from stdin
#[derive(Debug, PartialEq)]
enum Command {
    Query(String),
    Confirm,
    ConfirmAndClose,
    Cancel,
    Quit,
}

fn parse_command(line: &str) -> Command {
    match line.trim() {
        ":confirm" | ":c" => Command::Confirm,
        ":done" => Command::ConfirmAndClose,
        ":cancel" | ":x" => Command::Cancel,
        ":quit" | ":q" => Command::Quit,
        query => Command::Query(query.to_string()),
    }
}

/// Prints confirmed entries to stdout as JSON lines
struct PrintObserver;

impl ScanObserver for PrintObserver {
    fn on_detect(&mut self, entry: &CatalogEntry) {
        match serde_json::to_string(entry) {
            Ok(json) => println!("{}", json),
            Err(e) => log::error!("Failed to serialize entry {}: {}", entry.id, e),
        }
    }

    fn on_close(&mut self) {
        log::info!("Scanner closed");
    }

    fn on_feedback(&mut self) {
        eprint!("\x07");
    }
}

fn select_camera(args: &Args, config: &ScanConfig) -> Box<dyn CameraDevice> {
    if let Some(path) = &args.image {
        return Box::new(StillImageCamera::new(path.clone()));
    }

    #[cfg(feature = "camera")]
    {
        for camera in scan_engine::camera::native::NativeCamera::list_cameras() {
            log::info!("Camera {}: {}", camera.index, camera.name);
        }
        Box::new(scan_engine::camera::NativeCamera::new(config.open_timeout()))
    }

    #[cfg(not(feature = "camera"))]
    {
        let _ = config;
        log::warn!("Built without camera support, manual search only");
        Box::new(NoCamera)
    }
}

fn spawn_stdin_reader() -> Result<Receiver<String>> {
    let (tx, rx) = unbounded();
    thread::Builder::new()
        .name("stdin-reader".to_string())
        .spawn(move || {
            let stdin = std::io::stdin();
            for line in stdin.lock().lines() {
                match line {
                    Ok(line) => {
                        if tx.send(line).is_err() {
                            break;
                        }
                    }
                    Err(e) => {
                        log::warn!("Failed to read stdin: {}", e);
                        break;
                    }
                }
            }
        })
        .context("Failed to spawn stdin reader")?;
    Ok(rx)
}

fn main() -> Result<()> {
    init_default_logging().context("Failed to initialize logging")?;
    log::info!("Scan Engine v{}", env!("CARGO_PKG_VERSION"));

    let args = parse_args(std::env::args().skip(1))?;

    let mut config = match &args.config {
        Some(path) => ScanConfig::load(path)?,
        None => ScanConfig::default(),
    };
    if let Some(mode) = args.mode {
        config.mode = mode;
    }

    let catalog = StaticCatalog::load(&args.catalog)
        .with_context(|| format!("Failed to load catalog {}", args.catalog.display()))?;
    let camera = select_camera(&args, &config);
    let decoder = QrDecoder::new(config.decode_max_dimension);
    let ticker = tick(config.frame_interval());

    let mut session = ScanSession::new(
        config,
        camera,
        Box::new(decoder),
        Box::new(catalog),
        Box::new(PrintObserver),
    );
    session.start();

    let lines = spawn_stdin_reader()?;
    let mut shown: Option<(Phase, Option<String>)> = None;

    while !session.is_closed() {
        select! {
            recv(ticker) -> _ => {
                session.pump();
            }
            recv(lines) -> line => match line {
                Ok(line) => match parse_command(&line) {
                    Command::Query(query) => session.manual_query(&query),
                    Command::Confirm => session.confirm(),
                    Command::ConfirmAndClose => session.confirm_and_close(),
                    Command::Cancel => session.cancel(),
                    Command::Quit => session.close(),
                },
                Err(_) => {
                    log::info!("Input closed, exiting...");
                    session.close();
                }
            },
        }

        let status = session.status();
        let current = (status.phase, status.message);
        if shown.as_ref() != Some(&current) {
            match (&current.0, session.found_entry()) {
                (Phase::Found, Some(entry)) => eprintln!(
                    "Found: {} [{}] - :confirm, :done or :cancel",
                    entry.name, entry.sku
                ),
                _ => match &current.1 {
                    Some(message) => eprintln!("{:?}: {}", current.0, message),
                    None => eprintln!("{:?}", current.0),
                },
            }
            shown = Some(current);
        }
    }

    let stats = session.stats();
    log::info!(
        "Session stats: {} frames sampled, {} payloads decoded, {} items delivered",
        stats.frames_sampled,
        stats.payloads_decoded,
        stats.delivered
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(list: &[&str]) -> Result<Args> {
        parse_args(list.iter().map(|s| s.to_string()))
    }

    #[test]
    fn test_parse_args() {
        let parsed = args(&["items.json", "--mode", "view", "--image", "code.png"]).unwrap();
        assert_eq!(parsed.catalog, PathBuf::from("items.json"));
        assert_eq!(parsed.mode, Some(ScanMode::View));
        assert_eq!(parsed.image, Some(PathBuf::from("code.png")));
        assert_eq!(parsed.config, None);
    }

    #[test]
    fn test_parse_args_errors() {
        assert!(args(&[]).is_err());
        assert!(args(&["items.json", "--mode"]).is_err());
        assert!(args(&["items.json", "--mode", "browse"]).is_err());
        assert!(args(&["items.json", "other.json"]).is_err());
        assert!(args(&["items.json", "--verbose"]).is_err());
    }

    #[test]
    fn test_parse_command() {
        assert_eq!(parse_command(":confirm"), Command::Confirm);
        assert_eq!(parse_command(" :q "), Command::Quit);
        assert_eq!(parse_command(":done"), Command::ConfirmAndClose);
        assert_eq!(parse_command("milk"), Command::Query("milk".to_string()));
    }
}
