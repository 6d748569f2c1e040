//! Scan codes from the camera until Ctrl-C.
//!
//!   $ scan                                   # built-in QR decoder
//!   $ scan --decoder-cmd "zbar-pipe --rgb"   # external decoder process
//!   $ RUST_LOG=debug scan --config scan.json --once

use anyhow::{Context, Result};
use clap::Parser;
use codecam_camera::GstMediaDevices;
use codecam_decode::{DecodeError, Decoder, ProcessDecoder, Symbol};
use codecam_sample::{PixelPayload, Viewport};
use codecam_scan::{ScanObserver, Scanner, ScannerConfig};
use serde_json::json;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::mpsc;

#[derive(Parser)]
struct CliArgs {
    /// JSON scanner config; flags below override it
    #[arg(long)]
    config: Option<PathBuf>,

    /// External decoder command line (stdin frames, stdout JSON arrays)
    #[arg(long)]
    decoder_cmd: Option<String>,

    #[arg(long)]
    width: Option<u32>,

    #[arg(long)]
    height: Option<u32>,

    /// Give up on a single decode after this many milliseconds
    #[arg(long)]
    timeout_ms: Option<u64>,

    /// Exit after the first successful decode
    #[arg(long)]
    once: bool,
}

/// In-process QR recognition, used when no decoder command is given.
struct QrDecoder;

impl Decoder for QrDecoder {
    fn decode(&mut self, payload: &PixelPayload) -> codecam_decode::Result<Vec<Symbol>> {
        let img = payload
            .to_image()
            .ok_or_else(|| DecodeError::Failed("payload does not match its dimensions".into()))?;
        let gray = image::imageops::grayscale(&img);
        let mut prepared = rqrr::PreparedImage::prepare_from_greyscale(
            gray.width() as usize,
            gray.height() as usize,
            |x, y| gray.get_pixel(x as u32, y as u32)[0],
        );

        let symbols = prepared
            .detect_grids()
            .into_iter()
            .filter_map(|grid| match grid.decode() {
                Ok((meta, text)) => Some(json!({ "format": "qr", "version": meta.version.0, "text": text })),
                Err(e) => {
                    log::debug!("found a grid but could not read it: {e:?}");
                    None
                }
            })
            .collect();
        Ok(symbols)
    }
}

enum DemoDecoder {
    Qr(QrDecoder),
    Process(ProcessDecoder),
}

impl Decoder for DemoDecoder {
    fn decode(&mut self, payload: &PixelPayload) -> codecam_decode::Result<Vec<Symbol>> {
        match self {
            DemoDecoder::Qr(d) => d.decode(payload),
            DemoDecoder::Process(d) => d.decode(payload),
        }
    }
}

enum Msg {
    Success(String),
    Stopped,
}

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::init();
    let args = CliArgs::parse();

    let mut config = match &args.config {
        Some(path) => ScannerConfig::from_path(path)
            .with_context(|| format!("Failed to load config {}", path.display()))?,
        None => ScannerConfig::default(),
    };
    if let (Some(w), Some(h)) = (args.width, args.height) {
        config.viewport = Viewport::new(w, h);
    }
    if args.timeout_ms.is_some() {
        config.decode_timeout_ms = args.timeout_ms;
    }

    let decoder = match &args.decoder_cmd {
        Some(cmd) => DemoDecoder::Process(
            ProcessDecoder::from_command_line(cmd).context("Failed to start decoder process")?,
        ),
        None => DemoDecoder::Qr(QrDecoder),
    };

    let (tx, mut rx) = mpsc::unbounded_channel();
    let stop_tx = tx.clone();
    let observer = ScanObserver::new()
        .on_start(|info| log::info!("scanning from {} ({} track(s))", info.id, info.tracks.len()))
        .on_stop(move || {
            let _ = stop_tx.send(Msg::Stopped);
        })
        .on_error(|e| eprintln!("WARN {e}"))
        .on_success(move |result| {
            let line = serde_json::to_string(result).unwrap_or_else(|e| format!("<{e}>"));
            let _ = tx.send(Msg::Success(line));
        });

    let devices = Arc::new(GstMediaDevices::new()?);
    let scanner = Scanner::new(devices, decoder, config, observer)?;

    let on_signal = scanner.clone();
    ctrlc::set_handler(move || on_signal.stop()).context("Failed to install Ctrl-C handler")?;

    scanner.start().await?;

    let mut found = 0usize;
    while let Some(msg) = rx.recv().await {
        match msg {
            Msg::Success(line) => {
                println!("{line}");
                found += 1;
                if args.once {
                    scanner.stop();
                }
            }
            Msg::Stopped => break,
        }
    }

    eprintln!("Stopped after {found} successful decode(s).");
    Ok(())
}
