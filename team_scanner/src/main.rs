use crate::modules::{
    code_detector::CodeDetector,
    replay::{ReplayFrameSource, TextQrCapability},
    scan_controller::{ScanController, ScanRequest, ScanStatus},
    sink_client::HttpSinkClient,
};
use std::sync::Arc;
use tokio::io::{self, AsyncBufReadExt, BufReader};

mod config;
mod modules;

const DEFAULT_CONFIG_PATH: &str = "team_scanner/Config.toml";

#[tokio::main]
async fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    // Load the configuration, path can be overridden from the environment
    let config_path = std::env::var("TEAM_SCANNER_CONFIG").unwrap_or_else(|_| DEFAULT_CONFIG_PATH.to_string());
    let config = match config::load_config(&config_path) {
        Ok(config) => config,
        Err(e) => {
            log::error!("Error loading configuration from {}: {}", config_path, e);
            return;
        }
    };

    let sink = match HttpSinkClient::new(&config.sink) {
        Ok(sink) => sink,
        Err(e) => {
            log::error!("Error building sink client: {}", e);
            return;
        }
    };
    log::info!("Records will be sent to {}", sink.endpoint_url());

    let detector = CodeDetector::new(Arc::new(TextQrCapability));
    if !detector.is_supported() {
        log::warn!("No QR detection available, scans will never find a code");
    }

    let controller = ScanController::new(
        Arc::new(ReplayFrameSource::new(config.replay.frames_dir.clone())),
        detector,
        Arc::new(sink),
        config.scanner.clone(),
    );

    log::info!("Scan controller {} ready", controller.id());

    // Log every status change the controller publishes
    let mut status_rx = controller.subscribe();
    tokio::spawn(async move {
        while status_rx.changed().await.is_ok() {
            let status = status_rx.borrow_and_update().clone();
            log::info!("{}", describe(&status));
        }
    });

    println!("Commands: start, scan, stop, status, list, quit");
    let mut lines = BufReader::new(io::stdin()).lines();
    loop {
        let line = match lines.next_line().await {
            Ok(Some(line)) => line,
            Ok(None) => break,
            Err(e) => {
                log::error!("Error reading command: {}", e);
                break;
            }
        };

        match line.trim() {
            "" => continue,
            "start" => {
                if let Err(e) = controller.start().await {
                    println!("{}", e);
                }
            }
            "scan" => match controller.scan() {
                ScanRequest::Started => println!("Scanning..."),
                ScanRequest::AlreadyRunning => println!("Already scanning"),
                ScanRequest::CameraInactive => println!("Start the camera first"),
            },
            "stop" => controller.stop(),
            "status" => println!("{}", describe(&controller.status())),
            "list" => {
                for entry in controller.entries() {
                    println!("{}  {}", entry.timestamp.to_rfc3339(), entry.qr_code.replace('\n', " | "));
                }
            }
            "quit" | "exit" => break,
            other => println!("Unknown command: {}", other),
        }
    }
    // Dropping the controller stops it and releases the camera
}

fn describe(status: &ScanStatus) -> String {
    let mut text = format!("{:?}, {} team(s) scanned", status.state, status.accepted_count);
    if let Some(err) = status.camera_error() {
        text.push_str(&format!(", camera error: {} (run start again)", err));
    } else if let Some(err) = &status.last_error {
        text.push_str(&format!(", error: {}", err));
    }
    if let Some(payload) = &status.last_success {
        text.push_str(&format!(", last: {}", payload.replace('\n', " | ")));
    }
    text
}
