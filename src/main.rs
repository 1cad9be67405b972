use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use clap::Parser;
use tracing::{error, info};

use qsnap::{ServerState, SharedOcr, TesseractEngine};

#[derive(Parser, Debug)]
#[command(
    name = "qsnap",
    version,
    about = "Split scanned question papers into per-question images"
)]
struct Cli {
    /// Listen address (default: settings [server].addr, or 0.0.0.0:$PORT)
    #[arg(short = 'a', long = "addr")]
    addr: Option<String>,

    /// Read extra settings from a local TOML file
    #[arg(short = 'r', long = "read-settings")]
    read_settings: Option<String>,

    /// Tesseract language(s), e.g. eng or eng+hin
    #[arg(short = 'l', long = "ocr-lang")]
    ocr_lang: Option<String>,

    /// Tesseract page segmentation mode
    #[arg(long = "psm")]
    psm: Option<u32>,

    /// Enable verbose logging
    #[arg(long = "verbose")]
    verbose: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    qsnap::logging::init(cli.verbose)?;

    let settings_path = cli.read_settings.as_deref().map(Path::new);
    let mut settings = qsnap::settings::load_settings(settings_path)?;
    if let Some(addr) = cli.addr {
        settings.server_addr = addr;
    } else if let Some(port) = std::env::var("PORT").ok().filter(|port| !port.trim().is_empty()) {
        settings.server_addr = format!("0.0.0.0:{}", port.trim());
    }
    if let Some(lang) = cli.ocr_lang {
        settings.ocr_languages = lang;
    }
    if let Some(psm) = cli.psm {
        settings.ocr_psm = psm;
    }

    let ocr = SharedOcr::default();
    spawn_ocr_init(
        ocr.clone(),
        settings.ocr_languages.clone(),
        settings.ocr_psm,
        settings.page_timeout,
    );

    let state = Arc::new(ServerState::new(settings, ocr));
    qsnap::server::run_server(state).await
}

fn spawn_ocr_init(ocr: SharedOcr, languages: String, psm: u32, limit: Duration) {
    tokio::spawn(async move {
        let result = tokio::task::spawn_blocking(move || {
            TesseractEngine::initialize(&languages, psm).map(|engine| engine.with_time_limit(limit))
        })
        .await;
        match result {
            Ok(Ok(engine)) => {
                info!(languages = engine.languages(), "OCR engine ready");
                ocr.install(Arc::new(engine));
            }
            Ok(Err(err)) => error!("OCR engine failed to initialize: {:#}", err),
            Err(err) => error!("OCR engine init task failed: {}", err),
        }
    });
}
