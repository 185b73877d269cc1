mod cancel;
pub mod config;
mod dispatcher;
pub mod session;
mod upload;

pub use cancel::{RequestScope, RequestTicket};
pub use config::{load_config, save_config, AppConfig, ConfigError, LogLevel};
pub use session::{
    DocumentStore, FailedUpload, Outcome, RetryPrompt, Session, StatusKind, StatusMessage, View,
};
pub use upload::UploadReport;

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use shield_client::HttpBackend;
use shield_core::SourceFile;

/// Route `log` output through `env_logger`. `RUST_LOG` wins over `level`.
/// Configured level first, then `RUST_LOG` directives on top.
pub fn init_logging(level: LogLevel) {
    let _ = env_logger::Builder::new()
        .filter_level(level.to_level_filter())
        .parse_default_env()
        .format_timestamp_millis()
        .try_init();
}

pub fn run() {
    if let Err(e) = try_run() {
        log::error!("[Startup] {:#}", e);
        eprintln!("error: {:#}", e);
        std::process::exit(1);
    }
}

fn try_run() -> anyhow::Result<()> {
    let config = match config::config_path() {
        Ok(path) => load_config(&path).unwrap_or_else(|e| {
            eprintln!("ignoring unreadable config {}: {}", path.display(), e);
            AppConfig::default()
        }),
        Err(_) => AppConfig::default(),
    };
    init_logging(config.log_level);

    let files = std::env::args()
        .skip(1)
        .map(|arg| {
            SourceFile::from_path(Path::new(&arg)).with_context(|| format!("failed to read {}", arg))
        })
        .collect::<anyhow::Result<Vec<_>>>()?;

    let backend = HttpBackend::new(
        config.backend_base_url(),
        Duration::from_secs(config.request_timeout_secs),
    )
    .context("failed to build HTTP client")?;

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("failed to start async runtime")?;

    runtime.block_on(async move {
        let session = Session::new(Arc::new(backend), config);
        session.refresh_documents().await;
        log::info!("[Startup] {} documents on backend", session.documents().len());

        if files.is_empty() {
            for doc in session.documents() {
                println!(
                    "{}\t{}\t{} regions{}",
                    doc.doc_id,
                    doc.original_filename,
                    doc.regions_count,
                    if doc.is_protected { "\tprotected" } else { "" }
                );
            }
            return Ok(());
        }

        let report = session.handle_files(files).await;
        for doc_id in &report.uploaded {
            println!("uploaded\t{}", doc_id);
        }
        for failed in &report.failed {
            println!("failed\t{}\t{}", failed.name, failed.error);
        }
        if report.failed.is_empty() {
            Ok(())
        } else {
            anyhow::bail!("{} uploads failed", report.failed.len())
        }
    })
}
