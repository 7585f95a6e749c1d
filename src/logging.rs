// src/logging.rs

use std::path::PathBuf;

use color_eyre::eyre::Result;
use directories::ProjectDirs;
use once_cell::sync::Lazy;
use tracing_error::ErrorLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

static LOG_ENV: Lazy<String> =
    Lazy::new(|| format!("{}_LOGLEVEL", env!("CARGO_CRATE_NAME").to_uppercase()));
static LOG_FILE: Lazy<String> = Lazy::new(|| format!("{}.log", env!("CARGO_PKG_NAME")));

fn project_directory() -> Option<ProjectDirs> {
    ProjectDirs::from("com", "vantage-rs", env!("CARGO_PKG_NAME"))
}

pub fn data_dir() -> PathBuf {
    match project_directory() {
        Some(dirs) => dirs.data_local_dir().to_path_buf(),
        None => PathBuf::from(".").join(".data"),
    }
}

/// Routes tracing output to a file in the data directory, keeping stdout
/// free for the in-place progress line. `RUST_LOG` takes precedence over the
/// crate's own loglevel variable; without either the filter defaults to info.
pub fn initialize_logging() -> Result<()> {
    let directory = data_dir();
    std::fs::create_dir_all(&directory)?;
    let log_file = std::fs::File::create(directory.join(LOG_FILE.as_str()))?;

    let filter = std::env::var("RUST_LOG")
        .or_else(|_| std::env::var(LOG_ENV.as_str()))
        .unwrap_or_else(|_| format!("{}=info", env!("CARGO_CRATE_NAME")));

    let file_layer = tracing_subscriber::fmt::layer()
        .with_writer(log_file)
        .with_target(false)
        .with_ansi(false)
        .with_filter(EnvFilter::new(filter));

    tracing_subscriber::registry()
        .with(file_layer)
        .with(ErrorLayer::default())
        .init();

    Ok(())
}
