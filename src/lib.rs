mod config;
mod pipeline;

pub use config::ScannerConfig;
pub use pipeline::{records_to_json, Recognizer};

use anyhow::Result;
use std::path::Path;

/// Install the stderr tracing subscriber; `RUST_LOG` overrides the default filter.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "card_lens=debug,card_lens_lib=debug,card_vision=debug,card_assets=info,card_catalog=info".into()
            }),
        )
        .try_init();
}

/// Analyze one screenshot with the given config and return the JSON output.
pub fn run(config: &ScannerConfig, screenshot: &Path) -> Result<String> {
    let recognizer = Recognizer::from_config(config)?;
    let records = recognizer.analyze_path(screenshot)?;
    records_to_json(&records)
}
