//! Usage: card-lens <screenshot.png> [scanner.json]

use card_lens_lib::ScannerConfig;
use std::path::PathBuf;

fn main() -> anyhow::Result<()> {
    card_lens_lib::init_tracing();

    let args: Vec<String> = std::env::args().collect();
    if args.len() < 2 {
        eprintln!("Usage: {} <screenshot.png> [scanner.json]", args[0]);
        std::process::exit(1);
    }

    let config = match args.get(2) {
        Some(path) => ScannerConfig::load(&PathBuf::from(path))?,
        None => ScannerConfig::default(),
    };

    println!("{}", card_lens_lib::run(&config, &PathBuf::from(&args[1]))?);
    Ok(())
}
