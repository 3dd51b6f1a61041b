//! CLI tool to run a saved screenshot through the recognition pipeline.
//! Usage: cargo run -p card-vision --features cli --bin analyze_screenshot -- \
//!     <cards.json> <icon_dir> <screenshot.png> [atlas.png] [debug_dir]

use card_assets::{crop_region, FileAtlasCache, IconStore};
use card_catalog::{Catalog, CatalogProvider};
use card_vision::{PatternSet, Scanner, VisionConfig};
use std::path::PathBuf;
use std::time::Instant;

fn main() {
    // Logs go to stderr, the JSON result to stdout
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "card_vision=debug,card_assets=info,card_catalog=info".into()),
        )
        .init();

    let args: Vec<String> = std::env::args().collect();
    if args.len() < 4 {
        eprintln!(
            "Usage: {} <cards.json> <icon_dir> <screenshot.png> [atlas.png] [debug_dir]",
            args[0]
        );
        std::process::exit(1);
    }

    let start = Instant::now();
    let config = VisionConfig::default();
    let catalog = Catalog::load(&PathBuf::from(&args[1])).expect("Failed to load catalog");
    let cards = catalog.get_catalog().expect("Failed to read catalog");
    eprintln!("{:.3}s elapsed after catalog", start.elapsed().as_secs_f64());

    let icons = IconStore::new(&args[2]);
    let atlas_path = args
        .get(4)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("cache/all_patterns.png"));
    let cache = FileAtlasCache::new(atlas_path);
    let patterns = PatternSet::build(cards, &icons, &cache, &config)
        .expect("Failed to build patterns");
    eprintln!("{:.3}s elapsed after patterns", start.elapsed().as_secs_f64());

    let img = image::open(&args[3])
        .expect("Failed to open screenshot")
        .to_rgb8();
    eprintln!("Screenshot size: {}x{}", img.width(), img.height());

    let records = Scanner::new(&config, &patterns).scan(&img);
    eprintln!("{:.3}s elapsed before output", start.elapsed().as_secs_f64());

    if let Some(debug_dir) = args.get(5).map(PathBuf::from) {
        let _ = std::fs::create_dir_all(&debug_dir);
        for (i, record) in records.iter().enumerate() {
            let crop = crop_region(&img, &record.region());
            let name = format!("match_{}_card_{}.png", i, record.card.id);
            let _ = crop.save(debug_dir.join(name));
        }
        eprintln!("Debug crops saved to: {}", debug_dir.display());
    }

    println!(
        "{}",
        serde_json::to_string_pretty(&records).expect("Failed to serialize records")
    );
}
