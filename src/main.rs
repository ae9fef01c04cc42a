use std::path::PathBuf;

use anyhow::{Context, Result};
use chrono::Utc;
use log::info;

use freshscan::{
    dispatch_urgent, dynamic_status, scan_batch, Database, GeminiRecognizer, LogAlertSink,
    SavedProduct, ScanMode, SettingsStore,
};

/// Batch-scan photos from the command line and fold them into the tracked
/// pantry history.
#[tokio::main]
async fn main() -> Result<()> {
    env_logger::Builder::from_default_env()
        .filter_level(log::LevelFilter::Info)
        .init();

    let paths: Vec<String> = std::env::args().skip(1).collect();
    if paths.is_empty() {
        eprintln!("usage: freshscan <photo.jpg> [more photos...]");
        std::process::exit(2);
    }

    let data_dir = data_dir()?;
    std::fs::create_dir_all(&data_dir)
        .with_context(|| format!("failed to create data directory {}", data_dir.display()))?;

    let settings = SettingsStore::new(data_dir.join("settings.json"))?;
    let database = Database::new(data_dir.join("freshscan.sqlite3"))?;

    let api_key = std::env::var("GEMINI_API_KEY").context("GEMINI_API_KEY is not set")?;
    let recognizer = GeminiRecognizer::new(settings.recognizer(), api_key);

    let mut images = Vec::with_capacity(paths.len());
    for path in &paths {
        images.push(std::fs::read(path).with_context(|| format!("failed to read {path}"))?);
    }

    let scanner_settings = settings.scanner();
    let records = scan_batch(
        &recognizer,
        &images,
        ScanMode::Fast,
        &scanner_settings,
        |done, total| info!("analyzed {done}/{total} photo(s)"),
    )
    .await;

    if records.is_empty() {
        println!("No food labels recognized. Make sure the date area is visible and in focus.");
        return Ok(());
    }

    let today = Utc::now().date_naive();
    let scanned_at = Utc::now();
    let mut saved = Vec::with_capacity(records.len());
    for record in records {
        let status = dynamic_status(record.expiry_date.as_deref(), today);
        let date_text = record
            .expiry_date
            .as_deref()
            .or(record.storage_duration.as_deref())
            .unwrap_or("-");
        println!("{:30} {:12} {}", record.product_name, date_text, status.label());
        saved.push(SavedProduct::new(record, scanned_at));
    }

    database.insert_products(&saved).await?;

    let history = database.list_products().await?;
    let urgent = dispatch_urgent(&LogAlertSink, &history, today);
    println!(
        "Tracking {} product(s); {} need attention.",
        history.len(),
        urgent
    );

    Ok(())
}

fn data_dir() -> Result<PathBuf> {
    if let Ok(dir) = std::env::var("FRESHSCAN_DATA_DIR") {
        return Ok(PathBuf::from(dir));
    }
    let home = std::env::var("HOME").context("HOME is not set")?;
    Ok(PathBuf::from(home).join(".freshscan"))
}
