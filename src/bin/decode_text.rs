//! Decode one text file through the full pipeline - obfuscated text in,
//! readable text on stdout.
//! Run with: cargo run --release --bin decode_text -- <input_path> [font_key]

use anyhow::Result;
use pua_workflow::core::{Config, DecodeSession};
use pua_workflow::orchestration::decode_orchestrator::DecodeOrchestrator;
use pua_workflow::utils::text_ops;
use std::path::Path;
use std::sync::Arc;
use tracing::info;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging (stderr, so stdout stays pipeable)
    tracing_subscriber::fmt()
        .with_env_filter("pua_workflow=info")
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    // Get input path and optional font key from args
    let args: Vec<String> = std::env::args().collect();
    if args.len() < 2 {
        eprintln!("Usage: decode_text <input_path> [font_key]");
        std::process::exit(1);
    }
    let input_path = args[1].clone();
    let font_key = args.get(2).cloned();

    if !Path::new(&input_path).exists() {
        eprintln!("Input file not found: {}", input_path);
        std::process::exit(1);
    }

    let raw = std::fs::read_to_string(&input_path)?;
    info!("Loaded {} ({} bytes)", input_path, raw.len());

    let config = Arc::new(Config::new()?);
    let orchestrator = DecodeOrchestrator::new(config.clone())?;

    let session = DecodeSession::new(config.placeholder_range());
    session.set_input(&text_ops::normalize_line_breaks(&raw));
    session.set_font_key(font_key);

    let report = orchestrator.run(&session).await?;

    // Decoded text on stdout; everything else stays on stderr so the
    // output pipes cleanly
    println!("{}", session.plain_output());

    if report.noop {
        info!("No placeholder glyphs found; text passed through unchanged");
        return Ok(());
    }

    let unresolved: Vec<String> = session
        .glyph_grid()
        .iter()
        .filter(|g| g.mapping.is_none())
        .map(|g| format!("U+{:04X} (x{})", g.ch as u32, g.count))
        .collect();

    eprintln!("\n=== Run Summary ===");
    eprintln!(
        "Groups: {} ok, {} mismatched, {} failed (of {})",
        report.analytics.groups_succeeded,
        report.analytics.groups_mismatched,
        report.analytics.groups_failed,
        report.analytics.groups_total
    );
    eprintln!(
        "Glyphs: {}/{} resolved in {}ms",
        report.analytics.glyphs_resolved,
        report.analytics.glyphs_total,
        report.analytics.elapsed_ms
    );
    if !unresolved.is_empty() {
        eprintln!("Unresolved: {}", unresolved.join(", "));
    }

    Ok(())
}
