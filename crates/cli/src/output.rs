//! Output formatting for the receiver board and run summaries

use anyhow::Result;
use serde_json::json;
use std::time::Duration;

use detective_pipeline::PipelineSnapshot;
use detective_receiver::{BoardEntry, BoardView, Section, EMPTY_SECTION_SUBTITLE, EMPTY_SECTION_TITLE};

fn is_json(format: &str) -> bool {
    matches!(format.trim().to_lowercase().as_str(), "json" | "j")
}

/// Print the board in the specified format
pub fn print_board(view: &BoardView, format: &str) -> Result<()> {
    if is_json(format) {
        println!("{}", serde_json::to_string_pretty(view)?);
    } else {
        print!("{}", render_board(view));
    }
    Ok(())
}

/// Both sections as a text table. An empty section shows a single
/// placeholder row.
fn render_board(view: &BoardView) -> String {
    let mut out = String::new();
    out.push_str(&format!("\n{:-<64}\n", ""));
    for section in Section::ALL {
        out.push_str(&format!("{}\n", section.title()));
        let entries = view.section(section);
        if entries.is_empty() {
            out.push_str(&format!("  {:<33} {:<18}\n", EMPTY_SECTION_TITLE, EMPTY_SECTION_SUBTITLE));
            continue;
        }
        for entry in entries {
            out.push_str(&format!(
                "  {:<33} {:<18} {:<4} {:>3}\n",
                entry.ssid,
                entry.bssid,
                signal_icon(entry),
                entry.signal_quality
            ));
        }
    }
    out.push_str(&format!("{:-<64}\n", ""));
    out
}

fn signal_icon(entry: &BoardEntry) -> String {
    let bars = entry.bars() as usize;
    format!("{}{}", "#".repeat(bars), ".".repeat(3 - bars))
}

/// Print one alert as it arrives
pub fn print_alert(entry: &BoardEntry, format: &str) -> Result<()> {
    if is_json(format) {
        println!("{}", json!({ "alert": entry }));
    } else {
        println!("🔔 New open network: {} ({})", entry.ssid, entry.bssid);
    }
    Ok(())
}

/// Print the end-of-run summary, with the loopback board when there is one
pub fn print_run_summary(
    snapshot: &PipelineSnapshot,
    board: Option<&BoardView>,
    format: &str,
    duration: Duration,
) -> Result<()> {
    if is_json(format) {
        let output = json!({
            "run_info": {
                "duration_seconds": duration.as_secs_f64(),
                "duration_formatted": format_duration(duration),
            },
            "pipeline": snapshot,
            "board": board,
        });
        println!("{}", serde_json::to_string_pretty(&output)?);
        return Ok(());
    }

    if let Some(view) = board {
        print!("{}", render_board(view));
    }
    let stats = &snapshot.stats;
    println!("\n📊 Summary:");
    println!("  Batches delivered: {}", stats.batches_ingested);
    println!("  Records sent: {}", stats.records_sent);
    println!("  Records dropped: {}", stats.records_dropped);
    println!("  Open networks alerted: {}", snapshot.alerted_networks);
    println!("  ⏱️  Run duration: {}", format_duration(duration));
    println!();
    Ok(())
}

/// Format duration in a human-readable way
pub fn format_duration(duration: Duration) -> String {
    let total_secs = duration.as_secs();
    let millis = duration.subsec_millis();

    if total_secs == 0 {
        format!("{}ms", millis)
    } else if total_secs < 60 {
        if millis > 0 {
            format!("{}.{:03}s", total_secs, millis)
        } else {
            format!("{}s", total_secs)
        }
    } else {
        let mins = total_secs / 60;
        let secs = total_secs % 60;
        if secs > 0 {
            format!("{}m {}s", mins, secs)
        } else {
            format!("{}m", mins)
        }
    }
}
