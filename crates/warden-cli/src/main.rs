//! Warden CLI
//!
//! Operator tool for compiling filter lists into a `RuleStore`, gating CI on
//! parse quality, and measuring matching throughput against a URL corpus.

use std::cmp::Ordering;
use std::fs;
use std::path::Path;
use std::time::Instant;

use clap::{Parser, Subcommand};

use warden_core::psl::PslEngine;
use warden_core::types::{HeaderMap, HttpRequest, RequestOutcome, RequestType};
use warden_rules::{ListStats, RuleSetBuilder};

#[derive(Parser)]
#[command(name = "warden-cli")]
#[command(about = "Warden filter list compiler and tools")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Parse and build filter lists into a RuleStore, reporting rule counts
    Compile {
        /// Input filter list files
        #[arg(short, long, required = true)]
        input: Vec<String>,

        /// Write a JSON per-list parse summary here
        #[arg(long)]
        summary: Option<String>,

        /// Verbose per-list output
        #[arg(short, long)]
        verbose: bool,
    },

    /// Check bundled lists parse cleanly (CI gate)
    Check {
        /// Input filter list files
        #[arg(short, long, required = true)]
        input: Vec<String>,

        /// Fail if any list's parse ratio drops below threshold (0.0-1.0)
        #[arg(long, default_value = "0.95")]
        min_parse_ratio: f64,
    },

    /// Measure request-matching throughput over a URL corpus
    Bench {
        /// Input filter list files to build the RuleStore from
        #[arg(short, long, required = true)]
        input: Vec<String>,

        /// Newline-delimited URL corpus file
        #[arg(short, long)]
        urls: String,

        /// Passes over the corpus
        #[arg(long, default_value = "20")]
        iterations: usize,
    },
}

fn main() {
    env_logger::init();
    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Compile { input, summary, verbose } => cmd_compile(&input, summary.as_deref(), verbose),
        Commands::Check { input, min_parse_ratio } => cmd_check(&input, min_parse_ratio),
        Commands::Bench { input, urls, iterations } => cmd_bench(&input, &urls, iterations),
    };

    if let Err(e) = result {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}

fn read_lists(inputs: &[String]) -> Result<RuleSetBuilder, String> {
    let mut builder = RuleSetBuilder::new();
    for path in inputs {
        let content = fs::read_to_string(path).map_err(|e| format!("Failed to read '{path}': {e}"))?;
        let name = Path::new(path).file_name().unwrap_or_default().to_string_lossy().to_string();
        builder.add_list(&name, &content);
    }
    Ok(builder)
}

fn cmd_compile(inputs: &[String], summary: Option<&str>, verbose: bool) -> Result<(), String> {
    if inputs.is_empty() {
        return Err("No input files specified".to_string());
    }

    let start = Instant::now();
    let builder = read_lists(inputs)?;
    let stats = builder.stats().to_vec();

    if verbose {
        for stat in &stats {
            println!(
                "  [{}] {} - {} lines, {} parsed, {} skipped, {} failed",
                stat.list_id, stat.name, stat.total_lines, stat.parsed, stat.skipped, stat.failed
            );
        }
    }

    let store = builder.build();
    let elapsed = start.elapsed();

    let total_lines: usize = stats.iter().map(|s| s.total_lines).sum();
    let total_parsed: usize = stats.iter().map(|s| s.parsed).sum();
    let total_failed: usize = stats.iter().map(|s| s.failed).sum();

    println!("Compiled {} filter list(s)", inputs.len());
    println!("  Lines:   {total_lines}");
    println!("  Parsed:  {total_parsed} ({total_failed} failed)");
    println!("  Time:    {:.1}ms", elapsed.as_secs_f64() * 1000.0);

    // Touch the built store so the compile step genuinely exercises the
    // build path rather than just parsing, without requiring a live request.
    let _ = store.list_name(0);

    if let Some(path) = summary {
        write_summary(path, &stats)?;
        println!("  Summary written to {path}");
    }

    Ok(())
}

fn write_summary(path: &str, stats: &[ListStats]) -> Result<(), String> {
    let entries: Vec<serde_json::Value> = stats
        .iter()
        .map(|s| {
            serde_json::json!({
                "list_id": s.list_id,
                "name": s.name,
                "total_lines": s.total_lines,
                "parsed": s.parsed,
                "skipped": s.skipped,
                "failed": s.failed,
                "badfiltered": s.badfiltered,
                "parse_ratio": s.parse_ratio(),
            })
        })
        .collect();
    let body = serde_json::to_string_pretty(&entries).map_err(|e| format!("Failed to serialize summary: {e}"))?;
    fs::write(path, body).map_err(|e| format!("Failed to write '{path}': {e}"))
}

fn cmd_check(inputs: &[String], min_parse_ratio: f64) -> Result<(), String> {
    if inputs.is_empty() {
        return Err("No input files specified".to_string());
    }

    println!("Checking {} filter list(s)...\n", inputs.len());

    let builder = read_lists(inputs)?;
    let stats = builder.stats().to_vec();

    let mut worst_ratio = 1.0f64;
    for stat in &stats {
        let ratio = stat.parse_ratio();
        worst_ratio = worst_ratio.min(ratio);
        let status = if ratio >= min_parse_ratio { "OK" } else { "WARN" };
        println!(
            "[{}] {} - {} lines -> {} parsed, {} failed ({:.1}%)",
            status, stat.name, stat.total_lines, stat.parsed, stat.failed, ratio * 100.0
        );
    }

    let total_lines: usize = stats.iter().map(|s| s.total_lines).sum();
    let total_parsed: usize = stats.iter().map(|s| s.parsed).sum();

    println!("\n--- Summary ---");
    println!("Total lines:  {total_lines}");
    println!("Total parsed: {total_parsed}");
    println!("Worst ratio:  {:.2}%", worst_ratio * 100.0);

    if worst_ratio < min_parse_ratio {
        return Err(format!(
            "parse ratio {:.2}% is below threshold {:.2}%",
            worst_ratio * 100.0,
            min_parse_ratio * 100.0
        ));
    }

    println!("\nAll checks passed");
    Ok(())
}

fn cmd_bench(inputs: &[String], urls_path: &str, iterations: usize) -> Result<(), String> {
    let builder = read_lists(inputs)?;
    let store = builder.build();
    let psl = PslEngine::fallback();

    let corpus_text = fs::read_to_string(urls_path).map_err(|e| format!("Failed to read '{urls_path}': {e}"))?;
    let urls: Vec<&str> = corpus_text.lines().map(str::trim).filter(|l| !l.is_empty()).collect();
    if urls.is_empty() {
        return Err("URL corpus is empty".to_string());
    }

    println!("Matching {} URL(s) x {} iteration(s)", urls.len(), iterations);

    // Warm up the tree's page cache / branch predictor before sampling.
    for url in &urls {
        let mut req = bench_request(url);
        let _ = warden_core::decision::handle_request(&store, &psl, &mut req);
    }

    let mut latencies_us = Vec::with_capacity(urls.len() * iterations);
    let mut blocked = 0usize;
    for _ in 0..iterations {
        for url in &urls {
            let mut req = bench_request(url);
            let start = Instant::now();
            let outcome = warden_core::decision::handle_request(&store, &psl, &mut req);
            latencies_us.push(start.elapsed().as_secs_f64() * 1_000_000.0);
            if matches!(outcome, RequestOutcome::Block(_) | RequestOutcome::Redirect(_)) {
                blocked += 1;
            }
        }
    }

    latencies_us.sort_by(|a, b| a.partial_cmp(b).unwrap_or(Ordering::Equal));
    let total_ops = latencies_us.len();
    let total_ms: f64 = latencies_us.iter().sum::<f64>() / 1000.0;
    let avg_us = latencies_us.iter().sum::<f64>() / total_ops as f64;
    let ops_per_sec = if total_ms > 0.0 { (total_ops as f64 / (total_ms / 1000.0)) as u64 } else { 0 };

    println!("Ops:          {total_ops}");
    println!("Blocked:      {blocked} ({:.1}%)", blocked as f64 / total_ops as f64 * 100.0);
    println!("Total time:   {total_ms:.2}ms");
    println!("Avg latency:  {avg_us:.2}us");
    println!("P50 latency:  {:.2}us", percentile(&latencies_us, 0.50));
    println!("P95 latency:  {:.2}us", percentile(&latencies_us, 0.95));
    println!("P99 latency:  {:.2}us", percentile(&latencies_us, 0.99));
    println!("Throughput:   {ops_per_sec} ops/sec");

    Ok(())
}

fn bench_request(url: &str) -> HttpRequest {
    HttpRequest {
        url: url.to_string(),
        method: "GET".to_string(),
        headers: HeaderMap::new(),
        request_type: RequestType::ALL,
        site_host: None,
    }
}

fn percentile(sorted: &[f64], p: f64) -> f64 {
    if sorted.is_empty() {
        return 0.0;
    }
    let idx = ((sorted.len() as f64 - 1.0) * p).round() as usize;
    sorted[idx.min(sorted.len() - 1)]
}
