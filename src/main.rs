//! har-replay CLI

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::process;

use anyhow::Context;

use har_replay::config::Config;
use har_replay::har::Har;
use har_replay::network::ReplayServer;
use har_replay::policy::ReplayPolicy;
use har_replay::replay::ReplayEngine;

fn main() {
    let args: Vec<String> = std::env::args().collect();

    if args.len() < 3 {
        eprintln!("har-replay v{}", env!("CARGO_PKG_VERSION"));
        eprintln!();
        eprintln!("Usage: har-replay <command> [options]");
        eprintln!();
        eprintln!("Commands:");
        eprintln!("  serve <config.toml>    Serve archived responses locally");
        eprintln!("  stats <archive.har>    Show archive statistics");
        process::exit(1);
    }

    let command = &args[1];
    let path = PathBuf::from(&args[2]);

    let result = match command.as_str() {
        "serve" => serve(&path),
        "stats" => stats(&path),
        _ => {
            eprintln!("Unknown command: {command}");
            eprintln!("Run 'har-replay' for usage information.");
            process::exit(1);
        }
    };

    if let Err(e) = result {
        eprintln!("Error: {e:#}");
        process::exit(1);
    }
}

/// Index the configured archives and serve them until interrupted
fn serve(config_path: &Path) -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let config = Config::from_file(config_path)
        .with_context(|| format!("loading config {}", config_path.display()))?;

    let engine = ReplayEngine::new(ReplayPolicy::method_and_url());
    for archive in &config.archives {
        engine
            .load_archive(archive)
            .with_context(|| format!("indexing archive {}", archive.display()))?;
    }

    let runtime = tokio::runtime::Runtime::new()?;
    runtime.block_on(async {
        let server = ReplayServer::bind(engine, config.port, config.limits.clone()).await?;
        server.run().await
    })?;

    Ok(())
}

/// Print an entry/status breakdown for one archive
fn stats(archive_path: &Path) -> anyhow::Result<()> {
    let har = Har::from_file(archive_path)
        .with_context(|| format!("parsing archive {}", archive_path.display()))?;

    let mut by_status: BTreeMap<u16, usize> = BTreeMap::new();
    for entry in &har.log.entries {
        *by_status.entry(entry.response.status).or_default() += 1;
    }

    println!("Archive: {}", archive_path.display());
    println!("Entries: {}", har.log.entries.len());
    println!();
    for (status, count) in by_status {
        println!("  {status}: {count}");
    }

    Ok(())
}
