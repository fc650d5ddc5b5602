use std::path::PathBuf;
use std::process::ExitCode;
use std::time::{Duration, Instant};

use clap::Parser;
use serde::Serialize;
use sql_cluster::prelude::*;
use tracing::Level;

#[derive(Parser, Debug)]
#[command(author, version, about = "Ping every host of a sql-cluster configuration")]
struct Args {
    /// INI file with `[master]` and `[slave]` sections
    config: PathBuf,
    /// Override the per-call timeout of every host
    #[arg(long, value_parser = humantime::parse_duration)]
    timeout: Option<Duration>,
    /// Print the report as JSON
    #[arg(long)]
    json: bool,
    #[arg(long)]
    verbose: bool,
}

#[derive(Debug, Serialize)]
struct HostReport {
    host: String,
    role: &'static str,
    ok: bool,
    elapsed_ms: u128,
    error: Option<String>,
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();

    tracing_subscriber::fmt()
        .with_target(false)
        .with_max_level(if args.verbose { Level::DEBUG } else { Level::WARN })
        .init();

    match run(&args).await {
        Ok(reports) => {
            print_reports(&reports, args.json);
            if reports.iter().all(|r| r.ok) {
                ExitCode::SUCCESS
            } else {
                ExitCode::FAILURE
            }
        }
        Err(err) => {
            eprintln!("error: {err}");
            ExitCode::from(2)
        }
    }
}

async fn run(args: &Args) -> Result<Vec<HostReport>, SqlClusterError> {
    let mut config = ClusterConfig::from_file(&args.config)?;
    if let Some(timeout) = args.timeout {
        config.master.timeout = None;
        config.slave.timeout = None;
        config = config.with_timeout(timeout);
    }

    let client = Client::new();
    client.init(config).await?;
    let masters = client.masters()?;

    let mut reports = Vec::new();
    for host in client.hosts()? {
        let started = Instant::now();
        let outcome = host.ping().await;
        reports.push(HostReport {
            role: if masters.iter().any(|m| m == host.host()) { "master" } else { "replica" },
            host: host.host().to_string(),
            ok: outcome.is_ok(),
            elapsed_ms: started.elapsed().as_millis(),
            error: outcome.err().map(|e| e.to_string()),
        });
    }

    client.close().await?;
    Ok(reports)
}

fn print_reports(reports: &[HostReport], json: bool) {
    if json {
        let text = serde_json::to_string_pretty(reports).unwrap_or_else(|_| "[]".to_string());
        println!("{text}");
        return;
    }
    for r in reports {
        match &r.error {
            None => println!("ok    {:<8} {} ({} ms)", r.role, r.host, r.elapsed_ms),
            Some(err) => println!("FAIL  {:<8} {} ({} ms): {err}", r.role, r.host, r.elapsed_ms),
        }
    }
}
