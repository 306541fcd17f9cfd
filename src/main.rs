mod calendar;
mod error;
mod fetch;
mod launch;
mod parser;
mod pipeline;
mod settings;
mod store;

use std::io::IsTerminal;
use std::path::PathBuf;
use std::time::Instant;

use anyhow::Context;
use chrono::Utc;
use clap::{Parser, Subcommand};

use calendar::{GoogleAuthorizer, ReconcileError};
use fetch::{DocumentSource, FileSource, HttpSource};
use launch::LaunchSet;
use pipeline::{Pipeline, RunError, StageFailure};
use settings::Settings;

#[derive(Parser)]
#[command(name = "launch_sync", about = "Mirror the r/SpaceX launch manifest into a Google Calendar")]
struct Cli {
    /// Config file (default: ./launch_sync.toml if present)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Fetch the manifest, save it, and replace all future calendar events with it
    Run {
        /// Fail instead of prompting when no OAuth token is stored
        #[arg(long)]
        non_interactive: bool,
    },
    /// Fetch and parse the manifest without touching the store or calendar
    Parse {
        /// Parse a saved copy of the page instead of fetching it
        #[arg(short, long)]
        file: Option<PathBuf>,
    },
    /// Show the launches saved by the last run
    Show,
    /// Grant calendar access and store the OAuth token
    Authorize,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let t0 = Instant::now();
    let cli = Cli::parse();
    let settings = Settings::load(cli.config.as_deref())?;

    let result = match cli.command {
        Commands::Run { non_interactive } => {
            let source = HttpSource::new(&settings.manifest_url, &settings.user_agent)?;
            let store = store::open(&settings.store);
            let interactive = !non_interactive && std::io::stdin().is_terminal();
            let authorizer =
                GoogleAuthorizer::new(&settings.auth, &settings.calendar.api_base, interactive);

            let pipeline = Pipeline {
                settings: &settings,
                source: &source,
                store: store.as_ref(),
                authorizer: &authorizer,
            };
            match pipeline.run(Utc::now()).await {
                Ok(summary) => {
                    println!(
                        "Synced {} launches ({} rows skipped): {} events removed, {} added.",
                        summary.launches.len(),
                        summary.skipped,
                        summary.sync.deleted,
                        summary.sync.inserted,
                    );
                    for w in &summary.warnings {
                        println!("  warning: {}", w);
                    }
                    Ok(())
                }
                Err(RunError::Stages(failures)) => {
                    for f in &failures {
                        eprintln!("  - {}", f);
                        if let StageFailure::Reconcile(ReconcileError::Partial(report)) = f {
                            for op in &report.failures {
                                eprintln!("      {:?} {}: {}", op.op, op.target, op.error);
                            }
                        }
                    }
                    Err(anyhow::anyhow!("{} stage(s) failed", failures.len()))
                }
                Err(e) => Err(e.into()),
            }
        }
        Commands::Parse { file } => {
            let html = match file {
                Some(path) => FileSource::new(path).fetch().await?,
                None => {
                    HttpSource::new(&settings.manifest_url, &settings.user_agent)?
                        .fetch()
                        .await?
                }
            };
            let extraction =
                parser::extract_launches(&html, &settings.anchor_id, &settings.columns)?;
            print_launches(&extraction.launches);
            for (row, reason) in &extraction.skipped {
                println!("  skipped row {}: {}", row, reason);
            }
            Ok(())
        }
        Commands::Show => {
            let launches = store::open(&settings.store)
                .load()
                .await
                .with_context(|| format!("Failed to load {}", settings.store.path.display()))?;
            if launches.is_empty() {
                println!("No launches stored. Run 'run' first.");
                return Ok(());
            }
            print_launches(&launches);
            Ok(())
        }
        Commands::Authorize => {
            let authorizer = GoogleAuthorizer::new(&settings.auth, &settings.calendar.api_base, true);
            authorizer.authorize_interactively().await?;
            println!("Token stored to {}", settings.auth.token_path.display());
            Ok(())
        }
    };

    let elapsed = t0.elapsed();
    if elapsed.as_secs() >= 1 {
        println!("\nDone in {}", format_duration(elapsed));
    }

    result
}

fn print_launches(launches: &LaunchSet) {
    println!(
        "{:>3} | {:<20} | {:<16} | {:<32} | {:<20}",
        "#", "Date", "Vehicle", "Payload", "Customer"
    );
    println!("{}", "-".repeat(103));

    for (i, r) in launches.iter().enumerate() {
        println!(
            "{:>3} | {:<20} | {:<16} | {:<32} | {:<20}",
            i + 1,
            r.date.to_string(),
            truncate(&r.vehicle, 16),
            truncate(&r.payload, 32),
            truncate(&r.customer, 20),
        );
    }

    let all_day = launches.iter().filter(|r| r.all_day()).count();
    println!("\n{} launches ({} all-day)", launches.len(), all_day);
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let truncated: String = s.chars().take(max).collect();
        format!("{}...", truncated)
    }
}

fn format_duration(d: std::time::Duration) -> String {
    let secs = d.as_secs();
    if secs < 60 {
        format!("{:.1}s", d.as_secs_f64())
    } else if secs < 3600 {
        format!("{}m {}s", secs / 60, secs % 60)
    } else {
        format!("{}h {}m {}s", secs / 3600, (secs % 3600) / 60, secs % 60)
    }
}
