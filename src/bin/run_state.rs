use anyhow::Result;
use chrono::Utc;
use clap::{Parser, Subcommand};
use coursescribe::batch::{export_run, ExportFormat, FileRunStore, RunStore};
use std::path::PathBuf;
use tracing::{info, warn};

#[derive(Parser)]
#[command(name = "run-state")]
#[command(about = "Inspect or clear a persisted batch run")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    #[arg(long, default_value = ".coursescribe_state/run.json")]
    state_file: PathBuf,
}

#[derive(Subcommand)]
enum Commands {
    /// Show progress and per-lecture status
    Show,
    /// Export whatever the run has collected so far
    Export {
        #[arg(short, long, value_enum, default_value = "plain")]
        format: ExportFormat,

        /// Output file (stdout when omitted)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Delete the persisted run
    Clear,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter("info")
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let store = FileRunStore::new(cli.state_file);

    match cli.command {
        Commands::Show => {
            let Some(run) = store.load().await? else {
                info!("📭 No run state at {}", store.path().display());
                return Ok(());
            };

            let progress = run.progress();
            info!("📊 {}", progress.summary());
            info!("  Started: {}", run.started_at.format("%Y-%m-%d %H:%M:%S UTC"));
            if let Some(finished) = run.finished_at {
                info!("  Finished: {}", finished.format("%Y-%m-%d %H:%M:%S UTC"));
            }

            for item in run.items() {
                let marker = if run.current_id() == Some(item.lecture_id) { "▶" } else { " " };
                info!(
                    "  {} {:<12} {:<10} {}",
                    marker,
                    item.lecture_id,
                    item.status.to_string(),
                    item.title.unwrap_or("")
                );
            }
        }

        Commands::Export { format, output } => {
            let Some(run) = store.load().await? else {
                warn!("⚠️ No run state at {}", store.path().display());
                return Ok(());
            };

            let content = export_run(&run, format, Utc::now())?;
            match output {
                Some(path) => {
                    tokio::fs::write(&path, content).await?;
                    info!("💾 Exported run to {}", path.display());
                }
                None => println!("{}", content),
            }
        }

        Commands::Clear => {
            store.clear().await?;
            info!("✅ Run state cleared");
        }
    }

    Ok(())
}
