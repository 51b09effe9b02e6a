use anyhow::{anyhow, Context, Result};
use clap::{Args, Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, error, info, warn};

use coursescribe::batch::{ExportFormat, FileRunStore, MemoryRunStore, RunStore};
use coursescribe::page::{load_replay_course, HttpPage, Page};
use coursescribe::{Config, Coordinator, TimestampStyle};

#[derive(Parser)]
#[command(name = "coursescribe")]
#[command(version, author = "TigreRoll")]
#[command(about = "Transcript extraction and batch collection for e-learning lecture pages")]
struct Cli {
    #[command(flatten)]
    source: Source,

    /// Configuration file (defaults to coursescribe.toml, then environment)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Args)]
#[group(required = true, multiple = false)]
struct Source {
    /// Live lecture page URL
    #[arg(long)]
    url: Option<String>,

    /// Directory of saved lecture pages to replay offline
    #[arg(long, value_name = "DIR")]
    replay: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Report platform and transcript availability for the page
    Probe,
    /// Extract the transcript of the current lecture
    Extract {
        /// Drop the [MM:SS] prefixes
        #[arg(long)]
        strip_timestamps: bool,

        /// Write to a file instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Print the course outline
    Outline,
    /// Walk the course and collect one transcript per lecture
    Batch {
        /// Lecture ids to collect, starting with the current page (defaults to the outline from here on)
        #[arg(long, value_delimiter = ',')]
        ids: Vec<String>,

        /// Continue the run saved in the state file
        #[arg(long)]
        resume: bool,

        /// Export format
        #[arg(short, long, value_enum, default_value = "plain")]
        format: ExportFormat,

        /// Export file (defaults to <output dir>/transcripts.<ext>)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => Config::from_file(path).with_context(|| format!("reading {}", path.display()))?,
        None => Config::load().unwrap_or_else(|e| {
            eprintln!("Failed to load config, using defaults: {}", e);
            Config::default()
        }),
    };

    let filter = if cli.verbose {
        "coursescribe=debug,info".to_string()
    } else {
        std::env::var("RUST_LOG").unwrap_or_else(|_| format!("coursescribe={},warn", config.output.log_level))
    };
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::new(filter))
        .with_writer(std::io::stderr)
        .init();

    config.validate()?;
    debug!("{}", config.summary());

    let page: Arc<dyn Page> = match (&cli.source.url, &cli.source.replay) {
        (Some(url), _) => {
            info!("🌐 Opening {}", url);
            Arc::new(HttpPage::open(url, &config.http).await?)
        }
        (None, Some(dir)) => {
            // Saved pages react instantly; keep waits short
            config.activation.settle_ms = config.activation.settle_ms.min(50);
            config.protocol.install_settle_ms = config.protocol.install_settle_ms.min(50);
            Arc::new(load_replay_course(dir).await?)
        }
        (None, None) => return Err(anyhow!("either --url or --replay is required")),
    };

    let store: Arc<dyn RunStore> = match &config.batch.state_file {
        Some(path) => Arc::new(FileRunStore::new(path.clone())),
        None => Arc::new(MemoryRunStore::default()),
    };

    let coordinator = Coordinator::new(page, config.clone(), store);

    match cli.command {
        Commands::Probe => {
            let availability = coordinator.probe().await?;
            println!("{}", serde_json::to_string_pretty(&availability)?);
        }
        Commands::Extract {
            strip_timestamps,
            output,
        } => {
            let transcript = coordinator.extract_current().await?;
            let style = if strip_timestamps {
                TimestampStyle::Stripped
            } else {
                TimestampStyle::Bracketed
            };
            info!(
                "📝 {} entries, {} words via {} strategy",
                transcript.len(),
                transcript.word_count(),
                transcript.strategy
            );
            write_output(output.as_deref(), &transcript.to_text(style)).await?;
        }
        Commands::Outline => {
            let outline = coordinator.outline().await?;
            if outline.lecture_count() == 0 {
                warn!("⚠️ No course outline found on this page");
            }
            for section in &outline.sections {
                println!("{}", section.title);
                for lecture in &section.lectures {
                    let marker = if lecture.is_current { "*" } else { " " };
                    println!("  {} {:<12} {} {}", marker, lecture.id, lecture.title, lecture.duration_label);
                }
            }
        }
        Commands::Batch {
            ids,
            resume,
            format,
            output,
        } => {
            let resumed = resume && coordinator.resume_batch().await?.is_some();
            if resume && !resumed {
                warn!("⚠️ No unfinished run to resume; starting a new one");
            }
            if !resumed {
                let progress = if ids.is_empty() {
                    coordinator.start_batch_from_outline().await?
                } else {
                    coordinator.start_batch(ids).await?
                };
                info!("📋 Batch over {} lectures", progress.total);
            }

            let start_time = std::time::Instant::now();
            let outcome = coordinator.run_batch().await;

            // Partial results are exported even when the run was cut short
            let export = coordinator.export_batch(format).await?;
            let path = output
                .unwrap_or_else(|| config.output.base_dir.join(format!("transcripts.{}", format.extension())));
            write_output(Some(&path), &export).await?;

            match outcome {
                Ok(progress) => {
                    info!("🎉 Batch completed in {:.2}s", start_time.elapsed().as_secs_f64());
                    info!("📊 {}", progress.summary());
                }
                Err(e) => {
                    error!("Batch ended early: {}", e);
                    return Err(e.into());
                }
            }
        }
    }

    Ok(())
}

async fn write_output(path: Option<&Path>, content: &str) -> Result<()> {
    match path {
        Some(path) => {
            if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                tokio::fs::create_dir_all(parent).await?;
            }
            tokio::fs::write(path, content).await?;
            info!("💾 Wrote {}", path.display());
        }
        None => println!("{}", content),
    }
    Ok(())
}
