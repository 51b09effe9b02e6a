/// Consolidated export of a batch run
///
/// Only lectures that produced something (completed text or a failure sentinel)
/// are exported; skipped and pending lectures are left out.
use chrono::{DateTime, Utc};
use clap::ValueEnum;
use serde::{Deserialize, Serialize};

use super::{BatchItem, BatchItemStatus, BatchRun, EndReason};
use crate::error::Result;
use crate::transcript::split_bracketed_timestamp;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum ExportFormat {
    Plain,
    Markdown,
    Json,
}

impl ExportFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            ExportFormat::Plain => "txt",
            ExportFormat::Markdown => "md",
            ExportFormat::Json => "json",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ExportedLecture {
    pub id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    pub status: BatchItemStatus,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ExportMetadata {
    pub generated_at: DateTime<Utc>,
    pub item_count: usize,
    pub completed: usize,
    pub failed: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub end_reason: Option<EndReason>,
    pub lectures: Vec<ExportedLecture>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ExportEntry {
    pub lecture_id: String,
    pub timestamp: Option<f64>,
    pub text: String,
}

/// JSON export document
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct JsonExport {
    pub metadata: ExportMetadata,
    pub entries: Vec<ExportEntry>,
}

impl JsonExport {
    /// Distinct lecture ids in export order
    pub fn lecture_ids(&self) -> Vec<String> {
        self.metadata.lectures.iter().map(|l| l.id.clone()).collect()
    }

    pub fn entries_for<'a>(&'a self, lecture_id: &'a str) -> impl Iterator<Item = &'a ExportEntry> + 'a {
        self.entries.iter().filter(move |e| e.lecture_id == lecture_id)
    }
}

fn exported_items(run: &BatchRun) -> Vec<BatchItem<'_>> {
    run.items()
        .filter(|item| item.collected.is_some())
        .filter(|item| !matches!(item.status, BatchItemStatus::Skipped | BatchItemStatus::Pending))
        .collect()
}

fn heading(item: &BatchItem) -> String {
    match item.title {
        Some(title) => format!("{} ({})", title, item.lecture_id),
        None => format!("Lecture {}", item.lecture_id),
    }
}

/// Render the run in `format`, stamped with `generated_at`
pub fn export_run(run: &BatchRun, format: ExportFormat, generated_at: DateTime<Utc>) -> Result<String> {
    let items = exported_items(run);

    let output = match format {
        ExportFormat::Plain => {
            let mut blocks = vec![format!(
                "Course transcripts\nGenerated: {}\nLectures: {}",
                generated_at.format("%Y-%m-%d %H:%M:%S UTC"),
                items.len()
            )];
            for item in &items {
                let text = item.collected.map(|c| c.text()).unwrap_or_default();
                let body = text
                    .lines()
                    .filter(|line| !line.trim().is_empty())
                    .collect::<Vec<_>>()
                    .join("\n\n");
                blocks.push(format!("=== {} ===\n{}", heading(item), body));
            }
            blocks.join("\n\n") + "\n"
        }
        ExportFormat::Markdown => {
            let mut out = format!(
                "# Course Transcripts\n\n_Generated {} | {} lectures_\n",
                generated_at.format("%Y-%m-%d %H:%M UTC"),
                items.len()
            );
            for item in &items {
                out.push_str(&format!("\n## {}\n\n", heading(item)));
                for line in item.collected.map(|c| c.text()).unwrap_or_default().lines() {
                    if !line.trim().is_empty() {
                        out.push_str(&format!("- {}\n", line.trim()));
                    }
                }
            }
            out
        }
        ExportFormat::Json => serde_json::to_string_pretty(&build_json_export(run, generated_at))?,
    };

    Ok(output)
}

pub fn build_json_export(run: &BatchRun, generated_at: DateTime<Utc>) -> JsonExport {
    let items = exported_items(run);
    let mut entries = Vec::new();

    for item in &items {
        let text = item.collected.map(|c| c.text()).unwrap_or_default();
        for line in text.lines() {
            let (timestamp, rest) = split_bracketed_timestamp(line);
            let rest = rest.trim();
            if rest.is_empty() {
                continue;
            }
            entries.push(ExportEntry {
                lecture_id: item.lecture_id.to_string(),
                timestamp,
                text: rest.to_string(),
            });
        }
    }

    let progress = run.progress();
    JsonExport {
        metadata: ExportMetadata {
            generated_at,
            item_count: items.len(),
            completed: progress.completed,
            failed: progress.failed,
            end_reason: run.end_reason,
            lectures: items
                .iter()
                .map(|item| ExportedLecture {
                    id: item.lecture_id.to_string(),
                    title: item.title.map(str::to_string),
                    status: item.status,
                })
                .collect(),
        },
        entries,
    }
}

/// Read a JSON export back
pub fn parse_json_export(json: &str) -> Result<JsonExport> {
    Ok(serde_json::from_str(json)?)
}
