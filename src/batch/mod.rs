//! Batch collection
//!
//! A [`BatchRun`] walks an explicit list of lecture ids, one transcript per
//! lecture. Per-item statuses only move forward:
//! `pending → collecting → completed | failed | skipped`, plus
//! `pending → skipped` when the probe finds nothing to collect.

pub mod export;
pub mod orchestrator;
pub mod store;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::fmt;

use crate::error::{EngineError, Result};

pub use export::{export_run, parse_json_export, ExportFormat, JsonExport};
pub use orchestrator::{Messenger, Orchestrator};
pub use store::{FileRunStore, MemoryRunStore, RunStore};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum BatchItemStatus {
    Pending,
    Collecting,
    Completed,
    Failed,
    Skipped,
}

impl BatchItemStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            BatchItemStatus::Completed | BatchItemStatus::Failed | BatchItemStatus::Skipped
        )
    }

    pub fn can_transition_to(&self, next: BatchItemStatus) -> bool {
        use BatchItemStatus::*;
        matches!(
            (self, next),
            (Pending, Collecting) | (Pending, Skipped) | (Collecting, Completed) | (Collecting, Failed) | (Collecting, Skipped)
        )
    }
}

impl fmt::Display for BatchItemStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            BatchItemStatus::Pending => "pending",
            BatchItemStatus::Collecting => "collecting",
            BatchItemStatus::Completed => "completed",
            BatchItemStatus::Failed => "failed",
            BatchItemStatus::Skipped => "skipped",
        };
        write!(f, "{}", name)
    }
}

/// What a lecture produced
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "outcome", content = "text", rename_all = "lowercase")]
pub enum CollectedText {
    Collected(String),
    /// Sentinel recorded in place of a transcript
    Failed(String),
}

impl CollectedText {
    pub fn failed(reason: &str) -> Self {
        CollectedText::Failed(format!("[Extraction failed: {}]", reason))
    }

    pub fn text(&self) -> &str {
        match self {
            CollectedText::Collected(text) | CollectedText::Failed(text) => text,
        }
    }
}

/// Why a run stopped
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum EndReason {
    CompletedAll,
    NavigationTimedOut,
    ExtractorUnreachable,
}

impl fmt::Display for EndReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            EndReason::CompletedAll => "completed-all",
            EndReason::NavigationTimedOut => "navigation-timed-out",
            EndReason::ExtractorUnreachable => "extractor-unreachable",
        };
        write!(f, "{}", name)
    }
}

/// State of one unattended course walk
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchRun {
    pub lecture_ids: Vec<String>,
    pub current_index: usize,
    pub statuses: HashMap<String, BatchItemStatus>,
    pub collected: HashMap<String, CollectedText>,
    #[serde(default)]
    pub titles: HashMap<String, String>,
    /// Whether the page already shows the lecture at `current_index`
    pub arrived: bool,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    pub end_reason: Option<EndReason>,
}

/// Read-only view of one lecture in a run
#[derive(Debug, Clone, Copy)]
pub struct BatchItem<'a> {
    pub lecture_id: &'a str,
    pub title: Option<&'a str>,
    pub status: BatchItemStatus,
    pub collected: Option<&'a CollectedText>,
}

impl BatchRun {
    /// Start a run over `lecture_ids`; the first id is the lecture currently loaded.
    /// Duplicate ids keep their first position.
    pub fn new(lecture_ids: Vec<String>, titles: HashMap<String, String>) -> Result<Self> {
        let mut seen = HashSet::new();
        let lecture_ids: Vec<String> = lecture_ids
            .into_iter()
            .map(|id| id.trim().to_string())
            .filter(|id| !id.is_empty() && seen.insert(id.clone()))
            .collect();

        if lecture_ids.is_empty() {
            return Err(EngineError::EmptyBatch);
        }

        let statuses = lecture_ids
            .iter()
            .map(|id| (id.clone(), BatchItemStatus::Pending))
            .collect();

        Ok(Self {
            lecture_ids,
            current_index: 0,
            statuses,
            collected: HashMap::new(),
            titles,
            arrived: true,
            started_at: Utc::now(),
            finished_at: None,
            end_reason: None,
        })
    }

    pub fn len(&self) -> usize {
        self.lecture_ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lecture_ids.is_empty()
    }

    pub fn status(&self, lecture_id: &str) -> Option<BatchItemStatus> {
        self.statuses.get(lecture_id).copied()
    }

    pub fn current_id(&self) -> Option<&str> {
        if self.is_finished() {
            return None;
        }
        self.lecture_ids.get(self.current_index).map(String::as_str)
    }

    pub fn is_finished(&self) -> bool {
        self.end_reason.is_some()
    }

    /// Move one item to `to`, rejecting anything but a forward step
    pub fn transition(&mut self, lecture_id: &str, to: BatchItemStatus) -> Result<()> {
        let from = self
            .status(lecture_id)
            .ok_or_else(|| EngineError::Protocol(format!("lecture {} is not part of this run", lecture_id)))?;

        if !from.can_transition_to(to) {
            return Err(EngineError::InvalidTransition {
                lecture_id: lecture_id.to_string(),
                from,
                to,
            });
        }

        self.statuses.insert(lecture_id.to_string(), to);
        Ok(())
    }

    pub fn begin(&mut self, lecture_id: &str) -> Result<()> {
        self.transition(lecture_id, BatchItemStatus::Collecting)
    }

    pub fn skip(&mut self, lecture_id: &str) -> Result<()> {
        self.transition(lecture_id, BatchItemStatus::Skipped)
    }

    pub fn record_collected(&mut self, lecture_id: &str, text: String) -> Result<()> {
        self.transition(lecture_id, BatchItemStatus::Completed)?;
        self.collected
            .insert(lecture_id.to_string(), CollectedText::Collected(text));
        Ok(())
    }

    pub fn record_failure(&mut self, lecture_id: &str, reason: &str) -> Result<()> {
        self.transition(lecture_id, BatchItemStatus::Failed)?;
        self.collected
            .insert(lecture_id.to_string(), CollectedText::failed(reason));
        Ok(())
    }

    /// Move past the current lecture, finishing the run after the last one
    pub fn step_forward(&mut self) {
        self.current_index += 1;
        self.arrived = false;
        if self.current_index >= self.lecture_ids.len() {
            self.finish(EndReason::CompletedAll);
        }
    }

    pub fn finish(&mut self, reason: EndReason) {
        if self.end_reason.is_none() {
            self.end_reason = Some(reason);
            self.finished_at = Some(Utc::now());
        }
    }

    pub fn items(&self) -> impl Iterator<Item = BatchItem<'_>> {
        self.lecture_ids.iter().map(move |id| BatchItem {
            lecture_id: id,
            title: self.titles.get(id).map(String::as_str),
            status: self.status(id).unwrap_or(BatchItemStatus::Pending),
            collected: self.collected.get(id),
        })
    }

    pub fn progress(&self) -> BatchProgress {
        let mut progress = BatchProgress {
            current_index: self.current_index,
            total: self.lecture_ids.len(),
            pending: 0,
            collecting: 0,
            completed: 0,
            failed: 0,
            skipped: 0,
            finished: self.is_finished(),
            end_reason: self.end_reason,
        };

        for item in self.items() {
            match item.status {
                BatchItemStatus::Pending => progress.pending += 1,
                BatchItemStatus::Collecting => progress.collecting += 1,
                BatchItemStatus::Completed => progress.completed += 1,
                BatchItemStatus::Failed => progress.failed += 1,
                BatchItemStatus::Skipped => progress.skipped += 1,
            }
        }

        progress
    }
}

/// Counters for a run
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct BatchProgress {
    pub current_index: usize,
    pub total: usize,
    pub pending: usize,
    pub collecting: usize,
    pub completed: usize,
    pub failed: usize,
    pub skipped: usize,
    pub finished: bool,
    pub end_reason: Option<EndReason>,
}

impl BatchProgress {
    pub fn summary(&self) -> String {
        format!(
            "{}/{} done ({} completed, {} failed, {} skipped, {} pending){}",
            self.completed + self.failed + self.skipped,
            self.total,
            self.completed,
            self.failed,
            self.skipped,
            self.pending,
            self.end_reason
                .map(|reason| format!(", ended: {}", reason))
                .unwrap_or_default()
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run(ids: &[&str]) -> BatchRun {
        BatchRun::new(ids.iter().map(|s| s.to_string()).collect(), HashMap::new()).unwrap()
    }

    #[test]
    fn test_new_run_is_all_pending() {
        let run = run(&["a", "b", "a", " ", "c"]);
        assert_eq!(run.lecture_ids, vec!["a", "b", "c"]);
        assert_eq!(run.progress().pending, 3);
        assert_eq!(run.current_id(), Some("a"));
        assert!(run.arrived);
    }

    #[test]
    fn test_empty_run_rejected() {
        assert!(matches!(BatchRun::new(Vec::new(), HashMap::new()), Err(EngineError::EmptyBatch)));
    }

    #[test]
    fn test_transitions_only_move_forward() {
        let mut run = run(&["a", "b"]);

        run.begin("a").unwrap();
        run.record_collected("a", "text".into()).unwrap();
        assert_eq!(run.status("a"), Some(BatchItemStatus::Completed));

        let err = run.begin("a").unwrap_err();
        assert!(matches!(
            err,
            EngineError::InvalidTransition {
                from: BatchItemStatus::Completed,
                to: BatchItemStatus::Collecting,
                ..
            }
        ));

        assert!(run.transition("b", BatchItemStatus::Completed).is_err());
        run.skip("b").unwrap();
        assert!(run.skip("b").is_err());
    }

    #[test]
    fn test_failure_records_sentinel() {
        let mut run = run(&["a"]);
        run.begin("a").unwrap();
        run.record_failure("a", "panel vanished").unwrap();

        assert_eq!(
            run.collected.get("a"),
            Some(&CollectedText::Failed("[Extraction failed: panel vanished]".into()))
        );
    }

    #[test]
    fn test_step_forward_finishes_after_last() {
        let mut run = run(&["a", "b"]);
        run.skip("a").unwrap();
        run.step_forward();
        assert!(!run.arrived);
        assert_eq!(run.current_id(), Some("b"));

        run.skip("b").unwrap();
        run.step_forward();
        assert!(run.is_finished());
        assert_eq!(run.end_reason, Some(EndReason::CompletedAll));
        assert_eq!(run.current_id(), None);

        let progress = run.progress();
        assert_eq!(progress.skipped, 2);
        assert!(progress.summary().contains("ended: completed-all"));
    }

    #[test]
    fn test_run_state_serializes() {
        let mut run = run(&["a"]);
        run.begin("a").unwrap();
        let json = serde_json::to_string(&run).unwrap();
        let back: BatchRun = serde_json::from_str(&json).unwrap();
        assert_eq!(back.status("a"), Some(BatchItemStatus::Collecting));
    }
}
