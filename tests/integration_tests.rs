//! End-to-end runs of the engine against scripted and replayed courses

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use coursescribe::batch::{parse_json_export, EndReason};
use coursescribe::page::{load_replay_course, Effect, MemoryDocument, PageAction};
use coursescribe::{
    BatchItemStatus, BatchRun, ConfigBuilder, Coordinator, EngineApi, EngineError, ErrorCode, ExportFormat,
    FileRunStore, MemoryPage, MemoryRunStore, Platform, RunStore,
};
use tempfile::TempDir;

const NEXT: &str = "[data-purpose='go-to-next']";
const TOGGLE: &str = "button[data-purpose='transcript-toggle']";

fn lecture_url(id: u32) -> String {
    format!("https://www.udemy.com/course/rust-basics/learn/lecture/{}", id)
}

fn panel(lines: &[&str]) -> String {
    let cues: String = lines
        .iter()
        .map(|line| format!(r#"<div data-purpose="transcript-cue">{}</div>"#, line))
        .collect();
    format!(r#"<div data-purpose="transcript-panel">{}</div>"#, cues)
}

fn with_next(body: &str) -> String {
    format!(
        r#"<div data-purpose="video-player"><video></video></div>{}<button data-purpose="go-to-next">Next</button>"#,
        body
    )
}

/// Lecture whose transcript only renders after the toggle is clicked
fn closed_lecture(id: u32, lines: &[&str]) -> MemoryDocument {
    let closed = with_next(r#"<button data-purpose="transcript-toggle">Transcript</button>"#);
    MemoryDocument::new(&lecture_url(id), closed)
        .unwrap()
        .on_click(TOGGLE, Effect::ReplaceHtmlAfter(with_next(&panel(lines)), Duration::from_millis(10)))
        .on_click(NEXT, Effect::NavigateNext)
}

fn open_lecture(id: u32, body: &str) -> MemoryDocument {
    MemoryDocument::new(&lecture_url(id), with_next(body))
        .unwrap()
        .on_click(NEXT, Effect::NavigateNext)
}

fn ids(list: &[u32]) -> Vec<String> {
    list.iter().map(u32::to_string).collect()
}

fn coordinator(page: Arc<MemoryPage>) -> (Coordinator, MemoryRunStore) {
    let store = MemoryRunStore::default();
    let config = ConfigBuilder::new().fast().build();
    (Coordinator::new(page, config, Arc::new(store.clone())), store)
}

#[tokio::test]
async fn test_full_course_batch() {
    let page = Arc::new(MemoryPage::course(vec![
        closed_lecture(101, &["[00:10] Hello world", "[00:05] Intro", "[]"]),
        open_lecture(102, "<p>Quiz: no video here</p>"),
        open_lecture(103, &panel(&["0:03 Traits let types share behaviour"])),
    ]));
    let (coordinator, store) = coordinator(page.clone());

    coordinator.start_batch(ids(&[101, 102, 103])).await.unwrap();
    let progress = coordinator.run_batch().await.unwrap();

    assert!(progress.finished);
    assert_eq!(progress.end_reason, Some(EndReason::CompletedAll));
    assert_eq!(progress.completed, 2);
    assert_eq!(progress.skipped, 1);
    assert_eq!(page.position(), 2);

    let run = store.load().await.unwrap().unwrap();
    assert_eq!(run.status("102"), Some(BatchItemStatus::Skipped));
    assert_eq!(
        run.collected.get("101").map(|c| c.text()),
        Some("[00:05] Intro\n[00:10] Hello world")
    );

    let plain = coordinator.export_batch(ExportFormat::Plain).await.unwrap();
    assert!(plain.contains("Lectures: 2"));
    assert!(plain.contains("[00:03] Traits let types share behaviour"));
    assert!(!plain.contains("Quiz"));
}

#[tokio::test]
async fn test_activation_is_idempotent() {
    let page = Arc::new(MemoryPage::new(closed_lecture(7, &["0:01 Borrowing rules explained"])));
    let (coordinator, _) = coordinator(page.clone());

    let first = coordinator.extract_current().await.unwrap();
    let second = coordinator.extract_current().await.unwrap();

    assert_eq!(first.entries, second.entries);
    assert_eq!(first.platform, Platform::Udemy);
    // The toggle is only clicked the first time; the open panel is reused after that
    assert_eq!(page.click_count(), 1);
}

#[tokio::test]
async fn test_unsupported_page_probe_leaves_page_untouched() {
    let doc = MemoryDocument::new("https://example.com/blog/post", "<button>Transcript</button>").unwrap();
    let page = Arc::new(MemoryPage::new(doc));
    let api = EngineApi::new(page.clone(), ConfigBuilder::new().fast().build(), Arc::new(MemoryRunStore::default()));

    let response = api.probe_availability().await;
    let availability = response.data.unwrap();

    assert_eq!(availability.platform, Platform::Unknown);
    assert!(!availability.is_supported_page);
    assert!(!availability.has_transcript);
    assert!(page.is_untouched());
}

#[tokio::test]
async fn test_probe_does_not_activate() {
    let page = Arc::new(MemoryPage::new(closed_lecture(8, &["0:01 Lifetimes in practice"])));
    let (coordinator, _) = coordinator(page.clone());

    let availability = coordinator.probe().await.unwrap();

    assert!(availability.has_transcript);
    assert!(availability.is_supported_page);
    assert!(page.actions().iter().all(|a| !matches!(a, PageAction::Click(..))));
}

#[tokio::test]
async fn test_json_export_round_trip() {
    let page = Arc::new(MemoryPage::course(vec![
        open_lecture(201, &panel(&["0:01 Pattern matching basics", "0:09 Match guards"])),
        open_lecture(202, &panel(&["0:02 Enums carry data"])),
    ]));
    let (coordinator, _) = coordinator(page);

    coordinator.start_batch(ids(&[201, 202])).await.unwrap();
    coordinator.run_batch().await.unwrap();

    let json = coordinator.export_batch(ExportFormat::Json).await.unwrap();
    let export = parse_json_export(&json).unwrap();

    assert_eq!(export.lecture_ids(), vec!["201", "202"]);
    let first: Vec<(Option<f64>, String)> = export
        .entries_for("201")
        .map(|e| (e.timestamp, e.text.clone()))
        .collect();
    assert_eq!(
        first,
        vec![
            (Some(1.0), "Pattern matching basics".to_string()),
            (Some(9.0), "Match guards".to_string())
        ]
    );
    assert_eq!(export.metadata.end_reason, Some(EndReason::CompletedAll));
}

#[tokio::test]
async fn test_navigation_timeout_keeps_partial_results() {
    // Lecture 302's next control does nothing, so the walk stalls there
    let stuck = MemoryDocument::new(&lecture_url(302), with_next(&panel(&["0:01 Second lecture content"]))).unwrap();
    let page = Arc::new(MemoryPage::course(vec![
        open_lecture(301, &panel(&["0:01 First lecture content"])),
        stuck,
        open_lecture(303, &panel(&["0:01 Never reached"])),
    ]));
    let (coordinator, store) = coordinator(page.clone());

    coordinator.start_batch(ids(&[301, 302, 303])).await.unwrap();
    let progress = coordinator.run_batch().await.unwrap();

    assert_eq!(progress.end_reason, Some(EndReason::NavigationTimedOut));
    assert_eq!(progress.completed, 2);
    assert_eq!(progress.pending, 1);

    let run = store.load().await.unwrap().unwrap();
    assert_eq!(run.status("303"), Some(BatchItemStatus::Pending));
    assert_eq!(page.position(), 1);

    let plain = coordinator.export_batch(ExportFormat::Plain).await.unwrap();
    assert!(plain.contains("Second lecture content"));
    assert!(!plain.contains("Never reached"));
}

#[tokio::test]
async fn test_lecture_outside_the_run_is_passed_over() {
    let page = Arc::new(MemoryPage::course(vec![
        open_lecture(701, &panel(&["0:01 Opening remarks for the unit"])),
        open_lecture(702, &panel(&["0:01 Optional detour material"])),
        open_lecture(703, &panel(&["0:01 Closing summary of the unit"])),
    ]));
    let (coordinator, store) = coordinator(page.clone());

    coordinator.start_batch(ids(&[701, 703])).await.unwrap();
    let progress = coordinator.run_batch().await.unwrap();

    assert_eq!(progress.completed, 2);
    assert_eq!(page.position(), 2);
    let run = store.load().await.unwrap().unwrap();
    assert_eq!(
        run.collected.get("703").map(|c| c.text()),
        Some("[00:01] Closing summary of the unit")
    );
    assert!(!coordinator.export_batch(ExportFormat::Plain).await.unwrap().contains("detour"));
}

#[tokio::test]
async fn test_overlapping_extraction_is_rejected() {
    let doc = MemoryDocument::new(&lecture_url(9), with_next(&panel(&["0:01 Slow page content"]))).unwrap();
    let page = Arc::new(MemoryPage::new(doc).with_latency(Duration::from_millis(15)));
    let (coordinator, _) = coordinator(page);

    // Install the extractor first so both calls race on the same one
    coordinator.probe().await.unwrap();

    let (first, second) = tokio::join!(coordinator.extract_current(), async {
        tokio::time::sleep(Duration::from_millis(5)).await;
        coordinator.extract_current().await
    });

    assert!(first.is_ok());
    assert!(matches!(second, Err(EngineError::AlreadyProcessing)));
}

#[tokio::test]
async fn test_api_reports_error_codes() {
    let page = Arc::new(MemoryPage::new(open_lecture(10, "<p>Slides only</p>")));
    let api = EngineApi::new(page, ConfigBuilder::new().fast().build(), Arc::new(MemoryRunStore::default()));

    let response = api.extract_current_transcript().await;
    assert!(!response.success);
    assert_eq!(response.code, Some(ErrorCode::NoTranscriptContent));

    let response = api.export_batch(ExportFormat::Plain).await;
    assert!(!response.success);
}

#[tokio::test]
async fn test_resume_from_file_store() {
    let dir = TempDir::new().unwrap();
    let state = dir.path().join("run.json");

    // A previous session finished the first lecture and was on its way to the second
    let mut run = BatchRun::new(ids(&[401, 402]), HashMap::new()).unwrap();
    run.begin("401").unwrap();
    run.record_collected("401", "[00:01] Collected earlier".into()).unwrap();
    run.step_forward();
    FileRunStore::new(&state).save(&run).await.unwrap();

    // The browser already sits on the second lecture
    let page = Arc::new(MemoryPage::course(vec![
        open_lecture(402, &panel(&["0:04 Resumed lecture content"])),
    ]));
    let config = ConfigBuilder::new().fast().with_state_file(state.clone()).build();
    let coordinator = Coordinator::new(page.clone(), config, Arc::new(FileRunStore::new(&state)));

    // Not marked as arrived, but the page already shows 402 so nothing is clicked
    coordinator.resume_batch().await.unwrap().unwrap();
    let progress = coordinator.run_batch().await.unwrap();
    assert_eq!(progress.completed, 2);
    assert_eq!(progress.end_reason, Some(EndReason::CompletedAll));
    assert_eq!(page.click_count(), 0);

    let saved = FileRunStore::new(&state).load().await.unwrap().unwrap();
    assert_eq!(saved.status("401"), Some(BatchItemStatus::Completed));
    assert_eq!(saved.status("402"), Some(BatchItemStatus::Completed));
    assert_eq!(
        saved.collected.get("402").map(|c| c.text()),
        Some("[00:04] Resumed lecture content")
    );
}

#[tokio::test]
async fn test_long_transcript_is_truncated_with_marker() {
    let page = Arc::new(MemoryPage::new(open_lecture(
        601,
        &panel(&[
            "0:01 Ownership moves values between bindings",
            "0:05 Borrowing lends access without moving",
        ]),
    )));
    let store = MemoryRunStore::default();
    let config = ConfigBuilder::new().fast().with_max_transcript_chars(30).build();
    let coordinator = Coordinator::new(page, config, Arc::new(store.clone()));

    coordinator.start_batch(ids(&[601])).await.unwrap();
    let progress = coordinator.run_batch().await.unwrap();
    assert_eq!(progress.completed, 1);

    let run = store.load().await.unwrap().unwrap();
    assert_eq!(run.status("601"), Some(BatchItemStatus::Completed));
    assert_eq!(
        run.collected.get("601").map(|c| c.text()),
        Some("[00:01] Ownership moves values\n[Transcript truncated at 30 characters]")
    );

    let json = coordinator.export_batch(ExportFormat::Json).await.unwrap();
    let export = parse_json_export(&json).unwrap();
    let entries: Vec<(Option<f64>, String)> = export
        .entries_for("601")
        .map(|e| (e.timestamp, e.text.clone()))
        .collect();
    assert_eq!(
        entries,
        vec![
            (Some(1.0), "Ownership moves values".to_string()),
            (None, "[Transcript truncated at 30 characters]".to_string())
        ]
    );
}

#[tokio::test]
async fn test_replay_directory_batch() {
    let dir = TempDir::new().unwrap();
    let pages = [
        (
            "01.html",
            format!(
                r#"<html><head><link rel="canonical" href="{}"></head><body>
                   <div data-purpose="video-player"><video><track kind="captions" src="01.vtt"></video></div>
                   <button data-purpose="go-to-next">Next</button></body></html>"#,
                lecture_url(501)
            ),
        ),
        (
            "02.html",
            format!(
                r#"<html><head><link rel="canonical" href="{}"></head><body>{}</body></html>"#,
                lecture_url(502),
                panel(&["0:07 Saved panel line"])
            ),
        ),
    ];
    for (name, html) in &pages {
        tokio::fs::write(dir.path().join(name), html).await.unwrap();
    }
    tokio::fs::write(
        dir.path().join("01.vtt"),
        "WEBVTT\n\n00:02.000 --> 00:04.000\nCaptions from a file\n",
    )
    .await
    .unwrap();

    let page = Arc::new(load_replay_course(dir.path()).await.unwrap());
    let (coordinator, _) = coordinator(page);

    let started = coordinator.start_batch(ids(&[501, 502])).await.unwrap();
    assert_eq!(started.total, 2);

    let progress = coordinator.run_batch().await.unwrap();
    assert_eq!(progress.completed, 2);

    let markdown = coordinator.export_batch(ExportFormat::Markdown).await.unwrap();
    assert!(markdown.contains("- [00:02] Captions from a file"));
    assert!(markdown.contains("- [00:07] Saved panel line"));
}
