/// Offline replay of a saved course
///
/// A replay directory holds one saved HTML page per lecture, in file-name order.
/// Each page's identity comes from its canonical link (or `og:url`), caption
/// tracks referenced by `<track src>` are read from files next to the page, and
/// the platform's "next" control is wired to move to the following page.
use anyhow::{anyhow, Result};
use scraper::Html;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};
use url::Url;
use walkdir::WalkDir;

use super::memory::{Effect, MemoryDocument, MemoryPage};
use super::{parse_track_elements, selector, TrackCue};
use crate::platform::{self, Platform};
use crate::transcript::parse_webvtt;

/// Build a [`MemoryPage`] course from a directory of saved lecture pages
pub async fn load_replay_course(dir: &Path) -> Result<MemoryPage> {
    let files = discover_pages(dir)?;
    if files.is_empty() {
        return Err(anyhow!("No .html pages found in {}", dir.display()));
    }

    info!("📁 Loading {} saved pages from {}", files.len(), dir.display());

    let mut documents = Vec::with_capacity(files.len());
    for path in &files {
        documents.push(load_document(path).await?);
    }

    Ok(MemoryPage::course(documents))
}

fn discover_pages(dir: &Path) -> Result<Vec<PathBuf>> {
    if !dir.is_dir() {
        return Err(anyhow!("Replay directory not found: {}", dir.display()));
    }

    let mut files: Vec<PathBuf> = WalkDir::new(dir)
        .max_depth(1)
        .into_iter()
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.into_path())
        .filter(|path| {
            path.is_file()
                && path
                    .extension()
                    .map(|ext| ext.eq_ignore_ascii_case("html") || ext.eq_ignore_ascii_case("htm"))
                    .unwrap_or(false)
        })
        .collect();

    files.sort();
    Ok(files)
}

async fn load_document(path: &Path) -> Result<MemoryDocument> {
    let html = tokio::fs::read_to_string(path).await?;
    let file_url = Url::from_file_path(path.canonicalize()?)
        .map_err(|_| anyhow!("Cannot build file URL for {}", path.display()))?;

    let (page_url, mut tracks) = {
        let document = Html::parse_document(&html);
        let page_url = canonical_url(&document).unwrap_or_else(|| file_url.clone());
        // Track sources are resolved against the file, not the recorded page URL
        (page_url, parse_track_elements(&document, &file_url))
    };

    for track in tracks.iter_mut() {
        let Some(src) = track.src.as_deref() else {
            continue;
        };
        let Some(track_path) = Url::parse(src).ok().and_then(|u| u.to_file_path().ok()) else {
            continue;
        };

        match tokio::fs::read_to_string(&track_path).await {
            Ok(body) => match parse_webvtt(&body) {
                Ok(cues) => {
                    track.cues = cues
                        .into_iter()
                        .map(|cue| TrackCue {
                            start_seconds: cue.start.as_secs_f64(),
                            end_seconds: cue.end.as_secs_f64(),
                            text: cue.text,
                        })
                        .collect();
                }
                Err(e) => warn!("Invalid caption file {}: {}", track_path.display(), e),
            },
            Err(e) => warn!("Missing caption file {}: {}", track_path.display(), e),
        }
    }

    debug!("Loaded {} as {} ({} tracks)", path.display(), page_url, tracks.len());

    let mut document = MemoryDocument::new(page_url.as_str(), html)?;
    for track in tracks {
        document = document.with_track(track);
    }

    let platform = Platform::detect(&page_url);
    if let Some(extractor) = platform::for_platform(platform) {
        for next in extractor.selectors().next_button {
            document = document.on_click(next, Effect::NavigateNext);
        }
    }

    Ok(document)
}

fn canonical_url(document: &Html) -> Option<Url> {
    let candidates = [
        ("link[rel='canonical']", "href"),
        ("meta[property='og:url']", "content"),
    ];

    candidates.iter().find_map(|(css, attr)| {
        let sel = selector(css)?;
        let value = document.select(&sel).next()?.value().attr(attr)?;
        Url::parse(value).ok()
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::page::Page;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_load_replay_course() {
        let dir = TempDir::new().unwrap();
        tokio::fs::write(
            dir.path().join("01.html"),
            r#"<html><head><link rel="canonical" href="https://www.udemy.com/course/rust/learn/lecture/101"></head>
               <body><video><track kind="captions" src="01.vtt"></video>
               <button data-purpose="go-to-next">Next</button></body></html>"#,
        )
        .await
        .unwrap();
        tokio::fs::write(
            dir.path().join("01.vtt"),
            "WEBVTT\n\n00:01.000 --> 00:03.000\nOwnership explained\n",
        )
        .await
        .unwrap();
        tokio::fs::write(
            dir.path().join("02.html"),
            r#"<html><head><link rel="canonical" href="https://www.udemy.com/course/rust/learn/lecture/102"></head><body></body></html>"#,
        )
        .await
        .unwrap();

        let page = load_replay_course(dir.path()).await.unwrap();
        assert_eq!(page.url().await.unwrap().path(), "/course/rust/learn/lecture/101");

        page.set_track_mode(0, crate::page::TrackMode::Showing).await.unwrap();
        let tracks = page.text_tracks().await.unwrap();
        assert_eq!(tracks[0].cues[0].text, "Ownership explained");

        assert!(page.click("[data-purpose='go-to-next']").await.unwrap());
        assert_eq!(page.url().await.unwrap().path(), "/course/rust/learn/lecture/102");
    }

    #[tokio::test]
    async fn test_empty_directory_is_an_error() {
        let dir = TempDir::new().unwrap();
        assert!(load_replay_course(dir.path()).await.is_err());
    }
}
