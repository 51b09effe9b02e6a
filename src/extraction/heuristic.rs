/// Last-resort scan for transcript-looking markup
use anyhow::Result;
use async_trait::async_trait;
use scraper::{ElementRef, Html, Node};
use tracing::debug;

use super::{ExtractionStrategy, StrategyKind};
use crate::page::Page;
use crate::transcript::{normalize_text, split_leading_timestamp, TranscriptEntry};

const HINTS: [&str; 3] = ["transcript", "caption", "subtitle"];
const SKIPPED_TAGS: [&str; 5] = ["button", "script", "style", "noscript", "template"];

fn hinted(element: &ElementRef) -> bool {
    let value = element.value();
    if SKIPPED_TAGS.contains(&value.name()) {
        return false;
    }

    let id = value.id().unwrap_or_default().to_ascii_lowercase();
    let class = value.attr("class").unwrap_or_default().to_ascii_lowercase();
    HINTS.iter().any(|hint| id.contains(hint) || class.contains(hint))
}

/// Outermost elements whose id or class suggests transcript content
pub fn candidate_roots(document: &Html) -> Vec<ElementRef<'_>> {
    document
        .root_element()
        .descendants()
        .filter_map(ElementRef::wrap)
        .filter(|e| hinted(e))
        .filter(|e| !e.ancestors().filter_map(ElementRef::wrap).any(|a| hinted(&a)))
        .collect()
}

/// Elements that start a new rendered line
const BLOCK_TAGS: [&str; 24] = [
    "address", "article", "blockquote", "dd", "div", "dl", "dt", "figcaption", "footer", "h1", "h2", "h3", "h4",
    "h5", "h6", "header", "li", "ol", "p", "pre", "section", "table", "tr", "ul",
];

/// Append the rendered text of `element` to `out`
///
/// Inline children join into one line; block children and `<br>` break lines.
/// Source newlines only count inside `<pre>`.
fn render_text(element: &ElementRef, preformatted: bool, out: &mut String) {
    for child in element.children() {
        if let Some(child_element) = ElementRef::wrap(child) {
            let name = child_element.value().name();
            if SKIPPED_TAGS.contains(&name) {
                continue;
            }
            if name == "br" {
                out.push('\n');
                continue;
            }

            let block = BLOCK_TAGS.contains(&name);
            if block {
                out.push('\n');
            }
            render_text(&child_element, preformatted || name == "pre", out);
            if block {
                out.push('\n');
            }
        } else if let Node::Text(text) = child.value() {
            if preformatted {
                out.push_str(text);
            } else {
                out.push_str(&text.replace(['\n', '\r'], " "));
            }
        }
    }
}

/// Rendered text lines under `root`, skipping controls and scripts
fn text_lines(root: &ElementRef) -> Vec<String> {
    let mut rendered = String::new();
    render_text(root, root.value().name() == "pre", &mut rendered);

    rendered
        .split('\n')
        .map(normalize_text)
        .filter(|line| !line.is_empty())
        .collect()
}

/// Entries from every hinted region of the document
pub fn scan_document(html: &str, min_chars: usize) -> Vec<TranscriptEntry> {
    let document = Html::parse_document(html);
    let roots = candidate_roots(&document);
    debug!("Heuristic scan found {} candidate regions", roots.len());

    roots
        .iter()
        .flat_map(|root| text_lines(root))
        .filter_map(|line| {
            let (timestamp, rest) = split_leading_timestamp(&line);
            if rest.trim().chars().count() < min_chars {
                return None;
            }
            TranscriptEntry::new(timestamp, rest)
        })
        .collect()
}

pub struct HeuristicStrategy {
    min_entry_chars: usize,
}

impl HeuristicStrategy {
    pub fn new(min_entry_chars: usize) -> Self {
        Self { min_entry_chars }
    }
}

#[async_trait]
impl ExtractionStrategy for HeuristicStrategy {
    fn kind(&self) -> StrategyKind {
        StrategyKind::Heuristic
    }

    async fn extract(&self, page: &dyn Page) -> Result<Vec<TranscriptEntry>> {
        let html = page.content().await?;
        Ok(scan_document(&html, self.min_entry_chars))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scan_hinted_regions() {
        let html = r#"
            <div class="lesson-captions-wrapper">
              <button>Show transcript</button>
              <div class="caption-line">0:04 Welcome to the course</div>
              <div class="caption-line">0:09 We start with cargo</div>
            </div>
            <div id="sidebar">Not a transcript line</div>"#;

        let entries = scan_document(html, 4);
        let texts: Vec<&str> = entries.iter().map(|e| e.text.as_str()).collect();

        assert_eq!(texts, vec!["Welcome to the course", "We start with cargo"]);
        assert_eq!(entries[0].timestamp_seconds, Some(4.0));
    }

    #[test]
    fn test_multiline_text_is_split() {
        let html = "<pre id=\"transcript\">Line one here\n\n1:00 Line two here\n--\n</pre>";
        let entries = scan_document(html, 4);

        assert_eq!(entries.len(), 2);
        assert_eq!(entries[1].timestamp_seconds, Some(60.0));
    }

    #[test]
    fn test_inline_children_form_one_line() {
        let html = r#"
            <div class="transcript-body">
              <div class="transcript-line">
                <span>0:04</span> <span>Welcome to the course</span>
              </div>
              <div class="transcript-line"><span>0:09</span><em> We start</em> with cargo<br>and rustup</div>
            </div>"#;

        let entries = scan_document(html, 4);
        let pairs: Vec<(Option<f64>, &str)> = entries
            .iter()
            .map(|e| (e.timestamp_seconds, e.text.as_str()))
            .collect();

        assert_eq!(
            pairs,
            vec![
                (Some(4.0), "Welcome to the course"),
                (Some(9.0), "We start with cargo"),
                (None, "and rustup"),
            ]
        );
    }

    #[test]
    fn test_no_hints_no_entries() {
        assert!(scan_document("<main><p>Just an article body</p></main>", 4).is_empty());
    }
}
