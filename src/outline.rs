/// Course outline parsed from a player's curriculum sidebar
use scraper::{ElementRef, Html};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use tracing::debug;

use crate::page::{element_text, selector};

/// One lecture in the curriculum
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LectureUnit {
    pub id: String,
    pub title: String,
    pub duration_label: String,
    pub is_current: bool,
}

/// An ordered group of lectures
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SectionUnit {
    pub title: String,
    pub lectures: Vec<LectureUnit>,
}

/// The full curriculum, rebuilt from the page whenever it is requested
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct CourseOutline {
    pub sections: Vec<SectionUnit>,
}

/// Curriculum layout for one platform
#[derive(Debug)]
pub struct OutlineSelectors {
    pub section: &'static str,
    pub section_title: &'static str,
    pub item: &'static str,
    pub item_title: &'static str,
    pub item_duration: &'static str,
    pub item_link: &'static str,
    /// Attribute carrying the lecture id directly, when the platform renders one
    pub id_attribute: &'static str,
}

impl CourseOutline {
    /// Parse the curriculum out of `html`.
    ///
    /// Items without a resolvable lecture id (quizzes, readings) are dropped and
    /// each id appears at most once.
    pub fn parse<F>(html: &str, selectors: &OutlineSelectors, id_from_href: F, current_id: Option<&str>) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let document = Html::parse_document(html);
        let mut seen = HashSet::new();
        let mut sections = Vec::new();

        let section_elements: Vec<ElementRef> = selector(selectors.section)
            .map(|s| document.select(&s).collect())
            .unwrap_or_default();

        if section_elements.is_empty() {
            let lectures = parse_items(document.root_element(), selectors, &id_from_href, current_id, &mut seen);
            if !lectures.is_empty() {
                sections.push(SectionUnit {
                    title: String::new(),
                    lectures,
                });
            }
        } else {
            for (index, section) in section_elements.into_iter().enumerate() {
                let title = selector(selectors.section_title)
                    .and_then(|s| section.select(&s).next())
                    .map(|e| element_text(&e))
                    .filter(|t| !t.is_empty())
                    .unwrap_or_else(|| format!("Section {}", index + 1));

                let lectures = parse_items(section, selectors, &id_from_href, current_id, &mut seen);
                if !lectures.is_empty() {
                    sections.push(SectionUnit { title, lectures });
                }
            }
        }

        let outline = Self { sections };
        debug!("Parsed outline: {} sections, {} lectures", outline.sections.len(), outline.lecture_count());
        outline
    }

    pub fn lectures(&self) -> impl Iterator<Item = &LectureUnit> {
        self.sections.iter().flat_map(|s| s.lectures.iter())
    }

    /// Lecture ids in curriculum order
    pub fn lecture_ids(&self) -> Vec<String> {
        self.lectures().map(|l| l.id.clone()).collect()
    }

    pub fn lecture_count(&self) -> usize {
        self.lectures().count()
    }

    pub fn current(&self) -> Option<&LectureUnit> {
        self.lectures().find(|l| l.is_current)
    }

    /// Ids from `id` to the end of the course, empty when `id` is not listed
    pub fn remaining_from(&self, id: &str) -> Vec<String> {
        let ids = self.lecture_ids();
        ids.iter()
            .position(|listed| listed == id)
            .map(|pos| ids[pos..].to_vec())
            .unwrap_or_default()
    }

    /// Ids from the current lecture to the end of the course
    pub fn remaining_from_current(&self) -> Vec<String> {
        match self.current() {
            Some(current) => self.remaining_from(&current.id),
            None => self.lecture_ids(),
        }
    }

    pub fn title_of(&self, id: &str) -> Option<&str> {
        self.lectures().find(|l| l.id == id).map(|l| l.title.as_str())
    }
}

fn parse_items<F>(
    scope: ElementRef,
    selectors: &OutlineSelectors,
    id_from_href: &F,
    current_id: Option<&str>,
    seen: &mut HashSet<String>,
) -> Vec<LectureUnit>
where
    F: Fn(&str) -> Option<String>,
{
    let Some(item_selector) = selector(selectors.item) else {
        return Vec::new();
    };
    let link_selector = selector(selectors.item_link);
    let title_selector = selector(selectors.item_title);
    let duration_selector = selector(selectors.item_duration);

    let mut lectures = Vec::new();
    for item in scope.select(&item_selector) {
        let link = link_selector.as_ref().and_then(|s| item.select(s).next());

        let id = item
            .value()
            .attr(selectors.id_attribute)
            .map(str::to_string)
            .or_else(|| link.and_then(|l| l.value().attr("href")).and_then(id_from_href));

        let Some(id) = id else {
            continue;
        };
        if !seen.insert(id.clone()) {
            continue;
        }

        let title = title_selector
            .as_ref()
            .and_then(|s| item.select(s).next())
            .map(|e| element_text(&e))
            .filter(|t| !t.is_empty())
            .or_else(|| link.map(|l| element_text(&l)))
            .unwrap_or_else(|| element_text(&item));

        let duration_label = duration_selector
            .as_ref()
            .and_then(|s| item.select(s).next())
            .map(|e| element_text(&e))
            .unwrap_or_default();

        let is_current = current_id == Some(id.as_str()) || marks_current(&item);

        lectures.push(LectureUnit {
            id,
            title,
            duration_label,
            is_current,
        });
    }

    lectures
}

fn marks_current(item: &ElementRef) -> bool {
    let flagged = |e: &ElementRef| {
        let value = e.value();
        matches!(value.attr("aria-current"), Some("true") | Some("page") | Some("step"))
            || value
                .attr("class")
                .map(|c| c.split_whitespace().any(|cls| cls.contains("is-current")))
                .unwrap_or(false)
    };

    flagged(item) || item.descendants().filter_map(ElementRef::wrap).any(|e| flagged(&e))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::platform::{udemy, Platform, PlatformExtractor, UdemyExtractor};

    const UDEMY_SIDEBAR: &str = r#"
        <div data-purpose="curriculum-section-container">
          <div data-purpose="section-panel-0">
            <span data-purpose="section-title">Section 1: Getting Started</span>
            <ul>
              <li data-purpose="curriculum-item-0-0">
                <a href="/course/rust/learn/lecture/101"><span data-purpose="item-title">1. Welcome</span></a>
                <span data-purpose="item-duration">3min</span>
              </li>
              <li data-purpose="curriculum-item-0-1" aria-current="true">
                <a href="/course/rust/learn/lecture/102"><span data-purpose="item-title">2. Installing</span></a>
                <span data-purpose="item-duration">7min</span>
              </li>
            </ul>
          </div>
          <div data-purpose="section-panel-1">
            <span data-purpose="section-title">Section 2: Ownership</span>
            <ul>
              <li data-purpose="curriculum-item-1-0" data-lecture-id="201">
                <span data-purpose="item-title">3. Moves</span>
              </li>
              <li data-purpose="curriculum-item-1-1"><span data-purpose="item-title">Quiz 1</span></li>
            </ul>
          </div>
        </div>"#;

    fn parse_udemy(current: Option<&str>) -> CourseOutline {
        let extractor = UdemyExtractor;
        assert_eq!(extractor.platform(), Platform::Udemy);
        CourseOutline::parse(
            UDEMY_SIDEBAR,
            &extractor.selectors().outline,
            udemy::lecture_id_from_path,
            current,
        )
    }

    #[test]
    fn test_parse_udemy_outline() {
        let outline = parse_udemy(None);

        assert_eq!(outline.sections.len(), 2);
        assert_eq!(outline.sections[0].title, "Section 1: Getting Started");
        assert_eq!(outline.lecture_ids(), vec!["101", "102", "201"]);
        assert_eq!(outline.sections[0].lectures[0].title, "1. Welcome");
        assert_eq!(outline.sections[0].lectures[0].duration_label, "3min");
        assert_eq!(outline.current().map(|l| l.id.as_str()), Some("102"));
        assert_eq!(outline.remaining_from_current(), vec!["102", "201"]);
        assert_eq!(outline.remaining_from("201"), vec!["201"]);
        assert!(outline.remaining_from("999").is_empty());
    }

    #[test]
    fn test_current_from_url_id() {
        let outline = parse_udemy(Some("201"));
        let current: Vec<&str> = outline.lectures().filter(|l| l.is_current).map(|l| l.id.as_str()).collect();
        assert_eq!(current, vec!["102", "201"]);
        assert_eq!(outline.title_of("201"), Some("3. Moves"));
    }

    #[test]
    fn test_empty_page_has_empty_outline() {
        let outline = CourseOutline::parse("<html></html>", &UdemyExtractor.selectors().outline, |_| None, None);
        assert_eq!(outline.lecture_count(), 0);
    }
}
