//! Turns a listing page into candidate articles.
//!
//! Each element matching the `entry` selector is one candidate. Inside it the
//! first `link` match supplies the href, and the text of every `title` and
//! `summary` match is concatenated and trimmed, the same way a jQuery-style
//! `.text()` reads a selection.

use scraper::{ElementRef, Html, Selector};

use crate::config::SelectorConfig;
use crate::error::{Error, Result};

/// An extracted article that has not been checked against storage yet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Candidate {
    pub link: String,
    pub title: String,
    /// `None` when the entry has no summary text at all.
    pub summary: Option<String>,
}

pub struct Extractor {
    entry: Selector,
    link: Selector,
    title: Selector,
    summary: Selector,
}

fn compile(name: &str, css: &str) -> Result<Selector> {
    Selector::parse(css)
        .map_err(|e| Error::Parse(format!("invalid {} selector {:?}: {}", name, css, e)))
}

impl Extractor {
    pub fn new(selectors: &SelectorConfig) -> Result<Self> {
        Ok(Self {
            entry: compile("entry", &selectors.entry)?,
            link: compile("link", &selectors.link)?,
            title: compile("title", &selectors.title)?,
            summary: compile("summary", &selectors.summary)?,
        })
    }

    /// Extract candidates in document order. Entries with an empty title are
    /// kept; filtering them is up to the caller.
    pub fn extract(&self, html: &str) -> Vec<Candidate> {
        let document = Html::parse_document(html);

        document
            .select(&self.entry)
            .map(|entry| Candidate {
                link: entry
                    .select(&self.link)
                    .next()
                    .and_then(|a| a.value().attr("href"))
                    .map(|href| href.trim().to_string())
                    .unwrap_or_default(),
                title: selection_text(entry, &self.title),
                summary: Some(selection_text(entry, &self.summary)).filter(|s| !s.is_empty()),
            })
            .collect()
    }
}

fn selection_text(scope: ElementRef<'_>, selector: &Selector) -> String {
    scope
        .select(selector)
        .flat_map(|el| el.text())
        .collect::<String>()
        .trim()
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn default_extractor() -> Extractor {
        Extractor::new(&SelectorConfig::default()).unwrap()
    }

    const LISTING: &str = r#"
        <html>
          <body>
            <section>
              <article>
                <a href="  https://news.example.com/a  ">
                  <h2 class="headline">
                     First headline
                  </h2>
                </a>
                <p class="summary">  First summary.  </p>
              </article>
              <article>
                <a href="https://news.example.com/b"><h2 class="headline">Second headline</h2></a>
              </article>
              <article>
                <a href="https://news.example.com/c"><h2 class="headline">Third headline</h2></a>
                <p class="summary">Third summary.</p>
              </article>
            </section>
          </body>
        </html>
    "#;

    mod extract_tests {
        use super::*;

        #[test]
        fn test_missing_summary_is_absent() {
            let candidates = default_extractor().extract(LISTING);

            assert_eq!(candidates.len(), 3);
            assert_eq!(candidates.iter().filter(|c| c.summary.is_some()).count(), 2);
            assert_eq!(candidates[1].summary, None);
        }

        #[test]
        fn test_fields_are_trimmed() {
            let candidates = default_extractor().extract(LISTING);

            assert_eq!(candidates[0].link, "https://news.example.com/a");
            assert_eq!(candidates[0].title, "First headline");
            assert_eq!(candidates[0].summary.as_deref(), Some("First summary."));
        }

        #[test]
        fn test_document_order_is_kept() {
            let titles: Vec<String> = default_extractor()
                .extract(LISTING)
                .into_iter()
                .map(|c| c.title)
                .collect();

            assert_eq!(
                titles,
                vec!["First headline", "Second headline", "Third headline"]
            );
        }

        #[test]
        fn test_empty_title_entry_is_still_a_candidate() {
            let html = r#"
                <article><a href="/x"><h2 class="headline">   </h2></a></article>
                <article><a href="/y"></a><p class="summary">orphan dek</p></article>
            "#;

            let candidates = default_extractor().extract(html);

            assert_eq!(candidates.len(), 2);
            assert_eq!(candidates[0].title, "");
            assert_eq!(candidates[1].title, "");
            assert_eq!(candidates[1].summary.as_deref(), Some("orphan dek"));
        }

        #[test]
        fn test_whitespace_only_summary_is_absent() {
            let html = r#"<article><h2 class="headline">T</h2><p class="summary">  </p></article>"#;

            let candidates = default_extractor().extract(html);
            assert_eq!(candidates[0].summary, None);
        }

        #[test]
        fn test_missing_href_gives_empty_link() {
            let html = r#"<article><h2 class="headline">No link</h2></article>"#;

            let candidates = default_extractor().extract(html);
            assert_eq!(candidates[0].link, "");
        }

        #[test]
        fn test_multiple_title_matches_are_concatenated() {
            let html = r#"
                <article>
                  <h2 class="headline">Part one, </h2>
                  <h2 class="headline">part two</h2>
                </article>
            "#;

            let candidates = default_extractor().extract(html);
            assert_eq!(candidates[0].title, "Part one, part two");
        }

        #[test]
        fn test_no_entries() {
            let candidates = default_extractor().extract("<html><body><p>nothing</p></body></html>");
            assert!(candidates.is_empty());
        }

        #[test]
        fn test_garbage_input_degrades_to_empty() {
            let candidates = default_extractor().extract("<<<>>> not really </html");
            assert!(candidates.is_empty());
        }

        #[test]
        fn test_extraction_is_repeatable() {
            let extractor = default_extractor();
            assert_eq!(extractor.extract(LISTING), extractor.extract(LISTING));
        }

        #[test]
        fn test_custom_selectors() {
            let extractor = Extractor::new(&SelectorConfig {
                entry: "li.story".to_string(),
                link: "a.more".to_string(),
                title: "h3".to_string(),
                summary: "span.dek".to_string(),
            })
            .unwrap();

            let html = r#"
                <ul>
                  <li class="story"><h3>Custom</h3><a href="/skip">x</a><a class="more" href="/custom">more</a><span class="dek">Dek</span></li>
                  <li class="other"><h3>Ignored</h3></li>
                </ul>
            "#;

            let candidates = extractor.extract(html);
            assert_eq!(candidates.len(), 1);
            assert_eq!(candidates[0].link, "/custom");
            assert_eq!(candidates[0].title, "Custom");
            assert_eq!(candidates[0].summary.as_deref(), Some("Dek"));
        }
    }

    mod selector_tests {
        use super::*;

        #[test]
        fn test_invalid_selector_is_parse_error() {
            let result = Extractor::new(&SelectorConfig {
                title: "h2[".to_string(),
                ..SelectorConfig::default()
            });

            match result {
                Err(Error::Parse(message)) => assert!(message.contains("title")),
                Err(other) => panic!("expected parse error, got {:?}", other),
                Ok(_) => panic!("expected parse error"),
            }
        }
    }
}
