use std::sync::Arc;

use tracing::{debug, info, warn};
use url::Url;

use crate::error::{Error, Result};
use crate::extractor::{Candidate, Extractor};
use crate::fetcher::PageFetcher;
use crate::models::NewArticle;
use crate::store::Storage;

/// Counts from one scrape run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScrapeReport {
    /// Entries found on the page
    pub found: usize,
    pub inserted: usize,
    /// Entries whose title was already stored
    pub duplicates: usize,
    /// Entries skipped because their title was empty
    pub untitled: usize,
}

pub struct Scraper {
    source_url: Url,
    fetcher: Arc<dyn PageFetcher>,
    extractor: Extractor,
    store: Arc<dyn Storage>,
}

impl Scraper {
    pub fn new(
        source_url: &str,
        fetcher: Arc<dyn PageFetcher>,
        extractor: Extractor,
        store: Arc<dyn Storage>,
    ) -> Result<Self> {
        let source_url = Url::parse(source_url)
            .map_err(|e| Error::Validation(format!("invalid source url {:?}: {}", source_url, e)))?;

        Ok(Self {
            source_url,
            fetcher,
            extractor,
            store,
        })
    }

    pub fn source_url(&self) -> &str {
        self.source_url.as_str()
    }

    /// Fetch the source page and insert every article whose title is not
    /// stored yet, in document order. Existing articles are never modified.
    ///
    /// A failed fetch returns before anything is written.
    pub async fn scrape_and_store(&self) -> Result<ScrapeReport> {
        let html = self.fetcher.fetch(self.source_url.as_str()).await?;
        let candidates = self.extractor.extract(&html);

        let mut report = ScrapeReport {
            found: candidates.len(),
            ..ScrapeReport::default()
        };

        for candidate in candidates {
            if candidate.title.is_empty() {
                debug!("Skipping untitled entry linking to {:?}", candidate.link);
                report.untitled += 1;
                continue;
            }

            // Check-then-insert; concurrent scrapes may race here.
            if self.store.find_by_title(&candidate.title).await?.is_some() {
                report.duplicates += 1;
                continue;
            }

            let article = self.to_new_article(candidate);
            self.store.insert_article(article).await?;
            report.inserted += 1;
        }

        info!(
            "Scrape of {} complete: {} found, {} inserted, {} duplicates, {} untitled",
            self.source_url, report.found, report.inserted, report.duplicates, report.untitled
        );
        Ok(report)
    }

    fn to_new_article(&self, candidate: Candidate) -> NewArticle {
        NewArticle {
            link: resolve_link(&self.source_url, &candidate.link),
            title: candidate.title,
            summary: candidate.summary,
        }
    }
}

/// Resolve a possibly relative href against the page it came from.
pub fn resolve_link(base: &Url, href: &str) -> String {
    if href.is_empty() {
        return String::new();
    }
    match base.join(href) {
        Ok(url) => url.to_string(),
        Err(e) => {
            warn!("Keeping unresolvable link {:?}: {}", href, e);
            href.to_string()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SelectorConfig;
    use crate::memory::MemoryStore;
    use crate::store::ArticleStore;
    use async_trait::async_trait;
    use std::sync::Mutex;

    /// Serves a fixed page, or fails, and counts calls.
    struct StaticFetcher {
        page: Mutex<Option<String>>,
        calls: Mutex<usize>,
    }

    impl StaticFetcher {
        fn serving(html: &str) -> Self {
            Self {
                page: Mutex::new(Some(html.to_string())),
                calls: Mutex::new(0),
            }
        }

        fn failing() -> Self {
            Self {
                page: Mutex::new(None),
                calls: Mutex::new(0),
            }
        }

        fn set_page(&self, html: &str) {
            *self.page.lock().unwrap() = Some(html.to_string());
        }
    }

    #[async_trait]
    impl PageFetcher for StaticFetcher {
        async fn fetch(&self, url: &str) -> Result<String> {
            *self.calls.lock().unwrap() += 1;
            self.page
                .lock()
                .unwrap()
                .clone()
                .ok_or_else(|| Error::network(url, "connection refused"))
        }
    }

    const PAGE: &str = r#"
        <article><a href="/world/one"><h2 class="headline">One</h2></a><p class="summary">First</p></article>
        <article><a href="https://other.example.org/two"><h2 class="headline">Two</h2></a></article>
        <article><a href="/world/blank"><h2 class="headline"> </h2></a></article>
        <article><a href="/world/one-again"><h2 class="headline">One</h2></a></article>
    "#;

    fn scraper_with(fetcher: Arc<StaticFetcher>, store: Arc<MemoryStore>) -> Scraper {
        Scraper::new(
            "https://news.example.com/section/world",
            fetcher,
            Extractor::new(&SelectorConfig::default()).unwrap(),
            store,
        )
        .unwrap()
    }

    mod scrape_tests {
        use super::*;

        #[tokio::test]
        async fn test_first_scrape_inserts_unseen_titles() {
            let store = Arc::new(MemoryStore::new());
            let scraper = scraper_with(Arc::new(StaticFetcher::serving(PAGE)), store.clone());

            let report = scraper.scrape_and_store().await.unwrap();

            assert_eq!(
                report,
                ScrapeReport {
                    found: 4,
                    inserted: 2,
                    duplicates: 1,
                    untitled: 1,
                }
            );

            let articles = store.list_all().await.unwrap();
            let titles: Vec<&str> = articles.iter().map(|a| a.title.as_str()).collect();
            assert_eq!(titles, vec!["One", "Two"]);
            assert!(articles.iter().all(|a| !a.saved && a.notes.is_empty()));
        }

        #[tokio::test]
        async fn test_first_seen_wins() {
            let store = Arc::new(MemoryStore::new());
            let scraper = scraper_with(Arc::new(StaticFetcher::serving(PAGE)), store.clone());

            scraper.scrape_and_store().await.unwrap();

            let one = store.find_by_title("One").await.unwrap().unwrap();
            assert_eq!(one.link, "https://news.example.com/world/one");
            assert_eq!(one.summary.as_deref(), Some("First"));
        }

        #[tokio::test]
        async fn test_second_scrape_inserts_nothing() {
            let store = Arc::new(MemoryStore::new());
            let scraper = scraper_with(Arc::new(StaticFetcher::serving(PAGE)), store.clone());

            scraper.scrape_and_store().await.unwrap();
            let second = scraper.scrape_and_store().await.unwrap();

            assert_eq!(second.inserted, 0);
            assert_eq!(second.duplicates, 3);
            assert_eq!(store.list_all().await.unwrap().len(), 2);
        }

        #[tokio::test]
        async fn test_existing_articles_are_not_modified() {
            let store = Arc::new(MemoryStore::new());
            let fetcher = Arc::new(StaticFetcher::serving(PAGE));
            let scraper = scraper_with(fetcher.clone(), store.clone());

            scraper.scrape_and_store().await.unwrap();
            let one = store.find_by_title("One").await.unwrap().unwrap();
            store.set_saved(one.id, true).await.unwrap();

            fetcher.set_page(
                r#"<article><a href="/new-link"><h2 class="headline">One</h2></a><p class="summary">Changed</p></article>"#,
            );
            scraper.scrape_and_store().await.unwrap();

            let after = store.get_article(one.id).await.unwrap();
            assert!(after.saved);
            assert_eq!(after.link, one.link);
            assert_eq!(after.summary.as_deref(), Some("First"));
        }

        #[tokio::test]
        async fn test_failed_fetch_leaves_store_untouched() {
            let store = Arc::new(MemoryStore::new());
            let fetcher = Arc::new(StaticFetcher::serving(PAGE));
            let scraper = scraper_with(fetcher.clone(), store.clone());
            scraper.scrape_and_store().await.unwrap();
            let before = store.list_all().await.unwrap();

            let failing = Arc::new(StaticFetcher::failing());
            let scraper = scraper_with(failing.clone(), store.clone());
            let err = scraper.scrape_and_store().await.unwrap_err();

            assert!(matches!(err, Error::Network { .. }));
            assert_eq!(*failing.calls.lock().unwrap(), 1);
            assert_eq!(store.list_all().await.unwrap(), before);
        }

        #[test]
        fn test_invalid_source_url() {
            let result = Scraper::new(
                "not a url",
                Arc::new(StaticFetcher::failing()),
                Extractor::new(&SelectorConfig::default()).unwrap(),
                Arc::new(MemoryStore::new()),
            );
            assert!(matches!(result, Err(Error::Validation(_))));
        }
    }

    mod resolve_link_tests {
        use super::*;

        fn base() -> Url {
            Url::parse("https://news.example.com/section/world").unwrap()
        }

        #[test]
        fn test_relative_path() {
            assert_eq!(
                resolve_link(&base(), "/2024/01/01/story.html"),
                "https://news.example.com/2024/01/01/story.html"
            );
        }

        #[test]
        fn test_absolute_url_unchanged() {
            assert_eq!(
                resolve_link(&base(), "https://elsewhere.example.org/x"),
                "https://elsewhere.example.org/x"
            );
        }

        #[test]
        fn test_empty_link_stays_empty() {
            assert_eq!(resolve_link(&base(), ""), "");
        }
    }
}
