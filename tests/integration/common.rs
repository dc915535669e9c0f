//! Shared fixtures: configuration, a scripted site and a counting analyzer

use async_trait::async_trait;
use delve::analysis::{Analysis, AnalyzerError, ContentAnalyzer};
use delve::config::{parse_config, Config};
use delve::crawler::{CrawlContext, CrawlService, ExtractedPage, PageFetcher};
use delve::index::{DedupLedger, SqliteVectorStore, StoreLimits, VectorIndexer};
use delve::storage::{shared, SqliteStorage};
use delve::DelveError;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use url::Url;

pub const ROOT: &str = "https://site.test/";

/// Builds a validated configuration with extra `[crawler]` lines
pub fn test_config(crawler: &str, db_path: &str) -> Config {
    test_config_with(crawler, "", db_path)
}

/// Like [`test_config`], with extra top-level sections appended
pub fn test_config_with(crawler: &str, sections: &str, db_path: &str) -> Config {
    parse_config(&format!(
        r#"
[crawler]
request-delay-ms = 0
page-timeout-secs = 5
{crawler}

[user-agent]
crawler-name = "TestBot"
crawler-version = "1.0.0"
contact-url = "https://example.com/contact"
contact-email = "test@example.com"

[output]
database-path = "{db_path}"

{sections}
"#
    ))
    .expect("test config is valid")
}

pub fn url(path: &str) -> String {
    format!("https://site.test{}", path)
}

type Probe = Box<dyn Fn(&str) + Send + Sync>;

/// A fake site served from memory
#[derive(Default)]
pub struct FakeSite {
    pages: HashMap<String, Result<ExtractedPage, String>>,
    visits: Mutex<Vec<String>>,
    probe: Mutex<Option<Probe>>,
}

impl FakeSite {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a page with the given links (paths on the same site or absolute URLs)
    pub fn page(mut self, path: &str, title: &str, text: &str, links: &[&str]) -> Self {
        let links = links
            .iter()
            .map(|l| {
                if l.starts_with("http") {
                    l.to_string()
                } else {
                    url(l)
                }
            })
            .collect();
        self.pages.insert(
            url(path),
            Ok(ExtractedPage {
                final_url: url(path),
                title: Some(title.to_string()),
                description: None,
                text: text.to_string(),
                links,
            }),
        );
        self
    }

    /// Adds a page that lands on `target` after following redirects
    pub fn redirecting(mut self, path: &str, target: &str, title: &str, text: &str) -> Self {
        self.pages.insert(
            url(path),
            Ok(ExtractedPage {
                final_url: target.to_string(),
                title: Some(title.to_string()),
                description: None,
                text: text.to_string(),
                links: Vec::new(),
            }),
        );
        self
    }

    /// Adds a page whose fetch fails
    pub fn failing(mut self, path: &str, message: &str) -> Self {
        self.pages.insert(url(path), Err(message.to_string()));
        self
    }

    /// Runs `probe` with the URL at the start of every fetch
    pub fn set_probe(&self, probe: impl Fn(&str) + Send + Sync + 'static) {
        *self.probe.lock().unwrap() = Some(Box::new(probe));
    }

    pub fn visits(&self) -> Vec<String> {
        self.visits.lock().unwrap().clone()
    }
}

#[async_trait]
impl PageFetcher for FakeSite {
    async fn fetch(&self, url: &Url, _timeout: Duration) -> Result<ExtractedPage, DelveError> {
        self.visits.lock().unwrap().push(url.to_string());
        if let Some(probe) = self.probe.lock().unwrap().as_ref() {
            probe(url.as_str());
        }

        match self.pages.get(url.as_str()) {
            Some(Ok(page)) => Ok(page.clone()),
            Some(Err(message)) => Err(DelveError::Extraction {
                url: url.to_string(),
                message: message.clone(),
            }),
            None => Err(DelveError::Extraction {
                url: url.to_string(),
                message: "HTTP 404".to_string(),
            }),
        }
    }
}

/// Analyzer that counts calls and can be told to fail or stall
#[derive(Default)]
pub struct CountingAnalyzer {
    pub calls: AtomicUsize,
    pub fail: bool,
    pub stall: bool,
}

impl CountingAnalyzer {
    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    /// Never answers on its own
    pub fn stalled() -> Self {
        Self {
            stall: true,
            ..Self::default()
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ContentAnalyzer for CountingAnalyzer {
    async fn analyze(&self, text: &str) -> Result<Analysis, AnalyzerError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.stall {
            tokio::time::sleep(Duration::from_secs(3600)).await;
        }
        if self.fail {
            return Err(AnalyzerError::EmptyResponse);
        }
        Ok(Analysis {
            summary: format!("{} words", text.split_whitespace().count()),
            key_topics: vec!["testing".to_string()],
            content_type: "article".to_string(),
            relevance_score: 0.8,
            insights: Vec::new(),
        })
    }
}

pub struct Harness {
    pub service: CrawlService,
    pub site: Arc<FakeSite>,
    pub analyzer: Arc<CountingAnalyzer>,
    pub store: Arc<SqliteVectorStore>,
}

/// Service over in-memory storage, an in-memory vector store and a fake site
pub fn harness_with(config: Config, site: FakeSite, analyzer: CountingAnalyzer) -> Harness {
    let site = Arc::new(site);
    let analyzer = Arc::new(analyzer);
    let store = Arc::new(SqliteVectorStore::open_in_memory(StoreLimits::from(&config.index)).unwrap());
    let indexer = Arc::new(VectorIndexer::new(
        store.clone(),
        Arc::new(DedupLedger::new()),
        config.index.chunk_budget(),
    ));

    let ctx = CrawlContext {
        storage: shared(SqliteStorage::open_in_memory().unwrap()),
        fetcher: site.clone(),
        analyzer: analyzer.clone(),
        indexer,
    };

    Harness {
        service: CrawlService::new(config, ctx),
        site,
        analyzer,
        store,
    }
}

pub fn harness(crawler: &str, site: FakeSite) -> Harness {
    harness_with(test_config(crawler, ":memory:"), site, CountingAnalyzer::default())
}
