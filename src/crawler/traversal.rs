//! Depth-first traversal of one crawl job
//!
//! Traversal is sequential: a page is fetched, scored, optionally analyzed
//! and indexed, and only then are its links expanded. Pending visits live on
//! an explicit stack instead of the call stack, so depth never grows the
//! native stack. Links are pushed in reverse so they are popped in
//! appearance order, which visits pages in the same order a recursive
//! depth-first walk would.
//!
//! Bounds are checked before any work is done for a URL: a popped URL deeper
//! than `max_depth` is dropped, and once `max_pages` URLs have been
//! discovered the traversal ends.

use crate::analysis::{analyze_or_fallback, Analysis, ContentAnalyzer};
use crate::config::Config;
use crate::crawler::fetcher::PageFetcher;
use crate::crawler::parser::{scope_links, ExtractedPage};
use crate::crawler::scorer::score;
use crate::index::{document_metadata, DocumentCategory, IndexOutcome, VectorIndexer};
use crate::robots::RobotsPolicy;
use crate::state::PageStatus;
use crate::storage::{lock, CrawlJob, JobCounters, NewPage, SharedStorage, Storage};
use crate::url::{normalize_url, same_site};
use crate::{DelveError, Result};
use chrono::Utc;
use serde_json::Value;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use url::Url;

/// Message recorded for URLs excluded by robots.txt
pub const ROBOTS_DISALLOWED: &str = "disallowed by robots.txt";

/// Message recorded for URLs whose redirect left the root site
pub const REDIRECTED_OFF_SITE: &str = "redirected off-site";

/// Message recorded for URLs that redirected to a page already visited
pub const REDIRECTED_TO_VISITED: &str = "redirected to an already visited page";

/// Priority recorded for pages that failed before they could be scored
const UNSCORED: u8 = 0;

/// Per-job traversal bounds and pacing
#[derive(Debug, Clone, PartialEq)]
pub struct TraversalSettings {
    pub max_depth: u32,
    pub max_pages: u32,
    pub max_analyzed: u32,
    pub request_delay: Duration,
    pub page_timeout: Duration,
    pub analysis_threshold: u8,
    pub max_links_per_page: usize,
    pub analyzer_input_chars: usize,
    pub analyzer_timeout: Duration,
}

impl TraversalSettings {
    /// Settings for a job whose page bound is `max_pages`
    pub fn from_config(config: &Config, max_pages: u32) -> Self {
        let crawler = &config.crawler;
        Self {
            max_depth: crawler.max_depth,
            max_pages,
            max_analyzed: crawler.max_analyzed.unwrap_or(max_pages).min(max_pages),
            request_delay: Duration::from_millis(crawler.request_delay_ms),
            page_timeout: Duration::from_secs(crawler.page_timeout_secs),
            analysis_threshold: crawler.analysis_threshold,
            max_links_per_page: crawler.max_links_per_page,
            analyzer_input_chars: config.analyzer_input_chars(),
            analyzer_timeout: config.analyzer_timeout(),
        }
    }
}

/// Collaborators shared by every job of a service
#[derive(Clone)]
pub struct CrawlContext {
    pub storage: SharedStorage,
    pub fetcher: Arc<dyn PageFetcher>,
    pub analyzer: Arc<dyn ContentAnalyzer>,
    pub indexer: Arc<VectorIndexer>,
}

/// A pending visit
#[derive(Debug, Clone)]
struct Frame {
    url: Url,
    depth: u32,
}

/// Traversal state of a single job
pub struct Traversal<'a> {
    ctx: &'a CrawlContext,
    job: &'a CrawlJob,
    settings: &'a TraversalSettings,
    robots: RobotsPolicy,
    cancel: CancellationToken,
    delay: Duration,
    root: Url,
    stack: Vec<Frame>,
    discovered: HashSet<String>,
    counters: JobCounters,
}

impl<'a> Traversal<'a> {
    pub fn new(
        ctx: &'a CrawlContext,
        job: &'a CrawlJob,
        settings: &'a TraversalSettings,
        robots: RobotsPolicy,
        cancel: CancellationToken,
    ) -> Result<Self> {
        let root = normalize_url(&job.root_url)?;
        let delay = robots
            .crawl_delay()
            .map_or(settings.request_delay, |d| d.max(settings.request_delay));
        Ok(Self {
            ctx,
            job,
            settings,
            robots,
            cancel,
            delay,
            root,
            stack: Vec::new(),
            discovered: HashSet::new(),
            counters: JobCounters::default(),
        })
    }

    /// Runs the traversal to completion, returning the final counters
    ///
    /// Fails if the root page cannot be fetched, if storage fails, or if the
    /// job is cancelled. Failures of other pages are recorded and skipped.
    pub async fn run(mut self) -> Result<JobCounters> {
        self.stack.push(Frame {
            url: self.root.clone(),
            depth: 1,
        });

        while let Some(frame) = self.stack.pop() {
            self.check_cancelled()?;

            if frame.depth > self.settings.max_depth {
                continue;
            }
            if self.counters.discovered >= self.settings.max_pages {
                tracing::debug!("Job {} reached {} pages", self.job.id, self.settings.max_pages);
                break;
            }
            if self.discovered.contains(frame.url.as_str()) {
                continue;
            }

            let is_root = frame.depth == 1;
            if !is_root {
                self.pause().await?;
            }

            let links = self.visit(&frame, is_root).await?;

            let child_depth = frame.depth + 1;
            if child_depth <= self.settings.max_depth
                && self.counters.discovered < self.settings.max_pages
            {
                for link in links.into_iter().rev() {
                    if !self.discovered.contains(link.as_str()) {
                        self.stack.push(Frame {
                            url: link,
                            depth: child_depth,
                        });
                    }
                }
            }
        }

        tracing::info!(
            "Job {} traversal finished: {} discovered, {} processed, {} analyzed",
            self.job.id,
            self.counters.discovered,
            self.counters.processed,
            self.counters.analyzed
        );

        Ok(self.counters)
    }

    fn check_cancelled(&self) -> Result<()> {
        if self.cancel.is_cancelled() {
            return Err(DelveError::Cancelled(self.job.id));
        }
        Ok(())
    }

    /// Fixed delay before each non-root visit
    ///
    /// A robots.txt `Crawl-delay` longer than the configured delay wins.
    async fn pause(&self) -> Result<()> {
        if self.delay.is_zero() {
            return Ok(());
        }
        tokio::select! {
            _ = self.cancel.cancelled() => Err(DelveError::Cancelled(self.job.id)),
            _ = tokio::time::sleep(self.delay) => Ok(()),
        }
    }

    /// Visits one URL and returns its in-scope links
    async fn visit(&mut self, frame: &Frame, is_root: bool) -> Result<Vec<Url>> {
        let url = frame.url.to_string();
        self.discovered.insert(url.clone());
        self.counters.discovered += 1;

        if !self.robots.is_allowed(&url) {
            if is_root {
                return Err(DelveError::RootUnreachable {
                    url,
                    message: ROBOTS_DISALLOWED.to_string(),
                });
            }
            tracing::debug!("Skipping {}: {}", url, ROBOTS_DISALLOWED);
            self.record_failure(frame, ROBOTS_DISALLOWED)?;
            return Ok(Vec::new());
        }

        self.check_cancelled()?;
        tracing::debug!("Fetching {} (depth {})", url, frame.depth);
        let fetched = tokio::select! {
            _ = self.cancel.cancelled() => return Err(DelveError::Cancelled(self.job.id)),
            result = self.ctx.fetcher.fetch(&frame.url, self.settings.page_timeout) => result,
        };

        let page = match fetched {
            Ok(page) => page,
            Err(e) if is_root => {
                return Err(DelveError::RootUnreachable {
                    url,
                    message: e.to_string(),
                })
            }
            Err(e) => {
                tracing::warn!("Failed to fetch {}: {}", url, e);
                self.record_failure(frame, &e.to_string())?;
                return Ok(Vec::new());
            }
        };

        let final_url = normalize_url(&page.final_url).unwrap_or_else(|_| frame.url.clone());
        if final_url != frame.url {
            if let Some(message) = self.check_redirect(&final_url) {
                if is_root {
                    return Err(DelveError::RootUnreachable {
                        url,
                        message: format!("{} ({})", message, final_url),
                    });
                }
                tracing::debug!("Skipping {}: {} ({})", url, message, final_url);
                self.record_failure(frame, message)?;
                return Ok(Vec::new());
            }
            self.discovered.insert(final_url.to_string());
        }

        let priority = score(&page, frame.depth);
        let page_id = {
            let mut storage = lock(&self.ctx.storage)?;
            let page_id = storage.insert_page(&NewPage {
                job_id: self.job.id,
                owner: self.job.owner.clone(),
                url: url.clone(),
                title: page.title.clone(),
                description: page.description.clone(),
                content: Some(page.text.clone()),
                status: PageStatus::Discovered,
                priority,
                depth: frame.depth,
                error_message: None,
            })?;
            storage.update_job_counters(self.job.id, &self.counters)?;
            page_id
        };

        if priority > self.settings.analysis_threshold
            && self.counters.analyzed < self.settings.max_analyzed
        {
            let analysis = tokio::select! {
                _ = self.cancel.cancelled() => return Err(DelveError::Cancelled(self.job.id)),
                analysis = analyze_or_fallback(
                    self.ctx.analyzer.as_ref(),
                    &page.text,
                    self.settings.analyzer_input_chars,
                    self.settings.analyzer_timeout,
                ) => analysis,
            };

            lock(&self.ctx.storage)?.update_page_analysis(page_id, &analysis)?;
            self.counters.analyzed += 1;
            tracing::debug!("Analyzed {} (priority {})", url, priority);

            self.index_page(page_id, &url, &page, &analysis).await;
        } else {
            tracing::debug!("Not analyzing {} (priority {})", url, priority);
        }

        {
            let mut storage = lock(&self.ctx.storage)?;
            storage.mark_page_processed(page_id)?;
            self.counters.processed += 1;
            storage.update_job_counters(self.job.id, &self.counters)?;
        }

        Ok(scope_links(
            &page.links,
            &self.root,
            self.settings.max_links_per_page,
        ))
    }

    /// Rejects redirect targets outside the root site or already visited
    fn check_redirect(&self, final_url: &Url) -> Option<&'static str> {
        if !same_site(final_url, &self.root) {
            Some(REDIRECTED_OFF_SITE)
        } else if self.discovered.contains(final_url.as_str()) {
            Some(REDIRECTED_TO_VISITED)
        } else {
            None
        }
    }

    /// Records a URL that could not be fetched
    fn record_failure(&mut self, frame: &Frame, message: &str) -> Result<()> {
        let mut storage = lock(&self.ctx.storage)?;
        let page_id = storage.insert_page(&NewPage {
            job_id: self.job.id,
            owner: self.job.owner.clone(),
            url: frame.url.to_string(),
            title: None,
            description: None,
            content: None,
            status: PageStatus::Discovered,
            priority: UNSCORED,
            depth: frame.depth,
            error_message: None,
        })?;
        storage.mark_page_failed(page_id, message)?;
        self.counters.processed += 1;
        storage.update_job_counters(self.job.id, &self.counters)?;
        Ok(())
    }

    /// Indexes an analyzed page's text and its analysis
    ///
    /// Indexing failures are logged and never fail the page.
    async fn index_page(&self, page_id: i64, url: &str, page: &ExtractedPage, analysis: &Analysis) {
        let timestamp = Utc::now().to_rfc3339();
        let indexer = &self.ctx.indexer;

        let mut content_meta =
            document_metadata(DocumentCategory::PageContent, page_id, &self.job.owner, &timestamp);
        content_meta.insert("job_id".into(), Value::from(self.job.id));
        content_meta.insert("url".into(), Value::from(url));
        if let Some(title) = &page.title {
            content_meta.insert("title".into(), Value::from(title.as_str()));
        }
        let outcome = indexer
            .index(
                &DocumentCategory::PageContent.logical_key(page_id),
                &page.text,
                &content_meta,
            )
            .await;
        log_outcome(&outcome);

        let mut analysis_meta =
            document_metadata(DocumentCategory::Analysis, page_id, &self.job.owner, &timestamp);
        analysis_meta.insert("job_id".into(), Value::from(self.job.id));
        analysis_meta.insert("url".into(), Value::from(url));
        analysis_meta.insert("content_type".into(), Value::from(analysis.content_type.as_str()));
        analysis_meta.insert("relevance_score".into(), Value::from(analysis.relevance_score));
        analysis_meta.insert("key_topics".into(), Value::from(analysis.key_topics.clone()));
        let outcome = indexer
            .index(
                &DocumentCategory::Analysis.logical_key(page_id),
                &analysis.to_document_text(),
                &analysis_meta,
            )
            .await;
        log_outcome(&outcome);
    }
}

fn log_outcome(outcome: &IndexOutcome) {
    if !outcome.is_complete() {
        tracing::warn!(
            "Indexed {} partially: {} of {} parts failed",
            outcome.logical_key,
            outcome.failed(),
            outcome.parts.len()
        );
    }
}
