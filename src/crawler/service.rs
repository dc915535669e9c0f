//! Crawl job lifecycle
//!
//! [`CrawlService`] creates jobs, runs each one as an independent sequential
//! traversal and finalizes its status:
//!
//! ```text
//! pending -> processing -> completed | failed | cancelled
//! ```
//!
//! Only errors that escape the traversal (root unreachable, storage
//! failure, cancellation) end a job as `failed` or `cancelled`; page-level
//! failures are recorded on the page and the job still completes.

use crate::analysis::{ChatAnalyzer, ContentAnalyzer, HeuristicAnalyzer};
use crate::config::{BrowserEngine, Config};
use crate::crawler::fetcher::{build_http_client, HttpFetcher, PageFetcher};
use crate::crawler::traversal::{CrawlContext, Traversal, TraversalSettings};
use crate::index::{
    DedupLedger, DocumentCategory, Filter, QueryMatch, SqliteVectorStore, StoreLimits,
    VectorIndexer, VectorStore,
};
use crate::robots::RobotsPolicy;
use crate::state::JobStatus;
use crate::storage::{
    lock, shared, CrawlJob, CrawledPage, JobCounters, OwnerIds, SqliteStorage, Storage,
    StorageError,
};
use crate::url::normalize_url;
use crate::{ConfigError, DelveError, Result};
use reqwest::Client;
use std::collections::HashMap;
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// A job running on its own task
pub struct JobHandle {
    job_id: i64,
    cancel: CancellationToken,
    task: JoinHandle<Result<CrawlJob>>,
}

impl JobHandle {
    pub fn job_id(&self) -> i64 {
        self.job_id
    }

    /// Requests cancellation; the job stops at its next check point
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Waits for the job to finish and returns its final record
    pub async fn wait(self) -> Result<CrawlJob> {
        self.task.await?
    }
}

/// Entry point for creating, running and inspecting crawl jobs
#[derive(Clone)]
pub struct CrawlService {
    config: Arc<Config>,
    ctx: CrawlContext,
    robots_client: Option<Client>,
    running: Arc<Mutex<HashMap<i64, CancellationToken>>>,
}

impl CrawlService {
    /// Creates a service over explicit collaborators
    ///
    /// robots.txt is not consulted until a client is supplied through
    /// [`CrawlService::with_robots_client`].
    pub fn new(config: Config, ctx: CrawlContext) -> Self {
        Self {
            config: Arc::new(config),
            ctx,
            robots_client: None,
            running: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    pub fn with_robots_client(mut self, client: Client) -> Self {
        self.robots_client = Some(client);
        self
    }

    /// Builds the service described by a configuration
    ///
    /// Opens the SQLite database for jobs and indexed documents, primes the
    /// dedup ledger from the vector store, and selects the analyzer and page
    /// fetcher.
    pub async fn from_config(config: Config) -> Result<Self> {
        let db_path = Path::new(&config.output.database_path);
        let storage = shared(SqliteStorage::new(db_path)?);

        let store: Arc<dyn VectorStore> = Arc::new(SqliteVectorStore::new(
            db_path,
            StoreLimits::from(&config.index),
        )?);
        let ledger = Arc::new(DedupLedger::new());
        let loaded = ledger.load(store.as_ref(), &DocumentCategory::ALL).await?;
        tracing::info!("Loaded {} indexed document keys", loaded);
        let indexer = Arc::new(VectorIndexer::new(
            store,
            ledger,
            config.index.chunk_budget(),
        ));

        let analyzer: Arc<dyn ContentAnalyzer> = match &config.analyzer {
            Some(analyzer) => {
                tracing::info!("Using analyzer model {} at {}", analyzer.model, analyzer.endpoint);
                Arc::new(ChatAnalyzer::from_config(analyzer)?)
            }
            None => {
                tracing::info!("No analyzer configured, using heuristic analysis");
                Arc::new(HeuristicAnalyzer::new())
            }
        };

        let client = build_http_client(&config.user_agent)?;
        let fetcher: Arc<dyn PageFetcher> = match config.browser.engine {
            BrowserEngine::Http => Arc::new(HttpFetcher::new(client.clone())),
            BrowserEngine::Chrome => chrome_fetcher(&config).await?,
        };

        let ctx = CrawlContext {
            storage,
            fetcher,
            analyzer,
            indexer,
        };
        Ok(Self::new(config, ctx).with_robots_client(client))
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn context(&self) -> &CrawlContext {
        &self.ctx
    }

    fn running(&self) -> MutexGuard<'_, HashMap<i64, CancellationToken>> {
        self.running.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Creates a pending job for a root URL
    ///
    /// `max_pages` overrides the configured page bound for this job.
    pub fn create_crawl_job(
        &self,
        root_url: &str,
        owner: &OwnerIds,
        max_pages: Option<u32>,
    ) -> Result<CrawlJob> {
        let root = normalize_url(root_url)?;
        let max_pages = max_pages.unwrap_or(self.config.crawler.max_pages);
        if max_pages == 0 {
            return Err(ConfigError::Validation("max pages must be at least 1".to_string()).into());
        }

        let mut storage = lock(&self.ctx.storage)?;
        let job_id = storage.create_job(root.as_str(), owner, max_pages)?;
        tracing::info!("Created job {} for {} (max {} pages)", job_id, root, max_pages);
        Ok(storage.get_job(job_id)?)
    }

    /// Runs a pending job to its terminal status
    ///
    /// Returns the final job record. A job that ends `failed` or `cancelled`
    /// is still an `Ok` result, as is a job cancelled before it started;
    /// errors are reserved for jobs that cannot be started or finalized.
    ///
    /// Only the run that moves the job to `processing` registers `cancel`
    /// with [`CrawlService::cancel_job`], so a losing concurrent run of the
    /// same job leaves the winner's registration alone.
    pub async fn run_job(&self, job_id: i64, cancel: CancellationToken) -> Result<CrawlJob> {
        let job = {
            let mut storage = lock(&self.ctx.storage)?;
            if let Err(e) = storage.transition_job(job_id, JobStatus::Processing, None) {
                let job = storage.get_job(job_id).map_err(job_error)?;
                if job.status == JobStatus::Cancelled && job.started_at.is_none() {
                    tracing::info!("Job {} was cancelled before it started", job_id);
                    return Ok(job);
                }
                return Err(job_error(e));
            }
            self.running().insert(job_id, cancel.clone());
            storage.get_job(job_id)?
        };
        tracing::info!("Job {} started for {}", job.id, job.root_url);

        let result = self.traverse(&job, cancel).await;
        self.running().remove(&job_id);

        let (status, message) = match result {
            Ok(counters) => {
                lock(&self.ctx.storage)?.update_job_counters(job_id, &counters)?;
                tracing::info!("Job {} completed", job_id);
                (JobStatus::Completed, None)
            }
            Err(DelveError::Cancelled(_)) => {
                tracing::info!("Job {} cancelled", job_id);
                (JobStatus::Cancelled, Some("cancelled".to_string()))
            }
            Err(e) => {
                tracing::error!("Job {} failed: {}", job_id, e);
                (JobStatus::Failed, Some(e.to_string()))
            }
        };

        let mut storage = lock(&self.ctx.storage)?;
        storage.transition_job(job_id, status, message.as_deref())?;
        Ok(storage.get_job(job_id)?)
    }

    async fn traverse(&self, job: &CrawlJob, cancel: CancellationToken) -> Result<JobCounters> {
        let settings = TraversalSettings::from_config(&self.config, job.max_pages);
        let root = normalize_url(&job.root_url)?;
        let agent = &self.config.user_agent.crawler_name;

        let robots = match &self.robots_client {
            Some(client) if self.config.crawler.respect_robots => {
                RobotsPolicy::fetch(client, &root, agent).await
            }
            _ => RobotsPolicy::allow_all(agent),
        };

        Traversal::new(&self.ctx, job, &settings, robots, cancel)?
            .run()
            .await
    }

    /// Runs a job on its own task
    pub fn spawn_job(&self, job_id: i64) -> JobHandle {
        let cancel = CancellationToken::new();

        let service = self.clone();
        let token = cancel.clone();
        let task = tokio::spawn(async move { service.run_job(job_id, token).await });

        JobHandle {
            job_id,
            cancel,
            task,
        }
    }

    /// Cancels a job
    ///
    /// A running job is signalled and finalizes itself as `cancelled`; a
    /// pending job is cancelled directly. Returns false for jobs that have
    /// already finished.
    pub fn cancel_job(&self, job_id: i64) -> Result<bool> {
        // Lock order: storage, then the running registry
        let mut storage = lock(&self.ctx.storage)?;
        if let Some(token) = self.running().get(&job_id) {
            token.cancel();
            return Ok(true);
        }

        let job = storage.get_job(job_id).map_err(job_error)?;
        if job.status == JobStatus::Pending {
            storage.transition_job(job_id, JobStatus::Cancelled, Some("cancelled before start"))?;
            return Ok(true);
        }
        Ok(false)
    }

    /// Current status and counters of a job
    pub fn get_job_status(&self, job_id: i64) -> Result<CrawlJob> {
        lock(&self.ctx.storage)?.get_job(job_id).map_err(job_error)
    }

    /// Pages recorded for a job, in visit order
    pub fn get_job_pages(&self, job_id: i64) -> Result<Vec<CrawledPage>> {
        let storage = lock(&self.ctx.storage)?;
        storage.get_job(job_id).map_err(job_error)?;
        Ok(storage.list_pages_by_job(job_id)?)
    }

    /// Jobs of a user, newest first
    pub fn list_jobs_for_owner(&self, user_id: &str) -> Result<Vec<CrawlJob>> {
        Ok(lock(&self.ctx.storage)?.list_jobs_by_owner(user_id)?)
    }

    /// Searches indexed content, optionally restricted to one user
    pub async fn search(
        &self,
        query: &str,
        owner: Option<&str>,
        limit: usize,
    ) -> Result<Vec<QueryMatch>> {
        let mut filter = Filter::new();
        if let Some(user_id) = owner {
            filter = filter.field("user_id", user_id);
        }
        Ok(self.ctx.indexer.store().query(query, &filter, limit).await?)
    }
}

fn job_error(e: StorageError) -> DelveError {
    match e {
        StorageError::JobNotFound(id) => DelveError::JobNotFound(id),
        other => other.into(),
    }
}

#[cfg(feature = "browser")]
async fn chrome_fetcher(config: &Config) -> Result<Arc<dyn PageFetcher>> {
    let fetcher =
        crate::crawler::ChromeFetcher::launch(&config.browser, config.user_agent.header_value())
            .await?;
    Ok(Arc::new(fetcher))
}

#[cfg(not(feature = "browser"))]
async fn chrome_fetcher(_config: &Config) -> Result<Arc<dyn PageFetcher>> {
    Err(ConfigError::Validation(
        "browser engine \"chrome\" requires building with the `browser` feature".to_string(),
    )
    .into())
}
