use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::{mpsc, RwLock};
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::composer::{self, Summarizer};
use crate::config::Config;
use crate::crawler::{CrawlEngine, RateLimitedFetcher, RobotsChecker};
use crate::models::{CrawlConfig, Job, JobStatus};
use crate::ranker;
use crate::storage::StorageClient;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CancelOutcome {
    Cancelled,
    NotCancellable,
    NotFound,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArtifactKind {
    LlmTxt,
    LlmsFullTxt,
}

impl ArtifactKind {
    fn filename(&self) -> &'static str {
        match self {
            ArtifactKind::LlmTxt => "llm.txt",
            ArtifactKind::LlmsFullTxt => "llms-full.txt",
        }
    }
}

struct JobEntry {
    job: Job,
    cancel_token: CancellationToken,
}

/// Owns every in-flight and completed Job, and the single background runtime
/// that drives their processing. Each Job is processed by exactly one task
/// for its whole lifetime (single writer).
#[derive(Clone)]
pub struct JobManager {
    config: Arc<Config>,
    storage: Option<Arc<StorageClient>>,
    jobs: Arc<RwLock<HashMap<String, JobEntry>>>,
    tx: mpsc::UnboundedSender<String>,
}

impl JobManager {
    pub fn new(config: Config, storage: Option<Arc<StorageClient>>) -> Self {
        let config = Arc::new(config);
        let jobs: Arc<RwLock<HashMap<String, JobEntry>>> = Arc::new(RwLock::new(HashMap::new()));
        let (tx, rx) = mpsc::unbounded_channel();

        let manager = JobManager {
            config: config.clone(),
            storage: storage.clone(),
            jobs: jobs.clone(),
            tx,
        };

        tokio::spawn(process_loop(config, storage, jobs, rx));
        manager
    }

    /// Create and enqueue a job. Returns immediately; processing happens on
    /// the background runtime.
    pub async fn submit(&self, url: String, crawl_config: CrawlConfig, full_version: bool) -> Job {
        let job_id = Uuid::new_v4().to_string();
        let job = Job::new(job_id.clone(), url, &crawl_config, full_version, now());

        {
            let mut jobs = self.jobs.write().await;
            jobs.insert(
                job_id.clone(),
                JobEntry {
                    job: job.clone(),
                    cancel_token: CancellationToken::new(),
                },
            );
        }

        if let Some(storage) = &self.storage {
            if let Err(e) = storage.save_job(&job).await {
                tracing::warn!(job_id = %job_id, error = %e, "failed to persist new job");
            }
        }

        let _ = self.tx.send(job_id);
        job
    }

    /// In-memory first; falls back to object storage and repopulates the map
    /// on a hit.
    pub async fn status(&self, job_id: &str) -> Option<Job> {
        {
            let jobs = self.jobs.read().await;
            if let Some(entry) = jobs.get(job_id) {
                return Some(entry.job.clone());
            }
        }

        let storage = self.storage.as_ref()?;
        let job = storage.load_job(job_id).await.ok()?;
        let mut jobs = self.jobs.write().await;
        jobs.entry(job_id.to_string()).or_insert_with(|| JobEntry {
            job: job.clone(),
            cancel_token: CancellationToken::new(),
        });
        Some(job)
    }

    /// Idempotent: cancelling an already-terminal job reports
    /// `NotCancellable` rather than erroring.
    pub async fn cancel(&self, job_id: &str) -> CancelOutcome {
        let mut jobs = self.jobs.write().await;
        let Some(entry) = jobs.get_mut(job_id) else {
            return CancelOutcome::NotFound;
        };

        if entry.job.status.is_terminal() {
            return CancelOutcome::NotCancellable;
        }

        entry.cancel_token.cancel();
        if entry.job.transition(now(), JobStatus::Cancelled) {
            entry.job.log(now(), "Job cancelled".to_string());
        }
        CancelOutcome::Cancelled
    }

    /// Fetch a completed job's artifact, preferring the in-memory copy.
    pub async fn artifact(&self, job_id: &str, kind: ArtifactKind) -> Option<String> {
        {
            let jobs = self.jobs.read().await;
            if let Some(entry) = jobs.get(job_id) {
                if entry.job.status != JobStatus::Completed {
                    return None;
                }
                let body = match kind {
                    ArtifactKind::LlmTxt => entry.job.llm_txt.clone(),
                    ArtifactKind::LlmsFullTxt => entry.job.llms_full_txt.clone(),
                };
                if body.is_some() {
                    return body;
                }
            }
        }

        let storage = self.storage.as_ref()?;
        storage.load_result_file(job_id, kind.filename()).await.ok()
    }
}

async fn process_loop(
    config: Arc<Config>,
    storage: Option<Arc<StorageClient>>,
    jobs: Arc<RwLock<HashMap<String, JobEntry>>>,
    mut rx: mpsc::UnboundedReceiver<String>,
) {
    let mut running: JoinSet<()> = JoinSet::new();

    loop {
        tokio::select! {
            biased;

            Some(job_id) = rx.recv() => {
                while running.len() >= config.max_concurrent_jobs {
                    running.join_next().await;
                }
                let config = config.clone();
                let storage = storage.clone();
                let jobs = jobs.clone();
                running.spawn(async move {
                    run_job(job_id, config, storage, jobs).await;
                });
            }
            Some(_) = running.join_next(), if !running.is_empty() => {}
            else => break,
        }
    }
}

async fn run_job(
    job_id: String,
    config: Arc<Config>,
    storage: Option<Arc<StorageClient>>,
    jobs: Arc<RwLock<HashMap<String, JobEntry>>>,
) {
    let cancel_token = {
        let jobs_read = jobs.read().await;
        match jobs_read.get(&job_id) {
            Some(entry) => entry.cancel_token.clone(),
            None => return,
        }
    };

    if cancel_token.is_cancelled() {
        return;
    }

    let (url, max_pages, max_depth, respect_robots, language, full_version) = {
        let jobs_read = jobs.read().await;
        let Some(entry) = jobs_read.get(&job_id) else {
            return;
        };
        (
            entry.job.url.clone(),
            entry.job.max_pages,
            entry.job.max_depth,
            entry.job.respect_robots,
            entry.job.language.clone(),
            entry.job.full_version,
        )
    };

    set_phase(&jobs, &job_id, "initializing", 0.10, "Job started").await;

    let crawl_config = CrawlConfig {
        max_pages,
        max_depth,
        request_delay_seconds: 1.0,
        user_agent: config.default_user_agent.clone(),
        respect_robots,
        follow_redirects: true,
        timeout_seconds: 30,
        language,
    };

    let robots = if respect_robots {
        let domain = url::Url::parse(&url)
            .ok()
            .and_then(|u| u.host_str().map(|h| h.to_string()));
        match domain {
            Some(domain) => RobotsChecker::new(&domain).await.ok(),
            None => None,
        }
    } else {
        None
    };

    let fetcher = RateLimitedFetcher::new(
        config.max_concurrent_fetches as u32,
        crawl_config.timeout_seconds,
        &crawl_config.user_agent,
    );
    let engine = CrawlEngine::new(fetcher, robots, crawl_config);

    set_phase(&jobs, &job_id, "crawling", 0.20, "Crawling started").await;

    let snapshot_every = config.snapshot_every_pages.max(1);
    let jobs_for_progress = jobs.clone();
    let storage_for_progress = storage.clone();
    let job_id_for_progress = job_id.clone();

    let result = engine
        .crawl(&url, &cancel_token, move |progress| {
            let pages_so_far = progress.pages_so_far;
            let candidates_total = progress.candidates_total.max(1);
            let current_url = progress.url.to_string();
            let fraction = (pages_so_far as f64 / candidates_total as f64).min(1.0);
            let progress_value = 0.20 + fraction * 0.40;

            // Mutate job state synchronously so progress updates apply in
            // the order the crawl loop produced them — spawning a task per
            // update would let a later page's write race ahead of an
            // earlier one's and make progress regress.
            let snapshot = {
                let Ok(mut jobs_write) = jobs_for_progress.try_write() else {
                    return;
                };
                let Some(entry) = jobs_write.get_mut(&job_id_for_progress) else {
                    return;
                };
                entry.job.set_progress(now(), progress_value);
                entry.job.current_page_url = Some(current_url);
                entry.job.pages_processed = pages_so_far as u32;
                entry.job.pages_discovered = candidates_total as u32;
                let should_snapshot = pages_so_far > 0 && pages_so_far % snapshot_every == 0;
                if should_snapshot {
                    Some(entry.job.clone())
                } else {
                    None
                }
            };

            if let (Some(storage), Some(job)) = (storage_for_progress.clone(), snapshot) {
                let job_id = job_id_for_progress.clone();
                tokio::spawn(async move {
                    if let Err(e) = storage.save_job(&job).await {
                        tracing::warn!(job_id = %job_id, error = %e, "snapshot persistence failed");
                    }
                });
            }
        })
        .await;

    if cancel_token.is_cancelled() {
        return;
    }

    let crawl_result = match result {
        Ok(r) => r,
        Err(e) => {
            fail_job(&jobs, &storage, &job_id, &e.to_string()).await;
            return;
        }
    };

    if crawl_result.pages.is_empty() {
        fail_job(&jobs, &storage, &job_id, "No pages could be crawled").await;
        return;
    }

    set_phase(&jobs, &job_id, "extracting", 0.60, "Extraction complete").await;

    if cancel_token.is_cancelled() {
        return;
    }

    set_phase(&jobs, &job_id, "composing", 0.70, "Ranking and composing output").await;

    let ranked = ranker::rank(crawl_result.pages.clone());
    let summarizer = config.summarizer_api_key.clone().map(Summarizer::new);
    let max_kb = 200;
    let llm_txt = composer::compose_llm_txt(&ranked, max_kb, summarizer.as_ref()).await;

    let llms_full_txt = if full_version {
        set_phase(&jobs, &job_id, "composing", 0.80, "Composing full export").await;
        Some(composer::compose_llms_full_txt(&ranked))
    } else {
        None
    };

    set_phase(&jobs, &job_id, "composing", 0.90, "Writing artifacts").await;

    if let Some(storage) = &storage {
        if let Err(e) = storage.save_result_file(&job_id, "llm.txt", &llm_txt).await {
            tracing::warn!(job_id = %job_id, error = %e, "failed to persist llm.txt");
        }
        if let Some(ref full) = llms_full_txt {
            if let Err(e) = storage.save_result_file(&job_id, "llms-full.txt", full).await {
                tracing::warn!(job_id = %job_id, error = %e, "failed to persist llms-full.txt");
            }
        }
    }

    let total_size_kb =
        (llm_txt.len() + llms_full_txt.as_ref().map(|s| s.len()).unwrap_or(0)) as f64 / 1024.0;

    if cancel_token.is_cancelled() {
        return;
    }

    {
        let mut jobs_write = jobs.write().await;
        if let Some(entry) = jobs_write.get_mut(&job_id) {
            entry.job.llm_txt = Some(llm_txt);
            entry.job.llms_full_txt = llms_full_txt;
            entry.job.pages_crawled = Some(crawl_result.pages.len() as u32);
            entry.job.total_size_kb = Some(total_size_kb);
            entry.job.set_progress(now(), 1.0);
            if entry.job.transition(now(), JobStatus::Completed) {
                entry.job.log(now(), "Job completed".to_string());
            }
        }
    }

    if let Some(storage) = &storage {
        let snapshot = {
            let jobs_read = jobs.read().await;
            jobs_read.get(&job_id).map(|e| e.job.clone())
        };
        if let Some(job) = snapshot {
            if let Err(e) = storage.save_job(&job).await {
                tracing::warn!(job_id = %job_id, error = %e, "final persistence failed");
            }
        }
    }
}

async fn set_phase(
    jobs: &Arc<RwLock<HashMap<String, JobEntry>>>,
    job_id: &str,
    phase: &str,
    progress: f64,
    message: &str,
) {
    let mut jobs_write = jobs.write().await;
    if let Some(entry) = jobs_write.get_mut(job_id) {
        if entry.job.status.is_terminal() {
            return;
        }
        entry.job.transition(now(), JobStatus::Running);
        entry.job.current_phase = phase.to_string();
        entry.job.set_progress(now(), progress);
        entry.job.log(now(), message.to_string());
    }
}

async fn fail_job(
    jobs: &Arc<RwLock<HashMap<String, JobEntry>>>,
    storage: &Option<Arc<StorageClient>>,
    job_id: &str,
    error: &str,
) {
    let snapshot = {
        let mut jobs_write = jobs.write().await;
        let Some(entry) = jobs_write.get_mut(job_id) else {
            return;
        };
        entry.job.error = Some(error.to_string());
        if entry.job.transition(now(), JobStatus::Failed) {
            entry.job.log(now(), format!("Job failed: {}", error));
        }
        entry.job.clone()
    };

    if let Some(storage) = storage {
        if let Err(e) = storage.save_job(&snapshot).await {
            tracing::warn!(job_id = %job_id, error = %e, "failure persistence failed");
        }
    }
}

fn now() -> f64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_secs_f64())
        .unwrap_or(0.0)
}
