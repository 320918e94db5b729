use serde::{Deserialize, Serialize};

fn default_true() -> bool {
    true
}

fn default_max_pages() -> u32 {
    150
}

fn default_max_depth() -> u32 {
    5
}

fn default_language() -> String {
    "en".to_string()
}

/// Per-job crawl parameters. Immutable once a job is created.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CrawlConfig {
    #[serde(default = "default_max_pages")]
    pub max_pages: u32,
    #[serde(default = "default_max_depth")]
    pub max_depth: u32,
    #[serde(default = "default_request_delay")]
    pub request_delay_seconds: f64,
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
    #[serde(default = "default_true")]
    pub respect_robots: bool,
    #[serde(default = "default_true")]
    pub follow_redirects: bool,
    #[serde(default = "default_timeout")]
    pub timeout_seconds: u64,
    #[serde(default = "default_language")]
    pub language: String,
}

fn default_request_delay() -> f64 {
    1.0
}

fn default_user_agent() -> String {
    "llm-txt-generator/0.1.0".to_string()
}

fn default_timeout() -> u64 {
    30
}

impl Default for CrawlConfig {
    fn default() -> Self {
        CrawlConfig {
            max_pages: default_max_pages(),
            max_depth: default_max_depth(),
            request_delay_seconds: default_request_delay(),
            user_agent: default_user_agent(),
            respect_robots: true,
            follow_redirects: true,
            timeout_seconds: default_timeout(),
            language: default_language(),
        }
    }
}

/// A single successfully fetched and extracted HTML document.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PageRecord {
    pub url: String,
    pub final_url: String,
    pub title: String,
    pub content: String,
    pub markdown: String,
    pub depth: u32,
    pub timestamp: f64,
    pub status_code: u16,
    pub content_type: String,
    pub links: Vec<String>,
    pub word_count: u32,
    pub char_count: u32,
    pub markdown_length: u32,
}

/// Outcome of crawling one seed URL.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CrawlResult {
    pub pages: Vec<PageRecord>,
    pub failed_urls: Vec<String>,
    pub blocked_urls: Vec<String>,
    pub total_pages: usize,
    pub success_rate: f64,
    pub duration_seconds: f64,
}

impl CrawlResult {
    pub fn new(
        pages: Vec<PageRecord>,
        failed_urls: Vec<String>,
        blocked_urls: Vec<String>,
        duration_seconds: f64,
    ) -> Self {
        let total_pages = pages.len();
        let denom = total_pages + failed_urls.len();
        let success_rate = if denom == 0 {
            0.0
        } else {
            total_pages as f64 / denom as f64
        };

        CrawlResult {
            pages,
            failed_urls,
            blocked_urls,
            total_pages,
            success_rate,
            duration_seconds,
        }
    }
}

/// Lifecycle status of a generation job. Terminal states are sinks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Pending,
    Running,
    Completed,
    Failed,
    Cancelled,
}

impl JobStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            JobStatus::Completed | JobStatus::Failed | JobStatus::Cancelled
        )
    }
}

/// The unit of work tracked by the job store and exposed through the API.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Job {
    pub job_id: String,
    pub url: String,
    pub max_pages: u32,
    pub max_depth: u32,
    pub full_version: bool,
    pub respect_robots: bool,
    pub language: String,

    pub status: JobStatus,
    pub progress: f64,
    pub message: String,

    pub created_at: f64,
    pub last_updated: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<f64>,

    pub current_phase: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub current_page_url: Option<String>,
    pub pages_discovered: u32,
    pub pages_processed: u32,
    pub processing_logs: Vec<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub pages_crawled: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total_size_kb: Option<f64>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub llm_txt: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub llms_full_txt: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub llm_txt_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub llms_full_txt_url: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl Job {
    pub fn new(job_id: String, url: String, config: &CrawlConfig, full_version: bool, now: f64) -> Self {
        Job {
            job_id,
            url,
            max_pages: config.max_pages,
            max_depth: config.max_depth,
            full_version,
            respect_robots: config.respect_robots,
            language: config.language.clone(),
            status: JobStatus::Pending,
            progress: 0.0,
            message: "Job queued".to_string(),
            created_at: now,
            last_updated: now,
            completed_at: None,
            current_phase: "initializing".to_string(),
            current_page_url: None,
            pages_discovered: 0,
            pages_processed: 0,
            processing_logs: Vec::new(),
            pages_crawled: None,
            total_size_kb: None,
            llm_txt: None,
            llms_full_txt: None,
            llm_txt_url: None,
            llms_full_txt_url: None,
            error: None,
        }
    }

    /// Append a timestamped log line. Append-only: never mutates earlier entries.
    pub fn log(&mut self, now: f64, message: impl Into<String>) {
        let message = message.into();
        self.processing_logs
            .push(format!("{} - {}", format_timestamp(now), message));
        self.message = message;
        self.last_updated = now;
    }

    /// Set progress, clamped to [0, 1]. Monotonicity is enforced by callers
    /// driving the phase sequence forward; this only guards the range.
    pub fn set_progress(&mut self, now: f64, progress: f64) {
        self.progress = progress.clamp(0.0, 1.0);
        self.last_updated = now;
    }

    /// Transition to a new status, respecting the terminal-state sink rule.
    /// Returns false (no-op) if the current status is already terminal.
    pub fn transition(&mut self, now: f64, status: JobStatus) -> bool {
        if self.status.is_terminal() {
            return false;
        }
        self.status = status;
        self.last_updated = now;
        if status.is_terminal() {
            self.completed_at = Some(now);
        }
        true
    }
}

fn format_timestamp(unix_secs: f64) -> String {
    use chrono::{DateTime, Utc};
    let dt = DateTime::<Utc>::from_timestamp(unix_secs as i64, 0).unwrap_or_else(|| Utc::now());
    dt.format("%Y-%m-%d %H:%M:%S").to_string()
}

// --- HTTP API DTOs (mirrors original_source/llm_txt/api/models.py) ---

fn default_full_version() -> bool {
    false
}

#[derive(Debug, Clone, Deserialize)]
pub struct GenerationRequest {
    pub url: String,
    #[serde(default = "default_max_pages")]
    pub max_pages: u32,
    #[serde(default = "default_max_depth")]
    pub max_depth: u32,
    #[serde(default = "default_full_version")]
    pub full_version: bool,
    #[serde(default = "default_true")]
    pub respect_robots: bool,
    #[serde(default = "default_language")]
    pub language: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct GenerationResponse {
    pub job_id: String,
    pub status: JobStatus,
    pub message: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub timestamp: f64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn success_rate_all_pages_succeed() {
        let pages = vec![make_page("a"), make_page("b")];
        let result = CrawlResult::new(pages, vec![], vec![], 1.0);
        assert_eq!(result.success_rate, 1.0);
    }

    #[test]
    fn success_rate_mixed() {
        let pages = vec![make_page("a")];
        let result = CrawlResult::new(pages, vec!["bad".to_string()], vec![], 1.0);
        assert_eq!(result.success_rate, 0.5);
    }

    #[test]
    fn success_rate_zero_attempts_is_zero() {
        let result = CrawlResult::new(vec![], vec![], vec![], 0.0);
        assert_eq!(result.success_rate, 0.0);
    }

    #[test]
    fn terminal_transition_is_a_sink() {
        let config = CrawlConfig::default();
        let mut job = Job::new("j1".to_string(), "https://example.com".to_string(), &config, false, 0.0);
        assert!(job.transition(1.0, JobStatus::Running));
        assert!(job.transition(2.0, JobStatus::Completed));
        assert!(!job.transition(3.0, JobStatus::Running));
        assert_eq!(job.status, JobStatus::Completed);
    }

    #[test]
    fn progress_clamped_to_unit_interval() {
        let config = CrawlConfig::default();
        let mut job = Job::new("j1".to_string(), "https://example.com".to_string(), &config, false, 0.0);
        job.set_progress(1.0, 1.5);
        assert_eq!(job.progress, 1.0);
        job.set_progress(1.0, -0.2);
        assert_eq!(job.progress, 0.0);
    }

    fn make_page(url: &str) -> PageRecord {
        PageRecord {
            url: url.to_string(),
            final_url: url.to_string(),
            title: "Title".to_string(),
            content: "content".to_string(),
            markdown: "content".to_string(),
            depth: 0,
            timestamp: 0.0,
            status_code: 200,
            content_type: "text/html".to_string(),
            links: vec![],
            word_count: 1,
            char_count: 7,
            markdown_length: 7,
        }
    }
}
