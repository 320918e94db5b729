pub mod extractor;
pub mod fetcher;
pub mod frontier;
pub mod robots;
pub mod sitemap;

pub use fetcher::RateLimitedFetcher;
pub use robots::RobotsChecker;

use std::collections::HashSet;
use std::time::{Duration, Instant};

use scraper::{Html, Selector};
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use url::Url;

use crate::models::{CrawlConfig, CrawlResult, PageRecord};
use frontier::Frontier;

/// Keyword vocabulary used to recognize documentation-shaped links when a
/// site has no usable sitemap.
const DOC_KEYWORDS: &[&str] = &[
    "doc",
    "api",
    "guide",
    "tutorial",
    "reference",
    "manual",
    "help",
    "example",
    "getting-started",
];

/// Paths worth guessing outright even if the seed page doesn't link to them.
const FALLBACK_GUESS_PATHS: &[&str] = &["/docs", "/api"];

/// Non-HTML file extensions that are never worth fetching as documentation.
const NON_HTML_EXTENSIONS: &[&str] = &[
    ".pdf", ".doc", ".docx", ".xls", ".xlsx", ".ppt", ".pptx", ".zip", ".tar", ".gz", ".rar",
    ".7z", ".jpg", ".jpeg", ".png", ".gif", ".bmp", ".svg", ".mp3", ".mp4", ".avi", ".mov",
    ".wav", ".css", ".js", ".json", ".xml", ".txt",
];

const MAX_CHILD_SITEMAPS: usize = 5;

#[derive(Debug, Error)]
pub enum CrawlEngineError {
    #[error("invalid seed URL: {0}")]
    InvalidSeed(String),
}

/// A single step of crawl progress, reported after every fetch attempt.
#[derive(Debug, Clone)]
pub struct CrawlProgress<'a> {
    pub url: &'a str,
    pub depth: u32,
    /// HTTP status of the fetch, if one was made at all (`None` when the
    /// page was skipped before a request, e.g. blocked by robots).
    pub status_code: Option<u16>,
    pub pages_so_far: usize,
    pub candidates_total: usize,
}

/// Drives discovery, filtering, BFS-by-depth fetching, and extraction for a
/// single seed URL.
pub struct CrawlEngine {
    fetcher: RateLimitedFetcher,
    robots: Option<RobotsChecker>,
    config: CrawlConfig,
}

impl CrawlEngine {
    pub fn new(fetcher: RateLimitedFetcher, robots: Option<RobotsChecker>, config: CrawlConfig) -> Self {
        CrawlEngine {
            fetcher,
            robots,
            config,
        }
    }

    pub async fn crawl(
        &self,
        seed_url: &str,
        cancel: &CancellationToken,
        mut on_progress: impl FnMut(CrawlProgress),
    ) -> Result<CrawlResult, CrawlEngineError> {
        let started = Instant::now();
        let seed = Url::parse(seed_url).map_err(|e| CrawlEngineError::InvalidSeed(e.to_string()))?;

        let candidates = self.discover_candidates(&seed).await;
        let buckets = self.bucket_by_depth(&seed, candidates);
        let candidates_total: usize = buckets.values().map(|v| v.len()).sum();

        let mut frontier = Frontier::new(&[seed.to_string()], self.config.max_depth);
        for (depth, urls) in &buckets {
            // Frontier dedups against its `seen` set, so re-adding the seed
            // at depth 0 here is harmless.
            frontier.add_discovered(urls, *depth);
        }

        let mut pages = Vec::new();
        let mut failed_urls = Vec::new();
        let mut blocked_urls = Vec::new();

        while let Some((url, depth)) = frontier.next() {
            if cancel.is_cancelled() {
                break;
            }
            if pages.len() >= self.config.max_pages as usize {
                break;
            }

            if let Some(ref checker) = self.robots {
                if !checker.is_allowed(&url, &self.config.user_agent) {
                    blocked_urls.push(url);
                    continue;
                }
            }

            let status_code = match self.fetch_and_extract(&url, depth).await {
                Ok((page, status_code)) => {
                    pages.push(page);
                    Some(status_code)
                }
                Err(status_code) => {
                    failed_urls.push(url.clone());
                    status_code
                }
            };

            on_progress(CrawlProgress {
                url: &url,
                depth,
                status_code,
                pages_so_far: pages.len(),
                candidates_total,
            });

            let delay = self.politeness_delay(&url);
            tokio::time::sleep(delay).await;
        }

        Ok(CrawlResult::new(
            pages,
            failed_urls,
            blocked_urls,
            started.elapsed().as_secs_f64(),
        ))
    }

    fn politeness_delay(&self, url: &str) -> Duration {
        let robots_delay = self.crawl_delay_for(url);
        let seconds = self.config.request_delay_seconds.max(robots_delay);
        Duration::from_secs_f64(seconds.max(0.0))
    }

    fn crawl_delay_for(&self, url: &str) -> f64 {
        self.robots
            .as_ref()
            .and_then(|r| r.crawl_delay(&self.config.user_agent))
            .filter(|_| Url::parse(url).is_ok())
            .unwrap_or(0.0)
    }

    /// Fetch and extract a single page. On success, returns the page plus its
    /// HTTP status. On failure, returns the status if a response was at
    /// least received (extraction failed) or `None` if the fetch itself
    /// failed.
    async fn fetch_and_extract(&self, url: &str, depth: u32) -> Result<(PageRecord, u16), Option<u16>> {
        let fetched = self.fetcher.fetch(url).await.map_err(|_| None)?;
        let extracted = extractor::extract(
            &fetched.body,
            &fetched.final_url,
            &self.config.language,
            &fetched.headers,
        )
        .map_err(|_| Some(fetched.status_code))?;

        let word_count = extracted.text.split_whitespace().count() as u32;
        let char_count = extracted.text.chars().count() as u32;
        let markdown_length = extracted.markdown.len() as u32;

        Ok((
            PageRecord {
                url: url.to_string(),
                final_url: fetched.final_url,
                title: extracted.title,
                content: extracted.text,
                markdown: extracted.markdown,
                depth,
                timestamp: now_unix_secs(),
                status_code: fetched.status_code,
                content_type: "text/html".to_string(),
                links: extracted.links,
                word_count,
                char_count,
                markdown_length,
            },
            fetched.status_code,
        ))
    }

    /// Candidate URL set: sitemap discovery union the fallback link scan,
    /// always including the seed.
    async fn discover_candidates(&self, seed: &Url) -> Vec<String> {
        let mut candidates: HashSet<String> = HashSet::new();
        candidates.insert(seed.to_string());

        let seed_domain = seed.host_str().unwrap_or_default().to_string();

        let declared_sitemaps: Vec<String> = self
            .robots
            .as_ref()
            .map(|r| r.sitemaps.clone())
            .unwrap_or_default();

        let sitemap_urls = if declared_sitemaps.is_empty() {
            sitemap::discover_well_known_sitemaps(seed.as_str()).await
        } else {
            declared_sitemaps
        };

        if !sitemap_urls.is_empty() {
            let result = sitemap::fetch_sitemap_urls(&sitemap_urls, &seed_domain, MAX_CHILD_SITEMAPS).await;
            candidates.extend(result.urls);
        }

        if candidates.len() <= 1 {
            candidates.extend(self.fallback_discovery(seed).await);
        }

        candidates.into_iter().collect()
    }

    /// Fetch the seed page and keep same-host anchors that look like
    /// documentation, plus a handful of hard-coded guessed paths.
    async fn fallback_discovery(&self, seed: &Url) -> Vec<String> {
        let mut found = Vec::new();

        for path in FALLBACK_GUESS_PATHS {
            if let Ok(joined) = seed.join(path) {
                found.push(joined.to_string());
            }
        }

        let Ok(fetched) = self.fetcher.fetch(seed.as_str()).await else {
            return found;
        };

        let document = Html::parse_document(&fetched.body);
        let Ok(sel) = Selector::parse("a[href]") else {
            return found;
        };

        for el in document.select(&sel) {
            let Some(href) = el.value().attr("href") else {
                continue;
            };
            let Ok(resolved) = seed.join(href) else {
                continue;
            };
            if resolved.host_str() != seed.host_str() {
                continue;
            }
            let path_lower = resolved.path().to_lowercase();
            if DOC_KEYWORDS.iter().any(|kw| path_lower.contains(kw)) {
                found.push(resolved.to_string());
            }
        }

        found
    }

    /// Normalize and filter candidates, then bucket them by depth relative
    /// to the seed path.
    fn bucket_by_depth(&self, seed: &Url, candidates: Vec<String>) -> std::collections::HashMap<u32, Vec<String>> {
        let seed_host = seed.host_str().unwrap_or_default();
        let seed_segments = path_segments(seed);

        let mut buckets: std::collections::HashMap<u32, Vec<String>> = std::collections::HashMap::new();
        for raw in candidates {
            let Ok(url) = Url::parse(&raw) else { continue };
            if url.host_str() != Some(seed_host) {
                continue;
            }
            if is_non_html_url(&url) {
                continue;
            }
            if self.should_skip_for_locale(&url) {
                continue;
            }

            let depth = path_segments(&url).len().saturating_sub(seed_segments.len()) as u32;
            let depth = depth.max(0);
            if depth > self.config.max_depth {
                continue;
            }
            buckets.entry(depth).or_default().push(url.to_string());
        }

        for urls in buckets.values_mut() {
            urls.sort();
            urls.dedup();
        }
        buckets
    }

    fn should_skip_for_locale(&self, url: &Url) -> bool {
        if !self.config.language.to_lowercase().starts_with("en") {
            return false;
        }
        let Some(first_segment) = path_segments(url).into_iter().next() else {
            return false;
        };
        let looks_like_locale = first_segment.len() >= 2
            && first_segment.len() <= 7
            && first_segment
                .chars()
                .all(|c| c.is_ascii_lowercase() || c == '-');
        looks_like_locale && !first_segment.starts_with("en")
    }
}

fn path_segments(url: &Url) -> Vec<String> {
    url.path_segments()
        .map(|segs| segs.filter(|s| !s.is_empty()).map(|s| s.to_string()).collect())
        .unwrap_or_default()
}

fn is_non_html_url(url: &Url) -> bool {
    let path = url.path().to_lowercase();
    NON_HTML_EXTENSIONS.iter().any(|ext| path.ends_with(ext))
}

fn now_unix_secs() -> f64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_secs_f64())
        .unwrap_or(0.0)
}
