use std::collections::HashMap;
use thiserror::Error;
use url::Url;

#[derive(Error, Debug)]
pub enum RobotsError {
    #[error("Failed to fetch robots.txt: {0}")]
    FetchError(#[from] reqwest::Error),
    #[error("Invalid URL: {0}")]
    UrlError(String),
}

/// Parsed robots.txt rules for a single domain.
pub struct RobotsChecker {
    /// Map from lowercase user-agent to list of disallowed path prefixes.
    rules: HashMap<String, Vec<String>>,
    /// Map from lowercase user-agent to its declared Crawl-delay, in seconds.
    crawl_delays: HashMap<String, f64>,
    /// Sitemap URLs declared via `Sitemap:` directives.
    pub sitemaps: Vec<String>,
    /// Whether we successfully fetched and parsed the robots.txt.
    pub loaded: bool,
}

impl RobotsChecker {
    /// Fetch and parse robots.txt for the given domain. A missing file or any
    /// fetch error is treated as "nothing disallowed" rather than a hard
    /// failure, matching the conservative-allow policy of the original crawler.
    pub async fn new(domain: &str) -> Result<Self, RobotsError> {
        let robots_url = format!("https://{}/robots.txt", domain);
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(10))
            .build()?;

        let response = match client.get(&robots_url).send().await {
            Ok(resp) if resp.status().is_success() => resp,
            Ok(_) => {
                // No robots.txt or error — everything is allowed
                return Ok(RobotsChecker {
                    rules: HashMap::new(),
                    crawl_delays: HashMap::new(),
                    sitemaps: Vec::new(),
                    loaded: false,
                });
            }
            Err(_) => {
                return Ok(RobotsChecker {
                    rules: HashMap::new(),
                    crawl_delays: HashMap::new(),
                    sitemaps: Vec::new(),
                    loaded: false,
                });
            }
        };

        let body = response.text().await.unwrap_or_default();
        let (rules, crawl_delays, sitemaps) = Self::parse_robots_txt(&body);

        Ok(RobotsChecker {
            rules,
            crawl_delays,
            sitemaps,
            loaded: true,
        })
    }

    /// Create a RobotsChecker from raw robots.txt content (useful for testing).
    pub fn from_content(content: &str) -> Self {
        let (rules, crawl_delays, sitemaps) = Self::parse_robots_txt(content);
        RobotsChecker {
            rules,
            crawl_delays,
            sitemaps,
            loaded: true,
        }
    }

    /// The declared Crawl-delay in seconds for the given user agent, if any,
    /// falling back to the wildcard agent.
    pub fn crawl_delay(&self, user_agent: &str) -> Option<f64> {
        let ua_lower = user_agent.to_lowercase();
        self.crawl_delays
            .get(ua_lower.as_str())
            .or_else(|| self.crawl_delays.get("*"))
            .copied()
    }

    /// Check if the given URL is allowed for the specified user agent.
    ///
    /// When a group exists for the specific user agent, only that group's
    /// rules apply — the wildcard group is consulted only when no specific
    /// group matches.
    pub fn is_allowed(&self, url: &str, user_agent: &str) -> bool {
        let path = match Url::parse(url) {
            Ok(u) => u.path().to_string(),
            Err(_) => return true,
        };

        let ua_lower = user_agent.to_lowercase();

        let disallowed = self
            .rules
            .get(ua_lower.as_str())
            .or_else(|| self.rules.get("*"));

        let Some(disallowed) = disallowed else {
            return true;
        };

        for pattern in disallowed {
            if pattern.is_empty() {
                // "Disallow:" with empty value means allow all
                continue;
            }
            if path.starts_with(pattern) {
                return false;
            }
        }

        true
    }

    /// Parse robots.txt content into disallow rules, crawl-delays, and
    /// declared sitemap URLs.
    #[allow(clippy::type_complexity)]
    fn parse_robots_txt(
        content: &str,
    ) -> (HashMap<String, Vec<String>>, HashMap<String, f64>, Vec<String>) {
        let mut rules: HashMap<String, Vec<String>> = HashMap::new();
        let mut crawl_delays: HashMap<String, f64> = HashMap::new();
        let mut sitemaps: Vec<String> = Vec::new();
        let mut current_agents: Vec<String> = Vec::new();

        for line in content.lines() {
            let line = line.trim();

            // Skip comments and empty lines
            let line = if let Some(idx) = line.find('#') {
                line[..idx].trim()
            } else {
                line
            };

            if line.is_empty() {
                // Empty line resets current user-agent context
                current_agents.clear();
                continue;
            }

            if let Some((key, value)) = line.split_once(':') {
                let key = key.trim().to_lowercase();
                let value = value.trim();

                match key.as_str() {
                    "user-agent" => {
                        let ua = value.to_lowercase();
                        current_agents.push(ua);
                    }
                    "disallow" => {
                        for agent in &current_agents {
                            rules
                                .entry(agent.clone())
                                .or_default()
                                .push(value.to_string());
                        }
                    }
                    "crawl-delay" => {
                        if let Ok(seconds) = value.parse::<f64>() {
                            for agent in &current_agents {
                                crawl_delays.insert(agent.clone(), seconds);
                            }
                        }
                    }
                    "sitemap" => {
                        sitemaps.push(value.to_string());
                    }
                    _ => {
                        // Allow, etc. — we only care about Disallow for blocking
                    }
                }
            }
        }

        (rules, crawl_delays, sitemaps)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE_ROBOTS: &str = r#"
User-agent: *
Disallow: /admin/
Disallow: /private/

User-agent: GPTBot
Disallow: /

User-agent: ClaudeBot
Disallow: /

User-agent: GoogleOther
Disallow: /search
"#;

    #[test]
    fn test_parse_wildcard_rules() {
        let checker = RobotsChecker::from_content(SAMPLE_ROBOTS);
        assert!(checker.loaded);

        // Wildcard blocks /admin/ and /private/
        assert!(!checker.is_allowed("https://example.com/admin/page", "*"));
        assert!(!checker.is_allowed("https://example.com/private/data", "*"));
        assert!(checker.is_allowed("https://example.com/public", "*"));
    }

    #[test]
    fn test_gptbot_blocked() {
        let checker = RobotsChecker::from_content(SAMPLE_ROBOTS);
        // GPTBot is disallowed for everything
        assert!(!checker.is_allowed("https://example.com/", "GPTBot"));
        assert!(!checker.is_allowed("https://example.com/any/page", "GPTBot"));
    }

    #[test]
    fn test_claudebot_blocked() {
        let checker = RobotsChecker::from_content(SAMPLE_ROBOTS);
        assert!(!checker.is_allowed("https://example.com/", "ClaudeBot"));
    }

    #[test]
    fn test_specific_group_overrides_wildcard_entirely() {
        let checker = RobotsChecker::from_content(SAMPLE_ROBOTS);
        // GoogleOther has its own group, so the wildcard's /admin//private/
        // rules never apply to it — only its own Disallow: /search does.
        assert!(!checker.is_allowed("https://example.com/search?q=test", "GoogleOther"));
        assert!(checker.is_allowed("https://example.com/admin/", "GoogleOther"));
        assert!(checker.is_allowed("https://example.com/blog", "GoogleOther"));
    }

    #[test]
    fn test_unknown_bot_uses_wildcard() {
        let checker = RobotsChecker::from_content(SAMPLE_ROBOTS);
        assert!(!checker.is_allowed("https://example.com/admin/", "SomeOtherBot"));
        assert!(checker.is_allowed("https://example.com/public", "SomeOtherBot"));
    }

    #[test]
    fn test_empty_robots() {
        let checker = RobotsChecker::from_content("");
        assert!(checker.is_allowed("https://example.com/anything", "GPTBot"));
    }

    #[test]
    fn test_allow_all_robots() {
        let content = "User-agent: *\nDisallow:\n";
        let checker = RobotsChecker::from_content(content);
        assert!(checker.is_allowed("https://example.com/anything", "GPTBot"));
    }

    #[test]
    fn test_crawl_delay_and_sitemaps() {
        let content = "User-agent: *\nCrawl-delay: 2\nSitemap: https://example.com/sitemap.xml\n";
        let checker = RobotsChecker::from_content(content);
        assert_eq!(checker.crawl_delay("*"), Some(2.0));
        assert_eq!(checker.crawl_delay("GPTBot"), Some(2.0));
        assert_eq!(checker.sitemaps, vec!["https://example.com/sitemap.xml".to_string()]);
    }

    #[test]
    fn test_no_crawl_delay_is_none() {
        let checker = RobotsChecker::from_content(SAMPLE_ROBOTS);
        assert_eq!(checker.crawl_delay("*"), None);
    }
}
