use regex::Regex;

use crate::ranker::RankedPage;

const TRUNCATION_SENTINEL: &str = "\n\n[... content truncated due to size limits ...]";
const SUMMARIZER_INPUT_CAP: usize = 50_000;
const SUMMARIZER_INSTRUCTION: &str = "Condense the following documentation into a dense, accurate markdown digest. Preserve headings, code blocks, and concrete instructions. Do not add commentary.";

#[derive(Debug, thiserror::Error)]
pub enum SummarizeError {
    #[error("summarizer request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("summarizer returned an empty response")]
    Empty,
}

/// Calls an external LLM to compress content that doesn't fit the budget.
/// Deterministic settings (temperature 0, fixed seed) keep output stable
/// across runs for the same input.
pub struct Summarizer {
    client: reqwest::Client,
    api_key: String,
    endpoint: String,
}

impl Summarizer {
    pub fn new(api_key: String) -> Self {
        Summarizer {
            client: reqwest::Client::new(),
            api_key,
            endpoint: "https://api.cohere.ai/v1/chat".to_string(),
        }
    }

    pub async fn summarize(&self, content: &str) -> Result<String, SummarizeError> {
        let truncated: String = content.chars().take(SUMMARIZER_INPUT_CAP).collect();
        let body = serde_json::json!({
            "model": "command-r",
            "message": format!("{}\n\n{}", SUMMARIZER_INSTRUCTION, truncated),
            "temperature": 0.0,
            "seed": 42,
        });

        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await?
            .error_for_status()?;

        let value: serde_json::Value = response.json().await?;
        let text = value
            .get("text")
            .and_then(|v| v.as_str())
            .unwrap_or_default()
            .trim()
            .to_string();

        if text.is_empty() {
            return Err(SummarizeError::Empty);
        }
        Ok(text)
    }
}

/// Concatenate every ranked page into the unabridged artifact. No budget,
/// no truncation, no summarization.
pub fn compose_llms_full_txt(pages: &[RankedPage]) -> String {
    let mut out = String::from("# Full documentation export\n\n");
    let sections: Vec<String> = pages
        .iter()
        .map(|ranked| {
            let page = &ranked.page;
            let body = if !page.markdown.trim().is_empty() {
                &page.markdown
            } else {
                &page.content
            };
            format!(
                "## {}\n\n**URL**: {}\n**Depth**: {}\n\n{}",
                page.page_title_or_url(),
                page.url,
                page.depth,
                body
            )
        })
        .collect();
    out.push_str(&sections.join("\n\n"));
    out
}

/// Compose the budgeted digest. `max_kb` bounds the final UTF-8 byte size.
/// When the unbudgeted content overflows and a summarizer is configured, the
/// assembled content is sent for compression before truncation is applied.
pub async fn compose_llm_txt(
    pages: &[RankedPage],
    max_kb: u32,
    summarizer: Option<&Summarizer>,
) -> String {
    let budget_bytes = (max_kb as usize) * 1024;

    let assembled = assemble_sections(pages);
    let processed = post_process_content(&assembled);

    if processed.len() <= budget_bytes {
        return processed;
    }

    if let Some(summarizer) = summarizer {
        if let Ok(summary) = summarizer.summarize(&processed).await {
            let reprocessed = post_process_content(&summary);
            if reprocessed.len() <= budget_bytes {
                return reprocessed;
            }
            return truncate_to_budget(&reprocessed, budget_bytes);
        }
    }

    truncate_to_budget(&processed, budget_bytes)
}

fn assemble_sections(pages: &[RankedPage]) -> String {
    let sections: Vec<String> = pages
        .iter()
        .map(|ranked| {
            let page = &ranked.page;
            let body = if !page.markdown.trim().is_empty() {
                &page.markdown
            } else {
                &page.content
            };
            format!("## {}\n\n{}", page.page_title_or_url(), body)
        })
        .collect();
    sections.join("\n\n")
}

/// Truncate at a line boundary once the running byte length would overflow
/// the budget, appending the truncation sentinel. If the very first line
/// already overflows, returns an empty budgeted document plus sentinel.
fn truncate_to_budget(content: &str, budget_bytes: usize) -> String {
    let sentinel_len = TRUNCATION_SENTINEL.len();
    if budget_bytes <= sentinel_len {
        return TRUNCATION_SENTINEL.trim_start().to_string();
    }

    let mut out = String::new();
    for line in content.split_inclusive('\n') {
        let would_be = out.len() + line.len();
        if would_be + sentinel_len > budget_bytes {
            let remaining = budget_bytes.saturating_sub(out.len() + sentinel_len);
            if remaining >= 1024 {
                out.push_str(truncate_to_byte_len(line, remaining));
            }
            out.push_str(TRUNCATION_SENTINEL);
            return out;
        }
        out.push_str(line);
    }
    out
}

/// Truncate `s` to at most `max_bytes` bytes, backing off to the nearest
/// preceding char boundary so the result stays valid UTF-8.
fn truncate_to_byte_len(s: &str, max_bytes: usize) -> &str {
    if s.len() <= max_bytes {
        return s;
    }
    let mut end = max_bytes;
    while end > 0 && !s.is_char_boundary(end) {
        end -= 1;
    }
    &s[..end]
}

/// Collapse blank-line runs, strip navigational noise, repair malformed code
/// block gutters, and clamp header levels so none skips a level.
fn post_process_content(content: &str) -> String {
    let collapsed = collapse_blank_lines(content);
    let denoised = strip_navigation_noise(&collapsed);
    let regutted = strip_code_block_gutters(&denoised);
    clamp_header_levels(&regutted)
}

fn collapse_blank_lines(content: &str) -> String {
    let blank_run_re = Regex::new(r"\n{3,}").expect("valid regex");
    blank_run_re.replace_all(content, "\n\n").to_string()
}

fn strip_navigation_noise(content: &str) -> String {
    let noise_re = Regex::new(
        r"(?m)^(Built with.*|GET STARTED.*|[\p{L}\p{N}]\s*$|(?:→|»|›)\s*$)\n?",
    )
    .expect("valid regex");
    noise_re.replace_all(content, "").to_string()
}

/// Strip gutter artifacts like `12| some code` or leading `---|---` table
/// dividers that leak into fenced code blocks from source-viewer markup.
fn strip_code_block_gutters(content: &str) -> String {
    let gutter_re = Regex::new(r"(?m)^\d+\|\s?").expect("valid regex");
    let divider_re = Regex::new(r"(?m)^\s*---\|---.*$\n?").expect("valid regex");
    let bar_re = Regex::new(r"(?m)^\s*\|\s*$\n?").expect("valid regex");

    let stage1 = gutter_re.replace_all(content, "");
    let stage2 = divider_re.replace_all(&stage1, "");
    bar_re.replace_all(&stage2, "").to_string()
}

/// Ensure no header level skips one relative to the previous header,
/// e.g. `##` followed by `####` becomes `##` followed by `###`.
fn clamp_header_levels(content: &str) -> String {
    let header_re = Regex::new(r"^(#{1,6})(\s.*)$").expect("valid regex");
    let mut last_level: Option<usize> = None;
    let mut out = String::new();

    for line in content.lines() {
        if let Some(caps) = header_re.captures(line) {
            let level = caps[1].len().clamp(1, 6);
            let rest = &caps[2];

            let emitted_level = match last_level {
                Some(prev) if level > prev + 1 => prev + 1,
                _ => level,
            };
            last_level = Some(emitted_level);

            out.push_str(&"#".repeat(emitted_level));
            out.push_str(rest);
            out.push('\n');
        } else {
            out.push_str(line);
            out.push('\n');
        }
    }

    if !content.ends_with('\n') {
        out.pop();
    }
    out
}

/// Lightweight quality check: non-empty output, balanced fenced code blocks,
/// and total size no more than twice the budget.
pub fn validate(content: &str, max_kb: u32) -> (bool, Vec<String>) {
    let mut issues = Vec::new();

    if content.trim().is_empty() {
        issues.push("output is empty".to_string());
    }

    let fence_count = content.matches("```").count();
    if fence_count % 2 != 0 {
        issues.push("unbalanced fenced code blocks".to_string());
    }

    let max_bytes = (max_kb as usize) * 1024 * 2;
    if content.len() > max_bytes {
        issues.push(format!(
            "output size {} bytes exceeds 2x budget ({} bytes)",
            content.len(),
            max_bytes
        ));
    }

    (issues.is_empty(), issues)
}

impl crate::models::PageRecord {
    fn page_title_or_url(&self) -> &str {
        if self.title.trim().is_empty() {
            &self.url
        } else {
            &self.title
        }
    }
}
