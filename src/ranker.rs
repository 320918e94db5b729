use std::collections::HashSet;

use regex::Regex;
use sha2::{Digest, Sha256};

use crate::models::PageRecord;

const HIGH_SIGNAL_TERMS: &[&str] = &[
    "install",
    "setup",
    "quickstart",
    "getting-started",
    "requirements",
    "dependencies",
];
const MID_SIGNAL_TERMS: &[&str] = &["api", "reference", "methods", "endpoints", "parameters"];
const LOW_SIGNAL_TERMS: &[&str] = &[
    "example",
    "tutorial",
    "guide",
    "how-to",
    "usage",
    "cookbook",
];
const CONFIG_SIGNAL_TERMS: &[&str] = &["configuration", "settings", "options"];

const NEGATIVE_TERMS: &[&str] = &[
    "changelog",
    "release",
    "announcement",
    "blog",
    "news",
    "about",
    "careers",
    "team",
    "press",
    "legal",
    "privacy",
    "terms",
    "cookie",
    "pricing",
    "plans",
    "enterprise",
    "contact",
    "support",
];

const CODE_TOKENS: &[&str] = &["import ", "from ", "def ", "class "];
const MAX_CODE_BONUS: f64 = 15.0;

/// A page annotated with its rank score, ready for composition.
#[derive(Debug, Clone)]
pub struct RankedPage {
    pub page: PageRecord,
    pub score: f64,
}

/// Deduplicate by content hash (keeping the first occurrence), score every
/// remaining page, then sort descending by score with a deterministic
/// (depth asc, url asc) tiebreak.
pub fn rank(pages: Vec<PageRecord>) -> Vec<RankedPage> {
    let deduped = deduplicate(pages);
    let mut ranked: Vec<RankedPage> = deduped
        .into_iter()
        .map(|page| {
            let score = score_page(&page);
            RankedPage { page, score }
        })
        .collect();

    ranked.sort_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| a.page.depth.cmp(&b.page.depth))
            .then_with(|| a.page.url.cmp(&b.page.url))
    });

    ranked
}

fn deduplicate(pages: Vec<PageRecord>) -> Vec<PageRecord> {
    let mut seen_hashes: HashSet<String> = HashSet::new();
    pages
        .into_iter()
        .filter(|page| {
            let normalized = normalize_for_hash(&page.content);
            let mut hasher = Sha256::new();
            hasher.update(normalized.as_bytes());
            let hash = hex::encode(hasher.finalize());
            seen_hashes.insert(hash)
        })
        .collect()
}

fn normalize_for_hash(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn score_page(page: &PageRecord) -> f64 {
    let haystack = format!("{} {}", page.url, page.title).to_lowercase();
    let mut score = 0.0;

    if HIGH_SIGNAL_TERMS.iter().any(|t| haystack.contains(t)) {
        score += 40.0;
    }
    if MID_SIGNAL_TERMS.iter().any(|t| haystack.contains(t)) {
        score += 25.0;
    }
    if LOW_SIGNAL_TERMS.iter().any(|t| haystack.contains(t)) {
        score += 15.0;
    }
    if CONFIG_SIGNAL_TERMS.iter().any(|t| haystack.contains(t)) {
        score += 10.0;
    }

    score += code_density_bonus(&page.content).min(MAX_CODE_BONUS);

    if NEGATIVE_TERMS.iter().any(|t| haystack.contains(t)) {
        score -= 50.0;
    }
    if date_like_path(&page.url) {
        score -= 30.0;
    }

    score += depth_adjustment(page.depth);
    score += length_adjustment(page.content.len());

    score
}

fn code_density_bonus(body: &str) -> f64 {
    let fence_count = body.matches("```").count() as f64;
    let tag_count = body.matches("<code>").count() as f64;
    let token_count: f64 = CODE_TOKENS
        .iter()
        .map(|tok| body.matches(tok).count() as f64)
        .sum();
    (fence_count * 3.0) + (tag_count * 2.0) + token_count
}

fn date_like_path(url: &str) -> bool {
    let date_re = Regex::new(r"\d{4}[-/]\d{2}[-/]\d{2}").expect("valid regex");
    date_re.is_match(url) || url.to_lowercase().contains("changelog") || url.to_lowercase().contains("release-notes")
}

fn depth_adjustment(depth: u32) -> f64 {
    if depth <= 2 {
        5.0
    } else if depth > 4 {
        -10.0
    } else {
        0.0
    }
}

fn length_adjustment(byte_len: usize) -> f64 {
    const KB: usize = 1024;
    match byte_len {
        n if n < KB => -5.0,
        n if n <= 30 * KB => 5.0,
        _ => -10.0,
    }
}
