use std::collections::HashMap;

use regex::Regex;
use scraper::{Html, Selector};
use url::Url;

/// Tags stripped outright before content is extracted — navigation chrome,
/// not prose.
const DENOISE_TAGS: &[&str] = &["script", "style", "nav", "footer", "aside", "header"];

/// Substrings checked (case-insensitively) against an element's `class`/`id`
/// attributes to identify navigation chrome that isn't already caught by tag
/// name alone.
const DENOISE_CLASS_HINTS: &[&str] = &[
    "nav",
    "navigation",
    "menu",
    "sidebar",
    "footer",
    "header",
    "breadcrumb",
];

/// CSS selectors tried in order to locate the main content region of a page.
/// The first one that matches anything wins.
const MAIN_CONTENT_SELECTORS: &[&str] = &[
    "main",
    "[role=\"main\"]",
    "article",
    ".main-content",
    ".content",
    ".documentation",
    "#main",
    "#content",
    "#documentation",
];

#[derive(Debug, Clone)]
pub struct ExtractedPage {
    pub title: String,
    pub markdown: String,
    pub text: String,
    pub links: Vec<String>,
    pub lang: Option<String>,
}

#[derive(Debug, thiserror::Error)]
pub enum ExtractError {
    #[error("page language does not match the requested language")]
    LanguageMismatch,
    #[error("no extractable content found")]
    Empty,
}

/// Extract title, main-content markdown/text, and outbound links from a raw
/// HTML document fetched from `page_url`. `headers` are the response headers
/// from the fetch, consulted as a `Content-Language` fallback when the
/// document has no `<html lang>` attribute.
pub fn extract(
    html: &str,
    page_url: &str,
    language: &str,
    headers: &HashMap<String, String>,
) -> Result<ExtractedPage, ExtractError> {
    let document = Html::parse_document(html);

    let lang = detect_lang(&document).or_else(|| content_language_header(headers));
    if should_skip_for_language(lang.as_deref(), language) {
        return Err(ExtractError::LanguageMismatch);
    }

    let title = extract_title(&document);
    let links = extract_links(&document, page_url);

    let main_html = main_content_html(&document);
    if main_html.trim().is_empty() {
        return Err(ExtractError::Empty);
    }

    let markdown = htmd::HtmlToMarkdown::builder()
        .build()
        .convert(&main_html)
        .unwrap_or_default();
    let text = collapse_whitespace(&strip_tags(&main_html));

    if markdown.trim().is_empty() && text.trim().is_empty() {
        return Err(ExtractError::Empty);
    }

    Ok(ExtractedPage {
        title,
        markdown,
        text,
        links,
        lang,
    })
}

/// Read the page's declared language from `<html lang="...">`.
fn detect_lang(document: &Html) -> Option<String> {
    let sel = Selector::parse("html[lang]").ok()?;
    document
        .select(&sel)
        .next()
        .and_then(|el| el.value().attr("lang"))
        .map(|s| s.to_string())
}

/// Fall back to the `Content-Language` response header (e.g. `en-US`) when
/// the document itself declares no language.
fn content_language_header(headers: &HashMap<String, String>) -> Option<String> {
    headers
        .get("content-language")
        .map(|v| v.split(',').next().unwrap_or(v).trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Only enforced when the configured language is English: pages whose
/// declared language doesn't start with "en" are skipped. An unknown
/// (missing) language tag is always allowed through.
fn should_skip_for_language(page_lang: Option<&str>, configured_language: &str) -> bool {
    if !configured_language.to_lowercase().starts_with("en") {
        return false;
    }
    match page_lang {
        Some(lang) => !lang.to_lowercase().starts_with("en"),
        None => false,
    }
}

fn extract_title(document: &Html) -> String {
    let sel = match Selector::parse("title") {
        Ok(s) => s,
        Err(_) => return String::new(),
    };
    document
        .select(&sel)
        .next()
        .map(|el| el.text().collect::<String>().trim().to_string())
        .unwrap_or_default()
}

/// Render the document to HTML with denoise tags/classes removed and the
/// main-content region selected, falling back to the whole body.
fn main_content_html(document: &Html) -> String {
    let cleaned = strip_denoise(&document.html());
    let cleaned_doc = Html::parse_document(&cleaned);

    for selector_str in MAIN_CONTENT_SELECTORS {
        if let Ok(selector) = Selector::parse(selector_str) {
            if let Some(el) = cleaned_doc.select(&selector).next() {
                return el.html();
            }
        }
    }

    if let Ok(body_sel) = Selector::parse("body") {
        if let Some(body) = cleaned_doc.select(&body_sel).next() {
            return body.html();
        }
    }

    cleaned
}

/// Drop denoise tags outright, then drop whole elements whose class/id
/// attribute hints at navigation chrome that a bare tag-name check missed.
fn strip_denoise(html: &str) -> String {
    let mut cleaned = html.to_string();

    for tag in DENOISE_TAGS {
        if let Ok(re) = Regex::new(&format!(r"(?is)<{0}\b[^>]*>.*?</{0}>", tag)) {
            cleaned = re.replace_all(&cleaned, "").to_string();
        }
    }

    let doc = Html::parse_document(&cleaned);
    let Ok(hinted_sel) = Selector::parse("[class], [id]") else {
        return cleaned;
    };

    let mut to_remove: Vec<String> = Vec::new();
    for el in doc.select(&hinted_sel) {
        let class_attr = el.value().attr("class").unwrap_or("").to_lowercase();
        let id_attr = el.value().attr("id").unwrap_or("").to_lowercase();
        if DENOISE_CLASS_HINTS
            .iter()
            .any(|hint| class_attr.contains(hint) || id_attr.contains(hint))
        {
            to_remove.push(el.html());
        }
    }

    // Longest chunks first so a parent element's removal doesn't get beaten
    // to the punch by one of its own children.
    to_remove.sort_by_key(|b| std::cmp::Reverse(b.len()));
    for chunk in to_remove {
        cleaned = cleaned.replacen(&chunk, "", 1);
    }
    cleaned
}

fn strip_tags(fragment_html: &str) -> String {
    let fragment = Html::parse_fragment(fragment_html);
    fragment.root_element().text().collect::<Vec<_>>().join(" ")
}

fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Resolve every `<a href>` on the page to an absolute URL.
fn extract_links(document: &Html, page_url: &str) -> Vec<String> {
    let base = match Url::parse(page_url) {
        Ok(u) => u,
        Err(_) => return Vec::new(),
    };
    let sel = match Selector::parse("a[href]") {
        Ok(s) => s,
        Err(_) => return Vec::new(),
    };

    let mut links = Vec::new();
    for el in document.select(&sel) {
        if let Some(href) = el.value().attr("href") {
            if let Ok(resolved) = base.join(href) {
                let mut resolved = resolved;
                resolved.set_fragment(None);
                links.push(resolved.to_string());
            }
        }
    }
    links
}
