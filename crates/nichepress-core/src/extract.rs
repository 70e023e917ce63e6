//! Field extraction from fetched HTML.
//!
//! Marketplace, YouTube and Google pages are scraped through a proxy and
//! parsed here with CSS selectors and a few fixed patterns. Every extractor
//! degrades to a default instead of failing: a missing price is "N/A", not an
//! error.

use std::collections::HashSet;
use std::sync::LazyLock;

use regex::Regex;
use scraper::{Html, Selector};
use url::Url;

use crate::error::AppError;
use crate::models::ScrapedProduct;

pub const MARKETPLACE_ORIGIN: &str = "https://www.amazon.com";

/// Google's interstitial shown instead of results when it suspects a bot.
pub const SERP_BLOCK_MARKER: &str = "Our systems have detected unusual traffic";

static ASIN_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"/([A-Z0-9]{10})(?:[/?]|$)").expect("valid ASIN pattern"));

static PRODUCT_LINK_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"href="(/(?:[^/"]+/)?dp/[A-Z0-9]{10})"#).expect("valid product link pattern")
});

static HIRES_IMAGE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#""hiRes":"([^"]+)""#).expect("valid hiRes pattern"));

static VIDEO_ID_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"/watch\?v=([a-zA-Z0-9_-]{11})").expect("valid video id pattern")
});

static RESULT_LINK_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"href="(https?://[^"]+)""#).expect("valid link pattern"));

static WHITESPACE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\s+").expect("valid whitespace pattern"));

/// Extract the 10-character product identifier from a marketplace URL.
///
/// `https://example.com/dp/B0007PQ16U` → `Some("B0007PQ16U")`.
pub fn extract_asin(url: &str) -> Option<String> {
    ASIN_RE
        .captures(url)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().to_string())
}

/// Parse a product detail page.
pub fn parse_product_page(html: &str, asin: &str, product_url: &str) -> ScrapedProduct {
    let doc = Html::parse_document(html);

    let title = ["#productTitle", "h1#title", "title"]
        .iter()
        .find_map(|sel| first_text(&doc, sel))
        .map(|t| clean_title(&t))
        .filter(|t| !t.is_empty())
        .unwrap_or_else(|| "Unknown Title".to_string());

    let price = first_text(&doc, "span.a-offscreen").unwrap_or_else(|| "N/A".to_string());
    let rating = first_text(&doc, "span.a-icon-alt").unwrap_or_else(|| "N/A".to_string());
    let review_count =
        first_text(&doc, "#acrCustomerReviewText").unwrap_or_else(|| "0".to_string());

    let image_url = HIRES_IMAGE_RE
        .captures(html)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().to_string())
        .or_else(|| first_attr(&doc, "img#landingImage", "src"))
        .or_else(|| first_attr(&doc, "img#imgBlkFront", "src"));

    ScrapedProduct {
        asin: asin.to_string(),
        title,
        price,
        rating,
        review_count,
        image_url,
        product_url: product_url.to_string(),
    }
}

/// Marketplace search URL for a keyword.
pub fn search_url(keyword: &str) -> Result<String, AppError> {
    with_query(&format!("{MARKETPLACE_ORIGIN}/s"), &[("k", keyword.trim())])
}

fn with_query(base: &str, params: &[(&str, &str)]) -> Result<String, AppError> {
    Url::parse_with_params(base, params)
        .map(String::from)
        .map_err(|e| AppError::ConfigError(format!("Invalid URL {base}: {e}")))
}

/// Collect up to `limit` product URLs from a search results page,
/// deduplicated by ASIN, in page order.
pub fn parse_search_results(html: &str, limit: usize) -> Vec<String> {
    let mut seen = HashSet::new();
    let mut urls = Vec::new();

    for cap in PRODUCT_LINK_RE.captures_iter(html) {
        if urls.len() >= limit {
            break;
        }
        let full_url = format!("{MARKETPLACE_ORIGIN}{}", &cap[1]);
        if let Some(asin) = extract_asin(&full_url)
            && seen.insert(asin)
        {
            urls.push(full_url);
        }
    }

    urls
}

/// h1–h3 texts of a page: at most 10 per level and 50 overall.
pub fn parse_headings(html: &str) -> Vec<String> {
    let doc = Html::parse_document(html);
    let mut headings = Vec::new();

    for tag in ["h1", "h2", "h3"] {
        let Ok(selector) = Selector::parse(tag) else {
            continue;
        };
        headings.extend(
            doc.select(&selector)
                .map(|el| collapse_whitespace(&el.text().collect::<String>()))
                .filter(|t| t.chars().count() > 5)
                .take(10),
        );
    }

    headings.truncate(50);
    headings
}

/// YouTube results page URL for a product review search.
pub fn video_search_url(product_title: &str) -> Result<String, AppError> {
    let query = format!("{} review", product_title.trim());
    with_query(
        "https://www.youtube.com/results",
        &[("search_query", query.as_str())],
    )
}

/// First video id linked from a YouTube results page.
pub fn find_video_id(html: &str) -> Option<String> {
    VIDEO_ID_RE
        .captures(html)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().to_string())
}

/// Position of a domain among organic search results.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SerpRank {
    /// 1-based rank, `None` when the domain was not found.
    pub rank: Option<usize>,
    pub url: Option<String>,
    /// Number of distinct result domains inspected.
    pub scanned: usize,
}

/// Strip scheme and path: `https://example.com/blog` → `example.com`.
pub fn normalize_domain(target: &str) -> String {
    target
        .trim()
        .trim_start_matches("https://")
        .trim_start_matches("http://")
        .split('/')
        .next()
        .unwrap_or_default()
        .to_string()
}

/// Rank `target_domain` among the distinct result domains of a Google page.
pub fn rank_domain(html: &str, target_domain: &str) -> SerpRank {
    let target = normalize_domain(target_domain);
    let mut seen = HashSet::new();

    for cap in RESULT_LINK_RE.captures_iter(html) {
        let link = &cap[1];
        if link.contains("google.com")
            || link.contains("youtube.com")
            || link.contains("/search")
            || link.contains("webcache")
        {
            continue;
        }
        let Some(domain) = link.split("//").nth(1).and_then(|r| r.split('/').next()) else {
            continue;
        };
        if domain.is_empty() || !seen.insert(domain.to_string()) {
            continue;
        }
        if !target.is_empty() && domain.contains(&target) {
            return SerpRank {
                rank: Some(seen.len()),
                url: Some(link.to_string()),
                scanned: seen.len(),
            };
        }
    }

    SerpRank {
        rank: None,
        url: None,
        scanned: seen.len(),
    }
}

fn first_text(doc: &Html, selector: &str) -> Option<String> {
    let selector = Selector::parse(selector).ok()?;
    doc.select(&selector)
        .map(|el| collapse_whitespace(&el.text().collect::<String>()))
        .find(|t| !t.is_empty())
}

fn first_attr(doc: &Html, selector: &str, attr: &str) -> Option<String> {
    let selector = Selector::parse(selector).ok()?;
    doc.select(&selector)
        .filter_map(|el| el.value().attr(attr))
        .map(str::trim)
        .find(|v| !v.is_empty())
        .map(str::to_string)
}

fn collapse_whitespace(text: &str) -> String {
    WHITESPACE_RE.replace_all(text.trim(), " ").into_owned()
}

fn clean_title(title: &str) -> String {
    title
        .replace("Amazon.com:", "")
        .replace(" : Clothing, Shoes & Jewelry", "")
        .trim()
        .to_string()
}
