// src/app/source.rs
// Movie-database access: page/image fetching, then poster and title metadata
// extraction from the search and title pages.

use std::time::Duration;

use once_cell::sync::Lazy;
use regex::Regex;
use reqwest::blocking::Client;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, ACCEPT_LANGUAGE};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

use crate::app::error::FetchError;
use crate::config::AppConfig;

/// Class on the title link of each search result.
const RESULT_TITLE_CLASS: &str = "ipc-metadata-list-summary-item__t";
/// Class token on the primary poster image of a title page.
const POSTER_IMAGE_CLASS: &str = "ipc-image";

static ANCHOR_TAG: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?is)<a\s[^>]*>").expect("valid regex"));
static IMG_TAG: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?is)<img\s[^>]*>").expect("valid regex"));
static ATTR: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?s)([A-Za-z_:][-A-Za-z0-9_:.]*)\s*=\s*(?:"([^"]*)"|'([^']*)')"#)
        .expect("valid regex")
});
static TITLE_HREF: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"href\s*=\s*"(/title/tt\d+/?[^"]*)""#).expect("valid regex"));
static LD_JSON: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?is)<script[^>]*type\s*=\s*["']application/ld\+json["'][^>]*>(.*?)</script>"#)
        .expect("valid regex")
});
static TITLE_TAG: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?is)<title[^>]*>(.*?)</title>").expect("valid regex"));
// "Die Hard (1988) - Site", "Heat (TV Movie 1995) - Site"
static TITLE_WITH_YEAR: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(.+?)\s*\((?:[^()]*?\s)?(\d{4})\)").expect("valid regex"));

/// Title metadata scraped from a detail page. Every field is best effort.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TitleInfo {
    pub title: Option<String>,
    pub year: Option<u16>,
    pub rating: Option<f32>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub genres: Vec<String>,
    pub plot: Option<String>,
}

impl TitleInfo {
    pub fn is_empty(&self) -> bool {
        self.title.is_none()
            && self.year.is_none()
            && self.rating.is_none()
            && self.genres.is_empty()
            && self.plot.is_none()
    }

    /// "1988 · ★ 8.2", or whichever half is known.
    pub fn year_and_rating(&self) -> Option<String> {
        match (self.year, self.rating) {
            (Some(y), Some(r)) => Some(format!("{y} · ★ {r:.1}")),
            (Some(y), None) => Some(y.to_string()),
            (None, Some(r)) => Some(format!("★ {r:.1}")),
            (None, None) => None,
        }
    }
}

/// Where poster pages and images come from.
pub trait PosterSource: Send + Sync {
    fn fetch_text(&self, url: &str) -> Result<String, FetchError>;
    fn fetch_bytes(&self, url: &str) -> Result<Vec<u8>, FetchError>;
}

/// Blocking HTTP source with browser-like headers.
pub struct HttpSource {
    client: Client,
}

impl HttpSource {
    pub fn new(cfg: &AppConfig) -> Result<Self, FetchError> {
        let client = Client::builder()
            .user_agent(cfg.user_agent.clone())
            .timeout(Duration::from_secs(cfg.request_timeout_secs))
            .default_headers({
                let mut h = HeaderMap::new();
                h.insert(
                    ACCEPT,
                    HeaderValue::from_static(
                        "text/html,application/xhtml+xml,application/xml;q=0.9,image/webp,*/*;q=0.8",
                    ),
                );
                h.insert(ACCEPT_LANGUAGE, HeaderValue::from_static("en-US,en;q=0.5"));
                h
            })
            .build()
            .map_err(|e| FetchError::Transport(format!("http client: {e}")))?;
        Ok(Self { client })
    }

    fn get(&self, url: &str) -> Result<Vec<u8>, FetchError> {
        let resp = self
            .client
            .get(url)
            .send()
            .map_err(|e| FetchError::Transport(format!("GET {url}: {e}")))?;
        let status = resp.status();
        debug!(url, status = status.as_u16(), "fetched");
        if !status.is_success() {
            return Err(FetchError::Status(status.as_u16()));
        }
        resp.bytes()
            .map(|b| b.to_vec())
            .map_err(|e| FetchError::Transport(format!("read body: {e}")))
    }
}

impl PosterSource for HttpSource {
    fn fetch_text(&self, url: &str) -> Result<String, FetchError> {
        let body = self.get(url)?;
        Ok(String::from_utf8_lossy(&body).into_owned())
    }

    fn fetch_bytes(&self, url: &str) -> Result<Vec<u8>, FetchError> {
        self.get(url)
    }
}

pub fn search_url(base: &str, query: &str) -> String {
    format!(
        "{}/find/?q={}&s=tt&ttype=ft",
        base.trim_end_matches('/'),
        urlencoding::encode(query)
    )
}

/// Attribute value of `name` on a single tag, entity `&amp;` unescaped.
fn attr(tag: &str, name: &str) -> Option<String> {
    ATTR.captures_iter(tag).find_map(|c| {
        let key = c.get(1)?.as_str();
        if !key.eq_ignore_ascii_case(name) {
            return None;
        }
        let value = c.get(2).or_else(|| c.get(3))?.as_str();
        Some(value.replace("&amp;", "&"))
    })
}

fn has_class_token(tag: &str, token: &str) -> bool {
    attr(tag, "class").is_some_and(|c| c.split_whitespace().any(|t| t == token))
}

fn class_contains(tag: &str, needle: &str) -> bool {
    attr(tag, "class").is_some_and(|c| c.contains(needle))
}

/// Make `link` absolute against `base` (scheme + host).
pub fn absolutize(base: &str, link: &str) -> String {
    let link = link.trim();
    if link.starts_with("http://") || link.starts_with("https://") {
        link.to_string()
    } else if let Some(rest) = link.strip_prefix("//") {
        format!("https://{rest}")
    } else if link.starts_with('/') {
        format!("{}{}", base.trim_end_matches('/'), link)
    } else {
        format!("{}/{}", base.trim_end_matches('/'), link)
    }
}

/// Detail-page URL of the first search result.
pub fn first_result_url(search_page: &str, base: &str) -> Option<String> {
    let from_title_link = ANCHOR_TAG
        .find_iter(search_page)
        .map(|m| m.as_str())
        .filter(|tag| class_contains(tag, RESULT_TITLE_CLASS))
        .find_map(|tag| attr(tag, "href").filter(|h| !h.trim().is_empty()));

    from_title_link
        .or_else(|| {
            TITLE_HREF
                .captures(search_page)
                .and_then(|c| c.get(1))
                .map(|m| m.as_str().to_string())
        })
        .map(|href| absolutize(base, &href))
}

fn first_img_src(page: &str, pred: impl Fn(&str) -> bool) -> Option<String> {
    IMG_TAG
        .find_iter(page)
        .map(|m| m.as_str())
        .filter(|tag| pred(tag))
        .find_map(|tag| attr(tag, "src").filter(|s| !s.trim().is_empty()))
}

/// Poster image URL on a title page: `img.ipc-image` first, then any image
/// whose class mentions "poster".
pub fn poster_image_url(detail_page: &str, base: &str) -> Option<String> {
    first_img_src(detail_page, |tag| has_class_token(tag, POSTER_IMAGE_CLASS))
        .or_else(|| first_img_src(detail_page, |tag| class_contains(tag, "poster")))
        .map(|src| absolutize(base, &src))
}

fn unescape_html(s: &str) -> String {
    s.replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&apos;", "'")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&amp;", "&")
}

fn info_from_json_ld(page: &str) -> Option<TitleInfo> {
    let body = LD_JSON.captures(page)?.get(1)?.as_str();
    let v: Value = match serde_json::from_str(body.trim()) {
        Ok(v) => v,
        Err(e) => {
            debug!("unreadable ld+json block: {e}");
            return None;
        }
    };

    let text = |key: &str| {
        v.get(key)
            .and_then(Value::as_str)
            .map(|t| unescape_html(t.trim()))
            .filter(|t| !t.is_empty())
    };
    let year = v
        .get("datePublished")
        .and_then(Value::as_str)
        .and_then(|d| d.get(..4))
        .and_then(|y| y.parse().ok());
    let rating = v
        .pointer("/aggregateRating/ratingValue")
        .and_then(|r| r.as_f64().or_else(|| r.as_str()?.trim().parse().ok()))
        .map(|r| r as f32);
    let genres = match v.get("genre") {
        Some(Value::String(g)) => vec![unescape_html(g)],
        Some(Value::Array(list)) => list
            .iter()
            .filter_map(Value::as_str)
            .map(unescape_html)
            .collect(),
        _ => Vec::new(),
    };

    Some(TitleInfo {
        title: text("name"),
        year,
        rating,
        genres,
        plot: text("description"),
    })
}

fn name_from_title_tag(page: &str) -> Option<(String, Option<u16>)> {
    let raw = TITLE_TAG.captures(page)?.get(1)?.as_str();
    let text = unescape_html(raw.trim());
    if let Some(c) = TITLE_WITH_YEAR.captures(&text) {
        return Some((c[1].trim().to_string(), c[2].parse().ok()));
    }
    let name = text.rsplit_once(" - ").map_or(text.as_str(), |(n, _)| n).trim();
    (!name.is_empty()).then(|| (name.to_string(), None))
}

/// Title metadata on a detail page: the ld+json block first, then the
/// `<title>` tag for a missing name or year.
pub fn title_info(detail_page: &str) -> Option<TitleInfo> {
    let mut info = info_from_json_ld(detail_page).unwrap_or_default();
    if info.title.is_none() || info.year.is_none() {
        if let Some((name, year)) = name_from_title_tag(detail_page) {
            info.title = info.title.take().or(Some(name));
            info.year = info.year.or(year);
        }
    }
    (!info.is_empty()).then_some(info)
}
