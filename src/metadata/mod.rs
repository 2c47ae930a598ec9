//! Page metadata scraping.
//!
//! Title and preview image come from Open Graph tags, then Twitter card
//! tags, then `<title>`. YouTube links use the oEmbed API plus the static
//! thumbnail URL. Scraping never fails the caller: any error yields empty
//! metadata and a `warn!`.

use std::time::Duration;

use scraper::{Html, Selector};
use serde::{Deserialize, Serialize};

use crate::model::{youtube_thumbnail, youtube_video_id};

/// Default request timeout.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(8);

const BROWSER_UA: &str = "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/91.0.4472.114 Safari/537.36";
const CRAWLER_UA: &str = "facebookexternalhit/1.1 (+http://www.facebook.com/externalhit_uatext.php)";
const YOUTUBE_OEMBED: &str = "https://www.youtube.com/oembed";

/// Scraped title and image. Empty strings mean "unknown".
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Metadata {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub image: String,
}

impl Metadata {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.title.is_empty() && self.image.is_empty()
    }
}

fn first_meta(doc: &Html, selectors: &[&str]) -> Option<String> {
    selectors.iter().find_map(|s| {
        let selector = Selector::parse(s).ok()?;
        doc.select(&selector)
            .filter_map(|el| el.value().attr("content"))
            .map(str::trim)
            .find(|c| !c.is_empty())
            .map(str::to_string)
    })
}

/// Extract title and image from an HTML document.
#[must_use]
pub fn parse_html_metadata(html: &str) -> Metadata {
    let doc = Html::parse_document(html);

    let title = first_meta(
        &doc,
        &[r#"meta[property="og:title"]"#, r#"meta[name="twitter:title"]"#],
    )
    .or_else(|| {
        let selector = Selector::parse("title").ok()?;
        doc.select(&selector)
            .next()
            .map(|el| el.text().collect::<String>().trim().to_string())
            .filter(|t| !t.is_empty())
    })
    .unwrap_or_default();

    let image = first_meta(
        &doc,
        &[r#"meta[property="og:image"]"#, r#"meta[name="twitter:image"]"#],
    )
    .unwrap_or_default();

    Metadata { title, image }
}

#[derive(Deserialize)]
struct OEmbed {
    #[serde(default)]
    title: String,
}

/// HTTP metadata fetcher.
#[derive(Debug, Clone)]
pub struct MetadataFetcher {
    client: reqwest::Client,
    timeout: Duration,
}

impl Default for MetadataFetcher {
    fn default() -> Self {
        Self::new(DEFAULT_TIMEOUT)
    }
}

impl MetadataFetcher {
    /// Create a fetcher with the given per-request timeout.
    #[must_use]
    pub fn new(timeout: Duration) -> Self {
        Self {
            client: reqwest::Client::new(),
            timeout,
        }
    }

    /// Fetch metadata for `url`. Never fails; errors produce empty fields.
    pub async fn fetch(&self, url: &str) -> Metadata {
        let lower = url.trim().to_lowercase();
        if !(lower.starts_with("http://") || lower.starts_with("https://")) {
            return Metadata::default();
        }

        let result = if url.contains("youtube.com") || url.contains("youtu.be") {
            self.fetch_youtube(url).await
        } else {
            let ua = if url.contains("twitter.com") || url.contains("x.com") {
                CRAWLER_UA
            } else {
                BROWSER_UA
            };
            self.fetch_page(url, ua).await
        };

        match result {
            Ok(meta) => meta,
            Err(e) => {
                tracing::warn!(url, error = %e, "metadata fetch failed");
                Metadata::default()
            }
        }
    }

    async fn fetch_page(&self, url: &str, user_agent: &str) -> Result<Metadata, reqwest::Error> {
        let html = self
            .client
            .get(url)
            .header(reqwest::header::USER_AGENT, user_agent)
            .timeout(self.timeout)
            .send()
            .await?
            .text()
            .await?;
        Ok(parse_html_metadata(&html))
    }

    /// oEmbed for the title; the thumbnail is derived from the video id and
    /// kept even when oEmbed fails.
    async fn fetch_youtube(&self, url: &str) -> Result<Metadata, reqwest::Error> {
        let image = youtube_video_id(url)
            .map(|id| youtube_thumbnail(&id))
            .unwrap_or_default();

        let response = self
            .client
            .get(YOUTUBE_OEMBED)
            .query(&[("url", url), ("format", "json")])
            .timeout(self.timeout)
            .send()
            .await
            .and_then(reqwest::Response::error_for_status);

        let title = match response {
            Ok(r) => r.json::<OEmbed>().await.map(|o| o.title).unwrap_or_default(),
            Err(e) => {
                if image.is_empty() {
                    return Err(e);
                }
                tracing::debug!(url, error = %e, "oembed failed, keeping thumbnail");
                String::new()
            }
        };

        Ok(Metadata {
            title: title.trim().to_string(),
            image,
        })
    }
}
