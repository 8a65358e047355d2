//! Follow-up pages of a comment thread.
//!
//! Only the first page of comments is rendered into the item page itself.
//! The page also embeds the owner/feature ids of its thread, from which the
//! render endpoint serving later pages as JSON fragments is derived.

use crate::harvest::extract::{Extractor, Harvested};
use crate::harvest::fetch::Fetcher;
use crate::harvest::warn::{self, WarnEvent};
use regex::Regex;
use scraper::Html;
use serde::Deserialize;
use std::sync::LazyLock;

const RENDER_BASE: &str = "https://steamcommunity.com/comment/PublishedFile_Public/render";

static RE_OWNER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#""owner":\s?"(\d+)""#).expect("invalid regex: owner")
});

static RE_FEATURE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#""feature":\s?"(\d+)""#).expect("invalid regex: feature")
});

#[derive(Debug, Clone, Deserialize)]
pub struct RenderPage {
    #[serde(default)]
    pub success: bool,
    #[serde(default)]
    pub comments_html: String,
    #[serde(default)]
    pub total_count: usize,
}

pub fn render_endpoint(page_html: &str) -> Option<String> {
    let owner = RE_OWNER.captures(page_html)?.get(1)?.as_str();
    let feature = RE_FEATURE.captures(page_html)?.get(1)?.as_str();
    Some(format!("{RENDER_BASE}/{owner}/{feature}/"))
}

pub fn page_url(endpoint: &str, start: usize, count: usize) -> String {
    format!("{endpoint}?start={start}&count={count}")
}

fn wrap_fragment(comments_html: &str) -> String {
    format!("<div class=\"commentthread_area\">{comments_html}</div>")
}

fn warn_page(source_url: &str, reason: &str, err: &str) {
    warn::emit(WarnEvent {
        code: "PAGE_FETCH_FAILED",
        stage: "paging",
        source: source_url,
        reason,
        err,
    });
}

pub struct PageRequest<'a> {
    pub source_url: &'a str,
    pub endpoint: &'a str,
    /// Comments already read from the item page.
    pub start: usize,
    pub page_size: usize,
    pub max_extra_pages: usize,
}

/// Fetch and extract further pages until the thread is exhausted, a page
/// comes back empty, or the page budget runs out. A failing page ends the
/// walk but keeps everything gathered before it.
pub fn collect_pages(
    fetcher: &dyn Fetcher,
    extractor: &Extractor<'_>,
    req: &PageRequest<'_>,
) -> Harvested {
    let mut out = Harvested::default();
    let mut start = req.start;

    for _ in 0..req.max_extra_pages {
        let url = page_url(req.endpoint, start, req.page_size);
        let body = match fetcher.fetch(&url) {
            Ok(body) => body,
            Err(err) => {
                warn_page(req.source_url, "fetch-failed", &err.to_string());
                break;
            }
        };
        let page: RenderPage = match serde_json::from_str(&body) {
            Ok(page) => page,
            Err(err) => {
                warn_page(req.source_url, "bad-page-json", &err.to_string());
                break;
            }
        };
        if !page.success {
            warn_page(req.source_url, "page-not-successful", &url);
            break;
        }

        let fragment = Html::parse_fragment(&wrap_fragment(&page.comments_html));
        let Some(scan) = extractor.scan(&fragment) else {
            break;
        };
        let got = scan.harvest();
        let seen = got.records.len() + got.skipped.len();
        out.absorb(got);
        start += seen;
        if seen == 0 || start >= page.total_count {
            break;
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::FetchError;
    use crate::harvest::clock::FixedClock;
    use crate::harvest::timestamp::TimestampNormalizer;
    use chrono::{TimeZone, Utc};
    use chrono_tz::Tz;
    use std::collections::HashMap;
    use std::sync::Mutex;

    struct PagedFetcher {
        pages: HashMap<String, String>,
        requested: Mutex<Vec<String>>,
    }

    impl Fetcher for PagedFetcher {
        fn fetch(&self, url: &str) -> Result<String, FetchError> {
            self.requested.lock().expect("lock").push(url.to_string());
            self.pages
                .get(url)
                .cloned()
                .ok_or_else(|| FetchError::Transport(format!("no route to {url}")))
        }
    }

    fn comment(author: &str, day: u32) -> String {
        format!(
            r#"<div class="commentthread_comment"><div class="commentthread_comment_author"><bdi>{author}</bdi><span class="commentthread_comment_timestamp" title="{day} March 2024 @ 1:00:00 PM"></span></div><div class="commentthread_comment_text">c{day}</div></div>"#
        )
    }

    fn page_json(comments: &[String], total: usize) -> String {
        serde_json::json!({
            "success": true,
            "comments_html": comments.concat(),
            "total_count": total,
            "start": 0,
            "pagesize": 2,
        })
        .to_string()
    }

    #[test]
    fn endpoint_is_built_from_inline_script_ids() {
        let html = r#"<script>InitializeCommentThread("PublishedFile_Public", "x", {"feature":"3476068089","feature2":-1,"owner": "76561198000000001"});</script>"#;
        assert_eq!(
            render_endpoint(html).as_deref(),
            Some(
                "https://steamcommunity.com/comment/PublishedFile_Public/render/76561198000000001/3476068089/"
            )
        );
        assert!(render_endpoint("<p>no thread script</p>").is_none());
    }

    #[test]
    fn walks_pages_until_total_is_reached() {
        let endpoint = "https://steamcommunity.com/comment/PublishedFile_Public/render/1/2/";
        let mut pages = HashMap::new();
        pages.insert(
            page_url(endpoint, 2, 2),
            page_json(&[comment("c", 3), comment("d", 4)], 5),
        );
        pages.insert(page_url(endpoint, 4, 2), page_json(&[comment("e", 5)], 5));
        let fetcher = PagedFetcher {
            pages,
            requested: Mutex::new(Vec::new()),
        };

        let clock = FixedClock(Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap());
        let extractor = Extractor::new(TimestampNormalizer::new(Tz::UTC, &clock));
        let got = collect_pages(
            &fetcher,
            &extractor,
            &PageRequest {
                source_url: "https://example.test/item",
                endpoint,
                start: 2,
                page_size: 2,
                max_extra_pages: 10,
            },
        );

        let authors: Vec<_> = got.records.iter().map(|r| r.author.as_str()).collect();
        assert_eq!(authors, vec!["c", "d", "e"]);
        assert_eq!(fetcher.requested.lock().expect("lock").len(), 2);
        assert_eq!(got.degraded(), 0);
    }

    #[test]
    fn failing_page_keeps_what_was_gathered() {
        let endpoint = "https://steamcommunity.com/comment/PublishedFile_Public/render/1/2/";
        let mut pages = HashMap::new();
        pages.insert(page_url(endpoint, 0, 1), page_json(&[comment("a", 1)], 9));
        let fetcher = PagedFetcher {
            pages,
            requested: Mutex::new(Vec::new()),
        };

        let clock = FixedClock(Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap());
        let extractor = Extractor::new(TimestampNormalizer::new(Tz::UTC, &clock));
        let got = collect_pages(
            &fetcher,
            &extractor,
            &PageRequest {
                source_url: "https://example.test/item",
                endpoint,
                start: 0,
                page_size: 1,
                max_extra_pages: 3,
            },
        );
        assert_eq!(got.records.len(), 1);
        assert_eq!(fetcher.requested.lock().expect("lock").len(), 2);
    }

    #[test]
    fn page_budget_is_respected() {
        let fetcher = PagedFetcher {
            pages: HashMap::new(),
            requested: Mutex::new(Vec::new()),
        };
        let clock = FixedClock(Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap());
        let extractor = Extractor::new(TimestampNormalizer::new(Tz::UTC, &clock));
        let got = collect_pages(
            &fetcher,
            &extractor,
            &PageRequest {
                source_url: "https://example.test/item",
                endpoint: "https://e/",
                start: 0,
                page_size: 10,
                max_extra_pages: 0,
            },
        );
        assert!(got.records.is_empty());
        assert!(fetcher.requested.lock().expect("lock").is_empty());
    }
}
