use crate::harvest::record::{CommentRecord, UNKNOWN_AUTHOR};
use crate::harvest::timestamp::{Normalized, TimestampNormalizer};
use scraper::{ElementRef, Html, Selector};
use thiserror::Error;

const AVATAR_CDN_HOST: &str = "steamstatic.com";
const AVATAR_HIGH_RES_MARKERS: &[&str] = &["_medium", "_full"];

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SkipReason {
    #[error("comment node #{index} has no author, text or timestamp markup")]
    Hollow { index: usize },
}

/// Records pulled from one thread, plus the nodes that could not be read.
#[derive(Debug, Clone, Default)]
pub struct Harvested {
    pub records: Vec<CommentRecord>,
    pub skipped: Vec<SkipReason>,
}

impl Harvested {
    pub fn degraded(&self) -> usize {
        self.records.iter().filter(|r| r.degraded).count()
    }

    pub fn absorb(&mut self, mut other: Harvested) {
        self.records.append(&mut other.records);
        self.skipped.append(&mut other.skipped);
    }
}

struct CommentSelectors {
    thread: Selector,
    comment: Selector,
    author: Selector,
    author_link: Selector,
    name: Selector,
    avatar_img: Selector,
    timestamp: Selector,
    text: Selector,
}

impl CommentSelectors {
    fn new() -> Self {
        Self {
            thread: Selector::parse(".commentthread_area").expect("thread selector"),
            comment: Selector::parse(".commentthread_comment").expect("comment selector"),
            author: Selector::parse(".commentthread_comment_author").expect("author selector"),
            author_link: Selector::parse(".commentthread_author_link")
                .expect("author link selector"),
            name: Selector::parse("bdi").expect("name selector"),
            avatar_img: Selector::parse(".commentthread_comment_avatar img[src]")
                .expect("avatar selector"),
            timestamp: Selector::parse(".commentthread_comment_timestamp")
                .expect("timestamp selector"),
            text: Selector::parse(".commentthread_comment_text").expect("text selector"),
        }
    }
}

pub struct Extractor<'c> {
    selectors: CommentSelectors,
    normalizer: TimestampNormalizer<'c>,
}

/// A located thread container. `comments()` can be walked any number of
/// times and yields the same sequence each time.
pub struct ThreadScan<'s, 'c> {
    extractor: &'s Extractor<'c>,
    thread: ElementRef<'s>,
}

fn first<'a>(node: ElementRef<'a>, selector: &Selector) -> Option<ElementRef<'a>> {
    node.select(selector).next()
}

fn trimmed_text(node: ElementRef<'_>) -> String {
    node.text().collect::<String>().trim().to_string()
}

fn non_empty(text: String) -> Option<String> {
    if text.is_empty() { None } else { Some(text) }
}

/// Rewrite a low-resolution CDN avatar (`<hash>.jpg`) to its medium
/// variant (`<hash>_medium.jpg`). Anything else is returned untouched.
pub fn upgrade_avatar(url: &str) -> String {
    let eligible = url.contains(AVATAR_CDN_HOST)
        && !AVATAR_HIGH_RES_MARKERS.iter().any(|m| url.contains(m));
    match url.strip_suffix(".jpg") {
        Some(stem) if eligible => format!("{stem}_medium.jpg"),
        _ => url.to_string(),
    }
}

impl<'c> Extractor<'c> {
    pub fn new(normalizer: TimestampNormalizer<'c>) -> Self {
        Self {
            selectors: CommentSelectors::new(),
            normalizer,
        }
    }

    /// `None` when the document has no thread container at all, which is
    /// different from a container holding zero comments.
    pub fn scan<'s>(&'s self, document: &'s Html) -> Option<ThreadScan<'s, 'c>> {
        let thread = document.select(&self.selectors.thread).next()?;
        Some(ThreadScan {
            extractor: self,
            thread,
        })
    }

    fn extract_one(&self, index: usize, node: ElementRef<'_>) -> Result<CommentRecord, SkipReason> {
        let sel = &self.selectors;
        let author_node = first(node, &sel.author);
        let text_node = first(node, &sel.text);
        let timestamp_node = first(node, &sel.timestamp);
        if author_node.is_none() && text_node.is_none() && timestamp_node.is_none() {
            return Err(SkipReason::Hollow { index });
        }

        let author = author_node
            .and_then(|a| {
                first(a, &sel.name)
                    .or_else(|| first(a, &sel.author_link))
                    .map(trimmed_text)
                    .and_then(non_empty)
            })
            .or_else(|| first(node, &sel.name).map(trimmed_text).and_then(non_empty))
            .unwrap_or_else(|| UNKNOWN_AUTHOR.to_string());

        let avatar_url = first(node, &sel.avatar_img)
            .and_then(|img| img.value().attr("src"))
            .map(str::trim)
            .filter(|src| !src.is_empty())
            .map(upgrade_avatar);

        let Normalized { instant, degraded } = match timestamp_node
            .and_then(|ts| ts.value().attr("title"))
        {
            Some(raw) => self.normalizer.normalize(raw),
            None => self.normalizer.fallback(),
        };

        Ok(CommentRecord {
            author,
            avatar_url,
            timestamp: instant,
            text: text_node.map(trimmed_text).unwrap_or_default(),
            degraded,
        })
    }
}

impl<'s, 'c> ThreadScan<'s, 'c> {
    pub fn comments(&self) -> impl Iterator<Item = Result<CommentRecord, SkipReason>> + '_ {
        self.thread
            .select(&self.extractor.selectors.comment)
            .enumerate()
            .map(move |(index, node)| self.extractor.extract_one(index, node))
    }

    pub fn harvest(&self) -> Harvested {
        let mut out = Harvested::default();
        for item in self.comments() {
            match item {
                Ok(record) => out.records.push(record),
                Err(reason) => out.skipped.push(reason),
            }
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::harvest::clock::FixedClock;
    use chrono::{TimeZone, Utc};
    use chrono_tz::Tz;

    fn clock() -> FixedClock {
        FixedClock(Utc.with_ymd_and_hms(2026, 10, 17, 9, 30, 0).unwrap())
    }

    const PAGE: &str = r##"
<html><body>
<div class="commentthread_area">
  <div class="commentthread_comment responsive_body_text">
    <div class="commentthread_comment_avatar">
      <a href="#"><img src="https://avatars.steamstatic.com/abc123.jpg"></a>
    </div>
    <div class="commentthread_comment_content">
      <div class="commentthread_comment_author">
        <a class="hoverunderline commentthread_author_link"><bdi>  Ana  </bdi></a>
        <span class="commentthread_comment_timestamp" title="15 March, 2024 @ 3:45:12 pm PST">15 Mar, 2024 @ 3:45pm</span>
      </div>
      <div class="commentthread_comment_text">
        Great mod!
      </div>
    </div>
  </div>
  <div class="commentthread_comment responsive_body_text">
    <div class="commentthread_comment_author">
      <a class="commentthread_author_link">Link Only</a>
      <span class="commentthread_comment_timestamp" title="sometime soon">?</span>
    </div>
  </div>
  <div class="commentthread_comment responsive_body_text">
    <div class="commentthread_comment_avatar"><img src="https://cdn.example/face.jpg"></div>
  </div>
  <div class="commentthread_comment responsive_body_text">
    <div class="commentthread_comment_text">anon</div>
  </div>
</div>
</body></html>"##;

    #[test]
    fn extracts_fields_and_tolerates_missing_parts() {
        let clock = clock();
        let extractor = Extractor::new(TimestampNormalizer::new(Tz::UTC, &clock));
        let doc = Html::parse_document(PAGE);
        let scan = extractor.scan(&doc).expect("thread present");
        let got = scan.harvest();

        assert_eq!(got.records.len(), 3);
        assert_eq!(got.skipped, vec![SkipReason::Hollow { index: 2 }]);

        let first = &got.records[0];
        assert_eq!(first.author, "Ana");
        assert_eq!(
            first.avatar_url.as_deref(),
            Some("https://avatars.steamstatic.com/abc123_medium.jpg")
        );
        assert_eq!(
            first.timestamp,
            Utc.with_ymd_and_hms(2024, 3, 15, 23, 45, 12).unwrap()
        );
        assert_eq!(first.text, "Great mod!");
        assert!(!first.degraded);

        let second = &got.records[1];
        assert_eq!(second.author, "Link Only");
        assert_eq!(second.text, "");
        assert!(second.degraded);
        assert_eq!(second.timestamp, clock.0);

        let third = &got.records[2];
        assert_eq!(third.author, UNKNOWN_AUTHOR);
        assert_eq!(third.avatar_url, None);
        assert!(third.degraded);
        assert_eq!(got.degraded(), 2);
    }

    #[test]
    fn scan_is_restartable() {
        let clock = clock();
        let extractor = Extractor::new(TimestampNormalizer::new(Tz::UTC, &clock));
        let doc = Html::parse_document(PAGE);
        let scan = extractor.scan(&doc).expect("thread present");
        let a: Vec<_> = scan.comments().collect();
        let b: Vec<_> = scan.comments().collect();
        assert_eq!(a, b);
    }

    #[test]
    fn empty_thread_is_distinct_from_missing_thread() {
        let clock = clock();
        let extractor = Extractor::new(TimestampNormalizer::new(Tz::UTC, &clock));

        let empty = Html::parse_document(r#"<div class="commentthread_area"></div>"#);
        let scan = extractor.scan(&empty).expect("container present");
        assert_eq!(scan.comments().count(), 0);

        let missing = Html::parse_document("<div class=\"workshopItemTitle\">x</div>");
        assert!(extractor.scan(&missing).is_none());
    }

    #[test]
    fn avatar_upgrade_rules() {
        assert_eq!(
            upgrade_avatar("https://avatars.steamstatic.com/a.jpg"),
            "https://avatars.steamstatic.com/a_medium.jpg"
        );
        assert_eq!(
            upgrade_avatar("https://avatars.steamstatic.com/a_full.jpg"),
            "https://avatars.steamstatic.com/a_full.jpg"
        );
        assert_eq!(
            upgrade_avatar("https://avatars.steamstatic.com/a_medium.jpg"),
            "https://avatars.steamstatic.com/a_medium.jpg"
        );
        assert_eq!(
            upgrade_avatar("https://avatars.steamstatic.com/a.png"),
            "https://avatars.steamstatic.com/a.png"
        );
        assert_eq!(upgrade_avatar("https://other.cdn/a.jpg"), "https://other.cdn/a.jpg");
    }
}
