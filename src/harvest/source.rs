use crate::harvest::config::SourceConfig;
use crate::harvest::paths::HarvestPaths;
use reqwest::Url;
use std::path::PathBuf;

/// One page to harvest and the files backing its archive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Source {
    pub url: String,
    pub archive_path: PathBuf,
    /// Older archive merged in on every run but never written.
    pub legacy_path: Option<PathBuf>,
}

fn sanitize_slug(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    let mut prev_dash = false;
    for ch in input.chars() {
        if ch.is_ascii_alphanumeric() {
            out.push(ch.to_ascii_lowercase());
            prev_dash = false;
        } else if !prev_dash {
            out.push('-');
            prev_dash = true;
        }
    }
    out.trim_matches('-').to_string()
}

/// `comments-<id>.json` from the page's `id` query parameter, else a slug
/// of host and path.
pub fn archive_name_for_url(url: &str) -> String {
    let parsed = Url::parse(url.trim()).ok();
    let id = parsed.as_ref().and_then(|u| {
        u.query_pairs()
            .find(|(k, v)| k == "id" && !v.trim().is_empty())
            .map(|(_, v)| sanitize_slug(&v))
    });
    let slug = match (id, parsed) {
        (Some(id), _) if !id.is_empty() => id,
        (_, Some(u)) => sanitize_slug(&format!("{}{}", u.host_str().unwrap_or(""), u.path())),
        (_, None) => sanitize_slug(url),
    };
    if slug.is_empty() {
        "comments.json".to_string()
    } else {
        format!("comments-{slug}.json")
    }
}

impl Source {
    pub fn from_config(cfg: &SourceConfig, paths: &HarvestPaths) -> Self {
        Self {
            url: cfg.url.trim().to_string(),
            archive_path: paths.archives_dir.join(cfg.archive.trim()),
            legacy_path: cfg
                .legacy
                .as_deref()
                .map(str::trim)
                .filter(|l| !l.is_empty())
                .map(|l| paths.legacy_dir.join(l)),
        }
    }

    pub fn from_url(url: &str, paths: &HarvestPaths) -> Self {
        let name = archive_name_for_url(url);
        Self {
            url: url.trim().to_string(),
            archive_path: paths.archives_dir.join(&name),
            legacy_path: Some(paths.legacy_dir.join(&name)),
        }
    }
}

/// Enabled configured sources, or the single one named on the command line.
pub fn resolve_sources(
    configured: &[SourceConfig],
    url_override: Option<&str>,
    paths: &HarvestPaths,
) -> Vec<Source> {
    if let Some(url) = url_override {
        return vec![Source::from_url(url, paths)];
    }
    configured
        .iter()
        .filter(|s| s.enabled)
        .map(|s| Source::from_config(s, paths))
        .collect()
}
