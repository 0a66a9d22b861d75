use std::sync::LazyLock;

use regex::Regex;
use url::Url;

use crate::feed::discovery::dedupe;

static SITEMAP_DIRECTIVE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?im)^Sitemap:\s*(.+)$").expect("sitemap directive regex is valid")
});

/// Sitemap candidates for a site: every `Sitemap:` directive in robots.txt,
/// or the conventional locations when there is none.
pub fn detect_sitemap_urls(robots_txt: Option<&str>, base_url: &str) -> Vec<String> {
    let base = Url::parse(base_url).ok();

    let mut urls = Vec::new();
    if let Some(robots) = robots_txt {
        for caps in SITEMAP_DIRECTIVE_RE.captures_iter(robots) {
            let value = caps[1].trim();
            if value.is_empty() {
                continue;
            }
            // Relative directives are resolved against the site.
            let resolved = match (&base, Url::parse(value)) {
                (_, Ok(url)) => url.to_string(),
                (Some(base), Err(_)) => base.join(value).map(String::from).unwrap_or_else(|_| value.to_string()),
                (None, Err(_)) => value.to_string(),
            };
            urls.push(resolved);
        }
    }

    if !urls.is_empty() {
        return dedupe(urls);
    }

    let Some(base) = base else {
        return Vec::new();
    };

    let root = base.origin().ascii_serialization();
    let mut candidates = vec![format!("{}/sitemap.xml", root), format!("{}/sitemap_index.xml", root)];

    let path = base.path().trim_end_matches('/');
    if !path.is_empty() {
        candidates.push(format!("{}{}/sitemap.xml", root, path));
    }

    dedupe(candidates)
}

/// `{scheme}://{host}[:port]/robots.txt`
pub fn robots_url(base_url: &str) -> Option<String> {
    let base = Url::parse(base_url).ok()?;
    base.join("/robots.txt").ok().map(String::from)
}
