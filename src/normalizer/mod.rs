//! URL canonicalization.
//!
//! Two URLs that point at the same page must normalize to the same string so
//! that URL sets can be compared across checks. `normalize_url` is idempotent:
//! normalizing an already-normalized URL returns it unchanged.

pub mod fingerprint;

use std::collections::HashSet;
use std::fmt::Write;

use serde::{Deserialize, Serialize};
use url::{form_urlencoded, Url};

use crate::app::{Result, WatcherError};

pub use fingerprint::{fingerprint, has_changed};

/// Optional normalization steps. Scheme lowercasing, punycode hosts, trailing
/// slash collapsing and path encoding always apply.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NormalizationConfig {
    pub lowercase_host: bool,
    pub strip_tracking_params: bool,
    pub strip_fragments: bool,
    pub force_https: bool,
}

/// Canonicalize `url`, resolving it against `base` first when given.
pub fn normalize_url(url: &str, base: Option<&str>, config: &NormalizationConfig) -> Result<String> {
    let parsed = resolve(url, base)?;

    let scheme = parsed.scheme().to_ascii_lowercase();
    if scheme != "http" && scheme != "https" {
        return Err(invalid(url));
    }

    let host = match parsed.host_str() {
        Some(host) if !host.is_empty() => host,
        _ => return Err(invalid(url)),
    };
    let host = if config.lowercase_host {
        host.to_ascii_lowercase()
    } else {
        host.to_string()
    };

    let scheme = if config.force_https { "https" } else { scheme.as_str() };
    let mut out = String::with_capacity(url.len());
    out.push_str(scheme);
    out.push_str("://");

    if !parsed.username().is_empty() {
        out.push_str(parsed.username());
        if let Some(password) = parsed.password() {
            out.push(':');
            out.push_str(password);
        }
        out.push('@');
    }

    out.push_str(&host);
    // the default port of the output scheme is implied
    if let Some(port) = parsed.port().filter(|&port| !(scheme == "https" && port == 443)) {
        let _ = write!(out, ":{}", port);
    }

    out.push_str(&encode_path(parsed.path().trim_end_matches('/')));

    let query = match parsed.query() {
        Some(query) if config.strip_tracking_params => strip_tracking_query(query),
        Some(query) => query.to_string(),
        None => String::new(),
    };
    if !query.is_empty() {
        out.push('?');
        out.push_str(&query);
    }

    let fragment = match parsed.fragment() {
        _ if config.strip_fragments => String::new(),
        Some(fragment) if config.strip_tracking_params => strip_tracking_fragment(fragment),
        Some(fragment) => fragment.to_string(),
        None => String::new(),
    };
    if !fragment.is_empty() {
        out.push('#');
        out.push_str(&fragment);
    }

    Ok(out)
}

/// Normalize every URL and drop duplicates, keeping first-seen order.
pub fn normalize_urls<I, S>(urls: I, base: Option<&str>, config: &NormalizationConfig) -> Result<Vec<String>>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut seen = HashSet::new();
    let mut normalized = Vec::new();

    for url in urls {
        let url = normalize_url(url.as_ref(), base, config)?;
        if seen.insert(url.clone()) {
            normalized.push(url);
        }
    }

    Ok(normalized)
}

fn resolve(url: &str, base: Option<&str>) -> Result<Url> {
    let url = url.trim();
    if url.is_empty() {
        return Err(invalid(url));
    }

    match base {
        Some(base) => {
            let base = Url::parse(base).map_err(|_| invalid(base))?;
            base.join(url).map_err(|_| invalid(url))
        }
        None => {
            // WHATWG parsing would accept "http:/host"; require an explicit authority.
            let scheme_ok = url
                .split_once("://")
                .map(|(scheme, _)| {
                    scheme.starts_with(|c: char| c.is_ascii_alphabetic())
                        && scheme.chars().all(|c| c.is_ascii_alphanumeric() || "+-.".contains(c))
                })
                .unwrap_or(false);
            if !scheme_ok {
                return Err(invalid(url));
            }
            Url::parse(url).map_err(|_| invalid(url))
        }
    }
}

fn encode_path(path: &str) -> String {
    let mut out = String::with_capacity(path.len());
    for byte in path.bytes() {
        match byte {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'.' | b'_' | b'~' | b'/' | b'%' => {
                out.push(byte as char)
            }
            _ => {
                let _ = write!(out, "%{:02X}", byte);
            }
        }
    }
    out
}

fn strip_tracking_query(query: &str) -> String {
    let kept = form_urlencoded::parse(query.as_bytes()).filter(|(key, _)| !is_tracking_param(key));
    form_urlencoded::Serializer::new(String::new())
        .extend_pairs(kept)
        .finish()
}

/// Handles `#frag?k=v`, `#frag&k=v&...` and bare `#k=v&k2=v2` fragments.
fn strip_tracking_fragment(fragment: &str) -> String {
    if let Some((prefix, query)) = fragment.split_once('?') {
        let cleaned = strip_tracking_pairs(query);
        return match (prefix.is_empty(), cleaned.is_empty()) {
            (_, true) => prefix.to_string(),
            (true, false) => cleaned,
            (false, false) => format!("{}?{}", prefix, cleaned),
        };
    }
    if fragment.contains('&') {
        return strip_tracking_pairs(fragment);
    }
    fragment.to_string()
}

fn strip_tracking_pairs(query: &str) -> String {
    query
        .split('&')
        .filter(|part| !part.is_empty())
        .filter(|part| match part.split_once('=') {
            Some((key, _)) => !is_tracking_param(key),
            None => true,
        })
        .collect::<Vec<_>>()
        .join("&")
}

fn is_tracking_param(key: &str) -> bool {
    let key = key.to_ascii_lowercase();
    key.starts_with("utm_") || matches!(key.as_str(), "fbclid" | "gclid" | "mc_eid")
}

fn invalid(url: &str) -> WatcherError {
    WatcherError::InvalidUrl(url.to_string())
}
