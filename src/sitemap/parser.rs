use quick_xml::events::Event;
use quick_xml::name::{Namespace, ResolveResult};
use quick_xml::reader::NsReader;

use crate::sitemap::ParsedSitemap;

const SITEMAP_NS: &[u8] = b"http://www.sitemaps.org/schemas/sitemap/0.9";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Ns {
    Sitemap,
    Unbound,
    Other,
}

impl Ns {
    fn of(resolved: &ResolveResult<'_>) -> Self {
        match resolved {
            ResolveResult::Bound(Namespace(ns)) if *ns == SITEMAP_NS => Ns::Sitemap,
            ResolveResult::Unbound => Ns::Unbound,
            _ => Ns::Other,
        }
    }
}

/// `<loc>` values found at `root/<child>/<loc>`, one per child element.
#[derive(Default)]
struct Locs {
    namespaced: Vec<String>,
    plain: Vec<String>,
}

/// Parse a `urlset` or `sitemapindex` document.
///
/// `None` for malformed XML, any other root element, or a document without a
/// single non-empty `<loc>`. Locations in the sitemap namespace win; plain
/// unnamespaced `<loc>` elements are only used when there are none.
pub fn parse_sitemap(xml: &str, url: &str) -> Option<ParsedSitemap> {
    let mut reader = NsReader::from_str(xml);
    reader.config_mut().trim_text(true);

    let mut root: Option<String> = None;
    let mut stack: Vec<(Ns, String)> = Vec::new();
    let mut locs = Locs::default();
    let mut text = String::new();
    // Only the first <loc> of each child counts.
    let mut child_has_loc = false;

    loop {
        match reader.read_resolved_event() {
            Ok((ns, Event::Start(e))) => {
                let name = String::from_utf8_lossy(e.local_name().as_ref()).into_owned();
                if stack.is_empty() {
                    if root.is_some() {
                        return None;
                    }
                    root = Some(name.clone());
                }
                if stack.len() == 1 {
                    child_has_loc = false;
                }
                text.clear();
                stack.push((Ns::of(&ns), name));
            }
            Ok((_, Event::Empty(e))) => {
                if stack.is_empty() {
                    if root.is_some() {
                        return None;
                    }
                    root = Some(String::from_utf8_lossy(e.local_name().as_ref()).into_owned());
                }
            }
            Ok((_, Event::Text(t))) => {
                if stack.len() == 3 {
                    text.push_str(&t.unescape().ok()?);
                }
            }
            Ok((_, Event::CData(c))) => {
                if stack.len() == 3 {
                    text.push_str(&String::from_utf8_lossy(&c));
                }
            }
            Ok((_, Event::End(_))) => {
                if stack.len() == 3 && !child_has_loc {
                    if let Some((ns, value)) = loc_at_depth(&stack, root.as_deref(), &text) {
                        match ns {
                            Ns::Sitemap => locs.namespaced.push(value),
                            Ns::Unbound => locs.plain.push(value),
                            Ns::Other => {}
                        }
                        child_has_loc = true;
                    }
                }
                stack.pop();
            }
            Ok((_, Event::Eof)) => break,
            Err(e) => {
                tracing::debug!("Sitemap {} is not valid XML: {}", url, e);
                return None;
            }
            _ => {}
        }
    }

    if !stack.is_empty() {
        tracing::debug!("Sitemap {} ended with unclosed elements", url);
        return None;
    }

    let is_index = match root.as_deref() {
        Some("urlset") => false,
        Some("sitemapindex") => true,
        _ => return None,
    };

    let page_urls = if locs.namespaced.is_empty() {
        locs.plain
    } else {
        locs.namespaced
    };
    if page_urls.is_empty() {
        return None;
    }

    Some(ParsedSitemap {
        url: url.to_string(),
        page_urls,
        is_index,
    })
}

/// A non-empty `<loc>` directly under the expected child element, with the
/// namespace both elements share.
fn loc_at_depth(stack: &[(Ns, String)], root: Option<&str>, text: &str) -> Option<(Ns, String)> {
    let child_tag = match root? {
        "urlset" => "url",
        "sitemapindex" => "sitemap",
        _ => return None,
    };

    let (child_ns, child) = &stack[1];
    let (loc_ns, loc) = &stack[2];
    if child != child_tag || loc != "loc" || child_ns != loc_ns {
        return None;
    }

    let value = text.trim();
    if value.is_empty() {
        return None;
    }
    Some((*loc_ns, value.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    const URL: &str = "https://example.com/sitemap.xml";

    #[test]
    fn test_parse_urlset() {
        let xml = r#"<?xml version="1.0" encoding="UTF-8"?>
<urlset xmlns="http://www.sitemaps.org/schemas/sitemap/0.9">
  <url><loc>https://example.com/a</loc><lastmod>2024-01-01</lastmod></url>
  <url><loc> https://example.com/b </loc></url>
</urlset>"#;

        let sitemap = parse_sitemap(xml, URL).unwrap();

        assert_eq!(sitemap.url, URL);
        assert!(!sitemap.is_index);
        assert_eq!(
            sitemap.page_urls,
            vec!["https://example.com/a".to_string(), "https://example.com/b".to_string()]
        );
    }

    #[test]
    fn test_parse_sitemap_index() {
        let xml = r#"<sitemapindex xmlns="http://www.sitemaps.org/schemas/sitemap/0.9">
  <sitemap><loc>https://example.com/posts.xml</loc></sitemap>
  <sitemap><loc>https://example.com/pages.xml</loc></sitemap>
</sitemapindex>"#;

        let sitemap = parse_sitemap(xml, URL).unwrap();

        assert!(sitemap.is_index);
        assert_eq!(sitemap.page_urls.len(), 2);
    }

    #[test]
    fn test_unnamespaced_fallback() {
        let xml = "<urlset><url><loc>https://example.com/a</loc></url></urlset>";

        let sitemap = parse_sitemap(xml, URL).unwrap();

        assert_eq!(sitemap.page_urls, vec!["https://example.com/a".to_string()]);
    }

    #[test]
    fn test_prefixed_namespace() {
        let xml = r#"<sm:urlset xmlns:sm="http://www.sitemaps.org/schemas/sitemap/0.9">
  <sm:url><sm:loc>https://example.com/a</sm:loc></sm:url>
</sm:urlset>"#;

        let sitemap = parse_sitemap(xml, URL).unwrap();

        assert_eq!(sitemap.page_urls, vec!["https://example.com/a".to_string()]);
    }

    #[test]
    fn test_ignores_nested_and_foreign_locs() {
        let xml = r#"<urlset xmlns="http://www.sitemaps.org/schemas/sitemap/0.9" xmlns:image="http://www.google.com/schemas/sitemap-image/1.1">
  <url>
    <loc>https://example.com/a</loc>
    <image:image><image:loc>https://example.com/a.png</image:loc></image:image>
  </url>
</urlset>"#;

        let sitemap = parse_sitemap(xml, URL).unwrap();

        assert_eq!(sitemap.page_urls, vec!["https://example.com/a".to_string()]);
    }

    #[test]
    fn test_first_loc_per_child() {
        let xml = "<urlset><url><loc>https://example.com/a</loc><loc>https://example.com/dup</loc></url></urlset>";
        let sitemap = parse_sitemap(xml, URL).unwrap();
        assert_eq!(sitemap.page_urls, vec!["https://example.com/a".to_string()]);
    }

    #[test]
    fn test_empty_locs_is_none() {
        let xml = r#"<urlset xmlns="http://www.sitemaps.org/schemas/sitemap/0.9"><url><loc>  </loc></url></urlset>"#;
        assert!(parse_sitemap(xml, URL).is_none());
        assert!(parse_sitemap("<urlset/>", URL).is_none());
    }

    #[test]
    fn test_malformed_xml_is_none() {
        assert!(parse_sitemap("<urlset><url><loc>https://example.com/a</loc></url>", URL).is_none());
        assert!(parse_sitemap("<urlset><url><loc>x</url></urlset>", URL).is_none());
        assert!(parse_sitemap("this is not xml", URL).is_none());
    }

    #[test]
    fn test_unknown_root_is_none() {
        let xml = "<rss><url><loc>https://example.com/a</loc></url></rss>";
        assert!(parse_sitemap(xml, URL).is_none());
    }
}
