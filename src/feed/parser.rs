use chrono::{DateTime, Utc};
use feed_rs::model::{Entry, Feed};
use feed_rs::parser;
use html_escape::decode_html_entities;
use quick_xml::events::{BytesStart, Event};
use quick_xml::reader::Reader;

use crate::feed::{FeedEntry, ParsedFeed};

/// Parse an RSS, Atom or JSON feed. Malformed XML falls back to a lenient
/// scan; `None` when neither a title nor any entry can be recovered.
pub fn parse_feed(content: &str, feed_url: &str) -> Option<ParsedFeed> {
    // An empty id lets entries without guid/id go through our own chain.
    let strict = parser::Builder::new()
        .id_generator(|_, _, _| String::new())
        .build();

    let parsed = match strict.parse(content.as_bytes()) {
        Ok(feed) => from_model(feed, feed_url),
        Err(e) => {
            tracing::debug!("Strict parse of {} failed ({}), scanning leniently", feed_url, e);
            scan_lenient(content, feed_url)
        }
    };

    parsed.filter(|feed| feed.title.is_some() || !feed.entries.is_empty())
}

/// Stable identity of one entry, first match wins:
/// explicit id, link, title + ISO published, title + raw published, title,
/// then `entry-{index}`.
pub fn derive_entry_id(
    explicit_id: Option<&str>,
    link: Option<&str>,
    title: Option<&str>,
    published: Option<DateTime<Utc>>,
    published_raw: Option<&str>,
    index: usize,
) -> String {
    if let Some(id) = non_empty(explicit_id) {
        return id.to_string();
    }
    if let Some(link) = non_empty(link) {
        return link.to_string();
    }
    if let Some(title) = non_empty(title) {
        if let Some(published) = published {
            return format!("{}|{}", title, published.to_rfc3339());
        }
        if let Some(raw) = non_empty(published_raw) {
            return format!("{}|{}", title, raw);
        }
        return title.to_string();
    }
    format!("entry-{}", index)
}

fn from_model(feed: Feed, feed_url: &str) -> Option<ParsedFeed> {
    let title = feed.title.map(|t| decode(&t.content)).and_then(some_text);

    let entries = feed
        .entries
        .into_iter()
        .enumerate()
        .map(|(index, entry)| entry_from_model(entry, index))
        .collect();

    Some(ParsedFeed {
        url: feed_url.to_string(),
        title,
        entries,
    })
}

fn entry_from_model(entry: Entry, index: usize) -> FeedEntry {
    let title = entry
        .title
        .as_ref()
        .map(|t| decode(&t.content))
        .and_then(some_text);
    let link = entry
        .links
        .iter()
        .find(|l| l.rel.as_deref().map_or(true, |rel| rel == "alternate"))
        .or_else(|| entry.links.first())
        .map(|l| l.href.trim().to_string())
        .and_then(some_text);
    let published = entry.published.or(entry.updated);

    let id = derive_entry_id(
        Some(entry.id.trim()),
        link.as_deref(),
        title.as_deref(),
        published,
        None,
        index,
    );

    FeedEntry {
        id,
        title,
        link,
        published,
    }
}

#[derive(Default)]
struct RawEntry {
    id: String,
    title: String,
    link: String,
    published: String,
}

/// Recover what we can from broken RSS/RDF/Atom markup: stop at the first
/// syntax error and keep everything seen up to that point.
fn scan_lenient(content: &str, feed_url: &str) -> Option<ParsedFeed> {
    let mut reader = Reader::from_str(content);
    reader.config_mut().trim_text(true);
    reader.config_mut().check_end_names = false;

    let mut stack: Vec<String> = Vec::new();
    let mut root_seen = false;
    let mut feed_title = String::new();
    let mut current: Option<RawEntry> = None;
    let mut raw_entries: Vec<RawEntry> = Vec::new();

    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) => {
                let name = local_name(&e);
                if !root_seen {
                    root_seen = true;
                    if !is_feed_root(&name) {
                        return None;
                    }
                }
                if is_entry(&name) {
                    current = Some(RawEntry::default());
                }
                if let Some(entry) = current.as_mut() {
                    take_link_href(&e, entry);
                }
                stack.push(name);
            }
            Ok(Event::Empty(e)) => {
                let name = local_name(&e);
                if !root_seen {
                    root_seen = true;
                    if !is_feed_root(&name) {
                        return None;
                    }
                }
                if let Some(entry) = current.as_mut() {
                    take_link_href(&e, entry);
                }
            }
            Ok(Event::End(e)) => {
                let name = String::from_utf8_lossy(e.local_name().as_ref()).to_ascii_lowercase();
                if is_entry(&name) {
                    if let Some(entry) = current.take() {
                        raw_entries.push(entry);
                    }
                }
                if let Some(pos) = stack.iter().rposition(|open| *open == name) {
                    stack.truncate(pos);
                }
            }
            Ok(Event::Text(t)) => {
                let text = match t.unescape() {
                    Ok(text) => text.into_owned(),
                    Err(_) => String::from_utf8_lossy(&t).into_owned(),
                };
                append_text(&stack, current.as_mut(), &mut feed_title, &text);
            }
            Ok(Event::CData(c)) => {
                let text = String::from_utf8_lossy(&c).into_owned();
                append_text(&stack, current.as_mut(), &mut feed_title, &text);
            }
            Ok(Event::Eof) => break,
            Err(e) => {
                tracing::debug!("Lenient scan of {} stopped: {}", feed_url, e);
                break;
            }
            _ => {}
        }
    }

    if !root_seen {
        return None;
    }
    // An entry cut off by the end of the document still counts.
    if let Some(entry) = current.take() {
        raw_entries.push(entry);
    }

    let entries = raw_entries
        .into_iter()
        .enumerate()
        .map(|(index, raw)| {
            let title = some_text(decode(&raw.title));
            let link = some_text(raw.link.trim().to_string());
            let published_raw = raw.published.trim();
            let published = parse_date(published_raw);
            let id = derive_entry_id(
                Some(raw.id.trim()),
                link.as_deref(),
                title.as_deref(),
                published,
                Some(published_raw),
                index,
            );
            FeedEntry {
                id,
                title,
                link,
                published,
            }
        })
        .collect();

    Some(ParsedFeed {
        url: feed_url.to_string(),
        title: some_text(decode(&feed_title)),
        entries,
    })
}

fn append_text(stack: &[String], current: Option<&mut RawEntry>, feed_title: &mut String, text: &str) {
    let Some(top) = stack.last() else {
        return;
    };

    match current {
        // Direct children of the entry only, so Atom `<source>` metadata is ignored.
        Some(entry) if is_child_of(stack, &["item", "entry"]) => {
            let target = match top.as_str() {
                "guid" | "id" => &mut entry.id,
                "title" => &mut entry.title,
                "link" => &mut entry.link,
                "pubdate" | "published" | "updated" | "date" => &mut entry.published,
                _ => return,
            };
            if target.is_empty() {
                target.push_str(text);
            }
        }
        Some(_) => {}
        // Channel title only; `<image><title>` and friends are skipped.
        None if top == "title" && is_child_of(stack, &["channel", "feed"]) => {
            if feed_title.is_empty() {
                feed_title.push_str(text);
            }
        }
        None => {}
    }
}

fn is_child_of(stack: &[String], parents: &[&str]) -> bool {
    let parent = stack.len().checked_sub(2).and_then(|i| stack.get(i));
    parent.map_or(false, |parent| parents.contains(&parent.as_str()))
}

/// Atom `<link href="..."/>`: only alternate (or unqualified) links count.
fn take_link_href(e: &BytesStart<'_>, entry: &mut RawEntry) {
    if local_name(e) != "link" || !entry.link.is_empty() {
        return;
    }

    let mut href = None;
    let mut rel = None;
    for attr in e.attributes().flatten() {
        let value = String::from_utf8_lossy(&attr.value).into_owned();
        match attr.key.local_name().as_ref() {
            b"href" => href = Some(value),
            b"rel" => rel = Some(value),
            _ => {}
        }
    }

    if rel.as_deref().map_or(true, |rel| rel == "alternate") {
        if let Some(href) = href {
            entry.link = decode(&href);
        }
    }
}

fn local_name(e: &BytesStart<'_>) -> String {
    String::from_utf8_lossy(e.local_name().as_ref()).to_ascii_lowercase()
}

fn is_feed_root(name: &str) -> bool {
    matches!(name, "rss" | "rdf" | "feed")
}

fn is_entry(name: &str) -> bool {
    matches!(name, "item" | "entry")
}

fn parse_date(raw: &str) -> Option<DateTime<Utc>> {
    if raw.is_empty() {
        return None;
    }
    DateTime::parse_from_rfc2822(raw)
        .or_else(|_| DateTime::parse_from_rfc3339(raw))
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}

fn decode(text: &str) -> String {
    decode_html_entities(text.trim()).trim().to_string()
}

fn some_text(text: String) -> Option<String> {
    if text.is_empty() {
        None
    } else {
        Some(text)
    }
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}
