//! RSS 2.0 / RSS 1.0 / Atom parsing into normalized [`Entry`] records.
//!
//! Parsing happens in two steps: an event pass over the XML collects the raw,
//! optional fields of every item, then [`resolve_entry`] applies the fallback
//! chain (id → link, summary → first content block, published → feed-level
//! updated → now) and normalizes text.

use chrono::{DateTime, Utc};
use quick_xml::events::{BytesStart, BytesText, Event};
use quick_xml::Reader;
use rsskeep_core::{ascii_only, parse_feed_timestamp, strip_html, Entry};

use crate::error::ParseError;

/// Entries recovered from one feed body, plus the items that had to be dropped.
#[derive(Debug, Default)]
pub struct ParsedFeed {
    pub entries: Vec<Entry>,
    pub rejected: Vec<RejectedEntry>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RejectReason {
    MissingIdAndLink,
    MissingTitle,
}

impl std::fmt::Display for RejectReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RejectReason::MissingIdAndLink => write!(f, "item has neither <id> nor <link>"),
            RejectReason::MissingTitle => write!(f, "item has no <title>"),
        }
    }
}

/// An item that could not become an [`Entry`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RejectedEntry {
    /// Zero-based position of the item in the feed.
    pub index: usize,
    pub reason: RejectReason,
    /// Whatever identifying text the item did carry (title, id or link).
    pub hint: Option<String>,
}

/// Item fields exactly as found in the document; every one may be missing.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct RawEntry {
    pub id: Option<String>,
    pub title: Option<String>,
    pub link: Option<String>,
    pub summary: Option<String>,
    pub contents: Vec<String>,
    pub published: Option<String>,
    /// `<link>` with a rel other than `alternate`; used only if no primary link exists.
    other_link: Option<String>,
}

impl RawEntry {
    fn offer_link(&mut self, href: String, rel: Option<&str>) {
        if href.is_empty() {
            return;
        }
        match rel {
            None | Some("alternate") => {
                if self.link.is_none() {
                    self.link = Some(href);
                }
            }
            Some(_) => {
                if self.other_link.is_none() {
                    self.other_link = Some(href);
                }
            }
        }
    }
}

/// Parse a feed body into normalized entries.
///
/// `now` is the fallback publication time for items when neither the item
/// nor the feed carries a timestamp.
///
/// # Errors
///
/// Returns [`ParseError::Xml`] if the body is not well-formed XML.
pub fn parse_feed(body: &[u8], now: DateTime<Utc>) -> Result<ParsedFeed, ParseError> {
    let raw = read_raw_feed(body)?;
    let mut parsed = ParsedFeed::default();

    for (index, item) in raw.entries.into_iter().enumerate() {
        let hint = item
            .title
            .clone()
            .or_else(|| item.id.clone())
            .or_else(|| item.link.clone());
        match resolve_entry(item, raw.updated.as_deref(), now) {
            Ok(entry) => parsed.entries.push(entry),
            Err(reason) => parsed.rejected.push(RejectedEntry {
                index,
                reason,
                hint,
            }),
        }
    }

    Ok(parsed)
}

/// Apply the field derivation policy to one raw item.
///
/// # Errors
///
/// Returns the [`RejectReason`] when the item lacks a usable identifier or title.
pub fn resolve_entry(
    raw: RawEntry,
    feed_updated: Option<&str>,
    now: DateTime<Utc>,
) -> Result<Entry, RejectReason> {
    let link = raw.link.or(raw.other_link);
    let id = match (raw.id, &link) {
        (Some(id), _) => id,
        (None, Some(link)) => link.clone(),
        (None, None) => return Err(RejectReason::MissingIdAndLink),
    };

    let title = raw
        .title
        .map(|t| ascii_only(&t).trim().to_string())
        .filter(|t| !t.is_empty())
        .ok_or(RejectReason::MissingTitle)?;

    let summary = raw
        .summary
        .or_else(|| raw.contents.into_iter().next())
        .map(|s| ascii_only(&strip_html(&s)).trim().to_string())
        .unwrap_or_default();

    let (published, published_utc) = match (raw.published, feed_updated) {
        (Some(text), _) => {
            let utc = parse_feed_timestamp(&text);
            (text, utc)
        }
        (None, Some(updated)) => (updated.to_string(), parse_feed_timestamp(updated)),
        (None, None) => (now.to_rfc2822(), Some(now)),
    };

    Ok(Entry {
        id,
        title,
        link: link.unwrap_or_default(),
        summary,
        published,
        published_utc,
    })
}

/// Raw items plus the feed-level "updated" timestamp text.
#[derive(Debug, Default)]
pub struct RawFeed {
    pub updated: Option<String>,
    pub entries: Vec<RawEntry>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ItemField {
    Id,
    Title,
    Link,
    Summary,
    Content,
    Published,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Target {
    Item(ItemField),
    FeedUpdated,
    FeedPubDate,
}

/// Text being collected for one element, including any nested markup's text.
struct Capture {
    target: Target,
    depth: usize,
    buf: String,
}

fn item_field(prefix: Option<&[u8]>, local: &[u8]) -> Option<ItemField> {
    match (prefix, local) {
        (None | Some(b"atom"), b"guid" | b"id") => Some(ItemField::Id),
        (None | Some(b"atom"), b"title") => Some(ItemField::Title),
        (None | Some(b"atom"), b"link") => Some(ItemField::Link),
        (None | Some(b"atom"), b"description" | b"summary") => Some(ItemField::Summary),
        (Some(b"content"), b"encoded") | (None | Some(b"atom"), b"content") => {
            Some(ItemField::Content)
        }
        (None | Some(b"atom"), b"pubDate" | b"published" | b"issued") | (Some(b"dc"), b"date") => {
            Some(ItemField::Published)
        }
        _ => None,
    }
}

fn feed_field(prefix: Option<&[u8]>, local: &[u8]) -> Option<Target> {
    match (prefix, local) {
        (None | Some(b"atom"), b"lastBuildDate" | b"updated") | (Some(b"dc"), b"date") => {
            Some(Target::FeedUpdated)
        }
        (None, b"pubDate") => Some(Target::FeedPubDate),
        _ => None,
    }
}

fn is_item(local: &[u8]) -> bool {
    local == b"item" || local == b"entry"
}

fn is_feed_container(local: Option<&Vec<u8>>) -> bool {
    matches!(local.map(Vec::as_slice), Some(b"channel" | b"feed"))
}

fn attribute(e: &BytesStart<'_>, name: &str) -> Option<String> {
    e.try_get_attribute(name)
        .ok()
        .flatten()
        .and_then(|attr| attr.unescape_value().ok().map(|v| v.trim().to_string()))
}

fn text_of(e: &BytesText<'_>) -> String {
    match e.unescape() {
        Ok(text) => text.into_owned(),
        // HTML entities such as &nbsp; are not XML entities; decode them leniently.
        Err(_) => html_escape::decode_html_entities(&String::from_utf8_lossy(e.as_ref()))
            .into_owned(),
    }
}

/// Walk the XML events and collect raw items.
///
/// # Errors
///
/// Returns [`ParseError::Xml`] on malformed XML.
#[allow(clippy::too_many_lines)] // Single event loop: item, field and feed-level capture tracking
pub fn read_raw_feed(body: &[u8]) -> Result<RawFeed, ParseError> {
    let mut reader = Reader::from_reader(body);

    let mut feed = RawFeed::default();
    let mut feed_pub_date: Option<String> = None;
    let mut stack: Vec<Vec<u8>> = Vec::new();
    let mut current: Option<(RawEntry, usize)> = None;
    let mut capture: Option<Capture> = None;

    loop {
        let event = match reader.read_event() {
            Ok(event) => event,
            Err(source) => {
                let position: u64 = reader.buffer_position().try_into().unwrap_or(u64::MAX);
                return Err(ParseError::Xml { position, source });
            }
        };

        match event {
            Event::Start(e) => {
                let name = e.name();
                let prefix = name.prefix().map(|p| p.as_ref().to_vec());
                let local = e.local_name().as_ref().to_vec();

                if capture.is_none() {
                    if current.is_none() && is_item(&local) {
                        current = Some((RawEntry::default(), stack.len()));
                    } else if let Some((entry, depth)) = current.as_mut() {
                        if stack.len() == *depth + 1 {
                            if let Some(field) = item_field(prefix.as_deref(), &local) {
                                if field == ItemField::Link {
                                    if let Some(href) = attribute(&e, "href") {
                                        entry.offer_link(href, attribute(&e, "rel").as_deref());
                                    }
                                }
                                capture = Some(Capture {
                                    target: Target::Item(field),
                                    depth: stack.len(),
                                    buf: String::new(),
                                });
                            }
                        }
                    } else if is_feed_container(stack.last()) {
                        if let Some(target) = feed_field(prefix.as_deref(), &local) {
                            capture = Some(Capture {
                                target,
                                depth: stack.len(),
                                buf: String::new(),
                            });
                        }
                    }
                }

                stack.push(local);
            }
            Event::Empty(e) => {
                if capture.is_some() {
                    continue;
                }
                let name = e.name();
                let prefix = name.prefix().map(|p| p.as_ref().to_vec());
                if let Some((entry, depth)) = current.as_mut() {
                    if stack.len() == *depth + 1
                        && item_field(prefix.as_deref(), e.local_name().as_ref())
                            == Some(ItemField::Link)
                    {
                        if let Some(href) = attribute(&e, "href") {
                            entry.offer_link(href, attribute(&e, "rel").as_deref());
                        }
                    }
                }
            }
            Event::Text(e) => {
                if let Some(cap) = capture.as_mut() {
                    cap.buf.push_str(&text_of(&e));
                }
            }
            Event::CData(e) => {
                if let Some(cap) = capture.as_mut() {
                    cap.buf.push_str(&String::from_utf8_lossy(e.as_ref()));
                }
            }
            Event::End(_) => {
                stack.pop();

                if capture.as_ref().is_some_and(|cap| cap.depth == stack.len()) {
                    if let Some(cap) = capture.take() {
                        let entry = current.as_mut().map(|(entry, _)| entry);
                        store_capture(cap, entry, &mut feed, &mut feed_pub_date);
                    }
                }

                if current.as_ref().is_some_and(|(_, depth)| *depth == stack.len()) {
                    if let Some((entry, _)) = current.take() {
                        feed.entries.push(entry);
                    }
                }
            }
            Event::Eof => break,
            _ => {}
        }
    }

    if feed.updated.is_none() {
        feed.updated = feed_pub_date;
    }
    Ok(feed)
}

fn store_capture(
    cap: Capture,
    entry: Option<&mut RawEntry>,
    feed: &mut RawFeed,
    feed_pub_date: &mut Option<String>,
) {
    let text = cap.buf.trim();
    if text.is_empty() {
        return;
    }
    let text = text.to_string();

    match (cap.target, entry) {
        (Target::Item(field), Some(entry)) => match field {
            ItemField::Id => {
                entry.id.get_or_insert(text);
            }
            ItemField::Title => {
                entry.title.get_or_insert(text);
            }
            ItemField::Link => {
                entry.link.get_or_insert(text);
            }
            ItemField::Summary => {
                entry.summary.get_or_insert(text);
            }
            ItemField::Content => entry.contents.push(text),
            ItemField::Published => {
                entry.published.get_or_insert(text);
            }
        },
        (Target::FeedUpdated, _) => {
            feed.updated.get_or_insert(text);
        }
        (Target::FeedPubDate, _) => {
            feed_pub_date.get_or_insert(text);
        }
        (Target::Item(_), None) => {}
    }
}
