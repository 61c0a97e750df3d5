//! Channel feed client: fetch a channel's Atom feed and turn its entries into videos.

use async_trait::async_trait;
use quick_xml::events::Event;
use quick_xml::Reader;
use thiserror::Error;
use tracing::debug;
use ytwatch_core::Video;
use ytwatch_storage::{FetchError, HttpClientConfig, HttpFetcher};

pub const CRATE_NAME: &str = "ytwatch-feed";

pub const DEFAULT_FEED_BASE_URL: &str = "https://www.youtube.com";

/// Literal prefix on every entry id; the remainder is the bare video id.
pub const VIDEO_ID_PREFIX: &str = "yt:video:";

/// Any reason a channel's fetch produced no usable list. Callers treat every variant the
/// same way: the whole channel failed and nothing from it is processed.
#[derive(Debug, Error)]
pub enum FeedError {
    #[error("channel id is empty")]
    EmptyChannel,
    #[error(transparent)]
    Fetch(#[from] FetchError),
    #[error("malformed feed body: {0}")]
    Parse(#[from] quick_xml::Error),
    #[error("not an Atom feed (root element '{root}')")]
    NotAtom { root: String },
}

#[async_trait]
pub trait FeedClient: Send + Sync {
    /// Videos currently listed for `channel_id`, in feed order.
    async fn fetch(&self, channel_id: &str) -> Result<Vec<Video>, FeedError>;
}

#[derive(Debug, Clone)]
pub struct FeedClientConfig {
    pub base_url: String,
    pub proxy: Option<String>,
    pub user_agent: Option<String>,
}

impl Default for FeedClientConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_FEED_BASE_URL.to_string(),
            proxy: None,
            user_agent: Some(format!("ytwatch/{}", env!("CARGO_PKG_VERSION"))),
        }
    }
}

#[derive(Debug, Clone)]
pub struct YoutubeFeedClient {
    http: HttpFetcher,
    base_url: String,
}

impl YoutubeFeedClient {
    pub fn new(config: FeedClientConfig) -> anyhow::Result<Self> {
        let http = HttpFetcher::new(HttpClientConfig {
            user_agent: config.user_agent,
            proxy: config.proxy,
        })?;
        Ok(Self {
            http,
            base_url: config.base_url,
        })
    }

    pub fn feed_url(&self, channel_id: &str) -> String {
        feed_url(&self.base_url, channel_id)
    }
}

pub fn feed_url(base_url: &str, channel_id: &str) -> String {
    format!(
        "{}/feeds/videos.xml?channel_id={}",
        base_url.trim_end_matches('/'),
        channel_id
    )
}

#[async_trait]
impl FeedClient for YoutubeFeedClient {
    async fn fetch(&self, channel_id: &str) -> Result<Vec<Video>, FeedError> {
        if channel_id.trim().is_empty() {
            return Err(FeedError::EmptyChannel);
        }
        let body = self.http.fetch_bytes(&self.feed_url(channel_id)).await?;
        let videos = parse_channel_feed(&body, channel_id)?;
        debug!(channel = channel_id, entries = videos.len(), "feed parsed");
        Ok(videos)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum EntryField {
    Id,
    Title,
    Published,
}

#[derive(Debug, Default)]
struct RawEntry {
    id: String,
    title: String,
    published: String,
}

impl RawEntry {
    fn field_mut(&mut self, field: EntryField) -> &mut String {
        match field {
            EntryField::Id => &mut self.id,
            EntryField::Title => &mut self.title,
            EntryField::Published => &mut self.published,
        }
    }

    fn into_video(self, channel_id: &str) -> Video {
        let id = match self.id.strip_prefix(VIDEO_ID_PREFIX) {
            Some(bare) => bare.to_string(),
            None => self.id,
        };
        Video::new(id, self.title, self.published, channel_id)
    }
}

/// Turn an Atom document into videos owned by `channel_id`, keeping entry order.
///
/// `id`, `title` and `published` are the entry's text exactly as delivered, entities
/// unescaped but otherwise untouched. A missing `published` becomes an empty string and a
/// malformed one is kept as-is; either fails later and is counted against that one item.
pub fn parse_channel_feed(body: &[u8], channel_id: &str) -> Result<Vec<Video>, FeedError> {
    let mut reader = Reader::from_reader(body);
    let mut buf = Vec::new();
    let mut videos = Vec::new();

    let mut saw_root = false;
    // Element depth inside the current <entry>; 0 means outside any entry.
    let mut depth = 0usize;
    let mut field: Option<EntryField> = None;
    let mut entry = RawEntry::default();

    loop {
        match reader.read_event_into(&mut buf)? {
            Event::Start(start) => {
                let name = start.name();
                if !saw_root {
                    if name.as_ref() != b"feed" {
                        return Err(FeedError::NotAtom {
                            root: String::from_utf8_lossy(name.as_ref()).into_owned(),
                        });
                    }
                    saw_root = true;
                } else if depth == 0 {
                    if name.as_ref() == b"entry" {
                        depth = 1;
                    }
                } else {
                    field = if depth == 1 {
                        match name.as_ref() {
                            b"id" => Some(EntryField::Id),
                            b"title" => Some(EntryField::Title),
                            b"published" => Some(EntryField::Published),
                            _ => None,
                        }
                    } else {
                        None
                    };
                    depth += 1;
                }
            }
            Event::Empty(empty) if !saw_root => {
                if empty.name().as_ref() != b"feed" {
                    return Err(FeedError::NotAtom {
                        root: String::from_utf8_lossy(empty.name().as_ref()).into_owned(),
                    });
                }
                saw_root = true;
            }
            Event::Text(text) => {
                if let Some(field) = field {
                    entry.field_mut(field).push_str(&text.unescape()?);
                }
            }
            Event::CData(cdata) => {
                if let Some(field) = field {
                    entry
                        .field_mut(field)
                        .push_str(&String::from_utf8_lossy(&cdata.into_inner()));
                }
            }
            Event::End(_) => {
                field = None;
                if depth > 0 {
                    depth -= 1;
                    if depth == 0 {
                        videos.push(std::mem::take(&mut entry).into_video(channel_id));
                    }
                }
            }
            Event::Eof => break,
            _ => {}
        }
        buf.clear();
    }

    if !saw_root {
        return Err(FeedError::NotAtom { root: String::new() });
    }
    Ok(videos)
}
