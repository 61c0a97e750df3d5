//! Core video model, scope keys and dedup policies for ytwatch.

use std::borrow::Cow;
use std::fmt;

use chrono::{DateTime, FixedOffset, Local, ParseError, TimeZone};
use serde::{Deserialize, Serialize};

pub const CRATE_NAME: &str = "ytwatch-core";

/// A video as reported by a channel feed, or as read back from storage.
///
/// `published` is kept as the raw string the feed delivered. It is only parsed on demand
/// because a malformed value is a per-item failure, never a reason to reject the whole batch.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Video {
    pub id: String,
    pub title: String,
    pub published: String,
    pub channel_id: String,
}

impl Video {
    pub fn new(
        id: impl Into<String>,
        title: impl Into<String>,
        published: impl Into<String>,
        channel_id: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            published: published.into(),
            channel_id: channel_id.into(),
        }
    }

    pub fn published_at(&self) -> Result<DateTime<FixedOffset>, ParseError> {
        parse_published(&self.published)
    }

    /// Title in its line-safe stored form.
    pub fn escaped_title(&self) -> Cow<'_, str> {
        escape_title(&self.title)
    }

    /// Title with stored escapes restored, for logs and notifications.
    pub fn display_title(&self) -> Cow<'_, str> {
        unescape_title(&self.title)
    }
}

pub fn parse_published(value: &str) -> Result<DateTime<FixedOffset>, ParseError> {
    DateTime::parse_from_rfc3339(value)
}

/// Replace every newline with the two characters `\` `n`.
pub fn escape_title(title: &str) -> Cow<'_, str> {
    if title.contains('\n') {
        Cow::Owned(title.replace('\n', "\\n"))
    } else {
        Cow::Borrowed(title)
    }
}

/// Best-effort inverse of [`escape_title`]. A title that already contained a literal `\n`
/// before escaping comes back as a newline; storage never relies on this direction.
pub fn unescape_title(title: &str) -> Cow<'_, str> {
    if title.contains("\\n") {
        Cow::Owned(title.replace("\\n", "\n"))
    } else {
        Cow::Borrowed(title)
    }
}

/// `YYYY-MM` of an instant, observed in `tz`.
pub fn month_key<Tz>(published: &DateTime<FixedOffset>, tz: &Tz) -> String
where
    Tz: TimeZone,
    Tz::Offset: fmt::Display,
{
    published.with_timezone(tz).format("%Y-%m").to_string()
}

/// One channel's calendar month: the unit of grouping for the flat-file archive.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct MonthScope {
    pub channel_id: String,
    pub month: String,
}

impl MonthScope {
    pub fn new(channel_id: impl Into<String>, month: impl Into<String>) -> Self {
        Self {
            channel_id: channel_id.into(),
            month: month.into(),
        }
    }

    pub fn for_video_in<Tz>(video: &Video, tz: &Tz) -> Result<Self, ParseError>
    where
        Tz: TimeZone,
        Tz::Offset: fmt::Display,
    {
        let published = video.published_at()?;
        Ok(Self::new(video.channel_id.clone(), month_key(&published, tz)))
    }

    /// Scope of a video using the process-local time zone.
    pub fn for_video(video: &Video) -> Result<Self, ParseError> {
        Self::for_video_in(video, &Local)
    }
}

impl fmt::Display for MonthScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.channel_id, self.month)
    }
}

/// How "already seen" is decided.
///
/// The flat-file archive compares escaped titles, so two distinct ids sharing a title in the
/// same channel-month collapse into one entry. The relational ledger compares ids. The two
/// are kept apart on purpose: merging them would change which videos each backend records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DedupPolicy {
    EscapedTitle,
    Identifier,
}

impl DedupPolicy {
    pub fn key<'a>(&self, video: &'a Video) -> Cow<'a, str> {
        match self {
            DedupPolicy::EscapedTitle => video.escaped_title(),
            DedupPolicy::Identifier => Cow::Borrowed(video.id.as_str()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn video(id: &str, title: &str, published: &str) -> Video {
        Video::new(id, title, published, "UC123")
    }

    #[test]
    fn escape_replaces_newlines_with_literal_sequence() {
        assert_eq!(escape_title("Part 1\nPart 2"), "Part 1\\nPart 2");
        assert!(matches!(escape_title("plain"), Cow::Borrowed("plain")));
    }

    #[test]
    fn escaped_form_is_stable_under_reescaping() {
        let once = escape_title("a\nb").into_owned();
        assert_eq!(escape_title(&once), once);
    }

    #[test]
    fn unescape_restores_newlines_for_display() {
        let v = video("a", "Line one\\nLine two", "2024-03-15T10:00:00Z");
        assert_eq!(v.display_title(), "Line one\nLine two");
    }

    #[test]
    fn month_scope_uses_requested_zone() {
        let v = video("a", "Show", "2024-03-31T23:30:00Z");
        assert_eq!(MonthScope::for_video_in(&v, &Utc).unwrap().month, "2024-03");

        let ahead = FixedOffset::east_opt(2 * 3600).unwrap();
        assert_eq!(MonthScope::for_video_in(&v, &ahead).unwrap().month, "2024-04");
    }

    #[test]
    fn malformed_published_is_a_parse_error() {
        let v = video("a", "Show", "not-a-date");
        assert!(v.published_at().is_err());
        assert!(MonthScope::for_video(&v).is_err());
    }

    #[test]
    fn dedup_policies_compare_different_fields() {
        let a = video("id-1", "Same\nTitle", "2024-03-15T10:00:00Z");
        let b = video("id-2", "Same\nTitle", "2024-03-16T10:00:00Z");

        let by_title = DedupPolicy::EscapedTitle;
        assert_eq!(by_title.key(&a), by_title.key(&b));
        assert_eq!(by_title.key(&a), "Same\\nTitle");

        let by_id = DedupPolicy::Identifier;
        assert_ne!(by_id.key(&a), by_id.key(&b));
    }

    #[test]
    fn scope_displays_as_channel_and_month() {
        assert_eq!(MonthScope::new("UC123", "2024-03").to_string(), "UC123/2024-03");
    }
}
