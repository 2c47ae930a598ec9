//! Item model for info-filter.
//!
//! An item is anything saved for later: a link, an EPUB book, an audio file
//! or a plain note. Items are persisted as a flat JSON array using the
//! camelCase field names every producer (desktop, extension, mobile) writes.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

use super::note::ItemNote;
use super::platform::detect_platform;

/// A saved item.
///
/// `id` is the only identity and merge key. The free-text fields are never
/// validated; missing values deserialize as empty strings so that items
/// written by older producers still load.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Item {
    /// Client-generated identifier (timestamp + random suffix)
    #[serde(deserialize_with = "lenient_string")]
    pub id: String,

    #[serde(default, deserialize_with = "lenient_string")]
    pub url: String,

    #[serde(default, deserialize_with = "lenient_string")]
    pub title: String,

    #[serde(default, deserialize_with = "lenient_string")]
    pub note: String,

    /// Thumbnail URL or `data:` URL (EPUB covers)
    #[serde(default, deserialize_with = "lenient_string")]
    pub image: String,

    #[serde(default, deserialize_with = "lenient_string")]
    pub category: String,

    #[serde(default, deserialize_with = "lenient_string")]
    pub platform: String,

    /// Creation timestamp (Unix milliseconds)
    #[serde(default, with = "created_at")]
    pub created_at: i64,

    #[serde(default, deserialize_with = "lenient_bool")]
    pub pinned: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub author: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub has_epub_file: Option<bool>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub has_audio_file: Option<bool>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_name: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_size: Option<u64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_type: Option<String>,

    /// Public URL when the payload lives in a cloud bucket
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_url: Option<String>,

    /// Legacy inline payload (base64). Read on input, never written back.
    #[serde(default, skip_serializing)]
    pub file_data: Option<String>,

    /// Attached Markdown notes, oldest first
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub notes: Vec<ItemNote>,

    /// Fields this version does not know about, kept verbatim.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Item {
    /// Create a new link item with a fresh id and the platform detected from the URL.
    #[must_use]
    pub fn new(url: &str, title: &str) -> Self {
        Self {
            id: generate_id(),
            url: url.to_string(),
            title: title.to_string(),
            note: String::new(),
            image: String::new(),
            category: "read_later".to_string(),
            platform: detect_platform(url).to_string(),
            created_at: now_millis(),
            pinned: false,
            author: None,
            has_epub_file: None,
            has_audio_file: None,
            file_name: None,
            file_size: None,
            file_type: None,
            file_url: None,
            file_data: None,
            notes: Vec::new(),
            extra: Map::new(),
        }
    }

    /// Whether a binary payload for this item lives in a blob store.
    #[must_use]
    pub fn has_file(&self) -> bool {
        self.has_epub_file.unwrap_or(false) || self.has_audio_file.unwrap_or(false)
    }
}

/// Current time as Unix milliseconds.
#[must_use]
pub fn now_millis() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

/// Generate an item id: base36 millisecond timestamp followed by a random base36 suffix.
#[must_use]
pub fn generate_id() -> String {
    let millis = u128::try_from(now_millis()).unwrap_or_default();
    let random = uuid::Uuid::new_v4().as_u128() >> 64;
    let suffix = to_base36(random);
    format!("{}{}", to_base36(millis), &suffix[..suffix.len().min(11)])
}

fn to_base36(mut n: u128) -> String {
    const DIGITS: &[u8; 36] = b"0123456789abcdefghijklmnopqrstuvwxyz";
    if n == 0 {
        return "0".to_string();
    }
    let mut out = Vec::new();
    while n > 0 {
        out.push(DIGITS[(n % 36) as usize]);
        n /= 36;
    }
    out.reverse();
    String::from_utf8(out).unwrap_or_default()
}

/// Parse a historical `createdAt` string into Unix milliseconds.
///
/// Accepts RFC 3339 (`2024-03-01T10:00:00.000Z`), naive ISO date-times
/// (taken as UTC), bare dates, and decimal millisecond strings.
#[must_use]
pub fn parse_timestamp(raw: &str) -> Option<i64> {
    use chrono::{DateTime, NaiveDate, NaiveDateTime};

    let s = raw.trim();
    if s.is_empty() {
        return None;
    }
    if let Ok(n) = s.parse::<i64>() {
        return Some(n);
    }
    if let Ok(f) = s.parse::<f64>() {
        return f.is_finite().then(|| f as i64);
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.timestamp_millis());
    }
    if let Ok(dt) = NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S%.f") {
        return Some(dt.and_utc().timestamp_millis());
    }
    if let Ok(dt) = NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S") {
        return Some(dt.and_utc().timestamp_millis());
    }
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|dt| dt.and_utc().timestamp_millis())
}

/// Sort for display: pinned first, then `createdAt` descending.
///
/// The sort is stable, so ties keep their stored relative order.
pub fn sort_for_display(items: &mut [Item]) {
    items.sort_by(|a, b| {
        b.pinned
            .cmp(&a.pinned)
            .then_with(|| b.created_at.cmp(&a.created_at))
    });
}

/// Stable partition moving pinned items ahead of unpinned ones.
pub fn partition_pinned(items: &mut [Item]) {
    items.sort_by(|a, b| b.pinned.cmp(&a.pinned));
}

/// `createdAt` is always written as epoch milliseconds but read from either
/// representation older producers used.
mod created_at {
    use serde::{Deserialize, Deserializer, Serializer};
    use serde_json::Value;

    #[allow(clippy::trivially_copy_pass_by_ref)]
    pub fn serialize<S: Serializer>(millis: &i64, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_i64(*millis)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<i64, D::Error> {
        let value = Option::<Value>::deserialize(deserializer)?;
        Ok(match value {
            Some(Value::Number(n)) => n
                .as_i64()
                .or_else(|| n.as_f64().map(|f| f as i64))
                .unwrap_or(0),
            Some(Value::String(s)) => super::parse_timestamp(&s).unwrap_or(0),
            _ => 0,
        })
    }
}

fn lenient_string<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(Value::String(s)) => s,
        Some(Value::Null) | None => String::new(),
        Some(other) => other.to_string(),
    })
}

fn lenient_bool<'de, D: Deserializer<'de>>(deserializer: D) -> Result<bool, D::Error> {
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(Value::Bool(b)) => b,
        Some(Value::Number(n)) => n.as_i64().is_some_and(|n| n != 0),
        Some(Value::String(s)) => s == "true",
        _ => false,
    })
}
