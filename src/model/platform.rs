//! Platform detection and display modes.
//!
//! `platform` is free text on the item; these heuristics derive it from a URL
//! at capture time and derive the display mode from it at load time. Modes are
//! never stored.

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::LazyLock;

static YOUTUBE_ID: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r#"(?:youtube\.com/(?:[^/]+/.+/|(?:v|e(?:mbed)?)/|.*[?&]v=)|youtu\.be/)([^"&?/\s]{11})"#,
    )
    .expect("valid youtube regex")
});

static BILIBILI_ID: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"bilibili\.com/video/(BV[a-zA-Z0-9]+)").expect("valid bilibili regex"));

/// Detect the platform label for a captured URL.
#[must_use]
pub fn detect_platform(url: &str) -> &'static str {
    if url.contains("twitter.com") || url.contains("x.com") {
        "Twitter"
    } else if url.contains("youtube.com") || url.contains("youtu.be") {
        "YouTube"
    } else if url.contains("bilibili.com") {
        "Bilibili"
    } else {
        "Web"
    }
}

/// Extract the 11-character YouTube video id.
#[must_use]
pub fn youtube_video_id(url: &str) -> Option<String> {
    YOUTUBE_ID
        .captures(url)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().to_string())
}

/// Extract the Bilibili `BV…` id.
#[must_use]
pub fn bilibili_video_id(url: &str) -> Option<String> {
    BILIBILI_ID
        .captures(url)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().to_string())
}

/// Medium-quality YouTube thumbnail for a video id.
#[must_use]
pub fn youtube_thumbnail(video_id: &str) -> String {
    format!("https://img.youtube.com/vi/{video_id}/mqdefault.jpg")
}

/// Human label for a category key. Unknown keys are shown verbatim.
#[must_use]
pub fn category_label(key: &str) -> &str {
    match key {
        "read_later" => "稍后阅读",
        "learning" => "学习资料",
        "inspiration" => "灵感",
        "entertainment" => "娱乐",
        other => other,
    }
}

/// Display mode used to group items in the learning-space view.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    Video,
    Book,
    Paper,
    Audio,
    Web,
}

impl Mode {
    /// All modes in display order.
    pub const ALL: [Mode; 5] = [Mode::Video, Mode::Book, Mode::Paper, Mode::Audio, Mode::Web];

    /// Get the string representation.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Video => "video",
            Self::Book => "book",
            Self::Paper => "paper",
            Self::Audio => "audio",
            Self::Web => "web",
        }
    }

    /// Derive the mode from an item's platform (case-insensitive).
    #[must_use]
    pub fn from_platform(platform: &str) -> Self {
        match platform.to_lowercase().as_str() {
            "book" => Self::Book,
            "paper" => Self::Paper,
            "audio" => Self::Audio,
            "youtube" | "bilibili" | "video" => Self::Video,
            _ => Self::Web,
        }
    }

    /// Platform to store for an item captured while this mode is active.
    #[must_use]
    pub fn platform_for(&self, url: &str) -> &'static str {
        match self {
            Self::Book => "Book",
            Self::Paper => "Paper",
            Self::Audio => "Audio",
            Self::Web => "Web",
            Self::Video => {
                if url.contains("youtube.com") || url.contains("youtu.be") {
                    "YouTube"
                } else if url.contains("bilibili.com") {
                    "Bilibili"
                } else {
                    "Video"
                }
            }
        }
    }
}

impl std::fmt::Display for Mode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Mode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "video" => Ok(Self::Video),
            "book" => Ok(Self::Book),
            "paper" => Ok(Self::Paper),
            "audio" => Ok(Self::Audio),
            "web" => Ok(Self::Web),
            _ => Err(format!("Unknown mode: {s} (expected video, book, paper, audio, web)")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_detect_platform() {
        assert_eq!(detect_platform("https://twitter.com/a/status/1"), "Twitter");
        assert_eq!(detect_platform("https://x.com/a"), "Twitter");
        assert_eq!(detect_platform("https://www.youtube.com/watch?v=abc"), "YouTube");
        assert_eq!(detect_platform("https://www.bilibili.com/video/BV1xx"), "Bilibili");
        assert_eq!(detect_platform("https://example.org"), "Web");
        assert_eq!(detect_platform(""), "Web");
    }

    #[test]
    fn test_youtube_video_id() {
        assert_eq!(
            youtube_video_id("https://www.youtube.com/watch?v=dQw4w9WgXcQ&t=1").as_deref(),
            Some("dQw4w9WgXcQ")
        );
        assert_eq!(
            youtube_video_id("https://youtu.be/dQw4w9WgXcQ").as_deref(),
            Some("dQw4w9WgXcQ")
        );
        assert_eq!(youtube_video_id("https://example.com"), None);
    }

    #[test]
    fn test_bilibili_video_id() {
        assert_eq!(
            bilibili_video_id("https://www.bilibili.com/video/BV1GJ411x7h7?p=1").as_deref(),
            Some("BV1GJ411x7h7")
        );
    }

    #[test]
    fn test_mode_from_platform() {
        assert_eq!(Mode::from_platform("YouTube"), Mode::Video);
        assert_eq!(Mode::from_platform("Bilibili"), Mode::Video);
        assert_eq!(Mode::from_platform("Book"), Mode::Book);
        assert_eq!(Mode::from_platform("Twitter"), Mode::Web);
        assert_eq!(Mode::from_platform(""), Mode::Web);
    }

    #[test]
    fn test_mode_platform_for() {
        assert_eq!(Mode::Video.platform_for("https://youtu.be/x"), "YouTube");
        assert_eq!(Mode::Video.platform_for("https://vimeo.com/1"), "Video");
        assert_eq!(Mode::Paper.platform_for("https://arxiv.org/abs/1"), "Paper");
    }

    #[test]
    fn test_category_label() {
        assert_eq!(category_label("learning"), "学习资料");
        assert_eq!(category_label("custom"), "custom");
    }
}
