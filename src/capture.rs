//! Helpers shared by the capture paths (links, audio files, books).

use std::path::Path;

use crate::model::Mode;

/// MIME type for EPUB payloads.
pub const EPUB_CONTENT_TYPE: &str = "application/epub+zip";

/// Infer an `audio/*` content type from a file name's extension.
#[must_use]
pub fn audio_content_type(file_name: &str) -> Option<&'static str> {
    let ext = Path::new(file_name).extension()?.to_str()?.to_lowercase();
    Some(match ext.as_str() {
        "mp3" => "audio/mpeg",
        "wav" => "audio/wav",
        "m4a" => "audio/m4a",
        "mp4" => "audio/mp4",
        "ogg" | "oga" => "audio/ogg",
        "flac" => "audio/flac",
        "aac" => "audio/aac",
        _ => return None,
    })
}

/// Whether `content_type` names an audio format.
#[must_use]
pub fn is_audio_content_type(content_type: &str) -> bool {
    content_type.trim().to_lowercase().starts_with("audio/")
}

/// File name without its last extension (`talk.final.mp3` → `talk.final`).
#[must_use]
pub fn file_stem(file_name: &str) -> String {
    let base = Path::new(file_name)
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or(file_name);
    match base.rfind('.') {
        Some(idx) if idx > 0 => base[..idx].to_string(),
        _ => base.to_string(),
    }
}

/// Human-readable size: `B` below 1 KiB, then `KB` / `MB` with one decimal.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn format_size(bytes: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = 1024 * 1024;
    if bytes < KB {
        format!("{bytes} B")
    } else if bytes < MB {
        format!("{:.1} KB", bytes as f64 / KB as f64)
    } else {
        format!("{:.1} MB", bytes as f64 / MB as f64)
    }
}

/// Title for a captured link when metadata is missing.
///
/// Scraped title → `YouTube 视频` / `Bilibili 视频` → hostname → `未命名`.
/// Paper captures skip the hostname step: `arXiv 论文` for arxiv.org links,
/// `论文` otherwise.
#[must_use]
pub fn fallback_title(url: &str, scraped: &str, mode: Option<Mode>) -> String {
    let scraped = scraped.trim();
    if !scraped.is_empty() {
        return scraped.to_string();
    }
    if mode == Some(Mode::Paper) {
        let title = if url.contains("arxiv.org") { "arXiv 论文" } else { "论文" };
        return title.to_string();
    }
    if url.contains("youtube.com") || url.contains("youtu.be") {
        return "YouTube 视频".to_string();
    }
    if url.contains("bilibili.com") {
        return "Bilibili 视频".to_string();
    }
    url::Url::parse(url)
        .ok()
        .and_then(|u| u.host_str().map(str::to_string))
        .filter(|h| !h.is_empty())
        .unwrap_or_else(|| "未命名".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_audio_content_type() {
        assert_eq!(audio_content_type("talk.MP3"), Some("audio/mpeg"));
        assert_eq!(audio_content_type("a.flac"), Some("audio/flac"));
        assert_eq!(audio_content_type("notes.txt"), None);
        assert_eq!(audio_content_type("noext"), None);
    }

    #[test]
    fn test_file_stem() {
        assert_eq!(file_stem("talk.final.mp3"), "talk.final");
        assert_eq!(file_stem("/tmp/book.epub"), "book");
        assert_eq!(file_stem(".hidden"), ".hidden");
    }

    #[test]
    fn test_format_size() {
        assert_eq!(format_size(512), "512 B");
        assert_eq!(format_size(1536), "1.5 KB");
        assert_eq!(format_size(5 * 1024 * 1024), "5.0 MB");
    }

    #[test]
    fn test_fallback_title() {
        assert_eq!(fallback_title("https://x.com/a", "  Real  ", None), "Real");
        assert_eq!(fallback_title("https://youtu.be/abc", "", None), "YouTube 视频");
        assert_eq!(
            fallback_title("https://www.bilibili.com/video/BV1", "", None),
            "Bilibili 视频"
        );
        assert_eq!(
            fallback_title("https://news.example.org/a", "", Some(Mode::Web)),
            "news.example.org"
        );
        assert_eq!(fallback_title("not a url", "", None), "未命名");
    }

    #[test]
    fn test_fallback_title_for_papers() {
        let paper = Some(Mode::Paper);
        assert_eq!(fallback_title("https://arxiv.org/abs/1706.03762", "", paper), "arXiv 论文");
        assert_eq!(fallback_title("https://openreview.net/forum?id=x", "", paper), "论文");
        assert_eq!(fallback_title("https://arxiv.org/abs/1", "Attention", paper), "Attention");
        assert_eq!(fallback_title("https://arxiv.org/abs/1", "", None), "arxiv.org");
    }
}
