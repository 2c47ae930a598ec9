//! Data models for info-filter.
//!
//! This module contains the domain models:
//! - Item (the saved link / book / audio file / note)
//! - ItemNote (Markdown notes attached to an item)
//! - Mode and platform heuristics used to group items for display

pub mod item;
pub mod note;
pub mod platform;

pub use item::{Item, generate_id, now_millis, parse_timestamp, partition_pinned, sort_for_display};
pub use note::{ItemNote, note_preview, note_title};
pub use platform::{
    Mode, bilibili_video_id, category_label, detect_platform, youtube_thumbnail, youtube_video_id,
};
