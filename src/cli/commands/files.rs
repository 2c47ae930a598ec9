//! EPUB and audio command implementations.

use std::path::Path;

use colored::Colorize;
use serde::Serialize;

use super::items::print_saved;
use super::{open_library, runtime};
use crate::capture::format_size;
use crate::cli::Cli;
use crate::epub::parse_epub;
use crate::error::{Error, Result};

pub(super) fn read_file(path: &Path) -> Result<(String, Vec<u8>)> {
    let file_name = path
        .file_name()
        .and_then(|n| n.to_str())
        .ok_or_else(|| Error::InvalidArgument(format!("not a file path: {}", path.display())))?
        .to_string();
    let bytes = std::fs::read(path)?;
    Ok((file_name, bytes))
}

/// Execute `add-epub`.
///
/// # Errors
///
/// Returns EPUB parse errors, blob errors or store errors.
pub fn execute_add_epub(path: &Path, cli: &Cli, json: bool) -> Result<()> {
    let (file_name, bytes) = read_file(path)?;
    let mut library = open_library(cli)?;
    let item = runtime()?.block_on(library.add_epub(&file_name, &bytes))?;
    print_saved(&item, json)
}

/// Execute `add-audio`.
///
/// # Errors
///
/// Returns `InvalidArgument` for non-audio files, blob errors or store errors.
pub fn execute_add_audio(
    path: &Path,
    content_type: Option<&str>,
    cli: &Cli,
    json: bool,
) -> Result<()> {
    let (file_name, bytes) = read_file(path)?;
    let mut library = open_library(cli)?;
    let item = runtime()?.block_on(library.add_audio(&file_name, &bytes, content_type))?;
    print_saved(&item, json)
}

#[derive(Serialize)]
struct EpubOutput<'a> {
    title: &'a str,
    author: &'a str,
    has_cover: bool,
    size: u64,
}

/// Execute `epub` (inspect only).
///
/// # Errors
///
/// Returns EPUB parse errors.
pub fn execute_inspect(path: &Path, json: bool) -> Result<()> {
    let (file_name, bytes) = read_file(path)?;
    let info = parse_epub(&bytes, &file_name)?;
    let size = bytes.len() as u64;

    if json {
        let output = EpubOutput {
            title: &info.title,
            author: &info.author,
            has_cover: info.cover.is_some(),
            size,
        };
        println!("{}", serde_json::to_string(&output)?);
    } else {
        println!("{}", info.title.bold());
        println!("  Author: {}", info.author);
        println!("  Cover:  {}", if info.cover.is_some() { "yes" } else { "no" });
        println!("  Size:   {}", format_size(size));
    }
    Ok(())
}
