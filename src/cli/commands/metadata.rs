//! Metadata command implementation.

use colored::Colorize;

use super::runtime;
use crate::error::Result;
use crate::metadata::MetadataFetcher;

/// Execute `metadata`. Never fails on network problems; prints empty fields.
///
/// # Errors
///
/// Returns an error if the runtime cannot start or output cannot be encoded.
pub fn execute(url: &str, json: bool) -> Result<()> {
    let metadata = runtime()?.block_on(MetadataFetcher::default().fetch(url));

    if json {
        println!("{}", serde_json::to_string(&metadata)?);
    } else if metadata.is_empty() {
        println!("{}", "No metadata found.".dimmed());
    } else {
        println!("Title: {}", metadata.title);
        println!("Image: {}", metadata.image);
    }
    Ok(())
}
