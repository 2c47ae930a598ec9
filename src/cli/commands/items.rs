//! Item command implementations: capture, listing and edits.

use colored::Colorize;
use serde::Serialize;

use super::{open_library, runtime, truncate};
use crate::cli::{AddArgs, Cli, ListArgs, ListOrder};
use crate::error::Result;
use crate::library::LinkCapture;
use crate::metadata::{Metadata, MetadataFetcher};
use crate::model::{category_label, Item};

#[derive(Serialize)]
struct ItemListOutput<'a> {
    count: usize,
    items: &'a [Item],
}

/// Execute `add`.
///
/// # Errors
///
/// Propagates store errors. Scraping failures only lose the title.
pub fn execute_add(args: &AddArgs, cli: &Cli, json: bool) -> Result<()> {
    let mut library = open_library(cli)?;
    let rt = runtime()?;

    let mut metadata = if args.no_fetch {
        Metadata::default()
    } else {
        rt.block_on(MetadataFetcher::default().fetch(&args.url))
    };
    if let Some(title) = &args.title {
        metadata.title.clone_from(title);
    }

    let capture = LinkCapture {
        url: args.url.clone(),
        category: args.category.clone(),
        note: args.note.clone(),
        mode: args.mode,
    };
    let item = rt.block_on(library.add_url(&capture, &metadata))?;
    print_saved(&item, json)
}

/// Print a freshly saved item.
pub(crate) fn print_saved(item: &Item, json: bool) -> Result<()> {
    if crate::is_silent() {
        println!("{}", item.id);
    } else if json {
        println!("{}", serde_json::to_string(item)?);
    } else {
        println!("{} {}", "Saved:".green(), item.title.bold());
        println!("  ID:       {}", item.id);
        println!("  Platform: {}", item.platform);
        if !item.url.is_empty() {
            println!("  URL:      {}", item.url);
        }
    }
    Ok(())
}

/// Execute `list`.
///
/// # Errors
///
/// Propagates store errors.
pub fn execute_list(args: &ListArgs, cli: &Cli, json: bool) -> Result<()> {
    let library = open_library(cli)?;

    let mut items = if let Some(mode) = args.mode {
        library.by_mode(mode)?
    } else if let Some(platform) = &args.platform {
        library.filter_platform(platform)?
    } else if args.order == ListOrder::Stored {
        library.items()?
    } else {
        library.sorted()?
    };
    if let Some(limit) = args.limit {
        items.truncate(limit);
    }

    if crate::is_silent() {
        for item in &items {
            println!("{}", item.id);
        }
    } else if crate::is_csv() {
        println!("id,title,url,platform,category,pinned,created_at");
        for item in &items {
            println!(
                "{},{},{},{},{},{},{}",
                item.id,
                crate::csv_escape(&item.title),
                crate::csv_escape(&item.url),
                crate::csv_escape(&item.platform),
                crate::csv_escape(&item.category),
                item.pinned,
                item.created_at
            );
        }
    } else if json {
        let output = ItemListOutput {
            count: items.len(),
            items: &items,
        };
        println!("{}", serde_json::to_string(&output)?);
    } else if items.is_empty() {
        println!("No items saved.");
    } else {
        println!("Items ({} found):", items.len());
        println!();
        for item in &items {
            let pin = if item.pinned { "📌" } else { "•" };
            println!(
                "{pin} {} {} {}",
                truncate(&item.title, 60).bold(),
                format!("[{}]", item.platform).cyan(),
                item.id.dimmed()
            );
            if !item.url.is_empty() {
                println!("  {}", truncate(&item.url, 80));
            }
            if !item.note.is_empty() {
                println!("  {} {}", "✎".yellow(), truncate(&item.note, 80));
            }
        }
    }
    Ok(())
}

/// Execute `show`.
///
/// # Errors
///
/// Returns `ItemNotFound` for unknown ids.
pub fn execute_show(id: &str, cli: &Cli, json: bool) -> Result<()> {
    let item = open_library(cli)?.get(id)?;

    if json {
        println!("{}", serde_json::to_string(&item)?);
        return Ok(());
    }

    println!("{}", item.title.bold());
    println!("  ID:       {}", item.id);
    println!("  Platform: {}", item.platform);
    println!("  Category: {}", category_label(&item.category));
    println!("  Created:  {}", format_created(item.created_at));
    println!("  Pinned:   {}", if item.pinned { "yes" } else { "no" });
    if !item.url.is_empty() {
        println!("  URL:      {}", item.url);
    }
    if let Some(author) = &item.author {
        println!("  Author:   {author}");
    }
    if let Some(name) = &item.file_name {
        let size = item.file_size.map(crate::capture::format_size).unwrap_or_default();
        println!("  File:     {name} {}", size.dimmed());
    }
    if !item.note.is_empty() {
        println!();
        println!("{}", item.note);
    }
    Ok(())
}

fn format_created(millis: i64) -> String {
    chrono::DateTime::from_timestamp_millis(millis)
        .map(|dt| dt.format("%Y-%m-%d %H:%M").to_string())
        .unwrap_or_else(|| "unknown".to_string())
}

/// Execute `delete`.
///
/// # Errors
///
/// Propagates store errors. Deleting an unknown id is not an error.
pub fn execute_delete(id: &str, cli: &Cli, json: bool) -> Result<()> {
    let mut library = open_library(cli)?;
    let before = library.items()?.len();
    let items = runtime()?.block_on(library.delete(id))?;
    let deleted = items.len() < before;

    if crate::is_silent() {
        println!("{id}");
    } else if json {
        println!("{}", serde_json::json!({ "id": id, "deleted": deleted }));
    } else if deleted {
        println!("Deleted: {id}");
    } else {
        println!("No item with ID {id}; nothing deleted.");
    }
    Ok(())
}

/// Execute `pin`.
///
/// # Errors
///
/// Returns `ItemNotFound` for unknown ids.
pub fn execute_pin(id: &str, cli: &Cli, json: bool) -> Result<()> {
    let mut library = open_library(cli)?;
    library.get(id)?;
    let items = runtime()?.block_on(library.toggle_pin(id))?;
    let pinned = items.iter().any(|i| i.id == id && i.pinned);

    if crate::is_silent() {
        println!("{id}");
    } else if json {
        println!("{}", serde_json::json!({ "id": id, "pinned": pinned }));
    } else if pinned {
        println!("Pinned: {id}");
    } else {
        println!("Unpinned: {id}");
    }
    Ok(())
}

/// Execute `note`.
///
/// # Errors
///
/// Returns `ItemNotFound` for unknown ids.
pub fn execute_note(id: &str, text: &str, cli: &Cli, json: bool) -> Result<()> {
    let mut library = open_library(cli)?;
    runtime()?.block_on(library.set_note(id, text))?;

    if crate::is_silent() {
        println!("{id}");
    } else if json {
        println!("{}", serde_json::json!({ "id": id, "note": text }));
    } else {
        println!("Updated note: {id}");
    }
    Ok(())
}

/// Execute `move`.
///
/// # Errors
///
/// Returns `ItemNotFound` for unknown ids.
pub fn execute_move(id: &str, to: usize, cli: &Cli, json: bool) -> Result<()> {
    let mut library = open_library(cli)?;
    let items = runtime()?.block_on(library.move_item(id, to))?;
    let index = items.iter().position(|i| i.id == id).unwrap_or(to);

    if crate::is_silent() {
        println!("{id}");
    } else if json {
        println!("{}", serde_json::json!({ "id": id, "index": index }));
    } else {
        println!("Moved {id} to position {index}");
    }
    Ok(())
}

/// Execute `reorder`.
///
/// # Errors
///
/// Returns `InvalidArgument` unless `ids` names every stored item once.
pub fn execute_reorder(ids: &[String], cli: &Cli, json: bool) -> Result<()> {
    let mut library = open_library(cli)?;
    let items = runtime()?.block_on(library.reorder(ids))?;

    if json {
        let order: Vec<&str> = items.iter().map(|i| i.id.as_str()).collect();
        println!("{}", serde_json::json!({ "count": order.len(), "order": order }));
    } else if !crate::is_silent() {
        println!("Reordered {} items", items.len());
    }
    Ok(())
}
