//! Backup command implementations (JSON export/import).

use std::path::PathBuf;

use super::{open_library, runtime};
use crate::capture::format_size;
use crate::cli::{Cli, ExportArgs, ImportArgs};
use crate::error::{Error, Result};
use crate::sync::{default_export_path, Exporter, Importer};

/// Execute `export`.
///
/// # Errors
///
/// Returns store, blob or I/O errors.
pub fn execute_export(args: &ExportArgs, cli: &Cli, json: bool) -> Result<()> {
    let path = match &args.output {
        Some(path) => path.clone(),
        None => {
            let cwd = std::env::current_dir()
                .map_err(|e| Error::Other(format!("Failed to get current directory: {e}")))?;
            default_export_path(&cwd)
        }
    };

    let library = open_library(cli)?;
    let stats = runtime()?.block_on(Exporter::new(&library, args.with_files).export_to(&path))?;

    if crate::is_silent() {
        println!("{}", path.display());
    } else if json {
        let output = serde_json::json!({
            "success": true,
            "path": path.display().to_string(),
            "stats": stats,
        });
        println!("{}", serde_json::to_string(&output)?);
    } else {
        println!("Export complete: {}", path.display());
        println!();
        println!("  Items: {}", stats.items);
        if args.with_files {
            println!("  Files: {}", stats.files);
            if stats.missing_files > 0 {
                println!("  Missing files: {}", stats.missing_files);
            }
        }
        println!("  Size:  {}", format_size(stats.bytes));
    }
    Ok(())
}

/// Execute `import`.
///
/// # Errors
///
/// Returns `InvalidImport` for unrecognized documents, or store/blob errors.
pub fn execute_import(args: &ImportArgs, cli: &Cli, json: bool) -> Result<()> {
    let path: PathBuf = args.path.clone();
    let policy = args.merge_policy();

    let mut library = open_library(cli)?;
    let stats = runtime()?.block_on(Importer::new(&mut library, policy).import_file(&path))?;

    if json {
        let output = serde_json::json!({
            "success": true,
            "path": path.display().to_string(),
            "policy": policy.as_str(),
            "stats": stats,
        });
        println!("{}", serde_json::to_string(&output)?);
    } else if !crate::is_silent() {
        let items = &stats.items;
        println!("Import complete ({policy}): {}", path.display());
        println!();
        println!(
            "  Items: {} created, {} updated, {} unchanged, {} skipped",
            items.created, items.updated, items.unchanged, items.skipped
        );
        if items.removed > 0 {
            println!("  Removed: {}", items.removed);
        }
        if stats.files_restored > 0 || stats.files_skipped > 0 {
            println!(
                "  Files: {} restored, {} skipped",
                stats.files_restored, stats.files_skipped
            );
        }
        if stats.notes_restored > 0 {
            println!("  Notes: {} attached", stats.notes_restored);
        }
        println!();
        println!("  Total: {} items", stats.total);
    }
    Ok(())
}
