//! Item note commands: attach Markdown files, list, show and delete notes.

use colored::Colorize;
use serde::Serialize;

use super::files::read_file;
use super::{open_library, runtime, truncate};
use crate::cli::{Cli, NotesCommands};
use crate::error::{Error, Result};
use crate::model::{note_title, ItemNote};

#[derive(Serialize)]
struct NoteListOutput<'a> {
    id: &'a str,
    count: usize,
    notes: &'a [ItemNote],
}

/// Execute a `notes` subcommand.
///
/// # Errors
///
/// Returns `ItemNotFound` for unknown items, `InvalidArgument` for
/// non-Markdown files or unknown note ids, or store errors.
pub fn execute(command: &NotesCommands, cli: &Cli, json: bool) -> Result<()> {
    match command {
        NotesCommands::Add { id, files } => add(id, files, cli, json),
        NotesCommands::List { id } => list(id, cli, json),
        NotesCommands::Show { id, note_id } => show(id, note_id, cli, json),
        NotesCommands::Delete { id, note_id } => delete(id, note_id, cli, json),
    }
}

fn add(id: &str, files: &[std::path::PathBuf], cli: &Cli, json: bool) -> Result<()> {
    // Read and check every file before attaching any of them.
    let mut documents = Vec::with_capacity(files.len());
    for path in files {
        let (file_name, bytes) = read_file(path)?;
        if note_title(&file_name).is_none() {
            return Err(Error::InvalidArgument(format!(
                "{file_name} is not a Markdown file (.md, .markdown)"
            )));
        }
        let content = String::from_utf8(bytes)
            .map_err(|_| Error::InvalidArgument(format!("{file_name} is not UTF-8 text")))?;
        documents.push((file_name, content));
    }

    let mut library = open_library(cli)?;
    library.get(id)?;
    let rt = runtime()?;
    let mut attached = Vec::with_capacity(documents.len());
    for (file_name, content) in &documents {
        attached.push(rt.block_on(library.attach_note_file(id, file_name, content))?);
    }

    if crate::is_silent() {
        for note in &attached {
            println!("{}", note.id);
        }
    } else if json {
        let output = NoteListOutput {
            id,
            count: attached.len(),
            notes: &attached,
        };
        println!("{}", serde_json::to_string(&output)?);
    } else {
        for note in &attached {
            println!("{} {} ({})", "Attached:".green(), note.title.bold(), note.id);
        }
    }
    Ok(())
}

fn list(id: &str, cli: &Cli, json: bool) -> Result<()> {
    let notes = open_library(cli)?.notes(id)?;

    if json {
        let output = NoteListOutput {
            id,
            count: notes.len(),
            notes: &notes,
        };
        println!("{}", serde_json::to_string(&output)?);
        return Ok(());
    }
    if notes.is_empty() {
        if !crate::is_silent() {
            println!("No notes on {id}. Attach one with `ifl notes add {id} <file.md>`.");
        }
        return Ok(());
    }
    for note in &notes {
        if crate::is_silent() {
            println!("{}", note.id);
        } else {
            println!("{}  {}", note.id.dimmed(), note.title.bold());
            if !note.preview.is_empty() {
                println!("    {}", truncate(&note.preview, 80));
            }
        }
    }
    Ok(())
}

fn show(id: &str, note_id: &str, cli: &Cli, json: bool) -> Result<()> {
    let note = open_library(cli)?
        .notes(id)?
        .into_iter()
        .find(|n| n.id == note_id)
        .ok_or_else(|| Error::InvalidArgument(format!("item {id} has no note {note_id}")))?;

    if json {
        println!("{}", serde_json::to_string(&note)?);
    } else {
        println!("{}", note.content);
    }
    Ok(())
}

fn delete(id: &str, note_id: &str, cli: &Cli, json: bool) -> Result<()> {
    let mut library = open_library(cli)?;
    let deleted = runtime()?.block_on(library.delete_note(id, note_id))?;

    if crate::is_silent() {
        println!("{note_id}");
    } else if json {
        println!(
            "{}",
            serde_json::json!({ "id": id, "noteId": note_id, "deleted": deleted })
        );
    } else if deleted {
        println!("Deleted note {note_id} from {id}");
    } else {
        println!("No note {note_id} on {id}; nothing deleted.");
    }
    Ok(())
}
