//! `serve` and `connect`: the two ends of live sync.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use colored::Colorize;

use super::{open_library, runtime};
use crate::cli::{Cli, ConnectArgs, ServeArgs};
use crate::config::{resolve_bind_addr, resolve_static_dir};
use crate::error::Result;
use crate::library::Library;
use crate::metadata::MetadataFetcher;
use crate::sync::{ConnectionState, Message, SyncClient, SyncHub};

/// Execute `serve`. Runs until Ctrl-C.
///
/// # Errors
///
/// Returns config errors or bind/serve failures.
pub fn execute_serve(args: &ServeArgs, cli: &Cli) -> Result<()> {
    let addr = resolve_bind_addr(args.host.as_deref(), args.port)?;
    let static_dir = resolve_static_dir(args.static_dir.as_deref());
    let library = open_library(cli)?;
    let announce = !crate::is_silent() && !cli.quiet;
    runtime()?.block_on(host(library, addr, static_dir, announce))
}

async fn host(
    mut library: Library,
    addr: SocketAddr,
    static_dir: Option<PathBuf>,
    announce: bool,
) -> Result<()> {
    let moved = library.materialize_inline_files().await?;
    if moved > 0 {
        tracing::info!(moved, "migrated inline files before serving");
    }

    if announce {
        eprintln!(
            "{} {} ({})",
            "Serving".green().bold(),
            format!("http://{addr}").bold(),
            library.describe()
        );
    }

    let hub = Arc::new(SyncHub::new(library, MetadataFetcher::default()));
    crate::server::serve(addr, hub, static_dir).await
}

/// Execute `connect`.
///
/// Never fails on connection problems: an unreachable host is reported and
/// the local store is left as it was.
///
/// # Errors
///
/// Returns store errors while applying host pushes.
pub fn execute_connect(args: &ConnectArgs, cli: &Cli, json: bool) -> Result<()> {
    let library = open_library(cli)?;
    runtime()?.block_on(mirror(library, args, json))
}

async fn mirror(library: Library, args: &ConnectArgs, json: bool) -> Result<()> {
    let timeout = Duration::from_secs(args.timeout);
    let mut client = SyncClient::connect(library, &args.host, timeout).await;
    let items = client.request_items(timeout).await.unwrap_or_else(|e| {
        tracing::warn!(error = %e, "host did not send items");
        client.library().items().unwrap_or_default()
    });

    report(client.state(), items.len(), json)?;

    if !args.watch || !client.is_connected() {
        return Ok(());
    }

    loop {
        let message = tokio::select! {
            message = client.next_message(Duration::from_secs(60)) => message?,
            _ = tokio::signal::ctrl_c() => return Ok(()),
        };
        match message {
            Some(Message::ItemsUpdated { items }) => {
                if json {
                    let event = serde_json::json!({ "event": "items-updated", "count": items.len() });
                    println!("{event}");
                } else if !crate::is_silent() {
                    println!("{} {} items", "Updated:".cyan(), items.len());
                }
            }
            None if !client.is_connected() => {
                report(client.state(), client.library().items()?.len(), json)?;
                return Ok(());
            }
            Some(_) | None => {}
        }
    }
}

fn report(state: &ConnectionState, count: usize, json: bool) -> Result<()> {
    if json {
        let output = serde_json::json!({ "connection": state, "items": count });
        println!("{}", serde_json::to_string(&output)?);
        return Ok(());
    }
    if crate::is_silent() {
        return Ok(());
    }
    match state {
        ConnectionState::Connected { url } => {
            println!("{} {url} ({count} items)", "Connected:".green().bold());
        }
        ConnectionState::LocalOnly { reason } => {
            println!("{} {reason} ({count} local items)", "Local only:".yellow().bold());
        }
    }
    Ok(())
}
