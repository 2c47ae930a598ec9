//! info-filter CLI entry point.

use clap::Parser;
use info_filter::cli::commands;
use info_filter::cli::{Cli, Commands, OutputFormat};
use info_filter::error::Error;
use std::process::ExitCode;

fn main() -> ExitCode {
    let cli = Cli::parse();

    if cli.silent {
        info_filter::SILENT.store(true, std::sync::atomic::Ordering::Relaxed);
    }
    if cli.format == OutputFormat::Csv {
        info_filter::CSV_OUTPUT.store(true, std::sync::atomic::Ordering::Relaxed);
    }

    let is_tty = std::io::IsTerminal::is_terminal(&std::io::stdout());
    if cli.no_color || !is_tty {
        colored::control::set_override(false);
    }

    // Set up tracing based on verbosity
    init_tracing(cli.verbose, cli.quiet);

    // Resolve effective JSON mode: --json OR --format json OR non-TTY stdout
    let json = cli.json || cli.format == OutputFormat::Json || (!is_tty && cli.format != OutputFormat::Csv);

    match run(&cli, json) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            if json {
                eprintln!("{}", e.to_structured_json());
            } else if !cli.quiet {
                if let Some(hint) = e.hint() {
                    eprintln!("Error: {e}\n  Hint: {hint}");
                } else {
                    eprintln!("Error: {e}");
                }
            }
            ExitCode::from(e.exit_code())
        }
    }
}

fn init_tracing(verbose: u8, quiet: bool) {
    use tracing_subscriber::EnvFilter;

    if quiet {
        return;
    }

    // Honor RUST_LOG if set, otherwise use verbosity flag
    let filter = if std::env::var("RUST_LOG").is_ok() {
        EnvFilter::from_default_env()
    } else {
        match verbose {
            0 => EnvFilter::new("warn"),
            1 => EnvFilter::new("info"),
            2 => EnvFilter::new("debug,rusqlite=info,hyper=info,reqwest=info"),
            _ => EnvFilter::new("trace"),
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .without_time()
        .init();
}

fn run(cli: &Cli, json: bool) -> Result<(), Error> {
    match &cli.command {
        Commands::Add(args) => commands::items::execute_add(args, cli, json),
        Commands::List(args) => commands::items::execute_list(args, cli, json),
        Commands::Show { id } => commands::items::execute_show(id, cli, json),
        Commands::Delete { id } => commands::items::execute_delete(id, cli, json),
        Commands::Pin { id } => commands::items::execute_pin(id, cli, json),
        Commands::Note { id, text } => commands::items::execute_note(id, text, cli, json),
        Commands::Notes { command } => commands::notes::execute(command, cli, json),
        Commands::Move { id, to } => commands::items::execute_move(id, *to, cli, json),
        Commands::Reorder { ids } => commands::items::execute_reorder(ids, cli, json),

        Commands::AddEpub { path } => commands::files::execute_add_epub(path, cli, json),
        Commands::AddAudio { path, content_type } => {
            commands::files::execute_add_audio(path, content_type.as_deref(), cli, json)
        }
        Commands::Epub { path } => commands::files::execute_inspect(path, json),
        Commands::Metadata { url } => commands::metadata::execute(url, json),

        Commands::Export(args) => commands::backup::execute_export(args, cli, json),
        Commands::Import(args) => commands::backup::execute_import(args, cli, json),

        Commands::Serve(args) => commands::serve::execute_serve(args, cli),
        Commands::Connect(args) => commands::serve::execute_connect(args, cli, json),

        Commands::Completions { shell } => commands::completions::execute(shell),
        Commands::Version => commands::version::execute(cli, json),
    }
}
