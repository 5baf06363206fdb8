//! `campdesk`: manage campaign records and the compiled category tree.

use std::path::{Path, PathBuf};
use std::sync::mpsc;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use campdesk_core::{settings, view_schema, FileService, Settings};
use clap::{Parser, Subcommand};
use notify::{recommended_watcher, EventKind, RecursiveMode, Watcher};
use serde_json::Value;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Debug, Parser)]
#[command(name = "campdesk", version, about = "Campaign records and category tree")]
struct Cli {
    /// Data directory (defaults to $CAMPDESK_HOME or ~/.campdesk).
    #[arg(long, global = true)]
    home: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Print every record in the collection.
    List,
    /// Print one record by id.
    Get { id: String },
    /// Add a record given as a JSON object; prints it with its id.
    Add { record: String },
    /// Merge a JSON object into an existing record.
    Update { id: String, patch: String },
    /// Remove a record.
    Delete { id: String },
    /// Rebuild the category tree and print the compile report.
    Compile,
    /// Print the last published category tree.
    Show,
    /// Print the JSON Schema of the published tree.
    Schema,
    /// Rebuild the tree whenever the collection file changes.
    Watch {
        /// Quiet period before rebuilding after a change, in milliseconds.
        #[arg(long, default_value_t = 200)]
        debounce_ms: u64,
    },
    /// Write default settings into the data directory.
    Init,
}

fn parse_object(text: &str, what: &str) -> Result<Value> {
    let value: Value =
        serde_json::from_str(text).with_context(|| format!("{what} is not valid JSON"))?;
    if !value.is_object() {
        bail!("{what} must be a JSON object");
    }
    Ok(value)
}

fn print_json(value: &impl serde::Serialize) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn init(home: &Path) -> Result<()> {
    let path = settings::settings_path(home);
    if path.exists() {
        eprintln!("{} already exists, leaving it alone", path.display());
        return Ok(());
    }
    settings::write_settings(home, &Settings::default())?;
    eprintln!("Wrote {}", path.display());
    Ok(())
}

fn watch(service: &FileService, debounce: Duration) -> Result<()> {
    let collection = service.collection().path().to_path_buf();
    let dir = collection
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."))
        .to_path_buf();
    std::fs::create_dir_all(&dir).with_context(|| format!("creating {}", dir.display()))?;
    let file_name = collection.file_name().map(|n| n.to_os_string());

    let (tx, rx) = mpsc::channel();
    let mut watcher = recommended_watcher(move |res: notify::Result<notify::Event>| {
        let Ok(event) = res else { return };
        if !matches!(
            event.kind,
            EventKind::Create(_) | EventKind::Modify(_) | EventKind::Remove(_)
        ) {
            return;
        }
        // Atomic saves land as a rename onto the collection file.
        if event.paths.iter().any(|p| p.file_name() == file_name.as_deref()) {
            let _ = tx.send(());
        }
    })?;
    watcher.watch(&dir, RecursiveMode::NonRecursive)?;

    report(service.recompile())?;
    eprintln!("Watching {}", collection.display());
    while rx.recv().is_ok() {
        while rx.recv_timeout(debounce).is_ok() {}
        // Keep watching through bad edits; the next good save fixes the view.
        if let Err(err) = report(service.recompile()) {
            tracing::warn!(error = %err, "recompile after change failed");
        }
    }
    Ok(())
}

fn report(result: campdesk_core::Result<campdesk_core::CompileReport>) -> Result<()> {
    let report = result?;
    eprintln!(
        "compiled {} nodes in {} partitions ({} dropped, {} duplicates, {} orphans, {} cycles broken)",
        report.nodes,
        report.partitions,
        report.dropped,
        report.duplicates,
        report.orphans,
        report.cycles_broken
    );
    Ok(())
}

fn run(cli: Cli) -> Result<()> {
    let home = cli.home.unwrap_or_else(settings::home_dir);
    let service = campdesk_core::open(&home);

    match cli.command {
        Command::List => print_json(&service.list()?),
        Command::Get { id } => match service.get(&id)? {
            Some(record) => print_json(&record),
            None => bail!("no record with id '{id}'"),
        },
        Command::Add { record } => print_json(&service.create(parse_object(&record, "record")?)?),
        Command::Update { id, patch } => {
            print_json(&service.update(&id, parse_object(&patch, "patch")?)?)
        }
        Command::Delete { id } => {
            if !service.delete(&id)? {
                bail!("no record with id '{id}'");
            }
            Ok(())
        }
        Command::Compile => report(service.recompile()),
        Command::Show => print_json(&service.view_store().read()?),
        Command::Schema => print_json(&view_schema()),
        Command::Watch { debounce_ms } => watch(&service, Duration::from_millis(debounce_ms)),
        Command::Init => init(&home),
    }
}

fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().with_target(false).with_writer(std::io::stderr))
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .init();

    run(Cli::parse())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_global_home_after_subcommand() {
        let cli = Cli::parse_from(["campdesk", "update", "7", r#"{"name":"x"}"#, "--home", "/tmp/cd"]);
        assert_eq!(cli.home, Some(PathBuf::from("/tmp/cd")));
        assert!(matches!(cli.command, Command::Update { ref id, .. } if id == "7"));
    }

    #[test]
    fn watch_debounce_defaults() {
        let cli = Cli::parse_from(["campdesk", "watch"]);
        assert!(matches!(cli.command, Command::Watch { debounce_ms: 200 }));
    }

    #[test]
    fn rejects_non_object_payloads() {
        assert!(parse_object("[1, 2]", "record").is_err());
        assert!(parse_object("{broken", "record").is_err());
        assert!(parse_object(r#"{"name": "Dental"}"#, "record").is_ok());
    }

    #[test]
    fn end_to_end_against_temp_home() {
        let dir = tempfile::tempdir().unwrap();
        let home = dir.path().to_path_buf();
        let cli = |args: &[&str]| {
            let mut full = vec!["campdesk", "--home", home.to_str().unwrap()];
            full.extend_from_slice(args);
            run(Cli::parse_from(full))
        };
        cli(&["init"]).unwrap();
        cli(&["add", r#"{"name": "Dental", "type": "folder"}"#]).unwrap();
        cli(&["add", r#"{"name": "Implants", "parentId": "1"}"#]).unwrap();
        cli(&["compile"]).unwrap();
        assert!(cli(&["delete", "99"]).is_err());

        let view = campdesk_core::open(&home).view_store().read().unwrap();
        assert_eq!(view.get("Other").unwrap()[0].children[0].name, "Implants");
    }
}
