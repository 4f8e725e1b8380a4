//! `sat-server` command line

use anyhow::{Context, Result};
use clap::{value_parser, Arg, ArgAction, ArgGroup, Command};
use sat_server::cli::{self, NotesOutcome, RowSource};
use sat_server::{init_tracing, ConfigOverrides, LogFormat, ServerConfig};
use std::net::SocketAddr;
use std::path::PathBuf;

fn command() -> Command {
    Command::new("sat-server")
        .version(sat_server::VERSION)
        .about("Local persistence server for the SAT tools")
        .subcommand_required(true)
        .arg(
            Arg::new("log-format")
                .long("log-format")
                .global(true)
                .default_value("text")
                .value_parser(value_parser!(LogFormat))
                .help("Log output: text or json"),
        )
        .subcommand(
            Command::new("serve")
                .about("Serve a tool's assets and persistence API")
                .arg(
                    Arg::new("config")
                        .long("config")
                        .short('c')
                        .value_parser(value_parser!(PathBuf))
                        .help("TOML configuration file"),
                )
                .arg(
                    Arg::new("tool")
                        .long("tool")
                        .help("Tool name used in logs"),
                )
                .arg(
                    Arg::new("bind")
                        .long("bind")
                        .value_parser(value_parser!(SocketAddr))
                        .help("Listen address, e.g. 127.0.0.1:8000"),
                )
                .arg(
                    Arg::new("root")
                        .long("root")
                        .value_parser(value_parser!(PathBuf))
                        .help("Static asset root"),
                )
                .arg(
                    Arg::new("data")
                        .long("data")
                        .value_parser(value_parser!(PathBuf))
                        .help("Data directory"),
                ),
        )
        .subcommand(
            Command::new("merge")
                .about("Merge an indicator log into a bulleted document")
                .arg(
                    Arg::new("log")
                        .long("log")
                        .required(true)
                        .value_parser(value_parser!(PathBuf))
                        .help("JSONL indicator log"),
                )
                .arg(
                    Arg::new("doc")
                        .long("doc")
                        .required(true)
                        .value_parser(value_parser!(PathBuf))
                        .help("Bulleted document to update"),
                ),
        )
        .subcommand(
            Command::new("notes")
                .about("Write append-only Markdown notes from a hierarchy")
                .arg(
                    Arg::new("out")
                        .long("out")
                        .required(true)
                        .value_parser(value_parser!(PathBuf))
                        .help("Notes directory"),
                )
                .arg(
                    Arg::new("rows")
                        .long("rows")
                        .value_parser(value_parser!(PathBuf))
                        .help("JSONL file of {parts, description, source} rows"),
                )
                .arg(
                    Arg::new("tree")
                        .long("tree")
                        .value_parser(value_parser!(PathBuf))
                        .help("Saved board tree (JSON)"),
                )
                .group(
                    ArgGroup::new("input")
                        .args(["rows", "tree"])
                        .required(true),
                )
                .arg(
                    Arg::new("dry-run")
                        .long("dry-run")
                        .action(ArgAction::SetTrue)
                        .help("Print a summary without writing"),
                ),
        )
}

#[tokio::main]
async fn main() -> Result<()> {
    let matches = command().get_matches();
    let log_format = matches
        .get_one::<LogFormat>("log-format")
        .copied()
        .unwrap_or_default();
    init_tracing(log_format, "info");

    match matches.subcommand() {
        Some(("serve", args)) => {
            let config = match args.get_one::<PathBuf>("config") {
                Some(path) => ServerConfig::load(path)?,
                None => ServerConfig::new(),
            };
            let config = config.with_overrides(ConfigOverrides {
                tool: args.get_one::<String>("tool").cloned(),
                bind: args.get_one::<SocketAddr>("bind").copied(),
                static_root: args.get_one::<PathBuf>("root").cloned(),
                data_dir: args.get_one::<PathBuf>("data").cloned(),
            });

            let shutdown = async {
                if let Err(e) = tokio::signal::ctrl_c().await {
                    tracing::error!(error = %e, "cannot listen for ctrl-c");
                }
            };
            sat_server::serve(config, shutdown)
                .await
                .context("server failed")?;
        }
        Some(("merge", args)) => {
            let (Some(log), Some(doc)) = (
                args.get_one::<PathBuf>("log"),
                args.get_one::<PathBuf>("doc"),
            ) else {
                unreachable!("required by clap");
            };
            let (report, skipped) = cli::run_merge(log, doc).await?;
            for line in &skipped {
                eprintln!("skipped {}:{}: {}", log.display(), line.line_no, line.reason);
            }
            println!(
                "Added {} item(s) to {}",
                report.added_count(),
                doc.display()
            );
        }
        Some(("notes", args)) => {
            let Some(out) = args.get_one::<PathBuf>("out") else {
                unreachable!("required by clap");
            };
            let source = match (args.get_one::<PathBuf>("rows"), args.get_one::<PathBuf>("tree")) {
                (Some(rows), _) => RowSource::Rows(rows),
                (None, Some(tree)) => RowSource::Tree(tree),
                (None, None) => unreachable!("input group is required"),
            };

            match cli::run_notes(source, out, args.get_flag("dry-run")).await? {
                NotesOutcome::DryRun(summary) => print!("{summary}"),
                NotesOutcome::Written(updates) => {
                    let created = updates.iter().filter(|u| u.created).count();
                    let appended: usize = updates.iter().map(|u| u.appended_lines).sum();
                    println!(
                        "Wrote {} note(s) to {} ({created} new, {appended} line(s) appended)",
                        updates.len(),
                        out.display()
                    );
                }
            }
        }
        _ => unreachable!("subcommand required"),
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cli_definition_is_consistent() {
        command().debug_assert();
    }

    #[test]
    fn notes_requires_one_input() {
        let err = command()
            .try_get_matches_from(["sat-server", "notes", "--out", "vault"])
            .unwrap_err();
        assert_eq!(err.kind(), clap::error::ErrorKind::MissingRequiredArgument);

        let ok = command().try_get_matches_from([
            "sat-server", "notes", "--out", "vault", "--tree", "evidence.json", "--dry-run",
        ]);
        assert!(ok.is_ok());
    }

    #[test]
    fn log_format_is_global() {
        let matches = command()
            .try_get_matches_from(["sat-server", "serve", "--log-format", "json"])
            .unwrap();
        assert_eq!(matches.get_one::<LogFormat>("log-format"), Some(&LogFormat::Json));
    }
}
