//! The `hivemind` binary: validate, fix, and start.

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use tracing::{error, info};

use hivemind_core::CancellationToken;
use hivemind_service::{
    apply_fixes, config::Config, exit_codes, observability, plan_fixes, validate_vault,
    IndexerService, ValidateOptions,
};

#[derive(Parser)]
#[command(name = "hivemind", version, about = "Local-first vault indexing service")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Validate vault frontmatter against the active template.
    Validate {
        /// Vault path; defaults to the configured vault.
        path: Option<PathBuf>,
        /// Emit a JSON report instead of console output.
        #[arg(long)]
        json: bool,
        /// Do not report files without frontmatter.
        #[arg(long)]
        skip_missing: bool,
        /// Exclusion globs, repeatable.
        #[arg(long)]
        ignore: Vec<String>,
    },
    /// Suggest (and optionally apply) folder-derived types.
    Fix {
        /// Vault path; defaults to the configured vault.
        path: Option<PathBuf>,
        /// Write the suggestions; dry-run without it.
        #[arg(long)]
        apply: bool,
    },
    /// Run the indexing service until interrupted.
    Start {
        /// Vault path override.
        #[arg(long)]
        vault: Option<PathBuf>,
    },
}

fn load_config(vault_override: Option<PathBuf>) -> Result<(Config, Option<PathBuf>), ExitCode> {
    match Config::discover() {
        Ok((mut config, dir)) => {
            if let Some(vault) = vault_override {
                config.vault.path = vault;
            }
            Ok((config, Some(dir)))
        }
        Err(e) => match vault_override {
            Some(vault) => Ok((Config::for_vault(vault), None)),
            None => {
                error!("{e}");
                Err(ExitCode::from(exit_codes::CONFIG as u8))
            }
        },
    }
}

fn main() -> ExitCode {
    observability::init_tracing();
    let cli = Cli::parse();

    match cli.command {
        Command::Validate {
            path,
            json,
            skip_missing,
            ignore,
        } => {
            let (config, config_dir) = match load_config(path.clone()) {
                Ok(ok) => ok,
                Err(code) => return code,
            };
            let standalone = config_dir
                .as_deref()
                .and_then(|dir| Config::standalone_template(dir).transpose())
                .transpose();
            let standalone = match standalone {
                Ok(t) => t,
                Err(e) => {
                    error!("{e}");
                    return ExitCode::from(exit_codes::CONFIG as u8);
                }
            };
            let service = match IndexerService::bootstrap(config, standalone) {
                Ok(s) => s,
                Err(e) => {
                    error!("{e}");
                    return ExitCode::from(exit_codes::CONFIG as u8);
                }
            };
            let mapper = match service.folder_mapper() {
                Ok(m) => m,
                Err(e) => {
                    error!("{e}");
                    return ExitCode::from(exit_codes::CONFIG as u8);
                }
            };
            let root = path.unwrap_or_else(|| service_root(&service));
            let options = ValidateOptions {
                skip_missing,
                ignore,
            };
            match validate_vault(&root, service.registry(), Some(&mapper), &options) {
                Ok(report) => {
                    if json {
                        println!("{}", report.to_json());
                    } else {
                        print!("{}", report.render_console());
                    }
                    ExitCode::from(report.exit_code() as u8)
                }
                Err(e) => {
                    error!("{e}");
                    ExitCode::from(exit_codes::CONFIG as u8)
                }
            }
        }

        Command::Fix { path, apply } => {
            let (config, _) = match load_config(path.clone()) {
                Ok(ok) => ok,
                Err(code) => return code,
            };
            let service = match IndexerService::bootstrap(config, None) {
                Ok(s) => s,
                Err(e) => {
                    error!("{e}");
                    return ExitCode::from(exit_codes::CONFIG as u8);
                }
            };
            let mapper = match service.folder_mapper() {
                Ok(m) => m,
                Err(e) => {
                    error!("{e}");
                    return ExitCode::from(exit_codes::CONFIG as u8);
                }
            };
            let root = path.unwrap_or_else(|| service_root(&service));
            match plan_fixes(&root, &mapper, &[]) {
                Ok(plan) => {
                    for change in &plan.changes {
                        println!(
                            "{}: {} -> {}",
                            change.path.display(),
                            change.current_type.as_deref().unwrap_or("(none)"),
                            change.suggested_type
                        );
                    }
                    if apply {
                        match apply_fixes(&plan) {
                            Ok(count) => info!("applied {count} fix(es)"),
                            Err(e) => {
                                error!("{e}");
                                return ExitCode::from(exit_codes::VALIDATION as u8);
                            }
                        }
                    }
                    ExitCode::SUCCESS
                }
                Err(e) => {
                    error!("{e}");
                    ExitCode::from(exit_codes::CONFIG as u8)
                }
            }
        }

        Command::Start { vault } => {
            let (config, config_dir) = match load_config(vault) {
                Ok(ok) => ok,
                Err(code) => return code,
            };
            let standalone = config_dir
                .as_deref()
                .and_then(|dir| Config::standalone_template(dir).transpose())
                .transpose();
            let standalone = match standalone {
                Ok(t) => t,
                Err(e) => {
                    error!("{e}");
                    return ExitCode::from(exit_codes::CONFIG as u8);
                }
            };
            match run_service(config, standalone) {
                Ok(()) => ExitCode::SUCCESS,
                Err(e) => {
                    error!("{e}");
                    ExitCode::from(exit_codes::CONFIG as u8)
                }
            }
        }
    }
}

fn service_root(service: &IndexerService) -> PathBuf {
    // Bootstrap validated the config, so the vault path is authoritative.
    service.vault_root().to_path_buf()
}

fn run_service(
    config: Config,
    standalone: Option<hivemind_template::Template>,
) -> Result<(), hivemind_error::Error> {
    let runtime = tokio::runtime::Runtime::new().map_err(|e| {
        hivemind_error::FatalError::Config {
            message: format!("cannot start runtime: {e}"),
        }
    })?;
    runtime.block_on(async move {
        let service = Arc::new(IndexerService::bootstrap(config, standalone)?);
        let cancel = CancellationToken::new();

        let build_service = Arc::clone(&service);
        let build_cancel = cancel.clone();
        let stats = tokio::task::spawn_blocking(move || {
            build_service.initial_build(&build_cancel)
        })
        .await
        .map_err(|e| hivemind_error::Error::Internal(e.to_string()))??;
        info!(
            nodes = stats.nodes,
            edges = stats.edges,
            "initial index ready"
        );

        let run_handle = tokio::spawn(Arc::clone(&service).run(cancel.clone()));
        tokio::signal::ctrl_c()
            .await
            .map_err(|e| hivemind_error::Error::Internal(e.to_string()))?;
        info!("shutting down");
        cancel.cancel();
        let _ = run_handle.await;
        Ok(())
    })
}
