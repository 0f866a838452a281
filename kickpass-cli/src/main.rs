//! `kickpass` command line.

mod prompt;
mod terminal;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use clap::{Args, Parser, Subcommand};
use eyre::{Result, WrapErr};
use kickpass_core::{Context, ContextConfig, Safe};
use tracing_subscriber::EnvFilter;

use crate::prompt::TerminalPrompt;

#[derive(Parser)]
#[command(name = "kickpass", version, about = "KickPass password safes")]
struct Cli {
    /// Workspace holding the safes (default: ~/.kickpass).
    #[arg(long, env = "KICKPASS_WORKSPACE", global = true)]
    workspace: Option<PathBuf>,

    /// Master password to use instead of prompting.
    #[arg(long, env = "KICKPASS_MASTER_PASSWORD", hide_env_values = true, global = true)]
    master_password: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Initialize the workspace.
    Init {
        /// Workspace root to create instead of the configured one.
        path: Option<PathBuf>,
    },
    /// Create a new safe.
    Create {
        name: String,
        /// Replace an existing safe.
        #[arg(long)]
        force: bool,
        #[command(flatten)]
        fields: Fields,
    },
    /// Print the password of a safe.
    Cat {
        name: String,
        /// Print the metadata too.
        #[arg(long)]
        metadata: bool,
    },
    /// Change the password or metadata of a safe.
    Edit {
        name: String,
        #[command(flatten)]
        fields: Fields,
    },
    /// Rename a safe.
    Rename { old: String, new: String },
    /// Delete a safe.
    Delete { name: String },
    /// Print the version.
    Version,
}

#[derive(Args)]
struct Fields {
    /// Password stored in the safe.
    #[arg(long)]
    password: Option<String>,
    /// Metadata stored in the safe.
    #[arg(long)]
    metadata: Option<String>,
}

impl Fields {
    fn apply(self, safe: &Safe) -> Result<()> {
        if let Some(password) = self.password {
            safe.set_password(password)?;
        }
        if let Some(metadata) = self.metadata {
            safe.set_metadata(metadata)?;
        }
        Ok(())
    }
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    if matches!(cli.command, Command::Version) {
        println!("{}", kickpass_core::version());
        return Ok(());
    }

    let context = open_context(cli.workspace.as_deref())?;
    context.configure(Arc::new(TerminalPrompt::stdio(cli.master_password)))?;
    let result = run(&context, cli.command);
    context.destroy()?;
    result
}

fn open_context(workspace: Option<&Path>) -> Result<Arc<Context>> {
    let config = ContextConfig {
        workspace: workspace.map(|path| expand_home(path).display().to_string()),
        ..ContextConfig::default()
    };
    Ok(Context::with_config(config)?)
}

/// Expands a leading `~` the shell left alone, as in `--workspace=~/safes`.
fn expand_home(path: &Path) -> PathBuf {
    match (path.strip_prefix("~"), dirs::home_dir()) {
        (Ok(rest), Some(home)) => home.join(rest),
        _ => path.to_path_buf(),
    }
}

fn run(context: &Arc<Context>, command: Command) -> Result<()> {
    match command {
        Command::Init { path } => {
            let path = path.map(|path| expand_home(&path).display().to_string());
            context.init_workspace(path.unwrap_or_default())?;
            let workspace = context.workspace_path()?;
            tracing::info!(%workspace, "workspace ready");
        }
        Command::Create {
            name,
            force,
            fields,
        } => {
            let safe = Safe::new(Arc::clone(context), name.clone())?;
            safe.open(true, force)
                .wrap_err_with(|| format!("cannot create safe {name}"))?;
            fields.apply(&safe)?;
            safe.save()?;
            safe.close()?;
            tracing::info!(safe = %name, "safe created");
        }
        Command::Cat { name, metadata } => {
            let safe = open_existing(context, &name)?;
            if let Some(password) = safe.password()? {
                println!("{password}");
            }
            if metadata {
                if let Some(metadata) = safe.metadata()? {
                    println!("{metadata}");
                }
            }
            safe.close()?;
        }
        Command::Edit { name, fields } => {
            let safe = open_existing(context, &name)?;
            fields.apply(&safe)?;
            safe.save()?;
            safe.close()?;
        }
        Command::Rename { old, new } => {
            let safe = Safe::new(Arc::clone(context), old.clone())?;
            safe.rename(new.clone())
                .wrap_err_with(|| format!("cannot rename safe {old} to {new}"))?;
        }
        Command::Delete { name } => {
            let safe = Safe::new(Arc::clone(context), name.clone())?;
            safe.delete()
                .wrap_err_with(|| format!("cannot delete safe {name}"))?;
            tracing::info!(safe = %name, "safe deleted");
        }
        Command::Version => println!("{}", kickpass_core::version()),
    }
    Ok(())
}

fn open_existing(context: &Arc<Context>, name: &str) -> Result<Arc<Safe>> {
    let safe = Safe::new(Arc::clone(context), name.to_string())?;
    safe.open(false, false)
        .wrap_err_with(|| format!("cannot open safe {name}"))?;
    Ok(safe)
}
