use std::sync::Arc;

use anyhow::{Context as _, Result};
use async_trait::async_trait;
use clap::{Parser, Subcommand};
use dialoguer::{Confirm, Password};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use celebstalks_admin_frontend::{
    api::{DataClient, KeyOutcome, RemoveOptions, RemoveOutcome, ResourceKey},
    config::{ApiTarget, Config},
    notify::{ConfirmPrompt, Confirmation, Notifier, Toast},
    utils::storage::FileStorage,
};

/// Terminal driver for the Celebstalks admin API
#[derive(Parser)]
#[command(name = "celebstalks-admin")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Send requests through the local development proxy
    #[arg(long, global = true)]
    dev: bool,

    /// Explicit API base URL, overrides the target
    #[arg(long, global = true)]
    base_url: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Sign in and store the admin session
    Login {
        #[arg(long)]
        email: String,
        /// Prompted for when omitted
        #[arg(long)]
        password: Option<String>,
    },

    /// Drop the stored session
    Logout,

    /// Show the stored admin profile
    Whoami,

    /// Refresh resources (all of them when none are named)
    Refresh { keys: Vec<String> },

    /// Refresh one resource and print its records as JSON
    List { key: ResourceKey },

    /// Delete one record
    Delete {
        key: ResourceKey,
        id: String,
        /// Skip the confirmation prompt
        #[arg(short, long)]
        yes: bool,
    },
}

/// Prints toasts to stderr and asks confirmations on the terminal.
struct TerminalNotifier;

#[async_trait]
impl Notifier for TerminalNotifier {
    fn notify(&self, toast: Toast) {
        eprintln!("{} {}", toast.title, toast.text);
    }

    async fn confirm(&self, prompt: ConfirmPrompt) -> Confirmation {
        let question = format!("{} {}", prompt.title, prompt.text);
        let default = !prompt.destructive;
        let answer = tokio::task::spawn_blocking(move || {
            Confirm::new()
                .with_prompt(question)
                .default(default)
                .interact()
        })
        .await;

        match answer {
            Ok(Ok(confirmed)) => confirmed.into(),
            Ok(Err(err)) => {
                tracing::warn!(error = %err, "confirmation prompt failed");
                Confirmation::Declined
            }
            Err(err) => {
                tracing::warn!(error = %err, "confirmation prompt task failed");
                Confirmation::Declined
            }
        }
    }
}

fn print_outcome(key: ResourceKey, outcome: &KeyOutcome) {
    match outcome {
        KeyOutcome::Fetched { records } => println!("{key}: {} records", records.len()),
        KeyOutcome::Joined { records } => println!("{key}: {} records (shared)", records.len()),
        KeyOutcome::NoData => println!("{key}: no data"),
        KeyOutcome::Skipped => println!("{key}: recently refreshed"),
        KeyOutcome::Failed { error } => println!("{key}: failed: {error}"),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "celebstalks_admin_frontend=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();

    let mut config = Config::load()?;
    if cli.dev {
        config.api_target = ApiTarget::DevProxy;
    }
    if let Some(base_url) = cli.base_url {
        config.api_base_url = Some(base_url);
    }
    tracing::debug!(base_url = config.base_url(), "using API");

    let storage = FileStorage::open(&config.session_file).with_context(|| {
        format!(
            "Failed to open session file {}",
            config.session_file.display()
        )
    })?;
    tracing::debug!(session_file = %storage.path().display(), "session storage opened");
    let client = DataClient::new(&config, Arc::new(storage), Arc::new(TerminalNotifier))?;

    match cli.command {
        Commands::Login { email, password } => {
            let password = match password {
                Some(password) => password,
                None => Password::new().with_prompt("Password").interact()?,
            };
            client.login(&email, &password).await?;
            println!("Logged in as {}", email.trim());
        }
        Commands::Logout => {
            client.logout()?;
            println!("Logged out");
        }
        Commands::Whoami => {
            if !client.is_authenticated()? {
                println!("Not logged in");
            } else {
                match client.admin_profile()? {
                    Some(profile) => println!("{}", serde_json::to_string_pretty(&profile)?),
                    None => println!("Logged in (no profile stored)"),
                }
            }
        }
        Commands::Refresh { keys } => {
            let names: Vec<&str> = keys.iter().map(String::as_str).collect();
            let selection = if names.is_empty() {
                None
            } else {
                Some(names.as_slice())
            };
            let report = client.bulk_read(selection).await;
            if report.is_empty() {
                println!("Nothing to refresh");
            }
            for (key, outcome) in &report.outcomes {
                print_outcome(*key, outcome);
            }
        }
        Commands::List { key } => {
            let report = client.bulk_read_keys(&[key]).await;
            if let Some(KeyOutcome::Failed { error }) = report.get(key) {
                anyhow::bail!("Failed to load {}: {}", key, error);
            }
            let records = client.store().get(key);
            println!("{}", serde_json::to_string_pretty(records.as_ref())?);
        }
        Commands::Delete { key, id, yes } => {
            let options = if yes {
                RemoveOptions::skip_confirm()
            } else {
                RemoveOptions::default()
            };
            match client.delete(key, &id, options).await? {
                RemoveOutcome::Deleted => {}
                RemoveOutcome::Cancelled => println!("Cancelled"),
            }
        }
    }

    Ok(())
}
