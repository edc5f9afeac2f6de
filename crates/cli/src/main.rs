//! `ledgers` CLI entry-point.
//!
//! Available sub-commands:
//! - `run`:      execute a batch file against the API.
//! - `validate`: check a batch file offline, without logging in.
//! - `options`:  print one option list (addresses, variants, accounts, payment modes).
//! - `serve`:    start the webhook receiver.

use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand, ValueEnum};
use tracing::info;
use tracing_subscriber::EnvFilter;

use client::{Credentials, ReqwestTransport};
use engine::{
    validate_items, AddressKind, DispatchConfig, Dispatcher, InputItem, OptionProvider,
    OptionSource,
};

#[derive(Parser)]
#[command(
    name = "ledgers",
    about = "Batch client and webhook receiver for the LEDGERS accounting API",
    version
)]
struct Cli {
    #[command(flatten)]
    connection: ConnectionArgs,

    #[command(subcommand)]
    command: Command,
}

/// Where to find the API and how to log in.
#[derive(Args, Debug)]
struct ConnectionArgs {
    /// JSON file holding `{apiKey, email, password, apiUrl}`.
    #[arg(long, global = true, env = "LEDGERS_CREDENTIALS")]
    credentials: Option<PathBuf>,

    #[arg(long, global = true, env = "LEDGERS_API_URL", default_value = "https://in-api.ledgers.cloud")]
    api_url: String,

    #[arg(long, global = true, env = "LEDGERS_API_KEY", hide_env_values = true)]
    api_key: Option<String>,

    #[arg(long, global = true, env = "LEDGERS_EMAIL")]
    email: Option<String>,

    #[arg(long, global = true, env = "LEDGERS_PASSWORD", hide_env_values = true)]
    password: Option<String>,

    /// Versioned path segment placed before every resource path.
    #[arg(long, global = true, default_value = "/v3")]
    api_prefix: String,
}

impl ConnectionArgs {
    /// Credentials from the file when given, otherwise from flags/env.
    fn resolve(&self) -> Result<Credentials> {
        if let Some(path) = &self.credentials {
            let content = std::fs::read_to_string(path)
                .with_context(|| format!("cannot read credentials file {}", path.display()))?;
            return serde_json::from_str(&content)
                .with_context(|| format!("invalid credentials file {}", path.display()));
        }

        let (Some(api_key), Some(email), Some(password)) =
            (&self.api_key, &self.email, &self.password)
        else {
            bail!("missing credentials: pass --credentials or --api-key, --email and --password");
        };
        Ok(Credentials::new(
            api_key.as_str(),
            email.as_str(),
            password.as_str(),
            self.api_url.as_str(),
        ))
    }
}

#[derive(Subcommand)]
enum Command {
    /// Execute a batch file (a JSON array of `{operation, params}`).
    Run {
        path: PathBuf,
        /// Record failed items as `{error}` instead of aborting the batch.
        #[arg(long)]
        continue_on_fail: bool,
    },
    /// Validate a batch file without contacting the API.
    Validate { path: PathBuf },
    /// Print one option list.
    Options {
        #[arg(value_enum)]
        list: OptionList,
        #[arg(long)]
        contact_id: Option<u64>,
        #[arg(long)]
        catalog_id: Option<u64>,
        #[arg(long, value_enum, default_value = "billing")]
        kind: KindArg,
        /// Fail instead of printing an empty list when the lookup fails.
        #[arg(long)]
        strict: bool,
    },
    /// Start the webhook receiver.
    Serve {
        #[arg(long, default_value = "0.0.0.0:8080")]
        bind: String,
        #[arg(long, env = "LEDGERS_WEBHOOK_SECRET", hide_env_values = true)]
        webhook_secret: Option<String>,
    },
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum OptionList {
    Addresses,
    Variants,
    Accounts,
    PaymentModes,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum KindArg {
    Billing,
    Shipping,
}

impl From<KindArg> for AddressKind {
    fn from(kind: KindArg) -> Self {
        match kind {
            KindArg::Billing => AddressKind::Billing,
            KindArg::Shipping => AddressKind::Shipping,
        }
    }
}

fn option_source(
    list: OptionList,
    contact_id: Option<u64>,
    catalog_id: Option<u64>,
    kind: KindArg,
) -> Result<OptionSource> {
    Ok(match list {
        OptionList::Addresses => OptionSource::ContactAddresses {
            contact_id: contact_id.context("--contact-id is required for addresses")?,
            kind: kind.into(),
        },
        OptionList::Variants => OptionSource::CatalogVariants {
            catalog_id: catalog_id.context("--catalog-id is required for variants")?,
        },
        OptionList::Accounts => OptionSource::ChartOfAccounts,
        OptionList::PaymentModes => OptionSource::PaymentModes,
    })
}

fn read_batch(path: &Path) -> Result<Vec<InputItem>> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("cannot read batch file {}", path.display()))?;
    serde_json::from_str(&content).with_context(|| format!("invalid batch file {}", path.display()))
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Command::Run {
            path,
            continue_on_fail,
        } => {
            let items = read_batch(&path)?;
            let credentials = cli.connection.resolve()?;
            info!("running {} items from {}", items.len(), path.display());

            let dispatcher = Dispatcher::new(
                ReqwestTransport::new(),
                credentials,
                DispatchConfig {
                    continue_on_fail,
                    api_prefix: cli.connection.api_prefix.clone(),
                },
            );
            let outputs = dispatcher.run(items).await?;
            println!("{}", serde_json::to_string_pretty(&outputs)?);
        }
        Command::Validate { path } => {
            let items = read_batch(&path)?;
            let report = validate_items(&items);
            let mut failed = 0;
            for outcome in &report {
                match &outcome.result {
                    Ok(()) => println!("✅ item {} ({}) is valid", outcome.index, outcome.operation),
                    Err(e) => {
                        failed += 1;
                        println!("❌ item {} ({}): {e}", outcome.index, outcome.operation);
                    }
                }
            }
            if failed > 0 {
                eprintln!("{failed} of {} items failed validation", report.len());
                std::process::exit(1);
            }
        }
        Command::Options {
            list,
            contact_id,
            catalog_id,
            kind,
            strict,
        } => {
            let source = option_source(list, contact_id, catalog_id, kind)?;
            let provider = OptionProvider::new(ReqwestTransport::new(), cli.connection.resolve()?)
                .api_prefix(cli.connection.api_prefix.clone())
                .propagate_errors(strict);
            let options = provider.load(source).await?;
            println!("{}", serde_json::to_string_pretty(&options)?);
        }
        Command::Serve {
            bind,
            webhook_secret,
        } => {
            let (state, mut events) = api::AppState::new(webhook_secret, 256);
            tokio::spawn(async move {
                while let Some(event) = events.recv().await {
                    match serde_json::to_string(&event) {
                        Ok(line) => println!("{line}"),
                        Err(e) => tracing::error!("cannot serialise event {}: {e}", event.id),
                    }
                }
            });
            info!("Starting webhook receiver on {bind}");
            api::serve(&bind, state).await?;
        }
    }

    Ok(())
}
