pub mod checkout;
pub mod config;
pub mod events;
pub mod flow;
pub mod gateway;
pub mod http;
pub mod models;
pub mod registration;
mod utils;
pub mod verification;

use std::process::ExitCode;
use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand};

use checkout::ConsoleCheckout;
use config::{AppConfig, ConfigStore};
use flow::{EventCheckout, FlowOutcome};
use models::{ApplicantForm, Country, EventRecord};

#[derive(Parser)]
#[command(name = "event-checkout")]
#[command(about = "Register for institute events and complete payment")]
struct Cli {
    /// Overrides the configured API base URL for this run.
    #[arg(long, global = true)]
    api_base_url: Option<String>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Resolve an event by slug and print it.
    Show {
        slug: String,
        #[arg(long, default_value_t = false)]
        json: bool,
    },
    /// Register for an event and pay if the event is not free.
    Register {
        slug: String,
        #[arg(long)]
        name: String,
        #[arg(long)]
        email: String,
        #[arg(long)]
        mobile: String,
        #[arg(long, default_value = "")]
        organisation: String,
        #[arg(long, default_value = "IND")]
        country: Country,
        #[arg(long, default_value = "")]
        address: String,
    },
    Config {
        #[command(subcommand)]
        command: ConfigCommand,
    },
}

#[derive(Subcommand)]
enum ConfigCommand {
    Show,
    Set { key: String, value: String },
}

fn effective_config(store: &ConfigStore, api_base_url: Option<String>) -> AppConfig {
    let mut config = store.read().with_env_overrides();
    if let Some(url) = api_base_url {
        config.api_base_url = url;
    }
    config
}

fn print_event(event: &EventRecord) {
    println!("{}", event.title);
    println!("  id:       {}", event.id);
    println!("  date:     {}", event.date);
    println!("  location: {}", event.location);
    println!("  price:    {}", event.price);
    if !event.image.is_empty() {
        println!("  image:    {}", event.image);
    }
}

async fn execute(cli: Cli) -> anyhow::Result<ExitCode> {
    let store = ConfigStore::load();
    let config = effective_config(&store, cli.api_base_url);

    match cli.command {
        Commands::Show { slug, json } => {
            let mut checkout = EventCheckout::new(config, Arc::new(ConsoleCheckout));
            let Some(event) = checkout.load(&slug).await.cloned() else {
                eprintln!(
                    "Event not found. Browse all events at {}",
                    checkout.not_found_path()
                );
                return Ok(ExitCode::FAILURE);
            };
            if json {
                println!(
                    "{}",
                    serde_json::to_string_pretty(&event).context("serialize event")?
                );
            } else {
                print_event(&event);
            }
            Ok(ExitCode::SUCCESS)
        }
        Commands::Register {
            slug,
            name,
            email,
            mobile,
            organisation,
            country,
            address,
        } => {
            let site_base = config.site_base_url.clone();
            let mut checkout = EventCheckout::new(config, Arc::new(ConsoleCheckout));
            match checkout.load(&slug).await.cloned() {
                Some(event) => print_event(&event),
                None => {
                    eprintln!(
                        "Event not found. Browse all events at {}",
                        checkout.not_found_path()
                    );
                    return Ok(ExitCode::FAILURE);
                }
            }

            let form = ApplicantForm {
                name,
                organisation,
                email,
                mobile,
                country,
                address,
            };
            match checkout.submit(form).await {
                Ok(outcome) => {
                    let confirmation = outcome.confirmation();
                    match &outcome {
                        FlowOutcome::FreeRegistration(_) => {
                            println!("Registered under a free package.")
                        }
                        FlowOutcome::PaidRegistration(_) => {
                            println!("Payment verified. Registration confirmed.")
                        }
                    }
                    let target = match site_base.as_deref() {
                        Some(base) => confirmation.absolute_url(base),
                        None => confirmation.path(),
                    };
                    println!("{target}");
                    Ok(ExitCode::SUCCESS)
                }
                Err(err) => {
                    eprintln!("{}", err.user_message());
                    Ok(ExitCode::FAILURE)
                }
            }
        }
        Commands::Config { command } => {
            let shown = match command {
                ConfigCommand::Show => store.read(),
                ConfigCommand::Set { key, value } => store
                    .update(|config| config.set(&key, &value))
                    .with_context(|| format!("update config key {key}"))?,
            };
            println!(
                "{}",
                serde_json::to_string_pretty(&shown).context("serialize config")?
            );
            Ok(ExitCode::SUCCESS)
        }
    }
}

pub fn run() -> ExitCode {
    dotenvy::dotenv().ok();
    env_logger::init_from_env(env_logger::Env::default().default_filter_or("info"));

    let cli = Cli::parse();
    let runtime = match tokio::runtime::Runtime::new() {
        Ok(runtime) => runtime,
        Err(err) => {
            log::error!("failed to start async runtime: {err}");
            return ExitCode::FAILURE;
        }
    };
    match runtime.block_on(execute(cli)) {
        Ok(code) => code,
        Err(err) => {
            log::error!("{err:#}");
            ExitCode::FAILURE
        }
    }
}
