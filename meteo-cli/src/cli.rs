use std::sync::Arc;

use anyhow::{Context, bail};
use clap::{Parser, Subcommand};
use inquire::{Confirm, Password, PasswordDisplayMode};
use meteo_core::{
    Config, Location, ProviderId, ReqwestTransport, RetryPreset, WeatherService,
    provider::DEFAULT_REQUEST_TIMEOUT,
};
use tracing::debug;

use crate::output;

/// Top-level CLI struct.
#[derive(Debug, Parser)]
#[command(name = "meteo", version, about = "Current weather from Open-Meteo or WeatherAPI.com")]
pub struct Cli {
    /// Log requests, retries and responses to stderr.
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Configure credentials for a specific provider.
    Configure {
        /// Provider short name, e.g. "openmeteo" or "weatherapi".
        provider: String,
    },

    /// Show current weather for a location.
    Show {
        /// Place name, e.g. "London" or "Saint-Étienne, France".
        location: String,

        /// Provider to ask; defaults to the configured default provider.
        #[arg(short, long)]
        provider: Option<String>,

        /// Retry preset: default, aggressive or disabled.
        #[arg(long)]
        retry: Option<String>,

        /// Print the record as JSON instead of a summary.
        #[arg(long)]
        json: bool,
    },

    /// List supported providers and whether they are configured.
    Providers,
}

impl Cli {
    pub async fn run(self) -> anyhow::Result<()> {
        match self.command {
            Command::Configure { provider } => configure(&provider),
            Command::Show { location, provider, retry, json } => {
                show(&location, provider.as_deref(), retry.as_deref(), json).await
            }
            Command::Providers => providers(),
        }
    }
}

fn configure(provider: &str) -> anyhow::Result<()> {
    let id = ProviderId::try_from(provider)?;
    let mut config = Config::load()?;

    if id.requires_api_key() {
        let api_key = Password::new(&format!("{} API key:", id.display_name()))
            .without_confirmation()
            .with_display_mode(PasswordDisplayMode::Masked)
            .prompt()
            .context("Failed to read API key")?;

        if api_key.trim().is_empty() {
            bail!("API key must not be empty");
        }
        config.set_provider_api_key(id, api_key.trim().to_string());
    } else {
        println!("{} does not need an API key.", id.display_name());
    }

    let make_default = Confirm::new(&format!("Use {} by default?", id.display_name()))
        .with_default(true)
        .prompt()
        .context("Failed to read answer")?;
    if make_default {
        config.set_default_provider(id);
    }

    config.save()?;
    println!("Saved configuration to {}", Config::config_file_path()?.display());

    Ok(())
}

async fn show(
    location: &str,
    provider: Option<&str>,
    retry: Option<&str>,
    json: bool,
) -> anyhow::Result<()> {
    let preset = retry.map(str::parse::<RetryPreset>).transpose()?;
    let location = Location::parse(location).context("Invalid location")?;

    let mut config = Config::load()?;
    if let Some(preset) = preset {
        config.retry = preset;
    }

    let id = match provider {
        Some(p) => ProviderId::try_from(p)?,
        None => config.default_provider_id()?,
    };
    if id.requires_api_key() {
        config.require_provider_api_key(id)?;
    }

    debug!(provider = %id, retry = %config.retry, "resolved settings");

    let transport = ReqwestTransport::new()
        .with_default_timeout(config.request_timeout().unwrap_or(DEFAULT_REQUEST_TIMEOUT));
    let service = WeatherService::from_config(&config, Arc::new(transport));

    let result = tokio::select! {
        result = service.fetch_weather(&location, id) => result,
        _ = tokio::signal::ctrl_c() => bail!("Cancelled"),
    };

    let record = match result {
        Ok(record) => record,
        Err(err) => {
            if json {
                println!("{}", output::error_json(&err));
            }
            let context = format!("Failed to fetch weather from {}", id.display_name());
            return Err(anyhow::Error::new(err).context(context));
        }
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&record)?);
    } else {
        print!("{}", output::summary(&record));
    }

    Ok(())
}

fn providers() -> anyhow::Result<()> {
    let config = Config::load()?;
    let default = config.default_provider_id().ok();

    for id in ProviderId::all() {
        let configured = config.is_provider_configured(*id);
        println!("{}", output::provider_line(*id, configured, default == Some(*id)));
    }

    Ok(())
}
