use std::sync::Arc;

use anyhow::{Context, bail};
use clap::{Parser, Subcommand};
use inquire::{InquireError, Text};
use skycast_core::{
    Config, FileStorage, LocationResolver, ProxyProvider, ResolveError, Settings, Theme,
    WeatherState, WeatherStore,
    assistant::{self, Conversation, REPLY_DELAY},
    geolocation::source_from_config,
    news::NewsClient,
    provider::provider_from_config,
};
use tokio::sync::watch;
use tracing::debug;

use crate::render;

/// Top-level CLI struct.
#[derive(Debug, Parser)]
#[command(name = "skycast", version, about = "Weather dashboard for the terminal")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Show current conditions and the hourly forecast.
    ///
    /// With no place or coordinates the device position is tried first,
    /// then the saved place, then the configured default.
    Show {
        /// Place name, e.g. "Tokyo".
        place: Option<String>,

        #[arg(long, requires = "lon", conflicts_with = "place", allow_hyphen_values = true)]
        lat: Option<f64>,

        #[arg(long, requires = "lat", conflicts_with = "place", allow_hyphen_values = true)]
        lon: Option<f64>,
    },

    /// Follow the device position and redraw on every update. Ctrl-C stops.
    Track {
        /// Stop after this many settled updates.
        #[arg(long)]
        updates: Option<usize>,
    },

    /// Ask the weather assistant. Without a question an interactive chat opens.
    Ask { question: Option<String> },

    /// Show, toggle or set the colour theme.
    Theme {
        #[command(subcommand)]
        action: Option<ThemeAction>,
    },

    /// Top headlines from the proxy.
    News {
        /// News category; defaults to technology.
        category: Option<String>,
    },

    /// Configure the proxy URL and the default place.
    ///
    /// Prompts interactively when no flag is given.
    Configure {
        #[arg(long)]
        api_url: Option<String>,

        #[arg(long)]
        default_place: Option<String>,
    },

    /// Forget the saved place.
    Clear,
}

#[derive(Debug, Subcommand)]
pub enum ThemeAction {
    Toggle,
    Set { theme: String },
}

/// Where `show` and `ask` get their location from.
enum Target {
    Device,
    Place(String),
    Coordinates(f64, f64),
}

impl Cli {
    pub async fn run(self) -> anyhow::Result<()> {
        let config = Config::load()?;

        match self.command {
            Command::Configure { api_url, default_place } => configure(config, api_url, default_place),
            Command::Theme { action } => theme(action),
            Command::Clear => {
                let resolver = build_resolver(&config)?;
                resolver.forget_location()?;
                println!("Saved place cleared.");
                Ok(())
            }
            Command::News { category } => {
                let client = NewsClient::new(ProxyProvider::new(config.api_url.clone())?);
                let articles = client
                    .top_headlines(category.as_deref())
                    .await
                    .map_err(|err| anyhow::anyhow!(err.user_message()))?;
                print!("{}", render::articles(&articles));
                Ok(())
            }
            Command::Show { place, lat, lon } => {
                let target = match (place, lat.zip(lon)) {
                    (Some(place), _) => Target::Place(place),
                    (None, Some((lat, lon))) => Target::Coordinates(lat, lon),
                    (None, None) => Target::Device,
                };
                show(&config, target).await
            }
            Command::Track { updates } => track(&config, updates).await,
            Command::Ask { question } => ask(&config, question).await,
        }
    }
}

fn open_storage() -> anyhow::Result<Arc<FileStorage>> {
    let path = Config::storage_file_path()?;
    let storage = FileStorage::open(&path)
        .with_context(|| format!("Failed to open storage file: {}", path.display()))?;
    Ok(Arc::new(storage))
}

fn build_resolver(config: &Config) -> anyhow::Result<LocationResolver> {
    let store = WeatherStore::new(provider_from_config(config)?);
    Ok(LocationResolver::new(
        store,
        source_from_config(config),
        open_storage()?,
        config.resolver_options(),
    ))
}

/// Resolve `target` once and return the settled store state.
async fn resolve_once(resolver: &LocationResolver, target: Target) -> anyhow::Result<WeatherState> {
    let outcome = match target {
        Target::Place(place) => resolver.search_location(&place).await.map(|_| ()),
        Target::Coordinates(lat, lon) => resolver.resolve_by_coordinates(lat, lon).await.map(|_| ()),
        Target::Device => {
            resolver.start_location_tracking().await;
            Ok(())
        }
    };

    if let Err(err @ ResolveError::EmptyQuery) = outcome {
        return Err(err.into());
    }

    let state = resolver.store().wait_until_settled().await;
    resolver.teardown();
    Ok(state)
}

async fn show(config: &Config, target: Target) -> anyhow::Result<()> {
    let resolver = build_resolver(config)?;
    let state = resolve_once(&resolver, target).await?;

    if state.snapshot.is_none() {
        let message = state.status.error_message().unwrap_or("No weather data");
        bail!(message.to_string());
    }

    print!("{}", render::dashboard(&state));
    Ok(())
}

async fn track(config: &Config, updates: Option<usize>) -> anyhow::Result<()> {
    let resolver = build_resolver(config)?;
    let mut rx: watch::Receiver<WeatherState> = resolver.store().subscribe();

    resolver.start_location_tracking().await;

    let mut seen = 0usize;
    loop {
        let state = (*rx.borrow_and_update()).clone();
        if !state.status.is_loading() && (state.snapshot.is_some() || state.status.error_message().is_some()) {
            println!("{}", render::dashboard(&state));
            seen += 1;
            if updates.is_some_and(|limit| seen >= limit) {
                break;
            }
        }

        tokio::select! {
            changed = rx.changed() => {
                if changed.is_err() {
                    break;
                }
            }
            _ = tokio::signal::ctrl_c() => {
                debug!("interrupted");
                break;
            }
        }
    }

    resolver.teardown();
    Ok(())
}

async fn ask(config: &Config, question: Option<String>) -> anyhow::Result<()> {
    let resolver = build_resolver(config)?;
    let state = resolve_once(&resolver, Target::Device).await?;
    let snapshot = state.snapshot.as_deref();

    if let Some(question) = question {
        println!("{}", assistant::respond(&question, snapshot));
        return Ok(());
    }

    let mut conversation = Conversation::new(snapshot);
    if let Some(greeting) = conversation.messages().first() {
        println!("Assistant: {}", greeting.text);
    }

    loop {
        let input = match Text::new("You:").prompt() {
            Ok(input) => input,
            Err(InquireError::OperationCanceled | InquireError::OperationInterrupted) => break,
            Err(err) => return Err(err.into()),
        };

        let trimmed = input.trim();
        if matches!(trimmed, "exit" | "quit") {
            break;
        }

        let Some(reply) = conversation.send(trimmed, snapshot) else {
            continue;
        };
        let reply = reply.text.clone();

        println!("Assistant is typing...");
        tokio::time::sleep(REPLY_DELAY).await;
        println!("Assistant: {reply}");
    }

    Ok(())
}

fn theme(action: Option<ThemeAction>) -> anyhow::Result<()> {
    let mut settings = Settings::load(open_storage()?);

    let current = match action {
        None => settings.theme(),
        Some(ThemeAction::Toggle) => settings.toggle_theme()?,
        Some(ThemeAction::Set { theme }) => {
            let theme: Theme = theme.parse()?;
            settings.set_theme(theme)?;
            theme
        }
    };

    println!("Theme: {current}");
    Ok(())
}

fn configure(
    mut config: Config,
    api_url: Option<String>,
    default_place: Option<String>,
) -> anyhow::Result<()> {
    let interactive = api_url.is_none() && default_place.is_none();

    let (api_url, default_place) = if interactive {
        let url = Text::new("Proxy base URL:").with_default(&config.api_url).prompt()?;
        let place = Text::new("Default place:").with_default(&config.default_place).prompt()?;
        (Some(url), Some(place))
    } else {
        (api_url, default_place)
    };

    if let Some(url) = api_url {
        config.set_api_url(url.trim())?;
    }
    if let Some(place) = default_place {
        config.set_default_place(place.trim())?;
    }

    config.save()?;
    println!("Configuration saved to {}", Config::config_file_path()?.display());
    Ok(())
}
