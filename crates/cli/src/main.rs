//! Sgt. Prepper CLI - storefront client for the commerce API.
//!
//! # Usage
//!
//! ```bash
//! # Store tokens obtained from the web login
//! prepper login --access-token <token> --refresh-token <token>
//!
//! # Show and change the cart
//! prepper cart list
//! prepper cart add 42 -q 2
//! prepper cart remove 7
//! prepper cart clear
//!
//! # Look up a product
//! prepper product get --slug vandfilter-pro --category vand
//!
//! # Grant analytics consent, then record a page view
//! prepper consent set --analytics true
//! prepper track page-view /produkter --title Produkter
//! ```
//!
//! # Environment Variables
//!
//! - `SGTPREPPER_API_BASE_URL` / `SGTPREPPER_API_PORT` - Commerce API location
//! - `SGTPREPPER_STORAGE_PATH` - Session and consent storage file
//! - `GA_MEASUREMENT_ID`, `GA_API_SECRET` - Analytics
//! - `SENTRY_DSN` - Error tracking

#![cfg_attr(not(test), forbid(unsafe_code))]
#![allow(clippy::print_stdout)]

use std::process::ExitCode;

use clap::{Parser, Subcommand};
use sentry::integrations::tracing as sentry_tracing;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use sgtprepper_storefront::Storefront;
use sgtprepper_storefront::config::StorefrontConfig;

mod commands;

use commands::CliError;

#[derive(Parser)]
#[command(name = "prepper")]
#[command(author, version, about = "Sgt. Prepper storefront client")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Store session tokens
    Login {
        #[arg(long)]
        access_token: String,

        #[arg(long)]
        refresh_token: Option<String>,

        /// User profile as JSON
        #[arg(long)]
        user: Option<String>,
    },
    /// Forget the stored session
    Logout,
    /// Show the signed-in user
    Whoami,
    /// Show or change the cart
    Cart {
        #[command(subcommand)]
        action: CartAction,
    },
    /// Look up products
    Product {
        #[command(subcommand)]
        action: ProductAction,
    },
    /// List product categories
    Categories,
    /// Resolve the image URL of a product given as JSON
    Image {
        /// Product record as JSON
        json: String,
    },
    /// Show or change cookie consent
    Consent {
        #[command(subcommand)]
        action: ConsentAction,
    },
    /// Send analytics events
    Track {
        #[command(subcommand)]
        event: TrackEvent,
    },
}

#[derive(Subcommand)]
enum CartAction {
    /// Show the cart
    List,
    /// Add a product
    Add {
        /// Product id
        product: String,

        #[arg(short, long, default_value_t = 1)]
        quantity: u32,
    },
    /// Remove a cart line
    Remove {
        /// Cart line id
        item: String,
    },
    /// Remove every cart line
    Clear,
}

#[derive(Subcommand)]
enum ProductAction {
    /// Find one product by id and/or slug
    Get {
        #[arg(long)]
        id: Option<String>,

        #[arg(long)]
        slug: Option<String>,

        /// Category slug, tried as `/products/<category>/<slug>`
        #[arg(long)]
        category: Option<String>,
    },
}

#[derive(Subcommand)]
enum ConsentAction {
    /// Show the stored consent record
    Show,
    /// Update consent flags; unset flags keep their stored value
    Set {
        #[arg(long)]
        analytics: Option<bool>,

        #[arg(long)]
        marketing: Option<bool>,

        #[arg(long)]
        all: Option<bool>,
    },
}

#[derive(Subcommand)]
enum TrackEvent {
    /// Record a page view
    PageView {
        /// Path plus query string
        path: String,

        #[arg(long)]
        title: Option<String>,
    },
}

/// Initialize Sentry error tracking and return guard that must be kept alive.
fn init_sentry(config: &StorefrontConfig) -> Option<sentry::ClientInitGuard> {
    let dsn = config.sentry_dsn.as_ref()?;

    let guard = sentry::init((
        dsn.as_str(),
        sentry::ClientOptions {
            release: sentry::release_name!(),
            attach_stacktrace: true,
            ..Default::default()
        },
    ));

    Some(guard)
}

/// Filter tracing events to Sentry event types.
fn sentry_event_filter(metadata: &tracing::Metadata<'_>) -> sentry_tracing::EventFilter {
    match *metadata.level() {
        tracing::Level::ERROR | tracing::Level::WARN => sentry_tracing::EventFilter::Event,
        tracing::Level::INFO | tracing::Level::DEBUG => sentry_tracing::EventFilter::Breadcrumb,
        _ => sentry_tracing::EventFilter::Ignore,
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    // Configuration is needed for Sentry, which must be initialised before
    // the tracing subscriber
    let config = StorefrontConfig::from_env();
    let _sentry_guard = config.as_ref().ok().and_then(init_sentry);

    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "sgtprepper_storefront=info,sgtprepper_cli=info".into());

    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(sentry_tracing::layer().event_filter(sentry_event_filter))
        .init();

    let result = match config {
        Ok(config) => run(cli, config).await,
        Err(e) => Err(CliError::from(sgtprepper_storefront::StorefrontError::from(e))),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("Command failed: {e}");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli, config: StorefrontConfig) -> Result<(), CliError> {
    let storefront = Storefront::from_config(config)?;
    commands::session::identify(&storefront);

    match cli.command {
        Commands::Login {
            access_token,
            refresh_token,
            user,
        } => commands::session::login(&storefront, access_token, refresh_token, user.as_deref())?,
        Commands::Logout => commands::session::logout(&storefront)?,
        Commands::Whoami => commands::session::whoami(&storefront)?,
        Commands::Cart { action } => match action {
            CartAction::List => commands::cart::list(&storefront).await?,
            CartAction::Add { product, quantity } => {
                commands::cart::add(&storefront, &product, quantity).await?;
            }
            CartAction::Remove { item } => commands::cart::remove(&storefront, &item).await?,
            CartAction::Clear => commands::cart::clear(&storefront).await?,
        },
        Commands::Product { action } => match action {
            ProductAction::Get { id, slug, category } => {
                commands::product::get(&storefront, id, slug, category).await?;
            }
        },
        Commands::Categories => commands::product::categories(&storefront).await?,
        Commands::Image { json } => commands::product::image(&storefront, &json)?,
        Commands::Consent { action } => match action {
            ConsentAction::Show => commands::consent::show(&storefront)?,
            ConsentAction::Set {
                analytics,
                marketing,
                all,
            } => commands::consent::set(&storefront, analytics, marketing, all)?,
        },
        Commands::Track { event } => match event {
            TrackEvent::PageView { path, title } => {
                commands::consent::page_view(&storefront, &path, title).await;
            }
        },
    }
    Ok(())
}
