use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use chrono::FixedOffset;
use clap::Parser;
use color_eyre::eyre::{eyre, WrapErr};
use sambung_ayat::content::{AlQuranClient, CachedContent, ContentProvider, StaticCorpus, VerseCache};
use sambung_ayat::{db::Db, router, AppState};
use tracing_subscriber::EnvFilter;

const MAX_UTC_OFFSET_MINUTES: i32 = 14 * 60;

#[derive(Parser, Debug)]
#[command(version, about)]
struct Args {
    /// SQLite database URL, created if missing.
    #[arg(long, env, default_value = "sqlite://sambung-ayat.db")]
    database_url: String,

    /// The address to bind to.
    #[arg(short, long, env, default_value = "127.0.0.1:1414")]
    address: String,

    /// Base URL of the verse content API.
    #[arg(long, env, default_value = "https://api.alquran.cloud/v1")]
    content_api_url: String,

    /// Serve verses from this JSON file instead of the content API.
    #[arg(long, env)]
    corpus_file: Option<PathBuf>,

    /// Per-attempt timeout for content API calls, in milliseconds.
    #[arg(long, env, default_value_t = 5000)]
    content_timeout_ms: u64,

    /// Verse cache TTL in seconds; 0 keeps entries forever.
    #[arg(long, env, default_value_t = 0)]
    cache_ttl_secs: u64,

    #[arg(long, env, default_value_t = false)]
    secure_cookies: bool,

    /// Secret the identity provider sends on the sign-in callback.
    #[arg(long, env)]
    identity_callback_secret: String,

    /// UTC offset that defines a calendar day for daily streaks.
    #[arg(long, env, default_value_t = 0, allow_hyphen_values = true)]
    streak_utc_offset_minutes: i32,
}

#[tokio::main]
async fn main() -> color_eyre::Result<()> {
    color_eyre::install()?;

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,sambung_ayat=debug,tower_http=info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_span_events(tracing_subscriber::fmt::format::FmtSpan::CLOSE)
        .init();

    let args = Args::parse();

    let address = args
        .address
        .parse::<std::net::SocketAddr>()
        .wrap_err_with(|| format!("invalid address {}", args.address))?;
    let day_offset = Some(args.streak_utc_offset_minutes)
        .filter(|m| m.abs() <= MAX_UTC_OFFSET_MINUTES)
        .and_then(|m| FixedOffset::east_opt(m * 60))
        .ok_or_else(|| {
            eyre!(
                "streak offset {} minutes is outside ±14h",
                args.streak_utc_offset_minutes
            )
        })?;
    if args.identity_callback_secret.is_empty() {
        return Err(eyre!("IDENTITY_CALLBACK_SECRET must not be empty"));
    }

    let content: Arc<dyn ContentProvider> = match &args.corpus_file {
        // Already in memory, nothing to cache
        Some(path) => Arc::new(StaticCorpus::from_path(path)?),
        None => {
            let ttl = (args.cache_ttl_secs > 0).then(|| Duration::from_secs(args.cache_ttl_secs));
            let client = AlQuranClient::new(
                args.content_api_url.clone(),
                Duration::from_millis(args.content_timeout_ms),
            )?;
            tracing::info!(url = %args.content_api_url, "using remote verse content");
            Arc::new(CachedContent::new(client, VerseCache::new(ttl)))
        }
    };

    let db = Db::new(args.database_url).await?;
    let state = AppState::new(
        db,
        content,
        day_offset,
        args.secure_cookies,
        args.identity_callback_secret,
    );

    let listener = tokio::net::TcpListener::bind(address).await?;
    tracing::info!(%address, version = sambung_ayat::names::VERSION, "listening");
    axum::serve(listener, router(state)).await?;

    Ok(())
}
