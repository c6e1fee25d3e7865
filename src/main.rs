use std::sync::Arc;

use tower_http::{services::ServeDir, trace::TraceLayer};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use headline_keeper::config::Config;
use headline_keeper::db::Database;
use headline_keeper::extractor::Extractor;
use headline_keeper::fetcher::HttpFetcher;
use headline_keeper::routes::{self, AppState};
use headline_keeper::scrape::Scraper;
use headline_keeper::store::ArticleStore;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "headline_keeper=info,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration
    let config = Config::load("scraper.toml")?;
    info!("Scraping source: {}", config.source_url);

    // Initialize database
    let database_url = std::env::var("DATABASE_URL")
        .unwrap_or_else(|_| "sqlite:headline_keeper.db?mode=rwc".to_string());
    let db = Database::new(&database_url).await?;
    db.initialize().await?;
    db.prune_dangling_note_refs().await?;
    info!("Database initialized");

    let db = Arc::new(db);

    let fetcher = Arc::new(HttpFetcher::new(&config.fetch)?);
    let extractor = Extractor::new(&config.selectors)?;
    let scraper = Scraper::new(&config.source_url, fetcher, extractor, db.clone())?;

    let state = Arc::new(AppState {
        store: db,
        scraper: Arc::new(scraper),
    });

    let app = routes::router(state)
        .nest_service("/static", ServeDir::new("static"))
        .layer(TraceLayer::new_for_http());

    // Start server
    let addr = config.bind_addr(std::env::var("PORT").ok().as_deref());
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!("Server starting on http://{}", addr);

    axum::serve(listener, app).await?;

    Ok(())
}
