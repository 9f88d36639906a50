//! HTTP surface of the dashboard backend.
//!
//! Handlers share one [`AppState`] through `web::Data`; nothing lives in
//! globals, so tests build the same app with [`configure`] and their own
//! state.

pub mod handlers;
pub mod scheduler;

use actix_web::{middleware::Logger, web, App, HttpServer};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

use crate::config::{Config, DefaultNewsMode};
use crate::error::Result;
use crate::market::MarketClient;
use crate::news::{NewsAggregator, NewsService};
use crate::storage::open_store;

pub use scheduler::spawn_refresh_loop;

pub struct AppState {
    pub news: NewsService,
    pub default_news_mode: DefaultNewsMode,
    pub crypto_symbols: Vec<String>,
    pub actives_limit: usize,
    pub search_limit: usize,
    pub history_days: usize,
}

impl AppState {
    pub fn new(news: NewsService, config: &Config) -> Self {
        Self {
            news,
            default_news_mode: config.server.news_mode,
            crypto_symbols: config.market.crypto_symbols.clone(),
            actives_limit: config.market.actives_limit,
            search_limit: config.market.search_limit,
            history_days: config.market.history_days,
        }
    }

    /// Wire store, aggregator and market client from configuration.
    pub fn from_config(config: &Config) -> Result<Self> {
        let store = open_store(&config.cache, config.settings.timeout())?;
        let aggregator = Arc::new(NewsAggregator::from_config(config, store)?);
        let market = MarketClient::from_config(&config.market, config.settings.timeout())?;
        let news = NewsService::new(market, aggregator, &config.market);
        Ok(Self::new(news, config))
    }
}

/// Register every route. Shared by [`run`] and the integration tests.
///
/// The list routes go before `history` so `/api/stocks/all` is not read as
/// a symbol.
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(handlers::health)
        .service(handlers::scrape)
        .service(handlers::list_news)
        .service(handlers::stock_news)
        .service(handlers::crypto_news)
        .service(handlers::stocks)
        .service(handlers::crypto)
        .service(handlers::quote)
        .service(handlers::history)
        .service(handlers::search)
        .service(handlers::debug_key);
}

/// Serve until interrupted, refreshing the news cache in the background.
pub async fn run(config: Config) -> Result<()> {
    let state = web::Data::new(AppState::from_config(&config)?);

    if !state.news.market().has_key() {
        warn!("FMP_API_KEY is not set; market endpoints will answer 500");
    }

    let refresh = spawn_refresh_loop(
        state.news.aggregator_handle(),
        Duration::from_secs(config.settings.refresh_interval),
        config.server.refresh_on_start,
    );

    let addr = (config.server.bind.clone(), config.server.port);
    info!("Listening on http://{}:{}", addr.0, addr.1);

    let app_state = state.clone();
    let result = HttpServer::new(move || {
        App::new()
            .app_data(app_state.clone())
            .wrap(Logger::default())
            .configure(configure)
    })
    .bind(addr)?
    .run()
    .await;

    refresh.abort();
    info!("Server stopped");
    result.map_err(Into::into)
}
