use actix_web::{get, routes, web, HttpResponse, Responder};
use serde::{Deserialize, Serialize};
use tracing::{error, info};

use crate::config::DefaultNewsMode;
use crate::error::{Error, Result};
use crate::news::{NewsMode, NewsQuery, RefreshStatus};
use crate::server::AppState;

#[derive(Debug, Deserialize)]
pub struct NewsParams {
    pub search: Option<String>,
    pub limit: Option<usize>,
}

#[derive(Debug, Deserialize)]
pub struct ListParams {
    pub search: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct SearchParams {
    pub query: Option<String>,
}

#[derive(Debug, Serialize)]
struct ScrapeResponse {
    status: RefreshStatus,
    articles_scraped: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    message: Option<String>,
}

#[derive(Debug, Serialize)]
struct KeyCheckResponse {
    status: &'static str,
    message: String,
    #[serde(rename = "apiResponse", skip_serializing_if = "Option::is_none")]
    api_response: Option<String>,
}

/// Malformed upstream payloads read as "nothing to show".
fn empty_on_malformed<T>(result: Result<Vec<T>>) -> Result<Vec<T>> {
    match result {
        Err(Error::MalformedUpstreamPayload(msg)) => {
            tracing::warn!("Treating malformed upstream payload as empty: {}", msg);
            Ok(Vec::new())
        }
        other => other,
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

#[get("/health")]
pub async fn health() -> impl Responder {
    HttpResponse::Ok().json(serde_json::json!({ "status": "ok" }))
}

#[get("/api/news")]
pub async fn list_news(
    state: web::Data<AppState>,
    params: web::Query<NewsParams>,
) -> Result<HttpResponse> {
    let params = params.into_inner();
    let mode = match non_empty(params.search) {
        Some(q) => NewsMode::Search(q),
        None => match state.default_news_mode {
            DefaultNewsMode::Cached => NewsMode::Cached,
            DefaultNewsMode::GeneralFeed => NewsMode::GeneralFeed,
        },
    };

    let mut query = NewsQuery::new(mode);
    if let Some(limit) = params.limit {
        query = query.with_limit(limit);
    }

    let articles = state.news.list(query).await.map_err(|e| {
        error!("News API error: {}", e);
        e
    })?;
    Ok(HttpResponse::Ok().json(articles))
}

#[get("/api/news/scrape")]
pub async fn scrape(state: web::Data<AppState>) -> impl Responder {
    info!("Scrape triggered over HTTP");
    match state.news.aggregator().refresh().await {
        Ok(report) => HttpResponse::Ok().json(ScrapeResponse {
            status: report.status,
            articles_scraped: report.articles_scraped,
            message: None,
        }),
        Err(e) => {
            error!("Scrape job failed: {}", e);
            HttpResponse::InternalServerError().json(ScrapeResponse {
                status: RefreshStatus::Error,
                articles_scraped: 0,
                message: Some(e.to_string()),
            })
        }
    }
}

#[get("/api/stocks/{symbol}/news")]
pub async fn stock_news(
    state: web::Data<AppState>,
    symbol: web::Path<String>,
) -> Result<HttpResponse> {
    let query = NewsQuery::new(NewsMode::TickerNews(symbol.into_inner()));
    Ok(HttpResponse::Ok().json(state.news.list(query).await?))
}

#[get("/api/crypto/{symbol}/news")]
pub async fn crypto_news(
    state: web::Data<AppState>,
    symbol: web::Path<String>,
) -> Result<HttpResponse> {
    let query = NewsQuery::new(NewsMode::TickerNews(symbol.into_inner()));
    Ok(HttpResponse::Ok().json(state.news.list(query).await?))
}

#[routes]
#[get("/api/stocks")]
#[get("/api/stocks/all")]
pub async fn stocks(
    state: web::Data<AppState>,
    params: web::Query<ListParams>,
) -> Result<HttpResponse> {
    let market = state.news.market();
    let quotes = match non_empty(params.into_inner().search) {
        Some(q) => {
            let symbols: Vec<String> = empty_on_malformed(market.search_tickers(&q, state.search_limit).await)?
                .into_iter()
                .map(|m| m.symbol)
                .collect();
            empty_on_malformed(market.quotes(&symbols).await)?
        }
        None => empty_on_malformed(market.most_active(state.actives_limit).await)?,
    };
    Ok(HttpResponse::Ok().json(quotes))
}

#[routes]
#[get("/api/crypto")]
#[get("/api/crypto/all")]
pub async fn crypto(
    state: web::Data<AppState>,
    params: web::Query<ListParams>,
) -> Result<HttpResponse> {
    let market = state.news.market();
    let symbols: Vec<String> = match non_empty(params.into_inner().search) {
        Some(q) => empty_on_malformed(market.search(&q, 40, Some("CRYPTO")).await)?
            .into_iter()
            .map(|m| m.symbol)
            .collect(),
        None => state.crypto_symbols.clone(),
    };
    let quotes = empty_on_malformed(market.quotes(&symbols).await)?;
    Ok(HttpResponse::Ok().json(quotes))
}

#[routes]
#[get("/api/quote/{symbol}")]
#[get("/api/stocks/{symbol}/quote")]
#[get("/api/crypto/{symbol}/quote")]
pub async fn quote(
    state: web::Data<AppState>,
    symbol: web::Path<String>,
) -> Result<HttpResponse> {
    let quote = match state.news.market().quote(&symbol.into_inner()).await {
        Err(Error::MalformedUpstreamPayload(_)) => None,
        other => other?,
    };
    Ok(HttpResponse::Ok().json(quote))
}

/// Daily price history for one stock or crypto pair.
#[routes]
#[get("/api/stocks/{symbol}")]
#[get("/api/crypto/{symbol}")]
pub async fn history(
    state: web::Data<AppState>,
    symbol: web::Path<String>,
) -> Result<HttpResponse> {
    let symbol = symbol.into_inner().to_uppercase();
    let bars = empty_on_malformed(state.news.market().history(&symbol, state.history_days).await)?;
    Ok(HttpResponse::Ok().json(bars))
}

#[get("/api/search")]
pub async fn search(
    state: web::Data<AppState>,
    params: web::Query<SearchParams>,
) -> Result<HttpResponse> {
    let q = non_empty(params.into_inner().query)
        .ok_or_else(|| Error::Invalid("Query parameter is required".to_string()))?;
    let matches = empty_on_malformed(
        state.news.market().search(&q, 5, Some("NASDAQ,NYSE")).await,
    )?;
    Ok(HttpResponse::Ok().json(matches))
}

#[get("/api/debug-key")]
pub async fn debug_key(state: web::Data<AppState>) -> Result<HttpResponse> {
    let market = state.news.market();
    if !market.has_key() {
        return Ok(HttpResponse::InternalServerError().json(KeyCheckResponse {
            status: "ERROR",
            message: "The FMP_API_KEY environment variable is not set".to_string(),
            api_response: None,
        }));
    }

    let status = market.check_key().await?;
    let body = KeyCheckResponse {
        status: if status.accepted { "SUCCESS" } else { "ERROR" },
        message: status.message,
        api_response: status.api_response,
    };
    Ok(if status.accepted {
        HttpResponse::Ok().json(body)
    } else {
        HttpResponse::Unauthorized().json(body)
    })
}
