use actix_web::http::StatusCode;
use actix_web::{test, web, App};
use finboard::config::{Config, DefaultNewsMode};
use finboard::server::{configure, AppState};
use serde_json::Value;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use test_data::*;

// Route tests against a mocked market data provider. No news sources are
// configured, so scraping never leaves the process.

fn state(market_url: &str, key: Option<&str>, mode: DefaultNewsMode) -> web::Data<AppState> {
    let mut config = Config::default();
    config.sources = vec![];
    config.market.base_url = market_url.to_string();
    config.market.api_key = key.map(str::to_string);
    config.market.crypto_symbols = vec!["BTCUSD".to_string(), "ETHUSD".to_string()];
    config.server.news_mode = mode;
    web::Data::new(AppState::from_config(&config).unwrap())
}

macro_rules! get {
    ($state:expr, $uri:expr) => {{
        let app = test::init_service(App::new().app_data($state.clone()).configure(configure)).await;
        let req = test::TestRequest::get().uri($uri).to_request();
        test::call_service(&app, req).await
    }};
}

#[actix_web::test]
async fn test_health() {
    let server = MockServer::start().await;
    let state = state(&server.uri(), None, DefaultNewsMode::Cached);

    let resp = get!(state, "/health");
    assert_eq!(resp.status(), StatusCode::OK);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["status"], "ok");
}

#[actix_web::test]
async fn test_missing_key_is_server_error_with_message() {
    let server = MockServer::start().await;
    let state = state(&server.uri(), None, DefaultNewsMode::Cached);

    for uri in ["/api/quote/AAPL", "/api/stocks/AAPL/news", "/api/stocks", "/api/news?search=apple"] {
        let resp = get!(state, uri);
        assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR, "{}", uri);
        let body: Value = test::read_body_json(resp).await;
        assert!(body["message"].as_str().unwrap().contains("FMP_API_KEY"), "{}", uri);
    }
}

#[actix_web::test]
async fn test_empty_cache_is_empty_list() {
    let server = MockServer::start().await;
    let state = state(&server.uri(), Some("k"), DefaultNewsMode::Cached);

    let resp = get!(state, "/api/news");
    assert_eq!(resp.status(), StatusCode::OK);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body, serde_json::json!([]));
}

#[actix_web::test]
async fn test_search_without_matches_is_empty_list() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/search-ticker"))
        .and(query_param("query", "zzzz"))
        .respond_with(ResponseTemplate::new(200).set_body_string("[]"))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/stock_news"))
        .respond_with(ResponseTemplate::new(200).set_body_string(TICKER_NEWS_JSON))
        .expect(0)
        .mount(&server)
        .await;

    let state = state(&server.uri(), Some("k"), DefaultNewsMode::Cached);
    let resp = get!(state, "/api/news?search=zzzz");
    assert_eq!(resp.status(), StatusCode::OK);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body, serde_json::json!([]));
}

#[actix_web::test]
async fn test_search_returns_news_for_matched_symbols() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/search-ticker"))
        .respond_with(ResponseTemplate::new(200).set_body_string(SEARCH_TICKER_JSON))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/stock_news"))
        .and(query_param("tickers", "AAPL"))
        .respond_with(ResponseTemplate::new(200).set_body_string(TICKER_NEWS_JSON))
        .mount(&server)
        .await;

    let state = state(&server.uri(), Some("k"), DefaultNewsMode::Cached);
    let resp = get!(state, "/api/news?search=apple");
    assert_eq!(resp.status(), StatusCode::OK);

    let body: Value = test::read_body_json(resp).await;
    let items = body.as_array().unwrap();
    assert_eq!(items.len(), 2);
    assert_eq!(items[0]["url"], "https://example.com/apple-chip");
    assert_eq!(items[0]["imageUrl"], "https://img.example.com/chip.jpg");
}

#[actix_web::test]
async fn test_ticker_news_uppercases_symbol() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/stock_news"))
        .and(query_param("tickers", "BTCUSD"))
        .respond_with(ResponseTemplate::new(200).set_body_string(TICKER_NEWS_JSON))
        .expect(1)
        .mount(&server)
        .await;

    let state = state(&server.uri(), Some("k"), DefaultNewsMode::Cached);
    let resp = get!(state, "/api/crypto/btcusd/news");
    assert_eq!(resp.status(), StatusCode::OK);
}

#[actix_web::test]
async fn test_malformed_payload_is_empty_list() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/stock_news"))
        .respond_with(ResponseTemplate::new(200).set_body_string(r#"{"unexpected":"shape"}"#))
        .mount(&server)
        .await;

    let state = state(&server.uri(), Some("k"), DefaultNewsMode::Cached);
    let resp = get!(state, "/api/stocks/AAPL/news");
    assert_eq!(resp.status(), StatusCode::OK);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body, serde_json::json!([]));
}

#[actix_web::test]
async fn test_upstream_failure_is_server_error() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/stock_news"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;

    let state = state(&server.uri(), Some("k"), DefaultNewsMode::Cached);
    let resp = get!(state, "/api/stocks/AAPL/news");
    assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let body: Value = test::read_body_json(resp).await;
    assert!(body["message"].as_str().unwrap().contains("503"));
}

#[actix_web::test]
async fn test_general_feed_is_memoized() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/fmp/articles"))
        .respond_with(ResponseTemplate::new(200).set_body_string(GENERAL_FEED_JSON))
        .expect(1)
        .mount(&server)
        .await;

    let state = state(&server.uri(), Some("k"), DefaultNewsMode::GeneralFeed);

    let first = get!(state, "/api/news");
    assert_eq!(first.status(), StatusCode::OK);
    let body: Value = test::read_body_json(first).await;
    assert_eq!(body.as_array().unwrap().len(), 2);

    let limited = get!(state, "/api/news?limit=1");
    let body: Value = test::read_body_json(limited).await;
    assert_eq!(body.as_array().unwrap().len(), 1);
    assert_eq!(body[0]["title"], "Fed holds");
}

#[actix_web::test]
async fn test_scrape_without_sources_reports_no_new_articles() {
    let server = MockServer::start().await;
    let state = state(&server.uri(), None, DefaultNewsMode::Cached);

    let resp = get!(state, "/api/news/scrape");
    assert_eq!(resp.status(), StatusCode::OK);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["status"], "no_new_articles");
    assert_eq!(body["articles_scraped"], 0);
}

#[actix_web::test]
async fn test_stocks_and_crypto_lists() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/stock_market/actives"))
        .respond_with(ResponseTemplate::new(200).set_body_string(QUOTES_JSON))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/quote/BTCUSD,ETHUSD"))
        .respond_with(ResponseTemplate::new(200).set_body_string(
            r#"[{"symbol":"BTCUSD","name":"Bitcoin USD","price":67000.0,"change":1200.0,"changesPercentage":1.8},
                {"symbol":"ETHUSD","name":"Ethereum USD","price":3500.0,"change":-20.0,"changesPercentage":-0.6}]"#,
        ))
        .mount(&server)
        .await;

    let state = state(&server.uri(), Some("k"), DefaultNewsMode::Cached);

    let resp = get!(state, "/api/stocks");
    assert_eq!(resp.status(), StatusCode::OK);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body[0]["symbol"], "AAPL");
    assert_eq!(body[1]["changesPercentage"], -0.56);

    let resp = get!(state, "/api/crypto");
    assert_eq!(resp.status(), StatusCode::OK);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body.as_array().unwrap().len(), 2);
    assert_eq!(body[0]["symbol"], "BTCUSD");
}

#[actix_web::test]
async fn test_stock_search_resolves_then_quotes() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/search-ticker"))
        .respond_with(ResponseTemplate::new(200).set_body_string(SEARCH_TICKER_JSON))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/quote/AAPL"))
        .respond_with(ResponseTemplate::new(200).set_body_string(
            r#"[{"symbol":"AAPL","name":"Apple Inc.","price":190.5,"change":1.2,"changesPercentage":0.63}]"#,
        ))
        .mount(&server)
        .await;

    let state = state(&server.uri(), Some("k"), DefaultNewsMode::Cached);
    let resp = get!(state, "/api/stocks?search=apple");
    assert_eq!(resp.status(), StatusCode::OK);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body.as_array().unwrap().len(), 1);
    assert_eq!(body[0]["price"], 190.5);
}

#[actix_web::test]
async fn test_quote_unknown_symbol_is_null() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/quote/NOPE"))
        .respond_with(ResponseTemplate::new(200).set_body_string("[]"))
        .mount(&server)
        .await;

    let state = state(&server.uri(), Some("k"), DefaultNewsMode::Cached);
    let resp = get!(state, "/api/quote/NOPE");
    assert_eq!(resp.status(), StatusCode::OK);
    let body: Value = test::read_body_json(resp).await;
    assert!(body.is_null());
}

#[actix_web::test]
async fn test_search_requires_query() {
    let server = MockServer::start().await;
    let state = state(&server.uri(), Some("k"), DefaultNewsMode::Cached);

    let resp = get!(state, "/api/search");
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    let body: Value = test::read_body_json(resp).await;
    assert!(body["message"].as_str().unwrap().contains("Query parameter is required"));
}

#[actix_web::test]
async fn test_search_restricts_exchanges() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/search"))
        .and(query_param("exchange", "NASDAQ,NYSE"))
        .and(query_param("limit", "5"))
        .respond_with(ResponseTemplate::new(200).set_body_string(SEARCH_TICKER_JSON))
        .mount(&server)
        .await;

    let state = state(&server.uri(), Some("k"), DefaultNewsMode::Cached);
    let resp = get!(state, "/api/search?query=apple");
    assert_eq!(resp.status(), StatusCode::OK);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body[0]["symbol"], "AAPL");
    assert_eq!(body[0]["exchangeShortName"], "NASDAQ");
}

#[actix_web::test]
async fn test_debug_key() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/profile/AAPL"))
        .respond_with(ResponseTemplate::new(401).set_body_string(INVALID_KEY_JSON))
        .mount(&server)
        .await;

    let missing = state(&server.uri(), None, DefaultNewsMode::Cached);
    let resp = get!(missing, "/api/debug-key");
    assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["status"], "ERROR");

    let rejected = state(&server.uri(), Some("bad"), DefaultNewsMode::Cached);
    let resp = get!(rejected, "/api/debug-key");
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    let body: Value = test::read_body_json(resp).await;
    assert!(body["apiResponse"].as_str().unwrap().starts_with("Invalid API KEY"));
}

#[actix_web::test]
async fn test_list_aliases_and_history() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/stock_market/actives"))
        .respond_with(ResponseTemplate::new(200).set_body_string(QUOTES_JSON))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/historical-price-full/AAPL"))
        .and(query_param("timeseries", "100"))
        .respond_with(ResponseTemplate::new(200).set_body_string(
            r#"{"symbol":"AAPL","historical":[{"date":"2024-03-15","close":190.5},{"date":"2024-03-14","close":188.0}]}"#,
        ))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/historical-price-full/NODATA"))
        .respond_with(ResponseTemplate::new(200).set_body_string("{}"))
        .mount(&server)
        .await;

    let state = state(&server.uri(), Some("k"), DefaultNewsMode::Cached);

    let resp = get!(state, "/api/stocks/all");
    assert_eq!(resp.status(), StatusCode::OK);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body[0]["symbol"], "AAPL");

    let resp = get!(state, "/api/stocks/aapl");
    assert_eq!(resp.status(), StatusCode::OK);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body.as_array().unwrap().len(), 2);
    assert_eq!(body[0]["date"], "2024-03-15");

    let resp = get!(state, "/api/crypto/nodata");
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body, serde_json::json!([]));
}

#[actix_web::test]
async fn test_unreachable_provider_does_not_leak_api_key() {
    let state = state("http://127.0.0.1:9/api/v3", Some("SUPERSECRETKEY"), DefaultNewsMode::Cached);

    for uri in ["/api/stocks/AAPL/news", "/api/quote/AAPL", "/api/stocks"] {
        let resp = get!(state, uri);
        assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR, "{}", uri);
        let body = test::read_body(resp).await;
        let body = String::from_utf8_lossy(&body);
        assert!(body.contains("UPSTREAM_UNAVAILABLE"), "{}", body);
        assert!(!body.contains("SUPERSECRETKEY"), "{}", body);
    }
}
