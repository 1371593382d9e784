//! Integration tests for the acquisition pipeline
//!
//! These tests use wiremock to stand in for the listing API and the public
//! site, and drive the fetcher, collector, and service end-to-end.

use serde_json::{json, Value};
use std::sync::Arc;
use token_board::cache::{CacheEntry, Freshness};
use token_board::config::Config;
use token_board::fetch::{Collector, FetchResult, Fetcher, PayloadKind, StopReason};
use token_board::{BoardError, ReadSource, TokenCache, TokenService};
use url::Url;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Creates a test configuration pointed at the mock server with tiny backoffs
fn create_test_config(base_url: &str) -> Config {
    let mut config = Config::default();
    config.upstream.api_url = base_url.to_string();
    config.upstream.site_url = base_url.to_string();
    config.fetcher.max_retries = 3;
    config.fetcher.backoff_base_ms = 1;
    config.fetcher.max_backoff_ms = 5;
    config.fetcher.connect_timeout_ms = 2_000;
    config.fetcher.request_timeout_ms = 5_000;
    config
}

/// Builds `count` API records starting at rank `start`
fn api_page(start: usize, count: usize) -> Value {
    let records: Vec<Value> = (start..start + count)
        .map(|i| {
            json!({
                "name": format!("Token {}", i),
                "mint": format!("mint{}", i),
                "usd_market_cap": 1_000_000.0 - i as f64,
                "description": "",
                "reply_count": i,
                "image_uri": format!("https://cdn.example/{}.png", i),
            })
        })
        .collect();
    Value::Array(records)
}

/// Mounts a paginated listing with `total` records, 50 per page
async fn mount_listing(server: &MockServer, total: usize) {
    let mut offset = 0;
    loop {
        let count = total.saturating_sub(offset).min(50);
        Mock::given(method("GET"))
            .and(path("/coins"))
            .and(query_param("offset", offset.to_string()))
            .respond_with(ResponseTemplate::new(200).set_body_json(api_page(offset, count)))
            .mount(server)
            .await;
        if count < 50 {
            break;
        }
        offset += 50;
    }
}

/// Offsets requested from `/coins`, in request order
async fn requested_offsets(server: &MockServer) -> Vec<String> {
    server
        .received_requests()
        .await
        .unwrap_or_default()
        .iter()
        .filter(|request| request.url.path() == "/coins")
        .filter_map(|request| {
            request
                .url
                .query_pairs()
                .find(|(key, _)| key == "offset")
                .map(|(_, value)| value.into_owned())
        })
        .collect()
}

fn listing_endpoint(server: &MockServer) -> Url {
    Collector::listing_endpoint(&server.uri()).expect("Failed to build endpoint")
}

const DETAIL_PAGE: &str = r#"
    <html>
    <head>
        <title>Frog King | Board</title>
        <meta property="og:image" content="https://cdn.example/frog.png">
        <meta name="description" content="The king of all frogs">
        <link rel="canonical" href="https://pump.fun/board/FrogMint">
    </head>
    <body>
        <h1>Frog King</h1>
        <div><span>Market cap</span><span>$2,000,000</span></div>
        <div>Holders: 2,048</div>
    </body>
    </html>
"#;

const BOARD_PAGE: &str = r#"
    <html><body>
        <div data-testid="token-card">
            <a href="/board/AlphaMint"><img src="https://cdn.example/a.png" alt="Alpha"></a>
            <span class="token-name">Alpha</span>
            <span class="market-cap">$10,000</span>
        </div>
        <div data-testid="token-card">
            <a href="/board/BetaMint">Beta</a>
            <span class="market-cap">$5,000</span>
        </div>
    </body></html>
"#;

#[tokio::test]
async fn test_collects_only_the_pages_needed() {
    let server = MockServer::start().await;
    mount_listing(&server, 237).await;

    let config = create_test_config(&server.uri());
    let fetcher = Fetcher::new(&config).unwrap();
    let collector = Collector::new(&fetcher, listing_endpoint(&server), config.collector.clone());

    let collection = collector.collect(100).await;

    assert_eq!(collection.records.len(), 100);
    assert_eq!(collection.stop, StopReason::TargetReached);
    assert_eq!(collection.pages_fetched, 2);
    assert_eq!(requested_offsets(&server).await, vec!["0", "50"]);
    assert_eq!(collection.records[0].text("mint"), "mint0");
    assert_eq!(collection.records[99].text("mint"), "mint99");
}

#[tokio::test]
async fn test_collection_truncates_to_target() {
    let server = MockServer::start().await;
    mount_listing(&server, 237).await;

    let config = create_test_config(&server.uri());
    let fetcher = Fetcher::new(&config).unwrap();
    let collector = Collector::new(&fetcher, listing_endpoint(&server), config.collector.clone());

    let collection = collector.collect(75).await;

    assert_eq!(collection.records.len(), 75);
    assert_eq!(requested_offsets(&server).await, vec!["0", "50"]);
}

#[tokio::test]
async fn test_short_page_stops_collection() {
    let server = MockServer::start().await;
    mount_listing(&server, 70).await;

    let config = create_test_config(&server.uri());
    let fetcher = Fetcher::new(&config).unwrap();
    let collector = Collector::new(&fetcher, listing_endpoint(&server), config.collector.clone());

    let collection = collector.collect(500).await;

    assert_eq!(collection.records.len(), 70);
    assert_eq!(collection.stop, StopReason::ShortPage);
    assert_eq!(requested_offsets(&server).await, vec!["0", "50"]);
}

#[tokio::test]
async fn test_empty_page_is_a_short_page() {
    let server = MockServer::start().await;
    mount_listing(&server, 100).await;

    let config = create_test_config(&server.uri());
    let fetcher = Fetcher::new(&config).unwrap();
    let collector = Collector::new(&fetcher, listing_endpoint(&server), config.collector.clone());

    let collection = collector.collect(500).await;

    assert_eq!(collection.records.len(), 100);
    assert_eq!(collection.stop, StopReason::ShortPage);
    assert_eq!(requested_offsets(&server).await, vec!["0", "50", "100"]);
}

#[tokio::test]
async fn test_partial_collection_survives_page_failure() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/coins"))
        .and(query_param("offset", "0"))
        .respond_with(ResponseTemplate::new(200).set_body_json(api_page(0, 50)))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/coins"))
        .and(query_param("offset", "50"))
        .respond_with(ResponseTemplate::new(500))
        .expect(3)
        .mount(&server)
        .await;

    let config = create_test_config(&server.uri());
    let fetcher = Fetcher::new(&config).unwrap();
    let collector = Collector::new(&fetcher, listing_endpoint(&server), config.collector.clone());

    let collection = collector.collect(200).await;

    assert_eq!(collection.records.len(), 50);
    assert!(matches!(collection.stop, StopReason::FetchFailed(_)));
    assert!(!collection.is_complete());
}

#[tokio::test]
async fn test_non_array_page_stops_collection() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/coins"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"error": "nope"})))
        .expect(1)
        .mount(&server)
        .await;

    let config = create_test_config(&server.uri());
    let fetcher = Fetcher::new(&config).unwrap();
    let collector = Collector::new(&fetcher, listing_endpoint(&server), config.collector.clone());

    let collection = collector.collect(10).await;

    assert!(collection.records.is_empty());
    assert!(matches!(collection.stop, StopReason::FetchFailed(_)));
}

#[tokio::test]
async fn test_collection_deadline() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/coins"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(api_page(0, 50))
                .set_delay(std::time::Duration::from_secs(3)),
        )
        .mount(&server)
        .await;

    let mut config = create_test_config(&server.uri());
    config.collector.collection_deadline_secs = 1;
    let fetcher = Fetcher::new(&config).unwrap();
    let collector = Collector::new(&fetcher, listing_endpoint(&server), config.collector.clone());

    let collection = collector.collect(100).await;

    assert!(collection.records.is_empty());
    assert_eq!(collection.stop, StopReason::DeadlineExceeded);
}

#[tokio::test]
async fn test_fetch_retries_after_rate_limit() {
    let server = MockServer::start().await;

    // Mounted first so it wins until exhausted
    Mock::given(method("GET"))
        .and(path("/coins"))
        .respond_with(ResponseTemplate::new(429).insert_header("Retry-After", "0"))
        .up_to_n_times(1)
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/coins"))
        .respond_with(ResponseTemplate::new(200).set_body_json(api_page(0, 2)))
        .expect(1)
        .mount(&server)
        .await;

    let config = create_test_config(&server.uri());
    let fetcher = Fetcher::new(&config).unwrap();

    let result = fetcher
        .fetch(&listing_endpoint(&server), &[], PayloadKind::Json)
        .await;

    match result {
        FetchResult::Success {
            status_code,
            attempts,
            payload,
            ..
        } => {
            assert_eq!(status_code, 200);
            assert_eq!(attempts, 2);
            assert_eq!(payload.into_json().unwrap().as_array().unwrap().len(), 2);
        }
        other => panic!("expected success, got {:?}", other),
    }
}

#[tokio::test]
async fn test_fetch_retries_transient_server_errors() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/coins"))
        .respond_with(ResponseTemplate::new(503))
        .up_to_n_times(2)
        .expect(2)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/coins"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(&server)
        .await;

    let config = create_test_config(&server.uri());
    let fetcher = Fetcher::new(&config).unwrap();

    let result = fetcher
        .fetch(&listing_endpoint(&server), &[], PayloadKind::Json)
        .await;

    assert!(result.is_success());
    assert_eq!(result.attempts(), 3);
}

#[tokio::test]
async fn test_fetch_gives_up_after_max_attempts() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/coins"))
        .respond_with(ResponseTemplate::new(500))
        .expect(3)
        .mount(&server)
        .await;

    let config = create_test_config(&server.uri());
    let fetcher = Fetcher::new(&config).unwrap();

    let result = fetcher
        .fetch(&listing_endpoint(&server), &[], PayloadKind::Json)
        .await;

    match result {
        FetchResult::HttpError {
            status_code,
            attempts,
        } => {
            assert_eq!(status_code, 500);
            assert_eq!(attempts, 3);
        }
        other => panic!("expected http error, got {:?}", other),
    }
}

#[tokio::test]
async fn test_malformed_payload_is_not_retried() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/coins"))
        .respond_with(ResponseTemplate::new(200).set_body_string("{not json"))
        .expect(1)
        .mount(&server)
        .await;

    let config = create_test_config(&server.uri());
    let fetcher = Fetcher::new(&config).unwrap();

    let result = fetcher
        .fetch(&listing_endpoint(&server), &[], PayloadKind::Json)
        .await;

    assert!(matches!(
        result,
        FetchResult::MalformedPayload { attempts: 1, .. }
    ));
}

#[tokio::test]
async fn test_fetch_reports_connection_failure() {
    let mut config = create_test_config("http://127.0.0.1:9");
    config.fetcher.max_retries = 2;
    let fetcher = Fetcher::new(&config).unwrap();
    let url = Url::parse("http://127.0.0.1:9/coins").unwrap();

    let result = fetcher.fetch(&url, &[], PayloadKind::Json).await;

    assert!(matches!(
        result,
        FetchResult::NetworkError { attempts: 2, .. }
    ));
    assert!(result.failure_reason().is_some());
}

#[tokio::test]
async fn test_list_tokens_from_api() {
    let server = MockServer::start().await;
    mount_listing(&server, 237).await;

    let service = TokenService::new(create_test_config(&server.uri())).unwrap();
    let listing = service.list_tokens(60, false).await.unwrap();

    assert_eq!(listing.source, ReadSource::Refreshed);
    assert_eq!(listing.tokens.len(), 60);

    let first = &listing.tokens[0];
    assert_eq!(first.identifier, "mint0");
    assert_eq!(first.name, "Token 0");
    assert_eq!(first.market_cap, 1_000_000.0);
    assert_eq!(first.price, 0.001);
    assert_eq!(first.replies, Some(0));
    assert_eq!(first.holders, None);
    assert_eq!(
        first.canonical_url,
        format!("{}/board/mint0", server.uri())
    );

    // A second read within the TTL does not touch the upstream
    let before = server.received_requests().await.unwrap_or_default().len();
    let again = service.list_tokens(10, false).await.unwrap();
    let after = server.received_requests().await.unwrap_or_default().len();
    assert_eq!(again.source, ReadSource::Fresh);
    assert_eq!(again.tokens.len(), 10);
    assert_eq!(before, after);
}

#[tokio::test]
async fn test_larger_limit_than_cached_triggers_refresh() {
    let server = MockServer::start().await;
    mount_listing(&server, 237).await;

    let service = TokenService::new(create_test_config(&server.uri())).unwrap();
    service.list_tokens(10, false).await.unwrap();
    let listing = service.list_tokens(120, false).await.unwrap();

    assert_eq!(listing.source, ReadSource::Refreshed);
    assert_eq!(listing.tokens.len(), 120);
}

#[tokio::test]
async fn test_list_tokens_falls_back_to_stale_cache() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;

    let config = create_test_config(&server.uri());
    let cache = Arc::new(TokenCache::from_config(&config.cache));
    let old_tokens = {
        let seed = MockServer::start().await;
        mount_listing(&seed, 20).await;
        let seeded = TokenService::new(create_test_config(&seed.uri())).unwrap();
        seeded.list_tokens(20, false).await.unwrap().tokens
    };
    cache.store_entry(CacheEntry::stored_at(
        old_tokens.clone(),
        20,
        chrono::Utc::now() - chrono::Duration::days(3),
    ));
    assert_eq!(cache.freshness(), Freshness::Expired);

    let service = TokenService::with_cache(config, Arc::clone(&cache)).unwrap();
    let listing = service.list_tokens(20, false).await.unwrap();

    assert_eq!(listing.tokens, old_tokens);
    match listing.source {
        ReadSource::Fallback { age, freshness } => {
            assert!(age.num_days() >= 2);
            assert_eq!(freshness, Freshness::Expired);
        }
        other => panic!("expected fallback, got {:?}", other),
    }
}

#[tokio::test]
async fn test_list_tokens_unavailable_without_cache() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let service = TokenService::new(create_test_config(&server.uri())).unwrap();
    let result = service.list_tokens(10, false).await;

    assert!(matches!(result, Err(BoardError::Unavailable { .. })));
}

#[tokio::test]
async fn test_list_tokens_scrapes_board_when_api_is_empty() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/coins"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/board"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string(BOARD_PAGE)
                .insert_header("content-type", "text/html"),
        )
        .expect(1)
        .mount(&server)
        .await;

    let service = TokenService::new(create_test_config(&server.uri())).unwrap();
    let listing = service.list_tokens(10, false).await.unwrap();

    assert_eq!(listing.source, ReadSource::Refreshed);
    assert_eq!(listing.tokens.len(), 2);
    assert_eq!(listing.tokens[0].identifier, "AlphaMint");
    assert_eq!(listing.tokens[0].name, "Alpha");
    assert_eq!(listing.tokens[0].market_cap, 10_000.0);
    assert_eq!(listing.tokens[0].replies, None);
    assert_eq!(listing.tokens[1].identifier, "BetaMint");
}

#[tokio::test]
async fn test_get_token_from_cache() {
    let server = MockServer::start().await;
    mount_listing(&server, 30).await;

    let service = TokenService::new(create_test_config(&server.uri())).unwrap();
    service.list_tokens(30, false).await.unwrap();

    let token = service.get_token("mint7").await.unwrap();
    assert_eq!(token.name, "Token 7");
    assert_eq!(token.replies, Some(7));

    let requests = server.received_requests().await.unwrap_or_default();
    assert!(requests.iter().all(|r| !r.url.path().starts_with("/board")));
}

#[tokio::test]
async fn test_get_token_scrapes_detail_page() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/board/FrogMint"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string(DETAIL_PAGE)
                .insert_header("content-type", "text/html"),
        )
        .expect(1)
        .mount(&server)
        .await;

    let service = TokenService::new(create_test_config(&server.uri())).unwrap();
    let token = service.get_token("FrogMint").await.unwrap();

    assert_eq!(token.identifier, "FrogMint");
    assert_eq!(token.name, "Frog King");
    assert_eq!(token.market_cap, 2_000_000.0);
    assert_eq!(token.price, 0.002);
    assert_eq!(token.holders, Some(2048));
    assert_eq!(token.description, "The king of all frogs");
    assert_eq!(token.image_url, "https://cdn.example/frog.png");
}

#[tokio::test]
async fn test_get_token_without_token_data_is_not_found() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/board/GhostMint"))
        .respond_with(
            ResponseTemplate::new(200).set_body_string("<html><body><p>gone</p></body></html>"),
        )
        .mount(&server)
        .await;

    let service = TokenService::new(create_test_config(&server.uri())).unwrap();
    let result = service.get_token("GhostMint").await;

    assert!(matches!(
        result,
        Err(BoardError::NotFound { identifier }) if identifier == "GhostMint"
    ));
}

#[tokio::test]
async fn test_get_token_upstream_down_is_unavailable() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;

    let service = TokenService::new(create_test_config(&server.uri())).unwrap();
    let result = service.get_token("AnyMint").await;

    assert!(matches!(result, Err(BoardError::Unavailable { .. })));
}

#[tokio::test]
async fn test_get_token_ignores_links_to_other_tokens() {
    let server = MockServer::start().await;

    let page = r#"
        <html>
        <head><link rel="canonical" href="https://pump.fun/board/FrogMint"></head>
        <body>
            <nav><a href="/coin/TrendingMint">Trending now</a></nav>
            <h1>Frog King</h1>
            <div><span>Market cap</span><span>$2,000,000</span></div>
        </body>
        </html>
    "#;
    Mock::given(method("GET"))
        .and(path("/board/FrogMint"))
        .respond_with(ResponseTemplate::new(200).set_body_string(page))
        .mount(&server)
        .await;

    let service = TokenService::new(create_test_config(&server.uri())).unwrap();
    let token = service.get_token("FrogMint").await.unwrap();

    assert_eq!(token.identifier, "FrogMint");
    assert_eq!(
        token.canonical_url,
        format!("{}/board/FrogMint", server.uri())
    );
    assert_eq!(token.name, "Frog King");
}

#[tokio::test]
async fn test_get_token_missing_page_is_not_found() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/board/NopeMint"))
        .respond_with(ResponseTemplate::new(404))
        .expect(3)
        .mount(&server)
        .await;

    let service = TokenService::new(create_test_config(&server.uri())).unwrap();
    let result = service.get_token("NopeMint").await;

    assert!(matches!(
        result,
        Err(BoardError::NotFound { identifier }) if identifier == "NopeMint"
    ));
}

#[tokio::test]
async fn test_scraped_listing_has_no_holders() {
    let server = MockServer::start().await;

    let board = r#"
        <html><body>
            <div data-testid="token-card" data-holders="42">
                <a href="/board/AlphaMint">Alpha</a>
                <span class="market-cap">$10,000</span>
                <span>512 holders</span>
            </div>
        </body></html>
    "#;
    Mock::given(method("GET"))
        .and(path("/coins"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/board"))
        .respond_with(ResponseTemplate::new(200).set_body_string(board))
        .mount(&server)
        .await;

    let service = TokenService::new(create_test_config(&server.uri())).unwrap();
    let listing = service.list_tokens(5, false).await.unwrap();

    assert_eq!(listing.tokens.len(), 1);
    assert_eq!(listing.tokens[0].identifier, "AlphaMint");
    assert_eq!(listing.tokens[0].holders, None);

    let output = serde_json::to_value(&listing.tokens[0]).unwrap();
    assert!(output.get("holders").is_none());
}
