//! Picture of the Day query API
//!
//! Read-only HTTP surface over the picture store:
//! - Picture listing, lookup by id, date and source
//! - Enabled source catalogue
//! - Health, readiness and Prometheus metrics

mod handlers;
mod middleware;

use anyhow::Context;
use axum::{middleware::from_fn, middleware::from_fn_with_state, routing::get, Router};
use metrics_exporter_prometheus::PrometheusBuilder;
use potd_common::{
    config::{AppConfig, ObservabilityConfig},
    db::{DbPool, PictureStore, Repository},
    metrics,
};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::signal;
use tower_http::{
    cors::{Any, CorsLayer},
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};
use tracing::info;
use tracing_subscriber::EnvFilter;

use crate::handlers::{health, pictures};
use crate::middleware::rate_limit::{rate_limit_middleware, RateLimitState};

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub store: Arc<dyn PictureStore>,
}

fn init_tracing(config: &ObservabilityConfig) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.log_level.as_str()));

    if config.json_logging {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(true)
            .json()
            .init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }
}

fn install_metrics_exporter(config: &ObservabilityConfig) -> anyhow::Result<()> {
    if config.metrics_port == 0 {
        return Ok(());
    }

    let addr = SocketAddr::from(([0, 0, 0, 0], config.metrics_port));
    PrometheusBuilder::new()
        .with_http_listener(addr)
        .set_buckets(metrics::LATENCY_BUCKETS)?
        .install()
        .context("Failed to install Prometheus exporter")?;
    metrics::register_metrics();

    info!(%addr, "Metrics exporter listening");
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let config = AppConfig::load().context("Failed to load configuration")?;
    init_tracing(&config.observability);
    info!("Starting picture API v{}", potd_common::VERSION);

    install_metrics_exporter(&config.observability)?;

    info!("Connecting to database...");
    let db = DbPool::new(&config.database).await?;
    db.migrate().await?;

    let rate_limit = if config.rate_limit.enabled {
        Some(RateLimitState::from_config(&config.rate_limit)?)
    } else {
        None
    };

    let config = Arc::new(config);
    let state = AppState {
        config: config.clone(),
        store: Arc::new(Repository::new(db)),
    };

    let app = create_router(state, rate_limit);

    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!("Listening on {}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server shutdown complete");
    Ok(())
}

/// Build the application router
fn create_router(state: AppState, rate_limit: Option<RateLimitState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let request_id = SetRequestIdLayer::x_request_id(MakeRequestUuid);
    let propagate_id = PropagateRequestIdLayer::x_request_id();

    let mut api_routes = Router::new()
        .route("/pictures", get(pictures::list_pictures))
        .route("/pictures/sources", get(pictures::list_sources))
        .route("/pictures/all_recent", get(pictures::all_recent))
        .route("/pictures/today/{source}", get(pictures::today_picture))
        .route("/pictures/date/{date}/{source}", get(pictures::picture_by_date))
        .route("/pictures/latest/{source}", get(pictures::latest_picture))
        .route("/pictures/list/{source}", get(pictures::list_by_source))
        .route("/pictures/{id}", get(pictures::get_picture));

    if let Some(limiter) = rate_limit {
        api_routes = api_routes.layer(from_fn_with_state(limiter, rate_limit_middleware));
    }

    let timeout = state.config.request_timeout();

    Router::new()
        .route("/health", get(health::health))
        .route("/ready", get(health::ready))
        .nest("/api", api_routes)
        .layer(from_fn(middleware::track_metrics))
        .layer(TimeoutLayer::new(timeout))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .layer(propagate_id)
        .layer(request_id)
        .with_state(state)
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received Ctrl+C, starting shutdown..."),
        _ = terminate => info!("Received SIGTERM, starting shutdown..."),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use chrono::{Duration, NaiveDate};
    use potd_common::config::RateLimitConfig;
    use potd_common::source::today;
    use potd_common::{InMemoryStore, MediaType, PictureDraft, Source};
    use serde_json::Value;
    use tower::ServiceExt;

    fn draft(date: NaiveDate, title: &str) -> PictureDraft {
        PictureDraft {
            title: title.into(),
            date,
            explanation: "Original.".into(),
            image_url: "https://x/img.jpg".into(),
            hd_image_url: Some("https://x/hd.jpg".into()),
            thumbnail_url: None,
            media_type: MediaType::Image,
            copyright: None,
            source_url: None,
        }
    }

    fn app(store: &InMemoryStore) -> Router {
        let state = AppState {
            config: Arc::new(AppConfig::default()),
            store: Arc::new(store.clone()),
        };
        create_router(state, None)
    }

    async fn get_json(app: Router, uri: &str) -> (StatusCode, Value) {
        let response = app
            .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        (status, serde_json::from_slice(&bytes).unwrap_or(Value::Null))
    }

    async fn seed(store: &InMemoryStore, source: Source, date: NaiveDate, title: &str) {
        store.create_picture(source, &draft(date, title)).await.unwrap();
    }

    #[tokio::test]
    async fn test_health() {
        let store = InMemoryStore::new();
        let (status, body) = get_json(app(&store), "/health").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "healthy");

        let (status, body) = get_json(app(&store), "/ready").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["checks"]["database"]["status"], "up");
    }

    #[tokio::test]
    async fn test_today_falls_back_to_yesterday() {
        let store = InMemoryStore::new();
        seed(&store, Source::Apod, today() - Duration::days(1), "Yesterday").await;

        let (status, body) = get_json(app(&store), "/api/pictures/today/apod").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["title"], "Yesterday");
        assert_eq!(body["original_explanation"], "Original.");
        assert_eq!(body["source_display"], "Astronomy Picture of the Day (NASA)");

        let (status, _) = get_json(app(&store), "/api/pictures/today/wikipedia").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_unknown_source_rejected_before_storage() {
        let store = InMemoryStore::new();

        let (status, body) = get_json(app(&store), "/api/pictures/today/flickr").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["error"]["message"].as_str().unwrap().contains("flickr"));
        assert_eq!(store.picture_queries(), 0);
    }

    #[tokio::test]
    async fn test_disabled_source_rejected_before_storage() {
        let store = InMemoryStore::new();
        store.create_source_config(Source::Bing, false).await.unwrap();

        for uri in [
            "/api/pictures/today/bing",
            "/api/pictures/latest/bing",
            "/api/pictures/list/bing",
            "/api/pictures/date/2024-01-15/bing",
            "/api/pictures?source=bing",
        ] {
            let (status, _) = get_json(app(&store), uri).await;
            assert_eq!(status, StatusCode::BAD_REQUEST, "{}", uri);
        }
        assert_eq!(store.picture_queries(), 0);
    }

    #[tokio::test]
    async fn test_by_date() {
        let store = InMemoryStore::new();
        let day = NaiveDate::from_ymd_opt(2024, 1, 15).unwrap();
        seed(&store, Source::Wikipedia, day, "Lion").await;

        let (status, body) = get_json(app(&store), "/api/pictures/date/2024-01-15/wikipedia").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["title"], "Lion");
        assert_eq!(body["display_image_url"], "https://x/hd.jpg");

        let (status, _) = get_json(app(&store), "/api/pictures/date/2024-13-40/wikipedia").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, _) = get_json(app(&store), "/api/pictures/date/2024-01-16/wikipedia").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_list_pagination() {
        let store = InMemoryStore::new();
        let start = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        for i in 0..25 {
            seed(&store, Source::Apod, start + Duration::days(i), "p").await;
        }
        seed(&store, Source::Bing, start, "b").await;

        let (status, body) =
            get_json(app(&store), "/api/pictures?source=apod&page=2&page_size=10").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["count"], 25);
        assert_eq!(body["total_pages"], 3);
        let results = body["results"].as_array().unwrap();
        assert_eq!(results.len(), 10);
        assert_eq!(results[0]["date"], "2024-01-15");

        let (_, body) = get_json(app(&store), "/api/pictures").await;
        assert_eq!(body["count"], 26);
        assert_eq!(body["results"].as_array().unwrap().len(), 20);

        let (status, _) = get_json(app(&store), "/api/pictures?page_size=101").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, _) = get_json(app(&store), "/api/pictures?page=0").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_detail_and_missing_id() {
        let store = InMemoryStore::new();
        let picture = store
            .create_picture(Source::Apod, &draft(today(), "Nebula"))
            .await
            .unwrap();

        let (status, body) = get_json(app(&store), &format!("/api/pictures/{}", picture.id)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["title"], "Nebula");
        assert_eq!(body["is_processed"], false);

        let (status, _) =
            get_json(app(&store), &format!("/api/pictures/{}", uuid::Uuid::new_v4())).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_latest_and_history() {
        let store = InMemoryStore::new();
        let (status, _) = get_json(app(&store), "/api/pictures/latest/bing").await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        seed(&store, Source::Bing, today() - Duration::days(3), "Older").await;
        seed(&store, Source::Bing, today() - Duration::days(1), "Newer").await;

        let (_, body) = get_json(app(&store), "/api/pictures/latest/bing").await;
        assert_eq!(body["title"], "Newer");

        let (_, body) = get_json(app(&store), "/api/pictures/list/bing").await;
        let titles: Vec<&str> = body
            .as_array()
            .unwrap()
            .iter()
            .map(|p| p["title"].as_str().unwrap())
            .collect();
        assert_eq!(titles, vec!["Newer", "Older"]);
    }

    #[tokio::test]
    async fn test_sources_catalogue() {
        let store = InMemoryStore::new();
        let (_, body) = get_json(app(&store), "/api/pictures/sources").await;
        let values: Vec<&str> = body
            .as_array()
            .unwrap()
            .iter()
            .map(|s| s["value"].as_str().unwrap())
            .collect();
        assert_eq!(values, vec!["apod", "wikipedia", "bing"]);

        store.create_source_config(Source::Wikipedia, false).await.unwrap();
        let (_, body) = get_json(app(&store), "/api/pictures/sources").await;
        let entries = body.as_array().unwrap();
        assert_eq!(entries.len(), 2);
        assert!(entries.iter().all(|e| e["enabled"] == true));
        assert_eq!(entries[1]["label"], "Bing Picture of the Day");
    }

    #[tokio::test]
    async fn test_all_recent_pool() {
        let store = InMemoryStore::new();
        seed(&store, Source::Apod, today(), "apod today").await;
        seed(&store, Source::Wikipedia, today() - Duration::days(1), "wiki yesterday").await;
        seed(&store, Source::Wikipedia, today() - Duration::days(2), "wiki older").await;
        for i in 0..10 {
            seed(&store, Source::Bing, today() - Duration::days(i), "bing").await;
        }

        let (status, body) = get_json(app(&store), "/api/pictures/all_recent").await;
        assert_eq!(status, StatusCode::OK);
        let pool = body.as_array().unwrap();
        assert_eq!(pool.len(), 10);
        assert_eq!(pool[0]["title"], "apod today");
        assert_eq!(pool[1]["title"], "wiki yesterday");
        assert_eq!(pool.iter().filter(|p| p["source"] == "bing").count(), 8);

        for source in Source::ALL {
            store.create_source_config(source, false).await.unwrap();
        }
        let (status, _) = get_json(app(&store), "/api/pictures/all_recent").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_rate_limit_returns_429() {
        let store = InMemoryStore::new();
        let limiter = RateLimitState::from_config(&RateLimitConfig {
            requests_per_second: 1,
            burst: 1,
            enabled: true,
        })
        .unwrap();
        let state = AppState {
            config: Arc::new(AppConfig::default()),
            store: Arc::new(store.clone()),
        };
        let app = create_router(state, Some(limiter));

        let (status, _) = get_json(app.clone(), "/api/pictures/sources").await;
        assert_eq!(status, StatusCode::OK);
        let (status, body) = get_json(app.clone(), "/api/pictures/sources").await;
        assert_eq!(status, StatusCode::TOO_MANY_REQUESTS);
        assert!(body["error"]["message"].is_string());

        // Probes are outside the limited routes
        let (status, _) = get_json(app, "/health").await;
        assert_eq!(status, StatusCode::OK);
    }
}
