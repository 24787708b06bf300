//! Viewer API Gateway
//!
//! The HTTP entry point of the viewer backend.
//! Handles:
//! - IIIF image, thumbnail and watermark urls
//! - Archive trees, bookmarks, comments, annotations, maps and CMS pages
//! - PDF/EPUB download requests
//! - Rate limiting and observability (logging, metrics, request ids)

mod handlers;
mod middleware;
mod state;

pub use state::AppState;

use axum::{
    routing::{get, post},
    Router,
};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::signal;
use tower_http::{
    compression::CompressionLayer,
    cors::{Any, CorsLayer},
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;
use viewer_common::{config::AppConfig, db::DbPool, metrics};

use middleware::{rate_limit_middleware, track_metrics, RateLimit};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load environment variables
    dotenvy::dotenv().ok();

    // Load configuration
    let config = AppConfig::load()?;
    let config = Arc::new(config);

    // Initialize tracing; RUST_LOG wins over the configured level
    init_tracing(&config);

    info!(
        service = %config.observability.service_name,
        "Starting viewer gateway v{}",
        viewer_common::VERSION
    );

    // Initialize metrics
    let metrics_handle = PrometheusBuilder::new().install_recorder()?;
    metrics::register_metrics();

    // Initialize database connection
    info!("Connecting to database...");
    let db = DbPool::new(&config.database).await?;
    db.migrate().await?;

    // Create app state
    let state = AppState::build(config.clone(), db).await?;
    spawn_session_eviction(state.clone());

    // Build the router
    let app = create_router(state, metrics_handle);

    // Start the server
    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port).parse()?;
    info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server shutdown complete");
    Ok(())
}

fn init_tracing(config: &AppConfig) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.observability.log_level));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true);

    if config.observability.json_logging {
        builder.json().init();
    } else {
        builder.init();
    }
}

/// Periodically drop anonymous tree and bookmark state of abandoned sessions
fn spawn_session_eviction(state: AppState) {
    let period = Duration::from_secs((state.config.server.session_idle_secs / 4).max(30));
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(period);
        loop {
            interval.tick().await;
            let evicted = state.evict_idle_sessions();
            if evicted > 0 {
                info!(evicted, "Evicted idle sessions");
            }
        }
    });
}

/// Create the main application router
fn create_router(state: AppState, metrics_handle: PrometheusHandle) -> Router {
    // CORS configuration
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    // Request ID propagation
    let request_id = SetRequestIdLayer::x_request_id(MakeRequestUuid);
    let propagate_id = PropagateRequestIdLayer::x_request_id();

    let timeout = Duration::from_secs(state.config.server.request_timeout_secs);
    let rate_limit = &state.config.rate_limit;
    let limiter = rate_limit
        .enabled
        .then(|| RateLimit::new(rate_limit.requests_per_second, rate_limit.burst));

    // API routes
    let mut api_routes = Router::new()
        // Health endpoints
        .route("/health", get(handlers::health::health))
        .route("/ready", get(handlers::health::ready))

        // IIIF urls
        .route("/records/{pi}/thumbnail", get(handlers::images::record_thumbnail))
        .route("/records/{pi}/pages/{order}/image", get(handlers::images::page_image))
        .route("/records/{pi}/pages/{order}/thumbnail", get(handlers::images::page_thumbnail))
        .route("/records/{pi}/pages/{order}/watermark", get(handlers::images::page_watermark))
        .route("/iiif/modify", post(handlers::images::modify_url))

        // Annotations
        .route("/records/{pi}/pages/{order}/annotations", get(handlers::annotations::page_annotations))
        .route("/annotations", post(handlers::annotations::create_annotation))
        .route(
            "/annotations/{id}",
            get(handlers::annotations::get_annotation)
                .put(handlers::annotations::update_annotation)
                .delete(handlers::annotations::delete_annotation),
        )

        // Comments
        .route(
            "/records/{pi}/pages/{order}/comments",
            get(handlers::comments::page_comments).post(handlers::comments::create_comment),
        )
        .route(
            "/comments/{id}",
            axum::routing::put(handlers::comments::update_comment).delete(handlers::comments::delete_comment),
        )

        // Bookmark lists
        .route(
            "/bookmarklists",
            get(handlers::bookmarks::list_bookmark_lists).post(handlers::bookmarks::create_bookmark_list),
        )
        .route("/bookmarklists/shared/{key}", get(handlers::bookmarks::shared_bookmark_list))
        .route(
            "/bookmarklists/{id}",
            get(handlers::bookmarks::get_bookmark_list)
                .put(handlers::bookmarks::update_bookmark_list)
                .delete(handlers::bookmarks::delete_bookmark_list),
        )
        .route("/bookmarklists/{id}/items", post(handlers::bookmarks::add_bookmark))
        .route(
            "/bookmarklists/{id}/items/{item}",
            axum::routing::delete(handlers::bookmarks::delete_bookmark),
        )
        .route(
            "/session/{session}/bookmarks",
            get(handlers::bookmarks::session_bookmarks)
                .post(handlers::bookmarks::add_session_bookmark)
                .delete(handlers::bookmarks::remove_session_bookmarks),
        )
        .route(
            "/session/{session}/bookmarks/transfer",
            post(handlers::bookmarks::transfer_session_bookmarks),
        )

        // Downloads
        .route("/downloads", post(handlers::downloads::request_download))
        .route("/downloads/{identifier}", get(handlers::downloads::download_status))

        // Archives
        .route("/ead/databases", get(handlers::ead::databases))
        .route("/ead/{database}/{file}/tree", get(handlers::ead::tree))
        .route("/ead/{database}/{file}/tree/select/{id}", post(handlers::ead::select))
        .route("/ead/{database}/{file}/tree/{index}/expand", post(handlers::ead::expand))
        .route("/ead/{database}/{file}/tree/{index}/collapse", post(handlers::ead::collapse))

        // Maps
        .route("/maps", get(handlers::maps::list_maps).post(handlers::maps::create_map))
        .route(
            "/maps/{id}",
            get(handlers::maps::get_map)
                .put(handlers::maps::update_map)
                .delete(handlers::maps::delete_map),
        )
        .route("/maps/{id}/featuresets", post(handlers::maps::add_feature_set))
        .route("/maps/{id}/features", get(handlers::maps::map_features))

        // CMS
        .route("/cms/pages", get(handlers::cms::list_pages).post(handlers::cms::create_page))
        .route(
            "/cms/pages/{id}",
            get(handlers::cms::get_page)
                .put(handlers::cms::update_page)
                .delete(handlers::cms::delete_page),
        )
        .route("/cms/migrate/{pi}", post(handlers::cms::migrate_overview));

    api_routes = api_routes.route_layer(axum::middleware::from_fn(track_metrics));

    match limiter {
        Some(limit) => {
            info!(
                requests_per_second = rate_limit.requests_per_second,
                burst = rate_limit.burst,
                "Rate limiting enabled"
            );
            api_routes = api_routes.layer(axum::middleware::from_fn_with_state(limit, rate_limit_middleware));
        }
        None => warn!("Rate limiting disabled"),
    }

    let metrics_routes = Router::new().route("/metrics", get(move || async move { metrics_handle.render() }));

    // Compose the app
    Router::new()
        .nest("/api/v1", api_routes)
        .merge(metrics_routes)
        .layer(TraceLayer::new_for_http())
        .layer(CompressionLayer::new())
        .layer(TimeoutLayer::new(timeout))
        .layer(cors)
        .layer(propagate_id)
        .layer(request_id)
        .with_state(state)
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received Ctrl+C, starting shutdown..."),
        _ = terminate => info!("Received SIGTERM, starting shutdown..."),
    }
}
