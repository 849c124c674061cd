use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;

use axum::{
    Router,
    routing::{get, post, put},
};
use community_backend::{
    AppState,
    analysis::AnalysisClient,
    config::Config,
    middleware::{RateLimiter, auth_middleware, log_errors, rate_limit},
    routes,
};
use sqlx::Executor;
use sqlx::postgres::PgPoolOptions;
use tower_http::cors::CorsLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() {
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::from_env().expect("Failed to load configuration");

    #[cfg(debug_assertions)]
    tracing::info!("Running in debug mode with CORS enabled");

    #[cfg(not(debug_assertions))]
    tracing::info!("Running in production mode with CORS disabled");

    let pool = PgPoolOptions::new()
        .max_connections(10)
        .after_connect(|conn, _meta| {
            Box::pin(async move {
                conn.execute("SET application_name = 'community_backend';")
                    .await?;
                Ok(())
            })
        })
        .connect(&config.database_url)
        .await
        .expect("Failed to connect to Postgres");

    let redis_client =
        redis::Client::open(config.redis_url.clone()).expect("Failed to create Redis client");
    let redis_arc = Arc::new(redis_client.clone());

    let analyzer =
        Arc::new(AnalysisClient::new(&config).expect("Failed to create analysis client"));
    if config.analysis_api_url.is_none() {
        tracing::warn!("ANALYSIS_API_URL not set; message analysis will use the fallback");
    }

    let state = AppState {
        pool,
        config: config.clone(),
        redis: redis_arc,
        analyzer,
    };

    let rate_limiter = Arc::new(RateLimiter::new(redis_client, config.clone()));

    // Only registration, login and the active-community listing are public.
    let public_routes = Router::new()
        .route("/users/register", post(routes::user::register))
        .route("/users/login", post(routes::user::login))
        .route("/communities/list", get(routes::community::list_communities));

    let protected_routes = Router::new()
        // user routes
        .route("/users/me", get(routes::user::get_me))
        .route("/users/update-location", put(routes::user::update_location))
        // community routes
        .route("/communities/create", post(routes::community::create_community))
        .route("/communities/by-id", get(routes::community::find_by_id))
        .route("/communities/nearby", get(routes::community::find_nearby))
        .route("/communities/join", post(routes::community::join_community))
        .route("/communities/leave", post(routes::community::leave_community))
        .route("/communities/members", get(routes::community::get_members))
        // message routes
        .route("/messages/create", post(routes::message::create_message))
        .route("/messages/list", post(routes::message::list_messages))
        // post routes
        .route("/posts/create", post(routes::post::create_post))
        .route("/posts/list", post(routes::post::list_posts))
        // notification routes
        .route(
            "/notifications/list",
            get(routes::notification::list_notifications),
        )
        .route(
            "/notifications/mark-read",
            post(routes::notification::mark_read),
        )
        .route(
            "/notifications/mark-all-read",
            post(routes::notification::mark_all_read),
        )
        // admin routes
        .route("/admin/communities/pending", get(routes::admin::list_pending))
        .route(
            "/admin/communities/approve",
            post(routes::admin::approve_community),
        )
        .route(
            "/admin/communities/reject",
            post(routes::admin::reject_community),
        )
        .layer(axum::middleware::from_fn_with_state(
            state.clone(),
            auth_middleware,
        ));

    let router = Router::new().nest(
        &config.api_base_uri.clone(),
        Router::new().merge(public_routes).merge(protected_routes),
    );

    let router = router.layer(axum::middleware::from_fn(log_errors)).layer(
        axum::middleware::from_fn_with_state(rate_limiter, rate_limit),
    );

    #[cfg(debug_assertions)]
    let router = {
        tracing::debug!("Adding CORS layer for development mode");
        router.layer(CorsLayer::permissive())
    };

    let app = router.with_state(state.clone());

    let addr = SocketAddr::new(
        state.config.server_host.parse().unwrap_or_else(|_| {
            tracing::warn!("Invalid server_host, falling back to dual-stack default");
            IpAddr::V6(std::net::Ipv6Addr::UNSPECIFIED)
        }),
        state.config.server_port,
    );
    tracing::info!("Server listening on {}", addr);
    axum::serve(
        tokio::net::TcpListener::bind(&addr)
            .await
            .expect("Failed to bind"),
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await
    .expect("Failed to start server");
}
