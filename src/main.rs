use std::net::SocketAddr;
use std::sync::Arc;

use axum::extract::DefaultBodyLimit;
use axum::routing::get;
use chrono::Duration;
use clap::Parser;
use tower_http::cors::CorsLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod access;
mod api;
mod cli;
mod config;
mod errors;
mod jobs;
mod models;
mod qr;
mod secret;
mod store;

use access::AccessTokenService;
use store::postgres::PgStore;

/// Shared application state passed to handlers.
pub struct AppState {
    pub db: PgStore,
    pub access: AccessTokenService,
    pub config: config::Config,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG")
                .unwrap_or_else(|_| "sataplan=debug,tower_http=debug".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cfg = config::load()?;
    let args = cli::Cli::parse();

    let result = match args.command {
        Some(cli::Commands::Serve { port }) => run_server(cfg, port).await,
        Some(cli::Commands::Token { command }) => {
            let db = PgStore::connect(&cfg.database_url).await?;
            let store = Arc::new(db);
            let access = AccessTokenService::new(store.clone(), store);
            handle_token_command(command, &access).await
        }
        None => {
            let port = cfg.port;
            run_server(cfg, port).await
        }
    };

    if let Err(ref e) = result {
        eprintln!("Error: {:?}", e);
    }
    result
}

async fn run_server(cfg: config::Config, port: u16) -> anyhow::Result<()> {
    tracing::info!("Connecting to database...");
    let db = PgStore::connect(&cfg.database_url).await?;

    tracing::info!("Running migrations...");
    db.migrate().await?;

    let store = Arc::new(db.clone());
    let access = AccessTokenService::new(store.clone(), store);

    let state = Arc::new(AppState {
        db,
        access,
        config: cfg,
    });

    let app = axum::Router::new()
        .route("/health", get(api::handlers::health))
        .route("/readyz", get(readiness_check))
        .nest("/api/v1", api::api_router())
        .with_state(state.clone())
        // QR payloads are tiny; nothing legitimate needs more than 1 MB
        .layer(DefaultBodyLimit::max(1024 * 1024))
        .layer(tower_http::compression::CompressionLayer::new())
        .layer(tower_http::trace::TraceLayer::new_for_http())
        .layer(cors_layer(&state.config))
        .layer(axum::middleware::from_fn(request_id_middleware))
        .layer(axum::middleware::from_fn(security_headers_middleware));

    jobs::cleanup::spawn(
        state.db.pool().clone(),
        state.config.token_retention_hours,
    );
    tracing::info!("Background token cleanup started (hourly)");

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!("Sataplan backend listening on {}", addr);
    axum::serve(listener, app).await?;

    Ok(())
}

fn cors_layer(cfg: &config::Config) -> CorsLayer {
    use axum::http::{HeaderName, Method};
    use tower_http::cors::AllowOrigin;

    let allowed = cfg.cors_allow_origins.clone();
    CorsLayer::new()
        .allow_origin(AllowOrigin::predicate(move |origin, _| {
            let origin_str = origin.to_str().unwrap_or("");
            allowed.iter().any(|o| o == origin_str)
                || origin_str.starts_with("http://localhost:")
                || origin_str.starts_with("http://127.0.0.1:")
        }))
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PATCH,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([
            HeaderName::from_static("content-type"),
            HeaderName::from_static("x-request-id"),
        ])
        .allow_credentials(true)
}

/// Middleware: injects a unique X-Request-Id into every response so
/// clients can correlate errors with server logs.
async fn request_id_middleware(
    req: axum::extract::Request,
    next: axum::middleware::Next,
) -> axum::response::Response {
    let req_id = uuid::Uuid::new_v4().to_string();
    let mut resp = next.run(req).await;
    if let Ok(val) = axum::http::HeaderValue::from_str(&req_id) {
        resp.headers_mut().insert("x-request-id", val);
    }
    resp
}

async fn readiness_check() -> &'static str {
    "ok"
}

/// Middleware: security headers on every response. Access secrets and
/// token ids pass through this API, so responses must never be cached
/// and referrers must not leak token-bearing URLs.
async fn security_headers_middleware(
    req: axum::extract::Request,
    next: axum::middleware::Next,
) -> axum::response::Response {
    let mut resp = next.run(req).await;
    let headers = resp.headers_mut();

    headers.insert("X-Content-Type-Options", "nosniff".parse().unwrap());
    headers.insert("X-Frame-Options", "DENY".parse().unwrap());
    headers.insert("Cache-Control", "no-store".parse().unwrap());
    headers.insert("Referrer-Policy", "no-referrer".parse().unwrap());
    headers.remove("Server");

    resp
}

async fn handle_token_command(
    cmd: cli::TokenCommands,
    access: &AccessTokenService,
) -> anyhow::Result<()> {
    match cmd {
        cli::TokenCommands::Issue { goal_id, ttl_secs } => {
            let ttl = ttl_secs.map(Duration::seconds);
            match access.generate(goal_id, ttl).await {
                Ok(token) => {
                    println!("Token issued:");
                    println!("  ID:      {}", token.token_id);
                    println!("  Goal:    {}", token.goal_id);
                    match token.expires_at {
                        Some(at) => println!("  Expires: {}", at.to_rfc3339()),
                        None => println!("  Expires: never (single use only)"),
                    }
                }
                Err(errors::AppError::GoalNotFound) => {
                    println!("Goal {} not found.", goal_id);
                }
                Err(e) => return Err(e.into()),
            }
        }
        cli::TokenCommands::List { goal_id } => {
            match access.list_for_goal(goal_id).await {
                Ok(tokens) if tokens.is_empty() => println!("No tokens found."),
                Ok(tokens) => {
                    println!("{:<44} {:<10} {:<28}", "ID", "USED", "EXPIRES");
                    for t in tokens {
                        let expires = t
                            .expires_at
                            .map(|at| at.to_rfc3339())
                            .unwrap_or_else(|| "-".into());
                        println!("{:<44} {:<10} {:<28}", t.token_id, t.consumed, expires);
                    }
                }
                Err(errors::AppError::GoalNotFound) => {
                    println!("Goal {} not found.", goal_id);
                }
                Err(e) => return Err(e.into()),
            }
        }
        cli::TokenCommands::Revoke { token_id } => match access.revoke(&token_id).await {
            Ok(()) => println!("Token revoked."),
            Err(errors::AppError::TokenNotFound) => println!("Token not found."),
            Err(errors::AppError::AlreadyUsed) => {
                println!("Token was already used or revoked.")
            }
            Err(e) => return Err(e.into()),
        },
    }
    Ok(())
}
