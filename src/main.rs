use actix_cors::Cors;
use actix_web::{middleware::Compress, App, HttpServer};
use utoipa_swagger_ui::SwaggerUi;

mod auth;
mod error;
mod geocode;
mod models;
mod openapi;
mod rate_limit;
mod repo;
mod routes;
mod security;
mod stats;
mod storage;

use openapi::ApiDoc;
use rate_limit::{InMemoryRateLimiter, RateLimitConfig, RateLimiterFacade};
#[cfg(all(feature = "inmem-store", not(feature = "postgres-store")))]
use repo::inmem::InMemRepo;
use routes::{config, AppState};
use security::SecurityHeaders;
use storage::build_photo_store;
use utoipa::OpenApi; // bring trait into scope for ApiDoc::openapi()

use std::sync::Arc;
use tracing::{info, Level};
use tracing_actix_web::TracingLogger;
use tracing_subscriber::EnvFilter;

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    // Environment variables must be set externally (shell, systemd, Docker, etc.)
    // Load .env automatically only in debug builds to reduce manual setup overhead.
    if cfg!(debug_assertions) {
        let _ = dotenv::dotenv();
    }

    validate_env_vars();

    // Structured logging initialisation
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive(Level::INFO.into()))
        .init();

    info!("Bootstrapping PetaFF server");
    info!(
        "Geocoder configured: {}",
        std::env::var("GEOCODER_API_KEY").is_ok()
    );

    #[cfg(all(feature = "inmem-store", not(feature = "postgres-store")))]
    let repo = InMemRepo::new();
    #[cfg(all(feature = "inmem-store", not(feature = "postgres-store")))]
    info!("Using in-memory repository backend");

    #[cfg(feature = "postgres-store")]
    let repo = {
        use sqlx::postgres::PgPoolOptions;
        let db_url =
            std::env::var("DATABASE_URL").expect("DATABASE_URL must be set for postgres-store");
        let pool = PgPoolOptions::new()
            .max_connections(5)
            .connect(&db_url)
            .await
            .expect("Failed to create Pg pool");
        let repo = repo::pg::PgRepo::new(pool);
        repo.migrate().await.expect("Failed to run migrations");
        info!("Using Postgres repository backend");
        repo
    };

    let openapi = ApiDoc::openapi();
    let photo_store = build_photo_store();
    let geocoder = geocode::build_geocoder();
    let limiter = RateLimiterFacade::new(
        InMemoryRateLimiter::new(
            std::env::var("RATE_LIMIT_ENABLED").map(|v| v != "0").unwrap_or(true),
        ),
        RateLimitConfig::from_env(),
    );
    info!("OpenAPI spec generated");

    let server = HttpServer::new(move || {
        let cors = {
            let mut c = Cors::default()
                // local dev frontend ports
                .allowed_origin("http://localhost:5173")
                .allowed_origin("http://127.0.0.1:5173")
                .allowed_origin("http://localhost:3000")
                .allowed_origin("http://127.0.0.1:3000")
                .allow_any_header()
                .allowed_methods(["GET", "POST", "PUT", "DELETE", "OPTIONS"])
                .supports_credentials()
                .max_age(3600);
            if let Ok(front) = std::env::var("FRONTEND_URL") {
                c = c.allowed_origin(&front);
            }
            c
        };

        App::new()
            .wrap(TracingLogger::default())
            .wrap(Compress::default())
            .wrap(SecurityHeaders::from_env())
            .wrap(cors)
            .configure(config)
            .service(SwaggerUi::new("/docs").url("/docs/openapi.json", openapi.clone()))
            .app_data(actix_web::web::Data::new(AppState {
                repo: Arc::new(repo.clone()),
                photo_store: photo_store.clone(),
                geocoder: geocoder.clone(),
                limiter: limiter.clone(),
            }))
    })
    .bind(("0.0.0.0", 8080))?;

    info!("Listening on http://0.0.0.0:8080 (all interfaces)");

    server.run().await
}

/// Validate that required environment variables are set
fn validate_env_vars() {
    use std::env;

    let required = vec!["JWT_SECRET"];

    let mut missing = Vec::new();
    for var in required {
        if env::var(var).is_err() {
            missing.push(var);
        }
    }

    if !missing.is_empty() {
        eprintln!("Missing required environment variables: {:?}", missing);
        eprintln!("Please copy .env.example to .env and configure it");
        std::process::exit(1);
    }

    if let Ok(secret) = env::var("JWT_SECRET") {
        if secret.len() < 32 {
            eprintln!("JWT_SECRET must be at least 32 characters long for security");
            std::process::exit(1);
        }
    }

    if env::var("GEOCODER_API_KEY").is_err() {
        eprintln!("Warning: geocoder not configured (GEOCODER_API_KEY missing)");
        eprintln!("New ads will be saved without coordinates");
    }
}
