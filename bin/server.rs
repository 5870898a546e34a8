// Adviser Import - Web Server
// JSON control surface for background imports

use adviser_import::logging::configure_logging;
use adviser_import::{EntityCounts, ImportConfig, ImportController, ImportError, Progress, Store};
use anyhow::{Context, Result};
use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Json, Response},
    routing::{get, post},
    Router,
};
use clap::Parser;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use tower_http::cors::CorsLayer;
use tracing::{error, info};

#[derive(Parser, Debug)]
#[command(name = "adviser-server", version, about = "HTTP control surface for adviser imports")]
struct Args {
    /// Address to listen on
    #[arg(long, default_value = "0.0.0.0:3000")]
    addr: String,

    #[arg(long, env = "ADVISER_DATABASE")]
    database: Option<PathBuf>,

    #[arg(long, env = "GEOCODER_URL")]
    geocoder_url: Option<String>,

    #[arg(long)]
    log_file: Option<PathBuf>,
}

/// Shared application state
#[derive(Clone)]
struct AppState {
    importer: Arc<ImportController>,
    db: Arc<Mutex<Store>>,
}

/// API Response wrapper
#[derive(Serialize)]
struct ApiResponse<T> {
    success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

impl<T: Serialize> ApiResponse<T> {
    fn ok(data: T) -> Response {
        Json(Self {
            success: true,
            data: Some(data),
            error: None,
        })
        .into_response()
    }
}

fn failure(status: StatusCode, message: String) -> Response {
    let body = ApiResponse::<()> {
        success: false,
        data: None,
        error: Some(message),
    };
    (status, Json(body)).into_response()
}

#[derive(Deserialize)]
struct StartRequest {
    path: PathBuf,
    #[serde(default = "default_prime")]
    prime_geocoder: bool,
}

fn default_prime() -> bool {
    true
}

/// Import status
#[derive(Serialize)]
struct ImportStatus {
    running: bool,
    progress: Progress,
}

impl ImportStatus {
    fn of(controller: &ImportController) -> Self {
        Self {
            running: controller.is_running(),
            progress: controller.progress(),
        }
    }
}

// ============================================================================
// API Handlers
// ============================================================================

/// GET /api/health - Health check
async fn health_check() -> impl IntoResponse {
    ApiResponse::ok("OK")
}

/// POST /api/import - Start an import in the background
async fn start_import(State(state): State<AppState>, Json(request): Json<StartRequest>) -> Response {
    let controller = Arc::clone(&state.importer);
    let path = request.path.clone();
    let prime = request.prime_geocoder;

    // Reading the workbook is blocking work
    let started = tokio::task::spawn_blocking(move || controller.start(&path, prime)).await;

    match started {
        Ok(Ok(())) => {
            info!(source = %request.path.display(), "Import started");
            (StatusCode::ACCEPTED, ApiResponse::ok(ImportStatus::of(&state.importer))).into_response()
        }
        Ok(Err(ImportError::AlreadyRunning)) => {
            failure(StatusCode::CONFLICT, ImportError::AlreadyRunning.to_string())
        }
        Ok(Err(e)) => failure(StatusCode::UNPROCESSABLE_ENTITY, e.to_string()),
        Err(e) => {
            error!("Error starting import: {}", e);
            failure(StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
        }
    }
}

/// GET /api/import - Progress of the current or last import
async fn import_status(State(state): State<AppState>) -> Response {
    ApiResponse::ok(ImportStatus::of(&state.importer))
}

/// POST /api/import/interrupt - Stop the current import after its current row
async fn interrupt_import(State(state): State<AppState>) -> Response {
    if state.importer.is_running() {
        info!("Interrupting importer thread");
        state.importer.interrupt();
    }
    ApiResponse::ok(ImportStatus::of(&state.importer))
}

/// GET /api/counts - Rows per table
async fn get_counts(State(state): State<AppState>) -> Response {
    let store = state.db.lock().unwrap_or_else(|e| e.into_inner());

    match store.entity_counts() {
        Ok(counts) => ApiResponse::<EntityCounts>::ok(counts),
        Err(e) => {
            error!("Error getting counts: {}", e);
            failure(StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
        }
    }
}

// ============================================================================
// Main Server
// ============================================================================

#[tokio::main]
async fn main() -> Result<()> {
    let _ = dotenvy::dotenv();
    let args = Args::parse();
    let _log_guard = configure_logging(args.log_file.as_deref());

    println!("🌐 Adviser Import - Web Server");
    println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");

    let mut config = ImportConfig::from_env();
    if let Some(database) = args.database {
        config.database = database;
    }
    if let Some(url) = args.geocoder_url {
        config.geocoder_url = url;
    }

    let store = Store::open(&config.database)
        .with_context(|| format!("Could not open {}", config.database.display()))?;
    println!("✓ Database opened: {:?}", config.database);

    let state = AppState {
        importer: Arc::new(ImportController::new(config)),
        db: Arc::new(Mutex::new(store)),
    };

    let api_routes = Router::new()
        .route("/health", get(health_check))
        .route("/import", get(import_status).post(start_import))
        .route("/import/interrupt", post(interrupt_import))
        .route("/counts", get(get_counts))
        .with_state(state.clone());

    let app = Router::new()
        .nest("/api", api_routes)
        .layer(CorsLayer::permissive());

    let listener = tokio::net::TcpListener::bind(&args.addr)
        .await
        .with_context(|| format!("Failed to bind to {}", args.addr))?;

    println!("\n🚀 Server running on http://{}", args.addr);
    println!("   Start:    POST /api/import {{\"path\": \"advisers.xlsx\"}}");
    println!("   Progress: GET  /api/import");
    println!("\n   Press Ctrl+C to stop\n");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown(state))
        .await
        .context("Server failed")?;

    Ok(())
}

/// On Ctrl-C, interrupt any running import and wait for it before exiting
async fn shutdown(state: AppState) {
    let _ = tokio::signal::ctrl_c().await;

    if state.importer.is_running() {
        println!("Interrupting importer thread");
        state.importer.interrupt();
    }
    let controller = Arc::clone(&state.importer);
    if let Ok(Err(e)) = tokio::task::spawn_blocking(move || controller.join()).await {
        error!("Import failed: {}", e);
    }
    println!("Importer stopped");
}
