//! Status REST API
//!
//! A small read-only service exposing the most recently published
//! collection date. Consumers poll `/api/bin-collection` instead of
//! subscribing to a push integration.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::{
    extract::State,
    http::StatusCode,
    response::IntoResponse,
    routing::get,
    Json, Router,
};
use chrono::{Local, NaiveDate};
use serde::Serialize;
use tokio::net::TcpListener;
use tokio::sync::RwLock;
use tracing::{error, info};

use crate::models::CollectionAttributes;

// ============================================================================
// Response Types
// ============================================================================

/// Wire form of the published collection date
#[derive(Debug, Serialize)]
pub struct CollectionResponse {
    pub date: String,
    pub day_of_week: String,
    pub days_until: i64,
    pub last_update: String,
}

impl CollectionResponse {
    /// View of the stored attributes with `days_until` measured from
    /// `today` instead of the publish-time value
    fn new(attrs: &CollectionAttributes, today: NaiveDate) -> Self {
        Self {
            date: attrs.date_string(),
            day_of_week: attrs.day_of_week.clone(),
            days_until: (attrs.date - today).num_days(),
            last_update: attrs.last_update.to_rfc3339(),
        }
    }
}

#[derive(Debug, Serialize)]
struct ErrorResponse {
    error: String,
}

#[derive(Debug, Serialize)]
struct HealthResponse {
    status: String,
    service: String,
    version: String,
}

// ============================================================================
// Status Handle
// ============================================================================

/// Shared handle the fan-out writes through and handlers read from
#[derive(Clone, Default)]
pub struct StatusHandle {
    current: Arc<RwLock<Option<CollectionAttributes>>>,
    addr: Option<SocketAddr>,
}

impl StatusHandle {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the published attributes
    pub async fn update(&self, attrs: &CollectionAttributes) {
        let mut current = self.current.write().await;
        *current = Some(attrs.clone());
    }

    /// The currently published attributes, if any
    pub async fn current(&self) -> Option<CollectionAttributes> {
        self.current.read().await.clone()
    }

    /// Bound address once the server is listening
    pub fn addr(&self) -> Option<SocketAddr> {
        self.addr
    }
}

// ============================================================================
// Handlers
// ============================================================================

fn router(handle: StatusHandle) -> Router {
    Router::new()
        .route("/api/bin-collection", get(get_collection))
        .route("/api/health", get(health_check))
        .with_state(handle)
        .layer(
            tower_http::cors::CorsLayer::new()
                .allow_origin(tower_http::cors::Any)
                .allow_methods(tower_http::cors::Any)
                .allow_headers(tower_http::cors::Any),
        )
        .layer(tower_http::trace::TraceLayer::new_for_http())
}

/// Current collection date, 404 until the first publish
///
/// The countdown is taken from the clock at request time, so a date
/// published before midnight still serves the right `days_until` after.
async fn get_collection(State(handle): State<StatusHandle>) -> impl IntoResponse {
    match handle.current().await {
        Some(attrs) => {
            let today = Local::now().date_naive();
            (StatusCode::OK, Json(CollectionResponse::new(&attrs, today))).into_response()
        }
        None => (
            StatusCode::NOT_FOUND,
            Json(ErrorResponse {
                error: "No bin collection date available".to_string(),
            }),
        )
            .into_response(),
    }
}

async fn health_check() -> impl IntoResponse {
    Json(HealthResponse {
        status: "ok".to_string(),
        service: "binday-api".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

// ============================================================================
// Status Server
// ============================================================================

/// Bound but not yet serving status API
pub struct StatusServer {
    listener: TcpListener,
    handle: StatusHandle,
}

impl StatusServer {
    /// Bind the listen socket; the handle returned by [`Self::handle`] is
    /// live immediately even though serving has not started
    pub async fn bind(host: &str, port: u16) -> std::io::Result<Self> {
        let listener = TcpListener::bind((host, port)).await?;
        let addr = listener.local_addr()?;
        info!(%addr, "status API listening");
        let handle = StatusHandle {
            current: Arc::new(RwLock::new(None)),
            addr: Some(addr),
        };
        Ok(Self { listener, handle })
    }

    pub fn handle(&self) -> StatusHandle {
        self.handle.clone()
    }

    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    /// Serve until the process exits
    pub async fn serve(self) -> std::io::Result<()> {
        axum::serve(self.listener, router(self.handle)).await
    }

    /// Serve until the shutdown future resolves
    pub async fn serve_with_shutdown(
        self,
        shutdown: impl std::future::Future<Output = ()> + Send + 'static,
    ) -> std::io::Result<()> {
        axum::serve(self.listener, router(self.handle))
            .with_graceful_shutdown(shutdown)
            .await
    }

    /// Serve on a background task, returning the shared handle
    pub fn spawn(self) -> StatusHandle {
        let handle = self.handle();
        tokio::spawn(async move {
            if let Err(e) = self.serve().await {
                error!(error = %e, "status API exited");
            }
        });
        handle
    }
}

// ============================================================================
// Tests
// ============================================================================
