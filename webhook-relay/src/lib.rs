//! Assigns newly created Sentry issues to a default owner per project.
//!
//! Sentry calls `POST /events` through a webhook for every new issue. The
//! project slug from the payload is looked up in a static
//! [`AssignmentMap`](assignments::AssignmentMap) and the issue is assigned
//! through the Sentry web API. `POST /fire` sends a test event to Sentry so
//! the whole loop can be exercised by hand.

pub mod assignments;
pub mod capture;
pub mod config;
pub mod errors;
pub mod protocol;
pub mod service;
pub mod tracker;

#[cfg(test)]
mod testutils;

use capture::EventCapture;
use config::{ANY_HOST_V4, Config, Listener};
use errors::RelayError;
use service::RelayService;
use shared::http::run_http_service;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracker::TrackerClient;

/// Binds the configured listener and serves until the listener fails.
pub async fn run(config: Config, capture: Arc<dyn EventCapture>) -> Result<(), RelayError> {
    let listener = bind(&config.listener).await?;
    serve(listener, config, capture).await
}

/// Binds `listener`. The all-interfaces host falls back to IPv4 only when
/// IPv6 cannot be bound.
pub async fn bind(listener: &Listener) -> std::io::Result<TcpListener> {
    match TcpListener::bind(listener.to_string()).await {
        Err(e) if listener.is_any_host() => {
            tracing::warn!(error = %e, "cannot bind IPv6, falling back to IPv4");
            TcpListener::bind((ANY_HOST_V4, listener.port)).await
        }
        result => result,
    }
}

/// Serves the relay on an already bound listener.
pub async fn serve(
    listener: TcpListener,
    config: Config,
    capture: Arc<dyn EventCapture>,
) -> Result<(), RelayError> {
    let tracker = TrackerClient::new(config.api_base, config.api_token);
    let service = RelayService::new(config.assignments, tracker, capture);

    tracing::info!("Listening on {}...", listener.local_addr()?);
    run_http_service(listener, service).await
}
