//! services/web/src/bin/web.rs

use marketplace_core::notifications::NotificationList;
use marketplace_core::ports::{GeocodeProvider, SessionStore};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use web_lib::{
    adapters::{BackendClient, FileSessionStore, NominatimGeocoder, ZippopotamGeocoder},
    auth::SessionManager,
    config::Config,
    error::WebError,
    geocode::GeocodeResolver,
    notifications::{ConfiguredTokenSource, NotificationChannel},
    realtime::{RealtimeClient, RealtimeSettings},
    web::{build_router, AppState},
};

/// Push registration is retried this many times, this far apart.
const PUSH_RETRY_ATTEMPTS: u32 = 5;
const PUSH_RETRY_INTERVAL: Duration = Duration::from_secs(2);

#[tokio::main]
async fn main() -> Result<(), WebError> {
    // --- 1. Load Configuration & Set Up Logging ---
    let config = Arc::new(Config::from_env()?);
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(config.log_level.to_string()))
        .with(tracing_subscriber::fmt::layer())
        .init();
    info!("Configuration loaded. Starting server...");

    // --- 2. Initialize Service Adapters ---
    let http = reqwest::Client::builder()
        .timeout(Duration::from_secs(10))
        .build()?;
    let backend = Arc::new(BackendClient::new(http.clone(), config.api_base_url.clone()));
    let providers: Vec<Arc<dyn GeocodeProvider>> = vec![
        Arc::new(NominatimGeocoder::new(
            http.clone(),
            config.geocode_primary_url.clone(),
            config.geocode_user_agent.clone(),
        )),
        Arc::new(ZippopotamGeocoder::new(http, config.geocode_fallback_url.clone())),
    ];

    // --- 3. Restore the Stored Session ---
    let store: Arc<dyn SessionStore> = Arc::new(FileSessionStore::new(config.session_store_path.clone()));
    let sessions = SessionManager::new(store, backend.clone());
    let shutdown = CancellationToken::new();
    let notifications = Arc::new(Mutex::new(NotificationList::new()));
    let realtime = Arc::new(RealtimeClient::new(
        RealtimeSettings::from(config.as_ref()),
        notifications.clone(),
    ));

    let restored = match sessions.restore().await {
        Ok(Some(stored)) => match sessions.refresh_user().await {
            Ok(fresh) => fresh,
            Err(e) => {
                warn!("Could not refresh the stored user, keeping it: {}", e);
                Some(stored)
            }
        },
        Ok(None) => None,
        Err(e) => {
            warn!("Could not read the stored session: {}", e);
            None
        }
    };

    match restored {
        Some(session) => {
            info!("Restored session for {}", session.user.email);
            realtime.connect(Some(&session.token)).await;

            let channel = Arc::new(NotificationChannel::new(
                Arc::new(ConfiguredTokenSource::new(config.push_device_token.clone())),
                backend.clone(),
                notifications,
            ));
            let cancel = shutdown.clone();
            tokio::spawn(async move {
                channel
                    .initialize_with_retry(&session.token, PUSH_RETRY_ATTEMPTS, PUSH_RETRY_INTERVAL, &cancel)
                    .await;
            });
        }
        None => info!("No signed-in session; realtime stays offline until sign-in."),
    }

    // --- 4. Build the Shared AppState & Router ---
    let app_state = Arc::new(AppState {
        config: config.clone(),
        geocoder: GeocodeResolver::new(providers),
    });
    let app = build_router(app_state)?;

    // --- 5. Start the Server ---
    info!("Starting server on {}", config.bind_address);
    info!(
        "Swagger UI available at http://{}/swagger-ui",
        config.bind_address
    );
    let listener = tokio::net::TcpListener::bind(&config.bind_address).await?;
    let signal = shutdown.clone();
    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            if let Err(e) = tokio::signal::ctrl_c().await {
                warn!("Failed to listen for shutdown signal: {}", e);
            }
            signal.cancel();
        })
        .await?;

    shutdown.cancel();
    realtime.disconnect().await;
    info!("Server stopped.");
    Ok(())
}
