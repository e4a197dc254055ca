//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Create Axum Router with all handlers
//! - Register one upgrade route per relay prefix
//! - Wire up middleware (tracing, request ID, limits, timeout, gate)
//! - Serve until the shutdown signal fires
//!
//! # Middleware Order
//! ```text
//! SetRequestId → Trace → PropagateRequestId → BodyLimit → Gate → handler
//! ```
//!
//! `TimeoutLayer` wraps only the fixed and admin routes. OpenAI handlers bound
//! their upstream calls themselves so a slow upstream still gets a
//! policy-shaped reply.

use std::sync::Arc;
use std::time::Instant;

use axum::{
    extract::DefaultBodyLimit,
    middleware,
    routing::{any, get, post},
    Router,
};
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tower_http::{
    limit::RequestBodyLimitLayer,
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};

use crate::admin;
use crate::config::{Credentials, GatewayConfig};
use crate::http::{handlers, openai, websocket};
use crate::relay::{RelaySettings, SessionTracker, TungsteniteConnector};
use crate::resilience::{timeouts::Deadlines, DegradationPolicy};
use crate::routing::RouteTable;
use crate::security::{gate_middleware, GateState, StaticTokens};
use crate::upstream::OpenAiClient;

/// Application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<GatewayConfig>,
    pub credentials: Arc<Credentials>,
    pub routes: Arc<RouteTable>,
    pub connector: Arc<TungsteniteConnector>,
    pub relay_settings: RelaySettings,
    pub sessions: SessionTracker,
    pub openai: OpenAiClient,
    pub policy: Arc<DegradationPolicy>,
    pub started_at: Instant,
}

impl AppState {
    pub fn new(config: GatewayConfig, credentials: Credentials) -> Result<Self, reqwest::Error> {
        let deadlines = Deadlines::from(&config.timeouts);
        let openai = OpenAiClient::new(&config.openai, &deadlines, &credentials)?;

        Ok(Self {
            routes: Arc::new(RouteTable::from_config(&config.relay.routes)),
            connector: Arc::new(TungsteniteConnector),
            relay_settings: RelaySettings::from_config(&config.timeouts, &config.relay),
            sessions: SessionTracker::new(),
            policy: Arc::new(DegradationPolicy::new(config.degradation.clone())),
            credentials: Arc::new(credentials),
            config: Arc::new(config),
            openai,
            started_at: Instant::now(),
        })
    }
}

/// HTTP server for the gateway.
pub struct HttpServer {
    router: Router,
    state: AppState,
}

impl HttpServer {
    /// Create a new HTTP server with the given configuration.
    pub fn new(config: GatewayConfig, credentials: Credentials) -> Result<Self, reqwest::Error> {
        let state = AppState::new(config, credentials)?;
        let router = Self::build_router(state.clone());
        Ok(Self { router, state })
    }

    /// Build the Axum router with all middleware layers.
    #[allow(deprecated)]
    fn build_router(state: AppState) -> Router {
        let config = state.config.clone();
        let deadlines = Deadlines::from(&config.timeouts);

        let gate = GateState {
            routes: state.routes.clone(),
            verifier: Arc::new(StaticTokens::new(config.auth.tokens.clone())),
            auth_enabled: config.auth.enabled,
            cookie_name: config.auth.cookie_name.clone(),
        };

        let mut fixed = Router::new()
            .route("/health", get(handlers::health))
            .route("/app/jwt/get", get(handlers::jwt_stub))
            .route("/gtts/", post(handlers::gtts_unavailable));
        if config.admin.enabled {
            fixed = fixed.merge(admin::router(state.clone()));
        }

        let mut router = Router::new()
            .merge(fixed.layer(TimeoutLayer::new(deadlines.request)))
            .route("/openai/v1/chat/completions", post(openai::chat_completions))
            .route("/openai/v1/moderations", post(openai::moderations))
            .route("/openai/v1/audio/transcriptions", post(openai::transcriptions));

        for route in state.routes.relays() {
            let path = format!("{}{{*path}}", route.prefix);
            tracing::debug!(route = %route.name, path = %path, "Registering relay route");
            router = router
                .route(&route.prefix, any(websocket::relay_handler))
                .route(&path, any(websocket::relay_handler));
        }

        router
            .fallback(handlers::not_found)
            .with_state(state)
            .layer(middleware::from_fn_with_state(gate, gate_middleware))
            .layer(DefaultBodyLimit::disable())
            .layer(RequestBodyLimitLayer::new(config.listener.max_body_bytes))
            .layer(PropagateRequestIdLayer::x_request_id())
            .layer(TraceLayer::new_for_http())
            .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
    }

    /// Run the server until `shutdown` fires.
    ///
    /// Open relay sessions are not awaited: once the listener stops, their
    /// tasks end with the runtime.
    pub async fn run(self, listener: TcpListener, mut shutdown: broadcast::Receiver<()>) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(
            address = %addr,
            relay_routes = self.state.routes.relays().count(),
            "HTTP server starting"
        );

        axum::serve(listener, self.router)
            .with_graceful_shutdown(async move {
                let _ = shutdown.recv().await;
                tracing::info!("HTTP server draining");
            })
            .await?;

        tracing::info!(sessions_served = self.state.sessions.total(), "HTTP server stopped");
        Ok(())
    }

    pub fn state(&self) -> &AppState {
        &self.state
    }

    /// Get a reference to the config.
    pub fn config(&self) -> &GatewayConfig {
        &self.state.config
    }
}
