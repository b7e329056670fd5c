//! Dennis is a chat bot keeping track of personal expenses, encrypted with
//! a key only each user can unlock.

#![forbid(unsafe_code)]
mod actions;
mod cache;
mod clock;
mod conversation;
mod crypto;
mod database;
mod expense;
mod nlu;
mod parser;
mod rates;
mod retry;
mod router;
mod telegram;
mod user;

pub mod config;
pub mod error;
pub mod telemetry;

#[cfg(test)]
mod testing;

use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use axum::body::Bytes;
use axum::extract::{MatchedPath, Request};
use axum::http::{StatusCode, header};
use axum::middleware as AxumMiddleware;
use axum::routing::{get, post};
use metrics_exporter_prometheus::PrometheusHandle;
use tower::ServiceBuilder;
use tower_http::LatencyUnit;
use tower_http::sensitive_headers::SetSensitiveHeadersLayer;
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::{DefaultOnRequest, DefaultOnResponse, TraceLayer};

use crate::actions::Actions;
use crate::cache::{Cache, MemoryCache, RedisCache};
use crate::clock::SystemClock;
use crate::conversation::{Bot, MessageCatalog};
use crate::expense::{ExpenseService, PostgresExpenseRepository};
use crate::nlu::WitClient;
use crate::rates::AlphaVantageClient;
use crate::telegram::{Messenger, TelegramClient};
use crate::user::{
    PostgresSettingRepository, PostgresUserRepository, SettingService, UserService,
};

/// State sharing between routes.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<config::Configuration>,
    pub bot: Arc<Bot>,
    pub messenger: Arc<dyn Messenger>,
    /// Absent when no recorder is installed.
    pub metrics: Option<PrometheusHandle>,
}

impl AppState {
    /// Attach the Prometheus handle served on `/metrics`.
    pub fn metrics(mut self, handle: PrometheusHandle) -> Self {
        self.metrics = Some(handle);
        self
    }
}

/// Span named after the matched route, so the bot token never reaches logs.
fn request_span(req: &Request) -> tracing::Span {
    let path = req
        .extensions()
        .get::<MatchedPath>()
        .map_or("unmatched", MatchedPath::as_str);

    tracing::info_span!("request", method = %req.method(), path)
}

/// Create router.
pub fn app(state: AppState) -> Router {
    // Remove sensitive headers from trace.
    let middleware = ServiceBuilder::new().layer(SetSensitiveHeadersLayer::new([
        header::AUTHORIZATION,
        header::COOKIE,
    ]));

    let status = Router::new()
        // `GET /healthcheck` goes to `healthcheck`.
        .route("/healthcheck", get(router::status::healthcheck))
        .route("/metrics", get(router::status::metrics))
        // Set a timeout.
        .route_layer(TimeoutLayer::with_status_code(
            StatusCode::REQUEST_TIMEOUT,
            Duration::from_secs(10),
        ));

    // No timeout here: Telegram always gets `200 received`, however slow
    // the bot is.
    let webhook = Router::new()
        // `POST /<bot-token>` goes to the webhook.
        .route("/{token}", post(router::webhook::handler));

    Router::new()
        .merge(status)
        .merge(webhook)
        .route_layer(
            TraceLayer::new_for_http()
                .on_body_chunk(|chunk: &Bytes, latency: Duration, _span: &tracing::Span| {
                    tracing::trace!(size_bytes = chunk.len(), latency = ?latency, "sending body chunk")
                })
                .make_span_with(request_span)
                .on_request(DefaultOnRequest::new())
                .on_response(DefaultOnResponse::new().latency_unit(LatencyUnit::Micros)),
        )
        .route_layer(AxumMiddleware::from_fn(telemetry::track))
        .with_state(state)
        .layer(middleware)
}

/// Initialize the application state.
pub async fn initialize_state() -> Result<AppState, Box<dyn std::error::Error>> {
    // read configuration file. let it in memory.
    let config = config::Configuration::default().read()?;

    let (Some(postgres), Some(telegram)) = (&config.postgres, &config.telegram) else {
        tracing::error!("missing `postgres` or `telegram` entry on configuration file");
        std::process::exit(1);
    };
    let (Some(wit), Some(alphavantage)) = (&config.wit, &config.alphavantage) else {
        tracing::error!("missing `wit` or `alphavantage` entry on configuration file");
        std::process::exit(1);
    };
    if config.secret_key.is_empty() {
        tracing::warn!("`secret_key` is empty, cached passwords are weakly protected");
    }

    let db = database::Database::new(postgres).await?;
    // execute migrations scripts on start.
    db.migrate().await?;

    let cache: Arc<dyn Cache> = match &config.redis {
        Some(redis) => Arc::new(RedisCache::new(redis).await?),
        None => {
            tracing::warn!("no `redis` entry, conversations are kept in memory");
            Arc::new(MemoryCache::default())
        },
    };

    let crypto = Arc::new(crypto::Crypto::new(
        config.argon2.clone(),
        &config.secret_key,
        config.rsa_bits,
    )?);

    let clock = Arc::new(SystemClock);
    let actions = Arc::new(Actions::new(
        UserService::new(
            Arc::new(PostgresUserRepository::new(db.postgres.clone())),
            Arc::clone(&crypto),
        ),
        SettingService::new(Arc::new(PostgresSettingRepository::new(
            db.postgres.clone(),
        ))),
        ExpenseService::new(
            Arc::new(PostgresExpenseRepository::new(db.postgres.clone())),
            clock.clone(),
        ),
        Arc::clone(&cache),
        Arc::new(AlphaVantageClient::new(alphavantage.clone())?),
        clock,
    ));

    let bot = Arc::new(Bot::new(
        actions,
        cache,
        crypto,
        Arc::new(WitClient::new(wit.clone())?),
        Arc::new(MessageCatalog::default()),
    ));

    let messenger = TelegramClient::new(telegram.clone())?;
    messenger.set_webhook().await?;

    Ok(AppState {
        config,
        bot,
        messenger: Arc::new(messenger),
        metrics: None,
    })
}
