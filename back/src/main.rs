mod config;
mod error;
mod notify;
mod store;
mod summary;
mod v1;

use std::{net::SocketAddr, sync::Arc};

use axum::{routing::get, Router};
use axum_server::tls_rustls::RustlsConfig;
use clap::Parser;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::{
    config::Config,
    notify::{SlackWebhook, UnconfiguredWebhook, Webhook},
    store::{LocalStore, MongoStore, TodoStore, UnavailableStore},
    summary::{CohereGenerator, TextGenerator, UnconfiguredGenerator},
};

#[tokio::main]
async fn main() -> eyre::Result<()> {
    color_eyre::install()?;
    dotenvy::dotenv().ok();
    let config = Config::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let state = Arc::new(AppState {
        store: open_store(&config).await,
        generator: text_generator(&config)?,
        webhook: webhook(&config)?,
    });

    let addr = SocketAddr::from(([0; 4], config.port));
    let app = app(state);

    match (&config.tls_cert, &config.tls_key) {
        (Some(cert), Some(key)) => {
            // reqwest pulls in ring as well, so the server provider has to be chosen explicitly
            let _ = rustls::crypto::aws_lc_rs::default_provider().install_default();
            let tls = RustlsConfig::from_pem_file(cert, key).await?;
            tracing::info!(%addr, "listening with tls");

            axum_server::bind_rustls(addr, tls)
                .serve(app.into_make_service())
                .await?;
        }
        _ => {
            tracing::info!(%addr, "listening");

            axum_server::bind(addr)
                .serve(app.into_make_service())
                .await?;
        }
    }

    Ok(())
}

pub struct AppState {
    pub store: Arc<dyn TodoStore>,
    pub generator: Arc<dyn TextGenerator>,
    pub webhook: Arc<dyn Webhook>,
}

pub fn app(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(v1::health))
        .nest("/api", v1::router())
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Never fails: a store that cannot be opened is logged and replaced by one
/// that rejects every request.
async fn open_store(config: &Config) -> Arc<dyn TodoStore> {
    if let Some(uri) = &config.mongodb_uri {
        return match MongoStore::connect(uri, &config.database).await {
            Ok(store) => {
                tokio::spawn({
                    let store = store.clone();
                    async move {
                        match store.ping().await {
                            Ok(()) => tracing::info!("connected to mongodb"),
                            Err(err) => tracing::error!("failed to connect to mongodb: {}", err),
                        }
                    }
                });

                Arc::new(store)
            }
            Err(err) => {
                tracing::error!("failed to connect to mongodb: {}", err);
                Arc::new(UnavailableStore::new(err.to_string()))
            }
        };
    }

    match LocalStore::open(&config.data_file) {
        Ok(store) => {
            tracing::info!(path = %config.data_file.display(), "using local data file");
            Arc::new(store)
        }
        Err(err) => {
            tracing::error!(path = %config.data_file.display(), "failed to load data: {:?}", err);
            Arc::new(UnavailableStore::new(err.to_string()))
        }
    }
}

fn text_generator(config: &Config) -> eyre::Result<Arc<dyn TextGenerator>> {
    let Some(api_key) = &config.cohere_api_key else {
        tracing::warn!("COHERE_API_KEY is not set, summaries of pending todos will fail");
        return Ok(Arc::new(UnconfiguredGenerator));
    };

    let generator = CohereGenerator::new(api_key.clone(), config.cohere_model.clone())?;
    Ok(Arc::new(generator))
}

fn webhook(config: &Config) -> eyre::Result<Arc<dyn Webhook>> {
    let Some(url) = &config.slack_webhook_url else {
        tracing::warn!("SLACK_WEBHOOK_URL is not set, sending summaries will fail");
        return Ok(Arc::new(UnconfiguredWebhook));
    };

    Ok(Arc::new(SlackWebhook::new(url.clone())?))
}
