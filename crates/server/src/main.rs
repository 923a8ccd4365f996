//! Server entry point
//!
//! Startup is a single blocking load phase: read configuration, load and
//! normalize the corpus, embed and index it, then serve. Any failure in
//! the load phase is fatal; once serving starts the state never changes.

use std::net::SocketAddr;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, Layer};

use quote_rag_config::{load_settings, Settings};
use quote_rag_retrieval::{
    CorpusLoader, CrossEncoderReranker, Embedder, EmbeddingConfig, Retriever, RetrieverConfig,
    RerankerConfig,
};
use quote_rag_server::{create_router, AppState};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Priority: env vars > config/{env} > config/default > defaults.
    // Missing config files fall through to defaults; a file that exists
    // but fails to parse or validate aborts startup.
    let env = std::env::var("QUOTE_RAG_ENV").ok();
    let settings = load_settings(env.as_deref()).map_err(|e| {
        // Tracing not yet initialized, use eprintln for early logging
        eprintln!("Failed to load configuration: {}", e);
        e
    })?;

    init_tracing(&settings);

    tracing::info!("Starting quote retrieval server v{}", env!("CARGO_PKG_VERSION"));
    tracing::info!(
        environment = env.as_deref().unwrap_or("default"),
        corpus = %settings.corpus.path,
        reranking = settings.retrieval.reranking_enabled,
        "Configuration loaded"
    );

    let settings = Arc::new(settings);
    let state = build_state(settings.clone())?;

    let app = create_router(state);

    let addr = SocketAddr::from(([0, 0, 0, 0], settings.server.port));
    tracing::info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("Server shutdown complete");
    Ok(())
}

/// Load the corpus, build the index, and assemble application state
fn build_state(settings: Arc<Settings>) -> Result<AppState, Box<dyn std::error::Error>> {
    let corpus = Arc::new(CorpusLoader::new(&settings.corpus.path).load()?);

    let embedding_config = EmbeddingConfig {
        embedding_dim: settings.retrieval.embedding_dim,
        ..EmbeddingConfig::default()
    };
    let embedder = Embedder::new(
        &settings.models.embedder,
        &settings.models.embedder_tokenizer,
        embedding_config,
    )?;

    let reranker = if settings.retrieval.reranking_enabled {
        Some(CrossEncoderReranker::new(
            &settings.models.reranker,
            &settings.models.reranker_tokenizer,
            RerankerConfig::default(),
        )?)
    } else {
        None
    };

    let retriever_config = RetrieverConfig {
        default_top_k: settings.retrieval.top_k,
        vector_width: settings.retrieval.vector_width,
        rerank_width: settings.retrieval.rerank_width,
        reranking_enabled: settings.retrieval.reranking_enabled,
        score_transform: settings.retrieval.score_transform,
        max_context_chars: settings.retrieval.max_context_chars,
    };
    let retriever = Arc::new(Retriever::new(
        corpus.clone(),
        embedder,
        reranker,
        retriever_config,
    )?);

    Ok(AppState::new(settings, corpus, retriever))
}

/// Wait for shutdown signal (Ctrl+C or SIGTERM)
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received Ctrl+C, initiating graceful shutdown...");
        }
        _ = terminate => {
            tracing::info!("Received SIGTERM, initiating graceful shutdown...");
        }
    }
}

/// Initialize tracing from configuration
fn init_tracing(settings: &Settings) {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        let level = &settings.observability.log_level;
        format!("quote_rag={},tower_http=debug", level).into()
    });

    let subscriber = tracing_subscriber::registry().with(env_filter);
    let fmt_layer = if settings.observability.log_json {
        tracing_subscriber::fmt::layer().json().boxed()
    } else {
        tracing_subscriber::fmt::layer().boxed()
    };
    subscriber.with(fmt_layer).init();
}
