//! Folio - AI proxy service for a portfolio site
//!
//! `folio serve` runs the HTTP endpoints that forward chat, agent, voice,
//! extraction and structured-output requests to the AI providers.
//! `folio chat` is a terminal client that streams replies from a running
//! server through the same conversation state machine a browser uses.

mod agent;
mod api;
mod config;
mod extract;
mod llm;
mod message;
mod runtime;
mod sse_codec;
mod state_machine;
mod store;
mod system_prompt;
mod tools;
mod transport;
mod wire;

use api::{create_router, AppState};
use clap::{Parser, Subcommand};
use config::ServerConfig;
use extract::{ReaderConfig, ReaderExtractor};
use llm::{LlmConfig, LlmService, LoggingService, OpenAIService};
use runtime::{ConversationRuntime, Update};
use state_machine::ConvContext;
use std::io::Write;
use std::net::SocketAddr;
use std::sync::Arc;
use store::SubmissionStore;
use tokio::io::{AsyncBufReadExt, BufReader};
use tools::ToolRegistry;
use tower_http::{
    compression::CompressionLayer,
    cors::{Any, CorsLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use transport::HttpStreamTransport;
use url::Url;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the HTTP server (default)
    Serve {
        /// Overrides FOLIO_PORT
        #[arg(long)]
        port: Option<u16>,
    },
    /// Chat with a running server from the terminal
    Chat {
        /// Base URL of the server
        #[arg(long, default_value = "http://localhost:8000")]
        url: Url,
        /// Use the agent endpoint, which can call tools
        #[arg(long)]
        agent: bool,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    match cli.command.unwrap_or(Command::Serve { port: None }) {
        Command::Serve { port } => serve(port).await,
        Command::Chat { url, agent } => chat(&url, agent).await,
    }
}

// ============================================================
// Server
// ============================================================

async fn serve(port_override: Option<u16>) -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "folio=info,tower_http=debug".into()),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .json()
                .with_current_span(false)
                .with_span_list(false),
        )
        .init();

    let config = ServerConfig::from_env()?;
    let port = port_override.unwrap_or(config.port);

    let llm_config = LlmConfig::from_env();
    let openai = Arc::new(OpenAIService::new(&llm_config)?);
    let llm: Arc<dyn LlmService> = Arc::new(LoggingService::new(openai.clone()));
    tracing::info!(
        model = %llm.model_id(),
        base_url = %llm_config.base_url,
        "LLM provider initialized"
    );

    let extractor = ReaderExtractor::new(ReaderConfig::from_env())?;

    tracing::info!(path = %config.data_dir.display(), "Submission log directory");
    let state = AppState {
        llm,
        speech: openai.clone(),
        realtime: openai,
        extractor: Arc::new(extractor),
        tools: Arc::new(ToolRegistry::standard()),
        store: Arc::new(SubmissionStore::in_dir(&config.data_dir)),
        limits: config.limits,
    };

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let compression = CompressionLayer::new()
        .gzip(true)
        .br(true)
        .deflate(true)
        .zstd(true);

    // Bounds time to response headers; streamed bodies carry their own deadline
    let timeout = TimeoutLayer::new(config.limits.request_ceiling);

    let app = create_router(state)
        .layer(timeout)
        .layer(cors)
        .layer(compression)
        .layer(TraceLayer::new_for_http());

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    tracing::info!("Folio server listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutting down");
}

// ============================================================
// Terminal Client
// ============================================================

async fn chat(base: &Url, agent: bool) -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "folio=warn".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let endpoint = base.join(if agent { "api/agent" } else { "api/chat" })?;
    eprintln!("Connected to {endpoint}. Ctrl-C cancels a reply, /quit exits.");

    let mut runtime =
        ConversationRuntime::new(ConvContext::generate(), HttpStreamTransport::new(endpoint));
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    loop {
        prompt("> ");
        let Some(line) = lines.next_line().await? else {
            break;
        };
        let line = line.trim();
        if line == "/quit" {
            break;
        }
        if line.is_empty() {
            continue;
        }

        if let Err(e) = runtime.submit(line) {
            eprintln!("{e}");
            continue;
        }

        loop {
            tokio::select! {
                update = runtime.next_update() => match update {
                    Some(update) => render(&update),
                    None => break,
                },
                _ = tokio::signal::ctrl_c() => {
                    if runtime.cancel().is_ok() {
                        eprintln!("\n[cancelled]");
                    }
                    break;
                }
            }
        }
    }

    Ok(())
}

fn prompt(text: &str) {
    print!("{text}");
    let _ = std::io::stdout().flush();
}

fn render(update: &Update) {
    match update {
        Update::Fragment { text, .. } => prompt(text),
        Update::ToolCall { name, input } => eprintln!("\n[{name}] {input}"),
        Update::ToolResult {
            name,
            output,
            is_error,
        } => {
            let label = if *is_error { "failed" } else { "result" };
            eprintln!("[{name} {label}] {output}");
        }
        Update::Finished { .. } => println!(),
        Update::Failed { message } => eprintln!("\n[error] {message}"),
    }
}
