use clap::{Parser, ValueEnum};
use dotenvy::dotenv;
use image_resize_service::api::handlers::process::ProcessResponse;
use image_resize_service::config::{ServiceConfig, WaitPolicy};
use image_resize_service::infrastructure::{AwsConnector, database};
use image_resize_service::services::transform::RasterTransformer;
use image_resize_service::services::worker::BackgroundWorker;
use image_resize_service::{AppState, create_app};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::signal;
use tower_http::trace::TraceLayer;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum Mode {
    /// HTTP API only
    Api,
    /// Background queue worker only
    Worker,
    /// Drain one batch, print the result and exit
    Process,
    /// HTTP API plus background worker
    All,
}

#[derive(Parser, Debug)]
#[command(version, about = "Image upload and resize service")]
struct Cli {
    #[arg(long, value_enum, default_value_t = Mode::All)]
    mode: Mode,

    #[arg(long, env = "PORT", default_value_t = 3000)]
    port: u16,

    /// With --mode process, use the short queue wait
    #[arg(long)]
    immediately: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv().ok();
    let cli = Cli::parse();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "image_resize_service=info,metrics=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("🚀 Starting image resize service ({:?})...", cli.mode);

    let config = Arc::new(ServiceConfig::from_env());
    info!(
        "🖼️  Config: bucket={}, queue={}, bounds={}x{}, failure mode={:?}, ack order={:?}",
        config.bucket,
        config.queue_url.as_deref().unwrap_or(&config.queue_name),
        config.thumb_max_width,
        config.thumb_max_height,
        config.failure_mode,
        config.ack_order
    );

    let db = database::setup_database(&config).await?;
    let connector = Arc::new(AwsConnector::from_config(config.clone(), db).await);
    let transformer = Arc::new(RasterTransformer::from_config(&config));
    let state = AppState::new(connector, transformer, config.clone());

    if cli.mode == Mode::Process {
        let wait = if cli.immediately {
            WaitPolicy::Immediate
        } else {
            WaitPolicy::LongPoll
        };
        let outcome = state
            .pipeline
            .process_batch(config.max_batch_size, wait)
            .await?;
        println!(
            "{}",
            serde_json::to_string_pretty(&ProcessResponse::from(outcome))?
        );
        return Ok(());
    }

    let (shutdown_tx, shutdown_rx) = tokio::sync::watch::channel(false);

    let worker_handle = if matches!(cli.mode, Mode::Worker | Mode::All) {
        let worker = BackgroundWorker::new(
            state.pipeline.clone(),
            config.max_batch_size,
            Duration::from_secs(config.worker_idle_seconds),
            shutdown_rx,
        );
        Some(tokio::spawn(worker.run()))
    } else {
        None
    };

    if cli.mode == Mode::Worker {
        shutdown_signal().await;
        let _ = shutdown_tx.send(true);
    } else {
        serve(state, cli.port, shutdown_tx).await?;
    }

    if let Some(handle) = worker_handle {
        let _ = handle.await;
    }

    info!("🛑 Service shut down gracefully.");
    Ok(())
}

async fn serve(
    state: AppState,
    port: u16,
    shutdown_tx: tokio::sync::watch::Sender<bool>,
) -> anyhow::Result<()> {
    let app = create_app(state).layer(
        TraceLayer::new_for_http()
            .make_span_with(|request: &axum::http::Request<_>| {
                let request_id = request
                    .headers()
                    .get("x-request-id")
                    .and_then(|v| v.to_str().ok())
                    .unwrap_or("unknown");
                tracing::info_span!(
                    "http_request",
                    method = %request.method(),
                    uri = %request.uri(),
                    request_id = %request_id,
                )
            })
            .on_request(|request: &axum::http::Request<_>, _span: &tracing::Span| {
                info!("📥 {} {}", request.method(), request.uri());
            })
            .on_response(
                |response: &axum::http::Response<_>, latency: Duration, _span: &tracing::Span| {
                    info!(
                        "📤 Finished in {:?} with status {}",
                        latency,
                        response.status()
                    );
                },
            ),
    );

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    info!("✅ Server ready at http://{}", addr);
    info!("📖 Swagger UI: http://{}/swagger-ui", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(async move {
        shutdown_signal().await;
        let _ = shutdown_tx.send(true);
    })
    .await?;

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
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
            info!("⌨️  Ctrl+C received, starting graceful shutdown...");
        },
        _ = terminate => {
            info!("💤 SIGTERM received, starting graceful shutdown...");
        },
    }
}
