//! Clipforge API server binary.

use tracing::{error, info};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use clipforge_api::{create_router, ApiConfig, AppState};
use clipforge_worker::WorkerConfig;

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    // Colored output for dev, JSON for production
    let use_json = std::env::var("LOG_FORMAT")
        .map(|v| v.to_lowercase() == "json")
        .unwrap_or(false);

    let env_filter = EnvFilter::from_default_env()
        .add_directive("clipforge=info".parse().expect("valid directive"));

    if use_json {
        tracing_subscriber::registry()
            .with(fmt::layer().json())
            .with(env_filter)
            .init();
    } else {
        tracing_subscriber::registry()
            .with(
                fmt::layer()
                    .with_ansi(true)
                    .with_target(true)
                    .with_file(false)
                    .with_line_number(false),
            )
            .with(env_filter)
            .init();
    }

    info!("starting clipforge-api");

    // Fail fast when the external tooling is absent
    if let Err(e) = clipforge_media::check_ffmpeg() {
        error!("{}", e);
        std::process::exit(1);
    }
    if let Err(e) = clipforge_media::check_ffprobe() {
        error!("{}", e);
        std::process::exit(1);
    }
    if let Err(e) = clipforge_media::check_ytdlp() {
        error!("{}", e);
        std::process::exit(1);
    }

    let config = ApiConfig::from_env();
    let worker_config = WorkerConfig::from_env();

    for dir in [&worker_config.output_dir, &worker_config.temp_dir] {
        if let Err(e) = tokio::fs::create_dir_all(dir).await {
            error!(dir = %dir.display(), "failed to create directory: {}", e);
            std::process::exit(1);
        }
    }

    let bind_addr = config.bind_addr;
    let state = AppState::new(config, worker_config);
    let router = create_router(state);

    let listener = match tokio::net::TcpListener::bind(bind_addr).await {
        Ok(listener) => listener,
        Err(e) => {
            error!("failed to bind {}: {}", bind_addr, e);
            std::process::exit(1);
        }
    };

    info!(addr = %bind_addr, "listening");

    if let Err(e) = axum::serve(listener, router)
        .with_graceful_shutdown(async {
            tokio::signal::ctrl_c().await.ok();
            info!("received shutdown signal");
        })
        .await
    {
        error!("server error: {}", e);
        std::process::exit(1);
    }

    info!("shutdown complete");
}
