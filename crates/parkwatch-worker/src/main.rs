//! Parking detection worker binary.

use std::sync::Arc;

use anyhow::Context;
use parkwatch_gateway::{BackendClientConfig, BackendGateway, HttpBackendClient, RetryConfig, RetryingGateway};
use parkwatch_vision::occupancy::OccupancyScorerConfig;
use parkwatch_vision::SlotStateTable;
use tokio::runtime::Handle;
use tracing::{error, info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use parkwatch_worker::metrics::init_metrics;
use parkwatch_worker::startup;
use parkwatch_worker::{
    create_router, DetectionStats, DispatcherConfig, EventDispatcher, PipelineContext, ServiceConfig, StatusState,
    StreamSupervisor, SupervisorConfig,
};

#[tokio::main]
async fn main() {
    // Load environment variables
    dotenvy::dotenv().ok();

    // Colored output for dev, JSON for production
    let use_json = std::env::var("LOG_FORMAT")
        .map(|v| v.to_lowercase() == "json")
        .unwrap_or(false);

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info,ort=warn"));

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
                    .with_thread_names(true)
                    .with_file(false)
                    .with_line_number(false),
            )
            .with(env_filter)
            .init();
    }

    info!("Starting parkwatch-worker");

    if let Err(e) = run().await {
        error!("Worker error: {:#}", e);
        std::process::exit(1);
    }

    info!("Worker shutdown complete");
}

async fn run() -> anyhow::Result<()> {
    let config = ServiceConfig::from_env();
    info!("Service config: {:?}", config);

    let metrics_handle = match init_metrics() {
        Ok(handle) => Some(handle),
        Err(e) => {
            warn!("Prometheus recorder unavailable: {}", e);
            None
        }
    };

    let rois = startup::load_rois(&config);
    let cameras = startup::load_cameras(&config);

    // Pipelines
    let slot_table = Arc::new(SlotStateTable::new());
    let mut context = PipelineContext::new(rois, slot_table.clone());
    context.scorer = OccupancyScorerConfig {
        threshold: config.occupancy_threshold,
        ..Default::default()
    };
    context.duplicate_window = config.duplicate_window;
    context.attach_snapshots = config.attach_snapshots;

    if let Some(vehicles) = startup::vehicle_pipeline(&config) {
        context = context.with_vehicles(vehicles);
    }
    if let Some(plates) = startup::plate_reader(&config).await {
        context = context.with_plates(Arc::new(plates));
    }

    // Backend
    let backend_config = BackendClientConfig::from_env();
    let max_retries = backend_config.max_retries;
    let client = HttpBackendClient::new(backend_config).context("Failed to create backend client")?;
    if !client.health_check().await {
        warn!("Backend is not reachable yet, events will fail until it is");
    }
    let gateway: Arc<dyn BackendGateway> = if max_retries > 0 {
        info!(max_retries, "Backend retries enabled");
        Arc::new(RetryingGateway::new(
            client,
            RetryConfig::default().with_max_retries(max_retries),
        ))
    } else {
        Arc::new(client)
    };

    let stats = Arc::new(DetectionStats::new());
    let dispatcher = Arc::new(EventDispatcher::new(
        gateway,
        Handle::current(),
        stats.clone(),
        DispatcherConfig {
            cooldown: config.event_cooldown,
            plate_confidence_threshold: config.plate_confidence_threshold,
        },
    ));

    let supervisor = Arc::new(StreamSupervisor::new(
        startup::frame_sources(&config),
        context,
        dispatcher,
        SupervisorConfig {
            stop_timeout: config.stop_timeout,
            ..Default::default()
        },
    ));

    for camera in cameras {
        let code = camera.code.clone();
        if let Err(e) = supervisor.add_camera(camera) {
            error!(camera_code = %code, "Failed to register camera: {}", e);
        }
    }
    supervisor.start_all();

    // Status server
    let app = create_router(
        StatusState {
            supervisor: supervisor.clone(),
            stats,
            slot_table,
        },
        metrics_handle,
    );

    info!("Status server listening on {}", config.status_addr);
    let listener = tokio::net::TcpListener::bind(config.status_addr)
        .await
        .with_context(|| format!("Failed to bind {}", config.status_addr))?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    supervisor.stop_all().await;
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("Failed to listen for shutdown signal: {}", e);
    }
    info!("Received shutdown signal");
}
