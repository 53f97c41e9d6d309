// Main entry point - Dependency injection and scheduler setup
use chrono::Utc;
use std::time::Duration;

use microgrid_telemetry::application::alert_store::AlertStore;
use microgrid_telemetry::application::dashboard_sink::SinkSet;
use microgrid_telemetry::application::monitoring_service::MonitoringService;
use microgrid_telemetry::application::random::rng_from_seed;
use microgrid_telemetry::application::scheduler::TickScheduler;
use microgrid_telemetry::application::telemetry_source::{forward_payloads, StubTelemetrySource, TelemetrySource};
use microgrid_telemetry::domain::telemetry::ChartData;
use microgrid_telemetry::infrastructure::config::load_dashboard_config;
use microgrid_telemetry::infrastructure::logging::init_tracing;
use microgrid_telemetry::infrastructure::runtime::block_on_with_grace;
use microgrid_telemetry::infrastructure::stdin_source::LineTelemetrySource;
use microgrid_telemetry::presentation::console_view::ConsoleView;

// Stdin reads run on a blocking thread that cannot be cancelled; shutdown
// abandons it after this long instead of waiting for another line.
const SHUTDOWN_GRACE: Duration = Duration::from_millis(500);

fn main() -> anyhow::Result<()> {
    block_on_with_grace(run(), SHUTDOWN_GRACE)
}

async fn run() -> anyhow::Result<()> {
    // Load configuration
    let config = load_dashboard_config()?;

    // Initialize tracing
    init_tracing(&config.logging);
    tracing::info!(
        profile = ?config.alerts.profile,
        injection_probability = config.alerts.injection_probability(),
        seed = ?config.scheduler.seed,
        "configuration loaded"
    );

    // Process-wide state, owned here and handed to the service
    let started = Utc::now();
    let alerts = if config.alerts.seed_demo_alerts {
        AlertStore::with_demo_alerts(started)
    } else {
        AlertStore::new()
    };
    let chart = ChartData::new(config.scheduler.max_chart_points);
    let rng = rng_from_seed(config.scheduler.seed);

    let service = MonitoringService::new(&config, alerts, chart, Box::new(rng));

    // Views (presentation layer)
    let sinks = SinkSet::new().with(ConsoleView::new(config.site.offset()));

    // Start the scheduler
    let mut handle = TickScheduler::new(service, sinks, &config.scheduler).start();

    // External readings
    let source: Box<dyn TelemetrySource> = if config.ingest.stdin {
        tracing::info!("reading external telemetry from stdin");
        Box::new(LineTelemetrySource::stdin())
    } else {
        Box::new(StubTelemetrySource)
    };
    let ingest = tokio::spawn(forward_payloads(source, handle.ingest_sender()));

    tokio::signal::ctrl_c().await?;
    tracing::info!("shutdown requested");

    ingest.abort();
    let service = handle.stop().await?;
    tracing::info!(
        ticks = service.ticks(),
        alerts = service.alerts().len(),
        battery = service.last_battery_level(),
        chart_points = service.chart().len(),
        "monitoring stopped"
    );

    Ok(())
}
