// Tick scheduler - Drives the monitoring service on two independent timers
use crate::application::dashboard_sink::SinkSet;
use crate::application::monitoring_service::MonitoringService;
use crate::application::telemetry_source::ExternalPayload;
use crate::domain::alert::AlertId;
use crate::infrastructure::config::SchedulerConfig;
use chrono::{DateTime, Utc};
use std::time::Duration;
use thiserror::Error;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};

const COMMAND_BUFFER: usize = 64;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedulerState {
    Idle,
    Running,
    Stopped,
}

/// Requests from outside the scheduler task, applied between ticks.
#[derive(Debug, Clone, PartialEq)]
pub enum SchedulerCommand {
    Ingest(ExternalPayload),
    Dismiss(AlertId),
    ClearAlerts,
}

#[derive(Debug, Error)]
pub enum SchedulerError {
    #[error("scheduler is no longer running")]
    NotRunning,
    #[error("scheduler task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
}

/// Source of "now". Nothing else in the pipeline reads the wall clock.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

pub struct TickScheduler {
    service: MonitoringService,
    sinks: SinkSet,
    clock: Box<dyn Clock>,
    tick_period: Duration,
    clock_period: Duration,
    backfill: bool,
}

impl TickScheduler {
    pub fn new(service: MonitoringService, sinks: SinkSet, config: &SchedulerConfig) -> Self {
        Self {
            service,
            sinks,
            clock: Box::new(SystemClock),
            tick_period: config.tick_period(),
            clock_period: config.clock_period(),
            backfill: config.backfill,
        }
    }

    pub fn with_clock(mut self, clock: impl Clock + 'static) -> Self {
        self.clock = Box::new(clock);
        self
    }

    /// A scheduler that has not been started is always idle.
    pub fn state(&self) -> SchedulerState {
        SchedulerState::Idle
    }

    /// Spawn the scheduler task. Must be called from within a tokio runtime.
    pub fn start(self) -> SchedulerHandle {
        let (commands_tx, commands_rx) = mpsc::channel(COMMAND_BUFFER);
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let (state_tx, state_rx) = watch::channel(SchedulerState::Running);

        tracing::info!(
            tick_ms = self.tick_period.as_millis() as u64,
            clock_ms = self.clock_period.as_millis() as u64,
            "scheduler started"
        );

        let task = tokio::spawn(self.run(commands_rx, shutdown_rx, state_tx));

        SchedulerHandle {
            commands: commands_tx,
            shutdown: shutdown_tx,
            state: state_rx,
            task: Some(task),
        }
    }

    async fn run(
        mut self,
        mut commands: mpsc::Receiver<SchedulerCommand>,
        mut shutdown: watch::Receiver<bool>,
        state: watch::Sender<SchedulerState>,
    ) -> MonitoringService {
        let start = Instant::now();
        let mut data_timer = interval_at(start + self.tick_period, self.tick_period);
        let mut clock_timer = interval_at(start + self.clock_period, self.clock_period);
        data_timer.set_missed_tick_behavior(MissedTickBehavior::Delay);
        clock_timer.set_missed_tick_behavior(MissedTickBehavior::Skip);

        let now = self.clock.now();
        if self.backfill {
            if let Ok(period) = chrono::Duration::from_std(self.tick_period) {
                self.service.backfill(now, period, &mut self.sinks);
            }
        }
        self.service.publish_alerts(now, &mut self.sinks);

        loop {
            tokio::select! {
                biased;
                _ = shutdown.changed() => break,
                _ = data_timer.tick() => {
                    let now = self.clock.now();
                    self.service.tick(now, &mut self.sinks);
                }
                _ = clock_timer.tick() => {
                    self.sinks.clock_tick(self.clock.now());
                }
                Some(command) = commands.recv() => self.apply(command),
            }
        }

        state.send_replace(SchedulerState::Stopped);
        tracing::info!(ticks = self.service.ticks(), "scheduler stopped");
        self.service
    }

    fn apply(&mut self, command: SchedulerCommand) {
        let now = self.clock.now();
        match command {
            SchedulerCommand::Ingest(payload) => {
                self.service.ingest(payload, now, &mut self.sinks);
            }
            SchedulerCommand::Dismiss(id) => {
                self.service.dismiss(id, now, &mut self.sinks);
            }
            SchedulerCommand::ClearAlerts => self.service.clear_alerts(now, &mut self.sinks),
        }
    }
}

/// Control surface of a running scheduler. Dropping it also stops the task.
pub struct SchedulerHandle {
    commands: mpsc::Sender<SchedulerCommand>,
    shutdown: watch::Sender<bool>,
    state: watch::Receiver<SchedulerState>,
    task: Option<JoinHandle<MonitoringService>>,
}

impl SchedulerHandle {
    pub fn state(&self) -> SchedulerState {
        *self.state.borrow()
    }

    /// Sender for feeding external readings from another task.
    pub fn ingest_sender(&self) -> mpsc::Sender<SchedulerCommand> {
        self.commands.clone()
    }

    pub async fn send(&self, command: SchedulerCommand) -> Result<(), SchedulerError> {
        self.commands
            .send(command)
            .await
            .map_err(|_| SchedulerError::NotRunning)
    }

    /// Cancel both timers and hand back the final monitoring state. The handle
    /// stays usable and reports `Stopped`; a second call is `NotRunning`.
    pub async fn stop(&mut self) -> Result<MonitoringService, SchedulerError> {
        let task = self.task.take().ok_or(SchedulerError::NotRunning)?;
        // The task may already be gone; joining reports that.
        let _ = self.shutdown.send(true);
        Ok(task.await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::alert_store::AlertStore;
    use crate::application::dashboard_sink::testing::RecordingSink;
    use crate::application::random::ScriptedRandom;
    use crate::domain::telemetry::ChartData;
    use crate::infrastructure::config::DashboardConfig;
    use chrono::TimeZone;

    struct FixedClock(DateTime<Utc>);

    impl Clock for FixedClock {
        fn now(&self) -> DateTime<Utc> {
            self.0
        }
    }

    fn scheduler(config: &DashboardConfig, sinks: SinkSet) -> TickScheduler {
        let service = MonitoringService::new(
            config,
            AlertStore::with_demo_alerts(Utc::now()),
            ChartData::new(config.scheduler.max_chart_points),
            Box::new(ScriptedRandom::constant(0.5)),
        );
        TickScheduler::new(service, sinks, &config.scheduler)
            .with_clock(FixedClock(Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap()))
    }

    fn quiet_config() -> DashboardConfig {
        let mut config = DashboardConfig::default();
        config.scheduler.backfill = false;
        config
    }

    #[tokio::test(start_paused = true)]
    async fn test_idle_running_stopped() {
        let config = quiet_config();
        let scheduler = scheduler(&config, SinkSet::new());
        assert_eq!(scheduler.state(), SchedulerState::Idle);

        let mut handle = scheduler.start();
        assert_eq!(handle.state(), SchedulerState::Running);

        let service = handle.stop().await.unwrap();
        assert_eq!(service.ticks(), 0);
        assert_eq!(handle.state(), SchedulerState::Stopped);

        assert!(matches!(handle.stop().await, Err(SchedulerError::NotRunning)));
        assert_eq!(handle.state(), SchedulerState::Stopped);
    }

    #[tokio::test(start_paused = true)]
    async fn test_timers_run_independently() {
        let config = quiet_config();
        let (recording, recorded) = RecordingSink::new();
        let mut handle = scheduler(&config, SinkSet::new().with(recording)).start();

        tokio::time::sleep(Duration::from_millis(12_500)).await;
        let service = handle.stop().await.unwrap();

        assert_eq!(service.ticks(), 2);
        assert_eq!(service.chart().len(), 2);

        let recorded = recorded.lock().unwrap();
        assert_eq!(recorded.readings.len(), 2);
        assert_eq!(recorded.clock_ticks.len(), 12);
        // Initial render of the seeded alerts.
        assert_eq!(recorded.alert_lists[0].len(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop_cancels_timers() {
        let config = quiet_config();
        let (recording, recorded) = RecordingSink::new();
        let mut handle = scheduler(&config, SinkSet::new().with(recording)).start();

        tokio::time::sleep(Duration::from_millis(5_500)).await;
        let service = handle.stop().await.unwrap();
        assert_eq!(service.ticks(), 1);

        let seen = recorded.lock().unwrap().clock_ticks.len();
        tokio::time::sleep(Duration::from_secs(30)).await;
        assert_eq!(recorded.lock().unwrap().clock_ticks.len(), seen);
    }

    #[tokio::test(start_paused = true)]
    async fn test_commands_are_applied_between_ticks() {
        let config = quiet_config();
        let mut handle = scheduler(&config, SinkSet::new()).start();

        handle
            .send(SchedulerCommand::Ingest(ExternalPayload {
                battery_level: Some(33.0),
                ..ExternalPayload::default()
            }))
            .await
            .unwrap();
        handle.send(SchedulerCommand::Dismiss(1)).await.unwrap();
        handle.send(SchedulerCommand::Dismiss(12345)).await.unwrap();

        tokio::time::sleep(Duration::from_millis(100)).await;
        let service = handle.stop().await.unwrap();

        assert_eq!(service.last_battery_level(), 33);
        assert_eq!(service.alerts().len(), 2);
        assert!(service.alerts().iter().all(|a| a.id != 1));
    }

    #[tokio::test(start_paused = true)]
    async fn test_clear_alerts_command() {
        let config = quiet_config();
        let mut handle = scheduler(&config, SinkSet::new()).start();

        handle.ingest_sender().send(SchedulerCommand::ClearAlerts).await.unwrap();
        tokio::time::sleep(Duration::from_millis(100)).await;

        let service = handle.stop().await.unwrap();
        assert!(service.alerts().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_backfill_runs_before_first_tick() {
        let config = DashboardConfig::default();
        let (recording, recorded) = RecordingSink::new();
        let mut handle = scheduler(&config, SinkSet::new().with(recording)).start();

        tokio::time::sleep(Duration::from_millis(100)).await;
        let service = handle.stop().await.unwrap();

        assert_eq!(service.ticks(), 0);
        assert_eq!(service.chart().len(), config.scheduler.max_chart_points);
        assert_eq!(
            recorded.lock().unwrap().chart_points.len(),
            config.scheduler.max_chart_points
        );
    }
}
