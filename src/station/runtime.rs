//! Station runtime: the tick loop and its background tasks.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info, warn};

use crate::core::error::{Result, SimError};
use crate::core::logging::TickStatus;
use crate::core::traits::ControlPolicy;
use crate::sim::SimulationEngine;
use crate::store::Registry;
use crate::telemetry::{HttpTransport, PublishOutcome, TelemetrySink, TelemetryStats};

use super::StationConfig;

/// Grace period for background tasks after shutdown is signalled.
const SHUTDOWN_GRACE: Duration = Duration::from_secs(5);

/// Counters reported when a station stops.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StationStats {
    pub ticks: u64,
    pub anomalies: u64,
    pub telemetry: TelemetryStats,
}

/// A configured station: registry, engine, control policy and telemetry sink.
///
/// The station owns the registry handle; background tasks (OPC UA server,
/// gateway bridge) receive clones of the `Arc`.
pub struct Station {
    config: StationConfig,
    registry: Arc<Registry>,
    engine: SimulationEngine,
    policy: Option<Box<dyn ControlPolicy>>,
    sink: Option<TelemetrySink>,
}

impl Station {
    /// Validate `config` and build every component.
    pub fn from_config(config: StationConfig) -> Result<Self> {
        config.validate()?;

        let registry = Arc::new(Registry::from_specs(&config.tags)?);
        let engine = SimulationEngine::new(config.simulation(), config.station.seed)?;
        registry.read(|tags| engine.validate_against(tags))?;

        let policy = config.control.build();
        let sink = config
            .telemetry()
            .map(|t| TelemetrySink::new(Box::new(HttpTransport::new(t)), t));

        Ok(Self {
            config,
            registry,
            engine,
            policy,
            sink,
        })
    }

    #[inline]
    pub fn registry(&self) -> &Arc<Registry> {
        &self.registry
    }

    #[inline]
    pub fn config(&self) -> &StationConfig {
        &self.config
    }

    pub fn stats(&self) -> StationStats {
        StationStats {
            ticks: self.engine.state().tick,
            anomalies: self.engine.state().anomaly_count,
            telemetry: self.sink.as_ref().map(|s| s.stats()).unwrap_or_default(),
        }
    }

    /// Run simulation and control for one tick as a single registry update.
    pub fn tick(&mut self) -> Result<TickStatus> {
        let engine = &mut self.engine;
        let policy = &mut self.policy;
        let anomaly = self.registry.update(|tags| {
            let anomaly = engine.step(tags)?;
            if let Some(policy) = policy.as_mut() {
                policy.apply(tags)?;
            }
            Ok(anomaly)
        })?;

        let names = &self.config.station.status_tags;
        let values: Vec<_> = self.registry.read(|tags| {
            names
                .iter()
                .filter_map(|name| tags.get(name).ok().map(|v| (name.clone(), v)))
                .collect()
        });

        Ok(TickStatus {
            tick: self.engine.state().tick,
            anomaly,
            values,
        })
    }

    /// One full tick: simulation, control, then telemetry.
    pub async fn step(&mut self) -> Result<TickStatus> {
        let status = self.tick()?;
        info!("{}", status);

        if let Some(sink) = self.sink.as_mut() {
            let snapshot = self.registry.snapshot(&sink.tags())?;
            if sink.publish(&snapshot).await == PublishOutcome::Failed {
                debug!(tick = status.tick, "Telemetry will retry next tick");
            }
        }

        Ok(status)
    }

    /// Run the tick loop until `shutdown` resolves.
    ///
    /// Spawns the OPC UA server and gateway bridge when configured. On
    /// shutdown they are signalled through a watch channel, the telemetry
    /// link is closed and the tasks are joined.
    pub async fn run<F>(mut self, shutdown: F) -> Result<StationStats>
    where
        F: Future<Output = ()>,
    {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let (fault_tx, mut fault_rx) = mpsc::unbounded_channel::<SimError>();
        let tasks = self.spawn_background(shutdown_rx, fault_tx);

        info!(
            station = %self.config.station.name,
            tags = self.registry.len(),
            interval_ms = self.config.station.tick_interval_ms,
            telemetry = self.sink.as_ref().map(|s| s.endpoint()).unwrap_or("disabled"),
            "Station started"
        );

        let mut ticker = tokio::time::interval(self.config.tick_interval());
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        tokio::pin!(shutdown);

        let result = loop {
            tokio::select! {
                _ = &mut shutdown => {
                    info!("Shutdown requested");
                    break Ok(());
                }
                Some(e) = fault_rx.recv() => {
                    error!(error = %e, "Background task failed");
                    break Err(e);
                }
                _ = ticker.tick() => {
                    if let Err(e) = self.step().await {
                        if e.is_programming_error() {
                            error!(error = %e, "Tag schema violated during tick");
                        } else {
                            error!(error = %e, "Tick failed");
                        }
                        break Err(e);
                    }
                }
            }
        };

        let _ = shutdown_tx.send(true);
        if let Some(sink) = self.sink.as_mut() {
            sink.close().await;
        }
        join_background(tasks).await;

        let stats = self.stats();
        info!(
            ticks = stats.ticks,
            anomalies = stats.anomalies,
            telemetry_sent = stats.telemetry.sent,
            telemetry_failures = stats.telemetry.failures,
            telemetry_reconnects = stats.telemetry.reconnects,
            "Station stopped"
        );
        result.map(|_| stats)
    }

    #[cfg(feature = "opcua")]
    fn spawn_background(
        &self,
        shutdown: watch::Receiver<bool>,
        faults: mpsc::UnboundedSender<SimError>,
    ) -> Vec<JoinHandle<()>> {
        use crate::bridge::GatewayBridge;
        use crate::protocols::opcua::{OpcUaClientConfig, OpcUaRemoteSource, TagServer};

        let mut tasks = Vec::new();

        if self.config.server.enabled {
            let server = TagServer::new(self.config.server.clone(), Arc::clone(&self.registry));
            let rx = shutdown.clone();
            let faults = faults.clone();
            tasks.push(tokio::spawn(async move {
                if let Err(e) = server.run(rx).await {
                    let _ = faults.send(e);
                }
            }));
        }

        if let Some(gateway) = self.config.gateway() {
            let client = OpcUaClientConfig::new(gateway.endpoint_url.clone())
                .with_request_timeout(gateway.request_timeout());
            let bridge = GatewayBridge::new(
                OpcUaRemoteSource::new(client),
                Arc::clone(&self.registry),
                gateway,
            );
            tasks.push(tokio::spawn(async move {
                if let Err(e) = bridge.run(shutdown).await {
                    let _ = faults.send(e);
                }
            }));
        }

        tasks
    }

    #[cfg(not(feature = "opcua"))]
    fn spawn_background(
        &self,
        _shutdown: watch::Receiver<bool>,
        _faults: mpsc::UnboundedSender<SimError>,
    ) -> Vec<JoinHandle<()>> {
        if self.config.server.enabled || self.config.gateway().is_some() {
            warn!("Built without the `opcua` feature; OPC UA server and gateway are disabled");
        }
        Vec::new()
    }
}

/// Join background tasks, aborting any that outlive the grace period.
/// Returns the number of aborted tasks.
async fn join_background(tasks: Vec<JoinHandle<()>>) -> usize {
    let mut aborted = 0;
    for mut task in tasks {
        if tokio::time::timeout(SHUTDOWN_GRACE, &mut task).await.is_err() {
            warn!("Background task did not stop in time, aborting");
            task.abort();
            aborted += 1;
        }
    }
    aborted
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::data::Value;
    use crate::station::presets;

    fn tank_station() -> Station {
        let mut config = presets::get("tank-system").unwrap().config().unwrap();
        config.server.enabled = false;
        Station::from_config(config).unwrap()
    }

    #[test]
    fn test_tick_runs_control_policy() {
        let mut station = tank_station();
        let registry = Arc::clone(station.registry());
        registry.set("tank_level", 10.0).unwrap();
        registry.set("start", true).unwrap();

        let status = station.tick().unwrap();
        assert_eq!(status.tick, 1);
        assert!(!status.anomaly);
        assert_eq!(registry.get("auto_mode").unwrap(), Value::Bool(true));
        assert_eq!(registry.get("fill_valve").unwrap(), Value::Bool(true));
        assert_eq!(status.values[0], ("tank_level".to_string(), Value::Float(10.2)));
    }

    #[test]
    fn test_pumping_station_tick() {
        let mut config = presets::get("pumping-station").unwrap().config().unwrap();
        config.server.enabled = false;
        config.telemetry = None;
        config.station.seed = Some(7);
        let mut station = Station::from_config(config).unwrap();

        for _ in 0..20 {
            station.tick().unwrap();
            let level = station.registry().get("tank_level").unwrap().as_f64().unwrap();
            let fill = station.registry().get("valve_fill").unwrap();
            if level < 25.0 {
                assert_eq!(fill, Value::Bool(true));
            } else if level > 85.0 {
                assert_eq!(fill, Value::Bool(false));
            }
        }
        assert_eq!(station.stats().ticks, 20);
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_until_shutdown() {
        let station = tank_station();
        let registry = Arc::clone(station.registry());
        registry.set("start", true).unwrap();

        let stats = station
            .run(tokio::time::sleep(Duration::from_millis(3500)))
            .await
            .unwrap();

        assert_eq!(stats.ticks, 4);
        assert_eq!(registry.get("auto_mode").unwrap(), Value::Bool(true));
    }

    #[tokio::test(start_paused = true)]
    async fn test_stuck_background_task_is_aborted() {
        let (tx, rx) = tokio::sync::oneshot::channel::<()>();
        let stuck = tokio::spawn(async move {
            let _tx = tx;
            std::future::pending::<()>().await;
        });
        let finished = tokio::spawn(async {});

        assert_eq!(join_background(vec![finished, stuck]).await, 1);
        assert!(rx.await.is_err());
    }
}
