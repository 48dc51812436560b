//! Tick-sequence scenarios against the built-in presets.

use std::sync::Arc;

use proptest::prelude::*;

use procsim::station::presets;
use procsim::{Registry, SimError, Station, StationConfig, Value};

fn preset(name: &str) -> StationConfig {
    let mut config = presets::get(name).unwrap().config().unwrap();
    config.server.enabled = false;
    config.telemetry = None;
    config
}

fn station(name: &str, seed: u64) -> (Station, Arc<Registry>) {
    let mut config = preset(name);
    config.station.seed = Some(seed);
    let station = Station::from_config(config).unwrap();
    let registry = Arc::clone(station.registry());
    (station, registry)
}

fn float(registry: &Registry, tag: &str) -> f64 {
    registry.get(tag).unwrap().as_f64().unwrap()
}

fn boolean(registry: &Registry, tag: &str) -> bool {
    registry.get(tag).unwrap().as_bool().unwrap()
}

// ============================================================================
// Tank system
// ============================================================================

#[test]
fn start_from_low_level_fills() {
    let (mut station, registry) = station("tank-system", 1);
    registry.set("tank_level", 10.0).unwrap();
    registry.set("set_point", 50.0).unwrap();
    registry.write_external("start", Value::Bool(true)).unwrap();

    station.tick().unwrap();

    assert!(boolean(&registry, "auto_mode"));
    assert!(boolean(&registry, "fill_valve"));
    assert!(!boolean(&registry, "drain_valve"));
    assert!(!boolean(&registry, "start"));
    assert!((float(&registry, "tank_level") - 10.2).abs() < 1e-9);
}

#[test]
fn stop_closes_valves_within_one_tick() {
    let (mut station, registry) = station("tank-system", 1);
    registry.set("tank_level", 30.0).unwrap();
    registry.set("start", true).unwrap();
    for _ in 0..5 {
        station.tick().unwrap();
    }
    assert!(boolean(&registry, "fill_valve"));

    registry.write_external("stop", Value::Bool(true)).unwrap();
    station.tick().unwrap();

    assert!(!boolean(&registry, "auto_mode"));
    assert!(!boolean(&registry, "fill_valve"));
    assert!(!boolean(&registry, "drain_valve"));
    assert!(!boolean(&registry, "stop"));

    let level = float(&registry, "tank_level");
    station.tick().unwrap();
    assert_eq!(float(&registry, "tank_level"), level);
}

#[test]
fn manual_mode_leaves_valves_to_clients() {
    let (mut station, registry) = station("tank-system", 1);
    registry.set("tank_level", 50.0).unwrap();
    registry.write_external("drain_valve", Value::Bool(true)).unwrap();

    station.tick().unwrap();
    station.tick().unwrap();

    assert!(!boolean(&registry, "auto_mode"));
    assert!(boolean(&registry, "drain_valve"));
    assert!((float(&registry, "tank_level") - 49.4).abs() < 1e-9);
}

#[test]
fn auto_mode_is_read_only_for_clients() {
    let (_station, registry) = station("tank-system", 1);
    let err = registry
        .write_external("auto_mode", Value::Bool(true))
        .unwrap_err();
    assert!(matches!(err, SimError::ReadOnly { .. }));
    assert!(!boolean(&registry, "auto_mode"));
}

proptest! {
    #[test]
    fn tank_level_stays_clamped(
        initial in 0.0f64..=100.0,
        commands in prop::collection::vec((any::<bool>(), any::<bool>()), 1..400),
    ) {
        let (mut station, registry) = station("tank-system", 1);
        registry.set("tank_level", initial).unwrap();

        for (fill, drain) in commands {
            registry.set("fill_valve", fill).unwrap();
            registry.set("drain_valve", drain).unwrap();
            station.tick().unwrap();

            let level = float(&registry, "tank_level");
            prop_assert!((0.0..=100.0).contains(&level), "level {} out of range", level);
        }
    }
}

// ============================================================================
// Pumping station
// ============================================================================

#[test]
fn no_anomaly_keeps_nominal_ranges() {
    let (mut station, registry) = station("pumping-station", 99);

    for _ in 0..500 {
        let status = station.tick().unwrap();
        assert!(!status.anomaly);

        let vibration = float(&registry, "pump1_vibration");
        let temp = float(&registry, "pump1_temp");
        let voltage = float(&registry, "voltage");
        assert!((0.1..=1.5).contains(&vibration), "vibration {}", vibration);
        assert!((35.0..=75.0).contains(&temp), "temperature {}", temp);
        assert!((380.0..=420.0).contains(&voltage), "voltage {}", voltage);
    }
    assert!(!boolean(&registry, "anomaly_active"));
}

#[test]
fn trigger_forces_exactly_one_anomalous_tick() {
    let (mut station, registry) = station("pumping-station", 5);
    registry
        .write_external("anomaly_triggered", Value::Bool(true))
        .unwrap();

    let status = station.tick().unwrap();
    assert!(status.anomaly);
    assert!(boolean(&registry, "anomaly_active"));
    assert!(!boolean(&registry, "anomaly_triggered"));
    assert!(float(&registry, "pump1_vibration") >= 5.0);
    assert!(float(&registry, "pump1_temp") >= 85.0);
    assert!(float(&registry, "voltage") >= 450.0);

    for _ in 0..50 {
        assert!(!station.tick().unwrap().anomaly);
    }
    assert_eq!(station.stats().anomalies, 1);
}

#[test]
fn enabled_anomalies_occur_at_low_rate() {
    let (mut station, registry) = station("pumping-station", 2024);
    registry.set("anomaly_enabled", true).unwrap();

    let anomalous = (0..2000)
        .filter(|_| station.tick().unwrap().anomaly)
        .count();

    // p = 0.05 over 2000 ticks
    assert!((40..=180).contains(&anomalous), "{} anomalous ticks", anomalous);
}

#[test]
fn valves_follow_level_thresholds() {
    let (mut station, registry) = station("pumping-station", 11);

    for _ in 0..200 {
        station.tick().unwrap();
        let level = float(&registry, "tank_level");
        let fill = boolean(&registry, "valve_fill");
        let discharge = boolean(&registry, "valve_discharge");

        if level < 25.0 {
            assert!(fill && !discharge);
            assert!(boolean(&registry, "pump1_status"));
        } else if level > 85.0 {
            assert!(!fill && discharge);
            assert!(!boolean(&registry, "pump1_status"));
        } else {
            assert!(!fill && !discharge);
        }
    }
}

#[test]
fn generated_values_have_two_decimals() {
    let (mut station, registry) = station("pumping-station", 3);
    station.tick().unwrap();

    for tag in ["flow_in", "flow_out", "pump1_power", "voltage"] {
        let v = float(&registry, tag);
        assert!(((v * 100.0).round() - v * 100.0).abs() < 1e-6, "{} = {}", tag, v);
    }
}

// ============================================================================
// Registry
// ============================================================================

#[test]
fn mismatched_write_leaves_value_unchanged() {
    let (_station, registry) = station("pumping-station", 1);
    let before = registry.get("flow_in").unwrap();

    let err = registry.set("flow_in", true).unwrap_err();
    assert!(matches!(err, SimError::TypeMismatch { .. }));
    assert_eq!(registry.get("flow_in").unwrap(), before);

    registry.set("flow_in", 123.45).unwrap();
    assert_eq!(registry.get("flow_in").unwrap(), Value::Float(123.45));

    assert!(matches!(
        registry.get("no_such_tag"),
        Err(SimError::NotFound { .. })
    ));
}

#[test]
fn snapshot_is_detached_from_later_ticks() {
    let (mut station, registry) = station("pumping-station", 8);
    station.tick().unwrap();
    let snapshot = registry.snapshot(&["flow_in", "tank_level"]).unwrap();
    let flow = snapshot.get("flow_in").unwrap();

    for _ in 0..10 {
        station.tick().unwrap();
    }
    assert_eq!(snapshot.get("flow_in").unwrap(), flow);
    assert_eq!(snapshot.len(), 2);
}
