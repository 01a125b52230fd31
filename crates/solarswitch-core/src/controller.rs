use std::time::Duration;

use crate::bounds::{SetOutcome, ThresholdBounds};
use crate::config::{minutes, SwitchConfig};
use crate::error::{ConfigError, StorageError};
use crate::hw::Relay;
use crate::monitor::{elapsed, MonitorSnapshot, ThresholdMonitor};
use crate::sensor::IndexSource;
use crate::storage::SettingsStore;
use crate::validation::{validate_bounds, validate_interval, CircuitBreaker};

/// Relay decision taken at an interval boundary.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Decision {
    pub above_max: Duration,
    pub below_min: Duration,
    pub energize: bool,
    /// A relay write was issued and succeeded.
    pub switched: bool,
}

impl Decision {
    pub fn out_of_range(&self) -> Duration {
        self.above_max + self.below_min
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TickOutcome {
    /// First tick: the first accounting period starts here.
    Started,
    /// Sample taken, interval not yet elapsed.
    Sampled,
    Decided(Decision),
}

/// Periodic relay controller.
///
/// Call [`tick`](Self::tick) often; the relay is only reconsidered once per
/// configured interval, and is energized when the signal spent more than
/// the whole interval out of bounds within that accounting period.
pub struct SwitchController<S, R, K> {
    bounds: ThresholdBounds,
    interval: Duration,
    store_key: String,
    last_tick_ms: Option<u64>,
    monitor: ThresholdMonitor,
    relay_energized: bool,
    sensor_health: CircuitBreaker,
    sensor: S,
    relay: R,
    store: K,
}

impl<S: IndexSource, R: Relay, K: SettingsStore> SwitchController<S, R, K> {
    /// Build a controller, restoring bounds persisted under
    /// `cfg.store_key`. The relay is assumed to start released.
    pub fn new(cfg: &SwitchConfig, sensor: S, relay: R, mut store: K) -> Result<Self, ConfigError> {
        cfg.validate()?;
        let bounds = restore_bounds(&mut store, &cfg.store_key, cfg.bounds);
        Ok(Self {
            bounds,
            interval: cfg.interval(),
            store_key: cfg.store_key.clone(),
            last_tick_ms: None,
            monitor: ThresholdMonitor::new(bounds),
            relay_energized: false,
            sensor_health: CircuitBreaker::new(cfg.sensor_fault_threshold),
            sensor,
            relay,
            store,
        })
    }

    pub fn bounds(&self) -> ThresholdBounds {
        self.bounds
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    pub fn relay_energized(&self) -> bool {
        self.relay_energized
    }

    pub fn sensor_degraded(&self) -> bool {
        self.sensor_health.is_open()
    }

    pub fn monitor(&self) -> &ThresholdMonitor {
        &self.monitor
    }

    pub fn relay(&self) -> &R {
        &self.relay
    }

    pub fn store(&self) -> &K {
        &self.store
    }

    pub fn store_mut(&mut self) -> &mut K {
        &mut self.store
    }

    pub fn set_interval(&mut self, interval_minutes: u32) -> Result<SetOutcome, ConfigError> {
        validate_interval(interval_minutes)?;
        let interval = minutes(interval_minutes);
        if interval == self.interval {
            return Ok(SetOutcome::Unchanged);
        }
        self.interval = interval;
        log::info!("decision interval set to {interval_minutes} min");
        Ok(SetOutcome::Applied)
    }

    /// The single bounds mutator. Build the argument with
    /// [`ThresholdBounds::new`] or [`ThresholdBounds::min_only`].
    ///
    /// Unchanged bounds are a successful no-op and are not re-persisted.
    /// A failed store write is logged; the new bounds stay in effect.
    pub fn set_bounds(&mut self, bounds: ThresholdBounds) -> Result<SetOutcome, ConfigError> {
        validate_bounds(&bounds)?;
        if bounds == self.bounds {
            return Ok(SetOutcome::Unchanged);
        }
        self.monitor.set_bounds(bounds)?;
        self.bounds = bounds;
        log::info!("bounds set to max {} min {}", bounds.max, bounds.min);
        if let Err(e) = self.store.save_bounds(&self.store_key, &bounds) {
            log::warn!("bounds not persisted under {}: {e}", self.store_key);
        }
        Ok(SetOutcome::Applied)
    }

    /// Time left until the next relay decision.
    pub fn next_decision_in(&self, now_ms: u64) -> Duration {
        match self.last_tick_ms {
            Some(last) => self.interval.saturating_sub(elapsed(now_ms, last)),
            None => Duration::ZERO,
        }
    }

    pub fn tick(&mut self, now_ms: u64) -> TickOutcome {
        let sample = self.sensor.read_index();
        self.observe(sample, now_ms);

        let Some(last) = self.last_tick_ms else {
            self.last_tick_ms = Some(now_ms);
            return TickOutcome::Started;
        };
        if elapsed(now_ms, last) < self.interval {
            return TickOutcome::Sampled;
        }

        let (above_max, below_min) = self.monitor.get_out_of_range_durations(now_ms);
        let energize = above_max + below_min > self.interval;
        let switched = energize != self.relay_energized && self.drive_relay(energize);
        log::debug!(
            "decision at {now_ms} ms: above {above_max:?} below {below_min:?} energize={energize}"
        );

        self.last_tick_ms = Some(now_ms);
        self.monitor.reset_accumulators();
        TickOutcome::Decided(Decision {
            above_max,
            below_min,
            energize,
            switched,
        })
    }

    pub fn debug(&self, now_ms: u64) -> MonitorSnapshot {
        self.monitor.debug_snapshot(now_ms)
    }

    fn observe(&mut self, sample: f64, now_ms: u64) {
        if self.monitor.update(sample, now_ms).is_some() {
            if self.sensor_health.is_open() {
                if let Some(last) = self.sensor_health.last_failure_ms() {
                    log::info!("sensor recovered at {now_ms} ms, last invalid reading at {last} ms");
                }
            }
            self.sensor_health.reset();
        } else if self.sensor_health.trip(now_ms) {
            log::warn!(
                "sensor degraded: {} consecutive invalid readings, last {:?}",
                self.sensor_health.failure_count(),
                self.monitor.last_fault()
            );
        }
    }

    /// A failed write leaves `relay_energized` untouched so the next
    /// decision retries.
    fn drive_relay(&mut self, energize: bool) -> bool {
        match self.relay.set_energized(energize) {
            Ok(()) => {
                self.relay_energized = energize;
                log::info!("relay {}", if energize { "energized" } else { "released" });
                true
            }
            Err(e) => {
                log::warn!("relay write failed, keeping previous state: {e}");
                false
            }
        }
    }
}

fn restore_bounds<K: SettingsStore>(store: &mut K, key: &str, fallback: ThresholdBounds) -> ThresholdBounds {
    let reseed = match store.load_bounds(key) {
        Ok(Some(stored)) if validate_bounds(&stored).is_ok() => {
            log::debug!("restored bounds from {key}: {stored:?}");
            return stored;
        }
        Ok(Some(stored)) => {
            log::warn!("stored bounds under {key} are invalid ({stored:?}), reseeding");
            true
        }
        Ok(None) => true,
        Err(e @ StorageError::Corrupt { .. }) => {
            log::warn!("{e}, reseeding");
            true
        }
        Err(e) => {
            log::warn!("could not load bounds from {key}: {e}");
            false
        }
    };
    if reseed {
        if let Err(e) = store.save_bounds(key, &fallback) {
            log::warn!("could not seed bounds under {key}: {e}");
        }
    }
    fallback
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hw::{PolarizedRelay, SimulatedPin};
    use crate::sensor::SENSOR_FAULT;
    use crate::storage::MemoryStore;
    use crate::validation::SensorFault;
    use std::cell::Cell;
    use std::rc::Rc;

    const MIN: u64 = 60_000;

    type Source = Box<dyn FnMut() -> f64>;
    type Ctl = SwitchController<Source, PolarizedRelay<SimulatedPin>, MemoryStore>;

    /// Controller whose sensor returns whatever is in the shared cell.
    fn controller(store: MemoryStore) -> (Ctl, Rc<Cell<f64>>) {
        let signal = Rc::new(Cell::new(500.0));
        let s = signal.clone();
        let source: Source = Box::new(move || s.get());
        let relay = PolarizedRelay::new(SimulatedPin::new(), false).unwrap();
        let cfg = SwitchConfig {
            bounds: ThresholdBounds::new(800.0, 200.0),
            ..SwitchConfig::default()
        };
        (SwitchController::new(&cfg, source, relay, store).unwrap(), signal)
    }

    #[test]
    fn interval_bounds() {
        let (mut c, _) = controller(MemoryStore::new());
        assert!(c.set_interval(0).is_err());
        assert!(c.set_interval(61).is_err());
        assert_eq!(c.interval(), Duration::from_secs(300));
        assert_eq!(c.set_interval(60).unwrap(), SetOutcome::Applied);
        assert_eq!(c.set_interval(1).unwrap(), SetOutcome::Applied);
        assert_eq!(c.set_interval(1).unwrap(), SetOutcome::Unchanged);
        assert_eq!(c.interval(), Duration::from_secs(60));
    }

    #[test]
    fn seeds_missing_bounds() {
        let (c, _) = controller(MemoryStore::new());
        assert_eq!(c.bounds(), ThresholdBounds::new(800.0, 200.0));
        assert_eq!(c.store().bounds("sw0"), Some(ThresholdBounds::new(800.0, 200.0)));
    }

    #[test]
    fn restores_persisted_bounds() {
        let store = MemoryStore::new().with_bounds("sw0", ThresholdBounds::new(600.0, 100.0));
        let (c, _) = controller(store);
        assert_eq!(c.bounds(), ThresholdBounds::new(600.0, 100.0));
        assert_eq!(c.monitor().bounds(), ThresholdBounds::new(600.0, 100.0));
        assert_eq!(c.store().writes(), 0);
    }

    #[test]
    fn invalid_persisted_bounds_are_replaced() {
        let store = MemoryStore::new().with_bounds("sw0", ThresholdBounds::new(100.0, 600.0));
        let (c, _) = controller(store);
        assert_eq!(c.bounds(), ThresholdBounds::new(800.0, 200.0));
        assert_eq!(c.store().bounds("sw0"), Some(ThresholdBounds::new(800.0, 200.0)));
    }

    #[test]
    fn unreadable_store_is_not_overwritten() {
        let mut store = MemoryStore::new().with_bounds("sw0", ThresholdBounds::new(600.0, 100.0));
        store.set_fail_reads(true);
        let (c, _) = controller(store);
        assert_eq!(c.bounds(), ThresholdBounds::new(800.0, 200.0));
        assert_eq!(c.store().bounds("sw0"), Some(ThresholdBounds::new(600.0, 100.0)));
    }

    #[test]
    fn set_bounds_persists_once() {
        let (mut c, _) = controller(MemoryStore::new());
        let writes = c.store().writes();
        let b = ThresholdBounds::new(900.0, 100.0);
        assert_eq!(c.set_bounds(b).unwrap(), SetOutcome::Applied);
        assert_eq!(c.set_bounds(b).unwrap(), SetOutcome::Unchanged);
        assert_eq!(c.store().writes(), writes + 1);
        assert_eq!(c.monitor().bounds(), b);
    }

    #[test]
    fn set_bounds_rejects_bad_values_without_change() {
        let (mut c, _) = controller(MemoryStore::new());
        let writes = c.store().writes();
        assert!(c.set_bounds(ThresholdBounds::new(100.0, 200.0)).is_err());
        assert!(c.set_bounds(ThresholdBounds::new(1200.0, 200.0)).is_err());
        assert!(c.set_bounds(ThresholdBounds::min_only(-5.0)).is_err());
        assert_eq!(c.bounds(), ThresholdBounds::new(800.0, 200.0));
        assert_eq!(c.store().writes(), writes);
    }

    #[test]
    fn min_only_bounds() {
        let (mut c, _) = controller(MemoryStore::new());
        c.set_bounds(ThresholdBounds::min_only(300.0)).unwrap();
        assert_eq!(c.bounds(), ThresholdBounds::new(1000.0, 300.0));
    }

    #[test]
    fn persistence_failure_keeps_new_bounds() {
        let (mut c, _) = controller(MemoryStore::new());
        c.store_mut().set_fail_writes(true);
        let b = ThresholdBounds::new(700.0, 300.0);
        assert_eq!(c.set_bounds(b).unwrap(), SetOutcome::Applied);
        assert_eq!(c.bounds(), b);
        assert_eq!(c.monitor().bounds(), b);
        assert_eq!(c.store().bounds("sw0"), Some(ThresholdBounds::new(800.0, 200.0)));
    }

    #[test]
    fn decision_only_at_interval_boundary() {
        let (mut c, signal) = controller(MemoryStore::new());
        signal.set(900.0);
        assert_eq!(c.tick(0), TickOutcome::Started);
        assert_eq!(c.tick(MIN), TickOutcome::Sampled);
        assert_eq!(c.next_decision_in(MIN), Duration::from_secs(240));
        assert_eq!(c.tick(5 * MIN - 1), TickOutcome::Sampled);
        match c.tick(5 * MIN) {
            // Exactly the interval is not more than the interval.
            TickOutcome::Decided(d) => {
                assert_eq!(d.above_max, Duration::from_secs(300));
                assert!(!d.energize);
                assert!(!d.switched);
            }
            other => panic!("expected a decision, got {other:?}"),
        }
        assert!(!c.relay_energized());
    }

    #[test]
    fn relay_writes_only_on_change() {
        let (mut c, signal) = controller(MemoryStore::new());
        signal.set(900.0);
        let initial_writes = c.relay().pin().writes();
        c.tick(0);
        for minute in 1..=20 {
            c.tick(minute * MIN);
        }
        // The above-max window never closes, so every boundary sees more
        // than the interval from the original entry.
        assert!(c.relay_energized());
        assert!(c.relay().is_energized());
        assert_eq!(c.relay().pin().writes(), initial_writes + 1);
    }

    #[test]
    fn failed_relay_write_is_retried() {
        let (mut c, signal) = controller(MemoryStore::new());
        signal.set(100.0);
        c.tick(0);
        c.tick(3 * MIN);
        c.relay.pin_mut().set_fail(true);
        match c.tick(6 * MIN) {
            TickOutcome::Decided(d) => {
                assert!(d.energize);
                assert!(!d.switched);
            }
            other => panic!("expected a decision, got {other:?}"),
        }
        assert!(!c.relay_energized());
        c.relay.pin_mut().set_fail(false);
        match c.tick(12 * MIN) {
            TickOutcome::Decided(d) => assert!(d.switched),
            other => panic!("expected a decision, got {other:?}"),
        }
        assert!(c.relay_energized());
    }

    #[test]
    fn sensor_faults_mark_degraded_and_keep_relay() {
        let (mut c, signal) = controller(MemoryStore::new());
        signal.set(900.0);
        c.tick(0);
        c.tick(6 * MIN);
        assert!(c.relay_energized());

        signal.set(SENSOR_FAULT);
        for i in 1..=5 {
            c.tick(6 * MIN + i * 1_000);
        }
        assert!(c.sensor_degraded());
        assert_eq!(c.monitor().last_sample(), Some(900.0));
        assert_eq!(c.monitor().last_fault(), Some(SensorFault::Sentinel(SENSOR_FAULT)));
        assert!(c.relay_energized());

        signal.set(500.0);
        c.tick(7 * MIN);
        assert!(!c.sensor_degraded());
        assert_eq!(c.monitor().last_fault(), None);
    }
}
