use std::cell::Cell;
use std::rc::Rc;
use std::time::Duration;

use crate::bounds::ThresholdBounds;
use crate::config::SwitchConfig;
use crate::controller::{Decision, SwitchController, TickOutcome};
use crate::hw::{PolarizedRelay, SimulatedPin};
use crate::sensor::SENSOR_FAULT;
use crate::storage::MemoryStore;

const SEC: u64 = 1_000;
const STEP: u64 = 10 * SEC;

type Source = Box<dyn FnMut() -> f64>;
type Ctl = SwitchController<Source, PolarizedRelay<SimulatedPin>, MemoryStore>;

struct Rig {
    ctl: Ctl,
    signal: Rc<Cell<f64>>,
    decisions: Vec<(u64, Decision)>,
}

impl Rig {
    fn new(bounds: ThresholdBounds, interval_minutes: u32) -> Self {
        let signal = Rc::new(Cell::new(0.0));
        let s = signal.clone();
        let source: Source = Box::new(move || s.get());
        let cfg = SwitchConfig {
            bounds,
            interval_minutes,
            ..SwitchConfig::default()
        };
        let relay = PolarizedRelay::new(SimulatedPin::new(), false).unwrap();
        let ctl = SwitchController::new(&cfg, source, relay, MemoryStore::new()).unwrap();
        Self {
            ctl,
            signal,
            decisions: Vec::new(),
        }
    }

    /// Tick every `STEP` over `[from_s, to_s]` seconds with a constant signal.
    fn feed(&mut self, value: f64, from_s: u64, to_s: u64) {
        self.signal.set(value);
        let mut t = from_s * SEC;
        while t <= to_s * SEC {
            if let TickOutcome::Decided(d) = self.ctl.tick(t) {
                self.decisions.push((t / SEC, d));
            }
            t += STEP;
        }
    }

    fn decision_at(&self, at_s: u64) -> Decision {
        self.decisions
            .iter()
            .find(|(t, _)| *t == at_s)
            .map(|(_, d)| *d)
            .unwrap_or_else(|| panic!("no decision at {at_s}s, got {:?}", self.decisions))
    }
}

#[test]
fn solar_day_scenario() {
    let mut rig = Rig::new(ThresholdBounds::new(1000.0, 0.0), 5);

    // Five minutes within bounds.
    rig.feed(500.0, 0, 300);
    assert!(!rig.decision_at(300).energize);
    assert!(!rig.ctl.relay_energized());

    // Six minutes above max, straddling the 600 s boundary.
    rig.feed(1100.0, 310, 660);
    let mid = rig.decision_at(600);
    assert_eq!(mid.above_max, Duration::from_secs(290));
    assert!(!mid.energize);

    // Back within bounds: the closed 360 s excursion is judged at 900 s.
    rig.feed(500.0, 670, 900);
    let on = rig.decision_at(900);
    assert_eq!(on.above_max, Duration::from_secs(360));
    assert!(on.energize && on.switched);
    assert!(rig.ctl.relay_energized());

    rig.feed(500.0, 910, 1200);
    let off = rig.decision_at(1200);
    assert_eq!(off.out_of_range(), Duration::ZERO);
    assert!(!off.energize && off.switched);
    assert!(!rig.ctl.relay_energized());
}

#[test]
fn within_bounds_never_energizes() {
    let mut rig = Rig::new(ThresholdBounds::new(800.0, 200.0), 5);
    rig.feed(200.0, 0, 600);
    rig.feed(800.0, 610, 1800);
    assert_eq!(rig.decisions.len(), 6);
    assert!(rig.decisions.iter().all(|(_, d)| !d.energize && !d.switched));
    assert!(!rig.ctl.relay_energized());
}

#[test]
fn excursion_longer_than_interval_energizes_next_boundary() {
    let mut rig = Rig::new(ThresholdBounds::new(800.0, 200.0), 1);
    rig.feed(50.0, 0, 70);
    rig.feed(500.0, 80, 120);
    // 80 s below min, judged at the 60 s boundary (60 s live, not more than
    // the interval) and again at 120 s where the closed window counts 80 s.
    assert!(!rig.decision_at(60).energize);
    let d = rig.decision_at(120);
    assert_eq!(d.below_min, Duration::from_secs(80));
    assert!(d.energize);
}

#[test]
fn above_and_below_excursions_add_up() {
    let mut rig = Rig::new(ThresholdBounds::new(800.0, 200.0), 5);
    rig.feed(500.0, 0, 0);
    rig.feed(900.0, 10, 170);
    rig.feed(100.0, 180, 300);
    let d = rig.decision_at(300);
    assert_eq!(d.above_max, Duration::from_secs(170));
    assert_eq!(d.below_min, Duration::from_secs(120));
    assert!(!d.energize);

    // The below-min window is still open and keeps counting from 180 s.
    rig.feed(100.0, 310, 600);
    let d = rig.decision_at(600);
    assert_eq!(d.below_min, Duration::from_secs(420));
    assert!(d.energize);
}

#[test]
fn dropouts_do_not_disturb_accounting() {
    let mut rig = Rig::new(ThresholdBounds::new(800.0, 200.0), 5);
    rig.feed(900.0, 0, 100);
    rig.feed(SENSOR_FAULT, 110, 200);
    assert_eq!(rig.ctl.monitor().last_sample(), Some(900.0));
    assert!(rig.ctl.sensor_degraded());
    rig.feed(900.0, 210, 600);
    assert!(rig.ctl.relay_energized());
    assert!(!rig.ctl.sensor_degraded());
}

#[test]
fn reset_law_after_decision() {
    let mut rig = Rig::new(ThresholdBounds::new(800.0, 200.0), 5);
    rig.feed(900.0, 0, 100);
    rig.feed(500.0, 110, 300);
    let (above, below) = rig.ctl.monitor().get_out_of_range_durations(300 * SEC);
    assert_eq!((above, below), (Duration::ZERO, Duration::ZERO));
}
