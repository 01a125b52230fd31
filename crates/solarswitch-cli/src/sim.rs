use std::cell::Cell;
use std::rc::Rc;
use std::time::Duration;

use anyhow::{bail, Result};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use solarswitch_core::{AdcChannel, HardwareError, IndexSource, MAX_INDEX_VALUE, SENSOR_FAULT};

use crate::profile::{value_at, Segment};

/// Wider than any index value or ADC count.
pub const MAX_NOISE: f64 = 65_535.0;

/// A profile replayed against a shared simulated clock, with optional
/// uniform noise and random dropouts.
struct Replay {
    segments: Vec<Segment>,
    clock_ms: Rc<Cell<u64>>,
    noise: f64,
    dropout: f64,
    rng: StdRng,
}

impl Replay {
    fn new(segments: Vec<Segment>, clock_ms: Rc<Cell<u64>>, noise: f64, dropout: f64, seed: u64) -> Result<Self> {
        if !noise.is_finite() || noise.abs() > MAX_NOISE {
            bail!("noise must be a finite amplitude up to {MAX_NOISE}");
        }
        if !(0.0..=1.0).contains(&dropout) {
            bail!("dropout must be within 0..=1");
        }
        Ok(Self {
            segments,
            clock_ms,
            noise: noise.abs(),
            dropout,
            rng: StdRng::seed_from_u64(seed),
        })
    }

    /// `None` past the end of the profile or on a dropout.
    fn sample(&mut self) -> Option<f64> {
        let t = Duration::from_millis(self.clock_ms.get());
        let base = value_at(&self.segments, t)?;
        if self.dropout > 0.0 && self.rng.gen_bool(self.dropout) {
            return None;
        }
        let jitter = if self.noise > 0.0 {
            self.rng.gen_range(-self.noise..=self.noise)
        } else {
            0.0
        };
        Some(base + jitter)
    }
}

/// Profile values are index values fed straight to the controller.
pub struct ProfileSource(Replay);

impl ProfileSource {
    pub fn new(segments: Vec<Segment>, clock_ms: Rc<Cell<u64>>, noise: f64, dropout: f64, seed: u64) -> Result<Self> {
        Ok(Self(Replay::new(segments, clock_ms, noise, dropout, seed)?))
    }
}

impl IndexSource for ProfileSource {
    fn read_index(&mut self) -> f64 {
        match self.0.sample() {
            Some(v) => v.clamp(0.0, MAX_INDEX_VALUE * 2.0),
            None => SENSOR_FAULT,
        }
    }
}

/// Profile values are raw ADC counts, read through the divider sensor.
pub struct ProfileAdc {
    replay: Replay,
    max_reading: f64,
}

impl ProfileAdc {
    pub fn new(
        segments: Vec<Segment>,
        clock_ms: Rc<Cell<u64>>,
        noise: f64,
        dropout: f64,
        seed: u64,
        max_reading: f64,
    ) -> Result<Self> {
        Ok(Self {
            replay: Replay::new(segments, clock_ms, noise, dropout, seed)?,
            max_reading: max_reading.clamp(0.0, f64::from(u16::MAX)),
        })
    }
}

impl AdcChannel for ProfileAdc {
    fn read_raw(&mut self) -> Result<u16, HardwareError> {
        let v = self
            .replay
            .sample()
            .ok_or_else(|| HardwareError::Adc("no conversion".into()))?;
        Ok(v.clamp(0.0, self.max_reading).round() as u16)
    }
}
