//! Hardware seams: relay output and ADC input.

use crate::error::HardwareError;

/// Something that can energize or release the relay coil.
pub trait Relay {
    fn set_energized(&mut self, energized: bool) -> Result<(), HardwareError>;
}

/// Digital output line.
pub trait OutputPin {
    fn set_level(&mut self, high: bool) -> Result<(), HardwareError>;
    fn is_set_high(&self) -> bool;
}

/// One ADC channel returning raw counts.
pub trait AdcChannel {
    fn read_raw(&mut self) -> Result<u16, HardwareError>;
}

/// Relay on a GPIO line. With `active_low`, driving the line low energizes
/// the coil (e.g. a relay board wired directly to the pin); without it a
/// high level energizes (e.g. through a ULN2003 driver).
#[derive(Debug)]
pub struct PolarizedRelay<P> {
    pin: P,
    active_low: bool,
}

impl<P: OutputPin> PolarizedRelay<P> {
    /// Wraps `pin` and immediately drives it to the released level.
    pub fn new(pin: P, active_low: bool) -> Result<Self, HardwareError> {
        let mut relay = Self { pin, active_low };
        relay.set_energized(false)?;
        Ok(relay)
    }

    pub fn is_energized(&self) -> bool {
        self.pin.is_set_high() != self.active_low
    }

    pub fn pin(&self) -> &P {
        &self.pin
    }

    pub fn pin_mut(&mut self) -> &mut P {
        &mut self.pin
    }
}

impl<P: OutputPin> Relay for PolarizedRelay<P> {
    fn set_energized(&mut self, energized: bool) -> Result<(), HardwareError> {
        self.pin.set_level(energized != self.active_low)
    }
}

/// Output line that only remembers its level; used off-target.
#[derive(Debug, Clone, Default)]
pub struct SimulatedPin {
    high: bool,
    writes: usize,
    fail: bool,
}

impl SimulatedPin {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn writes(&self) -> usize {
        self.writes
    }

    pub fn set_fail(&mut self, fail: bool) {
        self.fail = fail;
    }
}

impl OutputPin for SimulatedPin {
    fn set_level(&mut self, high: bool) -> Result<(), HardwareError> {
        if self.fail {
            return Err(HardwareError::Pin("simulated pin fault".into()));
        }
        self.high = high;
        self.writes += 1;
        Ok(())
    }

    fn is_set_high(&self) -> bool {
        self.high
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn active_high_relay() {
        let mut relay = PolarizedRelay::new(SimulatedPin::new(), false).unwrap();
        assert!(!relay.pin().is_set_high());
        relay.set_energized(true).unwrap();
        assert!(relay.pin().is_set_high());
        assert!(relay.is_energized());
    }

    #[test]
    fn active_low_relay_starts_released_high() {
        let mut relay = PolarizedRelay::new(SimulatedPin::new(), true).unwrap();
        assert!(relay.pin().is_set_high());
        assert!(!relay.is_energized());
        relay.set_energized(true).unwrap();
        assert!(!relay.pin().is_set_high());
        assert!(relay.is_energized());
    }

    #[test]
    fn failing_pin_propagates() {
        let mut pin = SimulatedPin::new();
        pin.set_fail(true);
        assert!(PolarizedRelay::new(pin, false).is_err());
    }
}
