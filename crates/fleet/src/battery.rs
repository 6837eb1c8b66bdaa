//! Battery model: random drain per cycle, charge when low.

use std::ops::Range;

use rand::Rng;

pub const FULL_CHARGE: f64 = 100.0;

/// Below this level the robot stops to charge.
pub const LOW_BATTERY_THRESHOLD: f64 = 18.0;

const DRAIN_PER_CYCLE: Range<f64> = 0.2..0.8;

/// What happened to the battery after a cycle's drain.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum DepletionOutcome {
    Running,
    NeedsCharge,
}

#[derive(Debug, Copy, Clone, PartialEq)]
pub struct Battery {
    level: f64,
}

impl Default for Battery {
    fn default() -> Self {
        Self::full()
    }
}

impl Battery {
    pub fn full() -> Self {
        Self { level: FULL_CHARGE }
    }

    pub fn at(level: f64) -> Self {
        Self {
            level: level.clamp(0.0, FULL_CHARGE),
        }
    }

    pub fn level(&self) -> f64 {
        self.level
    }

    /// Level as reported on the wire: rounded, within 0..=100.
    pub fn percent(&self) -> u8 {
        self.level.round().clamp(0.0, FULL_CHARGE) as u8
    }

    /// Drain one cycle's worth of charge.
    pub fn deplete<R: Rng + ?Sized>(&mut self, rng: &mut R) -> DepletionOutcome {
        self.level = (self.level - rng.gen_range(DRAIN_PER_CYCLE)).max(0.0);
        if self.level < LOW_BATTERY_THRESHOLD {
            DepletionOutcome::NeedsCharge
        } else {
            DepletionOutcome::Running
        }
    }

    pub fn recharge(&mut self) {
        self.level = FULL_CHARGE;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    #[test]
    fn drains_until_charge_needed_then_resets() {
        let mut rng = StdRng::seed_from_u64(5);
        let mut battery = Battery::full();
        let mut cycles = 0;
        loop {
            let before = battery.level();
            let outcome = battery.deplete(&mut rng);
            let drained = before - battery.level();
            assert!((0.2 - 1e-9..0.8 + 1e-9).contains(&drained), "drained {drained}");
            cycles += 1;
            if outcome == DepletionOutcome::NeedsCharge {
                assert!(battery.level() < LOW_BATTERY_THRESHOLD);
                break;
            }
            assert!(battery.level() >= LOW_BATTERY_THRESHOLD);
        }
        // 82 points at 0.2..0.8 per cycle.
        assert!((103..=411).contains(&cycles), "cycles = {cycles}");

        battery.recharge();
        assert_eq!(battery.level(), 100.0);
    }

    #[test]
    fn percent_rounds_and_clamps() {
        assert_eq!(Battery::at(17.5).percent(), 18);
        assert_eq!(Battery::at(17.49).percent(), 17);
        assert_eq!(Battery::at(250.0).percent(), 100);
        assert_eq!(Battery::at(-3.0).percent(), 0);
    }
}
