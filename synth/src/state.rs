//! Per-run generator state.
//!
//! Outage and null spike are two independent re-triggerable timers. A new
//! trigger replaces whatever the timer held, including a spike's field set.

use chrono::NaiveDate;
use std::collections::BTreeSet;

use crate::types::Field;

/// Days left in the current full outage.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OutageTimer {
    remaining: u32,
}

impl OutageTimer {
    pub fn remaining(&self) -> u32 {
        self.remaining
    }

    pub fn is_active(&self) -> bool {
        self.remaining > 0
    }

    /// Overwrite the timer. A zero length ends any outage in progress.
    pub fn trigger(&mut self, days: u32) {
        self.remaining = days;
    }

    /// Consume one outage day.
    pub fn tick(&mut self) {
        self.remaining = self.remaining.saturating_sub(1);
    }
}

/// Days left in the current null spike and the fields it targets.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NullSpike {
    remaining: u32,
    fields: BTreeSet<Field>,
}

impl NullSpike {
    pub fn remaining(&self) -> u32 {
        self.remaining
    }

    pub fn is_active(&self) -> bool {
        self.remaining > 0
    }

    pub fn fields(&self) -> &BTreeSet<Field> {
        &self.fields
    }

    /// Whether records emitted now get the severity draw for `field`.
    pub fn targets(&self, field: Field) -> bool {
        self.fields.contains(&field)
    }

    /// Start a spike, replacing an unfinished one.
    pub fn trigger(&mut self, days: u32, fields: impl IntoIterator<Item = Field>) {
        self.remaining = days;
        self.fields = fields.into_iter().collect();
    }

    /// Consume one emitted day; clears the field set on the last one.
    pub fn decay(&mut self) {
        if self.remaining > 0 {
            self.remaining -= 1;
            if self.remaining == 0 {
                self.fields.clear();
            }
        }
    }
}

/// State threaded through each day step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeneratorState {
    /// Day about to be simulated
    pub day: NaiveDate,
    pub outage: OutageTimer,
    pub spike: NullSpike,
}

impl GeneratorState {
    pub fn new(start: NaiveDate) -> Self {
        Self {
            day: start,
            outage: OutageTimer::default(),
            spike: NullSpike::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_outage_zero_trigger_ends_outage() {
        let mut outage = OutageTimer::default();
        outage.trigger(5);
        outage.tick();
        assert_eq!(outage.remaining(), 4);
        outage.trigger(0);
        assert!(!outage.is_active());
        outage.tick();
        assert_eq!(outage.remaining(), 0);
    }

    #[test]
    fn test_spike_retrigger_replaces_fields() {
        let mut spike = NullSpike::default();
        spike.trigger(5, [Field::Distance, Field::Gravity]);
        spike.decay();
        spike.trigger(2, [Field::AvgTemp]);

        assert_eq!(spike.remaining(), 2);
        assert!(spike.targets(Field::AvgTemp));
        assert!(!spike.targets(Field::Distance));
    }

    #[test]
    fn test_spike_clears_fields_on_last_day() {
        let mut spike = NullSpike::default();
        spike.trigger(2, [Field::OrbitalPeriod]);
        spike.decay();
        assert!(spike.targets(Field::OrbitalPeriod));
        spike.decay();
        assert!(!spike.is_active());
        assert!(spike.fields().is_empty());
        spike.decay();
        assert_eq!(spike.remaining(), 0);
    }
}
