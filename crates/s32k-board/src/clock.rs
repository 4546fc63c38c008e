//! Named clock domains.
//!
//! Each node carries either a frequency or a period; the two are
//! interconvertible. Consumers hold a shared [`ClockRef`], never a copy of
//! the value.

use std::fmt;
use std::sync::Arc;

use log::debug;
use serde::{Deserialize, Serialize};

use crate::error::{BoardError, Result};

const NS_PER_SECOND: f64 = 1_000_000_000.0;

/// The role a clock plays on the board.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ClockDomain {
    /// CPU/system clock.
    System,
    /// Reference clock (SysTick external reference).
    Reference,
    /// Platform ("fast") peripheral bus clock.
    FastBus,
    /// Slow peripheral bus clock.
    SlowBus,
}

impl fmt::Display for ClockDomain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ClockDomain::System => "system",
            ClockDomain::Reference => "reference",
            ClockDomain::FastBus => "fast-bus",
            ClockDomain::SlowBus => "slow-bus",
        };
        f.write_str(s)
    }
}

/// A clock value in exactly one of the two representations.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ClockValue {
    /// Cycles per second.
    Frequency { hz: u64 },
    /// Nanoseconds per cycle.
    Period { ns: f64 },
}

impl ClockValue {
    /// Frequency in Hz, rounded to the nearest integer.
    pub fn hz(&self) -> u64 {
        match *self {
            ClockValue::Frequency { hz } => hz,
            ClockValue::Period { ns } if ns > 0.0 => (NS_PER_SECOND / ns).round() as u64,
            ClockValue::Period { .. } => 0,
        }
    }

    /// Period in nanoseconds.
    pub fn period_ns(&self) -> f64 {
        match *self {
            ClockValue::Period { ns } => ns,
            ClockValue::Frequency { hz } if hz > 0 => NS_PER_SECOND / hz as f64,
            ClockValue::Frequency { .. } => 0.0,
        }
    }

    fn validate(&self, name: &str) -> Result<()> {
        let ok = match *self {
            ClockValue::Frequency { hz } => hz > 0,
            ClockValue::Period { ns } => ns.is_finite() && ns > 0.0,
        };
        if ok {
            Ok(())
        } else {
            Err(BoardError::invalid(format!(
                "clock '{name}' must have a positive value, got {self:?}"
            )))
        }
    }
}

/// A defined clock node.
#[derive(Debug, PartialEq)]
pub struct Clock {
    name: String,
    value: ClockValue,
}

impl Clock {
    /// Clock name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The value as defined.
    pub fn value(&self) -> ClockValue {
        self.value
    }

    /// Frequency in Hz.
    pub fn hz(&self) -> u64 {
        self.value.hz()
    }
}

/// Shared handle to a clock node.
pub type ClockRef = Arc<Clock>;

/// The set of named clocks on a board.
#[derive(Debug, Default)]
pub struct ClockTree {
    nodes: Vec<ClockRef>,
}

impl ClockTree {
    /// Create an empty clock tree.
    pub fn new() -> Self {
        Self::default()
    }

    /// Define a clock by frequency.
    pub fn define_frequency(&mut self, name: impl Into<String>, hz: u64) -> Result<ClockRef> {
        self.define(name.into(), ClockValue::Frequency { hz })
    }

    /// Define a clock by period.
    pub fn define_period(&mut self, name: impl Into<String>, ns: f64) -> Result<ClockRef> {
        self.define(name.into(), ClockValue::Period { ns })
    }

    /// Define a clock from an already-built value.
    pub fn define(&mut self, name: String, value: ClockValue) -> Result<ClockRef> {
        value.validate(&name)?;
        if self.nodes.iter().any(|c| c.name == name) {
            return Err(BoardError::DuplicateClock { name });
        }
        debug!("define clock '{}' = {} Hz", name, value.hz());
        let clock = Arc::new(Clock { name, value });
        self.nodes.push(Arc::clone(&clock));
        Ok(clock)
    }

    /// Look up a clock by name.
    pub fn lookup(&self, name: &str) -> Result<ClockRef> {
        self.nodes
            .iter()
            .find(|c| c.name == name)
            .cloned()
            .ok_or_else(|| BoardError::UnknownClock {
                name: name.to_string(),
            })
    }

    /// Number of defined clocks.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Whether no clocks are defined.
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// All clocks in definition order.
    pub fn iter(&self) -> impl Iterator<Item = &ClockRef> {
        self.nodes.iter()
    }
}
