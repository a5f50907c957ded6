//! Validated configuration for a [`crate::Simulator`].

use core::fmt;

use rand::Rng;
use redcode::FieldValue;

/// All tunable limits a [`crate::Simulator`] is constructed from.
///
/// Mirrors the `SimulatorConfig` recognized by the batch runner: core size,
/// per-warrior process limit, cycle budget, read/write fold denominators,
/// maximum warrior length, minimum placement distance, and an optional fixed
/// placement for the second warrior.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SimulatorConfig {
    /// Number of addressable cells in the core. Must be at least 3.
    pub core_size: FieldValue,
    /// Maximum number of queued processes per warrior. Must be at least 1.
    pub processes: FieldValue,
    /// Number of cycles to run before declaring a tie. Must be at least 1.
    pub cycles: FieldValue,
    /// Fold denominator applied to read-only operand resolution. Must be at
    /// least 1.
    pub read_limit: FieldValue,
    /// Fold denominator applied to write operand resolution. Must be at
    /// least 1.
    pub write_limit: FieldValue,
    /// Maximum number of instructions a single warrior may compile to.
    pub length: FieldValue,
    /// Minimum required separation between warrior placements.
    pub distance: FieldValue,
    /// Forced placement offset for the second warrior, or 0 to place it
    /// randomly within the band `length` permits.
    pub fixed: FieldValue,
}

impl Default for SimulatorConfig {
    /// The 88-to-94 standard battle parameters: an 8000-cell core, 8000
    /// processes and cycles, and warriors up to 100 instructions long.
    fn default() -> Self {
        Self {
            core_size: 8000,
            processes: 8000,
            cycles: 80_000,
            read_limit: 8000,
            write_limit: 8000,
            length: 100,
            distance: 100,
            fixed: 0,
        }
    }
}

impl SimulatorConfig {
    /// Checks every field against the constraints documented on
    /// [`SimulatorConfig`].
    ///
    /// # Errors
    ///
    /// Returns the first violated constraint as a [`ConfigError`].
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.core_size < 3 {
            return Err(ConfigError::CoreSizeTooSmall);
        }
        if self.processes < 1 {
            return Err(ConfigError::InvalidProcessLimit);
        }
        if self.read_limit < 1 {
            return Err(ConfigError::InvalidReadLimit);
        }
        if self.write_limit < 1 {
            return Err(ConfigError::InvalidWriteLimit);
        }
        if self.cycles < 1 {
            return Err(ConfigError::InvalidCycleCount);
        }
        if self.length > self.core_size {
            return Err(ConfigError::LengthExceedsCoreSize);
        }
        if self.length.checked_add(self.distance).map_or(true, |sum| sum > self.core_size)
        {
            return Err(ConfigError::DistanceExceedsCoreSize);
        }
        if self.fixed != 0
            && self
                .fixed
                .checked_add(self.length)
                .and_then(|sum| sum.checked_add(1))
                .map_or(true, |sum| sum > self.core_size)
        {
            return Err(ConfigError::InvalidFixedStart);
        }
        Ok(())
    }

    /// Chooses a placement offset for the second warrior: the configured
    /// `fixed` offset if non-zero, otherwise a uniformly random offset in the
    /// band `[2 * length, core_size - length - 1]`.
    ///
    /// Callers should validate the configuration first; an unvalidated
    /// configuration can make this band empty or inverted.
    #[must_use]
    pub fn second_warrior_start(&self) -> FieldValue {
        if self.fixed != 0 {
            return self.fixed;
        }
        let min_start = 2_u32.saturating_mul(self.length);
        let max_start = self.core_size.saturating_sub(self.length).saturating_sub(1);
        if min_start >= max_start {
            return min_start.min(max_start);
        }
        rand::thread_rng().gen_range(min_start..=max_start)
    }
}

/// A [`SimulatorConfig`] failed validation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigError {
    /// `core_size` is smaller than the minimum of 3.
    CoreSizeTooSmall,
    /// `processes` is 0.
    InvalidProcessLimit,
    /// `read_limit` is 0.
    InvalidReadLimit,
    /// `write_limit` is 0.
    InvalidWriteLimit,
    /// `cycles` is 0.
    InvalidCycleCount,
    /// `length` is greater than `core_size`.
    LengthExceedsCoreSize,
    /// `length + distance` is greater than `core_size`.
    DistanceExceedsCoreSize,
    /// `fixed` is non-zero and `fixed + length + 1` is greater than
    /// `core_size`.
    InvalidFixedStart,
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let message = match self {
            Self::CoreSizeTooSmall => "the minimum core size is 3",
            Self::InvalidProcessLimit => "invalid process limit",
            Self::InvalidReadLimit => "invalid read limit",
            Self::InvalidWriteLimit => "invalid write limit",
            Self::InvalidCycleCount => "invalid cycle count",
            Self::LengthExceedsCoreSize => "invalid warrior length",
            Self::DistanceExceedsCoreSize => "invalid distance",
            Self::InvalidFixedStart => "invalid fixed starting point",
        };
        write!(f, "configuration error: {message}")
    }
}
