//! Units of measure for health readings.
//!
//! Sources report in their native unit (metres, kilocalories, ...). Readings
//! are converted exactly once, in [`SampleReader`](crate::SampleReader), into
//! the canonical unit of their metric. Nothing downstream rescales values.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::YogaError;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Dimension {
    Length,
    Energy,
    Frequency,
    Ratio,
    BodyMassIndex,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Unit {
    Meters,
    Kilometers,
    Centimeters,
    Kilocalories,
    Kilojoules,
    BeatsPerMinute,
    /// 0..=100
    Percent,
    /// 0.0..=1.0
    Fraction,
    KilogramsPerSquareMeter,
}

impl Unit {
    pub fn dimension(self) -> Dimension {
        match self {
            Unit::Meters | Unit::Kilometers | Unit::Centimeters => Dimension::Length,
            Unit::Kilocalories | Unit::Kilojoules => Dimension::Energy,
            Unit::BeatsPerMinute => Dimension::Frequency,
            Unit::Percent | Unit::Fraction => Dimension::Ratio,
            Unit::KilogramsPerSquareMeter => Dimension::BodyMassIndex,
        }
    }

    /// Factor that converts one of this unit into the dimension's base unit
    /// (metres, kilocalories, bpm, fraction, kg/m²).
    fn base_factor(self) -> f64 {
        match self {
            Unit::Meters => 1.0,
            Unit::Kilometers => 1000.0,
            Unit::Centimeters => 0.01,
            Unit::Kilocalories => 1.0,
            Unit::Kilojoules => 1.0 / 4.184,
            Unit::BeatsPerMinute => 1.0,
            Unit::Percent => 0.01,
            Unit::Fraction => 1.0,
            Unit::KilogramsPerSquareMeter => 1.0,
        }
    }

    pub fn symbol(self) -> &'static str {
        match self {
            Unit::Meters => "m",
            Unit::Kilometers => "km",
            Unit::Centimeters => "cm",
            Unit::Kilocalories => "kcal",
            Unit::Kilojoules => "kJ",
            Unit::BeatsPerMinute => "bpm",
            Unit::Percent => "%",
            Unit::Fraction => "",
            Unit::KilogramsPerSquareMeter => "kg/m²",
        }
    }
}

impl fmt::Display for Unit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.symbol())
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Quantity {
    pub value: f64,
    pub unit: Unit,
}

impl Quantity {
    pub fn new(value: f64, unit: Unit) -> Self {
        Self { value, unit }
    }

    /// Convert into `target`. Fails when the dimensions differ.
    pub fn to(self, target: Unit) -> Result<Quantity, YogaError> {
        if self.unit == target {
            return Ok(self);
        }
        if self.unit.dimension() != target.dimension() {
            return Err(YogaError::InvalidInput(format!(
                "cannot convert {} to {}",
                self.unit.symbol(),
                target.symbol()
            )));
        }
        let base = self.value * self.unit.base_factor();
        Ok(Quantity::new(base / target.base_factor(), target))
    }
}

impl fmt::Display for Quantity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.2} {}", self.value, self.unit)
    }
}
