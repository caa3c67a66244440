//! Duty-cycle based power model.
//!
//! Maps a PWM reading to instantaneous draw and integrates it over an elapsed
//! interval. Operation below the effective duty threshold draws nothing; above
//! it, draw scales linearly with the duty fraction.

use crate::sensor::SensorReading;
use serde::{Deserialize, Serialize};

/// Motor driver characteristics.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PowerSpecs {
    #[serde(default = "default_max_pwm")]
    pub max_pwm: f64,
    #[serde(default = "default_min_effective_duty_fraction")]
    pub min_effective_duty_fraction: f64,
    #[serde(default = "default_max_power_watts")]
    pub max_power_watts: f64,
}

fn default_max_pwm() -> f64 {
    255.0
}

fn default_min_effective_duty_fraction() -> f64 {
    0.1
}

fn default_max_power_watts() -> f64 {
    100.0
}

impl Default for PowerSpecs {
    fn default() -> Self {
        Self {
            max_pwm: default_max_pwm(),
            min_effective_duty_fraction: default_min_effective_duty_fraction(),
            max_power_watts: default_max_power_watts(),
        }
    }
}

/// Price of one kWh, in the billing currency.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Tariff {
    #[serde(default = "default_per_kwh")]
    pub per_kwh: f64,
}

fn default_per_kwh() -> f64 {
    1500.0
}

impl Default for Tariff {
    fn default() -> Self {
        Self {
            per_kwh: default_per_kwh(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct EnergyDelta {
    pub kwh: f64,
    pub cost: f64,
}

impl EnergyDelta {
    /// True when the delta can be added to a ledger without breaking its invariants.
    pub fn is_accumulable(&self) -> bool {
        self.kwh.is_finite() && self.cost.is_finite() && self.kwh >= 0.0 && self.cost >= 0.0
    }
}

/// Instantaneous draw in watts for a duty-cycle reading.
pub fn instantaneous_watts(pwm_duty_cycle: f64, specs: &PowerSpecs) -> f64 {
    let clamped = pwm_duty_cycle.max(0.0).min(specs.max_pwm);
    let duty_fraction = clamped / specs.max_pwm;
    if duty_fraction < specs.min_effective_duty_fraction {
        0.0
    } else {
        duty_fraction * specs.max_power_watts
    }
}

pub fn estimate_incremental_energy(
    reading: &SensorReading,
    elapsed_hours: f64,
    specs: &PowerSpecs,
    tariff: &Tariff,
) -> EnergyDelta {
    let watts = instantaneous_watts(reading.pwm_duty_cycle, specs);
    let kwh = (watts / 1000.0) * elapsed_hours;
    EnergyDelta {
        kwh,
        cost: kwh * tariff.per_kwh,
    }
}
