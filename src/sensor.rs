use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// One snapshot from the motor sensors.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SensorReading {
    #[serde(rename = "pwm")]
    pub pwm_duty_cycle: f64,
    pub rpm: f64,
    #[serde(alias = "berat")]
    pub load_weight: f64,
}

impl SensorReading {
    /// Build a reading from loosely typed JSON values: numbers pass through,
    /// numeric strings are parsed, anything else becomes zero.
    pub fn coerce(pwm: &Value, rpm: &Value, load_weight: &Value) -> Self {
        Self {
            pwm_duty_cycle: coerce_number(pwm),
            rpm: coerce_number(rpm),
            load_weight: coerce_number(load_weight),
        }
    }
}

/// Reading fields as they arrive from producers, before coercion.
#[derive(Debug, Default, Deserialize)]
pub struct RawReading {
    pub pwm: Option<Value>,
    pub rpm: Option<Value>,
    #[serde(alias = "berat")]
    pub load_weight: Option<Value>,
}

impl RawReading {
    /// None if any field is missing or null.
    pub fn into_reading(self) -> Option<SensorReading> {
        match (self.pwm, self.rpm, self.load_weight) {
            (Some(pwm), Some(rpm), Some(load)) => Some(SensorReading::coerce(&pwm, &rpm, &load)),
            _ => None,
        }
    }

    /// Coerce every field, counting missing ones as zero.
    pub fn coerce_all(self) -> SensorReading {
        let field = |v: Option<Value>| v.unwrap_or(Value::Null);
        SensorReading::coerce(&field(self.pwm), &field(self.rpm), &field(self.load_weight))
    }
}

fn coerce_number(value: &Value) -> f64 {
    let n = match value {
        Value::Number(n) => n.as_f64().unwrap_or(0.0),
        Value::String(s) => s.trim().parse::<f64>().unwrap_or(0.0),
        Value::Bool(true) => 1.0,
        _ => 0.0,
    };
    if n.is_finite() {
        n
    } else {
        0.0
    }
}

/// The latest raw reading together with the time it was written.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct StoredReading {
    #[serde(flatten)]
    pub reading: SensorReading,
    #[serde(rename = "timestamp")]
    pub recorded_at: DateTime<Utc>,
}

/// A processed reading with the ledger totals it was observed against.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct EnrichedRecord {
    #[serde(flatten)]
    pub reading: SensorReading,
    #[serde(rename = "total_kwh")]
    pub cumulative_kwh: f64,
    #[serde(rename = "total_cost")]
    pub cumulative_cost: f64,
    #[serde(rename = "timestamp")]
    pub observed_at_millis: i64,
}
