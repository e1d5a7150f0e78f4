use serde::{Deserialize, Serialize};

/// A single scalar reading produced by a collector.
///
/// `unit` is semantic (`"%"`, `"MB/s"`, `"MHz"`, `"W"`, `"C"`, `"GiB"`) and is
/// carried alongside the value rather than encoded in the field name, so
/// collectors and the renderer can treat every metric uniformly.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Sample {
    pub value: f64,
    pub unit: String,
    pub label: String,
}

impl Sample {
    pub fn new(value: f64, unit: impl Into<String>, label: impl Into<String>) -> Self {
        Self {
            value,
            unit: unit.into(),
            label: label.into(),
        }
    }
}
