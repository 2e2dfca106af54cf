//! Tunable constants shared by the routing and presentation layers.
//!
//! Every field has a default, so a settings file only needs to list the
//! values it overrides.

use serde::{Deserialize, Serialize};

use crate::error::ErrorKind;

/// Errors produced by [`Settings::validate`].
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum SettingsError {
    #[error("setting `{field}` must be positive and finite, got {value}")]
    NotPositive { field: &'static str, value: f64 },
    #[error("setting `{field}` must be non-negative and finite, got {value}")]
    Negative { field: &'static str, value: f64 },
}

impl SettingsError {
    pub fn kind(&self) -> ErrorKind {
        ErrorKind::InvalidArgument
    }
}

/// Engine-wide configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Constant every node's dispositions sum to.
    pub dispositions_sum: f64,
    /// Gap kept between the two opposing connections of a node pair.
    pub connection_spacing: f64,
    /// Map units per unit of production radius.
    pub unit_scale: f64,
    /// Throughput units per map unit of connection width.
    pub throughput_scale: f64,
    /// Size of the draggable disposition heads.
    pub controls_size: f64,
    /// Absolute tolerance (scaled by the sum when it exceeds 1) for the
    /// disposition conservation check.
    pub sum_tolerance: f64,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            dispositions_sum: 15.0,
            connection_spacing: 0.1,
            unit_scale: 1.0,
            throughput_scale: 1.0,
            controls_size: 1.0,
            sum_tolerance: 1e-9,
        }
    }
}

impl Settings {
    pub fn validate(&self) -> Result<(), SettingsError> {
        let positive = [
            ("dispositions_sum", self.dispositions_sum),
            ("unit_scale", self.unit_scale),
            ("throughput_scale", self.throughput_scale),
            ("sum_tolerance", self.sum_tolerance),
        ];
        for (field, value) in positive {
            if !(value.is_finite() && value > 0.0) {
                return Err(SettingsError::NotPositive { field, value });
            }
        }
        let non_negative = [
            ("connection_spacing", self.connection_spacing),
            ("controls_size", self.controls_size),
        ];
        for (field, value) in non_negative {
            if !(value.is_finite() && value >= 0.0) {
                return Err(SettingsError::Negative { field, value });
            }
        }
        Ok(())
    }

    /// Rendered width of a connection with the given throughput.
    pub fn connection_width(&self, throughput: f64) -> f64 {
        throughput / self.throughput_scale
    }
}
