//! Sensor modes: which sensors a receptor looks at, and at what resolution.

use crate::config::{Sensor, DEFAULT_SENSOR_RESOLUTION};
use crate::error::{MonaError, Result};

#[derive(Debug, Clone, PartialEq)]
pub struct SensorMode {
    pub mask: Vec<bool>,
    // Quantization step; 0 keeps exact values.
    pub resolution: Sensor,
}

impl SensorMode {
    /// Mode 0: every sensor, exact match.
    pub fn all(num_sensors: usize) -> Self {
        Self {
            mask: vec![true; num_sensors],
            resolution: DEFAULT_SENSOR_RESOLUTION,
        }
    }

    pub fn new(mask: Vec<bool>, resolution: Option<Sensor>, num_sensors: usize) -> Result<Self> {
        if mask.len() != num_sensors {
            return Err(MonaError::InvalidSensorMask {
                expected: num_sensors,
                got: mask.len(),
            });
        }
        let resolution = resolution.unwrap_or(DEFAULT_SENSOR_RESOLUTION);
        if !(resolution >= 0.0) {
            return Err(MonaError::InvalidResolution(resolution));
        }
        Ok(Self { mask, resolution })
    }

    /// Apply mask and resolution; masked-off sensors become don't-care.
    pub fn quantize(&self, sensors: &[Sensor]) -> Vec<Option<Sensor>> {
        sensors
            .iter()
            .zip(&self.mask)
            .map(|(&s, &on)| {
                if !on {
                    None
                } else if self.resolution > 0.0 {
                    Some((s / self.resolution).round() * self.resolution)
                } else {
                    Some(s)
                }
            })
            .collect()
    }
}

pub(crate) fn describe_pattern(pattern: &[Option<Sensor>]) -> String {
    let parts: Vec<String> = pattern
        .iter()
        .map(|s| match s {
            Some(v) => format!("{v}"),
            None => "*".to_string(),
        })
        .collect();
    parts.join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quantize_masks_and_rounds() {
        let mode = SensorMode::new(vec![true, false, true], Some(0.5), 3).unwrap();
        let q = mode.quantize(&[0.7, 9.0, 1.1]);
        assert_eq!(q, vec![Some(0.5), None, Some(1.0)]);
        assert_eq!(describe_pattern(&q), "0.5 * 1");
    }

    #[test]
    fn exact_mode_keeps_values() {
        let mode = SensorMode::all(2);
        assert_eq!(mode.quantize(&[0.3, 2.0]), vec![Some(0.3), Some(2.0)]);
    }

    #[test]
    fn rejects_bad_modes() {
        assert!(matches!(
            SensorMode::new(vec![true], None, 2),
            Err(MonaError::InvalidSensorMask { expected: 2, got: 1 })
        ));
        assert!(matches!(
            SensorMode::new(vec![true], Some(-1.0), 1),
            Err(MonaError::InvalidResolution(_))
        ));
    }
}
