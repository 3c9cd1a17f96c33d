//! Satellite position records.

use std::collections::BTreeMap;

use crate::types::SatellitePosition;

/// One known orbital slot: position, display name, rotor calibration.
#[derive(Debug, Clone)]
pub struct SatelliteRecord {
    pub position: SatellitePosition,
    pub name: String,
    /// Motor/rotor position for DiSEqC positioners, 0 when uncalibrated.
    pub motor_position: i32,
}

impl SatelliteRecord {
    pub fn new(position: SatellitePosition, name: impl Into<String>) -> Self {
        SatelliteRecord {
            position,
            name: name.into(),
            motor_position: 0,
        }
    }
}

/// Known satellites keyed by position, ascending.
pub type SatelliteMap = BTreeMap<SatellitePosition, SatelliteRecord>;

/// Human-readable label for a position, e.g. `19.2E` or `0.8W`.
/// Positions are stored in tenths of a degree.
pub fn position_label(position: SatellitePosition) -> String {
    let abs = (position as i32).abs();
    let dir = if position < 0 { 'W' } else { 'E' };
    format!("{}.{}{}", abs / 10, abs % 10, dir)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_position_label() {
        assert_eq!(position_label(192), "19.2E");
        assert_eq!(position_label(-8), "0.8W");
        assert_eq!(position_label(0), "0.0E");
    }
}
