//! Value conversion between protocol encodings and canonical entity values.
//!
//! Every function here is pure. Undefined protocol values always convert to
//! [`AttributeValue::Unknown`], never to zero.

use super::model::{AttributeValue, CoverState, OnOffState};
use crate::config::TemperatureUnit;
use crate::matter::clusters::RawValue;

/// Warmest color temperature, reported as 100 %.
pub const MIN_KELVIN: f64 = 2000.0;
/// Coolest color temperature, reported as 0 %.
pub const MAX_KELVIN: f64 = 6500.0;

/// Fully closed cover in protocol units (percent 100ths).
pub const COVER_FULL_SCALE: i64 = 10_000;

/// Maximum level/hue/saturation value on the protocol side.
pub const PROTOCOL_MAX_LEVEL: f64 = 254.0;

pub fn on_off_state(raw: &RawValue) -> OnOffState {
    match raw.as_bool() {
        Some(true) => OnOffState::On,
        Some(false) => OnOffState::Off,
        None => OnOffState::Unknown,
    }
}

/// Canonical color temperature percent to mireds.
///
/// Input is clamped to `0..=100`; 0 % is the coolest white.
pub fn percent_to_mireds(percent: f64) -> u16 {
    let percent = percent.clamp(0.0, 100.0);
    let kelvin = MAX_KELVIN - (percent / 100.0) * (MAX_KELVIN - MIN_KELVIN);
    (1_000_000.0 / kelvin).round() as u16
}

pub fn mireds_to_percent(raw: &RawValue) -> AttributeValue {
    let Some(mireds) = raw.as_int() else {
        return AttributeValue::Unknown;
    };
    if mireds <= 0 {
        return AttributeValue::Unknown;
    }

    let kelvin = 1_000_000.0 / mireds as f64;
    let percent = (MAX_KELVIN - kelvin) / (MAX_KELVIN - MIN_KELVIN) * 100.0;
    AttributeValue::Number(percent.clamp(0.0, 100.0).round())
}

pub fn hue_to_degrees(raw: &RawValue) -> AttributeValue {
    match raw.as_int() {
        Some(hue) => AttributeValue::Number((hue as f64 / PROTOCOL_MAX_LEVEL * 360.0).round()),
        None => AttributeValue::Unknown,
    }
}

pub fn degrees_to_hue(degrees: f64) -> u8 {
    (degrees / 360.0 * PROTOCOL_MAX_LEVEL)
        .round()
        .clamp(0.0, PROTOCOL_MAX_LEVEL) as u8
}

/// Protocol level or saturation (0-based) to the canonical 1-based value.
pub fn level_to_canonical(raw: &RawValue) -> AttributeValue {
    match raw.as_int() {
        Some(level) => AttributeValue::Number((level + 1) as f64),
        None => AttributeValue::Unknown,
    }
}

pub fn canonical_to_level(value: f64) -> u8 {
    (value.round() - 1.0).clamp(0.0, PROTOCOL_MAX_LEVEL) as u8
}

/// Temperature in hundredths of a degree Celsius.
pub fn temperature_value(raw: &RawValue, unit: TemperatureUnit) -> AttributeValue {
    let Some(centi) = raw.as_int() else {
        return AttributeValue::Unknown;
    };
    let celsius = centi as f64 / 100.0;
    match unit {
        TemperatureUnit::Celsius => AttributeValue::Number(celsius),
        TemperatureUnit::Fahrenheit => AttributeValue::Number(celsius * 1.8 + 32.0),
    }
}

/// Relative humidity in hundredths of a percent.
pub fn humidity_value(raw: &RawValue) -> AttributeValue {
    match raw.as_int() {
        Some(centi) => AttributeValue::Number(centi as f64 / 100.0),
        None => AttributeValue::Unknown,
    }
}

/// Lift or tilt position in percent 100ths, inverted when configured.
pub fn position_100ths(raw: &RawValue, inverted: bool) -> Option<i64> {
    let value = raw.as_int()?;
    Some(if inverted {
        COVER_FULL_SCALE - value
    } else {
        value
    })
}

pub fn position_to_percent(raw: &RawValue, inverted: bool) -> AttributeValue {
    match position_100ths(raw, inverted) {
        Some(value) => AttributeValue::Number(value as f64 / 100.0),
        None => AttributeValue::Unknown,
    }
}

/// Canonical percent to protocol percent 100ths.
pub fn percent_to_position(percent: f64, inverted: bool) -> u16 {
    let value = (percent.clamp(0.0, 100.0) * 100.0).round() as i64;
    let value = if inverted {
        COVER_FULL_SCALE - value
    } else {
        value
    };
    value.clamp(0, COVER_FULL_SCALE) as u16
}

/// Cover motion state from current and target lift position in percent.
pub fn cover_state(current: Option<f64>, target: Option<f64>) -> CoverState {
    let (Some(current), Some(target)) = (current, target) else {
        return CoverState::Unknown;
    };

    if current < target {
        CoverState::Opening
    } else if current > target {
        CoverState::Closing
    } else if current == 100.0 {
        CoverState::Closed
    } else {
        CoverState::Open
    }
}

/// Cover state from raw lift positions, applying the inversion setting.
pub fn cover_state_from_raw(current: &RawValue, target: &RawValue, inverted: bool) -> CoverState {
    cover_state(
        position_to_percent(current, inverted).as_number(),
        position_to_percent(target, inverted).as_number(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn number(value: AttributeValue) -> f64 {
        value.as_number().unwrap()
    }

    #[test]
    fn test_on_off() {
        assert_eq!(on_off_state(&RawValue::Bool(true)), OnOffState::On);
        assert_eq!(on_off_state(&RawValue::Bool(false)), OnOffState::Off);
        assert_eq!(on_off_state(&RawValue::Undefined), OnOffState::Unknown);
        assert_eq!(on_off_state(&RawValue::Int(1)), OnOffState::Unknown);
    }

    #[test]
    fn test_color_temperature_endpoints() {
        assert_eq!(percent_to_mireds(0.0), 154);
        assert_eq!(percent_to_mireds(100.0), 500);
        assert_eq!(number(mireds_to_percent(&RawValue::Int(154))), 0.0);
        assert_eq!(number(mireds_to_percent(&RawValue::Int(500))), 100.0);
    }

    #[test]
    fn test_color_temperature_round_trip_within_one() {
        for percent in 0..=100 {
            let mireds = percent_to_mireds(percent as f64);
            let back = number(mireds_to_percent(&RawValue::Int(mireds as i64)));
            assert!(
                (back - percent as f64).abs() <= 1.0,
                "{}% -> {} mireds -> {}%",
                percent,
                mireds,
                back
            );
        }
    }

    #[test]
    fn test_color_temperature_clamps() {
        assert_eq!(percent_to_mireds(150.0), percent_to_mireds(100.0));
        assert_eq!(percent_to_mireds(-20.0), percent_to_mireds(0.0));
        // 1000 mireds is warmer than 2000 K
        assert_eq!(number(mireds_to_percent(&RawValue::Int(1000))), 100.0);
        assert!(mireds_to_percent(&RawValue::Undefined).is_unknown());
        assert!(mireds_to_percent(&RawValue::Int(0)).is_unknown());
    }

    #[test]
    fn test_hue() {
        assert_eq!(number(hue_to_degrees(&RawValue::Int(254))), 360.0);
        assert_eq!(number(hue_to_degrees(&RawValue::Int(127))), 180.0);
        assert_eq!(degrees_to_hue(180.0), 127);
        assert_eq!(degrees_to_hue(400.0), 254);
        assert!(hue_to_degrees(&RawValue::Undefined).is_unknown());
    }

    #[test]
    fn test_level_and_saturation_offset() {
        assert_eq!(number(level_to_canonical(&RawValue::Int(0))), 1.0);
        assert_eq!(number(level_to_canonical(&RawValue::Int(254))), 255.0);
        assert_eq!(canonical_to_level(1.0), 0);
        assert_eq!(canonical_to_level(255.0), 254);
        assert_eq!(canonical_to_level(0.0), 0);
        assert!(level_to_canonical(&RawValue::Undefined).is_unknown());
    }

    #[test]
    fn test_sensor_values() {
        let raw = RawValue::Int(2150);
        assert_eq!(number(temperature_value(&raw, TemperatureUnit::Celsius)), 21.5);
        let fahrenheit = number(temperature_value(&raw, TemperatureUnit::Fahrenheit));
        assert!((fahrenheit - 70.7).abs() < 1e-9);
        assert_eq!(number(humidity_value(&RawValue::Int(4520))), 45.2);
        assert!(temperature_value(&RawValue::Undefined, TemperatureUnit::Celsius).is_unknown());
        assert!(humidity_value(&RawValue::Undefined).is_unknown());
    }

    #[test]
    fn test_cover_position_inversion() {
        assert_eq!(number(position_to_percent(&RawValue::Int(2500), false)), 25.0);
        assert_eq!(number(position_to_percent(&RawValue::Int(2500), true)), 75.0);
        assert_eq!(percent_to_position(25.0, false), 2500);
        assert_eq!(percent_to_position(25.0, true), 7500);
        assert_eq!(percent_to_position(120.0, false), 10_000);
        assert!(position_to_percent(&RawValue::Undefined, true).is_unknown());
    }

    #[test]
    fn test_cover_state_table() {
        assert_eq!(cover_state(Some(50.0), Some(50.0)), CoverState::Open);
        assert_eq!(cover_state(Some(100.0), Some(100.0)), CoverState::Closed);
        assert_eq!(cover_state(Some(30.0), Some(80.0)), CoverState::Opening);
        assert_eq!(cover_state(Some(80.0), Some(30.0)), CoverState::Closing);
        assert_eq!(cover_state(None, Some(30.0)), CoverState::Unknown);
        assert_eq!(cover_state(Some(30.0), None), CoverState::Unknown);
    }

    #[test]
    fn test_cover_state_from_raw_applies_inversion() {
        let closed = RawValue::Int(0);
        assert_eq!(
            cover_state_from_raw(&closed, &closed, true),
            CoverState::Closed
        );
        assert_eq!(
            cover_state_from_raw(&closed, &closed, false),
            CoverState::Open
        );
        assert_eq!(
            cover_state_from_raw(&RawValue::Undefined, &closed, false),
            CoverState::Unknown
        );
    }
}
