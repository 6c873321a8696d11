//! Easing curves as a named enumeration plus a pure sampling function.
//!
//! Geometry animations interpolate rectangles component-wise through
//! `value(t)`; opacity animations interpolate the scalar directly.

use serde::{Deserialize, Serialize};
use std::str::FromStr;

use crate::geometry::Rect;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum EasingCurve {
    Linear,
    InQuad,
    OutQuad,
    InOutQuad,
    #[default]
    InCubic,
    OutCubic,
    InOutCubic,
    InSine,
    OutSine,
    InOutSine,
}

impl EasingCurve {
    /// Sample the curve at `t`, clamped to `[0, 1]`. Every curve maps
    /// 0 to 0 and 1 to 1.
    pub fn value(self, t: f64) -> f64 {
        let t = t.clamp(0.0, 1.0);
        match self {
            EasingCurve::Linear => t,
            EasingCurve::InQuad => t * t,
            EasingCurve::OutQuad => t * (2.0 - t),
            EasingCurve::InOutQuad => {
                if t < 0.5 {
                    2.0 * t * t
                } else {
                    let u = t - 1.0;
                    1.0 - 2.0 * u * u
                }
            }
            EasingCurve::InCubic => t * t * t,
            EasingCurve::OutCubic => {
                let u = t - 1.0;
                u * u * u + 1.0
            }
            EasingCurve::InOutCubic => {
                if t < 0.5 {
                    4.0 * t * t * t
                } else {
                    let u = 2.0 * t - 2.0;
                    0.5 * u * u * u + 1.0
                }
            }
            EasingCurve::InSine => 1.0 - (t * std::f64::consts::FRAC_PI_2).cos(),
            EasingCurve::OutSine => (t * std::f64::consts::FRAC_PI_2).sin(),
            EasingCurve::InOutSine => 0.5 * (1.0 - (t * std::f64::consts::PI).cos()),
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            EasingCurve::Linear => "Linear",
            EasingCurve::InQuad => "InQuad",
            EasingCurve::OutQuad => "OutQuad",
            EasingCurve::InOutQuad => "InOutQuad",
            EasingCurve::InCubic => "InCubic",
            EasingCurve::OutCubic => "OutCubic",
            EasingCurve::InOutCubic => "InOutCubic",
            EasingCurve::InSine => "InSine",
            EasingCurve::OutSine => "OutSine",
            EasingCurve::InOutSine => "InOutSine",
        }
    }
}

#[derive(Debug, thiserror::Error)]
#[error("unknown easing curve \"{0}\"")]
pub struct ParseEasingError(String);

impl FromStr for EasingCurve {
    type Err = ParseEasingError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Linear" => Ok(EasingCurve::Linear),
            "InQuad" => Ok(EasingCurve::InQuad),
            "OutQuad" => Ok(EasingCurve::OutQuad),
            "InOutQuad" => Ok(EasingCurve::InOutQuad),
            "InCubic" => Ok(EasingCurve::InCubic),
            "OutCubic" => Ok(EasingCurve::OutCubic),
            "InOutCubic" => Ok(EasingCurve::InOutCubic),
            "InSine" => Ok(EasingCurve::InSine),
            "OutSine" => Ok(EasingCurve::OutSine),
            "InOutSine" => Ok(EasingCurve::InOutSine),
            other => Err(ParseEasingError(other.to_string())),
        }
    }
}

/// Interpolate a scalar along `curve` at progress `t`.
pub fn lerp_f64(start: f64, end: f64, curve: EasingCurve, t: f64) -> f64 {
    start + (end - start) * curve.value(t)
}

/// Interpolate a rectangle component-wise along `curve` at progress `t`.
pub fn lerp_rect(start: Rect, end: Rect, curve: EasingCurve, t: f64) -> Rect {
    let v = curve.value(t);
    let mix = |a: i32, b: i32| a + ((b - a) as f64 * v).round() as i32;
    Rect::new(
        mix(start.x, end.x),
        mix(start.y, end.y),
        mix(start.width, end.width),
        mix(start.height, end.height),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn endpoints_are_exact() {
        for curve in [
            EasingCurve::Linear,
            EasingCurve::InQuad,
            EasingCurve::OutQuad,
            EasingCurve::InOutQuad,
            EasingCurve::InCubic,
            EasingCurve::OutCubic,
            EasingCurve::InOutCubic,
            EasingCurve::InSine,
            EasingCurve::OutSine,
            EasingCurve::InOutSine,
        ] {
            assert!(curve.value(0.0).abs() < 1e-9, "{curve:?} at 0");
            assert!((curve.value(1.0) - 1.0).abs() < 1e-9, "{curve:?} at 1");
        }
    }

    #[test]
    fn out_of_range_clamps() {
        assert_eq!(EasingCurve::Linear.value(-3.0), 0.0);
        assert_eq!(EasingCurve::Linear.value(42.0), 1.0);
    }

    #[test]
    fn rect_lerp_hits_endpoints() {
        let a = Rect::new(0, 0, 10, 10);
        let b = Rect::new(100, -40, 10, 10);
        assert_eq!(lerp_rect(a, b, EasingCurve::InCubic, 0.0), a);
        assert_eq!(lerp_rect(a, b, EasingCurve::InCubic, 1.0), b);
    }

    #[test]
    fn name_parse_round_trip() {
        let c = EasingCurve::OutCubic;
        assert_eq!(c.name().parse::<EasingCurve>().unwrap(), c);
    }
}
