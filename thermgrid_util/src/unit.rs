use core::fmt;
use core::str::FromStr;

use crate::{Error, Quantized};

/// Output unit for pixel values. Storage is always quantized (1/4 °C).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Unit {
    /// Raw quantized value, degrees Celsius times four.
    Quantized,
    #[default]
    Celsius,
    Fahrenheit,
    Kelvin,
}

impl Unit {
    pub const ALL: [Unit; 4] = [Unit::Quantized, Unit::Celsius, Unit::Fahrenheit, Unit::Kelvin];

    pub fn convert(self, q: Quantized) -> f64 {
        self.convert_f64(q as f64)
    }

    /// Same as [`Unit::convert`] for an already-averaged quantized value.
    pub fn convert_f64(self, q: f64) -> f64 {
        match self {
            Unit::Quantized => q,
            Unit::Celsius => q / 4.0,
            // q is quarter degrees, so 0.45 per step is the 1.8 °F per °C scale.
            Unit::Fahrenheit => q * 0.45 + 32.0,
            Unit::Kelvin => q / 4.0 + 273.15,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Unit::Quantized => "int",
            Unit::Celsius => "degC",
            Unit::Fahrenheit => "degF",
            Unit::Kelvin => "degK",
        }
    }
}

impl FromStr for Unit {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "int" => Ok(Unit::Quantized),
            "degC" => Ok(Unit::Celsius),
            "degF" => Ok(Unit::Fahrenheit),
            "degK" => Ok(Unit::Kelvin),
            _ => {
                let mut name = heapless::String::new();
                for c in s.chars() {
                    if name.push(c).is_err() {
                        break;
                    }
                }
                Err(Error::UnknownUnit(name))
            }
        }
    }
}

impl fmt::Display for Unit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Exact Celsius to Fahrenheit, for values already in °C.
pub fn deg_c_to_f(deg_c: f64) -> f64 {
    deg_c * 1.8 + 32.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn conversions() {
        assert_eq!(Unit::Quantized.convert(16), 16.0);
        assert_eq!(Unit::Celsius.convert(16), 4.0);
        assert_relative_eq!(Unit::Fahrenheit.convert(100), 77.0, epsilon = 1e-9);
        assert_relative_eq!(Unit::Kelvin.convert(-4), 272.15, epsilon = 1e-9);
    }

    #[test]
    fn fahrenheit_matches_exact_scale_in_degrees() {
        for q in [-40, 0, 1, 99, 320] {
            assert_relative_eq!(
                Unit::Fahrenheit.convert(q),
                deg_c_to_f(Unit::Celsius.convert(q)),
                epsilon = 1e-9
            );
        }
    }

    #[test]
    fn parse_round_trips_names() {
        for unit in Unit::ALL {
            assert_eq!(unit.as_str().parse::<Unit>().unwrap(), unit);
        }
    }

    #[test]
    fn parse_rejects_unknown() {
        let err = "rankine".parse::<Unit>().unwrap_err();
        assert!(matches!(err, Error::UnknownUnit(ref name) if name.as_str() == "rankine"));
        assert_eq!(err.kind(), crate::ErrorKind::Validation);
    }
}
