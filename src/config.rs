//! The configuration boundary: flat, named-parameter dictionaries.
//!
//! No file format is mandated here — callers parse whatever they like and
//! hand each algorithm a [`Params`] dictionary. Every algorithm config in
//! this crate offers a `from_params` constructor next to its plain-struct
//! `Default`, so both styles work.

use std::collections::BTreeMap;

use crate::error::MeasurementError;

/// A single parameter value.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Float(f64),
    Int(i64),
    FloatList(Vec<f64>),
    Str(String),
}

/// A flat, named-parameter dictionary for one algorithm instance.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Params {
    map: BTreeMap<String, Value>,
}

impl Params {
    pub fn new() -> Params {
        Params::default()
    }

    pub fn set(&mut self, name: &str, value: Value) {
        self.map.insert(name.to_string(), value);
    }

    pub fn set_float(&mut self, name: &str, value: f64) {
        self.set(name, Value::Float(value));
    }

    pub fn set_float_list(&mut self, name: &str, value: Vec<f64>) {
        self.set(name, Value::FloatList(value));
    }

    pub fn set_str(&mut self, name: &str, value: &str) {
        self.set(name, Value::Str(value.to_string()));
    }

    pub fn contains(&self, name: &str) -> bool {
        self.map.contains_key(name)
    }

    /// A required float; integers coerce.
    pub fn float(&self, name: &str) -> Result<f64, MeasurementError> {
        match self.map.get(name) {
            Some(Value::Float(v)) => Ok(*v),
            Some(Value::Int(v)) => Ok(*v as f64),
            Some(_) => Err(MeasurementError::WrongParameterType {
                name: name.to_string(),
                expected: "float",
            }),
            None => Err(MeasurementError::MissingParameter(name.to_string())),
        }
    }

    /// An optional float; absent falls back to `default`, a wrong type is
    /// still an error.
    pub fn float_or(&self, name: &str, default: f64) -> Result<f64, MeasurementError> {
        if self.contains(name) {
            self.float(name)
        } else {
            Ok(default)
        }
    }

    /// A required list of floats.
    pub fn float_list(&self, name: &str) -> Result<Vec<f64>, MeasurementError> {
        match self.map.get(name) {
            Some(Value::FloatList(v)) => Ok(v.clone()),
            Some(_) => Err(MeasurementError::WrongParameterType {
                name: name.to_string(),
                expected: "float list",
            }),
            None => Err(MeasurementError::MissingParameter(name.to_string())),
        }
    }

    /// An optional list of floats.
    pub fn float_list_or(
        &self,
        name: &str,
        default: &[f64],
    ) -> Result<Vec<f64>, MeasurementError> {
        if self.contains(name) {
            self.float_list(name)
        } else {
            Ok(default.to_vec())
        }
    }

    /// An optional string.
    pub fn str_or(&self, name: &str, default: &str) -> Result<String, MeasurementError> {
        match self.map.get(name) {
            Some(Value::Str(v)) => Ok(v.clone()),
            Some(_) => Err(MeasurementError::WrongParameterType {
                name: name.to_string(),
                expected: "string",
            }),
            None => Ok(default.to_string()),
        }
    }
}

/// Magnitude and size cutoffs consumed by the star-selection stage
/// downstream of measurement.
///
/// The selector itself is not part of this crate; these parameters only
/// cross the configuration boundary here so one dictionary can configure
/// the whole chain.
#[derive(Debug, Clone, PartialEq)]
pub struct StarSelectorConfig {
    /// Brightest magnitude a candidate may have.
    pub mag_min: f64,
    /// Faintest magnitude a candidate may have.
    pub mag_max: f64,
    /// Smallest acceptable candidate size (PSF widths).
    pub size_min: f64,
    /// Largest acceptable candidate size (PSF widths).
    pub size_max: f64,
}

impl Default for StarSelectorConfig {
    fn default() -> Self {
        StarSelectorConfig {
            mag_min: 10.0,
            mag_max: 18.0,
            size_min: 0.5,
            size_max: 2.0,
        }
    }
}

impl StarSelectorConfig {
    pub fn from_params(params: &Params) -> Result<StarSelectorConfig, MeasurementError> {
        let d = StarSelectorConfig::default();
        Ok(StarSelectorConfig {
            mag_min: params.float_or("magMin", d.mag_min)?,
            mag_max: params.float_or("magMax", d.mag_max)?,
            size_min: params.float_or("sizeMin", d.size_min)?,
            size_max: params.float_or("sizeMax", d.size_max)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_typed_getters() {
        let mut p = Params::new();
        p.set_float("background", 12.5);
        p.set("count", Value::Int(3));
        p.set_float_list("radii", vec![3.0, 6.0]);
        p.set_str("name", "flux.ap");

        assert_eq!(p.float("background").unwrap(), 12.5);
        // Int coerces to float
        assert_eq!(p.float("count").unwrap(), 3.0);
        assert_eq!(p.float_list("radii").unwrap(), vec![3.0, 6.0]);
        assert_eq!(p.str_or("name", "x").unwrap(), "flux.ap");
        assert_eq!(p.str_or("missing", "x").unwrap(), "x");
    }

    #[test]
    fn test_missing_and_wrong_type() {
        let mut p = Params::new();
        p.set_str("radii", "oops");

        assert_eq!(
            p.float("background").unwrap_err(),
            MeasurementError::MissingParameter("background".to_string())
        );
        assert!(matches!(
            p.float_list("radii").unwrap_err(),
            MeasurementError::WrongParameterType { .. }
        ));
        // Present-but-wrong-type is an error even with a default
        assert!(p.float_or("radii", 1.0).is_err());
        assert_eq!(p.float_or("background", 7.0).unwrap(), 7.0);
    }

    #[test]
    fn test_star_selector_from_params() {
        let mut p = Params::new();
        p.set_float("magMax", 16.0);
        let cfg = StarSelectorConfig::from_params(&p).unwrap();
        assert_eq!(cfg.mag_max, 16.0);
        assert_eq!(cfg.mag_min, StarSelectorConfig::default().mag_min);
    }
}
