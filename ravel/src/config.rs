use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::element::Element;
use crate::error::{Error, Result};

/// What flattening does with a structure that has no leaves at all.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum EmptyPolicy {
    /// Fail with [`Error::EmptyStructure`].
    #[default]
    Reject,
    /// Produce a zero-length vector whose unflatten only accepts an empty slice.
    ZeroLength,
}

impl FromStr for EmptyPolicy {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "reject" => Ok(EmptyPolicy::Reject),
            "zero-length" | "zero_length" | "zero" => Ok(EmptyPolicy::ZeroLength),
            other => Err(Error::config(format!(
                "unknown empty policy {other:?}, expected \"reject\" or \"zero-length\""
            ))),
        }
    }
}

/// Options shared by every flatten entry point.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FlattenOptions {
    pub empty: EmptyPolicy,
}

impl FlattenOptions {
    pub const ENV_EMPTY_POLICY: &'static str = "RAVEL_EMPTY_POLICY";

    /// Reads options from the environment, falling back to the defaults for unset
    /// variables. Read once and pass the result to the `*_with` entry points.
    ///
    /// * `RAVEL_EMPTY_POLICY`: `reject` (default) or `zero-length`.
    pub fn from_env() -> Result<Self> {
        let empty = match std::env::var(Self::ENV_EMPTY_POLICY) {
            Ok(value) => value.parse()?,
            Err(_) => EmptyPolicy::default(),
        };
        Ok(Self { empty })
    }
}

/// Fixed-budget gradient descent settings.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct DescentConfig<T = f64> {
    /// Step length, finite and strictly positive.
    pub alpha: T,
    /// Number of updates; the history holds `max_its + 1` points.
    pub max_its: usize,
}

impl<T: Element> DescentConfig<T> {
    pub fn validate(&self) -> Result<()> {
        if !(self.alpha.is_finite() && self.alpha > T::zero()) {
            return Err(Error::config(format!(
                "step length must be finite and positive, got {:?}",
                self.alpha
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_policy_parses_loosely() {
        assert_eq!("Reject".parse::<EmptyPolicy>().unwrap(), EmptyPolicy::Reject);
        assert_eq!(" zero-length ".parse::<EmptyPolicy>().unwrap(), EmptyPolicy::ZeroLength);
        assert!(matches!("skip".parse::<EmptyPolicy>(), Err(Error::InvalidConfig(_))));
    }

    #[test]
    fn options_deserialize_with_defaults() {
        let options: FlattenOptions = serde_json::from_str("{}").unwrap();
        assert_eq!(options, FlattenOptions::default());

        let options: FlattenOptions = serde_json::from_str(r#"{"empty": "zero-length"}"#).unwrap();
        assert_eq!(options.empty, EmptyPolicy::ZeroLength);
    }

    #[test]
    fn from_env_drives_the_empty_policy() {
        use crate::codec::flatten_with;
        use crate::structure::Structure;

        let var = FlattenOptions::ENV_EMPTY_POLICY;
        let empty: Structure = Structure::sequence([]);

        // SAFETY: no other test reads or writes this variable.
        unsafe { std::env::set_var(var, "zero-length") };
        let zero_length = FlattenOptions::from_env();
        unsafe { std::env::set_var(var, "sometimes") };
        let garbage = FlattenOptions::from_env();
        unsafe { std::env::remove_var(var) };
        let unset = FlattenOptions::from_env();

        let options = zero_length.unwrap();
        assert_eq!(options.empty, EmptyPolicy::ZeroLength);
        let (w, unflatten) = flatten_with(&empty, &options).unwrap();
        assert!(w.is_empty());
        assert_eq!(unflatten.unflatten(&[]).unwrap(), empty);

        assert!(matches!(garbage, Err(Error::InvalidConfig(_))));

        let options = unset.unwrap();
        assert_eq!(options, FlattenOptions::default());
        assert!(matches!(flatten_with(&empty, &options), Err(Error::EmptyStructure)));
    }

    #[test]
    fn descent_config_rejects_bad_steps() {
        let config: DescentConfig = serde_json::from_str(r#"{"alpha": 0.1, "max_its": 10}"#).unwrap();
        assert!(config.validate().is_ok());

        for alpha in [0.0, -0.1, f64::NAN, f64::INFINITY] {
            let config = DescentConfig { alpha, max_its: 1 };
            assert!(matches!(config.validate(), Err(Error::InvalidConfig(_))));
        }
    }
}
