//! Mapper configuration.

use std::fmt;
use std::num::NonZeroUsize;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Environment variable read by [`MapConfig::from_env`].
pub const CONCURRENCY_ENV: &str = "BOUNDMAP_CONCURRENCY";

/// Upper bound on simultaneously running transforms. Always at least 1.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "i64", into = "usize")]
pub struct Concurrency(NonZeroUsize);

impl Concurrency {
    pub const ONE: Concurrency = Concurrency(NonZeroUsize::MIN);

    pub fn new(permits: usize) -> Result<Self, ConfigError> {
        NonZeroUsize::new(permits)
            .map(Concurrency)
            .ok_or(ConfigError::InvalidConcurrency(0))
    }

    pub fn get(self) -> usize {
        self.0.get()
    }
}

impl Default for Concurrency {
    fn default() -> Self {
        Self::ONE
    }
}

impl TryFrom<i64> for Concurrency {
    type Error = ConfigError;

    fn try_from(value: i64) -> Result<Self, Self::Error> {
        usize::try_from(value)
            .ok()
            .and_then(NonZeroUsize::new)
            .map(Concurrency)
            .ok_or(ConfigError::InvalidConcurrency(value))
    }
}

impl From<Concurrency> for usize {
    fn from(concurrency: Concurrency) -> Self {
        concurrency.get()
    }
}

impl fmt::Display for Concurrency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MapConfig {
    pub concurrency: Concurrency,
}

impl MapConfig {
    pub fn new(concurrency: Concurrency) -> Self {
        Self { concurrency }
    }

    /// Read configuration from `BOUNDMAP_CONCURRENCY`, falling back to defaults.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|var| std::env::var(var).ok())
    }

    /// Build configuration from an arbitrary variable lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let Some(raw) = lookup(CONCURRENCY_ENV) else {
            return Ok(Self::default());
        };

        let value: i64 = raw.trim().parse().map_err(|_| ConfigError::InvalidEnv {
            var: CONCURRENCY_ENV,
            value: raw.clone(),
        })?;

        Ok(Self::new(Concurrency::try_from(value)?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn concurrency_rejects_zero() {
        assert_eq!(Concurrency::new(0), Err(ConfigError::InvalidConcurrency(0)));
        assert_eq!(Concurrency::new(3).unwrap().get(), 3);
    }

    #[test]
    fn concurrency_rejects_negative() {
        assert_eq!(
            Concurrency::try_from(-4),
            Err(ConfigError::InvalidConcurrency(-4))
        );
        assert_eq!(Concurrency::try_from(0), Err(ConfigError::InvalidConcurrency(0)));
        assert_eq!(Concurrency::try_from(7).unwrap().get(), 7);
    }

    #[test]
    fn default_is_one() {
        assert_eq!(MapConfig::default().concurrency, Concurrency::ONE);
        assert_eq!(Concurrency::ONE.get(), 1);
    }

    #[test]
    fn config_serializes_plain_number() {
        let config = MapConfig::new(Concurrency::new(4).unwrap());
        insta::assert_json_snapshot!(config, @r#"
        {
          "concurrency": 4
        }
        "#);
    }

    #[test]
    fn config_deserialize_validates() {
        let config: MapConfig = serde_json::from_str(r#"{"concurrency": 2}"#).unwrap();
        assert_eq!(config.concurrency.get(), 2);

        let err = serde_json::from_str::<MapConfig>(r#"{"concurrency": 0}"#).unwrap_err();
        assert!(err.to_string().contains("concurrency must be at least 1"));

        assert!(serde_json::from_str::<MapConfig>(r#"{"concurrency": -1}"#).is_err());
    }

    #[test]
    fn from_lookup_missing_uses_default() {
        let config = MapConfig::from_lookup(|_| None).unwrap();
        assert_eq!(config, MapConfig::default());
    }

    #[test]
    fn from_lookup_parses_value() {
        let config = MapConfig::from_lookup(|var| {
            assert_eq!(var, CONCURRENCY_ENV);
            Some(" 8 ".to_string())
        })
        .unwrap();
        assert_eq!(config.concurrency.get(), 8);
    }

    #[test]
    fn from_lookup_rejects_garbage_and_zero() {
        let err = MapConfig::from_lookup(|_| Some("lots".to_string())).unwrap_err();
        assert_eq!(
            err,
            ConfigError::InvalidEnv {
                var: CONCURRENCY_ENV,
                value: "lots".to_string(),
            }
        );

        let err = MapConfig::from_lookup(|_| Some("0".to_string())).unwrap_err();
        assert_eq!(err, ConfigError::InvalidConcurrency(0));
    }
}
