//! Typed access to the flat string configuration attached to an operation.
//!
//! Every lookup failure is reported with the owning operation's
//! invalid-parameter code so `add_op` can hand it back unchanged.

use crate::error::{Error, ErrorCode, Result};
use std::collections::HashMap;
use std::str::FromStr;

/// Flat string-keyed configuration used by `init` and `add_op`.
pub type KvConf = HashMap<String, String>;

/// Builds a [`KvConf`] from borrowed pairs.
///
/// ```
/// let conf = vistool::kv_conf([("width", "224"), ("height", "224")]);
/// assert_eq!(conf["width"], "224");
/// ```
pub fn kv_conf<I, K, V>(pairs: I) -> KvConf
where
    I: IntoIterator<Item = (K, V)>,
    K: Into<String>,
    V: Into<String>,
{
    pairs
        .into_iter()
        .map(|(k, v)| (k.into(), v.into()))
        .collect()
}

/// Read-only view over one operation's configuration.
pub(crate) struct Params<'a> {
    op: &'static str,
    conf: &'a KvConf,
    code: ErrorCode,
}

impl<'a> Params<'a> {
    pub(crate) fn new(op: &'static str, conf: &'a KvConf, code: ErrorCode) -> Self {
        Self { op, conf, code }
    }

    pub(crate) fn error(&self, message: impl AsRef<str>) -> Error {
        Error::new(self.code, format!("{}: {}", self.op, message.as_ref()))
    }

    pub(crate) fn str(&self, key: &str) -> Option<&'a str> {
        self.conf.get(key).map(|v| v.trim())
    }

    fn parse<T: FromStr>(&self, key: &str) -> Result<Option<T>> {
        match self.str(key) {
            None => Ok(None),
            Some(raw) => raw
                .parse::<T>()
                .map(Some)
                .map_err(|_| self.error(format!("invalid value {:?} for '{}'", raw, key))),
        }
    }

    /// Positive pixel dimension. Negative or zero values are rejected here,
    /// at construction time, rather than when a sample arrives.
    pub(crate) fn dimension(&self, key: &str) -> Result<Option<u32>> {
        let Some(value) = self.parse::<i64>(key)? else {
            return Ok(None);
        };
        if value <= 0 || value > u32::MAX as i64 {
            return Err(self.error(format!("'{}' must be positive (got {})", key, value)));
        }
        Ok(Some(value as u32))
    }

    pub(crate) fn required_dimension(&self, key: &str) -> Result<u32> {
        self.dimension(key)?
            .ok_or_else(|| self.error(format!("missing required key '{}'", key)))
    }

    /// Pixel offset, zero allowed.
    pub(crate) fn offset(&self, key: &str) -> Result<Option<u32>> {
        let Some(value) = self.parse::<i64>(key)? else {
            return Ok(None);
        };
        if value < 0 || value > u32::MAX as i64 {
            return Err(self.error(format!("'{}' must not be negative (got {})", key, value)));
        }
        Ok(Some(value as u32))
    }

    pub(crate) fn float(&self, key: &str) -> Result<Option<f64>> {
        let value = self.parse::<f64>(key)?;
        match value {
            Some(v) if !v.is_finite() => {
                Err(self.error(format!("'{}' must be finite (got {})", key, v)))
            }
            other => Ok(other),
        }
    }

    pub(crate) fn flag(&self, key: &str) -> Result<Option<bool>> {
        match self.str(key).map(str::to_ascii_lowercase).as_deref() {
            None => Ok(None),
            Some("1" | "true" | "yes" | "on") => Ok(Some(true)),
            Some("0" | "false" | "no" | "off") => Ok(Some(false)),
            Some(other) => Err(self.error(format!("invalid boolean {:?} for '{}'", other, key))),
        }
    }
}
