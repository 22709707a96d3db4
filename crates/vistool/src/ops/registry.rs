use crate::error::{Error, ErrorCode, Result};
use crate::ops::core::Operation;
use crate::ops::params::KvConf;
use crate::ops::vision::{Crop, Decode, Flip, RandomCrop, Resize, Rotate, Transpose};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// Constructor turning an operation's configuration into a ready instance.
pub type OpConstructor = Arc<dyn Fn(&KvConf) -> Result<Box<dyn Operation>> + Send + Sync>;

/// Maps operation names to their constructors.
///
/// `add_op` resolves names through a registry, so the chain only ever holds
/// validated `Box<dyn Operation>` values.
#[derive(Clone, Default)]
pub struct OpRegistry {
    constructors: HashMap<String, OpConstructor>,
}

impl OpRegistry {
    /// Registry with no operations.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Registry holding every built-in vision operation.
    pub fn builtin() -> Self {
        let mut registry = Self::empty();
        registry.register(Decode::NAME, |conf| Ok(Box::new(Decode::from_conf(conf)?)));
        registry.register(Resize::NAME, |conf| Ok(Box::new(Resize::from_conf(conf)?)));
        registry.register(Crop::NAME, |conf| Ok(Box::new(Crop::from_conf(conf)?)));
        registry.register(RandomCrop::NAME, |conf| {
            Ok(Box::new(RandomCrop::from_conf(conf)?))
        });
        registry.register(Rotate::NAME, |conf| Ok(Box::new(Rotate::from_conf(conf)?)));
        registry.register(Flip::NAME, |conf| Ok(Box::new(Flip::from_conf(conf)?)));
        registry.register(Transpose::NAME, |conf| {
            Ok(Box::new(Transpose::from_conf(conf)?))
        });
        registry
    }

    /// Registers (or replaces) the constructor for `name`.
    pub fn register<F>(&mut self, name: impl Into<String>, constructor: F) -> &mut Self
    where
        F: Fn(&KvConf) -> Result<Box<dyn Operation>> + Send + Sync + 'static,
    {
        self.constructors.insert(name.into(), Arc::new(constructor));
        self
    }

    pub fn contains(&self, name: &str) -> bool {
        self.constructors.contains_key(name)
    }

    /// Registered names, sorted.
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.constructors.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    /// Creates an operation instance by name with the provided parameters.
    pub fn create(&self, name: &str, conf: &KvConf) -> Result<Box<dyn Operation>> {
        let constructor = self.constructors.get(name).ok_or_else(|| {
            Error::new(
                ErrorCode::InvalidOpName,
                format!("unknown operation '{}'", name),
            )
        })?;
        constructor(conf)
    }
}

impl fmt::Debug for OpRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OpRegistry")
            .field("operations", &self.names())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ops::params::kv_conf;

    #[test]
    fn test_builtin_registry_names() {
        let registry = OpRegistry::builtin();
        assert_eq!(
            registry.names(),
            [
                "crop",
                "decode",
                "flip",
                "random_crop",
                "resize",
                "rotate",
                "transpose"
            ]
        );
    }

    #[test]
    fn test_unknown_name_is_invalid_op_name() {
        let registry = OpRegistry::builtin();
        let err = registry.create("not_a_real_op", &KvConf::new()).unwrap_err();
        assert_eq!(err.code(), ErrorCode::InvalidOpName);
    }

    #[test]
    fn test_constructor_errors_propagate() {
        let registry = OpRegistry::builtin();
        let err = registry
            .create("resize", &kv_conf([("width", "-1"), ("height", "10")]))
            .unwrap_err();
        assert_eq!(err.code(), ErrorCode::ResizeInvalidParam);

        let op = registry
            .create("resize", &kv_conf([("width", "8"), ("height", "8")]))
            .unwrap();
        assert_eq!(op.name(), "resize");
    }
}
