pub mod core;
pub mod params;
pub mod registry;
pub mod vision;

pub use self::core::{OpChain, Operation};
pub use params::{kv_conf, KvConf};
pub use registry::{OpConstructor, OpRegistry};
