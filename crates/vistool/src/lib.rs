pub mod error;
pub mod ops;
pub mod sample;
pub mod transformer;

pub use error::{Error, ErrorCode, Result, OK};
pub use ops::{kv_conf, KvConf, OpChain, OpRegistry, Operation};
pub use sample::{Frame, Output, Payload, Sample};
pub use transformer::{
    create, destroy, State, ThreadedTransformer, Transformer, TransformerConfig,
};
