pub(crate) mod pool;

pub(crate) use pool::{is_shutdown, SubmitError, WorkerPool};
