//! Durable state carried between recovery invocations
//!
//! The checkpoint is a single record: the current controller identity and
//! the owned ingress grant still awaiting revert. Stage transitions of every
//! run are appended alongside it for operators.

pub mod sqlite_store;
pub mod store;

pub use sqlite_store::*;
pub use store::*;
