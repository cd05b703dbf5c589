pub mod artifact;
pub mod checkpoint;
pub mod context;
pub mod grant;
pub mod outcome;

pub use artifact::*;
pub use checkpoint::*;
pub use context::*;
pub use grant::*;
pub use outcome::*;

/// Path of the controller management API on every instance
pub const CONTROLLER_API_PATH: &str = "/v1/api";
