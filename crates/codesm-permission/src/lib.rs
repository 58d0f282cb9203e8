//! Permission gate guarding sensitive shell commands behind an injected
//! approval callback, so a CLI/TUI/HTTP front end can render the prompt.

pub mod classify;
pub mod error;
pub mod gate;
pub mod request;

pub use classify::{classify, Classification};
pub use error::PermissionDenied;
pub use gate::Permission;
pub use request::{PermissionRequest, PermissionResponse};
