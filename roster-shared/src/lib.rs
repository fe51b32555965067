pub mod audit;
pub mod clients;
pub mod clock;
pub mod directory;
pub mod errors;
pub mod middleware;
pub mod schema;
pub mod types;

#[cfg(any(test, feature = "testing"))]
pub mod memory;

pub use errors::{AppError, AppResult, ErrorCode};
pub use types::*;
