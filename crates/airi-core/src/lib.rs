pub mod config;
pub mod error;
pub mod types;

pub use config::AiriConfig;
pub use error::{AiriError, Result};
pub use types::*;
