mod config;
mod error;
mod types;

pub use config::*;
pub use error::{KilnError, Result};
pub use types::*;
