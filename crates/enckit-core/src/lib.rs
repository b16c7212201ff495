pub mod config;
pub mod error;

pub use config::EnckitConfig;
pub use error::{EnckitError, EnckitResult};
