pub mod analyze;
pub mod config;

pub use self::analyze::*;
pub use self::config::*;
