pub mod config;
pub mod connector;
pub mod error_util;
pub mod retry;
pub mod util;
