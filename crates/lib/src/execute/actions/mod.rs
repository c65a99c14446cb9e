//! Primitive actions the lifecycle steps are built from.

pub mod cmd;
pub mod fetch;

pub use cmd::{command_line, execute_cmd, quote};
pub use fetch::{Fetcher, HttpFetcher, download_to, url_to_filename};
