pub use config::*;
pub use error::*;
pub use next_handler::*;
pub use secret_cache::*;
pub use secret_fetcher::*;
pub use secret_header::*;
pub use server::*;
pub use sw_body::SwBody;

#[cfg(test)]
mod _test_tools;

mod config;
mod error;
mod next_handler;
mod secret_cache;
mod secret_fetcher;
mod secret_header;
mod server;
mod sw_body;
