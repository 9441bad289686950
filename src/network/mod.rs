pub mod client;
pub mod error;
pub mod error_handler;

pub use client::JsonClient;
pub use error::HttpError;
pub use error_handler::ErrorHandler;
