//! API client module for the storefront REST API

mod account;
mod cart;
mod catalog;
pub mod client;
mod error;
pub mod messages;
mod orders;
pub mod transport;

pub use client::ApiClient;
pub use error::ApiError;
