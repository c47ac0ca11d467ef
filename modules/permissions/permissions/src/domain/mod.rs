pub mod batch;
pub mod error;
pub mod events;
pub mod local_client;
pub mod ports;
pub mod service;
pub mod store;

pub use error::{DomainError, StoreError};
