mod condition;
pub mod entity;
mod mapper;
pub mod memory_store;
pub mod migrations;
pub mod sea_orm_store;

pub use memory_store::InMemoryPermissionStore;
pub use sea_orm_store::SeaOrmPermissionStore;
