pub mod cache;
pub mod error;
pub mod guard;
pub mod matcher;
pub mod model;
pub mod resolver;
pub mod server;
pub mod store;
