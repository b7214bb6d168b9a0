//! `db` crate: pure persistence layer.
//!
//! Provides a connection pool, typed row structs, and repository functions
//! for every table in the dagflow schema. No business logic lives here, with
//! one exception: the closure-table extension in
//! [`repository::closure::add_relationship`] is the single place the
//! transitive relation is written.

pub mod error;
pub mod pool;
pub mod repository;
pub mod models;

pub use pool::DbPool;
pub use error::DbError;
