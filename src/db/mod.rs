//! Document store layer
//!
//! Wraps the relational backend (SQLite by default, MySQL optional) behind a
//! driver-agnostic pool and one repository per collection:
//!
//! - `posts` with their normalized tag sets
//! - `comments`, appended with insert-if-absent semantics
//! - `metrics`, holding the shared visit counter
//! - `users` and `sessions` for the local identity provider

pub mod migrations;
pub mod pool;
pub mod repositories;

pub use pool::{
    create_pool, create_test_pool, DatabasePool, DynDatabasePool, MysqlDatabase, SqliteDatabase,
};
