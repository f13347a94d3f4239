//! Token store: a single SQLite table keyed by username.

pub mod db;

pub use db::{NewUserToken, TokenStore, UserToken};
