//! Storage backend

pub mod postgres;

pub use postgres::Database;
