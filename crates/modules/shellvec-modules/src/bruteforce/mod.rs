//! Bruteforce modules

pub mod sql;

pub use sql::Sql;
