//! SQLite backend for the Tiffin engine.
mod sqlite_impl;

pub mod db;
pub use sqlite_impl::SqliteDatabase;
