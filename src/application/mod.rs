//! Application services: cached content lookups and page assembly.

pub mod aggregate;
pub mod blog;
pub mod error;
pub mod lookup;
pub mod repos;
pub mod urls;
