// Library root: re-exports all modules so integration tests and the CLI can
// reach the public API.

pub mod aggregate;
pub mod config;
pub mod pipeline;
pub mod provider;
pub mod quality;
pub mod request;
pub mod roster;
pub mod schema;
pub mod table;
pub mod team;
