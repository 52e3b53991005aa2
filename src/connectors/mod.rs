// src/connectors/mod.rs
pub mod json_file;
pub mod messages;
pub mod traits;
