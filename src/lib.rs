pub mod backfill;
pub mod buffer;
pub mod cli;
pub mod config;
pub mod model;
pub mod stream;
pub mod viewer;
