pub mod config;
pub mod pool;
pub mod profile;
pub mod simulate;
