pub mod data_cache;

pub use data_cache::*;
