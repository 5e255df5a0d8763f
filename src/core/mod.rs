pub mod analysis;
pub mod dataset;
pub mod detection;
pub mod filter;
pub mod operations;
