pub mod bulkget;
pub mod config;
pub mod load;
pub mod schemas;
pub mod transform;
