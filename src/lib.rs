pub mod config;
pub mod dashboard;
pub mod extract;
pub mod fetch;
pub mod listing;
pub mod process;
pub mod write;
