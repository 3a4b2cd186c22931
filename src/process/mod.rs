// src/process/mod.rs

pub mod dedupe;
pub mod normalize;
pub mod pipeline;

pub use dedupe::SeenListings;
pub use normalize::normalize;
pub use pipeline::fetch_and_process_page;
