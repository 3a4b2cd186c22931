// src/dashboard/mod.rs

pub mod load;
pub mod render;
pub mod stats;

pub use load::{clean_listings, load_listings};
pub use render::render_dashboard;
pub use stats::Selection;
