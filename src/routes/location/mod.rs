mod handler;
pub mod model;

pub use handler::{all_locations, create_location, suggest_location};
