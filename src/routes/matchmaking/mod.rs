mod handler;
pub mod model;

pub use handler::match_user;
