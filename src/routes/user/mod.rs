mod handler;
pub mod model;

pub use handler::{check_token, create_temporary, login, register};
