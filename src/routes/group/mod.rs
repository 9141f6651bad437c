mod handler;
pub mod model;

pub use handler::{add_member, find_by_id, get_user_groups, leave_group, set_event, set_status};
