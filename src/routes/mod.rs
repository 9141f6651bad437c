pub mod group;
pub mod location;
pub mod matchmaking;
pub mod preference;
pub mod swipe;
pub mod user;
