pub mod listings;
pub mod moderation;
pub mod photos;
pub mod saved;
pub mod stats;
pub mod users;
