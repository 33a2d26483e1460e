mod auth;

pub use auth::{UserHub, UserHubBuilder};
