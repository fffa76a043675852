pub mod auth;
pub mod coordinator;
pub mod overview;

pub use auth::*;
pub use coordinator::*;
pub use overview::*;
