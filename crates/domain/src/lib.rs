pub mod errors;
pub mod expansion;
pub mod timestamp;
pub mod todo;
pub mod tree;
pub mod user;
pub mod validation;

pub use errors::*;
pub use expansion::*;
pub use todo::*;
pub use tree::*;
pub use user::*;
