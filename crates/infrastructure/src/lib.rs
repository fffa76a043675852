pub mod api;
pub mod http_client;
pub mod in_memory;
pub mod session_store;

pub use api::*;
pub use http_client::*;
pub use in_memory::*;
pub use session_store::*;
