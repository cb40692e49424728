pub mod context;
pub mod routes;
pub mod session;
pub mod user;

pub use context::*;
pub use session::*;
pub use user::*;
