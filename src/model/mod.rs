pub mod catalog;
pub mod common;
pub mod instance;
pub mod user;
pub mod user_context;

pub use catalog::*;
pub use common::*;
pub use instance::*;
pub use user::*;
pub use user_context::*;
