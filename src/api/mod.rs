pub mod account_handlers;
pub mod extractors;
pub mod handlers;
pub mod instance_handlers;
pub mod routes;
pub mod user_extractor;

pub use handlers::*;
pub use routes::*;
