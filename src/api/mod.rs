pub mod admin_handlers;
pub mod auth_handlers;
pub mod error;
pub mod handlers;
pub mod image_handlers;
pub mod routes;
pub mod user_extractor;
pub mod user_handlers;

pub use error::{ApiError, ApiResult};
pub use handlers::{AppState, SharedState};
pub use routes::*;
