mod handlers;
mod routes;
mod trace;

pub use handlers::{ApiError, AppState, ErrorResponse};
pub use routes::create_api_router;
