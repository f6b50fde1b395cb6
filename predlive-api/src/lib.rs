// Prediction Live API Library
//
// HTTP endpoints for subscribing to and publishing stream broadcasts

pub mod http;

// Re-export commonly used types
pub use http::{create_router, AppState};
