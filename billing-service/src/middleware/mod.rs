pub mod auth;
pub mod metrics;

pub use auth::{AuthContext, Role};
pub use metrics::metrics_middleware;
