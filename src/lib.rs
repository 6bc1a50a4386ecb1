// Core library for the Gantry HTTP routing layer
// Route tables, filter chains, named registries, and terminal error handling

pub mod app;
pub mod controller;
pub mod dispatch;
pub mod error;
pub mod http;
pub mod logging;
pub mod middleware;
pub mod registry;
pub mod reporter;
pub mod router;
pub mod status;

// Re-export commonly used types
pub use app::*;
pub use controller::*;
pub use dispatch::*;
pub use error::*;
pub use http::*;
pub use middleware::*;
pub use registry::*;
pub use reporter::*;
pub use router::*;
pub use status::*;
