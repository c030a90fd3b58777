pub mod context;
pub mod dispatcher;
pub mod error;
pub mod handlers;
pub mod middleware;
pub mod route;
pub mod routes;
pub mod schema_middleware;

pub use context::*;
pub use dispatcher::*;
pub use error::*;
pub use middleware::*;
pub use route::*;
pub use routes::*;
pub use schema_middleware::*;
