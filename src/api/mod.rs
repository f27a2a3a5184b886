pub mod error;
pub mod handlers;
pub mod pagination;
pub mod routes;

pub use error::*;
pub use handlers::*;
pub use pagination::*;
pub use routes::*;
