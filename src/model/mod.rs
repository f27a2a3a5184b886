pub mod common;
pub mod filter;
pub mod pet;
pub mod validation;

pub use common::*;
pub use filter::*;
pub use pet::*;
pub use validation::*;
