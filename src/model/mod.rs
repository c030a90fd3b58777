pub mod common;
pub mod contact;
pub mod schema;

pub use common::*;
pub use contact::*;
pub use schema::*;
