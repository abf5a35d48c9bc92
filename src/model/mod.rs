pub mod common;
pub mod data;
pub mod relationship;
pub mod request;
pub mod schema;

pub use common::*;
pub use data::*;
pub use relationship::*;
pub use request::*;
pub use schema::*;
