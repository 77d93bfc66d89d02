pub mod async_query;
pub mod builder;

pub use async_query::AsyncQuery;
pub use builder::{Entity, N1ql};
