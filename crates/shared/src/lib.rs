//! Types shared by the URL codec, the query builder and the data controllers.

pub mod domain;
pub mod error;
pub mod protocol;
