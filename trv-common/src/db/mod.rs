//! Row Store: schema, model and queries

pub mod init;
pub mod models;
pub mod rows;

pub use init::*;
pub use models::*;
pub use rows::*;
