//! Request handlers.

pub mod account;
pub mod apps;
pub mod health;
pub mod tokens;
pub mod users;
