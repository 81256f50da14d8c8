pub mod app;
pub mod auth;
pub mod config;
pub mod error;
pub mod gateway;
pub mod models;
pub mod payments;
pub mod reroll;
pub mod spots;
pub mod state;
pub mod store;
pub mod users;

#[cfg(test)]
mod test_support;
