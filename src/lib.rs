pub mod api;
pub mod auth;
pub mod bus;
pub mod config;
pub mod error;
pub mod geo;
pub mod lifecycle;
pub mod models;
pub mod notify;
pub mod observability;
pub mod presence;
pub mod state;
