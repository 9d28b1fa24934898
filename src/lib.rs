//! Event registration backend: time-gated signups, window-open push
//! notifications and a self-healing database connection.

pub mod actions;
pub mod auth;
pub mod config;
pub mod events;
pub mod keeper;
pub mod mailer;
pub mod models;
pub mod routes;
pub mod schedule;
pub mod schema;
pub mod store;
pub mod validation;
