pub mod api;
pub mod auth;
pub mod calendar;
pub mod catalog;
pub mod config;
pub mod engine;
pub mod limits;
pub mod maintenance;
pub mod model;
pub mod notify;
pub mod observability;
pub mod reference;
pub mod store;
pub mod wal;
