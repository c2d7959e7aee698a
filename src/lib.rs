// Library for the daemon, the check binary and tests

pub mod classify;
pub mod collector;
pub mod config;
pub mod dispatcher;
pub mod error;
pub mod models;
pub mod registry;
pub mod remote;
pub mod report;
pub mod routes;
pub mod scheduler;
pub mod services;
pub mod version;
