pub extern crate actix_web;

pub mod admission;
pub mod config;
pub mod connection;
pub mod connection_tx;
pub mod handlers;
pub mod registry;
pub mod router;
pub mod session;
