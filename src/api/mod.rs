//! API Module
//!
//! REST API for node registration and registry management.

pub mod rest;
pub mod server;

pub use rest::*;
pub use server::*;
