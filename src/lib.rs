//! Owner-scoped CRUD dashboard over a hosted auth + Postgres backend.
//!
//! The binary in `main.rs` wires configuration, logging and the HTTP server;
//! everything it serves lives in this library so the integration tests can
//! mount the same router against the in-memory backend.

pub mod config;
pub mod db;
pub mod error;
pub mod response;
pub mod routes;
pub mod state;

pub mod crypto {
    pub mod csrf;
    pub mod token;
}

pub mod models {
    pub mod record;
    pub mod session;
    pub mod user;
}

pub mod baas {
    mod types;
    pub mod memory;
    pub mod postgres;
    pub mod rest;

    pub use types::*;
}

pub mod entities;

pub mod repositories {
    pub mod owned;
}

pub mod services {
    pub mod auth;
    pub mod dashboard;
}

pub mod handlers {
    pub mod api;
    pub mod auth;
}

pub mod middleware_layer {
    pub mod auth;
    pub mod csrf;
}

pub mod validation {
    pub mod auth;
    pub mod payload;
}

pub mod views {
    pub mod auth;
    pub mod dashboard;
    pub mod entity;
    pub mod layout;
}

pub mod client;
