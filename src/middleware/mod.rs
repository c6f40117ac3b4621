//! Request guards shared across routes.

pub mod auth;
