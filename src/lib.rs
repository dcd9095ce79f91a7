//! Barcode and QR-code preview: an authenticated render endpoint and a
//! last-request-wins preview controller that talks to it.

pub mod application;
pub mod config;
pub mod domain;
pub mod infra;
