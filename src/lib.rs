//! QR attendance - rotating attendance QR codes backed by a session store
//!
//! This library provides the window evaluation, token rotation, rendering and
//! HTTP layers used by the `qr-attendance` binary.

pub mod api;
pub mod config;
pub mod db;
pub mod models;
pub mod services;
