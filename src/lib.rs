// src/lib.rs

pub mod app_state;
pub mod blob;
pub mod config;
pub mod error;
pub mod rows;
pub mod service;
