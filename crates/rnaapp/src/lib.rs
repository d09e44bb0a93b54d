pub mod config;
pub mod controller;
pub mod error;
pub mod form;
pub mod log_sanitize;
pub mod paramfile;
pub mod params;
pub mod remote;
pub mod ui;

pub use error::{Error, Result};
