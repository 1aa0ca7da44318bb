//! Remote Configuration Interface connector library.
//!
//! Exposes the RCI engine, its configuration, and the application port for
//! integration testing and embedding in a transport. The engine is pure
//! logic: no threads, no I/O, no clocks.

#![deny(unused_must_use)]

pub mod app;
pub mod config;
pub mod error;
pub mod rci;

pub use config::{DeviceDescriptor, RciConfig};
pub use error::{Error, Result};
