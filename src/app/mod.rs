//! Application boundary.
//!
//! The RCI engine talks to the device's configuration owner only through
//! the port traits in [`ports`], keeping the engine free of storage and
//! hardware concerns.

pub mod ports;
