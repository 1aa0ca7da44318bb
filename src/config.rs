//! Connector configuration parameters
//!
//! Tunables for the RCI engine and the per-deployment device identity.
//! Both can be loaded from JSON during provisioning or from a postcard blob
//! kept in flash.

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Smallest output chunk the generator can make progress with.
pub const MIN_OUTPUT_CHUNK: usize = 1;

/// Engine tunables
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RciConfig {
    // --- Buffers ---
    /// Capacity of one response chunk handed to the transport (bytes)
    pub output_chunk_size: usize,
    /// Initial capacity of the cross-chunk token storage (bytes)
    pub storage_size: usize,
    /// Longest string token accepted in a request (bytes)
    pub max_string_len: usize,

    // --- Responses ---
    /// Send human-readable descriptions with error responses
    pub error_descriptions: bool,
    /// Accept do_command, reboot and set_factory_default
    pub legacy_commands: bool,
}

impl Default for RciConfig {
    fn default() -> Self {
        Self {
            output_chunk_size: 512,
            // "FF:FF:FF:FF:FF:FF" plus terminator
            storage_size: 18,
            max_string_len: 256,

            error_descriptions: true,
            legacy_commands: true,
        }
    }
}

impl RciConfig {
    /// Check the tunables against each other.
    pub fn validate(&self) -> Result<()> {
        if self.output_chunk_size < MIN_OUTPUT_CHUNK {
            return Err(Error::Config("output chunk size must be non-zero"));
        }
        if self.max_string_len == 0 {
            return Err(Error::Config("max string length must be non-zero"));
        }
        if self.storage_size > self.max_string_len {
            return Err(Error::Config("token storage larger than max string length"));
        }
        Ok(())
    }
}

/// Device identity published with the descriptor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct DeviceDescriptor {
    /// Cloud vendor id
    pub vendor_id: u32,
    /// Firmware target 0 version the descriptor was built for
    pub firmware_target_zero_version: u32,
}
