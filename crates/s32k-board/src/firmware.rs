//! Firmware image loading.
//!
//! The image is copied into flash through the loader path of the address
//! space. An image larger than the target capacity is rejected before any
//! byte is written.

use std::fmt;

use log::debug;
use serde::Serialize;
use sha2::{Digest, Sha256};

use crate::address_space::AddressSpace;
use crate::error::{BoardError, Result};

/// Firmware bytes, already resident in host memory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FirmwareImage {
    bytes: Vec<u8>,
}

impl FirmwareImage {
    /// Wrap raw image bytes.
    pub fn new(bytes: Vec<u8>) -> Self {
        Self { bytes }
    }

    /// Image size in bytes.
    pub fn len(&self) -> u64 {
        self.bytes.len() as u64
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// Raw image bytes.
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// ARMv7-M vector table head: initial SP and reset handler.
    pub fn vector_table(&self) -> Option<VectorTable> {
        let word = |i: usize| -> Option<u32> {
            let bytes = self.bytes.get(i * 4..i * 4 + 4)?;
            Some(u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
        };
        Some(VectorTable {
            initial_sp: word(0)?,
            reset_vector: word(1)?,
        })
    }
}

impl From<Vec<u8>> for FirmwareImage {
    fn from(bytes: Vec<u8>) -> Self {
        Self::new(bytes)
    }
}

/// First two entries of a Cortex-M vector table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub struct VectorTable {
    pub initial_sp: u32,
    pub reset_vector: u32,
}

/// SHA-256 hex digest of an image.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct ImageDigest(pub String);

impl ImageDigest {
    /// Compute the SHA-256 digest of `data`.
    pub fn compute(data: &[u8]) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(data);
        ImageDigest(hex_encode(&hasher.finalize()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ImageDigest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

fn hex_encode(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}

/// Record of a committed firmware load.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub struct LoadedFirmware {
    /// Address of the first image byte.
    pub base: u64,
    /// Image size in bytes.
    pub size: u64,
    /// Capacity of the target region.
    pub capacity: u64,
    /// SHA-256 of the image.
    pub digest: ImageDigest,
    /// Vector table head, if the image is long enough to have one.
    pub vector_table: Option<VectorTable>,
}

impl LoadedFirmware {
    /// Whether the bytes currently at `base` still hash to `digest`.
    pub fn verify(&self, space: &AddressSpace) -> Result<bool> {
        let bytes = space.read(self.base, self.size)?;
        Ok(ImageDigest::compute(&bytes) == self.digest)
    }
}

/// Copy `image` to `target_base`, failing if it exceeds `capacity`.
pub fn load_firmware(
    space: &mut AddressSpace,
    image: &FirmwareImage,
    target_base: u64,
    capacity: u64,
) -> Result<LoadedFirmware> {
    if image.len() > capacity {
        return Err(BoardError::ImageTooLarge {
            size: image.len(),
            capacity,
        });
    }
    space.load(target_base, image.as_bytes())?;
    let loaded = LoadedFirmware {
        base: target_base,
        size: image.len(),
        capacity,
        digest: ImageDigest::compute(image.as_bytes()),
        vector_table: image.vector_table(),
    };
    debug!(
        "loaded {} firmware bytes at 0x{:08X} (capacity {}, sha256 {})",
        loaded.size, loaded.base, loaded.capacity, loaded.digest
    );
    Ok(loaded)
}
