//! Flat global address map.
//!
//! Memory regions and device MMIO windows share one map and may never
//! overlap. Regions are permanent once registered: there is no unregister.

use log::debug;
use serde::{Deserialize, Serialize};

use crate::error::{BoardError, Result};

/// What backs a memory region.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RegionKind {
    /// Read/write memory.
    Ram,
    /// Read-only for the guest; writable only through the loader.
    Rom,
    /// Claims its addresses but has no storage.
    Reserved,
}

impl RegionKind {
    fn is_backed(self) -> bool {
        !matches!(self, RegionKind::Reserved)
    }
}

/// Opaque handle to a registered region.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RegionHandle(usize);

/// A memory-backed region of the address map.
#[derive(Debug, Clone)]
pub struct MemoryRegion {
    /// Region name (e.g., "flash", "sram").
    pub name: String,
    /// Base address.
    pub base: u64,
    /// Size in bytes.
    pub size: u64,
    /// Backing kind.
    pub kind: RegionKind,
    /// Entity that registered the region.
    pub owner: String,
    storage: Option<Vec<u8>>,
}

impl MemoryRegion {
    /// One past the last address of the region.
    pub fn end(&self) -> u64 {
        self.base + self.size
    }

    /// Whether `[addr, addr + len)` lies entirely inside this region.
    pub fn contains(&self, addr: u64, len: u64) -> bool {
        addr >= self.base && (addr as u128 + len as u128) <= self.end() as u128
    }
}

/// A device register window claimed in the address map.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MmioWindow {
    /// Window name (the device instance name).
    pub name: String,
    /// Base address.
    pub base: u64,
    /// Size in bytes.
    pub size: u64,
}

impl MmioWindow {
    /// One past the last address of the window.
    pub fn end(&self) -> u64 {
        self.base + self.size
    }
}

/// The single system address space of a composed machine.
#[derive(Debug, Clone)]
pub struct AddressSpace {
    name: String,
    address_bits: u32,
    regions: Vec<MemoryRegion>,
    mmio: Vec<MmioWindow>,
}

impl AddressSpace {
    /// Create an empty address space spanning `address_bits` bits.
    pub fn new(name: impl Into<String>, address_bits: u32) -> Result<Self> {
        if address_bits == 0 || address_bits > 64 {
            return Err(BoardError::invalid(format!(
                "address width of {address_bits} bits is not supported (expected 1..=64)"
            )));
        }
        Ok(Self {
            name: name.into(),
            address_bits,
            regions: Vec::new(),
            mmio: Vec::new(),
        })
    }

    /// Address space name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Width of the addressable range in bits.
    pub fn address_bits(&self) -> u32 {
        self.address_bits
    }

    /// Register a memory region at a fixed base and size.
    pub fn register(
        &mut self,
        name: impl Into<String>,
        base: u64,
        size: u64,
        kind: RegionKind,
        owner: impl Into<String>,
    ) -> Result<RegionHandle> {
        let name = name.into();
        self.check_free(&name, base, size)?;

        let storage = if kind.is_backed() {
            Some(vec![0u8; size as usize])
        } else {
            None
        };
        debug!(
            "register {:?} region '{}' at 0x{:08X}..0x{:08X}",
            kind,
            name,
            base,
            base + size
        );
        self.regions.push(MemoryRegion {
            name,
            base,
            size,
            kind,
            owner: owner.into(),
            storage,
        });
        Ok(RegionHandle(self.regions.len() - 1))
    }

    /// Claim a device MMIO window.
    pub fn map_mmio(&mut self, name: impl Into<String>, base: u64, size: u64) -> Result<()> {
        let name = name.into();
        self.check_free(&name, base, size)?;
        debug!("map mmio '{}' at 0x{:08X}..0x{:08X}", name, base, base + size);
        self.mmio.push(MmioWindow { name, base, size });
        Ok(())
    }

    fn check_free(&self, name: &str, base: u64, size: u64) -> Result<()> {
        let end = base as u128 + size as u128;
        // End addresses are kept representable as u64.
        let limit = (1u128 << self.address_bits).min(u64::MAX as u128);
        if size == 0 || end > limit {
            return Err(BoardError::Range {
                name: name.to_string(),
                base,
                size,
                limit_bits: self.address_bits,
            });
        }
        let end = end as u64;

        let claimed = self
            .regions
            .iter()
            .map(|r| (r.name.as_str(), r.base, r.end()))
            .chain(self.mmio.iter().map(|w| (w.name.as_str(), w.base, w.end())));
        for (existing, existing_base, existing_end) in claimed {
            if base < existing_end && existing_base < end {
                return Err(BoardError::Overlap {
                    name: name.to_string(),
                    base,
                    end,
                    existing: existing.to_string(),
                    existing_base,
                    existing_end,
                });
            }
        }
        Ok(())
    }

    /// Look up a region by handle.
    pub fn region(&self, handle: RegionHandle) -> Option<&MemoryRegion> {
        self.regions.get(handle.0)
    }

    /// Look up a region by name.
    pub fn region_by_name(&self, name: &str) -> Option<&MemoryRegion> {
        self.regions.iter().find(|r| r.name == name)
    }

    /// The memory region containing `addr`, if any.
    pub fn region_at(&self, addr: u64) -> Option<&MemoryRegion> {
        self.regions.iter().find(|r| r.contains(addr, 1))
    }

    /// The MMIO window containing `addr`, if any.
    pub fn mmio_at(&self, addr: u64) -> Option<&MmioWindow> {
        self.mmio.iter().find(|w| addr >= w.base && addr < w.end())
    }

    /// All memory regions in registration order.
    pub fn regions(&self) -> &[MemoryRegion] {
        &self.regions
    }

    /// All MMIO windows in mapping order.
    pub fn mmio_windows(&self) -> &[MmioWindow] {
        &self.mmio
    }

    fn locate(&self, addr: u64, len: u64) -> Result<usize> {
        self.regions
            .iter()
            .position(|r| r.contains(addr, len))
            .ok_or(BoardError::Unmapped { addr, len })
    }

    /// Read `len` bytes starting at `addr`.
    pub fn read(&self, addr: u64, len: u64) -> Result<Vec<u8>> {
        let region = &self.regions[self.locate(addr, len)?];
        let storage = region.storage.as_ref().ok_or_else(|| BoardError::NotBacked {
            region: region.name.clone(),
        })?;
        let offset = (addr - region.base) as usize;
        Ok(storage[offset..offset + len as usize].to_vec())
    }

    /// Guest-style write; fails on ROM.
    pub fn write(&mut self, addr: u64, data: &[u8]) -> Result<()> {
        let idx = self.locate(addr, data.len() as u64)?;
        if self.regions[idx].kind == RegionKind::Rom {
            return Err(BoardError::ReadOnly {
                region: self.regions[idx].name.clone(),
                addr,
            });
        }
        self.store(idx, addr, data)
    }

    /// Loader write; ROM regions accept it.
    pub fn load(&mut self, addr: u64, data: &[u8]) -> Result<()> {
        let idx = self.locate(addr, data.len() as u64)?;
        self.store(idx, addr, data)
    }

    fn store(&mut self, idx: usize, addr: u64, data: &[u8]) -> Result<()> {
        let region = &mut self.regions[idx];
        let storage = region.storage.as_mut().ok_or_else(|| BoardError::NotBacked {
            region: region.name.clone(),
        })?;
        let offset = (addr - region.base) as usize;
        storage[offset..offset + data.len()].copy_from_slice(data);
        Ok(())
    }
}
