//! Fixed board layout descriptions.
//!
//! A [`BoardLayout`] names every constant the composer needs: memory
//! regions, the flash bank that receives firmware, the UART window, the
//! interrupt controller shape, and the four clock domains.

use serde::{Deserialize, Serialize};

use crate::address_space::RegionKind;
use crate::clock::{ClockDomain, ClockValue};
use crate::error::{BoardError, Result};

const KIB: u64 = 1024;
const MIB: u64 = 1024 * KIB;

/// A memory region to register at composition time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct RegionSpec {
    /// Region name.
    pub name: String,
    /// Base address.
    pub base: u64,
    /// Size in bytes.
    pub size: u64,
    /// Backing kind.
    pub kind: RegionKind,
}

/// Contiguous flash blocks that together hold the firmware image.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct FlashBank {
    /// Base address of the first block.
    pub base: u64,
    /// Size of each block in bytes.
    pub block_size: u64,
    /// Number of blocks.
    pub block_count: u32,
}

impl FlashBank {
    /// Total capacity across all blocks.
    pub fn capacity(&self) -> Result<u64> {
        self.block_size
            .checked_mul(self.block_count as u64)
            .filter(|total| self.base.checked_add(*total).is_some())
            .ok_or_else(|| BoardError::Range {
                name: "flash bank".to_string(),
                base: self.base,
                size: self.block_size,
                limit_bits: 64,
            })
    }

    /// Base address of block `index`.
    pub fn block_base(&self, index: u32) -> Option<u64> {
        if index >= self.block_count {
            return None;
        }
        self.block_size
            .checked_mul(index as u64)
            .and_then(|offset| self.base.checked_add(offset))
    }
}

/// Placement of identical UART instances.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct UartWindow {
    /// MMIO base of instance 0.
    pub base: u64,
    /// Distance between consecutive instances; also each window's size.
    pub stride: u64,
}

/// Interrupt controller shape.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct ControllerSpec {
    /// Number of external input lines.
    pub lines: u32,
    /// Implemented priority bits.
    pub priority_bits: u32,
}

/// A named clock and the role it plays.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct ClockSpec {
    /// Board role.
    pub domain: ClockDomain,
    /// Clock name in the tree.
    pub name: String,
    /// Frequency or period.
    pub value: ClockValue,
}

/// Complete static description of a board.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct BoardLayout {
    /// Machine name (e.g., "s32k3x8evb").
    pub name: String,
    /// Human-readable description.
    pub description: String,
    /// CPU type used when the configuration names none.
    pub default_cpu: String,
    /// Width of the address space in bits.
    pub address_bits: u32,
    /// Memory regions, including the flash bank's region.
    pub regions: Vec<RegionSpec>,
    /// Firmware flash bank.
    pub flash: FlashBank,
    /// UART placement.
    pub uart: UartWindow,
    /// Interrupt controller shape.
    pub controller: ControllerSpec,
    /// Clock domains.
    pub clocks: Vec<ClockSpec>,
}

impl BoardLayout {
    /// Clock spec for a board role.
    pub fn clock(&self, domain: ClockDomain) -> Option<&ClockSpec> {
        self.clocks.iter().find(|c| c.domain == domain)
    }

    /// NXP S32K3X8EVB evaluation board.
    pub fn s32k3x8evb() -> Self {
        Self {
            name: "s32k3x8evb".into(),
            description: "NXP S32K3X8EVB Evaluation Board".into(),
            default_cpu: "cortex-m7".into(),
            address_bits: 32,
            regions: vec![
                RegionSpec {
                    name: "boot-tcm".into(),
                    base: 0x0000_0000,
                    size: 64 * KIB,
                    kind: RegionKind::Ram,
                },
                RegionSpec {
                    name: "flash".into(),
                    base: 0x0040_0000,
                    size: 8 * MIB,
                    kind: RegionKind::Rom,
                },
                RegionSpec {
                    name: "data-flash".into(),
                    base: 0x1000_0000,
                    size: 128 * KIB,
                    kind: RegionKind::Rom,
                },
                RegionSpec {
                    name: "tcm".into(),
                    base: 0x2000_0000,
                    size: 128 * KIB,
                    kind: RegionKind::Ram,
                },
                RegionSpec {
                    name: "sram".into(),
                    base: 0x2040_0000,
                    size: 768 * KIB,
                    kind: RegionKind::Ram,
                },
            ],
            flash: FlashBank {
                base: 0x0040_0000,
                block_size: 2 * MIB,
                block_count: 4,
            },
            uart: UartWindow {
                base: 0x4006_A000,
                stride: 0x1000,
            },
            controller: ControllerSpec {
                lines: 256,
                priority_bits: 4,
            },
            clocks: vec![
                ClockSpec {
                    domain: ClockDomain::System,
                    name: "sysclk".into(),
                    value: ClockValue::Period {
                        ns: 1_000_000_000.0 / 240_000_000.0,
                    },
                },
                ClockSpec {
                    domain: ClockDomain::Reference,
                    name: "refclk".into(),
                    value: ClockValue::Frequency { hz: 1_000_000 },
                },
                ClockSpec {
                    domain: ClockDomain::FastBus,
                    name: "aips_plat_clk".into(),
                    value: ClockValue::Frequency { hz: 80_000_000 },
                },
                ClockSpec {
                    domain: ClockDomain::SlowBus,
                    name: "aips_slow_clk".into(),
                    value: ClockValue::Frequency { hz: 40_000_000 },
                },
            ],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flash_bank_capacity() {
        let layout = BoardLayout::s32k3x8evb();
        assert_eq!(layout.flash.capacity().unwrap(), 8 * MIB);
        assert_eq!(layout.flash.block_base(0), Some(0x0040_0000));
        assert_eq!(layout.flash.block_base(3), Some(0x00A0_0000));
        assert_eq!(layout.flash.block_base(4), None);
    }

    #[test]
    fn oversized_flash_bank_is_a_range_error() {
        let bank = FlashBank {
            base: 0x0040_0000,
            block_size: u64::MAX / 2,
            block_count: 4,
        };
        assert!(matches!(bank.capacity(), Err(BoardError::Range { .. })));
        assert_eq!(bank.block_base(3), None);

        let near_top = FlashBank {
            base: u64::MAX - 0xFF,
            block_size: 0x100,
            block_count: 2,
        };
        assert!(near_top.capacity().is_err());
    }

    #[test]
    fn fixed_constants() {
        let layout = BoardLayout::s32k3x8evb();
        assert_eq!(layout.regions.len(), 5);
        let sram = layout.regions.iter().find(|r| r.name == "sram").unwrap();
        assert_eq!((sram.base, sram.size), (0x2040_0000, 768 * KIB));
        assert_eq!(layout.uart.base, 0x4006_A000);
        assert_eq!(layout.controller.lines, 256);
        assert_eq!(layout.controller.priority_bits, 4);
    }

    #[test]
    fn four_distinct_clock_domains() {
        let layout = BoardLayout::s32k3x8evb();
        assert_eq!(layout.clocks.len(), 4);
        assert_eq!(layout.clock(ClockDomain::FastBus).unwrap().name, "aips_plat_clk");
        assert_eq!(layout.clock(ClockDomain::System).unwrap().value.hz(), 240_000_000);
        let mut hz: Vec<u64> = layout.clocks.iter().map(|c| c.value.hz()).collect();
        hz.sort_unstable();
        hz.dedup();
        assert_eq!(hz.len(), 4);
    }
}
