//! The committed board and its exported summary.

use std::collections::HashSet;
use std::fmt;

use serde::Serialize;

use crate::address_space::{AddressSpace, RegionKind};
use crate::clock::{ClockDomain, ClockTree};
use crate::device::Peripheral;
use crate::firmware::LoadedFirmware;
use crate::interrupt::InterruptController;

/// A fully composed machine, read-only from here on.
#[derive(Debug)]
pub struct BoardDescriptor {
    pub(crate) name: String,
    pub(crate) description: String,
    pub(crate) address_space: AddressSpace,
    pub(crate) clocks: ClockTree,
    pub(crate) controller: InterruptController,
    pub(crate) peripherals: Vec<Peripheral>,
    pub(crate) firmware: LoadedFirmware,
}

impl BoardDescriptor {
    /// Machine name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Human-readable board description.
    pub fn description(&self) -> &str {
        &self.description
    }

    /// CPU type the controller was created for.
    pub fn cpu_type(&self) -> &str {
        self.controller.cpu_type()
    }

    /// The system address space with memory and MMIO claimed.
    pub fn address_space(&self) -> &AddressSpace {
        &self.address_space
    }

    /// Clock tree shared by the peripherals.
    pub fn clocks(&self) -> &ClockTree {
        &self.clocks
    }

    /// The realized interrupt controller.
    pub fn controller(&self) -> &InterruptController {
        &self.controller
    }

    /// Wired peripherals in index order.
    pub fn peripherals(&self) -> &[Peripheral] {
        &self.peripherals
    }

    /// Peripheral with instance index `index`.
    pub fn peripheral(&self, index: u32) -> Option<&Peripheral> {
        self.peripherals.iter().find(|p| p.index == index)
    }

    /// Record of the loaded firmware image.
    pub fn firmware(&self) -> &LoadedFirmware {
        &self.firmware
    }

    /// Reset handler address from the firmware vector table.
    pub fn entry_point(&self) -> Option<u32> {
        self.firmware.vector_table.map(|v| v.reset_vector)
    }

    /// Whether no two peripherals share an MMIO base or an interrupt line.
    pub fn assignments_unique(&self) -> bool {
        let mut bases = HashSet::new();
        let mut lines = HashSet::new();
        self.peripherals
            .iter()
            .all(|p| bases.insert(p.mmio_base) && lines.insert(p.irq))
    }

    /// Serializable snapshot of the board.
    pub fn summary(&self) -> BoardSummary {
        BoardSummary {
            machine: self.name.clone(),
            description: self.description.clone(),
            cpu_type: self.cpu_type().to_string(),
            regions: self
                .address_space
                .regions()
                .iter()
                .map(|r| RegionSummary {
                    name: r.name.clone(),
                    base: r.base,
                    size: r.size,
                    kind: r.kind,
                })
                .collect(),
            clocks: self
                .clocks
                .iter()
                .map(|c| ClockSummary {
                    name: c.name().to_string(),
                    hz: c.hz(),
                })
                .collect(),
            controller: ControllerSummary {
                lines: self.controller.line_count(),
                priority_bits: self.controller.priority_bits(),
                connected: self.controller.connections().count() as u32,
            },
            peripherals: self
                .peripherals
                .iter()
                .map(|p| PeripheralSummary {
                    name: p.name.clone(),
                    type_tag: p.kind.type_tag().to_string(),
                    base: p.mmio_base,
                    size: p.mmio_size,
                    clock: p.clock.name().to_string(),
                    clock_domain: p.clock_domain,
                    irq: p.irq.number(),
                    sink: p.backend.label(),
                })
                .collect(),
            firmware: self.firmware.clone(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "kebab-case")]
pub struct RegionSummary {
    pub name: String,
    pub base: u64,
    pub size: u64,
    pub kind: RegionKind,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "kebab-case")]
pub struct ClockSummary {
    pub name: String,
    pub hz: u64,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "kebab-case")]
pub struct ControllerSummary {
    pub lines: u32,
    pub priority_bits: u32,
    pub connected: u32,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "kebab-case")]
pub struct PeripheralSummary {
    pub name: String,
    pub type_tag: String,
    pub base: u64,
    pub size: u64,
    pub clock: String,
    pub clock_domain: ClockDomain,
    pub irq: u32,
    pub sink: String,
}

/// Exported view of a composed board.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "kebab-case")]
pub struct BoardSummary {
    pub machine: String,
    pub description: String,
    pub cpu_type: String,
    pub regions: Vec<RegionSummary>,
    pub clocks: Vec<ClockSummary>,
    pub controller: ControllerSummary,
    pub peripherals: Vec<PeripheralSummary>,
    pub firmware: LoadedFirmware,
}

impl BoardSummary {
    /// Render as pretty JSON.
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}

impl fmt::Display for BoardSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "=== Machine: {} ===", self.machine)?;
        writeln!(f, "{}", self.description)?;
        writeln!(f, "CPU: {}", self.cpu_type)?;
        writeln!(f)?;

        writeln!(f, "--- Memory ---")?;
        for r in &self.regions {
            writeln!(
                f,
                "  {:<12} 0x{:08X} - 0x{:08X} ({} KiB) [{:?}]",
                r.name,
                r.base,
                r.base + r.size,
                r.size / 1024,
                r.kind
            )?;
        }
        writeln!(f)?;

        writeln!(f, "--- Clocks ---")?;
        for c in &self.clocks {
            writeln!(f, "  {:<14} {} Hz", c.name, c.hz)?;
        }
        writeln!(f)?;

        writeln!(
            f,
            "--- Interrupt controller: {} lines, {} priority bits, {} connected ---",
            self.controller.lines, self.controller.priority_bits, self.controller.connected
        )?;
        writeln!(f)?;

        writeln!(f, "--- Peripherals ---")?;
        for p in &self.peripherals {
            writeln!(
                f,
                "  {:<9} 0x{:08X}  irq {:<3} {:<14} -> {}",
                p.name, p.base, p.irq, p.clock, p.sink
            )?;
        }
        writeln!(f)?;

        writeln!(f, "--- Firmware ---")?;
        writeln!(
            f,
            "  {} / {} bytes at 0x{:08X}",
            self.firmware.size, self.firmware.capacity, self.firmware.base
        )?;
        writeln!(f, "  sha256 {}", self.firmware.digest)?;
        if let Some(vt) = self.firmware.vector_table {
            writeln!(
                f,
                "  initial SP 0x{:08X}, reset 0x{:08X}",
                vt.initial_sp, vt.reset_vector
            )?;
        }
        Ok(())
    }
}
