//! Peripheral device catalog.
//!
//! Device types are a closed enum; each maps to a factory that validates
//! the properties handed to it and produces a [`Peripheral`].

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::chardev::CharBackend;
use crate::clock::{ClockDomain, ClockRef};
use crate::error::{BoardError, Result};
use crate::interrupt::IrqLine;

/// Bytes of register space an LPUART decodes.
const LPUART_REGISTER_SPAN: u64 = 0x30;

/// Device types the catalog can build.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DeviceKind {
    /// Low-power UART.
    Lpuart,
}

/// Builds a peripheral from its wiring properties.
pub type DeviceFactory = fn(DeviceProps) -> Result<Peripheral>;

impl DeviceKind {
    /// Type tag as reported to the host.
    pub fn type_tag(self) -> &'static str {
        match self {
            DeviceKind::Lpuart => "s32k3-lpuart",
        }
    }

    /// Instance name prefix.
    pub fn prefix(self) -> &'static str {
        match self {
            DeviceKind::Lpuart => "lpuart",
        }
    }

    /// Factory for this device type.
    pub fn factory(self) -> DeviceFactory {
        match self {
            DeviceKind::Lpuart => new_lpuart,
        }
    }
}

impl fmt::Display for DeviceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.type_tag())
    }
}

/// Properties set on a device before it is realized.
#[derive(Debug, Clone)]
pub struct DeviceProps {
    /// Instance index.
    pub index: u32,
    /// MMIO base address.
    pub mmio_base: u64,
    /// MMIO window size.
    pub mmio_size: u64,
    /// Clock role feeding the device.
    pub clock_domain: ClockDomain,
    /// Clock the device is bound to.
    pub clock: ClockRef,
    /// Controller input line the device drives.
    pub irq: IrqLine,
    /// Character sink for transmitted bytes.
    pub backend: Arc<dyn CharBackend>,
}

/// A realized, fully wired device instance.
#[derive(Debug, Clone)]
pub struct Peripheral {
    /// Instance name (e.g., "lpuart3").
    pub name: String,
    /// Device type.
    pub kind: DeviceKind,
    /// Instance index.
    pub index: u32,
    /// MMIO base address.
    pub mmio_base: u64,
    /// MMIO window size.
    pub mmio_size: u64,
    /// Which board clock the instance runs from.
    pub clock_domain: ClockDomain,
    /// The clock itself.
    pub clock: ClockRef,
    /// Controller input the instance drives.
    pub irq: IrqLine,
    /// Where transmitted bytes go.
    pub backend: Arc<dyn CharBackend>,
}

fn new_lpuart(props: DeviceProps) -> Result<Peripheral> {
    let kind = DeviceKind::Lpuart;
    let name = format!("{}{}", kind.prefix(), props.index);
    if props.mmio_size < LPUART_REGISTER_SPAN {
        return Err(BoardError::invalid(format!(
            "{name}: MMIO window of 0x{:X} bytes cannot hold 0x{LPUART_REGISTER_SPAN:X} bytes of registers",
            props.mmio_size
        )));
    }
    Ok(Peripheral {
        name,
        kind,
        index: props.index,
        mmio_base: props.mmio_base,
        mmio_size: props.mmio_size,
        clock_domain: props.clock_domain,
        clock: props.clock,
        irq: props.irq,
        backend: props.backend,
    })
}
