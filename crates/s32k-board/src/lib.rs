//! Board and SoC composition engine for the S32K3X8EVB machine model.
//!
//! Composition assembles a runnable machine description in one pass:
//! - **Address space:** flat map of memory regions and MMIO windows
//! - **Clock tree:** system, reference, fast-bus and slow-bus domains
//! - **Interrupt controller:** NVIC with numbered input lines
//! - **Device wiring:** UART instances placed, clocked and connected
//! - **Firmware:** image copied into the flash bank
//!
//! [`BoardComposer`] sequences the stages and yields a read-only
//! [`BoardDescriptor`] for the execution engine.

pub mod address_space;
pub mod chardev;
pub mod clock;
pub mod composer;
pub mod config;
pub mod descriptor;
pub mod device;
pub mod error;
pub mod firmware;
pub mod interrupt;
pub mod layout;
pub mod wiring;

pub use address_space::{AddressSpace, MemoryRegion, MmioWindow, RegionHandle, RegionKind};
pub use chardev::{BufferBackend, CharBackend, FileBackend, NullBackend, SerialSpec, StdioBackend};
pub use clock::{Clock, ClockDomain, ClockRef, ClockTree, ClockValue};
pub use composer::{BoardComposer, CompositionError, Stage};
pub use config::{
    generate_template, load_config_toml, parse_config_toml, validate_config, MachineConfig,
    Severity, ValidationIssue,
};
pub use descriptor::{BoardDescriptor, BoardSummary};
pub use device::{DeviceKind, Peripheral};
pub use error::{BoardError, Result};
pub use firmware::{load_firmware, FirmwareImage, ImageDigest, LoadedFirmware, VectorTable};
pub use interrupt::{InterruptController, IrqLine};
pub use layout::{BoardLayout, ClockSpec, ControllerSpec, FlashBank, RegionSpec, UartWindow};
pub use wiring::{uart_clock_domain, DeviceWiringEngine, FAST_CLOCK_UARTS};
