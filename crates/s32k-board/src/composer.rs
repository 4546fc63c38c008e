//! Board composition orchestrator.
//!
//! Stages run strictly in order:
//! address space -> clocks -> interrupt controller -> SoC memory ->
//! peripherals -> firmware -> done.
//! Each stage method refuses to run unless the previous stage completed.
//! A failure leaves the composer at the last completed stage and latches
//! it: every later stage call and `finish` fail. There is no retry and no
//! rollback.

use std::fmt;
use std::sync::Arc;

use log::{debug, info};

use crate::address_space::AddressSpace;
use crate::chardev::CharBackend;
use crate::clock::ClockTree;
use crate::config::MachineConfig;
use crate::descriptor::BoardDescriptor;
use crate::device::Peripheral;
use crate::error::{BoardError, Result};
use crate::firmware::{load_firmware, FirmwareImage, LoadedFirmware};
use crate::interrupt::InterruptController;
use crate::layout::BoardLayout;
use crate::wiring::DeviceWiringEngine;

/// Composition progress.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Stage {
    Start,
    AddressSpaceBuilt,
    ClocksBuilt,
    ControllerReady,
    SocMemoryMapped,
    PeripheralsWired,
    FirmwareLoaded,
    Done,
}

impl Stage {
    /// The stage that follows this one.
    pub fn next(self) -> Option<Stage> {
        use Stage::*;
        match self {
            Start => Some(AddressSpaceBuilt),
            AddressSpaceBuilt => Some(ClocksBuilt),
            ClocksBuilt => Some(ControllerReady),
            ControllerReady => Some(SocMemoryMapped),
            SocMemoryMapped => Some(PeripheralsWired),
            PeripheralsWired => Some(FirmwareLoaded),
            FirmwareLoaded => Some(Done),
            Done => None,
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Stage::Start => "start",
            Stage::AddressSpaceBuilt => "address-space-built",
            Stage::ClocksBuilt => "clocks-built",
            Stage::ControllerReady => "controller-ready",
            Stage::SocMemoryMapped => "soc-memory-mapped",
            Stage::PeripheralsWired => "peripherals-wired",
            Stage::FirmwareLoaded => "firmware-loaded",
            Stage::Done => "done",
        };
        f.write_str(s)
    }
}

/// A composition that aborted.
#[derive(Debug, thiserror::Error)]
#[error("board composition aborted after stage '{reached}': {source}")]
pub struct CompositionError {
    /// Last stage that completed.
    pub reached: Stage,
    /// What went wrong.
    #[source]
    pub source: BoardError,
}

/// Builds a [`BoardDescriptor`] from a layout and a machine configuration.
pub struct BoardComposer {
    layout: BoardLayout,
    config: MachineConfig,
    backends: Vec<Arc<dyn CharBackend>>,
    stage: Stage,
    failed: Option<Stage>,
    space: Option<AddressSpace>,
    clocks: Option<ClockTree>,
    controller: Option<InterruptController>,
    peripherals: Vec<Peripheral>,
    firmware: Option<LoadedFirmware>,
}

impl BoardComposer {
    pub fn new(layout: BoardLayout, config: MachineConfig) -> Self {
        Self {
            layout,
            config,
            backends: Vec::new(),
            stage: Stage::Start,
            failed: None,
            space: None,
            clocks: None,
            controller: None,
            peripherals: Vec::new(),
            firmware: None,
        }
    }

    /// Character sinks for UART instances, in index order.
    pub fn with_backends(mut self, backends: Vec<Arc<dyn CharBackend>>) -> Self {
        self.backends = backends;
        self
    }

    /// Last completed stage.
    pub fn stage(&self) -> Stage {
        self.stage
    }

    /// Layout being composed.
    pub fn layout(&self) -> &BoardLayout {
        &self.layout
    }

    /// Stage that failed, if composition aborted.
    pub fn failed(&self) -> Option<Stage> {
        self.failed
    }

    fn require(&self, completed: Stage) -> Result<()> {
        if let Some(failed) = self.failed {
            return Err(BoardError::not_ready(format!(
                "composition aborted in stage '{failed}'"
            )));
        }
        if self.stage == completed {
            return Ok(());
        }
        Err(BoardError::not_ready(format!(
            "stage '{}' requires '{completed}', composer is at '{}'",
            completed.next().map_or_else(|| "-".to_string(), |s| s.to_string()),
            self.stage
        )))
    }

    /// Run one stage after `completed`. A stage error latches the composer
    /// so no later stage or `finish` can succeed.
    fn step(
        &mut self,
        completed: Stage,
        run: impl FnOnce(&mut Self) -> Result<()>,
    ) -> Result<()> {
        self.require(completed)?;
        let to = completed
            .next()
            .ok_or_else(|| BoardError::not_ready("composition is already done"))?;
        if let Err(e) = run(self) {
            self.failed = Some(to);
            return Err(e);
        }
        info!("{}: {}", self.layout.name, to);
        self.stage = to;
        Ok(())
    }

    fn missing(what: &str) -> BoardError {
        BoardError::not_ready(format!("{what} has not been built"))
    }

    /// Create the empty system address space.
    pub fn build_address_space(&mut self) -> Result<()> {
        self.step(Stage::Start, |c| {
            c.space = Some(AddressSpace::new("system", c.layout.address_bits)?);
            Ok(())
        })
    }

    /// Define every clock domain in the layout.
    pub fn build_clocks(&mut self) -> Result<()> {
        self.step(Stage::AddressSpaceBuilt, |c| {
            let mut clocks = ClockTree::new();
            for spec in &c.layout.clocks {
                clocks.define(spec.name.clone(), spec.value)?;
            }
            c.clocks = Some(clocks);
            Ok(())
        })
    }

    /// Create and realize the interrupt controller.
    pub fn create_controller(&mut self) -> Result<()> {
        self.step(Stage::ClocksBuilt, |c| {
            let space = c.space.as_ref().ok_or_else(|| Self::missing("address space"))?;
            let spec = &c.layout.controller;
            let mut controller = InterruptController::create(
                spec.lines,
                spec.priority_bits,
                c.config.cpu_type_or(&c.layout),
                space,
            )?;
            controller.realize();
            c.controller = Some(controller);
            Ok(())
        })
    }

    /// Register the SoC memory regions.
    pub fn map_soc_memory(&mut self) -> Result<()> {
        self.step(Stage::ControllerReady, |c| {
            let space = c.space.as_mut().ok_or_else(|| Self::missing("address space"))?;
            for region in &c.layout.regions {
                space.register(
                    region.name.clone(),
                    region.base,
                    region.size,
                    region.kind,
                    c.layout.name.clone(),
                )?;
            }
            Ok(())
        })
    }

    /// Instantiate and wire the UARTs.
    pub fn wire_peripherals(&mut self) -> Result<()> {
        self.step(Stage::SocMemoryMapped, |c| {
            let space = c.space.as_mut().ok_or_else(|| Self::missing("address space"))?;
            let clocks = c.clocks.as_ref().ok_or_else(|| Self::missing("clock tree"))?;
            let controller = c
                .controller
                .as_mut()
                .ok_or_else(|| Self::missing("interrupt controller"))?;

            let engine = DeviceWiringEngine::new(&c.layout);
            c.peripherals =
                engine.wire(c.config.uart_count, space, clocks, controller, &c.backends)?;
            Ok(())
        })
    }

    /// Copy the firmware image into the flash bank.
    pub fn load_firmware(&mut self, image: &FirmwareImage) -> Result<()> {
        self.step(Stage::PeripheralsWired, |c| {
            let space = c.space.as_mut().ok_or_else(|| Self::missing("address space"))?;
            let bank = &c.layout.flash;
            c.firmware = Some(load_firmware(space, image, bank.base, bank.capacity()?)?);
            Ok(())
        })
    }

    /// Hand over the committed board.
    pub fn finish(mut self) -> Result<BoardDescriptor> {
        self.require(Stage::FirmwareLoaded)?;
        let (Some(address_space), Some(clocks), Some(controller), Some(firmware)) = (
            self.space.take(),
            self.clocks.take(),
            self.controller.take(),
            self.firmware.take(),
        ) else {
            return Err(Self::missing("board"));
        };
        info!("{}: {}", self.layout.name, Stage::Done);
        self.stage = Stage::Done;
        Ok(BoardDescriptor {
            name: self.layout.name,
            description: self.layout.description,
            address_space,
            clocks,
            controller,
            peripherals: self.peripherals,
            firmware,
        })
    }

    /// Run every stage in order.
    pub fn compose(
        mut self,
        image: &FirmwareImage,
    ) -> std::result::Result<BoardDescriptor, CompositionError> {
        if let Err(source) = self.run_stages(image) {
            debug!(
                "{}: composition aborted after '{}': {}",
                self.layout.name, self.stage, source
            );
            return Err(CompositionError {
                reached: self.stage,
                source,
            });
        }
        let reached = self.stage;
        self.finish()
            .map_err(|source| CompositionError { reached, source })
    }

    fn run_stages(&mut self, image: &FirmwareImage) -> Result<()> {
        self.build_address_space()?;
        self.build_clocks()?;
        self.create_controller()?;
        self.map_soc_memory()?;
        self.wire_peripherals()?;
        self.load_firmware(image)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chardev::BufferBackend;
    use crate::clock::ClockDomain;

    const MIB: usize = 1024 * 1024;

    fn composer(uarts: u32) -> BoardComposer {
        let config = MachineConfig {
            uart_count: uarts,
            ..MachineConfig::default()
        };
        BoardComposer::new(BoardLayout::s32k3x8evb(), config)
    }

    fn image(len: usize) -> FirmwareImage {
        FirmwareImage::new((0..len).map(|i| (i % 251) as u8).collect())
    }

    #[test]
    fn stages_are_linear() {
        let mut stage = Stage::Start;
        let mut seen = vec![stage];
        while let Some(next) = stage.next() {
            assert!(next > stage);
            seen.push(next);
            stage = next;
        }
        assert_eq!(seen.len(), 8);
        assert_eq!(stage, Stage::Done);
    }

    #[test]
    fn compose_sixteen_uarts_with_4k_firmware() {
        let fw = image(4096);
        let board = composer(16).compose(&fw).unwrap();

        let p0 = board.peripheral(0).unwrap();
        assert_eq!(p0.mmio_base, 0x4006_A000);
        assert_eq!(p0.irq.number(), 0);
        assert_eq!(p0.clock_domain, ClockDomain::FastBus);

        let p8 = board.peripheral(8).unwrap();
        assert_eq!(p8.mmio_base, 0x4007_2000);
        assert_eq!(p8.irq.number(), 8);
        assert_eq!(p8.clock_domain, ClockDomain::FastBus);

        let p2 = board.peripheral(2).unwrap();
        assert_eq!(p2.mmio_base, 0x4006_C000);
        assert_eq!(p2.irq.number(), 2);
        assert_eq!(p2.clock_domain, ClockDomain::SlowBus);

        let loaded = board.address_space().read(0x0040_0000, 4096).unwrap();
        assert_eq!(loaded, fw.as_bytes());
        assert!(board.firmware().verify(board.address_space()).unwrap());
    }

    #[test]
    fn done_implies_complete_board() {
        let n = 16;
        let board = composer(n).compose(&image(256)).unwrap();

        let regions = board.address_space().regions();
        assert_eq!(regions.len(), 5);
        let mut names: Vec<&str> = regions.iter().map(|r| r.name.as_str()).collect();
        names.sort_unstable();
        assert_eq!(names, vec!["boot-tcm", "data-flash", "flash", "sram", "tcm"]);

        let clocks = board.clocks();
        assert_eq!(clocks.len(), 4);
        assert_eq!(clocks.lookup("sysclk").unwrap().hz(), 240_000_000);
        assert_eq!(clocks.lookup("refclk").unwrap().hz(), 1_000_000);
        assert_eq!(clocks.lookup("aips_plat_clk").unwrap().hz(), 80_000_000);
        assert_eq!(clocks.lookup("aips_slow_clk").unwrap().hz(), 40_000_000);

        assert_eq!(board.controller().line_count(), 256);
        assert_eq!(board.controller().priority_bits(), 4);
        assert_eq!(board.cpu_type(), "cortex-m7");

        assert_eq!(board.peripherals().len(), n as usize);
        assert!(board.assignments_unique());
        for (i, p) in board.peripherals().iter().enumerate() {
            let i = i as u32;
            assert_eq!(p.index, i);
            assert_eq!(p.mmio_base, 0x4006_A000 + i as u64 * 0x1000);
            assert_eq!(p.irq.number(), i);
            assert_eq!(board.controller().source(p.irq), Some(p.name.as_str()));
        }
    }

    #[test]
    fn nine_mib_image_never_reaches_done() {
        let err = composer(16).compose(&image(9 * MIB)).unwrap_err();
        assert_eq!(err.reached, Stage::PeripheralsWired);
        assert!(matches!(
            err.source,
            BoardError::ImageTooLarge { size, capacity }
                if size == 9 * MIB as u64 && capacity == 8 * MIB as u64
        ));
    }

    #[test]
    fn stages_out_of_order_are_not_ready() {
        let mut c = composer(4);
        assert!(matches!(
            c.wire_peripherals(),
            Err(BoardError::NotReady { .. })
        ));
        c.build_address_space().unwrap();
        c.build_clocks().unwrap();
        // Skipping the controller.
        assert!(matches!(
            c.map_soc_memory(),
            Err(BoardError::NotReady { .. })
        ));
        assert!(matches!(
            c.build_address_space(),
            Err(BoardError::NotReady { .. })
        ));
        assert_eq!(c.stage(), Stage::ClocksBuilt);
    }

    #[test]
    fn step_by_step_reaches_done() {
        let mut c = composer(2);
        c.build_address_space().unwrap();
        c.build_clocks().unwrap();
        c.create_controller().unwrap();
        c.map_soc_memory().unwrap();
        c.wire_peripherals().unwrap();
        c.load_firmware(&image(64)).unwrap();
        assert_eq!(c.stage(), Stage::FirmwareLoaded);
        let board = c.finish().unwrap();
        assert_eq!(board.peripherals().len(), 2);
    }

    #[test]
    fn failed_firmware_load_cannot_be_retried() {
        let mut c = composer(2);
        c.build_address_space().unwrap();
        c.build_clocks().unwrap();
        c.create_controller().unwrap();
        c.map_soc_memory().unwrap();
        c.wire_peripherals().unwrap();
        assert!(matches!(
            c.load_firmware(&image(9 * MIB)),
            Err(BoardError::ImageTooLarge { .. })
        ));
        assert_eq!(c.stage(), Stage::PeripheralsWired);
        assert_eq!(c.failed(), Some(Stage::FirmwareLoaded));

        assert!(matches!(
            c.load_firmware(&image(16)),
            Err(BoardError::NotReady { .. })
        ));
        assert!(matches!(c.finish(), Err(BoardError::NotReady { .. })));
    }

    #[test]
    fn failed_wiring_latches_the_composer() {
        let mut c = composer(300);
        c.build_address_space().unwrap();
        c.build_clocks().unwrap();
        c.create_controller().unwrap();
        c.map_soc_memory().unwrap();
        assert!(matches!(
            c.wire_peripherals(),
            Err(BoardError::LineOutOfRange { .. })
        ));
        assert_eq!(c.stage(), Stage::SocMemoryMapped);
        assert_eq!(c.failed(), Some(Stage::PeripheralsWired));
        assert!(matches!(
            c.wire_peripherals(),
            Err(BoardError::NotReady { .. })
        ));
        assert!(matches!(
            c.load_firmware(&image(16)),
            Err(BoardError::NotReady { .. })
        ));
        assert!(c.finish().is_err());
    }

    #[test]
    fn out_of_order_call_does_not_latch() {
        let mut c = composer(1);
        assert!(c.map_soc_memory().is_err());
        assert_eq!(c.failed(), None);
        c.build_address_space().unwrap();
    }

    #[test]
    fn huge_uart_count_is_an_error() {
        let err = composer(u32::MAX).compose(&image(16)).unwrap_err();
        assert_eq!(err.reached, Stage::SocMemoryMapped);
        assert!(matches!(
            err.source,
            BoardError::LineOutOfRange { count: 256, .. }
        ));
    }

    #[test]
    fn finish_before_firmware_fails() {
        let mut c = composer(1);
        c.build_address_space().unwrap();
        assert!(matches!(c.finish(), Err(BoardError::NotReady { .. })));
    }

    #[test]
    fn bad_cpu_aborts_at_controller() {
        let config = MachineConfig {
            cpu_type: Some("cortex-a9".into()),
            ..MachineConfig::default()
        };
        let err = BoardComposer::new(BoardLayout::s32k3x8evb(), config)
            .compose(&image(16))
            .unwrap_err();
        assert_eq!(err.reached, Stage::ClocksBuilt);
        assert!(matches!(err.source, BoardError::InvalidConfig { .. }));
    }

    #[test]
    fn overlapping_layout_aborts_at_memory() {
        let mut layout = BoardLayout::s32k3x8evb();
        layout.regions[4].base = 0x2001_0000;
        let err = BoardComposer::new(layout, MachineConfig::default())
            .compose(&image(16))
            .unwrap_err();
        assert_eq!(err.reached, Stage::ControllerReady);
        assert!(matches!(err.source, BoardError::Overlap { .. }));
    }

    #[test]
    fn backends_bind_in_order() {
        let console = Arc::new(BufferBackend::new());
        let board = composer(3)
            .with_backends(vec![console.clone() as Arc<dyn CharBackend>])
            .compose(&image(16))
            .unwrap();
        let uart0 = board.peripheral(0).unwrap();
        uart0.backend.write_bytes(b"hi").unwrap();
        assert_eq!(console.contents(), b"hi");
        assert_eq!(board.peripheral(1).unwrap().backend.label(), "null");
    }

    #[test]
    fn summary_exports_json() {
        let mut fw = vec![0u8; 64];
        fw[4..8].copy_from_slice(&0x0040_0101u32.to_le_bytes());
        let board = composer(16).compose(&FirmwareImage::new(fw)).unwrap();
        assert_eq!(board.entry_point(), Some(0x0040_0101));

        let summary = board.summary();
        assert_eq!(summary.peripherals.len(), 16);
        assert_eq!(summary.peripherals[8].clock, "aips_plat_clk");
        let json = summary.to_json().unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["machine"], "s32k3x8evb");
        assert_eq!(value["controller"]["lines"], 256);
        assert_eq!(value["peripherals"][2]["clock-domain"], "slow-bus");
        assert!(summary.to_string().contains("lpuart15"));
    }
}
