//! UART placement and wiring.
//!
//! For N identical instances the engine computes each instance's MMIO base,
//! clock domain, and interrupt line, then builds, maps, and connects them in
//! one pass. The first failure aborts the whole pass.

use std::sync::Arc;

use log::{debug, warn};

use crate::address_space::AddressSpace;
use crate::chardev::{CharBackend, NullBackend};
use crate::clock::{ClockDomain, ClockTree};
use crate::device::{DeviceKind, DeviceProps, Peripheral};
use crate::error::{BoardError, Result};
use crate::interrupt::InterruptController;
use crate::layout::BoardLayout;

/// UART instances clocked from the platform bus instead of the slow bus.
///
/// This is a hardware wiring fact, not a pattern. Keep it a table.
pub const FAST_CLOCK_UARTS: [u32; 3] = [0, 1, 8];

/// Clock domain a UART instance runs from.
pub fn uart_clock_domain(index: u32) -> ClockDomain {
    if FAST_CLOCK_UARTS.contains(&index) {
        ClockDomain::FastBus
    } else {
        ClockDomain::SlowBus
    }
}

/// Computed placement of one instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WiringPlan {
    /// Instance index.
    pub index: u32,
    /// MMIO window base.
    pub mmio_base: u64,
    /// MMIO window size.
    pub mmio_size: u64,
    /// Clock role feeding the instance.
    pub clock_domain: ClockDomain,
    /// Controller input line.
    pub irq_line: u32,
}

/// Places and wires identical peripheral instances.
pub struct DeviceWiringEngine<'a> {
    layout: &'a BoardLayout,
    kind: DeviceKind,
}

impl<'a> DeviceWiringEngine<'a> {
    /// Engine for the layout's UART window.
    pub fn new(layout: &'a BoardLayout) -> Self {
        Self {
            layout,
            kind: DeviceKind::Lpuart,
        }
    }

    /// Placement of instance `index`.
    pub fn plan(&self, index: u32) -> Result<WiringPlan> {
        let window = &self.layout.uart;
        let mmio_base = window
            .stride
            .checked_mul(index as u64)
            .and_then(|offset| window.base.checked_add(offset))
            .ok_or_else(|| BoardError::Range {
                name: format!("{}{index}", self.kind.prefix()),
                base: window.base,
                size: window.stride,
                limit_bits: self.layout.address_bits,
            })?;
        Ok(WiringPlan {
            index,
            mmio_base,
            mmio_size: window.stride,
            clock_domain: uart_clock_domain(index),
            irq_line: index,
        })
    }

    /// Build and wire `count` instances.
    ///
    /// `backends[i]` is the sink for instance `i`; instances past the end of
    /// the slice get a null sink. The controller must already be realized.
    pub fn wire(
        &self,
        count: u32,
        space: &mut AddressSpace,
        clocks: &ClockTree,
        controller: &mut InterruptController,
        backends: &[Arc<dyn CharBackend>],
    ) -> Result<Vec<Peripheral>> {
        if !controller.is_realized() {
            return Err(BoardError::not_ready(
                "peripherals cannot be wired before the interrupt controller is realized",
            ));
        }

        let lines = controller.line_count();
        if count > lines {
            return Err(BoardError::LineOutOfRange {
                line: count - 1,
                count: lines,
            });
        }
        if let Some(last) = count.checked_sub(1) {
            self.plan(last)?;
        }

        let mut wired = Vec::with_capacity(count as usize);
        for index in 0..count {
            let plan = self.plan(index)?;

            let clock_name = self
                .layout
                .clock(plan.clock_domain)
                .map(|c| c.name.as_str())
                .ok_or_else(|| BoardError::UnknownClock {
                    name: plan.clock_domain.to_string(),
                })?;
            let clock = clocks.lookup(clock_name)?;
            let irq = controller.input_line(plan.irq_line)?;
            let backend: Arc<dyn CharBackend> = match backends.get(index as usize) {
                Some(b) => Arc::clone(b),
                None => {
                    warn!("{}{index} has no serial binding; using null sink", self.kind.prefix());
                    Arc::new(NullBackend)
                }
            };

            let peripheral = (self.kind.factory())(DeviceProps {
                index,
                mmio_base: plan.mmio_base,
                mmio_size: plan.mmio_size,
                clock_domain: plan.clock_domain,
                clock,
                irq,
                backend,
            })?;
            space.map_mmio(&peripheral.name, peripheral.mmio_base, peripheral.mmio_size)?;
            controller.connect(irq, &peripheral.name)?;

            debug!(
                "wired {} ({}) at 0x{:08X}, irq {}, clock {} ({} Hz), sink {}",
                peripheral.name,
                peripheral.kind,
                peripheral.mmio_base,
                irq.number(),
                peripheral.clock.name(),
                peripheral.clock.hz(),
                peripheral.backend.label()
            );
            wired.push(peripheral);
        }
        Ok(wired)
    }
}
