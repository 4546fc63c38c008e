//! Nested vectored interrupt controller model.
//!
//! The controller is created with its configuration, then realized. Only a
//! realized controller hands out input lines; each line accepts one source.

use log::debug;

use crate::address_space::AddressSpace;
use crate::error::{BoardError, Result};

/// Largest external interrupt count an ARMv7-M NVIC supports.
pub const MAX_LINES: u32 = 496;

/// Supported priority-bit widths.
pub const MIN_PRIORITY_BITS: u32 = 2;
pub const MAX_PRIORITY_BITS: u32 = 8;

/// CPU cores the controller can service.
pub const SUPPORTED_CPUS: &[&str] = &[
    "cortex-m0",
    "cortex-m3",
    "cortex-m4",
    "cortex-m7",
    "cortex-m33",
];

/// Reference to one controller input line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct IrqLine(u32);

impl IrqLine {
    /// Line number.
    pub fn number(self) -> u32 {
        self.0
    }
}

/// The board's interrupt controller.
#[derive(Debug, Clone)]
pub struct InterruptController {
    line_count: u32,
    priority_bits: u32,
    cpu_type: String,
    observed_space: String,
    realized: bool,
    sources: Vec<Option<String>>,
}

impl InterruptController {
    /// Create an unrealized controller.
    pub fn create(
        line_count: u32,
        priority_bits: u32,
        cpu_type: &str,
        observed: &AddressSpace,
    ) -> Result<Self> {
        if line_count == 0 || line_count > MAX_LINES {
            return Err(BoardError::invalid(format!(
                "interrupt line count {line_count} outside 1..={MAX_LINES}"
            )));
        }
        if !(MIN_PRIORITY_BITS..=MAX_PRIORITY_BITS).contains(&priority_bits) {
            return Err(BoardError::invalid(format!(
                "priority bits {priority_bits} outside {MIN_PRIORITY_BITS}..={MAX_PRIORITY_BITS}"
            )));
        }
        if !SUPPORTED_CPUS.contains(&cpu_type) {
            return Err(BoardError::invalid(format!(
                "unsupported cpu type '{cpu_type}'"
            )));
        }
        Ok(Self {
            line_count,
            priority_bits,
            cpu_type: cpu_type.to_string(),
            observed_space: observed.name().to_string(),
            realized: false,
            sources: vec![None; line_count as usize],
        })
    }

    /// Commit the configuration. Lines become available afterwards.
    pub fn realize(&mut self) {
        if !self.realized {
            debug!(
                "realize interrupt controller: {} lines, {} priority bits, cpu {}",
                self.line_count, self.priority_bits, self.cpu_type
            );
        }
        self.realized = true;
    }

    /// Whether `realize` has run.
    pub fn is_realized(&self) -> bool {
        self.realized
    }

    /// Number of external input lines.
    pub fn line_count(&self) -> u32 {
        self.line_count
    }

    /// Implemented priority bits.
    pub fn priority_bits(&self) -> u32 {
        self.priority_bits
    }

    /// CPU type the controller serves.
    pub fn cpu_type(&self) -> &str {
        &self.cpu_type
    }

    /// Name of the address space the controller observes.
    pub fn observed_space(&self) -> &str {
        &self.observed_space
    }

    /// Input line `index`, usable as a wiring target.
    pub fn input_line(&self, index: u32) -> Result<IrqLine> {
        if !self.realized {
            return Err(BoardError::not_ready(
                "interrupt controller is not realized",
            ));
        }
        if index >= self.line_count {
            return Err(BoardError::LineOutOfRange {
                line: index,
                count: self.line_count,
            });
        }
        Ok(IrqLine(index))
    }

    /// Connect a device's interrupt output to `line`.
    pub fn connect(&mut self, line: IrqLine, source: &str) -> Result<()> {
        let line = self.input_line(line.0)?;
        let slot = &mut self.sources[line.0 as usize];
        if let Some(owner) = slot {
            return Err(BoardError::LineInUse {
                line: line.0,
                owner: owner.clone(),
            });
        }
        *slot = Some(source.to_string());
        Ok(())
    }

    /// The device driving `line`, if connected.
    pub fn source(&self, line: IrqLine) -> Option<&str> {
        self.sources.get(line.0 as usize)?.as_deref()
    }

    /// Connected lines and their sources, in line order.
    pub fn connections(&self) -> impl Iterator<Item = (IrqLine, &str)> {
        self.sources
            .iter()
            .enumerate()
            .filter_map(|(i, s)| s.as_deref().map(|s| (IrqLine(i as u32), s)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn system() -> AddressSpace {
        AddressSpace::new("system", 32).unwrap()
    }

    #[test]
    fn create_valid_controller() {
        let nvic = InterruptController::create(256, 4, "cortex-m7", &system()).unwrap();
        assert_eq!(nvic.line_count(), 256);
        assert_eq!(nvic.priority_bits(), 4);
        assert_eq!(nvic.cpu_type(), "cortex-m7");
        assert_eq!(nvic.observed_space(), "system");
        assert!(!nvic.is_realized());
    }

    #[test]
    fn invalid_parameters_rejected() {
        let s = system();
        assert!(matches!(
            InterruptController::create(0, 4, "cortex-m7", &s),
            Err(BoardError::InvalidConfig { .. })
        ));
        assert!(InterruptController::create(MAX_LINES + 1, 4, "cortex-m7", &s).is_err());
        assert!(InterruptController::create(256, 1, "cortex-m7", &s).is_err());
        assert!(InterruptController::create(256, 9, "cortex-m7", &s).is_err());
        assert!(InterruptController::create(256, 4, "cortex-a53", &s).is_err());
    }

    #[test]
    fn lines_require_realization() {
        let mut nvic = InterruptController::create(8, 3, "cortex-m4", &system()).unwrap();
        assert!(matches!(
            nvic.input_line(0),
            Err(BoardError::NotReady { .. })
        ));
        nvic.realize();
        assert_eq!(nvic.input_line(7).unwrap().number(), 7);
        assert!(matches!(
            nvic.input_line(8),
            Err(BoardError::LineOutOfRange { line: 8, count: 8 })
        ));
    }

    #[test]
    fn connect_before_realize_fails() {
        let mut unrealized = InterruptController::create(8, 3, "cortex-m4", &system()).unwrap();
        let mut realized = unrealized.clone();
        realized.realize();
        let line = realized.input_line(2).unwrap();
        assert!(matches!(
            unrealized.connect(line, "uart2"),
            Err(BoardError::NotReady { .. })
        ));
    }

    #[test]
    fn one_source_per_line() {
        let mut nvic = InterruptController::create(8, 3, "cortex-m4", &system()).unwrap();
        nvic.realize();
        let line = nvic.input_line(3).unwrap();
        nvic.connect(line, "uart3").unwrap();
        assert_eq!(nvic.source(line), Some("uart3"));
        assert!(matches!(
            nvic.connect(line, "uart4"),
            Err(BoardError::LineInUse { line: 3, .. })
        ));
        let connected: Vec<_> = nvic.connections().collect();
        assert_eq!(connected, vec![(line, "uart3")]);
    }
}
