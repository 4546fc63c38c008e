//! `s32k compose`: build the board and report it.

use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use log::warn;

use s32k_board::{
    load_config_toml, validate_config, BoardComposer, BoardDescriptor, BoardLayout,
    FirmwareImage, MachineConfig, Severity,
};

/// Arguments for `s32k compose`.
pub struct ComposeArgs {
    pub config: Option<PathBuf>,
    pub firmware: Option<PathBuf>,
    pub uarts: Option<u32>,
    pub cpu: Option<String>,
    pub serial: Vec<String>,
    pub json: bool,
}

pub fn run(args: &ComposeArgs) -> Result<()> {
    let board = compose(args)?;
    let summary = board.summary();
    if args.json {
        println!("{}", summary.to_json()?);
    } else {
        print!("{summary}");
    }
    Ok(())
}

/// Resolve configuration, read the firmware file, and compose.
pub fn compose(args: &ComposeArgs) -> Result<BoardDescriptor> {
    let layout = BoardLayout::s32k3x8evb();
    let config = resolve_config(args)?;

    if let Err(issues) = validate_config(&config, &layout) {
        let mut errors = 0;
        for issue in &issues {
            match issue.severity {
                Severity::Error => {
                    errors += 1;
                    eprintln!("error: {}", issue.message);
                }
                Severity::Warning => warn!("{}", issue.message),
            }
        }
        if errors > 0 {
            bail!("machine configuration has {errors} error(s)");
        }
    }

    let path = config
        .firmware
        .clone()
        .context("no firmware image given (use --firmware or set `firmware` in the config)")?;
    let bytes =
        std::fs::read(&path).with_context(|| format!("reading firmware {}", path.display()))?;
    let backends = config.open_serial().context("opening serial bindings")?;

    let board = BoardComposer::new(layout, config)
        .with_backends(backends)
        .compose(&FirmwareImage::new(bytes))?;
    Ok(board)
}

fn resolve_config(args: &ComposeArgs) -> Result<MachineConfig> {
    let mut config = match &args.config {
        Some(path) => {
            let mut config = load_config_toml(path)
                .with_context(|| format!("loading {}", path.display()))?;
            // Firmware paths in a config file are relative to the file.
            if let (Some(fw), Some(dir)) = (config.firmware.as_mut(), path.parent()) {
                if fw.is_relative() {
                    *fw = dir.join(&*fw);
                }
            }
            config
        }
        None => MachineConfig::default(),
    };

    if let Some(fw) = &args.firmware {
        config.firmware = Some(fw.clone());
    }
    if let Some(n) = args.uarts {
        config.uart_count = n;
    }
    if let Some(cpu) = &args.cpu {
        config.cpu_type = Some(cpu.clone());
    }
    if !args.serial.is_empty() {
        config.serial = args.serial.clone();
    }
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(firmware: Option<PathBuf>) -> ComposeArgs {
        ComposeArgs {
            config: None,
            firmware,
            uarts: None,
            cpu: None,
            serial: Vec::new(),
            json: false,
        }
    }

    #[test]
    fn compose_from_flags() {
        let dir = tempfile::tempdir().unwrap();
        let fw = dir.path().join("app.bin");
        std::fs::write(&fw, vec![0xA5u8; 4096]).unwrap();

        let mut a = args(Some(fw));
        a.uarts = Some(4);
        let board = compose(&a).unwrap();
        assert_eq!(board.peripherals().len(), 4);
        assert_eq!(
            board.address_space().read(0x0040_0000, 4).unwrap(),
            vec![0xA5; 4]
        );
    }

    #[test]
    fn config_relative_firmware() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("fw.bin"), [1u8, 2, 3, 4]).unwrap();
        let cfg = dir.path().join("board.toml");
        std::fs::write(&cfg, "uart-count = 2\nfirmware = \"fw.bin\"\n").unwrap();

        let mut a = args(None);
        a.config = Some(cfg);
        let board = compose(&a).unwrap();
        assert_eq!(board.peripherals().len(), 2);
        assert_eq!(board.firmware().size, 4);
    }

    #[test]
    fn missing_firmware_is_an_error() {
        assert!(compose(&args(None)).is_err());
    }

    #[test]
    fn oversized_firmware_fails() {
        let dir = tempfile::tempdir().unwrap();
        let fw = dir.path().join("big.bin");
        std::fs::write(&fw, vec![0u8; 9 * 1024 * 1024]).unwrap();
        let err = compose(&args(Some(fw))).unwrap_err();
        assert!(format!("{err:#}").contains("exceeds flash capacity"));
    }

    #[test]
    fn invalid_cpu_flag_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let fw = dir.path().join("app.bin");
        std::fs::write(&fw, [0u8; 8]).unwrap();
        let mut a = args(Some(fw));
        a.cpu = Some("cortex-a53".into());
        assert!(compose(&a).is_err());
    }
}
