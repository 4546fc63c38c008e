//! `s32k describe`: print the fixed board layout.

use anyhow::{bail, Result};

use s32k_board::{uart_clock_domain, BoardLayout, MachineConfig};

pub fn run(format: Option<&str>) -> Result<()> {
    let layout = BoardLayout::s32k3x8evb();
    match format {
        None | Some("human") => print!("{}", render(&layout)?),
        Some("json") => println!("{}", serde_json::to_string_pretty(&layout)?),
        Some(other) => bail!("unknown format '{other}' (expected human or json)"),
    }
    Ok(())
}

fn render(layout: &BoardLayout) -> Result<String> {
    let mut out = String::new();
    out.push_str(&format!("=== Machine: {} ===\n", layout.name));
    out.push_str(&format!("{}\n", layout.description));
    out.push_str(&format!("Default CPU: {}\n\n", layout.default_cpu));

    out.push_str("--- Memory ---\n");
    for r in &layout.regions {
        out.push_str(&format!(
            "  {:<12} 0x{:08X} - 0x{:08X} ({} KiB) [{:?}]\n",
            r.name,
            r.base,
            r.base + r.size,
            r.size / 1024,
            r.kind
        ));
    }
    out.push_str(&format!(
        "  firmware bank: {} x {} KiB at 0x{:08X} ({} bytes)\n\n",
        layout.flash.block_count,
        layout.flash.block_size / 1024,
        layout.flash.base,
        layout.flash.capacity()?
    ));

    out.push_str("--- Clocks ---\n");
    for c in &layout.clocks {
        out.push_str(&format!(
            "  {:<10} {:<14} {} Hz\n",
            c.domain.to_string(),
            c.name,
            c.value.hz()
        ));
    }
    out.push('\n');

    out.push_str(&format!(
        "--- Interrupt controller: {} lines, {} priority bits ---\n\n",
        layout.controller.lines, layout.controller.priority_bits
    ));

    out.push_str(&format!(
        "--- UARTs: base 0x{:08X}, stride 0x{:X} ---\n",
        layout.uart.base, layout.uart.stride
    ));
    for i in 0..MachineConfig::default().uart_count {
        out.push_str(&format!(
            "  lpuart{:<3} 0x{:08X}  irq {:<3} {}\n",
            i,
            layout.uart.base + layout.uart.stride * i as u64,
            i,
            uart_clock_domain(i)
        ));
    }
    Ok(out)
}
