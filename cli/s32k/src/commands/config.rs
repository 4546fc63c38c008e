//! `s32k config`: configuration templates and validation.

use std::path::Path;

use anyhow::{bail, Context, Result};

use s32k_board::{generate_template, load_config_toml, validate_config, BoardLayout, Severity};

/// Print a starter configuration.
pub fn template() -> Result<()> {
    let toml_str = generate_template(&BoardLayout::s32k3x8evb())?;
    print!("{toml_str}");
    Ok(())
}

/// Validate a configuration file, failing on any error-level issue.
pub fn validate(path: &Path) -> Result<()> {
    let config =
        load_config_toml(path).with_context(|| format!("loading {}", path.display()))?;
    let layout = BoardLayout::s32k3x8evb();

    match validate_config(&config, &layout) {
        Ok(()) => {
            println!("{}: ok", path.display());
            Ok(())
        }
        Err(issues) => {
            let mut errors = 0;
            for issue in &issues {
                match issue.severity {
                    Severity::Error => {
                        errors += 1;
                        eprintln!("error: {}", issue.message);
                    }
                    Severity::Warning => eprintln!("warning: {}", issue.message),
                }
            }
            if errors > 0 {
                bail!("{}: {errors} error(s)", path.display());
            }
            println!("{}: ok ({} warning(s))", path.display(), issues.len());
            Ok(())
        }
    }
}
