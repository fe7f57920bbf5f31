use crate::types::Result;
use dialoguer::Confirm;
use std::path::Path;

/// Asks before replacing an existing file. Missing files and `assume_yes` skip the prompt.
pub fn confirm_overwrite(path: &Path, assume_yes: bool) -> Result<bool> {
    if assume_yes || !path.exists() {
        return Ok(true);
    }
    let overwrite = Confirm::new()
        .with_prompt(format!("Overwrite existing snapshot {}?", path.display()))
        .default(false)
        .show_default(true)
        .interact()?;
    Ok(overwrite)
}
