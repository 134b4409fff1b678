// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Data directory resolution.

use std::path::PathBuf;

use printdesk_core::config::StoreConfig;
use printdesk_core::error::Result;

/// Return the data directory, creating it if needed.
///
/// `PRINTDESK_DATA_DIR` wins; otherwise `$XDG_DATA_HOME/printdesk`, then
/// `~/.local/share/printdesk`.
pub fn data_dir(config: &StoreConfig) -> Result<PathBuf> {
    let dir = match &config.data_dir {
        Some(dir) => dir.clone(),
        None => platform_data_home().join("printdesk"),
    };
    std::fs::create_dir_all(&dir)?;
    Ok(dir)
}

fn platform_data_home() -> PathBuf {
    if let Ok(xdg) = std::env::var("XDG_DATA_HOME") {
        return PathBuf::from(xdg);
    }
    if let Ok(home) = std::env::var("HOME") {
        return PathBuf::from(home).join(".local").join("share");
    }
    // Last resort
    std::env::temp_dir()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn explicit_dir_is_created() {
        let tmp = tempfile::tempdir().unwrap();
        let wanted = tmp.path().join("nested").join("printdesk");
        let config = StoreConfig {
            data_dir: Some(wanted.clone()),
            ..StoreConfig::default()
        };
        assert_eq!(data_dir(&config).unwrap(), wanted);
        assert!(wanted.is_dir());
    }
}
