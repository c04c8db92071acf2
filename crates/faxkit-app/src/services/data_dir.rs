// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Platform-aware configuration location.

use std::path::{Path, PathBuf};

/// Directory holding Faxkit's per-user configuration.
pub fn config_dir() -> PathBuf {
    config_base(
        std::env::var_os("XDG_CONFIG_HOME").map(PathBuf::from),
        std::env::var_os("HOME").map(PathBuf::from),
    )
    .join("faxkit")
}

/// Default configuration file, `config.json` in [`config_dir`].
pub fn config_path() -> PathBuf {
    config_dir().join("config.json")
}

fn config_base(xdg: Option<PathBuf>, home: Option<PathBuf>) -> PathBuf {
    // XDG first, then ~/.config, then the working directory.
    xdg.filter(|p| p.is_absolute())
        .or_else(|| home.map(|h| h.join(".config")))
        .unwrap_or_else(|| Path::new(".").to_path_buf())
}
