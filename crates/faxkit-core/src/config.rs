// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Engine configuration.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::Result;

/// Tunables for rendering, editing, burn-in and assembly.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FaxkitConfig {
    /// Rasterization resolution at 100% zoom.
    pub render_dpi: f64,
    /// Directory holding the PDFium shared library. Searched before the
    /// executable's directory, the working directory and the system paths.
    pub pdfium_library: Option<PathBuf>,
    /// Zoom range and step.
    pub zoom: ZoomLimits,
    /// Maximum undo snapshots kept per page.
    pub history_limit: usize,
    /// Brush width (points) for new strokes.
    pub default_brush_width: f64,
    /// Opacity applied to highlight strokes when burned in (0..=1).
    pub highlight_opacity: f64,
    /// Backoff used when the destination file is locked.
    pub lock_retry: LockRetry,
    /// Pre-flight limits for the assembled output.
    pub limits: OutputLimits,
    /// What to do when a redaction partially covers an image we cannot decode.
    pub partial_image_policy: PartialImagePolicy,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct ZoomLimits {
    pub min: f64,
    pub max: f64,
    /// Multiplicative step for zoom in / zoom out.
    pub step: f64,
    pub default: f64,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct LockRetry {
    pub max_attempts: u32,
    pub base_delay_ms: u64,
    pub max_delay_ms: u64,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputLimits {
    /// Largest combined source size accepted by the fax gateway.
    pub max_output_size_mb: f64,
    /// Page count above which a warning is raised.
    pub large_page_count: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PartialImagePolicy {
    /// Fail the page with a redaction error.
    Fail,
    /// Remove the whole image from the page.
    DropImage,
}

impl Default for FaxkitConfig {
    fn default() -> Self {
        Self {
            render_dpi: 150.0,
            pdfium_library: None,
            zoom: ZoomLimits::default(),
            history_limit: 50,
            default_brush_width: 10.0,
            highlight_opacity: 0.5,
            lock_retry: LockRetry::default(),
            limits: OutputLimits::default(),
            partial_image_policy: PartialImagePolicy::Fail,
        }
    }
}

impl Default for ZoomLimits {
    fn default() -> Self {
        Self {
            min: 0.25,
            max: 5.0,
            step: 1.25,
            default: 1.0,
        }
    }
}

impl Default for LockRetry {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            base_delay_ms: 250,
            max_delay_ms: 2_000,
        }
    }
}

impl Default for OutputLimits {
    fn default() -> Self {
        Self {
            max_output_size_mb: 36.0,
            large_page_count: 100,
        }
    }
}

impl ZoomLimits {
    /// Clamp a requested zoom factor into range. Non-finite requests fall back
    /// to the default factor.
    pub fn clamp(&self, requested: f64) -> f64 {
        if !requested.is_finite() {
            return self.default.clamp(self.min, self.max);
        }
        requested.clamp(self.min, self.max)
    }
}

impl FaxkitConfig {
    /// Read a JSON config file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let data = std::fs::read_to_string(path.as_ref())?;
        let config = serde_json::from_str(&data)?;
        debug!(path = %path.as_ref().display(), "config loaded");
        Ok(config)
    }

    /// Read a JSON config file, falling back to defaults when it is missing or
    /// unreadable.
    pub fn load_or_default(path: impl AsRef<Path>) -> Self {
        match Self::load(path.as_ref()) {
            Ok(config) => config,
            Err(err) => {
                if path.as_ref().exists() {
                    warn!(path = %path.as_ref().display(), error = %err, "ignoring unreadable config");
                }
                Self::default()
            }
        }
    }

    /// Write the config as pretty JSON.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path.as_ref(), json)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zoom_clamps_out_of_range_requests() {
        let zoom = ZoomLimits::default();
        assert_eq!(zoom.clamp(10.0), 5.0);
        assert_eq!(zoom.clamp(0.01), 0.25);
        assert_eq!(zoom.clamp(2.5), 2.5);
        assert_eq!(zoom.clamp(f64::NAN), 1.0);
    }

    #[test]
    fn partial_file_fills_in_defaults() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("faxkit.json");
        std::fs::write(&path, r#"{ "render_dpi": 200.0, "zoom": { "max": 4.0 } }"#)
            .expect("write config");

        let config = FaxkitConfig::load(&path).expect("load");
        assert_eq!(config.render_dpi, 200.0);
        assert_eq!(config.zoom.max, 4.0);
        assert_eq!(config.zoom.min, 0.25);
        assert_eq!(config.history_limit, 50);
    }

    #[test]
    fn missing_file_yields_defaults() {
        let dir = tempfile::tempdir().expect("tempdir");
        let config = FaxkitConfig::load_or_default(dir.path().join("absent.json"));
        assert_eq!(config.lock_retry.max_attempts, 5);
        assert_eq!(config.partial_image_policy, PartialImagePolicy::Fail);
    }

    #[test]
    fn save_then_load() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("faxkit.json");
        let mut config = FaxkitConfig::default();
        config.history_limit = 12;
        config.save(&path).expect("save");
        assert_eq!(FaxkitConfig::load(&path).expect("load").history_limit, 12);
    }
}
