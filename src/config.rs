//! Setup configuration.
//!
//! Every field has a default, so a missing or partial config file is valid.
//! The file is JSON and lives at `$XDG_CONFIG_HOME/camsetup/config.json`
//! unless `--config` points elsewhere.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::heuristics::HeuristicTable;
use crate::scope::Scope;

/// Top-level configuration for a setup run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SetupConfig {
    /// Device number for the virtual camera (`/dev/video<N>`).
    pub virtual_video_nr: u32,
    /// Card label passed to v4l2loopback.
    pub card_label: String,
    /// Upstream v4l2loopback repository used when no packaged module exists.
    pub v4l2loopback_repo: String,
    /// System packages to install.
    pub packages: Vec<String>,
    /// Python packages installed with `pip --user`.
    pub python_deps: Vec<String>,
    /// D-Bus services whose units are discovered and repaired.
    pub dbus_services: Vec<String>,
    /// User services that make up the PipeWire stack.
    pub user_services: Vec<String>,
    /// Scopes searched during unit resolution, in order.
    pub scope_order: Vec<Scope>,
    pub heuristics: HeuristicTable,
    pub unit_paths: UnitSearchPaths,
    /// Privilege escalation tool prefixed to system-wide mutations.
    pub escalation: String,
    pub timeouts: Timeouts,
}

impl Default for SetupConfig {
    fn default() -> Self {
        Self {
            virtual_video_nr: 10,
            card_label: "OBS_Virtual_Cam".to_string(),
            v4l2loopback_repo: "https://github.com/umlaeute/v4l2loopback.git".to_string(),
            packages: [
                "obs-studio",
                "pipewire",
                "pipewire-v4l2",
                "v4l2loopback-utils",
                "kmod-v4l2loopback",
                "wireplumber",
                "xdg-desktop-portal",
                "xdg-desktop-portal-gtk",
                "ffmpeg",
                "python3-pip",
                "git",
                "make",
                "gcc",
                "kernel-devel",
                "v4l2-utils",
                "gstreamer1-plugins-good",
                "pipewire-utils",
            ]
            .map(String::from)
            .to_vec(),
            python_deps: ["requests", "json5", "pyyaml"].map(String::from).to_vec(),
            dbus_services: [
                "org.freedesktop.impl.portal.PermissionStore",
                "org.a11y.Bus",
            ]
            .map(String::from)
            .to_vec(),
            user_services: ["pipewire.service", "pipewire-pulse.service", "wireplumber.service"]
                .map(String::from)
                .to_vec(),
            scope_order: Scope::default_order(),
            heuristics: HeuristicTable::default(),
            unit_paths: UnitSearchPaths::default(),
            escalation: "sudo".to_string(),
            timeouts: Timeouts::default(),
        }
    }
}

impl SetupConfig {
    /// Path of the per-user config file, if a config directory can be determined.
    pub fn default_path() -> Option<PathBuf> {
        directories::ProjectDirs::from("", "", "camsetup")
            .map(|dirs| dirs.config_dir().join("config.json"))
    }

    /// Load from `explicit` if given (must exist), else from the default path
    /// if it exists, else return defaults.
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        if let Some(path) = explicit {
            return Self::load_from(path);
        }
        match Self::default_path() {
            Some(path) if path.exists() => Self::load_from(&path),
            _ => {
                debug!("No config file found, using defaults");
                Ok(Self::default())
            }
        }
    }

    /// Load the configuration from a specific path.
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config from {}", path.display()))?;
        let config: SetupConfig = serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse config from {}", path.display()))?;
        debug!(path = %path.display(), "Loaded config");
        Ok(config)
    }

    /// Path of the virtual camera device node.
    pub fn virtual_device(&self) -> PathBuf {
        PathBuf::from(format!("/dev/video{}", self.virtual_video_nr))
    }
}

/// Directories scanned for unit files, per scope, in priority order.
///
/// Each scope lists its override directory before its vendor directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct UnitSearchPaths {
    pub user: Vec<PathBuf>,
    pub system: Vec<PathBuf>,
}

impl UnitSearchPaths {
    pub fn for_scope(&self, scope: Scope) -> &[PathBuf] {
        match scope {
            Scope::User => &self.user,
            Scope::System => &self.system,
        }
    }
}

impl Default for UnitSearchPaths {
    fn default() -> Self {
        let mut user = Vec::new();
        if let Some(home) = home_dir() {
            user.push(home.join(".config/systemd/user"));
        }
        user.push(PathBuf::from("/usr/lib/systemd/user"));
        Self {
            user,
            system: vec![
                PathBuf::from("/etc/systemd/system"),
                PathBuf::from("/usr/lib/systemd/system"),
            ],
        }
    }
}

fn home_dir() -> Option<PathBuf> {
    directories::BaseDirs::new()
        .map(|d| d.home_dir().to_path_buf())
        .or_else(|| std::env::var("HOME").ok().map(PathBuf::from))
}

/// Command timeouts, in seconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Timeouts {
    /// Package installs, module builds, clones.
    pub long_secs: u64,
    /// Service queries and other interactive commands.
    pub short_secs: u64,
}

impl Default for Timeouts {
    fn default() -> Self {
        Self {
            long_secs: 3600,
            short_secs: 30,
        }
    }
}

impl Timeouts {
    pub fn long(&self) -> Duration {
        Duration::from_secs(self.long_secs)
    }

    pub fn short(&self) -> Duration {
        Duration::from_secs(self.short_secs)
    }
}
