pub mod bridge;
pub mod config;
pub mod controller;
pub mod error;
pub mod process;
pub mod server;
pub mod session;

pub use config::Config;
pub use controller::Controller;
pub use error::{Cause, ErrorKind, MirrorError, Result};

use serde::{Deserialize, Serialize};

/// A device as reported by the bridge tool's `devices` listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Device {
    /// Serial number or `host:port` for wireless devices
    pub id: String,
    /// Raw state string, e.g. `device`, `unauthorized`, `offline`
    pub state: String,
}

/// How a mirroring session should be launched.
///
/// Unset, empty and zero values are left off the command line entirely so
/// the mirroring tool falls back to its own defaults.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionOptions {
    /// Video bit rate in the tool's own notation, e.g. `8M`
    pub bit_rate: Option<String>,
    /// Limit on the larger of width and height
    pub max_size: u32,
    pub max_fps: u32,
    pub turn_screen_off: bool,
    pub fullscreen: bool,
    pub stay_awake: bool,
    /// File to record the session into
    pub record: Option<String>,
    pub window_title: Option<String>,
    /// Passed through verbatim after everything else
    pub extra_args: Vec<String>,
}
