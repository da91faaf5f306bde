use tokio::sync::broadcast;

use crate::bridge::Bridge;
use crate::config::Config;
use crate::error::Result;
use crate::session::{SessionEvent, SessionStatus, SessionSupervisor};
use crate::{Device, SessionOptions};

/// The single entry point front ends talk to.
///
/// Bridge calls are stateless and may overlap freely; the mirroring session
/// is owned by the supervisor and never handed out.
pub struct Controller {
    bridge: Bridge,
    session: SessionSupervisor,
}

impl Controller {
    pub fn new(config: &Config) -> Self {
        Self {
            bridge: Bridge::with_timeout(&config.bridge_path, config.bridge_timeout()),
            session: SessionSupervisor::with_timeouts(
                &config.mirror_path,
                config.session_ceiling(),
                config.stop_grace(),
            ),
        }
    }

    pub fn from_parts(bridge: Bridge, session: SessionSupervisor) -> Self {
        Self { bridge, session }
    }

    pub async fn list_devices(&self) -> Result<Vec<Device>> {
        self.bridge.list_devices().await
    }

    pub async fn pair(&self, address: &str, port: u16, code: &str) -> Result<()> {
        self.bridge.pair(address, port, code).await
    }

    pub async fn connect(&self, address: &str, port: u16) -> Result<()> {
        self.bridge.connect(address, port).await
    }

    pub async fn enable_wireless(&self, port: u16) -> Result<()> {
        self.bridge.enable_wireless(port).await
    }

    pub async fn disconnect(&self, address: &str, port: u16) -> Result<()> {
        self.bridge.disconnect(address, port).await
    }

    pub fn start_session(&self, device_id: &str, options: &SessionOptions) -> Result<()> {
        self.session.start(device_id, options)
    }

    pub async fn stop_session(&self) -> Result<()> {
        self.session.stop().await
    }

    pub fn session_status(&self) -> SessionStatus {
        self.session.status()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.session.subscribe()
    }
}

impl Default for Controller {
    fn default() -> Self {
        Self::new(&Config::default())
    }
}
