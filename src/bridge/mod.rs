pub mod output;

use std::path::{Path, PathBuf};
use std::time::Duration;

use tracing::{debug, info};

use crate::error::{MirrorError, Result};
use crate::process::{self, CommandOutput};
use crate::Device;

use self::output::Phrases;

pub const DEFAULT_BRIDGE_PATH: &str = "adb";
pub const DEFAULT_BRIDGE_TIMEOUT: Duration = Duration::from_secs(10);

/// Discovery, pairing and connection management through the bridge CLI.
///
/// Holds no mutable state, so any number of calls may run at once.
#[derive(Debug, Clone)]
pub struct Bridge {
    program: PathBuf,
    timeout: Duration,
}

impl Bridge {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self::with_timeout(program, DEFAULT_BRIDGE_TIMEOUT)
    }

    pub fn with_timeout(program: impl Into<PathBuf>, timeout: Duration) -> Self {
        let program = program.into();
        let program = if program.as_os_str().is_empty() {
            PathBuf::from(DEFAULT_BRIDGE_PATH)
        } else {
            program
        };
        Self { program, timeout }
    }

    pub fn program(&self) -> &Path {
        &self.program
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub async fn list_devices(&self) -> Result<Vec<Device>> {
        let (label, out) = self.run(vec!["devices".into()]).await?;
        let devices = output::parse_devices(&label, &out.stdout, &out.stderr)?;
        debug!(count = devices.len(), "Listed devices");
        Ok(devices)
    }

    pub async fn pair(&self, address: &str, port: u16, code: &str) -> Result<()> {
        if address.is_empty() || port == 0 || code.is_empty() {
            return Err(MirrorError::invalid_input("pair requires an address, port, and code"));
        }
        let args = vec!["pair".into(), endpoint(address, port), code.to_string()];
        self.run_expecting(args, &output::PAIR).await?;
        info!(address, port, "Paired device");
        Ok(())
    }

    pub async fn connect(&self, address: &str, port: u16) -> Result<()> {
        if address.is_empty() || port == 0 {
            return Err(MirrorError::invalid_input("connect requires an address and port"));
        }
        self.run_expecting(vec!["connect".into(), endpoint(address, port)], &output::CONNECT)
            .await?;
        info!(address, port, "Connected to device");
        Ok(())
    }

    /// Switch the attached device into wireless (TCP/IP) mode on `port`.
    pub async fn enable_wireless(&self, port: u16) -> Result<()> {
        if port == 0 {
            return Err(MirrorError::invalid_input("tcpip requires a port"));
        }
        self.run_expecting(vec!["tcpip".into(), port.to_string()], &output::TCPIP)
            .await?;
        info!(port, "Device restarting in TCP mode");
        Ok(())
    }

    pub async fn disconnect(&self, address: &str, port: u16) -> Result<()> {
        if address.is_empty() || port == 0 {
            return Err(MirrorError::invalid_input("disconnect requires an address and port"));
        }
        self.run_expecting(vec!["disconnect".into(), endpoint(address, port)], &output::DISCONNECT)
            .await?;
        info!(address, port, "Disconnected device");
        Ok(())
    }

    async fn run(&self, args: Vec<String>) -> Result<(String, CommandOutput)> {
        let label = process::command_label(&self.program, &args);
        let out = process::run_command(&self.program, &args, self.timeout).await?;
        Ok((label, out))
    }

    async fn run_expecting(&self, args: Vec<String>, phrases: &Phrases) -> Result<()> {
        let (label, out) = self.run(args).await?;
        output::interpret(&label, &out.stdout, &out.stderr, phrases)
    }
}

impl Default for Bridge {
    fn default() -> Self {
        Self::new(DEFAULT_BRIDGE_PATH)
    }
}

fn endpoint(address: &str, port: u16) -> String {
    format!("{}:{}", address, port)
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::process::testing::script;

    /// A fake bridge that appends its argv to `calls.log` and prints `stdout`.
    fn fake_bridge(dir: &Path, stdout: &str) -> Bridge {
        let log = dir.join("calls.log");
        let body = format!(
            "echo \"$@\" >> '{}'\nprintf '%s\\n' '{}'",
            log.display(),
            stdout
        );
        Bridge::new(script(dir, "adb", &body))
    }

    fn calls(dir: &Path) -> Vec<String> {
        std::fs::read_to_string(dir.join("calls.log"))
            .unwrap_or_default()
            .lines()
            .map(str::to_string)
            .collect()
    }

    #[tokio::test]
    async fn invalid_input_spawns_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let bridge = fake_bridge(dir.path(), "Successfully paired to x");

        let failures = vec![
            bridge.pair("", 5555, "123456").await,
            bridge.pair("10.0.0.2", 0, "123456").await,
            bridge.pair("10.0.0.2", 5555, "").await,
            bridge.connect("", 5555).await,
            bridge.connect("10.0.0.2", 0).await,
            bridge.disconnect("", 5555).await,
            bridge.disconnect("10.0.0.2", 0).await,
            bridge.enable_wireless(0).await,
        ];

        for result in failures {
            assert_eq!(result.unwrap_err().kind, ErrorKind::InvalidInput);
        }
        assert!(calls(dir.path()).is_empty());
    }

    #[tokio::test]
    async fn pair_builds_endpoint_and_accepts_success() {
        let dir = tempfile::tempdir().unwrap();
        let bridge = fake_bridge(dir.path(), "Successfully paired to 192.168.1.5:5555 [guid=adb-1]");

        bridge.pair("192.168.1.5", 5555, "482913").await.unwrap();
        assert_eq!(calls(dir.path()), vec!["pair 192.168.1.5:5555 482913"]);
    }

    #[tokio::test]
    async fn pair_and_connect_report_failure_phrases() {
        let dir = tempfile::tempdir().unwrap();
        let bridge = fake_bridge(dir.path(), "Failed: wrong password or connection was dropped");

        let err = bridge.pair("10.0.0.2", 37000, "000000").await.unwrap_err();
        assert_eq!(err.kind, ErrorKind::CommandFailed);
        assert!(err.stdout.starts_with("Failed"));

        let err = bridge.connect("10.0.0.2", 5555).await.unwrap_err();
        assert_eq!(err.kind, ErrorKind::CommandFailed);
    }

    #[tokio::test]
    async fn unrecognized_output_is_parse() {
        let dir = tempfile::tempdir().unwrap();
        let bridge = fake_bridge(dir.path(), "something new and unexpected");

        assert_eq!(bridge.connect("10.0.0.2", 5555).await.unwrap_err().kind, ErrorKind::Parse);
        assert_eq!(bridge.enable_wireless(5555).await.unwrap_err().kind, ErrorKind::Parse);
        assert_eq!(bridge.disconnect("10.0.0.2", 5555).await.unwrap_err().kind, ErrorKind::Parse);
    }

    #[tokio::test]
    async fn wireless_and_disconnect_arguments() {
        let dir = tempfile::tempdir().unwrap();
        let bridge = fake_bridge(dir.path(), "restarting in TCP mode port: 5555");
        bridge.enable_wireless(5555).await.unwrap();

        let dir2 = tempfile::tempdir().unwrap();
        let bridge2 = fake_bridge(dir2.path(), "disconnected 10.0.0.2:5555");
        bridge2.disconnect("10.0.0.2", 5555).await.unwrap();

        assert_eq!(calls(dir.path()), vec!["tcpip 5555"]);
        assert_eq!(calls(dir2.path()), vec!["disconnect 10.0.0.2:5555"]);
    }

    #[tokio::test]
    async fn lists_devices_from_fake_bridge() {
        let dir = tempfile::tempdir().unwrap();
        let bridge = Bridge::new(script(
            dir.path(),
            "adb",
            "printf 'List of devices attached\\n\\nabc123\\tdevice\\n'",
        ));

        let devices = bridge.list_devices().await.unwrap();
        assert_eq!(
            devices,
            vec![Device {
                id: "abc123".into(),
                state: "device".into()
            }]
        );
    }

    #[tokio::test]
    async fn nonzero_exit_propagates_unchanged() {
        let dir = tempfile::tempdir().unwrap();
        let bridge = Bridge::new(script(dir.path(), "adb", "echo 'error: no devices/emulators found' >&2\nexit 1"));

        let err = bridge.enable_wireless(5555).await.unwrap_err();
        assert_eq!(err.kind, ErrorKind::CommandFailed);
        assert_eq!(err.exit_code, Some(1));
        assert_eq!(err.stderr, "error: no devices/emulators found");
    }

    #[tokio::test]
    async fn slow_bridge_times_out() {
        let dir = tempfile::tempdir().unwrap();
        let bridge = Bridge::with_timeout(
            script(dir.path(), "adb", "sleep 10"),
            Duration::from_millis(200),
        );

        assert_eq!(bridge.list_devices().await.unwrap_err().kind, ErrorKind::Timeout);
    }

    #[test]
    fn empty_program_falls_back_to_path_lookup() {
        assert_eq!(Bridge::new("").program(), Path::new("adb"));
    }
}
