// Command-line radio tool abstraction layer.
//
// Every probe and mutation goes through a child process (`iwlist`,
// `iwgetid`, `wpa_supplicant`, `dhclient`, `bluetoothctl`). Each
// invocation is bounded by an explicit timeout; an expired bound is
// reported as a `Timeout` tagged with the operation so pairing and
// connection timeouts stay distinguishable.

use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::process::Command;
use tokio::task::JoinHandle;

use crate::{Error, Result};

pub mod parse;
pub mod types;

pub use types::*;

/// Captured result of one finished child process.
#[derive(Debug, Clone, Default)]
pub struct CmdOutput {
    pub success: bool,
    pub stdout: String,
    pub stderr: String,
}

/// Seam between the client and the OS, so tests can script tool output.
#[async_trait]
pub trait CommandRunner: Send + Sync {
    async fn run(
        &self,
        operation: Operation,
        program: &str,
        args: &[&str],
        timeout: Duration,
    ) -> Result<CmdOutput>;
}

/// Runner that spawns real child processes.
#[derive(Debug, Default)]
pub struct SystemRunner;

#[async_trait]
impl CommandRunner for SystemRunner {
    async fn run(
        &self,
        operation: Operation,
        program: &str,
        args: &[&str],
        timeout: Duration,
    ) -> Result<CmdOutput> {
        let output = tokio::time::timeout(timeout, Command::new(program).args(args).output())
            .await
            .map_err(|_| Error::Timeout {
                operation,
                seconds: timeout.as_secs(),
            })?
            .map_err(|e| Error::Tool {
                command: program.to_string(),
                message: e.to_string(),
            })?;

        Ok(CmdOutput {
            success: output.status.success(),
            stdout: String::from_utf8_lossy(&output.stdout).to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).to_string(),
        })
    }
}

/// Timeout bounds for the external tools.
#[derive(Debug, Clone, Copy)]
pub struct Timings {
    /// Quick probes and fire-and-forget commands.
    pub command: Duration,
    /// `iwlist` scan, which walks every channel.
    pub scan: Duration,
    /// `bluetoothctl pair`.
    pub pair: Duration,
    /// `bluetoothctl connect`.
    pub connect: Duration,
    /// DHCP lease request.
    pub dhcp: Duration,
}

impl Default for Timings {
    fn default() -> Self {
        Self {
            command: Duration::from_secs(10),
            scan: Duration::from_secs(20),
            pair: Duration::from_secs(30),
            connect: Duration::from_secs(30),
            dhcp: Duration::from_secs(30),
        }
    }
}

/// Thin client over the radio tools. Holds no state besides the wireless
/// interface name and the directory the supplicant fragment is written to.
#[derive(Clone)]
pub struct RadioClient {
    runner: Arc<dyn CommandRunner>,
    interface: String,
    run_dir: PathBuf,
    timings: Timings,
}

impl RadioClient {
    pub fn new(
        runner: Arc<dyn CommandRunner>,
        interface: String,
        run_dir: PathBuf,
        timings: Timings,
    ) -> Self {
        Self {
            runner,
            interface,
            run_dir,
            timings,
        }
    }

    /// Run a command and map a non-zero exit to a tool failure.
    async fn checked(
        &self,
        operation: Operation,
        program: &str,
        args: &[&str],
        timeout: Duration,
    ) -> Result<CmdOutput> {
        let output = self.runner.run(operation, program, args, timeout).await?;
        if !output.success {
            let message = if output.stderr.trim().is_empty() {
                "non-zero exit".to_string()
            } else {
                output.stderr.trim().to_string()
            };
            return Err(Error::Tool {
                command: program.to_string(),
                message,
            });
        }
        Ok(output)
    }

    /// Raw `iwlist` scan dump.
    pub async fn wifi_scan(&self) -> Result<String> {
        let output = self
            .checked(
                Operation::Scan,
                "iwlist",
                &[&self.interface, "scan"],
                self.timings.scan,
            )
            .await?;
        Ok(output.stdout)
    }

    /// The ssid of the association the interface currently holds, if any.
    pub async fn current_ssid(&self) -> Result<Option<String>> {
        let output = self
            .runner
            .run(Operation::Probe, "iwgetid", &["-r"], self.timings.command)
            .await?;
        if !output.success {
            return Ok(None);
        }
        let ssid = output.stdout.trim();
        Ok((!ssid.is_empty()).then(|| ssid.to_string()))
    }

    /// Non-mutating link probe; any failure reads as down.
    pub async fn wifi_link_up(&self) -> bool {
        matches!(
            self.runner
                .run(Operation::Probe, "iwgetid", &[], self.timings.command)
                .await,
            Ok(output) if output.success
        )
    }

    /// Point the supplicant at `ssid` and request a lease.
    ///
    /// The sequence mirrors what the tools expect: write a config
    /// fragment, drop any running supplicant, start a fresh one against
    /// the fragment, then ask the DHCP client for a lease.
    pub async fn connect_wifi(&self, ssid: &str, password: &str) -> Result<()> {
        let conf = self.write_supplicant_config(ssid, password)?;
        let conf = conf.to_string_lossy().to_string();

        // No supplicant running is fine.
        let _ = self
            .runner
            .run(
                Operation::Connection,
                "killall",
                &["wpa_supplicant"],
                self.timings.command,
            )
            .await;

        self.checked(
            Operation::Connection,
            "wpa_supplicant",
            &["-B", "-i", &self.interface, "-c", &conf],
            self.timings.command,
        )
        .await?;

        self.checked(
            Operation::Dhcp,
            "dhclient",
            &[&self.interface],
            self.timings.dhcp,
        )
        .await?;

        Ok(())
    }

    /// Write the single-network supplicant fragment, readable only by
    /// the owner since it carries the passphrase.
    fn write_supplicant_config(&self, ssid: &str, password: &str) -> Result<PathBuf> {
        let path = self.run_dir.join("wpa_padctl.conf");
        let body = if password.is_empty() {
            format!("network={{\n\tssid=\"{ssid}\"\n\tkey_mgmt=NONE\n}}\n")
        } else {
            format!("network={{\n\tssid=\"{ssid}\"\n\tpsk=\"{password}\"\n\tkey_mgmt=WPA-PSK\n}}\n")
        };
        fs::write(&path, body)?;
        fs::set_permissions(&path, fs::Permissions::from_mode(0o600))?;
        Ok(path)
    }

    /// Keep discovery running for `window`, in the background. The
    /// returned handle can be awaited or dropped; `bluetoothctl` ends
    /// discovery when the client exits at the timeout.
    pub fn start_discovery(&self, window: Duration) -> JoinHandle<()> {
        let runner = self.runner.clone();
        tokio::spawn(async move {
            let _ = runner
                .run(Operation::Discovery, "bluetoothctl", &["scan", "on"], window)
                .await;
        })
    }

    /// Raw `bluetoothctl devices` dump.
    pub async fn device_list(&self) -> Result<String> {
        let output = self
            .checked(
                Operation::Discovery,
                "bluetoothctl",
                &["devices"],
                self.timings.command,
            )
            .await?;
        Ok(output.stdout)
    }

    /// Raw `bluetoothctl info <mac>` dump.
    pub async fn device_info(&self, mac: &str) -> Result<String> {
        let output = self
            .checked(
                Operation::Probe,
                "bluetoothctl",
                &["info", mac],
                self.timings.command,
            )
            .await?;
        Ok(output.stdout)
    }

    pub async fn pair(&self, mac: &str) -> Result<()> {
        self.checked(
            Operation::Pairing,
            "bluetoothctl",
            &["pair", mac],
            self.timings.pair,
        )
        .await?;
        Ok(())
    }

    pub async fn connect_device(&self, mac: &str) -> Result<()> {
        self.checked(
            Operation::Connection,
            "bluetoothctl",
            &["connect", mac],
            self.timings.connect,
        )
        .await?;
        Ok(())
    }

    pub async fn disconnect_device(&self, mac: &str) -> Result<()> {
        self.checked(
            Operation::Connection,
            "bluetoothctl",
            &["disconnect", mac],
            self.timings.command,
        )
        .await?;
        Ok(())
    }

    pub async fn remove_device(&self, mac: &str) -> Result<()> {
        self.checked(
            Operation::Connection,
            "bluetoothctl",
            &["remove", mac],
            self.timings.command,
        )
        .await?;
        Ok(())
    }

    /// Whether the Bluetooth controller reports itself powered.
    pub async fn bluetooth_powered(&self) -> Result<bool> {
        let output = self
            .checked(
                Operation::Probe,
                "bluetoothctl",
                &["show"],
                self.timings.command,
            )
            .await?;
        Ok(parse::parse_powered(&output.stdout))
    }

    /// Set controller power to an explicit state. `bluetoothctl` has no
    /// compare-and-set, so callers that probe first still race against
    /// outside writers in the probe window.
    pub async fn set_bluetooth_power(&self, on: bool) -> Result<()> {
        self.checked(
            Operation::Probe,
            "bluetoothctl",
            &["power", if on { "on" } else { "off" }],
            self.timings.command,
        )
        .await?;
        Ok(())
    }
}
