//! signal-cli subprocess relay.

use std::path::PathBuf;
use std::process::Stdio;
use std::sync::{Mutex, PoisonError};

use async_trait::async_trait;
use parley_types::{parse_timestamp, Timestamp};
use tokio::io::BufReader;
use tokio::process::{Child, Command};
use tracing::{debug, info};

use super::{normalize_number, Relay, RelayError, RelayStream};

/// How to invoke the relay binary.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelayCommand {
    /// Program name or path.
    pub binary: String,
    /// Account phone number.
    pub user: String,
    /// Send through the running daemon's D-Bus interface instead of a
    /// separate process logged in as `user`.
    pub use_dbus: bool,
}

impl RelayCommand {
    /// signal-cli running as `user`.
    pub fn new(user: impl Into<String>) -> Self {
        Self {
            binary: "signal-cli".to_string(),
            user: user.into(),
            use_dbus: true,
        }
    }

    /// Set the binary (builder).
    pub fn with_binary(mut self, binary: impl Into<String>) -> Self {
        self.binary = binary.into();
        self
    }

    /// Choose D-Bus or direct sends (builder).
    pub fn with_dbus(mut self, use_dbus: bool) -> Self {
        self.use_dbus = use_dbus;
        self
    }

    fn command(&self) -> Command {
        let mut command = Command::new(&self.binary);
        command.stdin(Stdio::null()).kill_on_drop(true);
        command
    }

    fn user_command(&self) -> Command {
        let mut command = self.command();
        command.arg("-u").arg(&self.user);
        command
    }

    fn send_args(
        &self,
        target_flag: Option<&str>,
        target: &str,
        text: &str,
        attachments: &[PathBuf],
    ) -> Command {
        let mut command = if self.use_dbus {
            let mut command = self.command();
            command.arg("--dbus");
            command
        } else {
            self.user_command()
        };
        command.arg("send");
        if let Some(flag) = target_flag {
            command.arg(flag);
        }
        command.arg(target).arg("-m").arg(text);
        if !attachments.is_empty() {
            command.arg("-a").args(attachments);
        }
        command
    }

    /// Run to completion and return trimmed stdout.
    async fn output(&self, mut command: Command) -> Result<String, RelayError> {
        let output = command.output().await.map_err(|source| RelayError::Spawn {
            program: self.binary.clone(),
            source,
        })?;
        if !output.status.success() {
            return Err(RelayError::Exited {
                status: output.status,
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }
        Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
    }
}

/// Relay backed by a real signal-cli process.
#[derive(Debug)]
pub struct ProcessRelay {
    command: RelayCommand,
    daemon: tokio::sync::Mutex<Option<Child>>,
    pid: Mutex<Option<u32>>,
}

impl ProcessRelay {
    /// Create a relay; nothing is spawned until [`Relay::start`].
    pub fn new(command: RelayCommand) -> Self {
        Self {
            command,
            daemon: tokio::sync::Mutex::new(None),
            pid: Mutex::new(None),
        }
    }

    /// The invocation settings.
    pub fn command(&self) -> &RelayCommand {
        &self.command
    }

    fn set_pid(&self, pid: Option<u32>) {
        *self.pid.lock().unwrap_or_else(PoisonError::into_inner) = pid;
    }
}

#[async_trait]
impl Relay for ProcessRelay {
    async fn start(&self) -> Result<RelayStream, RelayError> {
        let mut command = self.command.user_command();
        command
            .arg("daemon")
            .arg("--json")
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit());

        let mut child = command.spawn().map_err(|source| RelayError::Spawn {
            program: self.command.binary.clone(),
            source,
        })?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| RelayError::Failed("daemon stdout not captured".into()))?;

        info!(pid = ?child.id(), user = %self.command.user, "relay daemon spawned");
        self.set_pid(child.id());
        *self.daemon.lock().await = Some(child);
        Ok(Box::new(BufReader::new(stdout)))
    }

    async fn finish(&self) -> Result<(), RelayError> {
        let child = self.daemon.lock().await.take();
        let Some(mut child) = child else {
            return Ok(());
        };
        let status = child.wait().await?;
        self.set_pid(None);
        debug!(%status, "relay daemon exited");
        if status.success() {
            Ok(())
        } else {
            Err(RelayError::Exited {
                status,
                stderr: String::new(),
            })
        }
    }

    async fn interrupt(&self) -> Result<(), RelayError> {
        let pid = *self.pid.lock().unwrap_or_else(PoisonError::into_inner);
        let Some(pid) = pid else {
            return Ok(());
        };
        debug!(pid, "interrupting relay daemon");
        let status = Command::new("kill")
            .arg("-INT")
            .arg(pid.to_string())
            .status()
            .await?;
        if status.success() {
            Ok(())
        } else {
            Err(RelayError::Failed(format!("could not signal relay pid {pid}")))
        }
    }

    async fn receive(&self) -> Result<Vec<String>, RelayError> {
        let mut command = self.command.user_command();
        command.arg("receive").arg("--json");
        let stdout = self.command.output(command).await?;
        Ok(stdout
            .lines()
            .filter(|line| !line.trim().is_empty())
            .map(str::to_string)
            .collect())
    }

    async fn send(
        &self,
        destination: &str,
        text: &str,
        attachments: &[PathBuf],
    ) -> Result<Timestamp, RelayError> {
        let destination = normalize_number(destination);
        let command = self.command.send_args(None, &destination, text, attachments);
        let stdout = self.command.output(command).await?;
        Ok(parse_timestamp(&stdout)?)
    }

    async fn send_group(
        &self,
        group_id: &str,
        text: &str,
        attachments: &[PathBuf],
    ) -> Result<Timestamp, RelayError> {
        let command = self.command.send_args(Some("-g"), group_id, text, attachments);
        let stdout = self.command.output(command).await?;
        Ok(parse_timestamp(&stdout)?)
    }

    async fn version(&self) -> Result<String, RelayError> {
        let mut command = self.command.command();
        command.arg("-v");
        let stdout = self.command.output(command).await?;
        Ok(parse_version(&stdout))
    }
}

/// `signal-cli 0.6.10` → `0.6.10`
fn parse_version(output: &str) -> String {
    output
        .split_whitespace()
        .last()
        .unwrap_or_default()
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(command: &Command) -> Vec<String> {
        command
            .as_std()
            .get_args()
            .map(|a| a.to_string_lossy().into_owned())
            .collect()
    }

    #[test]
    fn dbus_send_arguments() {
        let relay = RelayCommand::new("+15550000000");
        let cmd = relay.send_args(None, "+15550001111", "hi", &[PathBuf::from("/tmp/a.png")]);
        assert_eq!(
            args(&cmd),
            vec!["--dbus", "send", "+15550001111", "-m", "hi", "-a", "/tmp/a.png"]
        );
    }

    #[test]
    fn direct_group_send_arguments() {
        let relay = RelayCommand::new("+15550000000").with_dbus(false);
        let cmd = relay.send_args(Some("-g"), "Z3JvdXA=", "hello", &[]);
        assert_eq!(
            args(&cmd),
            vec!["-u", "+15550000000", "send", "-g", "Z3JvdXA=", "-m", "hello"]
        );
    }

    #[test]
    fn version_is_last_word() {
        assert_eq!(parse_version("signal-cli 0.6.10\n"), "0.6.10");
        assert_eq!(parse_version(""), "");
    }

    #[tokio::test]
    async fn missing_binary_is_spawn_error() {
        let relay = ProcessRelay::new(
            RelayCommand::new("+15550000000").with_binary("/nonexistent/parley-relay"),
        );
        let err = relay.version().await.unwrap_err();
        assert!(matches!(err, RelayError::Spawn { .. }));

        let err = relay.start().await.err().unwrap();
        assert!(matches!(err, RelayError::Spawn { .. }));
    }

    #[tokio::test]
    async fn idle_relay_finish_and_interrupt_are_noops() {
        let relay = ProcessRelay::new(RelayCommand::new("+15550000000"));
        relay.finish().await.unwrap();
        relay.interrupt().await.unwrap();
    }
}
