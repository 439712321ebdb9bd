//! Remote shell over SSH.
//!
//! Key-based targets run each command through the system `ssh` binary.
//! Password targets open an `ssh2` session per command on a blocking thread.
//! "Connected" means the last probe succeeded and no command has since
//! failed at the transport level.

use std::env;
use std::ffi::OsString;
use std::io::Read;
use std::net::{TcpStream, ToSocketAddrs};
use std::path::{Path, PathBuf};
use std::time::Duration;

use agentkit_compute::{RemoteShell, SshAuth, SshTarget};
use anyhow::{anyhow, bail, Context, Result};
use async_trait::async_trait;
use ssh2::Session;
use thiserror::Error;
use tokio::process::Command;
use tokio::time::timeout;

/// Maximum output size to capture (1MB).
const MAX_OUTPUT_SIZE: usize = 1024 * 1024;

/// Exit status `ssh` itself uses for connection-level failures.
const SSH_TRANSPORT_FAILURE: i32 = 255;

const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// The session could not be used at all, as opposed to the command failing.
#[derive(Debug, Error)]
#[error("{0}")]
struct TransportError(String);

/// Exit status and captured streams of one remote command.
#[derive(Debug)]
struct RemoteOutput {
    /// `None` when the command was killed by a signal.
    code: Option<i32>,
    stdout: String,
    stderr: String,
}

pub struct SshShell {
    target: Option<SshTarget>,
    command_timeout: Duration,
}

impl Default for SshShell {
    fn default() -> Self {
        Self::new()
    }
}

impl SshShell {
    pub fn new() -> Self {
        Self::with_timeout(Duration::from_secs(120))
    }

    pub fn with_timeout(command_timeout: Duration) -> Self {
        Self {
            target: None,
            command_timeout,
        }
    }

    async fn run(&self, target: &SshTarget, command: &str) -> Result<RemoteOutput> {
        tracing::debug!(host = %target.host, command, "running remote command");
        let pending = async {
            match &target.auth {
                SshAuth::Key(path) => run_with_key(target, &expand_home(path), command).await,
                SshAuth::Password(password) => {
                    let target = target.clone();
                    let password = password.clone();
                    let command = command.to_string();
                    let session_timeout = self.command_timeout;
                    tokio::task::spawn_blocking(move || {
                        run_with_password(&target, &password, &command, session_timeout)
                    })
                    .await
                    .context("ssh session worker failed")
                    .and_then(|result| result)
                }
            }
        };

        timeout(self.command_timeout, pending)
            .await
            .map_err(|_| anyhow!("remote command timed out after {:?}", self.command_timeout))?
    }
}

/// Arguments for the system `ssh`. `--` ends option parsing before the
/// destination, so nothing after it is read as an option.
fn ssh_args(target: &SshTarget, key_path: &Path, command: &str) -> Vec<OsString> {
    let mut args: Vec<OsString> = [
        "-o",
        "BatchMode=yes",
        "-o",
        "StrictHostKeyChecking=accept-new",
        "-o",
        "ConnectTimeout=10",
        "-i",
    ]
    .into_iter()
    .map(OsString::from)
    .collect();
    args.push(key_path.as_os_str().to_owned());
    args.push("-p".into());
    args.push(target.port.to_string().into());
    args.push("--".into());
    args.push(format!("{}@{}", target.username, target.host).into());
    args.push(command.into());
    args
}

async fn run_with_key(target: &SshTarget, key_path: &Path, command: &str) -> Result<RemoteOutput> {
    let output = Command::new("ssh")
        .args(ssh_args(target, key_path, command))
        .kill_on_drop(true)
        .output()
        .await
        .context("spawning ssh")?;

    let stderr = String::from_utf8_lossy(&output.stderr).into_owned();
    if output.status.code() == Some(SSH_TRANSPORT_FAILURE) {
        return Err(TransportError(stderr.trim().to_string()).into());
    }
    Ok(RemoteOutput {
        code: output.status.code(),
        stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
        stderr,
    })
}

fn run_with_password(
    target: &SshTarget,
    password: &str,
    command: &str,
    session_timeout: Duration,
) -> Result<RemoteOutput> {
    let transport = |what: &str, err: &dyn std::fmt::Display| TransportError(format!("{what}: {err}"));

    let address = (target.host.as_str(), target.port)
        .to_socket_addrs()
        .map_err(|err| transport("resolving host", &err))?
        .next()
        .ok_or_else(|| TransportError(format!("no address found for {}", target.host)))?;
    let tcp = TcpStream::connect_timeout(&address, CONNECT_TIMEOUT)
        .map_err(|err| transport("connecting", &err))?;

    let mut session = Session::new().map_err(|err| transport("creating session", &err))?;
    session.set_timeout(u32::try_from(session_timeout.as_millis()).unwrap_or(u32::MAX));
    session.set_tcp_stream(tcp);
    session
        .handshake()
        .map_err(|err| transport("handshake", &err))?;
    session
        .userauth_password(&target.username, password)
        .map_err(|err| transport("password authentication", &err))?;
    if !session.authenticated() {
        return Err(TransportError("password authentication was rejected".to_string()).into());
    }

    let mut channel = session
        .channel_session()
        .map_err(|err| transport("opening channel", &err))?;
    channel.exec(command).context("starting remote command")?;

    let mut stdout = Vec::new();
    channel.read_to_end(&mut stdout).context("reading stdout")?;
    let mut stderr = Vec::new();
    channel
        .stderr()
        .read_to_end(&mut stderr)
        .context("reading stderr")?;
    channel.wait_close().context("closing channel")?;
    let code = channel.exit_status().context("reading exit status")?;

    Ok(RemoteOutput {
        code: Some(code),
        stdout: String::from_utf8_lossy(&stdout).into_owned(),
        stderr: String::from_utf8_lossy(&stderr).into_owned(),
    })
}

/// Output as shown to the caller; a non-zero exit becomes an error.
fn command_result(output: RemoteOutput) -> Result<String> {
    let stdout = truncate_output(&output.stdout);
    let stderr = truncate_output(&output.stderr);
    let text = if stderr.trim().is_empty() {
        stdout
    } else {
        format!("Error: {stderr}\nOutput: {stdout}")
    };

    match output.code {
        Some(0) => Ok(text),
        Some(code) => bail!("remote command exited with status {code}\n{text}"),
        None => bail!("remote command was terminated by a signal\n{text}"),
    }
}

#[async_trait]
impl RemoteShell for SshShell {
    async fn connect(&mut self, target: SshTarget) -> Result<String> {
        self.disconnect();
        target.validate()?;

        if let SshAuth::Key(path) = &target.auth {
            let key_path = expand_home(path);
            if !key_path.exists() {
                bail!("SSH key not found at {}", key_path.display());
            }
        }

        let probe = self
            .run(&target, "echo 1")
            .await
            .map_err(|err| anyhow!("SSH connection to {} failed: {err:#}", target.host))?;
        if probe.code != Some(0) {
            bail!(
                "SSH connection to {} failed: {}",
                target.host,
                probe.stderr.trim()
            );
        }

        let message = format!("Successfully connected to {} as {}", target.host, target.username);
        self.target = Some(target);
        Ok(message)
    }

    async fn execute(&mut self, command: &str) -> Result<String> {
        let target = self
            .target
            .clone()
            .ok_or_else(|| anyhow!("no active SSH connection; connect with ssh_connect first"))?;

        match self.run(&target, command).await {
            Ok(output) => command_result(output),
            Err(err) if err.is::<TransportError>() => {
                self.disconnect();
                bail!("SSH connection to {} lost: {err}", target.host)
            }
            Err(err) => Err(err),
        }
    }

    fn disconnect(&mut self) {
        self.target = None;
    }

    fn is_connected(&self) -> bool {
        self.target.is_some()
    }

    fn connection_info(&self) -> String {
        match &self.target {
            Some(target) => format!(
                "Connected to {} as {} on port {}",
                target.host, target.username, target.port
            ),
            None => "Not connected".to_string(),
        }
    }
}

fn expand_home(path: &str) -> PathBuf {
    match (path.strip_prefix("~/"), env::var_os("HOME")) {
        (Some(rest), Some(home)) => PathBuf::from(home).join(rest),
        _ => PathBuf::from(path),
    }
}

/// Truncates output if it exceeds the maximum size, cutting at a line break.
fn truncate_output(output: &str) -> String {
    if output.len() <= MAX_OUTPUT_SIZE {
        return output.to_string();
    }
    let mut cut = MAX_OUTPUT_SIZE;
    while !output.is_char_boundary(cut) {
        cut -= 1;
    }
    let kept = &output[..cut];
    let kept = kept.rfind('\n').map_or(kept, |newline| &kept[..newline]);
    format!(
        "{kept}\n\n... (output truncated, {} bytes total)",
        output.len()
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key_target(username: &str, key_path: &Path) -> SshTarget {
        SshTarget {
            host: "10.0.0.1".to_string(),
            username: username.to_string(),
            port: 22,
            auth: SshAuth::Key(key_path.display().to_string()),
        }
    }

    #[tokio::test]
    async fn commands_require_a_connection() {
        let mut shell = SshShell::new();
        let error = shell.execute("uptime").await.expect_err("not connected");

        assert!(error.to_string().contains("ssh_connect"));
        assert_eq!(shell.connection_info(), "Not connected");
    }

    #[tokio::test]
    async fn missing_key_fails_before_spawning_ssh() {
        let dir = tempfile::tempdir().expect("tempdir");
        let mut shell = SshShell::new();

        let error = shell
            .connect(key_target("ubuntu", &dir.path().join("absent")))
            .await
            .expect_err("key does not exist");

        assert!(error.to_string().contains("SSH key not found"));
        assert!(!shell.is_connected());
    }

    #[tokio::test]
    async fn option_like_username_is_refused_before_spawning_ssh() {
        let dir = tempfile::tempdir().expect("tempdir");
        let key = dir.path().join("id_ed25519");
        std::fs::write(&key, "key").expect("write key");
        let mut shell = SshShell::new();

        let error = shell
            .connect(key_target("-oProxyCommand=touch /tmp/owned", &key))
            .await
            .expect_err("option-like username");

        assert!(error.to_string().contains("username"));
        assert!(!shell.is_connected());
    }

    #[test]
    fn destination_follows_the_end_of_options_marker() {
        let target = key_target("ubuntu", Path::new("/keys/id_rsa"));
        let args = ssh_args(&target, Path::new("/keys/id_rsa"), "-rf nvidia-smi");

        let marker = args.iter().position(|arg| arg == "--").expect("-- present");
        assert_eq!(args[marker + 1], OsString::from("ubuntu@10.0.0.1"));
        assert_eq!(args.last(), Some(&OsString::from("-rf nvidia-smi")));
        assert_eq!(marker + 3, args.len());
    }

    #[tokio::test]
    async fn refused_password_connection_is_reported() {
        // Grab a free port, then close it so the connection is refused.
        let port = std::net::TcpListener::bind("127.0.0.1:0")
            .and_then(|listener| listener.local_addr())
            .expect("bind")
            .port();
        let mut shell = SshShell::with_timeout(Duration::from_secs(5));

        let error = shell
            .connect(SshTarget {
                host: "127.0.0.1".to_string(),
                username: "ubuntu".to_string(),
                port,
                auth: SshAuth::Password("secret".to_string()),
            })
            .await
            .expect_err("nothing listens there");

        assert!(error.to_string().contains("SSH connection to 127.0.0.1 failed"));
        assert!(!shell.is_connected());
    }

    #[test]
    fn non_zero_exit_is_an_error_that_keeps_the_output() {
        let error = command_result(RemoteOutput {
            code: Some(100),
            stdout: "partial".to_string(),
            stderr: "E: Unable to locate package".to_string(),
        })
        .expect_err("exit 100");
        let message = error.to_string();
        assert!(message.contains("exited with status 100"));
        assert!(message.contains("Unable to locate package"));
        assert!(message.contains("partial"));

        assert!(command_result(RemoteOutput {
            code: None,
            stdout: String::new(),
            stderr: String::new(),
        })
        .is_err());
    }

    #[test]
    fn successful_command_reports_stderr_beside_stdout() {
        let output = command_result(RemoteOutput {
            code: Some(0),
            stdout: "done".to_string(),
            stderr: "warning: slow mirror".to_string(),
        })
        .expect("exit 0");
        assert_eq!(output, "Error: warning: slow mirror\nOutput: done");

        let output = command_result(RemoteOutput {
            code: Some(0),
            stdout: "GPU 0".to_string(),
            stderr: String::new(),
        })
        .expect("exit 0");
        assert_eq!(output, "GPU 0");
    }

    #[test]
    fn long_output_is_truncated_at_a_line_break() {
        let line = "x".repeat(1023) + "\n";
        let output = line.repeat(2048);

        let truncated = truncate_output(&output);
        assert!(truncated.len() < output.len());
        assert!(truncated.contains("output truncated"));
        assert_eq!(truncate_output("short"), "short");
    }

    #[test]
    fn absolute_paths_are_left_alone() {
        assert_eq!(expand_home("/keys/id_rsa"), PathBuf::from("/keys/id_rsa"));
    }
}
