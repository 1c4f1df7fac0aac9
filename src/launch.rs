//! Running a Tierkreis runtime as a local child process.

use crate::client::RuntimeClient;
use crate::config::LocalRuntimeConfig;
use crate::error::{Result, RuntimeLaunchFailed};
use slog::{info, Logger};
use std::process::Stdio;
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::process::{Child, Command};
use tokio::time::Instant;

const POLL_INTERVAL: Duration = Duration::from_millis(100);

/// A runtime process owned by this client. Killed when dropped.
pub struct LocalRuntime {
    child: Child,
    client: RuntimeClient,
    logger: Logger,
}

impl LocalRuntime {
    /// Spawn the runtime and wait until it accepts connections.
    pub async fn start(config: &LocalRuntimeConfig, logger: Logger) -> Result<Self> {
        let mut child = Command::new(&config.executable)
            .args(&config.args)
            .envs(&config.env)
            .stdin(Stdio::null())
            .kill_on_drop(true)
            .spawn()
            .map_err(|source| RuntimeLaunchFailed::Spawn {
                executable: config.executable.display().to_string(),
                source,
            })?;

        let client_config = config.client_config();
        let address = client_config.socket_address();
        info!(logger, "Started local runtime";
            "executable" => %config.executable.display(),
            "pid" => child.id(),
            "address" => &address
        );

        wait_until_listening(&mut child, &address, config.startup_timeout).await?;
        let client = RuntimeClient::connect(&client_config, logger.clone()).await?;

        Ok(Self {
            child,
            client,
            logger,
        })
    }

    pub fn client(&self) -> &RuntimeClient {
        &self.client
    }

    pub fn id(&self) -> Option<u32> {
        self.child.id()
    }

    /// Kill the runtime and wait for it to exit.
    pub async fn shutdown(mut self) -> Result<()> {
        info!(self.logger, "Stopping local runtime"; "pid" => self.child.id());
        self.child.kill().await.map_err(RuntimeLaunchFailed::Wait)?;
        Ok(())
    }
}

async fn wait_until_listening(
    child: &mut Child,
    address: &str,
    timeout: Duration,
) -> std::result::Result<(), RuntimeLaunchFailed> {
    let deadline = Instant::now() + timeout;
    loop {
        if let Some(status) = child.try_wait().map_err(RuntimeLaunchFailed::Wait)? {
            return Err(RuntimeLaunchFailed::Exited {
                code: status.code(),
            });
        }
        if TcpStream::connect(address).await.is_ok() {
            return Ok(());
        }
        if Instant::now() >= deadline {
            return Err(RuntimeLaunchFailed::Timeout {
                address: address.to_string(),
                waited: timeout,
            });
        }
        tokio::time::sleep(POLL_INTERVAL).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ClientError;

    fn test_logger() -> Logger {
        Logger::root(slog::Discard, slog::o!())
    }

    fn unused_port() -> u16 {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        listener.local_addr().unwrap().port()
    }

    #[tokio::test]
    async fn test_missing_executable() {
        let config = LocalRuntimeConfig::new("/nonexistent/tierkreis-server");
        match LocalRuntime::start(&config, test_logger()).await {
            Err(ClientError::Launch(RuntimeLaunchFailed::Spawn { executable, .. })) => {
                assert_eq!(executable, "/nonexistent/tierkreis-server")
            }
            Err(other) => panic!("unexpected error: {}", other),
            Ok(_) => panic!("runtime should not start"),
        }
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_early_exit_is_reported() {
        let config = LocalRuntimeConfig::new("/bin/sh")
            .with_arg("-c")
            .with_arg("exit 3")
            .with_port(unused_port())
            .with_startup_timeout(Duration::from_secs(10));
        match LocalRuntime::start(&config, test_logger()).await {
            Err(ClientError::Launch(RuntimeLaunchFailed::Exited { code })) => {
                assert_eq!(code, Some(3))
            }
            Err(other) => panic!("unexpected error: {}", other),
            Ok(_) => panic!("runtime should not start"),
        }
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_startup_timeout() {
        let config = LocalRuntimeConfig::new("/bin/sh")
            .with_arg("-c")
            .with_arg("sleep 5")
            .with_port(unused_port())
            .with_startup_timeout(Duration::from_millis(300));
        match LocalRuntime::start(&config, test_logger()).await {
            Err(ClientError::Launch(RuntimeLaunchFailed::Timeout { waited, .. })) => {
                assert_eq!(waited, Duration::from_millis(300))
            }
            Err(other) => panic!("unexpected error: {}", other),
            Ok(_) => panic!("runtime should not start"),
        }
    }
}
