//! Configuration for runtime connections and locally launched runtimes

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::Duration;

/// Where to find a Tierkreis runtime.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ClientConfig {
    /// Host name or IP address of the runtime (e.g., "localhost")
    pub host: String,

    /// Port the runtime's gRPC server listens on
    pub port: u16,

    /// Give up connecting after this long. No limit when `None`.
    pub connect_timeout: Option<Duration>,
}

impl ClientConfig {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
            connect_timeout: None,
        }
    }

    /// Set a connection timeout.
    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = Some(timeout);
        self
    }

    /// `host:port`, for diagnostics and for building channels
    pub fn socket_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn endpoint_uri(&self) -> String {
        format!("http://{}", self.socket_address())
    }
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self::new("localhost", 8080)
    }
}

/// How to start a runtime as a child process.
#[derive(Clone, Debug, PartialEq)]
pub struct LocalRuntimeConfig {
    /// Path to the runtime server executable
    pub executable: PathBuf,

    /// Address the runtime is expected to listen on once started
    pub host: String,
    pub port: u16,

    /// Extra command-line arguments
    pub args: Vec<String>,

    /// Extra environment variables
    pub env: BTreeMap<String, String>,

    /// How long to wait for the runtime's port to accept connections
    pub startup_timeout: Duration,
}

impl LocalRuntimeConfig {
    pub fn new(executable: impl Into<PathBuf>) -> Self {
        Self {
            executable: executable.into(),
            host: "127.0.0.1".to_string(),
            port: 8080,
            args: Vec::new(),
            env: BTreeMap::new(),
            startup_timeout: Duration::from_secs(30),
        }
    }

    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    pub fn with_arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn with_env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.insert(key.into(), value.into());
        self
    }

    pub fn with_startup_timeout(mut self, timeout: Duration) -> Self {
        self.startup_timeout = timeout;
        self
    }

    /// Connection settings for the runtime once it is up
    pub fn client_config(&self) -> ClientConfig {
        ClientConfig::new(self.host.clone(), self.port)
    }
}
