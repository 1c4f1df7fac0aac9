//! Error types for the Tierkreis client and worker

use crate::model::{IncompatibleType, TierkreisTypeErrors, ValueError};
use std::time::Duration;
use thiserror::Error;

/// Result type for runtime client operations
pub type Result<T> = std::result::Result<T, ClientError>;

/// Errors that can occur when talking to a Tierkreis runtime
#[derive(Debug, Error)]
pub enum ClientError {
    /// A task input has no typed-value representation; raised before any request
    #[error("input '{input_name}' cannot be sent to the runtime: {source}")]
    InputConversion {
        input_name: String,
        #[source]
        source: IncompatibleType,
    },

    /// The runtime rejected a graph during type checking
    #[error("{0}")]
    TypeErrors(#[from] TierkreisTypeErrors),

    /// The runtime reported a non-success status for a task
    #[error("task failed: {status}")]
    TaskFailed { status: String },

    #[error(transparent)]
    Http(#[from] RuntimeHttpError),

    #[error("could not connect to {address}: {reason}")]
    Connect { address: String, reason: String },

    /// A wire value could not be decoded
    #[error("invalid value from runtime: {0}")]
    Value(#[from] ValueError),

    #[error("runtime response {message} is missing field '{field}'")]
    MissingField {
        message: &'static str,
        field: &'static str,
    },

    #[error("expected {expected} from the runtime, found {found}")]
    UnexpectedValue {
        expected: &'static str,
        found: &'static str,
    },

    /// A worker tried to call back into the runtime without knowing its address
    #[error("no callback address available; the runtime did not say where to call back")]
    MissingCallback,

    #[error("invalid credentials: {0}")]
    InvalidCredentials(String),

    #[error("credential store error: {0}")]
    Keyring(#[from] keyring::Error),

    #[error(transparent)]
    Bridge(#[from] BridgeError),

    #[error(transparent)]
    Launch(#[from] RuntimeLaunchFailed),
}

/// A gRPC call failed at the protocol level.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Request to endpoint '{endpoint}' failed with code {code} and content '{content}'.")]
pub struct RuntimeHttpError {
    pub endpoint: String,
    pub code: i32,
    pub content: String,
}

impl RuntimeHttpError {
    pub fn from_status(endpoint: &str, status: &tonic::Status) -> Self {
        Self {
            endpoint: endpoint.to_string(),
            code: status.code() as i32,
            content: status.message().to_string(),
        }
    }
}

/// Failures of the blocking bridge around async calls
#[derive(Debug, Error)]
pub enum BridgeError {
    #[error("failed to build isolated runtime: {0}")]
    Runtime(#[source] std::io::Error),

    #[error("failed to spawn bridge thread: {0}")]
    Spawn(#[source] std::io::Error),

    #[error("bridged call panicked: {0}")]
    Panicked(String),
}

/// A locally started runtime never became reachable.
#[derive(Debug, Error)]
pub enum RuntimeLaunchFailed {
    #[error("failed to start runtime '{executable}': {source}")]
    Spawn {
        executable: String,
        #[source]
        source: std::io::Error,
    },

    #[error("runtime exited during startup with {}", describe_exit(.code))]
    Exited { code: Option<i32> },

    #[error("runtime did not accept connections on {address} within {waited:?}")]
    Timeout { address: String, waited: Duration },

    #[error("failed to query runtime process: {0}")]
    Wait(#[source] std::io::Error),
}

fn describe_exit(code: &Option<i32>) -> String {
    match code {
        Some(code) => format!("status {}", code),
        None => "a signal".to_string(),
    }
}

/// Errors raised while serving worker functions
#[derive(Debug, Error)]
pub enum WorkerError {
    #[error("'{0}' is already registered in this namespace")]
    AlreadyRegistered(String),

    #[error("function '{0}' not found")]
    FunctionNotFound(String),

    #[error("invalid inputs for '{function}': {source}")]
    InvalidInput {
        function: String,
        #[source]
        source: ValueError,
    },

    #[error("invalid outputs from '{function}': {source}")]
    InvalidOutput {
        function: String,
        #[source]
        source: ValueError,
    },

    #[error(transparent)]
    Conversion(#[from] IncompatibleType),

    #[error(transparent)]
    Value(#[from] ValueError),

    #[error(transparent)]
    Client(#[from] ClientError),

    #[error("function failed: {0}")]
    Failed(String),

    #[error("Transport error: {0}")]
    Transport(#[from] tonic::transport::Error),

    #[error("invalid address '{0}'")]
    InvalidAddress(String),
}

impl From<WorkerError> for tonic::Status {
    fn from(err: WorkerError) -> Self {
        match err {
            WorkerError::FunctionNotFound(_) => tonic::Status::not_found(err.to_string()),
            WorkerError::InvalidInput { .. } | WorkerError::Value(_) => {
                tonic::Status::invalid_argument(err.to_string())
            }
            WorkerError::Client(ClientError::MissingCallback) => {
                tonic::Status::failed_precondition(err.to_string())
            }
            _ => tonic::Status::internal(err.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_http_error_message() {
        let status = tonic::Status::unavailable("runtime is shutting down");
        let err = RuntimeHttpError::from_status("/tierkreis.runtime.Runtime/RunTask", &status);
        assert_eq!(err.code, tonic::Code::Unavailable as i32);
        assert_eq!(
            err.to_string(),
            "Request to endpoint '/tierkreis.runtime.Runtime/RunTask' failed with code 14 and content 'runtime is shutting down'."
        );
    }

    #[test]
    fn test_worker_error_status_codes() {
        let status: tonic::Status = WorkerError::FunctionNotFound("pytket/nope".to_string()).into();
        assert_eq!(status.code(), tonic::Code::NotFound);

        let status: tonic::Status = WorkerError::InvalidInput {
            function: "pytket/compile".to_string(),
            source: ValueError::MissingStructField("circuit".to_string()),
        }
        .into();
        assert_eq!(status.code(), tonic::Code::InvalidArgument);
        assert!(status.message().contains("circuit"));

        let status: tonic::Status = WorkerError::Client(ClientError::MissingCallback).into();
        assert_eq!(status.code(), tonic::Code::FailedPrecondition);
    }

    #[test]
    fn test_launch_exit_description() {
        let err = RuntimeLaunchFailed::Exited { code: Some(3) };
        assert_eq!(err.to_string(), "runtime exited during startup with status 3");
        let err = RuntimeLaunchFailed::Exited { code: None };
        assert_eq!(err.to_string(), "runtime exited during startup with a signal");
    }
}
