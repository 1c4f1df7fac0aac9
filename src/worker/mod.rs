//! Worker side: functions served to the runtime, and calling back into it.
//!
//! - `namespace`: the function registry
//! - `authenticator`: runtime clients for callbacks, with credentials attached
//! - `server`: the `Worker` and `Signature` gRPC services

pub mod authenticator;
pub mod namespace;
pub mod server;

pub use authenticator::CallbackAuthenticator;
pub use namespace::{FunctionDeclaration, Namespace, RegisteredFunction};
pub use server::{serve_with_listener, start_worker_server, Worker};

use crate::error::WorkerError;
use crate::grpc::proto::worker as pw;
use crate::model::StructValue;
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

/// Where the runtime that invoked a function can be reached.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct CallbackAddress {
    pub host: String,
    pub port: u16,
}

impl CallbackAddress {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
        }
    }

    pub fn socket_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn to_proto(&self) -> pw::Callback {
        pw::Callback {
            host: self.host.clone(),
            port: u32::from(self.port),
        }
    }

    pub fn from_proto(proto: &pw::Callback) -> Result<Self, WorkerError> {
        let port = u16::try_from(proto.port).map_err(|_| {
            WorkerError::InvalidAddress(format!("{}:{}", proto.host, proto.port))
        })?;
        Ok(Self::new(proto.host.clone(), port))
    }
}

impl fmt::Display for CallbackAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.host, self.port)
    }
}

/// One invocation of a registered function.
#[derive(Clone, Debug)]
pub struct FunctionCall {
    /// Qualified name the runtime asked for
    pub function: String,
    pub inputs: StructValue,
    /// Absent when the runtime did not say how to reach it
    pub callback: Option<CallbackAddress>,
}

pub type HandlerFuture = Pin<Box<dyn Future<Output = Result<StructValue, WorkerError>> + Send>>;

/// Type-erased function implementation
pub type FunctionHandler = Arc<dyn Fn(FunctionCall) -> HandlerFuture + Send + Sync>;
