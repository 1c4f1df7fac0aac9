pub mod client;
pub mod config;
pub mod error;
pub mod grpc;
pub mod launch;
pub mod model;
pub mod worker;

pub use client::{
    block_on_isolated, NamespaceDefs, RuntimeClient, RuntimeSignature, TaskHandle, TaskStatus,
};
pub use config::{ClientConfig, LocalRuntimeConfig};
pub use error::{
    BridgeError, ClientError, Result, RuntimeHttpError, RuntimeLaunchFailed, WorkerError,
};
pub use grpc::{
    CredentialStore, Credentials, EnvCredentialStore, KeyringCredentialStore, MemoryCredentialStore,
    NoCredentials,
};
pub use launch::LocalRuntime;
pub use model::{
    IncompatibleType, StructValue, TierkreisFunction, TierkreisGraph, TierkreisType,
    TierkreisTypeErrors, TierkreisValue, TypeScheme, ValueError,
};
pub use worker::{CallbackAddress, CallbackAuthenticator, FunctionDeclaration, Namespace, Worker};
