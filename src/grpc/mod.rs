//! gRPC plumbing shared by the runtime client and the worker server.
//!
//! - `channel`: channel construction
//! - `auth`: credential lookup and the metadata-stamping interceptor

pub mod auth;
pub mod channel;

pub use auth::{
    lookup_credentials, AuthChannel, CredentialInterceptor, CredentialStore, Credentials,
    EnvCredentialStore, KeyringCredentialStore, MemoryCredentialStore, NoCredentials, KEYRING_SERVICE,
};
pub use channel::{
    channel_builder_with_timeout, connect_channel, default_channel_builder, BoxError,
    ChannelBuilder, ChannelFuture,
};

/// Generated protobuf messages and service stubs.
pub mod proto {
    pub mod graph {
        tonic::include_proto!("tierkreis.graph");
    }

    pub mod signature {
        tonic::include_proto!("tierkreis.signature");
    }

    pub mod runtime {
        tonic::include_proto!("tierkreis.runtime");
    }

    pub mod worker {
        tonic::include_proto!("tierkreis.worker");
    }
}
