//! Client side of the runtime protocol.
//!
//! - `runtime_client`: task lifecycle and type checking
//! - `signature`: the runtime's function catalog
//! - `sync_bridge`: blocking wrappers around async calls

pub mod runtime_client;
pub mod signature;
pub mod sync_bridge;

pub use runtime_client::{convert_inputs, RuntimeClient, TaskHandle, TaskStatus};
pub use signature::{signature_from_proto, split_qualified_name, NamespaceDefs, RuntimeSignature};
pub use sync_bridge::{async_to_sync, block_on_isolated};
