//! Typed data model shared by the runtime client and the worker side.
//!
//! - `values`: the typed value tree exchanged with the runtime
//! - `native`: serde bridge between Rust values and typed values
//! - `types`: declared types, type schemes and the named struct registry
//! - `graph`: computation graphs
//! - `type_errors`: structured type-check failures
//! - `function`: published function declarations

pub mod function;
pub mod graph;
pub mod native;
pub mod type_errors;
pub mod types;
pub mod values;

pub use function::TierkreisFunction;
pub use graph::{NodeIndex, NodePort, TierkreisEdge, TierkreisGraph, TierkreisNode};
pub use type_errors::{TierkreisTypeError, TierkreisTypeErrors, TypeErrorKind};
pub use types::{GraphType, NamedStructs, Row, TierkreisType, TypeScheme};
pub use values::{IncompatibleType, StructValue, TierkreisValue, ValueError};

use std::borrow::Borrow;

/// Borrow a required message field out of generated protobuf code.
///
/// Recursive messages are boxed by the code generator, so the field may hold
/// either `T` or `Box<T>`.
pub(crate) fn required_field<'a, T, B>(
    field: &'a Option<B>,
    message: &'static str,
    name: &'static str,
) -> Result<&'a T, ValueError>
where
    B: Borrow<T> + 'a,
{
    field
        .as_ref()
        .map(Borrow::borrow)
        .ok_or(ValueError::MissingField { message, field: name })
}
