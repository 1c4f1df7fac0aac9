//! The runtime's published catalog of functions and type aliases, by namespace.

use crate::error::Result;
use crate::grpc::proto::signature as ps;
use crate::model::{TierkreisFunction, TypeScheme};
use std::collections::BTreeMap;

/// Functions and aliases of one namespace, keyed by short name.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct NamespaceDefs {
    pub functions: BTreeMap<String, TierkreisFunction>,
    pub aliases: BTreeMap<String, TypeScheme>,
}

impl NamespaceDefs {
    pub fn is_empty(&self) -> bool {
        self.functions.is_empty() && self.aliases.is_empty()
    }
}

/// Namespace name to its definitions. The root namespace is `""`.
pub type RuntimeSignature = BTreeMap<String, NamespaceDefs>;

/// Split `namespace/name` on the first `/`.
pub fn split_qualified_name(qualified: &str) -> (&str, &str) {
    qualified.split_once('/').unwrap_or(("", qualified))
}

/// Build a [`RuntimeSignature`] from a `ListFunctions` response.
///
/// Functions and aliases landing in the same namespace share one entry,
/// whichever arrives first.
pub fn signature_from_proto(response: &ps::ListFunctionsResponse) -> Result<RuntimeSignature> {
    let mut signature = RuntimeSignature::new();

    for (qualified, declaration) in &response.functions {
        let (namespace, name) = split_qualified_name(qualified);
        let function = TierkreisFunction::from_proto(qualified, declaration)?;
        signature
            .entry(namespace.to_string())
            .or_default()
            .functions
            .insert(name.to_string(), function);
    }

    for (qualified, scheme) in &response.aliases {
        let (namespace, name) = split_qualified_name(qualified);
        signature
            .entry(namespace.to_string())
            .or_default()
            .aliases
            .insert(name.to_string(), TypeScheme::from_proto(scheme)?);
    }

    Ok(signature)
}
