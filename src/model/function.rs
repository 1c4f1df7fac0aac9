use super::required_field;
use super::types::TypeScheme;
use super::values::ValueError;
use crate::grpc::proto::graph as pg;
use crate::grpc::proto::signature as ps;

/// A function published by the runtime or by a worker.
#[derive(Clone, Debug, PartialEq)]
pub struct TierkreisFunction {
    /// Qualified name, `namespace/name`
    pub name: String,
    pub type_scheme: TypeScheme,
    pub docs: String,
    pub input_order: Vec<String>,
    pub output_order: Vec<String>,
}

impl TierkreisFunction {
    pub fn to_proto(&self) -> ps::FunctionDeclaration {
        ps::FunctionDeclaration {
            type_scheme: Some(self.type_scheme.to_proto()),
            description: self.docs.clone(),
            input_order: self.input_order.clone(),
            output_order: self.output_order.clone(),
        }
    }

    pub fn from_proto(name: &str, proto: &ps::FunctionDeclaration) -> Result<Self, ValueError> {
        let scheme: &pg::TypeScheme =
            required_field(&proto.type_scheme, "FunctionDeclaration", "type_scheme")?;
        Ok(Self {
            name: name.to_string(),
            type_scheme: TypeScheme::from_proto(scheme)?,
            docs: proto.description.clone(),
            input_order: proto.input_order.clone(),
            output_order: proto.output_order.clone(),
        })
    }
}
