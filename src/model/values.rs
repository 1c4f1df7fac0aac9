//! The typed value tree exchanged with the runtime.

use super::graph::TierkreisGraph;
use super::required_field;
use super::types::{NamedStructs, Row, TierkreisType};
use crate::grpc::proto::graph as pg;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::collections::BTreeMap;
use thiserror::Error;

/// A native value has no typed-value representation.
#[derive(Clone, Debug, PartialEq, Error)]
#[error("no Tierkreis representation for {0}")]
pub struct IncompatibleType(pub String);

/// Errors raised while decoding or checking typed values.
#[derive(Clone, Debug, PartialEq, Error)]
pub enum ValueError {
    /// A oneof discriminator was absent on the wire
    #[error("wire {0} carries no variant tag")]
    MissingTag(&'static str),

    /// A required message field was absent on the wire
    #[error("wire {message} is missing field '{field}'")]
    MissingField {
        message: &'static str,
        field: &'static str,
    },

    /// Value does not have the declared type
    #[error("expected a value of type {expected}, found {found}")]
    TypeMismatch { expected: String, found: String },

    /// A struct alias was used without being registered first
    #[error("struct '{0}' is not registered")]
    UnregisteredStruct(String),

    #[error("missing struct field '{0}'")]
    MissingStructField(String),

    #[error("unexpected struct field '{0}'")]
    UnexpectedStructField(String),

    #[error("unknown variant tag '{0}'")]
    UnknownVariantTag(String),

    /// Conversion into a native Rust value failed
    #[error("cannot convert to native value: {0}")]
    Native(String),
}

/// A value with enough type information to cross the wire on its own.
#[derive(Clone, Debug, PartialEq)]
pub enum TierkreisValue {
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    Pair(Box<(TierkreisValue, TierkreisValue)>),
    Vec(Vec<TierkreisValue>),
    Map(Vec<(TierkreisValue, TierkreisValue)>),
    Struct(StructValue),
    Graph(TierkreisGraph),
    Variant(String, Box<TierkreisValue>),
}

impl TierkreisValue {
    /// Convert a native Rust value.
    ///
    /// Unit values, `None`, raw bytes and integers outside the 64-bit signed
    /// range have no representation and fail with [`IncompatibleType`].
    ///
    /// Serde cannot tell a `[T; 2]` from a 2-tuple, so two-element arrays
    /// become a `Pair`. Use a slice or `Vec` for a `Vec` of length two.
    pub fn from_native<T: Serialize + ?Sized>(value: &T) -> Result<Self, IncompatibleType> {
        value.serialize(super::native::ValueSerializer)
    }

    /// Convert into a native Rust value.
    pub fn to_native<T: DeserializeOwned>(&self) -> Result<T, ValueError> {
        T::deserialize(self.clone())
    }

    pub fn pair(first: TierkreisValue, second: TierkreisValue) -> Self {
        Self::Pair(Box::new((first, second)))
    }

    /// Short name of the variant, used in diagnostics
    pub fn kind_name(&self) -> &'static str {
        match self {
            Self::Bool(_) => "Bool",
            Self::Int(_) => "Int",
            Self::Float(_) => "Float",
            Self::Str(_) => "Str",
            Self::Pair(_) => "Pair",
            Self::Vec(_) => "Vec",
            Self::Map(_) => "Map",
            Self::Struct(_) => "Struct",
            Self::Graph(_) => "Graph",
            Self::Variant(_, _) => "Variant",
        }
    }

    pub fn as_float(&self) -> Option<f64> {
        match self {
            Self::Float(value) => Some(*value),
            _ => None,
        }
    }

    pub fn as_graph(&self) -> Option<&TierkreisGraph> {
        match self {
            Self::Graph(graph) => Some(graph),
            _ => None,
        }
    }

    pub fn to_proto(&self) -> pg::Value {
        use pg::value::Value as V;

        let value = match self {
            Self::Bool(value) => V::Boolean(*value),
            Self::Int(value) => V::Integer(*value),
            Self::Float(value) => V::Flt(*value),
            Self::Str(value) => V::Str(value.clone()),
            Self::Pair(pair) => V::Pair(pair_to_proto(&pair.0, &pair.1).into()),
            Self::Vec(items) => V::Vec(
                pg::VecValue {
                    vec: items.iter().map(Self::to_proto).collect(),
                }
                .into(),
            ),
            Self::Map(entries) => V::Map(
                pg::MapValue {
                    pairs: entries
                        .iter()
                        .map(|(key, value)| pair_to_proto(key, value))
                        .collect(),
                }
                .into(),
            ),
            Self::Struct(fields) => V::StructValue(fields.to_proto().into()),
            Self::Graph(graph) => V::Graph(graph.to_proto().into()),
            Self::Variant(tag, inner) => V::Variant(
                pg::VariantValue {
                    tag: tag.clone(),
                    value: Some(inner.to_proto().into()),
                }
                .into(),
            ),
        };

        pg::Value { value: Some(value) }
    }

    pub fn from_proto(proto: &pg::Value) -> Result<Self, ValueError> {
        use pg::value::Value as V;

        let value = proto.value.as_ref().ok_or(ValueError::MissingTag("Value"))?;
        Ok(match value {
            V::Boolean(value) => Self::Bool(*value),
            V::Integer(value) => Self::Int(*value),
            V::Flt(value) => Self::Float(*value),
            V::Str(value) => Self::Str(value.clone()),
            V::Pair(pair) => {
                let (first, second) = pair_from_proto(pair)?;
                Self::pair(first, second)
            }
            V::Vec(items) => {
                let items: &pg::VecValue = items;
                Self::Vec(
                    items
                        .vec
                        .iter()
                        .map(Self::from_proto)
                        .collect::<Result<_, _>>()?,
                )
            }
            V::Map(entries) => {
                let entries: &pg::MapValue = entries;
                Self::Map(
                    entries
                        .pairs
                        .iter()
                        .map(pair_from_proto)
                        .collect::<Result<_, _>>()?,
                )
            }
            V::StructValue(fields) => Self::Struct(StructValue::from_proto(fields)?),
            V::Graph(graph) => Self::Graph(TierkreisGraph::from_proto(graph)?),
            V::Variant(variant) => {
                let variant: &pg::VariantValue = variant;
                let inner = required_field(&variant.value, "VariantValue", "value")?;
                Self::Variant(variant.tag.clone(), Box::new(Self::from_proto(inner)?))
            }
        })
    }

    /// Check this value against a declared type.
    ///
    /// Type variables accept any value. Aliases resolve through `structs`; an
    /// alias that was never registered is reported as
    /// [`ValueError::UnregisteredStruct`] rather than as a mismatch.
    pub fn check_type(&self, expected: &TierkreisType, structs: &NamedStructs) -> Result<(), ValueError> {
        let mismatch = || ValueError::TypeMismatch {
            expected: expected.to_string(),
            found: self.kind_name().to_string(),
        };

        match (expected, self) {
            (TierkreisType::Var(_), _) => Ok(()),
            (TierkreisType::Alias(name), _) => {
                let row = structs
                    .get(name)
                    .ok_or_else(|| ValueError::UnregisteredStruct(name.clone()))?;
                match self {
                    Self::Struct(fields) => fields.check_row(row, structs),
                    _ => Err(mismatch()),
                }
            }
            (TierkreisType::Bool, Self::Bool(_))
            | (TierkreisType::Int, Self::Int(_))
            | (TierkreisType::Float, Self::Float(_))
            | (TierkreisType::Str, Self::Str(_))
            | (TierkreisType::Graph(_), Self::Graph(_)) => Ok(()),
            (TierkreisType::Pair(first_type, second_type), Self::Pair(pair)) => {
                pair.0.check_type(first_type, structs)?;
                pair.1.check_type(second_type, structs)
            }
            (TierkreisType::Vec(element), Self::Vec(items)) => items
                .iter()
                .try_for_each(|item| item.check_type(element, structs)),
            (TierkreisType::Map(key_type, value_type), Self::Map(entries)) => {
                entries.iter().try_for_each(|(key, value)| {
                    key.check_type(key_type, structs)?;
                    value.check_type(value_type, structs)
                })
            }
            (TierkreisType::Struct(row), Self::Struct(fields)) => fields.check_row(row, structs),
            (TierkreisType::Variant(row), Self::Variant(tag, inner)) => {
                let inner_type = row
                    .get(tag)
                    .ok_or_else(|| ValueError::UnknownVariantTag(tag.clone()))?;
                inner.check_type(inner_type, structs)
            }
            _ => Err(mismatch()),
        }
    }
}

impl From<TierkreisGraph> for TierkreisValue {
    fn from(graph: TierkreisGraph) -> Self {
        Self::Graph(graph)
    }
}

impl From<StructValue> for TierkreisValue {
    fn from(fields: StructValue) -> Self {
        Self::Struct(fields)
    }
}

fn pair_to_proto(first: &TierkreisValue, second: &TierkreisValue) -> pg::PairValue {
    pg::PairValue {
        first: Some(first.to_proto().into()),
        second: Some(second.to_proto().into()),
    }
}

fn pair_from_proto(pair: &pg::PairValue) -> Result<(TierkreisValue, TierkreisValue), ValueError> {
    let first = required_field(&pair.first, "PairValue", "first")?;
    let second = required_field(&pair.second, "PairValue", "second")?;
    Ok((
        TierkreisValue::from_proto(first)?,
        TierkreisValue::from_proto(second)?,
    ))
}

/// Named fields, ordered by field name.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct StructValue {
    values: BTreeMap<String, TierkreisValue>,
}

impl StructValue {
    pub fn new(values: BTreeMap<String, TierkreisValue>) -> Self {
        Self { values }
    }

    /// Convert a native Rust struct or map with string keys.
    pub fn from_native<T: Serialize + ?Sized>(value: &T) -> Result<Self, IncompatibleType> {
        match TierkreisValue::from_native(value)? {
            TierkreisValue::Struct(fields) => Ok(fields),
            TierkreisValue::Map(entries) => entries
                .into_iter()
                .map(|(key, value)| match key {
                    TierkreisValue::Str(name) => Ok((name, value)),
                    other => Err(IncompatibleType(format!(
                        "a map key of kind {} used as a struct field name",
                        other.kind_name()
                    ))),
                })
                .collect::<Result<_, _>>()
                .map(Self::new),
            other => Err(IncompatibleType(format!(
                "a {} value used where a struct is required",
                other.kind_name()
            ))),
        }
    }

    pub fn get(&self, name: &str) -> Option<&TierkreisValue> {
        self.values.get(name)
    }

    pub fn insert(&mut self, name: impl Into<String>, value: TierkreisValue) -> Option<TierkreisValue> {
        self.values.insert(name.into(), value)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn values(&self) -> &BTreeMap<String, TierkreisValue> {
        &self.values
    }

    pub fn into_values(self) -> BTreeMap<String, TierkreisValue> {
        self.values
    }

    pub fn to_proto(&self) -> pg::StructValue {
        pg::StructValue {
            map: self
                .values
                .iter()
                .map(|(name, value)| (name.clone(), value.to_proto()))
                .collect(),
        }
    }

    pub fn from_proto(proto: &pg::StructValue) -> Result<Self, ValueError> {
        let values = proto
            .map
            .iter()
            .map(|(name, value)| Ok((name.clone(), TierkreisValue::from_proto(value)?)))
            .collect::<Result<_, ValueError>>()?;
        Ok(Self { values })
    }

    /// Check that the fields are exactly those of `row`, each with its declared type.
    pub fn check_row(&self, row: &Row, structs: &NamedStructs) -> Result<(), ValueError> {
        if let Some(extra) = self.values.keys().find(|name| !row.contains_key(*name)) {
            return Err(ValueError::UnexpectedStructField(extra.clone()));
        }
        for (name, field_type) in row {
            let value = self
                .values
                .get(name)
                .ok_or_else(|| ValueError::MissingStructField(name.clone()))?;
            value.check_type(field_type, structs)?;
        }
        Ok(())
    }
}

impl FromIterator<(String, TierkreisValue)> for StructValue {
    fn from_iter<I: IntoIterator<Item = (String, TierkreisValue)>>(iter: I) -> Self {
        Self::new(iter.into_iter().collect())
    }
}
