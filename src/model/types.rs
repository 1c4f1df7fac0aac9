//! Declared types, type schemes and the named struct registry.

use super::required_field;
use super::values::ValueError;
use crate::grpc::proto::graph as pg;
use std::collections::BTreeMap;
use std::fmt;

/// Field name to field type, ordered by name.
pub type Row = BTreeMap<String, TierkreisType>;

/// Declared type of a port, parameter, return value or alias.
#[derive(Clone, Debug, PartialEq)]
pub enum TierkreisType {
    Int,
    Bool,
    Float,
    Str,
    /// Free type variable, bound by an enclosing [`TypeScheme`]
    Var(String),
    Pair(Box<TierkreisType>, Box<TierkreisType>),
    Vec(Box<TierkreisType>),
    Map(Box<TierkreisType>, Box<TierkreisType>),
    Struct(Row),
    Variant(Row),
    Graph(GraphType),
    /// Reference to a named struct
    Alias(String),
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct GraphType {
    pub inputs: Row,
    pub outputs: Row,
}

impl TierkreisType {
    pub fn vec(element: TierkreisType) -> Self {
        Self::Vec(Box::new(element))
    }

    pub fn pair(first: TierkreisType, second: TierkreisType) -> Self {
        Self::Pair(Box::new(first), Box::new(second))
    }

    pub fn map(key: TierkreisType, value: TierkreisType) -> Self {
        Self::Map(Box::new(key), Box::new(value))
    }

    pub fn to_proto(&self) -> pg::Type {
        use pg::r#type::Kind;

        let kind = match self {
            Self::Int => Kind::Int(pg::Empty {}),
            Self::Bool => Kind::Bool(pg::Empty {}),
            Self::Float => Kind::Flt(pg::Empty {}),
            Self::Str => Kind::Str(pg::Empty {}),
            Self::Var(name) => Kind::Var(name.clone()),
            Self::Pair(first, second) => Kind::Pair(pair_type_to_proto(first, second).into()),
            Self::Vec(element) => Kind::Vec(element.to_proto().into()),
            Self::Map(key, value) => Kind::Map(pair_type_to_proto(key, value).into()),
            Self::Struct(row) => Kind::StructType(row_to_proto(row).into()),
            Self::Variant(row) => Kind::Variant(row_to_proto(row).into()),
            Self::Graph(graph) => Kind::Graph(graph.to_proto().into()),
            Self::Alias(name) => Kind::Alias(name.clone()),
        };

        pg::Type { kind: Some(kind) }
    }

    pub fn from_proto(proto: &pg::Type) -> Result<Self, ValueError> {
        use pg::r#type::Kind;

        let kind = proto.kind.as_ref().ok_or(ValueError::MissingTag("Type"))?;
        Ok(match kind {
            Kind::Int(_) => Self::Int,
            Kind::Bool(_) => Self::Bool,
            Kind::Flt(_) => Self::Float,
            Kind::Str(_) => Self::Str,
            Kind::Var(name) => Self::Var(name.clone()),
            Kind::Pair(pair) => {
                let (first, second) = pair_type_from_proto(pair)?;
                Self::pair(first, second)
            }
            Kind::Vec(element) => Self::vec(Self::from_proto(element)?),
            Kind::Map(pair) => {
                let (key, value) = pair_type_from_proto(pair)?;
                Self::map(key, value)
            }
            Kind::StructType(row) => Self::Struct(row_from_proto(row)?),
            Kind::Variant(row) => Self::Variant(row_from_proto(row)?),
            Kind::Graph(graph) => Self::Graph(GraphType::from_proto(graph)?),
            Kind::Alias(name) => Self::Alias(name.clone()),
        })
    }
}

impl GraphType {
    pub fn to_proto(&self) -> pg::GraphType {
        pg::GraphType {
            inputs: Some(row_to_proto(&self.inputs).into()),
            outputs: Some(row_to_proto(&self.outputs).into()),
        }
    }

    pub fn from_proto(proto: &pg::GraphType) -> Result<Self, ValueError> {
        Ok(Self {
            inputs: row_from_proto(required_field(&proto.inputs, "GraphType", "inputs")?)?,
            outputs: row_from_proto(required_field(&proto.outputs, "GraphType", "outputs")?)?,
        })
    }
}

fn pair_type_to_proto(first: &TierkreisType, second: &TierkreisType) -> pg::PairType {
    pg::PairType {
        first: Some(first.to_proto().into()),
        second: Some(second.to_proto().into()),
    }
}

fn pair_type_from_proto(pair: &pg::PairType) -> Result<(TierkreisType, TierkreisType), ValueError> {
    Ok((
        TierkreisType::from_proto(required_field(&pair.first, "PairType", "first")?)?,
        TierkreisType::from_proto(required_field(&pair.second, "PairType", "second")?)?,
    ))
}

pub(crate) fn row_to_proto(row: &Row) -> pg::RowType {
    pg::RowType {
        content: row
            .iter()
            .map(|(name, field_type)| (name.clone(), field_type.to_proto()))
            .collect(),
    }
}

pub(crate) fn row_from_proto(proto: &pg::RowType) -> Result<Row, ValueError> {
    proto
        .content
        .iter()
        .map(|(name, field_type)| Ok((name.clone(), TierkreisType::from_proto(field_type)?)))
        .collect()
}

fn fmt_row(f: &mut fmt::Formatter<'_>, row: &Row) -> fmt::Result {
    for (index, (name, field_type)) in row.iter().enumerate() {
        if index > 0 {
            write!(f, ", ")?;
        }
        write!(f, "{}: {}", name, field_type)?;
    }
    Ok(())
}

impl fmt::Display for TierkreisType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Int => write!(f, "Int"),
            Self::Bool => write!(f, "Bool"),
            Self::Float => write!(f, "Float"),
            Self::Str => write!(f, "Str"),
            Self::Var(name) => write!(f, "{}", name),
            Self::Pair(first, second) => write!(f, "Pair<{}, {}>", first, second),
            Self::Vec(element) => write!(f, "Vec<{}>", element),
            Self::Map(key, value) => write!(f, "Map<{}, {}>", key, value),
            Self::Struct(row) => {
                write!(f, "Struct<")?;
                fmt_row(f, row)?;
                write!(f, ">")
            }
            Self::Variant(row) => {
                write!(f, "Variant<")?;
                fmt_row(f, row)?;
                write!(f, ">")
            }
            Self::Graph(graph) => {
                write!(f, "Graph<(")?;
                fmt_row(f, &graph.inputs)?;
                write!(f, ") -> (")?;
                fmt_row(f, &graph.outputs)?;
                write!(f, ")>")
            }
            Self::Alias(name) => write!(f, "{}", name),
        }
    }
}

/// A possibly polymorphic type: `variables` are bound in `body`.
///
/// Immutable once constructed.
#[derive(Clone, Debug, PartialEq)]
pub struct TypeScheme {
    variables: Vec<String>,
    body: TierkreisType,
}

impl TypeScheme {
    pub fn new(variables: Vec<String>, body: TierkreisType) -> Self {
        Self { variables, body }
    }

    pub fn monomorphic(body: TierkreisType) -> Self {
        Self::new(Vec::new(), body)
    }

    pub fn variables(&self) -> &[String] {
        &self.variables
    }

    pub fn body(&self) -> &TierkreisType {
        &self.body
    }

    pub fn is_polymorphic(&self) -> bool {
        !self.variables.is_empty()
    }

    pub fn to_proto(&self) -> pg::TypeScheme {
        pg::TypeScheme {
            variables: self
                .variables
                .iter()
                .map(|name| pg::TypeSchemeVar { name: name.clone() })
                .collect(),
            body: Some(self.body.to_proto()),
        }
    }

    pub fn from_proto(proto: &pg::TypeScheme) -> Result<Self, ValueError> {
        let body: &pg::Type = required_field(&proto.body, "TypeScheme", "body")?;
        Ok(Self {
            variables: proto.variables.iter().map(|var| var.name.clone()).collect(),
            body: TierkreisType::from_proto(body)?,
        })
    }
}

impl fmt::Display for TypeScheme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if !self.variables.is_empty() {
            write!(f, "forall {}. ", self.variables.join(", "))?;
        }
        write!(f, "{}", self.body)
    }
}

/// Struct names and their field rows, used to resolve [`TierkreisType::Alias`].
#[derive(Clone, Debug, Default, PartialEq)]
pub struct NamedStructs {
    structs: BTreeMap<String, Row>,
}

impl NamedStructs {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a struct, returning the previous definition under that name.
    pub fn register(&mut self, name: impl Into<String>, row: Row) -> Option<Row> {
        self.structs.insert(name.into(), row)
    }

    pub fn get(&self, name: &str) -> Option<&Row> {
        self.structs.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.structs.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.structs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.structs.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Row)> {
        self.structs.iter()
    }

    pub fn extend(&mut self, other: NamedStructs) {
        self.structs.extend(other.structs);
    }
}
