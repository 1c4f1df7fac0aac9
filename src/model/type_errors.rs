//! Structured type-check failures reported by the runtime.

use super::required_field;
use super::types::TierkreisType;
use super::values::ValueError;
use crate::grpc::proto::graph as pg;
use std::fmt;

#[derive(Clone, Debug, PartialEq)]
pub enum TypeErrorKind {
    /// Two types that had to be equal could not be unified
    Unify {
        expected: TierkreisType,
        found: TierkreisType,
    },
    UnknownFunction(String),
    UnknownType(String),
    Other(String),
}

/// One type mismatch, with the path of graph locations leading to it.
#[derive(Clone, Debug, PartialEq)]
pub struct TierkreisTypeError {
    pub kind: TypeErrorKind,
    pub location: Vec<String>,
}

impl TierkreisTypeError {
    pub fn to_proto(&self) -> pg::TierkreisTypeError {
        use pg::tierkreis_type_error::Error;

        let error = match &self.kind {
            TypeErrorKind::Unify { expected, found } => Error::Unify(pg::UnifyError {
                expected: Some(expected.to_proto()),
                found: Some(found.to_proto()),
            }),
            TypeErrorKind::UnknownFunction(name) => Error::UnknownFunction(name.clone()),
            TypeErrorKind::UnknownType(name) => Error::UnknownType(name.clone()),
            TypeErrorKind::Other(message) => Error::Other(message.clone()),
        };

        pg::TierkreisTypeError {
            error: Some(error),
            location: Some(pg::Location {
                location: self.location.clone(),
            }),
        }
    }

    pub fn from_proto(proto: &pg::TierkreisTypeError) -> Result<Self, ValueError> {
        use pg::tierkreis_type_error::Error;

        let error = proto
            .error
            .as_ref()
            .ok_or(ValueError::MissingTag("TierkreisTypeError"))?;
        let kind = match error {
            Error::Unify(unify) => {
                let expected: &pg::Type = required_field(&unify.expected, "UnifyError", "expected")?;
                let found: &pg::Type = required_field(&unify.found, "UnifyError", "found")?;
                TypeErrorKind::Unify {
                    expected: TierkreisType::from_proto(expected)?,
                    found: TierkreisType::from_proto(found)?,
                }
            }
            Error::UnknownFunction(name) => TypeErrorKind::UnknownFunction(name.clone()),
            Error::UnknownType(name) => TypeErrorKind::UnknownType(name.clone()),
            Error::Other(message) => TypeErrorKind::Other(message.clone()),
        };

        Ok(Self {
            kind,
            location: proto
                .location
                .as_ref()
                .map(|loc| loc.location.clone())
                .unwrap_or_default(),
        })
    }
}

impl fmt::Display for TierkreisTypeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.kind {
            TypeErrorKind::Unify { expected, found } => {
                write!(f, "Expected type {} but found {}", expected, found)?
            }
            TypeErrorKind::UnknownFunction(name) => write!(f, "Unknown function '{}'", name)?,
            TypeErrorKind::UnknownType(name) => write!(f, "Unknown type '{}'", name)?,
            TypeErrorKind::Other(message) => write!(f, "{}", message)?,
        }
        if !self.location.is_empty() {
            write!(f, " at {}", self.location.join("/"))?;
        }
        Ok(())
    }
}

/// Every type error reported for one graph; never collapsed into a single message.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct TierkreisTypeErrors {
    errors: Vec<TierkreisTypeError>,
}

impl TierkreisTypeErrors {
    pub fn new(errors: Vec<TierkreisTypeError>) -> Self {
        Self { errors }
    }

    pub fn errors(&self) -> &[TierkreisTypeError] {
        &self.errors
    }

    pub fn len(&self) -> usize {
        self.errors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, TierkreisTypeError> {
        self.errors.iter()
    }

    pub fn into_vec(self) -> Vec<TierkreisTypeError> {
        self.errors
    }

    pub fn to_proto(&self) -> pg::TypeErrors {
        pg::TypeErrors {
            errors: self.errors.iter().map(TierkreisTypeError::to_proto).collect(),
        }
    }

    pub fn from_proto(proto: &pg::TypeErrors) -> Result<Self, ValueError> {
        let errors = proto
            .errors
            .iter()
            .map(TierkreisTypeError::from_proto)
            .collect::<Result<_, _>>()?;
        Ok(Self { errors })
    }
}

impl fmt::Display for TierkreisTypeErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Found {} type error(s)", self.errors.len())?;
        for error in &self.errors {
            write!(f, "\n  {}", error)?;
        }
        Ok(())
    }
}

impl std::error::Error for TierkreisTypeErrors {}

impl<'a> IntoIterator for &'a TierkreisTypeErrors {
    type Item = &'a TierkreisTypeError;
    type IntoIter = std::slice::Iter<'a, TierkreisTypeError>;

    fn into_iter(self) -> Self::IntoIter {
        self.errors.iter()
    }
}
