//! Content repository seen by the indexer: a session-based, queryable tree of typed nodes.

use crate::error::StoreResult;
use chrono::{DateTime, FixedOffset};
use std::fmt;

/// Kind of a stored property value
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ValueKind {
    String,
    Name,
    Boolean,
    Date,
    Decimal,
    Double,
    Long,
    Binary,
    Reference,
    Path,
    Uri,
}

impl fmt::Display for ValueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ValueKind::String => "String",
            ValueKind::Name => "Name",
            ValueKind::Boolean => "Boolean",
            ValueKind::Date => "Date",
            ValueKind::Decimal => "Decimal",
            ValueKind::Double => "Double",
            ValueKind::Long => "Long",
            ValueKind::Binary => "Binary",
            ValueKind::Reference => "Reference",
            ValueKind::Path => "Path",
            ValueKind::Uri => "URI",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    String(String),
    Name(String),
    Boolean(bool),
    Date(DateTime<FixedOffset>),
    Decimal(String),
    Double(f64),
    Long(i64),
    Binary(Vec<u8>),
    Reference(String),
    Path(String),
    Uri(String),
}

impl Value {
    pub fn kind(&self) -> ValueKind {
        match self {
            Value::String(_) => ValueKind::String,
            Value::Name(_) => ValueKind::Name,
            Value::Boolean(_) => ValueKind::Boolean,
            Value::Date(_) => ValueKind::Date,
            Value::Decimal(_) => ValueKind::Decimal,
            Value::Double(_) => ValueKind::Double,
            Value::Long(_) => ValueKind::Long,
            Value::Binary(_) => ValueKind::Binary,
            Value::Reference(_) => ValueKind::Reference,
            Value::Path(_) => ValueKind::Path,
            Value::Uri(_) => ValueKind::Uri,
        }
    }

    /// Textual content of string-like values
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s)
            | Value::Name(s)
            | Value::Reference(s)
            | Value::Path(s)
            | Value::Uri(s)
            | Value::Decimal(s) => Some(s),
            _ => None,
        }
    }
}

/// A node property, either single- or multi-valued
#[derive(Debug, Clone, PartialEq)]
pub enum Property {
    Single(Value),
    Multiple(Vec<Value>),
}

impl Property {
    pub fn is_multiple(&self) -> bool {
        matches!(self, Property::Multiple(_))
    }

    pub fn values(&self) -> &[Value] {
        match self {
            Property::Single(value) => std::slice::from_ref(value),
            Property::Multiple(values) => values,
        }
    }
}

/// Selects nodes of `node_type` below `path_prefix` carrying at least one of `any_of_properties`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigurationQuery {
    pub node_type: String,
    pub path_prefix: String,
    pub any_of_properties: Vec<String>,
}

/// Read-only handle on a repository node
pub trait ContentNode: Clone + Send + Sync + 'static {
    /// Absolute path, used for logging
    fn path(&self) -> String;

    fn identifier(&self) -> StoreResult<String>;

    fn primary_type(&self) -> StoreResult<String>;

    /// Every supertype of the primary type, transitively
    fn supertypes(&self) -> StoreResult<Vec<String>>;

    fn children(&self) -> StoreResult<Vec<Self>>;

    fn child(&self, name: &str) -> StoreResult<Option<Self>>;

    fn parent(&self) -> StoreResult<Option<Self>>;

    fn property(&self, name: &str) -> StoreResult<Option<Property>>;
}

pub trait Session: Send + Sync + 'static {
    type Node: ContentNode;

    fn query(&self, query: &ConfigurationQuery) -> StoreResult<Vec<Self::Node>>;

    fn node_at(&self, path: &str) -> StoreResult<Option<Self::Node>>;

    /// False once the session has been logged out or lost its connection
    fn is_live(&self) -> bool;

    fn logout(&self);
}

pub trait Repository: Send + Sync + 'static {
    type Session: Session;

    fn login(&self) -> StoreResult<Self::Session>;
}
