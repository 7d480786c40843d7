use content_indexer_common::{FieldValue, ResolvedValue};
use content_indexer_storage::{ContentNode, Property, StoreError, Value};
use moka::sync::Cache;
use std::collections::{BTreeSet, HashSet};
use std::sync::Arc;
use tracing::{error, warn};

pub const FOLDER_TYPE: &str = "hippostd:folder";
pub const HANDLE_TYPE: &str = "hippo:handle";
pub const AVAILABILITY_PROPERTY: &str = "hippo:availability";
/// Property path resolved to the node's stable document identity
pub const IDENTITY_PATH: &str = "jcr:uuid";

const LIVE: &str = "live";
const PATH_SEPARATOR: char = '/';

/// Primary type plus all of its supertypes
pub type NodeTypeSet = Arc<HashSet<String>>;

/// Answers type, publication and property questions about repository nodes.
///
/// Never fails: repository errors are logged and mapped to the conservative answer,
/// so a traversal can always move past a broken node.
pub struct NodeClassifier {
    node_types: Cache<String, NodeTypeSet>,
}

impl Default for NodeClassifier {
    fn default() -> Self {
        Self::new()
    }
}

impl NodeClassifier {
    pub fn new() -> Self {
        Self {
            node_types: Cache::builder().build(),
        }
    }

    /// Type names of a node, memoized per primary type
    pub fn types_of<N: ContentNode>(&self, node: &N) -> NodeTypeSet {
        let primary = match node.primary_type() {
            Ok(primary) => primary,
            Err(e) => {
                error!("Failed to retrieve node type at {}: {}", node.path(), e);
                return NodeTypeSet::default();
            }
        };

        let computed = self.node_types.try_get_with(primary.clone(), || {
            let mut types: HashSet<String> = node.supertypes()?.into_iter().collect();
            types.insert(primary);
            Ok::<_, StoreError>(Arc::new(types))
        });

        computed.unwrap_or_else(|e| {
            error!("Failed to retrieve node (super) types at {}: {}", node.path(), e);
            NodeTypeSet::default()
        })
    }

    pub fn is_folder<'a, N: ContentNode>(&self, node: impl Into<Option<&'a N>>) -> bool {
        self.has_type(node.into(), FOLDER_TYPE)
    }

    pub fn is_handle<'a, N: ContentNode>(&self, node: impl Into<Option<&'a N>>) -> bool {
        self.has_type(node.into(), HANDLE_TYPE)
    }

    fn has_type<N: ContentNode>(&self, node: Option<&N>, node_type: &str) -> bool {
        node.is_some_and(|n| self.types_of(n).contains(node_type))
    }

    pub fn matches_any_type<'a, N: ContentNode>(
        &self,
        node: impl Into<Option<&'a N>>,
        type_names: &BTreeSet<String>,
    ) -> bool {
        match node.into() {
            Some(node) if !type_names.is_empty() => {
                let types = self.types_of(node);
                type_names.iter().any(|name| types.contains(name))
            }
            _ => false,
        }
    }

    /// Published unless an availability marker exists without a `live` entry
    pub fn is_published<'a, N: ContentNode>(&self, node: impl Into<Option<&'a N>>) -> bool {
        let Some(node) = node.into() else {
            return false;
        };
        match node.property(AVAILABILITY_PROPERTY) {
            Ok(None) => true,
            Ok(Some(availability)) => availability
                .values()
                .iter()
                .any(|value| value.as_str() == Some(LIVE)),
            Err(e) => {
                error!(
                    "Failed to retrieve property {} for node at {}: {}",
                    AVAILABILITY_PROPERTY,
                    node.path(),
                    e
                );
                false
            }
        }
    }

    /// Property at `path`; each segment but the last names a child node
    pub fn resolve_property<N: ContentNode>(&self, node: &N, path: &str) -> Option<Property> {
        let mut segments: Vec<&str> = path
            .trim_matches(PATH_SEPARATOR)
            .split(PATH_SEPARATOR)
            .filter(|segment| !segment.is_empty())
            .collect();
        let name = segments.pop()?;

        let mut current = node.clone();
        for segment in segments {
            match current.child(segment) {
                Ok(Some(child)) => current = child,
                Ok(None) => return None,
                Err(e) => {
                    error!(
                        "Failed to retrieve property {} for node at {}: {}",
                        path,
                        node.path(),
                        e
                    );
                    return None;
                }
            }
        }

        current.property(name).unwrap_or_else(|e| {
            error!(
                "Failed to retrieve property {} for node at {}: {}",
                path,
                node.path(),
                e
            );
            None
        })
    }

    /// Field value for `path`, `None` when nothing indexable is found
    pub fn read_value<'a, N: ContentNode>(
        &self,
        node: impl Into<Option<&'a N>>,
        path: &str,
    ) -> Option<ResolvedValue> {
        let node = node.into()?;
        if path.trim().is_empty() {
            return None;
        }

        if path == IDENTITY_PATH {
            if let Some(identifier) = self.stable_identifier(node) {
                return Some(ResolvedValue::Single(FieldValue::String(identifier)));
            }
        }

        match self.resolve_property(node, path)? {
            Property::Multiple(values) => {
                let coerced: Vec<FieldValue> = values.iter().filter_map(to_field_value).collect();
                (!coerced.is_empty()).then_some(ResolvedValue::Multiple(coerced))
            }
            Property::Single(value) => to_field_value(&value).map(ResolvedValue::Single),
        }
    }

    /// Identifier of the enclosing handle, which survives edits of the document variant
    pub fn stable_identifier<N: ContentNode>(&self, node: &N) -> Option<String> {
        let preferred = node.parent().and_then(|parent| match parent {
            Some(handle) if self.is_handle(&handle) => handle.identifier(),
            _ => node.identifier(),
        });

        match preferred {
            Ok(identifier) => Some(identifier),
            Err(e) => {
                error!("Failed to retrieve the handle identifier for node {}: {}", node.path(), e);
                match node.identifier() {
                    Ok(identifier) => Some(identifier),
                    Err(e) => {
                        error!("Failed to retrieve the identifier for node {}: {}", node.path(), e);
                        None
                    }
                }
            }
        }
    }
}

fn to_field_value(value: &Value) -> Option<FieldValue> {
    match value {
        Value::String(s) => {
            let trimmed = s.trim();
            (!trimmed.is_empty()).then(|| FieldValue::String(trimmed.to_string()))
        }
        Value::Name(name) => Some(FieldValue::String(name.clone())),
        Value::Boolean(b) => Some(FieldValue::Boolean(*b)),
        Value::Date(date) => Some(FieldValue::Date(*date)),
        Value::Decimal(decimal) => Some(FieldValue::Decimal(decimal.clone())),
        Value::Double(double) => Some(FieldValue::Double(*double)),
        Value::Long(long) => Some(FieldValue::Long(*long)),
        other => {
            warn!("Unhandled property type {}", other.kind());
            None
        }
    }
}
