//! Indexing filter read from configuration records stored in the repository.

use content_indexer_storage::{ConfigurationQuery, ContentNode, Property, Session, StoreResult};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::fmt;
use tracing::{error, info, warn};

pub const CONFIGURATION_TYPE: &str = "solr:configuration";
pub const CONFIGURATION_ROOT: &str = "/content/";
/// Multi-valued property listing the node types to index
pub const NODE_TYPES_PROPERTY: &str = "solr:node";
/// Multi-valued property listing the property paths to index
pub const FIELDS_PROPERTY: &str = "solr:property";
pub const FIELD_ID_PREFIX: &str = "dynamic_";

/// Node types to index and the field id -> property path mapping used to build documents
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Filter {
    node_types: BTreeSet<String>,
    fields: BTreeMap<String, String>,
}

impl Filter {
    pub fn new(node_types: BTreeSet<String>, fields: BTreeMap<String, String>) -> Self {
        Self { node_types, fields }
    }

    pub fn node_types(&self) -> &BTreeSet<String> {
        &self.node_types
    }

    pub fn fields(&self) -> &BTreeMap<String, String> {
        &self.fields
    }

    /// Usable for a run: something to select, something to map, and a live session to read with
    pub fn is_valid<S: Session>(&self, session: &S) -> bool {
        !self.node_types.is_empty() && !self.fields.is_empty() && session.is_live()
    }
}

impl fmt::Display for Filter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let nodes: Vec<&str> = self.node_types.iter().map(String::as_str).collect();
        let properties: Vec<String> = self
            .fields
            .iter()
            .map(|(id, path)| format!("{}={}", id, path))
            .collect();
        write!(
            f,
            "Filter[nodes = [{}], properties = {{{}}}]",
            nodes.join(", "),
            properties.join(", ")
        )
    }
}

fn is_field_id_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_'
}

/// `dynamic_` followed by the property path with every char outside `[A-Za-z0-9_]` replaced by `_`
pub fn sanitize_field_id(property_path: &str) -> String {
    let body: String = property_path
        .chars()
        .map(|c| if is_field_id_char(c) { c } else { '_' })
        .collect();
    format!("{}{}", FIELD_ID_PREFIX, body)
}

/// Keep the statically configured mappings whose id and path are usable
pub fn sanitize_extra_mappings(raw: &HashMap<String, String>) -> BTreeMap<String, String> {
    let mut valid = BTreeMap::new();
    for (id, path) in raw {
        let trimmed_id = id.trim();
        let trimmed_path = path.trim();
        if trimmed_id.is_empty()
            || trimmed_path.is_empty()
            || !trimmed_id.chars().all(is_field_id_char)
        {
            warn!("Skip invalid field mapping: {}={}", id, path);
        } else {
            valid.insert(trimmed_id.to_string(), trimmed_path.to_string());
        }
    }
    valid
}

pub fn configuration_query() -> ConfigurationQuery {
    ConfigurationQuery {
        node_type: CONFIGURATION_TYPE.to_string(),
        path_prefix: CONFIGURATION_ROOT.to_string(),
        any_of_properties: vec![NODE_TYPES_PROPERTY.to_string(), FIELDS_PROPERTY.to_string()],
    }
}

/// Build the filter from every configuration record, on top of `extra_fields`.
///
/// Repository failures are logged and leave the filter with whatever was read before them.
/// When two records map the same field id, the one returned last by the query wins.
pub fn load<S: Session>(session: &S, extra_fields: &BTreeMap<String, String>) -> Filter {
    let mut node_types = BTreeSet::new();
    let mut fields = extra_fields.clone();

    if let Err(e) = read_records(session, &mut node_types, &mut fields) {
        error!("An error occurred while loading the indexing configuration: {}", e);
    }

    Filter::new(node_types, fields)
}

fn read_records<S: Session>(
    session: &S,
    node_types: &mut BTreeSet<String>,
    fields: &mut BTreeMap<String, String>,
) -> StoreResult<()> {
    for record in session.query(&configuration_query())? {
        info!("Loading indexing configuration from node {}", record.path());

        if let Some(property) = record.property(NODE_TYPES_PROPERTY)? {
            node_types.extend(trimmed_values(&property));
        }

        if let Some(property) = record.property(FIELDS_PROPERTY)? {
            for path in trimmed_values(&property) {
                fields.insert(sanitize_field_id(&path), path);
            }
        }
    }
    Ok(())
}

fn trimmed_values(property: &Property) -> impl Iterator<Item = String> + '_ {
    property
        .values()
        .iter()
        .filter_map(|value| value.as_str())
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(String::from)
}
