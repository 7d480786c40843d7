//! Repository backed by a JSON export of the content tree.
//!
//! ```json
//! {
//!   "types": { "site:news": ["hippo:document"], "hippo:document": [] },
//!   "root": {
//!     "primaryType": "rep:root",
//!     "children": [
//!       { "name": "content", "primaryType": "nt:unstructured", "children": [] }
//!     ]
//!   }
//! }
//! ```
//!
//! Property values are plain JSON scalars (string, boolean, integer, float), arrays of
//! them for multi-valued properties, or `{"type": "Date", "value": "..."}` /
//! `{"type": "Long", "values": [...]}` for an explicit kind.

use crate::error::{StoreError, StoreResult};
use crate::repository::{ConfigurationQuery, ContentNode, Property, Repository, Session, Value};
use chrono::DateTime;
use serde::Deserialize;
use serde_json::Map;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::debug;

#[derive(Debug, Deserialize)]
struct SnapshotFile {
    #[serde(default)]
    types: HashMap<String, Vec<String>>,
    root: RawNode,
}

#[derive(Debug, Deserialize)]
struct RawNode {
    #[serde(default)]
    name: String,
    #[serde(rename = "primaryType")]
    primary_type: String,
    #[serde(default)]
    id: Option<String>,
    #[serde(default)]
    properties: Map<String, serde_json::Value>,
    #[serde(default)]
    children: Vec<RawNode>,
}

#[derive(Debug)]
struct NodeData {
    name: String,
    path: String,
    id: String,
    primary_type: String,
    properties: BTreeMap<String, Property>,
    children: Vec<usize>,
    parent: Option<usize>,
}

#[derive(Debug)]
struct Tree {
    nodes: Vec<NodeData>,
    /// Transitive supertypes per declared type
    supertypes: HashMap<String, Vec<String>>,
}

impl Tree {
    fn parse(json: &str) -> StoreResult<Self> {
        let file: SnapshotFile = serde_json::from_str(json)?;
        Self::build(file)
    }

    fn build(file: SnapshotFile) -> StoreResult<Self> {
        let mut tree = Tree {
            nodes: Vec::new(),
            supertypes: close_supertypes(&file.types),
        };
        tree.insert(file.root, None)?;
        Ok(tree)
    }

    // Pre-order insertion keeps `nodes` in document order
    fn insert(&mut self, raw: RawNode, parent: Option<usize>) -> StoreResult<usize> {
        let path = match parent {
            None => "/".to_string(),
            Some(p) if self.nodes[p].path == "/" => format!("/{}", raw.name),
            Some(p) => format!("{}/{}", self.nodes[p].path, raw.name),
        };

        let mut properties = BTreeMap::new();
        for (name, value) in raw.properties {
            let property = parse_property(&value).map_err(|reason| StoreError::InvalidProperty {
                path: path.clone(),
                property: name.clone(),
                reason,
            })?;
            properties.insert(name, property);
        }

        let index = self.nodes.len();
        self.nodes.push(NodeData {
            name: raw.name,
            id: raw.id.unwrap_or_else(|| path.clone()),
            path,
            primary_type: raw.primary_type,
            properties,
            children: Vec::new(),
            parent,
        });

        for child in raw.children {
            let child_index = self.insert(child, Some(index))?;
            self.nodes[index].children.push(child_index);
        }
        Ok(index)
    }

    fn is_of_type(&self, index: usize, node_type: &str) -> bool {
        let primary = &self.nodes[index].primary_type;
        primary == node_type
            || self
                .supertypes
                .get(primary)
                .is_some_and(|supers| supers.iter().any(|s| s == node_type))
    }
}

fn close_supertypes(declared: &HashMap<String, Vec<String>>) -> HashMap<String, Vec<String>> {
    declared
        .keys()
        .map(|name| {
            let mut seen = BTreeSet::new();
            let mut pending: Vec<&String> = declared[name].iter().collect();
            while let Some(next) = pending.pop() {
                if next != name && seen.insert(next.clone()) {
                    if let Some(more) = declared.get(next) {
                        pending.extend(more.iter());
                    }
                }
            }
            (name.clone(), seen.into_iter().collect())
        })
        .collect()
}

fn parse_property(value: &serde_json::Value) -> Result<Property, String> {
    match value {
        serde_json::Value::Array(items) => items
            .iter()
            .map(parse_scalar)
            .collect::<Result<Vec<_>, _>>()
            .map(Property::Multiple),
        serde_json::Value::Object(object) => parse_typed(object),
        scalar => parse_scalar(scalar).map(Property::Single),
    }
}

fn parse_scalar(value: &serde_json::Value) -> Result<Value, String> {
    match value {
        serde_json::Value::String(s) => Ok(Value::String(s.clone())),
        serde_json::Value::Bool(b) => Ok(Value::Boolean(*b)),
        serde_json::Value::Number(n) => match n.as_i64() {
            Some(long) => Ok(Value::Long(long)),
            None => n
                .as_f64()
                .map(Value::Double)
                .ok_or_else(|| format!("unsupported number {}", n)),
        },
        other => Err(format!("unsupported value {}", other)),
    }
}

fn parse_typed(object: &Map<String, serde_json::Value>) -> Result<Property, String> {
    let kind = object
        .get("type")
        .and_then(|t| t.as_str())
        .ok_or_else(|| "typed property without a \"type\"".to_string())?;

    if let Some(values) = object.get("values") {
        let items = values
            .as_array()
            .ok_or_else(|| "\"values\" must be an array".to_string())?;
        return items
            .iter()
            .map(|item| parse_kind(kind, item))
            .collect::<Result<Vec<_>, _>>()
            .map(Property::Multiple);
    }

    let value = object
        .get("value")
        .ok_or_else(|| "typed property without \"value\" or \"values\"".to_string())?;
    parse_kind(kind, value).map(Property::Single)
}

fn parse_kind(kind: &str, value: &serde_json::Value) -> Result<Value, String> {
    let text = || match value {
        serde_json::Value::String(s) => Ok(s.clone()),
        serde_json::Value::Number(n) => Ok(n.to_string()),
        serde_json::Value::Bool(b) => Ok(b.to_string()),
        other => Err(format!("expected a {} value, got {}", kind, other)),
    };

    match kind.to_ascii_lowercase().as_str() {
        "string" => text().map(Value::String),
        "name" => text().map(Value::Name),
        "boolean" => value
            .as_bool()
            .map(Value::Boolean)
            .ok_or_else(|| format!("expected a boolean, got {}", value)),
        "date" => {
            let raw = text()?;
            DateTime::parse_from_rfc3339(&raw)
                .map(Value::Date)
                .map_err(|e| format!("invalid date {}: {}", raw, e))
        }
        "decimal" => text().map(Value::Decimal),
        "double" => value
            .as_f64()
            .map(Value::Double)
            .ok_or_else(|| format!("expected a double, got {}", value)),
        "long" => value
            .as_i64()
            .map(Value::Long)
            .ok_or_else(|| format!("expected a long, got {}", value)),
        "binary" => text().map(|s| Value::Binary(s.into_bytes())),
        "reference" | "weakreference" => text().map(Value::Reference),
        "path" => text().map(Value::Path),
        "uri" => text().map(Value::Uri),
        other => Err(format!("unknown property type {}", other)),
    }
}

/// Node of a loaded snapshot
#[derive(Debug, Clone)]
pub struct SnapshotNode {
    tree: Arc<Tree>,
    index: usize,
}

impl SnapshotNode {
    fn data(&self) -> &NodeData {
        &self.tree.nodes[self.index]
    }

    fn at(&self, index: usize) -> Self {
        Self {
            tree: Arc::clone(&self.tree),
            index,
        }
    }

    pub fn name(&self) -> &str {
        &self.data().name
    }
}

impl ContentNode for SnapshotNode {
    fn path(&self) -> String {
        self.data().path.clone()
    }

    fn identifier(&self) -> StoreResult<String> {
        Ok(self.data().id.clone())
    }

    fn primary_type(&self) -> StoreResult<String> {
        Ok(self.data().primary_type.clone())
    }

    fn supertypes(&self) -> StoreResult<Vec<String>> {
        Ok(self
            .tree
            .supertypes
            .get(&self.data().primary_type)
            .cloned()
            .unwrap_or_default())
    }

    fn children(&self) -> StoreResult<Vec<Self>> {
        Ok(self.data().children.iter().map(|&i| self.at(i)).collect())
    }

    fn child(&self, name: &str) -> StoreResult<Option<Self>> {
        Ok(self
            .data()
            .children
            .iter()
            .find(|&&i| self.tree.nodes[i].name == name)
            .map(|&i| self.at(i)))
    }

    fn parent(&self) -> StoreResult<Option<Self>> {
        Ok(self.data().parent.map(|i| self.at(i)))
    }

    fn property(&self, name: &str) -> StoreResult<Option<Property>> {
        Ok(self.data().properties.get(name).cloned())
    }
}

#[derive(Debug)]
pub struct SnapshotSession {
    tree: Arc<Tree>,
    live: AtomicBool,
}

impl SnapshotSession {
    fn ensure_live(&self) -> StoreResult<()> {
        if self.is_live() {
            Ok(())
        } else {
            Err(StoreError::SessionClosed)
        }
    }

    fn root(&self) -> SnapshotNode {
        SnapshotNode {
            tree: Arc::clone(&self.tree),
            index: 0,
        }
    }
}

impl Session for SnapshotSession {
    type Node = SnapshotNode;

    fn query(&self, query: &ConfigurationQuery) -> StoreResult<Vec<SnapshotNode>> {
        self.ensure_live()?;
        let root = self.root();
        Ok((0..self.tree.nodes.len())
            .filter(|&i| {
                let node = &self.tree.nodes[i];
                node.path.starts_with(&query.path_prefix)
                    && self.tree.is_of_type(i, &query.node_type)
                    && query
                        .any_of_properties
                        .iter()
                        .any(|p| node.properties.contains_key(p))
            })
            .map(|i| root.at(i))
            .collect())
    }

    fn node_at(&self, path: &str) -> StoreResult<Option<SnapshotNode>> {
        self.ensure_live()?;
        let mut current = self.root();
        for segment in path.split('/').filter(|s| !s.is_empty()) {
            match current.child(segment)? {
                Some(next) => current = next,
                None => return Ok(None),
            }
        }
        Ok(Some(current))
    }

    fn is_live(&self) -> bool {
        self.live.load(Ordering::SeqCst)
    }

    fn logout(&self) {
        self.live.store(false, Ordering::SeqCst);
    }
}

#[derive(Debug, Clone)]
enum Source {
    File(PathBuf),
    Loaded(Arc<Tree>),
}

/// Repository serving sessions over a JSON snapshot
#[derive(Debug, Clone)]
pub struct SnapshotRepository {
    source: Source,
}

impl SnapshotRepository {
    /// Repository reading `path` on every login, so a missing or half-written
    /// export is reported as unavailable until it becomes readable
    pub fn open(path: impl AsRef<Path>) -> Self {
        Self {
            source: Source::File(path.as_ref().to_path_buf()),
        }
    }

    pub fn from_json(json: &str) -> StoreResult<Self> {
        Ok(Self {
            source: Source::Loaded(Arc::new(Tree::parse(json)?)),
        })
    }

    pub fn from_value(value: serde_json::Value) -> StoreResult<Self> {
        let file: SnapshotFile = serde_json::from_value(value)?;
        Ok(Self {
            source: Source::Loaded(Arc::new(Tree::build(file)?)),
        })
    }
}

impl Repository for SnapshotRepository {
    type Session = SnapshotSession;

    fn login(&self) -> StoreResult<SnapshotSession> {
        let tree = match &self.source {
            Source::Loaded(tree) => Arc::clone(tree),
            Source::File(path) => {
                let json = std::fs::read_to_string(path).map_err(|e| {
                    StoreError::Unavailable(format!("cannot read {}: {}", path.display(), e))
                })?;
                let tree = Tree::parse(&json)?;
                debug!("Loaded {} nodes from {}", tree.nodes.len(), path.display());
                Arc::new(tree)
            }
        };
        Ok(SnapshotSession {
            tree,
            live: AtomicBool::new(true),
        })
    }
}
