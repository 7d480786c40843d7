//! Depth-first traversal of the documents tree yielding one search document per indexable node.

use crate::classifier::NodeClassifier;
use crate::configuration::Filter;
use content_indexer_common::Document;
use content_indexer_storage::{ContentNode, Session};
use tracing::{debug, error};

/// Lazily walks the tree below a root node.
///
/// Folders and handles are descended into; any other node is mapped to a document
/// when its type is selected by the filter and it is published. Nodes whose children
/// cannot be read are logged and skipped together with their subtree.
pub struct DocumentWalker<'a, N: ContentNode> {
    classifier: &'a NodeClassifier,
    filter: &'a Filter,
    stack: Vec<std::vec::IntoIter<N>>,
}

impl<'a, N: ContentNode> DocumentWalker<'a, N> {
    pub fn new(classifier: &'a NodeClassifier, filter: &'a Filter, root: &N) -> Self {
        let mut walker = Self {
            classifier,
            filter,
            stack: Vec::new(),
        };
        walker.descend(root);
        walker
    }

    /// Walker over the node at `path`; yields nothing if it cannot be read
    pub fn from_path<S>(session: &S, path: &str, classifier: &'a NodeClassifier, filter: &'a Filter) -> Self
    where
        S: Session<Node = N>,
    {
        match session.node_at(path) {
            Ok(Some(root)) => Self::new(classifier, filter, &root),
            Ok(None) => {
                error!("Failed to retrieve (child) nodes at {}: node not found", path);
                Self::empty(classifier, filter)
            }
            Err(e) => {
                error!("Failed to retrieve (child) nodes at {}: {}", path, e);
                Self::empty(classifier, filter)
            }
        }
    }

    fn empty(classifier: &'a NodeClassifier, filter: &'a Filter) -> Self {
        Self {
            classifier,
            filter,
            stack: Vec::new(),
        }
    }

    fn descend(&mut self, node: &N) {
        match node.children() {
            Ok(children) => self.stack.push(children.into_iter()),
            Err(e) => error!("Failed to retrieve (child) nodes at {}: {}", node.path(), e),
        }
    }

    fn is_indexable(&self, node: &N) -> bool {
        self.classifier.matches_any_type(node, self.filter.node_types())
            && self.classifier.is_published(node)
    }
}

impl<N: ContentNode> Iterator for DocumentWalker<'_, N> {
    type Item = Document;

    fn next(&mut self) -> Option<Document> {
        loop {
            let siblings = self.stack.last_mut()?;
            let Some(node) = siblings.next() else {
                self.stack.pop();
                continue;
            };

            if self.classifier.is_folder(&node) || self.classifier.is_handle(&node) {
                self.descend(&node);
            } else if self.is_indexable(&node) {
                if let Some(document) = build_document(self.classifier, self.filter, &node) {
                    debug!("Document added: {}", document);
                    return Some(document);
                }
            }
        }
    }
}

/// Document holding every filter field that resolves on `node`, `None` if none does
pub fn build_document<N: ContentNode>(
    classifier: &NodeClassifier,
    filter: &Filter,
    node: &N,
) -> Option<Document> {
    debug!("Create document for node {}", node.path());
    let mut document = Document::new();
    for (field_id, property_path) in filter.fields() {
        if let Some(value) = classifier.read_value(node, property_path) {
            document.add_field(field_id.clone(), value);
        }
    }
    (!document.is_empty()).then_some(document)
}
