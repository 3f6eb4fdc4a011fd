// StateDict: Named parameter tree for export and import
//
// Every trainable operation can describe its parameters as a StateDict and
// rebuild itself from one. A leaf (Weights, Embeddings) fills `weights` with
// its own parameter tensor and leaves `children` empty; a composite would
// nest one child per sub-operation under its name.
//
// The tensors are shared, not copied: mutating an exported dict's tensor
// mutates the live parameter.
//
// FLAT FORM:
//
//   Checkpoints store a flat `path -> tensor` map. A node's own parameter
//   lives at `<prefix>weights`, a child's subtree under `<prefix><name>/`:
//
//     weights                  root parameter
//     encoder/weights          parameter of child "encoder"
//     encoder/table/weights    grandchild "table" of "encoder"

use std::collections::BTreeMap;

use w2v_core::{Element, Error, Matrix, Result};

/// Path segment naming a node's own parameter in the flat form.
pub const WEIGHTS_KEY: &str = "weights";

/// Parameter tree of one operation.
#[derive(Clone, Debug)]
pub struct StateDict<T: Element> {
    /// The node's own parameter, if it has one.
    pub weights: Option<Matrix<T>>,
    /// Named sub-dictionaries of nested operations.
    pub children: BTreeMap<String, StateDict<T>>,
}

impl<T: Element> Default for StateDict<T> {
    fn default() -> Self {
        StateDict {
            weights: None,
            children: BTreeMap::new(),
        }
    }
}

impl<T: Element> StateDict<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Leaf dictionary holding a single parameter tensor.
    pub fn leaf(weights: Matrix<T>) -> Self {
        StateDict {
            weights: Some(weights),
            children: BTreeMap::new(),
        }
    }

    /// Builder-style child insertion.
    pub fn with_child(mut self, name: impl Into<String>, child: StateDict<T>) -> Self {
        self.children.insert(name.into(), child);
        self
    }

    pub fn is_leaf(&self) -> bool {
        self.children.is_empty()
    }

    /// Total number of parameter tensors in the tree.
    pub fn num_tensors(&self) -> usize {
        let own = usize::from(self.weights.is_some());
        own + self.children.values().map(StateDict::num_tensors).sum::<usize>()
    }

    /// Flatten the tree into `path -> tensor`, sorted by path.
    pub fn flatten(&self) -> BTreeMap<String, Matrix<T>> {
        let mut out = BTreeMap::new();
        self.flatten_into("", &mut out);
        out
    }

    fn flatten_into(&self, prefix: &str, out: &mut BTreeMap<String, Matrix<T>>) {
        if let Some(w) = &self.weights {
            out.insert(format!("{prefix}{WEIGHTS_KEY}"), w.clone());
        }
        for (name, child) in &self.children {
            child.flatten_into(&format!("{prefix}{name}/"), out);
        }
    }

    /// Rebuild a tree from its flat form.
    ///
    /// Every path must end in `weights`; empty segments are rejected.
    pub fn from_flat(entries: impl IntoIterator<Item = (String, Matrix<T>)>) -> Result<Self> {
        let mut root = StateDict::new();
        for (path, tensor) in entries {
            let mut segments: Vec<&str> = path.split('/').collect();
            if segments.pop() != Some(WEIGHTS_KEY) {
                return Err(Error::InvalidStateDict(format!(
                    "key {path:?} does not name a weights entry"
                )));
            }
            if segments.iter().any(|s| s.is_empty()) {
                return Err(Error::InvalidStateDict(format!(
                    "key {path:?} has an empty path segment"
                )));
            }

            let mut node = &mut root;
            for seg in segments {
                node = node.children.entry(seg.to_string()).or_default();
            }
            if node.weights.is_some() {
                return Err(Error::InvalidStateDict(format!("duplicate key {path:?}")));
            }
            node.weights = Some(tensor);
        }
        Ok(root)
    }

    /// The single parameter of a leaf dictionary, as loaded by leaf
    /// operations.
    pub(crate) fn leaf_weights(&self, op: &str) -> Result<&Matrix<T>> {
        if !self.children.is_empty() {
            return Err(Error::InvalidStateDict(format!(
                "{op} is a leaf but the dict has {} children",
                self.children.len()
            )));
        }
        self.weights
            .as_ref()
            .ok_or_else(|| Error::InvalidStateDict(format!("{op} dict has no weights")))
    }
}
