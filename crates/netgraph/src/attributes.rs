//! Attribute resolution: decides per node whether it is ready to compile,
//! parses its declared input shape and exposes typed attribute access to
//! the emitter.

use std::collections::BTreeMap;

use crate::errors::{CompileError, Result};
use crate::graph::GraphModel;
use crate::types::{AttrValue, NodeId, NodeKind, NodeRecord};

/// Attribute key carrying the node's declared input shape.
pub const INPUT_SHAPE: &str = "inputShape";

/// Ordered tensor dimensions parsed from an `inputShape` attribute.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShapeHint(Vec<i64>);

impl ShapeHint {
    pub fn new(dims: Vec<i64>) -> Self {
        Self(dims)
    }

    /// Parses text such as `"(32, 10)"`, `"32,10"` or `"4"`.
    ///
    /// Parentheses are stripped wherever they occur, then the remainder is
    /// split on commas. Every component must be an integer, so a trailing
    /// comma is rejected.
    pub fn parse(text: &str) -> Option<Self> {
        let stripped: String = text.chars().filter(|c| *c != '(' && *c != ')').collect();
        stripped
            .split(',')
            .map(|part| part.trim().parse::<i64>().ok())
            .collect::<Option<Vec<_>>>()
            .map(Self)
    }

    pub fn dims(&self) -> &[i64] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Index with Python semantics: negative indices count from the end.
    pub fn dim(&self, index: isize) -> Option<i64> {
        let len = self.0.len() as isize;
        let resolved = if index < 0 { len + index } else { index };
        if resolved < 0 || resolved >= len {
            return None;
        }
        self.0.get(resolved as usize).copied()
    }

    /// `shape[start:]` with Python semantics: a negative start counts from
    /// the end (clamped at zero), a start past the end yields nothing.
    pub fn slice_from(&self, start: i64) -> &[i64] {
        let len = self.0.len() as i64;
        let begin = if start < 0 { (len + start).max(0) } else { start.min(len) };
        &self.0[begin as usize..]
    }
}

/// Why a node was left out of this compile.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SkipReason {
    /// An attribute is still unset in the editor.
    NullAttribute(String),
    /// Non-input node with no declared or inherited input shape.
    MissingShape,
}

impl std::fmt::Display for SkipReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SkipReason::NullAttribute(name) => write!(f, "attribute '{}' is not set", name),
            SkipReason::MissingShape => write!(f, "no input shape declared"),
        }
    }
}

#[derive(Debug)]
pub enum Resolution<'a> {
    Resolved(ResolvedAttributes<'a>),
    Skipped(SkipReason),
}

/// A node's attribute map plus its parsed shape, with typed accessors that
/// report failures against the owning node.
#[derive(Debug, Clone)]
pub struct ResolvedAttributes<'a> {
    node: &'a NodeRecord,
    shape: Option<ShapeHint>,
}

impl<'a> ResolvedAttributes<'a> {
    pub fn id(&self) -> &'a NodeId {
        &self.node.id
    }

    pub fn kind(&self) -> &'a NodeKind {
        &self.node.kind
    }

    pub fn raw(&self) -> &'a BTreeMap<String, AttrValue> {
        &self.node.data
    }

    pub fn shape(&self) -> Option<&ShapeHint> {
        self.shape.as_ref()
    }

    pub fn get(&self, name: &str) -> Option<&'a AttrValue> {
        self.node.data.get(name)
    }

    pub fn require(&self, name: &str) -> Result<&'a AttrValue> {
        self.get(name).ok_or_else(|| CompileError::MissingAttribute {
            node: self.node.id.clone(),
            kind: self.node.kind.to_string(),
            attribute: name.to_string(),
        })
    }

    pub fn int(&self, name: &str) -> Result<i64> {
        let value = self.require(name)?;
        value
            .as_i64()
            .ok_or_else(|| self.invalid(name, format!("must be an integer, got {}", value.kind_name())))
    }

    /// Boolean flag that falls back to `default` when absent.
    pub fn flag_or(&self, name: &str, default: bool) -> Result<bool> {
        match self.get(name) {
            None => Ok(default),
            Some(value) => value
                .as_bool()
                .ok_or_else(|| self.invalid(name, format!("must be a boolean, got {}", value.kind_name()))),
        }
    }

    /// A dimension-order attribute: either a string with one character per
    /// dimension (`"bct"`) or a list of dimension names.
    pub fn dimension_order(&self, name: &str) -> Result<Vec<String>> {
        match self.require(name)? {
            AttrValue::Text(text) => Ok(text.chars().map(String::from).collect()),
            AttrValue::List(items) => items
                .iter()
                .map(|item| match item {
                    AttrValue::Text(s) => Ok(s.clone()),
                    AttrValue::Int(n) => Ok(n.to_string()),
                    other => Err(self.invalid(
                        name,
                        format!("contains a {} where a dimension name was expected", other.kind_name()),
                    )),
                })
                .collect(),
            other => Err(self.invalid(
                name,
                format!("must be a string or list, got {}", other.kind_name()),
            )),
        }
    }

    /// Shape dimension at `index` (Python indexing). A shape too short for
    /// the construct is an emission failure, not a caller error.
    pub fn shape_dim(&self, index: isize) -> Result<i64> {
        let shape = self.shape.as_ref().ok_or_else(|| {
            CompileError::Internal(format!(
                "node {} ({}) has no input shape",
                self.node.id, self.node.kind
            ))
        })?;
        shape.dim(index).ok_or_else(|| {
            CompileError::Internal(format!(
                "node {} ({}): shape index {} out of range for shape {:?}",
                self.node.id,
                self.node.kind,
                index,
                shape.dims()
            ))
        })
    }

    pub fn invalid(&self, name: &str, reason: impl Into<String>) -> CompileError {
        CompileError::InvalidAttribute {
            node: self.node.id.clone(),
            attribute: name.to_string(),
            reason: reason.into(),
        }
    }
}

/// Attributes each construct reads when emitted.
pub fn required_attributes(kind: &NodeKind) -> &'static [&'static str] {
    match kind {
        NodeKind::Linear => &["numNeurons", "bias"],
        NodeKind::Conv1d | NodeKind::Conv2d => {
            &["numFilters", "kernelSize", "stride", "padding", "dilation"]
        }
        NodeKind::MaxPool1d | NodeKind::MaxPool2d => &["kernelSize", "stride", "padding", "dilation"],
        NodeKind::LayerNorm => &["normalizedShape", "eps", "elementwiseAffine"],
        NodeKind::BatchNorm1d | NodeKind::BatchNorm2d => {
            &["eps", "momentum", "affine", "track_running_stats"]
        }
        NodeKind::Dropout | NodeKind::Dropout1d | NodeKind::Dropout2d => &["p"],
        NodeKind::Lstm | NodeKind::Gru => &["hiddenSize", "numLayers", "dropout", "bidirectional"],
        NodeKind::Flatten => &["flattenStart", "flattenEnd"],
        NodeKind::Concat => &["dim"],
        NodeKind::Permute => &["inputShapeOrder", "outputShapeOrder"],
        _ => &[],
    }
}

#[derive(Debug, Default)]
pub struct AttributeResolver;

impl AttributeResolver {
    pub fn new() -> Self {
        Self
    }

    /// Resolves every node in `order`. A node without a declared shape
    /// inherits the shape of its first input-like parent, since input
    /// nodes pass their declared tensor through unchanged.
    pub fn resolve_all<'a>(&self, graph: &'a GraphModel, order: &[usize]) -> Result<Vec<Resolution<'a>>> {
        let mut resolved: Vec<Option<Resolution<'a>>> = (0..graph.len()).map(|_| None).collect();

        for &idx in order {
            let inherited = graph.predecessors(idx).iter().find_map(|&parent| match &resolved[parent] {
                Some(Resolution::Resolved(attrs)) if attrs.kind().is_input() => attrs.shape().cloned(),
                _ => None,
            });
            resolved[idx] = Some(self.resolve(graph.node(idx), inherited)?);
        }

        resolved
            .into_iter()
            .enumerate()
            .map(|(idx, resolution)| {
                resolution.ok_or_else(|| {
                    CompileError::Internal(format!("node {} missing from schedule", graph.node(idx).id))
                })
            })
            .collect()
    }

    pub fn resolve<'a>(&self, node: &'a NodeRecord, inherited: Option<ShapeHint>) -> Result<Resolution<'a>> {
        if let Some((name, _)) = node.data.iter().find(|(_, value)| value.is_null()) {
            return Ok(Resolution::Skipped(SkipReason::NullAttribute(name.clone())));
        }

        let shape = Self::parse_shape(node)?.or(inherited);
        if shape.is_none() && !node.kind.is_input() {
            return Ok(Resolution::Skipped(SkipReason::MissingShape));
        }

        for attribute in required_attributes(&node.kind) {
            if !node.data.contains_key(*attribute) {
                return Err(CompileError::MissingAttribute {
                    node: node.id.clone(),
                    kind: node.kind.to_string(),
                    attribute: attribute.to_string(),
                });
            }
        }

        Ok(Resolution::Resolved(ResolvedAttributes { node, shape }))
    }

    fn parse_shape(node: &NodeRecord) -> Result<Option<ShapeHint>> {
        let invalid = |text: String| CompileError::InvalidShape {
            node: node.id.clone(),
            text,
        };

        match node.data.get(INPUT_SHAPE) {
            None => Ok(None),
            Some(AttrValue::Text(text)) if text.is_empty() => Ok(None),
            Some(AttrValue::Text(text)) => ShapeHint::parse(text)
                .map(Some)
                .ok_or_else(|| invalid(text.clone())),
            Some(AttrValue::Int(n)) => Ok(Some(ShapeHint::new(vec![*n]))),
            Some(AttrValue::List(items)) => items
                .iter()
                .map(AttrValue::as_i64)
                .collect::<Option<Vec<_>>>()
                .map(|dims| Some(ShapeHint::new(dims)))
                .ok_or_else(|| invalid(format!("{:?}", items))),
            Some(other) => Err(invalid(format!("{:?}", other))),
        }
    }
}
