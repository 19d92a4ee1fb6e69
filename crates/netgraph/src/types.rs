use std::borrow::Cow;
use std::collections::BTreeMap;
use std::fmt;

use schemars::{json_schema, JsonSchema, Schema, SchemaGenerator};
use serde::{Deserialize, Serialize};

/// Node identifier as sent by the editor.
///
/// The editor emits ids as either strings or integers; both decode to the
/// same textual id so `1` and `"1"` name the same node.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(from = "RawNodeId", into = "String")]
pub struct NodeId(String);

#[derive(Deserialize)]
#[serde(untagged)]
enum RawNodeId {
    Text(String),
    Integer(i64),
}

impl From<RawNodeId> for NodeId {
    fn from(raw: RawNodeId) -> Self {
        match raw {
            RawNodeId::Text(text) => NodeId(text),
            RawNodeId::Integer(n) => NodeId(n.to_string()),
        }
    }
}

impl NodeId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for NodeId {
    fn from(s: &str) -> Self {
        NodeId(s.to_string())
    }
}

impl From<String> for NodeId {
    fn from(s: String) -> Self {
        NodeId(s)
    }
}

impl From<i64> for NodeId {
    fn from(n: i64) -> Self {
        NodeId(n.to_string())
    }
}

impl From<NodeId> for String {
    fn from(id: NodeId) -> Self {
        id.0
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl JsonSchema for NodeId {
    fn schema_name() -> Cow<'static, str> {
        "NodeId".into()
    }

    fn json_schema(_generator: &mut SchemaGenerator) -> Schema {
        json_schema!({
            "type": ["string", "integer"],
            "description": "Node identifier; integers are treated as their decimal text"
        })
    }
}

/// A single attribute value from a node's `data` map.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(untagged)]
pub enum AttrValue {
    /// Attribute not yet configured in the editor
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
    List(Vec<AttrValue>),
}

impl AttrValue {
    pub fn is_null(&self) -> bool {
        matches!(self, AttrValue::Null)
    }

    /// Integer view; integral floats such as `2.0` are accepted.
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            AttrValue::Int(n) => Some(*n),
            AttrValue::Float(f) if f.fract() == 0.0 => Some(*f as i64),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            AttrValue::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            AttrValue::Text(s) => Some(s),
            _ => None,
        }
    }

    /// Short name of the value's kind, for error messages.
    pub fn kind_name(&self) -> &'static str {
        match self {
            AttrValue::Null => "null",
            AttrValue::Bool(_) => "boolean",
            AttrValue::Int(_) => "integer",
            AttrValue::Float(_) => "float",
            AttrValue::Text(_) => "string",
            AttrValue::List(_) => "list",
        }
    }
}

impl From<bool> for AttrValue {
    fn from(b: bool) -> Self {
        AttrValue::Bool(b)
    }
}

impl From<i64> for AttrValue {
    fn from(n: i64) -> Self {
        AttrValue::Int(n)
    }
}

impl From<f64> for AttrValue {
    fn from(f: f64) -> Self {
        AttrValue::Float(f)
    }
}

impl From<&str> for AttrValue {
    fn from(s: &str) -> Self {
        AttrValue::Text(s.to_string())
    }
}

impl From<String> for AttrValue {
    fn from(s: String) -> Self {
        AttrValue::Text(s)
    }
}

/// Parameterized construct families. Each family owns one naming counter,
/// so `conv1d` and `conv2d` nodes share the `conv_N` sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LayerFamily {
    Linear,
    Conv,
    Pool,
    Norm,
    Dropout,
    Rnn,
}

impl LayerFamily {
    pub const ALL: [LayerFamily; 6] = [
        LayerFamily::Linear,
        LayerFamily::Conv,
        LayerFamily::Pool,
        LayerFamily::Norm,
        LayerFamily::Dropout,
        LayerFamily::Rnn,
    ];

    /// Prefix of the generated attribute name (`self.<prefix>_<n>`).
    pub fn prefix(&self) -> &'static str {
        match self {
            LayerFamily::Linear => "linear",
            LayerFamily::Conv => "conv",
            LayerFamily::Pool => "pool",
            LayerFamily::Norm => "norm",
            LayerFamily::Dropout => "dropout",
            LayerFamily::Rnn => "rnn",
        }
    }

    pub(crate) fn index(&self) -> usize {
        match self {
            LayerFamily::Linear => 0,
            LayerFamily::Conv => 1,
            LayerFamily::Pool => 2,
            LayerFamily::Norm => 3,
            LayerFamily::Dropout => 4,
            LayerFamily::Rnn => 5,
        }
    }
}

/// Closed set of node types the editor can place, plus a catch-all for
/// anything else.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum NodeKind {
    TabularInput,
    TimeseriesInput,
    ImageInput,
    Tanh,
    Relu,
    Sigmoid,
    Linear,
    Conv1d,
    Conv2d,
    Lstm,
    Gru,
    MaxPool1d,
    MaxPool2d,
    LayerNorm,
    BatchNorm1d,
    BatchNorm2d,
    Dropout,
    Dropout1d,
    Dropout2d,
    Permute,
    Concat,
    Flatten,
    Unknown(String),
}

impl NodeKind {
    pub const KNOWN: [NodeKind; 22] = [
        NodeKind::TabularInput,
        NodeKind::TimeseriesInput,
        NodeKind::ImageInput,
        NodeKind::Tanh,
        NodeKind::Relu,
        NodeKind::Sigmoid,
        NodeKind::Linear,
        NodeKind::Conv1d,
        NodeKind::Conv2d,
        NodeKind::Lstm,
        NodeKind::Gru,
        NodeKind::MaxPool1d,
        NodeKind::MaxPool2d,
        NodeKind::LayerNorm,
        NodeKind::BatchNorm1d,
        NodeKind::BatchNorm2d,
        NodeKind::Dropout,
        NodeKind::Dropout1d,
        NodeKind::Dropout2d,
        NodeKind::Permute,
        NodeKind::Concat,
        NodeKind::Flatten,
    ];

    pub fn parse(name: &str) -> Self {
        match name {
            "tabular-input" => NodeKind::TabularInput,
            "timeseries-input" => NodeKind::TimeseriesInput,
            "image-input" => NodeKind::ImageInput,
            "tanh" => NodeKind::Tanh,
            "relu" => NodeKind::Relu,
            "sigmoid" => NodeKind::Sigmoid,
            "linear" => NodeKind::Linear,
            "conv1d" => NodeKind::Conv1d,
            "conv2d" => NodeKind::Conv2d,
            "lstm" => NodeKind::Lstm,
            "gru" => NodeKind::Gru,
            "maxpool1d" => NodeKind::MaxPool1d,
            "maxpool2d" => NodeKind::MaxPool2d,
            "layernorm" => NodeKind::LayerNorm,
            "batchnorm1d" => NodeKind::BatchNorm1d,
            "batchnorm2d" => NodeKind::BatchNorm2d,
            "dropout" => NodeKind::Dropout,
            "dropout1d" => NodeKind::Dropout1d,
            "dropout2d" => NodeKind::Dropout2d,
            "permute" => NodeKind::Permute,
            "concat" => NodeKind::Concat,
            "flatten" => NodeKind::Flatten,
            other => NodeKind::Unknown(other.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            NodeKind::TabularInput => "tabular-input",
            NodeKind::TimeseriesInput => "timeseries-input",
            NodeKind::ImageInput => "image-input",
            NodeKind::Tanh => "tanh",
            NodeKind::Relu => "relu",
            NodeKind::Sigmoid => "sigmoid",
            NodeKind::Linear => "linear",
            NodeKind::Conv1d => "conv1d",
            NodeKind::Conv2d => "conv2d",
            NodeKind::Lstm => "lstm",
            NodeKind::Gru => "gru",
            NodeKind::MaxPool1d => "maxpool1d",
            NodeKind::MaxPool2d => "maxpool2d",
            NodeKind::LayerNorm => "layernorm",
            NodeKind::BatchNorm1d => "batchnorm1d",
            NodeKind::BatchNorm2d => "batchnorm2d",
            NodeKind::Dropout => "dropout",
            NodeKind::Dropout1d => "dropout1d",
            NodeKind::Dropout2d => "dropout2d",
            NodeKind::Permute => "permute",
            NodeKind::Concat => "concat",
            NodeKind::Flatten => "flatten",
            NodeKind::Unknown(name) => name,
        }
    }

    /// Whether the type denotes a graph input. Unknown types count when
    /// their name contains `input`.
    pub fn is_input(&self) -> bool {
        match self {
            NodeKind::TabularInput | NodeKind::TimeseriesInput | NodeKind::ImageInput => true,
            NodeKind::Unknown(name) => name.contains("input"),
            _ => false,
        }
    }

    pub fn is_unknown(&self) -> bool {
        matches!(self, NodeKind::Unknown(_))
    }

    /// Family owning the persistent construct, if the kind declares one.
    pub fn family(&self) -> Option<LayerFamily> {
        match self {
            NodeKind::Linear => Some(LayerFamily::Linear),
            NodeKind::Conv1d | NodeKind::Conv2d => Some(LayerFamily::Conv),
            NodeKind::MaxPool1d | NodeKind::MaxPool2d => Some(LayerFamily::Pool),
            NodeKind::LayerNorm | NodeKind::BatchNorm1d | NodeKind::BatchNorm2d => {
                Some(LayerFamily::Norm)
            }
            NodeKind::Dropout | NodeKind::Dropout1d | NodeKind::Dropout2d => {
                Some(LayerFamily::Dropout)
            }
            NodeKind::Lstm | NodeKind::Gru => Some(LayerFamily::Rnn),
            _ => None,
        }
    }
}

impl From<String> for NodeKind {
    fn from(name: String) -> Self {
        NodeKind::parse(&name)
    }
}

impl From<&str> for NodeKind {
    fn from(name: &str) -> Self {
        NodeKind::parse(name)
    }
}

impl From<NodeKind> for String {
    fn from(kind: NodeKind) -> Self {
        kind.as_str().to_string()
    }
}

impl fmt::Display for NodeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl JsonSchema for NodeKind {
    fn schema_name() -> Cow<'static, str> {
        "NodeKind".into()
    }

    fn json_schema(_generator: &mut SchemaGenerator) -> Schema {
        let known: Vec<&str> = NodeKind::KNOWN.iter().map(|k| k.as_str()).collect();
        json_schema!({
            "type": "string",
            "description": "Layer or operator type; unrecognized names compile to a placeholder",
            "examples": known
        })
    }
}

/// A node as decoded from the editor payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct NodeRecord {
    pub id: NodeId,
    #[serde(rename = "type")]
    pub kind: NodeKind,
    #[serde(default)]
    pub data: BTreeMap<String, AttrValue>,
}

impl NodeRecord {
    pub fn new(id: impl Into<NodeId>, kind: impl Into<NodeKind>) -> Self {
        Self {
            id: id.into(),
            kind: kind.into(),
            data: BTreeMap::new(),
        }
    }

    pub fn with_attr(mut self, name: &str, value: impl Into<AttrValue>) -> Self {
        self.data.insert(name.to_string(), value.into());
        self
    }

    pub fn with_null(mut self, name: &str) -> Self {
        self.data.insert(name.to_string(), AttrValue::Null);
        self
    }
}

/// A directed data-flow edge between two nodes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct EdgeRecord {
    pub source: NodeId,
    pub target: NodeId,
}

impl EdgeRecord {
    pub fn new(source: impl Into<NodeId>, target: impl Into<NodeId>) -> Self {
        Self {
            source: source.into(),
            target: target.into(),
        }
    }
}

/// Request payload: the editor's node and edge lists.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct GraphPayload {
    pub nodes: Vec<NodeRecord>,
    #[serde(default)]
    pub edges: Vec<EdgeRecord>,
}
