//! Node-kind to PyTorch construct mapping.
//!
//! One `LayerEmitter` lives for exactly one compile. It owns the per-family
//! naming counters and remembers which import lines the emitted statements
//! need.

use itertools::Itertools;

use crate::attributes::ResolvedAttributes;
use crate::binding::{Var, VariableBinding};
use crate::errors::{CompileError, Result};
use crate::graph::GraphModel;
use crate::render::{python_arg, python_bool, python_dict, python_int_list, python_int_tuple};
use crate::types::{LayerFamily, NodeKind};

/// Statements emitted for one node.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LayerPlan {
    /// Constructor statement, e.g. `self.linear_1 = nn.Linear(...)`
    pub declaration: Option<String>,
    /// Forward statement, e.g. `x = self.linear_1(x)`
    pub invocation: Option<String>,
}

impl LayerPlan {
    fn invoke(invocation: String) -> Self {
        Self {
            declaration: None,
            invocation: Some(invocation),
        }
    }

    fn construct(declaration: String, invocation: String) -> Self {
        Self {
            declaration: Some(declaration),
            invocation: Some(invocation),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.declaration.is_none() && self.invocation.is_none()
    }
}

/// Import lines beyond `torch.nn`, which is always present.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RequiredImports {
    /// `import torch` (flatten, concat, permute)
    pub torch: bool,
    /// `import torch.nn.functional as F` (activations)
    pub functional: bool,
}

#[derive(Debug, Default)]
pub struct LayerEmitter {
    counters: [u32; LayerFamily::ALL.len()],
    imports: RequiredImports,
}

/// Per-node view the emission rules work against.
struct EmitContext<'a, 'b> {
    graph: &'b GraphModel,
    binding: &'b VariableBinding,
    idx: usize,
    attrs: &'b ResolvedAttributes<'a>,
}

impl<'a, 'b> EmitContext<'a, 'b> {
    fn name(&self, var: Var) -> String {
        self.binding.name(var)
    }

    /// The node's own output variable.
    fn output(&self) -> Result<String> {
        self.binding
            .var(self.idx)
            .map(|v| self.name(v))
            .ok_or_else(|| {
                CompileError::Internal(format!("node {} has no bound variable", self.attrs.id()))
            })
    }

    /// Input variable for single-input constructs.
    fn parent(&self) -> Result<String> {
        let count = self.graph.predecessors(self.idx).len();
        if count > 1 {
            return Err(CompileError::TooManyInputs {
                node: self.attrs.id().clone(),
                kind: self.attrs.kind().to_string(),
                count,
            });
        }
        self.binding
            .parent_var(self.graph, self.idx)
            .map(|v| self.name(v))
            .ok_or_else(|| {
                CompileError::Internal(format!("node {} has no input variable", self.attrs.id()))
            })
    }

    fn arg(&self, name: &str) -> Result<String> {
        self.attrs.require(name).map(python_arg)
    }
}

impl LayerEmitter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn imports(&self) -> RequiredImports {
        self.imports
    }

    /// Number of constructs emitted so far for `family`.
    pub fn emitted(&self, family: LayerFamily) -> u32 {
        self.counters[family.index()]
    }

    fn next_name(&mut self, family: LayerFamily) -> String {
        let counter = &mut self.counters[family.index()];
        *counter += 1;
        format!("self.{}_{}", family.prefix(), counter)
    }

    pub fn emit(
        &mut self,
        graph: &GraphModel,
        binding: &VariableBinding,
        idx: usize,
        attrs: &ResolvedAttributes<'_>,
    ) -> Result<LayerPlan> {
        let ctx = EmitContext {
            graph,
            binding,
            idx,
            attrs,
        };

        let plan = match attrs.kind() {
            NodeKind::TabularInput | NodeKind::TimeseriesInput | NodeKind::ImageInput => {
                LayerPlan::default()
            }
            NodeKind::Relu => {
                self.imports.functional = true;
                let inplace = attrs.flag_or("inplace", false)?;
                LayerPlan::invoke(format!(
                    "{} = F.relu({}, inplace={})",
                    ctx.output()?,
                    ctx.parent()?,
                    python_bool(inplace)
                ))
            }
            NodeKind::Tanh => self.activation(&ctx, "tanh")?,
            NodeKind::Sigmoid => self.activation(&ctx, "sigmoid")?,
            NodeKind::Linear => {
                let args = format!(
                    "in_features={}, out_features={}, bias={}",
                    attrs.shape_dim(-1)?,
                    ctx.arg("numNeurons")?,
                    ctx.arg("bias")?
                );
                self.construct(&ctx, LayerFamily::Linear, "nn.Linear", &args)?
            }
            NodeKind::Conv1d | NodeKind::Conv2d => {
                let class = if *attrs.kind() == NodeKind::Conv1d {
                    "nn.Conv1d"
                } else {
                    "nn.Conv2d"
                };
                let args = format!(
                    "in_channels={}, out_channels={}, kernel_size={}, stride={}, padding={}, dilation={}",
                    attrs.shape_dim(1)?,
                    ctx.arg("numFilters")?,
                    ctx.arg("kernelSize")?,
                    ctx.arg("stride")?,
                    ctx.arg("padding")?,
                    ctx.arg("dilation")?
                );
                self.construct(&ctx, LayerFamily::Conv, class, &args)?
            }
            NodeKind::MaxPool1d | NodeKind::MaxPool2d => {
                let class = if *attrs.kind() == NodeKind::MaxPool1d {
                    "nn.MaxPool1d"
                } else {
                    "nn.MaxPool2d"
                };
                let args = format!(
                    "kernel_size={}, stride={}, padding={}, dilation={}",
                    ctx.arg("kernelSize")?,
                    ctx.arg("stride")?,
                    ctx.arg("padding")?,
                    ctx.arg("dilation")?
                );
                self.construct(&ctx, LayerFamily::Pool, class, &args)?
            }
            NodeKind::LayerNorm => {
                let start = attrs.int("normalizedShape")?;
                let shape = attrs.shape().ok_or_else(|| {
                    CompileError::Internal(format!("node {} has no input shape", attrs.id()))
                })?;
                let args = format!(
                    "normalized_shape={}, eps={}, elementwise_affine={}",
                    python_int_list(shape.slice_from(start)),
                    ctx.arg("eps")?,
                    ctx.arg("elementwiseAffine")?
                );
                self.construct(&ctx, LayerFamily::Norm, "nn.LayerNorm", &args)?
            }
            NodeKind::BatchNorm1d | NodeKind::BatchNorm2d => {
                let class = if *attrs.kind() == NodeKind::BatchNorm1d {
                    "nn.BatchNorm1d"
                } else {
                    "nn.BatchNorm2d"
                };
                let args = format!(
                    "num_features={}, eps={}, momentum={}, affine={}, track_running_stats={}",
                    attrs.shape_dim(1)?,
                    ctx.arg("eps")?,
                    ctx.arg("momentum")?,
                    ctx.arg("affine")?,
                    ctx.arg("track_running_stats")?
                );
                self.construct(&ctx, LayerFamily::Norm, class, &args)?
            }
            NodeKind::Dropout | NodeKind::Dropout1d | NodeKind::Dropout2d => {
                let class = match attrs.kind() {
                    NodeKind::Dropout1d => "nn.Dropout1d",
                    NodeKind::Dropout2d => "nn.Dropout2d",
                    _ => "nn.Dropout",
                };
                let args = format!(
                    "p={}, inplace={}",
                    ctx.arg("p")?,
                    python_bool(attrs.flag_or("inplace", false)?)
                );
                self.construct(&ctx, LayerFamily::Dropout, class, &args)?
            }
            NodeKind::Lstm | NodeKind::Gru => self.recurrent(&ctx)?,
            NodeKind::Flatten => {
                self.imports.torch = true;
                LayerPlan::invoke(format!(
                    "{} = torch.flatten(input={}, start_dim={}, end_dim={})",
                    ctx.output()?,
                    ctx.parent()?,
                    ctx.arg("flattenStart")?,
                    ctx.arg("flattenEnd")?
                ))
            }
            NodeKind::Concat => {
                self.imports.torch = true;
                let mut tensors = binding.sources(graph, idx);
                if tensors.is_empty() {
                    tensors.extend(binding.var(idx));
                }
                LayerPlan::invoke(format!(
                    "{} = torch.cat(tensors=[{}], dim={})",
                    ctx.output()?,
                    tensors.into_iter().map(|v| ctx.name(v)).join(", "),
                    ctx.arg("dim")?
                ))
            }
            NodeKind::Permute => {
                self.imports.torch = true;
                let dims = Self::permutation(attrs)?;
                LayerPlan::invoke(format!(
                    "{} = torch.permute(input={}, dims={})",
                    ctx.output()?,
                    ctx.parent()?,
                    python_int_tuple(&dims)
                ))
            }
            NodeKind::Unknown(name) => {
                tracing::warn!("Unknown layer type '{}' on node {}", name, attrs.id());
                LayerPlan {
                    declaration: Some(format!("UnknownLayer({})", python_dict(attrs.raw()))),
                    invocation: None,
                }
            }
        };

        Ok(plan)
    }

    fn activation(&mut self, ctx: &EmitContext<'_, '_>, function: &str) -> Result<LayerPlan> {
        self.imports.functional = true;
        Ok(LayerPlan::invoke(format!(
            "{} = F.{}({})",
            ctx.output()?,
            function,
            ctx.parent()?
        )))
    }

    /// Declares `self.<family>_<n> = <class>(<args>)` and calls it.
    fn construct(
        &mut self,
        ctx: &EmitContext<'_, '_>,
        family: LayerFamily,
        class: &str,
        args: &str,
    ) -> Result<LayerPlan> {
        let output = ctx.output()?;
        let input = ctx.parent()?;
        let name = self.next_name(family);
        Ok(LayerPlan::construct(
            format!("{} = {}({})", name, class, args),
            format!("{} = {}({})", output, name, input),
        ))
    }

    fn recurrent(&mut self, ctx: &EmitContext<'_, '_>) -> Result<LayerPlan> {
        let attrs = ctx.attrs;
        let is_lstm = *attrs.kind() == NodeKind::Lstm;
        let mut args = format!(
            "input_size={}, hidden_size={}, num_layers={}, dropout={}, bidirectional={}",
            attrs.shape_dim(-1)?,
            ctx.arg("hiddenSize")?,
            ctx.arg("numLayers")?,
            ctx.arg("dropout")?,
            ctx.arg("bidirectional")?
        );
        if !is_lstm {
            args.push_str(", batch_first=True");
        }

        let output = ctx.output()?;
        let input = ctx.parent()?;
        let name = self.next_name(LayerFamily::Rnn);
        let class = if is_lstm { "nn.LSTM" } else { "nn.GRU" };
        // LSTM returns (output, (h_n, c_n)); only the output flows on
        let target = if is_lstm {
            format!("{}, _", output)
        } else {
            output
        };

        Ok(LayerPlan::construct(
            format!("{} = {}({})", name, class, args),
            format!("{} = {}({})", target, name, input),
        ))
    }

    /// Position of each output dimension within the input order.
    fn permutation(attrs: &ResolvedAttributes<'_>) -> Result<Vec<i64>> {
        let input = attrs.dimension_order("inputShapeOrder")?;
        let output = attrs.dimension_order("outputShapeOrder")?;
        output
            .iter()
            .map(|dim| {
                input
                    .iter()
                    .position(|candidate| candidate == dim)
                    .map(|pos| pos as i64)
                    .ok_or_else(|| {
                        attrs.invalid(
                            "outputShapeOrder",
                            format!("names dimension '{}' absent from inputShapeOrder", dim),
                        )
                    })
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::attributes::{AttributeResolver, Resolution, INPUT_SHAPE};
    use crate::binding::VariableBinder;
    use crate::scheduler::schedule;
    use crate::types::{AttrValue, EdgeRecord, NodeRecord};

    /// Emits every node of the graph in scheduled order.
    fn emit_all(nodes: Vec<NodeRecord>, edges: &[(&str, &str)]) -> (Vec<LayerPlan>, LayerEmitter) {
        let edges: Vec<_> = edges.iter().map(|(s, t)| EdgeRecord::new(*s, *t)).collect();
        let graph = GraphModel::build(&nodes, &edges).unwrap();
        let order = schedule(&graph).unwrap();
        let resolved = AttributeResolver::new().resolve_all(&graph, &order).unwrap();
        let skipped: Vec<bool> = resolved
            .iter()
            .map(|r| matches!(r, Resolution::Skipped(_)))
            .collect();
        let binding = VariableBinder::new(&graph).bind(&order, &skipped);

        let mut emitter = LayerEmitter::new();
        let mut plans = Vec::new();
        for idx in order {
            if let Resolution::Resolved(attrs) = &resolved[idx] {
                plans.push(emitter.emit(&graph, &binding, idx, attrs).unwrap());
            }
        }
        (plans, emitter)
    }

    fn input(id: &str, shape: &str) -> NodeRecord {
        NodeRecord::new(id, "tabular-input").with_attr(INPUT_SHAPE, shape)
    }

    #[test]
    fn test_linear_declaration_and_call() {
        let (plans, emitter) = emit_all(
            vec![
                input("1", "(4)"),
                NodeRecord::new("2", "linear")
                    .with_attr(INPUT_SHAPE, "(4)")
                    .with_attr("numNeurons", 8i64)
                    .with_attr("bias", true),
            ],
            &[("1", "2")],
        );
        assert!(plans[0].is_empty());
        assert_eq!(
            plans[1].declaration.as_deref(),
            Some("self.linear_1 = nn.Linear(in_features=4, out_features=8, bias=True)")
        );
        assert_eq!(plans[1].invocation.as_deref(), Some("x = self.linear_1(x)"));
        assert_eq!(emitter.imports(), RequiredImports::default());
        assert_eq!(emitter.emitted(LayerFamily::Linear), 1);
    }

    #[test]
    fn test_conv_and_pool_share_nothing_but_conv_variants_share_counter() {
        let conv = |id: &str, kind: &str| {
            NodeRecord::new(id, kind)
                .with_attr(INPUT_SHAPE, "(1, 3, 28, 28)")
                .with_attr("numFilters", 16i64)
                .with_attr("kernelSize", "(3, 3)")
                .with_attr("stride", 1i64)
                .with_attr("padding", 0i64)
                .with_attr("dilation", 1i64)
        };
        let pool = NodeRecord::new("p", "maxpool2d")
            .with_attr(INPUT_SHAPE, "(1, 16, 26, 26)")
            .with_attr("kernelSize", 2i64)
            .with_attr("stride", 2i64)
            .with_attr("padding", 0i64)
            .with_attr("dilation", 1i64);
        let (plans, emitter) = emit_all(
            vec![input("in", "(1, 3, 28, 28)"), conv("c1", "conv2d"), pool, conv("c2", "conv1d")],
            &[("in", "c1"), ("c1", "p"), ("p", "c2")],
        );

        assert_eq!(
            plans[1].declaration.as_deref(),
            Some("self.conv_1 = nn.Conv2d(in_channels=3, out_channels=16, kernel_size=(3, 3), stride=1, padding=0, dilation=1)")
        );
        assert_eq!(
            plans[2].declaration.as_deref(),
            Some("self.pool_1 = nn.MaxPool2d(kernel_size=2, stride=2, padding=0, dilation=1)")
        );
        assert!(plans[3]
            .declaration
            .as_deref()
            .unwrap()
            .starts_with("self.conv_2 = nn.Conv1d(in_channels=3,"));
        assert_eq!(emitter.emitted(LayerFamily::Conv), 2);
        assert_eq!(emitter.emitted(LayerFamily::Pool), 1);
    }

    #[test]
    fn test_norms_share_counter() {
        let (plans, _) = emit_all(
            vec![
                input("in", "(8, 3, 16)"),
                NodeRecord::new("ln", "layernorm")
                    .with_attr(INPUT_SHAPE, "(8, 3, 16)")
                    .with_attr("normalizedShape", 1i64)
                    .with_attr("eps", 1e-5)
                    .with_attr("elementwiseAffine", true),
                NodeRecord::new("bn", "batchnorm1d")
                    .with_attr(INPUT_SHAPE, "(8, 3, 16)")
                    .with_attr("eps", 1e-5)
                    .with_attr("momentum", 0.1)
                    .with_attr("affine", true)
                    .with_attr("track_running_stats", false),
            ],
            &[("in", "ln"), ("ln", "bn")],
        );
        assert_eq!(
            plans[1].declaration.as_deref(),
            Some("self.norm_1 = nn.LayerNorm(normalized_shape=[3, 16], eps=1e-5, elementwise_affine=True)")
        );
        assert_eq!(
            plans[2].declaration.as_deref(),
            Some("self.norm_2 = nn.BatchNorm1d(num_features=3, eps=1e-5, momentum=0.1, affine=True, track_running_stats=False)")
        );
    }

    #[test]
    fn test_recurrent_layers() {
        let rnn = |id: &str, kind: &str| {
            NodeRecord::new(id, kind)
                .with_attr(INPUT_SHAPE, "(8, 20, 32)")
                .with_attr("hiddenSize", 64i64)
                .with_attr("numLayers", 2i64)
                .with_attr("dropout", 0.0)
                .with_attr("bidirectional", false)
        };
        let (plans, _) = emit_all(
            vec![input("in", "(8, 20, 32)"), rnn("l", "lstm"), rnn("g", "gru")],
            &[("in", "l"), ("l", "g")],
        );
        assert_eq!(
            plans[1].declaration.as_deref(),
            Some("self.rnn_1 = nn.LSTM(input_size=32, hidden_size=64, num_layers=2, dropout=0.0, bidirectional=False)")
        );
        assert_eq!(plans[1].invocation.as_deref(), Some("x, _ = self.rnn_1(x)"));
        assert_eq!(
            plans[2].declaration.as_deref(),
            Some("self.rnn_2 = nn.GRU(input_size=32, hidden_size=64, num_layers=2, dropout=0.0, bidirectional=False, batch_first=True)")
        );
        assert_eq!(plans[2].invocation.as_deref(), Some("x = self.rnn_2(x)"));
    }

    #[test]
    fn test_functional_and_tensor_ops() {
        let (plans, emitter) = emit_all(
            vec![
                input("in", "(2, 3, 4)"),
                NodeRecord::new("r", "relu").with_attr(INPUT_SHAPE, "(2, 3, 4)"),
                NodeRecord::new("p", "permute")
                    .with_attr(INPUT_SHAPE, "(2, 3, 4)")
                    .with_attr("inputShapeOrder", "bct")
                    .with_attr("outputShapeOrder", "btc"),
                NodeRecord::new("f", "flatten")
                    .with_attr(INPUT_SHAPE, "(2, 4, 3)")
                    .with_attr("flattenStart", 1i64)
                    .with_attr("flattenEnd", -1i64),
                NodeRecord::new("t", "tanh").with_attr(INPUT_SHAPE, "(2, 12)"),
            ],
            &[("in", "r"), ("r", "p"), ("p", "f"), ("f", "t")],
        );
        assert_eq!(plans[1].invocation.as_deref(), Some("x = F.relu(x, inplace=False)"));
        assert_eq!(
            plans[2].invocation.as_deref(),
            Some("x = torch.permute(input=x, dims=(0, 2, 1))")
        );
        assert_eq!(
            plans[3].invocation.as_deref(),
            Some("x = torch.flatten(input=x, start_dim=1, end_dim=-1)")
        );
        assert_eq!(plans[4].invocation.as_deref(), Some("x = F.tanh(x)"));
        assert_eq!(
            emitter.imports(),
            RequiredImports {
                torch: true,
                functional: true
            }
        );
    }

    #[test]
    fn test_dropout_variants() {
        let dropout_node = |id: &str, kind: &str| {
            NodeRecord::new(id, kind)
                .with_attr(INPUT_SHAPE, "(4, 8)")
                .with_attr("p", 0.5)
        };
        let (plans, emitter) = emit_all(
            vec![input("in", "(4, 8)"), dropout_node("a", "dropout"), dropout_node("b", "dropout1d").with_attr("inplace", true)],
            &[("in", "a"), ("a", "b")],
        );
        assert_eq!(
            plans[1].declaration.as_deref(),
            Some("self.dropout_1 = nn.Dropout(p=0.5, inplace=False)")
        );
        assert_eq!(
            plans[2].declaration.as_deref(),
            Some("self.dropout_2 = nn.Dropout1d(p=0.5, inplace=True)")
        );
        assert_eq!(emitter.emitted(LayerFamily::Dropout), 2);
    }

    #[test]
    fn test_unknown_type_emits_placeholder() {
        let (plans, _) = emit_all(
            vec![NodeRecord::new("u", "transformer")
                .with_attr(INPUT_SHAPE, "(4)")
                .with_attr("heads", 8i64)],
            &[],
        );
        assert_eq!(
            plans[0].declaration.as_deref(),
            Some("UnknownLayer({'heads': 8, 'inputShape': '(4)'})")
        );
        assert!(plans[0].invocation.is_none());
    }

    #[test]
    fn test_single_input_construct_rejects_merge() {
        let nodes = vec![
            input("a", "(4)"),
            input("b", "(4)"),
            NodeRecord::new("r", "relu").with_attr(INPUT_SHAPE, "(4)"),
        ];
        let edges = vec![EdgeRecord::new("a", "r"), EdgeRecord::new("b", "r")];
        let graph = GraphModel::build(&nodes, &edges).unwrap();
        let order = schedule(&graph).unwrap();
        let binding = VariableBinder::new(&graph).bind(&order, &[false; 3]);
        let Resolution::Resolved(attrs) = AttributeResolver::new().resolve(graph.node(2), None).unwrap() else {
            panic!("relu should resolve");
        };

        let err = LayerEmitter::new().emit(&graph, &binding, 2, &attrs).unwrap_err();
        assert!(matches!(err, CompileError::TooManyInputs { count: 2, .. }));
        assert!(err.is_client_error());
    }

    #[test]
    fn test_permute_with_unknown_dimension() {
        let nodes = vec![NodeRecord::new("p", "permute")
            .with_attr(INPUT_SHAPE, "(2, 3)")
            .with_attr("inputShapeOrder", "bc")
            .with_attr("outputShapeOrder", AttrValue::List(vec!["c".into(), "z".into()]))];
        let graph = GraphModel::build(&nodes, &[]).unwrap();
        let binding = VariableBinder::new(&graph).bind(&[0], &[false]);
        let Resolution::Resolved(attrs) = AttributeResolver::new().resolve(graph.node(0), None).unwrap() else {
            panic!("permute should resolve");
        };

        let err = LayerEmitter::new().emit(&graph, &binding, 0, &attrs).unwrap_err();
        assert!(matches!(err, CompileError::InvalidAttribute { .. }));
    }

    #[test]
    fn test_shape_too_short_is_internal() {
        let nodes = vec![NodeRecord::new("b", "batchnorm2d")
            .with_attr(INPUT_SHAPE, "(4)")
            .with_attr("eps", 1e-5)
            .with_attr("momentum", 0.1)
            .with_attr("affine", true)
            .with_attr("track_running_stats", true)];
        let graph = GraphModel::build(&nodes, &[]).unwrap();
        let binding = VariableBinder::new(&graph).bind(&[0], &[false]);
        let Resolution::Resolved(attrs) = AttributeResolver::new().resolve(graph.node(0), None).unwrap() else {
            panic!("batchnorm should resolve");
        };

        let err = LayerEmitter::new().emit(&graph, &binding, 0, &attrs).unwrap_err();
        assert_eq!(err.status_code(), 500);
    }
}
