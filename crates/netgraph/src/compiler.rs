//! Compile entry points.
//!
//! The driver runs the stages in order over one [`GraphModel`]:
//! attributes are resolved for every node first so the binder knows which
//! nodes are skipped, then variables are bound, then each node is emitted
//! in scheduled order and the collected statements are assembled.

use schemars::{schema_for, Schema};

use crate::assembler::{ProgramArtifact, ProgramAssembler};
use crate::attributes::{AttributeResolver, Resolution};
use crate::binding::VariableBinder;
use crate::emitter::LayerEmitter;
use crate::errors::Result;
use crate::graph::GraphModel;
use crate::pipeline::{CompilationContext, CompilationPhase, CompileOptions, CompileOutput, CompileWarning};
use crate::scheduler::schedule;
use crate::types::{EdgeRecord, GraphPayload, NodeRecord};

/// Compiles a graph into PyTorch source with default options.
pub fn compile(nodes: &[NodeRecord], edges: &[EdgeRecord]) -> Result<String> {
    compile_with_options(nodes, edges, &CompileOptions::default()).map(|output| output.code)
}

pub fn compile_payload(payload: &GraphPayload, options: &CompileOptions) -> Result<CompileOutput> {
    compile_with_options(&payload.nodes, &payload.edges, options)
}

/// Decodes a `{"nodes": [...], "edges": [...]}` document and compiles it.
pub fn compile_json(json: &str, options: &CompileOptions) -> Result<CompileOutput> {
    let payload: GraphPayload = serde_json::from_str(json)?;
    compile_payload(&payload, options)
}

/// JSON Schema describing the accepted payload.
pub fn payload_schema() -> Schema {
    schema_for!(GraphPayload)
}

pub fn compile_with_options(
    nodes: &[NodeRecord],
    edges: &[EdgeRecord],
    options: &CompileOptions,
) -> Result<CompileOutput> {
    let mut ctx = CompilationContext::new(nodes.len(), edges.len());

    ctx.advance_phase(CompilationPhase::GraphConstruction);
    let graph = GraphModel::build(nodes, edges)?;

    ctx.advance_phase(CompilationPhase::Scheduling);
    let order = schedule(&graph)?;

    ctx.advance_phase(CompilationPhase::AttributeResolution);
    let resolved = AttributeResolver::new().resolve_all(&graph, &order)?;
    let mut skipped = vec![false; graph.len()];
    for &idx in &order {
        if let Resolution::Skipped(reason) = &resolved[idx] {
            skipped[idx] = true;
            ctx.add_warning(CompileWarning::skipped(&graph.node(idx).id, reason));
        }
    }

    ctx.advance_phase(CompilationPhase::VariableBinding);
    let binding = VariableBinder::new(&graph).bind(&order, &skipped);

    ctx.advance_phase(CompilationPhase::LayerEmission);
    let mut emitter = LayerEmitter::new();
    let mut artifact = ProgramArtifact::default();
    for &idx in &order {
        let Resolution::Resolved(attrs) = &resolved[idx] else {
            continue;
        };
        if attrs.kind().is_unknown() {
            ctx.add_warning(CompileWarning::unrecognized(attrs.id(), attrs.kind().as_str()));
        }

        let plan = emitter.emit(&graph, &binding, idx, attrs)?;
        if let Some(declaration) = plan.declaration {
            artifact.declarations.push(declaration);
        }
        if let Some(invocation) = plan.invocation {
            artifact.invocations.push(invocation);
        }
    }
    artifact.imports = emitter.imports();
    artifact.inputs = binding.input_names();
    artifact.outputs = binding.output_names();

    ctx.stats.declarations = artifact.declarations.len();
    ctx.stats.invocations = artifact.invocations.len();
    ctx.stats.inputs = artifact.inputs.len();
    ctx.stats.outputs = artifact.outputs.len();

    ctx.advance_phase(CompilationPhase::Assembly);
    let code = ProgramAssembler::new(options).assemble(&artifact);

    Ok(ctx.finish(code))
}
