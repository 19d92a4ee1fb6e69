//! # Compilation Pipeline
//!
//! Phase tracking, options and bookkeeping for a single compile.
//!
//! Nothing here outlives one call: a [`CompilationContext`] is created per
//! compile and folded into the returned [`CompileOutput`].

use std::fmt;

use serde::Serialize;

use crate::types::NodeId;

/// Compilation phase identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum CompilationPhase {
    /// Payload decoding
    Loading,
    /// Node table, adjacency and cycle check
    GraphConstruction,
    /// Topological ordering
    Scheduling,
    /// Attribute and shape resolution, skip decisions
    AttributeResolution,
    /// Data-flow variable assignment
    VariableBinding,
    /// Per-node declaration and invocation statements
    LayerEmission,
    /// Final program text
    Assembly,
    /// Completed successfully
    Complete,
}

impl CompilationPhase {
    /// Get human-readable phase name
    pub fn name(&self) -> &'static str {
        match self {
            Self::Loading => "Loading",
            Self::GraphConstruction => "Graph Construction",
            Self::Scheduling => "Scheduling",
            Self::AttributeResolution => "Attribute Resolution",
            Self::VariableBinding => "Variable Binding",
            Self::LayerEmission => "Layer Emission",
            Self::Assembly => "Assembly",
            Self::Complete => "Complete",
        }
    }

    /// Get phase description
    pub fn description(&self) -> &'static str {
        match self {
            Self::Loading => "Decoding node and edge records",
            Self::GraphConstruction => "Building adjacency and rejecting cycles",
            Self::Scheduling => "Computing a stable topological order",
            Self::AttributeResolution => "Parsing input shapes and checking attributes",
            Self::VariableBinding => "Assigning data-flow variables",
            Self::LayerEmission => "Emitting layer declarations and forward statements",
            Self::Assembly => "Assembling the model class",
            Self::Complete => "Compilation completed successfully",
        }
    }
}

/// Compilation options
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompileOptions {
    /// Name of the generated `nn.Module` subclass
    pub class_name: String,
    /// One level of indentation in the generated source
    pub indent: String,
}

impl Default for CompileOptions {
    fn default() -> Self {
        Self {
            class_name: "CustomModel".to_string(),
            indent: "    ".to_string(),
        }
    }
}

impl CompileOptions {
    pub fn with_class_name(mut self, class_name: impl Into<String>) -> Self {
        self.class_name = class_name.into();
        self
    }
}

/// Non-fatal conditions collected while compiling.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum CompileWarning {
    /// Node type with no known construct; a placeholder was emitted
    UnrecognizedType { node: String, type_name: String },
    /// Node left out of this compile
    SkippedNode { node: String, reason: String },
}

impl CompileWarning {
    pub fn unrecognized(node: &NodeId, type_name: &str) -> Self {
        Self::UnrecognizedType {
            node: node.to_string(),
            type_name: type_name.to_string(),
        }
    }

    pub fn skipped(node: &NodeId, reason: impl fmt::Display) -> Self {
        Self::SkippedNode {
            node: node.to_string(),
            reason: reason.to_string(),
        }
    }
}

impl fmt::Display for CompileWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnrecognizedType { node, type_name } => {
                write!(f, "node {}: unrecognized type '{}'", node, type_name)
            }
            Self::SkippedNode { node, reason } => write!(f, "node {} skipped: {}", node, reason),
        }
    }
}

/// Compilation statistics
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize)]
pub struct CompileStats {
    /// Number of nodes in input graph
    pub nodes: usize,
    /// Number of edges in input graph
    pub edges: usize,
    pub skipped_nodes: usize,
    pub unknown_nodes: usize,
    /// Constructor statements emitted
    pub declarations: usize,
    /// Forward statements emitted
    pub invocations: usize,
    pub inputs: usize,
    pub outputs: usize,
    /// Generated code size in bytes
    pub code_bytes: usize,
}

impl fmt::Display for CompileStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "=== Compilation Statistics ===")?;
        writeln!(f, "Input Graph:")?;
        writeln!(f, "  Nodes:        {}", self.nodes)?;
        writeln!(f, "  Edges:        {}", self.edges)?;
        if self.skipped_nodes > 0 || self.unknown_nodes > 0 {
            writeln!(f, "  Skipped:      {}", self.skipped_nodes)?;
            writeln!(f, "  Unrecognized: {}", self.unknown_nodes)?;
        }
        writeln!(f, "Output:")?;
        writeln!(f, "  Declarations: {}", self.declarations)?;
        writeln!(f, "  Invocations:  {}", self.invocations)?;
        writeln!(f, "  Inputs:       {}", self.inputs)?;
        writeln!(f, "  Outputs:      {}", self.outputs)?;
        write!(f, "  Code size:    {} bytes", self.code_bytes)
    }
}

/// Result of a successful compile.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CompileOutput {
    pub code: String,
    pub warnings: Vec<CompileWarning>,
    pub stats: CompileStats,
}

/// Per-call compilation state.
#[derive(Debug)]
pub struct CompilationContext {
    /// Current phase
    pub phase: CompilationPhase,
    pub warnings: Vec<CompileWarning>,
    pub stats: CompileStats,
}

impl CompilationContext {
    pub fn new(nodes: usize, edges: usize) -> Self {
        Self {
            phase: CompilationPhase::Loading,
            warnings: Vec::new(),
            stats: CompileStats {
                nodes,
                edges,
                ..Default::default()
            },
        }
    }

    /// Advance to next phase
    pub fn advance_phase(&mut self, phase: CompilationPhase) {
        self.phase = phase;
        tracing::debug!("Phase {}: {}", phase.name(), phase.description());
    }

    pub fn add_warning(&mut self, warning: CompileWarning) {
        match &warning {
            CompileWarning::UnrecognizedType { .. } => self.stats.unknown_nodes += 1,
            CompileWarning::SkippedNode { .. } => {
                self.stats.skipped_nodes += 1;
                tracing::warn!("{}", warning);
            }
        }
        self.warnings.push(warning);
    }

    pub fn finish(mut self, code: String) -> CompileOutput {
        self.stats.code_bytes = code.len();
        self.advance_phase(CompilationPhase::Complete);
        tracing::info!(
            "Compiled {} nodes into {} declarations and {} forward statements ({} bytes, {} warnings)",
            self.stats.nodes,
            self.stats.declarations,
            self.stats.invocations,
            self.stats.code_bytes,
            self.warnings.len()
        );
        CompileOutput {
            code,
            warnings: self.warnings,
            stats: self.stats,
        }
    }
}
