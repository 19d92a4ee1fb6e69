//! # netgraph
//!
//! Compiles node-editor neural network graphs into PyTorch `nn.Module`
//! source.
//!
//! A payload of typed nodes and directed edges is validated, ordered,
//! given data-flow variables and turned into a model class with one
//! constructor declaration per parameterized layer and one forward
//! statement per operation.
//!
//! ```no_run
//! use netgraph::{compile, EdgeRecord, NodeRecord};
//!
//! let nodes = vec![
//!     NodeRecord::new("1", "tabular-input").with_attr("inputShape", "(4)"),
//!     NodeRecord::new("2", "linear")
//!         .with_attr("inputShape", "(4)")
//!         .with_attr("numNeurons", 8i64)
//!         .with_attr("bias", true),
//! ];
//! let edges = vec![EdgeRecord::new("1", "2")];
//! let code = compile(&nodes, &edges).unwrap();
//! assert!(code.contains("self.linear_1 = nn.Linear(in_features=4, out_features=8, bias=True)"));
//! ```

pub mod assembler;
pub mod attributes;
pub mod binding;
pub mod compiler;
pub mod emitter;
pub mod errors;
pub mod graph;
pub mod pipeline;
pub mod render;
pub mod scheduler;
pub mod types;


pub use compiler::{compile, compile_json, compile_payload, compile_with_options, payload_schema};
pub use errors::{CompileError, ErrorClass, Result};
pub use pipeline::{CompilationPhase, CompileOptions, CompileOutput, CompileStats, CompileWarning};
pub use types::{AttrValue, EdgeRecord, GraphPayload, LayerFamily, NodeId, NodeKind, NodeRecord};
