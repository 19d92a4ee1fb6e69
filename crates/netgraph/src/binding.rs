//! Data-flow variable assignment.
//!
//! Variables are minted from a single counter shared by graph inputs and
//! fresh join/branch variables, so names are unique within one compile.
//! Names are only rendered after binding completes, which lets a lone
//! graph input be presented as `x` without rewriting any text.

use crate::graph::GraphModel;

/// A minted variable, identified by its mint number (1-based).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Var(u32);

impl Var {
    pub fn number(&self) -> u32 {
        self.0
    }
}

#[derive(Debug, Clone, Default)]
pub struct VariableBinding {
    /// Variable visible to consumers of each node. Skipped nodes forward an
    /// upstream variable here, or hold `None` when nothing upstream resolves.
    slots: Vec<Option<Var>>,
    /// Whether the node bound its own variable (as opposed to forwarding).
    bound: Vec<bool>,
    /// Whether the variable in `slots[idx]` reaches no consumer other than
    /// the successors of `idx`, so a lone child may overwrite it.
    exclusive: Vec<bool>,
    inputs: Vec<Var>,
    outputs: Vec<Var>,
    minted: u32,
    sole_input: Option<Var>,
}

impl VariableBinding {
    /// Variable bound to or forwarded through `idx`.
    pub fn var(&self, idx: usize) -> Option<Var> {
        self.slots.get(idx).copied().flatten()
    }

    pub fn is_bound(&self, idx: usize) -> bool {
        self.bound.get(idx).copied().unwrap_or(false)
    }

    pub fn inputs(&self) -> &[Var] {
        &self.inputs
    }

    pub fn outputs(&self) -> &[Var] {
        &self.outputs
    }

    pub fn minted(&self) -> u32 {
        self.minted
    }

    pub fn name(&self, var: Var) -> String {
        if self.sole_input == Some(var) {
            "x".to_string()
        } else {
            format!("x{}", var.0)
        }
    }

    pub fn input_names(&self) -> Vec<String> {
        self.inputs.iter().map(|v| self.name(*v)).collect()
    }

    pub fn output_names(&self) -> Vec<String> {
        self.outputs.iter().map(|v| self.name(*v)).collect()
    }

    /// Variables feeding `idx`, one per incoming edge in edge order.
    /// Inputs that resolve to nothing are dropped.
    pub fn sources(&self, graph: &GraphModel, idx: usize) -> Vec<Var> {
        graph
            .incoming(idx)
            .iter()
            .filter_map(|&parent| self.var(parent))
            .collect()
    }

    /// The variable a single-input construct consumes: its parent's, or its
    /// own when it is a free input.
    pub fn parent_var(&self, graph: &GraphModel, idx: usize) -> Option<Var> {
        graph
            .predecessors(idx)
            .iter()
            .find_map(|&parent| self.var(parent))
            .or_else(|| self.var(idx))
    }
}

pub struct VariableBinder<'g> {
    graph: &'g GraphModel,
    binding: VariableBinding,
}

impl<'g> VariableBinder<'g> {
    pub fn new(graph: &'g GraphModel) -> Self {
        let binding = VariableBinding {
            slots: vec![None; graph.len()],
            bound: vec![false; graph.len()],
            exclusive: vec![false; graph.len()],
            ..Default::default()
        };
        Self { graph, binding }
    }

    /// Binds every node in `order`. `skipped[idx]` marks nodes that take no
    /// part in this compile; adjacency is still the full graph, so skipped
    /// nodes count as parents, children and siblings.
    pub fn bind(mut self, order: &[usize], skipped: &[bool]) -> VariableBinding {
        for &idx in order {
            if skipped.get(idx).copied().unwrap_or(false) {
                self.forward(idx);
            } else {
                self.bind_node(idx);
            }
        }

        if let [only] = self.binding.inputs[..] {
            self.binding.sole_input = Some(only);
        }

        tracing::debug!(
            "Bound variables: {} minted, {} inputs, {} outputs",
            self.binding.minted,
            self.binding.inputs.len(),
            self.binding.outputs.len()
        );
        self.binding
    }

    fn mint(&mut self) -> Var {
        self.binding.minted += 1;
        Var(self.binding.minted)
    }

    fn forward(&mut self, idx: usize) {
        let graph = self.graph;
        let upstream = graph
            .predecessors(idx)
            .iter()
            .find_map(|&parent| self.binding.var(parent).map(|var| (parent, var)));

        if let Some((parent, var)) = upstream {
            self.binding.slots[idx] = Some(var);
            self.binding.exclusive[idx] =
                self.binding.exclusive[parent] && graph.successors(idx).len() <= 1;
        }
    }

    fn bind_node(&mut self, idx: usize) {
        let graph = self.graph;
        let parents = graph.predecessors(idx);
        let resolved_parent = parents.iter().find_map(|&p| self.binding.var(p));

        let var = match resolved_parent {
            // No parent, or every parent was skipped with nothing upstream
            None => {
                let var = self.mint();
                self.binding.inputs.push(var);
                var
            }
            // Reuse only when no other branch still reads the parent's variable
            Some(parent_var)
                if parents.len() == 1
                    && graph.siblings(idx).is_empty()
                    && self.binding.exclusive[parents[0]] =>
            {
                parent_var
            }
            Some(_) => self.mint(),
        };

        self.binding.slots[idx] = Some(var);
        self.binding.bound[idx] = true;
        self.binding.exclusive[idx] = graph.successors(idx).len() <= 1;

        if graph.successors(idx).is_empty() {
            self.binding.outputs.push(var);
        }
    }
}
