use crate::emitter::RequiredImports;
use crate::pipeline::CompileOptions;

/// Everything the assembler needs, collected in scheduled order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProgramArtifact {
    pub declarations: Vec<String>,
    pub invocations: Vec<String>,
    /// Forward parameters, in mint order
    pub inputs: Vec<String>,
    /// Returned variables, in scheduled order (may repeat)
    pub outputs: Vec<String>,
    pub imports: RequiredImports,
}

/// Structural concatenation of a [`ProgramArtifact`] into a model class.
pub struct ProgramAssembler<'o> {
    options: &'o CompileOptions,
}

impl<'o> ProgramAssembler<'o> {
    pub fn new(options: &'o CompileOptions) -> Self {
        Self { options }
    }

    pub fn assemble(&self, artifact: &ProgramArtifact) -> String {
        let class = &self.options.class_name;
        let one = &self.options.indent;
        let two = one.repeat(2);

        let mut lines: Vec<String> = Vec::new();

        if artifact.imports.torch {
            lines.push("import torch".to_string());
        }
        lines.push("import torch.nn as nn".to_string());
        if artifact.imports.functional {
            lines.push("import torch.nn.functional as F".to_string());
        }

        lines.push(String::new());
        lines.push(format!("class {}(nn.Module):", class));
        lines.push(format!("{}def __init__(self):", one));
        lines.push(format!("{}super({}, self).__init__()", two, class));
        lines.extend(
            artifact
                .declarations
                .iter()
                .map(|statement| format!("{}{}", two, statement)),
        );

        lines.push(String::new());
        let params: String = artifact
            .inputs
            .iter()
            .map(|input| format!(", {}", input))
            .collect();
        lines.push(format!("{}def forward(self{}):", one, params));
        lines.extend(
            artifact
                .invocations
                .iter()
                .map(|statement| format!("{}{}", two, statement)),
        );

        if artifact.outputs.is_empty() {
            lines.push(format!("{}return", two));
        } else {
            lines.push(format!("{}return {}", two, artifact.outputs.join(", ")));
        }

        lines.join("\n")
    }
}
