//! Positional-parameter accumulation for statement assembly.

use rowmap_core::Value;

/// Collects statement parameters and hands out their placeholders.
/// Placeholders are numbered in push order starting at `$1`; numbering is
/// local to one statement.
#[derive(Debug, Default)]
pub struct StatementBuilder {
    params: Vec<Value>,
}

impl StatementBuilder {
    /// An empty builder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Push a parameter and return its positional placeholder.
    pub fn placeholder(&mut self, value: Value) -> String {
        self.params.push(value);
        format!("${}", self.params.len())
    }

    /// Number of parameters pushed so far.
    pub fn len(&self) -> usize {
        self.params.len()
    }

    /// Whether no parameters have been pushed.
    pub fn is_empty(&self) -> bool {
        self.params.is_empty()
    }

    /// Consume the builder, yielding the parameters in placeholder order.
    pub fn into_params(self) -> Vec<Value> {
        self.params
    }
}
