use crate::msg;

/// An operation failure plus the hints shown to the operator.
pub struct ErrorContext {
    pub operation: &'static str,
    pub workspace: Option<String>,
    pub suggestions: Vec<String>,
}

impl ErrorContext {
    /// "Failed to <op> '<workspace>'", or "<op> failed" without a workspace.
    pub fn display_headline(&self) -> String {
        match &self.workspace {
            Some(name) => msg!(
                "Failed to {operation} '{name}'",
                operation = self.operation,
                name = name.as_str()
            ),
            None => msg!("{operation} failed", operation = self.operation),
        }
    }

    /// The "Try:" block, empty when there is nothing to suggest.
    pub fn display_hints(&self) -> String {
        let mut result = String::new();
        if !self.suggestions.is_empty() {
            result.push_str("\n\nTry:");
            for suggestion in &self.suggestions {
                result.push_str(&format!("\n  • {}", suggestion));
            }
        }
        result
    }

    pub fn display(&self) -> String {
        self.display_headline() + &self.display_hints()
    }
}
