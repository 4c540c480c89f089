//! Operand stack depth accounting for one method.

use jmm_syntax::GenerationError;

#[derive(Clone, Debug)]
pub struct StackTracker {
    method: String,
    depth: u16,
    max: u16,
}

impl StackTracker {
    pub fn new(method: impl Into<String>) -> Self {
        Self {
            method: method.into(),
            depth: 0,
            max: 0,
        }
    }

    pub fn push(&mut self, n: u16) {
        self.depth += n;
        self.max = self.max.max(self.depth);
    }

    pub fn pop(&mut self, n: u16) -> Result<(), GenerationError> {
        self.depth = self
            .depth
            .checked_sub(n)
            .ok_or_else(|| GenerationError::StackUnderflow {
                method: self.method.clone(),
            })?;
        Ok(())
    }

    /// Peak depth so far; the method's `.limit stack`.
    pub fn max(&self) -> u16 {
        self.max
    }
}
