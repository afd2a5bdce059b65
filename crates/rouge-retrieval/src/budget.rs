use crate::types::{Chunk, TokenBudget};

/// Outcome of packing chunks under a [`TokenBudget`].
#[derive(Debug, Clone, PartialEq)]
pub struct Assembly {
    pub included: Vec<Chunk>,
    pub truncated: bool,
    pub total_tokens: usize,
}

/// Greedily pack `selected` in order, stopping at the first chunk that does not fit.
///
/// Pure: the same input always yields the same output. An empty `included` with
/// `truncated == true` means even the first chunk exceeded the budget.
#[must_use]
pub fn assemble(selected: &[Chunk], budget: &TokenBudget) -> Assembly {
    let available = budget.available();
    let mut included = Vec::new();
    let mut total_tokens: usize = 0;
    let mut truncated = false;

    for chunk in selected {
        let next = total_tokens.saturating_add(chunk.estimated_tokens);
        if next > available {
            truncated = true;
            break;
        }
        total_tokens = next;
        included.push(chunk.clone());
    }

    Assembly {
        included,
        truncated,
        total_tokens,
    }
}
