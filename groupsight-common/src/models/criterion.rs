//! Rubric criteria

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// One rubric item a group is assessed against
///
/// Immutable after creation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Criterion {
    pub criterion_id: Uuid,
    pub description: String,
    /// Free text defining the acceptance conditions
    pub rubric: String,
    /// Stable display and identity ordering
    pub order_index: u32,
}

impl Criterion {
    pub fn new(order_index: u32, description: impl Into<String>, rubric: impl Into<String>) -> Self {
        Self {
            criterion_id: Uuid::new_v4(),
            description: description.into(),
            rubric: rubric.into(),
            order_index,
        }
    }

    /// The view of this criterion handed to the oracle
    pub fn rubric_item(&self) -> RubricItem {
        RubricItem {
            criterion_index: self.order_index,
            description: self.description.clone(),
            rubric: self.rubric.clone(),
        }
    }
}

/// Criterion as submitted to the oracle
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RubricItem {
    pub criterion_index: u32,
    pub description: String,
    pub rubric: String,
}
