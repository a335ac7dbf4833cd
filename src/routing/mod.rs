//! Model routing: capability scoring, priority modes, and auto selection.

pub mod auto;
pub mod modes;
pub mod scorer;

pub use auto::{select_best_model, Selection};
pub use modes::{filter_by_mode, PriorityMode};
pub use scorer::{match_score, AxisWeights, NEUTRAL_SCORE};
