//! The evaluation pipelines and their result containers.

pub mod bundle;
pub mod editmode;
pub mod geometry;

pub use bundle::{GeometryBundle, GeometryComponent};
pub use editmode::evaluate_edit;
pub use geometry::{evaluate, EvalOutput, EvalParams};
