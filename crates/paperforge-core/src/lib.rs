//! paperforge-core: Blueprint-driven paper selection and answer grading.
//!
//! This crate defines the question data model, the selection heuristics that
//! fit a candidate pool to a blueprint, and the grading engine that scores
//! submitted answers. Storage lives behind the traits in [`traits`].

pub mod balancer;
pub mod compliance;
pub mod context;
pub mod engine;
pub mod equivalence;
pub mod error;
pub mod grading;
pub mod knapsack;
pub mod model;
pub mod paper;
pub mod random;
pub mod request;
pub mod statistics;
pub mod submission;
pub mod traits;
pub mod variety;

#[cfg(test)]
pub(crate) mod testing;

pub use error::{ErrorKind, PaperError};
