pub mod construction;
pub mod model;

pub use construction::{gaussian_weight, SimilarityGraphBuilder};
pub use model::SimilarityGraph;
