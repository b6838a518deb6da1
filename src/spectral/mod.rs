pub mod laplacian;
pub mod partition;

pub use laplacian::{GraphLaplacian, LaplacianPartitioner};
pub use partition::{PartitionedLaplacian, Seed, SeedSet};
