pub mod config;
pub mod error;
pub mod graph;
pub mod pipeline;
pub mod request;
pub mod solver;
pub mod spectral;

pub use config::{ClusteringConfig, EstimatorConfig};
pub use error::{GspError, GspResult};
pub use graph::{SimilarityGraph, SimilarityGraphBuilder};
pub use pipeline::{
    detect_events, estimate, estimate_with_seeds, Activation, Appliance, ApplianceSeries,
    ClusterPair, ClusterPairer, ClusterPairing, ClusterStats, Clustering, Disaggregation,
    Disaggregator, EdgeMatcher, Estimation, Estimator, EventSet, GspClusterer,
};
pub use request::{Request, RequestLoader, Response};
pub use solver::{HarmonicSolution, HarmonicSolver, PinvTolerance};
pub use spectral::{GraphLaplacian, LaplacianPartitioner, PartitionedLaplacian, Seed, SeedSet};
