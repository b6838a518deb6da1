pub mod clustering;
pub mod disaggregation;
pub mod estimate;
pub mod events;
pub mod matching;
pub mod pairing;
pub mod series;

pub use clustering::{ClusterStats, Clustering, GspClusterer};
pub use disaggregation::{Appliance, Disaggregation, Disaggregator};
pub use estimate::{estimate, estimate_with_seeds, Estimation, Estimator};
pub use events::{detect_events, power_deltas, EventSet};
pub use matching::{Activation, EdgeMatcher};
pub use pairing::{normal_pdf, ClusterPair, ClusterPairer, ClusterPairing};
pub use series::{interpolate_gaps, ApplianceSeries};
