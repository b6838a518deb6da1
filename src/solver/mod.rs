pub mod harmonic;
pub mod pinv;

pub use harmonic::{HarmonicSolution, HarmonicSolver};
pub use pinv::{pseudo_inverse, PinvTolerance, PseudoInverse};
