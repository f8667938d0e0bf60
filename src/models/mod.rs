//! Peak lineshape models.
//!
//! Models are implemented as small, pure functions so that the optimizer and
//! the fitter can stay generic over the parameter vector.

pub mod skewnorm;

pub use skewnorm::*;
