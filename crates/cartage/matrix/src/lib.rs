//! Activity matrix.
//!
//! The live, frequently-mutated status view over the parcel population:
//! per-parcel status elements, the episode index, focus arbitration between
//! redundant instances, and the aging sweep. The durable record lives in the
//! parcel cache; this crate tracks only what arbitration and lifecycle
//! decisions need.

pub mod error;
pub mod matrix;

pub use error::{MatrixError, MatrixResult};
pub use matrix::{ActivityMatrix, SharedStatusElement};
