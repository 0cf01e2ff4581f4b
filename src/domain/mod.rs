//! Domain layer - pure scoring logic with no I/O.
//!
//! This layer contains the calculators and records of the ranking system:
//! - Vote commitments and signed action messages
//! - Exponential time decay and the base hype score
//! - Great-circle distance and influence aggregation
//! - The fixed-interval request gate
//!
//! Nothing here reads a clock or touches storage; callers pass `now` in.

pub mod commitment;
pub mod decay;
pub mod gate;
pub mod geo;
pub mod hype;
pub mod influence;
pub mod model;
pub mod validation;
