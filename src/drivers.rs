//! Hardware drivers.

pub mod ocypus;
