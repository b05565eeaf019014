//! Mocks of the crate's seams, for tests in this crate and in services built on it.
mod mocks;

pub use mocks::*;
