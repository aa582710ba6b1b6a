//! Collection of generic internal data types that are used widely across the epoch prover.

pub mod blob;
pub mod block;
pub mod buf;
pub mod context;
pub mod hash;
pub mod proof;
pub mod rollup;
