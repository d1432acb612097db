//! Reads of current process state.
//!
//! The fast path asks state nodes directly; response shapes differ between nodes and process
//! versions and go through [`bp_ao::Normalizer`]. Reads without a direct route, or whose direct
//! read failed and are not critical, are answered by a dry run on the compute unit.

pub mod cu;
pub mod domain;
mod error;
mod reader;

pub use cu::{ComputeUnitClient, DEFAULT_CU_URL};
pub use error::StateError;
pub use reader::{
    ReadRequest, Route, StateConfig, StateReader, CRITICAL_ACTIONS, DEFAULT_NODE_TIMEOUT, DEFAULT_STATE_NODE,
};
