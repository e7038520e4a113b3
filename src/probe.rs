//! Building the synthetic checkout request sent to the vendor for each machine.

pub mod base;
pub mod body;

pub use body::{build_probe, ProbeBody, ProbePatch};
