//! Test suite for the block runtime
//!
//! This module organizes tests into logical groups:
//! - `support`: a recording action resolver and a headless harness
//! - `core_tests`: the `methods` façade, registry lifecycle and list methods
//! - `integration`: end-to-end interaction → render → dispatch scenarios
//! - `example_blocks`: a custom block type written against the public API
//! - `property_tests`: list invariants over arbitrary operation sequences

#[cfg(test)]
mod support;
#[cfg(test)]
mod core_tests;
#[cfg(test)]
mod example_blocks;
