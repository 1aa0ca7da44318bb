//! Integration test driver for `tests/integration/` submodule.
//!
//! Each `mod` below maps to a file that drives whole requests through an
//! `RciSession` against a recording mock handler. All tests run on the
//! host with a fixed test descriptor (see `harness.rs`).

mod dynamic_collection_tests;
mod harness;
mod legacy_command_tests;
mod query_tests;
