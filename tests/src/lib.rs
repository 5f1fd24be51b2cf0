//! # QCC Test Suite
//!
//! End-to-end scenarios against a fully wired assembler (mock provider
//! gateway, real security gate, runtime, and ledger) plus property suites
//! for the system invariants.

pub mod support;

#[cfg(test)]
mod integration;
