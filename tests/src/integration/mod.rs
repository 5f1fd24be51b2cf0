//! Integration and property suites.

mod concurrency;
mod invariants;
mod scenarios;
