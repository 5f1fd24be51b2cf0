//! # QCC-01 Intent - Request Interpretation Subsystem
//!
//! Turns a natural-language request plus optional context into a prioritized
//! capability list and connection hints.
//!
//! ## Contract
//!
//! `IntentInterpreter::analyze` is a pure function of its inputs: no I/O and
//! no failure mode. An unintelligible request produces the fallback
//! capability (`text_generation` in informative mode) rather than an error.
//!
//! ## Pipeline
//!
//! 1. Normalize text (lowercase, collapse whitespace, expand abbreviations).
//! 2. Match the fixed pattern set; collect mapped capabilities, de-duplicated
//!    by name keeping the first match.
//! 3. Fall back to `text_generation` (plus `ui_rendering` when the request
//!    mentions anything visual) if nothing matched.
//! 4. Apply device adjustments from the context.
//! 5. Sort by priority and derive connection hints between capabilities that
//!    are actually present.

pub mod domain;
pub mod service;

pub use domain::normalize::normalize_text;
pub use service::IntentInterpreter;
