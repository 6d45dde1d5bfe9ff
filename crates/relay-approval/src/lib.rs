//! HITL Gate (C10, spec §4.7).
//!
//! Grounded on `astrid-approval::manager`'s `ApprovalHandler`/`ApprovalOutcome`
//! shape, but deliberately simplified: the teacher's allowance-store and
//! deferred-resolution queue are dropped, since spec §4.7 has no
//! allowance-caching or deferred-approval concept — only a per-call catalog
//! lookup (see DESIGN.md).

pub mod gate;

pub use gate::{InterventionOutcome, check_for_intervention};
