//! `gridscout-kernel` – session limits and move safety.
//!
//! It does not plan; it enforces budgets and rules.
//!
//! # Modules
//!
//! - [`budget`] – [`SessionBudget`][budget::SessionBudget]: coverage limit,
//!   wall-clock deadline computed once at session start, and the times-up
//!   latch; [`GoalVisitPolicy`][budget::GoalVisitPolicy] decides whether the
//!   return leg must pass through the goal.
//! - [`verifier`] – [`MoveVerifier`][verifier::MoveVerifier]: a rule engine
//!   that checks every movement against the discovered map before it is
//!   executed.

pub mod budget;
pub mod verifier;

pub use budget::{GoalVisitPolicy, SessionBudget};
pub use verifier::{FootprintClearanceRule, MoveIntent, MoveVerifier, Rule, VirtualWallRule};
