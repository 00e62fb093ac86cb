//! Bounded repair workflow for optimization-model change requests.
//!
//! Given a reference model, a change request and fixed input data, an agent
//! produces a modified model; the workflow runs it, asks a validator whether it
//! implements the request, and finally checks its output with the CR's
//! acceptance test. Two independent retry budgets bound the loop and every run
//! ends with exactly one termination reason.
//!
//! - **[`core`]**: Pure, deterministic logic (run state, transition table,
//!   verdict parsing, feedback). No I/O.
//! - **[`io`]**: Side-effecting collaborators (processes, agent calls, files).
//!
//! [`workflow`] drives the state machine over collaborator traits, [`plan`]
//! produces the edit plan once per run, and [`pipeline`] wires the production
//! adapters together for the CLI and the batch driver. [`baseline`] is the
//! single-shot comparison run: one generation, no validator, no retries.

pub mod baseline;
pub mod core;
pub mod exit_codes;
pub mod io;
pub mod logging;
pub mod pipeline;
pub mod plan;
#[cfg(any(test, feature = "test-support"))]
pub mod test_support;
pub mod workflow;
