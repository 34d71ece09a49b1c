//! Per-operation task handles on top of the shared progress registry.
//!
//! [`TaskRunner::run_task`](runner::TaskRunner::run_task) allocates a
//! task id, hands it to a caller-supplied body together with a live
//! [`TaskView`](view::TaskView), and resolves to a single
//! [`TaskOutcome`](runner::TaskOutcome) once the registry reports a
//! terminal state for that id or the cancellation token fires.

pub mod error;
pub mod runner;
pub mod view;
