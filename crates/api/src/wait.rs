//! Poll workflow statuses until they all succeed, one fails, or time runs out.

use std::thread;
use std::time::{Duration, Instant};

use cromwell_types::WorkflowStatus;
use tracing::info;

use crate::error::{ApiError, ApiResult};

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(120 * 60);
const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(30);

/// Anything that can report the current status of a workflow.
///
/// A lookup that cannot determine the status (for Cromwell, any non-200
/// answer) must return [`ApiError::WorkflowUnknown`].
pub trait WorkflowStatusSource {
    fn workflow_status(&self, workflow_id: &str) -> ApiResult<WorkflowStatus>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WaitOptions {
    pub timeout: Duration,
    pub poll_interval: Duration,
    /// Emit a status line per workflow per round. Never changes the outcome.
    pub verbose: bool,
}

impl Default for WaitOptions {
    fn default() -> Self {
        Self {
            timeout: DEFAULT_TIMEOUT,
            poll_interval: DEFAULT_POLL_INTERVAL,
            verbose: true,
        }
    }
}

impl WaitOptions {
    pub fn from_minutes_and_seconds(timeout_minutes: u64, poll_interval_seconds: u64) -> Self {
        Self {
            timeout: Duration::from_secs(timeout_minutes.saturating_mul(60)),
            poll_interval: Duration::from_secs(poll_interval_seconds),
            ..Self::default()
        }
    }
}

/// Block until every workflow in `workflow_ids` reports `Succeeded`.
///
/// The deadline is checked before each round. Within a round the first
/// workflow found in a failure state (`Failed`, `Aborted`, `Aborting`) ends
/// the wait with [`ApiError::WorkflowFailed`], and lookup errors propagate
/// immediately.
pub fn wait_for_workflows<S, I>(source: &S, workflow_ids: &[I], options: &WaitOptions) -> ApiResult<()>
where
    S: WorkflowStatusSource + ?Sized,
    I: AsRef<str>,
{
    let started = Instant::now();
    let mut round = 0u32;

    loop {
        if started.elapsed() > options.timeout {
            return Err(ApiError::WorkflowTimeout { timeout: options.timeout });
        }
        round += 1;

        let mut all_succeeded = true;
        for workflow_id in workflow_ids {
            let workflow_id = workflow_id.as_ref();
            let status = source.workflow_status(workflow_id)?;
            if options.verbose {
                info!(round, workflow_id = %workflow_id, status = %status, "workflow status");
            }
            if status.is_failure() {
                return Err(ApiError::WorkflowFailed {
                    workflow_id: workflow_id.to_string(),
                    status,
                });
            }
            if status != WorkflowStatus::Succeeded {
                all_succeeded = false;
            }
        }

        if all_succeeded {
            if options.verbose {
                info!(rounds = round, "All workflows succeeded!");
            }
            return Ok(());
        }

        thread::sleep(options.poll_interval);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::collections::{HashMap, VecDeque};

    /// Replays a scripted sequence of statuses per workflow; the last one repeats.
    struct ScriptedSource {
        scripts: RefCell<HashMap<String, VecDeque<WorkflowStatus>>>,
        lookups: RefCell<Vec<String>>,
    }

    impl ScriptedSource {
        fn new(scripts: &[(&str, &[&str])]) -> Self {
            let scripts = scripts
                .iter()
                .map(|(id, statuses)| (id.to_string(), statuses.iter().map(|s| WorkflowStatus::from(*s)).collect()))
                .collect();
            Self {
                scripts: RefCell::new(scripts),
                lookups: RefCell::new(Vec::new()),
            }
        }
    }

    impl WorkflowStatusSource for ScriptedSource {
        fn workflow_status(&self, workflow_id: &str) -> ApiResult<WorkflowStatus> {
            self.lookups.borrow_mut().push(workflow_id.to_string());
            let mut scripts = self.scripts.borrow_mut();
            let Some(script) = scripts.get_mut(workflow_id) else {
                return Err(ApiError::WorkflowUnknown {
                    workflow_id: workflow_id.to_string(),
                    status_code: 404,
                });
            };
            let status = if script.len() > 1 { script.pop_front() } else { script.front().cloned() };
            Ok(status.unwrap_or(WorkflowStatus::Running))
        }
    }

    fn fast(timeout: Duration) -> WaitOptions {
        WaitOptions {
            timeout,
            poll_interval: Duration::from_millis(1),
            verbose: false,
        }
    }

    #[test]
    fn returns_once_every_workflow_succeeds() {
        let source = ScriptedSource::new(&[
            ("wf-1", &["Submitted", "Running", "Succeeded"]),
            ("wf-2", &["Running", "Succeeded"]),
        ]);
        wait_for_workflows(&source, &["wf-1", "wf-2"], &fast(Duration::from_secs(5))).unwrap();
        assert_eq!(source.lookups.borrow().len(), 6);
    }

    #[test]
    fn failure_in_the_same_round_as_success_fails_the_wait() {
        let source = ScriptedSource::new(&[("wf-1", &["Succeeded"]), ("wf-2", &["Failed"])]);
        let error = wait_for_workflows(&source, &["wf-1", "wf-2"], &fast(Duration::from_secs(5))).unwrap_err();
        assert!(
            matches!(error, ApiError::WorkflowFailed { ref workflow_id, ref status } if workflow_id == "wf-2" && *status == WorkflowStatus::Failed)
        );
    }

    #[test]
    fn failure_stops_polling_remaining_workflows() {
        let source = ScriptedSource::new(&[("wf-1", &["Aborting"]), ("wf-2", &["Running"])]);
        let error = wait_for_workflows(&source, &["wf-1", "wf-2"], &fast(Duration::from_secs(5))).unwrap_err();
        assert!(matches!(error, ApiError::WorkflowFailed { .. }));
        assert_eq!(*source.lookups.borrow(), vec!["wf-1".to_string()]);
    }

    #[test]
    fn times_out_when_timeout_is_shorter_than_poll_interval() {
        let source = ScriptedSource::new(&[("wf-1", &["Running"])]);
        let options = WaitOptions {
            timeout: Duration::from_millis(10),
            poll_interval: Duration::from_millis(50),
            verbose: true,
        };
        let error = wait_for_workflows(&source, &["wf-1"], &options).unwrap_err();
        assert!(matches!(error, ApiError::WorkflowTimeout { timeout } if timeout == Duration::from_millis(10)));
        assert_eq!(source.lookups.borrow().len(), 1);
    }

    #[test]
    fn unknown_workflows_abort_the_wait() {
        let source = ScriptedSource::new(&[]);
        let error = wait_for_workflows(&source, &["missing"], &fast(Duration::from_secs(5))).unwrap_err();
        assert!(matches!(error, ApiError::WorkflowUnknown { status_code: 404, .. }));
    }

    #[test]
    fn verbosity_does_not_change_the_outcome() {
        for verbose in [true, false] {
            let source = ScriptedSource::new(&[("wf-1", &["Running", "Succeeded"])]);
            let options = WaitOptions {
                verbose,
                ..fast(Duration::from_secs(5))
            };
            assert!(wait_for_workflows(&source, &["wf-1"], &options).is_ok());
        }
    }
}
