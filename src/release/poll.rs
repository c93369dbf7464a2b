//
//  octopus-client
//  release/poll.rs
//
//  Created by Ngonidzashe Mangudya on 2026/01/12.
//  Copyright (c) 2025 IAMNGONI. All rights reserved.
//

//! # Task Polling
//!
//! Waits for a server task to reach a terminal state. Time comes from a
//! [`Clock`] and waiting goes through a [`Sleeper`], so tests can drive the
//! loop without real delays.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::api::resources::{TaskResource, TaskState, CANCEL};
use crate::api::{ApiClient, ApiError, Repository};
use crate::config::PollingOptions;

/// Source of the current time.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// The system clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Waits between polls.
#[async_trait]
pub trait Sleeper: Send + Sync {
    async fn sleep(&self, duration: Duration);
}

/// Sleeps on the tokio timer.
#[derive(Debug, Clone, Copy, Default)]
pub struct TokioSleeper;

#[async_trait]
impl Sleeper for TokioSleeper {
    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}

/// What the poller does after observing a task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PollTransition {
    /// The task reached a terminal state.
    Finished,
    /// Poll again after the interval.
    KeepWaiting,
    /// The task is still queued past its queue-time expiry.
    ScheduleExpired(DateTime<Utc>),
    /// The wait budget is spent.
    BudgetExhausted(Duration),
}

/// Decides the next step for one observation of `task`.
pub fn next_transition(
    task: &TaskResource,
    started: DateTime<Utc>,
    now: DateTime<Utc>,
    timeout: Duration,
) -> PollTransition {
    if task.state.is_terminal() {
        return PollTransition::Finished;
    }
    if task.state == TaskState::Queued {
        if let Some(expiry) = task.queue_time_expiry {
            if now > expiry {
                return PollTransition::ScheduleExpired(expiry);
            }
        }
    }
    let waited = (now - started).to_std().unwrap_or_default();
    if waited >= timeout {
        return PollTransition::BudgetExhausted(waited);
    }
    PollTransition::KeepWaiting
}

/// Polls tasks until they finish.
#[derive(Clone)]
pub struct TaskPoller {
    tasks: Repository<TaskResource>,
    clock: Arc<dyn Clock>,
    sleeper: Arc<dyn Sleeper>,
    options: PollingOptions,
    cancellation: CancellationToken,
}

impl TaskPoller {
    pub fn new(tasks: Repository<TaskResource>, options: PollingOptions) -> Self {
        Self {
            tasks,
            clock: Arc::new(SystemClock),
            sleeper: Arc::new(TokioSleeper),
            options,
            cancellation: CancellationToken::new(),
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn with_sleeper(mut self, sleeper: Arc<dyn Sleeper>) -> Self {
        self.sleeper = sleeper;
        self
    }

    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancellation = token;
        self
    }

    /// Waits for `task_id` to reach a terminal state and returns the task.
    ///
    /// A task that ends `Failed` or `Canceled` is still returned as `Ok`;
    /// callers inspect [`TaskResource::state`].
    ///
    /// # Errors
    ///
    /// - [`ApiError::ScheduleExpired`] when the task is still queued after
    ///   its queue-time expiry
    /// - [`ApiError::PollTimeoutExceeded`] when the wait budget runs out;
    ///   the task is cancelled first if the options ask for it
    /// - [`ApiError::Cancelled`] when the token fires; a cancel request is
    ///   sent for the task
    /// - Any error fetching the task
    pub async fn wait(&self, task_id: &str) -> Result<TaskResource, ApiError> {
        let started = self.clock.now();
        let mut last_state = None;

        loop {
            if self.cancellation.is_cancelled() {
                if let Ok(task) = self.tasks.get(task_id).await {
                    self.cancel(&task).await;
                }
                return Err(ApiError::Cancelled);
            }

            let task = self.tasks.get(task_id).await?;
            if last_state != Some(task.state) {
                info!("Task {} is {}", task.id, task.state);
                last_state = Some(task.state);
            }

            let now = self.clock.now();
            match next_transition(&task, started, now, self.options.timeout) {
                PollTransition::Finished => return Ok(task),
                PollTransition::ScheduleExpired(expiry) => {
                    return Err(ApiError::ScheduleExpired {
                        task_id: task.id,
                        expiry,
                    });
                }
                PollTransition::BudgetExhausted(waited) => {
                    if self.options.cancel_on_timeout {
                        self.cancel(&task).await;
                    }
                    return Err(ApiError::PollTimeoutExceeded {
                        task_id: task.id,
                        waited,
                        state: task.state.to_string(),
                    });
                }
                PollTransition::KeepWaiting => {
                    let waited = (now - started).to_std().unwrap_or_default();
                    let pause = self.options.interval.min(self.options.timeout.saturating_sub(waited));
                    debug!("Task {} still {}, waiting {:?}", task.id, task.state, pause);
                    tokio::select! {
                        _ = self.cancellation.cancelled() => {
                            self.cancel(&task).await;
                            return Err(ApiError::Cancelled);
                        }
                        _ = self.sleeper.sleep(pause) => {}
                    }
                }
            }
        }
    }

    /// Asks the server to cancel `task`. Failures are logged and ignored.
    pub async fn cancel(&self, task: &TaskResource) {
        cancel_task(self.tasks.client(), task).await;
    }
}

/// Posts to the task's `Cancel` link, logging instead of failing.
pub async fn cancel_task(client: &ApiClient, task: &TaskResource) {
    if task.state.is_terminal() {
        return;
    }
    let Some(href) = task.links.get(CANCEL) else {
        warn!("Task {} has no cancel link", task.id);
        return;
    };
    match client.post_action(href).await {
        Ok(()) => info!("Requested cancellation of task {}", task.id),
        Err(error) => warn!("Could not cancel task {}: {}", task.id, error),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::links::LinkTemplate;
    use crate::api::testing::{fixtures, MockTransport};
    use crate::api::transport::HttpMethod;
    use chrono::TimeZone;
    use serde_json::json;
    use std::sync::Mutex;

    const TASK: &str = "/api/Spaces-1/tasks/ServerTasks-1";
    const CANCEL_PATH: &str = "/api/Spaces-1/tasks/ServerTasks-1/cancel";

    struct ManualClock(Mutex<DateTime<Utc>>);

    impl ManualClock {
        fn at(now: DateTime<Utc>) -> Arc<Self> {
            Arc::new(Self(Mutex::new(now)))
        }
    }

    impl Clock for ManualClock {
        fn now(&self) -> DateTime<Utc> {
            *self.0.lock().unwrap()
        }
    }

    /// Advances the clock instead of sleeping and can fire a token after a
    /// number of sleeps.
    struct AdvancingSleeper {
        clock: Arc<ManualClock>,
        sleeps: Mutex<u32>,
        cancel_after: Option<(u32, CancellationToken)>,
    }

    #[async_trait]
    impl Sleeper for AdvancingSleeper {
        async fn sleep(&self, duration: Duration) {
            let count = {
                let mut sleeps = self.sleeps.lock().unwrap();
                *sleeps += 1;
                *sleeps
            };
            {
                let mut now = self.clock.0.lock().unwrap();
                *now += chrono::Duration::from_std(duration).unwrap();
            }
            if let Some((after, token)) = &self.cancel_after {
                if count >= *after {
                    token.cancel();
                    std::future::pending::<()>().await;
                }
            }
        }
    }

    fn start() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 1, 12, 9, 0, 0).unwrap()
    }

    fn task(state: &str, expiry: Option<DateTime<Utc>>) -> serde_json::Value {
        json!({
            "Id": "ServerTasks-1",
            "Name": "Deploy",
            "State": state,
            "QueueTimeExpiry": expiry,
            "Links": {"Self": TASK, "Cancel": CANCEL_PATH}
        })
    }

    fn poller(
        mock: &Arc<MockTransport>,
        options: PollingOptions,
        cancel_after: Option<(u32, CancellationToken)>,
    ) -> TaskPoller {
        let clock = ManualClock::at(start());
        let token = cancel_after.as_ref().map(|(_, t)| t.clone()).unwrap_or_default();
        let sleeper = AdvancingSleeper {
            clock: clock.clone(),
            sleeps: Mutex::new(0),
            cancel_after,
        };
        let tasks = Repository::new(
            fixtures::client(mock),
            LinkTemplate::new("/api/Spaces-1/tasks{/id}{?skip,take,ids,states}"),
        );
        TaskPoller::new(tasks, options)
            .with_clock(clock)
            .with_sleeper(Arc::new(sleeper))
            .with_cancellation(token)
    }

    fn options(cancel_on_timeout: bool) -> PollingOptions {
        PollingOptions {
            interval: Duration::from_secs(10),
            timeout: Duration::from_secs(60),
            cancel_on_timeout,
        }
    }

    fn parsed(value: serde_json::Value) -> TaskResource {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn test_transitions() {
        let timeout = Duration::from_secs(60);
        let later = start() + chrono::Duration::seconds(30);

        assert_eq!(
            next_transition(&parsed(task("Failed", None)), start(), later, timeout),
            PollTransition::Finished
        );
        assert_eq!(
            next_transition(&parsed(task("Executing", None)), start(), later, timeout),
            PollTransition::KeepWaiting
        );
        assert_eq!(
            next_transition(&parsed(task("Queued", Some(start()))), start(), later, timeout),
            PollTransition::ScheduleExpired(start())
        );
        assert_eq!(
            next_transition(&parsed(task("Executing", Some(start()))), start(), later, timeout),
            PollTransition::KeepWaiting
        );
        assert_eq!(
            next_transition(
                &parsed(task("Queued", None)),
                start(),
                start() + chrono::Duration::seconds(60),
                timeout
            ),
            PollTransition::BudgetExhausted(Duration::from_secs(60))
        );
    }

    #[tokio::test]
    async fn test_waits_until_terminal() {
        let mock = MockTransport::new();
        mock.respond_json(HttpMethod::Get, TASK, 200, task("Queued", None));
        mock.respond_json(HttpMethod::Get, TASK, 200, task("Executing", None));
        mock.respond_json(HttpMethod::Get, TASK, 200, task("Success", None));

        let finished = poller(&mock, options(false), None).wait("ServerTasks-1").await.unwrap();

        assert_eq!(finished.state, TaskState::Success);
        assert_eq!(mock.calls(HttpMethod::Get, TASK), 3);
    }

    #[tokio::test]
    async fn test_failed_task_is_returned() {
        let mock = MockTransport::new();
        mock.respond_json(HttpMethod::Get, TASK, 200, task("Failed", None));

        let finished = poller(&mock, options(false), None).wait("ServerTasks-1").await.unwrap();
        assert_eq!(finished.state, TaskState::Failed);
    }

    #[tokio::test]
    async fn test_budget_exhausted_without_cancel() {
        let mock = MockTransport::new();
        mock.respond_json(HttpMethod::Get, TASK, 200, task("Executing", None));

        let error = poller(&mock, options(false), None).wait("ServerTasks-1").await.unwrap_err();

        match error {
            ApiError::PollTimeoutExceeded { waited, state, .. } => {
                assert_eq!(waited, Duration::from_secs(60));
                assert_eq!(state, "Executing");
            }
            other => panic!("unexpected error: {other:?}"),
        }
        assert_eq!(mock.calls(HttpMethod::Post, CANCEL_PATH), 0);
    }

    #[tokio::test]
    async fn test_last_sleep_stops_at_the_deadline() {
        let mock = MockTransport::new();
        mock.respond_json(HttpMethod::Get, TASK, 200, task("Executing", None));
        let options = PollingOptions {
            interval: Duration::from_secs(10),
            timeout: Duration::from_secs(25),
            cancel_on_timeout: false,
        };

        let error = poller(&mock, options, None).wait("ServerTasks-1").await.unwrap_err();

        assert!(matches!(error, ApiError::PollTimeoutExceeded { waited, .. } if waited == Duration::from_secs(25)));
        assert_eq!(mock.calls(HttpMethod::Get, TASK), 4);
    }

    #[tokio::test]
    async fn test_budget_exhausted_cancels_when_asked() {
        let mock = MockTransport::new();
        mock.respond_json(HttpMethod::Get, TASK, 200, task("Executing", None));
        mock.respond(HttpMethod::Post, CANCEL_PATH, 200, "");

        let error = poller(&mock, options(true), None).wait("ServerTasks-1").await.unwrap_err();

        assert!(matches!(error, ApiError::PollTimeoutExceeded { .. }));
        assert_eq!(mock.calls(HttpMethod::Post, CANCEL_PATH), 1);
    }

    #[tokio::test]
    async fn test_expired_schedule() {
        let mock = MockTransport::new();
        let expiry = start() + chrono::Duration::seconds(15);
        mock.respond_json(HttpMethod::Get, TASK, 200, task("Queued", Some(expiry)));

        let error = poller(&mock, options(false), None).wait("ServerTasks-1").await.unwrap_err();

        assert!(matches!(error, ApiError::ScheduleExpired { expiry: e, .. } if e == expiry));
        assert_eq!(mock.calls(HttpMethod::Get, TASK), 3);
    }

    #[tokio::test]
    async fn test_cancellation_sends_cancel() {
        let mock = MockTransport::new();
        mock.respond_json(HttpMethod::Get, TASK, 200, task("Executing", None));
        mock.respond(HttpMethod::Post, CANCEL_PATH, 200, "");

        let token = CancellationToken::new();
        let error = poller(&mock, options(false), Some((1, token.clone())))
            .wait("ServerTasks-1")
            .await
            .unwrap_err();

        assert!(matches!(error, ApiError::Cancelled));
        assert!(token.is_cancelled());
        assert_eq!(mock.calls(HttpMethod::Post, CANCEL_PATH), 1);
    }

    #[tokio::test]
    async fn test_cancel_failure_is_ignored() {
        let mock = MockTransport::new();
        mock.respond(HttpMethod::Post, CANCEL_PATH, 500, "");
        let client = fixtures::client(&mock);

        cancel_task(&client, &parsed(task("Executing", None))).await;
        cancel_task(&client, &parsed(task("Success", None))).await;

        assert_eq!(mock.calls(HttpMethod::Post, CANCEL_PATH), 1);
    }
}
