use std::{future::Future, time::Duration};

use async_trait::async_trait;
use reqwest::{
    header::{HeaderMap, HeaderValue, AUTHORIZATION},
    Client, StatusCode,
};
use serde::Deserialize;

use crate::{
    constants::{HTTP_TIMEOUT, SOLVER_POLL_ATTEMPTS, SOLVER_POLL_DELAY, SOLVIUM_API_URL},
    error::ClaimerError,
    retry::RetryPolicy,
};

#[async_trait]
pub trait ChallengeSolver: Send + Sync {
    async fn solve(&self, challenge_token: &str) -> eyre::Result<String>;
}

#[derive(Debug, Deserialize)]
pub struct CreateTaskResponse {
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub task_id: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct TaskStatusResponse {
    pub status: String,
    #[serde(default)]
    pub result: Option<TaskResult>,
}

#[derive(Debug, Deserialize)]
pub struct TaskResult {
    #[serde(default)]
    pub solution: Option<String>,
}

impl CreateTaskResponse {
    /// The task id, provided the service acknowledged the task.
    pub fn into_task_id(self, status: StatusCode) -> Result<String, ClaimerError> {
        match (self.message.as_deref(), self.task_id) {
            (Some("Task created"), Some(task_id)) if status.is_success() && !task_id.is_empty() => {
                Ok(task_id)
            }
            (message, task_id) => Err(ClaimerError::ChallengeResolution(format!(
                "Failed to create a vercel task (status {status}, message {message:?}, task {task_id:?})"
            ))),
        }
    }
}

impl TaskStatusResponse {
    /// `Ok` once solved, `TaskPending` while the task is queued or running,
    /// `ChallengeResolution` for any other state.
    pub fn into_solution(self, task_id: &str) -> Result<String, ClaimerError> {
        match self.status.as_str() {
            "completed" => self
                .result
                .and_then(|result| result.solution)
                .ok_or_else(|| {
                    ClaimerError::ChallengeResolution(format!("Task {task_id} completed without a solution"))
                }),
            "pending" | "running" => Err(ClaimerError::TaskPending(task_id.to_owned())),
            status => Err(ClaimerError::ChallengeResolution(format!(
                "Task {task_id} finished with status {status}"
            ))),
        }
    }
}

/// Waits `delay` between polls while the task is queued or running; a failed
/// request is polled again straight away.
pub fn status_poll_policy(delay: Duration) -> RetryPolicy {
    RetryPolicy::new(SOLVER_POLL_ATTEMPTS, delay).pausing_only_after(ClaimerError::is_pending)
}

/// Polls `fetch_status` under `policy`. Pending states and request failures
/// consume an attempt; an unsolvable task ends polling at once.
pub async fn poll_task<F, Fut>(policy: RetryPolicy, task_id: &str, mut fetch_status: F) -> eyre::Result<String>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = eyre::Result<TaskStatusResponse>>,
{
    let result = policy
        .run(&format!("Polling task {task_id}"), |_| {
            let status = fetch_status();
            async move { Ok(status.await?.into_solution(task_id)?) }
        })
        .await;

    result.map_err(|err| match err.downcast::<ClaimerError>() {
        Ok(err @ ClaimerError::ChallengeResolution(_)) => err.into(),
        Ok(err) => unresolved(task_id, policy.max_attempts, err.into()),
        Err(err) => unresolved(task_id, policy.max_attempts, err),
    })
}

fn unresolved(task_id: &str, attempts: u32, last: eyre::Report) -> eyre::Report {
    ClaimerError::ChallengeResolution(format!(
        "Unable to pull task {task_id} result in {attempts} attempts: {last}"
    ))
    .into()
}

/// Client of the Solvium captcha solving service.
pub struct Solvium {
    client: Client,
    base_url: String,
    poll_policy: RetryPolicy,
}

impl Solvium {
    pub fn new(api_key: &str) -> eyre::Result<Self> {
        let mut auth = HeaderValue::from_str(&format!("Bearer {api_key}"))?;
        auth.set_sensitive(true);

        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, auth);

        let client = Client::builder()
            .default_headers(headers)
            .timeout(HTTP_TIMEOUT)
            .build()?;

        Ok(Self {
            client,
            base_url: SOLVIUM_API_URL.to_owned(),
            poll_policy: status_poll_policy(SOLVER_POLL_DELAY),
        })
    }

    pub async fn create_task(&self, challenge_token: &str) -> eyre::Result<String> {
        let response = self
            .client
            .get(format!("{}/task/vercel", self.base_url))
            .query(&[("challengeToken", challenge_token)])
            .send()
            .await?;

        let status = response.status();
        let body: CreateTaskResponse = response.json().await?;

        Ok(body.into_task_id(status)?)
    }

    async fn fetch_status(&self, task_id: &str) -> eyre::Result<TaskStatusResponse> {
        let response = self
            .client
            .get(format!("{}/task/status/{task_id}", self.base_url))
            .send()
            .await?;

        Ok(response.json().await?)
    }

    pub async fn poll_result(&self, task_id: &str) -> eyre::Result<String> {
        poll_task(self.poll_policy, task_id, || self.fetch_status(task_id)).await
    }
}

#[async_trait]
impl ChallengeSolver for Solvium {
    async fn solve(&self, challenge_token: &str) -> eyre::Result<String> {
        let task_id = self.create_task(challenge_token).await.map_err(|err| {
            if ClaimerError::is_transient(&err) {
                ClaimerError::ChallengeResolution(format!("Failed to create a vercel task: {err}")).into()
            } else {
                err
            }
        })?;

        tracing::debug!("Created solver task {task_id}");

        self.poll_result(&task_id).await
    }
}

#[cfg(test)]
mod tests {
    use std::{collections::VecDeque, sync::Mutex};

    use super::*;

    fn status(status: &str, solution: Option<&str>) -> eyre::Result<TaskStatusResponse> {
        Ok(TaskStatusResponse {
            status: status.to_owned(),
            result: Some(TaskResult {
                solution: solution.map(str::to_owned),
            }),
        })
    }

    async fn poll(script: Vec<eyre::Result<TaskStatusResponse>>) -> (eyre::Result<String>, usize) {
        poll_with(status_poll_policy(Duration::ZERO), script).await
    }

    async fn poll_with(
        policy: RetryPolicy,
        script: Vec<eyre::Result<TaskStatusResponse>>,
    ) -> (eyre::Result<String>, usize) {
        let total = script.len();
        let script = Mutex::new(VecDeque::from(script));

        let result = poll_task(policy, "task-1", || {
            let next = script
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| status("pending", None));
            async move { next }
        })
        .await;

        let remaining = script.lock().unwrap().len();
        (result, total - remaining)
    }

    #[tokio::test]
    async fn returns_solution_after_pending_states() {
        let (result, polls) = poll(vec![
            status("pending", None),
            status("running", None),
            Err(eyre::eyre!("connection reset")),
            status("completed", Some("sol-123")),
        ])
        .await;

        assert_eq!(result.unwrap(), "sol-123");
        assert_eq!(polls, 4);
    }

    #[tokio::test]
    async fn failed_status_is_terminal() {
        let (result, polls) = poll(vec![
            status("pending", None),
            status("failed", None),
            status("completed", Some("never")),
        ])
        .await;

        let err = result.unwrap_err();
        assert_eq!(polls, 2);
        assert!(matches!(
            err.downcast_ref::<ClaimerError>(),
            Some(ClaimerError::ChallengeResolution(_))
        ));
    }

    #[tokio::test]
    async fn gives_up_after_thirty_polls() {
        let script = (0..40).map(|_| status("running", None)).collect();
        let (result, polls) = poll(script).await;

        let err = result.unwrap_err();
        assert_eq!(polls, 30);
        assert!(!ClaimerError::is_transient(&err));
        assert!(err.to_string().contains("30 attempts"));
    }

    #[tokio::test]
    async fn request_failures_are_polled_again_without_waiting() {
        let policy = status_poll_policy(Duration::from_secs(30));

        let (result, polls) = tokio::time::timeout(
            Duration::from_secs(5),
            poll_with(
                policy,
                vec![
                    Err(eyre::eyre!("connection reset")),
                    Err(eyre::eyre!("connection reset")),
                    status("completed", Some("sol-9")),
                ],
            ),
        )
        .await
        .unwrap();

        assert_eq!(result.unwrap(), "sol-9");
        assert_eq!(polls, 3);
    }

    fn created(message: Option<&str>, task_id: Option<&str>) -> CreateTaskResponse {
        CreateTaskResponse {
            message: message.map(str::to_owned),
            task_id: task_id.map(str::to_owned),
        }
    }

    #[test]
    fn task_creation_requires_acknowledgement() {
        assert_eq!(
            created(Some("Task created"), Some("abc"))
                .into_task_id(StatusCode::OK)
                .unwrap(),
            "abc"
        );

        let rejected = [
            (created(Some("Insufficient balance"), Some("abc")), StatusCode::OK),
            (created(Some("Task created"), None), StatusCode::OK),
            (created(Some("Task created"), Some("")), StatusCode::OK),
            (created(None, Some("abc")), StatusCode::OK),
            (created(Some("Task created"), Some("abc")), StatusCode::TOO_MANY_REQUESTS),
        ];

        for (response, status) in rejected {
            assert!(matches!(
                response.into_task_id(status),
                Err(ClaimerError::ChallengeResolution(_))
            ));
        }
    }

    #[test]
    fn completed_without_solution_is_an_error() {
        let response = TaskStatusResponse {
            status: "completed".into(),
            result: None,
        };
        assert!(matches!(
            response.into_solution("t"),
            Err(ClaimerError::ChallengeResolution(_))
        ));
    }

    #[test]
    fn parses_service_payloads() {
        let created: CreateTaskResponse =
            serde_json::from_str(r#"{"message":"Task created","task_id":"abc"}"#).unwrap();
        assert_eq!(created.task_id.as_deref(), Some("abc"));

        let status: TaskStatusResponse =
            serde_json::from_str(r#"{"status":"completed","result":{"solution":"xyz"}}"#).unwrap();
        assert_eq!(status.into_solution("abc").unwrap(), "xyz");
    }
}
