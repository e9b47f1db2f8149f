//! Scripted analysis service for tests.

use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use crate::analysis::{AnalysisService, AnalysisSubmission, ChatReply, ChatRequest, ServiceError};
use crate::models::StatusReport;

/// Replays scripted status reports in order
///
/// Once the script runs out, status calls fail as unreachable.
#[derive(Debug)]
pub struct MockAnalysisService {
    job_id: String,
    reject_submit: Mutex<Option<ServiceError>>,
    script: Mutex<VecDeque<Result<StatusReport, ServiceError>>>,
    submissions: Mutex<Vec<AnalysisSubmission>>,
    status_calls: AtomicUsize,
    status_delay: Option<Duration>,
    chat_reply: Mutex<Option<Result<ChatReply, ServiceError>>>,
    chats: Mutex<Vec<ChatRequest>>,
}

impl MockAnalysisService {
    pub fn new(job_id: impl Into<String>) -> Self {
        Self {
            job_id: job_id.into(),
            reject_submit: Mutex::new(None),
            script: Mutex::new(VecDeque::new()),
            submissions: Mutex::new(Vec::new()),
            status_calls: AtomicUsize::new(0),
            status_delay: None,
            chat_reply: Mutex::new(None),
            chats: Mutex::new(Vec::new()),
        }
    }

    /// Queue a status report
    pub fn then(self, report: StatusReport) -> Self {
        lock(&self.script).push_back(Ok(report));
        self
    }

    /// Queue a transport failure
    pub fn then_error(self, error: ServiceError) -> Self {
        lock(&self.script).push_back(Err(error));
        self
    }

    /// Hold every status call for `delay` before answering
    pub fn with_status_delay(mut self, delay: Duration) -> Self {
        self.status_delay = Some(delay);
        self
    }

    /// Answer every chat request with `reply`
    pub fn replying(self, reply: ChatReply) -> Self {
        *lock(&self.chat_reply) = Some(Ok(reply));
        self
    }

    /// Fail every chat request with `error`
    pub fn failing_chat(self, error: ServiceError) -> Self {
        *lock(&self.chat_reply) = Some(Err(error));
        self
    }

    /// Make the next submission fail
    pub fn reject_submissions(self, error: ServiceError) -> Self {
        *lock(&self.reject_submit) = Some(error);
        self
    }

    pub fn submit_calls(&self) -> usize {
        lock(&self.submissions).len()
    }

    pub fn submissions(&self) -> Vec<AnalysisSubmission> {
        lock(&self.submissions).clone()
    }

    pub fn status_calls(&self) -> usize {
        self.status_calls.load(Ordering::SeqCst)
    }

    pub fn chats(&self) -> Vec<ChatRequest> {
        lock(&self.chats).clone()
    }
}

#[async_trait]
impl AnalysisService for MockAnalysisService {
    async fn submit(&self, submission: &AnalysisSubmission) -> Result<String, ServiceError> {
        lock(&self.submissions).push(submission.clone());
        if let Some(error) = lock(&self.reject_submit).take() {
            return Err(error);
        }
        Ok(self.job_id.clone())
    }

    async fn status(&self, _job_id: &str) -> Result<StatusReport, ServiceError> {
        self.status_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.status_delay {
            tokio::time::sleep(delay).await;
        }
        lock(&self.script)
            .pop_front()
            .unwrap_or_else(|| Err(ServiceError::Unreachable("script exhausted".to_string())))
    }

    async fn chat(&self, request: &ChatRequest) -> Result<ChatReply, ServiceError> {
        lock(&self.chats).push(request.clone());
        match &*lock(&self.chat_reply) {
            Some(Ok(reply)) => Ok(reply.clone()),
            Some(Err(error)) => Err(error.clone()),
            None => Err(ServiceError::Unreachable("no chat reply scripted".to_string())),
        }
    }
}

fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}
