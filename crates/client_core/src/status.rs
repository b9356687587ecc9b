use chrono::{DateTime, Utc};
use shared::{
    domain::{TaskId, TaskStatus},
    protocol::StatusResponse,
};

use crate::view::result_link;

/// Human-readable label for a backend status code.
///
/// Unrecognized codes are passed through unchanged.
pub fn status_label(code: &str) -> &str {
    match code.parse::<TaskStatus>() {
        Ok(status) => label_for(status),
        Err(_) => code,
    }
}

pub(crate) fn label_for(status: TaskStatus) -> &'static str {
    match status {
        TaskStatus::Pending => "waiting",
        TaskStatus::InProgress => "analyzing",
        TaskStatus::WaitingHuman => "needs confirmation",
        TaskStatus::Completed => "done",
        TaskStatus::Failed => "failed",
    }
}

/// Latest status observation for a task, as shown next to the submit form.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusBadge {
    pub task_id: TaskId,
    pub status: TaskStatus,
    pub label: &'static str,
    pub message: Option<String>,
    /// Set once the status settles so the full result can be opened later.
    pub result_link: Option<String>,
    pub observed_at: DateTime<Utc>,
}

impl StatusBadge {
    pub fn observe(task_id: TaskId, response: &StatusResponse) -> Self {
        let result_link = response
            .status
            .is_terminal()
            .then(|| result_link(&task_id));
        Self {
            label: label_for(response.status),
            status: response.status,
            message: response.message.clone().filter(|m| !m.is_empty()),
            result_link,
            task_id,
            observed_at: Utc::now(),
        }
    }

    pub fn is_settled(&self) -> bool {
        self.status.is_terminal()
    }
}
