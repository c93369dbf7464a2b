//
//  octopus-client
//  api/resources/tasks.rs
//
//  Created by Ngonidzashe Mangudya on 2026/01/12.
//  Copyright (c) 2025 IAMNGONI. All rights reserved.
//

//! # Server Tasks
//!
//! Deployments run as server tasks. A task moves from `Queued` to `Executing`
//! and ends in one of the terminal states `Success`, `Failed`, `Canceled` or
//! `TimedOut`. `Cancelling` is a transient state between a cancel request and
//! `Canceled`.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::impl_resource;
use crate::api::links::Links;

/// Relation that cancels a running task.
pub const CANCEL: &str = "Cancel";

/// Lifecycle state of a server task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TaskState {
    Queued,
    Executing,
    Cancelling,
    Success,
    Failed,
    Canceled,
    TimedOut,
    /// A state this client does not know about
    #[serde(other)]
    Unknown,
}

impl TaskState {
    /// Returns `true` once the task can no longer change state.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            Self::Success | Self::Failed | Self::Canceled | Self::TimedOut
        )
    }

    /// Returns `true` only for [`TaskState::Success`].
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success)
    }
}

impl fmt::Display for TaskState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Queued => "Queued",
            Self::Executing => "Executing",
            Self::Cancelling => "Cancelling",
            Self::Success => "Success",
            Self::Failed => "Failed",
            Self::Canceled => "Canceled",
            Self::TimedOut => "TimedOut",
            Self::Unknown => "Unknown",
        };
        f.write_str(label)
    }
}

/// A server task.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct TaskResource {
    pub id: String,

    #[serde(default)]
    pub name: String,

    #[serde(default)]
    pub description: String,

    pub state: TaskState,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub queue_time: Option<DateTime<Utc>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub queue_time_expiry: Option<DateTime<Utc>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_time: Option<DateTime<Utc>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_time: Option<DateTime<Utc>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,

    #[serde(default)]
    pub links: Links,

    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl_resource!(TaskResource, "task");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_terminal_states() {
        assert!(TaskState::Success.is_terminal());
        assert!(TaskState::Failed.is_terminal());
        assert!(TaskState::Canceled.is_terminal());
        assert!(TaskState::TimedOut.is_terminal());
        assert!(!TaskState::Queued.is_terminal());
        assert!(!TaskState::Executing.is_terminal());
        assert!(!TaskState::Cancelling.is_terminal());
    }

    #[test]
    fn test_unknown_state_parses() {
        let task: TaskResource =
            serde_json::from_str(r#"{"Id": "ServerTasks-1", "State": "Paused"}"#).unwrap();
        assert_eq!(task.state, TaskState::Unknown);
        assert!(!task.state.is_terminal());
    }
}
