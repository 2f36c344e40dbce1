//! Task Envelope
//!
//! The record a router hands to a resolver, and the result it gets back.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::models::operation_name;

// == Task ==
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    #[default]
    Pending,
    Running,
    Completed,
    Error,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    pub id: String,
    /// Explicit resolver name; any resolver accepting the operation when absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resolver: Option<String>,
    #[serde(default = "empty_object")]
    pub input_data: Value,
    #[serde(default)]
    pub status: TaskStatus,
}

impl Task {
    pub fn new(id: impl Into<String>, input_data: Value) -> Self {
        Self {
            id: id.into(),
            resolver: None,
            input_data,
            status: TaskStatus::Pending,
        }
    }

    /// Addresses the task to the resolver called `name`.
    pub fn for_resolver(mut self, name: impl Into<String>) -> Self {
        self.resolver = Some(name.into());
        self
    }

    pub fn operation(&self) -> Option<&str> {
        operation_name(&self.input_data)
    }
}

fn empty_object() -> Value {
    Value::Object(Map::new())
}

// == Task Result ==
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResultStatus {
    Completed,
    Error,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskResult {
    pub task_id: String,
    pub status: ResultStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    pub output_data: Value,
}

impl TaskResult {
    pub fn completed(task_id: impl Into<String>, output_data: Value) -> Self {
        Self {
            task_id: task_id.into(),
            status: ResultStatus::Completed,
            message: None,
            output_data,
        }
    }

    pub fn error(task_id: impl Into<String>, message: impl Into<String>, output_data: Value) -> Self {
        Self {
            task_id: task_id.into(),
            status: ResultStatus::Error,
            message: Some(message.into()),
            output_data,
        }
    }

    pub fn is_completed(&self) -> bool {
        self.status == ResultStatus::Completed
    }
}
