//! Test identity records carried in `test-start` / `test-finish` task data.
//!
//! The server sends each test as a chain of [`TestName`] nodes, innermost
//! first, each node owning its parent. Chains are built fresh per event and
//! never shared, so plain boxed ownership is enough.

use std::iter;

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TestName {
    pub display_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub suite_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub class_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub method_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent: Option<Box<TestName>>,
}

impl TestName {
    #[must_use]
    pub fn new(display_name: impl Into<String>) -> Self {
        Self {
            display_name: display_name.into(),
            suite_name: None,
            class_name: None,
            method_name: None,
            parent: None,
        }
    }

    #[must_use]
    pub fn suite(name: impl Into<String>) -> Self {
        let name = name.into();
        Self {
            suite_name: Some(name.clone()),
            ..Self::new(name)
        }
    }

    #[must_use]
    pub fn class(name: impl Into<String>) -> Self {
        let name = name.into();
        Self {
            class_name: Some(name.clone()),
            ..Self::new(name)
        }
    }

    #[must_use]
    pub fn method(name: impl Into<String>) -> Self {
        let name = name.into();
        Self {
            method_name: Some(name.clone()),
            ..Self::new(name)
        }
    }

    #[must_use]
    pub fn with_parent(mut self, parent: TestName) -> Self {
        self.parent = Some(Box::new(parent));
        self
    }

    /// The name this node contributes to a test path.
    ///
    /// Precedence is suite, then method, then class; empty strings count as absent.
    #[must_use]
    pub fn segment(&self) -> Option<&str> {
        [&self.suite_name, &self.method_name, &self.class_name]
            .into_iter()
            .filter_map(Option::as_deref)
            .find(|name| !name.is_empty())
    }

    /// Iterate from this node up to the root.
    pub fn ancestry(&self) -> impl Iterator<Item = &TestName> {
        iter::successors(Some(self), |node| node.parent.as_deref())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TestStartEx {
    pub display_name: String,
    pub test_name: TestName,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TestFinishEx {
    pub display_name: String,
    pub status: TestStatus,
    pub test_name: TestName,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stack_trace: Option<String>,
}

/// Test outcome as reported by the build server.
///
/// Unrecognised codes are kept rather than rejected at decode time so the
/// mapping to [`JavaTestStatus`] can fail with the offending value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "i64", into = "i64")]
pub enum TestStatus {
    Passed,
    Failed,
    Ignored,
    Cancelled,
    Skipped,
    Unknown(i64),
}

impl From<i64> for TestStatus {
    fn from(code: i64) -> Self {
        match code {
            1 => Self::Passed,
            2 => Self::Failed,
            3 => Self::Ignored,
            4 => Self::Cancelled,
            5 => Self::Skipped,
            other => Self::Unknown(other),
        }
    }
}

impl From<TestStatus> for i64 {
    fn from(status: TestStatus) -> Self {
        match status {
            TestStatus::Passed => 1,
            TestStatus::Failed => 2,
            TestStatus::Ignored => 3,
            TestStatus::Cancelled => 4,
            TestStatus::Skipped => 5,
            TestStatus::Unknown(code) => code,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("unsupported test status: {0}")]
pub struct UnsupportedTestStatus(pub i64);

/// Test item state understood by the IDE's test explorer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum JavaTestStatus {
    Queued = 1,
    Running = 2,
    Passed = 3,
    /// Failed on an assertion.
    Failed = 4,
    Skipped = 5,
    /// Failed for another reason (compilation error, timeout, ...).
    Errored = 6,
}

impl JavaTestStatus {
    #[must_use]
    pub const fn code(self) -> i64 {
        self as i64
    }
}

impl TryFrom<TestStatus> for JavaTestStatus {
    type Error = UnsupportedTestStatus;

    fn try_from(status: TestStatus) -> Result<Self, UnsupportedTestStatus> {
        match status {
            TestStatus::Passed => Ok(Self::Passed),
            TestStatus::Failed => Ok(Self::Failed),
            TestStatus::Ignored | TestStatus::Cancelled | TestStatus::Skipped => Ok(Self::Skipped),
            TestStatus::Unknown(code) => Err(UnsupportedTestStatus(code)),
        }
    }
}
