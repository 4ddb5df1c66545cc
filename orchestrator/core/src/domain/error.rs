// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # Error Taxonomy
//!
//! Every bounded context owns a `thiserror` enum (`ModelError`, `ToolError`,
//! `AgentError`, `NetworkError`, `ChatError`). Each of them classifies itself
//! into one [`ErrorKind`] so that an outer boundary (HTTP, CLI) can pick a
//! status without matching on every variant.
//!
//! | Kind | Meaning | HTTP hint |
//! |------|---------|-----------|
//! | `NotFound` | absent, soft-deleted or owned by another tenant | 404 |
//! | `Conflict` | uniqueness violation or blocked delete | 409 |
//! | `ValidationInvalid` | malformed or inconsistent payload/spec/config | 422 |
//! | `Disabled` | exists but administratively disabled | 422 |
//! | `UnknownCapability` | no registered implementation for a type/kind | 400 |
//! | `NotImplemented` | recognized but unsupported in this release | 501 |
//! | `Internal` | repository, cipher or other unexpected failure | 500 |

use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    NotFound,
    Conflict,
    ValidationInvalid,
    Disabled,
    UnknownCapability,
    NotImplemented,
    Internal,
}

impl ErrorKind {
    pub fn http_status(&self) -> u16 {
        match self {
            ErrorKind::NotFound => 404,
            ErrorKind::Conflict => 409,
            ErrorKind::ValidationInvalid | ErrorKind::Disabled => 422,
            ErrorKind::UnknownCapability => 400,
            ErrorKind::NotImplemented => 501,
            ErrorKind::Internal => 500,
        }
    }
}

/// Implemented by every context error so callers can classify failures
/// without knowing the concrete enum.
pub trait Classified {
    fn kind(&self) -> ErrorKind;

    /// Stable, client-facing error code such as `AGENT_NOT_FOUND`.
    fn code(&self) -> &'static str;
}
