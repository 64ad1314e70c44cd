use serde::Serialize;

use crate::client::ClientError;
use crate::error::ErrorCode;

/// Identifies one in-flight request
///
/// Tokens are issued in increasing order. A result carrying a token that no
/// longer matches the pending one is stale and must be dropped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct RequestToken(u64);

impl RequestToken {
    pub fn value(&self) -> u64 {
        self.0
    }
}

/// Issues monotonically increasing request tokens
#[derive(Debug, Default)]
pub struct TokenIssuer {
    last: u64,
}

impl TokenIssuer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn issue(&mut self) -> RequestToken {
        self.last += 1;
        RequestToken(self.last)
    }
}

/// Why an operation was rejected, with the code and message kept apart
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OpFailure {
    pub code: Option<ErrorCode>,
    pub message: String,
    /// The view was re-fetched after this failure
    pub reconciled: bool,
}

impl OpFailure {
    pub fn new(code: Option<ErrorCode>, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            reconciled: false,
        }
    }

    pub fn reconciled(mut self) -> Self {
        self.reconciled = true;
        self
    }

    pub fn is_conflict(&self) -> bool {
        self.code.is_some_and(|c| c.is_conflict())
    }
}

impl From<&ClientError> for OpFailure {
    fn from(e: &ClientError) -> Self {
        Self::new(e.code(), e.message())
    }
}

/// Progress of a network-backed operation
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
#[serde(tag = "status", content = "value", rename_all = "snake_case")]
pub enum OpState<T> {
    #[default]
    Idle,
    Pending {
        token: RequestToken,
    },
    Confirmed(T),
    Rejected(OpFailure),
}

impl<T> OpState<T> {
    pub fn pending(token: RequestToken) -> Self {
        OpState::Pending { token }
    }

    pub fn is_pending(&self) -> bool {
        matches!(self, OpState::Pending { .. })
    }

    pub fn pending_token(&self) -> Option<RequestToken> {
        match self {
            OpState::Pending { token } => Some(*token),
            _ => None,
        }
    }

    /// True when `token` is the one this operation is waiting for
    pub fn awaits(&self, token: RequestToken) -> bool {
        self.pending_token() == Some(token)
    }

    /// Settle the operation if `token` is current; otherwise return it unchanged
    pub fn resolve(self, token: RequestToken, result: Result<T, OpFailure>) -> Self {
        if !self.awaits(token) {
            return self;
        }
        match result {
            Ok(value) => OpState::Confirmed(value),
            Err(failure) => OpState::Rejected(failure),
        }
    }

    /// Drop a pending request whose result will never arrive
    pub fn abandon(self) -> Self {
        match self {
            OpState::Pending { .. } => OpState::Idle,
            other => other,
        }
    }

    pub fn confirmed(&self) -> Option<&T> {
        match self {
            OpState::Confirmed(value) => Some(value),
            _ => None,
        }
    }

    pub fn failure(&self) -> Option<&OpFailure> {
        match self {
            OpState::Rejected(failure) => Some(failure),
            _ => None,
        }
    }
}
