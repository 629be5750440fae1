use std::fmt;
use std::sync::{Arc, Mutex};

use log::debug;
use thiserror::Error;

/// 外部サービスに対する操作の種類。
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Operation {
    Fetch,
    Create,
    Update,
    Delete,
    SignIn,
    SignUp,
    SendPasswordReset,
    ChangePassword,
    RefreshSession,
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Operation::Fetch => "fetch",
            Operation::Create => "create",
            Operation::Update => "update",
            Operation::Delete => "delete",
            Operation::SignIn => "sign-in",
            Operation::SignUp => "sign-up",
            Operation::SendPasswordReset => "send-password-reset",
            Operation::ChangePassword => "change-password",
            Operation::RefreshSession => "refresh-session",
        };
        f.write_str(name)
    }
}

/// 別の操作が実行中のため開始できなかった。
#[derive(Debug, Error, PartialEq, Eq)]
#[error("{requested} was rejected: {pending} is still in flight")]
pub struct BusyError {
    pub pending: Operation,
    pub requested: Operation,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum GateState {
    Idle,
    Pending(Operation),
}

/// セッション全体で共有する実行中フラグ。
///
/// `Idle -> Pending(op) -> Idle`の状態遷移を持ち、`Pending`中の開始要求は拒否する。
/// cloneしたハンドルは同じ状態を共有する。
#[derive(Clone, Debug)]
pub struct RequestGate {
    state: Arc<Mutex<GateState>>,
}

impl Default for RequestGate {
    fn default() -> Self {
        Self::new()
    }
}

impl RequestGate {
    /// `Idle`状態の`RequestGate`を返す。
    pub fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(GateState::Idle)),
        }
    }

    /// 操作を開始する。返された`InFlight`をdropすると`Idle`に戻る。
    pub fn begin(&self, operation: Operation) -> Result<InFlight, BusyError> {
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        match *state {
            GateState::Pending(pending) => Err(BusyError {
                pending,
                requested: operation,
            }),
            GateState::Idle => {
                debug!("begin {}", operation);
                *state = GateState::Pending(operation);
                Ok(InFlight {
                    state: Arc::clone(&self.state),
                    operation,
                })
            }
        }
    }

    /// 実行中の操作。`Idle`なら`None`。
    #[cfg(test)]
    pub fn pending(&self) -> Option<Operation> {
        match *self.state.lock().unwrap_or_else(|e| e.into_inner()) {
            GateState::Idle => None,
            GateState::Pending(operation) => Some(operation),
        }
    }
}

/// 実行中の操作を表すトークン。
#[derive(Debug)]
pub struct InFlight {
    state: Arc<Mutex<GateState>>,
    operation: Operation,
}

impl Drop for InFlight {
    fn drop(&mut self) {
        debug!("end {}", self.operation);
        *self.state.lock().unwrap_or_else(|e| e.into_inner()) = GateState::Idle;
    }
}
