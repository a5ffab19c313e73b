//! Run status shared by producers and consumers.
//!
//! A single process-scoped code, polled between search iterations. Shutdown
//! is cooperative: whoever drives the loop flips the code to `Waiting`,
//! workers notice and drain, and the driver flips it to `Stopped` once every
//! thread has been joined.

use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Mutex;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum StatusCode {
    Stopped = 0,
    Running = 1,
    Waiting = 2,
}

impl StatusCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            StatusCode::Stopped => "stopped",
            StatusCode::Running => "running",
            StatusCode::Waiting => "waiting",
        }
    }
}

#[derive(Debug, Default)]
pub struct Status {
    code: AtomicU8,
    message: Mutex<String>,
}

impl Status {
    pub fn new() -> Self {
        Self {
            code: AtomicU8::new(StatusCode::Stopped as u8),
            message: Mutex::new(String::new()),
        }
    }

    pub fn code(&self) -> StatusCode {
        match self.code.load(Ordering::Acquire) {
            1 => StatusCode::Running,
            2 => StatusCode::Waiting,
            _ => StatusCode::Stopped,
        }
    }

    pub fn set_code(&self, code: StatusCode) {
        self.code.store(code as u8, Ordering::Release);
    }

    pub fn is_running(&self) -> bool {
        self.code() == StatusCode::Running
    }

    /// Free-form progress line, shown by the `status` command.
    pub fn set_message(&self, msg: impl Into<String>) {
        *self.message.lock().unwrap() = msg.into();
    }

    pub fn message(&self) -> String {
        self.message.lock().unwrap().clone()
    }
}
