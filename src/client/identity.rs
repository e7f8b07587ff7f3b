//! Session identity resolution.
//!
//! The user id is resolved before the socket is opened, either from
//! configuration or by asking on a reader, so connecting never blocks on
//! input.

use std::io::{BufRead, Write};
use std::sync::atomic::{AtomicI64, Ordering};

use anyhow::{Context, Result};
use chrono::Utc;

/// Who is connecting. Built once per connection and never mutated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionIdentity {
    pub user_id: String,
    pub session_id: String,
    pub auth_token: Option<String>,
}

impl SessionIdentity {
    /// Create an identity with a freshly generated session id.
    pub fn new(user_id: impl Into<String>, auth_token: Option<String>) -> Self {
        Self {
            user_id: user_id.into(),
            session_id: next_session_id(),
            auth_token,
        }
    }
}

/// Where the user id comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IdentitySource {
    /// Use this id as-is.
    Fixed(String),
    /// Ask for an id, falling back to `default` on an empty answer.
    Prompt { default: String },
}

impl IdentitySource {
    /// Resolve the user id, prompting on `input`/`output` when required.
    pub fn resolve<R: BufRead, W: Write>(&self, input: &mut R, output: &mut W) -> Result<String> {
        match self {
            Self::Fixed(user_id) => Ok(user_id.clone()),
            Self::Prompt { default } => {
                write!(output, "Please enter your username [{default}]: ")
                    .context("failed to write prompt")?;
                output.flush().context("failed to flush prompt")?;

                let mut line = String::new();
                input
                    .read_line(&mut line)
                    .context("failed to read username")?;

                let answer = line.trim();
                if answer.is_empty() {
                    Ok(default.clone())
                } else {
                    Ok(answer.to_string())
                }
            }
        }
    }
}

static LAST_SESSION_MILLIS: AtomicI64 = AtomicI64::new(0);

/// Generate `session_<millis>`, strictly increasing within the process.
///
/// Two calls in the same millisecond get consecutive values, so ids stay
/// unique even when connections are opened back to back.
pub fn next_session_id() -> String {
    let now = Utc::now().timestamp_millis();
    let mut last = LAST_SESSION_MILLIS.load(Ordering::Relaxed);
    loop {
        let candidate = now.max(last + 1);
        match LAST_SESSION_MILLIS.compare_exchange_weak(
            last,
            candidate,
            Ordering::Relaxed,
            Ordering::Relaxed,
        ) {
            Ok(_) => return format!("session_{candidate}"),
            Err(actual) => last = actual,
        }
    }
}
