use std::io;
use std::process::{Child, Command, Stdio};

use super::identity::SessionIdentity;

/// External data source started once the handshake has been sent.
///
/// The dashboard only tells a collector to start; what it collects and how
/// it reaches the backend is up to the collector.
pub trait Collector {
    fn start(&mut self, identity: &SessionIdentity) -> io::Result<()>;
}

/// Spawns a configured program, passing the session through the
/// environment:
///
/// - `RISKWATCH_ENDPOINT`
/// - `RISKWATCH_USER_ID`
/// - `RISKWATCH_SESSION_ID`
///
/// The child is killed when the collector is dropped, i.e. when the
/// dashboard session ends.
#[derive(Debug)]
pub struct CommandCollector {
    program: String,
    args: Vec<String>,
    endpoint: String,
    child: Option<Child>,
}

impl CommandCollector {
    pub fn new(program: impl Into<String>, args: Vec<String>, endpoint: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args,
            endpoint: endpoint.into(),
            child: None,
        }
    }

    /// Process id of the running collector, if started.
    pub fn pid(&self) -> Option<u32> {
        self.child.as_ref().map(Child::id)
    }
}

impl Collector for CommandCollector {
    fn start(&mut self, identity: &SessionIdentity) -> io::Result<()> {
        if self.child.is_some() {
            return Ok(());
        }

        let child = Command::new(&self.program)
            .args(&self.args)
            .env("RISKWATCH_ENDPOINT", &self.endpoint)
            .env("RISKWATCH_USER_ID", &identity.user_id)
            .env("RISKWATCH_SESSION_ID", &identity.session_id)
            .stdin(Stdio::null())
            .spawn()?;

        tracing::info!(program = %self.program, pid = child.id(), "collector started");
        self.child = Some(child);
        Ok(())
    }
}

impl Drop for CommandCollector {
    fn drop(&mut self) {
        if let Some(mut child) = self.child.take() {
            if let Ok(None) = child.try_wait() {
                let _ = child.kill();
            }
            let _ = child.wait();
        }
    }
}
