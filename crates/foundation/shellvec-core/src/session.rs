//! Session state shared by every module run
//!
//! A session owns the capability set, the verbosity stack, the warning
//! log and the channel towards the remote interpreter. Modules receive it
//! by `&mut` for the duration of one run.

use crate::channel::{Channel, Payload};
use crate::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use uuid::Uuid;

/// Identifier for a class of remote interpreter a vector targets.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Capability(String);

impl Capability {
    pub fn new(tag: impl Into<String>) -> Self {
        Self(tag.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Capability {
    fn from(tag: &str) -> Self {
        Self::new(tag)
    }
}

pub type CapabilitySet = BTreeSet<Capability>;

/// Message class used for verbosity gating. Lower is more important.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
#[repr(u8)]
pub enum Severity {
    Critical = 1,
    Error = 2,
    Notice = 3,
    Debug = 4,
}

#[derive(Debug, Clone)]
pub struct Warning {
    pub at: DateTime<Utc>,
    pub module: String,
    pub message: String,
}

/// Append-only record of every warning printed during the session.
#[derive(Debug, Default)]
pub struct WarningLog {
    entries: Vec<Warning>,
}

impl WarningLog {
    pub fn push(&mut self, module: &str, message: &str) {
        self.entries.push(Warning {
            at: Utc::now(),
            module: module.to_string(),
            message: message.to_string(),
        });
    }

    pub fn entries(&self) -> &[Warning] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Messages joined one per line, as the "last warnings" view shows them.
    pub fn text(&self) -> String {
        self.entries
            .iter()
            .map(|w| format!("{}\n", w.message))
            .collect()
    }

    /// Take every entry, leaving the log empty.
    pub fn drain(&mut self) -> Vec<Warning> {
        std::mem::take(&mut self.entries)
    }
}

pub struct Session {
    id: Uuid,
    capabilities: CapabilitySet,
    /// Active verbosity levels, most specific last. Empty prints everything.
    verbosity: Vec<u8>,
    warnings: WarningLog,
    channel: Box<dyn Channel>,
    echo: bool,
}

impl Session {
    pub fn new(channel: Box<dyn Channel>) -> Self {
        Self {
            id: Uuid::new_v4(),
            capabilities: CapabilitySet::new(),
            verbosity: Vec::new(),
            warnings: WarningLog::default(),
            channel,
            echo: true,
        }
    }

    pub fn with_capabilities<I, C>(mut self, capabilities: I) -> Self
    where
        I: IntoIterator<Item = C>,
        C: Into<Capability>,
    {
        self.capabilities = capabilities.into_iter().map(Into::into).collect();
        self
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn capabilities(&self) -> &CapabilitySet {
        &self.capabilities
    }

    pub fn add_capability(&mut self, capability: impl Into<Capability>) {
        self.capabilities.insert(capability.into());
    }

    pub fn push_verbosity(&mut self, level: u8) {
        self.verbosity.push(level);
    }

    pub fn pop_verbosity(&mut self) -> Option<u8> {
        self.verbosity.pop()
    }

    /// Print to stdout or stay silent; the warning log records either way.
    pub fn set_echo(&mut self, echo: bool) {
        self.echo = echo;
    }

    pub fn warnings(&self) -> &WarningLog {
        &self.warnings
    }

    /// Explicit session reset of the warning log.
    pub fn reset_warnings(&mut self) -> Vec<Warning> {
        self.warnings.drain()
    }

    fn allows(&self, severity: Severity) -> bool {
        match self.verbosity.last() {
            None => true,
            Some(level) => severity as u8 <= *level,
        }
    }

    /// Print a message attributed to `module` (no prefix when empty),
    /// subject to the verbosity stack.
    pub fn emit(&mut self, module: &str, message: &str, severity: Severity) {
        if !self.allows(severity) {
            return;
        }

        if self.echo {
            if module.is_empty() {
                println!("{}", message);
            } else {
                println!("[{}] {}", module, message);
            }
        }
        self.warnings.push(module, message);
    }

    pub fn notice(&mut self, module: &str, message: &str) {
        self.emit(module, message, Severity::Notice);
    }

    pub fn deliver(&mut self, capability: &Capability, payload: &Payload) -> Result<Option<String>> {
        tracing::debug!(
            session = %self.id,
            capability = %capability,
            bytes = payload.body.len(),
            fields = payload.fields.len(),
            "delivering payload"
        );
        let response = self.channel.deliver(capability, payload)?;
        tracing::debug!(
            session = %self.id,
            answered = response.as_deref().map_or(false, |r| !r.is_empty()),
            "delivery returned"
        );
        Ok(response)
    }
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("id", &self.id)
            .field("capabilities", &self.capabilities)
            .field("verbosity", &self.verbosity)
            .field("warnings", &self.warnings.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channel::ReplayChannel;

    fn session() -> Session {
        let mut session = Session::new(Box::new(ReplayChannel::default()));
        session.set_echo(false);
        session
    }

    #[test]
    fn test_emit_without_verbosity_records_everything() {
        let mut s = session();
        s.emit("audit.sql", "debug detail", Severity::Debug);
        s.emit("audit.sql", "[!] Error: boom", Severity::Error);
        assert_eq!(s.warnings().len(), 2);
        assert_eq!(s.warnings().entries()[0].module, "audit.sql");
    }

    #[test]
    fn test_verbosity_gates_by_most_specific_level() {
        let mut s = session();
        s.push_verbosity(4);
        s.push_verbosity(2);
        s.emit("m", "notice", Severity::Notice);
        s.emit("m", "error", Severity::Error);
        assert_eq!(s.warnings().text(), "error\n");

        s.pop_verbosity();
        s.emit("m", "notice", Severity::Notice);
        assert_eq!(s.warnings().len(), 2);
    }

    #[test]
    fn test_reset_warnings_drains() {
        let mut s = session();
        s.notice("", "hello");
        let drained = s.reset_warnings();
        assert_eq!(drained.len(), 1);
        assert!(s.warnings().is_empty());
    }

    #[test]
    fn test_capabilities() {
        let s = session().with_capabilities(["php", "sh"]);
        assert!(s.capabilities().contains(&Capability::from("php")));
        assert!(!s.capabilities().contains(&Capability::from("perl")));
    }
}
