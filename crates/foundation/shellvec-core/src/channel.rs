//! Delivery primitive
//!
//! The transport that actually reaches the remote interpreter lives
//! outside this workspace. Everything here only needs "deliver a payload,
//! get text or nothing back".

use crate::session::Capability;
use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, VecDeque};
use std::path::Path;

/// One request towards the remote interpreter.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Payload {
    /// Filled vector template.
    pub body: String,
    /// Named side fields travelling with the request (bulk data).
    #[serde(default)]
    pub fields: BTreeMap<String, String>,
}

impl Payload {
    pub fn new(body: impl Into<String>) -> Self {
        Self {
            body: body.into(),
            fields: BTreeMap::new(),
        }
    }

    pub fn with_field(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.fields.insert(name.into(), value.into());
        self
    }
}

pub trait Channel: Send {
    /// Send `payload` to the interpreter reached through `capability`.
    /// `None` and an empty string both mean "no output".
    fn deliver(&mut self, capability: &Capability, payload: &Payload) -> Result<Option<String>>;
}

/// A delivery as seen by a [`ReplayChannel`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Delivery {
    pub capability: Capability,
    pub payload: Payload,
}

#[derive(Debug, Default, Deserialize)]
struct ReplayScript {
    #[serde(default)]
    responses: Vec<Option<String>>,
}

/// Answers deliveries from a scripted queue and records each one.
///
/// Once the queue runs dry every further delivery gets `None`.
#[derive(Debug, Default, Clone)]
pub struct ReplayChannel {
    responses: VecDeque<Option<String>>,
    log: std::sync::Arc<std::sync::Mutex<Vec<Delivery>>>,
}

impl ReplayChannel {
    pub fn new<I, S>(responses: I) -> Self
    where
        I: IntoIterator<Item = Option<S>>,
        S: Into<String>,
    {
        Self {
            responses: responses.into_iter().map(|r| r.map(Into::into)).collect(),
            log: Default::default(),
        }
    }

    /// Load `responses:` from a YAML script.
    pub fn from_yaml_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let script: ReplayScript = serde_yaml::from_str(&content)
            .map_err(|e| Error::Config(format!("{}: {}", path.display(), e)))?;
        Ok(Self {
            responses: script.responses.into(),
            log: Default::default(),
        })
    }

    /// Handle onto the delivery record that stays valid after the channel
    /// has been boxed into a session.
    pub fn recorder(&self) -> DeliveryLog {
        DeliveryLog(self.log.clone())
    }
}

impl Channel for ReplayChannel {
    fn deliver(&mut self, capability: &Capability, payload: &Payload) -> Result<Option<String>> {
        if let Ok(mut log) = self.log.lock() {
            log.push(Delivery {
                capability: capability.clone(),
                payload: payload.clone(),
            });
        }
        Ok(self.responses.pop_front().flatten())
    }
}

/// Shared view of the deliveries made through a [`ReplayChannel`].
#[derive(Debug, Clone)]
pub struct DeliveryLog(std::sync::Arc<std::sync::Mutex<Vec<Delivery>>>);

impl DeliveryLog {
    pub fn deliveries(&self) -> Vec<Delivery> {
        self.0.lock().map(|log| log.clone()).unwrap_or_default()
    }

    pub fn len(&self) -> usize {
        self.0.lock().map(|log| log.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Logs every payload and never answers.
#[derive(Debug, Default)]
pub struct DryRunChannel;

impl Channel for DryRunChannel {
    fn deliver(&mut self, capability: &Capability, payload: &Payload) -> Result<Option<String>> {
        tracing::info!(
            capability = %capability,
            fields = ?payload.fields.keys().collect::<Vec<_>>(),
            "dry run:\n{}",
            payload.body
        );
        Ok(None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_replay_answers_in_order_then_none() {
        let mut channel = ReplayChannel::new([Some("1"), None, Some("+ok")]);
        let cap = Capability::from("php");
        let payload = Payload::new("echo 1;");

        assert_eq!(channel.deliver(&cap, &payload).unwrap().as_deref(), Some("1"));
        assert_eq!(channel.deliver(&cap, &payload).unwrap(), None);
        assert_eq!(channel.deliver(&cap, &payload).unwrap().as_deref(), Some("+ok"));
        assert_eq!(channel.deliver(&cap, &payload).unwrap(), None);
    }

    #[test]
    fn test_replay_records_deliveries_after_boxing() {
        let channel = ReplayChannel::new(Vec::<Option<String>>::new());
        let log = channel.recorder();
        let mut boxed: Box<dyn Channel> = Box::new(channel);

        let payload = Payload::new("x").with_field("abcd", "pw1\npw2");
        boxed.deliver(&Capability::from("php"), &payload).unwrap();

        let deliveries = log.deliveries();
        assert_eq!(deliveries.len(), 1);
        assert_eq!(deliveries[0].payload.fields["abcd"], "pw1\npw2");
    }

    #[test]
    fn test_replay_from_yaml() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("script.yaml");
        std::fs::write(&path, "responses:\n  - \"1\"\n  - null\n  - \"+root:toor\"\n").unwrap();

        let mut channel = ReplayChannel::from_yaml_file(&path).unwrap();
        let cap = Capability::from("php");
        let p = Payload::new("");
        assert_eq!(channel.deliver(&cap, &p).unwrap().as_deref(), Some("1"));
        assert_eq!(channel.deliver(&cap, &p).unwrap(), None);
        assert_eq!(channel.deliver(&cap, &p).unwrap().as_deref(), Some("+root:toor"));
    }

    #[test]
    fn test_replay_from_malformed_yaml_is_config_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("script.yaml");
        std::fs::write(&path, "responses: {not: a list}\n").unwrap();
        assert!(matches!(ReplayChannel::from_yaml_file(&path), Err(Error::Config(_))));
    }
}
