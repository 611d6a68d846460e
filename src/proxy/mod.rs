// Module: Proxy
// Port over the network-mocking proxy, plus YAML rule loading.

use std::collections::HashMap;
use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

/// Default local port the proxy listens on.
pub const DEFAULT_PROXY_PORT: u16 = 8085;

/// One mock rule: requests matching `path` (and `method`, if set) are
/// answered locally instead of reaching the network.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MockRule {
    pub path: String,
    #[serde(default)]
    pub method: Option<String>,
    pub status: u16,
    #[serde(default)]
    pub headers: HashMap<String, String>,
    #[serde(default)]
    pub body: Option<String>,
    #[serde(default)]
    pub delay_ms: Option<u64>,
}

/// Contract of the mocking proxy. Started once per orchestra; subsequent
/// `MockNetwork` commands replace the rule set without restarting.
pub trait NetworkProxy: Send + Sync {
    fn port(&self) -> u16;

    fn is_started(&self) -> bool;

    fn start(&self, rules: Vec<MockRule>) -> Result<()>;

    fn replace_rules(&self, rules: Vec<MockRule>) -> Result<()>;
}

/// Loads a rule file: a YAML sequence of mock rules.
pub fn load_rules<P: AsRef<Path>>(path: P) -> Result<Vec<MockRule>> {
    let path = path.as_ref();
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read mock rules file {}", path.display()))?;
    let rules = serde_yaml::from_str(&content)
        .with_context(|| format!("Failed to parse mock rules file {}", path.display()))?;
    Ok(rules)
}
