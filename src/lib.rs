//! # Orchestra: flow interpreter core
//!
//! Executes declarative mobile UI automation flows against a device driver.
//! A flow is an ordered list of high-level commands (tap, input text, assert,
//! swipe, launch app, repeat, ...); the orchestra evaluates each command's
//! script placeholders, looks elements up with interaction-adjusted timeouts,
//! dispatches the command against the driver, and reports lifecycle events to
//! a host observer.
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────┐
//! │                      Orchestra                          │
//! │  (flow driver, element lookup, conditions, executor)    │
//! └───────┬──────────────────┬──────────────────┬───────────┘
//!         ▼                  ▼                  ▼
//!   ┌──────────┐      ┌────────────┐     ┌───────────┐
//!   │  Driver  │      │ScriptEngine│     │NetworkProxy│
//!   │ (device) │      │ (user JS)  │     │  (mocks)  │
//!   └──────────┘      └────────────┘     └───────────┘
//! ```
//!
//! The three ports are traits; the orchestra never talks to a device, script
//! runtime, or proxy directly. Execution is strictly sequential: one command
//! at a time, in list order.

/// Command model: the command union, selectors, conditions, configuration.
pub mod command;

/// Device driver port and device records.
pub mod driver;

/// Failure classification.
pub mod errors;

/// Selector filter combinators.
pub mod filter;

/// View-hierarchy snapshots.
pub mod hierarchy;

/// Host-facing lifecycle callbacks.
pub mod observer;

/// The interpreter itself.
pub mod orchestra;

/// Network-mocking proxy port and rule loading.
pub mod proxy;

/// Script engine port.
pub mod script;

pub use command::{
    AppState, Command, CommandMetadata, Condition, ElementSelector, FlowConfig, InitFlow,
};
pub use driver::{DeviceInfo, Driver};
pub use errors::OrchestraError;
pub use hierarchy::{Bounds, TreeNode, UiElement, ViewHierarchy};
pub use observer::{ErrorResolution, FlowObserver, NoopObserver};
pub use orchestra::{
    FindResult, Orchestra, DEFAULT_LOOKUP_TIMEOUT_MS, DEFAULT_OPTIONAL_LOOKUP_TIMEOUT_MS,
};
pub use proxy::{MockRule, NetworkProxy, DEFAULT_PROXY_PORT};
pub use script::{LogSink, ScriptEngine, ScriptLogLevel};
