//! # Orchestra
//!
//! The interpreter core. Owns the three ports (driver, script engine,
//! network proxy) plus the host observer, and executes flows command by
//! command:
//!
//! ```text
//! run_flow
//!   ├── extract config (first ApplyConfiguration)
//!   ├── run_init_flow ──> AppState ──> clear + push app state
//!   └── execute_commands
//!         └── per command: on_start → evaluate → metadata → execute
//!               └── composite commands recurse via run_sub_flow
//!                     (script scope pushed/popped on every exit path)
//! ```
//!
//! Lookup timeouts are decremented by the time elapsed since the last
//! mutating command, so a chain of fast commands over a settled UI does not
//! accumulate full timeouts.

mod exec;

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use tokio::time::sleep;
use tracing::{error, info};
use uuid::Uuid;

use crate::command::{
    AppState, Command, CommandMetadata, Condition, ElementSelector, FlowConfig, InitFlow,
};
use crate::driver::{DeviceInfo, Driver};
use crate::errors::OrchestraError;
use crate::filter::{self, ElementFilter};
use crate::hierarchy::{UiElement, ViewHierarchy};
use crate::observer::{ErrorResolution, FlowObserver, NoopObserver};
use crate::proxy::NetworkProxy;
use crate::script::ScriptEngine;

/// Default deadline for looking up a required element.
pub const DEFAULT_LOOKUP_TIMEOUT_MS: u64 = 17_000;
/// Default deadline for looking up an optional element.
pub const DEFAULT_OPTIONAL_LOOKUP_TIMEOUT_MS: u64 = 7_000;
/// Default number of characters erased by `EraseText`.
pub const MAX_ERASE_CHARACTERS: usize = 50;

const LOOKUP_POLL_INTERVAL_MS: u64 = 100;
pub(crate) const QUICK_LOOKUP_TIMEOUT_MS: u64 = 500;

/// Identity of a raw command's metadata record: a per-top-level-command
/// generation plus the command's address. The generation prevents a
/// reclaimed allocation in a later sibling sub-flow from aliasing an
/// earlier command's record.
type MetadataKey = (u64, usize);

/// A successful element lookup: the matched element and the hierarchy
/// snapshot it was found in.
#[derive(Debug, Clone)]
pub struct FindResult {
    pub element: UiElement,
    pub hierarchy: ViewHierarchy,
}

/// The flow interpreter. One instance drives one device; flows run strictly
/// sequentially on it.
pub struct Orchestra {
    driver: Arc<dyn Driver>,
    engine: Arc<dyn ScriptEngine>,
    proxy: Arc<dyn NetworkProxy>,
    observer: Arc<dyn FlowObserver>,
    lookup_timeout_ms: u64,
    optional_lookup_timeout_ms: u64,
    state_dir: Option<PathBuf>,
    screenshots_dir: Option<PathBuf>,
    /// Buffer written by `CopyTextFrom`, consumed by `Paste`.
    copied_text: Option<String>,
    /// Refreshed by every mutating command.
    last_interaction: Instant,
    device_info: Option<DeviceInfo>,
    metadata: Arc<Mutex<HashMap<MetadataKey, CommandMetadata>>>,
    generation: u64,
}

impl Orchestra {
    pub fn new(
        driver: Arc<dyn Driver>,
        engine: Arc<dyn ScriptEngine>,
        proxy: Arc<dyn NetworkProxy>,
    ) -> Self {
        Self {
            driver,
            engine,
            proxy,
            observer: Arc::new(NoopObserver),
            lookup_timeout_ms: DEFAULT_LOOKUP_TIMEOUT_MS,
            optional_lookup_timeout_ms: DEFAULT_OPTIONAL_LOOKUP_TIMEOUT_MS,
            state_dir: None,
            screenshots_dir: None,
            copied_text: None,
            last_interaction: Instant::now(),
            device_info: None,
            metadata: Arc::new(Mutex::new(HashMap::new())),
            generation: 0,
        }
    }

    pub fn with_observer(mut self, observer: Arc<dyn FlowObserver>) -> Self {
        self.observer = observer;
        self
    }

    pub fn with_state_dir(mut self, dir: PathBuf) -> Self {
        self.state_dir = Some(dir);
        self
    }

    pub fn with_screenshots_dir(mut self, dir: PathBuf) -> Self {
        self.screenshots_dir = Some(dir);
        self
    }

    pub fn with_lookup_timeouts(mut self, lookup_ms: u64, optional_lookup_ms: u64) -> Self {
        self.lookup_timeout_ms = lookup_ms;
        self.optional_lookup_timeout_ms = optional_lookup_ms;
        self
    }

    // ========================================================================
    // FLOW DRIVER
    // ========================================================================

    /// Runs a flow from scratch. Returns true iff every command completed
    /// (or was skipped / resolved with `Continue`).
    pub async fn run_flow(&mut self, commands: &[Command]) -> bool {
        self.run_flow_with_state(commands, None).await
    }

    /// Runs a flow, seeding the app with a previously captured state instead
    /// of running the configured init flow.
    pub async fn run_flow_with_state(
        &mut self,
        commands: &[Command],
        init_state: Option<AppState>,
    ) -> bool {
        if let Err(err) = self.engine.init() {
            error!(error = %err, "Failed to initialize script engine");
            return false;
        }
        self.last_interaction = Instant::now();
        self.device_info = None;

        let config = match extract_config(commands) {
            Ok(config) => config,
            Err(err) => {
                error!(error = %err, "Invalid flow configuration");
                return false;
            }
        };

        let state = match init_state {
            Some(state) => Some(state),
            None => {
                let init_flow = config.as_ref().and_then(|c| c.init_flow.as_ref());
                match init_flow {
                    Some(init_flow) => match self.run_init_flow(init_flow).await {
                        Some(state) => Some(state),
                        None => return false,
                    },
                    None => None,
                }
            }
        };

        if let Some(state) = &state {
            if let Err(err) = self.driver.clear_app_state(&state.app_id).await {
                error!(app_id = %state.app_id, error = %err, "Failed to clear app state");
                return false;
            }
            if let Err(err) = self.driver.push_app_state(&state.app_id, &state.file).await {
                error!(app_id = %state.app_id, error = %err, "Failed to push app state");
                return false;
            }
        }

        self.observer.on_flow_start(commands);
        self.execute_commands(commands, config.as_ref()).await
    }

    /// Runs the init flow and captures the app state it produced.
    /// Returns `None` if the flow or any state operation failed.
    async fn run_init_flow(&mut self, init_flow: &InitFlow) -> Option<AppState> {
        info!(app_id = %init_flow.app_id, "Running init flow");
        let success = Box::pin(self.run_flow_with_state(&init_flow.commands, None)).await;
        if !success {
            return None;
        }
        if let Err(err) = self.driver.stop_app(&init_flow.app_id).await {
            error!(app_id = %init_flow.app_id, error = %err, "Failed to stop app after init flow");
            return None;
        }
        let dir = self
            .state_dir
            .clone()
            .unwrap_or_else(std::env::temp_dir);
        if let Err(err) = std::fs::create_dir_all(&dir) {
            error!(dir = %dir.display(), error = %err, "Failed to create state directory");
            return None;
        }
        let file = dir.join(format!("{}.state", Uuid::new_v4()));
        if let Err(err) = self.driver.pull_app_state(&init_flow.app_id, &file).await {
            error!(app_id = %init_flow.app_id, error = %err, "Failed to pull app state");
            return None;
        }
        info!(app_id = %init_flow.app_id, file = %file.display(), "Captured init state");
        Some(AppState {
            app_id: init_flow.app_id.clone(),
            file,
        })
    }

    /// Top-level command loop. A failure consults the observer: `Continue`
    /// proceeds with the next command, `Fail` ends the flow.
    pub async fn execute_commands(
        &mut self,
        commands: &[Command],
        config: Option<&FlowConfig>,
    ) -> bool {
        for (index, command) in commands.iter().enumerate() {
            self.generation += 1;
            self.observer.on_command_start(index, command);
            info!(index, command = %command.description(), "Running command");
            match self.run_command(command, config).await {
                Ok(_) => self.observer.on_command_complete(index, command),
                Err(OrchestraError::CommandSkipped) => {
                    self.observer.on_command_skipped(index, command)
                }
                Err(err) => {
                    error!(index, error = %err, "Command failed");
                    match self.observer.on_command_failed(index, command, &err) {
                        ErrorResolution::Continue => {}
                        ErrorResolution::Fail => return false,
                    }
                }
            }
        }
        true
    }

    /// Command loop for nested flows. Differences from the top level: the
    /// script engine gets a fresh scope for the duration (popped on every
    /// exit path), and a `Fail` resolution re-raises to the caller instead
    /// of returning false. Returns true iff any sub-command mutated.
    pub(crate) async fn run_sub_flow(
        &mut self,
        commands: &[Command],
        config: Option<&FlowConfig>,
    ) -> Result<bool, OrchestraError> {
        self.engine.enter_scope();
        let result = self.run_sub_flow_inner(commands, config).await;
        self.engine.leave_scope();
        result
    }

    async fn run_sub_flow_inner(
        &mut self,
        commands: &[Command],
        config: Option<&FlowConfig>,
    ) -> Result<bool, OrchestraError> {
        let mut mutated = false;
        for (index, command) in commands.iter().enumerate() {
            self.observer.on_command_start(index, command);
            match self.run_command(command, config).await {
                Ok(command_mutated) => {
                    mutated |= command_mutated;
                    self.observer.on_command_complete(index, command);
                }
                Err(OrchestraError::CommandSkipped) => {
                    self.observer.on_command_skipped(index, command)
                }
                Err(err) => {
                    error!(index, error = %err, "Sub-flow command failed");
                    match self.observer.on_command_failed(index, command, &err) {
                        ErrorResolution::Continue => {}
                        ErrorResolution::Fail => return Err(err),
                    }
                }
            }
        }
        Ok(mutated)
    }

    /// One command's lifecycle between `on_command_start` and its terminal
    /// callback: route script logs to this command's metadata, evaluate,
    /// persist the evaluated form, execute, refresh the interaction clock if
    /// the command mutated.
    async fn run_command(
        &mut self,
        raw: &Command,
        config: Option<&FlowConfig>,
    ) -> Result<bool, OrchestraError> {
        let key = (self.generation, raw as *const Command as usize);
        self.register_log_sink(key);

        let evaluated = raw.evaluate_scripts(self.engine.as_ref())?;
        self.update_metadata(raw, key, |meta| {
            meta.evaluated_command = Some(evaluated.clone());
        });

        let logs_before = self.log_count(key);
        let result = self.execute_command(&evaluated, raw, key, config).await;
        if self.log_count(key) != logs_before {
            self.publish_metadata(raw, key);
        }

        let mutating = result?;
        if mutating {
            self.last_interaction = Instant::now();
        }
        Ok(mutating)
    }

    // ========================================================================
    // METADATA & SCRIPT LOGS
    // ========================================================================

    /// Points the script engine's log output at this command's metadata.
    /// The registration is overwritten by the next command.
    fn register_log_sink(&self, key: MetadataKey) {
        let map = Arc::clone(&self.metadata);
        self.engine.set_log_sink(Some(Arc::new(move |level, message| {
            let mut map = map.lock().expect("metadata lock poisoned");
            let meta = map.entry(key).or_default();
            meta.log_messages.push(format!("[{level}] {message}"));
        })));
    }

    pub(crate) fn update_metadata(
        &self,
        raw: &Command,
        key: MetadataKey,
        apply: impl FnOnce(&mut CommandMetadata),
    ) {
        let snapshot = {
            let mut map = self.metadata.lock().expect("metadata lock poisoned");
            let meta = map.entry(key).or_default();
            apply(meta);
            meta.clone()
        };
        self.observer.on_command_metadata_update(raw, &snapshot);
    }

    fn publish_metadata(&self, raw: &Command, key: MetadataKey) {
        let snapshot = {
            let map = self.metadata.lock().expect("metadata lock poisoned");
            map.get(&key).cloned()
        };
        if let Some(snapshot) = snapshot {
            self.observer.on_command_metadata_update(raw, &snapshot);
        }
    }

    fn log_count(&self, key: MetadataKey) -> usize {
        let map = self.metadata.lock().expect("metadata lock poisoned");
        map.get(&key).map(|m| m.log_messages.len()).unwrap_or(0)
    }

    /// Recursive reset walk before a repeat iteration re-runs its commands.
    pub(crate) fn reset_commands(&self, commands: &[Command]) {
        for command in commands {
            self.observer.on_command_reset(command);
            if let Some(sub_commands) = command.sub_commands() {
                self.reset_commands(sub_commands);
            }
        }
    }

    // ========================================================================
    // ELEMENT LOOKUP
    // ========================================================================

    /// Remaining budget after subtracting the time since the last mutating
    /// command: `max(0, timeout - elapsed)`.
    fn adjusted_to_last_interaction(&self, timeout_ms: u64) -> u64 {
        let elapsed = self.last_interaction.elapsed().as_millis() as u64;
        timeout_ms.saturating_sub(elapsed)
    }

    /// Polls the view hierarchy until the selector matches or the deadline
    /// passes. An explicit `timeout_ms` is used as-is; the default deadline
    /// (lookup or optional-lookup, per `selector.optional`) is adjusted
    /// against the interaction clock.
    pub async fn find_element(
        &mut self,
        selector: &ElementSelector,
        timeout_ms: Option<u64>,
    ) -> Result<FindResult, OrchestraError> {
        let timeout = timeout_ms.unwrap_or_else(|| {
            let base = if selector.optional {
                self.optional_lookup_timeout_ms
            } else {
                self.lookup_timeout_ms
            };
            self.adjusted_to_last_interaction(base)
        });

        let (description, element_filter) = self.build_filter(selector).await?;

        let start = Instant::now();
        loop {
            let root = self.driver.view_hierarchy().await?;
            let hierarchy = ViewHierarchy { root };
            let nodes = hierarchy.aggregate();
            let matches = element_filter(&nodes);
            if let Some(node) = matches.first() {
                return Ok(FindResult {
                    element: node.to_ui_element(),
                    hierarchy,
                });
            }
            if start.elapsed() >= Duration::from_millis(timeout) {
                return Err(OrchestraError::ElementNotFound {
                    description,
                    hierarchy,
                });
            }
            sleep(Duration::from_millis(LOOKUP_POLL_INTERVAL_MS)).await;
        }
    }

    /// Compiles a selector into `(description, filter)`. All present
    /// constraints are AND-combined; descriptions accumulate in the order
    /// the constraints are added. `contains_child` is resolved eagerly with
    /// a lookup against the live hierarchy.
    pub(crate) async fn build_filter(
        &mut self,
        selector: &ElementSelector,
    ) -> Result<(String, ElementFilter), OrchestraError> {
        let mut descriptions: Vec<String> = Vec::new();
        let mut filters: Vec<ElementFilter> = Vec::new();

        let compile = |pattern: &str| {
            filter::compile_selector_regex(pattern).map_err(|err| {
                OrchestraError::InvalidCommand {
                    message: format!("Invalid selector regex '{pattern}': {err}"),
                }
            })
        };

        if let Some(pattern) = &selector.text_regex {
            descriptions.push(format!("Text matching regex: {pattern}"));
            filters.push(filter::text_matching(compile(pattern)?));
        }
        if let Some(pattern) = &selector.id_regex {
            descriptions.push(format!("Id matching regex: {pattern}"));
            filters.push(filter::id_matching(compile(pattern)?));
        }
        if let Some(size) = &selector.size {
            descriptions.push(format!(
                "Size: {}x{} (tolerance {})",
                size.width.unwrap_or(0),
                size.height.unwrap_or(0),
                size.tolerance.unwrap_or(0),
            ));
            filters.push(filter::size_matching(size.width, size.height, size.tolerance));
        }
        if let Some(sub) = &selector.below {
            let (sub_description, sub_filter) = Box::pin(self.build_filter(sub)).await?;
            descriptions.push(format!("Below: {sub_description}"));
            filters.push(filter::below(sub_filter));
        }
        if let Some(sub) = &selector.above {
            let (sub_description, sub_filter) = Box::pin(self.build_filter(sub)).await?;
            descriptions.push(format!("Above: {sub_description}"));
            filters.push(filter::above(sub_filter));
        }
        if let Some(sub) = &selector.left_of {
            let (sub_description, sub_filter) = Box::pin(self.build_filter(sub)).await?;
            descriptions.push(format!("Left of: {sub_description}"));
            filters.push(filter::left_of(sub_filter));
        }
        if let Some(sub) = &selector.right_of {
            let (sub_description, sub_filter) = Box::pin(self.build_filter(sub)).await?;
            descriptions.push(format!("Right of: {sub_description}"));
            filters.push(filter::right_of(sub_filter));
        }
        if let Some(sub) = &selector.contains_child {
            descriptions.push(format!("Contains child: {}", sub.description()));
            let found = Box::pin(self.find_element(sub, None)).await?;
            filters.push(filter::contains_child(found.element.node));
        }
        if let Some(subs) = &selector.contains_descendants {
            let described: Vec<_> = subs.iter().map(|s| s.description()).collect();
            descriptions.push(format!("Contains descendants: [{}]", described.join("; ")));
            let mut sub_filters = Vec::with_capacity(subs.len());
            for sub in subs {
                let (_, sub_filter) = Box::pin(self.build_filter(sub)).await?;
                sub_filters.push(sub_filter);
            }
            filters.push(filter::contains_descendants(sub_filters));
        }
        if let Some(traits) = &selector.traits {
            descriptions.push(format!("Has traits: {traits:?}"));
            for element_trait in traits {
                filters.push(filter::has_trait(*element_trait));
            }
        }
        if let Some(expected) = selector.enabled {
            descriptions.push(format!("Enabled: {expected}"));
            filters.push(filter::is_enabled(expected));
        }
        if let Some(expected) = selector.selected {
            descriptions.push(format!("Selected: {expected}"));
            filters.push(filter::is_selected(expected));
        }
        if let Some(expected) = selector.checked {
            descriptions.push(format!("Checked: {expected}"));
            filters.push(filter::is_checked(expected));
        }
        if let Some(expected) = selector.focused {
            descriptions.push(format!("Focused: {expected}"));
            filters.push(filter::is_focused(expected));
        }

        let combined = filter::intersect(filters);
        let final_filter = match &selector.index {
            Some(index) => {
                descriptions.push(format!("Index: {index}"));
                let position = index.trim().parse::<f64>().unwrap_or(0.0) as usize;
                filter::index(combined, position)
            }
            None => filter::clickable_first(combined),
        };

        Ok((descriptions.join(", "), final_filter))
    }

    // ========================================================================
    // CONDITION EVALUATION
    // ========================================================================

    /// Evaluates a condition against the device. All present sub-conditions
    /// must hold.
    pub async fn evaluate_condition(
        &mut self,
        condition: &Condition,
        timeout_ms: Option<u64>,
    ) -> Result<bool, OrchestraError> {
        if let Some(platform) = condition.platform {
            let info = self.fetch_device_info().await?;
            if info.platform != platform {
                return Ok(false);
            }
        }

        if let Some(selector) = &condition.visible {
            let timeout = self
                .adjusted_to_last_interaction(timeout_ms.unwrap_or(self.optional_lookup_timeout_ms));
            match self.find_element(selector, Some(timeout)).await {
                Ok(_) => {}
                Err(OrchestraError::ElementNotFound { .. }) => return Ok(false),
                Err(err) => return Err(err),
            }
        }

        if let Some(selector) = &condition.not_visible {
            let timeout = self
                .adjusted_to_last_interaction(timeout_ms.unwrap_or(self.optional_lookup_timeout_ms));
            let start = Instant::now();
            let absent = loop {
                match self.find_element(selector, Some(QUICK_LOOKUP_TIMEOUT_MS)).await {
                    Err(OrchestraError::ElementNotFound { .. }) => break true,
                    Err(err) => return Err(err),
                    Ok(_) => {}
                }
                if start.elapsed() >= Duration::from_millis(timeout) {
                    break false;
                }
                sleep(Duration::from_millis(LOOKUP_POLL_INTERVAL_MS)).await;
            };
            if !absent {
                return Ok(false);
            }
        }

        if let Some(value) = &condition.script_condition {
            if !is_truthy(value) {
                return Ok(false);
            }
        }

        Ok(true)
    }

    /// Device facts, fetched once per flow run and cached.
    pub(crate) async fn fetch_device_info(&mut self) -> Result<DeviceInfo, OrchestraError> {
        if let Some(info) = &self.device_info {
            return Ok(info.clone());
        }
        let info = self.driver.device_info().await?;
        self.device_info = Some(info.clone());
        Ok(info)
    }
}

/// Classifies an already-evaluated script result string. Falsey values:
/// blank, "false" (any case), "undefined", "null", and anything that parses
/// to the number zero.
pub(crate) fn is_truthy(value: &str) -> bool {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return false;
    }
    if trimmed.eq_ignore_ascii_case("false") || trimmed == "undefined" || trimmed == "null" {
        return false;
    }
    if let Ok(number) = trimmed.parse::<f64>() {
        return number != 0.0;
    }
    true
}

/// Pulls the flow configuration out of the command list: the payload of the
/// single `ApplyConfiguration` command, if any. More than one is an error.
fn extract_config(commands: &[Command]) -> Result<Option<FlowConfig>, OrchestraError> {
    let mut configs = commands.iter().filter_map(|command| match command {
        Command::ApplyConfiguration { config } => Some(config),
        _ => None,
    });
    let first = configs.next().cloned();
    if configs.next().is_some() {
        return Err(OrchestraError::InvalidCommand {
            message: "Flow declares more than one configuration".to_string(),
        });
    }
    Ok(first)
}
