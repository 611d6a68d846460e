//! # Command model
//!
//! In-memory representation of a flow: the `Command` union, element
//! selectors, conditions, flow configuration, and per-command metadata.
//! The surface syntax that produces these values (YAML or otherwise) is the
//! host's concern; the orchestra only consumes the parsed shapes defined
//! here.
//!
//! ## Type hierarchy
//!
//! ```text
//! Command (tagged union, one per flow step)
//! ├── ElementSelector (declarative element query)
//! │   ├── SizeSelector (dimensions ± tolerance)
//! │   └── ElementSelector ... (positional / structural sub-selectors)
//! ├── Condition (platform, visible, notVisible, script)
//! ├── FlowConfig
//! │   └── InitFlow (app id + nested command list)
//! └── OutgoingRequestRule (network assertion matchers)
//! ```
//!
//! ## Example
//!
//! A tap command, as a host hands it over after parsing its own surface
//! syntax (serialized with the `type` tag):
//!
//! ```json
//! {
//!   "type": "tapOnElement",
//!   "selector": {
//!     "text_regex": "Login",
//!     "below": { "id_regex": "header" }
//!   }
//! }
//! ```
//!
//! Two companion records are produced during execution rather than parsed:
//! - [`AppState`]: app disk state captured by an init flow and pushed back
//!   before the main flow runs
//! - [`CommandMetadata`]: per-command execution info reported to the host
//!   through the observer

pub mod eval;

use std::collections::HashMap;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::errors::OrchestraError;

// ============================================================================
// SUPPORTING ENUMS
// ============================================================================

/// Platform reported by the driver and matched by `Condition::platform`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Platform {
    Ios,
    Android,
    Web,
}

/// Direction of a swipe gesture, named for the finger's travel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum SwipeDirection {
    Up,
    Down,
    Left,
    Right,
}

/// Pre-defined element-class predicates usable in a selector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ElementTrait {
    /// Has a non-blank `text` attribute.
    Text,
    /// Bounds are square.
    Square,
    /// Has a `text` attribute longer than 200 characters.
    LongText,
}

/// Hardware/system keys addressable via `PressKey`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum KeyCode {
    Enter,
    Backspace,
    Home,
    Back,
    VolumeUp,
    VolumeDown,
    Lock,
    Power,
    Tab,
    RemoteUp,
    RemoteDown,
    RemoteLeft,
    RemoteRight,
    RemoteCenter,
}

/// What `InputRandom` synthesizes before typing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InputRandomKind {
    /// Random lowercase letters.
    Text,
    /// Random decimal digits.
    Number,
    /// A random local part followed by `@example.com`.
    Email,
}

// ============================================================================
// POINTS
// ============================================================================

/// Absolute point in device grid coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Point {
    /// Horizontal position, in grid units from the left edge.
    pub x: i64,

    /// Vertical position, in grid units from the top edge.
    pub y: i64,
}

/// Geographic coordinate used by `SetLocation` and `Travel`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    /// Latitude in decimal degrees, positive north.
    pub latitude: f64,

    /// Longitude in decimal degrees, positive east.
    pub longitude: f64,
}

impl GeoPoint {
    /// Straight-line distance in meters, equirectangular approximation.
    /// Good enough for pacing mock-location travel.
    pub fn distance_meters(&self, other: &GeoPoint) -> f64 {
        const METERS_PER_DEGREE: f64 = 111_320.0;
        let mean_lat = ((self.latitude + other.latitude) / 2.0).to_radians();
        let dx = (other.longitude - self.longitude) * mean_lat.cos();
        let dy = other.latitude - self.latitude;
        (dx * dx + dy * dy).sqrt() * METERS_PER_DEGREE
    }
}

/// A parsed tap/swipe coordinate: either absolute grid points or
/// screen percentages.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PointTarget {
    /// Grid coordinates, e.g. parsed from `"100,200"`.
    Absolute { x: i64, y: i64 },

    /// Screen percentages in `0..=100`, e.g. parsed from `"10%,20%"`.
    Relative { x: u8, y: u8 },
}

/// Parses `"x,y"` (absolute) or `"x%,y%"` (relative, both in 0..=100).
///
/// Mixing forms or leaving the percentage range raises `InvalidCommand`.
pub fn parse_point(raw: &str) -> Result<PointTarget, OrchestraError> {
    let invalid = |raw: &str| OrchestraError::InvalidCommand {
        message: format!("Invalid point: '{raw}'"),
    };

    let (left, right) = raw.split_once(',').ok_or_else(|| invalid(raw))?;
    let left = left.trim();
    let right = right.trim();

    if raw.contains('%') {
        let percent = |component: &str| -> Option<i64> {
            component.strip_suffix('%')?.parse::<i64>().ok()
        };
        let x = percent(left).ok_or_else(|| invalid(raw))?;
        let y = percent(right).ok_or_else(|| invalid(raw))?;
        if !(0..=100).contains(&x) || !(0..=100).contains(&y) {
            return Err(invalid(raw));
        }
        Ok(PointTarget::Relative {
            x: x as u8,
            y: y as u8,
        })
    } else {
        let x = left.parse::<i64>().map_err(|_| invalid(raw))?;
        let y = right.parse::<i64>().map_err(|_| invalid(raw))?;
        Ok(PointTarget::Absolute { x, y })
    }
}

// ============================================================================
// ELEMENT SELECTOR
// ============================================================================

/// Size constraint of a selector: dimensions within ± tolerance.
#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
pub struct SizeSelector {
    /// Expected width in grid units. Absent means unconstrained.
    #[serde(default)]
    pub width: Option<i64>,

    /// Expected height in grid units. Absent means unconstrained.
    #[serde(default)]
    pub height: Option<i64>,

    /// Allowed deviation, applied to both dimensions. Defaults to 0
    /// (exact match). Ex: width 100 with tolerance 5 accepts 95..=105.
    #[serde(default)]
    pub tolerance: Option<i64>,
}

/// Declarative query describing one UI element.
///
/// All fields are independently composable; every present constraint must
/// hold for an element to match. Lookup AND-combines one filter per present
/// field, then applies `index` (if given) or prefers the first clickable
/// candidate.
#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
pub struct ElementSelector {
    /// Regex over the element's `text` attribute.
    ///
    /// Must match the entire attribute value; compiled case-insensitive,
    /// with `.` matching newline, multiline. Of all matching elements, the
    /// deepest ones win (containers repeating a leaf's text lose to the
    /// leaf). Ex: `"Login"`, `"Item \d+"`.
    #[serde(default)]
    pub text_regex: Option<String>,

    /// Regex over the element's `id` attribute, same options and
    /// deepest-match rule as `text_regex`.
    #[serde(default)]
    pub id_regex: Option<String>,

    /// Element dimensions within ± tolerance.
    #[serde(default)]
    pub size: Option<SizeSelector>,

    /// Element must sit below the closest match of this sub-selector
    /// (by bounds center). Candidates are ordered nearest-first.
    #[serde(default)]
    pub below: Option<Box<ElementSelector>>,

    /// Element must sit above the closest match of this sub-selector.
    #[serde(default)]
    pub above: Option<Box<ElementSelector>>,

    /// Element must sit left of the closest match of this sub-selector.
    #[serde(default)]
    pub left_of: Option<Box<ElementSelector>>,

    /// Element must sit right of the closest match of this sub-selector.
    #[serde(default)]
    pub right_of: Option<Box<ElementSelector>>,

    /// A direct child must match this sub-selector.
    ///
    /// The child is resolved eagerly with its own lookup against the live
    /// hierarchy, then matched by element identity.
    #[serde(default)]
    pub contains_child: Option<Box<ElementSelector>>,

    /// Every listed sub-selector must match somewhere in the element's
    /// subtree (the element itself excluded).
    #[serde(default)]
    pub contains_descendants: Option<Vec<ElementSelector>>,

    /// Pre-defined element classes the element must belong to.
    #[serde(default)]
    pub traits: Option<Vec<ElementTrait>>,

    /// Driver-reported enabled flag must equal this value.
    /// An element whose driver did not report the flag never matches.
    #[serde(default)]
    pub enabled: Option<bool>,

    /// Driver-reported selected flag must equal this value.
    #[serde(default)]
    pub selected: Option<bool>,

    /// Driver-reported checked flag must equal this value.
    #[serde(default)]
    pub checked: Option<bool>,

    /// Driver-reported focused flag must equal this value.
    #[serde(default)]
    pub focused: Option<bool>,

    /// Zero-based pick among all matches, in document order.
    /// Kept as a string because it may come from a script expression.
    #[serde(default)]
    pub index: Option<String>,

    /// When true, a missing element is a skip rather than a failure, and
    /// lookup uses the shorter optional-lookup timeout.
    #[serde(default)]
    pub optional: bool,
}

impl ElementSelector {
    /// Human-readable summary of the present constraints, in the order they
    /// are applied, joined with ", ". Used in logs and error messages.
    pub fn description(&self) -> String {
        let mut parts = Vec::new();
        if let Some(pattern) = &self.text_regex {
            parts.push(format!("Text matching regex: {pattern}"));
        }
        if let Some(pattern) = &self.id_regex {
            parts.push(format!("Id matching regex: {pattern}"));
        }
        if let Some(size) = &self.size {
            parts.push(format!(
                "Size: {}x{} (tolerance {})",
                size.width.unwrap_or(0),
                size.height.unwrap_or(0),
                size.tolerance.unwrap_or(0),
            ));
        }
        if let Some(sub) = &self.below {
            parts.push(format!("Below: {}", sub.description()));
        }
        if let Some(sub) = &self.above {
            parts.push(format!("Above: {}", sub.description()));
        }
        if let Some(sub) = &self.left_of {
            parts.push(format!("Left of: {}", sub.description()));
        }
        if let Some(sub) = &self.right_of {
            parts.push(format!("Right of: {}", sub.description()));
        }
        if let Some(sub) = &self.contains_child {
            parts.push(format!("Contains child: {}", sub.description()));
        }
        if let Some(subs) = &self.contains_descendants {
            let described: Vec<_> = subs.iter().map(|s| s.description()).collect();
            parts.push(format!("Contains descendants: [{}]", described.join("; ")));
        }
        if let Some(traits) = &self.traits {
            parts.push(format!("Has traits: {traits:?}"));
        }
        if let Some(expected) = self.enabled {
            parts.push(format!("Enabled: {expected}"));
        }
        if let Some(expected) = self.selected {
            parts.push(format!("Selected: {expected}"));
        }
        if let Some(expected) = self.checked {
            parts.push(format!("Checked: {expected}"));
        }
        if let Some(expected) = self.focused {
            parts.push(format!("Focused: {expected}"));
        }
        if let Some(index) = &self.index {
            parts.push(format!("Index: {index}"));
        }
        if parts.is_empty() {
            "Any element".to_string()
        } else {
            parts.join(", ")
        }
    }
}

// ============================================================================
// CONDITION
// ============================================================================

/// Guard evaluated by `AssertCondition`, `RunFlow`, and `Repeat`.
/// All present sub-conditions must hold. An empty condition is true.
#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
pub struct Condition {
    /// Holds only when the driver reports this platform.
    #[serde(default)]
    pub platform: Option<Platform>,

    /// Holds when an element matching this selector appears within the
    /// condition timeout. Marking the selector `optional` turns a failed
    /// assertion on it into a skip.
    #[serde(default)]
    pub visible: Option<ElementSelector>,

    /// Holds when no element matching this selector remains by the end of
    /// the condition timeout (checked with repeated short lookups).
    #[serde(default)]
    pub not_visible: Option<ElementSelector>,

    /// A script expression; by execution time this holds the already
    /// evaluated result string, classified truthy/falsey. Falsey: blank,
    /// "false" (any case), "undefined", "null", or the number zero.
    #[serde(default)]
    pub script_condition: Option<String>,
}

impl Condition {
    pub fn description(&self) -> String {
        let mut parts = Vec::new();
        if let Some(platform) = self.platform {
            parts.push(format!("Platform is {platform:?}"));
        }
        if let Some(selector) = &self.visible {
            parts.push(format!("Visible: {}", selector.description()));
        }
        if let Some(selector) = &self.not_visible {
            parts.push(format!("Not visible: {}", selector.description()));
        }
        if let Some(script) = &self.script_condition {
            parts.push(format!("Script condition: {script}"));
        }
        if parts.is_empty() {
            "True".to_string()
        } else {
            parts.join(", ")
        }
    }
}

// ============================================================================
// FLOW CONFIGURATION & STATE
// ============================================================================

/// An inner flow whose effect on app disk state is captured and reused
/// as the starting state of the outer flow.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InitFlow {
    /// App whose disk state is captured after the init flow succeeds.
    /// The app is stopped before its state is pulled.
    pub app_id: String,

    /// Commands the init flow runs, with the same semantics as a
    /// top-level flow.
    pub commands: Vec<Command>,
}

/// Flow-level configuration, carried by the first `ApplyConfiguration`
/// command in the list. More than one configuration per flow is an error.
#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
pub struct FlowConfig {
    /// App under test. Scopes element taps and `OpenLink` calls so the
    /// driver can disambiguate between foreground apps.
    #[serde(default)]
    pub app_id: Option<String>,

    /// Flow run up front to produce the starting [`AppState`]. Skipped
    /// when the host supplies a previously captured state instead.
    #[serde(default)]
    pub init_flow: Option<InitFlow>,
}

/// Captured app disk state: produced by an init flow, pushed back into the
/// app before the main flow runs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AppState {
    /// App the state belongs to.
    pub app_id: String,

    /// Opaque state-dump file, under the configured state directory
    /// (or the system temp dir). Only the driver interprets its contents.
    pub file: PathBuf,
}

// ============================================================================
// METADATA
// ============================================================================

/// Host-visible execution metadata, accumulated per raw command and
/// streamed to the observer on every change.
#[derive(Debug, Default, Clone, PartialEq, Serialize)]
pub struct CommandMetadata {
    /// Iterations a `Repeat` command has completed so far.
    /// Reset to 0 when the repeat starts, bumped after each pass.
    pub number_of_runs: Option<u32>,

    /// The command as it actually executed, script placeholders expanded.
    /// This is what UIs should display, not the raw command.
    pub evaluated_command: Option<Command>,

    /// Script log lines emitted while this command ran, in emission order,
    /// each prefixed with its level. Ex: `"[INFO] retrying login"`.
    pub log_messages: Vec<String>,
}

// ============================================================================
// OUTGOING REQUEST RULE
// ============================================================================

/// Matchers for a driver-side assertion over recorded outgoing requests.
/// All present matchers must hold for at least one recorded request.
#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutgoingRequestRule {
    /// Request path to match. Ex: `"/api/login"`.
    pub path: String,

    /// Header names that must be present, values ignored.
    /// Ex: `["Authorization"]`.
    #[serde(default)]
    pub headers_present: Vec<String>,

    /// Exact HTTP method the request must use. Ex: `"POST"`.
    #[serde(default)]
    pub http_method_is: Option<String>,

    /// Substring the request body must contain.
    #[serde(default)]
    pub request_body_contains: Option<String>,

    /// Header name/value pairs that must all match exactly.
    #[serde(default)]
    pub headers_and_values: HashMap<String, String>,
}

impl OutgoingRequestRule {
    pub fn description(&self) -> String {
        let mut parts = vec![format!("path {}", self.path)];
        if let Some(method) = &self.http_method_is {
            parts.push(format!("method {method}"));
        }
        if !self.headers_present.is_empty() {
            parts.push(format!("headers present {:?}", self.headers_present));
        }
        if !self.headers_and_values.is_empty() {
            let mut pairs: Vec<_> = self
                .headers_and_values
                .iter()
                .map(|(k, v)| format!("{k}={v}"))
                .collect();
            pairs.sort();
            parts.push(format!("headers [{}]", pairs.join(", ")));
        }
        if let Some(needle) = &self.request_body_contains {
            parts.push(format!("body contains '{needle}'"));
        }
        parts.join(", ")
    }
}

// ============================================================================
// COMMAND UNION
// ============================================================================

/// One step of a flow.
///
/// Composite commands (`Repeat`, `RunFlow`) carry nested command lists and
/// recurse through the flow driver; everything else executes directly
/// against the device driver.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum Command {
    TapOnElement {
        selector: ElementSelector,
        #[serde(default)]
        retry_if_no_change: Option<bool>,
        #[serde(default)]
        wait_until_visible: Option<bool>,
        #[serde(default)]
        long_press: Option<bool>,
    },
    TapOnPoint {
        x: i64,
        y: i64,
        #[serde(default)]
        retry_if_no_change: Option<bool>,
        #[serde(default)]
        long_press: Option<bool>,
    },
    /// Tap described by a single string: `"x,y"` or `"x%,y%"`.
    TapOnPointV2 {
        point: String,
        #[serde(default)]
        retry_if_no_change: Option<bool>,
        #[serde(default)]
        long_press: Option<bool>,
    },
    BackPress,
    HideKeyboard,
    Scroll,
    ClearKeychain,
    Paste,
    ApplyConfiguration {
        config: FlowConfig,
    },
    /// Four accepted shapes, in priority order: selector+direction,
    /// relative start/end, direction only, absolute start/end.
    Swipe {
        #[serde(default)]
        selector: Option<ElementSelector>,
        #[serde(default)]
        direction: Option<SwipeDirection>,
        #[serde(default)]
        start_relative: Option<String>,
        #[serde(default)]
        end_relative: Option<String>,
        #[serde(default)]
        start_point: Option<Point>,
        #[serde(default)]
        end_point: Option<Point>,
        duration_ms: u64,
    },
    ScrollUntilVisible {
        selector: ElementSelector,
        direction: SwipeDirection,
        timeout_ms: u64,
        scroll_duration_ms: u64,
        /// Required visible fraction in `0.0..=1.0`.
        visibility_percentage: f64,
    },
    CopyTextFrom {
        selector: ElementSelector,
    },
    AssertCondition {
        condition: Condition,
        #[serde(default)]
        timeout_ms: Option<u64>,
    },
    /// Legacy assertion form; executes exactly like `AssertCondition`.
    Assert {
        condition: Condition,
    },
    InputText {
        text: String,
    },
    InputRandom {
        kind: InputRandomKind,
        #[serde(default)]
        length: Option<usize>,
    },
    LaunchApp {
        app_id: String,
        #[serde(default)]
        clear_state: Option<bool>,
        #[serde(default)]
        clear_keychain: Option<bool>,
        #[serde(default)]
        permissions: Option<HashMap<String, String>>,
        #[serde(default)]
        launch_arguments: Option<HashMap<String, serde_json::Value>>,
        #[serde(default)]
        stop_app: Option<bool>,
    },
    OpenLink {
        link: String,
        #[serde(default)]
        auto_verify: Option<bool>,
        #[serde(default)]
        browser: Option<bool>,
    },
    PressKey {
        code: KeyCode,
    },
    EraseText {
        #[serde(default)]
        characters_to_erase: Option<usize>,
    },
    TakeScreenshot {
        path: String,
    },
    StopApp {
        app_id: String,
    },
    ClearState {
        app_id: String,
    },
    RunFlow {
        commands: Vec<Command>,
        #[serde(default)]
        condition: Option<Condition>,
    },
    SetLocation {
        latitude: f64,
        longitude: f64,
    },
    Repeat {
        commands: Vec<Command>,
        /// Iteration bound; kept as a string because it may come from a
        /// script expression ("3", "3.0", "${count}").
        #[serde(default)]
        times: Option<String>,
        #[serde(default)]
        condition: Option<Condition>,
    },
    DefineVariables {
        env: HashMap<String, String>,
    },
    RunScript {
        script: String,
        #[serde(default)]
        env: HashMap<String, String>,
        source_description: String,
    },
    EvalScript {
        script: String,
    },
    WaitForAnimationToEnd {
        #[serde(default)]
        timeout_ms: Option<u64>,
    },
    MockNetwork {
        rules_path: String,
    },
    Travel {
        points: Vec<GeoPoint>,
        #[serde(default)]
        speed_mps: Option<f64>,
    },
    AssertOutgoingRequests(OutgoingRequestRule),
}

impl Command {
    /// Nested command list of a composite command, if any.
    pub fn sub_commands(&self) -> Option<&[Command]> {
        match self {
            Command::RunFlow { commands, .. } | Command::Repeat { commands, .. } => {
                Some(commands)
            }
            _ => None,
        }
    }

    /// Human-readable label for logs and host reporting. For evaluated
    /// commands this reflects the expanded field values.
    pub fn description(&self) -> String {
        match self {
            Command::TapOnElement { selector, .. } => {
                format!("Tap on element: {}", selector.description())
            }
            Command::TapOnPoint { x, y, .. } => format!("Tap on point ({x}, {y})"),
            Command::TapOnPointV2 { point, .. } => format!("Tap on point '{point}'"),
            Command::BackPress => "Press back".to_string(),
            Command::HideKeyboard => "Hide keyboard".to_string(),
            Command::Scroll => "Scroll vertically".to_string(),
            Command::ClearKeychain => "Clear keychain".to_string(),
            Command::Paste => "Paste copied text".to_string(),
            Command::ApplyConfiguration { .. } => "Apply configuration".to_string(),
            Command::Swipe {
                selector,
                direction,
                start_relative,
                start_point,
                ..
            } => match (selector, direction, start_relative, start_point) {
                (Some(selector), Some(direction), _, _) => format!(
                    "Swipe {direction:?} on element: {}",
                    selector.description()
                ),
                (None, _, Some(start), _) => format!("Swipe from {start}"),
                (None, Some(direction), None, _) => format!("Swipe {direction:?}"),
                (None, None, None, Some(start)) => {
                    format!("Swipe from ({}, {})", start.x, start.y)
                }
                _ => "Swipe".to_string(),
            },
            Command::ScrollUntilVisible { selector, .. } => {
                format!("Scroll until visible: {}", selector.description())
            }
            Command::CopyTextFrom { selector } => {
                format!("Copy text from element: {}", selector.description())
            }
            Command::AssertCondition { condition, .. } | Command::Assert { condition } => {
                format!("Assert that {}", condition.description())
            }
            Command::InputText { text } => format!("Input text '{text}'"),
            Command::InputRandom { kind, .. } => format!("Input random {kind:?}"),
            Command::LaunchApp { app_id, .. } => format!("Launch app '{app_id}'"),
            Command::OpenLink { link, .. } => format!("Open link '{link}'"),
            Command::PressKey { code } => format!("Press key {code:?}"),
            Command::EraseText { .. } => "Erase text".to_string(),
            Command::TakeScreenshot { path } => format!("Take screenshot '{path}'"),
            Command::StopApp { app_id } => format!("Stop app '{app_id}'"),
            Command::ClearState { app_id } => format!("Clear state of '{app_id}'"),
            Command::RunFlow { commands, .. } => {
                format!("Run flow ({} commands)", commands.len())
            }
            Command::SetLocation {
                latitude,
                longitude,
            } => format!("Set location ({latitude}, {longitude})"),
            Command::Repeat { commands, .. } => {
                format!("Repeat ({} commands)", commands.len())
            }
            Command::DefineVariables { env } => {
                format!("Define {} variable(s)", env.len())
            }
            Command::RunScript {
                source_description, ..
            } => format!("Run script '{source_description}'"),
            Command::EvalScript { .. } => "Evaluate script".to_string(),
            Command::WaitForAnimationToEnd { .. } => "Wait for animation to end".to_string(),
            Command::MockNetwork { rules_path } => {
                format!("Mock network with rules '{rules_path}'")
            }
            Command::Travel { points, .. } => format!("Travel along {} point(s)", points.len()),
            Command::AssertOutgoingRequests(rule) => {
                format!("Assert outgoing requests: {}", rule.description())
            }
        }
    }
}
