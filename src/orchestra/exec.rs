// Module: Executor
// Per-command semantics against the driver. Every implementation returns a
// "mutating" flag: true iff the command may have changed device state, which
// refreshes the interaction clock in the flow driver.

use std::collections::HashMap;
use std::path::PathBuf;
use std::time::{Duration, Instant};

use rand::Rng;
use tokio::time::sleep;
use tracing::info;

use crate::command::{
    parse_point, Command, Condition, ElementSelector, FlowConfig, GeoPoint, InputRandomKind,
    OutgoingRequestRule, Point, PointTarget, SwipeDirection,
};
use crate::errors::OrchestraError;
use crate::hierarchy::ViewHierarchy;
use crate::proxy;
use crate::script::sanitize;

use super::{MetadataKey, Orchestra, MAX_ERASE_CHARACTERS, QUICK_LOOKUP_TIMEOUT_MS};

const DEFAULT_RANDOM_INPUT_LENGTH: usize = 8;
const DEFAULT_TRAVEL_SPEED_MPS: f64 = 4.0;

impl Orchestra {
    /// Dispatches one evaluated command. `raw` and `key` identify the
    /// command's metadata record (used by `Repeat` for its run counter).
    pub(crate) async fn execute_command(
        &mut self,
        command: &Command,
        raw: &Command,
        key: MetadataKey,
        config: Option<&FlowConfig>,
    ) -> Result<bool, OrchestraError> {
        match command {
            Command::TapOnElement {
                selector,
                retry_if_no_change,
                wait_until_visible,
                long_press,
            } => {
                self.tap_on_element(
                    selector,
                    retry_if_no_change.unwrap_or(true),
                    wait_until_visible.unwrap_or(false),
                    long_press.unwrap_or(false),
                    config,
                )
                .await
            }
            Command::TapOnPoint {
                x,
                y,
                retry_if_no_change,
                long_press,
            } => {
                self.driver
                    .tap_point(*x, *y, retry_if_no_change.unwrap_or(true), long_press.unwrap_or(false))
                    .await?;
                Ok(true)
            }
            Command::TapOnPointV2 {
                point,
                retry_if_no_change,
                long_press,
            } => {
                let retry = retry_if_no_change.unwrap_or(true);
                let long_press = long_press.unwrap_or(false);
                match parse_point(point)? {
                    PointTarget::Absolute { x, y } => {
                        self.driver.tap_point(x, y, retry, long_press).await?
                    }
                    PointTarget::Relative { x, y } => {
                        self.driver.tap_relative(x, y, retry, long_press).await?
                    }
                }
                Ok(true)
            }
            Command::BackPress => {
                self.driver.back_press().await?;
                Ok(true)
            }
            Command::HideKeyboard => {
                self.driver.hide_keyboard().await?;
                Ok(true)
            }
            Command::Scroll => {
                self.driver.scroll_vertical().await?;
                Ok(true)
            }
            Command::ClearKeychain => {
                self.driver.clear_keychain().await?;
                Ok(true)
            }
            Command::Paste => self.paste().await,
            // Consumed by the flow driver before dispatch.
            Command::ApplyConfiguration { .. } => Ok(false),
            Command::Swipe {
                selector,
                direction,
                start_relative,
                end_relative,
                start_point,
                end_point,
                duration_ms,
            } => {
                self.swipe(
                    selector.as_ref(),
                    *direction,
                    start_relative.as_deref(),
                    end_relative.as_deref(),
                    *start_point,
                    *end_point,
                    *duration_ms,
                )
                .await
            }
            Command::ScrollUntilVisible {
                selector,
                direction,
                timeout_ms,
                scroll_duration_ms,
                visibility_percentage,
            } => {
                self.scroll_until_visible(
                    selector,
                    *direction,
                    *timeout_ms,
                    *scroll_duration_ms,
                    *visibility_percentage,
                )
                .await
            }
            Command::CopyTextFrom { selector } => self.copy_text_from(selector).await,
            Command::AssertCondition {
                condition,
                timeout_ms,
            } => self.assert_condition(condition, *timeout_ms).await,
            Command::Assert { condition } => self.assert_condition(condition, None).await,
            Command::InputText { text } => {
                self.enter_text(text).await?;
                Ok(true)
            }
            Command::InputRandom { kind, length } => {
                let text = synthesize_random(*kind, length.unwrap_or(DEFAULT_RANDOM_INPUT_LENGTH));
                self.enter_text(&text).await?;
                Ok(true)
            }
            Command::LaunchApp {
                app_id,
                clear_state,
                clear_keychain,
                permissions,
                launch_arguments,
                stop_app,
            } => {
                self.launch_app(
                    app_id,
                    clear_state.unwrap_or(false),
                    clear_keychain.unwrap_or(false),
                    permissions.as_ref(),
                    launch_arguments.as_ref(),
                    stop_app.unwrap_or(true),
                )
                .await
            }
            Command::OpenLink {
                link,
                auto_verify,
                browser,
            } => {
                self.driver
                    .open_link(
                        link,
                        config.and_then(|c| c.app_id.as_deref()),
                        auto_verify.unwrap_or(false),
                        browser.unwrap_or(false),
                    )
                    .await?;
                Ok(true)
            }
            Command::PressKey { code } => {
                self.driver.press_key(*code).await?;
                Ok(true)
            }
            Command::EraseText {
                characters_to_erase,
            } => {
                self.driver
                    .erase_text(characters_to_erase.unwrap_or(MAX_ERASE_CHARACTERS))
                    .await?;
                self.driver.wait_for_app_to_settle().await?;
                Ok(true)
            }
            Command::TakeScreenshot { path } => {
                let file = match &self.screenshots_dir {
                    Some(dir) => dir.join(format!("{path}.png")),
                    None => PathBuf::from(format!("{path}.png")),
                };
                self.driver.take_screenshot(&file).await?;
                Ok(false)
            }
            Command::StopApp { app_id } => {
                self.driver.stop_app(app_id).await?;
                Ok(true)
            }
            Command::ClearState { app_id } => self.clear_state(app_id).await,
            Command::RunFlow {
                commands,
                condition,
            } => self.run_flow_command(commands, condition.as_ref(), config).await,
            Command::SetLocation {
                latitude,
                longitude,
            } => {
                self.driver.set_location(*latitude, *longitude).await?;
                Ok(true)
            }
            Command::Repeat {
                commands,
                times,
                condition,
            } => {
                self.repeat(commands, times.as_deref(), condition.as_ref(), raw, key, config)
                    .await
            }
            Command::DefineVariables { env } => {
                for (name, value) in env {
                    let script = format!("var {} = '{}'", name, sanitize(value));
                    self.engine
                        .evaluate(&script, &HashMap::new(), "defineVariables", false)?;
                }
                Ok(false)
            }
            Command::RunScript {
                script,
                env,
                source_description,
            } => {
                self.engine.evaluate(script, env, source_description, true)?;
                Ok(true)
            }
            Command::EvalScript { script } => {
                self.engine
                    .evaluate(script, &HashMap::new(), "evalScript", false)?;
                Ok(true)
            }
            Command::WaitForAnimationToEnd { timeout_ms } => {
                self.driver.wait_for_animation_to_end(*timeout_ms).await?;
                Ok(false)
            }
            Command::MockNetwork { rules_path } => self.mock_network(rules_path).await,
            Command::Travel { points, speed_mps } => {
                self.travel(points, speed_mps.unwrap_or(DEFAULT_TRAVEL_SPEED_MPS))
                    .await
            }
            Command::AssertOutgoingRequests(rule) => self.assert_outgoing_requests(rule).await,
        }
    }

    // ========================================================================
    // TAPS
    // ========================================================================

    async fn tap_on_element(
        &mut self,
        selector: &ElementSelector,
        retry_if_no_change: bool,
        wait_until_visible: bool,
        long_press: bool,
        config: Option<&FlowConfig>,
    ) -> Result<bool, OrchestraError> {
        match self.find_element(selector, None).await {
            Ok(found) => {
                self.driver
                    .tap_element(
                        &found.element,
                        &found.hierarchy,
                        retry_if_no_change,
                        wait_until_visible,
                        long_press,
                        config.and_then(|c| c.app_id.as_deref()),
                    )
                    .await?;
                Ok(true)
            }
            Err(OrchestraError::ElementNotFound { description, .. }) if selector.optional => {
                info!(selector = %description, "Optional element not found, skipping tap");
                Ok(false)
            }
            Err(err) => Err(err),
        }
    }

    // ========================================================================
    // SWIPES & SCROLLING
    // ========================================================================

    #[allow(clippy::too_many_arguments)]
    async fn swipe(
        &mut self,
        selector: Option<&ElementSelector>,
        direction: Option<SwipeDirection>,
        start_relative: Option<&str>,
        end_relative: Option<&str>,
        start_point: Option<Point>,
        end_point: Option<Point>,
        duration_ms: u64,
    ) -> Result<bool, OrchestraError> {
        let relative = |raw: &str| -> Result<(u8, u8), OrchestraError> {
            match parse_point(raw)? {
                PointTarget::Relative { x, y } => Ok((x, y)),
                PointTarget::Absolute { .. } => Err(OrchestraError::InvalidCommand {
                    message: format!("Relative swipe points must be percentages: '{raw}'"),
                }),
            }
        };

        match (selector, direction, start_relative, end_relative, start_point, end_point) {
            (Some(selector), Some(direction), ..) => {
                let found = self.find_element(selector, None).await?;
                self.driver
                    .swipe_element(&found.element, direction, duration_ms)
                    .await?;
            }
            (None, _, Some(start), Some(end), _, _) => {
                let start = relative(start)?;
                let end = relative(end)?;
                self.driver.swipe_relative(start, end, duration_ms).await?;
            }
            (None, Some(direction), None, None, _, _) => {
                self.driver.swipe_direction(direction, duration_ms).await?;
            }
            (None, None, None, None, Some(start), Some(end)) => {
                self.driver.swipe_points(start, end, duration_ms).await?;
            }
            _ => {
                return Err(OrchestraError::InvalidCommand {
                    message: "Illegal arguments for swiping".to_string(),
                })
            }
        }
        Ok(true)
    }

    /// Repeatedly checks for the element and swipes from screen center until
    /// it is visible above the threshold or the outer deadline passes. The
    /// outer deadline is not interaction-adjusted.
    async fn scroll_until_visible(
        &mut self,
        selector: &ElementSelector,
        direction: SwipeDirection,
        timeout_ms: u64,
        scroll_duration_ms: u64,
        visibility_percentage: f64,
    ) -> Result<bool, OrchestraError> {
        let info = self.fetch_device_info().await?;
        let deadline = Instant::now() + Duration::from_millis(timeout_ms);
        let description = selector.description();

        loop {
            if let Ok(found) = self.find_element(selector, Some(QUICK_LOOKUP_TIMEOUT_MS)).await {
                let visible = found
                    .element
                    .bounds
                    .visible_percentage(info.width_grid, info.height_grid);
                if visible >= visibility_percentage {
                    return Ok(true);
                }
            }
            self.driver
                .swipe_from_center(direction, scroll_duration_ms)
                .await?;
            if Instant::now() >= deadline {
                let root = self.driver.view_hierarchy().await?;
                return Err(OrchestraError::ElementNotFound {
                    description,
                    hierarchy: ViewHierarchy { root },
                });
            }
        }
    }

    // ========================================================================
    // ASSERTIONS
    // ========================================================================

    async fn assert_condition(
        &mut self,
        condition: &Condition,
        timeout_ms: Option<u64>,
    ) -> Result<bool, OrchestraError> {
        if !self.evaluate_condition(condition, timeout_ms).await? {
            let optional = condition.visible.as_ref().map(|s| s.optional).unwrap_or(false)
                || condition
                    .not_visible
                    .as_ref()
                    .map(|s| s.optional)
                    .unwrap_or(false);
            if optional {
                return Err(OrchestraError::CommandSkipped);
            }
            let root = self.driver.view_hierarchy().await?;
            return Err(OrchestraError::AssertionFailure {
                description: condition.description(),
                hierarchy: ViewHierarchy { root },
            });
        }
        Ok(false)
    }

    async fn assert_outgoing_requests(
        &mut self,
        rule: &OutgoingRequestRule,
    ) -> Result<bool, OrchestraError> {
        self.driver.assert_outgoing_request(rule).await.map_err(|_| {
            OrchestraError::OutgoingRequestAssertionFailure {
                description: rule.description(),
            }
        })?;
        Ok(false)
    }

    // ========================================================================
    // TEXT INPUT
    // ========================================================================

    async fn enter_text(&mut self, text: &str) -> Result<(), OrchestraError> {
        if !self.driver.is_unicode_input_supported() && !text.is_ascii() {
            return Err(OrchestraError::UnicodeNotSupported {
                text: text.to_string(),
            });
        }
        self.driver.input_text(text).await?;
        Ok(())
    }

    // ========================================================================
    // COPY & PASTE
    // ========================================================================

    async fn copy_text_from(&mut self, selector: &ElementSelector) -> Result<bool, OrchestraError> {
        let found = self.find_element(selector, None).await?;
        let text = ["text", "hintText", "accessibilityText"]
            .iter()
            .find_map(|attribute| {
                found
                    .element
                    .node
                    .attribute(attribute)
                    .filter(|value| !value.trim().is_empty())
            })
            .map(str::to_string);

        match text {
            Some(text) => {
                // Expose the buffer to user scripts as well.
                let script = format!("maestro.copiedText = '{}'", sanitize(&text));
                self.engine
                    .evaluate(&script, &HashMap::new(), "copyTextFrom", false)?;
                self.copied_text = Some(text);
                Ok(false)
            }
            None => Err(OrchestraError::UnableToCopyTextFrom {
                description: selector.description(),
            }),
        }
    }

    async fn paste(&mut self) -> Result<bool, OrchestraError> {
        match self.copied_text.clone() {
            Some(text) => {
                self.enter_text(&text).await?;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    // ========================================================================
    // APP LIFECYCLE & STATE
    // ========================================================================

    async fn launch_app(
        &mut self,
        app_id: &str,
        clear_state: bool,
        clear_keychain: bool,
        permissions: Option<&HashMap<String, String>>,
        launch_arguments: Option<&HashMap<String, serde_json::Value>>,
        stop_if_running: bool,
    ) -> Result<bool, OrchestraError> {
        let state_error = |_| OrchestraError::UnableToClearState {
            app_id: app_id.to_string(),
        };

        if clear_keychain {
            self.driver.clear_keychain().await.map_err(state_error)?;
        }
        if clear_state {
            self.driver.clear_app_state(app_id).await.map_err(state_error)?;
        }

        let permissions = permissions.cloned().unwrap_or_else(|| {
            HashMap::from([("all".to_string(), "allow".to_string())])
        });
        self.driver
            .set_permissions(app_id, &permissions)
            .await
            .map_err(state_error)?;

        info!(app_id = %app_id, "Launching app");
        let arguments = launch_arguments.cloned().unwrap_or_default();
        self.driver
            .launch_app(app_id, &arguments, stop_if_running)
            .await
            .map_err(|err| OrchestraError::UnableToLaunchApp {
                app_id: app_id.to_string(),
                cause: err.to_string(),
            })?;
        Ok(true)
    }

    async fn clear_state(&mut self, app_id: &str) -> Result<bool, OrchestraError> {
        let state_error = |_| OrchestraError::UnableToClearState {
            app_id: app_id.to_string(),
        };
        self.driver.clear_app_state(app_id).await.map_err(state_error)?;
        // Reset permissions so platforms converge on a known baseline.
        let permissions = HashMap::from([("all".to_string(), "unset".to_string())]);
        self.driver
            .set_permissions(app_id, &permissions)
            .await
            .map_err(state_error)?;
        Ok(true)
    }

    // ========================================================================
    // COMPOSITES
    // ========================================================================

    async fn run_flow_command(
        &mut self,
        commands: &[Command],
        condition: Option<&Condition>,
        config: Option<&FlowConfig>,
    ) -> Result<bool, OrchestraError> {
        let proceed = match condition {
            Some(condition) => self.evaluate_condition(condition, None).await?,
            None => true,
        };
        if !proceed {
            return Err(OrchestraError::CommandSkipped);
        }
        Box::pin(self.run_sub_flow(commands, config)).await
    }

    async fn repeat(
        &mut self,
        commands: &[Command],
        times: Option<&str>,
        condition: Option<&Condition>,
        raw: &Command,
        key: MetadataKey,
        config: Option<&FlowConfig>,
    ) -> Result<bool, OrchestraError> {
        let max_runs = match times {
            Some(times) => times.trim().parse::<f64>().map(|value| value as u32).map_err(
                |_| OrchestraError::InvalidCommand {
                    message: format!("Invalid repeat count '{times}'"),
                },
            )?,
            None => u32::MAX,
        };

        self.update_metadata(raw, key, |meta| meta.number_of_runs = Some(0));

        let mut counter = 0u32;
        let mut mutated = false;
        while counter < max_runs {
            // The condition is re-evaluated (scripts included) every pass.
            let proceed = match condition {
                Some(condition) => {
                    let evaluated = condition.evaluate_scripts(self.engine.as_ref())?;
                    self.evaluate_condition(&evaluated, None).await?
                }
                None => true,
            };
            if !proceed {
                break;
            }
            if counter > 0 {
                self.reset_commands(commands);
            }
            mutated |= Box::pin(self.run_sub_flow(commands, config)).await?;
            counter += 1;
            self.update_metadata(raw, key, |meta| meta.number_of_runs = Some(counter));
        }

        if counter == 0 {
            return Err(OrchestraError::CommandSkipped);
        }
        Ok(mutated)
    }

    // ========================================================================
    // NETWORK & LOCATION
    // ========================================================================

    async fn mock_network(&mut self, rules_path: &str) -> Result<bool, OrchestraError> {
        self.driver.set_proxy(self.proxy.port()).await?;
        let rules = proxy::load_rules(rules_path)?;
        if self.proxy.is_started() {
            info!(rules = rules.len(), "Replacing mock network rules");
            self.proxy.replace_rules(rules)?;
        } else {
            info!(rules = rules.len(), port = self.proxy.port(), "Starting network proxy");
            self.proxy.start(rules)?;
        }
        Ok(false)
    }

    async fn travel(&mut self, points: &[GeoPoint], speed_mps: f64) -> Result<bool, OrchestraError> {
        let mut previous: Option<&GeoPoint> = None;
        for point in points {
            if let Some(previous) = previous {
                let distance = previous.distance_meters(point);
                let seconds = if speed_mps > 0.0 { distance / speed_mps } else { 0.0 };
                sleep(Duration::from_millis((seconds * 1000.0) as u64)).await;
            }
            self.driver
                .set_location(point.latitude, point.longitude)
                .await?;
            previous = Some(point);
        }
        Ok(true)
    }
}

/// Synthesizes random input for `InputRandom`.
fn synthesize_random(kind: InputRandomKind, length: usize) -> String {
    let mut rng = rand::thread_rng();
    let letters = |rng: &mut rand::rngs::ThreadRng, n: usize| -> String {
        (0..n).map(|_| rng.gen_range(b'a'..=b'z') as char).collect()
    };
    match kind {
        InputRandomKind::Text => letters(&mut rng, length),
        InputRandomKind::Number => (0..length)
            .map(|_| rng.gen_range(b'0'..=b'9') as char)
            .collect(),
        InputRandomKind::Email => format!("{}@example.com", letters(&mut rng, length)),
    }
}
