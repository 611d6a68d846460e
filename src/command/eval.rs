// Module: Command evaluation
// Expands script placeholders in user-visible command fields.
//
// The evaluated command is authoritative: it is what executes and what the
// host sees in metadata. Composite commands expand their own fields only;
// nested command lists are expanded when their sub-flow runs. `Repeat`
// additionally defers its condition, which is re-evaluated every iteration.

use std::collections::HashMap;

use anyhow::Result;

use crate::script::ScriptEngine;

use super::{Command, Condition, ElementSelector};

/// Passes a user-visible string through the engine when it carries `${…}`
/// placeholders; plain strings are returned unchanged.
fn eval_str(engine: &dyn ScriptEngine, value: &str) -> Result<String> {
    if !value.contains("${") {
        return Ok(value.to_string());
    }
    engine.evaluate(value, &HashMap::new(), "inline", false)
}

fn eval_opt(engine: &dyn ScriptEngine, value: &Option<String>) -> Result<Option<String>> {
    value.as_ref().map(|v| eval_str(engine, v)).transpose()
}

fn eval_env(
    engine: &dyn ScriptEngine,
    env: &HashMap<String, String>,
) -> Result<HashMap<String, String>> {
    env.iter()
        .map(|(name, value)| Ok((name.clone(), eval_str(engine, value)?)))
        .collect()
}

impl ElementSelector {
    pub fn evaluate_scripts(&self, engine: &dyn ScriptEngine) -> Result<ElementSelector> {
        let eval_sub = |sub: &Option<Box<ElementSelector>>| -> Result<Option<Box<ElementSelector>>> {
            sub.as_ref()
                .map(|s| s.evaluate_scripts(engine).map(Box::new))
                .transpose()
        };

        Ok(ElementSelector {
            text_regex: eval_opt(engine, &self.text_regex)?,
            id_regex: eval_opt(engine, &self.id_regex)?,
            size: self.size.clone(),
            below: eval_sub(&self.below)?,
            above: eval_sub(&self.above)?,
            left_of: eval_sub(&self.left_of)?,
            right_of: eval_sub(&self.right_of)?,
            contains_child: eval_sub(&self.contains_child)?,
            contains_descendants: self
                .contains_descendants
                .as_ref()
                .map(|subs| {
                    subs.iter()
                        .map(|s| s.evaluate_scripts(engine))
                        .collect::<Result<Vec<_>>>()
                })
                .transpose()?,
            traits: self.traits.clone(),
            enabled: self.enabled,
            selected: self.selected,
            checked: self.checked,
            focused: self.focused,
            index: eval_opt(engine, &self.index)?,
            optional: self.optional,
        })
    }
}

impl Condition {
    pub fn evaluate_scripts(&self, engine: &dyn ScriptEngine) -> Result<Condition> {
        Ok(Condition {
            platform: self.platform,
            visible: self
                .visible
                .as_ref()
                .map(|s| s.evaluate_scripts(engine))
                .transpose()?,
            not_visible: self
                .not_visible
                .as_ref()
                .map(|s| s.evaluate_scripts(engine))
                .transpose()?,
            script_condition: eval_opt(engine, &self.script_condition)?,
        })
    }
}

impl Command {
    /// Produces the evaluated form of this command.
    pub fn evaluate_scripts(&self, engine: &dyn ScriptEngine) -> Result<Command> {
        let evaluated = match self {
            Command::TapOnElement {
                selector,
                retry_if_no_change,
                wait_until_visible,
                long_press,
            } => Command::TapOnElement {
                selector: selector.evaluate_scripts(engine)?,
                retry_if_no_change: *retry_if_no_change,
                wait_until_visible: *wait_until_visible,
                long_press: *long_press,
            },
            Command::TapOnPointV2 {
                point,
                retry_if_no_change,
                long_press,
            } => Command::TapOnPointV2 {
                point: eval_str(engine, point)?,
                retry_if_no_change: *retry_if_no_change,
                long_press: *long_press,
            },
            Command::Swipe {
                selector,
                direction,
                start_relative,
                end_relative,
                start_point,
                end_point,
                duration_ms,
            } => Command::Swipe {
                selector: selector
                    .as_ref()
                    .map(|s| s.evaluate_scripts(engine))
                    .transpose()?,
                direction: *direction,
                start_relative: eval_opt(engine, start_relative)?,
                end_relative: eval_opt(engine, end_relative)?,
                start_point: *start_point,
                end_point: *end_point,
                duration_ms: *duration_ms,
            },
            Command::ScrollUntilVisible {
                selector,
                direction,
                timeout_ms,
                scroll_duration_ms,
                visibility_percentage,
            } => Command::ScrollUntilVisible {
                selector: selector.evaluate_scripts(engine)?,
                direction: *direction,
                timeout_ms: *timeout_ms,
                scroll_duration_ms: *scroll_duration_ms,
                visibility_percentage: *visibility_percentage,
            },
            Command::CopyTextFrom { selector } => Command::CopyTextFrom {
                selector: selector.evaluate_scripts(engine)?,
            },
            Command::AssertCondition {
                condition,
                timeout_ms,
            } => Command::AssertCondition {
                condition: condition.evaluate_scripts(engine)?,
                timeout_ms: *timeout_ms,
            },
            Command::Assert { condition } => Command::Assert {
                condition: condition.evaluate_scripts(engine)?,
            },
            Command::InputText { text } => Command::InputText {
                text: eval_str(engine, text)?,
            },
            Command::LaunchApp {
                app_id,
                clear_state,
                clear_keychain,
                permissions,
                launch_arguments,
                stop_app,
            } => Command::LaunchApp {
                app_id: eval_str(engine, app_id)?,
                clear_state: *clear_state,
                clear_keychain: *clear_keychain,
                permissions: permissions.clone(),
                launch_arguments: launch_arguments
                    .as_ref()
                    .map(|args| {
                        args.iter()
                            .map(|(name, value)| {
                                let value = match value {
                                    serde_json::Value::String(s) => {
                                        serde_json::Value::String(eval_str(engine, s)?)
                                    }
                                    other => other.clone(),
                                };
                                Ok((name.clone(), value))
                            })
                            .collect::<Result<HashMap<_, _>>>()
                    })
                    .transpose()?,
                stop_app: *stop_app,
            },
            Command::OpenLink {
                link,
                auto_verify,
                browser,
            } => Command::OpenLink {
                link: eval_str(engine, link)?,
                auto_verify: *auto_verify,
                browser: *browser,
            },
            Command::TakeScreenshot { path } => Command::TakeScreenshot {
                path: eval_str(engine, path)?,
            },
            Command::StopApp { app_id } => Command::StopApp {
                app_id: eval_str(engine, app_id)?,
            },
            Command::ClearState { app_id } => Command::ClearState {
                app_id: eval_str(engine, app_id)?,
            },
            Command::RunFlow {
                commands,
                condition,
            } => Command::RunFlow {
                commands: commands.clone(),
                condition: condition
                    .as_ref()
                    .map(|c| c.evaluate_scripts(engine))
                    .transpose()?,
            },
            // The repeat condition stays raw: the executor re-evaluates it
            // before every iteration.
            Command::Repeat {
                commands,
                times,
                condition,
            } => Command::Repeat {
                commands: commands.clone(),
                times: eval_opt(engine, times)?,
                condition: condition.clone(),
            },
            Command::DefineVariables { env } => Command::DefineVariables {
                env: eval_env(engine, env)?,
            },
            Command::RunScript {
                script,
                env,
                source_description,
            } => Command::RunScript {
                script: script.clone(),
                env: eval_env(engine, env)?,
                source_description: source_description.clone(),
            },
            Command::MockNetwork { rules_path } => Command::MockNetwork {
                rules_path: eval_str(engine, rules_path)?,
            },
            other => other.clone(),
        };
        Ok(evaluated)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use super::*;
    use crate::script::{LogSink, ScriptEngine};

    /// Engine stub that resolves `${NAME}` against a fixed table and records
    /// every script it sees.
    struct TableEngine {
        bindings: HashMap<String, String>,
        seen: Mutex<Vec<String>>,
    }

    impl TableEngine {
        fn new(bindings: &[(&str, &str)]) -> Self {
            Self {
                bindings: bindings
                    .iter()
                    .map(|(k, v)| (k.to_string(), v.to_string()))
                    .collect(),
                seen: Mutex::new(Vec::new()),
            }
        }
    }

    impl ScriptEngine for TableEngine {
        fn init(&self) -> Result<()> {
            Ok(())
        }

        fn evaluate(
            &self,
            script: &str,
            _env: &HashMap<String, String>,
            _source_name: &str,
            _run_in_sub_scope: bool,
        ) -> Result<String> {
            self.seen.lock().unwrap().push(script.to_string());
            let mut result = script.to_string();
            for (name, value) in &self.bindings {
                result = result.replace(&format!("${{{name}}}"), value);
            }
            Ok(result)
        }

        fn enter_scope(&self) {}

        fn leave_scope(&self) {}

        fn set_log_sink(&self, _sink: Option<LogSink>) {}
    }

    #[test]
    fn test_plain_strings_bypass_the_engine() {
        let engine = TableEngine::new(&[]);
        let command = Command::InputText {
            text: "alice".to_string(),
        };
        let evaluated = command.evaluate_scripts(&engine).unwrap();
        assert_eq!(evaluated, command);
        assert!(engine.seen.lock().unwrap().is_empty());
    }

    #[test]
    fn test_placeholders_are_expanded() {
        let engine = TableEngine::new(&[("USER", "alice")]);
        let command = Command::InputText {
            text: "${USER}".to_string(),
        };
        let evaluated = command.evaluate_scripts(&engine).unwrap();
        assert_eq!(
            evaluated,
            Command::InputText {
                text: "alice".to_string()
            }
        );
    }

    #[test]
    fn test_selector_regexes_are_expanded() {
        let engine = TableEngine::new(&[("LABEL", "Login")]);
        let command = Command::TapOnElement {
            selector: ElementSelector {
                text_regex: Some("${LABEL}".to_string()),
                below: Some(Box::new(ElementSelector {
                    id_regex: Some("${LABEL}_anchor".to_string()),
                    ..Default::default()
                })),
                ..Default::default()
            },
            retry_if_no_change: None,
            wait_until_visible: None,
            long_press: None,
        };
        match command.evaluate_scripts(&engine).unwrap() {
            Command::TapOnElement { selector, .. } => {
                assert_eq!(selector.text_regex.as_deref(), Some("Login"));
                assert_eq!(
                    selector.below.unwrap().id_regex.as_deref(),
                    Some("Login_anchor")
                );
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn test_repeat_condition_stays_raw() {
        let engine = TableEngine::new(&[("N", "3"), ("COND", "true")]);
        let command = Command::Repeat {
            commands: vec![Command::BackPress],
            times: Some("${N}".to_string()),
            condition: Some(Condition {
                script_condition: Some("${COND}".to_string()),
                ..Default::default()
            }),
        };
        match command.evaluate_scripts(&engine).unwrap() {
            Command::Repeat {
                times, condition, ..
            } => {
                assert_eq!(times.as_deref(), Some("3"));
                assert_eq!(
                    condition.unwrap().script_condition.as_deref(),
                    Some("${COND}"),
                    "repeat conditions are evaluated per iteration, not up front"
                );
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn test_nested_commands_are_not_expanded() {
        let engine = TableEngine::new(&[("USER", "alice")]);
        let command = Command::RunFlow {
            commands: vec![Command::InputText {
                text: "${USER}".to_string(),
            }],
            condition: None,
        };
        match command.evaluate_scripts(&engine).unwrap() {
            Command::RunFlow { commands, .. } => {
                assert_eq!(
                    commands[0],
                    Command::InputText {
                        text: "${USER}".to_string()
                    }
                );
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }
}
