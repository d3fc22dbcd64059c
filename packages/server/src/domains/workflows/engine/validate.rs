use std::collections::{HashMap, HashSet};

use serde_json::Value;

use crate::domains::workflows::data::WorkflowGraphInput;
use crate::domains::workflows::engine::actions::ActionRegistry;
use crate::domains::workflows::engine::condition::Condition;
use crate::domains::workflows::models::StepKind;
use crate::kernel::scheduled_tasks::is_valid_cron;

/// Trigger types the dispatcher knows how to fire
const BUILTIN_TRIGGERS: [&str; 6] = [
    "trigger.lead_created",
    "trigger.lead_updated",
    "trigger.lead_status_changed",
    "trigger.lead_assigned",
    "trigger.facebook_lead_imported",
    "trigger.schedule",
];

fn is_builtin_trigger(step_type: &str) -> bool {
    BUILTIN_TRIGGERS.contains(&step_type)
}

/// Validate a workflow graph, collecting every violation instead of
/// stopping at the first. An empty result means the graph can be stored
/// and activated.
///
/// Runs on store, on update, and again on activate (the registry or an
/// action's config rules may have changed since the graph was stored).
pub fn validate_graph(graph: &WorkflowGraphInput, registry: &ActionRegistry) -> Vec<String> {
    let mut violations = Vec::new();

    // Step keys must be unique; everything else refers to them
    let mut keys = HashSet::new();
    for step in &graph.steps {
        if !keys.insert(step.key.as_str()) {
            violations.push(format!("duplicate step key '{}'", step.key));
        }
    }

    let triggers: Vec<_> = graph
        .steps
        .iter()
        .filter(|s| s.kind == StepKind::Trigger)
        .collect();
    if triggers.len() != 1 {
        violations.push(format!(
            "workflow needs exactly one trigger step, found {}",
            triggers.len()
        ));
    }

    for step in &graph.steps {
        match step.kind {
            StepKind::Trigger => {
                if !is_builtin_trigger(&step.step_type) {
                    violations.push(format!(
                        "step '{}': unknown trigger type '{}'",
                        step.key, step.step_type
                    ));
                } else if step.step_type == "trigger.schedule" {
                    match step.config_or_empty().get("cron").and_then(Value::as_str) {
                        Some(expr) if is_valid_cron(expr) => {}
                        Some(expr) => violations.push(format!(
                            "step '{}': invalid cron expression '{}'",
                            step.key, expr
                        )),
                        None => violations.push(format!(
                            "step '{}': schedule trigger requires a 'cron' config",
                            step.key
                        )),
                    }
                } else if let Some(filter) = step.config_or_empty().get("filter") {
                    if let Err(e) = Condition::parse(filter) {
                        violations.push(format!("step '{}': invalid trigger filter: {}", step.key, e));
                    }
                }
            }
            StepKind::Action => match registry.get(&step.step_type) {
                None => violations.push(format!(
                    "step '{}': unknown action type '{}'",
                    step.key, step.step_type
                )),
                Some(handler) => {
                    if let Err(e) = handler.validate_config(&step.config_or_empty()) {
                        violations.push(format!("step '{}': {}", step.key, e));
                    }
                }
            },
        }
    }

    // Connections: endpoints exist, conditions parse
    let mut adjacency: HashMap<&str, Vec<&str>> = HashMap::new();
    for conn in &graph.connections {
        let mut endpoints_ok = true;
        if !keys.contains(conn.from.as_str()) {
            violations.push(format!("connection references unknown step '{}'", conn.from));
            endpoints_ok = false;
        }
        if !keys.contains(conn.to.as_str()) {
            violations.push(format!("connection references unknown step '{}'", conn.to));
            endpoints_ok = false;
        }
        if endpoints_ok {
            adjacency.entry(conn.from.as_str()).or_default().push(conn.to.as_str());
        }
        if let Some(condition) = &conn.condition {
            if let Err(e) = Condition::parse(condition) {
                violations.push(format!(
                    "connection {} -> {}: invalid condition: {}",
                    conn.from, conn.to, e
                ));
            }
        }
    }

    if has_cycle(&keys, &adjacency) {
        violations.push("graph contains a cycle".to_string());
    }

    // Every action must be reachable from the trigger, otherwise it can
    // never run and the graph is almost certainly miswired
    if let [trigger] = triggers.as_slice() {
        let reachable = reachable_from(trigger.key.as_str(), &adjacency);
        for step in &graph.steps {
            if step.kind == StepKind::Action && !reachable.contains(step.key.as_str()) {
                violations.push(format!(
                    "step '{}' is not reachable from the trigger",
                    step.key
                ));
            }
        }
    }

    let action_keys: HashSet<&str> = graph
        .steps
        .iter()
        .filter(|s| s.kind == StepKind::Action)
        .map(|s| s.key.as_str())
        .collect();
    for mapping in &graph.mappings {
        if !keys.contains(mapping.step.as_str()) {
            violations.push(format!("mapping references unknown step '{}'", mapping.step));
        } else if !action_keys.contains(mapping.step.as_str()) {
            violations.push(format!(
                "mapping on step '{}': mappings can only feed action steps",
                mapping.step
            ));
        }
        if mapping.source.trim().is_empty() || mapping.target.trim().is_empty() {
            violations.push(format!(
                "mapping on step '{}': source and target must be non-empty",
                mapping.step
            ));
        }
    }

    violations
}

fn has_cycle(keys: &HashSet<&str>, adjacency: &HashMap<&str, Vec<&str>>) -> bool {
    #[derive(Clone, Copy, PartialEq)]
    enum Mark {
        Unvisited,
        InProgress,
        Done,
    }

    fn visit(
        node: &str,
        adjacency: &HashMap<&str, Vec<&str>>,
        marks: &mut HashMap<String, Mark>,
    ) -> bool {
        match marks.get(node).copied().unwrap_or(Mark::Unvisited) {
            Mark::InProgress => return true,
            Mark::Done => return false,
            Mark::Unvisited => {}
        }
        marks.insert(node.to_string(), Mark::InProgress);
        for next in adjacency.get(node).into_iter().flatten() {
            if visit(next, adjacency, marks) {
                return true;
            }
        }
        marks.insert(node.to_string(), Mark::Done);
        false
    }

    let mut marks = HashMap::new();
    keys.iter().any(|k| visit(k, adjacency, &mut marks))
}

fn reachable_from<'a>(
    start: &'a str,
    adjacency: &HashMap<&'a str, Vec<&'a str>>,
) -> HashSet<&'a str> {
    let mut seen = HashSet::new();
    let mut stack = vec![start];
    while let Some(node) = stack.pop() {
        if seen.insert(node) {
            for next in adjacency.get(node).into_iter().flatten() {
                stack.push(next);
            }
        }
    }
    seen
}
