use std::collections::HashMap;
use std::sync::Arc;

use agora_core::traits::State;

use super::node::Next;

/// A routing function consulted after a node returns `Next::Continue`.
pub type RouterFn<S> = Arc<dyn Fn(&S) -> Next + Send + Sync>;

/// Static and conditional transitions, keyed by source node.
pub(crate) struct EdgeTable<S> {
    edges: HashMap<String, String>,
    routers: HashMap<String, RouterFn<S>>,
}

impl<S: State> EdgeTable<S> {
    pub(crate) fn new() -> Self {
        Self {
            edges: HashMap::new(),
            routers: HashMap::new(),
        }
    }

    /// Set the static successor of `from`, returning the one it replaced.
    pub(crate) fn add_edge(&mut self, from: String, to: String) -> Option<String> {
        self.edges.insert(from, to)
    }

    pub(crate) fn add_router(&mut self, from: String, router: RouterFn<S>) -> bool {
        self.routers.insert(from, router).is_some()
    }

    /// Successor of `from` after it returned `Continue`.
    ///
    /// The routing function wins over the static edge. A router that itself
    /// answers `Continue` falls through to the static edge. `None` means the
    /// traversal ends here.
    pub(crate) fn resolve(&self, from: &str, state: &S) -> Option<String> {
        if let Some(router) = self.routers.get(from) {
            match router(state) {
                Next::Goto(target) => return Some(target),
                Next::End => return None,
                Next::Continue => {}
            }
        }
        self.edges.get(from).cloned()
    }

    pub(crate) fn edges(&self) -> impl Iterator<Item = (&str, &str)> {
        self.edges.iter().map(|(from, to)| (from.as_str(), to.as_str()))
    }

    pub(crate) fn router_sources(&self) -> impl Iterator<Item = &str> {
        self.routers.keys().map(|s| s.as_str())
    }
}

/// A simple test over one state value.
///
/// Supported expressions:
/// - `key == "value"`: exact match
/// - `key != "value"`: not equal
/// - `key contains "substr"`: substring match
///
/// Non-string values are compared by their JSON text, so `approved == "true"`
/// matches a boolean `true`. A missing key never matches.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Condition {
    Equals { key: String, value: String },
    NotEquals { key: String, value: String },
    Contains { key: String, substr: String },
}

impl Condition {
    /// Parse an expression. Returns `None` if it is not one of the supported forms.
    pub fn parse(expr: &str) -> Option<Self> {
        let expr = expr.trim();

        // The operator nearest the start separates key from value, so a
        // quoted value may itself contain an operator.
        let (pos, op) = [" contains ", "!=", "=="]
            .into_iter()
            .filter_map(|op| expr.find(op).map(|pos| (pos, op)))
            .min_by_key(|(pos, _)| *pos)?;

        let key = expr[..pos].trim();
        if key.is_empty() {
            return None;
        }
        let key = key.to_string();
        let value = expr[pos + op.len()..].trim().trim_matches('"').to_string();

        Some(match op {
            "==" => Condition::Equals { key, value },
            "!=" => Condition::NotEquals { key, value },
            _ => Condition::Contains { key, substr: value },
        })
    }

    pub fn evaluate<S: State>(&self, state: &S) -> bool {
        match self {
            Condition::Equals { key, value } => lookup(state, key).is_some_and(|s| s == *value),
            Condition::NotEquals { key, value } => {
                lookup(state, key).is_some_and(|s| s != *value)
            }
            Condition::Contains { key, substr } => {
                lookup(state, key).is_some_and(|s| s.contains(substr.as_str()))
            }
        }
    }
}

fn lookup<S: State>(state: &S, key: &str) -> Option<String> {
    match state.get(key)? {
        serde_json::Value::Null => None,
        serde_json::Value::String(s) => Some(s),
        other => Some(other.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use agora_core::state::ConversationState;

    fn state_with(key: &str, value: serde_json::Value) -> ConversationState {
        let mut state = ConversationState::default();
        state.set(key, value).unwrap();
        state
    }

    #[test]
    fn test_condition_equals() {
        let state = state_with("status", serde_json::json!("success"));
        let cond = Condition::parse(r#"status == "success""#).unwrap();
        assert!(cond.evaluate(&state));

        let cond = Condition::parse(r#"status == "failure""#).unwrap();
        assert!(!cond.evaluate(&state));
    }

    #[test]
    fn test_condition_not_equals() {
        let state = state_with("status", serde_json::json!("success"));
        assert!(Condition::parse(r#"status != "failure""#)
            .unwrap()
            .evaluate(&state));
        assert!(!Condition::parse(r#"status != "success""#)
            .unwrap()
            .evaluate(&state));
    }

    #[test]
    fn test_condition_contains_output() {
        let mut state = ConversationState::default();
        state.set_output("The file was created successfully.").unwrap();

        assert!(Condition::parse(r#"output contains "created""#)
            .unwrap()
            .evaluate(&state));
        assert!(!Condition::parse(r#"output contains "deleted""#)
            .unwrap()
            .evaluate(&state));
    }

    #[test]
    fn test_condition_non_string_values() {
        let state = state_with("approved", serde_json::json!(true));
        assert!(Condition::parse(r#"approved == "true""#)
            .unwrap()
            .evaluate(&state));

        let state = state_with("retries", serde_json::json!(3));
        assert!(Condition::parse("retries == 3").unwrap().evaluate(&state));
    }

    #[test]
    fn test_condition_missing_key() {
        let state = ConversationState::default();
        let cond = Condition::parse(r#"missing != "value""#).unwrap();
        assert!(!cond.evaluate(&state));
    }

    #[test]
    fn test_condition_invalid_expr() {
        assert_eq!(Condition::parse("this is not valid"), None);
        assert_eq!(Condition::parse(r#"== "value""#), None);
    }

    #[test]
    fn test_condition_value_containing_operator() {
        assert_eq!(
            Condition::parse(r#"msg == "a != b""#),
            Some(Condition::Equals {
                key: "msg".into(),
                value: "a != b".into()
            })
        );
        assert_eq!(
            Condition::parse(r#"msg != "x == y""#),
            Some(Condition::NotEquals {
                key: "msg".into(),
                value: "x == y".into()
            })
        );
        assert_eq!(
            Condition::parse(r#"msg == "it contains nothing""#),
            Some(Condition::Equals {
                key: "msg".into(),
                value: "it contains nothing".into()
            })
        );
        assert_eq!(
            Condition::parse(r#"msg contains "== done""#),
            Some(Condition::Contains {
                key: "msg".into(),
                substr: "== done".into()
            })
        );

        let state = state_with("msg", serde_json::json!("a != b"));
        assert!(Condition::parse(r#"msg == "a != b""#)
            .unwrap()
            .evaluate(&state));
        assert!(!Condition::parse(r#"msg != "a != b""#)
            .unwrap()
            .evaluate(&state));
    }

    #[test]
    fn test_router_falls_through_to_edge() {
        let mut table = EdgeTable::<ConversationState>::new();
        table.add_edge("a".into(), "b".into());
        table.add_router("a".into(), Arc::new(|_: &ConversationState| Next::Continue));

        let state = ConversationState::default();
        assert_eq!(table.resolve("a", &state).as_deref(), Some("b"));
        assert_eq!(table.resolve("b", &state), None);
    }

    #[test]
    fn test_router_wins_over_edge() {
        let mut table = EdgeTable::<ConversationState>::new();
        table.add_edge("a".into(), "b".into());
        table.add_router("a".into(), Arc::new(|_: &ConversationState| Next::goto("c")));

        let state = ConversationState::default();
        assert_eq!(table.resolve("a", &state).as_deref(), Some("c"));

        table.add_router("a".into(), Arc::new(|_: &ConversationState| Next::End));
        assert_eq!(table.resolve("a", &state), None);
    }
}
