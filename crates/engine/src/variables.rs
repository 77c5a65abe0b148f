//! Scoped variable storage and `{{name}}` template substitution.
//!
//! Variables live in three tiers. Lookups walk step → test case → global, so a
//! step variable shadows a test-case variable of the same name, which in turn
//! shadows a global. The executor clears the test-case tier at the start of
//! each test case and the step tier at the start of each step.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use apirig_types::split_reference_list;
use apirig_util::{redact_header_value, select_first, stringify_value};
use chrono::{SecondsFormat, Utc};
use once_cell::sync::Lazy;
use rand::Rng;
use rand::distributions::Alphanumeric;
use regex::{Captures, Regex};
use serde_json::{Map, Value, json};
use tracing::{debug, warn};

use crate::errors::VariableError;

static PLACEHOLDER: Lazy<Regex> = Lazy::new(|| Regex::new(r"\{\{([^{}]+?)\}\}").expect("valid placeholder pattern"));

static CALL_SYNTAX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(\$?[A-Za-z_][\w.\-]*)\s*\((.*)\)$").expect("valid call pattern"));

const DEFAULT_RANDOM_INT_RANGE: (i64, i64) = (0, 100);
const DEFAULT_RANDOM_STRING_LENGTH: usize = 10;

type ProduceFn = dyn Fn(&[String]) -> Result<Value, String> + Send + Sync;

/// A value computed on each use, optionally from call arguments.
#[derive(Clone)]
pub struct Generator {
    name: String,
    produce: Arc<ProduceFn>,
}

impl Generator {
    pub fn new<F>(name: impl Into<String>, produce: F) -> Self
    where
        F: Fn(&[String]) -> Result<Value, String> + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            produce: Arc::new(produce),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn produce(&self, args: &[String]) -> Result<Value, VariableError> {
        (self.produce)(args).map_err(|reason| VariableError::Generator {
            name: self.name.clone(),
            reason,
        })
    }
}

impl fmt::Debug for Generator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Generator").field("name", &self.name).finish_non_exhaustive()
    }
}

#[derive(Debug, Clone)]
pub enum VariableValue {
    Literal(Value),
    Producer(Generator),
}

impl From<Value> for VariableValue {
    fn from(value: Value) -> Self {
        Self::Literal(value)
    }
}

impl From<&str> for VariableValue {
    fn from(value: &str) -> Self {
        Self::Literal(Value::String(value.to_string()))
    }
}

impl From<String> for VariableValue {
    fn from(value: String) -> Self {
        Self::Literal(Value::String(value))
    }
}

impl From<Generator> for VariableValue {
    fn from(generator: Generator) -> Self {
        Self::Producer(generator)
    }
}

/// Target tier for an extraction rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Tier {
    Global,
    TestCase,
    Step,
}

#[derive(Debug, Clone)]
pub struct VariableManager {
    global: HashMap<String, VariableValue>,
    test_case: HashMap<String, VariableValue>,
    step: HashMap<String, VariableValue>,
}

impl Default for VariableManager {
    fn default() -> Self {
        Self::new()
    }
}

impl VariableManager {
    /// Create a manager with the built-in global generators registered.
    pub fn new() -> Self {
        let mut manager = Self {
            global: HashMap::new(),
            test_case: HashMap::new(),
            step: HashMap::new(),
        };
        for generator in builtin_generators() {
            manager.global.insert(generator.name().to_string(), VariableValue::Producer(generator));
        }
        manager
    }

    pub fn set_global(&mut self, name: impl Into<String>, value: impl Into<VariableValue>) {
        self.global.insert(name.into(), value.into());
    }

    pub fn set_test_case_var(&mut self, name: impl Into<String>, value: impl Into<VariableValue>) {
        self.test_case.insert(name.into(), value.into());
    }

    pub fn set_step_var(&mut self, name: impl Into<String>, value: impl Into<VariableValue>) {
        self.step.insert(name.into(), value.into());
    }

    pub fn clear_test_case_scope(&mut self) {
        self.test_case.clear();
    }

    pub fn clear_step_scope(&mut self) {
        self.step.clear();
    }

    /// Look a name up across the tiers, innermost first.
    pub fn get(&self, name: &str) -> Result<&VariableValue, VariableError> {
        self.step
            .get(name)
            .or_else(|| self.test_case.get(name))
            .or_else(|| self.global.get(name))
            .ok_or_else(|| VariableError::NotFound { name: name.to_string() })
    }

    /// Look a name up and invoke it when it is a generator.
    pub fn resolve(&self, name: &str) -> Result<Value, VariableError> {
        self.resolve_with_args(name, &[])
    }

    fn resolve_with_args(&self, name: &str, args: &[String]) -> Result<Value, VariableError> {
        match self.get(name)? {
            VariableValue::Literal(value) => Ok(value.clone()),
            VariableValue::Producer(generator) => generator.produce(args),
        }
    }

    /// Replace every `{{name}}` placeholder in `text`.
    ///
    /// Placeholders may call a generator with arguments, as in
    /// `{{$randomInt(1, 6)}}`. A placeholder that cannot be resolved is left
    /// in place unchanged.
    pub fn substitute(&self, text: &str) -> String {
        if !text.contains("{{") {
            return text.to_string();
        }
        PLACEHOLDER
            .replace_all(text, |captures: &Captures| {
                let expression = captures[1].trim();
                match self.evaluate_placeholder(expression) {
                    Ok(value) => stringify_value(&value),
                    Err(error) => {
                        debug!(placeholder = %expression, error = %error, "placeholder left unresolved");
                        captures[0].to_string()
                    }
                }
            })
            .into_owned()
    }

    fn evaluate_placeholder(&self, expression: &str) -> Result<Value, VariableError> {
        if let Some(call) = CALL_SYNTAX.captures(expression) {
            let args = parse_call_arguments(&call[2]);
            return self.resolve_with_args(&call[1], &args);
        }
        self.resolve(expression)
    }

    /// Apply comma-separated `name=jsonpath` rules to a response body.
    ///
    /// The first match of each path is stored as a step variable. A name may
    /// carry a `case:` or `global:` prefix to store into that tier instead.
    /// Rules that are malformed, fail to compile, or match nothing are skipped
    /// with a warning.
    pub fn extract_from_response(&mut self, body: &Value, rules: &str) {
        for rule in split_reference_list(rules) {
            let Some((target, path)) = rule.split_once('=') else {
                warn!(rule = %rule, "extraction rule is not of the form name=path; skipping");
                continue;
            };
            let (tier, name) = match parse_target(target.trim()) {
                Some(parsed) => parsed,
                None => {
                    warn!(rule = %rule, "extraction rule has an invalid variable name; skipping");
                    continue;
                }
            };
            let path = path.trim();
            if path.is_empty() {
                warn!(rule = %rule, "extraction rule has an empty path; skipping");
                continue;
            }

            match select_first(body, path) {
                Ok(Some(value)) => {
                    debug!(variable = %name, path = %path, ?tier, "extracted variable");
                    match tier {
                        Tier::Global => self.set_global(name, value),
                        Tier::TestCase => self.set_test_case_var(name, value),
                        Tier::Step => self.set_step_var(name, value),
                    }
                }
                Ok(None) => warn!(variable = %name, path = %path, "extraction path matched nothing; skipping"),
                Err(error) => warn!(variable = %name, error = %error, "extraction path is invalid; skipping"),
            }
        }
    }

    /// Render the three tiers as JSON for debug output. Generators appear as
    /// `"<generator>"`. Values under credential-like names (`password`,
    /// `apiToken`, ...) and secret-looking text are redacted.
    pub fn snapshot(&self) -> Value {
        json!({
            "global": render_tier(&self.global),
            "testCase": render_tier(&self.test_case),
            "step": render_tier(&self.step),
        })
    }
}

fn parse_target(target: &str) -> Option<(Tier, &str)> {
    let (tier, name) = match target.split_once(':') {
        Some((qualifier, name)) => {
            let tier = match qualifier.trim().to_ascii_lowercase().as_str() {
                "case" | "testcase" => Tier::TestCase,
                "global" => Tier::Global,
                "step" => Tier::Step,
                _ => return None,
            };
            (tier, name.trim())
        }
        None => (Tier::Step, target),
    };
    (!name.is_empty()).then_some((tier, name))
}

fn parse_call_arguments(raw: &str) -> Vec<String> {
    split_reference_list(raw)
        .into_iter()
        .map(|arg| arg.trim_matches(|ch| ch == '"' || ch == '\'').to_string())
        .collect()
}

fn render_tier(tier: &HashMap<String, VariableValue>) -> Value {
    let mut names: Vec<&String> = tier.keys().collect();
    names.sort();
    let mut rendered = Map::new();
    for name in names {
        let value = match &tier[name] {
            VariableValue::Literal(Value::String(text)) => Value::String(redact_header_value(name, text)),
            VariableValue::Literal(value @ (Value::Object(_) | Value::Array(_))) => {
                redacted_structure(name, value)
            }
            VariableValue::Literal(value) => {
                let rendered = stringify_value(value);
                let redacted = redact_header_value(name, &rendered);
                if redacted == rendered { value.clone() } else { Value::String(redacted) }
            }
            VariableValue::Producer(_) => Value::String("<generator>".to_string()),
        };
        rendered.insert(name.clone(), value);
    }
    Value::Object(rendered)
}

fn redacted_structure(name: &str, value: &Value) -> Value {
    let rendered = value.to_string();
    let redacted = redact_header_value(name, &rendered);
    if redacted == rendered {
        value.clone()
    } else {
        serde_json::from_str(&redacted).unwrap_or(Value::String(redacted))
    }
}

fn builtin_generators() -> Vec<Generator> {
    vec![
        Generator::new("$randomUUID", |_| Ok(Value::String(uuid::Uuid::new_v4().to_string()))),
        Generator::new("$timestamp", |_| {
            Ok(Value::String(Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)))
        }),
        Generator::new("$randomInt", random_int),
        Generator::new("$randomString", random_string),
    ]
}

fn random_int(args: &[String]) -> Result<Value, String> {
    let (min, max) = match args {
        [] => DEFAULT_RANDOM_INT_RANGE,
        [min, max] => (parse_integer(min)?, parse_integer(max)?),
        other => return Err(format!("expected (min, max), got {} argument(s)", other.len())),
    };
    if min > max {
        return Err(format!("min {min} is greater than max {max}"));
    }
    Ok(Value::from(rand::thread_rng().gen_range(min..=max)))
}

fn random_string(args: &[String]) -> Result<Value, String> {
    let length = match args {
        [] => DEFAULT_RANDOM_STRING_LENGTH,
        [length] => length
            .trim()
            .parse::<usize>()
            .map_err(|_| format!("length '{length}' is not a non-negative integer"))?,
        other => return Err(format!("expected (length), got {} argument(s)", other.len())),
    };
    let text: String = rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(length)
        .map(char::from)
        .collect();
    Ok(Value::String(text))
}

fn parse_integer(raw: &str) -> Result<i64, String> {
    raw.trim().parse::<i64>().map_err(|_| format!("'{raw}' is not an integer"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn inner_tiers_shadow_outer_tiers() {
        let mut variables = VariableManager::new();
        variables.set_global("env", "global");
        variables.set_test_case_var("env", "case");
        variables.set_step_var("env", "step");
        assert_eq!(variables.resolve("env").expect("env"), json!("step"));

        variables.clear_step_scope();
        assert_eq!(variables.resolve("env").expect("env"), json!("case"));

        variables.clear_test_case_scope();
        assert_eq!(variables.resolve("env").expect("env"), json!("global"));
    }

    #[test]
    fn missing_name_is_not_found() {
        let variables = VariableManager::new();
        assert_eq!(
            variables.get("nope").expect_err("missing"),
            VariableError::NotFound { name: "nope".to_string() }
        );
    }

    #[test]
    fn substitution_renders_values_and_keeps_unknown_placeholders() {
        let mut variables = VariableManager::new();
        variables.set_test_case_var("userId", json!(42));
        variables.set_test_case_var("name", "Jane");
        variables.set_test_case_var("tags", json!(["a", "b"]));
        variables.set_test_case_var("nothing", Value::Null);

        assert_eq!(
            variables.substitute("/users/{{ userId }}/{{name}}?t={{tags}}&n={{nothing}}&x={{missing}}"),
            r#"/users/42/Jane?t=["a","b"]&n=null&x={{missing}}"#
        );
        assert_eq!(variables.substitute("no placeholders"), "no placeholders");
    }

    #[test]
    fn nested_braces_are_not_placeholders() {
        let mut variables = VariableManager::new();
        variables.set_global("a", "x");
        assert_eq!(variables.substitute("{{{a}}}"), "{x}");
        assert_eq!(variables.substitute("{{ {a} }}"), "{{ {a} }}");
    }

    #[test]
    fn generators_produce_fresh_values() {
        let variables = VariableManager::new();
        let first = variables.substitute("{{$randomUUID}}");
        let second = variables.substitute("{{$randomUUID}}");
        assert_eq!(first.len(), 36);
        assert_ne!(first, second);
        assert!(uuid::Uuid::parse_str(&first).is_ok());

        let timestamp = variables.substitute("{{$timestamp}}");
        let parsed = chrono::DateTime::parse_from_rfc3339(&timestamp).expect("rfc3339");
        assert_eq!(parsed.timestamp_subsec_nanos() % 1_000_000, 0);
        assert!(timestamp.ends_with('Z'));
    }

    #[test]
    fn random_int_honours_call_arguments() {
        let variables = VariableManager::new();
        for _ in 0..50 {
            let rendered = variables.substitute("{{$randomInt(3, 5)}}");
            let value: i64 = rendered.parse().expect("integer");
            assert!((3..=5).contains(&value));
        }
        let default_range: i64 = variables.substitute("{{$randomInt}}").parse().expect("integer");
        assert!((0..=100).contains(&default_range));
    }

    #[test]
    fn generator_errors_leave_placeholder_in_place() {
        let variables = VariableManager::new();
        assert_eq!(variables.substitute("{{$randomInt(9, 1)}}"), "{{$randomInt(9, 1)}}");
        assert_eq!(variables.substitute("{{$randomInt(a, 1)}}"), "{{$randomInt(a, 1)}}");
        assert!(matches!(
            variables.resolve_with_args("$randomInt", &["9".into(), "1".into()]),
            Err(VariableError::Generator { .. })
        ));
    }

    #[test]
    fn random_string_uses_requested_length() {
        let variables = VariableManager::new();
        let text = variables.substitute("{{$randomString(16)}}");
        assert_eq!(text.len(), 16);
        assert!(text.chars().all(|ch| ch.is_ascii_alphanumeric()));
    }

    #[test]
    fn custom_generators_can_shadow_builtins() {
        let mut variables = VariableManager::new();
        variables.set_test_case_var("$timestamp", Generator::new("$timestamp", |_| Ok(json!("frozen"))));
        assert_eq!(variables.substitute("at {{$timestamp}}"), "at frozen");
    }

    #[test]
    fn extraction_stores_first_match_in_step_scope() {
        let mut variables = VariableManager::new();
        let body = json!({"id": 7, "items": [{"sku": "A"}, {"sku": "B"}]});
        variables.extract_from_response(&body, "userId=$.id, firstSku = $.items[*].sku");

        assert_eq!(variables.resolve("userId").expect("userId"), json!(7));
        assert_eq!(variables.resolve("firstSku").expect("sku"), json!("A"));

        variables.clear_step_scope();
        assert!(variables.resolve("userId").is_err());
    }

    #[test]
    fn extraction_skips_bad_rules_and_keeps_going() {
        let mut variables = VariableManager::new();
        let body = json!({"id": 7});
        variables.extract_from_response(&body, "broken, missing=$.nope, bad=$[?(, =$.id, id=$.id");
        assert_eq!(variables.resolve("id").expect("id"), json!(7));
        assert!(variables.resolve("missing").is_err());
        assert!(variables.resolve("bad").is_err());
    }

    #[test]
    fn extraction_scope_qualifiers_target_outer_tiers() {
        let mut variables = VariableManager::new();
        let body = json!({"id": 7, "token": "t-1"});
        variables.extract_from_response(&body, "case:userId=$.id, global:token=$.token, other:x=$.id");
        variables.clear_step_scope();

        assert_eq!(variables.resolve("userId").expect("case"), json!(7));
        assert_eq!(variables.resolve("token").expect("global"), json!("t-1"));
        assert!(variables.resolve("x").is_err());

        variables.clear_test_case_scope();
        assert!(variables.resolve("userId").is_err());
        assert_eq!(variables.resolve("token").expect("global"), json!("t-1"));
    }

    #[test]
    fn snapshot_lists_each_tier() {
        let mut variables = VariableManager::new();
        variables.set_test_case_var("name", "Jane");
        let snapshot = variables.snapshot();
        assert_eq!(snapshot["testCase"], json!({"name": "Jane"}));
        assert_eq!(snapshot["global"]["$randomUUID"], json!("<generator>"));
        assert_eq!(snapshot["step"], json!({}));
    }

    #[test]
    fn snapshot_hides_credentials() {
        let mut variables = VariableManager::new();
        variables.set_test_case_var("password", "hunter2");
        variables.set_test_case_var("apiToken", json!(123456));
        variables.set_test_case_var("note", "Authorization: Bearer abc.def");
        variables.set_test_case_var("login", json!({"user": "jane", "password": "hunter2"}));
        variables.set_test_case_var("count", json!(3));

        let snapshot = variables.snapshot();
        let tier = &snapshot["testCase"];
        assert_eq!(tier["password"], json!("[REDACTED]"));
        assert_eq!(tier["apiToken"], json!("[REDACTED]"));
        assert_eq!(tier["note"], json!("Authorization: [REDACTED]"));
        assert_eq!(tier["login"], json!({"user": "jane", "password": "[REDACTED]"}));
        assert_eq!(tier["count"], json!(3));
        assert!(!snapshot.to_string().contains("hunter2"));
    }
}
