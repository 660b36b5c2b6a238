//! Declarative execution conditions.
//!
//! A [`Condition`] gates whether a unit participates in a chain for a given
//! request. All conditions on a unit must match (AND semantics); each
//! condition can be individually negated.

use crate::context::RequestContext;
use serde::{Deserialize, Serialize};

/// What part of the request a condition inspects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConditionKind {
    /// The request path.
    Path,
    /// The HTTP method.
    Method,
    /// A named request header (`field` holds the header name).
    Header,
    /// The request's application context tag.
    Context,
    /// A named entry in the request metadata bag (`field` holds the key).
    Custom,
}

/// How the inspected value is compared.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConditionOperator {
    /// Exact match.
    Equals,
    /// Substring match.
    Contains,
    /// Prefix match.
    StartsWith,
    /// Suffix match.
    EndsWith,
    /// Regular-expression match (`value` holds the pattern).
    Regex,
    /// The inspected value is present (only meaningful for headers and
    /// custom metadata; path, method and context always exist).
    Exists,
}

/// A declarative predicate over a request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Condition {
    /// What to inspect.
    pub kind: ConditionKind,
    /// How to compare.
    pub operator: ConditionOperator,
    /// Header name or metadata key, for [`ConditionKind::Header`] and
    /// [`ConditionKind::Custom`].
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub field: Option<String>,
    /// The expected value or regex pattern.
    #[serde(default)]
    pub value: String,
    /// Inverts the outcome.
    #[serde(default)]
    pub negate: bool,
}

impl Condition {
    /// Creates a path condition.
    #[must_use]
    pub fn path(operator: ConditionOperator, value: impl Into<String>) -> Self {
        Self {
            kind: ConditionKind::Path,
            operator,
            field: None,
            value: value.into(),
            negate: false,
        }
    }

    /// Creates a method condition.
    #[must_use]
    pub fn method(operator: ConditionOperator, value: impl Into<String>) -> Self {
        Self {
            kind: ConditionKind::Method,
            operator,
            field: None,
            value: value.into(),
            negate: false,
        }
    }

    /// Creates a header condition against the named header.
    #[must_use]
    pub fn header(
        name: impl Into<String>,
        operator: ConditionOperator,
        value: impl Into<String>,
    ) -> Self {
        Self {
            kind: ConditionKind::Header,
            operator,
            field: Some(name.into()),
            value: value.into(),
            negate: false,
        }
    }

    /// Creates an application-context condition.
    #[must_use]
    pub fn context(operator: ConditionOperator, value: impl Into<String>) -> Self {
        Self {
            kind: ConditionKind::Context,
            operator,
            field: None,
            value: value.into(),
            negate: false,
        }
    }

    /// Creates a custom condition against the named metadata key.
    #[must_use]
    pub fn custom(
        key: impl Into<String>,
        operator: ConditionOperator,
        value: impl Into<String>,
    ) -> Self {
        Self {
            kind: ConditionKind::Custom,
            operator,
            field: Some(key.into()),
            value: value.into(),
            negate: false,
        }
    }

    /// Inverts the condition.
    #[must_use]
    pub fn negated(mut self) -> Self {
        self.negate = true;
        self
    }

    /// Evaluates the condition against a request.
    ///
    /// A regex operator with an invalid pattern never matches (before
    /// negation); the validator flags such patterns during audits.
    #[must_use]
    pub fn matches(&self, ctx: &RequestContext) -> bool {
        let subject = self.subject(ctx);

        let outcome = match self.operator {
            ConditionOperator::Exists => subject.is_some(),
            ConditionOperator::Equals => subject.is_some_and(|s| s == self.value),
            ConditionOperator::Contains => subject.is_some_and(|s| s.contains(&self.value)),
            ConditionOperator::StartsWith => subject.is_some_and(|s| s.starts_with(&self.value)),
            ConditionOperator::EndsWith => subject.is_some_and(|s| s.ends_with(&self.value)),
            ConditionOperator::Regex => subject.is_some_and(|s| {
                regex::Regex::new(&self.value).is_ok_and(|re| re.is_match(&s))
            }),
        };

        outcome != self.negate
    }

    /// Extracts the inspected value from the request.
    fn subject(&self, ctx: &RequestContext) -> Option<String> {
        match self.kind {
            ConditionKind::Path => Some(ctx.path.clone()),
            ConditionKind::Method => Some(ctx.method.clone()),
            ConditionKind::Context => Some(ctx.context.name().to_string()),
            ConditionKind::Header => self
                .field
                .as_ref()
                .and_then(|name| ctx.headers.get(name))
                .cloned(),
            ConditionKind::Custom => self.field.as_ref().and_then(|key| {
                ctx.metadata.get(key).map(|v| match v {
                    serde_json::Value::String(s) => s.clone(),
                    other => other.to_string(),
                })
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ApplicationContext;

    fn request() -> RequestContext {
        RequestContext::new("POST", "/api/users/42", ApplicationContext::User)
            .with_header("x-tenant", "acme")
            .with_metadata("healthCheck", serde_json::Value::Bool(true))
    }

    #[test]
    fn test_path_operators() {
        let ctx = request();
        assert!(Condition::path(ConditionOperator::StartsWith, "/api").matches(&ctx));
        assert!(Condition::path(ConditionOperator::Contains, "users").matches(&ctx));
        assert!(Condition::path(ConditionOperator::EndsWith, "/42").matches(&ctx));
        assert!(!Condition::path(ConditionOperator::Equals, "/api").matches(&ctx));
    }

    #[test]
    fn test_regex_operator() {
        let ctx = request();
        assert!(Condition::path(ConditionOperator::Regex, r"^/api/users/\d+$").matches(&ctx));
        // Invalid patterns never match.
        assert!(!Condition::path(ConditionOperator::Regex, r"[unclosed").matches(&ctx));
    }

    #[test]
    fn test_header_exists_and_negation() {
        let ctx = request();
        assert!(Condition::header("x-tenant", ConditionOperator::Exists, "").matches(&ctx));
        assert!(!Condition::header("x-missing", ConditionOperator::Exists, "").matches(&ctx));
        assert!(
            Condition::header("x-missing", ConditionOperator::Exists, "")
                .negated()
                .matches(&ctx)
        );
    }

    #[test]
    fn test_context_condition() {
        let ctx = request();
        assert!(Condition::context(ConditionOperator::Equals, "user").matches(&ctx));
        assert!(!Condition::context(ConditionOperator::Equals, "audit").matches(&ctx));
    }

    #[test]
    fn test_custom_metadata_condition() {
        let ctx = request();
        assert!(Condition::custom("healthCheck", ConditionOperator::Exists, "").matches(&ctx));
        assert!(Condition::custom("healthCheck", ConditionOperator::Equals, "true").matches(&ctx));
        assert!(!Condition::custom("absent", ConditionOperator::Exists, "").matches(&ctx));
    }

    #[test]
    fn test_method_condition() {
        let ctx = request();
        assert!(Condition::method(ConditionOperator::Equals, "POST").matches(&ctx));
        assert!(Condition::method(ConditionOperator::Equals, "GET").negated().matches(&ctx));
    }

    #[test]
    fn test_condition_serialization_round_trip() {
        let cond = Condition::header("authorization", ConditionOperator::StartsWith, "Bearer ")
            .negated();
        let json = serde_json::to_string(&cond).expect("serializes");
        assert!(json.contains("\"kind\":\"header\""));
        assert!(json.contains("\"operator\":\"starts_with\""));

        let back: Condition = serde_json::from_str(&json).expect("deserializes");
        assert!(back.negate);
        assert_eq!(back.field.as_deref(), Some("authorization"));
    }
}
