use crate::error::{Result, TagflowError};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

/// Provider filter-name prefix accepted (and stripped) on tag keys.
pub const TAG_KEY_PREFIX: &str = "tag:";

// ---------------------------------------------------------------------------
// TagCondition
// ---------------------------------------------------------------------------

/// "Resource has tag `key` with a value in `values`."
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TagCondition {
    key: String,
    values: Vec<String>,
}

impl TagCondition {
    /// Build a condition, normalizing `tag:Name` to `Name`.
    pub fn new(key: impl Into<String>, values: Vec<String>) -> Result<Self> {
        let key = key.into();
        let key = key
            .strip_prefix(TAG_KEY_PREFIX)
            .map(str::to_string)
            .unwrap_or(key);
        let condition = Self { key, values };
        condition.validate()?;
        Ok(condition)
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn values(&self) -> &[String] {
        &self.values
    }

    pub fn validate(&self) -> Result<()> {
        if self.key.trim().is_empty() {
            return Err(TagflowError::MalformedCondition {
                key: self.key.clone(),
                reason: "tag key is empty".to_string(),
            });
        }
        if self.values.is_empty() {
            return Err(TagflowError::MalformedCondition {
                key: self.key.clone(),
                reason: "no values given".to_string(),
            });
        }
        if self.values.iter().any(|v| v.is_empty()) {
            return Err(TagflowError::MalformedCondition {
                key: self.key.clone(),
                reason: "values must not be empty strings".to_string(),
            });
        }
        Ok(())
    }
}

impl fmt::Display for TagCondition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}={}", self.key, self.values.join("|"))
    }
}

/// Render a condition list for error context, e.g. `Instance=A|B, env=dev`.
pub fn describe_conditions(conditions: &[TagCondition]) -> String {
    conditions
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

// ---------------------------------------------------------------------------
// FilterExpression
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FilterExpression {
    /// Any condition may match: one query per condition, results unioned.
    Or(Vec<TagCondition>),
    /// All conditions must match: one compound query.
    And(Vec<TagCondition>),
}

impl FilterExpression {
    pub fn conditions(&self) -> &[TagCondition] {
        match self {
            FilterExpression::Or(c) | FilterExpression::And(c) => c,
        }
    }

    pub fn mode_name(&self) -> &'static str {
        match self {
            FilterExpression::Or(_) => "or",
            FilterExpression::And(_) => "and",
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.conditions().is_empty() {
            return Err(TagflowError::MalformedRequest(format!(
                "'{}' needs at least one condition",
                self.mode_name()
            )));
        }
        for condition in self.conditions() {
            condition.validate()?;
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// ResourceId
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ResourceId(String);

impl ResourceId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ResourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ResourceId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for ResourceId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

/// Render an id set for error context.
pub fn describe_ids<'a>(ids: impl IntoIterator<Item = &'a ResourceId>) -> String {
    ids.into_iter()
        .map(ResourceId::as_str)
        .collect::<Vec<_>>()
        .join(",")
}

// ---------------------------------------------------------------------------
// MatchSet
// ---------------------------------------------------------------------------

/// Deduplicated result of resolving a filter expression.
///
/// `count` is always derived from `ids`, so the two can never disagree.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "MatchSetRepr", into = "MatchSetRepr")]
pub struct MatchSet {
    ids: BTreeSet<ResourceId>,
}

impl MatchSet {
    pub fn ids(&self) -> &BTreeSet<ResourceId> {
        &self.ids
    }

    pub fn into_ids(self) -> BTreeSet<ResourceId> {
        self.ids
    }

    pub fn count(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    pub fn contains(&self, id: &ResourceId) -> bool {
        self.ids.contains(id)
    }
}

impl FromIterator<ResourceId> for MatchSet {
    fn from_iter<I: IntoIterator<Item = ResourceId>>(iter: I) -> Self {
        Self {
            ids: iter.into_iter().collect(),
        }
    }
}

#[derive(Serialize, Deserialize)]
struct MatchSetRepr {
    #[serde(default)]
    count: usize,
    ids: Vec<ResourceId>,
}

impl From<MatchSetRepr> for MatchSet {
    fn from(repr: MatchSetRepr) -> Self {
        repr.ids.into_iter().collect()
    }
}

impl From<MatchSet> for MatchSetRepr {
    fn from(set: MatchSet) -> Self {
        Self {
            count: set.count(),
            ids: set.ids.into_iter().collect(),
        }
    }
}

// ---------------------------------------------------------------------------
// LifecycleAction
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LifecycleAction {
    Start,
    Stop,
}

impl LifecycleAction {
    pub fn as_str(self) -> &'static str {
        match self {
            LifecycleAction::Start => "Start",
            LifecycleAction::Stop => "Stop",
        }
    }

    /// The state a resource settles in once this action has been applied.
    pub fn target_state(self) -> InstanceState {
        match self {
            LifecycleAction::Start => InstanceState::Running,
            LifecycleAction::Stop => InstanceState::Stopped,
        }
    }
}

impl fmt::Display for LifecycleAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for LifecycleAction {
    type Err = TagflowError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "Start" => Ok(LifecycleAction::Start),
            "Stop" => Ok(LifecycleAction::Stop),
            _ => Err(TagflowError::InvalidAction(s.to_string())),
        }
    }
}

// ---------------------------------------------------------------------------
// InstanceState
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum InstanceState {
    Pending,
    Running,
    ShuttingDown,
    Terminated,
    Stopping,
    Stopped,
}

impl InstanceState {
    pub fn as_str(self) -> &'static str {
        match self {
            InstanceState::Pending => "pending",
            InstanceState::Running => "running",
            InstanceState::ShuttingDown => "shutting-down",
            InstanceState::Terminated => "terminated",
            InstanceState::Stopping => "stopping",
            InstanceState::Stopped => "stopped",
        }
    }
}

impl fmt::Display for InstanceState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for InstanceState {
    type Err = TagflowError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "pending" => Ok(InstanceState::Pending),
            "running" => Ok(InstanceState::Running),
            "shutting-down" => Ok(InstanceState::ShuttingDown),
            "terminated" => Ok(InstanceState::Terminated),
            "stopping" => Ok(InstanceState::Stopping),
            "stopped" => Ok(InstanceState::Stopped),
            _ => Err(TagflowError::InvalidInstanceState(s.to_string())),
        }
    }
}

// ---------------------------------------------------------------------------
// ExecutionRequest
// ---------------------------------------------------------------------------

/// One workflow run's unit of work. Serialized in the trigger payload shape;
/// see `request.rs`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(
    try_from = "crate::request::RawRequest",
    into = "crate::request::RawRequest"
)]
pub struct ExecutionRequest {
    pub expression: FilterExpression,
    pub action: LifecycleAction,
}

impl ExecutionRequest {
    pub fn new(expression: FilterExpression, action: LifecycleAction) -> Result<Self> {
        expression.validate()?;
        Ok(Self { expression, action })
    }

    pub fn validate(&self) -> Result<()> {
        self.expression.validate()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
