//! Trigger payload parsing.
//!
//! The scheduler hands each run a JSON document of the form
//!
//! ```text
//! { "Tags": { "or":  [{"Key": "Instance", "Values": ["Instance A"]}] },
//!   "Action": "Stop" }
//! { "Tags": { "and": [{"Name": "tag:Instance", "Values": ["Instance A"]}] },
//!   "Action": "Start" }
//! ```
//!
//! `Key` and `Name` are the same field in either mode, and the `tag:` prefix
//! is optional. Requests always serialize back out with `Key` and no prefix.

use crate::error::{Result, TagflowError};
use crate::types::{ExecutionRequest, FilterExpression, LifecycleAction, TagCondition};
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Wire types
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RawRequest {
    #[serde(rename = "Tags")]
    pub tags: RawTags,
    #[serde(rename = "Action")]
    pub action: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RawTags {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub or: Option<Vec<RawCondition>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub and: Option<Vec<RawCondition>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RawCondition {
    #[serde(rename = "Key", alias = "Name")]
    pub key: String,
    #[serde(rename = "Values")]
    pub values: Vec<String>,
}

// ---------------------------------------------------------------------------
// Conversions
// ---------------------------------------------------------------------------

fn conditions(raw: Vec<RawCondition>) -> Result<Vec<TagCondition>> {
    raw.into_iter()
        .map(|c| TagCondition::new(c.key, c.values))
        .collect()
}

impl TryFrom<RawTags> for FilterExpression {
    type Error = TagflowError;

    fn try_from(raw: RawTags) -> Result<Self> {
        let expression = match (raw.or, raw.and) {
            (Some(_), Some(_)) => {
                return Err(TagflowError::MalformedRequest(
                    "both 'or' and 'and' given; exactly one is required".to_string(),
                ))
            }
            (None, None) => {
                return Err(TagflowError::MalformedRequest(
                    "one of 'or' or 'and' is required".to_string(),
                ))
            }
            (Some(or), None) => FilterExpression::Or(conditions(or)?),
            (None, Some(and)) => FilterExpression::And(conditions(and)?),
        };
        expression.validate()?;
        Ok(expression)
    }
}

impl From<&FilterExpression> for RawTags {
    fn from(expression: &FilterExpression) -> Self {
        let raw: Vec<RawCondition> = expression
            .conditions()
            .iter()
            .map(|c| RawCondition {
                key: c.key().to_string(),
                values: c.values().to_vec(),
            })
            .collect();
        match expression {
            FilterExpression::Or(_) => RawTags {
                or: Some(raw),
                and: None,
            },
            FilterExpression::And(_) => RawTags {
                or: None,
                and: Some(raw),
            },
        }
    }
}

impl TryFrom<RawRequest> for ExecutionRequest {
    type Error = TagflowError;

    fn try_from(raw: RawRequest) -> Result<Self> {
        let expression = FilterExpression::try_from(raw.tags)?;
        let action: LifecycleAction = raw.action.parse()?;
        ExecutionRequest::new(expression, action)
    }
}

impl From<ExecutionRequest> for RawRequest {
    fn from(request: ExecutionRequest) -> Self {
        Self {
            tags: RawTags::from(&request.expression),
            action: request.action.as_str().to_string(),
        }
    }
}

// ---------------------------------------------------------------------------
// Entry points
// ---------------------------------------------------------------------------

/// Parse a trigger payload. Every failure is a malformed-request error.
pub fn parse_request(payload: &str) -> Result<ExecutionRequest> {
    let raw: RawRequest = serde_json::from_str(payload)
        .map_err(|e| TagflowError::MalformedRequest(e.to_string()))?;
    ExecutionRequest::try_from(raw)
}

/// Parse just the `Tags` object of a payload.
pub fn expression_from_value(value: serde_json::Value) -> Result<FilterExpression> {
    let raw: RawTags = serde_json::from_value(value)
        .map_err(|e| TagflowError::MalformedRequest(e.to_string()))?;
    FilterExpression::try_from(raw)
}

/// Parse a payload whose `Action` is optional, keeping only its expression.
/// A present `Action` must still be valid.
pub fn parse_expression(payload: &str) -> Result<FilterExpression> {
    let value: serde_json::Value = serde_json::from_str(payload)
        .map_err(|e| TagflowError::MalformedRequest(e.to_string()))?;
    let serde_json::Value::Object(mut fields) = value else {
        return Err(TagflowError::MalformedRequest(
            "payload must be a JSON object".to_string(),
        ));
    };
    if let Some(action) = fields.remove("Action") {
        let Some(action) = action.as_str() else {
            return Err(TagflowError::MalformedRequest(
                "'Action' must be a string".to_string(),
            ));
        };
        action.parse::<LifecycleAction>()?;
    }
    let tags = fields
        .remove("Tags")
        .ok_or_else(|| TagflowError::MalformedRequest("'Tags' is required".to_string()))?;
    if let Some(unknown) = fields.keys().next() {
        return Err(TagflowError::MalformedRequest(format!(
            "unknown field '{unknown}'"
        )));
    }
    expression_from_value(tags)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
