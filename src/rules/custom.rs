//! Declarative custom rules
//!
//! A custom rule is a list of conditions over node fields; a node matching
//! every condition produces one finding. Definitions are compiled once at
//! load time, so bad field names, operand types and regexes are reported as
//! configuration errors before any analysis starts.

use super::{NodeRule, RuleContext, RuleSettings};
use crate::domain::{Dependency, Finding, NodeId, Severity};
use crate::error::{ConfigError, RuleFault};
use regex::Regex;
use serde::Deserialize;
use std::fmt;
use std::str::FromStr;

/// Custom rule as written in the configuration file
#[derive(Debug, Clone, Deserialize)]
pub struct CustomRuleDef {
    pub id: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub severity: Option<String>,
    pub message: String,
    #[serde(default)]
    pub when: Vec<ConditionDef>,
    /// Visit lockfile-only packages too
    #[serde(default)]
    pub include_transitive: bool,
}

/// One condition as written in the configuration file
#[derive(Debug, Clone, Deserialize)]
pub struct ConditionDef {
    pub field: String,
    pub op: String,
    #[serde(default)]
    pub value: serde_yaml::Value,
}

/// Node attribute a condition looks at
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Field {
    Name,
    Ecosystem,
    Scope,
    Constraint,
    Version,
    Major,
    Prerelease,
    AgeDays,
    LastPublishDays,
    Deprecated,
    License,
    WeeklyDownloads,
    Depth,
    Transitive,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FieldType {
    Text,
    Number,
    Bool,
}

impl Field {
    fn field_type(&self) -> FieldType {
        match self {
            Field::Name
            | Field::Ecosystem
            | Field::Scope
            | Field::Constraint
            | Field::Version
            | Field::License => FieldType::Text,
            Field::Major
            | Field::AgeDays
            | Field::LastPublishDays
            | Field::WeeklyDownloads
            | Field::Depth => FieldType::Number,
            Field::Prerelease | Field::Deprecated | Field::Transitive => FieldType::Bool,
        }
    }

    /// Name used in configuration
    pub fn as_str(&self) -> &'static str {
        match self {
            Field::Name => "name",
            Field::Ecosystem => "ecosystem",
            Field::Scope => "scope",
            Field::Constraint => "constraint",
            Field::Version => "version",
            Field::Major => "major",
            Field::Prerelease => "prerelease",
            Field::AgeDays => "age_days",
            Field::LastPublishDays => "last_publish_days",
            Field::Deprecated => "deprecated",
            Field::License => "license",
            Field::WeeklyDownloads => "weekly_downloads",
            Field::Depth => "depth",
            Field::Transitive => "transitive",
        }
    }

    /// Value of this field for a node, None when it is not known
    fn value(&self, ctx: &RuleContext<'_>, id: NodeId, node: &Dependency) -> Option<FieldValue> {
        let days_since = |at: chrono::DateTime<chrono::Utc>| {
            FieldValue::Number(ctx.now.signed_duration_since(at).num_days() as f64)
        };
        match self {
            Field::Name => Some(FieldValue::Text(node.name.clone())),
            Field::Ecosystem => Some(FieldValue::Text(node.ecosystem.as_str().to_string())),
            Field::Scope => Some(FieldValue::Text(node.scope.as_str().to_string())),
            Field::Constraint => Some(FieldValue::Text(node.constraint.raw.clone())),
            Field::Version => node
                .current_version()
                .map(|v| FieldValue::Text(v.as_str().to_string())),
            Field::Major => node
                .current_version()
                .and_then(|v| v.major())
                .map(|major| FieldValue::Number(major as f64)),
            Field::Prerelease => node
                .current_version()
                .map(|v| FieldValue::Bool(v.is_prerelease())),
            Field::AgeDays => ctx
                .metadata
                .current_release(node)
                .and_then(|release| release.published_at)
                .map(days_since),
            Field::LastPublishDays => ctx
                .metadata
                .for_node(node)
                .and_then(|metadata| metadata.last_published())
                .map(days_since),
            Field::Deprecated => ctx
                .metadata
                .current_release(node)
                .map(|release| FieldValue::Bool(release.deprecated.is_some() || release.yanked)),
            Field::License => ctx
                .metadata
                .for_node(node)
                .and_then(|metadata| metadata.license.clone())
                .map(FieldValue::Text),
            Field::WeeklyDownloads => ctx
                .metadata
                .for_node(node)
                .and_then(|metadata| metadata.weekly_downloads)
                .map(|downloads| FieldValue::Number(downloads as f64)),
            Field::Depth => ctx
                .graph
                .depth(id)
                .map(|depth| FieldValue::Number(depth as f64)),
            Field::Transitive => Some(FieldValue::Bool(!node.is_direct())),
        }
    }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for Field {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let field = match s.trim() {
            "name" => Field::Name,
            "ecosystem" => Field::Ecosystem,
            "scope" => Field::Scope,
            "constraint" => Field::Constraint,
            "version" => Field::Version,
            "major" => Field::Major,
            "prerelease" => Field::Prerelease,
            "age_days" => Field::AgeDays,
            "last_publish_days" => Field::LastPublishDays,
            "deprecated" => Field::Deprecated,
            "license" => Field::License,
            "weekly_downloads" => Field::WeeklyDownloads,
            "depth" => Field::Depth,
            "transitive" => Field::Transitive,
            other => return Err(format!("unknown field '{}'", other)),
        };
        Ok(field)
    }
}

/// Comparison a condition applies
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConditionOp {
    Eq,
    Ne,
    Gt,
    Gte,
    Lt,
    Lte,
    Contains,
    Matches,
    In,
    Exists,
}

impl FromStr for ConditionOp {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let op = match s.trim() {
            "eq" => ConditionOp::Eq,
            "ne" => ConditionOp::Ne,
            "gt" => ConditionOp::Gt,
            "gte" => ConditionOp::Gte,
            "lt" => ConditionOp::Lt,
            "lte" => ConditionOp::Lte,
            "contains" => ConditionOp::Contains,
            "matches" => ConditionOp::Matches,
            "in" => ConditionOp::In,
            "exists" => ConditionOp::Exists,
            other => return Err(format!("unknown operator '{}'", other)),
        };
        Ok(op)
    }
}

#[derive(Debug, Clone, PartialEq)]
enum FieldValue {
    Text(String),
    Number(f64),
    Bool(bool),
}

/// Compiled right-hand side of a condition
#[derive(Debug, Clone)]
enum Operand {
    Value(FieldValue),
    List(Vec<FieldValue>),
    Pattern(Regex),
    Present(bool),
}

/// A compiled condition
#[derive(Debug, Clone)]
pub struct Condition {
    pub field: Field,
    pub op: ConditionOp,
    operand: Operand,
}

fn scalar(field_type: FieldType, value: &serde_yaml::Value) -> Result<FieldValue, String> {
    match (field_type, value) {
        (FieldType::Text, serde_yaml::Value::String(s)) => Ok(FieldValue::Text(s.clone())),
        (FieldType::Text, serde_yaml::Value::Number(n)) => Ok(FieldValue::Text(n.to_string())),
        (FieldType::Number, v) => v
            .as_f64()
            .map(FieldValue::Number)
            .ok_or_else(|| "expected a number".to_string()),
        (FieldType::Bool, serde_yaml::Value::Bool(b)) => Ok(FieldValue::Bool(*b)),
        (FieldType::Text, _) => Err("expected a string".to_string()),
        (FieldType::Bool, _) => Err("expected true or false".to_string()),
    }
}

impl Condition {
    /// Compile a condition, checking the operand against the field's type
    pub fn compile(def: &ConditionDef) -> Result<Self, String> {
        let field: Field = def.field.parse()?;
        let op: ConditionOp = def.op.parse()?;
        let field_type = field.field_type();
        let wrong = |message: String| format!("{} {}: {}", field, def.op.trim(), message);

        let operand = match op {
            ConditionOp::Eq | ConditionOp::Ne => {
                Operand::Value(scalar(field_type, &def.value).map_err(wrong)?)
            }
            ConditionOp::Gt | ConditionOp::Gte | ConditionOp::Lt | ConditionOp::Lte => {
                if field_type != FieldType::Number {
                    return Err(wrong("ordering needs a numeric field".to_string()));
                }
                Operand::Value(scalar(field_type, &def.value).map_err(wrong)?)
            }
            ConditionOp::Contains => {
                if field_type != FieldType::Text {
                    return Err(wrong("contains needs a text field".to_string()));
                }
                Operand::Value(scalar(field_type, &def.value).map_err(wrong)?)
            }
            ConditionOp::Matches => {
                if field_type != FieldType::Text {
                    return Err(wrong("matches needs a text field".to_string()));
                }
                let serde_yaml::Value::String(pattern) = &def.value else {
                    return Err(wrong("expected a regular expression".to_string()));
                };
                Operand::Pattern(Regex::new(pattern).map_err(|e| wrong(e.to_string()))?)
            }
            ConditionOp::In => {
                let serde_yaml::Value::Sequence(items) = &def.value else {
                    return Err(wrong("expected a list".to_string()));
                };
                Operand::List(
                    items
                        .iter()
                        .map(|item| scalar(field_type, item))
                        .collect::<Result<_, _>>()
                        .map_err(wrong)?,
                )
            }
            ConditionOp::Exists => match &def.value {
                serde_yaml::Value::Null => Operand::Present(true),
                serde_yaml::Value::Bool(b) => Operand::Present(*b),
                _ => return Err(wrong("expected true or false".to_string())),
            },
        };

        Ok(Self { field, op, operand })
    }

    fn holds(&self, actual: Option<&FieldValue>) -> bool {
        if let Operand::Present(expected) = &self.operand {
            return actual.is_some() == *expected;
        }
        let Some(actual) = actual else {
            return false;
        };
        match (&self.operand, self.op) {
            (Operand::Value(expected), ConditionOp::Eq) => actual == expected,
            (Operand::Value(expected), ConditionOp::Ne) => actual != expected,
            (Operand::Value(FieldValue::Number(expected)), op) => {
                let FieldValue::Number(actual) = actual else {
                    return false;
                };
                match op {
                    ConditionOp::Gt => actual > expected,
                    ConditionOp::Gte => actual >= expected,
                    ConditionOp::Lt => actual < expected,
                    ConditionOp::Lte => actual <= expected,
                    _ => false,
                }
            }
            (Operand::Value(FieldValue::Text(needle)), ConditionOp::Contains) => match actual {
                FieldValue::Text(text) => text.contains(needle.as_str()),
                _ => false,
            },
            (Operand::Pattern(regex), _) => match actual {
                FieldValue::Text(text) => regex.is_match(text),
                _ => false,
            },
            (Operand::List(items), _) => items.contains(actual),
            _ => false,
        }
    }
}

/// A compiled custom rule
#[derive(Debug, Clone)]
pub struct CustomRule {
    id: String,
    description: String,
    severity: Severity,
    message: String,
    conditions: Vec<Condition>,
    include_transitive: bool,
}

impl CustomRule {
    /// Compile a definition
    pub fn compile(def: &CustomRuleDef) -> Result<Self, ConfigError> {
        let id = def.id.trim();
        if id.is_empty() || id.contains(char::is_whitespace) {
            return Err(ConfigError::invalid_custom_rule(
                def.id.clone(),
                "id must be a non-empty word",
            ));
        }
        if def.when.is_empty() {
            return Err(ConfigError::invalid_custom_rule(id, "no conditions"));
        }

        let severity = match &def.severity {
            Some(value) => value
                .parse::<Severity>()
                .map_err(|_| ConfigError::InvalidSeverity {
                    value: value.clone(),
                })?,
            None => Severity::Warning,
        };

        let conditions = def
            .when
            .iter()
            .map(Condition::compile)
            .collect::<Result<Vec<_>, _>>()
            .map_err(|message| ConfigError::invalid_custom_rule(id, message))?;

        Ok(Self {
            id: id.to_string(),
            description: def.description.clone().unwrap_or_else(|| def.message.clone()),
            severity,
            message: def.message.clone(),
            conditions,
            include_transitive: def.include_transitive,
        })
    }

    fn render(&self, node: &Dependency) -> String {
        let version = node
            .current_version()
            .map(|v| v.to_string())
            .unwrap_or_else(|| node.constraint.raw.clone());
        self.message
            .replace("{name}", &node.name)
            .replace("{version}", &version)
            .replace("{ecosystem}", node.ecosystem.as_str())
    }
}

impl NodeRule for CustomRule {
    fn id(&self) -> &str {
        &self.id
    }

    fn description(&self) -> &str {
        &self.description
    }

    fn defaults(&self) -> RuleSettings {
        RuleSettings::new(self.severity)
    }

    fn includes_transitive(&self) -> bool {
        self.include_transitive
    }

    fn check(
        &self,
        ctx: &RuleContext<'_>,
        id: NodeId,
        node: &Dependency,
    ) -> Result<Option<Finding>, RuleFault> {
        let all_hold = self
            .conditions
            .iter()
            .all(|condition| condition.holds(condition.field.value(ctx, id, node).as_ref()));
        Ok(all_hold.then(|| ctx.node_finding(id, self.render(node))))
    }
}
