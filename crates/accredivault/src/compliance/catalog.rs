use std::fmt;

use serde::{Deserialize, Serialize};

use super::domain::{ControlId, EvidenceItem, PackId};

/// Identifier wrapper for evidence rules.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RuleId(pub String);

/// Target of an evidence rule: one control, or every control in a section.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "scope", content = "target")]
pub enum RuleScope {
    Control(ControlId),
    Section(String),
}

/// Temporal semantics of a rule along with the parameters each kind requires.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE", tag = "rule_type")]
pub enum RuleKind {
    OneTime,
    Frequency { frequency_days: u32 },
    RollingWindow { window_days: u32 },
    CountInWindow { window_days: u32 },
    Expiry,
}

/// Flat discriminant used by configuration sources.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RuleType {
    OneTime,
    Frequency,
    RollingWindow,
    CountInWindow,
    Expiry,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ScopeType {
    Control,
    Section,
}

/// Validated evidence rule. Construct through [`RuleDraft::validate`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EvidenceRule {
    pub id: RuleId,
    pub pack_id: PackId,
    pub scope: RuleScope,
    pub kind: RuleKind,
    pub min_items: u32,
    pub requires_verification: bool,
    pub acceptable_categories: Vec<String>,
    pub acceptable_subtypes: Vec<String>,
    pub enabled: bool,
    pub notes: Option<String>,
}

impl EvidenceRule {
    /// Whether the rule targets the given control directly or through its section.
    pub fn applies_to(&self, control_id: ControlId, section_code: &str) -> bool {
        match &self.scope {
            RuleScope::Control(id) => *id == control_id,
            RuleScope::Section(code) => code == section_code,
        }
    }

    /// Category and subtype allow-lists; an empty list admits everything.
    pub fn accepts(&self, item: &EvidenceItem) -> bool {
        let category_ok = self.acceptable_categories.is_empty()
            || self
                .acceptable_categories
                .iter()
                .any(|category| *category == item.category);

        let subtype_ok = self.acceptable_subtypes.is_empty()
            || item.subtype.as_ref().is_some_and(|subtype| {
                self.acceptable_subtypes
                    .iter()
                    .any(|accepted| accepted == subtype)
            });

        category_ok && subtype_ok
    }
}

/// Unvalidated rule configuration as it arrives from a catalog source.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuleDraft {
    pub id: RuleId,
    pub pack_id: PackId,
    pub scope_type: ScopeType,
    #[serde(default)]
    pub control_id: Option<ControlId>,
    #[serde(default)]
    pub section_code: Option<String>,
    pub rule_type: RuleType,
    #[serde(default)]
    pub window_days: Option<i64>,
    #[serde(default)]
    pub frequency_days: Option<i64>,
    #[serde(default)]
    pub min_items: Option<i64>,
    #[serde(default)]
    pub requires_verification: bool,
    #[serde(default)]
    pub acceptable_categories: Vec<String>,
    #[serde(default)]
    pub acceptable_subtypes: Vec<String>,
    #[serde(default = "enabled_by_default")]
    pub enabled: bool,
    #[serde(default)]
    pub notes: Option<String>,
}

fn enabled_by_default() -> bool {
    true
}

/// Single broken invariant in a rule draft.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RuleViolation {
    #[error("control must be set when scope_type=CONTROL")]
    MissingControl,
    #[error("section_code must be empty when scope_type=CONTROL")]
    UnexpectedSectionCode,
    #[error("section_code must be set when scope_type=SECTION")]
    MissingSectionCode,
    #[error("control must be empty when scope_type=SECTION")]
    UnexpectedControl,
    #[error("min_items must be > 0")]
    NonPositiveMinItems,
    #[error("min_items is required and must be > 0 for COUNT_IN_WINDOW")]
    MissingMinItems,
    #[error("frequency_days is required and must be > 0 for FREQUENCY")]
    MissingFrequencyDays,
    #[error("window_days is required and must be > 0 for {0:?}")]
    MissingWindowDays(RuleType),
}

/// Configuration error raised when a rule draft is inconsistent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuleValidationError {
    pub rule_id: RuleId,
    pub violations: Vec<RuleViolation>,
}

impl fmt::Display for RuleValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let messages: Vec<String> = self.violations.iter().map(ToString::to_string).collect();
        write!(f, "invalid rule {}: {}", self.rule_id.0, messages.join("; "))
    }
}

impl std::error::Error for RuleValidationError {}

impl RuleDraft {
    /// Check scope and parameter pairings, reporting every violation at once.
    pub fn validate(self) -> Result<EvidenceRule, RuleValidationError> {
        let mut violations = Vec::new();

        let section_code = self
            .section_code
            .as_deref()
            .map(str::trim)
            .filter(|code| !code.is_empty());

        let scope = match self.scope_type {
            ScopeType::Control => {
                if section_code.is_some() {
                    violations.push(RuleViolation::UnexpectedSectionCode);
                }
                match self.control_id {
                    Some(id) => Some(RuleScope::Control(id)),
                    None => {
                        violations.push(RuleViolation::MissingControl);
                        None
                    }
                }
            }
            ScopeType::Section => {
                if self.control_id.is_some() {
                    violations.push(RuleViolation::UnexpectedControl);
                }
                match section_code {
                    Some(code) => Some(RuleScope::Section(code.to_string())),
                    None => {
                        violations.push(RuleViolation::MissingSectionCode);
                        None
                    }
                }
            }
        };

        let min_items = match self.min_items {
            None if self.rule_type == RuleType::CountInWindow => {
                violations.push(RuleViolation::MissingMinItems);
                None
            }
            None => Some(1),
            Some(value) => match positive_u32(Some(value)) {
                Some(value) => Some(value),
                None => {
                    violations.push(RuleViolation::NonPositiveMinItems);
                    None
                }
            },
        };

        let kind = match self.rule_type {
            RuleType::OneTime => Some(RuleKind::OneTime),
            RuleType::Expiry => Some(RuleKind::Expiry),
            RuleType::Frequency => match positive_u32(self.frequency_days) {
                Some(frequency_days) => Some(RuleKind::Frequency { frequency_days }),
                None => {
                    violations.push(RuleViolation::MissingFrequencyDays);
                    None
                }
            },
            RuleType::RollingWindow => match positive_u32(self.window_days) {
                Some(window_days) => Some(RuleKind::RollingWindow { window_days }),
                None => {
                    violations.push(RuleViolation::MissingWindowDays(RuleType::RollingWindow));
                    None
                }
            },
            RuleType::CountInWindow => match positive_u32(self.window_days) {
                Some(window_days) => Some(RuleKind::CountInWindow { window_days }),
                None => {
                    violations.push(RuleViolation::MissingWindowDays(RuleType::CountInWindow));
                    None
                }
            },
        };

        match (scope, kind, min_items) {
            (Some(scope), Some(kind), Some(min_items)) if violations.is_empty() => {
                Ok(EvidenceRule {
                    id: self.id,
                    pack_id: self.pack_id,
                    scope,
                    kind,
                    min_items,
                    requires_verification: self.requires_verification,
                    acceptable_categories: self.acceptable_categories,
                    acceptable_subtypes: self.acceptable_subtypes,
                    enabled: self.enabled,
                    notes: self.notes,
                })
            }
            _ => Err(RuleValidationError {
                rule_id: self.id,
                violations,
            }),
        }
    }
}

fn positive_u32(value: Option<i64>) -> Option<u32> {
    value
        .filter(|days| *days > 0)
        .and_then(|days| u32::try_from(days).ok())
}
