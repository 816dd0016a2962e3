use std::fmt;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// Section code used when a control code does not follow `<authority>-<section>-<sequence>`.
pub const UNKNOWN_SECTION: &str = "UNK";

/// Identifier wrapper for standard packs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PackId(pub u64);

impl fmt::Display for PackId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Identifier wrapper for checklist controls.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ControlId(pub u64);

impl fmt::Display for ControlId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Identifier wrapper for evidence items supplied by the evidence collaborator.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EvidenceId(pub String);

impl fmt::Display for EvidenceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Identifier wrapper for verification records.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct VerificationId(pub String);

/// Versioned collection of controls published by a regulatory authority.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StandardPack {
    pub id: PackId,
    pub authority_code: String,
    pub name: String,
    pub version: String,
    pub created_at: DateTime<Utc>,
}

/// Single auditable checklist requirement.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Control {
    pub id: ControlId,
    pub pack_id: PackId,
    /// Code such as `PHC-ROM-001`; the middle segment is the section code.
    pub control_code: String,
    #[serde(default)]
    pub section: String,
    #[serde(default)]
    pub sort_order: i32,
}

impl Control {
    pub fn section_code(&self) -> &str {
        section_code_for(&self.control_code)
    }
}

/// Extract the section segment from `<authority>-<section>-<sequence>`.
///
/// Anything else, including empty segments, resolves to [`UNKNOWN_SECTION`].
pub fn section_code_for(control_code: &str) -> &str {
    let mut parts = control_code.split('-');
    match (parts.next(), parts.next(), parts.next(), parts.next()) {
        (Some(authority), Some(section), Some(sequence), None)
            if !authority.is_empty() && !section.is_empty() && !sequence.is_empty() =>
        {
            section
        }
        _ => UNKNOWN_SECTION,
    }
}

/// Dated artifact offered in support of compliance. Read-only to the engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EvidenceItem {
    pub id: EvidenceId,
    #[serde(default)]
    pub title: String,
    pub category: String,
    #[serde(default)]
    pub subtype: Option<String>,
    pub event_date: NaiveDate,
    #[serde(default)]
    pub valid_from: Option<NaiveDate>,
    #[serde(default)]
    pub valid_until: Option<NaiveDate>,
}

/// Join between a control and an evidence item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EvidenceLink {
    pub control_id: ControlId,
    pub evidence_id: EvidenceId,
    pub linked_at: DateTime<Utc>,
    #[serde(default)]
    pub linked_by: Option<String>,
    #[serde(default)]
    pub relevance_note: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum VerificationStatus {
    Verified,
    Rejected,
}

impl VerificationStatus {
    pub const fn label(self) -> &'static str {
        match self {
            Self::Verified => "Verified",
            Self::Rejected => "Rejected",
        }
    }
}

/// Append-only human attestation about a control's evidence.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ControlVerification {
    pub id: VerificationId,
    pub control_id: ControlId,
    pub status: VerificationStatus,
    #[serde(default)]
    pub remarks: Option<String>,
    #[serde(default)]
    pub verified_by: Option<String>,
    pub verified_at: DateTime<Utc>,
    /// Latest link timestamp for the control at the moment of verification.
    #[serde(default)]
    pub evidence_snapshot_at: Option<DateTime<Utc>>,
}

/// Identifier wrapper for control notes.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NoteId(pub String);

impl fmt::Display for NoteId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum NoteType {
    Internal,
    Inspection,
    CorrectiveAction,
}

/// Free-text remark attached to a control. Notes never feed status computation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ControlNote {
    pub id: NoteId,
    pub control_id: ControlId,
    pub note_type: NoteType,
    pub text: String,
    #[serde(default)]
    pub created_by: Option<String>,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub resolved: bool,
    #[serde(default)]
    pub resolved_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub resolved_by: Option<String>,
}

/// Who is performing a recompute or mutation, carried into audit-facing log events.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind", content = "name")]
pub enum Actor {
    System,
    Anonymous,
    User(String),
}

impl Actor {
    pub fn user(name: impl Into<String>) -> Self {
        Self::User(name.into())
    }

    /// Name recorded on links and verifications; scheduled and anonymous actors leave it empty.
    pub fn username(&self) -> Option<&str> {
        match self {
            Self::User(name) => Some(name.as_str()),
            Self::System | Self::Anonymous => None,
        }
    }
}

impl fmt::Display for Actor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::System => write!(f, "system"),
            Self::Anonymous => write!(f, "anonymous"),
            Self::User(name) => write!(f, "user:{name}"),
        }
    }
}
