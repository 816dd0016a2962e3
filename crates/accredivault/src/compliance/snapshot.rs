use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;

use serde::Deserialize;

use super::catalog::{RuleDraft, RuleValidationError};
use super::domain::{Control, ControlVerification, EvidenceItem, EvidenceLink, StandardPack};
use super::memory::InMemoryComplianceStore;
use super::repository::{ComplianceRepository, RepositoryError};

/// JSON document seeding the in-memory store: catalog, evidence, links and verifications.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ComplianceSnapshot {
    #[serde(default)]
    pub packs: Vec<StandardPack>,
    #[serde(default)]
    pub controls: Vec<Control>,
    #[serde(default)]
    pub rules: Vec<RuleDraft>,
    #[serde(default)]
    pub evidence: Vec<EvidenceItem>,
    #[serde(default)]
    pub links: Vec<EvidenceLink>,
    #[serde(default)]
    pub verifications: Vec<ControlVerification>,
}

impl ComplianceSnapshot {
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, SnapshotError> {
        let file = File::open(path.as_ref())?;
        Self::from_reader(BufReader::new(file))
    }

    pub fn from_reader<Rd: Read>(reader: Rd) -> Result<Self, SnapshotError> {
        Ok(serde_json::from_reader(reader)?)
    }

    /// Validate every rule and load the records. Links and verifications must
    /// reference known controls and evidence.
    pub fn into_store(self) -> Result<InMemoryComplianceStore, SnapshotError> {
        let store = InMemoryComplianceStore::default();

        for pack in self.packs {
            store.insert_pack(pack)?;
        }
        for control in self.controls {
            let code = control.control_code.clone();
            store.insert_control(control).map_err(|err| match err {
                RepositoryError::NotFound => {
                    SnapshotError::DanglingReference(format!("control {code} names an unknown pack"))
                }
                other => SnapshotError::Repository(other),
            })?;
        }
        for draft in self.rules {
            let rule = draft.validate()?;
            if store.pack(rule.pack_id)?.is_none() {
                return Err(SnapshotError::DanglingReference(format!(
                    "rule {} names unknown pack {}",
                    rule.id.0, rule.pack_id
                )));
            }
            store.insert_rule(rule)?;
        }
        for item in self.evidence {
            store.insert_evidence(item)?;
        }
        for link in self.links {
            if store.control(link.control_id)?.is_none()
                || store.evidence_item(&link.evidence_id)?.is_none()
            {
                return Err(SnapshotError::DanglingReference(format!(
                    "link {} -> {} names an unknown record",
                    link.control_id, link.evidence_id
                )));
            }
            store.insert_link(link)?;
        }
        for record in self.verifications {
            if store.control(record.control_id)?.is_none() {
                return Err(SnapshotError::DanglingReference(format!(
                    "verification {} names unknown control {}",
                    record.id.0, record.control_id
                )));
            }
            store.append_verification(record)?;
        }

        Ok(store)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum SnapshotError {
    #[error("failed to read snapshot: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse snapshot: {0}")]
    Json(#[from] serde_json::Error),
    #[error(transparent)]
    InvalidRule(#[from] RuleValidationError),
    #[error("dangling reference: {0}")]
    DanglingReference(String),
    #[error(transparent)]
    Repository(#[from] RepositoryError),
}
