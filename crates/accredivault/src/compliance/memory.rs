use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard};

use chrono::{DateTime, Utc};

use super::catalog::EvidenceRule;
use super::domain::{
    Control, ControlId, ControlNote, ControlVerification, EvidenceId, EvidenceItem, EvidenceLink,
    PackId, StandardPack, VerificationId,
};
use super::repository::{
    ComplianceRepository, ControlStatusCache, RepositoryError, StatusCacheStore,
};

/// Process-local storage backing both the source collaborators and the status cache.
#[derive(Debug, Default, Clone)]
pub struct InMemoryComplianceStore {
    state: Arc<Mutex<StoreState>>,
}

#[derive(Debug, Default)]
struct StoreState {
    packs: BTreeMap<PackId, StandardPack>,
    controls: BTreeMap<ControlId, Control>,
    rules: Vec<EvidenceRule>,
    evidence: BTreeMap<EvidenceId, EvidenceItem>,
    links: Vec<EvidenceLink>,
    verifications: Vec<ControlVerification>,
    notes: Vec<ControlNote>,
    status_cache: BTreeMap<ControlId, ControlStatusCache>,
}

impl InMemoryComplianceStore {
    fn state(&self) -> Result<MutexGuard<'_, StoreState>, RepositoryError> {
        self.state
            .lock()
            .map_err(|_| RepositoryError::Unavailable("store mutex poisoned".to_string()))
    }

    pub fn insert_pack(&self, pack: StandardPack) -> Result<(), RepositoryError> {
        let mut state = self.state()?;
        if state.packs.contains_key(&pack.id) {
            return Err(RepositoryError::Conflict);
        }
        state.packs.insert(pack.id, pack);
        Ok(())
    }

    pub fn insert_control(&self, control: Control) -> Result<(), RepositoryError> {
        let mut state = self.state()?;
        if !state.packs.contains_key(&control.pack_id) {
            return Err(RepositoryError::NotFound);
        }
        if state.controls.contains_key(&control.id) {
            return Err(RepositoryError::Conflict);
        }
        state.controls.insert(control.id, control);
        Ok(())
    }

    pub fn insert_rule(&self, rule: EvidenceRule) -> Result<(), RepositoryError> {
        let mut state = self.state()?;
        if state.rules.iter().any(|existing| existing.id == rule.id) {
            return Err(RepositoryError::Conflict);
        }
        state.rules.push(rule);
        Ok(())
    }

    pub fn insert_evidence(&self, item: EvidenceItem) -> Result<(), RepositoryError> {
        let mut state = self.state()?;
        if state.evidence.contains_key(&item.id) {
            return Err(RepositoryError::Conflict);
        }
        state.evidence.insert(item.id.clone(), item);
        Ok(())
    }

    /// Drop every cached status row; they are rebuilt by the next recompute.
    pub fn clear_status_cache(&self) -> Result<(), RepositoryError> {
        self.state()?.status_cache.clear();
        Ok(())
    }

    pub fn verification_ids(&self) -> Result<Vec<VerificationId>, RepositoryError> {
        Ok(self
            .state()?
            .verifications
            .iter()
            .map(|record| record.id.clone())
            .collect())
    }
}

impl ComplianceRepository for InMemoryComplianceStore {
    fn pack(&self, id: PackId) -> Result<Option<StandardPack>, RepositoryError> {
        Ok(self.state()?.packs.get(&id).cloned())
    }

    fn latest_pack(&self) -> Result<Option<StandardPack>, RepositoryError> {
        Ok(self
            .state()?
            .packs
            .values()
            .max_by_key(|pack| (pack.created_at, pack.id))
            .cloned())
    }

    fn pack_by_version(&self, version: &str) -> Result<Option<StandardPack>, RepositoryError> {
        Ok(self
            .state()?
            .packs
            .values()
            .filter(|pack| pack.version == version)
            .max_by_key(|pack| (pack.created_at, pack.id))
            .cloned())
    }

    fn control(&self, id: ControlId) -> Result<Option<Control>, RepositoryError> {
        Ok(self.state()?.controls.get(&id).cloned())
    }

    fn controls_for_pack(&self, pack_id: PackId) -> Result<Vec<Control>, RepositoryError> {
        let mut controls: Vec<Control> = self
            .state()?
            .controls
            .values()
            .filter(|control| control.pack_id == pack_id)
            .cloned()
            .collect();
        controls.sort_by_key(|control| (control.sort_order, control.id));
        Ok(controls)
    }

    fn rules_for_pack(&self, pack_id: PackId) -> Result<Vec<EvidenceRule>, RepositoryError> {
        Ok(self
            .state()?
            .rules
            .iter()
            .filter(|rule| rule.pack_id == pack_id)
            .cloned()
            .collect())
    }

    fn evidence_item(&self, id: &EvidenceId) -> Result<Option<EvidenceItem>, RepositoryError> {
        Ok(self.state()?.evidence.get(id).cloned())
    }

    fn linked_evidence(&self, control_id: ControlId) -> Result<Vec<EvidenceItem>, RepositoryError> {
        let state = self.state()?;
        let mut items: Vec<EvidenceItem> = state
            .links
            .iter()
            .filter(|link| link.control_id == control_id)
            .filter_map(|link| state.evidence.get(&link.evidence_id).cloned())
            .collect();
        items.sort_by(|a, b| {
            b.event_date
                .cmp(&a.event_date)
                .then_with(|| a.id.cmp(&b.id))
        });
        Ok(items)
    }

    fn latest_link_at(
        &self,
        control_id: ControlId,
    ) -> Result<Option<DateTime<Utc>>, RepositoryError> {
        Ok(self
            .state()?
            .links
            .iter()
            .filter(|link| link.control_id == control_id)
            .map(|link| link.linked_at)
            .max())
    }

    fn verifications(
        &self,
        control_id: ControlId,
    ) -> Result<Vec<ControlVerification>, RepositoryError> {
        Ok(self
            .state()?
            .verifications
            .iter()
            .filter(|record| record.control_id == control_id)
            .cloned()
            .collect())
    }

    fn insert_link(&self, link: EvidenceLink) -> Result<(), RepositoryError> {
        let mut state = self.state()?;
        let duplicate = state.links.iter().any(|existing| {
            existing.control_id == link.control_id && existing.evidence_id == link.evidence_id
        });
        if duplicate {
            return Err(RepositoryError::Conflict);
        }
        state.links.push(link);
        Ok(())
    }

    fn remove_link(
        &self,
        control_id: ControlId,
        evidence_id: &EvidenceId,
    ) -> Result<(), RepositoryError> {
        let mut state = self.state()?;
        let before = state.links.len();
        state
            .links
            .retain(|link| !(link.control_id == control_id && link.evidence_id == *evidence_id));
        if state.links.len() == before {
            return Err(RepositoryError::NotFound);
        }
        Ok(())
    }

    /// Fails with `Conflict` when a record with the same id exists.
    fn append_verification(&self, record: ControlVerification) -> Result<(), RepositoryError> {
        let mut state = self.state()?;
        if state.verifications.iter().any(|existing| existing.id == record.id) {
            return Err(RepositoryError::Conflict);
        }
        state.verifications.push(record);
        Ok(())
    }

    fn notes(&self, control_id: ControlId) -> Result<Vec<ControlNote>, RepositoryError> {
        let mut notes: Vec<ControlNote> = self
            .state()?
            .notes
            .iter()
            .filter(|note| note.control_id == control_id)
            .cloned()
            .collect();
        notes.sort_by(|a, b| {
            b.created_at
                .cmp(&a.created_at)
                .then_with(|| b.id.0.cmp(&a.id.0))
        });
        Ok(notes)
    }

    fn insert_note(&self, note: ControlNote) -> Result<(), RepositoryError> {
        let mut state = self.state()?;
        if state.notes.iter().any(|existing| existing.id == note.id) {
            return Err(RepositoryError::Conflict);
        }
        state.notes.push(note);
        Ok(())
    }

    fn update_note(&self, note: ControlNote) -> Result<(), RepositoryError> {
        let mut state = self.state()?;
        let slot = state
            .notes
            .iter_mut()
            .find(|existing| existing.id == note.id)
            .ok_or(RepositoryError::NotFound)?;
        *slot = note;
        Ok(())
    }
}

impl StatusCacheStore for InMemoryComplianceStore {
    fn upsert_by_control(
        &self,
        row: ControlStatusCache,
    ) -> Result<Option<ControlStatusCache>, RepositoryError> {
        Ok(self.state()?.status_cache.insert(row.control_id, row))
    }

    fn fetch(&self, control_id: ControlId) -> Result<Option<ControlStatusCache>, RepositoryError> {
        Ok(self.state()?.status_cache.get(&control_id).cloned())
    }
}
