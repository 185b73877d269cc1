//! Region store
//!
//! Canonical per-document region list plus the selection. Every mutation
//! here is synchronous and local; keeping the backend in step is the
//! caller's job.

use shield_core::{BBox, CoreError, Region, RegionAction, RegionPatch, Result};

use crate::selection::{GroupIndex, Selection};

#[derive(Debug, Clone, Default)]
pub struct RegionStore {
    regions: Vec<Region>,
    selection: Selection,
    groups: GroupIndex,
}

impl RegionStore {
    pub fn new(regions: Vec<Region>) -> Self {
        let mut store = Self::default();
        store.set_regions(regions);
        store
    }

    pub fn regions(&self) -> &[Region] {
        &self.regions
    }

    pub fn region(&self, id: &str) -> Option<&Region> {
        self.regions.iter().find(|r| r.id == id)
    }

    pub fn require(&self, id: &str) -> Result<&Region> {
        self.region(id)
            .ok_or_else(|| CoreError::UnknownRegion(id.to_string()))
    }

    fn require_mut(&mut self, id: &str) -> Result<&mut Region> {
        self.regions
            .iter_mut()
            .find(|r| r.id == id)
            .ok_or_else(|| CoreError::UnknownRegion(id.to_string()))
    }

    pub fn len(&self) -> usize {
        self.regions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.regions.is_empty()
    }

    /// Replace the whole region list. Selection entries that no longer
    /// exist are dropped and the linked-group index is rebuilt.
    pub fn set_regions(&mut self, regions: Vec<Region>) {
        for region in &regions {
            if let Err(e) = region.validate() {
                log::warn!("[Regions] {}", e);
            }
        }
        self.regions = regions;
        self.reindex();
    }

    /// Replace regions with matching ids in place and append the rest.
    pub fn upsert_regions(&mut self, incoming: Vec<Region>) {
        for region in incoming {
            match self.regions.iter_mut().find(|r| r.id == region.id) {
                Some(existing) => *existing = region,
                None => self.regions.push(region),
            }
        }
        self.reindex();
    }

    /// Swap a region for another, possibly under a new id, keeping its
    /// position. A selected old id is carried over to the new one.
    pub fn replace_region(&mut self, old_id: &str, region: Region) -> Result<()> {
        let new_id = region.id.clone();
        *self.require_mut(old_id)? = region;
        if old_id != new_id && self.selection.contains(old_id) {
            let ids: Vec<String> = self
                .selection
                .ids()
                .iter()
                .map(|id| if id == old_id { new_id.clone() } else { id.clone() })
                .collect();
            self.selection.set(ids);
        }
        self.reindex();
        Ok(())
    }

    pub fn update_region_action(&mut self, id: &str, action: RegionAction) -> Result<()> {
        self.require_mut(id)?.action = action;
        Ok(())
    }

    /// Hard delete; the id also leaves the selection.
    pub fn remove_region(&mut self, id: &str) -> Option<Region> {
        let idx = self.regions.iter().position(|r| r.id == id)?;
        let removed = self.regions.remove(idx);
        self.selection.remove(id);
        self.groups = GroupIndex::build(&self.regions);
        Some(removed)
    }

    /// Every region linked to `id`, `id` included. Unlinked regions are
    /// their own group.
    pub fn group_members(&self, id: &str) -> Vec<String> {
        self.groups.members_of(id)
    }

    /// Set `action` on `id` and every region linked to it. Returns the ids
    /// that changed.
    pub fn update_group_action(&mut self, id: &str, action: RegionAction) -> Result<Vec<String>> {
        self.require(id)?;
        let members = self.group_members(id);
        for region in self.regions.iter_mut().filter(|r| members.contains(&r.id)) {
            region.action = action;
        }
        Ok(members)
    }

    /// Hard delete of `id` together with its linked siblings.
    pub fn remove_group(&mut self, id: &str) -> Vec<Region> {
        if self.region(id).is_none() {
            return Vec::new();
        }
        let members = self.group_members(id);
        members
            .iter()
            .filter_map(|member| self.remove_region(member))
            .collect()
    }

    pub fn update_region_bbox(&mut self, id: &str, bbox: BBox) -> Result<()> {
        self.require_mut(id)?.bbox = bbox;
        Ok(())
    }

    pub fn update_region(&mut self, id: &str, patch: &RegionPatch) -> Result<()> {
        patch.apply(self.require_mut(id)?);
        Ok(())
    }

    pub fn selection(&self) -> &Selection {
        &self.selection
    }

    pub fn selected_ids(&self) -> Vec<String> {
        self.selection.ids().to_vec()
    }

    /// Selected regions in selection order.
    pub fn selected_regions(&self) -> Vec<Region> {
        self.selection
            .ids()
            .iter()
            .filter_map(|id| self.region(id).cloned())
            .collect()
    }

    pub fn toggle_selected_region_id(&mut self, id: &str, additive: bool) {
        self.selection.toggle(id, additive, &self.groups);
    }

    /// Select exactly `ids`, ignoring any the store does not hold.
    pub fn select_ids<I, S>(&mut self, ids: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let known: Vec<String> = ids
            .into_iter()
            .map(Into::into)
            .filter(|id| self.region(id).is_some())
            .collect();
        self.selection.set(known);
    }

    pub fn clear_selection(&mut self) {
        self.selection.clear();
    }

    pub fn ids_with_action(&self, action: RegionAction) -> Vec<String> {
        self.regions
            .iter()
            .filter(|r| r.action == action)
            .map(|r| r.id.clone())
            .collect()
    }

    pub fn pending_ids(&self) -> Vec<String> {
        self.ids_with_action(RegionAction::Pending)
    }

    fn reindex(&mut self) {
        self.groups = GroupIndex::build(&self.regions);
        let regions = &self.regions;
        self.selection
            .retain(|id| regions.iter().any(|r| r.id == id));
    }
}
