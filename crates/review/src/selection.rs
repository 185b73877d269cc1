//! Selection set and linked-group index.

use std::collections::HashMap;

use shield_core::Region;

/// Maps a linked-group key to its member ids, and each member back to its
/// key. Rebuilt whenever the region set changes.
#[derive(Debug, Clone, Default)]
pub struct GroupIndex {
    members: HashMap<String, Vec<String>>,
    group_of: HashMap<String, String>,
}

impl GroupIndex {
    pub fn build(regions: &[Region]) -> Self {
        let mut index = Self::default();
        for region in regions {
            if let Some(key) = &region.linked_group {
                index
                    .members
                    .entry(key.clone())
                    .or_default()
                    .push(region.id.clone());
                index.group_of.insert(region.id.clone(), key.clone());
            }
        }
        index
    }

    /// The whole group `id` belongs to, in region order, or just `id`.
    pub fn members_of(&self, id: &str) -> Vec<String> {
        self.group_of
            .get(id)
            .and_then(|key| self.members.get(key))
            .cloned()
            .unwrap_or_else(|| vec![id.to_string()])
    }

    pub fn group_count(&self) -> usize {
        self.members.len()
    }
}

/// Ordered set of selected region ids.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Selection {
    ids: Vec<String>,
}

impl Selection {
    pub fn ids(&self) -> &[String] {
        &self.ids
    }

    pub fn contains(&self, id: &str) -> bool {
        self.ids.iter().any(|s| s == id)
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    /// Plain click replaces the selection with the clicked region's group.
    /// Additive click removes the group if the clicked region is already
    /// selected, otherwise appends the group members not yet selected.
    pub fn toggle(&mut self, id: &str, additive: bool, groups: &GroupIndex) {
        let members = groups.members_of(id);
        if !additive {
            self.ids = members;
            return;
        }
        if self.contains(id) {
            self.ids.retain(|s| !members.contains(s));
        } else {
            for member in members {
                if !self.contains(&member) {
                    self.ids.push(member);
                }
            }
        }
    }

    /// Replace the selection, dropping duplicates but keeping first-seen order.
    pub fn set<I, S>(&mut self, ids: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.ids.clear();
        for id in ids {
            let id = id.into();
            if !self.contains(&id) {
                self.ids.push(id);
            }
        }
    }

    pub fn remove(&mut self, id: &str) {
        self.ids.retain(|s| s != id);
    }

    pub fn retain(&mut self, mut keep: impl FnMut(&str) -> bool) {
        self.ids.retain(|s| keep(s));
    }

    pub fn clear(&mut self) {
        self.ids.clear();
    }
}
