//! Region action handlers.
//!
//! Each handler snapshots the regions, applies its change locally, then
//! asks the backend and reconciles with whatever the server sends back.
//! Handlers never return errors; see [`Outcome`].

use shield_client::{DetectOptions, DetectionResult, RegionSyncItem, RegionUpdate};
use shield_core::{BBox, DetectionSource, PiiType, Region, RegionAction, RegionPatch, MIN_REGION_PAGE_UNITS};

use crate::session::{Outcome, Session, StatusKind, Workspace};

/// Prefix of ids handed out to regions the server has not confirmed yet.
const TEMP_ID_PREFIX: &str = "tmp-";

impl Session {
    /// Set the action on a region and on every region linked to it, as the
    /// backend does.
    pub async fn set_action(&self, region_id: &str, action: RegionAction) -> Outcome {
        let Some(call) = self.begin() else {
            return Outcome::Skipped;
        };
        let known = self.with_state(|ws| {
            if ws.review.store().region(region_id).is_none() {
                return false;
            }
            ws.review.push_undo();
            ws.review
                .store_mut()
                .update_group_action(region_id, action)
                .is_ok()
        });
        if !known {
            return Outcome::Skipped;
        }

        let result = call
            .ticket
            .run(self.backend.set_region_action(&call.doc_id, region_id, action))
            .await;
        self.finish(&call, "update region", result, |_, ()| {})
    }

    /// Apply `action` to every region still pending.
    pub async fn batch_action(&self, action: RegionAction) -> Outcome {
        let Some(call) = self.begin() else {
            return Outcome::Skipped;
        };
        let ids = self.with_state(|ws| {
            let ids = ws.review.store().pending_ids();
            if !ids.is_empty() {
                ws.review.push_undo();
                for id in &ids {
                    let _ = ws.review.store_mut().update_region_action(id, action);
                }
            }
            ids
        });
        if ids.is_empty() {
            return Outcome::Skipped;
        }

        let result = call
            .ticket
            .run(self.backend.batch_action(&call.doc_id, &ids, action))
            .await;
        self.finish(&call, "apply batch action", result, |ws, updated| {
            log::info!("[Regions] {} -> {} ({} updated)", ids.len(), action, updated);
            ws.set_status(StatusKind::Info, format!("{} regions set to {}", ids.len(), action));
        })
    }

    /// Hard delete of the region and its linked siblings. The backend
    /// already missing the region counts as success.
    pub async fn delete_region(&self, region_id: &str) -> Outcome {
        let Some(call) = self.begin() else {
            return Outcome::Skipped;
        };
        let removed = self.with_state(|ws| {
            if ws.review.store().region(region_id).is_none() {
                return false;
            }
            ws.review.push_undo();
            !ws.review.store_mut().remove_group(region_id).is_empty()
        });
        if !removed {
            return Outcome::Skipped;
        }

        let result = call
            .ticket
            .run(self.backend.delete_region(&call.doc_id, region_id))
            .await
            .or_else(|e| if e.is_not_found() { Ok(()) } else { Err(e) });
        self.finish(&call, "delete region", result, |_, ()| {})
    }

    pub async fn batch_delete(&self, region_ids: &[String]) -> Outcome {
        let Some(call) = self.begin() else {
            return Outcome::Skipped;
        };
        let ids = self.with_state(|ws| {
            let ids: Vec<String> = region_ids
                .iter()
                .filter(|id| ws.review.store().region(id).is_some())
                .cloned()
                .collect();
            if !ids.is_empty() {
                ws.review.push_undo();
                for id in &ids {
                    ws.review.store_mut().remove_region(id);
                }
            }
            ids
        });
        if ids.is_empty() {
            return Outcome::Skipped;
        }

        let result = call
            .ticket
            .run(self.backend.batch_delete(&call.doc_id, &ids))
            .await
            .or_else(|e| if e.is_not_found() { Ok(0) } else { Err(e) });
        self.finish(&call, "delete regions", result, |ws, deleted| {
            log::info!("[Regions] deleted {} of {}", deleted, ids.len());
            ws.set_status(StatusKind::Info, format!("Deleted {} regions", ids.len()));
        })
    }

    /// Relabel a region. The server may relabel siblings with the same text.
    pub async fn update_label(&self, region_id: &str, pii_type: PiiType) -> Outcome {
        let Some(call) = self.begin() else {
            return Outcome::Skipped;
        };
        if !self.patch_local(region_id, &RegionPatch::pii_type(pii_type)) {
            return Outcome::Skipped;
        }
        let result = call
            .ticket
            .run(self.backend.update_label(&call.doc_id, region_id, pii_type))
            .await;
        self.finish(&call, "update label", result, apply_updates)
    }

    pub async fn update_text(&self, region_id: &str, text: &str) -> Outcome {
        let Some(call) = self.begin() else {
            return Outcome::Skipped;
        };
        if !self.patch_local(region_id, &RegionPatch::text(text)) {
            return Outcome::Skipped;
        }
        let result = call
            .ticket
            .run(self.backend.update_text(&call.doc_id, region_id, text))
            .await;
        self.finish(&call, "update text", result, apply_updates)
    }

    /// Re-run extraction for one region.
    ///
    /// `text_only` refreshes just the text and leaves the user's type and
    /// confidence alone; it is what runs after a move, resize or create and
    /// is not recorded in history. An explicit refresh replaces the whole
    /// classification and can be undone.
    pub async fn refresh(&self, region_id: &str, text_only: bool) -> Outcome {
        let Some(call) = self.begin() else {
            return Outcome::Skipped;
        };
        if self.region(region_id).is_none() {
            return Outcome::Skipped;
        }
        let result = call
            .ticket
            .run(self.backend.reanalyze(&call.doc_id, region_id))
            .await;
        self.finish(&call, "re-analyze region", result, |ws, analysis| {
            let patch = if text_only {
                RegionPatch::text(analysis.text)
            } else {
                RegionPatch {
                    text: Some(analysis.text),
                    pii_type: Some(analysis.pii_type),
                    confidence: Some(analysis.confidence),
                    source: Some(analysis.source),
                    ..RegionPatch::default()
                }
            };
            if ws.review.store().region(region_id).is_none() {
                return;
            }
            if !text_only {
                ws.review.push_undo();
            }
            let _ = ws.review.store_mut().update_region(region_id, &patch);
        })
    }

    /// Mark every other occurrence of the region's text and select the
    /// whole set.
    pub async fn highlight_all(&self, region_id: &str) -> Outcome {
        let Some(call) = self.begin() else {
            return Outcome::Skipped;
        };
        if self.region(region_id).is_none() {
            return Outcome::Skipped;
        }
        let result = call
            .ticket
            .run(self.backend.highlight_all(&call.doc_id, region_id))
            .await;
        self.finish(&call, "highlight all", result, |ws, found| {
            ws.review.push_undo();
            merge_server_regions(ws, found.new_regions, &found.cancelled_ids);
            ws.review.store_mut().select_ids(found.all_ids.iter().cloned());
            ws.set_status(
                StatusKind::Info,
                format!("Highlighted {} occurrences ({} new)", found.all_ids.len(), found.created),
            );
        })
    }

    /// Put the current selection on the clipboard. Returns how many regions.
    pub fn copy_selection(&self) -> usize {
        self.with_state(|ws| {
            ws.clipboard = ws.review.store().selected_regions();
            ws.clipboard.len()
        })
    }

    pub async fn paste_clipboard(&self, target_page: u32) -> Outcome {
        let copied = self.clipboard();
        self.paste_regions(&copied, target_page).await
    }

    /// Recreate `copied` on `target_page`, one backend region each.
    ///
    /// Pasted regions keep their bbox. A cancelled region comes back as
    /// pending. Overlaps are resolved once, after every paste went through.
    pub async fn paste_regions(&self, copied: &[Region], target_page: u32) -> Outcome {
        let Some(call) = self.begin() else {
            return Outcome::Skipped;
        };
        if copied.is_empty() {
            return Outcome::Skipped;
        }

        let mut pasted: Vec<Region> = Vec::new();
        let mut siblings: Vec<Region> = Vec::new();
        let mut cancelled: Vec<String> = Vec::new();
        let mut failures: Vec<String> = Vec::new();
        for source in copied {
            let mut region = source.clone();
            region.id = temp_id();
            region.page_number = target_page;
            region.linked_group = None;
            if region.action == RegionAction::Cancel {
                region.action = RegionAction::Pending;
            }

            match call
                .ticket
                .run(self.backend.add_region(&call.doc_id, &region))
                .await
            {
                Ok(added) => {
                    region.id = added.region_id;
                    region.text = added.text;
                    region.bbox = added.bbox;
                    pasted.push(region);
                    siblings.extend(added.new_regions);
                    cancelled.extend(added.cancelled_ids);
                }
                Err(e) if e.is_aborted() => return Outcome::Discarded,
                Err(e) => {
                    log::warn!("[Regions] paste of {} failed: {}", source.id, e);
                    failures.push(e.to_string());
                }
            }
        }

        if pasted.is_empty() {
            if !call.ticket.is_current() {
                return Outcome::Discarded;
            }
            let message = format!("Failed to paste regions: {}", failures.join("; "));
            log::warn!("[Regions] {}", message);
            self.with_state(|ws| ws.set_status(StatusKind::Error, message.clone()));
            return Outcome::Failed(message);
        }

        let total = copied.len();
        self.finish(&call, "paste regions", Ok(pasted), |ws, pasted| {
            let ids: Vec<String> = pasted.iter().map(|r| r.id.clone()).collect();
            ws.review.push_undo();
            ws.review.store_mut().upsert_regions(pasted);
            merge_server_regions(ws, siblings, &cancelled);
            ws.review.store_mut().select_ids(ids.iter().cloned());
            if ids.len() == total {
                ws.set_status(StatusKind::Info, format!("Pasted {} regions", ids.len()));
            } else {
                ws.set_status(
                    StatusKind::Warning,
                    format!("Pasted {} of {} regions", ids.len(), total),
                );
            }
        })
    }

    /// Draw a new region by hand.
    ///
    /// The region shows up at once under a temporary id, which is swapped
    /// for the server's id when the add succeeds. The text under it is then
    /// refreshed.
    pub async fn create_region(&self, page_number: u32, bbox: BBox, pii_type: PiiType) -> Outcome {
        let Some(call) = self.begin() else {
            return Outcome::Skipped;
        };
        let mut region = Region::manual(temp_id(), page_number, bbox.with_min_size(MIN_REGION_PAGE_UNITS));
        region.pii_type = pii_type;
        let temp = region.id.clone();

        self.with_state(|ws| {
            ws.review.push_undo();
            ws.review.store_mut().upsert_regions(vec![region.clone()]);
            ws.review.store_mut().select_ids([temp.clone()]);
        });

        let result = call
            .ticket
            .run(self.backend.add_region(&call.doc_id, &region))
            .await;
        let mut created_id = None;
        let outcome = self.finish(&call, "add region", result, |ws, added| {
            if ws.review.store().region(&added.region_id).is_some() {
                // the server matched an existing region instead of adding one
                log::info!("[Regions] drawn box reuses {}", added.region_id);
                ws.review.store_mut().remove_region(&temp);
                let patch = RegionPatch {
                    text: Some(added.text),
                    pii_type: Some(added.pii_type),
                    bbox: Some(added.bbox),
                    ..RegionPatch::default()
                };
                let _ = ws.review.store_mut().update_region(&added.region_id, &patch);
            } else {
                let mut confirmed = region.clone();
                confirmed.id = added.region_id.clone();
                confirmed.text = added.text;
                confirmed.pii_type = added.pii_type;
                confirmed.bbox = added.bbox;
                confirmed.source = DetectionSource::Manual;

                if ws.review.store_mut().replace_region(&temp, confirmed.clone()).is_err() {
                    ws.review.store_mut().upsert_regions(vec![confirmed]);
                }
            }
            merge_server_regions(ws, added.new_regions, &added.cancelled_ids);
            let selection = if added.all_ids.is_empty() {
                vec![added.region_id.clone()]
            } else {
                added.all_ids
            };
            ws.review.store_mut().select_ids(selection);
            created_id = Some(added.region_id);
        });

        match created_id {
            Some(id) if outcome.is_applied() => {
                self.refresh(&id, true).await;
                outcome
            }
            _ => outcome,
        }
    }

    /// Move or resize a region, persist it, then refresh its text.
    pub async fn move_region(&self, region_id: &str, bbox: BBox) -> Outcome {
        let Some(call) = self.begin() else {
            return Outcome::Skipped;
        };
        let bbox = bbox.with_min_size(MIN_REGION_PAGE_UNITS);
        let known = self.with_state(|ws| {
            if ws.review.store().region(region_id).is_none() {
                return false;
            }
            ws.review.push_undo();
            ws.review.store_mut().update_region_bbox(region_id, bbox).is_ok()
        });
        if !known {
            return Outcome::Skipped;
        }

        let result = call
            .ticket
            .run(self.backend.update_bbox(&call.doc_id, region_id, bbox))
            .await;
        let outcome = self.finish(&call, "move region", result, |_, ()| {});
        if outcome.is_applied() {
            self.refresh(region_id, true).await;
        }
        outcome
    }

    /// Run detection and replace every local region with the server's list.
    /// `None` runs the plain first-pass detect; options trigger a re-detect.
    pub async fn autodetect(&self, options: Option<&DetectOptions>) -> Outcome {
        let Some(call) = self.begin() else {
            return Outcome::Skipped;
        };
        self.info("Detecting PII...");
        let result = match options {
            Some(options) => {
                call.ticket
                    .run(self.backend.redetect(&call.doc_id, options))
                    .await
            }
            None => call.ticket.run(self.backend.detect(&call.doc_id)).await,
        };
        self.finish(&call, "detect PII", result, |ws, detected| {
            let text = format!(
                "Detection finished: {} regions ({} added, {} updated, {} removed)",
                detected.total_regions, detected.added, detected.updated, detected.removed
            );
            replace_all_regions(ws, detected);
            ws.set_status(StatusKind::Info, text);
        })
    }

    /// Autodetect with the options from configuration.
    pub async fn redetect_with_defaults(&self) -> Outcome {
        let options = self.config.detection.clone();
        self.autodetect(Some(&options)).await
    }

    pub async fn reset_detection(&self) -> Outcome {
        let Some(call) = self.begin() else {
            return Outcome::Skipped;
        };
        let result = call
            .ticket
            .run(self.backend.reset_detection(&call.doc_id))
            .await;
        self.finish(&call, "reset detection", result, |ws, detected| {
            let text = format!("Cleared {} regions", detected.cleared);
            replace_all_regions(ws, detected);
            ws.set_status(StatusKind::Info, text);
        })
    }

    /// Push every region's action and bbox to the server, ahead of export.
    pub async fn sync_regions(&self) -> Outcome {
        let Some(call) = self.begin() else {
            return Outcome::Skipped;
        };
        let items: Vec<RegionSyncItem> =
            self.with_state(|ws| ws.review.regions().iter().map(RegionSyncItem::from).collect());
        let result = call
            .ticket
            .run(self.backend.sync_regions(&call.doc_id, &items))
            .await;
        self.finish(&call, "sync regions", result, |_, synced| {
            log::info!("[Regions] synced {} regions", synced);
        })
    }

    /// Local-only patch with an undo snapshot; false if the id is unknown.
    fn patch_local(&self, region_id: &str, patch: &RegionPatch) -> bool {
        self.with_state(|ws| {
            if ws.review.store().region(region_id).is_none() {
                return false;
            }
            ws.review.push_undo();
            ws.review.store_mut().update_region(region_id, patch).is_ok()
        })
    }
}

fn temp_id() -> String {
    format!("{}{}", TEMP_ID_PREFIX, uuid::Uuid::new_v4().simple())
}

fn apply_updates(ws: &mut Workspace, updates: Vec<RegionUpdate>) {
    for update in updates {
        let patch = RegionPatch {
            text: update.text,
            pii_type: update.pii_type,
            ..RegionPatch::default()
        };
        if ws.review.store_mut().update_region(&update.id, &patch).is_err() {
            log::debug!("[Regions] server updated unknown region {}", update.id);
        }
    }
}

/// Fold regions the server created into the local set and lay them out.
fn merge_server_regions(ws: &mut Workspace, new_regions: Vec<Region>, cancelled_ids: &[String]) {
    for id in cancelled_ids {
        let _ = ws.review.store_mut().update_region_action(id, RegionAction::Cancel);
    }
    ws.review.store_mut().upsert_regions(new_regions);
    ws.relayout();
}

fn replace_all_regions(ws: &mut Workspace, detected: DetectionResult) {
    ws.review.push_undo();
    ws.review.store_mut().set_regions(detected.regions);
    ws.relayout();
}
