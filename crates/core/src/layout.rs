//! Overlap resolution
//!
//! Lays regions out so that no two visible regions on the same page
//! overlap. Input order is priority order: an earlier region is never
//! moved to make room for a later one, so reordering the input can
//! change the result.

use std::collections::BTreeMap;

use crate::region::{BBox, Region, MIN_REGION_PAGE_UNITS};

/// Rounds spent re-checking a region after its first pass moved it.
const MAX_SETTLE_ROUNDS: usize = 8;

/// Return a copy of `regions` with minimum sizes enforced and overlaps
/// pushed apart. The input is left untouched.
///
/// Per page, each region is tested in order against every earlier
/// region; on overlap it is shifted along the axis with the smaller
/// penetration, away from the earlier region's center (ties go toward
/// negative x/y). The first round is a single forward pass. If that pass
/// moved the region, it is re-checked for a bounded number of rounds,
/// and a region still colliding after that is dropped directly below the
/// lowest earlier region on its page.
///
/// Cancelled regions keep their size fix but take no part in the layout.
pub fn resolve_overlaps(regions: &[Region]) -> Vec<Region> {
    let mut out: Vec<Region> = regions.to_vec();
    for region in out.iter_mut() {
        region.bbox = region.bbox.with_min_size(MIN_REGION_PAGE_UNITS);
    }

    let mut pages: BTreeMap<u32, Vec<usize>> = BTreeMap::new();
    for (idx, region) in out.iter().enumerate() {
        if region.is_visible() {
            pages.entry(region.page_number).or_default().push(idx);
        }
    }

    for indices in pages.values() {
        for pos in 1..indices.len() {
            let earlier = &indices[..pos];
            let mut bbox = out[indices[pos]].bbox;

            for _ in 0..MAX_SETTLE_ROUNDS {
                let mut moved = false;
                for &j in earlier {
                    let fixed = out[j].bbox;
                    if bbox.overlaps(&fixed) {
                        bbox = separate(&bbox, &fixed);
                        moved = true;
                    }
                }
                if !moved {
                    break;
                }
            }

            if earlier.iter().any(|&j| bbox.overlaps(&out[j].bbox)) {
                let floor = earlier
                    .iter()
                    .map(|&j| out[j].bbox.y1)
                    .fold(f64::NEG_INFINITY, f64::max);
                let height = bbox.height();
                bbox = BBox::new(bbox.x0, floor, bbox.x1, floor + height);
            }

            out[indices[pos]].bbox = bbox;
        }
    }

    out
}

/// True if any two visible regions on the same page overlap.
pub fn has_overlaps(regions: &[Region]) -> bool {
    let visible: Vec<&Region> = regions.iter().filter(|r| r.is_visible()).collect();
    visible.iter().enumerate().any(|(i, a)| {
        visible[i + 1..]
            .iter()
            .any(|b| a.page_number == b.page_number && a.bbox.overlaps(&b.bbox))
    })
}

fn separate(moving: &BBox, fixed: &BBox) -> BBox {
    let overlap_x = moving.x1.min(fixed.x1) - moving.x0.max(fixed.x0);
    let overlap_y = moving.y1.min(fixed.y1) - moving.y0.max(fixed.y0);
    let (moving_cx, moving_cy) = moving.center();
    let (fixed_cx, fixed_cy) = fixed.center();

    if overlap_y <= overlap_x {
        let (y0, y1) = push_apart(
            (moving.y0, moving.y1),
            (fixed.y0, fixed.y1),
            overlap_y,
            moving_cy > fixed_cy,
        );
        BBox::new(moving.x0, y0, moving.x1, y1)
    } else {
        let (x0, x1) = push_apart(
            (moving.x0, moving.x1),
            (fixed.x0, fixed.x1),
            overlap_x,
            moving_cx > fixed_cx,
        );
        BBox::new(x0, moving.y0, x1, moving.y1)
    }
}

/// Shift the `moving` interval by `overlap` along one axis.
///
/// When the shift lands the moving interval flush against a fixed edge,
/// the edge is copied exactly instead of re-derived through arithmetic,
/// so the two boxes end up touching rather than an ulp apart.
fn push_apart(moving: (f64, f64), fixed: (f64, f64), overlap: f64, forward: bool) -> (f64, f64) {
    let (lo, hi) = moving;
    let (fixed_lo, fixed_hi) = fixed;
    let size = hi - lo;

    if forward {
        if lo >= fixed_lo && hi >= fixed_hi {
            (fixed_hi, fixed_hi + size)
        } else {
            (lo + overlap, hi + overlap)
        }
    } else if hi <= fixed_hi && lo <= fixed_lo {
        (fixed_lo - size, fixed_lo)
    } else {
        (lo - overlap, hi - overlap)
    }
}
