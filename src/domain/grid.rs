// Grid geometry: view arrangement and collision resolution
use crate::domain::document::{Breakpoint, Item, Placement};
use crate::domain::error::ConfigError;
use serde::Serialize;
use std::cmp::Reverse;

/// Position of one item as the view shows it
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ItemSlot {
    pub item_id: String,
    pub kind: &'static str,
    pub placement: Placement,
}

/// Lay out a category's items for one breakpoint.
///
/// Stored placements that fit the columns and do not collide with an earlier
/// item are kept. Everything else is put in the first free cell, row-major.
/// Nothing here is written back to the document.
pub fn arrange(items: &[Item], breakpoint: Breakpoint, columns: u32) -> Vec<ItemSlot> {
    if columns == 0 {
        return Vec::new();
    }

    let mut slots: Vec<ItemSlot> = Vec::with_capacity(items.len());
    let mut deferred: Vec<(&Item, Placement)> = Vec::new();

    for item in items {
        let stored = item.placement_at(breakpoint).map(Placement::normalized);
        match stored {
            Some(p) if p.right() <= columns && !slots.iter().any(|s| s.placement.overlaps(&p)) => {
                slots.push(slot(item, p));
            }
            other => {
                let size = other.unwrap_or_else(|| Placement::new(0, 0, 1, 1));
                deferred.push((item, size));
            }
        }
    }

    for (item, size) in deferred {
        let size = Placement {
            width: size.width.min(columns),
            ..size
        };
        let occupied: Vec<Placement> = slots.iter().map(|s| s.placement).collect();
        let placement = first_free(size, &occupied, columns);
        slots.push(slot(item, placement));
    }

    slots
}

fn slot(item: &Item, placement: Placement) -> ItemSlot {
    ItemSlot {
        item_id: item.id.clone(),
        kind: item.kind.label(),
        placement,
    }
}

// The lowest free row is either row 0 or the bottom edge of some occupied item
fn first_free(size: Placement, occupied: &[Placement], columns: u32) -> Placement {
    let max_x = columns.saturating_sub(size.width);
    let mut rows: Vec<u32> = std::iter::once(0)
        .chain(occupied.iter().map(Placement::bottom))
        .collect();
    rows.sort_unstable();
    rows.dedup();

    rows.iter()
        .find_map(|&y| {
            (0..=max_x)
                .map(|x| size.at(x, y))
                .find(|candidate| !occupied.iter().any(|o| o.overlaps(candidate)))
        })
        .unwrap_or_else(|| size.at(0, rows.last().copied().unwrap_or(0)))
}

/// Unit vector of the gesture. A pure resize counts its growth as motion.
fn motion(previous: Option<Placement>, target: Placement) -> (i64, i64) {
    let Some(prev) = previous else {
        return (0, 0);
    };
    let dx = i64::from(target.x) - i64::from(prev.x);
    let dy = i64::from(target.y) - i64::from(prev.y);
    if dx == 0 && dy == 0 {
        (
            (i64::from(target.width) - i64::from(prev.width)).signum(),
            (i64::from(target.height) - i64::from(prev.height)).signum(),
        )
    } else {
        (dx.signum(), dy.signum())
    }
}

/// Find where a dragged or resized item lands.
///
/// The item keeps its requested size. Among all positions that overlap
/// nothing in `occupied`, the one closest to the request (Manhattan distance)
/// wins; ties go to the position furthest along the direction of motion, then
/// to the lower row, then to the lower column. Neighbours never move.
pub fn resolve_placement(
    item_id: &str,
    proposed: Placement,
    previous: Option<Placement>,
    occupied: &[Placement],
    columns: u32,
    max_rows: Option<u32>,
) -> Result<Placement, ConfigError> {
    let unresolved = || ConfigError::CollisionUnresolved {
        item_id: item_id.to_string(),
        columns,
    };

    let proposed = proposed.normalized();
    if columns == 0 || proposed.width > columns {
        return Err(unresolved());
    }

    let max_x = columns - proposed.width;
    let target = proposed.at(proposed.x.min(max_x), proposed.y);
    let (mx, my) = motion(previous, target);

    let max_y = match max_rows {
        Some(rows) if proposed.height > rows => return Err(unresolved()),
        Some(rows) => rows - proposed.height,
        None => occupied
            .iter()
            .map(Placement::bottom)
            .max()
            .unwrap_or(0)
            .max(target.y),
    };
    let target = target.at(target.x, target.y.min(max_y));

    let is_free = |candidate: &Placement| !occupied.iter().any(|o| o.overlaps(candidate));
    if is_free(&target) {
        return Ok(target);
    }

    let tx = i64::from(target.x);
    let ty = i64::from(target.y);
    let (max_x, max_y) = (i64::from(max_x), i64::from(max_y));
    let reach = tx.max(max_x - tx) + ty.max(max_y - ty);

    // Rings of growing Manhattan distance; the first ring with a free cell holds the answer
    for distance in 1..=reach {
        let best = ring(tx, ty, distance, max_x, max_y)
            .into_iter()
            .map(|(x, y)| target.at(x as u32, y as u32))
            .filter(|candidate| is_free(candidate))
            .min_by_key(|candidate| {
                let dx = i64::from(candidate.x) - tx;
                let dy = i64::from(candidate.y) - ty;
                (Reverse(dx * mx + dy * my), candidate.y, candidate.x)
            });
        if let Some(placement) = best {
            return Ok(placement);
        }
    }
    Err(unresolved())
}

/// In-bounds cells at exactly `distance` from `(cx, cy)`
fn ring(cx: i64, cy: i64, distance: i64, max_x: i64, max_y: i64) -> Vec<(i64, i64)> {
    let mut cells = Vec::new();
    for dy in -distance..=distance {
        let y = cy + dy;
        if !(0..=max_y).contains(&y) {
            continue;
        }
        let rest = distance - dy.abs();
        let xs = if rest == 0 { [cx, cx] } else { [cx - rest, cx + rest] };
        for (i, x) in xs.into_iter().enumerate() {
            if (i == 0 || rest != 0) && (0..=max_x).contains(&x) {
                cells.push((x, y));
            }
        }
    }
    cells
}

pub fn has_overlap(placements: &[Placement]) -> bool {
    placements
        .iter()
        .enumerate()
        .any(|(i, a)| placements[i + 1..].iter().any(|b| a.overlaps(b)))
}
