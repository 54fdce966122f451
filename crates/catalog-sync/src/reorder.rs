//! Display ordering for catalog entities
//!
//! Between reorders, `position_index` values may be missing, sparse, or
//! duplicated. Sorting is stable, so ties keep the remote (insertion) order.
//! A reorder always renumbers the whole list to `0..K-1`.

use remote_store::StyleTemplate;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Direction of a single-step move in the displayed list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MoveDirection {
    Up,
    Down,
}

/// Sort ascending by `position_index`; unindexed entities go last.
pub fn sort_by_position(mut styles: Vec<StyleTemplate>) -> Vec<StyleTemplate> {
    styles.sort_by_key(|s| (s.position_index.is_none(), s.position_index.unwrap_or_default()));
    styles
}

/// Swap the entity at `index` with its neighbour in `direction`.
///
/// A move past either end leaves the order as it is. Returns whether the
/// order changed.
pub fn apply_move(list: &mut [StyleTemplate], index: usize, direction: MoveDirection) -> Result<bool> {
    if index >= list.len() {
        return Err(Error::Reorder(format!(
            "index {index} out of range for {} entities",
            list.len()
        )));
    }
    let target = match direction {
        MoveDirection::Up if index > 0 => index - 1,
        MoveDirection::Down if index + 1 < list.len() => index + 1,
        _ => return Ok(false),
    };
    list.swap(index, target);
    Ok(true)
}

/// Assign `0..K-1` in list order. Returns the entities whose index changed.
pub fn renumber(list: &mut [StyleTemplate]) -> Vec<StyleTemplate> {
    let mut changed = Vec::new();
    for (position, style) in list.iter_mut().enumerate() {
        let position = Some(position as i64);
        if style.position_index != position {
            style.position_index = position;
            changed.push(style.clone());
        }
    }
    changed
}
