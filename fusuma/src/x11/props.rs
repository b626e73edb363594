//! Decoders for the raw ICCCM property payloads.

use crate::core::SizeHints;

const P_MIN_SIZE: u32 = 1 << 4;
const P_MAX_SIZE: u32 = 1 << 5;
const P_RESIZE_INC: u32 = 1 << 6;
const P_ASPECT: u32 = 1 << 7;
const P_BASE_SIZE: u32 = 1 << 8;

const INPUT_HINT: u32 = 1 << 0;
const URGENCY_HINT: u32 = 1 << 8;

/// Decode a text property, dropping anything after the first NUL.
pub fn text(value: &[u8]) -> String {
    let end = value.iter().position(|b| *b == 0).unwrap_or(value.len());
    String::from_utf8_lossy(&value[..end]).into_owned()
}

/// WM_CLASS holds two NUL-terminated strings: instance, then class.
pub fn wm_class(value: &[u8]) -> (String, String) {
    let mut parts = value.split(|b| *b == 0);
    let instance = parts.next().map(text).unwrap_or_default();
    let class = parts.next().map(text).unwrap_or_default();
    (instance, class)
}

fn word(value: &[u32], index: usize) -> u32 {
    value.get(index).copied().unwrap_or(0)
}

/// Decode WM_NORMAL_HINTS. A missing base size falls back to the minimum
/// size and vice versa.
pub fn size_hints(value: &[u32]) -> SizeHints {
    let mut hints = SizeHints::default();
    let flags = word(value, 0);
    if value.len() < 18 {
        return hints;
    }

    if flags & P_BASE_SIZE != 0 {
        hints.base_width = word(value, 15);
        hints.base_height = word(value, 16);
    } else if flags & P_MIN_SIZE != 0 {
        hints.base_width = word(value, 5);
        hints.base_height = word(value, 6);
    }

    if flags & P_RESIZE_INC != 0 {
        hints.inc_width = word(value, 9);
        hints.inc_height = word(value, 10);
    }

    if flags & P_MAX_SIZE != 0 {
        hints.max_width = word(value, 7);
        hints.max_height = word(value, 8);
    }

    if flags & P_MIN_SIZE != 0 {
        hints.min_width = word(value, 5);
        hints.min_height = word(value, 6);
    } else if flags & P_BASE_SIZE != 0 {
        hints.min_width = word(value, 15);
        hints.min_height = word(value, 16);
    }

    if flags & P_ASPECT != 0 {
        let (min_num, min_den) = (word(value, 11), word(value, 12));
        let (max_num, max_den) = (word(value, 13), word(value, 14));
        if min_num > 0 {
            hints.min_aspect = min_den as f32 / min_num as f32;
        }
        if max_den > 0 {
            hints.max_aspect = max_num as f32 / max_den as f32;
        }
    }

    hints
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WmHints {
    pub urgent: bool,
    pub accepts_input: bool,
}

impl Default for WmHints {
    fn default() -> Self {
        Self {
            urgent: false,
            accepts_input: true,
        }
    }
}

pub fn wm_hints(value: &[u32]) -> WmHints {
    let Some(&flags) = value.first() else {
        return WmHints::default();
    };
    WmHints {
        urgent: flags & URGENCY_HINT != 0,
        accepts_input: flags & INPUT_HINT == 0 || word(value, 1) != 0,
    }
}

/// Rewrite WM_HINTS without the urgency flag.
pub fn clear_urgency(value: &[u32]) -> Option<Vec<u32>> {
    let flags = *value.first()?;
    if flags & URGENCY_HINT == 0 {
        return None;
    }
    let mut cleared = value.to_vec();
    cleared[0] = flags & !URGENCY_HINT;
    Some(cleared)
}

/// Placement records are stored as CARDINALs; the fields are signed.
pub fn persisted(value: &[u32]) -> Vec<i32> {
    value.iter().map(|v| *v as i32).collect()
}
