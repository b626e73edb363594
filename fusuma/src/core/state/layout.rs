use std::collections::HashMap;

use super::super::layout::{arrange as layout_boxes, LayoutParams};
use super::super::{ClientId, Placement, Rect};
use super::focus::restack;
use super::manage::sweep_dormant;
use super::State;
use crate::effect::Effect;

/// Recompute geometry for one monitor, or all of them, and emit the
/// configure, stacking and placement-record effects that follow.
pub fn arrange(state: &mut State, mon: Option<usize>) -> Vec<Effect> {
    let mut effects = sweep_dormant(state);
    let count = state.registry.monitors.len();
    let monitors: Vec<usize> = match mon {
        Some(m) if m < count => vec![m],
        Some(_) => vec![],
        None => (0..count).collect(),
    };
    for &m in &monitors {
        compute_frames(state, m);
    }
    for &m in &monitors {
        effects.extend(show_hide(state, m));
        effects.extend(restack(state, m));
    }
    effects.extend(persist_changed(state));
    effects
}

fn visible_tiled(state: &State, mon: usize) -> Vec<ClientId> {
    state
        .registry
        .attach_iter(mon)
        .filter(|id| {
            state.registry.is_visible(*id) && state.registry.get(*id).is_some_and(|c| c.is_tiled())
        })
        .collect()
}

/// Consecutive tiled clients in stack order sharing a class collapse onto
/// the first of the run. Maps follower to head.
fn class_followers(state: &State, mon: usize, tiled: &[ClientId]) -> HashMap<ClientId, ClientId> {
    let by_stack: Vec<ClientId> = state
        .registry
        .stack_iter(mon)
        .filter(|id| tiled.contains(id))
        .collect();
    let mut followers = HashMap::new();
    for pair in by_stack.windows(2) {
        let (prev, cur) = (pair[0], pair[1]);
        let class_of = |id| {
            state
                .registry
                .get(id)
                .map(|c| c.identity.class.as_str())
                .unwrap_or("")
        };
        if !class_of(cur).is_empty() && class_of(prev) == class_of(cur) {
            let head = followers.get(&prev).copied().unwrap_or(prev);
            followers.insert(cur, head);
        }
    }
    followers
}

fn compute_frames(state: &mut State, mon: usize) {
    let Some(m) = state.registry.monitor(mon) else {
        return;
    };
    let kind = m.layout();
    let params = LayoutParams {
        area: m.work_area,
        master_count: m.master_count(),
        master_fraction: m.master_fraction(),
        gap: m.gap(),
    };
    let tiled = visible_tiled(state, mon);
    let followers = if state.config.settings(mon).class_grouping {
        class_followers(state, mon, &tiled)
    } else {
        HashMap::new()
    };
    let heads: Vec<ClientId> = tiled
        .iter()
        .copied()
        .filter(|id| !followers.contains_key(id))
        .collect();

    if let Some(m) = state.registry.monitor_mut(mon) {
        m.symbol = kind.label(heads.len());
    }
    if !kind.arranges() {
        return;
    }

    let factors: Vec<f32> = heads
        .iter()
        .map(|id| {
            state
                .registry
                .get(*id)
                .map(|c| c.attrs.size_factor)
                .unwrap_or(1.0)
        })
        .collect();
    let boxes = layout_boxes(kind, &params, &factors);
    for (id, outer) in heads.iter().zip(boxes) {
        let Some(c) = state.registry.get_mut(*id) else {
            continue;
        };
        let bw = c.attrs.border;
        let width = outer.width.saturating_sub(2 * bw).max(1);
        let height = outer.height.saturating_sub(2 * bw).max(1);
        let (width, height) = c.size_hints.constrain(width, height);
        c.frame = Rect::new(outer.x, outer.y, width, height);
    }
    for (follower, head) in followers {
        let Some(frame) = state.registry.get(head).map(|c| c.frame) else {
            continue;
        };
        if let Some(c) = state.registry.get_mut(follower) {
            c.frame = frame;
        }
    }
    tracing::debug!(
        "Arranged {} tiled windows on monitor {} with {}",
        heads.len(),
        mon,
        kind.name()
    );
}

/// Visible clients are configured top to bottom; hidden ones are parked
/// off-screen bottom to top so nothing flickers over them.
fn show_hide(state: &State, mon: usize) -> Vec<Effect> {
    let stack = state.registry.stack_order(mon);
    let mut effects = Vec::new();
    for id in &stack {
        if !state.registry.is_visible(*id) {
            continue;
        }
        if let Some(c) = state.registry.get(*id) {
            effects.push(Effect::Configure {
                window: c.window,
                rect: c.frame,
                border: c.attrs.border,
            });
        }
    }
    for id in stack.iter().rev() {
        if state.registry.is_visible(*id) {
            continue;
        }
        let Some(c) = state.registry.get(*id) else {
            continue;
        };
        if c.dormant {
            continue;
        }
        let parked = Rect::new(
            -2 * c.outer().width as i32,
            c.frame.y,
            c.frame.width,
            c.frame.height,
        );
        effects.push(Effect::Configure {
            window: c.window,
            rect: parked,
            border: c.attrs.border,
        });
    }
    effects
}

/// Write the placement record of every client whose record changed.
pub fn persist_changed(state: &mut State) -> Vec<Effect> {
    let mut effects = Vec::new();
    for id in state.registry.ids() {
        let Some(c) = state.registry.get(id) else {
            continue;
        };
        if c.dormant {
            continue;
        }
        let origin = state
            .registry
            .monitor(c.monitor())
            .map(|m| (m.screen.x, m.screen.y))
            .unwrap_or((0, 0));
        let default_border = state.config.settings(c.monitor()).border_width;
        let record = Placement::capture(c, origin, default_border).encode();
        if record == c.persisted {
            continue;
        }
        let window = c.window;
        if let Some(c) = state.registry.get_mut(id) {
            c.persisted = record.clone();
        }
        effects.push(Effect::WritePersisted { window, record });
    }
    effects
}
