use super::super::{Attributes, ClientId, FullscreenState, Identity, Placement, Rect};
use super::focus::focus;
use super::fullscreen::set_fullscreen;
use super::layout::arrange;
use super::rules::{apply_rules, reflow_family};
use super::State;
use crate::effect::Effect;
use crate::platform::{WindowInfo, WindowSystem};

/// Process-tree walks stop after this many hops.
const MAX_PID_DEPTH: usize = 64;

pub fn client_list(state: &State) -> Effect {
    Effect::SetClientList(state.registry.iter().map(|c| c.window).collect())
}

fn find_parent<W: WindowSystem>(state: &State, ws: &W, info: &WindowInfo) -> Option<ClientId> {
    if let Some(id) = info
        .transient_for
        .and_then(|w| state.registry.by_window(w))
    {
        return Some(id);
    }
    let mut pid = info.pid?;
    for _ in 0..MAX_PID_DEPTH {
        if pid <= 1 {
            return None;
        }
        let found = state
            .registry
            .iter()
            .find(|c| c.pid == Some(pid) && !c.attrs.terminal && c.is_linked());
        if let Some(c) = found {
            return Some(c.id);
        }
        pid = ws.parent_pid(pid)?;
    }
    None
}

/// Terminal owning the nearest ancestor process of `id`.
fn find_terminal<W: WindowSystem>(state: &State, ws: &W, id: ClientId) -> Option<ClientId> {
    let mut pid = state.registry.get(id)?.pid?;
    for _ in 0..MAX_PID_DEPTH {
        pid = ws.parent_pid(pid)?;
        if pid <= 1 {
            return None;
        }
        let found = state.registry.iter().find(|c| {
            c.id != id
                && c.pid == Some(pid)
                && c.attrs.terminal
                && c.swallowing.is_none()
                && c.is_linked()
        });
        if let Some(c) = found {
            return Some(c.id);
        }
    }
    None
}

fn try_swallow<W: WindowSystem>(state: &mut State, ws: &W, id: ClientId) -> Vec<Effect> {
    let Some(c) = state.registry.get(id) else {
        return vec![];
    };
    if c.attrs.terminal || c.attrs.no_swallow || c.attrs.floating {
        return vec![];
    }
    let Some(term) = find_terminal(state, ws, id) else {
        return vec![];
    };
    let Some((term_window, tags, frame)) = state
        .registry
        .get(term)
        .map(|t| (t.window, t.tags(), t.frame))
    else {
        return vec![];
    };

    state.registry.take_out(id);
    state.registry.replace(term, id);
    if let Some(t) = state.registry.get_mut(term) {
        t.swallowed_by = Some(id);
    }
    if let Some(c) = state.registry.get_mut(id) {
        c.swallowing = Some(term);
        c.attrs.tags = tags;
        c.frame = frame;
    }
    if state.focused == Some(term) {
        state.focused = None;
    }
    tracing::info!(
        "Window {:#x} swallowed terminal {:#x}",
        state.registry.get(id).map(|c| c.window).unwrap_or(0),
        term_window
    );
    vec![Effect::Unmap {
        window: term_window,
    }]
}

fn restore_placement(state: &mut State, id: ClientId, record: &[i32]) {
    let Some(p) = Placement::decode(record) else {
        return;
    };
    if p.monitor < state.registry.monitors.len() {
        state.registry.relocate(id, p.monitor);
    }
    let Some(mon) = state.registry.get(id).map(|c| c.monitor()) else {
        return;
    };
    let Some((origin, all)) = state
        .registry
        .monitor(mon)
        .map(|m| ((m.screen.x, m.screen.y), m.all_tags()))
    else {
        return;
    };
    let default_border = state.config.settings(mon).border_width;
    let Some(c) = state.registry.get_mut(id) else {
        return;
    };
    let tags = p.tags.intersection(all);
    if !tags.is_empty() {
        c.attrs.tags = tags;
    }
    c.save_index = p.save_index;
    c.attrs.floating = p.floating;
    c.float_frame = p.float_frame_at(origin);
    c.relative_offset = p.relative_offset;
    c.attrs.border = p.border.unwrap_or(default_border);
    c.attrs.size_factor = p.size_factor;
    if p.pretend_fullscreen && c.attrs.fullscreen == FullscreenState::Normal {
        c.attrs.fullscreen = FullscreenState::Pretend;
    }
    c.attrs.hidden = p.hidden;
    c.attrs.desktop = p.desktop;
    c.attrs.on_desktop = p.on_desktop;
    c.persisted = record.to_vec();
    tracing::info!("Restored placement of window {:#x}", c.window);
}

/// Settle the floating geometry: rule geometry, then parent-relative
/// offset or centring, then clamped into the monitor's work area.
fn place_floating(state: &mut State, id: ClientId) {
    let Some(c) = state.registry.get(id) else {
        return;
    };
    let Some(area) = state.registry.monitor(c.monitor()).map(|m| m.work_area) else {
        return;
    };
    let parent_frame = c
        .parent
        .and_then(|p| state.registry.get(p))
        .map(|p| p.frame);

    let mut frame = c.float_frame;
    if frame.width == 0 || frame.height == 0 {
        frame.width = (area.width / 2).max(1);
        frame.height = (area.height / 2).max(1);
        frame = frame.centered_in(&area);
    }
    let g = c.attrs.float_geometry;
    if let Some(x) = g.x {
        frame.x = area.x + x;
    }
    if let Some(y) = g.y {
        frame.y = area.y + y;
    }
    if let Some(w) = g.width {
        frame.width = w;
    }
    if let Some(h) = g.height {
        frame.height = h;
    }
    let (w, h) = c.size_hints.constrain(frame.width, frame.height);
    frame.width = w;
    frame.height = h;

    match (c.relative_offset, parent_frame) {
        (Some((rx, ry)), Some(pf)) if g.x.is_none() && g.y.is_none() => {
            frame.x = pf.x + (rx * pf.width as f64).round() as i32;
            frame.y = pf.y + (ry * pf.height as f64).round() as i32;
        }
        _ if c.attrs.center => {
            frame = frame.centered_in(&parent_frame.unwrap_or(area));
        }
        _ => {}
    }
    let frame = frame.clamp_into(&area);

    let Some(c) = state.registry.get_mut(id) else {
        return;
    };
    c.float_frame = frame;
    if c.attrs.floating && !c.is_fullscreen() {
        c.frame = frame;
    }
    if let Some(cap) = c.fullscreen_capture.as_mut().filter(|cap| cap.floating) {
        cap.frame = frame;
    }
}

/// Start managing a window: resolve its parent, run the rules, restore any
/// placement record, swallow its terminal, then arrange and focus.
pub fn manage<W: WindowSystem>(state: &mut State, ws: &W, info: WindowInfo) -> Vec<Effect> {
    if state.registry.by_window(info.window).is_some() {
        return vec![];
    }
    if state.registry.monitors.is_empty() {
        tracing::warn!("No monitors, cannot manage window {:#x}", info.window);
        return vec![];
    }
    let parent = find_parent(state, ws, &info);
    let (tags, monitor, ancestor) = match parent.and_then(|p| state.registry.get(p)) {
        Some(p) => (p.tags(), p.monitor(), Some(p.ancestor)),
        None => {
            let sel = state.selected.min(state.registry.monitors.len() - 1);
            (state.registry.monitors[sel].view(), sel, None)
        }
    };
    let border = state.config.settings(monitor).border_width;
    let mut attrs = Attributes::new(tags, monitor, border);
    attrs.floating = info.transient_for.is_some() || info.dialog || info.size_hints.is_fixed();
    attrs.urgent = info.urgent && state.urgency_hints;

    let id = state.registry.register(info.window, attrs);
    let ancestor = ancestor.unwrap_or(id);
    let save_index = state
        .registry
        .iter()
        .filter(|c| c.id != id && c.ancestor == ancestor)
        .map(|c| c.save_index + 1)
        .max()
        .unwrap_or(0);
    if let Some(c) = state.registry.get_mut(id) {
        c.pid = info.pid;
        c.identity = Identity {
            class: info.class.clone(),
            instance: info.instance.clone(),
            role: info.role.clone(),
            title: info.title.clone(),
        };
        c.frame = info.geometry;
        c.float_frame = info.geometry;
        c.size_hints = info.size_hints;
        c.parent = parent;
        c.ancestor = ancestor;
        c.transient_for = info.transient_for;
        c.accepts_input = info.accepts_input;
        c.take_focus = info.take_focus;
        c.save_index = save_index;
    }
    tracing::info!(
        "Managing window {:#x} ({}, \"{}\") on monitor {}",
        info.window,
        info.class,
        info.title,
        monitor
    );

    let mut effects = apply_rules(state, id, false, None);
    restore_placement(state, id, &info.persisted);
    effects.extend(try_swallow(state, ws, id));
    if info.fullscreen {
        effects.extend(set_fullscreen(state, id, FullscreenState::Real));
    }
    place_floating(state, id);

    let Some(c) = state.registry.get(id) else {
        return effects;
    };
    let mon = c.monitor();
    if state.config.settings(mon).attach_below && c.swallowing.is_none() {
        if let Some(sel) = state.registry.monitor(mon).and_then(|m| m.sel) {
            if sel != id {
                state.registry.detach(id);
                state.registry.attach_after(id, sel);
            }
        }
    }

    let Some(c) = state.registry.get(id) else {
        return effects;
    };
    let (window, hidden, autofocus) = (c.window, c.attrs.hidden, c.attrs.autofocus);
    let settings = state.config.settings(mon);
    effects.push(Effect::SetBorderColor {
        window,
        color: if c.attrs.urgent {
            settings.border_urgent
        } else {
            settings.border_normal
        },
    });
    let work_area = state
        .registry
        .monitor(mon)
        .map(|m| m.work_area)
        .unwrap_or_default();
    effects.push(Effect::SetNetState {
        window,
        state: c.net_state(&work_area),
    });
    effects.push(client_list(state));
    effects.extend(arrange(state, Some(mon)));
    if !hidden {
        effects.push(Effect::Map { window });
    }
    let candidate = if autofocus { Some(id) } else { None };
    effects.extend(focus(state, ws, candidate, false));
    effects
}

/// Detach everything that points at `id` before it leaves the registry:
/// a swallowed terminal comes back in its place, children move up to the
/// grandparent and pending rule records go away.
fn release_relations(state: &mut State, id: ClientId) -> Vec<Effect> {
    let Some(c) = state.registry.get(id) else {
        return vec![];
    };
    let (swallowing, swallowed_by, parent) = (c.swallowing, c.swallowed_by, c.parent);
    let mut effects = Vec::new();

    if let Some(term) = swallowing.filter(|t| state.registry.contains(*t)) {
        state.registry.replace(id, term);
        if let Some(t) = state.registry.get_mut(term) {
            t.swallowed_by = None;
            tracing::info!("Restoring swallowed terminal {:#x}", t.window);
            effects.push(Effect::Map { window: t.window });
        }
    }
    if let Some(s) = swallowed_by.and_then(|s| state.registry.get_mut(s)) {
        s.swallowing = None;
    }

    let children: Vec<ClientId> = state
        .registry
        .iter()
        .filter(|c| c.parent == Some(id))
        .map(|c| c.id)
        .collect();
    for child in children {
        if let Some(c) = state.registry.get_mut(child) {
            c.parent = parent;
        }
        reflow_family(state, child, false);
    }

    state.rules.clear_pending(id);
    if state.focused == Some(id) {
        state.focused = None;
    }
    effects
}

/// Stop managing a window that was destroyed or withdrawn.
pub fn unmanage<W: WindowSystem>(state: &mut State, ws: &W, window: u32) -> Vec<Effect> {
    let Some(id) = state.registry.by_window(window) else {
        return vec![];
    };
    let mon = state.registry.get(id).map(|c| c.monitor()).unwrap_or(0);
    let mut effects = release_relations(state, id);
    state.registry.unregister(id);
    tracing::info!("Unmanaged window {:#x}", window);
    effects.push(client_list(state));
    effects.extend(arrange(state, Some(mon)));
    effects.extend(focus(state, ws, None, false));
    effects
}

/// Excise clients marked dormant after protocol errors.
pub fn sweep_dormant(state: &mut State) -> Vec<Effect> {
    let dormant: Vec<ClientId> = state
        .registry
        .iter()
        .filter(|c| c.dormant)
        .map(|c| c.id)
        .collect();
    if dormant.is_empty() {
        return vec![];
    }
    let mut effects = Vec::new();
    for id in &dormant {
        effects.extend(release_relations(state, *id));
    }
    for c in state.registry.sweep_dormant() {
        tracing::info!("Removed dormant window {:#x}", c.window);
    }
    effects.push(client_list(state));
    effects
}

/// Manage every pre-existing top-level window, oldest first.
pub fn adopt_existing<W: WindowSystem>(state: &mut State, ws: &W) -> Vec<Effect> {
    let mut effects = Vec::new();
    for window in ws.existing_windows() {
        if let Some(info) = ws.window_info(window) {
            effects.extend(manage(state, ws, info));
        }
    }
    effects
}

/// Floating geometry for a parent-relative offset, as fractions of the
/// parent's size.
pub fn relative_offset(frame: &Rect, parent: &Rect) -> Option<(f64, f64)> {
    if parent.width == 0 || parent.height == 0 {
        return None;
    }
    Some((
        (frame.x - parent.x) as f64 / parent.width as f64,
        (frame.y - parent.y) as f64 / parent.height as f64,
    ))
}
