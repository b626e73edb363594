use super::super::{ClientId, FullscreenState, NetState, Rect, WindowId};
use super::actions::{minimize, restore};
use super::focus::{border_color, focus, is_focusable};
use super::fullscreen::set_fullscreen;
use super::layout::{arrange, persist_changed};
use super::manage::relative_offset;
use super::rules::{apply_rules, set_parent};
use super::State;
use crate::effect::Effect;
use crate::event::{ConfigureRequest, StateAction};
use crate::platform::WindowSystem;

fn net_state_effect(state: &State, id: ClientId) -> Option<Effect> {
    let c = state.registry.get(id)?;
    let work_area = state.registry.monitor(c.monitor())?.work_area;
    Some(Effect::SetNetState {
        window: c.window,
        state: c.net_state(&work_area),
    })
}

pub fn configure_request<W: WindowSystem>(
    state: &mut State,
    ws: &W,
    window: WindowId,
    req: &ConfigureRequest,
) -> Vec<Effect> {
    let Some(id) = state.registry.by_window(window) else {
        let (current, border) = ws
            .window_info(window)
            .map(|i| (i.geometry, i.border))
            .unwrap_or_default();
        let rect = Rect::new(
            req.x.unwrap_or(current.x),
            req.y.unwrap_or(current.y),
            req.width.unwrap_or(current.width).max(1),
            req.height.unwrap_or(current.height).max(1),
        );
        return vec![Effect::Configure {
            window,
            rect,
            border: req.border.unwrap_or(border),
        }];
    };
    let Some(c) = state.registry.get(id) else {
        return vec![];
    };
    let mon = c.monitor();
    let Some((screen, arranges)) = state
        .registry
        .monitor(mon)
        .map(|m| (m.screen, m.layout().arranges()))
    else {
        return vec![];
    };
    let parent_frame = c
        .parent
        .and_then(|p| state.registry.get(p))
        .map(|p| p.frame);
    let free = (c.is_floating() || !arranges) && !c.is_fullscreen();

    let Some(c) = state.registry.get_mut(id) else {
        return vec![];
    };
    if !free {
        return vec![Effect::Configure {
            window,
            rect: c.frame,
            border: c.attrs.border,
        }];
    }
    if let Some(b) = req.border {
        c.attrs.border = b;
    }
    let mut frame = c.frame;
    if let Some(x) = req.x {
        frame.x = x;
    }
    if let Some(y) = req.y {
        frame.y = y;
    }
    if let Some(w) = req.width {
        frame.width = w.max(1);
    }
    if let Some(h) = req.height {
        frame.height = h.max(1);
    }
    if screen.overlap_area(&frame) == 0 {
        frame = frame.centered_in(&screen);
    }
    c.frame = frame;
    if c.attrs.floating {
        c.float_frame = frame;
        if let Some(pf) = parent_frame {
            c.relative_offset = relative_offset(&frame, &pf);
        }
    }
    let mut effects = vec![Effect::Configure {
        window,
        rect: frame,
        border: c.attrs.border,
    }];
    effects.extend(persist_changed(state));
    effects
}

/// Title changes retry any pending defer rules with the old title.
pub fn title_changed<W: WindowSystem>(state: &mut State, ws: &W, window: WindowId) -> Vec<Effect> {
    let Some(id) = state.registry.by_window(window) else {
        return vec![];
    };
    let Some(info) = ws.window_info(window) else {
        return vec![];
    };
    let Some(c) = state.registry.get_mut(id) else {
        return vec![];
    };
    if c.identity.title == info.title {
        return vec![];
    }
    let old = std::mem::replace(&mut c.identity.title, info.title);
    if !state.rules.has_pending(id) {
        return vec![];
    }
    let mut effects = apply_rules(state, id, true, Some(&old));
    effects.extend(arrange(state, None));
    let focused = state.focused;
    effects.extend(focus(state, ws, focused, false));
    effects
}

pub fn hints_changed<W: WindowSystem>(state: &mut State, ws: &W, window: WindowId) -> Vec<Effect> {
    let Some(id) = state.registry.by_window(window) else {
        return vec![];
    };
    let Some(info) = ws.window_info(window) else {
        return vec![];
    };
    let focused = state.focused == Some(id);
    let urgent = info.urgent && state.urgency_hints && !focused;
    let Some(c) = state.registry.get_mut(id) else {
        return vec![];
    };
    c.accepts_input = info.accepts_input;
    c.take_focus = info.take_focus;
    if c.attrs.urgent == urgent {
        return vec![];
    }
    c.attrs.urgent = urgent;
    if urgent {
        tracing::info!("Window {:#x} is urgent", window);
    }
    let mut effects = vec![Effect::SetBorderColor {
        window,
        color: border_color(state, id),
    }];
    effects.extend(net_state_effect(state, id));
    effects
}

pub fn size_hints_changed<W: WindowSystem>(
    state: &mut State,
    ws: &W,
    window: WindowId,
) -> Vec<Effect> {
    let Some(id) = state.registry.by_window(window) else {
        return vec![];
    };
    let Some(info) = ws.window_info(window) else {
        return vec![];
    };
    let Some(c) = state.registry.get_mut(id) else {
        return vec![];
    };
    c.size_hints = info.size_hints;
    if c.size_hints.is_fixed() && !c.attrs.floating {
        c.attrs.floating = true;
        c.float_frame = c.frame;
    }
    let mon = c.monitor();
    arrange(state, Some(mon))
}

pub fn transient_changed<W: WindowSystem>(
    state: &mut State,
    ws: &W,
    window: WindowId,
) -> Vec<Effect> {
    let Some(id) = state.registry.by_window(window) else {
        return vec![];
    };
    let Some(parent) = ws
        .window_info(window)
        .and_then(|i| i.transient_for)
        .and_then(|w| state.registry.by_window(w))
    else {
        return vec![];
    };
    let parent_window = state.registry.get(parent).map(|p| p.window);
    let Some(c) = state.registry.get_mut(id) else {
        return vec![];
    };
    c.transient_for = parent_window;
    let newly_floating = !c.attrs.floating;
    if newly_floating {
        c.attrs.floating = true;
        c.float_frame = c.frame;
    }
    let has_parent = c.parent.is_some();
    if !has_parent {
        set_parent(state, id, Some(parent));
    }
    if newly_floating || !has_parent {
        return arrange(state, None);
    }
    vec![]
}

/// Client-requested state flag changes.
pub fn state_request<W: WindowSystem>(
    state: &mut State,
    ws: &W,
    window: WindowId,
    action: StateAction,
    flags: NetState,
) -> Vec<Effect> {
    let Some(id) = state.registry.by_window(window) else {
        return vec![];
    };
    let Some(c) = state.registry.get(id) else {
        return vec![];
    };
    let mon = c.monitor();
    let attrs = c.attrs.clone();
    let mut effects = Vec::new();

    if flags.contains(NetState::FULLSCREEN) {
        let current = attrs.fullscreen != FullscreenState::Normal;
        let target = match (action.resolve(current), attrs.fullscreen) {
            (true, FullscreenState::Pretend) => FullscreenState::Pretend,
            (true, _) => FullscreenState::Real,
            (false, _) => FullscreenState::Normal,
        };
        if let Some(c) = state.registry.get_mut(id) {
            c.lose_fullscreen = false;
        }
        effects.extend(set_fullscreen(state, id, target));
    }
    if let Some(c) = state.registry.get_mut(id) {
        if flags.contains(NetState::STICKY) {
            c.attrs.sticky = action.resolve(attrs.sticky);
        }
        if flags.contains(NetState::ABOVE) {
            c.attrs.always_on_top = action.resolve(attrs.always_on_top);
        }
    }
    if flags.contains(NetState::URGENT) {
        let urgent = action.resolve(attrs.urgent) && state.focused != Some(id);
        if let Some(c) = state.registry.get_mut(id) {
            c.attrs.urgent = urgent;
        }
        effects.push(Effect::SetBorderColor {
            window,
            color: border_color(state, id),
        });
    }
    if flags.contains(NetState::HIDDEN) {
        if action.resolve(attrs.hidden) {
            return [effects, minimize(state, ws, id)].concat();
        }
        if attrs.hidden {
            return [effects, restore(state, ws, id)].concat();
        }
    }
    effects.extend(net_state_effect(state, id));
    effects.extend(arrange(state, Some(mon)));
    effects
}

/// An activation request focuses a visible client and marks any other
/// urgent.
pub fn activate_request<W: WindowSystem>(
    state: &mut State,
    ws: &W,
    window: WindowId,
) -> Vec<Effect> {
    let Some(id) = state.registry.by_window(window) else {
        return vec![];
    };
    let Some(hidden) = state.registry.get(id).map(|c| c.attrs.hidden) else {
        return vec![];
    };
    if hidden {
        return restore(state, ws, id);
    }
    if state.registry.is_visible(id) {
        return focus(state, ws, Some(id), false);
    }
    if state.focused == Some(id) {
        return vec![];
    }
    if let Some(c) = state.registry.get_mut(id) {
        c.attrs.urgent = true;
    }
    let mut effects = vec![Effect::SetBorderColor {
        window,
        color: border_color(state, id),
    }];
    effects.extend(net_state_effect(state, id));
    effects
}

pub fn close_request(state: &State, window: WindowId) -> Vec<Effect> {
    if state.registry.by_window(window).is_none() {
        return vec![];
    }
    vec![Effect::Close { window }]
}

/// Focus follows the pointer into managed windows.
pub fn pointer_entered<W: WindowSystem>(
    state: &mut State,
    ws: &W,
    window: WindowId,
) -> Vec<Effect> {
    let Some(id) = state.registry.by_window(window) else {
        return vec![];
    };
    if state.focused == Some(id) || !is_focusable(state, ws, id, false) {
        return vec![];
    }
    focus(state, ws, Some(id), false)
}

pub fn button_pressed<W: WindowSystem>(
    state: &mut State,
    ws: &W,
    window: WindowId,
) -> Vec<Effect> {
    let Some(id) = state.registry.by_window(window) else {
        return vec![];
    };
    focus(state, ws, Some(id), false)
}

/// Pointer motion over the root switches the selected monitor.
pub fn pointer_moved<W: WindowSystem>(state: &mut State, ws: &W, x: i32, y: i32) -> Vec<Effect> {
    let Some(mon) = state.registry.monitor_at(x, y) else {
        return vec![];
    };
    if mon == state.selected {
        return vec![];
    }
    tracing::debug!("Pointer moved to monitor {}", mon);
    state.selected = mon;
    focus(state, ws, None, false)
}
