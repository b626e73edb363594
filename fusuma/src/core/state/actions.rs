use super::super::{ClientId, LayoutKind};
use super::focus::{focus, restack};
use super::layout::arrange;
use super::State;
use crate::effect::Effect;
use crate::platform::WindowSystem;

fn net_state(state: &State, id: ClientId) -> Vec<Effect> {
    let Some(c) = state.registry.get(id) else {
        return vec![];
    };
    let Some(work_area) = state.registry.monitor(c.monitor()).map(|m| m.work_area) else {
        return vec![];
    };
    vec![Effect::SetNetState {
        window: c.window,
        state: c.net_state(&work_area),
    }]
}

pub fn toggle_floating(state: &mut State, id: ClientId) -> Vec<Effect> {
    let Some(c) = state.registry.get_mut(id) else {
        return vec![];
    };
    if c.is_fullscreen() {
        return vec![];
    }
    c.attrs.floating = !c.attrs.floating;
    if c.attrs.floating {
        if c.float_frame.width == 0 || c.float_frame.height == 0 {
            c.float_frame = c.frame;
        }
        c.frame = c.float_frame;
    } else {
        c.float_frame = c.frame;
    }
    tracing::info!(
        "Window {:#x} floating: {}",
        c.window,
        c.attrs.floating
    );
    let mon = c.monitor();
    arrange(state, Some(mon))
}

pub fn toggle_sticky(state: &mut State, id: ClientId) -> Vec<Effect> {
    let Some(c) = state.registry.get_mut(id) else {
        return vec![];
    };
    c.attrs.sticky = !c.attrs.sticky;
    let mon = c.monitor();
    let mut effects = net_state(state, id);
    effects.extend(arrange(state, Some(mon)));
    effects
}

pub fn toggle_always_on_top(state: &mut State, id: ClientId) -> Vec<Effect> {
    let Some(c) = state.registry.get_mut(id) else {
        return vec![];
    };
    c.attrs.always_on_top = !c.attrs.always_on_top;
    let mon = c.monitor();
    let mut effects = net_state(state, id);
    effects.extend(restack(state, mon));
    effects
}

/// Hide a client and move focus elsewhere.
pub fn minimize<W: WindowSystem>(state: &mut State, ws: &W, id: ClientId) -> Vec<Effect> {
    let Some(c) = state.registry.get_mut(id) else {
        return vec![];
    };
    if c.attrs.hidden {
        return vec![];
    }
    c.attrs.hidden = true;
    let (window, mon) = (c.window, c.monitor());
    tracing::info!("Minimized window {:#x}", window);
    let mut effects = vec![Effect::Minimize { window }];
    effects.extend(net_state(state, id));
    if state.focused == Some(id) {
        state.focused = None;
    }
    if let Some(m) = state.registry.monitor_mut(mon) {
        if m.sel == Some(id) {
            m.sel = None;
        }
    }
    effects.extend(focus(state, ws, None, false));
    effects.extend(arrange(state, Some(mon)));
    effects
}

pub fn restore<W: WindowSystem>(state: &mut State, ws: &W, id: ClientId) -> Vec<Effect> {
    let Some(c) = state.registry.get_mut(id) else {
        return vec![];
    };
    if !c.attrs.hidden {
        return vec![];
    }
    c.attrs.hidden = false;
    let (window, mon) = (c.window, c.monitor());
    tracing::info!("Restored window {:#x}", window);
    let mut effects = vec![Effect::Map { window }];
    effects.extend(net_state(state, id));
    effects.extend(arrange(state, Some(mon)));
    effects.extend(focus(state, ws, Some(id), false));
    effects
}

/// Most recently stacked hidden client on the selected monitor.
pub fn last_hidden(state: &State) -> Option<ClientId> {
    state
        .registry
        .stack_iter(state.selected)
        .find(|id| state.registry.get(*id).is_some_and(|c| c.attrs.hidden))
}

pub fn set_layout(state: &mut State, mon: usize, layout: LayoutKind) -> Vec<Effect> {
    let Some(m) = state.registry.monitor_mut(mon) else {
        return vec![];
    };
    if m.layout() == layout {
        return vec![];
    }
    tracing::info!(
        "Layout on monitor {}: {} -> {}",
        mon,
        m.layout().name(),
        layout.name()
    );
    m.set_layout(layout);
    arrange(state, Some(mon))
}

pub fn cycle_layout(state: &mut State, mon: usize) -> Vec<Effect> {
    let Some(next) = state.registry.monitor(mon).map(|m| m.layout().next()) else {
        return vec![];
    };
    set_layout(state, mon, next)
}

/// Set the master fraction, or adjust it when `relative`.
pub fn set_master_fraction(state: &mut State, mon: usize, value: f32, relative: bool) -> Vec<Effect> {
    let Some(m) = state.registry.monitor_mut(mon) else {
        return vec![];
    };
    let target = if relative {
        m.master_fraction() + value
    } else {
        value
    };
    m.set_master_fraction(target);
    arrange(state, Some(mon))
}

pub fn inc_master_count(state: &mut State, mon: usize, delta: i64) -> Vec<Effect> {
    let Some(m) = state.registry.monitor_mut(mon) else {
        return vec![];
    };
    let n = (m.master_count() as i64 + delta).max(0) as u32;
    if n == m.master_count() {
        return vec![];
    }
    m.set_master_count(n);
    arrange(state, Some(mon))
}

pub fn set_size_factor(state: &mut State, id: ClientId, factor: f32) -> Vec<Effect> {
    if factor <= 0.0 || !factor.is_finite() {
        return vec![];
    }
    let Some(c) = state.registry.get_mut(id) else {
        return vec![];
    };
    c.attrs.size_factor = factor;
    let mon = c.monitor();
    arrange(state, Some(mon))
}

pub fn toggle_gaps(state: &mut State, mon: usize) -> Vec<Effect> {
    let Some(m) = state.registry.monitor_mut(mon) else {
        return vec![];
    };
    let gaps = !m.gaps();
    m.set_gaps(gaps);
    arrange(state, Some(mon))
}

pub fn toggle_bar(state: &mut State, mon: usize) -> Vec<Effect> {
    let Some(m) = state.registry.monitor_mut(mon) else {
        return vec![];
    };
    m.show_bar = !m.show_bar;
    m.update_work_area();
    arrange(state, Some(mon))
}

/// Show or leave the desktop surface of a monitor.
pub fn toggle_desktop<W: WindowSystem>(state: &mut State, ws: &W, mon: usize) -> Vec<Effect> {
    let Some(m) = state.registry.monitor_mut(mon) else {
        return vec![];
    };
    m.showing_desktop = !m.showing_desktop;
    tracing::info!(
        "Desktop on monitor {}: {}",
        mon,
        if m.showing_desktop { "shown" } else { "hidden" }
    );
    let mut effects = focus(state, ws, None, false);
    effects.extend(arrange(state, Some(mon)));
    effects
}

pub fn close(state: &State, id: ClientId) -> Vec<Effect> {
    state
        .registry
        .get(id)
        .map(|c| vec![Effect::Close { window: c.window }])
        .unwrap_or_default()
}

pub fn kill(state: &State, id: ClientId) -> Vec<Effect> {
    state
        .registry
        .get(id)
        .map(|c| vec![Effect::Kill { window: c.window }])
        .unwrap_or_default()
}

pub fn spawn(state: &State, command: Vec<String>) -> Vec<Effect> {
    if command.is_empty() {
        return vec![];
    }
    vec![Effect::Spawn {
        command,
        monitor: state.selected,
    }]
}
