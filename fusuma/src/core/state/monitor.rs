use super::super::{ClientId, Monitor, Rect};
use super::focus::focus;
use super::layout::arrange;
use super::State;
use crate::effect::Effect;
use crate::platform::WindowSystem;

/// Move `frame` by the offset between two monitor origins.
fn translate(frame: &Rect, from: &Rect, to: &Rect) -> Rect {
    Rect::new(
        frame.x - from.x + to.x,
        frame.y - from.y + to.y,
        frame.width,
        frame.height,
    )
}

/// Reconcile the monitor list with the current outputs. Clients on
/// removed monitors move to the first one.
pub fn update_monitors<W: WindowSystem>(state: &mut State, ws: &W) -> Vec<Effect> {
    let mut screens: Vec<Rect> = Vec::new();
    for screen in ws.screens() {
        // Cloned outputs report identical geometry.
        if !screens.contains(&screen) {
            screens.push(screen);
        }
    }
    if screens.is_empty() {
        tracing::warn!("Display reported no screens, keeping current monitors");
        return vec![];
    }

    let old = state.registry.monitors.len();
    for (i, screen) in screens.iter().enumerate() {
        match state.registry.monitor_mut(i) {
            Some(m) if m.screen != *screen => {
                tracing::info!("Monitor {} resized to {:?}", i, screen);
                m.screen = *screen;
                m.update_work_area();
            }
            Some(_) => {}
            None => {
                tracing::info!("Monitor {} added at {:?}", i, screen);
                let m = Monitor::new(i, *screen, &state.config);
                state.registry.monitors.push(m);
            }
        }
    }
    if screens.len() < old {
        let view = state.registry.monitors[0].view();
        for id in state.registry.ids() {
            let Some(c) = state.registry.get(id) else {
                continue;
            };
            if c.monitor() < screens.len() {
                continue;
            }
            state.registry.relocate(id, 0);
            if let Some(c) = state.registry.get_mut(id) {
                c.attrs.tags = view;
            }
        }
        for i in screens.len()..old {
            tracing::info!("Monitor {} removed", i);
        }
        state.registry.monitors.truncate(screens.len());
    }
    state.selected = state.selected.min(state.registry.monitors.len() - 1);

    for id in state.registry.ids() {
        let Some(c) = state.registry.get(id) else {
            continue;
        };
        if !c.is_fullscreen() {
            continue;
        }
        let Some(screen) = state.registry.monitor(c.monitor()).map(|m| m.screen) else {
            continue;
        };
        if let Some(c) = state.registry.get_mut(id) {
            c.frame = screen;
        }
    }

    let mut effects = arrange(state, None);
    let focused = state.focused;
    effects.extend(focus(state, ws, focused, false));
    effects
}

fn neighbour(state: &State, dir: i32) -> Option<usize> {
    let n = state.registry.monitors.len();
    if n < 2 {
        return None;
    }
    Some((state.selected as i64 + dir as i64).rem_euclid(n as i64) as usize)
}

/// Select the next or previous monitor and warp the pointer to its
/// selected client, or its centre when it has none.
pub fn focus_monitor<W: WindowSystem>(state: &mut State, ws: &W, dir: i32) -> Vec<Effect> {
    let Some(target) = neighbour(state, dir) else {
        return vec![];
    };
    tracing::info!("Focus monitor {} -> {}", state.selected, target);
    state.selected = target;
    let mut effects = focus(state, ws, None, false);
    let point = state
        .selected_client()
        .and_then(|id| state.registry.get(id))
        .map(|c| c.center())
        .or_else(|| state.registry.monitor(target).map(|m| m.work_area.center()));
    if let Some((x, y)) = point {
        effects.push(Effect::WarpPointer { x, y });
    }
    effects
}

/// Send a client to the next or previous monitor, onto its current view.
pub fn send_monitor<W: WindowSystem>(
    state: &mut State,
    ws: &W,
    id: ClientId,
    dir: i32,
) -> Vec<Effect> {
    let Some(target) = neighbour(state, dir) else {
        return vec![];
    };
    let Some(source) = state.registry.get(id).map(|c| c.monitor()) else {
        return vec![];
    };
    if source == target {
        return vec![];
    }
    let (Some(from), Some((to, view))) = (
        state.registry.monitor(source).map(|m| m.screen),
        state.registry.monitor(target).map(|m| (m.screen, m.view())),
    ) else {
        return vec![];
    };
    state.registry.relocate(id, target);
    let Some(c) = state.registry.get_mut(id) else {
        return vec![];
    };
    tracing::info!(
        "Send window {:#x} to monitor {} -> {}",
        c.window,
        source,
        target
    );
    c.attrs.tags = view;
    c.float_frame = translate(&c.float_frame, &from, &to).clamp_into(&to);
    if let Some(cap) = c.fullscreen_capture.as_mut() {
        cap.frame = translate(&cap.frame, &from, &to);
    }
    if c.is_fullscreen() {
        c.frame = to;
    } else if c.attrs.floating {
        c.frame = c.float_frame;
    }
    if state.focused == Some(id) {
        state.focused = None;
    }
    let mut effects = focus(state, ws, None, false);
    effects.extend(arrange(state, None));
    effects
}
