use super::super::{ClientId, FullscreenCapture, FullscreenState};
use super::State;
use crate::effect::Effect;

/// Move a client through the fullscreen state machine. Geometry changes
/// only on entering or leaving real fullscreen; the caller rearranges.
pub fn set_fullscreen(state: &mut State, id: ClientId, target: FullscreenState) -> Vec<Effect> {
    let Some(c) = state.registry.get(id) else {
        return vec![];
    };
    let current = c.attrs.fullscreen;
    if current == target {
        return vec![];
    }
    let Some((screen, work_area)) = state
        .registry
        .monitor(c.monitor())
        .map(|m| (m.screen, m.work_area))
    else {
        return vec![];
    };
    let Some(c) = state.registry.get_mut(id) else {
        return vec![];
    };

    let mut effects = Vec::new();
    if target == FullscreenState::Real {
        c.fullscreen_capture = Some(FullscreenCapture {
            floating: c.attrs.floating,
            border: c.attrs.border,
            frame: c.frame,
        });
        c.attrs.border = 0;
        c.frame = screen;
        effects.push(Effect::Configure {
            window: c.window,
            rect: c.frame,
            border: 0,
        });
    } else if current == FullscreenState::Real {
        if let Some(capture) = c.fullscreen_capture.take() {
            c.attrs.floating = capture.floating;
            c.attrs.border = capture.border;
            c.frame = capture.frame.clamp_into(&screen);
        }
        effects.push(Effect::Configure {
            window: c.window,
            rect: c.frame,
            border: c.attrs.border,
        });
    }
    tracing::info!(
        "Fullscreen for window {:#x}: {} -> {}",
        c.window,
        current.name(),
        target.name()
    );
    c.attrs.fullscreen = target;
    effects.push(Effect::SetNetState {
        window: c.window,
        state: c.net_state(&work_area),
    });
    effects
}

pub fn toggle_fullscreen(state: &mut State, id: ClientId, kind: FullscreenState) -> Vec<Effect> {
    let Some(c) = state.registry.get(id) else {
        return vec![];
    };
    let target = if c.attrs.fullscreen == kind {
        FullscreenState::Normal
    } else {
        kind
    };
    if let Some(c) = state.registry.get_mut(id) {
        c.lose_fullscreen = false;
    }
    set_fullscreen(state, id, target)
}
