use std::path::PathBuf;

use crate::core::State;
use crate::effect::Effect;
use crate::event::Event;
use crate::platform::{WindowManipulator, WindowSystem};
use fusuma_ipc::{Command, Response};

use super::command::process_command;
use super::effects::execute_effects;

/// Files the running instance refers back to.
#[derive(Debug, Clone)]
pub struct Paths {
    pub rules: PathBuf,
    pub socket: PathBuf,
}

/// Process a control command and execute its effects. The flag is set when
/// the command asked the window manager to quit.
pub fn dispatch_command<S: WindowSystem, M: WindowManipulator>(
    cmd: &Command,
    state: &mut State,
    window_system: &S,
    manipulator: &M,
    paths: &Paths,
) -> (Response, bool) {
    let mut result = process_command(state, window_system, cmd, &paths.rules);
    supersede_warp(&mut result.effects);
    match execute_effects(result.effects, manipulator, &paths.socket) {
        Ok(quit) => (result.response, quit),
        Err(message) => {
            tracing::warn!("{}", message);
            (Response::Error { message }, false)
        }
    }
}

/// Cancel a running pointer animation when `effects` move the focus.
/// Pointer crossings are left out: the animation itself produces them.
/// A warp among `effects` still starts afresh after the cancel.
fn supersede_warp(effects: &mut Vec<Effect>) {
    let moves_focus = effects
        .iter()
        .any(|e| {
            matches!(
                e,
                Effect::FocusInput { .. } | Effect::SendTakeFocus { .. } | Effect::FocusRoot
            )
        });
    if moves_focus {
        effects.insert(0, Effect::CancelWarp);
    }
}

/// Feed one display event through the core and execute the result.
pub fn dispatch_event<S: WindowSystem, M: WindowManipulator>(
    event: &Event,
    state: &mut State,
    window_system: &S,
    manipulator: &M,
    paths: &Paths,
) -> bool {
    let mut effects = state.handle_event(window_system, event);
    if matches!(
        event,
        Event::ActivateRequest { .. } | Event::ButtonPressed { .. }
    ) {
        supersede_warp(&mut effects);
    }
    match execute_effects(effects, manipulator, &paths.socket) {
        Ok(quit) => quit,
        Err(message) => {
            tracing::warn!("{}", message);
            false
        }
    }
}
