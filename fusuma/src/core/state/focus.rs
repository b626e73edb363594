use std::cmp::Reverse;

use super::super::{ClientId, FullscreenState};
use super::fullscreen::set_fullscreen;
use super::layout::arrange;
use super::tags::view;
use super::State;
use crate::effect::Effect;
use crate::platform::WindowSystem;

pub fn border_color(state: &State, id: ClientId) -> u32 {
    let Some(c) = state.registry.get(id) else {
        return 0;
    };
    let settings = state.config.settings(c.monitor());
    if state.focused == Some(id) {
        settings.border_focus
    } else if c.attrs.urgent {
        settings.border_urgent
    } else {
        settings.border_normal
    }
}

/// Whether `id` may receive input focus right now.
pub fn is_focusable<W: WindowSystem>(state: &State, ws: &W, id: ClientId, force: bool) -> bool {
    let Some(c) = state.registry.get(id) else {
        return false;
    };
    if !state.registry.is_visible(id) || c.attrs.hidden {
        return false;
    }
    if !force && (c.attrs.ignored || c.attrs.never_focus) {
        return false;
    }
    match c.pid {
        Some(pid) => ws.process_alive(pid),
        None => true,
    }
}

/// Whether `ancestor` appears on the parent chain of `id`.
pub fn is_descendant(state: &State, id: ClientId, ancestor: ClientId) -> bool {
    let mut cur = state.registry.get(id).and_then(|c| c.parent);
    let mut steps = 0;
    while let Some(p) = cur {
        if p == ancestor {
            return true;
        }
        steps += 1;
        if steps > state.registry.len() {
            break;
        }
        cur = state.registry.get(p).and_then(|c| c.parent);
    }
    false
}

fn modal_redirect<W: WindowSystem>(state: &State, ws: &W, target: ClientId) -> ClientId {
    let Some(mon) = state.registry.get(target).map(|c| c.monitor()) else {
        return target;
    };
    state
        .registry
        .stack_iter(mon)
        .find(|id| {
            *id != target
                && state.registry.get(*id).is_some_and(|c| c.attrs.modal)
                && is_descendant(state, *id, target)
                && is_focusable(state, ws, *id, false)
        })
        .unwrap_or(target)
}

/// Drop other fullscreen clients on the target's monitor out of
/// fullscreen. Returns whether any geometry changed.
fn lose_fullscreen(state: &mut State, target: ClientId, effects: &mut Vec<Effect>) -> bool {
    let Some(tc) = state.registry.get(target) else {
        return false;
    };
    let (mon, ancestor) = (tc.monitor(), tc.ancestor);
    let victims: Vec<ClientId> = state
        .registry
        .stack_iter(mon)
        .filter(|id| {
            *id != target
                && state.registry.is_visible(*id)
                && state
                    .registry
                    .get(*id)
                    .is_some_and(|c| c.is_fullscreen() && c.ancestor != ancestor)
        })
        .collect();
    for id in &victims {
        let Some(c) = state.registry.get_mut(*id) else {
            continue;
        };
        c.lose_fullscreen = true;
        if c.attrs.game {
            tracing::info!("Minimizing fullscreen game {:#x}", c.window);
            c.attrs.hidden = true;
            effects.push(Effect::Minimize { window: c.window });
        } else {
            effects.extend(set_fullscreen(state, *id, FullscreenState::Normal));
        }
    }
    !victims.is_empty()
}

/// Resolve `candidate` to a focusable client and transfer input focus to
/// it, falling back to the monitor's selection and then its stack order.
pub fn focus<W: WindowSystem>(
    state: &mut State,
    ws: &W,
    candidate: Option<ClientId>,
    force: bool,
) -> Vec<Effect> {
    let mut target = candidate.filter(|id| is_focusable(state, ws, *id, force));
    if let Some(mon) = target.and_then(|id| state.registry.get(id)).map(|c| c.monitor()) {
        state.selected = mon;
    }
    let mon = state.selected;
    if target.is_none() {
        target = state
            .registry
            .monitor(mon)
            .and_then(|m| m.sel)
            .filter(|id| is_focusable(state, ws, *id, false))
            .or_else(|| {
                state
                    .registry
                    .stack_iter(mon)
                    .find(|id| is_focusable(state, ws, *id, false))
            });
    }
    let target = target.map(|t| modal_redirect(state, ws, t));

    let previous = state.focused;
    let mut effects = Vec::new();
    if previous != target {
        if let Some(prev) = previous.filter(|p| state.registry.contains(*p)) {
            state.focused = None;
            if let Some(window) = state.registry.get(prev).map(|c| c.window) {
                effects.push(Effect::SetBorderColor {
                    window,
                    color: border_color(state, prev),
                });
            }
        }
    }

    let mut relayout = false;
    match target {
        Some(t) => {
            relayout = lose_fullscreen(state, t, &mut effects);
            let regain = state
                .registry
                .get(t)
                .is_some_and(|c| c.lose_fullscreen && !c.attrs.hidden);
            if regain {
                if let Some(c) = state.registry.get_mut(t) {
                    c.lose_fullscreen = false;
                }
                effects.extend(set_fullscreen(state, t, FullscreenState::Real));
                relayout = true;
            }
            let work_area = state
                .registry
                .monitor(mon)
                .map(|m| m.work_area)
                .unwrap_or_default();
            let Some(c) = state.registry.get_mut(t) else {
                return effects;
            };
            if c.attrs.urgent {
                c.attrs.urgent = false;
                effects.push(Effect::SetNetState {
                    window: c.window,
                    state: c.net_state(&work_area),
                });
            }
            let (window, accepts_input, take_focus) = (c.window, c.accepts_input, c.take_focus);
            state.registry.raise(t);
            state.focused = Some(t);
            if let Some(m) = state.registry.monitor_mut(mon) {
                m.sel = Some(t);
            }
            if previous != Some(t) {
                tracing::info!("Focus changed: {:?} -> {:#x}", previous, window);
            }
            effects.push(Effect::SetBorderColor {
                window,
                color: border_color(state, t),
            });
            if accepts_input {
                effects.push(Effect::FocusInput { window });
            }
            if take_focus {
                effects.push(Effect::SendTakeFocus { window });
            }
            effects.push(Effect::SetActiveWindow(Some(window)));
        }
        None => {
            if previous.is_some() {
                tracing::info!("Focus changed: {:?} -> root", previous);
            }
            state.focused = None;
            if let Some(m) = state.registry.monitor_mut(mon) {
                m.sel = None;
            }
            effects.push(Effect::FocusRoot);
            effects.push(Effect::SetActiveWindow(None));
        }
    }

    if relayout {
        effects.extend(arrange(state, Some(mon)));
    } else {
        effects.extend(restack(state, mon));
    }
    effects
}

fn layer(state: &State, id: ClientId) -> u8 {
    let Some(c) = state.registry.get(id) else {
        return 0;
    };
    if c.attrs.desktop {
        0
    } else if c.is_fullscreen() {
        4
    } else if c.attrs.always_on_top {
        3
    } else if c.attrs.floating {
        2
    } else {
        1
    }
}

/// Restack the visible clients of `mon`: desktop below tiled below
/// floating below always-on-top below fullscreen, stack order within a
/// layer, and every modal client directly above its ancestor at least.
pub fn restack(state: &State, mon: usize) -> Vec<Effect> {
    let mut order: Vec<ClientId> = state
        .registry
        .stack_iter(mon)
        .filter(|id| state.registry.is_visible(*id))
        .collect();
    order.sort_by_key(|id| Reverse(layer(state, *id)));

    let modals: Vec<ClientId> = order
        .iter()
        .copied()
        .filter(|id| state.registry.get(*id).is_some_and(|c| c.attrs.modal))
        .collect();
    for modal in modals {
        let Some(ancestor) = state.registry.get(modal).map(|c| c.ancestor) else {
            continue;
        };
        let (Some(mi), Some(ai)) = (
            order.iter().position(|x| *x == modal),
            order.iter().position(|x| *x == ancestor),
        ) else {
            continue;
        };
        if mi > ai {
            order.remove(mi);
            order.insert(ai, modal);
        }
    }

    if order.is_empty() {
        return vec![];
    }
    let windows = order
        .iter()
        .filter_map(|id| state.registry.get(*id).map(|c| c.window))
        .collect();
    vec![Effect::Restack { windows }]
}

pub fn focus_stack<W: WindowSystem>(state: &mut State, ws: &W, dir: i32) -> Vec<Effect> {
    let mon = state.selected;
    let candidates: Vec<ClientId> = state
        .registry
        .attach_iter(mon)
        .filter(|id| is_focusable(state, ws, *id, false))
        .collect();
    if candidates.is_empty() {
        return vec![];
    }
    let sel = state.registry.monitor(mon).and_then(|m| m.sel);
    if sel.and_then(|s| state.registry.get(s)).is_some_and(|c| c.is_fullscreen()) {
        return vec![];
    }
    let next = match sel.and_then(|s| candidates.iter().position(|x| *x == s)) {
        Some(i) => {
            let n = candidates.len() as i64;
            candidates[(i as i64 + dir as i64).rem_euclid(n) as usize]
        }
        None => candidates[0],
    };
    focus(state, ws, Some(next), false)
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

/// Swap the selected tiled client with its neighbour in the attach order.
pub fn move_stack(state: &mut State, dir: i32) -> Vec<Effect> {
    let mon = state.selected;
    let Some(sel) = state.registry.monitor(mon).and_then(|m| m.sel) else {
        return vec![];
    };
    let tiled = visible_tiled(state, mon);
    let Some(i) = tiled.iter().position(|x| *x == sel) else {
        return vec![];
    };
    if tiled.len() < 2 {
        return vec![];
    }
    let n = tiled.len() as i64;
    let other = tiled[(i as i64 + dir as i64).rem_euclid(n) as usize];
    state.registry.swap_attach(sel, other);
    arrange(state, Some(mon))
}

/// Promote the selected tiled client to the head of the attach order, or
/// the next one when it already is the head.
pub fn zoom<W: WindowSystem>(state: &mut State, ws: &W) -> Vec<Effect> {
    let mon = state.selected;
    let Some(m) = state.registry.monitor(mon) else {
        return vec![];
    };
    let Some(sel) = m.sel else {
        return vec![];
    };
    if !m.layout().arranges() {
        return vec![];
    }
    let tiled = visible_tiled(state, mon);
    if !tiled.contains(&sel) {
        return vec![];
    }
    let target = if tiled.first() == Some(&sel) {
        match tiled.get(1) {
            Some(next) => *next,
            None => return vec![],
        }
    } else {
        sel
    };
    state.registry.pop_to_front(target);
    let mut effects = focus(state, ws, Some(target), false);
    effects.extend(arrange(state, Some(mon)));
    effects
}

/// Jump to the first urgent client, switching its monitor's view if needed.
pub fn focus_urgent<W: WindowSystem>(state: &mut State, ws: &W) -> Vec<Effect> {
    let urgent = (0..state.registry.monitors.len()).find_map(|mon| {
        state
            .registry
            .stack_iter(mon)
            .find(|id| state.registry.get(*id).is_some_and(|c| c.attrs.urgent))
    });
    let Some(id) = urgent else {
        return vec![];
    };
    let Some((mon, tags)) = state.registry.get(id).map(|c| (c.monitor(), c.tags())) else {
        return vec![];
    };
    let mut effects = Vec::new();
    state.selected = mon;
    if !state.registry.is_visible(id) {
        effects.extend(view(state, ws, mon, tags));
    }
    effects.extend(focus(state, ws, Some(id), false));
    effects
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{Attributes, Config, Monitor, Rect, Tag};
    use crate::platform::mock::MockWindowSystem;

    fn state_with(n: u32) -> (State, Vec<ClientId>) {
        let mut state = State::default();
        state
            .registry
            .monitors
            .push(Monitor::new(0, Rect::new(0, 0, 1000, 800), &Config::new()));
        let ids = (1..=n)
            .map(|w| {
                let id = state
                    .registry
                    .register(w, Attributes::new(Tag::new(1), 0, 1));
                state.registry.get_mut(id).unwrap().pid = Some(100 + w);
                id
            })
            .collect();
        (state, ids)
    }

    fn focused_window(state: &State) -> Option<u32> {
        state
            .focused
            .and_then(|id| state.registry.get(id))
            .map(|c| c.window)
    }

    #[test]
    fn test_focus_candidate_and_effects() {
        let ws = MockWindowSystem::new();
        let (mut state, ids) = state_with(2);
        let effects = focus(&mut state, &ws, Some(ids[0]), false);
        assert_eq!(focused_window(&state), Some(1));
        assert_eq!(state.registry.monitors[0].sel, Some(ids[0]));
        assert_eq!(state.registry.stack_order(0)[0], ids[0]);
        assert!(effects.contains(&Effect::FocusInput { window: 1 }));
        assert!(effects.contains(&Effect::SetActiveWindow(Some(1))));
        assert!(effects.contains(&Effect::SetBorderColor {
            window: 1,
            color: Config::new().defaults.border_focus,
        }));
    }

    #[test]
    fn test_focus_unfocuses_previous() {
        let ws = MockWindowSystem::new();
        let (mut state, ids) = state_with(2);
        focus(&mut state, &ws, Some(ids[0]), false);
        let effects = focus(&mut state, &ws, Some(ids[1]), false);
        assert_eq!(
            effects[0],
            Effect::SetBorderColor {
                window: 1,
                color: Config::new().defaults.border_normal,
            }
        );
        assert_eq!(focused_window(&state), Some(2));
    }

    #[test]
    fn test_focus_falls_back_past_rejected_candidates() {
        let mut ws = MockWindowSystem::new();
        let (mut state, ids) = state_with(3);
        focus(&mut state, &ws, Some(ids[1]), false);

        state.registry.get_mut(ids[2]).unwrap().attrs.never_focus = true;
        focus(&mut state, &ws, Some(ids[2]), false);
        assert_eq!(focused_window(&state), Some(2));

        focus(&mut state, &ws, Some(ids[2]), true);
        assert_eq!(focused_window(&state), Some(3));

        ws.kill_process(102);
        state.registry.monitors[0].sel = Some(ids[1]);
        focus(&mut state, &ws, Some(ids[1]), false);
        // Dead process: fall back to the first focusable in stack order.
        assert_eq!(focused_window(&state), Some(1));
    }

    #[test]
    fn test_focus_none_without_clients_focuses_root() {
        let ws = MockWindowSystem::new();
        let (mut state, _) = state_with(0);
        let effects = focus(&mut state, &ws, None, false);
        assert_eq!(
            effects,
            vec![Effect::FocusRoot, Effect::SetActiveWindow(None)]
        );
    }

    #[test]
    fn test_modal_descendant_takes_focus() {
        let ws = MockWindowSystem::new();
        let (mut state, ids) = state_with(2);
        let (main, dialog) = (ids[0], ids[1]);
        {
            let d = state.registry.get_mut(dialog).unwrap();
            d.parent = Some(main);
            d.ancestor = main;
            d.attrs.modal = true;
            d.attrs.floating = true;
        }
        focus(&mut state, &ws, Some(main), false);
        assert_eq!(state.focused, Some(dialog));
    }

    #[test]
    fn test_restack_layers_and_modal() {
        let (mut state, ids) = state_with(4);
        // stack order: 4 3 2 1
        state.registry.get_mut(ids[0]).unwrap().attrs.floating = true;
        state.registry.get_mut(ids[1]).unwrap().attrs.always_on_top = true;
        {
            let m = state.registry.get_mut(ids[3]).unwrap();
            m.attrs.modal = true;
            m.ancestor = ids[1];
        }
        match &restack(&state, 0)[0] {
            Effect::Restack { windows } => assert_eq!(windows, &vec![4, 2, 1, 3]),
            _ => panic!("Wrong variant"),
        }
    }

    #[test]
    fn test_lose_fullscreen_and_regain() {
        let ws = MockWindowSystem::new();
        let (mut state, ids) = state_with(2);
        let (fs, other) = (ids[0], ids[1]);
        focus(&mut state, &ws, Some(fs), false);
        set_fullscreen(&mut state, fs, FullscreenState::Real);

        focus(&mut state, &ws, Some(other), false);
        let c = state.registry.get(fs).unwrap();
        assert_eq!(c.attrs.fullscreen, FullscreenState::Normal);
        assert!(c.lose_fullscreen);

        focus(&mut state, &ws, Some(fs), false);
        let c = state.registry.get(fs).unwrap();
        assert_eq!(c.attrs.fullscreen, FullscreenState::Real);
        assert!(!c.lose_fullscreen);
    }

    #[test]
    fn test_game_is_minimized_when_losing_fullscreen() {
        let ws = MockWindowSystem::new();
        let (mut state, ids) = state_with(2);
        state.registry.get_mut(ids[0]).unwrap().attrs.game = true;
        set_fullscreen(&mut state, ids[0], FullscreenState::Real);
        let effects = focus(&mut state, &ws, Some(ids[1]), false);
        assert!(effects.contains(&Effect::Minimize { window: 1 }));
        let c = state.registry.get(ids[0]).unwrap();
        assert!(c.attrs.hidden);
        assert!(c.is_fullscreen());
    }

    #[test]
    fn test_focus_stack_wraps() {
        let ws = MockWindowSystem::new();
        let (mut state, ids) = state_with(3);
        // attach order: 3 2 1
        focus(&mut state, &ws, Some(ids[0]), false);
        focus_stack(&mut state, &ws, 1);
        assert_eq!(focused_window(&state), Some(3));
        focus_stack(&mut state, &ws, -1);
        assert_eq!(focused_window(&state), Some(1));
    }

    #[test]
    fn test_zoom_and_move_stack() {
        let ws = MockWindowSystem::new();
        let (mut state, ids) = state_with(3);
        focus(&mut state, &ws, Some(ids[0]), false);
        zoom(&mut state, &ws);
        assert_eq!(state.registry.attach_order(0), vec![ids[0], ids[2], ids[1]]);
        zoom(&mut state, &ws);
        assert_eq!(state.registry.attach_order(0)[0], ids[2]);
        assert_eq!(state.focused, Some(ids[2]));

        move_stack(&mut state, 1);
        assert_eq!(state.registry.attach_order(0)[1], ids[2]);
    }

    #[test]
    fn test_focus_urgent_switches_view() {
        let ws = MockWindowSystem::new();
        let (mut state, ids) = state_with(2);
        {
            let c = state.registry.get_mut(ids[0]).unwrap();
            c.attrs.tags = Tag::new(4);
            c.attrs.urgent = true;
        }
        focus_urgent(&mut state, &ws);
        assert_eq!(state.registry.monitors[0].view(), Tag::new(4));
        assert_eq!(state.focused, Some(ids[0]));
        assert!(!state.registry.get(ids[0]).unwrap().attrs.urgent);
    }
}
