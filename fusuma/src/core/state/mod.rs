use super::{ClientId, Config, FullscreenState, LayoutKind, Registry, RuleSet, RulesEngine, Tag};
use crate::effect::Effect;
use crate::event::Event;
use crate::platform::WindowSystem;

mod actions;
mod events;
mod focus;
mod fullscreen;
mod layout;
mod manage;
mod monitor;
mod rules;
mod tags;

use actions::*;
use events::*;
use focus::*;
use fullscreen::*;
use layout::*;
use manage::*;
use monitor::*;
use rules::*;
use tags::*;

/// Everything the window manager knows. Core entry points take
/// `&mut State` and return the effects to execute.
#[derive(Debug)]
pub struct State {
    pub registry: Registry,
    /// Client holding input focus.
    pub focused: Option<ClientId>,
    /// Index of the selected monitor.
    pub selected: usize,
    pub rules: RulesEngine,
    pub config: Config,
    /// Urgency hints from clients are honoured.
    pub urgency_hints: bool,
}

impl State {
    pub fn new(config: Config, rules: RuleSet) -> Self {
        Self {
            registry: Registry::new(),
            focused: None,
            selected: 0,
            rules: RulesEngine::with_rules(rules),
            config,
            urgency_hints: true,
        }
    }

    /// Selection of the selected monitor.
    pub fn selected_client(&self) -> Option<ClientId> {
        self.registry.monitor(self.selected).and_then(|m| m.sel)
    }

    pub fn client_by_window(&self, window: u32) -> Option<ClientId> {
        self.registry.by_window(window)
    }

    /// Build monitors from the display and adopt existing windows.
    pub fn start<W: WindowSystem>(&mut self, ws: &W) -> Vec<Effect> {
        let mut effects = update_monitors(self, ws);
        effects.extend(adopt_existing(self, ws));
        effects
    }

    pub fn handle_event<W: WindowSystem>(&mut self, ws: &W, event: &Event) -> Vec<Effect> {
        match event {
            Event::MapRequest { window } => {
                if self.registry.by_window(*window).is_some() {
                    return vec![];
                }
                match ws.window_info(*window) {
                    Some(info) => manage(self, ws, info),
                    None => vec![],
                }
            }
            Event::Destroyed { window } => unmanage(self, ws, *window),
            Event::Unmapped { window, .. } => {
                // Hidden clients and swallowed terminals were unmapped by us.
                let ours = self
                    .registry
                    .by_window(*window)
                    .and_then(|id| self.registry.get(id))
                    .is_some_and(|c| c.attrs.hidden || !c.is_linked());
                if ours {
                    return vec![];
                }
                unmanage(self, ws, *window)
            }
            Event::ConfigureRequest { window, request } => {
                configure_request(self, ws, *window, request)
            }
            Event::TitleChanged { window } => title_changed(self, ws, *window),
            Event::HintsChanged { window } => hints_changed(self, ws, *window),
            Event::SizeHintsChanged { window } => size_hints_changed(self, ws, *window),
            Event::TransientForChanged { window } => transient_changed(self, ws, *window),
            Event::StateRequest {
                window,
                action,
                state,
            } => state_request(self, ws, *window, *action, *state),
            Event::ActivateRequest { window } => activate_request(self, ws, *window),
            Event::CloseRequest { window } => close_request(self, *window),
            Event::PointerEntered { window } => pointer_entered(self, ws, *window),
            Event::PointerMoved { x, y } => pointer_moved(self, ws, *x, *y),
            Event::ButtonPressed { window } => button_pressed(self, ws, *window),
            Event::ScreensChanged => update_monitors(self, ws),
            Event::InvalidWindow { window } => {
                self.registry.mark_dormant(*window);
                vec![]
            }
        }
    }

    pub fn arrange(&mut self, mon: Option<usize>) -> Vec<Effect> {
        arrange(self, mon)
    }

    pub fn focus<W: WindowSystem>(
        &mut self,
        ws: &W,
        candidate: Option<ClientId>,
        force: bool,
    ) -> Vec<Effect> {
        focus(self, ws, candidate, force)
    }

    pub fn focus_stack<W: WindowSystem>(&mut self, ws: &W, dir: i32) -> Vec<Effect> {
        focus_stack(self, ws, dir)
    }

    pub fn move_stack(&mut self, dir: i32) -> Vec<Effect> {
        move_stack(self, dir)
    }

    pub fn zoom<W: WindowSystem>(&mut self, ws: &W) -> Vec<Effect> {
        zoom(self, ws)
    }

    pub fn focus_urgent<W: WindowSystem>(&mut self, ws: &W) -> Vec<Effect> {
        focus_urgent(self, ws)
    }

    pub fn border_color(&self, id: ClientId) -> u32 {
        border_color(self, id)
    }

    pub fn view<W: WindowSystem>(&mut self, ws: &W, tags: Tag) -> Vec<Effect> {
        view(self, ws, self.selected, tags)
    }

    pub fn toggle_view<W: WindowSystem>(&mut self, ws: &W, tags: Tag) -> Vec<Effect> {
        toggle_view(self, ws, self.selected, tags)
    }

    pub fn view_last<W: WindowSystem>(&mut self, ws: &W) -> Vec<Effect> {
        view_last(self, ws, self.selected)
    }

    pub fn tag_selected<W: WindowSystem>(&mut self, ws: &W, tags: Tag) -> Vec<Effect> {
        match self.selected_client() {
            Some(id) => tag_client(self, ws, id, tags),
            None => vec![],
        }
    }

    pub fn toggle_tag_selected<W: WindowSystem>(&mut self, ws: &W, tags: Tag) -> Vec<Effect> {
        match self.selected_client() {
            Some(id) => toggle_tag(self, ws, id, tags),
            None => vec![],
        }
    }

    pub fn focus_monitor<W: WindowSystem>(&mut self, ws: &W, dir: i32) -> Vec<Effect> {
        focus_monitor(self, ws, dir)
    }

    pub fn send_monitor<W: WindowSystem>(&mut self, ws: &W, dir: i32) -> Vec<Effect> {
        match self.selected_client() {
            Some(id) => send_monitor(self, ws, id, dir),
            None => vec![],
        }
    }

    pub fn toggle_fullscreen(&mut self, kind: FullscreenState) -> Vec<Effect> {
        let Some(id) = self.selected_client() else {
            return vec![];
        };
        let mon = self.selected;
        let mut effects = toggle_fullscreen(self, id, kind);
        effects.extend(arrange(self, Some(mon)));
        effects
    }

    pub fn toggle_floating(&mut self) -> Vec<Effect> {
        match self.selected_client() {
            Some(id) => toggle_floating(self, id),
            None => vec![],
        }
    }

    pub fn toggle_sticky(&mut self) -> Vec<Effect> {
        match self.selected_client() {
            Some(id) => toggle_sticky(self, id),
            None => vec![],
        }
    }

    pub fn toggle_always_on_top(&mut self) -> Vec<Effect> {
        match self.selected_client() {
            Some(id) => toggle_always_on_top(self, id),
            None => vec![],
        }
    }

    pub fn minimize<W: WindowSystem>(&mut self, ws: &W, id: Option<ClientId>) -> Vec<Effect> {
        match id.or_else(|| self.selected_client()) {
            Some(id) => minimize(self, ws, id),
            None => vec![],
        }
    }

    /// Restore `id`, or the most recently hidden client of the selected
    /// monitor.
    pub fn restore<W: WindowSystem>(&mut self, ws: &W, id: Option<ClientId>) -> Vec<Effect> {
        match id.or_else(|| last_hidden(self)) {
            Some(id) => restore(self, ws, id),
            None => vec![],
        }
    }

    pub fn set_layout(&mut self, layout: LayoutKind) -> Vec<Effect> {
        set_layout(self, self.selected, layout)
    }

    pub fn cycle_layout(&mut self) -> Vec<Effect> {
        cycle_layout(self, self.selected)
    }

    pub fn set_master_fraction(&mut self, value: f32, relative: bool) -> Vec<Effect> {
        set_master_fraction(self, self.selected, value, relative)
    }

    pub fn inc_master_count(&mut self, delta: i64) -> Vec<Effect> {
        inc_master_count(self, self.selected, delta)
    }

    pub fn set_size_factor(&mut self, factor: f32) -> Vec<Effect> {
        match self.selected_client() {
            Some(id) => set_size_factor(self, id, factor),
            None => vec![],
        }
    }

    pub fn toggle_gaps(&mut self) -> Vec<Effect> {
        toggle_gaps(self, self.selected)
    }

    pub fn toggle_bar(&mut self) -> Vec<Effect> {
        toggle_bar(self, self.selected)
    }

    pub fn toggle_desktop<W: WindowSystem>(&mut self, ws: &W) -> Vec<Effect> {
        toggle_desktop(self, ws, self.selected)
    }

    pub fn close(&self, id: Option<ClientId>) -> Vec<Effect> {
        match id.or_else(|| self.selected_client()) {
            Some(id) => close(self, id),
            None => vec![],
        }
    }

    pub fn kill(&self, id: Option<ClientId>) -> Vec<Effect> {
        match id.or_else(|| self.selected_client()) {
            Some(id) => kill(self, id),
            None => vec![],
        }
    }

    pub fn spawn(&self, command: Vec<String>) -> Vec<Effect> {
        spawn(self, command)
    }

    pub fn reload_rules<W: WindowSystem>(&mut self, ws: &W, rules: RuleSet) -> Vec<Effect> {
        reload_rules(self, ws, rules)
    }

    /// Re-run the first rule pass for one client, as at registration.
    pub fn apply_rules(&mut self, id: ClientId) -> Vec<Effect> {
        apply_rules(self, id, false, None)
    }

    pub fn set_parent(&mut self, child: ClientId, parent: Option<ClientId>) -> bool {
        set_parent(self, child, parent)
    }

    pub fn find_by_pattern(&self, pattern: &super::Pattern) -> Option<ClientId> {
        find_by_pattern(self, pattern, None)
    }

    pub fn is_descendant(&self, id: ClientId, ancestor: ClientId) -> bool {
        is_descendant(self, id, ancestor)
    }

    pub fn client_list(&self) -> Effect {
        client_list(self)
    }

    pub fn persist_changed(&mut self) -> Vec<Effect> {
        persist_changed(self)
    }

    pub fn restack(&self, mon: usize) -> Vec<Effect> {
        restack(self, mon)
    }
}

impl Default for State {
    fn default() -> Self {
        Self::new(Config::new(), RuleSet::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::Rect;
    use crate::event::StateAction;
    use crate::platform::mock::{create_test_screen, create_test_window, MockWindowSystem};
    use crate::platform::WindowInfo;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    fn setup_mock_system() -> MockWindowSystem {
        MockWindowSystem::new()
            .with_screens(vec![
                create_test_screen(0, 0, 1920, 1080),
                create_test_screen(1920, 0, 1280, 1024),
            ])
            .with_windows(vec![
                create_test_window(100, 1000, "Firefox", 0, 0, 960, 1080),
                create_test_window(101, 1001, "XTerm", 960, 0, 960, 1080),
                create_test_window(102, 1002, "Code", 0, 0, 960, 540),
            ])
    }

    fn started() -> (State, MockWindowSystem) {
        let ws = setup_mock_system();
        let mut state = State::default();
        state.start(&ws);
        (state, ws)
    }

    #[test]
    fn test_start_adopts_existing_windows() {
        let (state, _) = started();
        assert_eq!(state.registry.monitors.len(), 2);
        assert_eq!(state.registry.len(), 3);
        assert_eq!(state.registry.attach_order(0).len(), 3);
        assert_eq!(state.focused, state.client_by_window(102));
        state.registry.check_invariants().unwrap();
    }

    #[test]
    fn test_map_and_destroy_events() {
        let (mut state, mut ws) = started();
        ws.add_window(create_test_window(103, 1003, "Mpv", 0, 0, 640, 480));
        let effects = state.handle_event(&ws, &Event::MapRequest { window: 103 });
        assert!(effects.contains(&Effect::Map { window: 103 }));
        assert_eq!(state.focused, state.client_by_window(103));

        assert!(state
            .handle_event(&ws, &Event::MapRequest { window: 103 })
            .is_empty());

        ws.remove_window(103);
        state.handle_event(&ws, &Event::Destroyed { window: 103 });
        assert!(state.client_by_window(103).is_none());
        assert_eq!(state.focused, state.client_by_window(102));
        state.registry.check_invariants().unwrap();
    }

    #[test]
    fn test_unmap_of_hidden_client_is_ignored() {
        let (mut state, ws) = started();
        let id = state.client_by_window(100).unwrap();
        state.minimize(&ws, Some(id));
        state.handle_event(
            &ws,
            &Event::Unmapped {
                window: 100,
                synthetic: false,
            },
        );
        assert!(state.registry.contains(id));
        state.handle_event(
            &ws,
            &Event::Unmapped {
                window: 101,
                synthetic: false,
            },
        );
        assert!(state.client_by_window(101).is_none());
    }

    #[test]
    fn test_invalid_window_is_swept_on_next_arrange() {
        let (mut state, ws) = started();
        state.handle_event(&ws, &Event::InvalidWindow { window: 101 });
        assert!(state.client_by_window(101).is_some());
        state.arrange(None);
        assert!(state.client_by_window(101).is_none());
        state.registry.check_invariants().unwrap();
    }

    #[test]
    fn test_view_toggle_with_current_view_changes_nothing() {
        let (mut state, ws) = started();
        let frames: Vec<Rect> = state.registry.iter().map(|c| c.frame).collect();
        let focused = state.focused;
        let monitor = state.registry.monitors[0].clone();

        assert!(state.view(&ws, Tag::new(1)).is_empty());
        assert!(state.toggle_view(&ws, Tag::from_mask(0)).is_empty());

        let after: Vec<Rect> = state.registry.iter().map(|c| c.frame).collect();
        assert_eq!(frames, after);
        assert_eq!(focused, state.focused);
        assert_eq!(monitor.tagset, state.registry.monitors[0].tagset);
        assert_eq!(monitor.pertag, state.registry.monitors[0].pertag);
    }

    #[test]
    fn test_send_monitor_and_focus_follow() {
        let (mut state, ws) = started();
        let id = state.selected_client().unwrap();
        state.send_monitor(&ws, 1);
        assert_eq!(state.registry.get(id).unwrap().monitor(), 1);
        assert_eq!(state.selected, 0);
        state.focus_monitor(&ws, 1);
        assert_eq!(state.selected, 1);
        assert_eq!(state.focused, Some(id));
    }

    #[test]
    fn test_fullscreen_request_and_focus_change() {
        let (mut state, ws) = started();
        state.handle_event(
            &ws,
            &Event::StateRequest {
                window: 100,
                action: StateAction::Add,
                state: crate::core::NetState::FULLSCREEN,
            },
        );
        let id = state.client_by_window(100).unwrap();
        assert_eq!(
            state.registry.get(id).unwrap().frame,
            Rect::new(0, 0, 1920, 1080)
        );
        state.handle_event(&ws, &Event::ButtonPressed { window: 101 });
        assert!(!state.registry.get(id).unwrap().is_fullscreen());
        state.handle_event(&ws, &Event::ButtonPressed { window: 100 });
        assert!(state.registry.get(id).unwrap().is_fullscreen());
    }

    #[test]
    fn test_rules_reapplied_without_identity_change_are_stable() {
        let ws = setup_mock_system();
        let (set, _) = RuleSet::parse(
            r#"[{"if-class-is": "XTerm", "set-tag": 2, "set-border": 3},
                {"if-class-is": "XTerm", "exclusive": true, "set-floating": true},
                {"if-title-contains": "Window", "set-sticky": true}]"#,
        )
        .unwrap();
        let mut state = State::new(Config::new(), set);
        state.start(&ws);
        let id = state.client_by_window(101).unwrap();
        let first = state.registry.get(id).unwrap().attrs.clone();
        state.apply_rules(id);
        assert_eq!(first, state.registry.get(id).unwrap().attrs);
        assert!(first.floating);
        assert!(!first.sticky);
    }

    #[test]
    fn test_random_lifecycle_keeps_orderings_consistent() {
        let mut rng = StdRng::seed_from_u64(7);
        let mut ws = setup_mock_system();
        let mut state = State::default();
        state.start(&ws);
        let mut next: u32 = 200;

        for _ in 0..500 {
            let windows: Vec<u32> = state.registry.iter().map(|c| c.window).collect();
            let pick = |rng: &mut StdRng| windows[rng.gen_range(0..windows.len())];
            match rng.gen_range(0..8) {
                0 | 1 => {
                    let mut info: WindowInfo =
                        create_test_window(next, 5000 + next, "App", 0, 0, 300, 200);
                    if rng.gen_bool(0.3) && !windows.is_empty() {
                        info.transient_for = Some(pick(&mut rng));
                    }
                    ws.add_window(info);
                    state.handle_event(&ws, &Event::MapRequest { window: next });
                    next += 1;
                }
                2 if !windows.is_empty() => {
                    let w = pick(&mut rng);
                    ws.remove_window(w);
                    state.handle_event(&ws, &Event::Destroyed { window: w });
                }
                3 if !windows.is_empty() => {
                    state.handle_event(&ws, &Event::ButtonPressed { window: pick(&mut rng) });
                    state.send_monitor(&ws, 1);
                }
                4 => {
                    state.focus_monitor(&ws, 1);
                }
                5 if !windows.is_empty() => {
                    state.handle_event(&ws, &Event::InvalidWindow { window: pick(&mut rng) });
                }
                6 => {
                    state.view(&ws, Tag::new(rng.gen_range(1..=3)));
                    state.tag_selected(&ws, Tag::new(rng.gen_range(1..=3)));
                }
                _ => {
                    state.zoom(&ws);
                    state.focus_stack(&ws, 1);
                }
            }
            state.arrange(None);
            state.registry.check_invariants().unwrap();
            if let Some(f) = state.focused {
                assert!(state.registry.contains(f));
            }
        }
    }

    #[test]
    fn test_register_without_rules_uses_monitor_view() {
        let mut state = State::default();
        state.registry.monitors.push(crate::core::Monitor::new(
            0,
            Rect::new(0, 0, 800, 600),
            &Config::new(),
        ));
        state.registry.monitors[0].tagset[0] = Tag::new(4);
        let ws = MockWindowSystem::new()
            .with_windows(vec![create_test_window(1, 10, "A", 0, 0, 100, 100)]);
        state.handle_event(&ws, &Event::MapRequest { window: 1 });
        let id = state.client_by_window(1).unwrap();
        assert_eq!(state.registry.get(id).unwrap().tags(), Tag::new(4));
    }
}
