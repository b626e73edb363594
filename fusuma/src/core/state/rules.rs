use std::collections::{HashSet, VecDeque};

use super::super::{Action, ClientId, DeferredState, MatchContext, Pattern, RuleSet};
use super::focus::{focus, is_descendant};
use super::fullscreen::set_fullscreen;
use super::layout::arrange;
use super::State;
use crate::effect::Effect;
use crate::platform::WindowSystem;

/// Run the rule engine for one client. A deferred pass only retries the
/// defer rules recorded for it and sees `previous_title`.
pub fn apply_rules(
    state: &mut State,
    id: ClientId,
    deferred: bool,
    previous_title: Option<&str>,
) -> Vec<Effect> {
    let Some(c) = state.registry.get(id) else {
        return vec![];
    };
    if c.identity.is_unclassifiable() {
        if !deferred {
            tracing::debug!("Window {:#x} has no identity, floating it", c.window);
            if let Some(c) = state.registry.get_mut(id) {
                c.attrs.floating = true;
                c.attrs.never_focus = true;
            }
        }
        return vec![];
    }
    let pending = match (deferred, state.rules.pending(id)) {
        (false, _) => Vec::new(),
        (true, Some(p)) => p.to_vec(),
        (true, None) => return vec![],
    };
    let (before_monitor, before_fullscreen) = (c.attrs.monitor, c.attrs.fullscreen);

    let eval = {
        let parent = c
            .parent
            .and_then(|p| state.registry.get(p))
            .map(|p| &p.identity);
        let focused = state
            .focused
            .filter(|f| *f != id)
            .and_then(|f| state.registry.get(f))
            .map(|f| &f.identity);
        let ctx = MatchContext {
            client: &c.identity,
            parent,
            focused,
            previous_title,
        };
        if deferred {
            state.rules.evaluate_deferred(&ctx, &pending)
        } else {
            state.rules.evaluate(&ctx)
        }
    };

    let Some(c) = state.registry.get_mut(id) else {
        return vec![];
    };
    if !deferred {
        c.attrs.deferred = DeferredState::None;
    }
    let window = c.window;
    let super::super::Client {
        attrs, defaults, ..
    } = c;
    state.rules.apply(&eval, attrs, defaults);
    if eval.armed.is_empty() && deferred && eval.is_match() {
        attrs.deferred = DeferredState::Satisfied;
    }
    let (target_monitor, target_fullscreen) = (attrs.monitor, attrs.fullscreen);
    attrs.monitor = before_monitor;
    attrs.fullscreen = before_fullscreen;
    state.rules.set_pending(id, eval.armed.clone());

    if eval.is_match() {
        tracing::info!(
            "Rules {:?} matched window {:#x}{}",
            eval.matched,
            window,
            if deferred { " (deferred)" } else { "" }
        );
    }

    let mut effects = Vec::new();
    if target_monitor != before_monitor {
        if target_monitor < state.registry.monitors.len() {
            state.registry.relocate(id, target_monitor);
        } else {
            tracing::warn!(
                "Rule sends window {:#x} to missing monitor {}",
                window,
                target_monitor
            );
        }
    }
    clip_tags(state, id);
    effects.extend(set_fullscreen(state, id, target_fullscreen));

    let linkage: Vec<Action> = eval
        .matched
        .iter()
        .filter_map(|i| state.rules.rules().get(*i))
        .flat_map(|r| r.linkage_actions().cloned())
        .collect();
    for action in linkage {
        match action {
            Action::Parent(pattern) => {
                if let Some(parent) = find_by_pattern(state, &pattern, Some(id)) {
                    set_parent(state, id, Some(parent));
                }
            }
            Action::ParentOf { child, parent } => {
                let child = find_by_pattern(state, &child, None);
                let parent = find_by_pattern(state, &parent, None);
                if let (Some(child), Some(parent)) = (child, parent) {
                    set_parent(state, child, Some(parent));
                }
            }
            _ => {}
        }
    }
    effects
}

/// Keep a client's tags within its monitor's tag count; fall back to the
/// monitor's view when nothing is left.
fn clip_tags(state: &mut State, id: ClientId) {
    let Some(mon) = state.registry.get(id).map(|c| c.monitor()) else {
        return;
    };
    let Some((all, view)) = state
        .registry
        .monitor(mon)
        .map(|m| (m.all_tags(), m.view()))
    else {
        return;
    };
    if let Some(c) = state.registry.get_mut(id) {
        let clipped = c.attrs.tags.intersection(all);
        c.attrs.tags = if clipped.is_empty() { view } else { clipped };
    }
}

/// First registered client matching `pattern`, searching the selected
/// monitor's stack order before the others.
pub fn find_by_pattern(
    state: &State,
    pattern: &Pattern,
    exclude: Option<ClientId>,
) -> Option<ClientId> {
    let count = state.registry.monitors.len();
    let order = std::iter::once(state.selected).chain((0..count).filter(|m| *m != state.selected));
    for mon in order {
        let found = state.registry.stack_iter(mon).find(|id| {
            Some(*id) != exclude
                && state
                    .registry
                    .get(*id)
                    .is_some_and(|c| pattern.matches(&c.identity))
        });
        if found.is_some() {
            return found;
        }
    }
    None
}

/// Link `child` under `parent`, refusing self links and cycles, then
/// propagate ancestry, tags and monitor down the subtree.
pub fn set_parent(state: &mut State, child: ClientId, parent: Option<ClientId>) -> bool {
    if let Some(p) = parent {
        if p == child || is_descendant(state, p, child) {
            tracing::warn!("Refusing parent link that would form a cycle");
            return false;
        }
        if !state.registry.contains(p) {
            return false;
        }
    }
    let Some(c) = state.registry.get_mut(child) else {
        return false;
    };
    c.parent = parent;
    reflow_family(state, child, true);
    true
}

/// Recompute the ancestor of `root` and every descendant. With `inherit`
/// each node also takes its parent's tags and monitor.
pub fn reflow_family(state: &mut State, root: ClientId, inherit: bool) {
    let mut queue = VecDeque::from([root]);
    let mut seen = HashSet::new();
    while let Some(node) = queue.pop_front() {
        if !seen.insert(node) {
            continue;
        }
        let Some(c) = state.registry.get(node) else {
            continue;
        };
        let from_parent = c
            .parent
            .and_then(|p| state.registry.get(p))
            .map(|p| (p.ancestor, p.tags(), p.monitor()));
        let ancestor = from_parent.map(|(a, _, _)| a).unwrap_or(node);
        if let Some(c) = state.registry.get_mut(node) {
            c.ancestor = ancestor;
            if let (true, Some((_, tags, _))) = (inherit, from_parent) {
                c.attrs.tags = tags;
            }
        }
        if let (true, Some((_, _, mon))) = (inherit, from_parent) {
            state.registry.relocate(node, mon);
        }
        queue.extend(
            state
                .registry
                .iter()
                .filter(|c| c.parent == Some(node))
                .map(|c| c.id),
        );
    }
}

/// Swap in a new rule set and run it over every managed client. Clients
/// keep their current attributes; matching rules apply on top.
pub fn reload_rules<W: WindowSystem>(state: &mut State, ws: &W, rules: RuleSet) -> Vec<Effect> {
    state.rules.replace(rules);
    let mut effects = Vec::new();
    for id in state.registry.ids() {
        effects.extend(apply_rules(state, id, false, None));
    }
    effects.extend(arrange(state, None));
    let focused = state.focused;
    effects.extend(focus(state, ws, focused, false));
    effects
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{Attributes, Config, FullscreenState, Monitor, Rect, RulesEngine, Tag};
    use crate::platform::mock::MockWindowSystem;

    fn setup(rules: &str) -> State {
        let mut state = State::default();
        let config = Config::new();
        state
            .registry
            .monitors
            .push(Monitor::new(0, Rect::new(0, 0, 1000, 800), &config));
        state
            .registry
            .monitors
            .push(Monitor::new(1, Rect::new(1000, 0, 800, 600), &config));
        let (set, warnings) = RuleSet::parse(rules).unwrap();
        assert!(warnings.is_empty(), "{:?}", warnings);
        state.rules = RulesEngine::with_rules(set);
        state
    }

    fn add(state: &mut State, window: u32, class: &str, title: &str) -> ClientId {
        let id = state
            .registry
            .register(window, Attributes::new(Tag::new(1), 0, 1));
        let c = state.registry.get_mut(id).unwrap();
        c.identity.class = class.to_string();
        c.identity.instance = class.to_lowercase();
        c.identity.title = title.to_string();
        c.frame = Rect::new(10, 10, 200, 100);
        id
    }

    #[test]
    fn test_rule_relocates_and_clips_tags() {
        let mut state = setup(r#"[{"if-class-is": "Mail", "set-monitor": 1, "set-tags": 3}]"#);
        let id = add(&mut state, 1, "Mail", "Inbox");
        apply_rules(&mut state, id, false, None);
        let c = state.registry.get(id).unwrap();
        assert_eq!(c.monitor(), 1);
        assert_eq!(c.tags(), Tag::from_mask(3));
        assert_eq!(state.registry.attach_order(1), vec![id]);
        state.registry.check_invariants().unwrap();
    }

    #[test]
    fn test_missing_monitor_is_ignored() {
        let mut state = setup(r#"[{"if-class-is": "Mail", "set-monitor": 7}]"#);
        let id = add(&mut state, 1, "Mail", "Inbox");
        apply_rules(&mut state, id, false, None);
        assert_eq!(state.registry.get(id).unwrap().monitor(), 0);
    }

    #[test]
    fn test_fullscreen_rule_goes_through_state_machine() {
        let mut state = setup(r#"[{"if-class-is": "Player", "set-fullscreen": true}]"#);
        let id = add(&mut state, 1, "Player", "video");
        let effects = apply_rules(&mut state, id, false, None);
        let c = state.registry.get(id).unwrap();
        assert_eq!(c.attrs.fullscreen, FullscreenState::Real);
        assert_eq!(c.frame, Rect::new(0, 0, 1000, 800));
        assert!(!effects.is_empty());
    }

    #[test]
    fn test_unclassifiable_client_floats() {
        let mut state = setup(r#"[{"if-class-not-contains": "x", "set-tag": 4}]"#);
        let id = add(&mut state, 1, "", "");
        apply_rules(&mut state, id, false, None);
        let c = state.registry.get(id).unwrap();
        assert!(c.attrs.floating && c.attrs.never_focus);
        assert_eq!(c.tags(), Tag::new(1));
    }

    #[test]
    fn test_deferred_rule_fires_on_title_change() {
        let mut state = setup(
            r#"[{"if-class-is": "Term", "defer": true, "if-title-contains": "vim", "set-tag": 2}]"#,
        );
        let id = add(&mut state, 1, "Term", "bash");
        apply_rules(&mut state, id, false, None);
        assert_eq!(
            state.registry.get(id).unwrap().attrs.deferred,
            DeferredState::Pending
        );
        assert!(state.rules.has_pending(id));

        state.registry.get_mut(id).unwrap().identity.title = "vim notes".to_string();
        apply_rules(&mut state, id, true, Some("bash"));
        let c = state.registry.get(id).unwrap();
        assert_eq!(c.tags(), Tag::new(2));
        assert_eq!(c.attrs.deferred, DeferredState::Satisfied);
        assert!(!state.rules.has_pending(id));

        // Nothing pending: later title changes are ignored.
        assert!(apply_rules(&mut state, id, true, Some("vim notes")).is_empty());
    }

    #[test]
    fn test_title_was_only_defer_rule_fires_on_title_change() {
        let mut state = setup(r#"[{"if-title-was": "Loading", "defer": true, "set-tag": 4}]"#);
        let id = add(&mut state, 1, "Steam", "Loading");
        apply_rules(&mut state, id, false, None);
        assert!(state.rules.has_pending(id));
        assert_eq!(state.registry.get(id).unwrap().tags(), Tag::new(1));

        state.registry.get_mut(id).unwrap().identity.title = "Steam".to_string();
        apply_rules(&mut state, id, true, Some("Loading"));
        let c = state.registry.get(id).unwrap();
        assert_eq!(c.tags(), Tag::new(4));
        assert_eq!(c.attrs.deferred, DeferredState::Satisfied);
        assert!(!state.rules.has_pending(id));
    }

    #[test]
    fn test_parent_rule_links_and_inherits() {
        let mut state = setup(
            r#"[{"if-class-is": "Toolbox", "set-parent": {"title-begins": "GNU Image"}}]"#,
        );
        let main = add(&mut state, 1, "Gimp", "GNU Image Manipulation Program");
        state.registry.get_mut(main).unwrap().attrs.tags = Tag::new(5);
        let tool = add(&mut state, 2, "Toolbox", "Tools");
        apply_rules(&mut state, tool, false, None);
        let c = state.registry.get(tool).unwrap();
        assert_eq!(c.parent, Some(main));
        assert_eq!(c.ancestor, main);
        assert_eq!(c.tags(), Tag::new(5));
    }

    #[test]
    fn test_parent_cycle_is_refused() {
        let mut state = setup("[]");
        let a = add(&mut state, 1, "A", "a");
        let b = add(&mut state, 2, "B", "b");
        assert!(set_parent(&mut state, b, Some(a)));
        assert!(!set_parent(&mut state, a, Some(b)));
        assert!(!set_parent(&mut state, a, Some(a)));
        assert_eq!(state.registry.get(a).unwrap().parent, None);
        assert_eq!(state.registry.get(b).unwrap().ancestor, a);
    }

    #[test]
    fn test_reflow_updates_grandchildren() {
        let mut state = setup("[]");
        let a = add(&mut state, 1, "A", "a");
        let b = add(&mut state, 2, "B", "b");
        let c = add(&mut state, 3, "C", "c");
        set_parent(&mut state, c, Some(b));
        set_parent(&mut state, b, Some(a));
        assert_eq!(state.registry.get(c).unwrap().ancestor, a);
    }

    #[test]
    fn test_reload_rules_applies_to_managed_clients() {
        let ws = MockWindowSystem::new();
        let mut state = setup("[]");
        let id = add(&mut state, 1, "Web", "page");
        let (set, _) = RuleSet::parse(r#"[{"if-class-is": "Web", "set-sticky": true}]"#).unwrap();
        reload_rules(&mut state, &ws, set);
        assert!(state.registry.get(id).unwrap().attrs.sticky);
    }
}
