use std::collections::HashMap;

use super::{
    Action, Attributes, ClientId, DeferredState, Field, Flag, FullscreenState, Identity, MatchOp,
    Pattern, Predicate, Rule, RuleSet, Subject, TitleWas,
};

/// Identities a rule can look at while it is evaluated for one client.
#[derive(Debug, Clone, Copy)]
pub struct MatchContext<'a> {
    pub client: &'a Identity,
    pub parent: Option<&'a Identity>,
    pub focused: Option<&'a Identity>,
    /// Title before the change that triggered a deferred pass.
    pub previous_title: Option<&'a str>,
}

impl<'a> MatchContext<'a> {
    pub fn new(client: &'a Identity) -> Self {
        Self {
            client,
            parent: None,
            focused: None,
            previous_title: None,
        }
    }
}

impl Identity {
    pub fn field(&self, field: Field) -> &str {
        match field {
            Field::Class => &self.class,
            Field::Instance => &self.instance,
            Field::Role => &self.role,
            Field::Title => &self.title,
        }
    }
}

impl MatchOp {
    fn test(self, haystack: &str, pattern: &str) -> bool {
        match self {
            MatchOp::Is => haystack == pattern,
            MatchOp::Contains => haystack.contains(pattern),
            MatchOp::Begins => haystack.starts_with(pattern),
            MatchOp::Ends => haystack.ends_with(pattern),
        }
    }
}

impl Predicate {
    pub fn matches(&self, ctx: &MatchContext) -> bool {
        let subject = match self.subject {
            Subject::Client => Some(ctx.client),
            Subject::Parent => ctx.parent,
            Subject::Focused => ctx.focused,
        };
        // A missing parent or focused client matches nothing.
        let Some(identity) = subject else {
            return self.negated;
        };
        let value = identity.field(self.field);
        let any = self.values.iter().any(|v| self.op.test(value, v));
        any != self.negated
    }

    /// Whether this predicate makes its rule take part in a pass.
    fn participates(&self) -> bool {
        match self.subject {
            Subject::Client => true,
            Subject::Parent => self.field == Field::Title,
            Subject::Focused => false,
        }
    }
}

impl Pattern {
    pub fn matches(&self, identity: &Identity) -> bool {
        let ctx = MatchContext::new(identity);
        self.predicates.iter().all(|p| p.matches(&ctx))
    }
}

impl TitleWas {
    fn matches(&self, previous: Option<&str>) -> bool {
        let Some(previous) = previous else {
            return false;
        };
        self.values.iter().any(|v| v == previous) != self.negated
    }
}

impl Rule {
    pub fn participates(&self, deferred_pass: bool) -> bool {
        self.predicates.iter().any(Predicate::participates)
            || (deferred_pass && !self.title_was.is_empty())
    }

    /// Evaluate all predicates. Title-was conditions only hold on a
    /// deferred pass; on the first pass a rule carrying one never matches.
    pub fn matches(&self, ctx: &MatchContext, deferred_pass: bool) -> bool {
        if !self.predicates.iter().all(|p| p.matches(ctx)) {
            return false;
        }
        if self.title_was.is_empty() {
            return true;
        }
        deferred_pass
            && self
                .title_was
                .iter()
                .all(|t| t.matches(ctx.previous_title))
    }

    /// Mutations with side effects beyond the attribute set.
    pub fn linkage_actions(&self) -> impl Iterator<Item = &Action> {
        self.actions
            .iter()
            .filter(|a| matches!(a, Action::Parent(_) | Action::ParentOf { .. }))
    }
}

/// Outcome of one evaluation pass, in rule order.
#[derive(Debug, Default, PartialEq)]
pub struct Evaluation {
    pub matched: Vec<usize>,
    /// The last matched rule is exclusive and stopped the pass.
    pub exclusive: bool,
    /// Defer rules to retry on the next title change.
    pub armed: Vec<usize>,
}

impl Evaluation {
    pub fn is_match(&self) -> bool {
        !self.matched.is_empty()
    }
}

/// Assign every attribute mutation of `actions`. Plain assignments only, so
/// applying the same actions twice yields the same attributes.
pub fn apply_actions(attrs: &mut Attributes, actions: &[Action]) {
    for action in actions {
        match action {
            Action::Flag(flag, value) => apply_flag(attrs, *flag, *value),
            Action::Tags(tags) => attrs.tags = *tags,
            Action::Monitor(m) => attrs.monitor = *m,
            Action::Border(b) => attrs.border = *b,
            Action::X(x) => attrs.float_geometry.x = Some(*x),
            Action::Y(y) => attrs.float_geometry.y = Some(*y),
            Action::Width(w) => attrs.float_geometry.width = Some(*w),
            Action::Height(h) => attrs.float_geometry.height = Some(*h),
            Action::SizeFactor(f) => attrs.size_factor = *f,
            Action::Parent(_) | Action::ParentOf { .. } => {}
        }
    }
}

fn apply_flag(attrs: &mut Attributes, flag: Flag, value: bool) {
    match flag {
        Flag::Floating => attrs.floating = value,
        Flag::Sticky => attrs.sticky = value,
        Flag::Urgent => attrs.urgent = value,
        Flag::Fullscreen => {
            attrs.fullscreen = if value {
                FullscreenState::Real
            } else {
                FullscreenState::Normal
            }
        }
        Flag::PretendFullscreen => {
            if value {
                attrs.fullscreen = FullscreenState::Pretend;
            } else if attrs.fullscreen == FullscreenState::Pretend {
                attrs.fullscreen = FullscreenState::Normal;
            }
        }
        Flag::Hidden => attrs.hidden = value,
        Flag::Ignore => attrs.ignored = value,
        Flag::AlwaysOnTop => attrs.always_on_top = value,
        Flag::Modal => attrs.modal = value,
        Flag::Autofocus => attrs.autofocus = value,
        Flag::NeverFocus => attrs.never_focus = value,
        Flag::Center => attrs.center = value,
        Flag::Terminal => attrs.terminal = value,
        Flag::NoSwallow => attrs.no_swallow = value,
        Flag::Game => attrs.game = value,
        Flag::Desktop => attrs.desktop = value,
        Flag::OnDesktop => attrs.on_desktop = value,
    }
}

/// The rule set plus the deferred-rule records waiting for title changes.
#[derive(Debug, Default)]
pub struct RulesEngine {
    rules: RuleSet,
    pending: HashMap<ClientId, Vec<usize>>,
}

impl RulesEngine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_rules(rules: RuleSet) -> Self {
        Self {
            rules,
            pending: HashMap::new(),
        }
    }

    pub fn rules(&self) -> &RuleSet {
        &self.rules
    }

    /// Swap in a new rule set. Pending records refer to rule indices of the
    /// old set and are dropped.
    pub fn replace(&mut self, rules: RuleSet) {
        tracing::info!("Loaded {} rules", rules.len());
        self.rules = rules;
        self.pending.clear();
    }

    pub fn pending(&self, id: ClientId) -> Option<&[usize]> {
        self.pending.get(&id).map(|v| v.as_slice())
    }

    pub fn has_pending(&self, id: ClientId) -> bool {
        self.pending.contains_key(&id)
    }

    pub fn clear_pending(&mut self, id: ClientId) {
        self.pending.remove(&id);
    }

    pub fn set_pending(&mut self, id: ClientId, rules: Vec<usize>) {
        if rules.is_empty() {
            self.pending.remove(&id);
        } else {
            self.pending.insert(id, rules);
        }
    }

    /// First pass, run at registration.
    pub fn evaluate(&self, ctx: &MatchContext) -> Evaluation {
        let mut eval = Evaluation::default();
        for (i, rule) in self.rules.rules().iter().enumerate() {
            if !rule.participates(false) {
                // Title-was-only defer rules wait for the first title change
                if rule.defer && rule.participates(true) {
                    eval.armed.push(i);
                }
                continue;
            }
            if rule.matches(ctx, false) {
                eval.matched.push(i);
                if rule.exclusive {
                    eval.exclusive = true;
                    break;
                }
            } else if rule.defer {
                eval.armed.push(i);
            }
        }
        eval
    }

    /// Retry the pending defer rules of a client after its title changed.
    /// Rules that still fail stay armed.
    pub fn evaluate_deferred(&self, ctx: &MatchContext, pending: &[usize]) -> Evaluation {
        let mut eval = Evaluation::default();
        for &i in pending {
            let Some(rule) = self.rules.get(i) else {
                continue;
            };
            if !rule.participates(true) {
                continue;
            }
            if rule.matches(ctx, true) {
                eval.matched.push(i);
                if rule.exclusive {
                    eval.exclusive = true;
                    break;
                }
            } else {
                eval.armed.push(i);
            }
        }
        eval
    }

    /// Apply an evaluation's mutations to `attrs`. An exclusive match
    /// resets to `defaults` before its own mutations.
    pub fn apply(&self, eval: &Evaluation, attrs: &mut Attributes, defaults: &Attributes) {
        for (n, &i) in eval.matched.iter().enumerate() {
            let Some(rule) = self.rules.get(i) else {
                continue;
            };
            if eval.exclusive && n + 1 == eval.matched.len() {
                *attrs = defaults.clone();
            }
            apply_actions(attrs, &rule.actions);
        }
        if !eval.armed.is_empty() {
            attrs.deferred = DeferredState::Pending;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::Tag;

    fn identity(class: &str, title: &str) -> Identity {
        Identity {
            class: class.to_string(),
            instance: class.to_lowercase(),
            role: String::new(),
            title: title.to_string(),
        }
    }

    fn engine(text: &str) -> RulesEngine {
        let (rules, warnings) = RuleSet::parse(text).unwrap();
        assert!(warnings.is_empty(), "{:?}", warnings);
        RulesEngine::with_rules(rules)
    }

    fn attrs() -> Attributes {
        Attributes::new(Tag::new(1), 0, 1)
    }

    fn run(engine: &RulesEngine, ctx: &MatchContext) -> Attributes {
        let defaults = attrs();
        let mut a = defaults.clone();
        a.deferred = DeferredState::None;
        let eval = engine.evaluate(ctx);
        engine.apply(&eval, &mut a, &defaults);
        a
    }

    #[test]
    fn test_predicate_ops() {
        let id = identity("Firefox", "Mozilla Firefox");
        let ctx = MatchContext::new(&id);
        let pred = |field, op, negated, values: &[&str]| Predicate {
            subject: Subject::Client,
            field,
            op,
            negated,
            values: values.iter().map(|s| s.to_string()).collect(),
        };
        assert!(pred(Field::Class, MatchOp::Is, false, &["Firefox"]).matches(&ctx));
        assert!(pred(Field::Title, MatchOp::Begins, false, &["Chrome", "Mozilla"]).matches(&ctx));
        assert!(pred(Field::Title, MatchOp::Ends, false, &["fox"]).matches(&ctx));
        assert!(!pred(Field::Title, MatchOp::Contains, true, &["zilla"]).matches(&ctx));
        assert!(pred(Field::Class, MatchOp::Is, true, &["Chrome", "Opera"]).matches(&ctx));
        assert!(pred(Field::Role, MatchOp::Is, false, &[""]).matches(&ctx));
    }

    #[test]
    fn test_missing_parent_matches_only_negated() {
        let id = identity("Dialog", "Save");
        let ctx = MatchContext::new(&id);
        let mut pred = Predicate {
            subject: Subject::Parent,
            field: Field::Title,
            op: MatchOp::Contains,
            negated: false,
            values: vec!["Editor".to_string()],
        };
        assert!(!pred.matches(&ctx));
        pred.negated = true;
        assert!(pred.matches(&ctx));
    }

    #[test]
    fn test_exclusive_rule_precedence() {
        let orders = [
            r#"[{"if-class-is": "Foo", "set-sticky": true},
                {"if-class-is": "Foo", "exclusive": true, "set-floating": true},
                {"if-class-is": "Foo", "set-urgent": true}]"#,
            r#"[{"if-class-is": "Foo", "exclusive": true, "set-floating": true},
                {"if-class-is": "Foo", "set-sticky": true},
                {"if-class-is": "Foo", "set-urgent": true}]"#,
            r#"[{"if-class-is": "Foo", "set-sticky": true},
                {"if-class-is": "Foo", "set-urgent": true},
                {"if-class-is": "Foo", "exclusive": true, "set-floating": true}]"#,
        ];
        let id = identity("Foo", "foo");
        for text in orders {
            let e = engine(text);
            let a = run(&e, &MatchContext::new(&id));
            assert!(a.floating);
            assert!(!a.sticky);
            assert!(!a.urgent);
        }
    }

    #[test]
    fn test_non_exclusive_rules_combine_later_wins() {
        let e = engine(
            r#"[{"if-class-is": "Foo", "set-tag": 2, "set-sticky": true},
                {"if-title-contains": "foo", "set-tag": 5}]"#,
        );
        let id = identity("Foo", "a foo window");
        let a = run(&e, &MatchContext::new(&id));
        assert_eq!(a.tags, Tag::new(5));
        assert!(a.sticky);
    }

    #[test]
    fn test_applying_twice_is_idempotent() {
        let e = engine(
            r#"[{"if-class-is": "Foo", "set-tag": 3, "set-border": 4},
                {"if-class-is": "Foo", "defer": true, "if-title-is": "Ready", "set-urgent": true},
                {"if-title-begins": "f", "set-pretend-fullscreen": true},
                {"if-class-is": "Foo", "exclusive": true, "set-size-factor": 2.0, "set-x": 30}]"#,
        );
        let id = identity("Foo", "foo");
        let ctx = MatchContext::new(&id);
        let defaults = attrs();
        let mut a = defaults.clone();

        let first = e.evaluate(&ctx);
        e.apply(&first, &mut a, &defaults);
        let after_first = a.clone();

        a.deferred = DeferredState::None;
        let second = e.evaluate(&ctx);
        e.apply(&second, &mut a, &defaults);
        assert_eq!(first, second);
        assert_eq!(a, after_first);
        assert_eq!(a.size_factor, 2.0);
        assert_eq!(a.deferred, DeferredState::Pending);
    }

    #[test]
    fn test_rules_without_identity_predicates_do_not_participate() {
        let e = engine(
            r#"[{"if-focused-class-is": "Foo", "set-sticky": true},
                {"if-parent-class-is": "Foo", "set-urgent": true},
                {"if-parent-title-is": "Main", "set-floating": true}]"#,
        );
        let child = identity("Child", "c");
        let parent = identity("Foo", "Main");
        let ctx = MatchContext {
            client: &child,
            parent: Some(&parent),
            focused: Some(&parent),
            previous_title: None,
        };
        let eval = e.evaluate(&ctx);
        assert_eq!(eval.matched, vec![2]);
    }

    #[test]
    fn test_defer_arms_then_matches_on_title_change() {
        let e = engine(
            r#"[{"if-class-is": "Steam", "if-title-is": "Steam", "if-title-was": "",
                 "defer": true, "set-tag": 4}]"#,
        );
        let before = identity("Steam", "");
        let first = e.evaluate(&MatchContext::new(&before));
        assert!(first.matched.is_empty());
        assert_eq!(first.armed, vec![0]);

        let after = identity("Steam", "Steam");
        let ctx = MatchContext {
            previous_title: Some(""),
            ..MatchContext::new(&after)
        };
        let retry = e.evaluate_deferred(&ctx, &first.armed);
        assert_eq!(retry.matched, vec![0]);
        assert!(retry.armed.is_empty());

        // Wrong previous title keeps it armed.
        let ctx = MatchContext {
            previous_title: Some("Loading"),
            ..MatchContext::new(&after)
        };
        let retry = e.evaluate_deferred(&ctx, &first.armed);
        assert!(retry.matched.is_empty());
        assert_eq!(retry.armed, vec![0]);
    }

    #[test]
    fn test_defer_title_was_only_rule_is_armed() {
        let e = engine(r#"[{"if-title-was": "Loading", "defer": true, "set-tag": 4}]"#);
        let before = identity("Steam", "Loading");
        let first = e.evaluate(&MatchContext::new(&before));
        assert!(first.matched.is_empty());
        assert_eq!(first.armed, vec![0]);

        let after = identity("Steam", "Steam");
        let ctx = MatchContext {
            previous_title: Some("Loading"),
            ..MatchContext::new(&after)
        };
        let retry = e.evaluate_deferred(&ctx, &first.armed);
        assert_eq!(retry.matched, vec![0]);
        assert!(retry.armed.is_empty());
    }

    #[test]
    fn test_title_was_only_rule_without_defer_is_not_armed() {
        let e = engine(r#"[{"if-title-was": "Loading", "set-tag": 4}]"#);
        let id = identity("Steam", "Loading");
        let first = e.evaluate(&MatchContext::new(&id));
        assert!(first.matched.is_empty());
        assert!(first.armed.is_empty());
    }

    #[test]
    fn test_title_was_never_matches_on_first_pass() {
        let e = engine(r#"[{"if-class-is": "A", "if-title-was-not": "x", "set-sticky": true}]"#);
        let id = identity("A", "y");
        let ctx = MatchContext {
            previous_title: Some("z"),
            ..MatchContext::new(&id)
        };
        assert!(!e.evaluate(&ctx).is_match());
        assert!(e.evaluate_deferred(&ctx, &[0]).is_match());
    }

    #[test]
    fn test_pretend_fullscreen_off_leaves_real_fullscreen() {
        let mut a = attrs();
        a.fullscreen = FullscreenState::Real;
        apply_actions(&mut a, &[Action::Flag(Flag::PretendFullscreen, false)]);
        assert_eq!(a.fullscreen, FullscreenState::Real);
        apply_actions(&mut a, &[Action::Flag(Flag::PretendFullscreen, true)]);
        assert_eq!(a.fullscreen, FullscreenState::Pretend);
    }

    #[test]
    fn test_pending_records() {
        let mut e = RulesEngine::new();
        let id = ClientId {
            index: 3,
            generation: 1,
        };
        e.set_pending(id, vec![0, 2]);
        assert_eq!(e.pending(id), Some(&[0, 2][..]));
        e.set_pending(id, vec![]);
        assert!(!e.has_pending(id));
        e.set_pending(id, vec![1]);
        e.replace(RuleSet::default());
        assert!(!e.has_pending(id));
    }
}
