//! The rules document: an ordered list of match predicates and mutations.

use std::path::Path;

use anyhow::{Context, Result};
use serde_json::{Map, Value};

use super::config::{bool_value, float_value, int_value, uint_value, ConfigError};
use super::{Tag, MAX_TAGS};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Field {
    Class,
    Instance,
    Role,
    Title,
}

impl Field {
    const ALL: [(&'static str, Field); 4] = [
        ("class", Field::Class),
        ("instance", Field::Instance),
        ("role", Field::Role),
        ("title", Field::Title),
    ];
}

/// Whose identity a predicate inspects.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Subject {
    Client,
    Parent,
    Focused,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchOp {
    Is,
    Contains,
    Begins,
    Ends,
}

const OPS: [(&str, MatchOp, bool); 8] = [
    ("is", MatchOp::Is, false),
    ("is-not", MatchOp::Is, true),
    ("contains", MatchOp::Contains, false),
    ("not-contains", MatchOp::Contains, true),
    ("begins", MatchOp::Begins, false),
    ("not-begins", MatchOp::Begins, true),
    ("ends", MatchOp::Ends, false),
    ("not-ends", MatchOp::Ends, true),
];

/// One match condition. Holds when any value matches; a negated predicate
/// holds when none does.
#[derive(Debug, Clone, PartialEq)]
pub struct Predicate {
    pub subject: Subject,
    pub field: Field,
    pub op: MatchOp,
    pub negated: bool,
    pub values: Vec<String>,
}

/// Predicates over a single identity, used to pick a parent.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Pattern {
    pub predicates: Vec<Predicate>,
}

/// Condition on the title a client had before its latest title change.
#[derive(Debug, Clone, PartialEq)]
pub struct TitleWas {
    pub negated: bool,
    pub values: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flag {
    Floating,
    Sticky,
    Urgent,
    Fullscreen,
    PretendFullscreen,
    Hidden,
    Ignore,
    AlwaysOnTop,
    Modal,
    Autofocus,
    NeverFocus,
    Center,
    Terminal,
    NoSwallow,
    Game,
    Desktop,
    OnDesktop,
}

impl Flag {
    pub const ALL: [Flag; 17] = [
        Flag::Floating,
        Flag::Sticky,
        Flag::Urgent,
        Flag::Fullscreen,
        Flag::PretendFullscreen,
        Flag::Hidden,
        Flag::Ignore,
        Flag::AlwaysOnTop,
        Flag::Modal,
        Flag::Autofocus,
        Flag::NeverFocus,
        Flag::Center,
        Flag::Terminal,
        Flag::NoSwallow,
        Flag::Game,
        Flag::Desktop,
        Flag::OnDesktop,
    ];

    pub fn key(self) -> &'static str {
        match self {
            Flag::Floating => "set-floating",
            Flag::Sticky => "set-sticky",
            Flag::Urgent => "set-urgent",
            Flag::Fullscreen => "set-fullscreen",
            Flag::PretendFullscreen => "set-pretend-fullscreen",
            Flag::Hidden => "set-hidden",
            Flag::Ignore => "set-ignore",
            Flag::AlwaysOnTop => "set-always-on-top",
            Flag::Modal => "set-modal",
            Flag::Autofocus => "set-autofocus",
            Flag::NeverFocus => "set-never-focus",
            Flag::Center => "set-center",
            Flag::Terminal => "set-terminal",
            Flag::NoSwallow => "set-no-swallow",
            Flag::Game => "set-game",
            Flag::Desktop => "set-desktop",
            Flag::OnDesktop => "set-on-desktop",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Action {
    Flag(Flag, bool),
    Tags(Tag),
    Monitor(usize),
    Border(u32),
    X(i32),
    Y(i32),
    Width(u32),
    Height(u32),
    SizeFactor(f32),
    /// The parent of this client is the registered client matching the pattern.
    Parent(Pattern),
    /// The parent of the registered client matching `child` is the one
    /// matching `parent`.
    ParentOf { child: Pattern, parent: Pattern },
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct Rule {
    pub predicates: Vec<Predicate>,
    pub title_was: Vec<TitleWas>,
    pub actions: Vec<Action>,
    pub exclusive: bool,
    pub defer: bool,
}

/// Parsed rules, exclusive ones stably moved after all others.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct RuleSet {
    rules: Vec<Rule>,
}

impl RuleSet {
    pub fn new(mut rules: Vec<Rule>) -> Self {
        rules.sort_by_key(|r| r.exclusive);
        Self { rules }
    }

    pub fn rules(&self) -> &[Rule] {
        &self.rules
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&Rule> {
        self.rules.get(index)
    }

    /// Parse a rules document. Only a document that is not JSON, or whose
    /// top level is neither `{"rules": [...]}` nor an array, is an error;
    /// every other problem becomes a warning.
    pub fn parse(text: &str) -> Result<(RuleSet, Vec<ConfigError>), ConfigError> {
        let value: Value =
            serde_json::from_str(text).map_err(|e| ConfigError::Malformed(e.to_string()))?;
        let mut warnings = Vec::new();
        let list = match &value {
            Value::Array(list) => list,
            Value::Object(root) => {
                for key in root.keys() {
                    if key != "rules" && key != "comment" {
                        warnings.push(ConfigError::UnknownKey(key.clone()));
                    }
                }
                match root.get("rules") {
                    Some(Value::Array(list)) => list,
                    Some(_) => {
                        return Err(ConfigError::Malformed("\"rules\" must be an array".to_string()))
                    }
                    None => return Ok((RuleSet::default(), warnings)),
                }
            }
            _ => {
                return Err(ConfigError::Malformed(
                    "rules document must be an object or an array".to_string(),
                ))
            }
        };

        let mut rules = Vec::with_capacity(list.len());
        for (i, entry) in list.iter().enumerate() {
            let path = format!("rules[{}]", i);
            match entry.as_object() {
                Some(obj) => rules.push(parse_rule(obj, &path, &mut warnings)),
                None => warnings.push(ConfigError::WrongType {
                    key: path,
                    expected: "object",
                }),
            }
        }
        Ok((RuleSet::new(rules), warnings))
    }

    /// Read the document at `path`. A missing file yields no rules.
    pub fn load(path: &Path) -> Result<(RuleSet, Vec<ConfigError>)> {
        if !path.exists() {
            tracing::info!("No rules file at {:?}", path);
            return Ok((RuleSet::default(), vec![]));
        }
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read rules file {:?}", path))?;
        let parsed = Self::parse(&text).with_context(|| format!("Invalid rules file {:?}", path))?;
        Ok(parsed)
    }
}

fn parse_rule(obj: &Map<String, Value>, path: &str, warnings: &mut Vec<ConfigError>) -> Rule {
    let mut rule = Rule::default();
    for (key, value) in obj {
        let full = format!("{}.{}", path, key);
        if let Some(pred) = key.strip_prefix("if-") {
            parse_condition(&mut rule, pred, value, &full, warnings);
            continue;
        }
        match key.as_str() {
            "exclusive" => {
                if let Some(b) = bool_value(value, &full, warnings) {
                    rule.exclusive = b;
                }
            }
            "defer" => {
                if let Some(b) = bool_value(value, &full, warnings) {
                    rule.defer = b;
                }
            }
            "comment" => {}
            _ => {
                if let Some(action) = parse_action(key, value, &full, warnings) {
                    rule.actions.push(action);
                }
            }
        }
    }
    if rule.predicates.is_empty() && rule.title_was.is_empty() {
        warnings.push(ConfigError::InvalidValue {
            key: path.to_string(),
            message: "rule has no match predicates and will never apply".to_string(),
        });
    }
    rule
}

fn parse_condition(
    rule: &mut Rule,
    key: &str,
    value: &Value,
    full: &str,
    warnings: &mut Vec<ConfigError>,
) {
    let title_was = match key {
        "title-was" => Some(false),
        "title-was-not" => Some(true),
        _ => None,
    };
    if let Some(negated) = title_was {
        if let Some(values) = string_values(value, full, warnings) {
            rule.title_was.push(TitleWas { negated, values });
        }
        return;
    }
    let (subject, rest) = if let Some(rest) = key.strip_prefix("parent-") {
        (Subject::Parent, rest)
    } else if let Some(rest) = key.strip_prefix("focused-") {
        (Subject::Focused, rest)
    } else {
        (Subject::Client, key)
    };
    match parse_field_op(rest) {
        Some((field, op, negated)) => {
            if let Some(values) = string_values(value, full, warnings) {
                rule.predicates.push(Predicate {
                    subject,
                    field,
                    op,
                    negated,
                    values,
                });
            }
        }
        None => warnings.push(ConfigError::UnknownKey(full.to_string())),
    }
}

fn parse_field_op(key: &str) -> Option<(Field, MatchOp, bool)> {
    Field::ALL.iter().find_map(|(name, field)| {
        let op = key.strip_prefix(name)?.strip_prefix('-')?;
        OPS.iter()
            .find(|(op_name, _, _)| *op_name == op)
            .map(|(_, op, negated)| (*field, *op, *negated))
    })
}

fn string_values(value: &Value, key: &str, warnings: &mut Vec<ConfigError>) -> Option<Vec<String>> {
    let values = match value {
        Value::String(s) => Some(vec![s.clone()]),
        Value::Array(items) if !items.is_empty() => items
            .iter()
            .map(|v| v.as_str().map(str::to_string))
            .collect::<Option<Vec<_>>>(),
        _ => None,
    };
    if values.is_none() {
        warnings.push(ConfigError::WrongType {
            key: key.to_string(),
            expected: "string or non-empty array of strings",
        });
    }
    values
}

fn parse_pattern(value: &Value, key: &str, warnings: &mut Vec<ConfigError>) -> Option<Pattern> {
    let Some(obj) = value.as_object() else {
        warnings.push(ConfigError::WrongType {
            key: key.to_string(),
            expected: "pattern object",
        });
        return None;
    };
    let mut pattern = Pattern::default();
    for (k, v) in obj {
        let full = format!("{}.{}", key, k);
        match parse_field_op(k) {
            Some((field, op, negated)) => {
                if let Some(values) = string_values(v, &full, warnings) {
                    pattern.predicates.push(Predicate {
                        subject: Subject::Client,
                        field,
                        op,
                        negated,
                        values,
                    });
                }
            }
            None => warnings.push(ConfigError::UnknownKey(full)),
        }
    }
    if pattern.predicates.is_empty() {
        warnings.push(ConfigError::InvalidValue {
            key: key.to_string(),
            message: "empty pattern".to_string(),
        });
        return None;
    }
    Some(pattern)
}

fn parse_action(
    key: &str,
    value: &Value,
    full: &str,
    warnings: &mut Vec<ConfigError>,
) -> Option<Action> {
    if let Some(flag) = Flag::ALL.into_iter().find(|f| f.key() == key) {
        return bool_value(value, full, warnings).map(|b| Action::Flag(flag, b));
    }
    let invalid = |warnings: &mut Vec<ConfigError>, message: &str| {
        warnings.push(ConfigError::InvalidValue {
            key: full.to_string(),
            message: message.to_string(),
        });
        None
    };
    match key {
        "set-tags" => {
            let mask = uint_value(value, full, warnings)?;
            let tags = Tag::from_mask(mask);
            if tags.is_empty() {
                return invalid(warnings, "tag mask must select at least one tag");
            }
            Some(Action::Tags(tags))
        }
        "set-tag" => {
            let n = uint_value(value, full, warnings)?;
            if n == 0 || n > MAX_TAGS {
                return invalid(warnings, "tag number out of range");
            }
            Some(Action::Tags(Tag::new(n)))
        }
        "set-monitor" => uint_value(value, full, warnings).map(|n| Action::Monitor(n as usize)),
        "set-border" => uint_value(value, full, warnings).map(Action::Border),
        "set-x" => int_value(value, full, warnings).map(Action::X),
        "set-y" => int_value(value, full, warnings).map(Action::Y),
        "set-w" | "set-h" => {
            let n = uint_value(value, full, warnings)?;
            if n == 0 {
                return invalid(warnings, "size must be positive");
            }
            Some(if key == "set-w" {
                Action::Width(n)
            } else {
                Action::Height(n)
            })
        }
        "set-size-factor" => {
            let f = float_value(value, full, warnings)?;
            if f <= 0.0 {
                return invalid(warnings, "size factor must be positive");
            }
            Some(Action::SizeFactor(f))
        }
        "set-parent" => parse_pattern(value, full, warnings).map(Action::Parent),
        "set-parent-of" => {
            let Some(obj) = value.as_object() else {
                warnings.push(ConfigError::WrongType {
                    key: full.to_string(),
                    expected: "object with \"child\" and \"parent\"",
                });
                return None;
            };
            let (Some(child), Some(parent)) = (obj.get("child"), obj.get("parent")) else {
                return invalid(warnings, "needs both \"child\" and \"parent\"");
            };
            let child = parse_pattern(child, &format!("{}.child", full), warnings);
            let parent = parse_pattern(parent, &format!("{}.parent", full), warnings);
            Some(Action::ParentOf {
                child: child?,
                parent: parent?,
            })
        }
        _ => {
            warnings.push(ConfigError::UnknownKey(full.to_string()));
            None
        }
    }
}

/// Every key the rules document recognises, for `--print-keys`.
pub fn rule_keys() -> Vec<String> {
    let mut keys = Vec::new();
    for subject in ["", "parent-", "focused-"] {
        for (field, _) in Field::ALL {
            for (op, _, _) in OPS {
                keys.push(format!("if-{}{}-{}", subject, field, op));
            }
        }
    }
    keys.push("if-title-was".to_string());
    keys.push("if-title-was-not".to_string());
    keys.extend(Flag::ALL.iter().map(|f| f.key().to_string()));
    for key in [
        "set-tags",
        "set-tag",
        "set-monitor",
        "set-border",
        "set-x",
        "set-y",
        "set-w",
        "set-h",
        "set-size-factor",
        "set-parent",
        "set-parent-of",
        "exclusive",
        "defer",
        "comment",
    ] {
        keys.push(key.to_string());
    }
    keys
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(text: &str) -> (RuleSet, Vec<ConfigError>) {
        RuleSet::parse(text).unwrap()
    }

    #[test]
    fn test_parse_predicates_and_actions() {
        let (set, warnings) = parse(
            r#"{"rules": [{
                "if-class-is": "Firefox",
                "if-parent-title-not-contains": ["Save", "Open"],
                "set-tag": 3,
                "set-floating": true,
                "set-size-factor": 1.5
            }]}"#,
        );
        assert!(warnings.is_empty(), "{:?}", warnings);
        let rule = &set.rules()[0];
        assert_eq!(
            rule.predicates[0],
            Predicate {
                subject: Subject::Client,
                field: Field::Class,
                op: MatchOp::Is,
                negated: false,
                values: vec!["Firefox".to_string()],
            }
        );
        assert_eq!(rule.predicates[1].subject, Subject::Parent);
        assert_eq!(rule.predicates[1].op, MatchOp::Contains);
        assert!(rule.predicates[1].negated);
        assert_eq!(
            rule.actions,
            vec![
                Action::Tags(Tag::new(3)),
                Action::Flag(Flag::Floating, true),
                Action::SizeFactor(1.5),
            ]
        );
    }

    #[test]
    fn test_bare_array_is_accepted() {
        let (set, warnings) = parse(r#"[{"if-instance-begins": "steam", "set-game": true}]"#);
        assert!(warnings.is_empty());
        assert_eq!(set.len(), 1);
    }

    #[test]
    fn test_exclusive_rules_sort_last_stably() {
        let (set, _) = parse(
            r#"[
                {"if-class-is": "A", "exclusive": true, "set-tag": 1},
                {"if-class-is": "B", "set-tag": 2},
                {"if-class-is": "C", "exclusive": true, "set-tag": 3},
                {"if-class-is": "D", "set-tag": 4}
            ]"#,
        );
        let classes: Vec<&str> = set
            .rules()
            .iter()
            .map(|r| r.predicates[0].values[0].as_str())
            .collect();
        assert_eq!(classes, vec!["B", "D", "A", "C"]);
    }

    #[test]
    fn test_bad_keys_drop_only_the_key() {
        let (set, warnings) = parse(
            r#"[{
                "if-class-is": "Foo",
                "if-colour-is": "red",
                "set-sticky": "yes",
                "set-tags": 0,
                "set-urgent": true,
                "bogus": 1
            }]"#,
        );
        let rule = &set.rules()[0];
        assert_eq!(rule.predicates.len(), 1);
        assert_eq!(rule.actions, vec![Action::Flag(Flag::Urgent, true)]);
        assert_eq!(warnings.len(), 4);
    }

    #[test]
    fn test_title_was_and_defer() {
        let (set, warnings) = parse(
            r#"[{"if-title-contains": "Steam", "if-title-was-not": "", "defer": true, "set-tag": 9}]"#,
        );
        assert!(warnings.is_empty());
        let rule = &set.rules()[0];
        assert!(rule.defer);
        assert_eq!(
            rule.title_was,
            vec![TitleWas {
                negated: true,
                values: vec![String::new()]
            }]
        );
    }

    #[test]
    fn test_parent_patterns() {
        let (set, warnings) = parse(
            r#"[{
                "if-class-is": "Gimp",
                "set-parent": {"title-begins": "GNU Image"},
                "set-parent-of": {"child": {"class-is": "Toolbox"}, "parent": {"title-is": "Main"}}
            }]"#,
        );
        assert!(warnings.is_empty(), "{:?}", warnings);
        let rule = &set.rules()[0];
        assert!(matches!(&rule.actions[0], Action::Parent(p) if p.predicates[0].op == MatchOp::Begins));
        assert!(matches!(&rule.actions[1], Action::ParentOf { child, .. } if child.predicates[0].field == Field::Class));
    }

    #[test]
    fn test_rule_without_predicates_warns() {
        let (set, warnings) = parse(r#"[{"set-floating": true}]"#);
        assert_eq!(set.len(), 1);
        assert_eq!(warnings.len(), 1);
    }

    #[test]
    fn test_malformed_documents() {
        assert!(RuleSet::parse("{").is_err());
        assert!(RuleSet::parse("42").is_err());
        assert!(RuleSet::parse(r#"{"rules": {}}"#).is_err());
        let (set, warnings) = parse(r#"{"rules": [1, {"if-title-is": "x"}]}"#);
        assert_eq!(set.len(), 1);
        assert_eq!(warnings.len(), 1);
    }

    #[test]
    fn test_rule_keys_cover_grammar() {
        let keys = rule_keys();
        assert!(keys.contains(&"if-focused-role-not-ends".to_string()));
        assert!(keys.contains(&"set-pretend-fullscreen".to_string()));
        assert!(keys.contains(&"set-parent-of".to_string()));
        assert_eq!(keys.iter().filter(|k| k.starts_with("if-")).count(), 98);
    }
}
