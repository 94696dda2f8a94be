//! Rule-table assembly.
//!
//! A [`HighlightRules`] is a tokenizer rule table still under construction: states may include
//! other states, tables can be merged or embedded under a state prefix, and default tokens can
//! be filled in. [`HighlightRules::build`] flattens it into a
//! [`RuleTable`](edit_session::RuleTable) and compiles the tokenizer.

use crate::error::ModeError;
use edit_session::tokenizer::START_STATE;
use edit_session::{NextState, Rule, RuleTable, TokenOutput, Tokenizer};
use std::collections::{BTreeMap, HashMap, HashSet};

/// One entry of a state under construction.
#[derive(Debug, Clone)]
pub enum RuleEntry {
    /// A concrete rule.
    Rule(Rule),
    /// The rules of another state, spliced in place.
    Include {
        /// Name of the included state.
        state: String,
        /// Skip the included rules that change state.
        no_escape: bool,
    },
}

impl From<Rule> for RuleEntry {
    fn from(rule: Rule) -> Self {
        RuleEntry::Rule(rule)
    }
}

impl RuleEntry {
    /// Include every rule of `state`.
    pub fn include(state: impl Into<String>) -> Self {
        RuleEntry::Include {
            state: state.into(),
            no_escape: false,
        }
    }

    /// Include the rules of `state` that keep the current state.
    pub fn include_no_escape(state: impl Into<String>) -> Self {
        RuleEntry::Include {
            state: state.into(),
            no_escape: true,
        }
    }
}

/// A rule table under construction.
#[derive(Debug, Clone, Default)]
pub struct HighlightRules {
    states: BTreeMap<String, Vec<RuleEntry>>,
    embeds: Vec<String>,
}

impl HighlightRules {
    /// An empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// The plain-text table: empty lines are `empty_line`, everything else `text`.
    pub fn text() -> Self {
        let mut rules = Self::new();
        rules.add_state(
            START_STATE,
            vec![
                Rule::new("^$", "empty_line").into(),
                Rule::default_token("text").into(),
            ],
        );
        rules
    }

    /// Define (or replace) a state.
    pub fn add_state(&mut self, name: impl Into<String>, entries: Vec<RuleEntry>) -> &mut Self {
        self.states.insert(name.into(), entries);
        self
    }

    /// Entries of `name`, if defined.
    pub fn state(&self, name: &str) -> Option<&[RuleEntry]> {
        self.states.get(name).map(Vec::as_slice)
    }

    /// Names of every defined state.
    pub fn state_names(&self) -> impl Iterator<Item = &str> {
        self.states.keys().map(String::as_str)
    }

    /// Prefixes of the tables embedded with [`HighlightRules::embed_rules`].
    pub fn embeds(&self) -> &[String] {
        &self.embeds
    }

    /// Merge the states of `other` into this table.
    ///
    /// With a prefix, every state of `other` is renamed to `prefix + name`, and so are the
    /// targets of its named and pushed transitions and its includes. Computed transitions are
    /// left alone.
    pub fn add_rules(&mut self, other: HighlightRules, prefix: Option<&str>) -> &mut Self {
        let Some(prefix) = prefix.filter(|p| !p.is_empty()) else {
            self.states.extend(other.states);
            return self;
        };
        for (name, entries) in other.states {
            let entries = entries
                .into_iter()
                .map(|entry| prefix_entry(entry, prefix))
                .collect();
            self.states.insert(format!("{prefix}{name}"), entries);
        }
        self
    }

    /// Embed `other` under `prefix`.
    ///
    /// `escape` rules are copied into the embedded states (`states`, or all of them) so the
    /// embedded language can hand control back. They go in front of the existing rules unless
    /// `append` is set.
    pub fn embed_rules(
        &mut self,
        other: HighlightRules,
        prefix: &str,
        escape: &[Rule],
        states: Option<&[&str]>,
        append: bool,
    ) -> &mut Self {
        let targets: Vec<String> = match states {
            Some(states) => states.iter().map(|s| format!("{prefix}{s}")).collect(),
            None => other.states.keys().map(|s| format!("{prefix}{s}")).collect(),
        };
        self.add_rules(other, Some(prefix));

        if !escape.is_empty() {
            for target in &targets {
                let Some(entries) = self.states.get_mut(target) else {
                    tracing::warn!(state = %target, "embed target state doesn't exist");
                    continue;
                };
                let copies = escape.iter().cloned().map(RuleEntry::Rule);
                if append {
                    entries.extend(copies);
                } else {
                    entries.splice(0..0, copies);
                }
            }
        }
        self.embeds.push(prefix.to_string());
        self
    }

    /// Give every state that has no default token the default `token`.
    pub fn with_default_token(&mut self, token: &str) -> &mut Self {
        for entries in self.states.values_mut() {
            let has_default = entries
                .iter()
                .any(|e| matches!(e, RuleEntry::Rule(rule) if rule.default_token.is_some()));
            if !has_default {
                entries.push(Rule::default_token(token).into());
            }
        }
        self
    }

    /// Flatten includes into a plain rule table.
    pub fn normalize(&self) -> Result<RuleTable, ModeError> {
        let mut table = HashMap::with_capacity(self.states.len());
        for name in self.states.keys() {
            let mut out = Vec::new();
            let mut visiting = HashSet::new();
            self.flatten_state(name, false, &mut out, &mut visiting)?;
            table.insert(name.clone(), out);
        }
        Ok(table)
    }

    fn flatten_state(
        &self,
        name: &str,
        no_escape: bool,
        out: &mut Vec<Rule>,
        visiting: &mut HashSet<String>,
    ) -> Result<(), ModeError> {
        let entries = self
            .states
            .get(name)
            .ok_or_else(|| ModeError::UnknownInclude(name.to_string()))?;
        if !visiting.insert(name.to_string()) {
            return Err(ModeError::IncludeCycle(name.to_string()));
        }
        for entry in entries {
            match entry {
                RuleEntry::Rule(rule) if no_escape && rule.next.is_some() => {}
                RuleEntry::Rule(rule) => out.push(rule.clone()),
                RuleEntry::Include {
                    state,
                    no_escape: inner,
                } => self.flatten_state(state, no_escape || *inner, out, visiting)?,
            }
        }
        visiting.remove(name);
        Ok(())
    }

    /// Normalise and compile.
    pub fn build(&self) -> Result<Tokenizer, ModeError> {
        let table = self.normalize()?;
        tracing::debug!(states = table.len(), embeds = self.embeds.len(), "building tokenizer");
        Ok(Tokenizer::new(table)?)
    }
}

fn prefix_name(name: &str, prefix: &str) -> String {
    if name.starts_with(prefix) {
        name.to_string()
    } else {
        format!("{prefix}{name}")
    }
}

fn prefix_entry(entry: RuleEntry, prefix: &str) -> RuleEntry {
    match entry {
        RuleEntry::Rule(mut rule) => {
            rule.next = match rule.next {
                Some(NextState::State(next)) => Some(NextState::State(prefix_name(&next, prefix))),
                Some(NextState::Push(next)) => Some(NextState::Push(prefix_name(&next, prefix))),
                other => other,
            };
            RuleEntry::Rule(rule)
        }
        RuleEntry::Include { state, no_escape } => RuleEntry::Include {
            state: prefix_name(&state, prefix),
            no_escape,
        },
    }
}

/// Maps words to token types, falling back to a default type.
#[derive(Debug, Clone)]
pub struct KeywordMapper {
    keywords: HashMap<String, String>,
    default_token: String,
    ignore_case: bool,
}

impl KeywordMapper {
    /// Build from `(token type, "word|word|...")` pairs.
    pub fn new(groups: &[(&str, &str)], default_token: &str, ignore_case: bool) -> Self {
        let mut keywords = HashMap::new();
        for (token, words) in groups {
            for word in words.split('|').filter(|w| !w.is_empty()) {
                let word = if ignore_case {
                    word.to_lowercase()
                } else {
                    word.to_string()
                };
                keywords.insert(word, token.to_string());
            }
        }
        Self {
            keywords,
            default_token: default_token.to_string(),
            ignore_case,
        }
    }

    /// Token type of `word`.
    pub fn token_for(&self, word: &str) -> &str {
        let found = if self.ignore_case {
            self.keywords.get(&word.to_lowercase())
        } else {
            self.keywords.get(word)
        };
        found.map_or(self.default_token.as_str(), String::as_str)
    }

    /// A rule that classifies each match of `regex` through this mapper.
    pub fn rule(self, regex: &str) -> Rule {
        Rule::new(regex, self.default_token.as_str())
            .on_match(move |value, _, _| TokenOutput::Kind(self.token_for(value).to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use edit_session::{Token, TokenizerState};
    use pretty_assertions::assert_eq;

    fn kinds(tokenizer: &Tokenizer, line: &str, state: Option<&TokenizerState>) -> Vec<String> {
        tokenizer
            .get_line_tokens(line, state)
            .tokens
            .into_iter()
            .map(|t| t.kind)
            .collect()
    }

    #[test]
    fn test_text_rules_make_single_token() {
        let tokenizer = HighlightRules::text().build().unwrap();
        let line = tokenizer.get_line_tokens("just words", None);
        assert_eq!(line.tokens, vec![Token::new("text", "just words")]);
    }

    #[test]
    fn test_include_splices_rules() {
        let mut rules = HighlightRules::new();
        rules
            .add_state("numbers", vec![Rule::new(r"\d+", "constant.numeric").into()])
            .add_state(
                "start",
                vec![
                    RuleEntry::include("numbers"),
                    Rule::new(r"[a-z]+", "identifier").into(),
                ],
            );
        let tokenizer = rules.build().unwrap();
        assert_eq!(
            kinds(&tokenizer, "abc 12", None),
            vec!["identifier", "text", "constant.numeric"]
        );
    }

    #[test]
    fn test_include_no_escape_drops_transitions() {
        let mut rules = HighlightRules::new();
        rules
            .add_state(
                "common",
                vec![
                    Rule::new(r"\d+", "number").into(),
                    Rule::new(r#"""#, "string").next("string").into(),
                ],
            )
            .add_state("start", vec![RuleEntry::include_no_escape("common")])
            .add_state("string", vec![Rule::new(r#"""#, "string").next("start").into()]);
        let table = rules.normalize().unwrap();
        assert_eq!(table["start"].len(), 1);
        assert_eq!(table["start"][0].regex.as_deref(), Some(r"\d+"));
    }

    #[test]
    fn test_include_errors() {
        let mut rules = HighlightRules::new();
        rules.add_state("start", vec![RuleEntry::include("missing")]);
        assert!(matches!(rules.normalize(), Err(ModeError::UnknownInclude(s)) if s == "missing"));

        let mut rules = HighlightRules::new();
        rules
            .add_state("start", vec![RuleEntry::include("a")])
            .add_state("a", vec![RuleEntry::include("start")]);
        assert!(matches!(rules.normalize(), Err(ModeError::IncludeCycle(_))));
    }

    #[test]
    fn test_embed_prefixes_and_escapes() {
        let mut inner = HighlightRules::new();
        inner
            .add_state(
                "start",
                vec![Rule::new(r"'", "string").push("qstring").into()],
            )
            .add_state("qstring", vec![Rule::new(r"'", "string").pop().into()]);

        let mut outer = HighlightRules::new();
        outer.add_state(
            "start",
            vec![
                Rule::new(r"<%", "meta.tag").next("js-start").into(),
                Rule::default_token("text").into(),
            ],
        );
        outer.embed_rules(
            inner,
            "js-",
            &[Rule::new(r"%>", "meta.tag").next("start")],
            None,
            false,
        );

        assert_eq!(outer.embeds(), ["js-".to_string()]);
        let names: Vec<_> = outer.state_names().collect();
        assert_eq!(names, vec!["js-qstring", "js-start", "start"]);

        let table = outer.normalize().unwrap();
        // escape rule first, then the prefixed push
        assert_eq!(table["js-start"][0].regex.as_deref(), Some("%>"));
        assert!(matches!(&table["js-start"][1].next, Some(NextState::Push(s)) if s == "js-qstring"));

        let tokenizer = outer.build().unwrap();
        let first = tokenizer.get_line_tokens("a <% 'x", None);
        assert_eq!(first.state.current(), "js-qstring");
        let second = tokenizer.get_line_tokens("' %> b", Some(&first.state));
        assert_eq!(second.state.current(), "start");
    }

    #[test]
    fn test_default_token_fills_missing() {
        let mut rules = HighlightRules::new();
        rules
            .add_state("start", vec![Rule::new(r"#.*", "comment").into()])
            .add_state(
                "other",
                vec![Rule::default_token("string").into()],
            );
        rules.with_default_token("plain");
        let tokenizer = rules.build().unwrap();
        assert_eq!(kinds(&tokenizer, "x #y", None), vec!["plain", "comment"]);
        let table = rules.normalize().unwrap();
        assert_eq!(table["other"].len(), 1);
    }

    #[test]
    fn test_keyword_mapper() {
        let mapper = KeywordMapper::new(
            &[("keyword", "if|else|while"), ("constant.language", "true|false")],
            "identifier",
            true,
        );
        assert_eq!(mapper.token_for("IF"), "keyword");
        assert_eq!(mapper.token_for("false"), "constant.language");
        assert_eq!(mapper.token_for("foo"), "identifier");

        let mut rules = HighlightRules::new();
        rules.add_state("start", vec![mapper.rule(r"[A-Za-z]+").into()]);
        let tokenizer = rules.build().unwrap();
        assert_eq!(
            kinds(&tokenizer, "while x", None),
            vec!["keyword", "text", "identifier"]
        );
    }
}
