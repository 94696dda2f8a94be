//! Rule-table driven line tokenizer.
//!
//! A rule table maps state names to ordered rule lists. Each state is compiled into a single
//! alternation `(rule0)|(rule1)|...|($)` so one regex execution both finds the next match and
//! tells which rule produced it. Capture groups inside a rule are kept and renumbered, which is
//! how array tokens (one token type per capture group) are resolved.
//!
//! Tokenizing is a pure function of `(line, start state)`. The end state of a row is what the
//! next row starts from, either as a plain state name or as a push/pop stack.

use crate::error::{Result, SessionError};
use fancy_regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, LazyLock};

/// Name of the state every line starts from when nothing else is known.
pub const START_STATE: &str = "start";

/// Sentinel stored at the bottom of a state stack whose top is a flat state.
pub const TMP_STATE: &str = "#tmp";

/// Token type used when a line blows past the token ceiling.
pub const OVERFLOW_TOKEN: &str = "overflow";

/// Default token ceiling per line.
pub const DEFAULT_MAX_TOKEN_COUNT: usize = 1000;

/// Default size of the chunks an overflowing line is cut into.
pub const DEFAULT_OVERFLOW_CHUNK: usize = 2000;

/// A classified slice of a line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Token {
    /// Dot-separated classification, e.g. `keyword.operator`.
    #[serde(rename = "type")]
    pub kind: String,
    /// The covered text.
    pub value: String,
}

impl Token {
    /// Create a token.
    pub fn new(kind: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            value: value.into(),
        }
    }
}

/// The state a line ends in.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum TokenizerState {
    /// A flat state name.
    Name(String),
    /// A push/pop stack, innermost state first.
    Stack(Vec<String>),
}

impl Default for TokenizerState {
    fn default() -> Self {
        TokenizerState::Name(START_STATE.to_string())
    }
}

impl TokenizerState {
    /// The state the next line resumes in.
    pub fn current(&self) -> &str {
        match self {
            TokenizerState::Name(name) => name,
            TokenizerState::Stack(stack) => match stack.first().map(String::as_str) {
                Some(TMP_STATE) => stack.get(1).map(String::as_str).unwrap_or(START_STATE),
                Some(top) => top,
                None => START_STATE,
            },
        }
    }
}

impl From<&str> for TokenizerState {
    fn from(name: &str) -> Self {
        TokenizerState::Name(name.to_string())
    }
}

/// What a rule emits.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TokenSpec {
    /// One token type for the whole match.
    Single(String),
    /// One token type per capture group of the rule's regex.
    Multi(Vec<String>),
}

impl From<&str> for TokenSpec {
    fn from(kind: &str) -> Self {
        TokenSpec::Single(kind.to_string())
    }
}

/// Result of an `on_match` callback.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TokenOutput {
    /// A single token type for the match (merged with neighbours like a plain rule).
    Kind(String),
    /// Ready-made tokens, emitted as-is.
    Tokens(Vec<Token>),
    /// Emit nothing for this match.
    Nothing,
}

/// Callback computing the tokens of a match: `(value, current state, stack)`.
pub type OnMatch = Arc<dyn Fn(&str, &str, &mut Vec<String>) -> TokenOutput + Send + Sync>;

/// Callback computing the next state: `(current state, stack) -> next state`.
pub type NextFn = Arc<dyn Fn(&str, &mut Vec<String>) -> String + Send + Sync>;

/// State transition taken after a rule matches.
#[derive(Clone)]
pub enum NextState {
    /// Switch to a named state.
    State(String),
    /// Push a state on the stack.
    Push(String),
    /// Pop the innermost state, falling back to `start`.
    Pop,
    /// Arbitrary transition.
    Custom(NextFn),
}

impl fmt::Debug for NextState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NextState::State(s) => f.debug_tuple("State").field(s).finish(),
            NextState::Push(s) => f.debug_tuple("Push").field(s).finish(),
            NextState::Pop => f.write_str("Pop"),
            NextState::Custom(_) => f.write_str("Custom(..)"),
        }
    }
}

impl NextState {
    fn resolve(&self, current: &str, stack: &mut Vec<String>) -> String {
        match self {
            NextState::State(s) => s.clone(),
            NextState::Push(next) => {
                if current != START_STATE || !stack.is_empty() {
                    stack.insert(0, current.to_string());
                    stack.insert(0, next.clone());
                }
                next.clone()
            }
            NextState::Pop => {
                if !stack.is_empty() {
                    stack.remove(0);
                }
                if stack.is_empty() {
                    START_STATE.to_string()
                } else {
                    stack.remove(0)
                }
            }
            NextState::Custom(f) => f(current, stack),
        }
    }
}

/// One entry of a state's rule list.
#[derive(Clone)]
pub struct Rule {
    /// Pattern (fancy-regex syntax). `None` for rules that only carry `default_token`.
    pub regex: Option<String>,
    /// Token type(s) emitted for a match.
    pub token: TokenSpec,
    /// Transition after a match.
    pub next: Option<NextState>,
    /// Custom token computation, overriding `token`.
    pub on_match: Option<OnMatch>,
    /// `Some(false)` keeps this rule's tokens from merging with an equal-typed predecessor.
    pub merge: Option<bool>,
    /// Token type for text no rule of this state matched.
    pub default_token: Option<String>,
    /// Compile the whole state case-insensitively.
    pub case_insensitive: bool,
}

impl fmt::Debug for Rule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Rule")
            .field("regex", &self.regex)
            .field("token", &self.token)
            .field("next", &self.next)
            .field("on_match", &self.on_match.as_ref().map(|_| ".."))
            .field("merge", &self.merge)
            .field("default_token", &self.default_token)
            .field("case_insensitive", &self.case_insensitive)
            .finish()
    }
}

impl Rule {
    /// A rule emitting `token` for every match of `regex`.
    pub fn new(regex: impl Into<String>, token: impl Into<TokenSpec>) -> Self {
        Self {
            regex: Some(regex.into()),
            token: token.into(),
            next: None,
            on_match: None,
            merge: None,
            default_token: None,
            case_insensitive: false,
        }
    }

    /// A rule emitting one token type per capture group.
    pub fn groups(regex: impl Into<String>, tokens: &[&str]) -> Self {
        Self::new(
            regex,
            TokenSpec::Multi(tokens.iter().map(|t| t.to_string()).collect()),
        )
    }

    /// A pattern-less rule that only sets the state's default token.
    pub fn default_token(token: impl Into<String>) -> Self {
        let mut rule = Self::new(String::new(), TokenSpec::Single(String::new()));
        rule.regex = None;
        rule.default_token = Some(token.into());
        rule
    }

    /// Switch to `state` after a match.
    pub fn next(mut self, state: impl Into<String>) -> Self {
        self.next = Some(NextState::State(state.into()));
        self
    }

    /// Push `state` after a match.
    pub fn push(mut self, state: impl Into<String>) -> Self {
        self.next = Some(NextState::Push(state.into()));
        self
    }

    /// Pop the state stack after a match.
    pub fn pop(mut self) -> Self {
        self.next = Some(NextState::Pop);
        self
    }

    /// Custom transition.
    pub fn next_with<F>(mut self, f: F) -> Self
    where
        F: Fn(&str, &mut Vec<String>) -> String + Send + Sync + 'static,
    {
        self.next = Some(NextState::Custom(Arc::new(f)));
        self
    }

    /// Custom token computation.
    pub fn on_match<F>(mut self, f: F) -> Self
    where
        F: Fn(&str, &str, &mut Vec<String>) -> TokenOutput + Send + Sync + 'static,
    {
        self.on_match = Some(Arc::new(f));
        self
    }

    /// Never merge this rule's token into the previous one.
    pub fn no_merge(mut self) -> Self {
        self.merge = Some(false);
        self
    }

    /// Compile this rule's state case-insensitively.
    pub fn case_insensitive(mut self) -> Self {
        self.case_insensitive = true;
        self
    }
}

/// State name to rule list.
pub type RuleTable = HashMap<String, Vec<Rule>>;

/// Result of tokenizing one line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LineTokens {
    /// Tokens in order; their values concatenate to the line.
    pub tokens: Vec<Token>,
    /// State for the next line.
    pub state: TokenizerState,
}

#[derive(Debug, Clone)]
enum Emit {
    Token(String),
    Array(Vec<String>),
}

#[derive(Debug, Clone)]
struct CompiledRule {
    /// Index of the rule's outer group in the combined regex.
    group: usize,
    /// Number of capture groups inside the rule.
    inner: usize,
    emit: Emit,
    rule: Rule,
}

#[derive(Debug, Clone)]
struct CompiledState {
    /// `None` for states without patterns; the whole rest of the line is the default token.
    regex: Option<Regex>,
    rules: Vec<CompiledRule>,
    default_token: String,
}

static BACKREF: LazyLock<regex::Regex> = LazyLock::new(|| {
    regex::Regex::new(r"\\([0-9]+)").unwrap_or_else(|_| unreachable!("static pattern"))
});

/// A compiled rule table.
#[derive(Clone)]
pub struct Tokenizer {
    states: HashMap<String, CompiledState>,
    max_token_count: usize,
    overflow_chunk: usize,
}

impl fmt::Debug for Tokenizer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut names: Vec<_> = self.states.keys().collect();
        names.sort();
        f.debug_struct("Tokenizer")
            .field("states", &names)
            .field("max_token_count", &self.max_token_count)
            .finish()
    }
}

impl Tokenizer {
    /// Compile a rule table. The table must have a `start` state.
    pub fn new(rules: RuleTable) -> Result<Self> {
        if !rules.contains_key(START_STATE) {
            return Err(SessionError::MissingStartState);
        }
        let mut states = HashMap::with_capacity(rules.len());
        for (name, rules) in rules {
            let compiled = Self::compile_state(&name, rules)?;
            states.insert(name, compiled);
        }
        Ok(Self {
            states,
            max_token_count: DEFAULT_MAX_TOKEN_COUNT,
            overflow_chunk: DEFAULT_OVERFLOW_CHUNK,
        })
    }

    /// A tokenizer with a single pattern-less `start` state: every line is one `text` token.
    pub fn plain() -> Self {
        let start = CompiledState {
            regex: None,
            rules: Vec::new(),
            default_token: "text".to_string(),
        };
        Self {
            states: HashMap::from([(START_STATE.to_string(), start)]),
            max_token_count: DEFAULT_MAX_TOKEN_COUNT,
            overflow_chunk: DEFAULT_OVERFLOW_CHUNK,
        }
    }

    /// Override the per-line token ceiling and overflow chunk size.
    pub fn with_limits(mut self, max_token_count: usize, overflow_chunk: usize) -> Self {
        self.max_token_count = max_token_count;
        self.overflow_chunk = overflow_chunk.max(1);
        self
    }

    /// Tokens per line before the rest of the line becomes overflow tokens.
    pub fn max_token_count(&self) -> usize {
        self.max_token_count
    }

    /// Characters per overflow token.
    pub fn overflow_chunk(&self) -> usize {
        self.overflow_chunk
    }

    /// `true` if the table defines `state`.
    pub fn has_state(&self, state: &str) -> bool {
        self.states.contains_key(state)
    }

    fn compile_state(name: &str, rules: Vec<Rule>) -> Result<CompiledState> {
        let mut default_token = "text".to_string();
        let mut case_insensitive = false;
        let mut sources = Vec::new();
        let mut compiled = Vec::new();
        let mut group = 1;

        for (index, rule) in rules.into_iter().enumerate() {
            if let Some(token) = &rule.default_token {
                default_token = token.clone();
            }
            case_insensitive |= rule.case_insensitive;
            let Some(source) = rule.regex.clone() else {
                continue;
            };

            let inner = Regex::new(&source)?.captures_len() - 1;
            let emit = match &rule.token {
                TokenSpec::Single(kind) => Emit::Token(kind.clone()),
                TokenSpec::Multi(kinds) if kinds.len() == 1 || inner == 0 => {
                    Emit::Token(kinds.first().cloned().unwrap_or_default())
                }
                TokenSpec::Multi(kinds) if kinds.len() != inner => {
                    return Err(SessionError::TokenCountMismatch {
                        state: name.to_string(),
                        rule: index,
                        groups: inner,
                        tokens: kinds.len(),
                    });
                }
                TokenSpec::Multi(kinds) => Emit::Array(kinds.clone()),
            };

            let adjusted = if inner > 0 {
                BACKREF
                    .replace_all(&source, |caps: &regex::Captures<'_>| {
                        let n: usize = caps[1].parse().unwrap_or(0);
                        format!("\\{}", n + group)
                    })
                    .into_owned()
            } else {
                source
            };
            sources.push(format!("({adjusted})"));
            compiled.push(CompiledRule {
                group,
                inner,
                emit,
                rule,
            });
            group += 1 + inner;
        }

        if compiled.is_empty() {
            return Ok(CompiledState {
                regex: None,
                rules: compiled,
                default_token,
            });
        }
        sources.push("($)".to_string());
        let mut pattern = sources.join("|");
        if case_insensitive {
            pattern = format!("(?i){pattern}");
        }
        Ok(CompiledState {
            regex: Some(Regex::new(&pattern)?),
            rules: compiled,
            default_token,
        })
    }

    fn state_or_start<'a>(&'a self, name: &mut String) -> Option<&'a CompiledState> {
        if let Some(state) = self.states.get(name.as_str()) {
            return Some(state);
        }
        tracing::warn!(state = %name, "tokenizer state doesn't exist, falling back to start");
        *name = START_STATE.to_string();
        self.states.get(START_STATE)
    }

    /// Tokenize `line` starting in `start_state`.
    pub fn get_line_tokens(&self, line: &str, start_state: Option<&TokenizerState>) -> LineTokens {
        let mut stack: Vec<String> = Vec::new();
        let mut current = match start_state {
            None => START_STATE.to_string(),
            Some(TokenizerState::Name(name)) => name.clone(),
            Some(TokenizerState::Stack(saved)) => {
                stack = saved.clone();
                let mut top = if stack.is_empty() {
                    START_STATE.to_string()
                } else {
                    stack[0].clone()
                };
                if top == TMP_STATE {
                    stack.remove(0);
                    top = if stack.is_empty() {
                        START_STATE.to_string()
                    } else {
                        stack.remove(0)
                    };
                }
                top
            }
        };

        let Some(mut state) = self.state_or_start(&mut current) else {
            return LineTokens {
                tokens: vec![Token::new("text", line)],
                state: TokenizerState::default(),
            };
        };

        let mut tokens: Vec<Token> = Vec::new();
        let mut pending: Option<Token> = None;
        let mut last_index = 0usize;
        let mut search = 0usize;

        loop {
            let Some(regex) = &state.regex else {
                if last_index < line.len() {
                    let rest = &line[last_index..];
                    push_typed(&mut tokens, &mut pending, &state.default_token, rest, true);
                }
                break;
            };
            let caps = match regex.captures_from_pos(line, search) {
                Ok(Some(caps)) => caps,
                Ok(None) => break,
                Err(err) => {
                    tracing::warn!(%err, state = %current, "tokenizer regex failed");
                    break;
                }
            };
            let Some(whole) = caps.get(0) else { break };
            let value = whole.as_str();
            let (match_start, index) = (whole.start(), whole.end());
            let searched_from = search;

            let mut emit = TokenOutput::Kind(state.default_token.clone());
            if match_start > last_index {
                let skipped = &line[last_index..match_start];
                push_typed(&mut tokens, &mut pending, &state.default_token, skipped, true);
            }

            let matched_rule = state.rules.iter().find(|c| caps.get(c.group).is_some());
            let mut changed_state = false;
            if let Some(compiled) = matched_rule {
                emit = if let Some(on_match) = &compiled.rule.on_match {
                    on_match(value, &current, &mut stack)
                } else {
                    match &compiled.emit {
                        Emit::Token(kind) => TokenOutput::Kind(kind.clone()),
                        Emit::Array(kinds) => TokenOutput::Tokens(
                            kinds
                                .iter()
                                .enumerate()
                                .filter_map(|(i, kind)| {
                                    let m = caps.get(compiled.group + 1 + i)?;
                                    (!m.as_str().is_empty()).then(|| Token::new(kind.clone(), m.as_str()))
                                })
                                .collect(),
                        ),
                    }
                };
                if let Some(next) = &compiled.rule.next {
                    current = next.resolve(&current, &mut stack);
                    match self.state_or_start(&mut current) {
                        Some(next_state) => state = next_state,
                        None => break,
                    }
                    last_index = index;
                    changed_state = true;
                }
            }

            if !value.is_empty() {
                match emit {
                    TokenOutput::Kind(kind) => {
                        let merge = matched_rule.is_none_or(|r| r.rule.merge != Some(false));
                        push_typed(&mut tokens, &mut pending, &kind, value, merge);
                    }
                    TokenOutput::Tokens(list) => {
                        if let Some(token) = pending.take() {
                            tokens.push(token);
                        }
                        tokens.extend(list);
                    }
                    TokenOutput::Nothing => {}
                }
            }

            if last_index == line.len() {
                break;
            }
            last_index = index;
            search = index;

            if value.is_empty() && !changed_state && index == searched_from {
                // A zero-width match that leaves the state alone would match again forever.
                match line[index..].chars().next() {
                    Some(ch) => search = index + ch.len_utf8(),
                    None => break,
                }
            }

            if tokens.len() > self.max_token_count {
                tracing::warn!(
                    tokens = tokens.len(),
                    len = line.len(),
                    "token ceiling exceeded, emitting overflow tokens"
                );
                let rest = &line[last_index..];
                let mut chunk = String::new();
                let mut count = 0;
                if let Some(token) = pending.take() {
                    tokens.push(token);
                }
                for ch in rest.chars() {
                    chunk.push(ch);
                    count += 1;
                    if count == self.overflow_chunk {
                        tokens.push(Token::new(OVERFLOW_TOKEN, std::mem::take(&mut chunk)));
                        count = 0;
                    }
                }
                if !chunk.is_empty() {
                    tokens.push(Token::new(OVERFLOW_TOKEN, chunk));
                }
                current = START_STATE.to_string();
                stack.clear();
                break;
            }
        }

        if let Some(token) = pending.take() {
            tokens.push(token);
        }

        if stack.len() > 1 && stack[0] != current {
            stack.insert(0, current.clone());
            stack.insert(0, TMP_STATE.to_string());
        }
        let state = if stack.is_empty() {
            TokenizerState::Name(current)
        } else {
            TokenizerState::Stack(stack)
        };
        LineTokens { tokens, state }
    }
}

/// Append `value` as a token of `kind`, extending the pending token when allowed.
fn push_typed(
    tokens: &mut Vec<Token>,
    pending: &mut Option<Token>,
    kind: &str,
    value: &str,
    merge: bool,
) {
    if let Some(token) = pending
        && merge
        && token.kind == kind
    {
        token.value.push_str(value);
        return;
    }
    if let Some(token) = pending.take() {
        tokens.push(token);
    }
    *pending = Some(Token::new(kind, value));
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table(entries: Vec<(&str, Vec<Rule>)>) -> RuleTable {
        entries
            .into_iter()
            .map(|(k, v)| (k.to_string(), v))
            .collect()
    }

    #[test]
    fn test_plain_tokenizer_emits_one_text_token() {
        let out = Tokenizer::plain().get_line_tokens("hello world", None);
        assert_eq!(out.tokens, vec![Token::new("text", "hello world")]);
        assert!(Tokenizer::plain().get_line_tokens("", None).tokens.is_empty());
    }

    #[test]
    fn test_missing_start_state() {
        let err = Tokenizer::new(table(vec![("other", vec![])])).unwrap_err();
        assert!(matches!(err, SessionError::MissingStartState));
    }

    #[test]
    fn test_adjacent_equal_tokens_merge() {
        let t = Tokenizer::new(table(vec![(
            "start",
            vec![Rule::new("[a-z]", "ident"), Rule::new(r"\d", "number")],
        )]))
        .unwrap();
        let out = t.get_line_tokens("ab12c", None);
        assert_eq!(
            out.tokens,
            vec![
                Token::new("ident", "ab"),
                Token::new("number", "12"),
                Token::new("ident", "c"),
            ]
        );
        assert_eq!(out.state, TokenizerState::from("start"));
    }

    #[test]
    fn test_array_tokens_use_capture_groups() {
        let t = Tokenizer::new(table(vec![(
            "start",
            vec![Rule::groups(r"(let)(\s+)(\w+)", &["keyword", "text", "variable"])],
        )]))
        .unwrap();
        let out = t.get_line_tokens("let  x;", None);
        assert_eq!(
            out.tokens,
            vec![
                Token::new("keyword", "let"),
                Token::new("text", "  "),
                Token::new("variable", "x"),
                Token::new("text", ";"),
            ]
        );
    }

    #[test]
    fn test_array_token_count_mismatch_is_an_error() {
        let err = Tokenizer::new(table(vec![(
            "start",
            vec![Rule::groups(r"(a)(b)", &["x", "y", "z"])],
        )]))
        .unwrap_err();
        assert!(matches!(
            err,
            SessionError::TokenCountMismatch {
                groups: 2,
                tokens: 3,
                ..
            }
        ));
    }

    #[test]
    fn test_backreferences_are_renumbered() {
        let t = Tokenizer::new(table(vec![(
            "start",
            vec![
                Rule::new(r"\d+", "number"),
                Rule::groups(r#"(["'])(?:\\.|.)*?\1"#, &["string"]),
            ],
        )]))
        .unwrap();
        let out = t.get_line_tokens(r#"1 'a"b' 2"#, None);
        assert_eq!(out.tokens[2], Token::new("string", r#"'a"b'"#));
    }

    #[test]
    fn test_unknown_next_state_falls_back_to_start() {
        let t = Tokenizer::new(table(vec![(
            "start",
            vec![Rule::new("x", "mark").next("nowhere")],
        )]))
        .unwrap();
        let out = t.get_line_tokens("axb", None);
        assert_eq!(out.state, TokenizerState::from("start"));
        let joined: String = out.tokens.iter().map(|t| t.value.as_str()).collect();
        assert_eq!(joined, "axb");
    }

    #[test]
    fn test_zero_width_rule_does_not_hang() {
        let t = Tokenizer::new(table(vec![("start", vec![Rule::new(r"(?=b)", "look")])])).unwrap();
        let out = t.get_line_tokens("abc", None);
        assert_eq!(out.tokens, vec![Token::new("text", "abc")]);
    }

    #[test]
    fn test_overflow_resets_state() {
        let t = Tokenizer::new(table(vec![
            ("start", vec![Rule::new("a", "a").no_merge(), Rule::new("q", "q").next("quoted")]),
            ("quoted", vec![Rule::default_token("string")]),
        ]))
        .unwrap()
        .with_limits(3, 4);
        let line = "aaaaaaaaaaq";
        let out = t.get_line_tokens(line, None);
        assert!(out.tokens.iter().any(|t| t.kind == OVERFLOW_TOKEN));
        let joined: String = out.tokens.iter().map(|t| t.value.as_str()).collect();
        assert_eq!(joined, line);
        assert_eq!(out.state, TokenizerState::from("start"));
    }

    #[test]
    fn test_push_pop_stack_states() {
        let t = Tokenizer::new(table(vec![
            ("start", vec![Rule::new(r"\{", "paren").push("block")]),
            (
                "block",
                vec![
                    Rule::new(r"\{", "paren").push("block"),
                    Rule::new(r"\}", "paren").pop(),
                ],
            ),
        ]))
        .unwrap();
        let first = t.get_line_tokens("{ {", None);
        assert_eq!(
            first.state,
            TokenizerState::Stack(vec!["block".into(), "block".into()])
        );
        let second = t.get_line_tokens("}", Some(&first.state));
        assert_eq!(second.state, TokenizerState::from("block"));
        let third = t.get_line_tokens("}", Some(&second.state));
        assert_eq!(third.state, TokenizerState::from("start"));
    }
}
