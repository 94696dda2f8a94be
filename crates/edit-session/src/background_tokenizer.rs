//! Incremental, time-sliced tokenization.
//!
//! The [`BackgroundTokenizer`] caches one token list and one end state per row. Edits splice
//! the caches and roll the cursor (`current_line`) back to the edited row; [`run_pending`]
//! then re-tokenizes forward from the cursor in batches. When a row's end state comes out
//! unchanged, the row after it keeps its cached tokens, so an edit that does not change the
//! state machine only costs the edited row.
//!
//! There are no timers here. The tokenizer records when its next batch is due and the owner
//! calls [`run_pending`] with the current time, usually from [`crate::EditSession::poll`].
//!
//! [`run_pending`]: BackgroundTokenizer::run_pending

use crate::config::TokenizerConfig;
use crate::delta::Delta;
use crate::document::Document;
use crate::tokenizer::{Token, Tokenizer, TokenizerState};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use web_time::{Duration, Instant};

/// Inclusive span of rows refreshed by one batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RowSpan {
    /// First refreshed row.
    pub first: usize,
    /// Last refreshed row.
    pub last: usize,
}

#[derive(Debug, Clone, Copy, Default)]
struct Schedule {
    due: Option<Instant>,
}

impl Schedule {
    fn at(&mut self, when: Instant) {
        self.due = Some(when);
    }

    fn cancel(&mut self) {
        self.due = None;
    }

    fn is_pending(&self) -> bool {
        self.due.is_some()
    }

    fn is_due(&self, now: Instant) -> bool {
        self.due.is_some_and(|due| now >= due)
    }
}

/// Per-row token cache driven by deltas and polled batches.
#[derive(Debug)]
pub struct BackgroundTokenizer {
    tokenizer: Arc<Tokenizer>,
    lines: Vec<Option<Vec<Token>>>,
    states: Vec<Option<TokenizerState>>,
    current_line: usize,
    schedule: Schedule,
    config: TokenizerConfig,
    rows_tokenized: u64,
}

impl BackgroundTokenizer {
    /// Wrap `tokenizer`. Nothing runs until [`BackgroundTokenizer::start`].
    pub fn new(tokenizer: Arc<Tokenizer>, config: TokenizerConfig) -> Self {
        Self {
            tokenizer: Self::limited(tokenizer, &config),
            lines: Vec::new(),
            states: Vec::new(),
            current_line: 0,
            schedule: Schedule::default(),
            config,
            rows_tokenized: 0,
        }
    }

    fn limited(tokenizer: Arc<Tokenizer>, config: &TokenizerConfig) -> Arc<Tokenizer> {
        if tokenizer.max_token_count() == config.max_token_count
            && tokenizer.overflow_chunk() == config.overflow_chunk
        {
            tokenizer
        } else {
            Arc::new(
                (*tokenizer)
                    .clone()
                    .with_limits(config.max_token_count, config.overflow_chunk),
            )
        }
    }

    /// The tokenizer in use.
    pub fn tokenizer(&self) -> &Arc<Tokenizer> {
        &self.tokenizer
    }

    /// Swap the tokenizer, drop every cached row and restart from row 0.
    pub fn set_tokenizer(&mut self, tokenizer: Arc<Tokenizer>, doc_len: usize) {
        self.tokenizer = Self::limited(tokenizer, &self.config);
        self.lines.clear();
        self.states.clear();
        self.current_line = 0;
        self.start(0, doc_len);
    }

    /// Forget everything after the document was replaced. Stops any pending run.
    pub fn set_document(&mut self) {
        self.lines.clear();
        self.states.clear();
        self.current_line = 0;
        self.stop();
    }

    /// Row up to which the caches are known to be fresh.
    pub fn current_line(&self) -> usize {
        self.current_line
    }

    /// Rows tokenized since construction. Handy for observing the state short-circuit.
    pub fn rows_tokenized(&self) -> u64 {
        self.rows_tokenized
    }

    /// `true` while a batch is scheduled.
    pub fn is_running(&self) -> bool {
        self.schedule.is_pending()
    }

    /// Time at which the next batch is due.
    pub fn due(&self) -> Option<Instant> {
        self.schedule.due
    }

    /// Roll the cursor back to `row` and schedule a run after the start delay.
    pub fn start(&mut self, row: usize, doc_len: usize) {
        self.current_line = row.min(self.current_line).min(doc_len);
        self.lines.truncate(self.current_line);
        self.states.truncate(self.current_line);
        self.schedule.at(Instant::now() + self.config.start_delay);
    }

    /// Schedule a run from the current cursor unless one is already pending.
    pub fn schedule_start(&mut self) {
        if !self.schedule.is_pending() {
            self.schedule.at(Instant::now() + self.config.start_delay);
        }
    }

    /// Cancel the pending run.
    pub fn stop(&mut self) {
        self.schedule.cancel();
    }

    /// Splice the caches to follow `delta` and roll the cursor back to its first row.
    ///
    /// The run is stopped; the owner reschedules it with [`BackgroundTokenizer::schedule_start`].
    pub fn update_on_change(&mut self, delta: &Delta, doc_len: usize) {
        let range = delta.range();
        let start_row = range.start.row;
        let len = range.end.row - start_row;

        if len == 0 {
            if let Some(slot) = self.lines.get_mut(start_row) {
                *slot = None;
            }
        } else if delta.is_insert() {
            splice_rows(&mut self.lines, start_row, 1, len + 1);
            splice_rows(&mut self.states, start_row, 1, len + 1);
        } else {
            splice_rows(&mut self.lines, start_row, len + 1, 1);
            splice_rows(&mut self.states, start_row, len + 1, 1);
        }

        self.current_line = start_row.min(self.current_line).min(doc_len);
        self.stop();
    }

    /// Tokens for `row`, tokenizing it on the spot if the cache has nothing.
    pub fn tokens(&mut self, doc: &Document, row: usize) -> Vec<Token> {
        if let Some(Some(tokens)) = self.lines.get(row) {
            return tokens.clone();
        }
        self.tokenize_row(doc, row)
    }

    /// End state of `row`. Asking about the cursor row tokenizes it first.
    pub fn state(&mut self, doc: &Document, row: usize) -> TokenizerState {
        if self.current_line == row {
            self.tokenize_row(doc, row);
        }
        self.states
            .get(row)
            .cloned()
            .flatten()
            .unwrap_or_default()
    }

    fn tokenize_row(&mut self, doc: &Document, row: usize) -> Vec<Token> {
        let prev = row
            .checked_sub(1)
            .and_then(|r| self.states.get(r).cloned().flatten());
        let result = self.tokenizer.get_line_tokens(doc.line(row), prev.as_ref());
        self.rows_tokenized += 1;

        ensure_len(&mut self.states, row + 1);
        ensure_len(&mut self.lines, row + 1);

        if self.states[row].as_ref() != Some(&result.state) {
            self.states[row] = Some(result.state);
            if let Some(next) = self.lines.get_mut(row + 1) {
                *next = None;
            }
            if self.current_line > row + 1 {
                self.current_line = row + 1;
            }
        } else if self.current_line == row {
            self.current_line = row + 1;
        }

        self.lines[row] = Some(result.tokens.clone());
        result.tokens
    }

    /// Run one batch if it is due at `now`.
    ///
    /// Rows are processed from the cursor, skipping rows that are still cached. Every
    /// `batch_rows` rows the elapsed time is checked against `batch_budget`; an exhausted
    /// budget reschedules the rest `resume_delay` after `now`. Returns the span of rows that
    /// were re-tokenized.
    pub fn run_pending(&mut self, doc: &Document, now: Instant) -> Option<RowSpan> {
        if !self.schedule.is_due(now) {
            return None;
        }
        self.schedule.cancel();

        let started = Instant::now();
        let len = doc.len();
        let mut current = self.current_line;
        while self.lines.get(current).is_some_and(Option::is_some) {
            current += 1;
        }
        let first = current;
        let mut last = None;
        let mut processed = 0usize;
        let mut yielded = false;

        while current < len {
            self.tokenize_row(doc, current);
            last = Some(current);
            loop {
                current += 1;
                if !self.lines.get(current).is_some_and(Option::is_some) {
                    break;
                }
            }
            processed += 1;
            if processed % self.config.batch_rows.max(1) == 0
                && started.elapsed() > self.config.batch_budget
            {
                self.schedule.at(now + self.config.resume_delay);
                yielded = true;
                break;
            }
        }
        self.current_line = current;

        tracing::trace!(
            first,
            rows = processed,
            elapsed_us = started.elapsed().as_micros() as u64,
            yielded,
            "background tokenizer batch"
        );

        last.filter(|&last| first <= last)
            .map(|last| RowSpan { first, last })
    }

    /// Convenience for tests and hosts without a clock: run batches until nothing is left.
    pub fn run_to_completion(&mut self, doc: &Document) -> Option<RowSpan> {
        let mut span: Option<RowSpan> = None;
        self.schedule_start();
        while let Some(due) = self.schedule.due {
            let Some(next) = self.run_pending(doc, due.max(Instant::now())) else {
                continue;
            };
            span = Some(match span {
                Some(s) => RowSpan {
                    first: s.first.min(next.first),
                    last: s.last.max(next.last),
                },
                None => next,
            });
        }
        span
    }

    /// Cached tokens for `row` without tokenizing.
    pub fn cached_tokens(&self, row: usize) -> Option<&[Token]> {
        self.lines.get(row)?.as_deref()
    }

    /// Delay used when a run is (re)started.
    pub fn start_delay(&self) -> Duration {
        self.config.start_delay
    }
}

fn ensure_len<T>(v: &mut Vec<Option<T>>, len: usize) {
    if v.len() < len {
        v.resize_with(len, || None);
    }
}

/// Replace `remove` entries at `at` with `insert` empty ones, clamped to the vector.
fn splice_rows<T>(v: &mut Vec<Option<T>>, at: usize, remove: usize, insert: usize) {
    if at > v.len() {
        return;
    }
    let end = (at + remove).min(v.len());
    v.splice(at..end, std::iter::repeat_with(|| None).take(insert));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::range::Position;
    use crate::tokenizer::{Rule, RuleTable};

    fn comment_tokenizer() -> Arc<Tokenizer> {
        let mut rules = RuleTable::new();
        rules.insert(
            "start".to_string(),
            vec![Rule::new(r"/\*", "comment").push("comment")],
        );
        rules.insert(
            "comment".to_string(),
            vec![
                Rule::new(r"\*/", "comment").pop().no_merge(),
                Rule::default_token("comment"),
            ],
        );
        Arc::new(Tokenizer::new(rules).unwrap())
    }

    fn immediate() -> TokenizerConfig {
        TokenizerConfig {
            start_delay: Duration::ZERO,
            ..TokenizerConfig::default()
        }
    }

    #[test]
    fn test_run_tokenizes_every_row() {
        let doc = Document::from_lines(&["a", "b", "c"]);
        let mut bg = BackgroundTokenizer::new(comment_tokenizer(), immediate());
        bg.start(0, doc.len());
        let span = bg.run_pending(&doc, Instant::now() + Duration::from_millis(1));
        assert_eq!(span, Some(RowSpan { first: 0, last: 2 }));
        assert_eq!(bg.current_line(), 3);
        assert_eq!(bg.rows_tokenized(), 3);
        assert!(!bg.is_running());
    }

    #[test]
    fn test_not_due_does_nothing() {
        let doc = Document::from_lines(&["a"]);
        let config = TokenizerConfig {
            start_delay: Duration::from_secs(60),
            ..TokenizerConfig::default()
        };
        let mut bg = BackgroundTokenizer::new(comment_tokenizer(), config);
        bg.start(0, doc.len());
        assert_eq!(bg.run_pending(&doc, Instant::now()), None);
        assert!(bg.is_running());
    }

    #[test]
    fn test_unchanged_state_keeps_following_rows() {
        let mut doc = Document::from_lines(&["one", "two", "three", "four"]);
        let mut bg = BackgroundTokenizer::new(comment_tokenizer(), immediate());
        bg.run_to_completion(&doc);
        let before = bg.rows_tokenized();

        let mut deltas = Vec::new();
        doc.insert(Position::new(1, 0), "x");
        deltas.push(Delta::InsertText {
            range: crate::range::Range::new(1, 0, 1, 1),
            text: "x".to_string(),
        });
        bg.update_on_change(&deltas[0], doc.len());
        bg.run_to_completion(&doc);
        assert_eq!(bg.rows_tokenized() - before, 1);
        assert!(bg.cached_tokens(3).is_some());
    }

    #[test]
    fn test_changed_state_invalidates_next_row() {
        let mut doc = Document::from_lines(&["a", "b", "c"]);
        let mut bg = BackgroundTokenizer::new(comment_tokenizer(), immediate());
        bg.run_to_completion(&doc);
        let before = bg.rows_tokenized();

        doc.insert(Position::new(0, 1), "/*");
        let delta = Delta::InsertText {
            range: crate::range::Range::new(0, 1, 0, 3),
            text: "/*".to_string(),
        };
        bg.update_on_change(&delta, doc.len());
        bg.run_to_completion(&doc);
        assert_eq!(bg.rows_tokenized() - before, 3);
        assert_eq!(bg.state(&doc, 2).current(), "comment");
    }

    #[test]
    fn test_multi_row_delta_splices_caches() {
        let mut doc = Document::from_lines(&["a", "b", "c"]);
        let mut bg = BackgroundTokenizer::new(comment_tokenizer(), immediate());
        bg.run_to_completion(&doc);

        doc.insert(Position::new(1, 0), "x\ny\n");
        let delta = Delta::InsertLines {
            range: crate::range::Range::new(1, 0, 3, 0),
            lines: vec!["x".to_string(), "y".to_string()],
        };
        bg.update_on_change(&delta, doc.len());
        assert_eq!(bg.current_line(), 1);
        assert!(bg.cached_tokens(0).is_some());
        assert!(bg.cached_tokens(1).is_none());
        assert!(bg.cached_tokens(2).is_none());
        assert!(bg.cached_tokens(3).is_none());
        assert_eq!(bg.cached_tokens(4).map(|t| t[0].value.as_str()), Some("c"));
    }

    #[test]
    fn test_tokens_on_demand_without_run() {
        let doc = Document::from_lines(&["a /*", "b*/ c"]);
        let mut bg = BackgroundTokenizer::new(comment_tokenizer(), immediate());
        let row0 = bg.tokens(&doc, 0);
        assert_eq!(row0.iter().map(|t| t.value.as_str()).collect::<String>(), "a /*");
        assert_eq!(bg.state(&doc, 0).current(), "comment");
        let row1 = bg.tokens(&doc, 1);
        assert_eq!(row1[0], Token::new("comment", "b"));
        assert_eq!(bg.state(&doc, 1).current(), "start");
    }

    #[test]
    fn test_budget_yields_and_reschedules() {
        let lines: Vec<String> = (0..50).map(|i| format!("line {i}")).collect();
        let doc = Document::from_lines(&lines);
        let config = TokenizerConfig {
            start_delay: Duration::ZERO,
            batch_rows: 1,
            batch_budget: Duration::ZERO,
            resume_delay: Duration::from_millis(5),
            ..TokenizerConfig::default()
        };
        let mut bg = BackgroundTokenizer::new(comment_tokenizer(), config);
        bg.start(0, doc.len());
        let now = Instant::now() + Duration::from_millis(1);
        let span = bg.run_pending(&doc, now).unwrap();
        assert_eq!(span.first, 0);
        assert!(span.last < 49);
        assert_eq!(bg.due(), Some(now + Duration::from_millis(5)));
        bg.run_to_completion(&doc);
        assert_eq!(bg.current_line(), 50);
    }
}
