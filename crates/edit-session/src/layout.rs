//! Screen widths and soft-wrap split points.
//!
//! A row is first turned into display tokens, one per screen cell: a full-width character
//! occupies a [`DisplayToken::Char`] and a [`DisplayToken::CharExt`], a tab a
//! [`DisplayToken::Tab`] followed by [`DisplayToken::TabSpace`] fillers up to the next tab stop.
//! Fold placeholders are marked so the wrapper never breaks inside one unless it has to.
//!
//! Split points are returned in display-text character units: document columns for plain rows,
//! and indexes into the fold line's display text for folded rows.

/// Class of one screen cell. The ordering of the variants matters to the wrap heuristics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(u8)]
pub enum DisplayToken {
    /// An ordinary character (or the first cell of a full-width one).
    Char = 1,
    /// Second cell of a full-width character.
    CharExt = 2,
    /// First character of a fold placeholder.
    PlaceholderStart = 3,
    /// Any later character of a fold placeholder.
    PlaceholderBody = 4,
    /// `(`..`/` and `:`..`?`.
    Punctuation = 9,
    /// A space.
    Space = 10,
    /// A tab character.
    Tab = 11,
    /// Padding cell after a tab.
    TabSpace = 12,
}

/// Code point ranges rendered two cells wide (East Asian wide and full-width forms).
const FULL_WIDTH: &[(u32, u32)] = &[
    (0x1100, 0x115F),
    (0x11A3, 0x11A7),
    (0x11FA, 0x11FF),
    (0x2329, 0x232A),
    (0x2E80, 0x2E99),
    (0x2E9B, 0x2EF3),
    (0x2F00, 0x2FD5),
    (0x2FF0, 0x2FFB),
    (0x3000, 0x303E),
    (0x3041, 0x3096),
    (0x3099, 0x30FF),
    (0x3105, 0x312D),
    (0x3131, 0x318E),
    (0x3190, 0x31BA),
    (0x31C0, 0x31E3),
    (0x31F0, 0x321E),
    (0x3220, 0x3247),
    (0x3250, 0x32FE),
    (0x3300, 0x4DBF),
    (0x4E00, 0xA48C),
    (0xA490, 0xA4C6),
    (0xA960, 0xA97C),
    (0xAC00, 0xD7A3),
    (0xD7B0, 0xD7C6),
    (0xD7CB, 0xD7FB),
    (0xF900, 0xFAFF),
    (0xFE10, 0xFE19),
    (0xFE30, 0xFE52),
    (0xFE54, 0xFE66),
    (0xFE68, 0xFE6B),
    (0xFF01, 0xFF60),
    (0xFFE0, 0xFFE6),
];

/// `true` if `ch` occupies two screen cells.
pub fn is_full_width(ch: char) -> bool {
    let c = ch as u32;
    if c < 0x1100 {
        return false;
    }
    FULL_WIDTH
        .binary_search_by(|&(lo, hi)| {
            if hi < c {
                std::cmp::Ordering::Less
            } else if lo > c {
                std::cmp::Ordering::Greater
            } else {
                std::cmp::Ordering::Equal
            }
        })
        .is_ok()
}

/// Cells a tab advances when it starts at `screen_column`.
pub fn screen_tab_size(tab_size: usize, screen_column: usize) -> usize {
    let tab_size = tab_size.max(1);
    tab_size - screen_column % tab_size
}

/// Display tokens of `text`, which starts at screen cell `offset`.
pub fn display_tokens(text: &str, offset: usize, tab_size: usize) -> Vec<DisplayToken> {
    let mut out = Vec::with_capacity(text.len());
    for ch in text.chars() {
        match ch {
            '\t' => {
                let size = screen_tab_size(tab_size, out.len() + offset);
                out.push(DisplayToken::Tab);
                out.extend(std::iter::repeat_n(DisplayToken::TabSpace, size - 1));
            }
            ' ' => out.push(DisplayToken::Space),
            '('..='/' | ':'..='?' => out.push(DisplayToken::Punctuation),
            c if is_full_width(c) => {
                out.push(DisplayToken::Char);
                out.push(DisplayToken::CharExt);
            }
            _ => out.push(DisplayToken::Char),
        }
    }
    out
}

/// Display tokens for a fold placeholder at screen cell `offset`.
pub fn placeholder_tokens(placeholder: &str, offset: usize, tab_size: usize) -> Vec<DisplayToken> {
    let mut tokens = display_tokens(placeholder, offset, tab_size);
    for (i, token) in tokens.iter_mut().enumerate() {
        *token = if i == 0 {
            DisplayToken::PlaceholderStart
        } else {
            DisplayToken::PlaceholderBody
        };
    }
    tokens
}

/// Screen width of `text` when it starts at `screen_column`.
///
/// Returns `(screen column reached, characters consumed)`. With `max_screen_column` set, stops
/// before the first character that would end past it.
pub fn string_screen_width(
    text: &str,
    max_screen_column: Option<usize>,
    screen_column: usize,
    tab_size: usize,
) -> (usize, usize) {
    if max_screen_column == Some(0) {
        return (0, 0);
    }
    let max = max_screen_column.unwrap_or(usize::MAX);
    let mut screen = screen_column;
    let mut column = 0;
    for ch in text.chars() {
        let width = match ch {
            '\t' => screen_tab_size(tab_size, screen),
            c if is_full_width(c) => 2,
            _ => 1,
        };
        if screen + width > max {
            screen += width;
            break;
        }
        screen += width;
        column += 1;
    }
    (screen, column)
}

struct Splitter<'a> {
    tokens: &'a [DisplayToken],
    splits: Vec<usize>,
    last_split: usize,
    last_doc_split: usize,
}

impl Splitter<'_> {
    fn add_split(&mut self, screen_pos: usize) {
        let len = self.tokens[self.last_split..screen_pos]
            .iter()
            .filter(|t| !matches!(t, DisplayToken::TabSpace | DisplayToken::CharExt))
            .count();
        self.last_doc_split += len;
        self.splits.push(self.last_doc_split);
        self.last_split = screen_pos;
    }
}

/// Split points for a row whose display tokens are `tokens`.
///
/// A split prefers a whitespace boundary within the lookback window, then the start of a fold
/// placeholder, and cuts hard at `wrap_limit` when neither exists. `as_code` narrows the lookback
/// to ten cells and also refuses to end a row on punctuation.
pub fn compute_wrap_splits(tokens: &[DisplayToken], wrap_limit: usize, as_code: bool) -> Vec<usize> {
    use DisplayToken::*;

    if tokens.is_empty() || wrap_limit == 0 {
        return Vec::new();
    }
    let mut s = Splitter {
        tokens,
        splits: Vec::new(),
        last_split: 0,
        last_doc_split: 0,
    };
    let display_length = tokens.len();

    while display_length - s.last_split > wrap_limit {
        let mut split = s.last_split + wrap_limit;

        if tokens[split - 1] >= Space && tokens[split] >= Space {
            s.add_split(split);
            continue;
        }

        if matches!(tokens[split], PlaceholderStart | PlaceholderBody) {
            let floor = s.last_split as isize - 1;
            let mut at = split as isize;
            while at != floor && tokens[at as usize] != PlaceholderStart {
                at -= 1;
            }
            if at > s.last_split as isize {
                s.add_split(at as usize);
                continue;
            }
            // The placeholder starts the row; break right after it instead.
            split = s.last_split + wrap_limit;
            while split < tokens.len() && tokens[split] == PlaceholderBody {
                split += 1;
            }
            if split == tokens.len() {
                break;
            }
            s.add_split(split);
            continue;
        }

        let lookback = if as_code {
            10
        } else {
            wrap_limit - (wrap_limit >> 2)
        };
        let min_split = (split as isize - lookback as isize).max(s.last_split as isize - 1);
        let mut at = split as isize;
        while at > min_split && tokens[at as usize] < PlaceholderStart {
            at -= 1;
        }
        if as_code {
            while at > min_split && tokens[at as usize] < PlaceholderStart {
                at -= 1;
            }
            while at > min_split && tokens[at as usize] == Punctuation {
                at -= 1;
            }
        } else {
            while at > min_split && tokens[at as usize] < Space {
                at -= 1;
            }
        }
        if at > min_split {
            s.add_split(at as usize + 1);
            continue;
        }

        s.add_split(s.last_split + wrap_limit);
    }
    s.splits
}
