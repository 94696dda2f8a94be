use edit_session::{Delta, Document, Position, Range};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::sync::{Arc, Mutex};

fn recorded(doc: &mut Document) -> Arc<Mutex<Vec<Delta>>> {
    let deltas = Arc::new(Mutex::new(Vec::new()));
    let sink = deltas.clone();
    doc.subscribe(move |d: &Delta| sink.lock().unwrap().push(d.clone()));
    deltas
}

fn random_position(rng: &mut StdRng, doc: &Document) -> Position {
    let row = rng.gen_range(0..doc.len());
    let column = rng.gen_range(0..=doc.line_len(row));
    Position::new(row, column)
}

fn random_text(rng: &mut StdRng) -> String {
    const ALPHABET: &[char] = &['a', 'b', ' ', '\t', '\n', 'é', '漢'];
    let len = rng.gen_range(1..6);
    (0..len)
        .map(|_| ALPHABET[rng.gen_range(0..ALPHABET.len())])
        .collect()
}

#[test]
fn test_insert_newline_then_text_splits_row() {
    let mut doc = Document::from_lines(&["abc", "def"]);
    let end = doc.insert(Position::new(0, 3), "\nXY");
    assert_eq!(doc.all_lines(), ["abc", "XY", "def"]);
    assert_eq!(end, Position::new(1, 2));
}

#[test]
fn test_inverse_deltas_restore_lines() {
    let mut rng = StdRng::seed_from_u64(0x5eed);
    for _ in 0..50 {
        let mut doc = Document::new("first line\n\tsecond\nthird row here\n");
        let original = doc.all_lines().to_vec();
        let deltas = recorded(&mut doc);

        for _ in 0..20 {
            if rng.gen_bool(0.6) {
                let at = random_position(&mut rng, &doc);
                let text = random_text(&mut rng);
                doc.insert(at, &text);
            } else {
                let a = random_position(&mut rng, &doc);
                let b = random_position(&mut rng, &doc);
                doc.remove(Range::from_points(a.min(b), a.max(b)));
            }
        }

        let history = deltas.lock().unwrap().clone();
        let inverses: Vec<Delta> = history.iter().rev().map(Delta::inverse).collect();
        let edited = doc.all_lines().to_vec();

        doc.apply_deltas(&inverses);
        assert_eq!(doc.all_lines(), original.as_slice());

        doc.apply_deltas(&history);
        assert_eq!(doc.all_lines(), edited.as_slice());

        doc.revert_deltas(&history);
        assert_eq!(doc.all_lines(), original.as_slice());
    }
}

#[test]
fn test_replace_with_identical_text_emits_nothing() {
    let mut doc = Document::new("keep me");
    let deltas = recorded(&mut doc);
    doc.replace(Range::new(0, 0, 0, 4), "keep");
    assert!(deltas.lock().unwrap().is_empty());
    doc.replace(Range::new(0, 0, 0, 4), "kept");
    assert_eq!(doc.value(), "kept me");
    assert_eq!(deltas.lock().unwrap().len(), 2);
}

#[test]
fn test_anchor_follows_edits() {
    let mut doc = Document::new("hello world\nsecond line\nthird");
    let anchor = doc.create_anchor(1, 7);

    // edit on another row
    doc.insert(Position::new(0, 0), "XX");
    assert_eq!(doc.anchor_position(anchor), Position::new(1, 7));

    // before the anchor on its row
    doc.insert(Position::new(1, 0), "ab");
    assert_eq!(doc.anchor_position(anchor), Position::new(1, 9));

    // line break above
    doc.insert(Position::new(0, 2), "\n");
    assert_eq!(doc.anchor_position(anchor), Position::new(2, 9));

    // removal before the anchor on its row
    doc.remove(Range::new(2, 0, 2, 3));
    assert_eq!(doc.anchor_position(anchor), Position::new(2, 6));
    assert_eq!(&doc.line(2)[6..], "line");

    // after the anchor: no move
    doc.insert(Position::new(2, 10), "!");
    assert_eq!(doc.anchor_position(anchor), Position::new(2, 6));

    // joining the anchor's row onto the previous one
    doc.remove(Range::new(1, 2, 2, 0));
    let pos = doc.anchor_position(anchor);
    assert_eq!(pos, Position::new(1, 8));
    assert!(doc.line(1)[pos.column..].starts_with("line"));

    // removing the anchor's row entirely
    doc.remove_lines(1, 1).unwrap();
    assert_eq!(doc.anchor_position(anchor), Position::new(1, 0));
}

#[test]
fn test_removal_spanning_anchor_collapses_to_start() {
    let mut doc = Document::new("0123456789");
    let anchor = doc.create_anchor(0, 5);
    doc.remove(Range::new(0, 2, 0, 8));
    assert_eq!(doc.anchor_position(anchor), Position::new(0, 2));
}

#[test]
fn test_newline_mode_detected_from_first_insert() {
    let doc = Document::new("a\r\nb\r\nc");
    assert_eq!(doc.all_lines(), ["a", "b", "c"]);
    assert_eq!(doc.new_line_character(), "\r\n");
    assert_eq!(doc.value(), "a\r\nb\r\nc");
}

#[test]
fn test_delta_wire_format() {
    let mut doc = Document::new("abc");
    let deltas = recorded(&mut doc);
    doc.insert(Position::new(0, 3), "\n");

    let delta = deltas.lock().unwrap()[0].clone();
    let json = serde_json::to_value(&delta).unwrap();
    assert_eq!(
        json,
        serde_json::json!({
            "action": "insertText",
            "range": {"start": {"row": 0, "column": 3}, "end": {"row": 1, "column": 0}},
            "text": "\n",
        })
    );
    let back: Delta = serde_json::from_value(json).unwrap();
    assert_eq!(back, delta);
}

#[test]
fn test_unclipped_anchor_past_row_end_survives_join() {
    let mut doc = Document::new("abc\ndef");
    let anchor = doc.create_anchor(0, 1);
    doc.set_anchor_position(anchor, 0, 9, true);
    assert_eq!(doc.anchor_position(anchor), Position::new(0, 9));

    doc.remove_new_line(0);
    assert_eq!(doc.line(0), "abcdef");
    assert_eq!(doc.anchor_position(anchor), Position::new(0, 3));
}

#[test]
fn test_anchors_around_joined_rows() {
    let mut doc = Document::new("abc\ndef\nghi");
    let at_end = doc.create_anchor(0, 3);
    let below = doc.create_anchor(1, 2);
    let after = doc.create_anchor(2, 1);

    doc.remove_new_line(0);
    assert_eq!(doc.anchor_position(at_end), Position::new(0, 3));
    assert_eq!(doc.anchor_position(below), Position::new(0, 5));
    assert_eq!(doc.anchor_position(after), Position::new(1, 1));
    assert_eq!(doc.all_lines(), ["abcdef", "ghi"]);
}

#[test]
fn test_insert_at_anchor_column_honours_insert_right() {
    let mut doc = Document::new("abcd");
    let moving = doc.create_anchor(0, 2);
    let staying = doc.create_anchor(0, 2);
    doc.set_anchor_insert_right(staying, true);

    doc.insert(Position::new(0, 2), "XY");
    assert_eq!(doc.anchor_position(moving), Position::new(0, 4));
    assert_eq!(doc.anchor_position(staying), Position::new(0, 2));

    doc.insert(Position::new(0, 0), "_");
    assert_eq!(doc.anchor_position(moving), Position::new(0, 5));
    assert_eq!(doc.anchor_position(staying), Position::new(0, 3));
}
