use edit_session::{EditSession, FoldSide, Position, Range, SessionError};
use pretty_assertions::assert_eq;

const FIVE_ROWS: &str = "first\nsecond\nthird\nfourth\nfifth";

#[test]
fn test_fold_middle_rows() {
    let mut session = EditSession::new(FIVE_ROWS);
    session.add_fold("...", Range::new(1, 0, 3, 6)).unwrap();

    assert_eq!(session.screen_length(), 3);
    assert!(session.is_row_folded(2));
    assert!(!session.is_row_folded(4));
    assert_eq!(session.display_line(1, None, None), "...");
    assert_eq!(session.document_to_screen_row(4, 0), 2);
    assert_eq!(session.screen_to_document_position(2, 3), Position::new(4, 3));
}

#[test]
fn test_add_then_remove_fold_restores_view() {
    let mut session = EditSession::new(FIVE_ROWS);
    let length = session.screen_length();
    let id = session.add_fold("{...}", Range::new(0, 2, 2, 1)).unwrap();
    assert_eq!(session.screen_length(), length - 2);
    assert_eq!(session.display_line(0, None, None), "fi{...}hird");

    let fold = session.remove_fold(id).unwrap();
    assert_eq!(fold.range, Range::new(0, 2, 2, 1));
    assert_eq!(session.screen_length(), length);
    assert_eq!(session.display_line(0, None, None), "first");
    assert_eq!(session.value(), FIVE_ROWS);
    assert!(session.fold_line(0).is_none());
}

#[test]
fn test_rejected_folds() {
    let mut session = EditSession::new(FIVE_ROWS);
    assert!(matches!(
        session.add_fold("..", Range::new(0, 1, 0, 2)),
        Err(SessionError::FoldTooSmall { .. })
    ));

    session.add_fold("...", Range::new(1, 2, 3, 2)).unwrap();
    assert!(matches!(
        session.add_fold("...", Range::new(0, 1, 2, 0)),
        Err(SessionError::FoldIntersects { .. })
    ));
}

#[test]
fn test_fold_lookup_respects_side() {
    let mut session = EditSession::new(FIVE_ROWS);
    session.add_fold("...", Range::new(1, 2, 3, 2)).unwrap();
    assert!(session.fold_at(1, 2, FoldSide::Any).is_some());
    assert!(session.fold_at(1, 2, FoldSide::NotAtStart).is_none());
    assert!(session.fold_at(3, 2, FoldSide::NotAtEnd).is_none());
    assert!(session.fold_at(4, 0, FoldSide::Any).is_none());
}

#[test]
fn test_screen_mapping_inverts_outside_folds() {
    let text = "fn a() {\n  x {\n  y\n  }\n}\n\tlast 中文";
    let mut session = EditSession::new(text);
    let fold = Range::new(1, 3, 3, 2);
    session.add_fold("...", fold).unwrap();
    assert_eq!(session.display_line(1, None, None), "  x...}");

    for row in 0..session.len() {
        for column in 0..=session.line_len(row) {
            if fold.contains(row, column) {
                continue;
            }
            let screen = session.document_to_screen_position(row, column);
            assert_eq!(
                session.screen_to_document_position(screen.row, screen.column),
                Position::new(row, column),
                "({row}, {column}) via {screen:?}"
            );
        }
    }
}

#[test]
fn test_wrapped_mapping_inverts() {
    let mut session = EditSession::new("aaaa bbbb cccc dddd\nshort\nanother wrapped row");
    session.set_use_wrap_mode(true);
    session.adjust_wrap_limit(6, 80);
    assert!(session.screen_length() > session.len());

    for row in 0..session.len() {
        for column in 0..=session.line_len(row) {
            let screen = session.document_to_screen_position(row, column);
            assert_eq!(
                session.screen_to_document_position(screen.row, screen.column),
                Position::new(row, column),
                "({row}, {column}) via {screen:?}"
            );
        }
    }
}

#[test]
fn test_folds_follow_edits() {
    let mut session = EditSession::new(FIVE_ROWS);
    session.add_fold("...", Range::new(1, 2, 3, 2)).unwrap();

    session.insert(Position::new(0, 0), "zero\n");
    assert!(session.fold_line(1).is_none());
    let fold = session.fold_at(2, 2, FoldSide::Any).unwrap();
    assert_eq!(fold.range, Range::new(2, 2, 4, 2));

    session.remove(Range::new(1, 0, 5, 0));
    assert!(session.all_folds().is_empty());
    assert_eq!(session.screen_length(), session.len());
}
