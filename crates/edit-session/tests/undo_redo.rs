use edit_session::{EditSession, FoldSide, Position, Range};
use pretty_assertions::assert_eq;

const ORIGINAL: &str = "alpha\nbeta\ngamma\ndelta";

fn edit(session: &mut EditSession) {
    session.insert(Position::new(0, 5), " one");
    session.mark_undo_group();
    session.remove(Range::new(1, 1, 2, 2));
    session.mark_undo_group();
    session.insert(Position::new(2, 0), "x\ny\n");
    session.replace(Range::new(0, 0, 0, 5), "ALPHA");
    session.mark_undo_group();
}

#[test]
fn test_undo_all_then_redo_all() {
    let mut session = EditSession::new(ORIGINAL);
    edit(&mut session);
    let edited = session.value();
    assert_eq!(edited, "ALPHA one\nbmma\nx\ny\ndelta");
    assert_eq!(session.undo_manager().unwrap().undo_depth(), 3);

    while session.has_undo() {
        session.undo(true);
    }
    assert_eq!(session.value(), ORIGINAL);
    assert!(session.undo_manager().unwrap().is_clean());

    while session.has_redo() {
        session.redo(true);
    }
    assert_eq!(session.value(), edited);
    assert!(!session.has_redo());
}

#[test]
fn test_undo_selects_touched_range() {
    let mut session = EditSession::new(ORIGINAL);
    session.insert(Position::new(1, 0), "new ");
    session.mark_undo_group();

    assert_eq!(session.undo(false), Some(Range::at(Position::new(1, 0))));
    assert_eq!(session.redo(false), Some(Range::new(1, 0, 1, 4)));
    assert_eq!(session.undo(true), None);
}

#[test]
fn test_new_edit_clears_redo() {
    let mut session = EditSession::new(ORIGINAL);
    session.insert(Position::new(0, 0), "1");
    session.mark_undo_group();
    session.undo(true);
    assert!(session.has_redo());

    session.insert(Position::new(0, 0), "2");
    session.mark_undo_group();
    assert!(!session.has_redo());
    assert_eq!(session.line(0), "2alpha");
}

#[test]
fn test_merged_groups_undo_together() {
    let mut session = EditSession::new(ORIGINAL);
    session.insert(Position::new(0, 0), "a");
    session.mark_undo_group();
    session.insert(Position::new(0, 1), "b");
    session.merge_undo_deltas();
    session.mark_undo_group();

    session.undo(true);
    assert_eq!(session.value(), ORIGINAL);
    assert!(!session.has_undo());
}

#[test]
fn test_undo_restores_folds_removed_by_edit() {
    let mut session = EditSession::new(ORIGINAL);
    session.add_fold("...", Range::new(1, 2, 2, 3)).unwrap();
    session.remove(Range::new(1, 0, 3, 0));
    session.mark_undo_group();
    assert!(session.all_folds().is_empty());

    session.undo(true);
    assert_eq!(session.value(), ORIGINAL);
    let fold = session.fold_at(1, 3, FoldSide::Any).unwrap();
    assert_eq!(fold.range, Range::new(1, 2, 2, 3));
}

#[test]
fn test_without_undo_manager_nothing_is_recorded() {
    let mut session = EditSession::new(ORIGINAL);
    session.set_undo_manager(None);
    session.insert(Position::new(0, 0), "x");
    session.mark_undo_group();
    assert!(!session.has_undo());
    assert_eq!(session.undo(true), None);
    assert_eq!(session.line(0), "xalpha");
}
