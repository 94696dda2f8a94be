use edit_session::{Position, Range};

fn lexicographic(range: &Range, point: Position) -> i32 {
    if point < range.start {
        -1
    } else if point > range.end {
        1
    } else {
        0
    }
}

#[test]
fn test_compare_matches_point_order_on_small_grid() {
    let mut ranges = Vec::new();
    for sr in 0..3 {
        for sc in 0..3 {
            for er in sr..3 {
                for ec in 0..3 {
                    if er == sr && ec < sc {
                        continue;
                    }
                    ranges.push(Range::new(sr, sc, er, ec));
                }
            }
        }
    }
    for range in &ranges {
        for row in 0..4 {
            for column in 0..4 {
                let point = Position::new(row, column);
                assert_eq!(
                    range.compare(row, column),
                    lexicographic(range, point),
                    "{range} vs {point:?}"
                );
                assert_eq!(range.contains(row, column), lexicographic(range, point) == 0);
            }
        }
    }
}

#[test]
fn test_compare_range_six_way_table() {
    let r = Range::new(1, 2, 3, 4);
    let cases = [
        (Range::new(0, 0, 1, 1), -2, "disjoint before"),
        (Range::new(3, 5, 4, 0), 2, "disjoint after"),
        (Range::new(0, 0, 1, 2), -1, "touching at start"),
        (Range::new(3, 4, 5, 0), 1, "touching at end"),
        (Range::new(2, 0, 2, 9), 0, "contained"),
        (Range::new(0, 0, 9, 0), 0, "containing"),
        (Range::new(4, 0, 2, 0), 42, "reversed, ends inside"),
    ];
    for (other, code, label) in cases {
        assert_eq!(r.compare_range(&other), code, "{label}: {other}");
    }
}

#[test]
fn test_intersects_follows_codes() {
    let r = Range::new(1, 0, 1, 5);
    assert!(r.intersects(&Range::new(0, 0, 1, 0)));
    assert!(r.intersects(&Range::new(1, 5, 2, 0)));
    assert!(!r.intersects(&Range::new(1, 6, 2, 0)));
    assert!(r.contains_range(&Range::new(1, 1, 1, 4)));
    assert!(!r.contains_range(&Range::new(1, 1, 2, 0)));
}

#[test]
fn test_display_and_wire_format() {
    let r = Range::new(0, 1, 2, 3);
    assert_eq!(r.to_string(), "Range: [0/1] -> [2/3]");
    let json = serde_json::to_value(r).unwrap();
    assert_eq!(json["start"]["row"], 0);
    assert_eq!(json["end"]["column"], 3);
}
