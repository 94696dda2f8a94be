//! Markers, breakpoints, gutter decorations and annotations.
//!
//! None of these influence the document or the screen layout. The session only stores them and
//! tells subscribers when they change; rendering them is up to the host.

use super::EditSession;
use crate::events::SessionEvent;
use crate::range::Range;
use crate::worker::Annotation;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

const DEFAULT_BREAKPOINT_CLASS: &str = "breakpoint";
const DEFAULT_HIGHLIGHT_CLASS: &str = "step";

/// Identifier of a marker. Ids are never reused within a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct MarkerId(pub(crate) u64);

impl fmt::Display for MarkerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "marker#{}", self.0)
    }
}

/// How a marker's range is painted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum MarkerType {
    /// Each covered row, up to the end of its text.
    #[default]
    Line,
    /// Each covered row across the full width.
    FullLine,
    /// Only the screen row of the range start.
    ScreenLine,
    /// Exactly the covered text.
    Text,
}

/// A highlighted range.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Marker {
    /// Session-assigned id.
    pub id: MarkerId,
    /// Highlighted range.
    pub range: Range,
    /// Style class.
    pub class: String,
    /// How the range is painted.
    #[serde(rename = "type")]
    pub kind: MarkerType,
    /// Drawn above the text instead of below.
    pub in_front: bool,
}

impl EditSession {
    /// Add a marker and return its id.
    pub fn add_marker(
        &mut self,
        range: Range,
        class: &str,
        kind: MarkerType,
        in_front: bool,
    ) -> MarkerId {
        self.next_marker_id += 1;
        let id = MarkerId(self.next_marker_id);
        let marker = Marker {
            id,
            range,
            class: class.to_string(),
            kind,
            in_front,
        };
        if in_front {
            self.front_markers.insert(id, marker);
            self.emit(SessionEvent::ChangeFrontMarker);
        } else {
            self.back_markers.insert(id, marker);
            self.emit(SessionEvent::ChangeBackMarker);
        }
        id
    }

    /// Remove a marker from whichever layer holds it.
    pub fn remove_marker(&mut self, id: MarkerId) -> Option<Marker> {
        if let Some(marker) = self.front_markers.remove(&id) {
            self.emit(SessionEvent::ChangeFrontMarker);
            return Some(marker);
        }
        let marker = self.back_markers.remove(&id)?;
        self.emit(SessionEvent::ChangeBackMarker);
        Some(marker)
    }

    /// Markers of the front or back layer, by id.
    pub fn markers(&self, in_front: bool) -> &BTreeMap<MarkerId, Marker> {
        if in_front {
            &self.front_markers
        } else {
            &self.back_markers
        }
    }

    /// Highlight whole rows `start_row..=end_row` with a full-line marker.
    pub fn highlight_lines(
        &mut self,
        start_row: usize,
        end_row: usize,
        class: Option<&str>,
        in_front: bool,
    ) -> MarkerId {
        let range = Range::new(start_row, 0, end_row, usize::MAX);
        let class = class.unwrap_or(DEFAULT_HIGHLIGHT_CLASS);
        self.add_marker(range, class, MarkerType::FullLine, in_front)
    }

    /// Breakpoint classes by row.
    pub fn breakpoints(&self) -> &BTreeMap<usize, String> {
        &self.breakpoints
    }

    /// Replace every breakpoint with default ones on `rows`.
    pub fn set_breakpoints(&mut self, rows: &[usize]) {
        self.breakpoints = rows
            .iter()
            .map(|&row| (row, DEFAULT_BREAKPOINT_CLASS.to_string()))
            .collect();
        self.emit(SessionEvent::ChangeBreakpoint);
    }

    /// Remove every breakpoint.
    pub fn clear_breakpoints(&mut self) {
        self.breakpoints.clear();
        self.emit(SessionEvent::ChangeBreakpoint);
    }

    /// Set a breakpoint on `row`. `None` uses the default class; an empty class removes it.
    pub fn set_breakpoint(&mut self, row: usize, class: Option<&str>) {
        match class.unwrap_or(DEFAULT_BREAKPOINT_CLASS) {
            "" => {
                self.breakpoints.remove(&row);
            }
            class => {
                self.breakpoints.insert(row, class.to_string());
            }
        }
        self.emit(SessionEvent::ChangeBreakpoint);
    }

    /// Remove the breakpoint on `row`.
    pub fn clear_breakpoint(&mut self, row: usize) {
        self.breakpoints.remove(&row);
        self.emit(SessionEvent::ChangeBreakpoint);
    }

    /// Extra gutter classes by row, space separated.
    pub fn gutter_decorations(&self) -> &BTreeMap<usize, String> {
        &self.gutter_decorations
    }

    /// Add `class` to the gutter of `row`.
    pub fn add_gutter_decoration(&mut self, row: usize, class: &str) {
        let classes = self.gutter_decorations.entry(row).or_default();
        classes.push(' ');
        classes.push_str(class);
        self.emit(SessionEvent::ChangeBreakpoint);
    }

    /// Remove `class` from the gutter of `row`.
    pub fn remove_gutter_decoration(&mut self, row: usize, class: &str) {
        if let Some(classes) = self.gutter_decorations.get_mut(&row) {
            *classes = classes.replacen(&format!(" {class}"), "", 1);
            if classes.is_empty() {
                self.gutter_decorations.remove(&row);
            }
        }
        self.emit(SessionEvent::ChangeBreakpoint);
    }

    /// Replace the annotation set.
    pub fn set_annotations(&mut self, annotations: Vec<Annotation>) {
        tracing::trace!(count = annotations.len(), "annotations updated");
        self.annotations = annotations;
        self.emit(SessionEvent::ChangeAnnotation);
    }

    /// Drop every annotation.
    pub fn clear_annotations(&mut self) {
        self.set_annotations(Vec::new());
    }

    /// Current annotations, in the order they were reported.
    pub fn annotations(&self) -> &[Annotation] {
        &self.annotations
    }

    /// Annotations on `row`.
    pub fn annotations_for_row(&self, row: usize) -> impl Iterator<Item = &Annotation> {
        self.annotations.iter().filter(move |a| a.row == row)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::worker::AnnotationKind;
    use std::sync::{Arc, Mutex};

    fn recording(session: &mut EditSession) -> Arc<Mutex<Vec<SessionEvent>>> {
        let events = Arc::new(Mutex::new(Vec::new()));
        let sink = events.clone();
        session.subscribe(move |e: &SessionEvent| sink.lock().unwrap().push(e.clone()));
        events
    }

    #[test]
    fn test_markers_live_in_their_layer() {
        let mut s = EditSession::new("one\ntwo");
        let events = recording(&mut s);
        let back = s.add_marker(Range::new(0, 0, 0, 3), "hl", MarkerType::Text, false);
        let front = s.highlight_lines(1, 1, None, true);
        assert_ne!(back, front);
        assert_eq!(s.markers(false).len(), 1);
        assert_eq!(s.markers(true)[&front].class, "step");
        assert_eq!(s.markers(true)[&front].kind, MarkerType::FullLine);

        assert_eq!(s.remove_marker(front).unwrap().id, front);
        assert!(s.remove_marker(front).is_none());
        assert_eq!(
            *events.lock().unwrap(),
            vec![
                SessionEvent::ChangeBackMarker,
                SessionEvent::ChangeFrontMarker,
                SessionEvent::ChangeFrontMarker,
            ]
        );
    }

    #[test]
    fn test_breakpoints() {
        let mut s = EditSession::new("a\nb\nc");
        s.set_breakpoints(&[0, 2]);
        assert_eq!(s.breakpoints().keys().copied().collect::<Vec<_>>(), vec![0, 2]);
        s.set_breakpoint(1, Some("conditional"));
        assert_eq!(s.breakpoints()[&1], "conditional");
        s.set_breakpoint(1, Some(""));
        assert!(!s.breakpoints().contains_key(&1));
        s.clear_breakpoint(0);
        assert_eq!(s.breakpoints().len(), 1);
        s.clear_breakpoints();
        assert!(s.breakpoints().is_empty());
    }

    #[test]
    fn test_gutter_decorations_accumulate() {
        let mut s = EditSession::new("a");
        s.add_gutter_decoration(0, "error");
        s.add_gutter_decoration(0, "folded");
        assert_eq!(s.gutter_decorations()[&0], " error folded");
        s.remove_gutter_decoration(0, "error");
        assert_eq!(s.gutter_decorations()[&0], " folded");
        s.remove_gutter_decoration(0, "folded");
        assert!(s.gutter_decorations().is_empty());
    }

    #[test]
    fn test_annotations_by_row() {
        let mut s = EditSession::new("a\nb");
        s.set_annotations(vec![
            Annotation::new(1, AnnotationKind::Error, "bad"),
            Annotation::new(0, AnnotationKind::Info, "note"),
            Annotation::new(1, AnnotationKind::Warning, "meh"),
        ]);
        let texts: Vec<_> = s.annotations_for_row(1).map(|a| a.text.as_str()).collect();
        assert_eq!(texts, vec!["bad", "meh"]);
        s.clear_annotations();
        assert!(s.annotations().is_empty());
    }

    #[test]
    fn test_marker_wire_format() {
        let marker = Marker {
            id: MarkerId(3),
            range: Range::new(0, 0, 1, 0),
            class: "sel".to_string(),
            kind: MarkerType::ScreenLine,
            in_front: false,
        };
        let json = serde_json::to_value(&marker).unwrap();
        assert_eq!(json["type"], "screenLine");
    }
}
