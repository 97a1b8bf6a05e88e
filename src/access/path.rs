//! Dot-separated path helpers
//!
//! Layer paths (`school.classroom`) and node paths (`s1.c7`) share the same
//! shape, so the same helpers derive parents and segments for both.

/// Segment separator for layer and node paths
pub const SEPARATOR: char = '.';

/// Parent of a path, or `None` for a single-segment path.
pub fn parent(path: &str) -> Option<&str> {
    path.rsplit_once(SEPARATOR).map(|(parent, _)| parent)
}

/// Last segment of a path (the whole path when it has a single segment).
pub fn last_segment(path: &str) -> &str {
    path.rsplit_once(SEPARATOR)
        .map(|(_, last)| last)
        .unwrap_or(path)
}

/// Iterate over segments.
pub fn segments(path: &str) -> impl Iterator<Item = &str> {
    path.split(SEPARATOR)
}

/// Pick the id that sits at the position of `layer` inside a token.
///
/// Tokens carry a layer path and a parallel id path, e.g. layer
/// `school.classroom` with id `s1.c7`. Asking for `classroom` yields `c7`.
/// When the layer name occurs more than once the last occurrence wins.
pub fn segment_for_layer<'a>(token_layer: &str, token_id: &'a str, layer: &str) -> Option<&'a str> {
    let ids: Vec<&'a str> = token_id.split(SEPARATOR).collect();
    segments(token_layer)
        .enumerate()
        .filter(|(_, segment)| *segment == layer)
        .last()
        .and_then(|(position, _)| ids.get(position).copied())
}
