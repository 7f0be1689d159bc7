//! Axis-aligned rectangles in layout coordinates

extern crate alloc;

use alloc::vec;
use alloc::vec::Vec;

/// Rectangle as reported by a layout engine (`x`/`y` is the top-left corner).
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Rect {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl Rect {
    pub fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    pub fn right(&self) -> f64 {
        self.x + self.width
    }

    pub fn bottom(&self) -> f64 {
        self.y + self.height
    }

    /// True when `other` lies entirely inside `self`, edges included.
    pub fn contains(&self, other: &Rect) -> bool {
        other.x >= self.x
            && other.y >= self.y
            && other.right() <= self.right()
            && other.bottom() <= self.bottom()
    }
}

/// Drop rectangles that are fully contained in another one.
///
/// Used to collapse the per-line client rects of a highlight before drawing
/// overlays. A rectangle already dropped is never used as a container, so
/// of two identical rectangles exactly one survives. Order is preserved.
pub fn filter_contained(rects: &[Rect]) -> Vec<Rect> {
    let mut removed = vec![false; rects.len()];
    for i in 0..rects.len() {
        if removed[i] {
            continue;
        }
        for j in 0..rects.len() {
            if i == j || removed[j] {
                continue;
            }
            if rects[i].contains(&rects[j]) {
                removed[j] = true;
            }
        }
    }
    rects
        .iter()
        .zip(removed)
        .filter(|(_, gone)| !gone)
        .map(|(r, _)| *r)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_contains_is_edge_inclusive() {
        let outer = Rect::new(0.0, 0.0, 10.0, 10.0);
        assert!(outer.contains(&outer));
        assert!(outer.contains(&Rect::new(0.0, 0.0, 10.0, 5.0)));
        assert!(!outer.contains(&Rect::new(5.0, 5.0, 6.0, 1.0)));
        assert_eq!(outer.right(), 10.0);
        assert_eq!(outer.bottom(), 10.0);
    }

    #[test]
    fn test_filter_single_and_empty() {
        let one = [Rect::new(1.0, 2.0, 3.0, 4.0)];
        assert_eq!(filter_contained(&one), one.to_vec());
        assert!(filter_contained(&[]).is_empty());
    }

    #[test]
    fn test_filter_removes_contained() {
        let line = Rect::new(0.0, 0.0, 100.0, 20.0);
        let word = Rect::new(10.0, 2.0, 30.0, 16.0);
        let next_line = Rect::new(0.0, 20.0, 80.0, 20.0);
        assert_eq!(filter_contained(&[word, line, next_line]), vec![line, next_line]);
    }

    #[test]
    fn test_identical_rects_keep_exactly_one() {
        let r = Rect::new(5.0, 5.0, 10.0, 10.0);
        assert_eq!(filter_contained(&[r, r]), vec![r]);
        assert_eq!(filter_contained(&[r, r, r]), vec![r]);
    }

    #[test]
    fn test_partial_overlap_keeps_both() {
        let a = Rect::new(0.0, 0.0, 10.0, 10.0);
        let b = Rect::new(5.0, 5.0, 10.0, 10.0);
        assert_eq!(filter_contained(&[a, b]).len(), 2);
    }
}
