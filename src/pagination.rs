//! Page arithmetic for column-paginated content
//!
//! The reader lays the assembled document out in fixed-size columns (or
//! rows, for vertical writing) and scrolls one page at a time. A page is
//! one `page_size` step of scroll offset along the reading axis, so every
//! conversion here is plain arithmetic on that step:
//!
//! | operation | formula |
//! |-----------|---------|
//! | [`page_from_scroll`](Paginator::page_from_scroll) | `1 + ceil(o / s)` |
//! | [`align_to_page_start`](Paginator::align_to_page_start) | `floor(o / s) * s` |
//! | [`align_to_page_end`](Paginator::align_to_page_end) | `ceil(o / s) * s` |
//! | [`page_of_element`](Paginator::page_of_element) | `page_from_scroll(align_to_page_start(o))` |
//!
//! Element geometry is supplied by the host through [`TargetLocator`].

use crate::error::PaginationError;
use crate::geometry::Rect;
use crate::navigation::{flatten, NavPoint};

/// Axis along which pages advance.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ReadingDirection {
    /// Pages advance along x (`scrollLeft`)
    #[default]
    Horizontal,
    /// Pages advance along y (`scrollTop`)
    Vertical,
}

/// Resolves a navigation target to its laid-out rectangle.
///
/// Rectangles must be in content coordinates: the offset from the start of
/// the scrollable content, not from the viewport.
pub trait TargetLocator {
    fn locate(&self, target: &str) -> Option<Rect>;
}

impl<F> TargetLocator for F
where
    F: Fn(&str) -> Option<Rect>,
{
    fn locate(&self, target: &str) -> Option<Rect> {
        self(target)
    }
}

/// Result of [`Paginator::chapter_at_page`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ChapterAtPage<'a> {
    /// Deepest-last entry starting on or before the page
    Found(&'a NavPoint),
    /// Every annotated entry starts after the page
    BeforeFirst,
    /// No entry carries a page yet
    Unannotated,
}

/// Page geometry for one layout.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Paginator {
    page_size: f64,
    direction: ReadingDirection,
}

impl Paginator {
    /// `page_size` is the column width (or height) plus the column gap.
    pub fn new(page_size: f64, direction: ReadingDirection) -> Result<Self, PaginationError> {
        if !page_size.is_finite() || page_size <= 0.0 {
            return Err(PaginationError::InvalidPageSize(page_size));
        }
        Ok(Self {
            page_size,
            direction,
        })
    }

    pub fn page_size(&self) -> f64 {
        self.page_size
    }

    pub fn direction(&self) -> ReadingDirection {
        self.direction
    }

    /// 1-based page shown at scroll offset `offset`. Never below 1.
    pub fn page_from_scroll(&self, offset: f64) -> u32 {
        1 + steps(offset / self.page_size, f64::ceil)
    }

    pub fn align_to_page_start(&self, offset: f64) -> f64 {
        (offset / self.page_size).floor() * self.page_size
    }

    pub fn align_to_page_end(&self, offset: f64) -> f64 {
        (offset / self.page_size).ceil() * self.page_size
    }

    /// Page on which an element starting at `offset` is displayed.
    pub fn page_of_element(&self, offset: f64) -> u32 {
        // Same as page_from_scroll(align_to_page_start(offset)) without
        // the round trip through a multiplied float.
        1 + steps(offset / self.page_size, f64::floor)
    }

    /// Coordinate of `rect` along the reading axis.
    pub fn axis_offset(&self, rect: &Rect) -> f64 {
        match self.direction {
            ReadingDirection::Horizontal => rect.x,
            ReadingDirection::Vertical => rect.y,
        }
    }

    /// Page-aligned scroll destination: round up when moving forward,
    /// down when moving back.
    pub fn snap_scroll_target(&self, current: f64, target: f64) -> f64 {
        if target > current {
            self.align_to_page_end(target)
        } else {
            self.align_to_page_start(target)
        }
    }

    /// Number of pages needed for content of length `extent`. At least 1.
    pub fn page_count(&self, extent: f64) -> u32 {
        steps(extent / self.page_size, f64::ceil).max(1)
    }

    /// Scroll offset at which `page` starts.
    pub fn scroll_for_page(&self, page: u32) -> f64 {
        f64::from(page.saturating_sub(1)) * self.page_size
    }

    /// Set `page` on every TOC entry whose target the locator can place.
    ///
    /// Walks depth-first and always descends, so children of an unplaced
    /// entry are still annotated. Entries that cannot be placed end up with
    /// `page = None`, including ones annotated by an earlier layout.
    /// Returns the number of entries that received a page.
    pub fn annotate_toc<L: TargetLocator + ?Sized>(&self, toc: &mut [NavPoint], locator: &L) -> usize {
        let mut annotated = 0;
        for point in toc.iter_mut() {
            point.page = locator
                .locate(&point.target)
                .map(|rect| self.page_of_element(self.axis_offset(&rect)));
            if point.page.is_some() {
                annotated += 1;
            }
            annotated += self.annotate_toc(&mut point.children, locator);
        }
        annotated
    }

    /// The TOC entry a reader on `page` is inside: the last entry in
    /// document order whose page is at most `page`.
    pub fn chapter_at_page<'a>(&self, toc: &'a [NavPoint], page: u32) -> ChapterAtPage<'a> {
        let flat = flatten(toc);
        if flat.iter().all(|p| p.page.is_none()) {
            return ChapterAtPage::Unannotated;
        }
        match flat
            .into_iter()
            .rev()
            .find(|p| p.page.is_some_and(|start| start <= page))
        {
            Some(point) => ChapterAtPage::Found(point),
            None => ChapterAtPage::BeforeFirst,
        }
    }
}

/// Round `ratio` with `round` and clamp into `0..=u32::MAX`.
fn steps(ratio: f64, round: fn(f64) -> f64) -> u32 {
    let rounded = round(ratio);
    if rounded.is_nan() || rounded <= 0.0 {
        0
    } else if rounded >= f64::from(u32::MAX) {
        u32::MAX
    } else {
        rounded as u32
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn paginator(size: f64) -> Paginator {
        Paginator::new(size, ReadingDirection::Horizontal).unwrap()
    }

    fn point(label: &str, children: Vec<NavPoint>) -> NavPoint {
        let mut p = NavPoint::new(label, format!("epub://{}.xhtml", label));
        p.children = children;
        p
    }

    #[test]
    fn test_rejects_bad_page_sizes() {
        for size in [0.0, -1.0, f64::NAN, f64::INFINITY] {
            assert!(Paginator::new(size, ReadingDirection::Vertical).is_err());
        }
    }

    #[test]
    fn test_page_from_scroll() {
        let p = paginator(100.0);
        assert_eq!(p.page_from_scroll(0.0), 1);
        assert_eq!(p.page_from_scroll(1.0), 2);
        assert_eq!(p.page_from_scroll(100.0), 2);
        assert_eq!(p.page_from_scroll(250.0), 4);
        assert_eq!(p.page_from_scroll(-30.0), 1);
        assert_eq!(p.page_from_scroll(f64::NAN), 1);
    }

    #[test]
    fn test_page_is_at_least_one() {
        let p = paginator(37.5);
        for i in -20..200 {
            assert!(p.page_from_scroll(f64::from(i) * 3.3) >= 1);
            assert!(p.page_of_element(f64::from(i) * 3.3) >= 1);
        }
    }

    #[test]
    fn test_floor_alignment_is_idempotent() {
        let p = paginator(120.0);
        for o in [0.0, 1.0, 119.9, 120.0, 121.0, 999.0] {
            let once = p.align_to_page_start(o);
            assert_eq!(p.align_to_page_start(once), once);
            assert!(once <= o);
        }
    }

    #[test]
    fn test_ceiling_alignment_against_floor() {
        let p = paginator(100.0);
        assert_eq!(p.align_to_page_start(150.0), 100.0);
        assert_eq!(p.align_to_page_end(150.0), 200.0);
        // On a boundary both agree
        assert_eq!(p.align_to_page_start(300.0), 300.0);
        assert_eq!(p.align_to_page_end(300.0), 300.0);
        for o in [1.0, 99.0, 101.0, 555.5] {
            assert_eq!(p.align_to_page_end(o) - p.align_to_page_start(o), 100.0);
        }
    }

    #[test]
    fn test_page_of_element_matches_composed_definition() {
        let p = paginator(100.0);
        for o in [0.0, 50.0, 99.0, 100.0, 150.0, 420.0] {
            assert_eq!(p.page_of_element(o), p.page_from_scroll(p.align_to_page_start(o)));
        }
        assert_eq!(p.page_of_element(150.0), 2);
    }

    #[test]
    fn test_snap_scroll_target_direction() {
        let p = paginator(100.0);
        assert_eq!(p.snap_scroll_target(100.0, 130.0), 200.0);
        assert_eq!(p.snap_scroll_target(200.0, 130.0), 100.0);
        assert_eq!(p.snap_scroll_target(200.0, 200.0), 200.0);
    }

    #[test]
    fn test_page_count_and_scroll_for_page() {
        let p = paginator(100.0);
        assert_eq!(p.page_count(0.0), 1);
        assert_eq!(p.page_count(100.0), 1);
        assert_eq!(p.page_count(101.0), 2);
        assert_eq!(p.scroll_for_page(1), 0.0);
        assert_eq!(p.scroll_for_page(3), 200.0);
        assert_eq!(p.scroll_for_page(0), 0.0);
        assert_eq!(p.page_from_scroll(p.scroll_for_page(5)), 5);
    }

    #[test]
    fn test_axis_offset_follows_direction() {
        let rect = Rect::new(300.0, 40.0, 10.0, 10.0);
        assert_eq!(paginator(100.0).axis_offset(&rect), 300.0);
        let vertical = Paginator::new(100.0, ReadingDirection::Vertical).unwrap();
        assert_eq!(vertical.axis_offset(&rect), 40.0);
    }

    #[test]
    fn test_annotate_toc_recurses_past_unresolved_and_clears_stale() {
        let p = paginator(100.0);
        let mut toc = vec![
            point("a", vec![point("a1", vec![]), point("a2", vec![])]),
            point("b", vec![]),
        ];
        toc[1].page = Some(99);

        let locator = |target: &str| match target {
            "epub://a1.xhtml" => Some(Rect::new(150.0, 0.0, 1.0, 1.0)),
            "epub://a2.xhtml" => Some(Rect::new(420.0, 0.0, 1.0, 1.0)),
            _ => None,
        };
        assert_eq!(p.annotate_toc(&mut toc, &locator), 2);
        assert_eq!(toc[0].page, None);
        assert_eq!(toc[0].children[0].page, Some(2));
        assert_eq!(toc[0].children[1].page, Some(5));
        assert_eq!(toc[1].page, None);
    }

    #[test]
    fn test_chapter_at_page() {
        let p = paginator(100.0);
        let mut toc = vec![
            point("a", vec![point("a1", vec![])]),
            point("b", vec![]),
        ];
        assert_eq!(p.chapter_at_page(&toc, 3), ChapterAtPage::Unannotated);

        toc[0].page = Some(2);
        toc[0].children[0].page = Some(3);
        toc[1].page = Some(6);

        assert_eq!(p.chapter_at_page(&toc, 1), ChapterAtPage::BeforeFirst);
        assert!(matches!(p.chapter_at_page(&toc, 2), ChapterAtPage::Found(n) if n.label == "a"));
        assert!(matches!(p.chapter_at_page(&toc, 5), ChapterAtPage::Found(n) if n.label == "a1"));
        assert!(matches!(p.chapter_at_page(&toc, 60), ChapterAtPage::Found(n) if n.label == "b"));
    }
}
