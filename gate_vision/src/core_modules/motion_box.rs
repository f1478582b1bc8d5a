// THEORY:
// A `MotionBox` is the spatial unit of the whole engine. It is the bounding
// rectangle of one contiguous region of frame-to-frame change, stamped with the
// frame it was found in.
//
// Key architectural principles:
// 1.  **Dumb Data Container**: Like `Frame`, a `MotionBox` knows nothing about
//     history or direction. It is produced fresh by the region extractor every
//     frame and never mutated afterwards.
// 2.  **Geometry Helpers**: The handful of geometric questions the detector and
//     the direction resolver ask (does it straddle a column, does it overlap
//     another box, how similar in size are two boxes) live here so both layers
//     answer them the same way.
// 3.  **Inclusive Edges**: Overlap is tested with inclusive edges. Two boxes
//     that merely touch still count as overlapping.

/// The bounding rectangle of a single region of motion in one frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MotionBox {
    /// Left edge in pixels.
    pub x: u32,
    /// Top edge in pixels.
    pub y: u32,
    /// Width in pixels.
    pub w: u32,
    /// Height in pixels.
    pub h: u32,
    /// Enclosed area of the region's outline in square pixels.
    pub area: u32,
    /// The frame this region was extracted from.
    pub frame_number: u64,
}

impl MotionBox {
    /// Creates a box whose area is its full rectangle.
    pub fn new(x: u32, y: u32, w: u32, h: u32, frame_number: u64) -> Self {
        Self {
            x,
            y,
            w,
            h,
            area: w * h,
            frame_number,
        }
    }

    /// Replaces the derived area, e.g. with a contour's polygon area.
    pub fn with_area(mut self, area: u32) -> Self {
        self.area = area;
        self
    }

    /// The trailing (right) edge, `x + w`.
    pub fn right(&self) -> u32 {
        self.x + self.w
    }

    /// The bottom edge, `y + h`.
    pub fn bottom(&self) -> u32 {
        self.y + self.h
    }

    pub fn rect_area(&self) -> u32 {
        self.w * self.h
    }

    /// True when both boxes describe exactly the same rectangle.
    pub fn same_geometry(&self, other: &MotionBox) -> bool {
        self.x == other.x && self.y == other.y && self.w == other.w && self.h == other.h
    }

    /// True when the horizontal span strictly contains `column`.
    pub fn straddles_column(&self, column: u32) -> bool {
        self.x < column && self.right() > column
    }

    /// Axis-aligned overlap test with inclusive edges.
    pub fn overlaps(&self, other: &MotionBox) -> bool {
        !(self.right() < other.x
            || self.x > other.right()
            || self.bottom() < other.y
            || self.y > other.bottom())
    }

    /// `min(area) / max(area)` of the two bounding rectangles, in `[0, 1]`.
    pub fn size_ratio(&self, other: &MotionBox) -> f64 {
        let a = self.rect_area() as f64;
        let b = other.rect_area() as f64;
        let larger = a.max(b);
        if larger == 0.0 {
            return 0.0;
        }
        a.min(b) / larger
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn straddle_requires_strict_containment() {
        let b = MotionBox::new(140, 10, 20, 20, 1);
        assert!(!b.straddles_column(160)); // right edge sits on the column
        assert!(b.straddles_column(150));
        assert!(!b.straddles_column(140));
        assert!(MotionBox::new(141, 10, 20, 20, 1).straddles_column(160));
    }

    #[test]
    fn touching_boxes_overlap() {
        let a = MotionBox::new(10, 10, 10, 10, 1);
        let touching = MotionBox::new(20, 20, 5, 5, 1);
        let apart = MotionBox::new(21, 10, 5, 5, 1);
        let below = MotionBox::new(10, 21, 5, 5, 1);
        assert!(a.overlaps(&touching));
        assert!(touching.overlaps(&a));
        assert!(!a.overlaps(&apart));
        assert!(!a.overlaps(&below));
    }

    #[test]
    fn size_ratio_is_symmetric() {
        let small = MotionBox::new(0, 0, 10, 10, 1);
        let large = MotionBox::new(0, 0, 20, 20, 1);
        assert_eq!(small.size_ratio(&large), 0.25);
        assert_eq!(large.size_ratio(&small), 0.25);
        assert_eq!(small.size_ratio(&MotionBox::new(0, 0, 0, 0, 1)), 0.0);
    }

    #[test]
    fn contour_area_overrides_rectangle() {
        let b = MotionBox::new(5, 5, 20, 20, 3).with_area(361);
        assert_eq!(b.area, 361);
        assert_eq!(b.rect_area(), 400);
        assert!(b.same_geometry(&MotionBox::new(5, 5, 20, 20, 9)));
    }
}
