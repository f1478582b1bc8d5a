// THEORY:
// The region extractor is the low-level image layer of the engine. It turns a
// pair of grayscale frames into a list of rectangular regions of change.
//
// Algorithm steps:
// 1.  **Smoothing**: Each incoming frame is Gaussian blurred before anything
//     else. Sensor noise is spatially uncorrelated, so blurring removes most
//     of it while leaving a moving subject's outline intact.
// 2.  **Differencing**: The absolute per-pixel difference against the previous
//     smoothed frame is thresholded very low (anything above 2 grey levels)
//     into a binary mask. A low threshold keeps faint, partially occluded
//     subjects.
// 3.  **Dilation**: The mask is dilated with a square structuring element so
//     that the fragments of one subject (the leading and trailing edge of a
//     body, say) merge into a single blob.
// 4.  **Outlines**: Only the outermost contour of every blob is kept; holes and
//     islands inside holes belong to the blob around them. Each outline becomes
//     a `MotionBox` with its enclosed polygon area.
// 5.  **Stateless Utility**: Nothing here remembers previous frames. The
//     stateful baseline lives in the `MotionDetector`.

pub mod region_extractor {
    use crate::core_modules::motion_box::MotionBox;
    use image::{GrayImage, Luma};
    use imageproc::contours::{find_contours, BorderType};
    use imageproc::distance_transform::Norm;
    use imageproc::point::Point;

    const MASK_ON: u8 = 255;

    /// Blurs a grayscale frame ahead of differencing.
    pub fn smooth(image: &GrayImage, sigma: f32) -> GrayImage {
        imageproc::filter::gaussian_blur_f32(image, sigma)
    }

    /// Builds the dilated binary change mask between two smoothed frames of equal size.
    pub fn motion_mask(
        baseline: &GrayImage,
        current: &GrayImage,
        threshold: u8,
        dilate_radius: u8,
    ) -> GrayImage {
        let mask = GrayImage::from_fn(current.width(), current.height(), |x, y| {
            let before = baseline.get_pixel(x, y)[0];
            let after = current.get_pixel(x, y)[0];
            if before.abs_diff(after) > threshold {
                Luma([MASK_ON])
            } else {
                Luma([0])
            }
        });

        if dilate_radius == 0 {
            return mask;
        }
        // A radius-k L-infinity dilation equals k passes of a 3x3 square kernel.
        imageproc::morphology::dilate(&mask, Norm::LInf, dilate_radius)
    }

    /// Extracts one box per external outline in `mask`, in scan order.
    pub fn extract_boxes(mask: &GrayImage, frame_number: u64) -> Vec<MotionBox> {
        // Contour tracing only starts an outer border next to a background
        // pixel, so blobs touching the image border need a margin around them.
        let mut padded = GrayImage::new(mask.width() + 2, mask.height() + 2);
        image::imageops::replace(&mut padded, mask, 1, 1);

        find_contours::<i32>(&padded)
            .into_iter()
            .filter(|contour| contour.border_type == BorderType::Outer && contour.parent.is_none())
            .filter_map(|contour| bounding_box(&contour.points, frame_number))
            .collect()
    }

    fn bounding_box(points: &[Point<i32>], frame_number: u64) -> Option<MotionBox> {
        let first = points.first()?;
        let (mut min_x, mut min_y, mut max_x, mut max_y) = (first.x, first.y, first.x, first.y);
        for point in points {
            min_x = min_x.min(point.x);
            min_y = min_y.min(point.y);
            max_x = max_x.max(point.x);
            max_y = max_y.max(point.y);
        }

        let width = (max_x - min_x + 1) as u32;
        let height = (max_y - min_y + 1) as u32;
        // Points are in padded coordinates.
        let (x, y) = ((min_x - 1).max(0) as u32, (min_y - 1).max(0) as u32);
        Some(
            MotionBox::new(x, y, width, height, frame_number)
                .with_area(polygon_area(points)),
        )
    }

    /// Shoelace area of the closed outline through the contour's pixel centres.
    fn polygon_area(points: &[Point<i32>]) -> u32 {
        if points.len() < 3 {
            return 0;
        }
        let twice_area: i64 = points
            .iter()
            .zip(points.iter().cycle().skip(1))
            .map(|(a, b)| a.x as i64 * b.y as i64 - b.x as i64 * a.y as i64)
            .sum();
        (twice_area.unsigned_abs() / 2) as u32
    }
}
