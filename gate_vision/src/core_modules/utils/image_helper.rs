use crate::core_modules::motion_box::MotionBox;
use image::{GrayImage, ImageEncoder, Luma};
use imageproc::drawing::draw_hollow_rect_mut;
use imageproc::rect::Rect;
use std::path::Path;

const MARKER: Luma<u8> = Luma([0]);

/// Writes a grayscale image as PNG.
pub fn save_gray<P: AsRef<Path>>(path: P, image: &GrayImage) -> Result<(), image::error::ImageError> {
    let output = std::fs::File::create(path)?;
    let encoder = image::codecs::png::PngEncoder::new(output);

    encoder.write_image(
        image.as_raw(),
        image.width(),
        image.height(),
        image::ExtendedColorType::L8,
    )?;

    Ok(())
}

/// Draws a 2 px black frame around `motion_box`, leaving a 2 px gap.
pub fn draw_box_marker(image: &mut GrayImage, motion_box: &MotionBox) {
    let x = motion_box.x as i32;
    let y = motion_box.y as i32;
    draw_hollow_rect_mut(image, Rect::at(x - 2, y - 2).of_size(motion_box.w + 6, motion_box.h + 6), MARKER);
    draw_hollow_rect_mut(image, Rect::at(x - 1, y - 1).of_size(motion_box.w + 4, motion_box.h + 4), MARKER);
}

/// Marks the crossing column with a 1 px black line.
pub fn draw_center_line(image: &mut GrayImage, column: u32) {
    if column >= image.width() {
        return;
    }
    for y in 0..image.height() {
        image.put_pixel(column, y, MARKER);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn save_marked_file() {
        let mut image = GrayImage::from_pixel(320, 240, Luma([255]));
        draw_box_marker(&mut image, &MotionBox::new(150, 100, 20, 20, 1));
        draw_center_line(&mut image, 160);
        let path = std::env::temp_dir().join(format!("gate_vision_marked_{}.png", std::process::id()));

        save_gray(&path, &image).expect("Error Saving File.");
        let reloaded = image::open(&path).expect("Error Reading File.").to_luma8();
        assert_eq!(reloaded, image);
        let _ = std::fs::remove_file(&path);
    }

    #[test]
    fn marker_surrounds_box_without_covering_it() {
        let mut image = GrayImage::from_pixel(100, 100, Luma([255]));
        draw_box_marker(&mut image, &MotionBox::new(40, 40, 10, 10, 1));
        assert_eq!(image.get_pixel(38, 38)[0], 0);
        assert_eq!(image.get_pixel(39, 45)[0], 0);
        assert_eq!(image.get_pixel(40, 40)[0], 255);
        assert_eq!(image.get_pixel(45, 45)[0], 255);
    }

    #[test]
    fn marker_clips_at_image_border() {
        let mut image = GrayImage::from_pixel(20, 20, Luma([255]));
        draw_box_marker(&mut image, &MotionBox::new(0, 0, 25, 25, 1));
        draw_center_line(&mut image, 40);
        assert_eq!(image.get_pixel(10, 10)[0], 255);
    }
}
