//! Frame composition on the CPU: scene + behavior panel + label banner

use image::imageops::{self, FilterType};
use image::{Rgba, RgbaImage};

/// Stack the 3-D view over the behavior frame panel on a `width x height` canvas.
///
/// The scene is pasted at the top; the video frame is scaled to fit the
/// remaining rows (keeping its aspect) and centred horizontally.
pub fn compose(
    scene: &RgbaImage,
    video: Option<&RgbaImage>,
    width: u32,
    height: u32,
    background: [u8; 3],
) -> RgbaImage {
    let [r, g, b] = background;
    let mut canvas = RgbaImage::from_pixel(width, height, Rgba([r, g, b, 255]));
    imageops::overlay(&mut canvas, scene, 0, 0);

    let panel_top = scene.height().min(height);
    let panel_height = height - panel_top;
    if let Some(frame) = video {
        if panel_height > 0 && frame.width() > 0 && frame.height() > 0 {
            let (w, h) = fit_within(frame.width(), frame.height(), width, panel_height);
            let scaled = imageops::resize(frame, w, h, FilterType::Triangle);
            let x = (width - w) / 2;
            let y = panel_top + (panel_height - h) / 2;
            imageops::overlay(&mut canvas, &scaled, x as i64, y as i64);
        }
    }

    canvas
}

/// Largest size with the source aspect ratio that fits the box
fn fit_within(src_w: u32, src_h: u32, box_w: u32, box_h: u32) -> (u32, u32) {
    let scale = (box_w as f64 / src_w as f64).min(box_h as f64 / src_h as f64);
    let w = ((src_w as f64 * scale).round() as u32).clamp(1, box_w);
    let h = ((src_h as f64 * scale).round() as u32).clamp(1, box_h);
    (w, h)
}

/// Alpha-blend the label banner into the top-left corner.
///
/// The banner spans a quarter of the width and a twentieth of the height.
pub fn draw_banner(canvas: &mut RgbaImage, color: [u8; 3], opacity: f64) {
    let alpha = opacity.clamp(0.0, 1.0);
    if alpha == 0.0 {
        return;
    }
    let margin = (canvas.height() / 60).max(1);
    let w = (canvas.width() / 4).max(1);
    let h = (canvas.height() / 20).max(1);
    blend_rect(canvas, margin, margin, w, h, color, alpha);
}

fn blend_rect(canvas: &mut RgbaImage, x0: u32, y0: u32, w: u32, h: u32, color: [u8; 3], alpha: f64) {
    let x1 = x0.saturating_add(w).min(canvas.width());
    let y1 = y0.saturating_add(h).min(canvas.height());
    for y in y0..y1 {
        for x in x0..x1 {
            let pixel = canvas.get_pixel_mut(x, y);
            for c in 0..3 {
                let under = pixel[c] as f64;
                pixel[c] = (under + (color[c] as f64 - under) * alpha).round() as u8;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fit_within_keeps_aspect() {
        assert_eq!(fit_within(640, 480, 320, 100), (133, 100));
        assert_eq!(fit_within(100, 10, 50, 50), (50, 5));
    }

    #[test]
    fn test_compose_places_scene_and_video() {
        let scene = RgbaImage::from_pixel(40, 30, Rgba([255, 0, 0, 255]));
        let video = RgbaImage::from_pixel(20, 10, Rgba([0, 0, 255, 255]));
        let canvas = compose(&scene, Some(&video), 40, 40, [255, 255, 255]);

        assert_eq!(canvas.dimensions(), (40, 40));
        assert_eq!(canvas.get_pixel(5, 5), &Rgba([255, 0, 0, 255]));
        // panel is 40x10, video scaled to 20x10 and centred
        assert_eq!(canvas.get_pixel(20, 35), &Rgba([0, 0, 255, 255]));
        assert_eq!(canvas.get_pixel(2, 35), &Rgba([255, 255, 255, 255]));
    }

    #[test]
    fn test_compose_without_video_keeps_background() {
        let scene = RgbaImage::from_pixel(10, 8, Rgba([9, 9, 9, 255]));
        let canvas = compose(&scene, None, 10, 10, [1, 2, 3]);
        assert_eq!(canvas.get_pixel(0, 9), &Rgba([1, 2, 3, 255]));
    }

    #[test]
    fn test_banner_blends_with_opacity() {
        let mut canvas = RgbaImage::from_pixel(120, 120, Rgba([0, 0, 0, 255]));
        draw_banner(&mut canvas, [200, 100, 0], 0.5);
        assert_eq!(canvas.get_pixel(5, 5), &Rgba([100, 50, 0, 255]));
        // outside the banner untouched
        assert_eq!(canvas.get_pixel(100, 100), &Rgba([0, 0, 0, 255]));
    }

    #[test]
    fn test_zero_opacity_banner_is_invisible() {
        let mut canvas = RgbaImage::from_pixel(60, 60, Rgba([7, 7, 7, 255]));
        let before = canvas.clone();
        draw_banner(&mut canvas, [255, 255, 255], 0.0);
        assert_eq!(canvas, before);
    }
}
