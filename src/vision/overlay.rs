//! Debug overlay: ROI band, zone dividers, obstacle boxes, and a danger
//! indicator swatch, mirroring the reference `ObstacleDetector.draw()`.

use image::{Rgb, RgbImage};

use super::detector::{Danger, Obstacle};

const ROI_TOP: f32 = 0.25;
const ROI_BOTTOM: f32 = 0.95;

fn danger_color(danger: Danger) -> Rgb<u8> {
    match danger {
        Danger::Ok => Rgb([0, 255, 0]),
        Danger::Obs => Rgb([220, 220, 0]),
        Danger::Warn => Rgb([255, 140, 0]),
        Danger::Stop => Rgb([255, 0, 0]),
    }
}

/// Draw the ROI band, Left/Center/Right dividers, obstacle bounding boxes,
/// and a danger-colour swatch onto `frame` in place.
pub fn draw(frame: &mut RgbImage, obstacles: &[Obstacle], danger: Danger) {
    let (w, h) = frame.dimensions();
    let y1 = (h as f32 * ROI_TOP) as u32;
    let y2 = (h as f32 * ROI_BOTTOM) as u32;
    let third_w = w / 3;
    let color = danger_color(danger);

    draw_rect_outline(frame, 0, y1, w.saturating_sub(1), y2, Rgb([60, 60, 60]));
    draw_vline(frame, third_w, y1, y2, Rgb([40, 40, 40]));
    draw_vline(frame, 2 * third_w, y1, y2, Rgb([40, 40, 40]));

    for obstacle in obstacles {
        let (x, y, bw, bh) = obstacle.bbox;
        draw_rect_outline(frame, x, y, x + bw, y + bh, color);
    }

    // Danger indicator swatch, top-right corner.
    let swatch_x0 = w.saturating_sub(60);
    let swatch_x1 = w.saturating_sub(5);
    fill_rect(frame, swatch_x0, 5, swatch_x1, 28, color);
}

fn draw_vline(frame: &mut RgbImage, x: u32, y0: u32, y1: u32, color: Rgb<u8>) {
    if x >= frame.width() {
        return;
    }
    for y in y0..y1.min(frame.height()) {
        frame.put_pixel(x, y, color);
    }
}

fn draw_rect_outline(frame: &mut RgbImage, x0: u32, y0: u32, x1: u32, y1: u32, color: Rgb<u8>) {
    let (w, h) = frame.dimensions();
    let x1 = x1.min(w.saturating_sub(1));
    let y1 = y1.min(h.saturating_sub(1));
    for x in x0..=x1 {
        if x < w {
            frame.put_pixel(x, y0.min(h - 1), color);
            frame.put_pixel(x, y1, color);
        }
    }
    for y in y0..=y1 {
        if y < h {
            frame.put_pixel(x0.min(w - 1), y, color);
            frame.put_pixel(x1, y, color);
        }
    }
}

fn fill_rect(frame: &mut RgbImage, x0: u32, y0: u32, x1: u32, y1: u32, color: Rgb<u8>) {
    let (w, h) = frame.dimensions();
    for y in y0..y1.min(h) {
        for x in x0..x1.min(w) {
            frame.put_pixel(x, y, color);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vision::detector::{Size, Zone};

    #[test]
    fn draw_does_not_panic_on_empty_obstacles() {
        let mut frame = RgbImage::from_pixel(100, 60, Rgb([0, 0, 0]));
        draw(&mut frame, &[], Danger::Ok);
    }

    #[test]
    fn draw_paints_obstacle_box() {
        let mut frame = RgbImage::from_pixel(100, 60, Rgb([0, 0, 0]));
        let obstacle = Obstacle {
            bbox: (10, 10, 20, 20),
            zone: Zone::Center,
            distance: 0.7,
            size: Size::Medium,
        };
        draw(&mut frame, &[obstacle], Danger::Stop);
        assert_eq!(*frame.get_pixel(10, 10), Rgb([255, 0, 0]));
    }
}
