//! Obstacle detection pipeline: ROI extraction, saturation/Laplacian/Canny
//! mask fusion, morphology, contour segmentation, and danger classification.
//!
//! Ported from the reference `ObstacleDetector.detect()`. Gaussian blur and
//! morphological close/open/dilate are implemented as small local functions
//! rather than via `imageproc`'s blur/morphology helpers, whose exact
//! generic signatures differ across versions; `imageproc` is used for the
//! two operations whose API is stable across versions, Canny edges and
//! external contour extraction.

use image::{GrayImage, Luma, RgbImage};
use imageproc::contours::{find_contours, Contour};
use imageproc::edges::canny;

use crate::config::DetectorConfig;

const SAT_THRESHOLD: u8 = 70;
const LAP_THRESHOLD: u8 = 25;
const CANNY_LOW: f32 = 60.0;
const CANNY_HIGH: f32 = 120.0;
const ROI_TOP: f32 = 0.25;
const ROI_BOTTOM: f32 = 0.95;
const DIST_THRESHOLD_SIDE: f32 = 0.45;
const DIST_THRESHOLD_CENTER: f32 = 0.50;
const MAX_ASPECT_RATIO: f32 = 8.0;
const MIN_HEIGHT: u32 = 35;

/// Discrete danger level for the current frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Danger {
    Ok,
    Obs,
    Warn,
    Stop,
}

/// Lateral / aggregate obstacle position summary.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Position {
    None,
    Left,
    Right,
    Center,
    Both,
}

/// Size bucket derived from bounding-box area.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Size {
    Small,
    Medium,
    Large,
}

/// One detected obstacle, in full-frame coordinates.
#[derive(Debug, Clone, Copy)]
pub struct Obstacle {
    pub bbox: (u32, u32, u32, u32),
    pub zone: Zone,
    pub distance: f32,
    pub size: Size,
}

/// Lateral zone of a single obstacle (as opposed to the frame-wide [`Position`]).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Zone {
    Left,
    Center,
    Right,
}

/// Stateless obstacle detector: a pure function of a frame and its
/// (constant) configuration thresholds.
pub struct Detector {
    min_area: u32,
    stop_distance_threshold: f32,
}

impl Detector {
    pub fn new(config: &DetectorConfig) -> Self {
        Self {
            min_area: config.min_area,
            stop_distance_threshold: config.stop_distance_threshold,
        }
    }

    /// Run the full pipeline on one frame, returning the obstacles found and
    /// the resulting danger/position summary.
    pub fn detect(&self, frame: &RgbImage) -> (Vec<Obstacle>, Danger, Position) {
        let (w, h) = frame.dimensions();
        let y1 = (h as f32 * ROI_TOP) as u32;
        let y2 = (h as f32 * ROI_BOTTOM) as u32;
        let roi_height = y2.saturating_sub(y1).max(1);

        let roi = image::imageops::crop_imm(frame, 0, y1, w, roi_height).to_image();

        let gray = to_gray(&roi);
        let saturation = to_saturation(&roi);

        let blurred_gray = box_blur(&gray, 4);
        let blurred_sat = box_blur(&saturation, 4);

        let sat_mask = threshold(&blurred_sat, SAT_THRESHOLD);
        let lap_mask = threshold(&laplacian_abs(&blurred_gray), LAP_THRESHOLD);
        let edge_mask = canny(&blurred_gray, CANNY_LOW, CANNY_HIGH);

        let mut combined = bitwise_or(&sat_mask, &lap_mask);
        combined = bitwise_or(&combined, &edge_mask);

        combined = close(&combined, 3);
        combined = open(&combined, 1);
        combined = dilate(&combined, 1);

        let contours = find_contours::<i32>(&combined);

        let third_w = w / 3;
        let mut obstacles = Vec::new();
        let mut has_left = false;
        let mut has_right = false;
        let mut has_center = false;
        let mut closest_center_dist = 0.0f32;

        for contour in &contours {
            let Some((x, y, bw, bh)) = bounding_box(contour) else {
                continue;
            };
            let area = (bw * bh) as u32;
            if area < self.min_area {
                continue;
            }

            let aspect_ratio = bw / bh.max(1.0);
            if aspect_ratio > MAX_ASPECT_RATIO {
                continue;
            }
            if (bh as u32) < MIN_HEIGHT {
                continue;
            }

            let y_global = y as u32 + y1;
            let cx = x + bw / 2.0;
            let dist = (y + bh) / roi_height as f32;

            let zone = if cx < third_w as f32 {
                if dist > DIST_THRESHOLD_SIDE {
                    has_left = true;
                }
                Zone::Left
            } else if cx > (2 * third_w) as f32 {
                if dist > DIST_THRESHOLD_SIDE {
                    has_right = true;
                }
                Zone::Right
            } else {
                if dist > DIST_THRESHOLD_CENTER {
                    has_center = true;
                    closest_center_dist = closest_center_dist.max(dist);
                }
                Zone::Center
            };

            let size = if area < 5000 {
                Size::Small
            } else if area < 15000 {
                Size::Medium
            } else {
                Size::Large
            };

            obstacles.push(Obstacle {
                bbox: (x as u32, y_global, bw as u32, bh as u32),
                zone,
                distance: dist,
                size,
            });
        }

        let (danger, position) = if has_center && closest_center_dist > self.stop_distance_threshold
        {
            (Danger::Stop, Position::Center)
        } else if has_center {
            (Danger::Warn, Position::Center)
        } else if has_left && has_right {
            (Danger::Warn, Position::Both)
        } else if has_left {
            (Danger::Obs, Position::Left)
        } else if has_right {
            (Danger::Obs, Position::Right)
        } else {
            (Danger::Ok, Position::None)
        };

        (obstacles, danger, position)
    }
}

fn to_gray(img: &RgbImage) -> GrayImage {
    image::DynamicImage::ImageRgb8(img.clone()).to_luma8()
}

/// Extract the saturation channel of the HSV representation of `img`.
fn to_saturation(img: &RgbImage) -> GrayImage {
    GrayImage::from_fn(img.width(), img.height(), |x, y| {
        let p = img.get_pixel(x, y);
        let (r, g, b) = (p[0] as f32, p[1] as f32, p[2] as f32);
        let max = r.max(g).max(b);
        let min = r.min(g).min(b);
        let s = if max > 0.0 { (max - min) / max } else { 0.0 };
        Luma([(s * 255.0).round() as u8])
    })
}

/// Approximate a Gaussian blur with a box filter of the given radius,
/// applied separably (horizontal pass then vertical pass).
fn box_blur(img: &GrayImage, radius: u32) -> GrayImage {
    let h_pass = box_blur_1d(img, radius, true);
    box_blur_1d(&h_pass, radius, false)
}

fn box_blur_1d(img: &GrayImage, radius: u32, horizontal: bool) -> GrayImage {
    let (w, h) = img.dimensions();
    let r = radius as i64;
    GrayImage::from_fn(w, h, |x, y| {
        let mut sum: u32 = 0;
        let mut count: u32 = 0;
        for d in -r..=r {
            let (sx, sy) = if horizontal {
                (x as i64 + d, y as i64)
            } else {
                (x as i64, y as i64 + d)
            };
            if sx >= 0 && sy >= 0 && (sx as u32) < w && (sy as u32) < h {
                sum += img.get_pixel(sx as u32, sy as u32)[0] as u32;
                count += 1;
            }
        }
        Luma([(sum / count.max(1)) as u8])
    })
}

/// Absolute value of the 3x3 Laplacian of `img`.
fn laplacian_abs(img: &GrayImage) -> GrayImage {
    let (w, h) = img.dimensions();
    GrayImage::from_fn(w, h, |x, y| {
        let center = img.get_pixel(x, y)[0] as i32 * 4;
        let mut neighbours = 0i32;
        let coords = [
            (x as i64 - 1, y as i64),
            (x as i64 + 1, y as i64),
            (x as i64, y as i64 - 1),
            (x as i64, y as i64 + 1),
        ];
        for (nx, ny) in coords {
            if nx >= 0 && ny >= 0 && (nx as u32) < w && (ny as u32) < h {
                neighbours += img.get_pixel(nx as u32, ny as u32)[0] as i32;
            }
        }
        let value = (center - neighbours).unsigned_abs().min(255);
        Luma([value as u8])
    })
}

fn threshold(img: &GrayImage, thresh: u8) -> GrayImage {
    GrayImage::from_fn(img.width(), img.height(), |x, y| {
        let v = img.get_pixel(x, y)[0];
        Luma([if v > thresh { 255 } else { 0 }])
    })
}

fn bitwise_or(a: &GrayImage, b: &GrayImage) -> GrayImage {
    GrayImage::from_fn(a.width(), a.height(), |x, y| {
        let av = a.get_pixel(x, y)[0];
        let bv = b.get_pixel(x, y)[0];
        Luma([av.max(bv)])
    })
}

fn dilate(img: &GrayImage, radius: i64) -> GrayImage {
    morph(img, radius, true)
}

fn erode(img: &GrayImage, radius: i64) -> GrayImage {
    morph(img, radius, false)
}

fn morph(img: &GrayImage, radius: i64, is_dilate: bool) -> GrayImage {
    let (w, h) = img.dimensions();
    GrayImage::from_fn(w, h, |x, y| {
        let mut acc = if is_dilate { 0u8 } else { 255u8 };
        for dy in -radius..=radius {
            for dx in -radius..=radius {
                let (sx, sy) = (x as i64 + dx, y as i64 + dy);
                let v = if sx >= 0 && sy >= 0 && (sx as u32) < w && (sy as u32) < h {
                    img.get_pixel(sx as u32, sy as u32)[0]
                } else if is_dilate {
                    0
                } else {
                    255
                };
                acc = if is_dilate { acc.max(v) } else { acc.min(v) };
            }
        }
        Luma([acc])
    })
}

fn close(img: &GrayImage, radius: i64) -> GrayImage {
    erode(&dilate(img, radius), radius)
}

fn open(img: &GrayImage, radius: i64) -> GrayImage {
    dilate(&erode(img, radius), radius)
}

/// Bounding box of a contour as `(x, y, width, height)` in ROI coordinates,
/// used both as the contour's footprint and as a bounding-area proxy for
/// `cv2.contourArea` (the traced border is assumed filled, which holds for
/// the blob-like obstacle shapes this pipeline targets).
fn bounding_box(contour: &Contour<i32>) -> Option<(f32, f32, f32, f32)> {
    if contour.points.is_empty() {
        return None;
    }
    let mut min_x = i32::MAX;
    let mut min_y = i32::MAX;
    let mut max_x = i32::MIN;
    let mut max_y = i32::MIN;
    for p in &contour.points {
        min_x = min_x.min(p.x);
        min_y = min_y.min(p.y);
        max_x = max_x.max(p.x);
        max_y = max_y.max(p.y);
    }
    Some((
        min_x as f32,
        min_y as f32,
        (max_x - min_x + 1) as f32,
        (max_y - min_y + 1) as f32,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgb;

    fn blank_frame(w: u32, h: u32) -> RgbImage {
        RgbImage::from_pixel(w, h, Rgb([40, 40, 40]))
    }

    fn detector() -> Detector {
        Detector::new(&DetectorConfig {
            min_area: 4000,
            stop_distance_threshold: 0.65,
        })
    }

    #[test]
    fn empty_frame_yields_ok() {
        let frame = blank_frame(640, 240);
        let (obstacles, danger, position) = detector().detect(&frame);
        assert!(obstacles.is_empty());
        assert_eq!(danger, Danger::Ok);
        assert_eq!(position, Position::None);
    }

    #[test]
    fn bright_blob_near_bottom_center_triggers_danger() {
        let mut frame = blank_frame(640, 240);
        for y in 170..230 {
            for x in 260..380 {
                frame.put_pixel(x, y, Rgb([230, 40, 40]));
            }
        }
        let (obstacles, danger, _position) = detector().detect(&frame);
        assert!(!obstacles.is_empty());
        assert!(matches!(danger, Danger::Warn | Danger::Stop));
    }

    #[test]
    fn danger_ordering_is_monotonic() {
        assert!(Danger::Ok < Danger::Obs);
        assert!(Danger::Obs < Danger::Warn);
        assert!(Danger::Warn < Danger::Stop);
    }

    fn paint_blob(frame: &mut RgbImage, x0: u32, y0: u32, bw: u32, bh: u32) {
        let (w, h) = frame.dimensions();
        for y in y0..(y0 + bh).min(h) {
            for x in x0..(x0 + bw).min(w) {
                frame.put_pixel(x, y, Rgb([230, 30, 30]));
            }
        }
    }

    /// P7: adding an extra obstacle to an otherwise-identical frame never
    /// makes the reported danger level lower.
    #[test]
    fn adding_an_obstacle_never_decreases_danger() {
        let base = blank_frame(640, 240);
        let (_, danger_base, _) = detector().detect(&base);

        let mut with_right_obstacle = base.clone();
        paint_blob(&mut with_right_obstacle, 480, 180, 120, 50);
        let (_, danger_one, _) = detector().detect(&with_right_obstacle);
        assert!(danger_one >= danger_base);

        let mut with_both_obstacles = with_right_obstacle.clone();
        paint_blob(&mut with_both_obstacles, 20, 180, 120, 50);
        let (_, danger_two, _) = detector().detect(&with_both_obstacles);
        assert!(danger_two >= danger_one);
    }

    #[test]
    fn box_blur_is_identity_on_flat_image() {
        let img = GrayImage::from_pixel(20, 20, Luma([100]));
        let blurred = box_blur(&img, 4);
        for p in blurred.pixels() {
            assert_eq!(p[0], 100);
        }
    }

    #[test]
    fn threshold_splits_at_boundary() {
        let img = GrayImage::from_fn(2, 1, |x, _| Luma([if x == 0 { 50 } else { 200 } as u8]));
        let out = threshold(&img, 100);
        assert_eq!(out.get_pixel(0, 0)[0], 0);
        assert_eq!(out.get_pixel(1, 0)[0], 255);
    }
}
