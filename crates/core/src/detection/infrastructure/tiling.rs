//! Multi-scale detection by re-running a detector on overlapping tiles.
//!
//! Each tile covers 60 % of the frame in both directions, so a face that is
//! small relative to the whole frame appears larger to the model.

use crate::detection::domain::face_detector::Detection;
use crate::shared::error::BoxError;
use crate::shared::frame::Frame;
use crate::shared::rect::Rect;

use super::math::nms;

const TILE_FRACTION: f64 = 0.6;

/// The 2×2 grid of overlapping tiles for a `width` × `height` frame.
pub fn tiles(width: u32, height: u32) -> Vec<Rect> {
    let tw = ((width as f64 * TILE_FRACTION).ceil() as i32).max(1);
    let th = ((height as f64 * TILE_FRACTION).ceil() as i32).max(1);
    let xs = [0, (width as i32 - tw).max(0)];
    let ys = [0, (height as i32 - th).max(0)];
    ys.iter()
        .flat_map(|&y| xs.iter().map(move |&x| Rect::new(x, y, tw, th)))
        .collect()
}

/// Run `detect_once` on the whole frame and, when `multiscale` is set, on
/// every tile; tile hits are mapped back to frame coordinates and merged
/// with NMS.
pub fn detect_tiled<F>(
    frame: &Frame,
    multiscale: bool,
    iou_thresh: f64,
    detect_once: F,
) -> Result<Vec<Detection>, BoxError>
where
    F: Fn(&Frame) -> Result<Vec<Detection>, BoxError>,
{
    let mut all = detect_once(frame)?;
    if !multiscale {
        return Ok(all);
    }
    for tile in tiles(frame.width(), frame.height()) {
        let Some(crop) = frame.crop(tile) else {
            continue;
        };
        let (dx, dy) = (tile.x as f64, tile.y as f64);
        all.extend(detect_once(&crop)?.into_iter().map(|d| Detection {
            x1: d.x1 + dx,
            y1: d.y1 + dy,
            x2: d.x2 + dx,
            y2: d.y2 + dy,
            score: d.score,
        }));
    }
    Ok(nms(all, iou_thresh))
}
