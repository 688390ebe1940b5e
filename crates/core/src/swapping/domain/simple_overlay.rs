//! Last-resort face transfer: resize the donor's face box onto the target's
//! and alpha-blend it through a feathered ellipse.

use crate::compositing::mask::Mask;
use crate::compositing::resize::resize_bilinear;
use crate::detection::domain::landmark_set::LandmarkSet;
use crate::shared::frame::Frame;
use crate::shared::rect::Rect;

use super::donor_face::DonorFace;
use super::strategy_chain::{Candidate, EscalationReason};

/// Ellipse semi-axes as fractions of the box width and height.
const ELLIPSE_AXES: (f64, f64) = (0.45, 0.55);

/// Local contrast gain of the stronger variant.
const CONTRAST_GAIN: f64 = 1.2;

/// Alpha above which a pixel counts as replaced for harmonization.
const MASK_ALPHA_THRESHOLD: f32 = 10.0 / 255.0;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum OverlayVariant {
    Regular,
    /// Wider feathering and amplified contrast, used when the regular blend
    /// is judged a no-op.
    Strong,
}

pub struct SimpleOverlay {
    feather_kernel: usize,
}

impl SimpleOverlay {
    pub fn new(feather_kernel: usize) -> Self {
        Self { feather_kernel }
    }

    pub fn swap(
        &self,
        frame: &Frame,
        target: &LandmarkSet,
        donor: &DonorFace,
        variant: OverlayVariant,
    ) -> Result<Candidate, EscalationReason> {
        let target_box = face_box(target, frame)
            .ok_or_else(|| EscalationReason::Degenerate("target face box is empty".into()))?;
        let donor_box = face_box(donor.landmarks(), donor.frame())
            .ok_or_else(|| EscalationReason::Degenerate("donor face box is empty".into()))?;
        let donor_crop = donor
            .frame()
            .crop(donor_box)
            .ok_or_else(|| EscalationReason::Degenerate("donor crop is empty".into()))?;

        let (bw, bh) = (target_box.width as u32, target_box.height as u32);
        let mut patch = resize_bilinear(&donor_crop, bw, bh);
        let kernel = match variant {
            OverlayVariant::Regular => self.feather_kernel,
            OverlayVariant::Strong => 2 * self.feather_kernel + 1,
        };

        let mut ellipse = Mask::new(bw, bh);
        ellipse.fill_ellipse(
            (bw as f64 - 1.0) / 2.0,
            (bh as f64 - 1.0) / 2.0,
            bw as f64 * ELLIPSE_AXES.0,
            bh as f64 * ELLIPSE_AXES.1,
        );
        let alpha = ellipse.feathered(kernel);
        if variant == OverlayVariant::Strong {
            amplify_contrast(&mut patch, &alpha);
        }

        let mut out = frame.clone();
        blend_into(&mut out, &patch, &alpha, target_box);
        let mask = Mask::from_alpha(bw, bh, &alpha, MASK_ALPHA_THRESHOLD).embedded(
            frame.width(),
            frame.height(),
            target_box.x,
            target_box.y,
        );
        Ok(Candidate { frame: out, mask })
    }
}

fn face_box(landmarks: &LandmarkSet, frame: &Frame) -> Option<Rect> {
    landmarks
        .bounding_rect()?
        .clamp_to(frame.width(), frame.height())
}

/// Push each channel away from its alpha-weighted mean.
fn amplify_contrast(patch: &mut Frame, alpha: &[f32]) {
    let channels = patch.channels() as usize;
    let weight: f64 = alpha.iter().map(|&a| a as f64).sum();
    if weight <= 0.0 {
        return;
    }
    let data = patch.data_mut();
    for ch in 0..channels {
        let mean = data
            .chunks_exact(channels)
            .zip(alpha)
            .map(|(px, &a)| px[ch] as f64 * a as f64)
            .sum::<f64>()
            / weight;
        for px in data.chunks_exact_mut(channels) {
            let v = (px[ch] as f64 - mean) * CONTRAST_GAIN + mean;
            px[ch] = v.round().clamp(0.0, 255.0) as u8;
        }
    }
}

fn blend_into(canvas: &mut Frame, patch: &Frame, alpha: &[f32], at: Rect) {
    let channels = canvas.channels() as usize;
    let cw = canvas.width() as usize;
    let pw = patch.width() as usize;
    let src = patch.data();
    let dst = canvas.data_mut();
    for y in 0..patch.height() as usize {
        for x in 0..pw {
            let a = alpha[y * pw + x];
            if a <= 0.0 {
                continue;
            }
            let o = ((at.y as usize + y) * cw + at.x as usize + x) * channels;
            let p = (y * pw + x) * channels;
            for c in 0..channels {
                let v = src[p + c] as f32 * a + dst[o + c] as f32 * (1.0 - a);
                dst[o + c] = v.round().clamp(0.0, 255.0) as u8;
            }
        }
    }
}
