//! Gradient-domain (Poisson) blending.
//!
//! Inside the mask the result keeps the source's gradients; on the mask
//! boundary it takes the destination's values, so the seam disappears and
//! the pasted patch adopts the surrounding brightness.

use crate::shared::frame::Frame;

use super::mask::Mask;

const MAX_ITERATIONS: usize = 500;
const TOLERANCE: f32 = 0.05;
const RELAXATION: f32 = 1.9;

struct Node {
    pixel: usize,
    /// Neighbours inside the mask.
    inner: Vec<usize>,
    /// Neighbours outside the mask (boundary samples from the destination).
    outer: Vec<usize>,
}

/// Blend the masked region of `source` into `destination`.
///
/// Pixels outside the mask are copied from `destination`. Frame-border
/// neighbours are ignored, so a mask touching the edge behaves as if the
/// image were mirrored there. Layout mismatches return `source` unchanged.
pub fn seamless_blend(source: &Frame, destination: &Frame, mask: &Mask) -> Frame {
    if !source.same_layout(destination)
        || mask.width() != source.width()
        || mask.height() != source.height()
    {
        return source.clone();
    }
    let (w, h) = (source.width() as usize, source.height() as usize);
    let channels = source.channels() as usize;
    let inside = |i: usize| mask.data()[i] > 0;

    let nodes: Vec<Node> = (0..w * h)
        .filter(|&i| inside(i))
        .map(|i| {
            let (x, y) = (i % w, i / w);
            let mut inner = Vec::with_capacity(4);
            let mut outer = Vec::with_capacity(4);
            let candidates = [
                (x > 0).then(|| i - 1),
                (x + 1 < w).then(|| i + 1),
                (y > 0).then(|| i - w),
                (y + 1 < h).then(|| i + w),
            ];
            for q in candidates.into_iter().flatten() {
                if inside(q) {
                    inner.push(q);
                } else {
                    outer.push(q);
                }
            }
            Node {
                pixel: i,
                inner,
                outer,
            }
        })
        .collect();

    let mut out = destination.data().to_vec();
    if nodes.is_empty() {
        return Frame::new(out, source.width(), source.height(), source.channels(), source.index());
    }

    let src = source.data();
    let dst = destination.data();

    for ch in 0..channels {
        let g = |i: usize| src[i * channels + ch] as f32;
        let d = |i: usize| dst[i * channels + ch] as f32;

        // Start from the source shifted to the boundary's mean level.
        let (mut shift, mut samples) = (0.0f32, 0usize);
        for node in &nodes {
            for &q in &node.outer {
                shift += d(q) - g(node.pixel);
                samples += 1;
            }
        }
        let shift = if samples > 0 { shift / samples as f32 } else { 0.0 };

        let mut f = vec![0.0f32; w * h];
        let constants: Vec<f32> = nodes
            .iter()
            .map(|node| {
                f[node.pixel] = g(node.pixel) + shift;
                let guidance: f32 = node.inner.iter().map(|&q| g(node.pixel) - g(q)).sum();
                let boundary: f32 = node.outer.iter().map(|&q| d(q)).sum();
                guidance + boundary
            })
            .collect();

        for _ in 0..MAX_ITERATIONS {
            let mut max_delta = 0.0f32;
            for (node, &constant) in nodes.iter().zip(&constants) {
                let degree = node.inner.len() + node.outer.len();
                if degree == 0 {
                    continue;
                }
                let neighbours: f32 = node.inner.iter().map(|&q| f[q]).sum();
                let target = (neighbours + constant) / degree as f32;
                let current = f[node.pixel];
                let next = current + RELAXATION * (target - current);
                max_delta = max_delta.max((next - current).abs());
                f[node.pixel] = next;
            }
            if max_delta < TOLERANCE {
                break;
            }
        }

        for node in &nodes {
            out[node.pixel * channels + ch] = f[node.pixel].round().clamp(0.0, 255.0) as u8;
        }
    }

    Frame::new(out, source.width(), source.height(), source.channels(), source.index())
}
