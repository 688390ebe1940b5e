use crate::shared::frame::Frame;

use super::mask::Mask;

/// Standard deviations below this are treated as this value so a flat
/// region never divides by zero.
const STD_FLOOR: f64 = 1e-3;

#[derive(Clone, Copy, Debug)]
struct ChannelStats {
    mean: f64,
    std: f64,
}

fn masked_stats(frame: &Frame, mask: &Mask, channel: usize) -> ChannelStats {
    let channels = frame.channels() as usize;
    let data = frame.data();
    let (mut sum, mut sum_sq, mut n) = (0.0f64, 0.0f64, 0usize);
    for (i, _) in mask.data().iter().enumerate().filter(|(_, &m)| m > 0) {
        let v = data[i * channels + channel] as f64;
        sum += v;
        sum_sq += v * v;
        n += 1;
    }
    if n == 0 {
        return ChannelStats { mean: 0.0, std: STD_FLOOR };
    }
    let mean = sum / n as f64;
    let var = (sum_sq / n as f64 - mean * mean).max(0.0);
    ChannelStats {
        mean,
        std: var.sqrt().max(STD_FLOOR),
    }
}

/// Match the per-channel mean and standard deviation of the masked region of
/// `swapped` to the same region of `original`.
///
/// Pixels outside the mask are left byte-identical. An empty mask or a
/// layout mismatch returns `swapped` unchanged.
pub fn harmonize(swapped: &Frame, original: &Frame, mask: &Mask) -> Frame {
    if mask.is_empty()
        || !swapped.same_layout(original)
        || mask.width() != swapped.width()
        || mask.height() != swapped.height()
    {
        return swapped.clone();
    }
    let channels = swapped.channels() as usize;
    let mut out = swapped.clone();

    for ch in 0..channels {
        let from = masked_stats(swapped, mask, ch);
        let to = masked_stats(original, mask, ch);
        let gain = to.std / from.std;
        let src = swapped.data();
        let dst = out.data_mut();
        for (i, _) in mask.data().iter().enumerate().filter(|(_, &m)| m > 0) {
            let o = i * channels + ch;
            let v = (src[o] as f64 - from.mean) * gain + to.mean;
            dst[o] = v.round().clamp(0.0, 255.0) as u8;
        }
    }
    out
}
