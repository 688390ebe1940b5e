//! Face replacement pipeline: locate a face in every frame, substitute a
//! donor face through a chain of fallback strategies, and write the frames
//! back out in their original order.

pub mod compositing;
pub mod detection;
pub mod pipeline;
pub mod shared;
pub mod swapping;
pub mod video;
