//! Pixel-level building blocks shared by the swap strategies: masks,
//! warps, triangulation, blending and color transfer.

pub mod affine;
pub mod color_harmonizer;
pub mod delaunay;
pub mod gaussian;
pub mod mask;
pub mod resize;
pub mod seamless;
