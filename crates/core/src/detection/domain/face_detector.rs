use crate::shared::error::BoxError;
use crate::shared::frame::Frame;
use crate::shared::rect::Rect;

/// One detected face box in frame coordinates.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Detection {
    pub x1: f64,
    pub y1: f64,
    pub x2: f64,
    pub y2: f64,
    pub score: f64,
}

impl Detection {
    pub fn width(&self) -> f64 {
        self.x2 - self.x1
    }

    pub fn height(&self) -> f64 {
        self.y2 - self.y1
    }

    pub fn area(&self) -> f64 {
        self.width().max(0.0) * self.height().max(0.0)
    }

    pub fn to_rect(&self) -> Rect {
        let x = self.x1.floor() as i32;
        let y = self.y1.floor() as i32;
        Rect::new(x, y, self.x2.ceil() as i32 - x, self.y2.ceil() as i32 - y)
    }
}

/// Domain interface for face detection.
///
/// Implementations are shared by every worker, hence `&self` and `Sync`.
/// `multiscale` asks for extra scale passes that trade latency for recall.
pub trait FaceDetector: Send + Sync {
    fn detect(&self, frame: &Frame, multiscale: bool) -> Result<Vec<Detection>, BoxError>;
}
