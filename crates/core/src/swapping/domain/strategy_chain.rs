//! The per-frame fallback state machine:
//! neural → geometric → simple overlay → pass-through.
//!
//! Every stage's output goes through the same [`FailurePredicate`]; a stage
//! that faults, is unavailable, produces a degenerate result, or changes too
//! little escalates to the next one. Pass-through always terminates the
//! chain, so a valid frame of the input's shape is always produced.

use std::fmt;
use std::sync::Arc;

use crate::compositing::mask::Mask;
use crate::detection::domain::face_region::FaceRegion;
use crate::detection::domain::landmark_set::LandmarkSet;
use crate::shared::frame::Frame;
use crate::shared::swap_config::{Engine, SwapConfig};

use super::donor_face::DonorFace;
use super::failure_predicate::{FailurePredicate, Verdict};
use super::geometric_warp::GeometricWarp;
use super::neural_swap::NeuralSwap;
use super::simple_overlay::{OverlayVariant, SimpleOverlay};

/// A stage's output together with the region it replaced.
#[derive(Clone, Debug)]
pub struct Candidate {
    pub frame: Frame,
    pub mask: Mask,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum SwapStage {
    Neural,
    Geometric,
    Simple,
    Passthrough,
}

impl SwapStage {
    pub const ALL: [SwapStage; 4] = [
        SwapStage::Neural,
        SwapStage::Geometric,
        SwapStage::Simple,
        SwapStage::Passthrough,
    ];

    pub fn first(engine: Engine) -> Self {
        match engine {
            Engine::Neural => SwapStage::Neural,
            Engine::Geometric => SwapStage::Geometric,
        }
    }

    pub fn next(self) -> Self {
        match self {
            SwapStage::Neural => SwapStage::Geometric,
            SwapStage::Geometric => SwapStage::Simple,
            SwapStage::Simple | SwapStage::Passthrough => SwapStage::Passthrough,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            SwapStage::Neural => "neural",
            SwapStage::Geometric => "geometric",
            SwapStage::Simple => "simple",
            SwapStage::Passthrough => "passthrough",
        }
    }
}

impl fmt::Display for SwapStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Why a stage handed the frame on to the next one.
#[derive(Clone, Debug, PartialEq)]
pub enum EscalationReason {
    Unavailable,
    Fault(String),
    Degenerate(String),
    NoOp { diff: f64 },
    ShapeMismatch,
    NoFace,
}

impl fmt::Display for EscalationReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EscalationReason::Unavailable => write!(f, "unavailable"),
            EscalationReason::Fault(e) => write!(f, "fault: {e}"),
            EscalationReason::Degenerate(why) => write!(f, "degenerate: {why}"),
            EscalationReason::NoOp { diff } => write!(f, "no-op (mean diff {diff:.2})"),
            EscalationReason::ShapeMismatch => write!(f, "output shape mismatch"),
            EscalationReason::NoFace => write!(f, "no face landmarks"),
        }
    }
}

#[derive(Clone, Debug)]
pub struct SwapOutcome {
    pub frame: Frame,
    pub stage: SwapStage,
    pub escalations: Vec<(SwapStage, EscalationReason)>,
    /// Replaced region; `None` for pass-through.
    pub mask: Option<Mask>,
}

impl SwapOutcome {
    fn passthrough(frame: &Frame, escalations: Vec<(SwapStage, EscalationReason)>) -> Self {
        Self {
            frame: frame.clone(),
            stage: SwapStage::Passthrough,
            escalations,
            mask: None,
        }
    }
}

pub struct StrategyChain {
    engine: Engine,
    neural: Option<Arc<dyn NeuralSwap>>,
    geometric: GeometricWarp,
    simple: SimpleOverlay,
    predicate: FailurePredicate,
}

impl StrategyChain {
    pub fn new(config: &SwapConfig, neural: Option<Arc<dyn NeuralSwap>>) -> Self {
        Self {
            engine: config.engine,
            neural,
            geometric: GeometricWarp::new(config.min_triangles),
            simple: SimpleOverlay::new(config.feather_kernel()),
            predicate: FailurePredicate::new(config.failure_epsilon),
        }
    }

    pub fn has_neural(&self) -> bool {
        self.neural.is_some()
    }

    /// Replace the face described by `target` in `frame` with the donor's.
    pub fn run(&self, frame: &Frame, target: &LandmarkSet, donor: &DonorFace) -> SwapOutcome {
        let mut escalations = Vec::new();
        if target.is_empty() || donor.landmarks().is_empty() {
            escalations.push((SwapStage::first(self.engine), EscalationReason::NoFace));
            return SwapOutcome::passthrough(frame, escalations);
        }

        let mut stage = SwapStage::first(self.engine);
        loop {
            let attempt = match stage {
                SwapStage::Neural => self
                    .try_neural(frame, target, donor)
                    .and_then(|c| self.judge(c, frame)),
                SwapStage::Geometric => self
                    .geometric
                    .swap(frame, target, donor)
                    .and_then(|c| self.judge(c, frame)),
                SwapStage::Simple => self.try_simple(frame, target, donor),
                SwapStage::Passthrough => {
                    return SwapOutcome::passthrough(frame, escalations);
                }
            };
            match attempt {
                Ok(candidate) => {
                    return SwapOutcome {
                        frame: candidate.frame,
                        stage,
                        escalations,
                        mask: Some(candidate.mask),
                    };
                }
                Err(reason) => {
                    log::debug!("Frame {}: {stage} stage escalated ({reason})", frame.index());
                    escalations.push((stage, reason));
                    stage = stage.next();
                }
            }
        }
    }

    fn judge(&self, candidate: Candidate, original: &Frame) -> Result<Candidate, EscalationReason> {
        match self.predicate.evaluate(&candidate.frame, original) {
            Verdict::Accepted { .. } => Ok(candidate),
            Verdict::NoOp { diff } => Err(EscalationReason::NoOp { diff }),
            Verdict::ShapeMismatch => Err(EscalationReason::ShapeMismatch),
        }
    }

    fn try_neural(
        &self,
        frame: &Frame,
        target: &LandmarkSet,
        donor: &DonorFace,
    ) -> Result<Candidate, EscalationReason> {
        let neural = self.neural.as_ref().ok_or(EscalationReason::Unavailable)?;
        let region = FaceRegion::from_landmarks(target).ok_or(EscalationReason::NoFace)?;
        let swapped = neural
            .apply(frame, &region, donor)
            .map_err(|e| EscalationReason::Fault(e.to_string()))?;
        let mut mask = Mask::new(frame.width(), frame.height());
        mask.fill_convex_polygon(&region.hull);
        Ok(Candidate {
            frame: swapped,
            mask,
        })
    }

    /// Regular overlay first; if that is judged a no-op the stronger variant
    /// is accepted without another check.
    fn try_simple(
        &self,
        frame: &Frame,
        target: &LandmarkSet,
        donor: &DonorFace,
    ) -> Result<Candidate, EscalationReason> {
        let regular = self
            .simple
            .swap(frame, target, donor, OverlayVariant::Regular)?;
        match self.judge(regular, frame) {
            Ok(candidate) => Ok(candidate),
            Err(reason) => {
                log::debug!(
                    "Frame {}: regular overlay rejected ({reason}), using strong variant",
                    frame.index()
                );
                self.simple
                    .swap(frame, target, donor, OverlayVariant::Strong)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shared::error::BoxError;
    use crate::shared::test_fixtures::{
        donor_frame, face_frame, grid_landmarks, striped_donor_frame, DONOR_COLOR,
    };
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct FaultingNeural {
        calls: AtomicUsize,
    }

    impl NeuralSwap for FaultingNeural {
        fn apply(&self, _: &Frame, _: &FaceRegion, _: &DonorFace) -> Result<Frame, BoxError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Err("inference engine crashed".into())
        }
    }

    /// Inverts the frame, which is never a no-op.
    struct InvertingNeural;

    impl NeuralSwap for InvertingNeural {
        fn apply(&self, frame: &Frame, _: &FaceRegion, _: &DonorFace) -> Result<Frame, BoxError> {
            let mut out = frame.clone();
            for v in out.data_mut() {
                *v = 255 - *v;
            }
            Ok(out)
        }
    }

    /// Returns its input untouched.
    struct IdentityNeural;

    impl NeuralSwap for IdentityNeural {
        fn apply(&self, frame: &Frame, _: &FaceRegion, _: &DonorFace) -> Result<Frame, BoxError> {
            Ok(frame.clone())
        }
    }

    struct WrongShapeNeural;

    impl NeuralSwap for WrongShapeNeural {
        fn apply(&self, _: &Frame, _: &FaceRegion, _: &DonorFace) -> Result<Frame, BoxError> {
            Ok(Frame::filled(2, 2, [0, 0, 0], 0))
        }
    }

    fn chain(engine: Engine, neural: Option<Arc<dyn NeuralSwap>>) -> StrategyChain {
        let config = SwapConfig {
            engine,
            ..SwapConfig::default()
        };
        StrategyChain::new(&config, neural)
    }

    fn stages(outcome: &SwapOutcome) -> Vec<SwapStage> {
        outcome.escalations.iter().map(|(s, _)| *s).collect()
    }

    // ── Stage transitions ────────────────────────────────────────────

    #[test]
    fn test_stage_order() {
        assert_eq!(SwapStage::first(Engine::Neural), SwapStage::Neural);
        assert_eq!(SwapStage::first(Engine::Geometric), SwapStage::Geometric);
        assert_eq!(SwapStage::Neural.next(), SwapStage::Geometric);
        assert_eq!(SwapStage::Geometric.next(), SwapStage::Simple);
        assert_eq!(SwapStage::Simple.next(), SwapStage::Passthrough);
        assert_eq!(SwapStage::Passthrough.next(), SwapStage::Passthrough);
    }

    #[test]
    fn test_empty_target_is_passthrough() {
        let frame = face_frame(3);
        let donor = DonorFace::new(donor_frame(), grid_landmarks());
        let out = chain(Engine::Neural, None).run(&frame, &LandmarkSet::empty(), &donor);
        assert_eq!(out.stage, SwapStage::Passthrough);
        assert_eq!(out.frame, frame);
        assert!(out.mask.is_none());
    }

    #[test]
    fn test_empty_donor_is_passthrough() {
        let frame = face_frame(0);
        let donor = DonorFace::new(donor_frame(), LandmarkSet::empty());
        let out = chain(Engine::Geometric, None).run(&frame, &grid_landmarks(), &donor);
        assert_eq!(out.stage, SwapStage::Passthrough);
        assert_eq!(out.frame, frame);
    }

    #[test]
    fn test_neural_accepted() {
        let frame = face_frame(0);
        let donor = DonorFace::new(donor_frame(), grid_landmarks());
        let out = chain(Engine::Neural, Some(Arc::new(InvertingNeural)))
            .run(&frame, &grid_landmarks(), &donor);
        assert_eq!(out.stage, SwapStage::Neural);
        assert!(out.escalations.is_empty());
        assert!(out.mask.is_some_and(|m| m.is_set(32, 32)));
    }

    #[test]
    fn test_neural_fault_runs_geometric() {
        let frame = face_frame(0);
        let donor = DonorFace::new(striped_donor_frame(), grid_landmarks());
        let neural = Arc::new(FaultingNeural {
            calls: AtomicUsize::new(0),
        });
        let out = chain(Engine::Neural, Some(neural.clone()))
            .run(&frame, &grid_landmarks(), &donor);
        assert_eq!(neural.calls.load(Ordering::SeqCst), 1);
        assert_eq!(out.stage, SwapStage::Geometric);
        assert!(matches!(
            out.escalations[0],
            (SwapStage::Neural, EscalationReason::Fault(_))
        ));
    }

    #[test]
    fn test_missing_neural_is_unavailable() {
        let frame = face_frame(0);
        let donor = DonorFace::new(striped_donor_frame(), grid_landmarks());
        let out = chain(Engine::Neural, None).run(&frame, &grid_landmarks(), &donor);
        assert_eq!(out.stage, SwapStage::Geometric);
        assert_eq!(
            out.escalations,
            vec![(SwapStage::Neural, EscalationReason::Unavailable)]
        );
    }

    #[test]
    fn test_neural_no_op_escalates() {
        let frame = face_frame(0);
        let donor = DonorFace::new(striped_donor_frame(), grid_landmarks());
        let out = chain(Engine::Neural, Some(Arc::new(IdentityNeural)))
            .run(&frame, &grid_landmarks(), &donor);
        assert_eq!(out.stage, SwapStage::Geometric);
        assert!(matches!(out.escalations[0].1, EscalationReason::NoOp { .. }));
    }

    #[test]
    fn test_neural_wrong_shape_escalates() {
        let frame = face_frame(0);
        let donor = DonorFace::new(striped_donor_frame(), grid_landmarks());
        let out = chain(Engine::Neural, Some(Arc::new(WrongShapeNeural)))
            .run(&frame, &grid_landmarks(), &donor);
        assert_eq!(out.escalations[0].1, EscalationReason::ShapeMismatch);
        assert!(out.frame.same_layout(&frame));
    }

    #[test]
    fn test_geometric_engine_skips_neural() {
        let frame = face_frame(0);
        let donor = DonorFace::new(striped_donor_frame(), grid_landmarks());
        let neural = Arc::new(FaultingNeural {
            calls: AtomicUsize::new(0),
        });
        let out = chain(Engine::Geometric, Some(neural.clone()))
            .run(&frame, &grid_landmarks(), &donor);
        assert_eq!(neural.calls.load(Ordering::SeqCst), 0);
        assert_eq!(out.stage, SwapStage::Geometric);
    }

    #[test]
    fn test_geometric_no_op_escalates_to_simple() {
        let frame = face_frame(0);
        let donor = DonorFace::new(donor_frame(), grid_landmarks());
        let out = chain(Engine::Geometric, None).run(&frame, &grid_landmarks(), &donor);
        assert_eq!(stages(&out), vec![SwapStage::Geometric]);
        assert!(matches!(out.escalations[0].1, EscalationReason::NoOp { .. }));
        assert_eq!(out.stage, SwapStage::Simple);
        assert_eq!(out.frame.pixel(32, 32), &DONOR_COLOR);
    }

    #[test]
    fn test_degenerate_triangulation_escalates_to_simple() {
        let frame = face_frame(0);
        let sparse =
            LandmarkSet::new(vec![(12.0, 12.0), (50.0, 12.0), (50.0, 50.0), (12.0, 50.0)]);
        let donor = DonorFace::new(donor_frame(), sparse.clone());
        let out = chain(Engine::Geometric, None).run(&frame, &sparse, &donor);
        assert!(matches!(out.escalations[0].1, EscalationReason::Degenerate(_)));
        assert_eq!(out.stage, SwapStage::Simple);
    }

    #[test]
    fn test_strong_overlay_accepted_unconditionally() {
        let frame = face_frame(0);
        let donor = DonorFace::new(donor_frame(), grid_landmarks());
        let config = SwapConfig {
            engine: Engine::Geometric,
            failure_epsilon: 1000.0,
            ..SwapConfig::default()
        };
        let out = StrategyChain::new(&config, None).run(&frame, &grid_landmarks(), &donor);
        assert_eq!(out.stage, SwapStage::Simple);
        assert_ne!(out.frame, frame);
    }

    #[test]
    fn test_unreachable_box_ends_in_passthrough() {
        let frame = face_frame(0);
        let far = LandmarkSet::new(vec![(200.0, 200.0), (300.0, 200.0), (250.0, 300.0)]);
        let donor = DonorFace::new(donor_frame(), far.clone());
        let out = chain(Engine::Geometric, None).run(&frame, &far, &donor);
        assert_eq!(out.stage, SwapStage::Passthrough);
        assert_eq!(out.frame, frame);
        assert_eq!(stages(&out), vec![SwapStage::Geometric, SwapStage::Simple]);
    }
}
