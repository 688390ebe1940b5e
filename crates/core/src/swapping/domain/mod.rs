pub mod donor_face;
pub mod failure_predicate;
pub mod geometric_warp;
pub mod neural_swap;
pub mod simple_overlay;
pub mod strategy_chain;
