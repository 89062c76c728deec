pub mod evaluator;
pub mod indicators;
pub mod params;

pub use evaluator::{evaluate, readout, Evaluation, IndicatorReadout, NoSignalReason, MEAN_LENGTH};
pub use indicators::IndicatorSet;
pub use params::{SignalFileConfig, SignalParameters};
