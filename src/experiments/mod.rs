/*! Experiment drivers: one per accelerator kind, sharing a common
template (read header, load settings, build stimulus, stream, compare)
but no shared mutable state.

Each driver is a free function taking a [`ExperimentContext`] rather
than a base-class instance, so there's nothing to initialize beyond what
a single run needs.
*/
pub mod bode;
pub mod dnn;
pub mod echo;
pub mod math;
pub mod ram;
pub mod rom;

use crate::config::ConfigStore;
use crate::results::ResultSink;

/// The external collaborators every driver needs, threaded through
/// explicitly instead of inherited from a shared base class.
pub struct ExperimentContext<'a> {
    pub config: &'a dyn ConfigStore,
    pub sink: &'a dyn ResultSink,
}

/// One driver's verdict.
#[derive(Debug, Clone)]
pub struct ExperimentOutcome {
    pub passed: bool,
    pub detail: String,
}

/// A pure function from a quantized input tensor to a quantized output
/// tensor, standing in for the DNN accelerator's trained weights. Swap
/// in a different implementation to compare against a real model.
pub trait DnnReference {
    fn infer(&self, input: &[f64]) -> Vec<f64>;
}

/// The original tool's smoke-test model: one affine layer, weight 2 on
/// every input, a fixed per-output bias.
pub struct AffineDnnReference {
    pub weight: f64,
    pub bias: Vec<f64>,
}

impl Default for AffineDnnReference {
    fn default() -> Self {
        Self {
            weight: 2.0,
            bias: vec![-1.0, 1.0, 2.0],
        }
    }
}

impl DnnReference for AffineDnnReference {
    fn infer(&self, input: &[f64]) -> Vec<f64> {
        let sum: f64 = input.iter().map(|&x| x * self.weight).sum();
        self.bias.iter().map(|&b| sum + b).collect()
    }
}
