/*! Filter (Bode) driver: sweep a logarithmic frequency axis, run a
sinusoid through the DUT at each point, and compare the recovered
gain/phase against a reference filter design.
*/
#![cfg(feature = "dsp-reference")]
use serde::{Deserialize, Serialize};

use crate::builders;
use crate::chunker::{drop_prefix, split_frames};
use crate::error::Result;
use crate::filter::{ClosedFormFilter, DesignKind, FilterDesign, FilterSpec, ResponseType, Topology, extract_gain_phase};
use crate::fixed_point::FixedPoint;
use crate::header::Header;
use crate::results::RunRecord;
use crate::session::DutSession;
use crate::signal;
use crate::transport::Transport;

use super::{ExperimentContext, ExperimentOutcome};

/// Per-DUT Bode sweep settings, persisted as `Config_Filter<id>`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FilterSweepSettings {
    pub sampling_rate: f64,
    pub freq_start: f64,
    pub freq_stop: f64,
    pub total_steps: u32,
    pub num_iterations_period: u32,
    pub corner: f64,
    pub signed_data: bool,
}

impl Default for FilterSweepSettings {
    fn default() -> Self {
        Self {
            sampling_rate: 48_000.0,
            freq_start: 10.0,
            freq_stop: 10_000.0,
            total_steps: 20,
            num_iterations_period: 10,
            corner: 1000.0,
            signed_data: false,
        }
    }
}

fn log_sweep(start: f64, stop: f64, steps: u32) -> Vec<f64> {
    if steps <= 1 {
        return vec![start];
    }
    let log_start = start.ln();
    let log_stop = stop.ln();
    (0..steps)
        .map(|i| {
            let t = i as f64 / (steps - 1) as f64;
            (log_start + t * (log_stop - log_start)).exp()
        })
        .collect()
}

/// Run the Bode sweep against DUT `dut_id`, comparing the captured
/// gain/phase at every frequency to a second-order Butterworth low-pass
/// reference at the configured corner.
pub fn run<T: Transport>(
    session: &mut DutSession<T>,
    header: &Header,
    dut_id: u8,
    ctx: &ExperimentContext,
) -> Result<ExperimentOutcome> {
    session.select(dut_id)?;

    let default = serde_json::to_value(FilterSweepSettings::default())?;
    let loaded = ctx.config.load_or_create(&format!("Filter{dut_id}"), default)?;
    let settings: FilterSweepSettings = serde_json::from_value(loaded)?;

    let reference_spec = FilterSpec {
        order: 2,
        fs: settings.sampling_rate,
        corners: vec![settings.corner],
        response_type: ResponseType::LowPass,
        design: DesignKind::Butterworth,
        topology: Topology::Iir,
    };
    let reference_coeffs = ClosedFormFilter
        .coefficients(&reference_spec)
        .map_err(crate::error::Error::HeaderInvalid)?;

    let frequencies = log_sweep(settings.freq_start, settings.freq_stop, settings.total_steps);
    let fxp = FixedPoint::new(header.bitwidth_input as u32, 0);

    let mut max_gain_err = 0.0f64;
    let mut max_phase_err = 0.0f64;

    for &f in &frequencies {
        let n = ((settings.sampling_rate / f) * settings.num_iterations_period as f64).round() as usize;
        let (_, samples) = signal::sinusoid(f, settings.sampling_rate, n, header.bitwidth_input as u32, settings.signed_data);
        let quantized: Vec<i32> = fxp.quantize_block(&samples).iter().map(|&v| v as i32).collect();

        let request = builders::streaming(&quantized, header.input_scale() as i32, settings.signed_data)?;
        let response = session.stream(&request)?;
        let frames = split_frames(&response)?;
        let kept = drop_prefix(&frames, session.pipeline_prefix());
        let outputs = builders::decode_streaming(kept, n, settings.signed_data, header.output_scale() as i32);

        let (measured_gain, measured_phase) = extract_gain_phase(&samples, &outputs, f, settings.sampling_rate);
        let expected = reference_coeffs.freq_response(&[f], settings.sampling_rate)[0];

        max_gain_err = max_gain_err.max((measured_gain - expected.gain_db).abs());
        max_phase_err = max_phase_err.max((measured_phase - expected.phase_deg).abs());
    }

    let passed = max_gain_err <= 3.0 && max_phase_err <= 30.0;
    ctx.sink.save(
        "filter",
        &RunRecord {
            experiment: "filter".into(),
            dut_id,
            inputs: frequencies.clone(),
            outputs: vec![max_gain_err, max_phase_err],
            reference: None,
            passed,
        },
    )?;

    Ok(ExperimentOutcome {
        passed,
        detail: format!(
            "{} points, max gain err {max_gain_err:.2} dB, max phase err {max_phase_err:.1} deg",
            frequencies.len()
        ),
    })
}
