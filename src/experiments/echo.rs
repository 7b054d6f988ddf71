/*! Echo driver: a sinusoid in, the same sinusoid out, after the
pipeline's fixed delay.
*/
use serde::{Deserialize, Serialize};

use crate::builders;
use crate::chunker::{drop_prefix, split_frames};
use crate::error::Result;
use crate::fixed_point::FixedPoint;
use crate::header::Header;
use crate::results::RunRecord;
use crate::session::DutSession;
use crate::signal;
use crate::transport::Transport;

use super::{ExperimentContext, ExperimentOutcome};

/// Per-DUT echo stimulus settings, persisted as `Config_Echo<id>`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct EchoSettings {
    pub sampling_rate: f64,
    pub freq_signal: f64,
    pub num_periods: u32,
    pub signed_data: bool,
}

impl Default for EchoSettings {
    fn default() -> Self {
        Self {
            sampling_rate: 2000.0,
            freq_signal: 10.0,
            num_periods: 10,
            signed_data: false,
        }
    }
}

/// Run the echo experiment against DUT `dut_id`, whose header has
/// already been read.
pub fn run<T: Transport>(
    session: &mut DutSession<T>,
    header: &Header,
    dut_id: u8,
    ctx: &ExperimentContext,
) -> Result<ExperimentOutcome> {
    session.select(dut_id)?;

    let default = serde_json::to_value(EchoSettings::default())?;
    let loaded = ctx.config.load_or_create(&format!("Echo{dut_id}"), default)?;
    let settings: EchoSettings = serde_json::from_value(loaded)?;

    let n = ((settings.sampling_rate / settings.freq_signal) * settings.num_periods as f64)
        .round() as usize;
    let (_, samples) = signal::sinusoid(
        settings.freq_signal,
        settings.sampling_rate,
        n,
        header.bitwidth_input as u32,
        settings.signed_data,
    );

    let fxp = FixedPoint::new(header.bitwidth_input as u32, 0);
    let quantized_i64 = fxp.quantize_block(&samples);
    let quantized: Vec<i32> = quantized_i64.iter().map(|&v| v as i32).collect();
    // The reference for MAE is the samples' own round-trip through the DUT's
    // fixed-point format, not the unquantized trace — echo can only return
    // what it was given to begin with.
    let reference = fxp.dequantize_block(&quantized_i64);

    let request = builders::streaming(&quantized, header.input_scale() as i32, settings.signed_data)?;
    let response = session.stream(&request)?;
    let frames = split_frames(&response)?;
    let kept = drop_prefix(&frames, session.pipeline_prefix());

    let outputs = builders::decode_streaming(kept, n, settings.signed_data, header.output_scale() as i32);
    let mae: f64 = reference
        .iter()
        .zip(outputs.iter())
        .map(|(x, y)| (x - y).abs())
        .sum::<f64>()
        / n as f64;

    let passed = mae <= 1.0;
    ctx.sink.save(
        "echo",
        &RunRecord {
            experiment: "echo".into(),
            dut_id,
            inputs: samples,
            outputs: outputs.clone(),
            reference: Some(reference),
            passed,
        },
    )?;

    Ok(ExperimentOutcome {
        passed,
        detail: format!("MAE={mae:.4} over {n} samples"),
    })
}
