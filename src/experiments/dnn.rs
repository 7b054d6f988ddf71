/*! DNN driver: quantize an input tensor, stream it through the
creator/commit/readout sequence, dequantize the output, and compare
against the software reference model.
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

use super::{AffineDnnReference, DnnReference, ExperimentContext, ExperimentOutcome};

/// Per-DUT DNN test settings, persisted as `Config_Dnn<id>`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DnnSettings {
    pub num_chunks: u32,
    pub sigma: f64,
    pub signed_data: bool,
}

impl Default for DnnSettings {
    fn default() -> Self {
        Self {
            num_chunks: 4,
            sigma: 10.0,
            signed_data: true,
        }
    }
}

/// Run the DNN experiment: stream `num_chunks` random input tensors
/// through the creator sequence and compare each dequantized output
/// tensor, element-wise, against [`AffineDnnReference`].
pub fn run<T: Transport>(
    session: &mut DutSession<T>,
    header: &Header,
    dut_id: u8,
    ctx: &ExperimentContext,
) -> Result<ExperimentOutcome> {
    session.select(dut_id)?;

    let default = serde_json::to_value(DnnSettings::default())?;
    let loaded = ctx.config.load_or_create(&format!("Dnn{dut_id}"), default)?;
    let settings: DnnSettings = serde_json::from_value(loaded)?;

    let num_inputs = header.num_inputs.max(1) as usize;
    let num_outputs = header.num_outputs.max(1) as usize;
    let in_fxp = FixedPoint::new(header.bitwidth_input as u32, header.bitwidth_input as u32 / 2);
    let out_fxp = FixedPoint::new(header.bitwidth_output as u32, header.bitwidth_output as u32 / 2);
    let reference = AffineDnnReference::default();

    let mut raw_chunks: Vec<Vec<i32>> = Vec::with_capacity(settings.num_chunks as usize);
    let mut rational_chunks: Vec<Vec<f64>> = Vec::with_capacity(settings.num_chunks as usize);
    for _ in 0..settings.num_chunks {
        let noise = signal::noise(settings.sigma, num_inputs, header.bitwidth_input as u32, settings.signed_data);
        let rational: Vec<f64> = noise.iter().map(|&v| in_fxp.dequantize_scalar(v as i64)).collect();
        let quantized: Vec<i32> = rational
            .iter()
            .map(|&x| in_fxp.quantize_scalar(x) as i32)
            .collect();
        raw_chunks.push(quantized);
        rational_chunks.push(rational);
    }
    let chunk_refs: Vec<&[i32]> = raw_chunks.iter().map(|c| c.as_slice()).collect();

    let request = builders::creator(&chunk_refs, num_outputs, header.input_scale() as i32, settings.signed_data)?;
    let response = session.stream(&request)?;
    let frames = split_frames(&response)?;
    let kept = drop_prefix(&frames, session.pipeline_prefix());
    let raw_outputs = builders::decode_creator(
        kept,
        num_inputs,
        num_outputs,
        settings.signed_data,
        header.output_scale() as i32,
    );

    let mut all_pass = true;
    let mut flat_outputs = Vec::new();
    let mut flat_reference = Vec::new();
    for (input, output_ints) in rational_chunks.iter().zip(raw_outputs.iter()) {
        let expected = reference.infer(input);
        let got: Vec<f64> = output_ints
            .iter()
            .map(|&v| out_fxp.dequantize_scalar(v.round() as i64))
            .collect();
        all_pass &= expected
            .iter()
            .zip(got.iter())
            .all(|(e, g)| (e - g).abs() <= 1.0);
        flat_outputs.extend(got);
        flat_reference.extend(expected);
    }

    ctx.sink.save(
        "dnn",
        &RunRecord {
            experiment: "dnn".into(),
            dut_id,
            inputs: rational_chunks.into_iter().flatten().collect(),
            outputs: flat_outputs,
            reference: Some(flat_reference),
            passed: all_pass,
        },
    )?;

    Ok(ExperimentOutcome {
        passed: all_pass,
        detail: format!("{} chunks of {num_inputs}->{num_outputs}", settings.num_chunks),
    })
}
