/*! Math driver: sweep the arithmetic unit's input range(s) and compare
against the software reference operation.
*/
use serde::{Deserialize, Serialize};

use crate::builders;
use crate::chunker::{drop_prefix, split_frames};
use crate::error::Result;
use crate::header::Header;
use crate::results::RunRecord;
use crate::session::DutSession;
use crate::transport::Transport;

use super::{ExperimentContext, ExperimentOutcome};

/// Per-DUT arithmetic sweep settings, persisted as `Config_Math<id>`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MathSettings {
    pub step_size: i32,
    pub slow_pipeline: bool,
    pub signed_data: bool,
}

impl Default for MathSettings {
    fn default() -> Self {
        Self {
            step_size: 1,
            slow_pipeline: false,
            signed_data: false,
        }
    }
}

fn sweep_range(bitwidth: u32, signed: bool, step: i32) -> Vec<i32> {
    let step = step.max(1);
    if signed {
        let lo = -(1i64 << (bitwidth - 1));
        let hi = (1i64 << (bitwidth - 1)) - 1;
        (lo..=hi).step_by(step as usize).map(|v| v as i32).collect()
    } else {
        let hi = (1i64 << bitwidth) - 1;
        (0..=hi).step_by(step as usize).map(|v| v as i32).collect()
    }
}

/// Run the math experiment against DUT `dut_id`. 1-input DUTs are
/// compared against an echo reference (`x`), 2-input DUTs against
/// `x * y`.
pub fn run<T: Transport>(
    session: &mut DutSession<T>,
    header: &Header,
    dut_id: u8,
    ctx: &ExperimentContext,
) -> Result<ExperimentOutcome> {
    session.select(dut_id)?;

    let default = serde_json::to_value(MathSettings::default())?;
    let loaded = ctx.config.load_or_create(&format!("Math{dut_id}"), default)?;
    let settings: MathSettings = serde_json::from_value(loaded)?;

    let num_inputs = header.num_inputs.clamp(1, 2) as usize;
    let xs = sweep_range(header.bitwidth_input as u32, settings.signed_data, settings.step_size);
    let fetches = if settings.slow_pipeline { 2 } else { 1 };

    let (value_lists, reference): (Vec<&[i32]>, Vec<f64>) = if num_inputs == 1 {
        let reference = xs.iter().map(|&x| x as f64).collect();
        (vec![&xs[..]], reference)
    } else {
        let ys = xs.clone();
        let reference = xs
            .iter()
            .flat_map(|&x| ys.iter().map(move |&y| (x as f64) * (y as f64)))
            .collect();
        (vec![&xs[..], &ys[..]], reference)
    };
    let num_combinations = if num_inputs == 1 { xs.len() } else { xs.len() * xs.len() };

    let request = builders::arithmetic(
        &value_lists,
        header.input_scale() as i32,
        settings.signed_data,
        settings.slow_pipeline,
    )?;
    let response = session.stream(&request)?;
    let frames = split_frames(&response)?;
    let kept = drop_prefix(&frames, session.pipeline_prefix());

    let outputs = builders::decode_arithmetic(
        kept,
        num_combinations,
        num_inputs,
        fetches,
        settings.signed_data,
        header.output_scale() as i32,
    );

    let tolerance = 1.0;
    let passed = reference
        .iter()
        .zip(outputs.iter())
        .all(|(r, o)| (r - o).abs() <= tolerance);

    ctx.sink.save(
        "math",
        &RunRecord {
            experiment: "math".into(),
            dut_id,
            inputs: xs.iter().map(|&x| x as f64).collect(),
            outputs: outputs.clone(),
            reference: Some(reference),
            passed,
        },
    )?;

    Ok(ExperimentOutcome {
        passed,
        detail: format!("{num_combinations} combinations, {num_inputs}-input"),
    })
}
