/*! RAM driver: write a random block, read it back, compare element-wise.
*/
use serde::{Deserialize, Serialize};

use crate::builders;
use crate::chunker::{drop_prefix, split_frames};
use crate::error::Result;
use crate::header::Header;
use crate::results::RunRecord;
use crate::session::DutSession;
use crate::signal;
use crate::transport::Transport;

use super::{ExperimentContext, ExperimentOutcome};

/// Per-DUT RAM test settings, persisted as `Config_Ram<id>`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RamSettings {
    pub sigma: f64,
    pub signed_data: bool,
}

impl Default for RamSettings {
    fn default() -> Self {
        Self {
            sigma: 20.0,
            signed_data: false,
        }
    }
}

/// Run the RAM experiment: write `2^num_inputs` random values, read them
/// back, and require bit-exact equality at every index.
pub fn run<T: Transport>(
    session: &mut DutSession<T>,
    header: &Header,
    dut_id: u8,
    ctx: &ExperimentContext,
) -> Result<ExperimentOutcome> {
    session.select(dut_id)?;

    let default = serde_json::to_value(RamSettings::default())?;
    let loaded = ctx.config.load_or_create(&format!("Ram{dut_id}"), default)?;
    let settings: RamSettings = serde_json::from_value(loaded)?;

    let size = 1usize << header.num_inputs.max(1);
    let values = signal::noise(settings.sigma, size, header.bitwidth_input as u32, settings.signed_data);

    let write_request = builders::memory_write(0, &values, header.input_scale() as i32, settings.signed_data)?;
    session.stream(&write_request)?;

    let read_request = builders::memory_read(0, size)?;
    let response = session.stream(&read_request)?;
    let frames = split_frames(&response)?;
    let kept = drop_prefix(&frames, session.pipeline_prefix());

    let readback = builders::decode_memory_read(kept, size, settings.signed_data, header.output_scale() as i32);
    let inputs: Vec<f64> = values.iter().map(|&v| v as f64).collect();
    let passed = inputs
        .iter()
        .zip(readback.iter())
        .all(|(w, r)| (w - r).abs() < 0.5);

    ctx.sink.save(
        "ram",
        &RunRecord {
            experiment: "ram".into(),
            dut_id,
            inputs: inputs.clone(),
            outputs: readback.clone(),
            reference: Some(inputs),
            passed,
        },
    )?;

    Ok(ExperimentOutcome {
        passed,
        detail: format!("{size} words compared"),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::JsonConfigStore;
    use crate::frame::{decode_data, encode, Reg};
    use crate::results::NullResultSink;
    use std::collections::HashMap;

    /// A flat memory that answers `WR`/`RD` against the same address
    /// space, with no pipeline delay (memory DUTs are combinational).
    struct RamDevice {
        open: bool,
        cells: HashMap<u8, i32>,
    }

    impl RamDevice {
        fn new() -> Self {
            Self {
                open: false,
                cells: HashMap::new(),
            }
        }
    }

    impl Transport for RamDevice {
        fn write(&mut self, _bytes: &[u8]) -> Result<()> {
            Ok(())
        }

        fn write_and_read(&mut self, bytes: &[u8]) -> Result<Vec<u8>> {
            let mut out = Vec::with_capacity(bytes.len());
            for frame in bytes.chunks_exact(3) {
                let f = [frame[0], frame[1], frame[2]];
                let (reg, adr) = crate::frame::decode_header(&f);
                if reg == Reg::Wr as u8 {
                    self.cells.insert(adr, decode_data(&f, false));
                }
                let value = if reg == Reg::Rd as u8 {
                    *self.cells.get(&adr).unwrap_or(&0)
                } else {
                    0
                };
                out.extend(encode(Reg::Rd as u8, adr, value, false).unwrap());
            }
            Ok(out)
        }

        fn flush_input(&mut self) -> Result<()> {
            Ok(())
        }

        fn is_open(&self) -> bool {
            self.open
        }

        fn open(&mut self) -> Result<()> {
            self.open = true;
            Ok(())
        }

        fn close(&mut self) -> Result<()> {
            self.open = false;
            Ok(())
        }
    }

    #[test]
    fn ram_driver_round_trips_exactly() {
        let device = RamDevice::new();
        let mut session = DutSession::with_pipeline_prefix(device, 0);
        session.open().unwrap();
        let header = Header {
            num_duts: 1,
            dut_type_raw: 3,
            num_inputs: 3, // size = 8
            num_outputs: 1,
            bitwidth_input: 16,
            bitwidth_output: 16,
        };
        let config_dir =
            std::env::temp_dir().join(format!("dut-harness-ram-test-{}", std::process::id()));
        let config = JsonConfigStore::new(&config_dir);
        let sink = NullResultSink;
        let ctx = ExperimentContext {
            config: &config,
            sink: &sink,
        };
        let outcome = run(&mut session, &header, 0, &ctx).unwrap();
        assert!(outcome.passed, "{}", outcome.detail);
        std::fs::remove_dir_all(&config_dir).ok();
    }
}
