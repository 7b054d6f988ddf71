/*! ROM driver: pulse the lookup table around its whole address range and
capture what comes back.
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

/// Per-DUT ROM sweep settings, persisted as `Config_Rom<id>`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RomSettings {
    pub num_repetitions: u32,
    pub signed_data: bool,
}

impl Default for RomSettings {
    fn default() -> Self {
        Self {
            num_repetitions: 2,
            signed_data: false,
        }
    }
}

/// Run the ROM experiment against DUT `dut_id`: pulse `RUN` enough times
/// to cycle through the table `num_repetitions` times and return the
/// captured sequence as the `detail` outcome, but passes only if the
/// table repeats exactly: every lap must equal the first.
pub fn run<T: Transport>(
    session: &mut DutSession<T>,
    header: &Header,
    dut_id: u8,
    ctx: &ExperimentContext,
) -> Result<ExperimentOutcome> {
    session.select(dut_id)?;

    let default = serde_json::to_value(RomSettings::default())?;
    let loaded = ctx.config.load_or_create(&format!("Rom{dut_id}"), default)?;
    let settings: RomSettings = serde_json::from_value(loaded)?;

    let adr_width = header.num_inputs.max(1) as u32;
    let table_len = 1usize << adr_width;
    let num_repeat = settings.num_repetitions as usize * table_len;

    let request = builders::calling(num_repeat, settings.signed_data)?;
    let response = session.stream(&request)?;
    let frames = split_frames(&response)?;
    let kept = drop_prefix(&frames, session.pipeline_prefix());

    let pulses = kept.get(1..).unwrap_or(&[]);
    let outputs = builders::decode_calling(pulses, settings.signed_data, header.output_scale() as i32);
    let outputs: Vec<f64> = outputs.into_iter().take(num_repeat).collect();

    let passed = table_len > 0
        && outputs
            .chunks(table_len)
            .skip(1)
            .all(|lap| lap == &outputs[..table_len.min(lap.len())]);

    ctx.sink.save(
        "rom",
        &RunRecord {
            experiment: "rom".into(),
            dut_id,
            inputs: Vec::new(),
            outputs: outputs.clone(),
            reference: None,
            passed,
        },
    )?;

    Ok(ExperimentOutcome {
        passed,
        detail: format!("{} laps of {table_len} entries", settings.num_repetitions),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::JsonConfigStore;
    use crate::frame::{ctrl, decode_data, encode, Reg};
    use crate::results::NullResultSink;

    /// A table of 4 entries, cycled on every `RUN`.
    struct RomDevice {
        open: bool,
        table: Vec<i32>,
        cursor: usize,
        pipeline: std::collections::VecDeque<i32>,
    }

    impl RomDevice {
        fn new(table: Vec<i32>) -> Self {
            Self {
                open: false,
                table,
                cursor: 0,
                pipeline: std::collections::VecDeque::from(vec![0; 3]),
            }
        }
    }

    impl Transport for RomDevice {
        fn write(&mut self, _bytes: &[u8]) -> Result<()> {
            Ok(())
        }

        fn write_and_read(&mut self, bytes: &[u8]) -> Result<Vec<u8>> {
            let mut out = Vec::with_capacity(bytes.len());
            for frame in bytes.chunks_exact(3) {
                let f = [frame[0], frame[1], frame[2]];
                let (reg, adr) = crate::frame::decode_header(&f);
                let injected = if reg == Reg::Ctrl as u8 && adr == ctrl::RUN {
                    let v = self.table[self.cursor % self.table.len()];
                    self.cursor += 1;
                    v
                } else {
                    0
                };
                self.pipeline.push_back(injected);
                let value = self.pipeline.pop_front().unwrap_or(0);
                out.extend(encode(Reg::Rd as u8, 0, value, false).unwrap());
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
    fn rom_driver_finds_repeating_table() {
        let device = RomDevice::new(vec![1, 2, 3, 4]);
        let mut session = DutSession::new(device);
        session.open().unwrap();
        let header = Header {
            num_duts: 1,
            dut_type_raw: 2,
            num_inputs: 2, // adr_width = 2 -> table_len = 4
            num_outputs: 1,
            bitwidth_input: 16,
            bitwidth_output: 16,
        };
        let config_dir =
            std::env::temp_dir().join(format!("dut-harness-rom-test-{}", std::process::id()));
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
