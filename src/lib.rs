#![warn(missing_docs)]
/*! Host-side test harness for FPGA/MCU fixed-point accelerator
skeletons talking a 3-byte framed protocol over a serial link.

A DUT board exposes one or more accelerator "skeletons" behind a single
serial port. Each skeleton advertises its shape (input/output counts,
bitwidths, accelerator kind) through a header word read over the wire,
and is driven by writing register frames and reading the register
frames it shifts back. This crate turns that wire protocol into typed
Rust: [`frame`] and [`chunker`] are the raw codec, [`header`] decodes
the per-DUT shape word, [`builders`] assembles the frame sequences each
accelerator kind expects, [`session`] owns a [`transport::Transport`]
and the handshake (enumerate, select, run), and [`experiments`] holds
one driver per accelerator kind that a caller runs through
[`orchestrator::run_all`].

# Example

```no_run
use dut_harness::config::JsonConfigStore;
use dut_harness::experiments::ExperimentContext;
use dut_harness::orchestrator;
use dut_harness::results::NullResultSink;
use dut_harness::session::DutSession;
use dut_harness::transport::LoopbackTransport;

let mut session = DutSession::new(LoopbackTransport::new(0));
session.open()?;
let config = JsonConfigStore::new("/tmp/dut-harness-config");
let sink = NullResultSink;
let ctx = ExperimentContext { config: &config, sink: &sink };
let results = orchestrator::run_all(&mut session, &[], &ctx)?;
for r in &results {
    println!("dut {}: {:?}", r.dut_id, r.outcome);
}
# Ok::<(), dut_harness::error::Error>(())
```

# Links

* Upstream protocol this harness replaces: the elastic-AI FPGA testing
  toolchain's `exp_dut.py`.
*/

pub mod builders;
pub mod chunker;
pub mod config;
pub mod error;
pub mod experiments;
pub mod fixed_point;
pub mod frame;
pub mod header;
pub mod orchestrator;
pub mod results;
pub mod session;
pub mod signal;
pub mod transport;

#[cfg(feature = "dsp-reference")]
pub mod filter;
