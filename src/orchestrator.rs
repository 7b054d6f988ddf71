/*! Top-level dispatch: enumerate DUTs, intersect with the caller's
selection, and hand each one to its matching driver.
*/
use log::{info, warn};

use crate::error::{Error, Result};
use crate::experiments::{self, ExperimentContext, ExperimentOutcome};
use crate::header::DutType;
use crate::session::DutSession;
use crate::transport::Transport;

/// One DUT's dispatch result: either a driver outcome, or an error that
/// didn't stop the rest of the run.
#[derive(Debug)]
pub struct DutResult {
    pub dut_id: u8,
    pub outcome: std::result::Result<ExperimentOutcome, Error>,
}

/// Enumerate every DUT, run the ones named in `selection` (empty means
/// "all"), and return one result per attempted DUT. A single DUT's
/// failure — `UnsupportedDut`, a transport error, a failed comparison —
/// never aborts the rest of the run.
pub fn run_all<T: Transport>(
    session: &mut DutSession<T>,
    selection: &[u8],
    ctx: &ExperimentContext,
) -> Result<Vec<DutResult>> {
    let headers = session.enumerate()?;
    let mut results = Vec::new();

    for (id, header) in headers {
        if !selection.is_empty() && !selection.contains(&id) {
            continue;
        }
        info!("dispatching dut {id}: {header:?}");
        let outcome = dispatch(session, &header, id, ctx);
        if let Err(ref e) = outcome {
            warn!("dut {id} failed: {e}");
        }
        results.push(DutResult { dut_id: id, outcome });
    }
    Ok(results)
}

fn dispatch<T: Transport>(
    session: &mut DutSession<T>,
    header: &crate::header::Header,
    id: u8,
    ctx: &ExperimentContext,
) -> Result<ExperimentOutcome> {
    let dut_type = header.dut_type()?;
    if !dut_type.is_driveable() {
        return Err(Error::UnsupportedDut(header.dut_type_raw));
    }
    match dut_type {
        DutType::Echo => experiments::echo::run(session, header, id, ctx),
        DutType::Rom => experiments::rom::run(session, header, id, ctx),
        DutType::Ram => experiments::ram::run(session, header, id, ctx),
        DutType::Math => experiments::math::run(session, header, id, ctx),
        #[cfg(feature = "dsp-reference")]
        DutType::Filter => experiments::bode::run(session, header, id, ctx),
        #[cfg(not(feature = "dsp-reference"))]
        DutType::Filter => Err(Error::UnsupportedDut(header.dut_type_raw)),
        DutType::Dnn => experiments::dnn::run(session, header, id, ctx),
        DutType::Disabled | DutType::WindowingReserved | DutType::EndToEndReserved => {
            Err(Error::UnsupportedDut(header.dut_type_raw))
        }
    }
}
