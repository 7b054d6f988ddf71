/*! Frame builders: pure functions from stimulus to the byte stream a
[`crate::session::DutSession`] streams across the link.

Every builder appends enough trailing dummy frames that the pipeline
invariant in [`crate::chunker`] holds for its caller: the device always
returns one response frame per frame sent, and the first 3 overall are
stale pre-DUT echoes regardless of which builder produced the request.
*/
use crate::error::Result;
use crate::frame::{ctrl, decode_data, encode, Reg};
use itertools::Itertools;

fn zero_frames(n: usize) -> Vec<u8> {
    vec![0u8; n * crate::frame::FRAME_LEN]
}

/// Streaming builder: used by echo, ROM call-through, and filter Bode
/// sweeps. One `WR` + `RUN` pair per input scalar, then two drain frames.
pub fn streaming(values: &[i32], scale: i32, signed: bool) -> Result<Vec<u8>> {
    let mut out = Vec::with_capacity((values.len() * 2 + 2) * 3);
    for &v in values {
        out.extend(encode(Reg::Wr as u8, 0, v * scale, signed)?);
        out.extend(encode(Reg::Ctrl as u8, ctrl::RUN, 0, false)?);
    }
    out.extend(zero_frames(2));
    Ok(out)
}

/// Calling builder: used by the ROM sweep. One seed write, then
/// `num_repeat` run pulses while the DUT iterates its table internally.
pub fn calling(num_repeat: usize, signed: bool) -> Result<Vec<u8>> {
    let mut out = Vec::with_capacity((1 + num_repeat + 2) * 3);
    out.extend(encode(Reg::Wr as u8, 0, 1, signed)?);
    for _ in 0..num_repeat {
        out.extend(encode(Reg::Ctrl as u8, ctrl::RUN, 0, false)?);
    }
    out.extend(zero_frames(2));
    Ok(out)
}

/// Memory-write builder: used by the RAM driver. One `WR` per value at
/// `start + offset`.
pub fn memory_write(start: u8, values: &[i32], scale: i32, signed: bool) -> Result<Vec<u8>> {
    let mut out = Vec::with_capacity(values.len() * 3);
    for (offset, &v) in values.iter().enumerate() {
        let adr = start
            .checked_add(offset as u8)
            .ok_or_else(|| crate::error::Error::OutOfRange(format!("adr {start}+{offset} > 255")))?;
        out.extend(encode(Reg::Wr as u8, adr, v * scale, signed)?);
    }
    Ok(out)
}

/// Memory-read builder: one `RD` per offset, then a single drain frame.
pub fn memory_read(start: u8, count: usize) -> Result<Vec<u8>> {
    let mut out = Vec::with_capacity((count + 1) * 3);
    for offset in 0..count {
        let adr = start
            .checked_add(offset as u8)
            .ok_or_else(|| crate::error::Error::OutOfRange(format!("adr {start}+{offset} > 255")))?;
        out.extend(encode(Reg::Rd as u8, adr, 0, false)?);
    }
    out.extend(zero_frames(1));
    Ok(out)
}

/// Arithmetic builder: used by the math DUT. `value_lists` holds one
/// slice of sweep values per input (length 1 or 2); a 2-input DUT is
/// driven with the full cartesian product of its two sweeps. Per
/// combination: one `WR` per input at `adr = input index`, one `RUN`,
/// then either one or two `DUMMY` fetches (`slow_pipeline` DUTs need the
/// extra cycle for the result to reach the output register).
pub fn arithmetic(
    value_lists: &[&[i32]],
    scale: i32,
    signed: bool,
    slow_pipeline: bool,
) -> Result<Vec<u8>> {
    let fetches = if slow_pipeline { 2 } else { 1 };
    let mut out = Vec::new();
    match value_lists.len() {
        1 => {
            for &x in value_lists[0] {
                out.extend(encode(Reg::Wr as u8, 0, x * scale, signed)?);
                out.extend(encode(Reg::Ctrl as u8, ctrl::RUN, 0, false)?);
                for _ in 0..fetches {
                    out.extend(encode(Reg::Ctrl as u8, ctrl::DUMMY, 0, false)?);
                }
            }
        }
        2 => {
            for (x, y) in value_lists[0].iter().cartesian_product(value_lists[1].iter()) {
                out.extend(encode(Reg::Wr as u8, 0, x * scale, signed)?);
                out.extend(encode(Reg::Wr as u8, 1, y * scale, signed)?);
                out.extend(encode(Reg::Ctrl as u8, ctrl::RUN, 0, false)?);
                for _ in 0..fetches {
                    out.extend(encode(Reg::Ctrl as u8, ctrl::DUMMY, 0, false)?);
                }
            }
        }
        n => {
            return Err(crate::error::Error::OutOfRange(format!(
                "math DUT supports 1 or 2 inputs, got {n}"
            )))
        }
    }
    Ok(out)
}

/// Creator/DNN builder: one write per input sample at `adr = 18+i`, a
/// commit pulse on `adr=16`, then one read per output at `adr = 18+j`.
pub fn creator(
    chunks: &[&[i32]],
    num_outputs: usize,
    scale: i32,
    signed: bool,
) -> Result<Vec<u8>> {
    let mut out = Vec::new();
    for chunk in chunks {
        for (i, &v) in chunk.iter().enumerate() {
            let adr = 18 + i as u8;
            out.extend(encode(Reg::Wr as u8, adr, v * scale, signed)?);
        }
        out.extend(encode(Reg::Wr as u8, 16, 1, false)?);
        out.extend(encode(Reg::Wr as u8, 16, 0, false)?);
        for j in 0..num_outputs {
            let adr = 18 + j as u8;
            out.extend(encode(Reg::Rd as u8, adr, 0, false)?);
        }
    }
    Ok(out)
}

/// Recover one output sample per input value from a `streaming()`
/// response, after the caller has already dropped the 3-frame pipeline
/// prefix.
///
/// Every frame on the wire, not just `RUN`, clocks the DUT's pipeline
/// forward by one stage; only a `RUN` frame latches a fresh value into
/// it, everything else (a `WR`, a dummy) shifts a stale one out. Each
/// input contributed a `WR`-response, `RUN`-response pair, so after
/// dropping the fixed-size prefix, input `i`'s `RUN` response sits at
/// raw offset `2*i + 1` within the kept frames.
pub fn decode_streaming(kept: &[[u8; 3]], n: usize, signed: bool, scale: i32) -> Vec<f64> {
    (0..n)
        .map(|i| decode_data(&kept[2 * i + 1], signed) as f64 / scale as f64)
        .collect()
}

/// Recover one output sample per `RUN` pulse from a `calling()`
/// response, after the pipeline prefix has been dropped. `calling` sends
/// a single seed `WR` ahead of all the `RUN`s rather than one per pulse,
/// so `kept[0]` is that `WR`'s own stale echo; every frame from `kept[1]`
/// onward maps 1:1 to a pulse. Callers pass `&kept[1..]`.
pub fn decode_calling(kept: &[[u8; 3]], signed: bool, scale: i32) -> Vec<f64> {
    kept.iter()
        .map(|f| decode_data(f, signed) as f64 / scale as f64)
        .collect()
}

/// Recover the output tensor from a `creator()`/DNN response, after the
/// pipeline prefix has been dropped. Each chunk's period is
/// `num_inputs + 2 + num_outputs` frames (the input `WR`s, the two
/// commit `WR`s, then the `RD`s); only the trailing `num_outputs` slots
/// of each period are real readouts, so they're skipped the same way
/// [`decode_arithmetic`] skips its per-combination `WR`/`RUN` prefix.
pub fn decode_creator(
    kept: &[[u8; 3]],
    num_inputs: usize,
    num_outputs: usize,
    signed: bool,
    scale: i32,
) -> Vec<Vec<f64>> {
    let period = num_inputs + 2 + num_outputs;
    kept.chunks_exact(period)
        .map(|chunk| {
            chunk[num_inputs + 2..]
                .iter()
                .map(|f| decode_data(f, signed) as f64 / scale as f64)
                .collect()
        })
        .collect()
}

/// Recover one value per offset from a `memory_read()` response, after
/// the pipeline prefix has been dropped.
pub fn decode_memory_read(kept: &[[u8; 3]], count: usize, signed: bool, scale: i32) -> Vec<f64> {
    (0..count)
        .map(|i| decode_data(&kept[i], signed) as f64 / scale as f64)
        .collect()
}

/// Recover one result per combination from an `arithmetic()` response,
/// after the pipeline prefix has been dropped. Because the dropped
/// prefix is exactly as deep as the pipeline, `kept[j]` equals whatever
/// was latched into the pipeline when transmitted frame `j` went out;
/// within each combination's `num_inputs + 1 + fetches`-frame block, only
/// the `RUN` (at offset `num_inputs`) latches the real result.
pub fn decode_arithmetic(
    kept: &[[u8; 3]],
    num_combinations: usize,
    num_inputs: usize,
    fetches: usize,
    signed: bool,
    scale: i32,
) -> Vec<f64> {
    let period = num_inputs + 1 + fetches;
    (0..num_combinations)
        .map(|i| decode_data(&kept[i * period + num_inputs], signed) as f64 / scale as f64)
        .collect()
}

/// Skeleton-ID builder: reads the 16-byte opaque protocol-image tag.
pub fn skeleton_id_read() -> Result<Vec<u8>> {
    let mut out = Vec::with_capacity(16 * 3);
    for adr in 0u8..=15 {
        out.extend(encode(Reg::Rd as u8, adr, 0, false)?);
    }
    Ok(out)
}
