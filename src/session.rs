/*! The stateful link: selection, header reads, and frame streaming.

A [`DutSession`] owns exactly one [`Transport`] and the last-selected
DUT id. It never retries a transport failure; callers decide whether a
failure is experiment-fatal or just this-DUT-fatal.
*/
use std::collections::HashMap;

use log::{debug, trace};

use crate::chunker::{chunk_outgoing, drop_prefix, split_frames, DEFAULT_BUFFER_SIZE};
use crate::error::{Error, Result};
use crate::frame::{ctrl, decode_data, encode, Reg};
use crate::header::Header;
use crate::transport::Transport;

/// Number of stale response frames the FPGA target's pre-DUT registers
/// emit before a real response arrives. The MCU target use 2; pass it to
/// [`DutSession::with_pipeline_prefix`] when talking to one.
pub const DEFAULT_PIPELINE_PREFIX: usize = 3;

/// Owns a link and the selection/header state layered on top of it.
pub struct DutSession<T: Transport> {
    transport: T,
    buffer_size: usize,
    pipeline_prefix: usize,
    selected_dut: Option<u8>,
    cached_headers: HashMap<u8, Header>,
}

impl<T: Transport> DutSession<T> {
    /// Create a session with the default (FPGA) 3-frame pipeline prefix.
    pub fn new(transport: T) -> Self {
        Self::with_pipeline_prefix(transport, DEFAULT_PIPELINE_PREFIX)
    }

    /// Create a session with an explicit pipeline prefix, for devices
    /// whose pre-DUT register chain is a different depth (the MCU target
    /// uses 2).
    pub fn with_pipeline_prefix(transport: T, pipeline_prefix: usize) -> Self {
        Self {
            transport,
            buffer_size: DEFAULT_BUFFER_SIZE,
            pipeline_prefix,
            selected_dut: None,
            cached_headers: HashMap::new(),
        }
    }

    /// Open the underlying link.
    pub fn open(&mut self) -> Result<()> {
        self.transport.open()
    }

    /// Close the underlying link. The selected-DUT and header cache do not
    /// survive past a session, so nothing else needs resetting here.
    pub fn close(&mut self) -> Result<()> {
        self.transport.close()
    }

    /// The currently selected DUT id, if any.
    pub fn selected_dut(&self) -> Option<u8> {
        self.selected_dut
    }

    /// The number of stale prefix frames every response starts with.
    pub fn pipeline_prefix(&self) -> usize {
        self.pipeline_prefix
    }

    fn require_selected(&self) -> Result<u8> {
        self.selected_dut
            .ok_or_else(|| Error::Transport("no DUT selected".into()))
    }

    /// Select a DUT by id. Selection is sticky until a different id is
    /// selected or the session closes.
    pub fn select(&mut self, id: u8) -> Result<()> {
        let frame = encode(Reg::Ctrl as u8, ctrl::SELECT, (id as i32) << 1, false)?;
        self.transport.write(&frame)?;
        self.selected_dut = Some(id);
        Ok(())
    }

    /// Set the device LED. Not cached host-side; the device owns this
    /// state.
    pub fn led(&mut self, state: bool) -> Result<()> {
        let frame = encode(Reg::Ctrl as u8, ctrl::LED_SET, state as i32, false)?;
        self.transport.write(&frame)
    }

    /// Toggle the device LED using its own primitive, rather than
    /// maintaining host-side LED state.
    pub fn toggle_led(&mut self) -> Result<()> {
        let frame = encode(Reg::Ctrl as u8, ctrl::LED_TOGGLE, 0, false)?;
        self.transport.write(&frame)
    }

    /// Run one cycle on the selected DUT.
    pub fn run(&mut self) -> Result<()> {
        self.require_selected()?;
        let frame = encode(Reg::Ctrl as u8, ctrl::RUN, 0, false)?;
        self.transport.write_and_read(&frame)?;
        Ok(())
    }

    /// Read and decode DUT `id`'s header word, caching the result.
    ///
    /// Protocol: flush input, select `id`, request both `HEAD` halves,
    /// send a dummy frame, then read back four frames in one round trip.
    /// The first two are discarded; the data bytes of the remaining two
    /// concatenate, most-significant first, into the 32-bit header word.
    pub fn get_header(&mut self, id: u8) -> Result<Header> {
        self.transport.flush_input()?;
        let mut req = Vec::with_capacity(12);
        req.extend(encode(Reg::Ctrl as u8, ctrl::SELECT, (id as i32) << 1, false)?);
        req.extend(encode(Reg::Head as u8, 1, 0, false)?);
        req.extend(encode(Reg::Head as u8, 0, 0, false)?);
        req.extend(encode(Reg::Ctrl as u8, ctrl::DUMMY, 0, false)?);
        let resp = self.transport.write_and_read(&req)?;
        let frames = split_frames(&resp)?;
        if frames.len() != 4 {
            return Err(Error::PipelineMismatch {
                frames: frames.len(),
                period: 4,
            });
        }
        let hi = decode_data(&frames[2], false) as u32;
        let lo = decode_data(&frames[3], false) as u32;
        let word = (hi << 16) | (lo & 0xFFFF);
        let header = Header::decode(word)?;
        trace!("dut {id} header word 0x{word:08X} -> {header:?}");
        self.cached_headers.insert(id, header);
        self.selected_dut = Some(id);
        Ok(header)
    }

    /// Enumerate every DUT on the device: read header 0 to learn
    /// `num_duts`, then read the rest.
    pub fn enumerate(&mut self) -> Result<Vec<(u8, Header)>> {
        let h0 = self.get_header(0)?;
        let mut headers = vec![(0u8, h0)];
        for id in 1..=h0.num_duts {
            let h = self.get_header(id)?;
            headers.push((id, h));
        }
        debug!("enumerated {} DUTs", headers.len());
        Ok(headers)
    }

    /// A cached header, if [`DutSession::get_header`] or
    /// [`DutSession::enumerate`] already read it.
    pub fn cached_header(&self, id: u8) -> Option<&Header> {
        self.cached_headers.get(&id)
    }

    /// Stream a pre-built request across the link: chunk it through the
    /// transport's bounded write size, then issue `pipeline_prefix` extra
    /// dummy frames so every caller sees the full stale-prefix response.
    /// Returns the raw concatenated response bytes; callers slice and
    /// decode according to their own cadence.
    pub fn stream(&mut self, request: &[u8]) -> Result<Vec<u8>> {
        self.require_selected()?;
        let mut response = Vec::with_capacity(request.len() + self.pipeline_prefix * 3);
        for chunk in chunk_outgoing(request, self.buffer_size) {
            response.extend(self.transport.write_and_read(chunk)?);
        }
        let mut drain = Vec::with_capacity(self.pipeline_prefix * 3);
        for _ in 0..self.pipeline_prefix {
            drain.extend(encode(Reg::Ctrl as u8, ctrl::DUMMY, 0, false)?);
        }
        response.extend(self.transport.write_and_read(&drain)?);
        Ok(response)
    }

    /// Read the 16-byte skeleton ID, dropping the pipeline prefix.
    pub fn read_skeleton_id(&mut self) -> Result<[u8; 16]> {
        let request = crate::builders::skeleton_id_read()?;
        let response = self.stream(&request)?;
        let frames = split_frames(&response)?;
        let kept = drop_prefix(&frames, self.pipeline_prefix);
        if kept.len() < 16 {
            return Err(Error::PipelineMismatch {
                frames: kept.len(),
                period: 16,
            });
        }
        let mut id = [0u8; 16];
        for (i, slot) in id.iter_mut().enumerate() {
            *slot = kept[i][2];
        }
        Ok(id)
    }
}
