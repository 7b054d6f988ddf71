/*! The 32-bit DUT header word and the family of accelerators it describes.

A header is obtained by concatenating two successive `HEAD` reads (see
[`crate::session`]); decoding the word is pure and lives here so it can
be tested without a transport.
*/
use crate::error::{Error, Result};

/// The closed set of accelerator kinds a device can expose behind a
/// skeleton. `dut_type` values outside this set are protocol violations;
/// values inside it but marked reserved are valid headers the
/// orchestrator still refuses to drive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DutType {
    /// Slot not populated.
    Disabled,
    /// Loopback with pipeline delay.
    Echo,
    /// Read-only lookup table.
    Rom,
    /// Read/write memory.
    Ram,
    /// Arithmetic unit (1 or 2 inputs).
    Math,
    /// Digital filter under Bode sweep.
    Filter,
    /// Windowing function. Reserved; not implemented.
    WindowingReserved,
    /// Fixed-point neural network.
    Dnn,
    /// End-to-end pipeline. Reserved; not implemented.
    EndToEndReserved,
}

impl DutType {
    /// Map a raw 4-bit `dut_type` field to its enum value.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnsupportedDut`] for any value not in the closed
    /// set (9..=15).
    pub fn from_raw(raw: u8) -> Result<Self> {
        Ok(match raw {
            0 => DutType::Disabled,
            1 => DutType::Echo,
            2 => DutType::Rom,
            3 => DutType::Ram,
            4 => DutType::Math,
            5 => DutType::Filter,
            6 => DutType::WindowingReserved,
            7 => DutType::Dnn,
            8 => DutType::EndToEndReserved,
            other => return Err(Error::UnsupportedDut(other)),
        })
    }

    /// Whether the orchestrator has a driver for this type.
    pub fn is_driveable(&self) -> bool {
        !matches!(
            self,
            DutType::Disabled | DutType::WindowingReserved | DutType::EndToEndReserved
        )
    }
}

/// A decoded DUT header word.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Header {
    /// Total DUTs on the device, minus one.
    pub num_duts: u8,
    /// Raw 4-bit accelerator kind; use [`Header::dut_type`] to interpret it.
    pub dut_type_raw: u8,
    /// Number of scalar inputs the DUT accepts per cycle.
    pub num_inputs: u8,
    /// Number of scalar outputs the DUT produces per cycle.
    pub num_outputs: u8,
    /// Fixed-point width of each input, in bits.
    pub bitwidth_input: u8,
    /// Fixed-point width of each output, in bits.
    pub bitwidth_output: u8,
}

const NUM_DUTS_SHIFT: u32 = 26;
const DUT_TYPE_SHIFT: u32 = 22;
const NUM_INPUTS_SHIFT: u32 = 16;
const NUM_OUTPUTS_SHIFT: u32 = 10;
const BITWIDTH_INPUT_SHIFT: u32 = 5;
const BITWIDTH_OUTPUT_SHIFT: u32 = 0;

const FIELD6_MASK: u32 = 0x3F;
const FIELD4_MASK: u32 = 0xF;
const FIELD5_MASK: u32 = 0x1F;

impl Header {
    /// Decode a 32-bit header word per the field layout in the protocol
    /// description: `num_duts:6 | dut_type:4 | num_inputs:6 | num_outputs:6
    /// | bitwidth_input:5 | bitwidth_output:5`, most-significant field
    /// first.
    ///
    /// # Errors
    ///
    /// Returns [`Error::HeaderInvalid`] if either bitwidth field exceeds 16,
    /// the only combination the field widths here can represent but the
    /// link's 16-bit data payload cannot.
    pub fn decode(word: u32) -> Result<Self> {
        let num_duts = ((word >> NUM_DUTS_SHIFT) & FIELD6_MASK) as u8;
        let dut_type_raw = ((word >> DUT_TYPE_SHIFT) & FIELD4_MASK) as u8;
        let num_inputs = ((word >> NUM_INPUTS_SHIFT) & FIELD6_MASK) as u8;
        let num_outputs = ((word >> NUM_OUTPUTS_SHIFT) & FIELD6_MASK) as u8;
        let bitwidth_input = ((word >> BITWIDTH_INPUT_SHIFT) & FIELD5_MASK) as u8;
        let bitwidth_output = ((word >> BITWIDTH_OUTPUT_SHIFT) & FIELD5_MASK) as u8;
        if bitwidth_input > 16 || bitwidth_output > 16 {
            return Err(Error::HeaderInvalid(format!(
                "bitwidth_input={bitwidth_input} bitwidth_output={bitwidth_output} exceeds 16"
            )));
        }
        Ok(Header {
            num_duts,
            dut_type_raw,
            num_inputs,
            num_outputs,
            bitwidth_input,
            bitwidth_output,
        })
    }

    /// Re-encode the header into its 32-bit wire word. Inverse of
    /// [`Header::decode`] for any header produced by it.
    pub fn encode(&self) -> u32 {
        ((self.num_duts as u32 & FIELD6_MASK) << NUM_DUTS_SHIFT)
            | ((self.dut_type_raw as u32 & FIELD4_MASK) << DUT_TYPE_SHIFT)
            | ((self.num_inputs as u32 & FIELD6_MASK) << NUM_INPUTS_SHIFT)
            | ((self.num_outputs as u32 & FIELD6_MASK) << NUM_OUTPUTS_SHIFT)
            | ((self.bitwidth_input as u32 & FIELD5_MASK) << BITWIDTH_INPUT_SHIFT)
            | ((self.bitwidth_output as u32 & FIELD5_MASK) << BITWIDTH_OUTPUT_SHIFT)
    }

    /// Interpret [`Header::dut_type_raw`] as a [`DutType`].
    pub fn dut_type(&self) -> Result<DutType> {
        DutType::from_raw(self.dut_type_raw)
    }

    /// The effective bitwidth on the input side, used to compute the link
    /// scaling factor `2^(16 - bitwidth_effective)`.
    pub fn input_scale(&self) -> u32 {
        1u32 << (16 - self.bitwidth_input as u32)
    }

    /// The effective bitwidth on the output side.
    pub fn output_scale(&self) -> u32 {
        1u32 << (16 - self.bitwidth_output as u32)
    }
}
