//! MCU framed request/response codec.
//!
//! Frame layout in both directions:
//!
//! ```text
//! STX(2) = FF FF | CMD(1) | LEN(1) | DATA(LEN) | ETX(2) = FE FE
//! ```
//!
//! `LEN <= 12`; DATA is zero or more little-endian u32 fields (4 bytes each).
//! Temperatures travel as `round(°C × 10)` in one field.

use eol_common::error::{EolError, EolResult};
use tracing::warn;

/// Start-of-frame marker.
pub const STX: [u8; 2] = [0xFF, 0xFF];
/// End-of-frame marker.
pub const ETX: [u8; 2] = [0xFE, 0xFE];
/// STX + CMD + LEN + ETX.
pub const FRAME_OVERHEAD: usize = 6;
/// Maximum DATA payload length.
pub const MAX_DATA_SIZE: usize = 12;
/// Reassembly buffer cap; on overrun the newest half is retained.
pub const BUFFER_CAP: usize = 1024;
/// Temperatures are scaled by 10 on the wire (40.5 °C → 405).
pub const TEMP_SCALE: f64 = 10.0;

/// Command codes (PC → MCU).
pub mod cmd {
    /// Enter test mode (mode: u32).
    pub const ENTER_TEST_MODE: u8 = 0x01;
    /// Set upper temperature limit (°C×10: u32).
    pub const SET_UPPER_TEMP: u8 = 0x02;
    /// Set fan speed (level: u32).
    pub const SET_FAN_SPEED: u8 = 0x03;
    /// Initialize standby heating (op×10, standby×10, hold_ms).
    pub const INIT: u8 = 0x04;
    /// Set operating temperature (°C×10: u32).
    pub const SET_OPERATING_TEMP: u8 = 0x05;
    /// Set cooling temperature (°C×10: u32).
    pub const SET_COOLING_TEMP: u8 = 0x06;
    /// Request current temperature.
    pub const REQUEST_TEMP: u8 = 0x07;
    /// Stroke initialization complete notification.
    pub const STROKE_INIT_COMPLETE: u8 = 0x08;
}

/// Status codes (MCU → PC).
pub mod status {
    /// Controller finished booting.
    pub const BOOT_COMPLETE: u8 = 0x00;
    /// ACK for enter-test-mode.
    pub const TEST_MODE_OK: u8 = 0x01;
    /// ACK for set-upper-temp.
    pub const UPPER_TEMP_OK: u8 = 0x02;
    /// ACK for set-fan-speed.
    pub const FAN_SPEED_OK: u8 = 0x03;
    /// ACK for init.
    pub const INIT_OK: u8 = 0x04;
    /// ACK for set-operating-temp.
    pub const OPERATING_TEMP_OK: u8 = 0x05;
    /// ACK for set-cooling-temp.
    pub const COOLING_TEMP_OK: u8 = 0x06;
    /// Temperature response (two u32 fields, first = °C×10).
    pub const TEMP_RESPONSE: u8 = 0x07;
    /// ACK for stroke-init-complete.
    pub const STROKE_INIT_OK: u8 = 0x08;
    /// Temperature rise started.
    pub const TEMP_RISE_START: u8 = 0x09;
    /// Temperature fall started.
    pub const TEMP_FALL_START: u8 = 0x0A;
    /// Operating temperature reached.
    pub const OPERATING_TEMP_REACHED: u8 = 0x0B;
    /// Standby temperature reached.
    pub const STANDBY_TEMP_REACHED: u8 = 0x0C;
    /// Cooling temperature reached.
    pub const COOLING_TEMP_REACHED: u8 = 0x0D;
    /// Standby initialization complete.
    pub const INIT_COMPLETE: u8 = 0x0E;

    /// Human-readable description of a status code.
    pub const fn describe(code: u8) -> &'static str {
        match code {
            BOOT_COMPLETE => "boot complete",
            TEST_MODE_OK => "test mode entry complete",
            UPPER_TEMP_OK => "upper temperature set OK",
            FAN_SPEED_OK => "fan speed set OK",
            INIT_OK => "standby initialization OK",
            OPERATING_TEMP_OK => "operating temperature set OK",
            COOLING_TEMP_OK => "cooling temperature set OK",
            TEMP_RESPONSE => "temperature response",
            STROKE_INIT_OK => "stroke initialization OK",
            TEMP_RISE_START => "temperature rise started",
            TEMP_FALL_START => "temperature fall started",
            OPERATING_TEMP_REACHED => "operating temperature reached",
            STANDBY_TEMP_REACHED => "standby temperature reached",
            COOLING_TEMP_REACHED => "cooling temperature reached",
            INIT_COMPLETE => "standby initialization complete",
            _ => "unknown status",
        }
    }
}

/// Encode a temperature for the wire.
#[inline]
pub fn encode_temperature(celsius: f64) -> u32 {
    (celsius * TEMP_SCALE).round() as u32
}

/// Decode a wire temperature.
#[inline]
pub fn decode_temperature(raw: u32) -> f64 {
    raw as f64 / TEMP_SCALE
}

/// One decoded frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    /// Command or status code.
    pub command: u8,
    /// Raw DATA payload (length multiple of 4, at most 12).
    pub data: Vec<u8>,
}

impl Frame {
    /// Little-endian u32 fields carried in DATA.
    pub fn fields(&self) -> Vec<u32> {
        self.data
            .chunks_exact(4)
            .map(|c| u32::from_le_bytes([c[0], c[1], c[2], c[3]]))
            .collect()
    }

    /// Temperature carried in the first DATA field, if any.
    pub fn temperature(&self) -> Option<f64> {
        self.fields().first().map(|&raw| decode_temperature(raw))
    }
}

/// Encode a command frame with u32 arguments.
///
/// # Errors
///
/// `EolError::Protocol` if more than three fields are given (LEN would
/// exceed 12).
pub fn encode(command: u8, fields: &[u32]) -> EolResult<Vec<u8>> {
    let data_len = fields.len() * 4;
    if data_len > MAX_DATA_SIZE {
        return Err(EolError::protocol(
            "mcu",
            format!("payload {data_len} exceeds maximum {MAX_DATA_SIZE}"),
        ));
    }

    let mut frame = Vec::with_capacity(FRAME_OVERHEAD + data_len);
    frame.extend_from_slice(&STX);
    frame.push(command);
    frame.push(data_len as u8);
    for field in fields {
        frame.extend_from_slice(&field.to_le_bytes());
    }
    frame.extend_from_slice(&ETX);
    Ok(frame)
}

/// Decode one exact frame.
///
/// # Errors
///
/// `EolError::Protocol` on short input, bad STX/ETX, or a length mismatch.
pub fn decode(bytes: &[u8]) -> EolResult<Frame> {
    if bytes.len() < FRAME_OVERHEAD {
        return Err(EolError::protocol(
            "mcu",
            format!("frame too short: {} bytes", bytes.len()),
        ));
    }
    if bytes[..2] != STX {
        return Err(EolError::protocol(
            "mcu",
            format!("invalid STX: {:02X} {:02X}", bytes[0], bytes[1]),
        ));
    }
    if bytes[bytes.len() - 2..] != ETX {
        return Err(EolError::protocol(
            "mcu",
            format!(
                "invalid ETX: {:02X} {:02X}",
                bytes[bytes.len() - 2],
                bytes[bytes.len() - 1]
            ),
        ));
    }

    let command = bytes[2];
    let data_len = bytes[3] as usize;
    if data_len > MAX_DATA_SIZE {
        return Err(EolError::protocol(
            "mcu",
            format!("declared length {data_len} exceeds maximum {MAX_DATA_SIZE}"),
        ));
    }
    if bytes.len() != FRAME_OVERHEAD + data_len {
        return Err(EolError::protocol(
            "mcu",
            format!(
                "frame length mismatch: expected {}, got {}",
                FRAME_OVERHEAD + data_len,
                bytes.len()
            ),
        ));
    }

    Ok(Frame {
        command,
        data: bytes[4..4 + data_len].to_vec(),
    })
}

/// Reassembly buffer for incoming MCU bytes.
///
/// Owns the byte stream between reads: seeks STX, discards garbage before
/// it, and emits complete validated frames. Malformed-ETX frames are dropped
/// with a warning; resynchronization is "seek next STX" only.
#[derive(Debug, Default)]
pub struct FrameBuffer {
    buffer: Vec<u8>,
}

impl FrameBuffer {
    /// Create an empty buffer.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append incoming bytes.
    ///
    /// On overrun past [`BUFFER_CAP`] the newest half is retained; overflow
    /// is logged, never fatal.
    pub fn push(&mut self, data: &[u8]) {
        self.buffer.extend_from_slice(data);
        if self.buffer.len() > BUFFER_CAP {
            let keep_from = self.buffer.len() - BUFFER_CAP / 2;
            self.buffer.drain(..keep_from);
            warn!("MCU frame buffer overflow, retained newest {} bytes", self.buffer.len());
        }
    }

    /// Extract the next complete frame, if one is buffered.
    ///
    /// Returns `None` until at least `FRAME_OVERHEAD + LEN` bytes past an
    /// STX are available.
    pub fn next_frame(&mut self) -> Option<Frame> {
        loop {
            // Seek STX, discarding any preceding bytes.
            let stx_index = self
                .buffer
                .windows(2)
                .position(|w| w == STX.as_slice())?;
            if stx_index > 0 {
                self.buffer.drain(..stx_index);
            }

            if self.buffer.len() < 4 {
                return None;
            }

            let data_len = self.buffer[3] as usize;
            let frame_len = FRAME_OVERHEAD + data_len;
            if self.buffer.len() < frame_len {
                return None;
            }

            let candidate = &self.buffer[..frame_len];
            match decode(candidate) {
                Ok(frame) => {
                    self.buffer.drain(..frame_len);
                    return Some(frame);
                }
                Err(e) => {
                    warn!("dropping malformed MCU frame: {e}");
                    // Skip this STX and seek the next one.
                    self.buffer.drain(..2);
                }
            }
        }
    }

    /// Discard all buffered bytes.
    pub fn clear(&mut self) {
        self.buffer.clear();
    }

    /// Bytes currently buffered.
    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    /// True when nothing is buffered.
    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encode_decode_roundtrip_all_lengths() {
        let cases: Vec<(u8, Vec<u32>)> = vec![
            (cmd::REQUEST_TEMP, vec![]),
            (cmd::SET_FAN_SPEED, vec![10]),
            (cmd::SET_OPERATING_TEMP, vec![encode_temperature(52.0)]),
            (cmd::INIT, vec![520, 380, 0]),
        ];

        for (command, fields) in cases {
            let encoded = encode(command, &fields).expect("encode");
            assert_eq!(encoded.len(), FRAME_OVERHEAD + fields.len() * 4);

            let frame = decode(&encoded).expect("decode");
            assert_eq!(frame.command, command);
            assert_eq!(frame.fields(), fields);
        }
    }

    #[test]
    fn oversized_payload_rejected() {
        let result = encode(cmd::INIT, &[1, 2, 3, 4]);
        assert!(matches!(result, Err(EolError::Protocol { .. })));
    }

    #[test]
    fn temperature_scaling() {
        assert_eq!(encode_temperature(40.5), 405);
        assert_eq!(encode_temperature(38.0), 380);
        assert_eq!(decode_temperature(405), 40.5);
        // Rounding, not truncation.
        assert_eq!(encode_temperature(40.56), 406);
    }

    #[test]
    fn decode_wrong_etx_is_protocol_error() {
        let mut bytes = encode(cmd::REQUEST_TEMP, &[]).expect("encode");
        let last = bytes.len() - 1;
        bytes[last] = 0x00;
        let result = decode(&bytes);
        assert!(matches!(result, Err(EolError::Protocol { .. })));
    }

    #[test]
    fn decode_length_mismatch_is_protocol_error() {
        // LEN says 4 but no data bytes follow.
        let bytes = [0xFF, 0xFF, 0x07, 0x04, 0xFE, 0xFE];
        assert!(decode(&bytes).is_err());
    }

    #[test]
    fn buffer_reassembles_frame_split_across_chunks() {
        // Boot-complete frame split into three chunks.
        let mut buffer = FrameBuffer::new();
        buffer.push(&[0xFF]);
        assert!(buffer.next_frame().is_none());
        buffer.push(&[0xFF, 0x00, 0x00]);
        assert!(buffer.next_frame().is_none());
        buffer.push(&[0xFE, 0xFE]);

        let frame = buffer.next_frame().expect("one frame");
        assert_eq!(frame.command, status::BOOT_COMPLETE);
        assert!(frame.data.is_empty());
        assert!(buffer.is_empty());
    }

    #[test]
    fn buffer_discards_garbage_before_stx() {
        let mut buffer = FrameBuffer::new();
        let mut bytes = vec![0x12, 0x34, 0x56];
        bytes.extend(encode(cmd::SET_FAN_SPEED, &[3]).expect("encode"));
        buffer.push(&bytes);

        let frame = buffer.next_frame().expect("frame after garbage");
        assert_eq!(frame.command, cmd::SET_FAN_SPEED);
        assert_eq!(frame.fields(), vec![3]);
    }

    #[test]
    fn buffer_drops_bad_etx_and_resyncs() {
        let mut corrupted = encode(status::TEMP_RESPONSE, &[380, 0]).expect("encode");
        let last = corrupted.len() - 1;
        corrupted[last] = 0x00; // wreck the ETX

        let mut buffer = FrameBuffer::new();
        buffer.push(&corrupted);
        buffer.push(&encode(status::BOOT_COMPLETE, &[]).expect("encode"));

        // The corrupted frame is skipped; the good frame comes out.
        let frame = buffer.next_frame().expect("good frame");
        assert_eq!(frame.command, status::BOOT_COMPLETE);
    }

    #[test]
    fn buffer_overflow_keeps_newest_half() {
        let mut buffer = FrameBuffer::new();
        buffer.push(&vec![0x00; BUFFER_CAP + 100]);
        assert!(buffer.len() <= BUFFER_CAP);

        // A frame pushed after the overflow still decodes.
        buffer.push(&encode(cmd::REQUEST_TEMP, &[]).expect("encode"));
        let frame = buffer.next_frame().expect("frame survives overflow");
        assert_eq!(frame.command, cmd::REQUEST_TEMP);
    }

    #[test]
    fn status_descriptions_cover_known_codes() {
        assert_eq!(status::describe(status::BOOT_COMPLETE), "boot complete");
        assert_eq!(
            status::describe(status::STANDBY_TEMP_REACHED),
            "standby temperature reached"
        );
        assert_eq!(status::describe(0x7F), "unknown status");
    }

    #[test]
    fn back_to_back_frames_emit_in_order() {
        let mut buffer = FrameBuffer::new();
        let mut bytes = encode(status::TEMP_RISE_START, &[]).expect("encode");
        bytes.extend(encode(status::TEMP_RESPONSE, &[405, 0]).expect("encode"));
        buffer.push(&bytes);

        assert_eq!(
            buffer.next_frame().expect("first").command,
            status::TEMP_RISE_START
        );
        let second = buffer.next_frame().expect("second");
        assert_eq!(second.command, status::TEMP_RESPONSE);
        assert_eq!(second.temperature(), Some(40.5));
        assert!(buffer.next_frame().is_none());
    }
}
