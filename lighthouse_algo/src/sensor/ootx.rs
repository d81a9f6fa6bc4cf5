// OOTX telemetry framing.
// Every valid sync pulse carries one bit. A frame starts after 17 zero bits,
// which cannot occur inside a frame because every 17th bit is a forced 1.
// The payload starts with a 16 bit length (low byte first, each byte MSB first);
// only the base station info block is recognized and assembled here.

// Licensed under the Apache License, Version 2.0
// Copyright 2024 Anton Khrustalev, creapunk.com

use crate::base_station::INFO_BLOCK_SIZE;
use crate::fault::SignalFault;

const FRAME_START_ZEROS: u8 = 17;
const SYNC_BIT_POSITION: u8 = 17; // Every 17th bit is a sync bit

const LENGTH_FIRST_MASK: u16 = 0x0080; // Low byte arrives first
const LENGTH_SECOND_MASK: u16 = 0x8000;
const BYTE_FIRST_MASK: u8 = 0x80;

/// Bit level OOTX frame decoder for one sensor.
#[derive(Debug)]
pub struct OotxDecoder {
    zero_run: u8,        // Consecutive zero bits seen
    sync_counter: u8,    // Bits since the last sync bit
    length_mask: u16,    // Next payload length bit, 0 when not reading the length
    length: u16,
    block: [u8; INFO_BLOCK_SIZE],
    block_index: usize,
    block_mask: u8,      // Next info block bit, 0 when not reading the block
}

impl Default for OotxDecoder {
    fn default() -> Self {
        Self::new()
    }
}

impl OotxDecoder {
    pub const fn new() -> Self {
        Self {
            zero_run: 0,
            sync_counter: 0,
            length_mask: 0,
            length: 0,
            block: [0; INFO_BLOCK_SIZE],
            block_index: 0,
            block_mask: 0,
        }
    }

    /// `true` while inside a frame, between frame start and the last block bit.
    pub fn is_reading(&self) -> bool {
        self.length_mask != 0 || self.block_mask != 0
    }

    /// Feeds one telemetry bit.
    ///
    /// # Returns
    /// * `Ok(Some(block))` when the last bit of an info block was received
    /// * `Ok(None)` while waiting for or inside a frame
    /// * `Err(FrameSyncError)` when a sync bit is missing, the frame is dropped
    /// * `Err(UnrecognizedPayload)` when the payload is not an info block
    pub fn push_bit(&mut self, bit: bool) -> Result<Option<&[u8; INFO_BLOCK_SIZE]>, SignalFault> {
        self.sync_counter = self.sync_counter.saturating_add(1);

        if bit {
            self.zero_run = 0;
            if self.sync_counter == SYNC_BIT_POSITION {
                self.sync_counter = 0;
                return Ok(None);
            }
        } else {
            self.zero_run += 1;
            if self.zero_run == FRAME_START_ZEROS {
                if self.is_reading() {
                    debug!("OOTX: frame restarted");
                }
                self.zero_run = 0;
                // The bit right after the preamble is a sync bit
                self.sync_counter = SYNC_BIT_POSITION - 1;
                self.block_mask = 0;
                self.length_mask = LENGTH_FIRST_MASK;
                return Ok(None);
            }
            if self.sync_counter == SYNC_BIT_POSITION && self.is_reading() {
                self.sync_counter = 0;
                self.reset_frame();
                return Err(SignalFault::FrameSyncError);
            }
        }

        if self.length_mask != 0 {
            return self.read_length_bit(bit);
        }
        if self.block_mask != 0 {
            return Ok(self.read_block_bit(bit));
        }
        Ok(None)
    }

    fn read_length_bit(&mut self, bit: bool) -> Result<Option<&[u8; INFO_BLOCK_SIZE]>, SignalFault> {
        if bit {
            self.length |= self.length_mask;
        } else {
            self.length &= !self.length_mask;
        }

        self.length_mask >>= 1;
        if self.length_mask == 0 {
            self.length_mask = LENGTH_SECOND_MASK;
        } else if self.length_mask == LENGTH_FIRST_MASK {
            // Both bytes received
            self.length_mask = 0;
            if usize::from(self.length) != INFO_BLOCK_SIZE {
                return Err(SignalFault::UnrecognizedPayload);
            }
            debug!("OOTX: reading base station info block");
            self.block_index = 0;
            self.block_mask = BYTE_FIRST_MASK;
        }
        Ok(None)
    }

    fn read_block_bit(&mut self, bit: bool) -> Option<&[u8; INFO_BLOCK_SIZE]> {
        let byte = &mut self.block[self.block_index];
        if bit {
            *byte |= self.block_mask;
        } else {
            *byte &= !self.block_mask;
        }

        self.block_mask >>= 1;
        if self.block_mask != 0 {
            return None;
        }

        self.block_index += 1;
        if self.block_index < INFO_BLOCK_SIZE {
            self.block_mask = BYTE_FIRST_MASK;
            return None;
        }

        // Last bit of the block, wait for the next frame
        self.reset_frame();
        Some(&self.block)
    }

    /// Last fully or partially assembled info block.
    pub fn block(&self) -> &[u8; INFO_BLOCK_SIZE] {
        &self.block
    }

    /// Forgets all framing progress, the next frame starts from its preamble.
    pub fn reset(&mut self) {
        self.zero_run = 0;
        self.sync_counter = 0;
        self.reset_frame();
    }

    fn reset_frame(&mut self) {
        self.length_mask = 0;
        self.block_mask = 0;
        self.block_index = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Bitstream of a complete frame: preamble, then 16 bit words each followed by a sync bit.
    fn frame_bits(payload: &[u8]) -> Vec<bool> {
        let mut bytes = Vec::new();
        bytes.extend_from_slice(&(payload.len() as u16).to_le_bytes());
        bytes.extend_from_slice(payload);
        if bytes.len() % 2 != 0 {
            bytes.push(0);
        }
        // CRC32 is not checked, any 4 bytes will do
        bytes.extend_from_slice(&[0xde, 0xad, 0xbe, 0xef]);

        let mut bits = vec![false; 17];
        bits.push(true);
        for word in bytes.chunks(2) {
            for byte in word {
                bits.extend((0..8).rev().map(|i| byte & (1 << i) != 0));
            }
            bits.push(true);
        }
        bits
    }

    fn sample_block() -> [u8; INFO_BLOCK_SIZE] {
        let mut block = [0u8; INFO_BLOCK_SIZE];
        for (i, byte) in block.iter_mut().enumerate() {
            *byte = (i as u8).wrapping_mul(37) ^ 0x5a;
        }
        block
    }

    fn feed(decoder: &mut OotxDecoder, bits: &[bool]) -> (Option<[u8; INFO_BLOCK_SIZE]>, Vec<SignalFault>) {
        let mut received = None;
        let mut faults = Vec::new();
        for &bit in bits {
            match decoder.push_bit(bit) {
                Ok(Some(block)) => received = Some(*block),
                Ok(None) => {}
                Err(fault) => faults.push(fault),
            }
        }
        (received, faults)
    }

    #[test]
    fn reconstructs_info_block() {
        let block = sample_block();
        let mut decoder = OotxDecoder::new();

        // Leading noise must not confuse the framing
        let mut bits = vec![true, false, true, true];
        bits.extend(frame_bits(&block));

        let (received, faults) = feed(&mut decoder, &bits);
        assert_eq!(received, Some(block));
        assert!(faults.is_empty());
        assert!(!decoder.is_reading());
    }

    #[test]
    fn block_reported_on_its_last_bit() {
        let block = sample_block();
        let bits = frame_bits(&block);
        // Preamble + sync, 2 length bytes + 33 block bytes, plus one sync bit per 16 data bits
        let data_bits = (2 + INFO_BLOCK_SIZE) * 8;
        let last = 18 + data_bits + (data_bits - 1) / 16;

        let mut decoder = OotxDecoder::new();
        for &bit in &bits[..last - 1] {
            assert_eq!(decoder.push_bit(bit), Ok(None));
        }
        assert_eq!(decoder.push_bit(bits[last - 1]), Ok(Some(&block)));
    }

    #[test]
    fn consecutive_frames_decode_again() {
        let first = sample_block();
        let mut second = first;
        second[20] = 0x81;

        let mut bits = frame_bits(&first);
        bits.extend(frame_bits(&second));

        let mut decoder = OotxDecoder::new();
        let mut blocks = Vec::new();
        for bit in bits {
            if let Ok(Some(block)) = decoder.push_bit(bit) {
                blocks.push(*block);
            }
        }
        assert_eq!(blocks, vec![first, second]);
    }

    #[test]
    fn missing_sync_bit_drops_frame() {
        let block = sample_block();
        let mut bits = frame_bits(&block);
        // Sync bit after the second data word
        let sync = 18 + 2 * 16 + 1;
        assert!(bits[sync]);
        bits[sync] = false;

        let mut decoder = OotxDecoder::new();
        let (received, faults) = feed(&mut decoder, &bits);
        assert_eq!(received, None);
        assert_eq!(faults, vec![SignalFault::FrameSyncError]);

        // The next clean frame is accepted
        let (received, faults) = feed(&mut decoder, &frame_bits(&block));
        assert_eq!(received, Some(block));
        assert!(faults.is_empty());
    }

    #[test]
    fn reset_discards_partial_frame() {
        let block = sample_block();
        let bits = frame_bits(&block);
        let mut decoder = OotxDecoder::new();
        for &bit in &bits[..200] {
            assert_eq!(decoder.push_bit(bit), Ok(None));
        }
        decoder.reset();
        assert!(!decoder.is_reading());

        // Tail of the interrupted frame is ignored, the next one decodes
        let (received, faults) = feed(&mut decoder, &bits[200..]);
        assert_eq!(received, None);
        assert!(faults.is_empty());
        let (received, _) = feed(&mut decoder, &bits);
        assert_eq!(received, Some(block));
    }

    #[test]
    fn foreign_payload_is_ignored() {
        let mut decoder = OotxDecoder::new();
        let (received, faults) = feed(&mut decoder, &frame_bits(&[0x11; 20]));
        assert_eq!(received, None);
        assert_eq!(faults, vec![SignalFault::UnrecognizedPayload]);
        assert!(!decoder.is_reading());
    }
}
