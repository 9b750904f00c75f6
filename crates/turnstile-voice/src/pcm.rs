//! PCM16 little-endian decoding for streamed speech.
//!
//! Network chunks are not aligned to sample boundaries, so the decoder
//! carries a trailing odd byte over to the next chunk.

/// Incremental signed 16-bit little-endian PCM decoder.
#[derive(Debug, Default)]
pub struct Pcm16Decoder {
    carry: Option<u8>,
}

impl Pcm16Decoder {
    pub const fn new() -> Self {
        Self { carry: None }
    }

    /// Decode `bytes` into normalised `f32` samples in `[-1.0, 1.0)`.
    pub fn decode(&mut self, bytes: &[u8]) -> Vec<f32> {
        let mut samples = Vec::with_capacity(bytes.len() / 2 + 1);
        let mut rest = bytes;

        if let Some(low) = self.carry.take() {
            match rest.split_first() {
                Some((&high, tail)) => {
                    samples.push(sample(low, high));
                    rest = tail;
                }
                None => {
                    self.carry = Some(low);
                    return samples;
                }
            }
        }

        let mut pairs = rest.chunks_exact(2);
        samples.extend(pairs.by_ref().map(|pair| sample(pair[0], pair[1])));
        self.carry = pairs.remainder().first().copied();

        samples
    }

    /// Whether half a sample is waiting for its second byte.
    pub const fn has_pending(&self) -> bool {
        self.carry.is_some()
    }

    /// Drop any carried byte.
    pub const fn reset(&mut self) {
        self.carry = None;
    }
}

fn sample(low: u8, high: u8) -> f32 {
    f32::from(i16::from_le_bytes([low, high])) / 32768.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_aligned_chunk() {
        let mut decoder = Pcm16Decoder::new();
        let bytes = [0x00, 0x00, 0x00, 0x40, 0x00, 0x80];
        assert_eq!(decoder.decode(&bytes), vec![0.0, 0.5, -1.0]);
        assert!(!decoder.has_pending());
    }

    #[test]
    fn carries_odd_byte_across_chunks() {
        let mut decoder = Pcm16Decoder::new();

        assert_eq!(decoder.decode(&[0x00, 0x40, 0x00]), vec![0.5]);
        assert!(decoder.has_pending());

        assert!(decoder.decode(&[]).is_empty());
        assert!(decoder.has_pending());

        assert_eq!(decoder.decode(&[0xC0]), vec![-0.5]);
        assert!(!decoder.has_pending());
    }

    #[test]
    fn reset_discards_half_sample() {
        let mut decoder = Pcm16Decoder::new();
        decoder.decode(&[0x12]);
        decoder.reset();
        assert_eq!(decoder.decode(&[0x00, 0x40]), vec![0.5]);
    }
}
