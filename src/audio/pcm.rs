//! 16-bit little-endian linear PCM, the wire format in both directions.

use crate::error::DecodeError;

const PCM_SCALE: f32 = 32_768.0;

/// Scale a float sample into i16, clamping anything outside [-1.0, 1.0).
pub fn float_to_i16(sample: f32) -> i16 {
    (sample * PCM_SCALE).round().clamp(-32_768.0, 32_767.0) as i16
}

pub fn i16_to_float(sample: i16) -> f32 {
    f32::from(sample) / PCM_SCALE
}

pub fn encode_pcm16(samples: &[f32]) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(samples.len() * 2);
    for sample in samples {
        bytes.extend_from_slice(&float_to_i16(*sample).to_le_bytes());
    }
    bytes
}

pub fn decode_pcm16(bytes: &[u8]) -> Result<Vec<f32>, DecodeError> {
    if bytes.is_empty() {
        return Err(DecodeError::Empty);
    }
    if bytes.len() % 2 != 0 {
        return Err(DecodeError::OddLength(bytes.len()));
    }
    Ok(bytes
        .chunks_exact(2)
        .map(|pair| i16_to_float(i16::from_le_bytes([pair[0], pair[1]])))
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn float_to_i16_clamps_and_rounds() {
        assert_eq!(float_to_i16(0.0), 0);
        assert_eq!(float_to_i16(1.0), 32_767);
        assert_eq!(float_to_i16(-1.0), -32_768);
        assert_eq!(float_to_i16(2.5), 32_767);
        assert_eq!(float_to_i16(-3.0), -32_768);
        assert_eq!(float_to_i16(0.5), 16_384);
        assert_eq!(float_to_i16(1.6 / 32_768.0), 2);
        assert_eq!(float_to_i16(f32::NAN), 0);
    }

    #[test]
    fn encode_writes_little_endian_pairs() {
        let bytes = encode_pcm16(&[0.5, -1.0]);
        assert_eq!(bytes, vec![0x00, 0x40, 0x00, 0x80]);
    }

    #[test]
    fn decode_divides_by_full_scale() {
        let samples = decode_pcm16(&[0x00, 0x40, 0x00, 0x80, 0xff, 0x7f]).unwrap();
        assert_eq!(samples[0], 0.5);
        assert_eq!(samples[1], -1.0);
        assert!((samples[2] - 32_767.0 / 32_768.0).abs() < f32::EPSILON);
    }

    #[test]
    fn decode_rejects_empty_and_odd_payloads() {
        assert_eq!(decode_pcm16(&[]), Err(DecodeError::Empty));
        assert_eq!(decode_pcm16(&[1, 2, 3]), Err(DecodeError::OddLength(3)));
    }
}
