//! Sample format and channel layout conversion

/// Convert f32 [-1.0, 1.0] to i16
#[inline]
pub fn f32_to_i16(sample: f32) -> i16 {
    (sample.clamp(-1.0, 1.0) * 32767.0) as i16
}

/// Convert f32 [-1.0, 1.0] to a 24-bit integer held in an i32
#[inline]
pub fn f32_to_i24(sample: f32) -> i32 {
    (sample.clamp(-1.0, 1.0) * 8_388_607.0) as i32
}

pub fn to_i16(samples: &[f32]) -> Vec<i16> {
    samples.iter().map(|&s| f32_to_i16(s)).collect()
}

/// Reduce interleaved audio with more than two channels to stereo by
/// keeping the front left/right pair. Mono and stereo pass through.
pub fn fold_to_stereo(samples: &[f32], channels: u16) -> Vec<f32> {
    let channels = channels as usize;
    if channels <= 2 {
        return samples.to_vec();
    }
    samples
        .chunks_exact(channels)
        .flat_map(|frame| [frame[0], frame[1]])
        .collect()
}

/// Duplicate a mono signal into both channels of a stereo one
pub fn mono_to_stereo(samples: &[f32]) -> Vec<f32> {
    samples.iter().flat_map(|&s| [s, s]).collect()
}
