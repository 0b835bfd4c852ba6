//! Audio resampling using rubato
//!
//! Line and background audio arrive at whatever rate the TTS engine or asset
//! files use; everything is converted to the output sink's rate before
//! processing.

use crate::error::{Error, Result};
use rubato::{FastFixedIn, PolynomialDegree, Resampler as RubatoResampler};
use tracing::debug;

/// Resample a mono buffer from `input_rate` to `output_rate`.
///
/// Returns a copy when the rates already match.
pub fn resample(input: &[f32], input_rate: u32, output_rate: u32) -> Result<Vec<f32>> {
    if input_rate == output_rate || input.is_empty() {
        return Ok(input.to_vec());
    }

    debug!(
        "Resampling {} samples from {}Hz to {}Hz",
        input.len(),
        input_rate,
        output_rate
    );

    let mut resampler = FastFixedIn::<f32>::new(
        f64::from(output_rate) / f64::from(input_rate),
        1.0, // fixed ratio, no runtime changes
        PolynomialDegree::Septic,
        input.len(),
        1,
    )
    .map_err(|e| Error::Decode(format!("failed to create resampler: {}", e)))?;

    let planar = vec![input.to_vec()];
    let mut output = resampler
        .process(&planar, None)
        .map_err(|e| Error::Decode(format!("resampling failed: {}", e)))?;

    Ok(output.swap_remove(0))
}
