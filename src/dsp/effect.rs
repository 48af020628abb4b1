//! Effect trait definition
//!
//! Uniform offline interface over [`AudioBuffer`]s. Real-time hosts should
//! call the engine's slice-based process methods instead.

use crate::engine::AudioBuffer;
use crate::error::Result;
use serde_json::Value;

/// Base trait for buffer-processing effects
///
/// Effects process buffers in place and serialize their parameters for
/// persistence by the host.
pub trait Effect: Send {
    /// Process an audio buffer in place
    fn process(&mut self, buffer: &mut AudioBuffer);

    /// Prepare for a sample rate and maximum block size
    ///
    /// May reallocate; never call while audio is running.
    fn prepare(&mut self, sample_rate: u32, max_block_size: usize) -> Result<()>;

    /// Clear internal buffers and filter history
    fn reset(&mut self);

    /// Effect type identifier
    fn effect_type(&self) -> &'static str;

    /// Human-readable name
    fn display_name(&self) -> &str;

    /// Serialize parameters to JSON
    fn to_json(&self) -> Result<Value>;

    /// Merge parameters from JSON
    fn from_json(&mut self, json: &Value) -> Result<()>;
}
