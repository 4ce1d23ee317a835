//! Epoch quantization helpers.
//!
//! Epochs are fixed-duration buckets identified by their start timestamp,
//! which is always a multiple of the epoch duration. All decay events are
//! quantized to these boundaries.

/// The start of the epoch containing `ts`.
pub fn epoch_start(ts: u64, epoch_duration: u64) -> u64 {
    ts / epoch_duration * epoch_duration
}

/// The start of the epoch after the one containing `ts`.
pub fn next_epoch_start(ts: u64, epoch_duration: u64) -> u64 {
    epoch_start(ts, epoch_duration) + epoch_duration
}

/// Whether `ts` falls exactly on an epoch boundary.
pub fn is_epoch_boundary(ts: u64, epoch_duration: u64) -> bool {
    ts % epoch_duration == 0
}

/// Number of whole epochs between two boundaries (`to >= from`, both aligned).
pub fn epochs_between(from: u64, to: u64, epoch_duration: u64) -> u64 {
    to.saturating_sub(from) / epoch_duration
}
