//! Layout arithmetic for images too large for a single NITF image segment.

mod blocker;
mod segmenter;

pub use blocker::{block_tile, BlockShape, BlockingError, ImageBlocker, SegmentLayout};
pub use segmenter::{
    ImageSegmentComputer, Limits, SegmentRange, SegmentationError, ILOC_MAX, NUM_BYTES_MAX,
};
