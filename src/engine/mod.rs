//! Pixel engine
//!
//! Everything here is synchronous CPU work on `RgbaImage` buffers:
//! - Upload validation and decoding
//! - Composed brightness/contrast/saturation/blur filter
//! - Crop and rotate
//! - Mask painting for generative fill
//! - Resolution-aware export

pub mod adjust;
pub mod buffer;
pub mod codec;
pub mod export;
pub mod mask;
pub mod transform;

pub use adjust::{apply_adjustments, Adjustments};
pub use buffer::EditableImage;
pub use export::{ExportedImage, Resolution};
pub use mask::{BrushStroke, Mask, MaskMode};
pub use transform::CropRegion;
