//! Image preparation for uploads
//!
//! Decodes incoming bytes, contain-fits them onto a fixed canvas and re-encodes
//! the result. Codecs come from the `image` crate.

mod contain;

pub use contain::{
    contain_dimensions, fit_contain, process_image, process_image_blocking, ImagingError,
    ProcessedImage,
};
