//! Feature engineering: calendar decomposition, normalization and one-hot alignment.

pub mod calendar;
pub mod encode;
pub mod normalize;

pub use encode::{Aligner, EncodedMatrix, UnknownCategoryPolicy};
pub use normalize::{ABSENT_HOLIDAY, Bounds, InputBounds, NormalizedRecord, Normalizer};
