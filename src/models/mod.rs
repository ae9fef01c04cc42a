mod product;
mod record;

pub use product::SavedProduct;
pub use record::{Confidence, GroundingSource, RecognitionRecord, ScanMode};
