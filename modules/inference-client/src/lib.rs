pub mod huggingface;
pub mod traits;
pub mod util;

pub use huggingface::HuggingFace;
pub use traits::{ClassScore, TextClassifier};
pub use util::truncate_to_char_boundary;
