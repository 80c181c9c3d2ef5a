pub mod lemmatizer;
pub mod normalizer;
pub mod record;
pub mod sender;
pub mod stopwords;

pub use normalizer::{NormalizedDocument, TextNormalizer};
pub use record::EmailRecord;
