//! Product catalog retrieval.
//!
//! A [`SelfQueryRetriever`] asks a [`QueryDecomposer`] to split free text
//! into a semantic query and a [`MetadataFilter`], then runs the filtered
//! search on a [`FilteredIndex`]. Category values in the filter are limited
//! to the shared [`CategoryVocabulary`].

pub mod filter;
pub mod memory;
pub mod retriever;
pub mod vocabulary;

pub use filter::{Bound, Condition, DecomposedQuery, MetadataFilter, RawCondition};
pub use memory::InMemoryCatalog;
pub use retriever::{FilteredIndex, PassthroughDecomposer, QueryDecomposer, SelfQueryRetriever};
pub use vocabulary::CategoryVocabulary;
