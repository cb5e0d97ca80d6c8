//! Embedding model/dimension compatibility check (spec §4.14). Blocks
//! semantic reads when the stored model identity no longer matches the
//! configured one; status/delete paths report the same mismatch as a
//! non-blocking warning instead.

use crate::error::{Result, SearchError};
use crate::metadata::EmbeddingModels;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Corpus {
    Code,
    Docs,
}

pub struct CurrentModel<'a> {
    pub name: &'a str,
    pub dimension: usize,
}

fn stored(models: &EmbeddingModels, corpus: Corpus) -> (&str, usize) {
    match corpus {
        Corpus::Code => (&models.code_model_name, models.code_model_dimension),
        Corpus::Docs => (&models.docs_model_name, models.docs_model_dimension),
    }
}

fn is_compatible(models: &EmbeddingModels, corpus: Corpus, current: &CurrentModel) -> bool {
    let (stored_name, stored_dim) = stored(models, corpus);
    stored_name == current.name && stored_dim == current.dimension
}

/// Call on every read-path entry. Returns an error that blocks the search.
pub fn check_blocking(models: &EmbeddingModels, corpus: Corpus, current: &CurrentModel) -> Result<()> {
    let (stored_name, stored_dim) = stored(models, corpus);
    if is_compatible(models, corpus, current) {
        Ok(())
    } else {
        Err(SearchError::model_mismatch(stored_name, stored_dim, current.name, current.dimension))
    }
}

/// Call on status/delete paths. Never blocks; returns `Some(warning)` on
/// mismatch.
pub fn check_non_blocking(models: &EmbeddingModels, corpus: Corpus, current: &CurrentModel) -> Option<String> {
    let (stored_name, stored_dim) = stored(models, corpus);
    if is_compatible(models, corpus, current) {
        None
    } else {
        Some(format!(
            "index was built with embedding model '{stored_name}' ({stored_dim} dims), current \
             configuration expects '{}' ({} dims)",
            current.name, current.dimension
        ))
    }
}
