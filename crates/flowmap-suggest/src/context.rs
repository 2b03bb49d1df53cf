use flowmap_core::Settings;

use crate::embed::Embedder;
use crate::index::VectorIndex;
use crate::ContextBuildError;

/// A window of bundle text. `offset` counts characters from the start of
/// the bundle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chunk {
    pub text: String,
    pub offset: usize,
}

/// The first `limit` characters of `text`, never splitting a character.
pub fn truncate_chars(text: &str, limit: usize) -> &str {
    match text.char_indices().nth(limit) {
        Some((end, _)) => &text[..end],
        None => text,
    }
}

/// Whole-codebase context: the bundle cut at `limit` characters.
pub fn plain_context(bundle_text: &str, limit: usize) -> String {
    let context = truncate_chars(bundle_text, limit);
    if context.len() < bundle_text.len() {
        log::info!(
            "context truncated to {limit} of {} characters",
            bundle_text.chars().count()
        );
    }
    context.to_string()
}

/// Split `text` into windows of `size` characters, each starting
/// `size - overlap` characters after the previous one. The last window
/// may be shorter.
pub fn split_chunks(text: &str, size: usize, overlap: usize) -> Vec<Chunk> {
    let size = size.max(1);
    let step = size.saturating_sub(overlap).max(1);

    let bounds: Vec<usize> = text
        .char_indices()
        .map(|(i, _)| i)
        .chain(std::iter::once(text.len()))
        .collect();
    let total = bounds.len() - 1;

    let mut chunks = Vec::new();
    let mut start = 0;
    while start < total {
        let end = (start + size).min(total);
        chunks.push(Chunk {
            text: text[bounds[start]..bounds[end]].to_string(),
            offset: start,
        });
        if end == total {
            break;
        }
        start += step;
    }
    chunks
}

/// Retrieval-augmented context: chunk the bundle, embed the chunks, and
/// keep the `top_k` chunks the index returns, in returned order.
///
/// With no `retrieval_query` configured the index falls back to insertion
/// order, so the selection is simply the first chunks of the bundle. An
/// empty or short result is not an error.
pub async fn retrieval_context(
    bundle_text: &str,
    embedder: &dyn Embedder,
    settings: &Settings,
) -> Result<String, ContextBuildError> {
    let chunks = split_chunks(bundle_text, settings.chunk_size, settings.chunk_overlap);
    if chunks.is_empty() {
        log::info!("nothing to retrieve from an empty bundle");
        return Ok(String::new());
    }

    let texts: Vec<String> = chunks.iter().map(|c| c.text.clone()).collect();
    let vectors = embedder.embed(&texts).await?;
    if vectors.len() != chunks.len() {
        return Err(ContextBuildError::CountMismatch {
            expected: chunks.len(),
            got: vectors.len(),
        });
    }

    let mut index = VectorIndex::default();
    for (chunk, vector) in chunks.into_iter().zip(vectors) {
        index.insert(chunk, vector)?;
    }

    let query = match settings
        .retrieval_query
        .as_deref()
        .filter(|q| !q.trim().is_empty())
    {
        Some(q) => {
            let mut vectors = embedder.embed(&[q.to_string()]).await?;
            if vectors.len() != 1 {
                return Err(ContextBuildError::CountMismatch {
                    expected: 1,
                    got: vectors.len(),
                });
            }
            vectors.pop()
        }
        None => None,
    };

    let hits = index.search(query.as_deref(), settings.top_k)?;
    log::info!("retrieved {} of {} chunks", hits.len(), index.len());

    let joined = hits
        .iter()
        .map(|c| c.text.as_str())
        .collect::<Vec<_>>()
        .join("\n\n");
    Ok(truncate_chars(&joined, settings.context_limit).to_string())
}
