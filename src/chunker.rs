//! Document chunking.
//!
//! Splits document text recursively along a separator ladder (paragraph >
//! line > sentence > word > character) so each chunk stays at or below the
//! configured size while cutting at the coarsest boundary available.
//! Adjacent chunks of one document share an overlapping tail for
//! cross-boundary context, and every chunk is wrapped in a fixed template
//! that reintroduces the parent document's title.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::error::{Result, RetrievalError};

/// Source document. Immutable once ingested.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Document {
    pub id: String,
    #[serde(default)]
    pub text: String,
    #[serde(default)]
    pub meta: DocumentMeta,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DocumentMeta {
    #[serde(default)]
    pub title: String,
    /// Any additional metadata fields are carried through untouched.
    #[serde(flatten)]
    pub extra: serde_json::Map<String, Value>,
}

/// The atomic unit of retrieval. `chunk_text` is the templated excerpt,
/// created once at chunk time and never mutated.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Chunk {
    pub chunk_id: Uuid,
    pub document_id: String,
    pub chunk_text: String,
}

pub const DEFAULT_CHUNK_SIZE: usize = 256;
pub const DEFAULT_CHUNK_OVERLAP: usize = 20;

/// Coarse-to-fine boundary preference. A final character-window pass
/// handles text with no separators at all.
const SEPARATORS: &[&str] = &["\n\n", "\n", ". ", " "];

/// Wrap a raw span in the excerpt template used for embedding and
/// reranking, restoring the parent document's title as context.
pub fn wrap_span(title: &str, span: &str) -> String {
    format!("The following is an excerpt of a document titled: {title}\n{span}")
}

/// Split every document into templated chunks with fresh UUID ids.
///
/// Pure function over its inputs. Fails with `InvalidInput` if any
/// document lacks text or title metadata, before anything is chunked.
pub fn chunk_documents(
    documents: &[Document],
    chunk_size: usize,
    overlap: usize,
) -> Result<Vec<Chunk>> {
    if chunk_size == 0 {
        return Err(RetrievalError::InvalidParameter {
            name: "chunk_size",
            reason: "must be greater than zero".into(),
        });
    }
    if overlap >= chunk_size {
        return Err(RetrievalError::InvalidParameter {
            name: "overlap",
            reason: format!("must be smaller than chunk_size ({chunk_size})"),
        });
    }
    for document in documents {
        if document.text.trim().is_empty() {
            return Err(RetrievalError::InvalidInput(format!(
                "document {} has no text",
                document.id
            )));
        }
        if document.meta.title.trim().is_empty() {
            return Err(RetrievalError::InvalidInput(format!(
                "document {} has no title metadata",
                document.id
            )));
        }
    }

    let mut chunks = Vec::new();
    for document in documents {
        let spans = split_spans(&document.text, chunk_size);
        let spans = apply_overlap(spans, overlap);
        for span in spans {
            chunks.push(Chunk {
                chunk_id: Uuid::new_v4(),
                document_id: document.id.clone(),
                chunk_text: wrap_span(&document.meta.title, &span),
            });
        }
    }
    Ok(chunks)
}

/// Split `text` into raw spans of at most `chunk_size` bytes (soft bound),
/// preferring coarse boundaries. Concatenating the returned spans
/// reconstructs `text` exactly.
pub fn split_spans(text: &str, chunk_size: usize) -> Vec<String> {
    split_recursive(text, SEPARATORS, chunk_size)
}

fn split_recursive(text: &str, separators: &[&str], chunk_size: usize) -> Vec<String> {
    if text.len() <= chunk_size {
        return if text.is_empty() { Vec::new() } else { vec![text.to_string()] };
    }

    let Some((sep, finer)) = separators
        .iter()
        .enumerate()
        .find(|(_, sep)| text.contains(**sep))
        .map(|(i, sep)| (*sep, &separators[i + 1..]))
    else {
        return char_windows(text, chunk_size);
    };

    // Greedy merge of separator-delimited pieces; a piece that alone
    // exceeds the budget is re-split at the next finer granularity.
    let mut spans: Vec<String> = Vec::new();
    let mut current = String::new();
    for piece in text.split_inclusive(sep) {
        if piece.len() > chunk_size {
            if !current.is_empty() {
                spans.push(std::mem::take(&mut current));
            }
            spans.extend(split_recursive(piece, finer, chunk_size));
        } else if current.len() + piece.len() > chunk_size {
            spans.push(std::mem::replace(&mut current, piece.to_string()));
        } else {
            current.push_str(piece);
        }
    }
    if !current.is_empty() {
        spans.push(current);
    }
    spans
}

/// Last-resort split into fixed-size windows, snapped to char boundaries.
fn char_windows(text: &str, chunk_size: usize) -> Vec<String> {
    let mut out = Vec::new();
    let mut start = 0;
    while start < text.len() {
        let mut end = (start + chunk_size).min(text.len());
        while end < text.len() && !text.is_char_boundary(end) {
            end -= 1;
        }
        if end <= start {
            // A single char wider than the budget still has to go somewhere.
            end = start + text[start..].chars().next().map(char::len_utf8).unwrap_or(1);
        }
        out.push(text[start..end].to_string());
        start = end;
    }
    out
}

/// Prepend at least `overlap` bytes of the previous span's tail to each
/// span after the first, extending backwards to a word boundary so the
/// overlap never starts mid-word.
fn apply_overlap(spans: Vec<String>, overlap: usize) -> Vec<String> {
    if overlap == 0 || spans.len() < 2 {
        return spans;
    }
    let mut out = Vec::with_capacity(spans.len());
    for (i, span) in spans.iter().enumerate() {
        if i == 0 {
            out.push(span.clone());
            continue;
        }
        let prev = &spans[i - 1];
        let tail = overlap_tail(prev, overlap);
        out.push(format!("{tail}{span}"));
    }
    out
}

/// The tail of `span` that is at least `overlap` bytes long, aligned to a
/// char boundary and grown backwards to the nearest whitespace.
fn overlap_tail(span: &str, overlap: usize) -> &str {
    if span.len() <= overlap {
        return span;
    }
    let mut start = span.len() - overlap;
    while start > 0 && !span.is_char_boundary(start) {
        start -= 1;
    }
    let bytes = span.as_bytes();
    let limit = start.saturating_sub(32);
    let mut ws = start;
    while ws > limit {
        if bytes[ws - 1] == b' ' || bytes[ws - 1] == b'\n' {
            return &span[ws..];
        }
        ws -= 1;
    }
    &span[start..]
}

#[cfg(test)]
mod tests {
    use super::*;

    fn doc(id: &str, title: &str, text: &str) -> Document {
        Document {
            id: id.to_string(),
            text: text.to_string(),
            meta: DocumentMeta {
                title: title.to_string(),
                extra: Default::default(),
            },
        }
    }

    #[test]
    fn test_spans_reconstruct_text() {
        let text = "First paragraph about heating.\n\nSecond paragraph about insulation. \
                    It has two sentences.\n\nA third paragraph that rambles on for a while \
                    about window seals and draft proofing and attic fans.";
        let spans = split_spans(text, 60);
        assert!(spans.len() > 1);
        assert_eq!(spans.concat(), text);
    }

    #[test]
    fn test_spans_respect_size_bound() {
        let text = "one two three four five six seven eight nine ten. ".repeat(20);
        for span in split_spans(&text, 80) {
            assert!(
                span.len() <= 80,
                "span of {} bytes exceeds budget: {:?}",
                span.len(),
                span
            );
        }
    }

    #[test]
    fn test_overlapped_spans_respect_soft_bound() {
        let text = "one two three four five six seven eight nine ten. ".repeat(20);
        let spans = split_spans(&text, 100);
        let overlapped = apply_overlap(spans, 20);
        // The overlap tail sits on top of the span budget, extended by at
        // most 32 bytes to reach a word boundary.
        for span in &overlapped {
            assert!(
                span.len() <= 100 + 20 + 32,
                "span of {} bytes exceeds the overlap-widened bound",
                span.len()
            );
        }
    }

    #[test]
    fn test_short_document_yields_single_chunk() {
        let chunks = chunk_documents(&[doc("d1", "Tips", "Turn off the lights.")], 256, 20).unwrap();
        assert_eq!(chunks.len(), 1);
        assert!(chunks[0].chunk_text.contains("Tips"));
        assert!(chunks[0].chunk_text.contains("Turn off the lights."));
    }

    #[test]
    fn test_consecutive_chunks_share_overlap() {
        let text = "alpha beta gamma delta epsilon zeta. ".repeat(30);
        let spans = split_spans(&text, 100);
        let overlapped = apply_overlap(spans.clone(), 20);
        for i in 1..overlapped.len() {
            let tail = overlap_tail(&spans[i - 1], 20);
            assert!(tail.len() >= 20);
            assert!(overlapped[i].starts_with(tail));
        }
    }

    #[test]
    fn test_no_separator_text_falls_back_to_windows() {
        let text = "x".repeat(1000);
        let spans = split_spans(&text, 100);
        assert_eq!(spans.len(), 10);
        assert!(spans.iter().all(|s| s.len() == 100));
        assert_eq!(spans.concat(), text);
    }

    #[test]
    fn test_missing_title_rejected() {
        let err = chunk_documents(&[doc("d1", "  ", "some text")], 256, 20).unwrap_err();
        assert!(matches!(err, RetrievalError::InvalidInput(_)));
    }

    #[test]
    fn test_missing_text_rejected() {
        let err = chunk_documents(&[doc("d1", "Title", "")], 256, 20).unwrap_err();
        assert!(matches!(err, RetrievalError::InvalidInput(_)));
    }

    #[test]
    fn test_overlap_must_be_smaller_than_chunk_size() {
        let err = chunk_documents(&[doc("d1", "Title", "text")], 64, 64).unwrap_err();
        assert!(matches!(err, RetrievalError::InvalidParameter { name: "overlap", .. }));
    }

    #[test]
    fn test_chunk_ids_are_unique() {
        let text = "sentence one. sentence two. sentence three. ".repeat(20);
        let chunks = chunk_documents(&[doc("a", "T", &text), doc("b", "T", &text)], 120, 10).unwrap();
        let mut ids: Vec<Uuid> = chunks.iter().map(|c| c.chunk_id).collect();
        ids.sort();
        ids.dedup();
        assert_eq!(ids.len(), chunks.len());
    }

    #[test]
    fn test_template_restores_title() {
        let wrapped = wrap_span("Energy Saving", "close the blinds");
        assert_eq!(
            wrapped,
            "The following is an excerpt of a document titled: Energy Saving\nclose the blinds"
        );
    }

    #[test]
    fn test_multibyte_text_does_not_panic() {
        let text = "énergie économisée ça marche très bien — ".repeat(30);
        let spans = split_spans(&text, 50);
        assert_eq!(spans.concat(), text);
        let chunks = chunk_documents(&[doc("d", "Éco", &text)], 50, 10).unwrap();
        assert!(!chunks.is_empty());
    }
}
