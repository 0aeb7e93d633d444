//! Overlapping text chunker.
//!
//! Splits document content into [`Chunk`]s with a fixed target size and a
//! fixed overlap between consecutive chunks of the same document. Cuts
//! prefer paragraph boundaries, then sentence endings, then single
//! newlines, then word boundaries, before falling back to a hard cut.
//!
//! Each chunk receives a deterministic id: a SHA-256 hex digest over the
//! parent document's identity, the chunk ordinal, and the chunk content.
//! Re-ingesting unchanged data therefore upserts the same vector ids.

use sha2::{Digest, Sha256};

use crate::config::ChunkingConfig;
use crate::models::{Chunk, DocMetadata, Document};

/// Split every document into chunks, copying metadata verbatim.
pub fn split_documents(documents: &[Document], config: &ChunkingConfig) -> Vec<Chunk> {
    let mut chunks = Vec::new();
    for doc in documents {
        for (ordinal, piece) in split_text(&doc.content, config.chunk_size, config.overlap)
            .into_iter()
            .enumerate()
        {
            chunks.push(make_chunk(&doc.metadata, ordinal, piece));
        }
    }
    chunks
}

/// Split `text` into overlapping pieces of at most `chunk_size` characters.
///
/// A text at or under the limit comes back as a single piece equal to
/// itself. Sizes are counted in characters, and every cut lands on a UTF-8
/// character boundary.
pub fn split_text(text: &str, chunk_size: usize, overlap: usize) -> Vec<&str> {
    split_offsets(text, chunk_size, overlap)
        .into_iter()
        .map(|(start, end)| &text[start..end])
        .collect()
}

/// Byte ranges of the chunks produced by [`split_text`].
///
/// Consecutive ranges overlap by up to `overlap` characters; the first
/// range starts at 0, the last ends at `text.len()`, and concatenating the
/// non-overlapping tails reconstructs the input exactly.
pub fn split_offsets(text: &str, chunk_size: usize, overlap: usize) -> Vec<(usize, usize)> {
    // Byte offset of every char, plus the end sentinel, so window math can
    // run in characters while slices stay on valid boundaries.
    let mut offsets: Vec<usize> = text.char_indices().map(|(i, _)| i).collect();
    offsets.push(text.len());
    let total_chars = offsets.len() - 1;

    if total_chars <= chunk_size {
        return vec![(0, text.len())];
    }

    let mut ranges = Vec::new();
    let mut start = 0usize;

    while start < total_chars {
        let hard_end = (start + chunk_size).min(total_chars);
        let end = if hard_end < total_chars {
            find_break_point(text, &offsets, start, hard_end)
        } else {
            hard_end
        };

        ranges.push((offsets[start], offsets[end]));

        if end >= total_chars {
            break;
        }

        let mut next = end.saturating_sub(overlap);
        // The overlap must never stall the window.
        if next <= start {
            next = end;
        }
        start = next;
    }

    ranges
}

/// Pick the best cut position in `(start, hard_end]`, in char indices.
///
/// Preference order: paragraph break, sentence ending, single newline,
/// word boundary. A candidate is only taken when it keeps the chunk at
/// least half the window, otherwise the hard cut wins.
fn find_break_point(text: &str, offsets: &[usize], start: usize, hard_end: usize) -> usize {
    let window = &text[offsets[start]..offsets[hard_end]];
    let min_bytes = window.len() / 2;

    if let Some(pos) = window.rfind("\n\n") {
        let cut = pos + 2;
        if cut > min_bytes {
            return byte_to_char(offsets, offsets[start] + cut);
        }
    }

    for pattern in [". ", "! ", "? ", ".\n", "!\n", "?\n"] {
        if let Some(pos) = window.rfind(pattern) {
            let cut = pos + pattern.len();
            if cut > min_bytes {
                return byte_to_char(offsets, offsets[start] + cut);
            }
        }
    }

    if let Some(pos) = window.rfind('\n') {
        let cut = pos + 1;
        if cut > min_bytes {
            return byte_to_char(offsets, offsets[start] + cut);
        }
    }

    if let Some(pos) = window.rfind(' ') {
        let cut = pos + 1;
        if cut > min_bytes {
            return byte_to_char(offsets, offsets[start] + cut);
        }
    }

    hard_end
}

fn byte_to_char(offsets: &[usize], byte_pos: usize) -> usize {
    // Break patterns are ASCII, so the cut always sits on a char boundary.
    match offsets.binary_search(&byte_pos) {
        Ok(idx) => idx,
        Err(idx) => idx,
    }
}

fn make_chunk(metadata: &DocMetadata, ordinal: usize, content: &str) -> Chunk {
    let mut hasher = Sha256::new();
    hasher.update(metadata.doc_type.as_bytes());
    hasher.update(b"|");
    hasher.update(metadata.source.as_bytes());
    hasher.update(b"|");
    if let Some(row) = metadata.row_index {
        hasher.update(row.to_string().as_bytes());
    }
    hasher.update(b"|");
    hasher.update(ordinal.to_string().as_bytes());
    hasher.update(b"|");
    hasher.update(content.as_bytes());

    Chunk {
        id: format!("{:x}", hasher.finalize()),
        content: content.to_string(),
        metadata: metadata.clone(),
    }
}
