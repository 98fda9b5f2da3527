use crate::error::IngestError;
use crate::models::{DocumentFingerprint, PageText, PdfChunk, Settings};
use sha2::{Digest, Sha256};

/// Boundary tiers tried from most to least preferred.
const BOUNDARY_TIERS: [&[&str]; 4] = [&["\n\n"], &["\n"], &[". ", "? ", "! "], &[" "]];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkingConfig {
    pub max_chars: usize,
    pub overlap_chars: usize,
}

impl ChunkingConfig {
    pub fn new(max_chars: usize, overlap_chars: usize) -> Result<Self, IngestError> {
        if max_chars == 0 {
            return Err(IngestError::InvalidChunkConfig(
                "max_chars must be greater than zero".to_string(),
            ));
        }
        if overlap_chars >= max_chars {
            return Err(IngestError::InvalidChunkConfig(format!(
                "overlap {overlap_chars} must be smaller than max_chars {max_chars}"
            )));
        }
        Ok(Self {
            max_chars,
            overlap_chars,
        })
    }
}

impl TryFrom<&Settings> for ChunkingConfig {
    type Error = IngestError;

    fn try_from(settings: &Settings) -> Result<Self, Self::Error> {
        Self::new(settings.chunk_size, settings.chunk_overlap)
    }
}

/// Cleans extracted page text while keeping line structure intact.
pub fn normalize_page_text(text: &str) -> String {
    text.replace("\r\n", "\n")
        .replace('\r', "\n")
        .replace('\u{a0}', " ")
        .lines()
        .map(|line| {
            line.split([' ', '\t'])
                .filter(|word| !word.is_empty())
                .collect::<Vec<_>>()
                .join(" ")
        })
        .collect::<Vec<_>>()
        .join("\n")
        .trim()
        .to_string()
}

/// Splits `text` into windows of at most `max_chars` characters where each
/// window starts exactly `overlap_chars` before the end of the previous one.
pub fn split_text(text: &str, config: ChunkingConfig) -> Vec<String> {
    let chars: Vec<char> = text.chars().collect();
    let mut chunks = Vec::new();

    if chars.is_empty() {
        return chunks;
    }

    let mut start = 0usize;
    loop {
        if chars.len() - start <= config.max_chars {
            chunks.push(chars[start..].iter().collect());
            break;
        }

        let limit = start + config.max_chars;
        let floor = (start + config.overlap_chars + 1).max(start + config.max_chars / 2);
        let end = find_boundary(&chars, floor, limit).unwrap_or(limit);

        chunks.push(chars[start..end].iter().collect());
        start = end - config.overlap_chars;
    }

    chunks
}

/// Latest cut position in `floor..=limit` that falls right after a separator,
/// searching one tier at a time.
fn find_boundary(chars: &[char], floor: usize, limit: usize) -> Option<usize> {
    for tier in BOUNDARY_TIERS {
        for end in (floor..=limit).rev() {
            if tier.iter().any(|separator| ends_with(chars, end, separator)) {
                return Some(end);
            }
        }
    }
    None
}

fn ends_with(chars: &[char], end: usize, separator: &str) -> bool {
    let width = separator.chars().count();
    if end < width {
        return false;
    }
    chars[end - width..end].iter().copied().eq(separator.chars())
}

pub fn build_chunks(
    document: &DocumentFingerprint,
    pages: &[PageText],
    config: ChunkingConfig,
) -> Vec<PdfChunk> {
    let mut chunks = Vec::new();
    let mut cursor = 0u64;

    for page in pages {
        for raw_chunk in split_text(&page.text, config) {
            if raw_chunk.trim().is_empty() {
                continue;
            }

            chunks.push(PdfChunk {
                chunk_id: make_chunk_id(&document.document_id, page.number, cursor, &raw_chunk),
                document_id: document.document_id.clone(),
                page: page.number,
                chunk_index: cursor,
                text: raw_chunk,
            });

            cursor = cursor.saturating_add(1);
        }
    }

    chunks
}

fn make_chunk_id(document_id: &str, page: u32, index: u64, text: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(document_id.as_bytes());
    hasher.update(page.to_le_bytes());
    hasher.update(index.to_le_bytes());
    hasher.update(text.as_bytes());
    format!("{:x}", hasher.finalize())
}
