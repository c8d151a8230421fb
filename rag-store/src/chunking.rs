//! Structure-aware chunker for documentation pages.
//!
//! The text is split into blocks (ATX headings, paragraphs, fenced code) and the
//! blocks are packed greedily into token-bounded chunks. A heading always starts
//! a new chunk. Blocks larger than the window are cut at a line boundary when one
//! exists in the second half of the window, otherwise at a hard token boundary.
//!
//! Every chunk after the first is prefixed with the trailing `overlap_tokens`
//! tokens of the previous chunk's body. Bodies concatenated in order reproduce
//! the raw text byte-for-byte.

use std::ops::Range;
use std::sync::LazyLock;

use regex::Regex;
use tracing::{debug, trace};

use crate::config::ChunkingConfig;
use crate::errors::RagError;
use crate::normalize::fingerprint;
use crate::record::{Chunk, ChunkId, ContentType, SourceDocument};
use crate::tokenize::token_spans;

static ATX_HEADING: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^ {0,3}(#{1,6})(?:[ \t]+(.*?))?(?:[ \t]+#+)?[ \t]*$").expect("valid heading regex")
});

/// Splits a document into overlapping, token-bounded chunks.
///
/// Empty or whitespace-only documents yield no chunks.
///
/// # Errors
/// [`RagError::Config`] if `cfg` is invalid (`max_tokens == 0` or
/// `overlap_tokens >= max_tokens`).
pub fn chunk_document(doc: &SourceDocument, cfg: &ChunkingConfig) -> Result<Vec<Chunk>, RagError> {
    chunk_text(&doc.id, &doc.raw_text, cfg)
}

/// Same as [`chunk_document`] for a bare text.
pub fn chunk_text(
    document_id: &str,
    text: &str,
    cfg: &ChunkingConfig,
) -> Result<Vec<Chunk>, RagError> {
    cfg.validate()?;

    let spans = token_spans(text);
    if spans.is_empty() {
        trace!("chunking::chunk_text doc={document_id} empty");
        return Ok(Vec::new());
    }

    let blocks = to_token_blocks(parse_blocks(text), &spans);
    let mut packer = Packer {
        text,
        spans: &spans,
        cfg: *cfg,
        document_id,
        chunks: Vec::new(),
        last_body: None,
        section: None,
        pending: None,
    };
    for block in blocks {
        packer.push_block(block);
    }
    packer.flush();

    debug!(
        "chunking::chunk_text doc={} tokens={} chunks={}",
        document_id,
        spans.len(),
        packer.chunks.len()
    );
    Ok(packer.chunks)
}

/* ------------------------------------------------------------------------- */
/* Block parsing                                                             */
/* ------------------------------------------------------------------------- */

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum BlockKind {
    Heading,
    Paragraph,
    Code,
    /// Fence opened but never closed; split with a plain token window.
    BrokenFence,
}

#[derive(Debug)]
struct RawBlock {
    start: usize,
    kind: BlockKind,
    heading: Option<(u8, String)>,
}

#[derive(Debug)]
struct Block {
    tokens: Range<usize>,
    kind: BlockKind,
    heading: Option<(u8, String)>,
}

fn parse_blocks(text: &str) -> Vec<RawBlock> {
    let mut lines = Vec::new();
    let mut pos = 0usize;
    for raw in text.split_inclusive('\n') {
        lines.push((pos, raw.trim_end_matches(['\n', '\r'])));
        pos += raw.len();
    }

    let mut blocks = Vec::new();
    let mut in_paragraph = false;
    let mut i = 0usize;
    while i < lines.len() {
        let (start, line) = lines[i];

        if let Some(marker) = fence_marker(line) {
            in_paragraph = false;
            match (i + 1..lines.len()).find(|&j| closes_fence(lines[j].1, marker)) {
                Some(j) => {
                    blocks.push(RawBlock {
                        start,
                        kind: BlockKind::Code,
                        heading: None,
                    });
                    i = j + 1;
                }
                None => {
                    trace!("chunking::parse_blocks unclosed fence at byte {start}");
                    blocks.push(RawBlock {
                        start,
                        kind: BlockKind::BrokenFence,
                        heading: None,
                    });
                    i = (i + 1..lines.len())
                        .find(|&j| parse_heading(lines[j].1).is_some())
                        .unwrap_or(lines.len());
                }
            }
            continue;
        }

        if let Some(heading) = parse_heading(line) {
            blocks.push(RawBlock {
                start,
                kind: BlockKind::Heading,
                heading: Some(heading),
            });
            in_paragraph = false;
        } else if line.trim().is_empty() {
            in_paragraph = false;
        } else if !in_paragraph {
            blocks.push(RawBlock {
                start,
                kind: BlockKind::Paragraph,
                heading: None,
            });
            in_paragraph = true;
        }
        i += 1;
    }
    blocks
}

/// Maps byte-addressed blocks onto token ranges that partition `0..spans.len()`.
///
/// A block boundary sits at a line start; the token straddling it (if any)
/// only carries whitespace past the boundary and stays with the earlier block.
fn to_token_blocks(raw: Vec<RawBlock>, spans: &[Range<usize>]) -> Vec<Block> {
    let n = spans.len();
    if raw.is_empty() {
        return vec![Block {
            tokens: 0..n,
            kind: BlockKind::Paragraph,
            heading: None,
        }];
    }

    let mut starts: Vec<usize> = raw
        .iter()
        .map(|b| spans.partition_point(|s| s.start < b.start))
        .collect();
    starts[0] = 0;

    let mut out = Vec::with_capacity(raw.len());
    for (k, b) in raw.into_iter().enumerate() {
        let end = starts.get(k + 1).copied().unwrap_or(n);
        if starts[k] < end {
            out.push(Block {
                tokens: starts[k]..end,
                kind: b.kind,
                heading: b.heading,
            });
        }
    }
    out
}

fn parse_heading(line: &str) -> Option<(u8, String)> {
    let caps = ATX_HEADING.captures(line)?;
    let level = caps.get(1)?.as_str().len() as u8;
    let title = caps
        .get(2)
        .map(|m| m.as_str().trim().to_string())
        .unwrap_or_default();
    Some((level, title))
}

fn fence_marker(line: &str) -> Option<(char, usize)> {
    let t = line.trim_start_matches(' ');
    if line.len() - t.len() > 3 {
        return None;
    }
    let c = t.chars().next()?;
    if c != '`' && c != '~' {
        return None;
    }
    let n = t.chars().take_while(|&x| x == c).count();
    (n >= 3).then_some((c, n))
}

fn closes_fence(line: &str, (c, n): (char, usize)) -> bool {
    match fence_marker(line) {
        Some((c2, n2)) if c2 == c && n2 >= n => {
            let t = line.trim_start_matches(' ');
            t[n2 * c.len_utf8()..].trim().is_empty()
        }
        _ => false,
    }
}

/* ------------------------------------------------------------------------- */
/* Packing                                                                   */
/* ------------------------------------------------------------------------- */

#[derive(Debug)]
struct Pending {
    start: usize,
    end: usize,
    overlap: usize,
    code_tokens: usize,
    continuation: bool,
    heading_only: bool,
    section: Option<(u8, String)>,
}

impl Pending {
    fn len(&self) -> usize {
        self.end - self.start
    }
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Cut {
    LineAware,
    Hard,
}

struct Packer<'a> {
    text: &'a str,
    spans: &'a [Range<usize>],
    cfg: ChunkingConfig,
    document_id: &'a str,
    chunks: Vec<Chunk>,
    last_body: Option<Range<usize>>,
    section: Option<(u8, String)>,
    pending: Option<Pending>,
}

impl Packer<'_> {
    fn next_overlap(&self) -> usize {
        self.last_body
            .as_ref()
            .map_or(0, |b| self.cfg.overlap_tokens.min(b.len()))
    }

    fn push_block(&mut self, block: Block) {
        let code = matches!(block.kind, BlockKind::Code | BlockKind::BrokenFence);

        if block.kind == BlockKind::Heading {
            self.flush();
            self.section = block.heading.clone();
        }

        if block.kind == BlockKind::BrokenFence {
            self.flush();
            self.split(block.tokens.clone(), block.tokens.start, code, Cut::Hard, true);
            return;
        }

        let n = block.tokens.len();
        let max = self.cfg.max_tokens;
        if let Some(p) = self
            .pending
            .as_mut()
            .filter(|p| p.overlap + p.len() + n <= max)
        {
            p.end = block.tokens.end;
            p.heading_only = false;
            if code {
                p.code_tokens += n;
            }
            return;
        }

        // An oversize block continues a pending bare heading instead of
        // leaving the heading alone in its own chunk.
        let carried = if n > max - self.next_overlap() {
            self.pending.take_if(|p| p.heading_only)
        } else {
            None
        };
        self.flush();

        if let Some(h) = carried {
            self.split(h.start..block.tokens.end, block.tokens.start, code, Cut::LineAware, false);
            return;
        }

        let overlap = self.next_overlap();
        if overlap + n <= max {
            self.pending = Some(Pending {
                start: block.tokens.start,
                end: block.tokens.end,
                overlap,
                code_tokens: if code { n } else { 0 },
                continuation: false,
                heading_only: block.kind == BlockKind::Heading,
                section: self.section.clone(),
            });
        } else {
            self.split(block.tokens.clone(), block.tokens.start, code, Cut::LineAware, false);
        }
    }

    /// Cuts `range` into windows. Tokens at or after `code_from` count as code
    /// when `code` is set. The last window stays pending unless `emit_last`.
    fn split(&mut self, range: Range<usize>, code_from: usize, code: bool, cut: Cut, emit_last: bool) {
        let mut pos = range.start;
        let mut first = true;
        while pos < range.end {
            let overlap = self.next_overlap();
            let budget = self.cfg.max_tokens - overlap;
            let remaining = range.end - pos;
            let take = if remaining <= budget {
                remaining
            } else if cut == Cut::LineAware {
                self.line_cut(pos, budget)
            } else {
                budget
            };

            let end = pos + take;
            let code_tokens = if code {
                end.saturating_sub(pos.max(code_from))
            } else {
                0
            };
            let piece = Pending {
                start: pos,
                end,
                overlap,
                code_tokens,
                continuation: !first,
                heading_only: false,
                section: self.section.clone(),
            };
            pos = end;
            first = false;

            if pos == range.end && !emit_last {
                self.pending = Some(piece);
            } else {
                self.emit(piece);
            }
        }
    }

    /// Largest cut in the second half of the window that starts a new line,
    /// or the full window when there is none.
    fn line_cut(&self, pos: usize, budget: usize) -> usize {
        (budget / 2 + 1..=budget)
            .rev()
            .find(|&t| self.starts_line(pos + t))
            .unwrap_or(budget)
    }

    fn starts_line(&self, token: usize) -> bool {
        token > 0 && self.text[self.spans[token - 1].clone()].contains('\n')
    }

    fn flush(&mut self) {
        if let Some(p) = self.pending.take() {
            self.emit(p);
        }
    }

    fn emit(&mut self, p: Pending) {
        let body = &self.text[self.spans[p.start].start..self.spans[p.end - 1].end];
        let overlap_text = match &self.last_body {
            Some(prev) if p.overlap > 0 => {
                let from = prev.end - p.overlap;
                &self.text[self.spans[from].start..self.spans[prev.end - 1].end]
            }
            _ => "",
        };

        let mut text = String::with_capacity(overlap_text.len() + body.len());
        text.push_str(overlap_text);
        text.push_str(body);

        let body_tokens = p.len();
        let content_type = match p.code_tokens {
            0 => ContentType::Text,
            c if c >= body_tokens => ContentType::Code,
            _ => ContentType::Mixed,
        };

        let chunk = Chunk {
            id: ChunkId::new(self.document_id, self.chunks.len() as u32),
            overlap_bytes: overlap_text.len(),
            token_count: p.overlap + body_tokens,
            section_title: p.section.as_ref().map(|s| s.1.clone()),
            section_level: p.section.as_ref().map(|s| s.0),
            has_code: p.code_tokens > 0,
            is_continuation: p.continuation,
            content_type,
            fingerprint: fingerprint(body),
            text,
        };
        trace!(
            "chunking::emit id={} tokens={} overlap={}",
            chunk.id, chunk.token_count, p.overlap
        );
        self.last_body = Some(p.start..p.end);
        self.chunks.push(chunk);
    }
}
