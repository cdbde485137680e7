use super::ast_parser::AstParser;
use super::file_info::FileInfo;
use super::language::has_structured_parser;
use crate::config::ChunkingConfig;
use crate::types::{Chunk, ChunkKind};

/// Assumed line length when a file's average cannot be computed
const FALLBACK_LINE_LENGTH: usize = 50;
const MIN_WINDOW_LINES: usize = 10;
const MIN_OVERLAP_LINES: usize = 2;

/// Turns file contents into chunks
///
/// Languages with a structured parser are split along declarations; every
/// other file is either kept whole or cut into overlapping line windows.
#[derive(Debug, Clone)]
pub struct CodeChunker {
    chunk_size: usize,
    chunk_overlap: usize,
}

impl CodeChunker {
    /// `chunk_size` and `chunk_overlap` are character budgets
    pub fn new(chunk_size: usize, chunk_overlap: usize) -> Self {
        Self {
            chunk_size,
            chunk_overlap,
        }
    }

    pub fn from_config(config: &ChunkingConfig) -> Self {
        Self::new(config.chunk_size, config.chunk_overlap)
    }

    /// Chunk a scanned file given its contents
    pub fn chunk_file(&self, file: &FileInfo, content: &str) -> Vec<Chunk> {
        if has_structured_parser(file.language) {
            self.chunk_structured(&file.relative_path, file.language, content)
        } else {
            self.chunk_text(&file.relative_path, file.language, content)
        }
    }

    /// Structured chunking with a silent whole-file fallback
    pub fn chunk_structured(&self, file_path: &str, language: &str, content: &str) -> Vec<Chunk> {
        let parsed = match AstParser::new() {
            Ok(mut parser) => parser.parse(content, file_path),
            Err(e) => {
                tracing::warn!("Structured parser unavailable for {}: {}", file_path, e);
                None
            }
        };

        match parsed {
            Some(chunks) if !chunks.is_empty() => chunks,
            _ => vec![whole_file_chunk(file_path, language, content)],
        }
    }

    /// Whole-file chunk for small inputs, sliding line windows otherwise
    pub fn chunk_text(&self, file_path: &str, language: &str, content: &str) -> Vec<Chunk> {
        if content.len() <= self.chunk_size {
            return vec![whole_file_chunk(file_path, language, content)];
        }
        self.chunk_sliding_window(file_path, language, content)
    }

    /// Window and overlap sizes in lines for a text of this shape
    pub(crate) fn window_lines(&self, text_len: usize, line_count: usize) -> (usize, usize) {
        let mut avg_line_len = if line_count == 0 { 0 } else { text_len / line_count };
        if avg_line_len == 0 {
            avg_line_len = FALLBACK_LINE_LENGTH;
        }

        let lines_per_chunk = (self.chunk_size / avg_line_len).max(MIN_WINDOW_LINES);
        let overlap_lines = (self.chunk_overlap / avg_line_len).max(MIN_OVERLAP_LINES);
        (lines_per_chunk, overlap_lines)
    }

    fn chunk_sliding_window(&self, file_path: &str, language: &str, content: &str) -> Vec<Chunk> {
        let lines: Vec<&str> = content.split('\n').collect();
        let (size, overlap) = self.window_lines(content.len(), lines.len());
        let step = size.saturating_sub(overlap).max(1);

        let mut chunks = Vec::new();
        let mut start_idx = 0;

        while start_idx < lines.len() {
            let end_idx = (start_idx + size).min(lines.len());
            let text = lines[start_idx..end_idx].join("\n");

            // Skip empty windows
            if text.trim().is_empty() {
                start_idx += step;
                continue;
            }

            chunks.push(Chunk::new(
                ChunkKind::Generic,
                file_path,
                language,
                file_path,
                text,
                start_idx + 1,
                end_idx,
            ));

            if end_idx >= lines.len() {
                break;
            }

            start_idx += step;
        }

        chunks
    }
}

impl Default for CodeChunker {
    fn default() -> Self {
        Self::from_config(&ChunkingConfig::default())
    }
}

/// Single chunk covering the whole file
pub fn whole_file_chunk(file_path: &str, language: &str, content: &str) -> Chunk {
    let end_line = content.matches('\n').count() + 1;
    Chunk::new(
        ChunkKind::File,
        file_path,
        language,
        file_path,
        content,
        1,
        end_line,
    )
}
