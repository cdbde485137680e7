//! Rendering chunks into embedding input text

use crate::types::{Chunk, ChunkKind};
use std::fmt::Write;

/// Shape of the text sent to an embedding backend
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputTemplate {
    /// File, kind, signature, docs and owning type ahead of the code
    Descriptive,
    /// Code first, with docs as leading comments; suits code-trained encoders
    CodeFirst,
}

impl InputTemplate {
    /// Render `chunk`, capped at `max_chars` characters
    pub fn render(&self, chunk: &Chunk, max_chars: usize) -> String {
        let text = match self {
            InputTemplate::Descriptive => descriptive(chunk),
            InputTemplate::CodeFirst => code_first(chunk),
        };
        truncate_chars(text, max_chars)
    }
}

fn descriptive(chunk: &Chunk) -> String {
    let mut text = String::new();

    match chunk.kind {
        ChunkKind::Function | ChunkKind::Method => {
            let _ = writeln!(text, "File: {}", chunk.file_path);
            let _ = writeln!(text, "Type: {}", chunk.kind);
            if !chunk.signature.is_empty() {
                let _ = writeln!(text, "Signature: {}", chunk.signature);
            }
            if !chunk.doc_comment.is_empty() {
                let _ = writeln!(text, "Documentation: {}", chunk.doc_comment);
            }
            if !chunk.parent_name.is_empty() {
                let _ = writeln!(text, "Belongs to: {}", chunk.parent_name);
            }
            let _ = write!(text, "Code:\n{}", chunk.content);
        }
        ChunkKind::Struct | ChunkKind::Interface => {
            let _ = writeln!(text, "File: {}", chunk.file_path);
            let _ = writeln!(text, "Type: {}", chunk.kind);
            let _ = writeln!(text, "Name: {}", chunk.name);
            if !chunk.doc_comment.is_empty() {
                let _ = writeln!(text, "Documentation: {}", chunk.doc_comment);
            }
            let _ = write!(text, "Definition:\n{}", chunk.content);
        }
        _ => {
            let _ = write!(text, "File: {}\n{}", chunk.file_path, chunk.content);
        }
    }

    text
}

fn code_first(chunk: &Chunk) -> String {
    let mut text = String::new();
    for line in chunk.doc_comment.lines() {
        let _ = writeln!(text, "// {}", line);
    }
    text.push_str(&chunk.content);
    text
}

/// Truncate to at most `max_chars` characters on a char boundary
pub fn truncate_chars(mut text: String, max_chars: usize) -> String {
    if let Some((byte_idx, _)) = text.char_indices().nth(max_chars) {
        text.truncate(byte_idx);
    }
    text
}

#[cfg(test)]
mod tests {
    use super::*;

    fn method() -> Chunk {
        Chunk::new(
            ChunkKind::Method,
            "pkg/store.go",
            "go",
            "Get",
            "func (s *Store) Get() {}",
            10,
            10,
        )
        .with_signature("func (s *Store) Get()")
        .with_doc_comment("Get fetches.")
        .with_parent("Store")
    }

    #[test]
    fn test_descriptive_callable() {
        let text = InputTemplate::Descriptive.render(&method(), 8000);
        assert_eq!(
            text,
            "File: pkg/store.go\nType: method\nSignature: func (s *Store) Get()\n\
             Documentation: Get fetches.\nBelongs to: Store\nCode:\nfunc (s *Store) Get() {}"
        );
    }

    #[test]
    fn test_descriptive_type() {
        let chunk = Chunk::new(
            ChunkKind::Struct,
            "pkg/store.go",
            "go",
            "Store",
            "type Store struct{}",
            3,
            3,
        );
        let text = InputTemplate::Descriptive.render(&chunk, 8000);
        assert_eq!(
            text,
            "File: pkg/store.go\nType: struct\nName: Store\nDefinition:\ntype Store struct{}"
        );
    }

    #[test]
    fn test_descriptive_other_kinds() {
        let chunk = Chunk::new(ChunkKind::File, "a.txt", "text", "a.txt", "hello", 1, 1);
        assert_eq!(
            InputTemplate::Descriptive.render(&chunk, 8000),
            "File: a.txt\nhello"
        );
    }

    #[test]
    fn test_code_first() {
        let text = InputTemplate::CodeFirst.render(&method(), 8000);
        assert_eq!(text, "// Get fetches.\nfunc (s *Store) Get() {}");
    }

    #[test]
    fn test_render_is_capped() {
        let chunk = Chunk::new(
            ChunkKind::File,
            "big.txt",
            "text",
            "big.txt",
            "x".repeat(10_000),
            1,
            1,
        );
        assert_eq!(InputTemplate::Descriptive.render(&chunk, 8000).len(), 8000);
    }

    #[test]
    fn test_truncate_respects_char_boundaries() {
        let text = "héllo wörld".to_string();
        assert_eq!(truncate_chars(text.clone(), 2), "hé");
        assert_eq!(truncate_chars(text.clone(), 100), text);
        assert_eq!(truncate_chars(String::new(), 0), "");
    }
}
