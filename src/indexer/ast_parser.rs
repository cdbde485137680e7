use crate::types::{Chunk, ChunkKind};
use anyhow::{Context, Result};
use tree_sitter::{Node, Parser};

const GO_LANGUAGE: &str = "go";

/// Structured chunker for Go sources backed by tree-sitter
///
/// Emits one chunk per package clause, import block, top-level function or
/// method, type spec and const/var declaration.
pub struct AstParser {
    parser: Parser,
}

impl AstParser {
    pub fn new() -> Result<Self> {
        let mut parser = Parser::new();
        parser
            .set_language(&tree_sitter_go::LANGUAGE.into())
            .context("Failed to set parser language")?;
        Ok(Self { parser })
    }

    /// Parse `source` into chunks
    ///
    /// Returns `None` when the file does not parse cleanly so the caller can
    /// fall back to whole-file chunking.
    pub fn parse(&mut self, source: &str, file_path: &str) -> Option<Vec<Chunk>> {
        let tree = self.parser.parse(source, None)?;
        let root = tree.root_node();
        if root.has_error() {
            tracing::debug!("Syntax errors in {}, using whole-file chunk", file_path);
            return None;
        }

        let mut extractor = Extractor {
            source,
            lines: source.split('\n').collect(),
            file_path,
            chunks: Vec::new(),
        };

        let mut cursor = root.walk();
        let children: Vec<Node> = root.named_children(&mut cursor).collect();

        let mut import_decls = Vec::new();
        let mut import_slot = None;

        for (idx, node) in children.iter().enumerate() {
            let doc = doc_comment(&children[..idx], *node, source);
            match node.kind() {
                "package_clause" => extractor.package(*node, doc),
                "import_declaration" => {
                    import_slot.get_or_insert(extractor.chunks.len());
                    import_decls.push(*node);
                }
                "function_declaration" => extractor.function(*node, doc),
                "method_declaration" => extractor.method(*node, doc),
                "type_declaration" => extractor.type_declaration(*node, doc),
                "const_declaration" => extractor.value_declaration(*node, doc, ChunkKind::Constant),
                "var_declaration" => extractor.value_declaration(*node, doc, ChunkKind::Variable),
                _ => {}
            }
        }

        if let Some(chunk) = extractor.import_block(&import_decls) {
            let slot = import_slot.unwrap_or(0).min(extractor.chunks.len());
            extractor.chunks.insert(slot, chunk);
        }

        Some(extractor.chunks)
    }
}

struct Extractor<'a> {
    source: &'a str,
    lines: Vec<&'a str>,
    file_path: &'a str,
    chunks: Vec<Chunk>,
}

impl<'a> Extractor<'a> {
    fn text(&self, node: Node) -> &'a str {
        &self.source[node.byte_range()]
    }

    /// Whole source lines `start..=end` (1-indexed)
    fn line_span(&self, start: usize, end: usize) -> String {
        let end = end.min(self.lines.len());
        if start == 0 || start > end {
            return String::new();
        }
        self.lines[start - 1..end].join("\n")
    }

    fn chunk(&self, kind: ChunkKind, name: &str, node: Node) -> Chunk {
        let (start, end) = line_range(node);
        Chunk::new(
            kind,
            self.file_path,
            GO_LANGUAGE,
            name,
            self.line_span(start, end),
            start,
            end,
        )
    }

    fn package(&mut self, node: Node, doc: String) {
        let Some(ident) = node.named_child(0) else {
            return;
        };
        let name = self.text(ident);
        let (start, end) = line_range(node);
        let chunk = Chunk::new(
            ChunkKind::Package,
            self.file_path,
            GO_LANGUAGE,
            name,
            format!("package {}", name),
            start,
            end,
        )
        .with_signature(format!("package {}", name))
        .with_doc_comment(doc);
        self.chunks.push(chunk);
    }

    fn import_block(&self, decls: &[Node]) -> Option<Chunk> {
        let first = decls.first()?;
        let last = decls.last()?;

        let mut specs = Vec::new();
        for decl in decls {
            collect_named(*decl, "import_spec", &mut specs);
        }
        let imports: Vec<String> = specs
            .iter()
            .filter_map(|spec| spec.child_by_field_name("path"))
            .map(|path| {
                self.text(path)
                    .trim_matches(|c| c == '"' || c == '`')
                    .to_string()
            })
            .collect();

        let start = first.start_position().row + 1;
        let end = last.end_position().row + 1;
        Some(
            Chunk::new(
                ChunkKind::Import,
                self.file_path,
                GO_LANGUAGE,
                "imports",
                self.line_span(start, end),
                start,
                end,
            )
            .with_imports(imports),
        )
    }

    fn function(&mut self, node: Node, doc: String) {
        let Some(name_node) = node.child_by_field_name("name") else {
            return;
        };
        let name = self.text(name_node);
        let signature = format!(
            "func {}{}{}",
            name,
            self.type_parameters(node),
            self.params_and_result(node)
        );
        let chunk = self
            .chunk(ChunkKind::Function, name, node)
            .with_signature(signature)
            .with_doc_comment(doc);
        self.chunks.push(chunk);
    }

    fn method(&mut self, node: Node, doc: String) {
        let Some(name_node) = node.child_by_field_name("name") else {
            return;
        };
        let name = self.text(name_node);
        let receiver = node.child_by_field_name("receiver");
        let receiver_text = receiver
            .map(|r| self.render_params(r))
            .unwrap_or_default();
        let signature = format!(
            "func {} {}{}",
            receiver_text,
            name,
            self.params_and_result(node)
        );

        let mut chunk = self
            .chunk(ChunkKind::Method, name, node)
            .with_signature(signature)
            .with_doc_comment(doc);
        if let Some(parent) = receiver.and_then(|r| self.receiver_type_name(r)) {
            chunk = chunk.with_parent(parent);
        }
        self.chunks.push(chunk);
    }

    fn type_declaration(&mut self, node: Node, doc: String) {
        let mut cursor = node.walk();
        let members: Vec<Node> = node.named_children(&mut cursor).collect();
        let specs: Vec<(usize, Node)> = members
            .iter()
            .enumerate()
            .filter(|(_, n)| matches!(n.kind(), "type_spec" | "type_alias"))
            .map(|(i, n)| (i, *n))
            .collect();
        let grouped = specs.len() > 1;

        for (idx, spec) in specs {
            let Some(name_node) = spec.child_by_field_name("name") else {
                continue;
            };
            let name = self.text(name_node);
            let type_node = spec.child_by_field_name("type");

            let (kind, signature) = match type_node.map(|t| t.kind()) {
                Some("struct_type") if spec.kind() == "type_spec" => {
                    let fields = type_node.map(count_struct_fields).unwrap_or(0);
                    (
                        ChunkKind::Struct,
                        format!("type {} struct {{ {} fields }}", name, fields),
                    )
                }
                Some("interface_type") if spec.kind() == "type_spec" => {
                    let methods = type_node.map(count_interface_elems).unwrap_or(0);
                    (
                        ChunkKind::Interface,
                        format!("type {} interface {{ {} methods }}", name, methods),
                    )
                }
                _ => (ChunkKind::Generic, format!("type {}", name)),
            };

            // A grouped spec gets its own range and any comment directly above it
            let (target, spec_doc) = if grouped {
                let own = doc_comment(&members[..idx], spec, self.source);
                (spec, if own.is_empty() { doc.clone() } else { own })
            } else {
                (node, doc.clone())
            };

            let chunk = self
                .chunk(kind, name, target)
                .with_signature(signature)
                .with_doc_comment(spec_doc);
            self.chunks.push(chunk);
        }
    }

    fn value_declaration(&mut self, node: Node, doc: String, kind: ChunkKind) {
        let spec_kind = match kind {
            ChunkKind::Constant => "const_spec",
            _ => "var_spec",
        };
        let mut specs = Vec::new();
        collect_named(node, spec_kind, &mut specs);

        let mut names = Vec::new();
        for spec in specs {
            let mut cursor = spec.walk();
            names.extend(
                spec.children_by_field_name("name", &mut cursor)
                    .map(|n| self.text(n).to_string()),
            );
        }
        if names.is_empty() {
            return;
        }

        let name = names.join(", ");
        let keyword = if kind == ChunkKind::Constant { "const" } else { "var" };
        let chunk = self
            .chunk(kind, &name, node)
            .with_signature(format!("{} {}", keyword, name))
            .with_doc_comment(doc);
        self.chunks.push(chunk);
    }

    fn type_parameters(&self, node: Node) -> String {
        node.child_by_field_name("type_parameters")
            .map(|tp| collapse_whitespace(self.text(tp)))
            .unwrap_or_default()
    }

    /// `(params) result` with the result omitted when absent
    fn params_and_result(&self, node: Node) -> String {
        let params = node
            .child_by_field_name("parameters")
            .map(|p| self.render_params(p))
            .unwrap_or_else(|| "()".to_string());
        match node.child_by_field_name("result") {
            Some(result) if result.kind() == "parameter_list" => {
                format!("{} {}", params, self.render_params(result))
            }
            Some(result) => format!("{} {}", params, collapse_whitespace(self.text(result))),
            None => params,
        }
    }

    /// Parameter list rebuilt on one line from its declarations
    fn render_params(&self, list: Node) -> String {
        let mut cursor = list.walk();
        let params: Vec<String> = list
            .named_children(&mut cursor)
            .filter(|n| n.kind() != "comment")
            .map(|n| collapse_whitespace(self.text(n)))
            .collect();
        format!("({})", params.join(", "))
    }

    /// Base type name of a receiver, without pointer or type arguments
    fn receiver_type_name(&self, receiver: Node) -> Option<String> {
        let mut cursor = receiver.walk();
        let param = receiver
            .named_children(&mut cursor)
            .find(|n| n.kind() == "parameter_declaration")?;
        let ty = param.child_by_field_name("type")?;
        let name = self
            .text(ty)
            .trim()
            .trim_start_matches('*')
            .split('[')
            .next()?
            .trim();
        (!name.is_empty()).then(|| name.to_string())
    }
}

fn line_range(node: Node) -> (usize, usize) {
    (node.start_position().row + 1, node.end_position().row + 1)
}

/// Collect descendants of `kind`, without descending into matches
fn collect_named<'t>(node: Node<'t>, kind: &str, out: &mut Vec<Node<'t>>) {
    let mut cursor = node.walk();
    for child in node.named_children(&mut cursor) {
        if child.kind() == kind {
            out.push(child);
        } else {
            collect_named(child, kind, out);
        }
    }
}

fn count_struct_fields(struct_type: Node) -> usize {
    let mut cursor = struct_type.walk();
    struct_type
        .named_children(&mut cursor)
        .find(|n| n.kind() == "field_declaration_list")
        .map(|list| {
            let mut inner = list.walk();
            list.named_children(&mut inner)
                .filter(|n| n.kind() == "field_declaration")
                .count()
        })
        .unwrap_or(0)
}

fn count_interface_elems(interface_type: Node) -> usize {
    let mut cursor = interface_type.walk();
    interface_type
        .named_children(&mut cursor)
        .filter(|n| n.kind() != "comment")
        .count()
}

fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Comment lines directly above `node` with no blank line in between
///
/// `preceding` holds the earlier siblings in source order. A comment that
/// trails code on the same line is not a doc comment.
fn doc_comment(preceding: &[Node], node: Node, source: &str) -> String {
    let mut parts = Vec::new();
    let mut next_row = node.start_position().row;

    for (idx, prev) in preceding.iter().enumerate().rev() {
        if prev.kind() != "comment" || prev.end_position().row + 1 != next_row {
            break;
        }
        if idx > 0 {
            let before = preceding[idx - 1];
            if before.kind() != "comment"
                && before.end_position().row == prev.start_position().row
            {
                break;
            }
        }
        parts.push(strip_comment_markers(&source[prev.byte_range()]));
        next_row = prev.start_position().row;
    }

    parts.reverse();
    parts.join("\n").trim().to_string()
}

fn strip_comment_markers(comment: &str) -> String {
    if let Some(line) = comment.strip_prefix("//") {
        // Tool directives such as //go:generate are not documentation
        if line.starts_with("go:") || line.starts_with("line ") {
            return String::new();
        }
        return line.strip_prefix(' ').unwrap_or(line).trim_end().to_string();
    }

    let body = comment
        .strip_prefix("/*")
        .and_then(|c| c.strip_suffix("*/"))
        .unwrap_or(comment);
    body.lines()
        .map(|l| l.trim())
        .collect::<Vec<_>>()
        .join("\n")
        .trim()
        .to_string()
}
