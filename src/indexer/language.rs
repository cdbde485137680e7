//! Language tags from file extensions

/// Language tag recorded on chunks whose extension is not recognised
pub const UNKNOWN_LANGUAGE: &str = "unknown";

/// Detect the language tag for a file extension (with or without the leading dot)
pub fn detect_language(extension: &str) -> Option<&'static str> {
    let lang = match extension.trim_start_matches('.').to_lowercase().as_str() {
        "go" => "go",
        "py" => "python",
        "js" | "mjs" | "cjs" | "jsx" => "javascript",
        "ts" | "tsx" => "typescript",
        "java" => "java",
        "rs" => "rust",
        "cpp" | "cc" | "cxx" | "hpp" => "cpp",
        "c" | "h" => "c",
        "rb" => "ruby",
        "php" => "php",
        "swift" => "swift",
        "kt" | "kts" => "kotlin",
        "sh" | "bash" => "shell",
        "sql" => "sql",
        "md" | "markdown" => "markdown",
        "txt" => "text",
        "json" => "json",
        "yaml" | "yml" => "yaml",
        "toml" => "toml",
        _ => return None,
    };

    Some(lang)
}

/// Language tag for an extension, falling back to [`UNKNOWN_LANGUAGE`]
pub fn language_tag(extension: &str) -> &'static str {
    detect_language(extension).unwrap_or(UNKNOWN_LANGUAGE)
}

/// Whether the structured chunker handles this language
pub fn has_structured_parser(language: &str) -> bool {
    language == "go"
}
