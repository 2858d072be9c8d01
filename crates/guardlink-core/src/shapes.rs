//! Comment Shape Table (spec §4.1): per-extension lookup of recognized
//! comment syntaxes, closed over the extension list in spec §6.3.

/// Describes how comments are written in one file extension's language.
#[derive(Debug, Clone, Copy)]
pub struct CommentShape {
    /// Single-line prefixes, longest-first.
    pub line_prefixes: &'static [&'static str],
    /// Self-closing block forms, e.g. `("/*", "*/")`.
    pub self_closing_blocks: &'static [(&'static str, &'static str)],
    /// Block opener with no closer on the same line, e.g. `"/*"`.
    pub block_open: Option<&'static str>,
    /// Whether Javadoc-style ` * ` continuation lines are recognized.
    pub block_continuation: bool,
}

const C_STYLE: CommentShape = CommentShape {
    line_prefixes: &["//"],
    self_closing_blocks: &[("/*", "*/")],
    block_open: Some("/*"),
    block_continuation: true,
};

const HASH_STYLE: CommentShape = CommentShape {
    line_prefixes: &["#"],
    self_closing_blocks: &[],
    block_open: None,
    block_continuation: false,
};

const HASH_AND_C_STYLE: CommentShape = CommentShape {
    line_prefixes: &["#", "//"],
    self_closing_blocks: &[("/*", "*/")],
    block_open: Some("/*"),
    block_continuation: true,
};

const DASH_STYLE: CommentShape = CommentShape {
    line_prefixes: &["--"],
    self_closing_blocks: &[],
    block_open: None,
    block_continuation: false,
};

const HASKELL_STYLE: CommentShape = CommentShape {
    line_prefixes: &["--"],
    self_closing_blocks: &[("{-", "-}")],
    block_open: None,
    block_continuation: false,
};

const MARKUP_STYLE: CommentShape = CommentShape {
    line_prefixes: &[],
    self_closing_blocks: &[("<!--", "-->")],
    block_open: None,
    block_continuation: false,
};

const CSS_STYLE: CommentShape = CommentShape {
    line_prefixes: &[],
    self_closing_blocks: &[("/*", "*/")],
    block_open: Some("/*"),
    block_continuation: true,
};

/// Fallback for extensions not in the closed set (spec §4.1): defaults to
/// `//`-style but still runs the full stripping ladder (block continuation,
/// self-closing forms) rather than only the bare single-line prefix.
pub const DEFAULT_SHAPE: CommentShape = C_STYLE;

/// Look up the comment shape for a file extension (without the leading dot).
pub fn shape_for_extension(ext: &str) -> CommentShape {
    match ext.to_ascii_lowercase().as_str() {
        "ts" | "tsx" | "js" | "jsx" | "go" | "rs" | "java" | "kt" | "scala" | "c" | "cpp"
        | "cc" | "h" | "hpp" | "cs" | "swift" | "dart" => C_STYLE,
        "py" | "rb" | "sh" | "bash" | "yaml" | "yml" | "ex" | "exs" => HASH_STYLE,
        "tf" | "hcl" => HASH_AND_C_STYLE,
        "sql" | "lua" => DASH_STYLE,
        "hs" => HASKELL_STYLE,
        "html" | "xml" | "svg" => MARKUP_STYLE,
        "css" => CSS_STYLE,
        _ => DEFAULT_SHAPE,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rust_is_c_style() {
        let shape = shape_for_extension("rs");
        assert_eq!(shape.line_prefixes, &["//"]);
        assert!(shape.block_continuation);
    }

    #[test]
    fn python_is_hash_only() {
        let shape = shape_for_extension("py");
        assert_eq!(shape.line_prefixes, &["#"]);
        assert!(shape.self_closing_blocks.is_empty());
    }

    #[test]
    fn terraform_supports_both_hash_and_c_style() {
        let shape = shape_for_extension("tf");
        assert_eq!(shape.line_prefixes, &["#", "//"]);
    }

    #[test]
    fn html_is_markup_only() {
        let shape = shape_for_extension("html");
        assert!(shape.line_prefixes.is_empty());
        assert_eq!(shape.self_closing_blocks, &[("<!--", "-->")]);
    }

    #[test]
    fn unknown_extension_defaults_to_c_style() {
        let shape = shape_for_extension("zzz");
        assert_eq!(shape.line_prefixes, DEFAULT_SHAPE.line_prefixes);
    }
}
