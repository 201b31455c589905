//! Extension table, tree-sitter grammar registry and keyword separators.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{IndexError, Result};

/// A recognised file kind. Only some have a compiled grammar; the rest are
/// split on keyword separators alone.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Lang {
    Rust,
    Python,
    JavaScript,
    TypeScript,
    Go,
    Bash,
    Toml,
    Json,
    Markdown,
    C,
    Cpp,
    CSharp,
    Java,
    Kotlin,
    Scala,
    Swift,
    Ruby,
    Php,
    Lua,
    Haskell,
    Elixir,
    Solidity,
    Proto,
    Html,
    Latex,
    Rst,
    Text,
}

const EXTENSIONS: &[(&str, Lang)] = &[
    ("rs", Lang::Rust),
    ("py", Lang::Python),
    ("pyi", Lang::Python),
    ("js", Lang::JavaScript),
    ("jsx", Lang::JavaScript),
    ("mjs", Lang::JavaScript),
    ("cjs", Lang::JavaScript),
    ("ts", Lang::TypeScript),
    ("tsx", Lang::TypeScript),
    ("mts", Lang::TypeScript),
    ("cts", Lang::TypeScript),
    ("go", Lang::Go),
    ("sh", Lang::Bash),
    ("bash", Lang::Bash),
    ("zsh", Lang::Bash),
    ("toml", Lang::Toml),
    ("json", Lang::Json),
    ("jsonc", Lang::Json),
    ("md", Lang::Markdown),
    ("markdown", Lang::Markdown),
    ("c", Lang::C),
    ("h", Lang::C),
    ("cpp", Lang::Cpp),
    ("cc", Lang::Cpp),
    ("cxx", Lang::Cpp),
    ("hpp", Lang::Cpp),
    ("hh", Lang::Cpp),
    ("hxx", Lang::Cpp),
    ("cs", Lang::CSharp),
    ("java", Lang::Java),
    ("kt", Lang::Kotlin),
    ("kts", Lang::Kotlin),
    ("scala", Lang::Scala),
    ("sc", Lang::Scala),
    ("swift", Lang::Swift),
    ("rb", Lang::Ruby),
    ("php", Lang::Php),
    ("lua", Lang::Lua),
    ("hs", Lang::Haskell),
    ("ex", Lang::Elixir),
    ("exs", Lang::Elixir),
    ("sol", Lang::Solidity),
    ("proto", Lang::Proto),
    ("html", Lang::Html),
    ("htm", Lang::Html),
    ("tex", Lang::Latex),
    ("rst", Lang::Rst),
    ("txt", Lang::Text),
];

impl Lang {
    /// Identifier stored in chunk metadata and accepted in config.
    #[must_use]
    pub fn id(self) -> &'static str {
        match self {
            Self::Rust => "rust",
            Self::Python => "python",
            Self::JavaScript => "javascript",
            Self::TypeScript => "typescript",
            Self::Go => "go",
            Self::Bash => "bash",
            Self::Toml => "toml",
            Self::Json => "json",
            Self::Markdown => "markdown",
            Self::C => "c",
            Self::Cpp => "cpp",
            Self::CSharp => "csharp",
            Self::Java => "java",
            Self::Kotlin => "kotlin",
            Self::Scala => "scala",
            Self::Swift => "swift",
            Self::Ruby => "ruby",
            Self::Php => "php",
            Self::Lua => "lua",
            Self::Haskell => "haskell",
            Self::Elixir => "elixir",
            Self::Solidity => "solidity",
            Self::Proto => "proto",
            Self::Html => "html",
            Self::Latex => "latex",
            Self::Rst => "rst",
            Self::Text => "text",
        }
    }

    /// Plain prose, chunked with the text policy and generic separators only.
    #[must_use]
    pub fn is_plain_text(self) -> bool {
        self == Self::Text
    }

    /// Get the tree-sitter grammar. Returns `None` if the language has no
    /// grammar or the corresponding feature is not enabled.
    #[must_use]
    pub fn grammar(self) -> Option<tree_sitter::Language> {
        match self {
            #[cfg(feature = "lang-rust")]
            Self::Rust => Some(tree_sitter_rust::LANGUAGE.into()),
            #[cfg(feature = "lang-python")]
            Self::Python => Some(tree_sitter_python::LANGUAGE.into()),
            #[cfg(feature = "lang-js")]
            Self::JavaScript => Some(tree_sitter_javascript::LANGUAGE.into()),
            #[cfg(feature = "lang-js")]
            Self::TypeScript => Some(tree_sitter_typescript::LANGUAGE_TYPESCRIPT.into()),
            #[cfg(feature = "lang-go")]
            Self::Go => Some(tree_sitter_go::LANGUAGE.into()),
            #[cfg(feature = "lang-config")]
            Self::Bash => Some(tree_sitter_bash::LANGUAGE.into()),
            #[cfg(feature = "lang-config")]
            Self::Toml => Some(tree_sitter_toml_ng::LANGUAGE.into()),
            #[cfg(feature = "lang-config")]
            Self::Json => Some(tree_sitter_json::LANGUAGE.into()),
            #[cfg(feature = "lang-config")]
            Self::Markdown => Some(tree_sitter_md::LANGUAGE.into()),
            #[allow(unreachable_patterns)]
            _ => None,
        }
    }

    /// AST node kinds whose start and end make good chunk boundaries.
    #[must_use]
    pub fn entity_node_kinds(self) -> &'static [&'static str] {
        match self {
            Self::Rust => &[
                "function_item",
                "struct_item",
                "enum_item",
                "trait_item",
                "impl_item",
                "type_item",
                "const_item",
                "static_item",
                "macro_definition",
                "mod_item",
            ],
            Self::Python => &[
                "function_definition",
                "class_definition",
                "decorated_definition",
            ],
            Self::JavaScript | Self::TypeScript => &[
                "function_declaration",
                "class_declaration",
                "method_definition",
                "export_statement",
                "lexical_declaration",
                "interface_declaration",
            ],
            Self::Go => &[
                "function_declaration",
                "method_declaration",
                "type_declaration",
                "const_declaration",
            ],
            Self::Bash => &["function_definition"],
            Self::Toml => &["table", "table_array_element"],
            Self::Markdown => &["section"],
            _ => &[],
        }
    }

    /// Top-level node kinds holding imports, used for embedding context.
    #[must_use]
    pub fn import_node_kinds(self) -> &'static [&'static str] {
        match self {
            Self::Rust => &["use_declaration"],
            Self::Python => &["import_statement", "import_from_statement"],
            Self::JavaScript | Self::TypeScript => &["import_statement"],
            Self::Go => &["import_declaration"],
            _ => &[],
        }
    }

    /// Keyword separators tried after syntactic boundaries, strongest first.
    ///
    /// A separator starting with newlines cuts after them, so the keyword
    /// opens the next chunk; any other separator cuts right before itself.
    #[must_use]
    pub fn separators(self) -> &'static [&'static str] {
        match self {
            Self::Rust => &[
                "\nfn ", "\npub fn ", "\nimpl ", "\nstruct ", "\nenum ", "\ntrait ", "\nmod ",
                "\nconst ", "\nlet ", "\nif ", "\nwhile ", "\nfor ", "\nloop ", "\nmatch ",
            ],
            Self::Python => &["\nclass ", "\ndef ", "\n\tdef ", "\n    def "],
            Self::JavaScript => &[
                "\nfunction ", "\nconst ", "\nlet ", "\nvar ", "\nclass ", "\nif ", "\nfor ",
                "\nwhile ", "\nswitch ", "\ncase ", "\ndefault ",
            ],
            Self::TypeScript => &[
                "\nenum ", "\ninterface ", "\nnamespace ", "\ntype ", "\nclass ", "\nfunction ",
                "\nconst ", "\nlet ", "\nvar ", "\nif ", "\nfor ", "\nwhile ", "\nswitch ",
                "\ncase ", "\ndefault ",
            ],
            Self::Go => &[
                "\nfunc ", "\nvar ", "\nconst ", "\ntype ", "\nif ", "\nfor ", "\nswitch ",
                "\ncase ",
            ],
            Self::Bash => &["\nfunction ", "\nif ", "\nfor ", "\nwhile ", "\ncase "],
            Self::Toml => &["\n[[", "\n["],
            Self::Markdown => &[
                "\n# ", "\n## ", "\n### ", "\n#### ", "\n##### ", "\n###### ", "\n```\n",
                "\n***\n", "\n---\n", "\n___\n",
            ],
            Self::C | Self::Cpp => &[
                "\nclass ", "\nstruct ", "\nnamespace ", "\nvoid ", "\nint ", "\nfloat ",
                "\ndouble ", "\nstatic ", "\nif ", "\nfor ", "\nwhile ", "\nswitch ", "\ncase ",
            ],
            Self::CSharp => &[
                "\ninterface ", "\nenum ", "\nimplements ", "\ndelegate ", "\nevent ",
                "\nclass ", "\nabstract ", "\npublic ", "\nprotected ", "\nprivate ",
                "\nstatic ", "\nreturn ", "\nif ", "\ncontinue ", "\nfor ", "\nforeach ",
                "\nwhile ", "\nswitch ", "\nbreak ", "\ncase ", "\nelse ", "\ntry ", "\nthrow ",
                "\nfinally ", "\ncatch ",
            ],
            Self::Java => &[
                "\nclass ", "\npublic ", "\nprotected ", "\nprivate ", "\nstatic ", "\nif ",
                "\nfor ", "\nwhile ", "\nswitch ", "\ncase ",
            ],
            Self::Kotlin => &[
                "\nclass ", "\npublic ", "\nprotected ", "\nprivate ", "\ninternal ",
                "\ncompanion ", "\nfun ", "\nval ", "\nvar ", "\nif ", "\nfor ", "\nwhile ",
                "\nwhen ", "\ncase ", "\nelse ",
            ],
            Self::Scala => &[
                "\nclass ", "\nobject ", "\ndef ", "\nval ", "\nvar ", "\nif ", "\nfor ",
                "\nwhile ", "\nmatch ", "\ncase ",
            ],
            Self::Swift => &[
                "\nfunc ", "\nclass ", "\nstruct ", "\nenum ", "\nif ", "\nfor ", "\nwhile ",
                "\ndo ", "\nswitch ", "\ncase ",
            ],
            Self::Ruby => &[
                "\ndef ", "\nclass ", "\nif ", "\nunless ", "\nwhile ", "\nfor ", "\ndo ",
                "\nbegin ", "\nrescue ",
            ],
            Self::Php => &[
                "\nfunction ", "\nclass ", "\nif ", "\nforeach ", "\nwhile ", "\ndo ",
                "\nswitch ", "\ncase ",
            ],
            Self::Lua => &["\nlocal ", "\nfunction ", "\nif ", "\nfor ", "\nwhile ", "\nrepeat "],
            Self::Haskell => &[
                "\nmain :: ", "\nmain = ", "\nlet ", "\nin ", "\ndo ", "\nwhere ", "\n:: ",
                "\n= ", "\ndata ", "\nnewtype ", "\ntype ", "\nmodule ", "\nimport ",
                "\nclass ", "\ninstance ",
            ],
            Self::Elixir => &[
                "\ndefmodule ", "\ndefprotocol ", "\ndefmacro ", "\ndefmacrop ", "\ndef ",
                "\ndefp ", "\nif ", "\nunless ", "\nwhile ", "\ncase ", "\ncond ", "\nwith ",
                "\nfor ", "\ndo ",
            ],
            Self::Solidity => &[
                "\npragma ", "\nusing ", "\ncontract ", "\ninterface ", "\nlibrary ",
                "\nconstructor ", "\ntype ", "\nfunction ", "\nevent ", "\nmodifier ",
                "\nerror ", "\nstruct ", "\nenum ", "\nif ", "\nfor ", "\nwhile ",
                "\nassembly ",
            ],
            Self::Proto => &[
                "\nmessage ", "\nservice ", "\nenum ", "\noption ", "\nimport ", "\nsyntax ",
            ],
            Self::Html => &[
                "<body", "<div", "<p", "<br", "<li", "<h1", "<h2", "<h3", "<h4", "<h5", "<h6",
                "<span", "<table", "<tr", "<td", "<th", "<ul", "<ol", "<header", "<footer",
                "<nav", "<head", "<style", "<script", "<meta", "<title",
            ],
            Self::Latex => &[
                "\n\\chapter{", "\n\\section{", "\n\\subsection{", "\n\\subsubsection{",
                "\n\\begin{enumerate}", "\n\\begin{itemize}", "\n\\begin{description}",
                "\n\\begin{list}", "\n\\begin{quote}", "\n\\begin{verbatim}",
            ],
            Self::Rst => &["\n===\n", "\n---\n", "\n***\n", "\n.. "],
            Self::Json | Self::Text => &[],
        }
    }

    #[must_use]
    pub fn from_extension(ext: &str) -> Option<Self> {
        let ext = ext.trim_start_matches('.').to_ascii_lowercase();
        EXTENSIONS
            .iter()
            .find(|(e, _)| *e == ext)
            .map(|(_, lang)| *lang)
    }
}

impl std::fmt::Display for Lang {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.id())
    }
}

/// Every extension in the table, without the leading dot.
#[must_use]
pub fn known_extensions() -> Vec<&'static str> {
    EXTENSIONS.iter().map(|(e, _)| *e).collect()
}

/// Detect the file kind from its extension.
///
/// # Errors
///
/// Returns [`IndexError::UnsupportedFileType`] for a missing or unmapped extension.
pub fn detect_language(path: &Path) -> Result<Lang> {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .ok_or_else(|| IndexError::UnsupportedFileType(path.display().to_string()))?;
    Lang::from_extension(ext).ok_or_else(|| IndexError::UnsupportedFileType(format!(".{ext}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detect_language_rs() {
        assert_eq!(detect_language(Path::new("src/main.rs")).unwrap(), Lang::Rust);
    }

    #[test]
    fn detect_language_cpp_variants() {
        for ext in &["cpp", "cc", "cxx", "hpp"] {
            let path = format!("file.{ext}");
            assert_eq!(
                detect_language(Path::new(&path)).unwrap(),
                Lang::Cpp,
                "failed for .{ext}"
            );
        }
    }

    #[test]
    fn detect_language_is_case_insensitive() {
        assert_eq!(detect_language(Path::new("README.MD")).unwrap(), Lang::Markdown);
    }

    #[test]
    fn txt_is_plain_text() {
        let lang = detect_language(Path::new("notes.txt")).unwrap();
        assert!(lang.is_plain_text());
        assert!(lang.separators().is_empty());
    }

    #[test]
    fn unknown_extension_is_unsupported() {
        let err = detect_language(Path::new("image.png")).unwrap_err();
        assert!(matches!(err, IndexError::UnsupportedFileType(ref e) if e == ".png"));
        assert!(matches!(
            detect_language(Path::new("Makefile")),
            Err(IndexError::UnsupportedFileType(_))
        ));
    }

    #[test]
    fn entity_node_kinds_rust_includes_function_item() {
        let kinds = Lang::Rust.entity_node_kinds();
        assert!(kinds.contains(&"function_item"));
        assert!(kinds.contains(&"impl_item"));
    }

    #[test]
    fn grammarless_languages_still_have_separators() {
        for lang in [Lang::Cpp, Lang::Java, Lang::CSharp, Lang::Ruby, Lang::Html] {
            assert!(lang.grammar().is_none());
            assert!(!lang.separators().is_empty(), "{lang}");
        }
    }

    #[test]
    fn grammar_returns_some_for_enabled_features() {
        #[cfg(feature = "lang-rust")]
        assert!(Lang::Rust.grammar().is_some());
        #[cfg(feature = "lang-python")]
        assert!(Lang::Python.grammar().is_some());
        #[cfg(feature = "lang-go")]
        assert!(Lang::Go.grammar().is_some());
        #[cfg(feature = "lang-config")]
        assert!(Lang::Toml.grammar().is_some());
    }

    #[test]
    fn every_table_entry_resolves() {
        for ext in known_extensions() {
            let lang = Lang::from_extension(ext).unwrap();
            assert!(!lang.id().is_empty());
            assert_eq!(lang.to_string(), lang.id());
        }
    }
}
