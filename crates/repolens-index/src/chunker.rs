//! Language-aware chunking with a fixed size and overlap per file kind.
//!
//! Cut points are ranked: tree-sitter entity edges when the language has a
//! grammar, then the language's keyword separators, then blank lines, line
//! breaks and spaces. Chunks are cut in `char` units.

use serde::{Deserialize, Serialize};
use tree_sitter::{Node, Parser, Tree};

use crate::error::Result;
use crate::languages::Lang;
use crate::splitter::{CutPoints, GENERIC_SEPARATORS, SplitPolicy, split_spans};

/// Provenance of one file, copied unchanged onto each of its chunks.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileMeta {
    pub file_name: String,
    pub rel_path: String,
    pub url: String,
    pub last_updated: String,
}

/// One chunk of a source file.
#[derive(Debug, Clone)]
pub struct SourceChunk {
    pub text: String,
    pub meta: FileMeta,
    pub language: Lang,
    /// Position of this chunk within its file.
    pub index: usize,
    /// Char offsets into the file, end exclusive.
    pub char_range: (usize, usize),
    /// 1-based inclusive line numbers.
    pub line_range: (usize, usize),
    /// Name of the first syntactic entity starting inside the chunk.
    pub entity_name: Option<String>,
    pub imports: String,
    pub content_hash: String,
}

/// Size and overlap of one chunking policy, in characters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChunkPolicy {
    pub chunk_size: usize,
    pub overlap: usize,
}

impl ChunkPolicy {
    pub const TEXT: Self = Self {
        chunk_size: 1024,
        overlap: 50,
    };
    pub const CODE: Self = Self {
        chunk_size: 1500,
        overlap: 100,
    };

    /// # Errors
    ///
    /// Returns `InvalidConfig` if the size is zero or the overlap is not smaller than the size.
    pub fn validate(self) -> Result<()> {
        self.as_split().validate().map(|_| ())
    }

    fn as_split(self) -> SplitPolicy {
        SplitPolicy {
            chunk_size: self.chunk_size,
            overlap: self.overlap,
        }
    }
}

/// Chunker configuration: one policy for prose, one for everything else.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkerConfig {
    pub text: ChunkPolicy,
    pub code: ChunkPolicy,
}

impl Default for ChunkerConfig {
    fn default() -> Self {
        Self {
            text: ChunkPolicy::TEXT,
            code: ChunkPolicy::CODE,
        }
    }
}

impl ChunkerConfig {
    #[must_use]
    pub fn policy_for(&self, lang: Lang) -> ChunkPolicy {
        if lang.is_plain_text() {
            self.text
        } else {
            self.code
        }
    }
}

/// Split one file into overlapping chunks.
///
/// Whitespace-only input yields no chunks. A file whose grammar fails to
/// parse is still chunked on separators.
///
/// # Errors
///
/// Returns `InvalidConfig` if the selected policy is invalid.
pub fn chunk_source(
    source: &str,
    meta: &FileMeta,
    lang: Lang,
    config: &ChunkerConfig,
) -> Result<Vec<SourceChunk>> {
    let policy = config.policy_for(lang).as_split().validate()?;
    if source.trim().is_empty() {
        return Ok(Vec::new());
    }

    let chars: Vec<char> = source.chars().collect();
    let offsets = CharOffsets::new(source);
    let tree = parse(source, lang, &meta.rel_path);

    let mut cuts = CutPoints::default();
    let mut entities = Vec::new();
    if !lang.is_plain_text() {
        if let Some(tree) = &tree {
            entities = collect_entities(&tree.root_node(), source, lang);
            cuts.push_offsets(entity_cut_points(&entities, source, &offsets));
        }
        cuts.push_separators(&chars, lang.separators());
    }
    cuts.push_each_separator(&chars, GENERIC_SEPARATORS);

    let imports = tree
        .as_ref()
        .map(|t| extract_imports(source, &t.root_node(), lang))
        .unwrap_or_default();

    let chunks = split_spans(chars.len(), policy, &cuts)
        .into_iter()
        .enumerate()
        .map(|(index, span)| {
            let text: String = chars[span.clone()].iter().collect();
            let (byte_start, byte_end) = (offsets.byte(span.start), offsets.byte(span.end));
            let entity_name = entities
                .iter()
                .find(|e| e.start >= byte_start && e.start < byte_end)
                .and_then(|e| e.name.clone());
            SourceChunk {
                content_hash: blake3::hash(text.as_bytes()).to_hex().to_string(),
                line_range: (
                    line_of(source, byte_start),
                    line_of(source, byte_end.saturating_sub(1).max(byte_start)),
                ),
                char_range: (span.start, span.end),
                entity_name,
                imports: imports.clone(),
                meta: meta.clone(),
                language: lang,
                index,
                text,
            }
        })
        .collect::<Vec<_>>();

    tracing::debug!(
        file = %meta.rel_path,
        language = %lang,
        chunks = chunks.len(),
        "file chunked"
    );
    Ok(chunks)
}

fn parse(source: &str, lang: Lang, file_path: &str) -> Option<Tree> {
    let grammar = lang.grammar()?;
    let mut parser = Parser::new();
    if let Err(e) = parser.set_language(&grammar) {
        tracing::debug!("{file_path}: set_language failed: {e}");
        return None;
    }
    let tree = parser.parse(source, None);
    if tree.is_none() {
        tracing::debug!("{file_path}: parse failed, using separators only");
    }
    tree
}

struct Entity {
    start: usize,
    end: usize,
    name: Option<String>,
}

/// Entity nodes down to a shallow depth, so methods inside impls and classes count.
fn collect_entities(root: &Node, source: &str, lang: Lang) -> Vec<Entity> {
    const MAX_DEPTH: usize = 4;
    let kinds = lang.entity_node_kinds();
    let mut out = Vec::new();
    let mut stack = vec![(*root, 0usize)];
    while let Some((node, depth)) = stack.pop() {
        if kinds.contains(&node.kind()) {
            out.push(Entity {
                start: node.start_byte(),
                end: node.end_byte(),
                name: entity_name(&node, source),
            });
        }
        if depth >= MAX_DEPTH {
            continue;
        }
        let count = u32::try_from(node.named_child_count()).unwrap_or(u32::MAX);
        for i in 0..count {
            if let Some(child) = node.named_child(i) {
                stack.push((child, depth + 1));
            }
        }
    }
    out.sort_by_key(|e| e.start);
    out
}

fn entity_name(node: &Node, source: &str) -> Option<String> {
    // tree-sitter-rust: impl_item uses "type" field, most others use "name"
    node.child_by_field_name("name")
        .or_else(|| node.child_by_field_name("type"))
        .map(|n| source[n.byte_range()].to_string())
}

/// Cut before the line an entity starts on and after the line it ends on.
fn entity_cut_points(entities: &[Entity], source: &str, offsets: &CharOffsets) -> Vec<usize> {
    let mut points = Vec::with_capacity(entities.len() * 2);
    for e in entities {
        let line_start = source[..e.start].rfind('\n').map_or(0, |i| i + 1);
        points.push(offsets.char_at(line_start));
        let after = match source[e.end..].find('\n') {
            Some(i) => e.end + i + 1,
            None => source.len(),
        };
        points.push(offsets.char_at(after));
    }
    points
}

fn extract_imports(source: &str, root: &Node, lang: Lang) -> String {
    let kinds = lang.import_node_kinds();
    if kinds.is_empty() {
        return String::new();
    }
    let mut imports = String::new();
    let count = u32::try_from(root.named_child_count()).unwrap_or(u32::MAX);
    for i in 0..count {
        let Some(child) = root.named_child(i) else {
            continue;
        };
        if kinds.contains(&child.kind()) {
            imports.push_str(&source[child.byte_range()]);
            imports.push('\n');
        }
    }
    imports
}

fn line_of(source: &str, byte: usize) -> usize {
    source.as_bytes()[..byte.min(source.len())]
        .iter()
        .filter(|&&b| b == b'\n')
        .count()
        + 1
}

/// Byte offset of every char boundary, plus one past the end.
struct CharOffsets(Vec<usize>);

impl CharOffsets {
    fn new(source: &str) -> Self {
        let mut v: Vec<usize> = source.char_indices().map(|(b, _)| b).collect();
        v.push(source.len());
        Self(v)
    }

    fn byte(&self, char_idx: usize) -> usize {
        self.0[char_idx.min(self.0.len() - 1)]
    }

    fn char_at(&self, byte: usize) -> usize {
        self.0.partition_point(|&b| b < byte)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn meta(name: &str) -> FileMeta {
        FileMeta {
            file_name: name.into(),
            rel_path: format!("src/{name}"),
            url: format!("https://github.com/acme/widgets/blob/abc/src/{name}"),
            last_updated: "2024-05-01 10:00:00".into(),
        }
    }

    fn reconstruct(chunks: &[SourceChunk], overlap: usize) -> String {
        let mut out = String::new();
        for (i, c) in chunks.iter().enumerate() {
            if i == 0 {
                out.push_str(&c.text);
            } else {
                out.extend(c.text.chars().skip(overlap));
            }
        }
        out
    }

    #[test]
    fn whitespace_only_yields_nothing() {
        let chunks = chunk_source("  \n\t\n", &meta("a.rs"), Lang::Rust, &ChunkerConfig::default())
            .unwrap();
        assert!(chunks.is_empty());
    }

    #[test]
    fn small_file_is_one_chunk_with_metadata() {
        let src = "fn main() {\n    println!(\"hi\");\n}\n";
        let m = meta("main.rs");
        let chunks = chunk_source(src, &m, Lang::Rust, &ChunkerConfig::default()).unwrap();
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].text, src);
        assert_eq!(chunks[0].meta, m);
        assert_eq!(chunks[0].line_range.0, 1);
        #[cfg(feature = "lang-rust")]
        assert_eq!(chunks[0].entity_name.as_deref(), Some("main"));
    }

    #[test]
    fn text_policy_applies_to_txt() {
        let para = "lorem ipsum dolor sit amet ".repeat(100);
        let chunks =
            chunk_source(&para, &meta("notes.txt"), Lang::Text, &ChunkerConfig::default()).unwrap();
        assert!(chunks.len() > 1);
        for c in &chunks {
            assert!(c.text.chars().count() <= 1024);
        }
        assert_eq!(reconstruct(&chunks, 50), para);
    }

    #[test]
    fn code_policy_and_metadata_propagate() {
        let body: String = (0..120)
            .map(|i| format!("int helper_{i}(int x) {{\n    return x * {i};\n}}\n\n"))
            .collect();
        let m = meta("main.cpp");
        let chunks = chunk_source(&body, &m, Lang::Cpp, &ChunkerConfig::default()).unwrap();
        assert!(chunks.len() > 1);
        for (i, c) in chunks.iter().enumerate() {
            assert!(c.text.chars().count() <= 1500);
            assert_eq!(c.index, i);
            assert_eq!(c.meta, m);
            assert_eq!(c.language, Lang::Cpp);
        }
        assert_eq!(reconstruct(&chunks, 100), body);
    }

    #[cfg(feature = "lang-python")]
    #[test]
    fn python_chunks_prefer_function_boundaries() {
        let body: String = (0..40)
            .map(|i| format!("def handler_{i}(event):\n    value = event.get('k{i}')\n    return value\n\n"))
            .collect();
        let config = ChunkerConfig {
            text: ChunkPolicy::TEXT,
            code: ChunkPolicy {
                chunk_size: 400,
                overlap: 0,
            },
        };
        let chunks = chunk_source(&body, &meta("h.py"), Lang::Python, &config).unwrap();
        assert!(chunks.len() > 1);
        for c in &chunks[1..] {
            assert!(
                c.text.trim_start().starts_with("def handler_"),
                "chunk starts mid-function: {:?}",
                c.text
            );
        }
    }

    #[test]
    fn invalid_policy_is_rejected() {
        let config = ChunkerConfig {
            text: ChunkPolicy {
                chunk_size: 10,
                overlap: 10,
            },
            code: ChunkPolicy::CODE,
        };
        assert!(chunk_source("abc", &meta("a.txt"), Lang::Text, &config).is_err());
    }

    #[test]
    fn content_hash_is_blake3_of_text() {
        let chunks =
            chunk_source("hello", &meta("a.txt"), Lang::Text, &ChunkerConfig::default()).unwrap();
        assert_eq!(
            chunks[0].content_hash,
            blake3::hash(b"hello").to_hex().to_string()
        );
    }

    #[test]
    fn char_offsets_round_trip_multibyte() {
        let offsets = CharOffsets::new("aé b");
        assert_eq!(offsets.byte(2), 3);
        assert_eq!(offsets.char_at(3), 2);
        assert_eq!(offsets.byte(99), 5);
    }

    proptest! {
        #[test]
        fn chunking_any_source_is_bounded_and_lossless(
            src in "[a-z(){};\n ]{1,600}",
            size in 20usize..200,
            overlap_seed in 0usize..200,
        ) {
            let overlap = overlap_seed % size;
            let config = ChunkerConfig {
                text: ChunkPolicy { chunk_size: size, overlap },
                code: ChunkPolicy { chunk_size: size, overlap },
            };
            prop_assume!(!src.trim().is_empty());
            for lang in [Lang::Rust, Lang::Cpp, Lang::Text] {
                let chunks = chunk_source(&src, &meta("x"), lang, &config).unwrap();
                for c in &chunks {
                    prop_assert!(c.text.chars().count() <= size);
                }
                for pair in chunks.windows(2) {
                    let tail: String = pair[0].text.chars().skip(pair[0].text.chars().count() - overlap).collect();
                    let head: String = pair[1].text.chars().take(overlap).collect();
                    prop_assert_eq!(tail, head);
                }
                prop_assert_eq!(reconstruct(&chunks, overlap), src.clone());
            }
        }
    }
}
