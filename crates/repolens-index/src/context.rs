//! Text stored on index nodes and text sent to the embedding model.

use crate::chunker::SourceChunk;

const MAX_IMPORT_LINES: usize = 5;

/// Stored node text: the chunk prefixed with its owning file name.
#[must_use]
pub(crate) fn node_text(chunk: &SourceChunk) -> String {
    format!("// file name: {}\n{}", chunk.meta.file_name, chunk.text)
}

/// Embedding input: path, language and a few imports ahead of the node text.
#[must_use]
pub(crate) fn contextualize_for_embedding(chunk: &SourceChunk) -> String {
    let stored = node_text(chunk);
    let mut text = String::with_capacity(stored.len() + 128);

    text.push_str("// path: ");
    text.push_str(&chunk.meta.rel_path);
    text.push('\n');
    text.push_str("// language: ");
    text.push_str(chunk.language.id());
    text.push('\n');

    if let Some(name) = &chunk.entity_name {
        text.push_str("// entity: ");
        text.push_str(name);
        text.push('\n');
    }

    for line in chunk.imports.lines().take(MAX_IMPORT_LINES) {
        text.push_str(line);
        text.push('\n');
    }

    text.push_str(&stored);
    text
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chunker::FileMeta;
    use crate::languages::Lang;

    fn chunk() -> SourceChunk {
        SourceChunk {
            text: "fn hello() { 42 }".into(),
            meta: FileMeta {
                file_name: "lib.rs".into(),
                rel_path: "src/lib.rs".into(),
                url: "https://github.com/acme/widgets/blob/abc/src/lib.rs".into(),
                last_updated: "2024-05-01 10:00:00".into(),
            },
            language: Lang::Rust,
            index: 0,
            char_range: (0, 17),
            line_range: (1, 1),
            entity_name: Some("hello".into()),
            imports: (0..8).map(|i| format!("use m{i};\n")).collect(),
            content_hash: String::new(),
        }
    }

    #[test]
    fn node_text_has_file_name_header() {
        assert_eq!(node_text(&chunk()), "// file name: lib.rs\nfn hello() { 42 }");
    }

    #[test]
    fn embedding_text_caps_imports() {
        let text = contextualize_for_embedding(&chunk());
        assert!(text.starts_with("// path: src/lib.rs\n// language: rust\n"));
        assert!(text.contains("// entity: hello"));
        assert!(text.contains("use m4;"));
        assert!(!text.contains("use m5;"));
        assert!(text.ends_with("// file name: lib.rs\nfn hello() { 42 }"));
    }
}
