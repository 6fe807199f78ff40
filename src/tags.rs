//! Tag editing and listing
//!
//! Edits are `tag=value` requests. Each tag is routed to one of two
//! namespaces:
//!
//! - **RIFF**: INFO text entries (`INAM`, `IART`, ...) stored as text chunks
//!   in the file's `LIST`/`INFO` container
//! - **ID3**: ID3v2.3 text frames (`TIT2`, `TPE1`, ...) stored in the file's
//!   `id3 ` chunk
//!
//! Missing containers are created on first use. An empty value deletes the
//! tag instead of setting it.

use crate::error::{Error, Result};
use crate::id3::{self, Frame, FrameKind, Id3Tag};
use crate::riff::{self, Chunk, ChunkBody, ChunkKind, Container, FourCC, INFO, LIST};
use serde::Serialize;
use std::fmt;
use std::fs::File;
use std::io::Read;
use std::path::PathBuf;
use std::str::FromStr;
use tracing::{debug, warn};

/// Largest value read from a `<file` source, in bytes
pub const MAX_FILE_TAG_SIZE: usize = 50_000;

/// Where a tag is stored
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Namespace {
    Riff,
    Id3,
}

impl fmt::Display for Namespace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Namespace::Riff => write!(f, "RIFF"),
            Namespace::Id3 => write!(f, "ID3"),
        }
    }
}

/// Value of an edit request
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EditValue {
    /// Literal string
    Text(String),
    /// Contents of a file, from `tag=<path`
    File(PathBuf),
}

/// One `tag=value` edit request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TagEdit {
    /// Tag, right-padded with spaces to four bytes
    pub tag: FourCC,
    pub value: EditValue,
}

impl TagEdit {
    /// Build a request with a literal value
    pub fn new(tag: &str, value: impl Into<String>) -> Result<Self> {
        Ok(TagEdit {
            tag: parse_tag(tag)?,
            value: EditValue::Text(value.into()),
        })
    }

    pub fn tag_str(&self) -> String {
        String::from_utf8_lossy(&self.tag).into_owned()
    }

    /// The string to store. File sources are read here and cut at
    /// [`MAX_FILE_TAG_SIZE`] bytes.
    pub fn resolve(&self) -> Result<String> {
        match &self.value {
            EditValue::Text(s) => Ok(s.clone()),
            EditValue::File(path) => {
                let unavailable = |source| Error::SourceUnavailable {
                    path: path.clone(),
                    source,
                };
                let file = File::open(path).map_err(unavailable)?;
                let mut bytes = Vec::new();
                file.take(MAX_FILE_TAG_SIZE as u64 + 1)
                    .read_to_end(&mut bytes)
                    .map_err(unavailable)?;
                if bytes.len() > MAX_FILE_TAG_SIZE {
                    warn!(
                        path = %path.display(),
                        "string file too long, truncated to {} bytes",
                        MAX_FILE_TAG_SIZE
                    );
                    bytes.truncate(MAX_FILE_TAG_SIZE);
                }
                Ok(String::from_utf8_lossy(&bytes).into_owned())
            }
        }
    }
}

fn parse_tag(tag: &str) -> Result<FourCC> {
    let bytes = tag.as_bytes();
    if bytes.is_empty() || bytes.len() > 4 {
        return Err(Error::MalformedTag(tag.to_string()));
    }
    let mut id = [b' '; 4];
    id[..bytes.len()].copy_from_slice(bytes);
    Ok(id)
}

impl FromStr for TagEdit {
    type Err = Error;

    /// Parse `tag=value`, or `tag=<path` to read the value from a file
    fn from_str(s: &str) -> Result<Self> {
        let (tag, value) = s
            .split_once('=')
            .ok_or_else(|| Error::MalformedTag(s.to_string()))?;
        let value = match value.strip_prefix('<') {
            Some(path) => EditValue::File(PathBuf::from(path)),
            None => EditValue::Text(value.to_string()),
        };
        Ok(TagEdit {
            tag: parse_tag(tag)?,
            value,
        })
    }
}

/// How edits are applied
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EditOptions {
    /// Remove every existing tag of a namespace before its first edit
    pub clear: bool,
    /// Add tags at the end even when the tag already exists
    pub append: bool,
}

/// Route a tag to its namespace and the identifier new nodes will carry.
///
/// RIFF INFO entries win over ID3 frames. Tags that are neither are `None`.
pub fn classify(tag: &[u8]) -> Option<(Namespace, FourCC)> {
    if let Some(ct) = riff::find_chunk_type(tag) {
        if ct.kind == ChunkKind::Text {
            let mut id = [0u8; 4];
            id.copy_from_slice(ct.id.as_bytes());
            return Some((Namespace::Riff, id));
        }
    }
    let ft = id3::find_frame_type_ignore_case(tag)?;
    if ft.kind != FrameKind::Text {
        return None;
    }
    let mut id = [0u8; 4];
    id.copy_from_slice(ft.id.as_bytes());
    Some((Namespace::Id3, id))
}

struct ResolvedEdit {
    namespace: Namespace,
    tag: FourCC,
    value: String,
}

fn is_info_list(chunk: &Chunk) -> bool {
    chunk.is(&LIST) && chunk.as_container().is_some_and(|c| c.is_kind(&INFO))
}

fn is_id3_chunk(chunk: &Chunk) -> bool {
    chunk.is(b"id3 ")
}

/// Replace the first node matching `matches` with `node`, or drop it when
/// `node` is `None`. Without a match, or in append mode, `node` goes last.
fn splice<T>(list: &mut Vec<T>, node: Option<T>, matches: impl Fn(&T) -> bool, append: bool) {
    if !append {
        if let Some(pos) = list.iter().position(matches) {
            match node {
                Some(node) => list[pos] = node,
                None => {
                    list.remove(pos);
                }
            }
            return;
        }
    }
    if let Some(node) = node {
        list.push(node);
    }
}

/// Make sure the container for `namespace` exists, appending it to the root
/// if not
fn ensure_container(root: &mut Container, namespace: Namespace) {
    match namespace {
        Namespace::Riff if root.search(&is_info_list).is_none() => {
            debug!("adding LIST/INFO chunk");
            root.children.push(Chunk::list(LIST, INFO));
        }
        Namespace::Id3 if root.search(&is_id3_chunk).is_none() => {
            debug!("adding ID3 chunk");
            root.children.push(Chunk::id3(Id3Tag::new()));
        }
        _ => {}
    }
}

fn apply_riff(info: &mut Container, edits: &[&ResolvedEdit], options: EditOptions) {
    if options.clear {
        info.children.clear();
    }
    for edit in edits {
        let node = (!edit.value.is_empty()).then(|| Chunk::text(edit.tag, &edit.value));
        let tag = edit.tag;
        splice(&mut info.children, node, |c| c.is(&tag), options.append);
    }
}

fn apply_id3(tag_block: &mut Id3Tag, edits: &[&ResolvedEdit], options: EditOptions) {
    if options.clear {
        tag_block.frames.clear();
    }
    for edit in edits {
        let node = (!edit.value.is_empty()).then(|| Frame::text(edit.tag, &edit.value));
        let id = edit.tag;
        splice(&mut tag_block.frames, node, |f| f.id == id, options.append);
    }
    tag_block.recompute_size();
}

/// Apply edit requests to a parsed tree.
///
/// Every value is resolved before the tree is touched, so on error the tree
/// is left as it was. Requests for unsupported tags are skipped with a
/// warning. Container lengths are fixed up later by
/// [`riff::write_riff`]; the `id3 ` chunk length is set here.
pub fn apply_edits(root: &mut Chunk, edits: &[TagEdit], options: EditOptions) -> Result<()> {
    let mut resolved = Vec::with_capacity(edits.len());
    for edit in edits {
        let Some((namespace, tag)) = classify(&edit.tag) else {
            warn!(tag = %edit.tag_str(), "unsupported tag, skipping");
            continue;
        };
        resolved.push(ResolvedEdit {
            namespace,
            tag,
            value: edit.resolve()?,
        });
    }

    let root = root
        .as_container_mut()
        .ok_or(Error::BadMagic { expected: "RIFF" })?;

    // containers are created in the order their namespace is first used
    let mut order = Vec::with_capacity(2);
    for edit in &resolved {
        if !order.contains(&edit.namespace) {
            order.push(edit.namespace);
        }
    }

    for namespace in order {
        ensure_container(root, namespace);
        let edits: Vec<&ResolvedEdit> = resolved
            .iter()
            .filter(|e| e.namespace == namespace)
            .collect();
        debug!(%namespace, count = edits.len(), "applying edits");

        match namespace {
            Namespace::Riff => {
                let info = root
                    .search_mut(&is_info_list)
                    .and_then(Chunk::as_container_mut);
                if let Some(info) = info {
                    apply_riff(info, &edits, options);
                }
            }
            Namespace::Id3 => {
                if let Some(chunk) = root.search_mut(&is_id3_chunk) {
                    if let ChunkBody::Id3(tag_block) = &mut chunk.body {
                        apply_id3(tag_block, &edits, options);
                        chunk.length = tag_block.total_len();
                    }
                }
            }
        }
    }
    Ok(())
}

/// One stored tag, for display
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TagEntry {
    pub namespace: Namespace,
    pub tag: String,
    pub description: &'static str,
    /// Rendered text, for text chunks and text frames
    pub value: Option<String>,
    /// Payload length in bytes
    pub length: u32,
}

/// Every INFO text chunk and ID3 frame in the tree, in file order
pub fn collect_tags(root: &Chunk) -> Vec<TagEntry> {
    let mut entries = Vec::new();
    collect_into(root, &mut entries);
    entries
}

fn collect_into(chunk: &Chunk, entries: &mut Vec<TagEntry>) {
    match &chunk.body {
        ChunkBody::Container(list) => {
            for child in &list.children {
                collect_into(child, entries);
            }
        }
        ChunkBody::Text(_) => entries.push(TagEntry {
            namespace: Namespace::Riff,
            tag: chunk.id_str().into_owned(),
            description: riff::find_chunk_type(&chunk.id).map_or("Unknown", |ct| ct.description),
            value: chunk.text_value(),
            length: chunk.length,
        }),
        ChunkBody::Id3(tag) => {
            for frame in &tag.frames {
                entries.push(TagEntry {
                    namespace: Namespace::Id3,
                    tag: frame.id_str().into_owned(),
                    description: id3::find_frame_type(&frame.id)
                        .map_or("Unknown", |ft| ft.description),
                    value: frame.as_text().map(|t| t.text()),
                    length: frame.payload_len(),
                });
            }
        }
        _ => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::id3::{TextEncoding, ID3_FRAME_HEADER_SIZE, ID3_HEADER_SIZE};
    use crate::riff::RIFF;

    fn wave(children: Vec<Chunk>) -> Chunk {
        let mut root = Chunk::list(RIFF, *b"WAVE");
        root.as_container_mut().unwrap().children = children;
        root
    }

    fn info(entries: &[(&[u8; 4], &str)]) -> Chunk {
        let mut list = Chunk::list(LIST, INFO);
        for (id, value) in entries {
            list.as_container_mut()
                .unwrap()
                .children
                .push(Chunk::text(**id, value));
        }
        list
    }

    fn info_tags(root: &Chunk) -> Vec<(String, String)> {
        root.search(&is_info_list)
            .unwrap()
            .children()
            .iter()
            .map(|c| (c.id_str().into_owned(), c.text_value().unwrap()))
            .collect()
    }

    fn id3_block(root: &Chunk) -> &Id3Tag {
        root.search(&is_id3_chunk).and_then(Chunk::as_id3).unwrap()
    }

    fn edits(requests: &[&str]) -> Vec<TagEdit> {
        requests.iter().map(|r| r.parse().unwrap()).collect()
    }

    #[test]
    fn test_parse_edit() {
        let edit: TagEdit = "INAM=Hello=World".parse().unwrap();
        assert_eq!(&edit.tag, b"INAM");
        assert_eq!(edit.value, EditValue::Text("Hello=World".to_string()));

        let edit: TagEdit = "ID3=".parse().unwrap();
        assert_eq!(&edit.tag, b"ID3 ");
        assert_eq!(edit.value, EditValue::Text(String::new()));

        let edit: TagEdit = "ICMT=<notes.txt".parse().unwrap();
        assert_eq!(edit.value, EditValue::File(PathBuf::from("notes.txt")));
    }

    #[test]
    fn test_parse_malformed_tag() {
        assert!(matches!(
            "TOOLONG=x".parse::<TagEdit>(),
            Err(Error::MalformedTag(t)) if t == "TOOLONG"
        ));
        assert!(matches!("=x".parse::<TagEdit>(), Err(Error::MalformedTag(_))));
        assert!(matches!("INAM".parse::<TagEdit>(), Err(Error::MalformedTag(_))));
    }

    #[test]
    fn test_classify() {
        assert_eq!(classify(b"inam"), Some((Namespace::Riff, *b"INAM")));
        assert_eq!(classify(b"tit2"), Some((Namespace::Id3, *b"TIT2")));
        assert_eq!(classify(b"TXXX"), Some((Namespace::Id3, *b"TXXX")));
        // binary frames and structural chunks are not editable
        assert_eq!(classify(b"APIC"), None);
        assert_eq!(classify(b"data"), None);
        assert_eq!(classify(b"zzzz"), None);
    }

    #[test]
    fn test_replace_keeps_position() {
        let mut root = wave(vec![info(&[(b"INAM", "a"), (b"IART", "b"), (b"ICMT", "c")])]);
        apply_edits(&mut root, &edits(&["iart=new"]), EditOptions::default()).unwrap();
        assert_eq!(
            info_tags(&root),
            vec![
                ("INAM".into(), "a".into()),
                ("IART".into(), "new".into()),
                ("ICMT".into(), "c".into()),
            ]
        );
    }

    #[test]
    fn test_empty_value_deletes() {
        let mut root = wave(vec![info(&[(b"INAM", "a"), (b"IART", "b")])]);
        apply_edits(&mut root, &edits(&["INAM="]), EditOptions::default()).unwrap();
        assert_eq!(info_tags(&root), vec![("IART".into(), "b".into())]);

        // deleting a tag that is not there changes nothing
        apply_edits(&mut root, &edits(&["ICMT="]), EditOptions::default()).unwrap();
        assert_eq!(info_tags(&root).len(), 1);
    }

    #[test]
    fn test_append_mode() {
        let mut root = wave(vec![info(&[(b"ICMT", "first")])]);
        let options = EditOptions {
            append: true,
            ..Default::default()
        };
        apply_edits(&mut root, &edits(&["ICMT=second", "ICMT=third"]), options).unwrap();
        assert_eq!(
            info_tags(&root),
            vec![
                ("ICMT".into(), "first".into()),
                ("ICMT".into(), "second".into()),
                ("ICMT".into(), "third".into()),
            ]
        );
    }

    #[test]
    fn test_clear_mode_clears_once() {
        let mut root = wave(vec![info(&[(b"INAM", "a"), (b"IART", "b")])]);
        let options = EditOptions {
            clear: true,
            ..Default::default()
        };
        apply_edits(&mut root, &edits(&["ICMT=x", "IENG=y"]), options).unwrap();
        assert_eq!(
            info_tags(&root),
            vec![("ICMT".into(), "x".into()), ("IENG".into(), "y".into())]
        );
    }

    #[test]
    fn test_clear_only_touched_namespace() {
        let mut block = Id3Tag::new();
        block.frames.push(Frame::text(*b"TIT2", "kept"));
        block.recompute_size();
        let mut root = wave(vec![info(&[(b"INAM", "a")]), Chunk::id3(block)]);
        let options = EditOptions {
            clear: true,
            ..Default::default()
        };
        apply_edits(&mut root, &edits(&["IART=b"]), options).unwrap();
        assert_eq!(info_tags(&root), vec![("IART".into(), "b".into())]);
        assert_eq!(id3_block(&root).frames.len(), 1);
    }

    #[test]
    fn test_creates_containers_in_first_use_order() {
        let mut root = wave(vec![Chunk::text(*b"junk", "")]);
        apply_edits(
            &mut root,
            &edits(&["TIT2=Song", "INAM=Name", "TPE1=Band"]),
            EditOptions::default(),
        )
        .unwrap();

        let children = root.children();
        assert_eq!(children.len(), 3);
        assert!(children[1].is(b"ID3 "));
        assert!(is_info_list(&children[2]));
        assert_eq!(info_tags(&root), vec![("INAM".into(), "Name".into())]);

        let block = id3_block(&root);
        let ids: Vec<_> = block.frames.iter().map(|f| f.id_str().into_owned()).collect();
        assert_eq!(ids, vec!["TIT2", "TPE1"]);
    }

    #[test]
    fn test_id3_size_invariant() {
        let mut root = wave(Vec::new());
        let batches: [&[&str]; 4] = [
            &["TIT2=abc", "TPE1=Someone"],
            &["TALB=An album name", "TIT2=a"],
            &["TPE1="],
            &["tcon=Rock"],
        ];
        for batch in batches {
            apply_edits(&mut root, &edits(batch), EditOptions::default()).unwrap();
            let chunk = root.search(&is_id3_chunk).unwrap();
            let block = chunk.as_id3().unwrap();
            let frames: u32 = block
                .frames
                .iter()
                .map(|f| ID3_FRAME_HEADER_SIZE + f.payload_len())
                .sum();
            assert_eq!(block.size, frames + frames % 2);
            assert_eq!(block.size % 2, 0);
            assert_eq!(chunk.length, ID3_HEADER_SIZE + block.size);
        }
        let ids: Vec<_> = id3_block(&root)
            .frames
            .iter()
            .map(|f| f.id_str().into_owned())
            .collect();
        assert_eq!(ids, vec!["TIT2", "TALB", "TCON"]);
    }

    #[test]
    fn test_id3_match_is_case_sensitive() {
        let mut block = Id3Tag::new();
        block.frames.push(Frame {
            id: *b"tit2",
            ..Frame::text(*b"TIT2", "old")
        });
        let mut root = wave(vec![Chunk::id3(block)]);
        apply_edits(&mut root, &edits(&["TIT2=new"]), EditOptions::default()).unwrap();
        assert_eq!(id3_block(&root).frames.len(), 2);
    }

    #[test]
    fn test_unsupported_tag_is_skipped() {
        let mut root = wave(Vec::new());
        apply_edits(&mut root, &edits(&["APIC=x", "QQQQ=y"]), EditOptions::default()).unwrap();
        assert!(root.children().is_empty());
    }

    #[test]
    fn test_failed_batch_leaves_tree_untouched() {
        let mut root = wave(vec![info(&[(b"INAM", "a")])]);
        let before = root.clone();
        let batch = edits(&["INAM=b", "ICMT=</nonexistent/wavtags/value.txt"]);
        let err = apply_edits(&mut root, &batch, EditOptions::default()).unwrap_err();
        assert!(matches!(err, Error::SourceUnavailable { .. }));
        assert_eq!(root, before);
    }

    #[test]
    fn test_wide_text_uses_utf16() {
        let mut root = wave(Vec::new());
        apply_edits(&mut root, &edits(&["TIT2=\u{65E5}\u{672C}"]), EditOptions::default()).unwrap();
        let frame = &id3_block(&root).frames[0];
        let text = frame.as_text().unwrap();
        assert_eq!(text.encoding, TextEncoding::Utf16Bom);
        assert_eq!(text.text(), "\u{65E5}\u{672C}");
    }

    #[test]
    fn test_collect_tags() {
        let mut root = wave(vec![info(&[(b"INAM", "Title")])]);
        apply_edits(&mut root, &edits(&["TPE1=Artist"]), EditOptions::default()).unwrap();
        let tags = collect_tags(&root);
        assert_eq!(
            tags,
            vec![
                TagEntry {
                    namespace: Namespace::Riff,
                    tag: "INAM".into(),
                    description: "Name",
                    value: Some("Title".into()),
                    length: 6,
                },
                TagEntry {
                    namespace: Namespace::Id3,
                    tag: "TPE1".into(),
                    description: "Lead performer(s)",
                    value: Some("Artist".into()),
                    length: 7,
                },
            ]
        );
    }
}
