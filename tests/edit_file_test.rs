//! File-level editing through `edit_file`

use std::fs;
use std::io::Write;
use tempfile::{tempdir, NamedTempFile};
use wavtags::tags::MAX_FILE_TAG_SIZE;
use wavtags::{collect_tags, edit_file, read_file, EditOptions, Error, TagEdit};

mod common;

use common::*;

fn write_temp(bytes: &[u8]) -> NamedTempFile {
    let mut file = NamedTempFile::new().expect("Failed to create temp file");
    file.write_all(bytes).expect("Failed to write temp file");
    file.flush().unwrap();
    file
}

#[test]
fn test_edit_file_writes_new_tags() {
    let input = write_temp(&minimal_wave(2000));
    let dir = tempdir().expect("Failed to create temp dir");
    let output = dir.path().join("out.wav");

    let edits: Vec<TagEdit> = ["INAM=Test", "TIT2=Title"]
        .iter()
        .map(|s| s.parse().unwrap())
        .collect();
    let written = edit_file(input.path(), &output, &edits, EditOptions::default()).unwrap();
    assert_eq!(written, fs::metadata(&output).unwrap().len());

    let riff = read_file(&output).unwrap();
    assert!(riff.is_complete());
    let tags: Vec<_> = collect_tags(&riff.root)
        .into_iter()
        .map(|t| (t.tag, t.value.unwrap()))
        .collect();
    assert_eq!(
        tags,
        vec![
            ("INAM".to_string(), "Test".to_string()),
            ("TIT2".to_string(), "Title".to_string()),
        ]
    );
    assert_eq!(riff.format().unwrap().sample_rate, 44_100);
}

#[test]
fn test_value_from_file() {
    let value = write_temp(b"Notes from a file\n");
    let input = write_temp(&minimal_wave(10));
    let dir = tempdir().unwrap();
    let output = dir.path().join("out.wav");

    let request = format!("ICMT=<{}", value.path().display());
    let edits = vec![request.parse::<TagEdit>().unwrap()];
    edit_file(input.path(), &output, &edits, EditOptions::default()).unwrap();

    let riff = read_file(&output).unwrap();
    let comment = riff.root.search(&|c| c.is(b"ICMT")).unwrap();
    assert_eq!(comment.text_value().unwrap(), "Notes from a file\n");
}

#[test]
fn test_value_from_file_is_truncated() {
    let value = write_temp(&vec![b'x'; MAX_FILE_TAG_SIZE + 500]);
    let request = format!("ICMT=<{}", value.path().display());
    let edit: TagEdit = request.parse().unwrap();
    assert_eq!(edit.resolve().unwrap().len(), MAX_FILE_TAG_SIZE);
}

#[test]
fn test_missing_value_file_writes_nothing() {
    let input = write_temp(&minimal_wave(10));
    let dir = tempdir().unwrap();
    let output = dir.path().join("out.wav");
    let missing = dir.path().join("missing.txt");

    let edits = vec![
        TagEdit::new("INAM", "x").unwrap(),
        format!("ICMT=<{}", missing.display()).parse().unwrap(),
    ];
    let err = edit_file(input.path(), &output, &edits, EditOptions::default()).unwrap_err();
    assert!(matches!(err, Error::SourceUnavailable { path, .. } if path == missing));
    assert!(!output.exists());
}

#[test]
fn test_truncated_input_writes_nothing() {
    let mut bytes = list(
        b"RIFF",
        b"WAVE",
        &[fmt_pcm(), list(b"LIST", b"INFO", &[chunk(b"INAM", b"Name\0\0")])],
    );
    bytes.truncate(bytes.len() - 3);
    let input = write_temp(&bytes);
    let dir = tempdir().unwrap();
    let output = dir.path().join("out.wav");

    let edits = vec![TagEdit::new("IART", "x").unwrap()];
    let err = edit_file(input.path(), &output, &edits, EditOptions::default()).unwrap_err();
    assert!(matches!(err, Error::ShortRead(_)));
    assert!(!output.exists());
}

#[test]
fn test_refuses_same_file() {
    let original = minimal_wave(10);
    let input = write_temp(&original);
    let edits = vec![TagEdit::new("INAM", "x").unwrap()];
    let err = edit_file(input.path(), input.path(), &edits, EditOptions::default()).unwrap_err();
    assert!(matches!(err, Error::SameFile(_)));
    assert_eq!(fs::read(input.path()).unwrap(), original);
}
