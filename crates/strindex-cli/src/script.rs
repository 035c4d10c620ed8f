//! 编辑脚本（TOML）
//!
//! ```toml
//! [[edit]]
//! kind = "insert"
//! offset = 0
//! data = "hello\u0000"
//!
//! [[edit]]
//! kind = "erase"
//! offset = 2
//! length = 3
//! ```
use anyhow::Result;
use serde::Deserialize;
use std::path::Path;
use strindex_core::{BufferError, MemoryBuffer};

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub(crate) enum EditStep {
    Insert { offset: u64, data: String },
    Erase { offset: u64, length: u64 },
    Overwrite { offset: u64, data: String },
}

#[derive(Debug, Deserialize)]
struct EditScript {
    #[serde(default, rename = "edit")]
    edits: Vec<EditStep>,
}

impl EditStep {
    pub(crate) fn apply(&self, buffer: &MemoryBuffer) -> Result<(), BufferError> {
        match self {
            EditStep::Insert { offset, data } => buffer.insert(*offset, data.as_bytes()),
            EditStep::Erase { offset, length } => buffer.erase(*offset, *length),
            EditStep::Overwrite { offset, data } => buffer.overwrite(*offset, data.as_bytes()),
        }
    }
}

pub(crate) fn load(path: &Path) -> Result<Vec<EditStep>> {
    let txt = std::fs::read_to_string(path)?;
    parse(&txt)
}

fn parse(txt: &str) -> Result<Vec<EditStep>> {
    let parsed: EditScript = toml::from_str(txt)?;
    Ok(parsed.edits)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_all_kinds() {
        let steps = parse(
            r#"
            [[edit]]
            kind = "insert"
            offset = 0
            data = "ab\u0000"

            [[edit]]
            kind = "erase"
            offset = 1
            length = 2

            [[edit]]
            kind = "overwrite"
            offset = 0
            data = "z"
            "#,
        )
        .unwrap();
        assert_eq!(
            steps,
            vec![
                EditStep::Insert { offset: 0, data: "ab\0".into() },
                EditStep::Erase { offset: 1, length: 2 },
                EditStep::Overwrite { offset: 0, data: "z".into() },
            ]
        );
    }

    #[test]
    fn applies_to_buffer() {
        let buffer = MemoryBuffer::new(b"0123".to_vec());
        EditStep::Insert { offset: 4, data: "45".into() }.apply(&buffer).unwrap();
        EditStep::Erase { offset: 0, length: 1 }.apply(&buffer).unwrap();
        EditStep::Overwrite { offset: 0, data: "x".into() }.apply(&buffer).unwrap();
        assert_eq!(buffer.to_vec(), b"x2345");
        assert!(EditStep::Erase { offset: 9, length: 1 }.apply(&buffer).is_err());
    }

    #[test]
    fn empty_script_has_no_steps() {
        assert!(parse("").unwrap().is_empty());
    }
}
