//! In-process viewers for raw artifact bytes.

use std::fmt::Write as _;
use std::sync::Arc;

use crate::collab::Environment;
use crate::error::TransformerResult;
use crate::registry::TransformerRegistry;
use crate::settings::SettingDescriptor;
use crate::transformer::{Operation, Outcome, Transformer, TransformerBase};

/// Id of the hex dump viewer.
pub const HEX: &str = "hex";
/// Id of the text viewer.
pub const TEXT: &str = "text";

const MAX_BYTES_PER_ROW: i64 = 64;

const HEX_SETTINGS: &[SettingDescriptor] = &[
    SettingDescriptor::integer("bytes_per_row", "Bytes per row", 16),
    SettingDescriptor::boolean("uppercase", "Uppercase hex digits", false),
];

/// Renders bytes as an offset/hex/ASCII dump.
#[derive(Debug)]
pub struct HexViewer {
    base: TransformerBase,
}

impl HexViewer {
    pub fn new() -> TransformerResult<Self> {
        Ok(Self {
            base: TransformerBase::with_settings(HEX, "Hex", HEX_SETTINGS)?,
        })
    }

    fn bytes_per_row(&self) -> usize {
        self.settings()
            .get_integer("bytes_per_row")
            .unwrap_or(16)
            .clamp(1, MAX_BYTES_PER_ROW) as usize
    }

    /// Renders `bytes` with the current settings.
    pub fn render(&self, bytes: &[u8]) -> String {
        let uppercase = self.settings().get_bool("uppercase").unwrap_or(false);
        hex_dump(bytes, self.bytes_per_row(), uppercase)
    }
}

/// Formats `bytes` as rows of `offset  hex  |ascii|`.
pub fn hex_dump(bytes: &[u8], bytes_per_row: usize, uppercase: bool) -> String {
    let width = bytes_per_row.max(1);
    let mut out = String::new();
    for (row, chunk) in bytes.chunks(width).enumerate() {
        let _ = write!(out, "{:08x}  ", row * width);
        for i in 0..width {
            match chunk.get(i) {
                Some(b) if uppercase => {
                    let _ = write!(out, "{:02X} ", b);
                }
                Some(b) => {
                    let _ = write!(out, "{:02x} ", b);
                }
                None => out.push_str("   "),
            }
        }
        out.push_str(" |");
        out.extend(chunk.iter().map(|&b| {
            if b.is_ascii_graphic() || b == b' ' {
                b as char
            } else {
                '.'
            }
        }));
        out.push_str("|\n");
    }
    out
}

impl Transformer for HexViewer {
    fn base(&self) -> &TransformerBase {
        &self.base
    }

    fn is_applicable(&self, _classifying_name: &str) -> bool {
        true
    }

    fn transform(&self, operation: Operation) -> TransformerResult<Outcome> {
        match operation {
            Operation::View { bytes } => Ok(Outcome::Text(self.render(&bytes))),
            other => Err(self.unsupported(&other)),
        }
    }
}

/// Shows bytes as UTF-8, replacing invalid sequences.
#[derive(Debug)]
pub struct TextViewer {
    base: TransformerBase,
}

impl TextViewer {
    pub fn new() -> TransformerResult<Self> {
        Ok(Self {
            base: TransformerBase::new(TEXT, "Text")?,
        })
    }
}

impl Transformer for TextViewer {
    fn base(&self) -> &TransformerBase {
        &self.base
    }

    fn is_applicable(&self, _classifying_name: &str) -> bool {
        true
    }

    fn transform(&self, operation: Operation) -> TransformerResult<Outcome> {
        match operation {
            Operation::View { bytes } => {
                Ok(Outcome::Text(String::from_utf8_lossy(&bytes).into_owned()))
            }
            other => Err(self.unsupported(&other)),
        }
    }
}

/// Registers the hex and text viewers.
pub fn register_family(registry: &TransformerRegistry, _env: &Arc<Environment>) -> TransformerResult<()> {
    HexViewer::new()?.register_in(registry)?;
    TextViewer::new()?.register_in(registry)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::TransformerError;
    use crate::settings::SettingValue;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_hex_dump_layout() {
        let dump = hex_dump(b"\xca\xfe\xba\xbeHi!", 4, false);
        assert_eq!(
            dump,
            "00000000  ca fe ba be  |....|\n00000004  48 69 21     |Hi!|\n"
        );
    }

    #[test]
    fn test_hex_dump_empty() {
        assert_eq!(hex_dump(&[], 16, false), "");
    }

    #[test]
    fn test_hex_viewer_uses_settings() {
        let viewer = HexViewer::new().unwrap();
        assert!(viewer.has_settings());
        viewer
            .settings()
            .set("uppercase", SettingValue::Bool(true))
            .unwrap();
        viewer
            .settings()
            .set("bytes_per_row", SettingValue::Integer(2))
            .unwrap();

        let out = viewer
            .transform(Operation::View {
                bytes: vec![0xab, 0xcd, 0xef],
            })
            .unwrap();
        assert_eq!(
            out.as_text(),
            Some("00000000  AB CD  |..|\n00000002  EF     |.|\n")
        );
    }

    #[test]
    fn test_hex_viewer_clamps_row_width() {
        let viewer = HexViewer::new().unwrap();
        viewer
            .settings()
            .set("bytes_per_row", SettingValue::Integer(0))
            .unwrap();
        assert_eq!(viewer.bytes_per_row(), 1);
        viewer
            .settings()
            .set("bytes_per_row", SettingValue::Integer(10_000))
            .unwrap();
        assert_eq!(viewer.bytes_per_row(), 64);
    }

    #[test]
    fn test_text_viewer_is_lossy() {
        let viewer = TextViewer::new().unwrap();
        assert!(!viewer.has_settings());
        let out = viewer
            .transform(Operation::View {
                bytes: b"caf\xff".to_vec(),
            })
            .unwrap();
        assert_eq!(out.as_text(), Some("caf\u{fffd}"));
    }

    #[test]
    fn test_viewers_reject_conversion() {
        let viewer = TextViewer::new().unwrap();
        let err = viewer
            .transform(Operation::convert("a.dex", "a.jar"))
            .unwrap_err();
        assert!(matches!(err, TransformerError::UnsupportedOperation { .. }));
    }

    #[test]
    fn test_register_family() {
        let registry = TransformerRegistry::new();
        register_family(&registry, &Arc::new(Environment::default())).unwrap();
        assert_eq!(registry.len(), 2);
        assert!(registry.get_by_id(HEX).unwrap().is_applicable("anything"));
        assert!(registry.get_by_name("Text").is_some());
    }
}
