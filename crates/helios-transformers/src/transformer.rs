//! The transformer abstraction.
//!
//! A transformer is a uniquely identified stage that inspects or converts a
//! binary artifact. Concrete families implement [`Transformer`] on a struct
//! holding a [`TransformerBase`], then move the value into a registry with
//! [`Transformer::register`] or [`Transformer::register_in`].

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::collab::BytecodeNormalizer;
use crate::converter::ConversionStatus;
use crate::error::{TransformerError, TransformerResult};
use crate::identity::{validate_id, validate_name};
use crate::process::InvokeOptions;
use crate::registry::{self, TransformerRef, TransformerRegistry};
use crate::settings::{SettingDescriptor, TransformerSettings};

/// Classification of a transformer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransformerType {
    Decompiler,
    Disassembler,
    Compiler,
    Assembler,
    Custom,
    Other,
}

impl TransformerType {
    /// Every type, in declaration order.
    pub const ALL: [TransformerType; 6] = [
        TransformerType::Decompiler,
        TransformerType::Disassembler,
        TransformerType::Compiler,
        TransformerType::Assembler,
        TransformerType::Custom,
        TransformerType::Other,
    ];

    /// Returns the string identifier for this type.
    pub fn as_str(&self) -> &'static str {
        match self {
            TransformerType::Decompiler => "decompiler",
            TransformerType::Disassembler => "disassembler",
            TransformerType::Compiler => "compiler",
            TransformerType::Assembler => "assembler",
            TransformerType::Custom => "custom",
            TransformerType::Other => "other",
        }
    }
}

impl fmt::Display for TransformerType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TransformerType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        TransformerType::ALL
            .into_iter()
            .find(|t| t.as_str() == s)
            .ok_or_else(|| format!("unknown transformer type '{}'", s))
    }
}

/// Identity and settings shared by every transformer.
///
/// Construction validates the id and name and loads the settings
/// descriptors; a value that exists is always well-formed.
#[derive(Debug)]
pub struct TransformerBase {
    id: String,
    name: String,
    settings: TransformerSettings,
}

impl TransformerBase {
    /// Creates a base with no settings.
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> TransformerResult<Self> {
        Self::with_settings(id, name, &[])
    }

    /// Creates a base whose settings store is populated from `descriptors`.
    pub fn with_settings(
        id: impl Into<String>,
        name: impl Into<String>,
        descriptors: &[SettingDescriptor],
    ) -> TransformerResult<Self> {
        let id = id.into();
        let name = name.into();
        validate_id(&id)?;
        validate_name(&name)?;
        let settings = TransformerSettings::from_descriptors(descriptors)?;
        Ok(Self { id, name, settings })
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn settings(&self) -> &TransformerSettings {
        &self.settings
    }
}

/// A request to a transformer. Each family accepts the variants that make
/// sense for it and rejects the rest with
/// [`TransformerError::UnsupportedOperation`].
#[derive(Debug, Clone)]
pub enum Operation {
    /// Render raw bytes for display.
    View { bytes: Vec<u8> },
    /// Produce source for one class.
    Decompile { class_name: String, bytes: Vec<u8> },
    /// Produce a textual bytecode listing for one class.
    Disassemble { class_name: String, bytes: Vec<u8> },
    /// Compile source to bytecode.
    Compile { source_name: String, source: String },
    /// Assemble a textual listing to bytecode.
    Assemble { source_name: String, source: String },
    /// Turn the artifact at `input` into a new artifact at `output`.
    Convert {
        input: PathBuf,
        output: PathBuf,
        options: InvokeOptions,
    },
}

impl Operation {
    /// Creates a convert operation with default options.
    pub fn convert(input: impl Into<PathBuf>, output: impl Into<PathBuf>) -> Self {
        Operation::Convert {
            input: input.into(),
            output: output.into(),
            options: InvokeOptions::default(),
        }
    }

    /// Short name of the variant, for errors and logs.
    pub fn kind(&self) -> &'static str {
        match self {
            Operation::View { .. } => "view",
            Operation::Decompile { .. } => "decompile",
            Operation::Disassemble { .. } => "disassemble",
            Operation::Compile { .. } => "compile",
            Operation::Assemble { .. } => "assemble",
            Operation::Convert { .. } => "convert",
        }
    }
}

/// What a transformer produced.
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    Text(String),
    Bytes(Vec<u8>),
    Converted(ConversionStatus),
}

impl Outcome {
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Outcome::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            Outcome::Bytes(b) => Some(b),
            _ => None,
        }
    }

    pub fn conversion_status(&self) -> Option<&ConversionStatus> {
        match self {
            Outcome::Converted(status) => Some(status),
            _ => None,
        }
    }
}

/// A pluggable transformation stage.
///
/// Implementations must be singletons: register each value once and share
/// it through the registry afterwards.
pub trait Transformer: Send + Sync + 'static {
    /// Identity and settings.
    fn base(&self) -> &TransformerBase;

    fn id(&self) -> &str {
        self.base().id()
    }

    fn name(&self) -> &str {
        self.base().name()
    }

    fn settings(&self) -> &TransformerSettings {
        self.base().settings()
    }

    /// Returns true if at least one setting is declared.
    fn has_settings(&self) -> bool {
        self.settings().size() > 0
    }

    fn transformer_type(&self) -> TransformerType {
        TransformerType::Other
    }

    /// Decides whether this transformer can act on an artifact identified by
    /// `classifying_name` (a file name or internal class name). Must be pure.
    fn is_applicable(&self, classifying_name: &str) -> bool;

    /// Runs the transformation.
    fn transform(&self, operation: Operation) -> TransformerResult<Outcome>;

    /// Builds the error for an operation this transformer does not accept.
    fn unsupported(&self, operation: &Operation) -> TransformerError {
        TransformerError::UnsupportedOperation {
            transformer: self.id().to_string(),
            operation: operation.kind(),
        }
    }

    /// Rewrites `bytes` through `normalizer`, recomputing frames and maxima.
    fn fix_bytes(
        &self,
        normalizer: &dyn BytecodeNormalizer,
        bytes: &[u8],
    ) -> TransformerResult<Vec<u8>> {
        normalizer
            .normalize(bytes)
            .map_err(|e| TransformerError::transformation_failed(self.id(), e))
    }

    /// Moves this transformer into the process-wide registry.
    ///
    /// Family factories must use [`register_in`](Self::register_in) with the
    /// registry they are handed. Calling this while
    /// [`registry::global`](crate::registry::global) is still building the
    /// registry re-enters its initialization.
    fn register(self) -> TransformerResult<TransformerRef>
    where
        Self: Sized,
    {
        self.register_in(registry::global())
    }

    /// Moves this transformer into `registry`.
    ///
    /// Fails with [`TransformerError::DuplicateIdentifier`] or
    /// [`TransformerError::DuplicateName`], leaving the registry unchanged.
    fn register_in(self, registry: &TransformerRegistry) -> TransformerResult<TransformerRef>
    where
        Self: Sized,
    {
        registry.insert(Arc::new(self))
    }
}

/// Returns true if `a` and `b` are the same transformer value.
pub fn same_instance(a: &Arc<dyn Transformer>, b: &Arc<dyn Transformer>) -> bool {
    std::ptr::addr_eq(Arc::as_ptr(a), Arc::as_ptr(b))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::NormalizeError;
    use crate::settings::SettingValue;

    struct Upper {
        base: TransformerBase,
    }

    impl Transformer for Upper {
        fn base(&self) -> &TransformerBase {
            &self.base
        }

        fn transformer_type(&self) -> TransformerType {
            TransformerType::Disassembler
        }

        fn is_applicable(&self, classifying_name: &str) -> bool {
            classifying_name.ends_with(".class")
        }

        fn transform(&self, operation: Operation) -> TransformerResult<Outcome> {
            match operation {
                Operation::Disassemble { class_name, .. } => {
                    Ok(Outcome::Text(class_name.to_uppercase()))
                }
                other => Err(self.unsupported(&other)),
            }
        }
    }

    struct RejectAll;

    impl BytecodeNormalizer for RejectAll {
        fn normalize(&self, _bytes: &[u8]) -> Result<Vec<u8>, NormalizeError> {
            Err(NormalizeError::new("truncated constant pool"))
        }
    }

    struct Reverse;

    impl BytecodeNormalizer for Reverse {
        fn normalize(&self, bytes: &[u8]) -> Result<Vec<u8>, NormalizeError> {
            Ok(bytes.iter().rev().copied().collect())
        }
    }

    fn upper() -> Upper {
        Upper {
            base: TransformerBase::new("upper", "Upper").unwrap(),
        }
    }

    #[test]
    fn test_type_ids() {
        assert_eq!(TransformerType::Decompiler.as_str(), "decompiler");
        assert_eq!(TransformerType::Other.to_string(), "other");
        for ty in TransformerType::ALL {
            assert_eq!(ty.as_str().parse::<TransformerType>().unwrap(), ty);
        }
        assert!("viewer".parse::<TransformerType>().is_err());
        assert_eq!(
            serde_json::to_string(&TransformerType::Assembler).unwrap(),
            "\"assembler\""
        );
    }

    #[test]
    fn test_base_validates_identity() {
        assert!(TransformerBase::new("procyon", "Procyon").is_ok());
        assert!(matches!(
            TransformerBase::new("Procyon", "Procyon"),
            Err(TransformerError::InvalidIdentifier { .. })
        ));
        assert!(matches!(
            TransformerBase::new("procyon", ""),
            Err(TransformerError::InvalidIdentifier { .. })
        ));
    }

    #[test]
    fn test_base_rejects_bad_settings() {
        let bad = [SettingDescriptor::choice("mode", "Mode", &[], "")];
        assert!(matches!(
            TransformerBase::with_settings("cfr", "CFR", &bad),
            Err(TransformerError::UnsupportedConfiguration { .. })
        ));
    }

    #[test]
    fn test_accessors_and_defaults() {
        let t = upper();
        assert_eq!(t.id(), "upper");
        assert_eq!(t.name(), "Upper");
        assert!(!t.has_settings());
        assert_eq!(t.transformer_type(), TransformerType::Disassembler);
        assert!(t.is_applicable("Foo.class"));
        assert!(!t.is_applicable("Foo.dex"));
    }

    #[test]
    fn test_has_settings_with_descriptor() {
        let base = TransformerBase::with_settings(
            "cfr",
            "CFR",
            &[SettingDescriptor::boolean("decodeenums", "Decode enums", true)],
        )
        .unwrap();
        assert_eq!(base.settings().size(), 1);
        base.settings()
            .set("decodeenums", SettingValue::Bool(false))
            .unwrap();
        assert_eq!(base.settings().get_bool("decodeenums"), Some(false));
    }

    #[test]
    fn test_dispatch_by_operation() {
        let t = upper();
        let out = t
            .transform(Operation::Disassemble {
                class_name: "java/lang/Object".to_string(),
                bytes: vec![],
            })
            .unwrap();
        assert_eq!(out.as_text(), Some("JAVA/LANG/OBJECT"));

        let err = t
            .transform(Operation::Compile {
                source_name: "A.java".to_string(),
                source: String::new(),
            })
            .unwrap_err();
        assert!(err.to_string().contains("compile"));
        assert_eq!(err.code(), "HELIOS_007");
    }

    #[test]
    fn test_fix_bytes_delegates() {
        let t = upper();
        assert_eq!(t.fix_bytes(&Reverse, &[1, 2, 3]).unwrap(), vec![3, 2, 1]);

        let err = t.fix_bytes(&RejectAll, &[0xca, 0xfe]).unwrap_err();
        assert!(matches!(err, TransformerError::TransformationFailed { .. }));
        assert!(err.to_string().contains("truncated constant pool"));
    }

    #[test]
    fn test_same_instance() {
        let a: Arc<dyn Transformer> = Arc::new(upper());
        let b: Arc<dyn Transformer> = Arc::new(upper());
        assert!(same_instance(&a, &a.clone()));
        assert!(!same_instance(&a, &b));
    }

    #[test]
    fn test_operation_kind() {
        assert_eq!(Operation::convert("a.apk", "a.jar").kind(), "convert");
        assert_eq!(Operation::View { bytes: vec![] }.kind(), "view");
    }
}
