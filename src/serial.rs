//! Binary serialization of compiled units.
//!
//! A blob holds one compiled unit together with every predefined type it
//! reaches, so it can be assembled again without recompiling the rules. The
//! format is a 32-byte fixed header followed by a bincode-encoded payload.
//!
//! ## Wire Format
//!
//! ```text
//! Offset  Size  Field
//! 0       4     Magic bytes: b"RGRD"
//! 4       2     Format version (u16, little-endian)
//! 6       2     Engine version (u16, little-endian)
//! 8       4     Flags (u32, reserved)
//! 12      4     Payload length in bytes (u32, little-endian)
//! 16      16    BLAKE3 hash of the payload (truncated to 16 bytes)
//! 32..    var   Bincode-encoded payload
//! ```
//!
//! ## Versioning
//!
//! The format version in the header must match exactly. If it does not,
//! deserialization fails immediately with [`DeserializeError::IncompatibleVersion`].
//! The engine version is informational only.
//!
//! Native predefined types are Rust closures and are never part of a blob;
//! they must be registered again on the loading engine.

use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::parse;
use crate::types::{CompiledUnit, Expr, Operand, TracePath, TraceSegment};

// ---------------------------------------------------------------------------
// Constants
// ---------------------------------------------------------------------------

const MAGIC: &[u8; 4] = b"RGRD";
const FORMAT_VERSION: u16 = 1;
const ENGINE_VERSION: u16 = 1;
const HEADER_SIZE: usize = 32;

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

/// Errors that can occur when serializing a compiled unit to bytes.
#[derive(Debug, Error)]
pub enum SerializeError {
    #[error("failed to encode compiled unit: {0}")]
    Encode(#[from] bincode::error::EncodeError),

    #[error("payload of {0} bytes exceeds the 4 GiB format limit")]
    TooLarge(usize),
}

/// Errors that can occur when deserializing a compiled unit from bytes.
#[derive(Debug, Error)]
pub enum DeserializeError {
    #[error("not a ruleguard binary: invalid magic bytes")]
    BadMagic,

    #[error("incompatible format version: blob is v{blob}, engine supports v{supported}")]
    IncompatibleVersion { blob: u16, supported: u16 },

    #[error("integrity check failed: BLAKE3 checksum mismatch")]
    ChecksumMismatch,

    #[error("payload length mismatch: expected {expected} bytes, got {actual}")]
    LengthMismatch { expected: u32, actual: usize },

    #[error("failed to decode payload: {0}")]
    Decode(#[from] bincode::error::DecodeError),

    #[error("validation failed: {0}")]
    Validation(String),
}

// ---------------------------------------------------------------------------
// Payload
// ---------------------------------------------------------------------------

/// A unit plus the predefined types it reaches.
#[derive(Debug, Serialize, Deserialize)]
pub(crate) struct Bundle {
    metadata: BundleMetadata,
    pub(crate) unit: CompiledUnit,
    pub(crate) types: Vec<(String, CompiledUnit)>,
}

#[derive(Debug, Serialize, Deserialize)]
struct BundleMetadata {
    type_count: usize,
    source_digest: Option<[u8; 32]>,
}

impl Bundle {
    pub(crate) fn new(
        unit: CompiledUnit,
        mut types: Vec<(String, CompiledUnit)>,
        source_text: Option<&str>,
    ) -> Self {
        // Sort for deterministic output
        types.sort_by(|(a, _), (b, _)| a.cmp(b));
        Self {
            metadata: BundleMetadata {
                type_count: types.len(),
                source_digest: source_text.map(|s| *blake3::hash(s.as_bytes()).as_bytes()),
            },
            unit,
            types,
        }
    }
}

impl Bundle {
    /// Give every bundled `$.dict` type a name from `fresh`, rewriting the
    /// calls to it. Private names are only unique within the compiler that
    /// produced them.
    pub(crate) fn rename_private_types(&mut self, mut fresh: impl FnMut() -> String) {
        let renames: HashMap<String, String> = self
            .types
            .iter()
            .filter(|(name, _)| is_private(name))
            .map(|(name, _)| (name.clone(), fresh()))
            .collect();
        if renames.is_empty() {
            return;
        }
        rename_unit(&mut self.unit, &renames);
        for (name, unit) in &mut self.types {
            if let Some(renamed) = renames.get(name) {
                name.clone_from(renamed);
            }
            rename_unit(unit, &renames);
        }
    }
}

fn is_private(name: &str) -> bool {
    name.strip_prefix("#dict")
        .is_some_and(|n| !n.is_empty() && n.bytes().all(|b| b.is_ascii_digit()))
}

fn rename_unit(unit: &mut CompiledUnit, renames: &HashMap<String, String>) {
    rename_calls(&mut unit.source, renames);
    for name in &mut unit.referred_types {
        if let Some(renamed) = renames.get(name) {
            name.clone_from(renamed);
        }
    }
    unit.referred_types.sort();
}

fn rename_calls(expr: &mut Expr, renames: &HashMap<String, String>) {
    match expr {
        Expr::Call { name, .. } => {
            if let Some(renamed) = renames.get(name) {
                name.clone_from(renamed);
            }
        }
        Expr::Not(inner) => rename_calls(inner, renames),
        Expr::And(items) | Expr::Or(items) => {
            for item in items {
                rename_calls(item, renames);
            }
        }
        Expr::ForEach { body, .. } | Expr::ForIn { body, .. } => rename_calls(body, renames),
        Expr::Switch { cases, default, .. } => {
            for (_, body) in cases {
                rename_calls(body, renames);
            }
            rename_calls(default, renames);
        }
        Expr::If {
            cond,
            then,
            otherwise,
        } => {
            rename_calls(cond, renames);
            rename_calls(then, renames);
            rename_calls(otherwise, renames);
        }
        Expr::Trace { cond, .. } => {
            if let Some(cond) = cond {
                rename_calls(cond, renames);
            }
        }
        Expr::Const(_)
        | Expr::Is(..)
        | Expr::Equals(..)
        | Expr::Compare(..)
        | Expr::MultipleOf(..)
        | Expr::Text(..)
        | Expr::Matches(..)
        | Expr::OnlyKeys(..) => {}
    }
}

// ---------------------------------------------------------------------------
// Validation
// ---------------------------------------------------------------------------

fn validate(bundle: &Bundle) -> Result<(), DeserializeError> {
    if bundle.metadata.type_count != bundle.types.len() {
        return Err(DeserializeError::Validation(format!(
            "metadata says {} types but payload has {}",
            bundle.metadata.type_count,
            bundle.types.len()
        )));
    }

    let mut seen = HashSet::new();
    for (name, _) in &bundle.types {
        if !is_private(name) && !parse::is_type_name(name) {
            return Err(DeserializeError::Validation(format!(
                "invalid predefined type name '{name}'"
            )));
        }
        if !seen.insert(name.as_str()) {
            return Err(DeserializeError::Validation(format!(
                "predefined type '{name}' appears twice"
            )));
        }
    }

    validate_expr(bundle.unit.source(), &mut Vec::new())?;
    for (_, unit) in &bundle.types {
        validate_expr(unit.source(), &mut Vec::new())?;
    }
    Ok(())
}

fn unbound(slot: usize) -> DeserializeError {
    DeserializeError::Validation(format!("loop slot {slot} used outside its loop"))
}

fn validate_operand(operand: &Operand, bound: &[usize]) -> Result<(), DeserializeError> {
    match operand {
        Operand::Entry => Ok(()),
        Operand::Var(slot) => {
            if bound.contains(slot) {
                Ok(())
            } else {
                Err(unbound(*slot))
            }
        }
        Operand::Field(of, _)
        | Operand::Index(of, _)
        | Operand::Slice { of, .. }
        | Operand::Length(of)
        | Operand::LowerCase(of)
        | Operand::ToNumber(of) => validate_operand(of, bound),
    }
}

fn validate_path(path: &TracePath, bound: &[usize]) -> Result<(), DeserializeError> {
    for segment in path.segments() {
        match segment {
            TraceSegment::Element { slot, .. } | TraceSegment::Key { slot }
                if !bound.contains(slot) =>
            {
                return Err(unbound(*slot));
            }
            _ => {}
        }
    }
    Ok(())
}

fn validate_expr(expr: &Expr, bound: &mut Vec<usize>) -> Result<(), DeserializeError> {
    match expr {
        Expr::Const(_) => Ok(()),
        Expr::Is(_, v)
        | Expr::Equals(v, _)
        | Expr::Compare(v, _, _)
        | Expr::MultipleOf(v, _)
        | Expr::Text(v, _, _)
        | Expr::Matches(v, _)
        | Expr::OnlyKeys(v, _) => validate_operand(v, bound),
        Expr::Not(inner) => validate_expr(inner, bound),
        Expr::And(items) | Expr::Or(items) => {
            for item in items {
                validate_expr(item, bound)?;
            }
            Ok(())
        }
        Expr::Call { subject, path, .. } => {
            validate_operand(subject, bound)?;
            path.as_ref().map_or(Ok(()), |p| validate_path(p, bound))
        }
        Expr::ForEach {
            subject,
            slot,
            body,
        }
        | Expr::ForIn {
            subject,
            slot,
            body,
        } => {
            validate_operand(subject, bound)?;
            bound.push(*slot);
            let result = validate_expr(body, bound);
            bound.pop();
            result
        }
        Expr::Switch {
            slot,
            cases,
            default,
        } => {
            if !bound.contains(slot) {
                return Err(unbound(*slot));
            }
            for (_, case) in cases {
                validate_expr(case, bound)?;
            }
            validate_expr(default, bound)
        }
        Expr::If {
            cond,
            then,
            otherwise,
        } => {
            validate_expr(cond, bound)?;
            validate_expr(then, bound)?;
            validate_expr(otherwise, bound)
        }
        Expr::Trace { cond, path } => {
            if let Some(cond) = cond {
                validate_expr(cond, bound)?;
            }
            validate_path(path, bound)
        }
    }
}

// ---------------------------------------------------------------------------
// Header I/O
// ---------------------------------------------------------------------------

fn write_header(buf: &mut Vec<u8>, payload: &[u8], payload_len: u32) {
    let hash = blake3::hash(payload);
    let hash_bytes = hash.as_bytes();

    buf.extend_from_slice(MAGIC);
    buf.extend_from_slice(&FORMAT_VERSION.to_le_bytes());
    buf.extend_from_slice(&ENGINE_VERSION.to_le_bytes());
    buf.extend_from_slice(&0u32.to_le_bytes()); // flags (reserved)
    buf.extend_from_slice(&payload_len.to_le_bytes());
    buf.extend_from_slice(&hash_bytes[..16]);
}

#[allow(clippy::cast_possible_truncation)] // HEADER_SIZE is 32, always fits in u32
fn read_header(bytes: &[u8]) -> Result<(u16, u32, [u8; 16]), DeserializeError> {
    if bytes.len() < HEADER_SIZE {
        return Err(DeserializeError::LengthMismatch {
            expected: HEADER_SIZE as u32,
            actual: bytes.len(),
        });
    }

    if &bytes[0..4] != MAGIC {
        return Err(DeserializeError::BadMagic);
    }

    let format_version = u16::from_le_bytes([bytes[4], bytes[5]]);
    // bytes[6..8] is engine_version (informational, not used for checks)
    // bytes[8..12] is flags (reserved)
    let payload_len = u32::from_le_bytes([bytes[12], bytes[13], bytes[14], bytes[15]]);

    let mut hash = [0u8; 16];
    hash.copy_from_slice(&bytes[16..32]);

    Ok((format_version, payload_len, hash))
}

// ---------------------------------------------------------------------------
// Public encode/decode
// ---------------------------------------------------------------------------

pub(crate) fn encode(bundle: &Bundle) -> Result<Vec<u8>, SerializeError> {
    let payload = bincode::serde::encode_to_vec(bundle, bincode::config::standard())?;
    let payload_len =
        u32::try_from(payload.len()).map_err(|_| SerializeError::TooLarge(payload.len()))?;

    let mut buf = Vec::with_capacity(HEADER_SIZE + payload.len());
    write_header(&mut buf, &payload, payload_len);
    buf.extend_from_slice(&payload);
    Ok(buf)
}

pub(crate) fn decode(bytes: &[u8]) -> Result<Bundle, DeserializeError> {
    let (format_version, payload_len, stored_hash) = read_header(bytes)?;

    if format_version != FORMAT_VERSION {
        return Err(DeserializeError::IncompatibleVersion {
            blob: format_version,
            supported: FORMAT_VERSION,
        });
    }

    let payload_start = HEADER_SIZE;
    let payload_end = payload_start + payload_len as usize;
    if bytes.len() < payload_end {
        return Err(DeserializeError::LengthMismatch {
            expected: payload_len,
            actual: bytes.len() - HEADER_SIZE,
        });
    }
    let payload = &bytes[payload_start..payload_end];

    // Integrity check
    let computed_hash = blake3::hash(payload);
    if computed_hash.as_bytes()[..16] != stored_hash {
        return Err(DeserializeError::ChecksumMismatch);
    }

    let (bundle, _): (Bundle, usize) =
        bincode::serde::decode_from_slice(payload, bincode::config::standard())?;

    validate(&bundle)?;
    Ok(bundle)
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Check;

    fn unit(source: Expr) -> CompiledUnit {
        CompiledUnit {
            source,
            entry_argument: "v".into(),
            type_table_argument: "types".into(),
            trace: None,
            referred_types: Vec::new(),
        }
    }

    fn is_string(v: Operand) -> Expr {
        Expr::Is(Check::String, v)
    }

    // -- Header round-trip --

    #[test]
    fn header_round_trip() {
        let payload = b"test payload data";
        let mut buf = Vec::new();
        write_header(&mut buf, payload, 17);
        assert_eq!(buf.len(), HEADER_SIZE);

        let (format_version, payload_len, hash) = read_header(&buf).unwrap();
        assert_eq!(format_version, FORMAT_VERSION);
        assert_eq!(payload_len as usize, payload.len());

        let expected_hash = blake3::hash(payload);
        assert_eq!(&hash, &expected_hash.as_bytes()[..16]);
    }

    #[test]
    fn header_bad_magic() {
        let mut buf = vec![0u8; HEADER_SIZE];
        buf[0..4].copy_from_slice(b"BAAD");
        assert!(matches!(read_header(&buf), Err(DeserializeError::BadMagic)));
    }

    #[test]
    fn header_too_short() {
        let buf = vec![0u8; 10];
        assert!(matches!(
            read_header(&buf),
            Err(DeserializeError::LengthMismatch { .. })
        ));
    }

    // -- Bundles --

    #[test]
    fn bundle_types_are_sorted() {
        let bundle = Bundle::new(
            unit(Expr::Const(true)),
            vec![
                ("b".into(), unit(Expr::Const(true))),
                ("a".into(), unit(Expr::Const(false))),
            ],
            Some("{}"),
        );
        assert_eq!(bundle.types[0].0, "a");
        assert_eq!(bundle.metadata.type_count, 2);
        assert!(bundle.metadata.source_digest.is_some());
    }

    #[test]
    fn decode_validates_payload() {
        let bundle = Bundle::new(
            unit(Expr::Const(true)),
            vec![("not a name".into(), unit(Expr::Const(true)))],
            None,
        );
        let bytes = encode(&bundle).unwrap();
        assert!(matches!(
            decode(&bytes),
            Err(DeserializeError::Validation(_))
        ));
    }

    // -- Validation --

    #[test]
    fn bound_slots_are_accepted() {
        let expr = Expr::ForEach {
            subject: Operand::Entry,
            slot: 0,
            body: Box::new(Expr::Trace {
                cond: Some(Box::new(is_string(Operand::Var(0)))),
                path: TracePath::new().child(TraceSegment::Element { slot: 0, offset: 0 }),
            }),
        };
        assert!(validate_expr(&expr, &mut Vec::new()).is_ok());
    }

    #[test]
    fn free_variable_rejected() {
        let expr = is_string(Operand::Var(3));
        let result = validate_expr(&expr, &mut Vec::new());
        assert!(matches!(result, Err(DeserializeError::Validation(_))));
    }

    #[test]
    fn switch_outside_loop_rejected() {
        let expr = Expr::Switch {
            slot: 0,
            cases: Vec::new(),
            default: Box::new(Expr::Const(true)),
        };
        let result = validate_expr(&expr, &mut Vec::new());
        assert!(matches!(result, Err(DeserializeError::Validation(_))));
    }

    #[test]
    fn free_trace_segment_rejected() {
        let expr = Expr::Trace {
            cond: None,
            path: TracePath::new().child(TraceSegment::Key { slot: 1 }),
        };
        let result = validate_expr(&expr, &mut Vec::new());
        assert!(matches!(result, Err(DeserializeError::Validation(_))));
    }

    #[test]
    fn private_dict_names_accepted() {
        let bundle = Bundle::new(
            unit(Expr::Const(true)),
            vec![("#dict0".into(), unit(Expr::Const(true)))],
            None,
        );
        assert!(validate(&bundle).is_ok());
    }
}
