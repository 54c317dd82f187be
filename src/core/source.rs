//! Source Extractor
//!
//! Normalizes a `getsourcecode` record into a ContractSource. The
//! `SourceCode` field comes in several shapes; it is classified once into a
//! `SourcePayload` and handled exhaustively. Malformed JSON never aborts
//! extraction: the raw text is kept as a single file instead.

use serde::Deserialize;
use serde_json::{Map, Value};
use tracing::debug;

use crate::models::types::{ContractSource, SourceCacheStats, SourceFile};
use crate::utils::constants::ABI_NOT_VERIFIED;

/// Fields of one `getsourcecode` result record
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct RawContractRecord {
    #[serde(default)]
    pub source_code: String,
    #[serde(default, rename = "ABI")]
    pub abi: String,
    #[serde(default)]
    pub contract_name: String,
    #[serde(default)]
    pub compiler_version: String,
    #[serde(default)]
    pub constructor_arguments: String,
    #[serde(default)]
    pub implementation: String,
}

impl RawContractRecord {
    /// Parse from the JSON record, tolerating missing fields
    pub fn from_value(value: Value) -> Result<Self, serde_json::Error> {
        serde_json::from_value(value)
    }
}

/// Shape of the `SourceCode` field
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourcePayload {
    /// Empty string: not verified
    Unverified,
    /// Plain Solidity/Vyper text
    SingleFile(String),
    /// Standard-JSON input with a `sources` map
    MultiFileJson(Vec<SourceFile>),
    /// Looked like JSON but could not be unwrapped; kept verbatim
    UnwrappableFallback(String),
}

impl SourcePayload {
    /// Classify a raw `SourceCode` value
    pub fn parse(source_code: &str) -> Self {
        if source_code.is_empty() {
            return Self::Unverified;
        }

        if source_code.starts_with("{{") {
            // Double-wrapped standard JSON: strip one layer of braces
            let inner = source_code
                .get(1..source_code.len().saturating_sub(1))
                .unwrap_or_default();
            return match parse_sources_map(inner) {
                Some(files) => Self::MultiFileJson(files),
                None => {
                    debug!("Double-wrapped source could not be unwrapped, keeping as one file");
                    Self::UnwrappableFallback(source_code.to_string())
                }
            };
        }

        if source_code.starts_with('{') {
            return match parse_sources_map(source_code) {
                Some(files) => Self::MultiFileJson(files),
                None => Self::UnwrappableFallback(source_code.to_string()),
            };
        }

        Self::SingleFile(source_code.to_string())
    }

    /// Files for a contract named `contract_name`
    pub fn into_files(self, contract_name: &str) -> Vec<SourceFile> {
        match self {
            Self::Unverified => Vec::new(),
            Self::MultiFileJson(files) => files,
            Self::SingleFile(text) | Self::UnwrappableFallback(text) => {
                vec![SourceFile::new(single_file_name(contract_name), text)]
            }
        }
    }
}

/// `<ContractName>.sol`
fn single_file_name(contract_name: &str) -> String {
    format!("{}.sol", contract_name)
}

/// Parse `{ "sources": { path: { "content": ... } } }` preserving upstream order.
/// Returns None on parse failure, a missing/empty map, or no usable entries.
fn parse_sources_map(json: &str) -> Option<Vec<SourceFile>> {
    let parsed: Value = serde_json::from_str(json).ok()?;
    let sources: &Map<String, Value> = parsed.get("sources")?.as_object()?;

    let files: Vec<SourceFile> = sources
        .iter()
        .map(|(name, entry)| {
            let content = entry
                .get("content")
                .and_then(Value::as_str)
                .unwrap_or_default();
            SourceFile::new(name.clone(), content)
        })
        .collect();

    (!files.is_empty()).then_some(files)
}

/// Decode the `ABI` field; the unverified sentinel and bad JSON yield None
pub fn parse_abi(raw: &str) -> Option<Value> {
    let raw = raw.trim();
    if raw.is_empty() || raw == ABI_NOT_VERIFIED {
        return None;
    }
    match serde_json::from_str::<Value>(raw) {
        Ok(abi @ Value::Array(_)) => Some(abi),
        Ok(_) => None,
        Err(e) => {
            debug!("ABI is not valid JSON: {}", e);
            None
        }
    }
}

/// Normalize a record into a ContractSource with freshly-fetched stats
pub fn extract(address: &str, record: &RawContractRecord) -> ContractSource {
    let payload = SourcePayload::parse(&record.source_code);
    if payload == SourcePayload::Unverified {
        return ContractSource::unverified(address);
    }

    let files = payload.into_files(&record.contract_name);
    let constructor_arguments = Some(record.constructor_arguments.trim())
        .filter(|args| !args.is_empty())
        .map(String::from);

    ContractSource {
        address: address.to_string(),
        contract_name: record.contract_name.clone(),
        cache_stats: SourceCacheStats::fetched(files.len()),
        files,
        compiler_version: record.compiler_version.clone(),
        verified: true,
        constructor_arguments,
        abi: parse_abi(&record.abi),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(source_code: &str) -> RawContractRecord {
        RawContractRecord {
            source_code: source_code.to_string(),
            contract_name: "Token".to_string(),
            compiler_version: "v0.8.24+commit.e11b9ed9".to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn test_double_wrapped_json() {
        let source = extract(
            "0xabc",
            &record(r#"{{"language":"Solidity","sources":{"A.sol":{"content":"x"}}}}"#),
        );
        assert!(source.verified);
        assert_eq!(source.files, vec![SourceFile::new("A.sol", "x")]);
        assert_eq!(source.cache_stats, SourceCacheStats::fetched(1));
    }

    #[test]
    fn test_empty_source_is_unverified() {
        let source = extract("0xabc", &record(""));
        assert!(!source.verified);
        assert!(source.files.is_empty());
        assert!(source.compiler_version.is_empty());
    }

    #[test]
    fn test_plain_source_is_single_file() {
        let source = extract("0xabc", &record("pragma solidity ^0.8.0;\ncontract Token {}"));
        assert_eq!(source.files.len(), 1);
        assert_eq!(source.files[0].name, "Token.sol");
        assert!(source.files[0].content.starts_with("pragma"));
    }

    #[test]
    fn test_single_wrapped_with_sources() {
        let payload = r#"{"sources":{"src/B.sol":{"content":"b"},"src/A.sol":{"content":"a"}}}"#;
        let files = SourcePayload::parse(payload).into_files("X");
        // Upstream order is kept
        assert_eq!(files[0].name, "src/B.sol");
        assert_eq!(files[1].name, "src/A.sol");
    }

    #[test]
    fn test_single_wrapped_without_sources_falls_back() {
        let payload = r#"{"A.sol":{"content":"a"}}"#;
        let parsed = SourcePayload::parse(payload);
        assert_eq!(parsed, SourcePayload::UnwrappableFallback(payload.to_string()));
        let files = parsed.into_files("Token");
        assert_eq!(files, vec![SourceFile::new("Token.sol", payload)]);
    }

    #[test]
    fn test_malformed_double_wrapped_falls_back() {
        let payload = r#"{{"sources": {"A.sol": {"content": "x"}"#;
        let source = extract("0xabc", &record(payload));
        assert!(source.verified);
        assert_eq!(source.files.len(), 1);
        assert_eq!(source.files[0].content, payload);
    }

    #[test]
    fn test_brace_prefixed_plain_text() {
        let payload = "{ not json at all";
        assert_eq!(
            SourcePayload::parse(payload),
            SourcePayload::UnwrappableFallback(payload.to_string())
        );
    }

    #[test]
    fn test_abi_sentinel_and_garbage() {
        assert!(parse_abi("Contract source code not verified").is_none());
        assert!(parse_abi("[oops").is_none());
        assert!(parse_abi("").is_none());
        let abi = parse_abi(r#"[{"type":"constructor","inputs":[]}]"#).unwrap();
        assert!(abi.is_array());
    }

    #[test]
    fn test_constructor_arguments_carried_through() {
        let mut rec = record("contract A {}");
        rec.constructor_arguments = format!("{:064x}", 42);
        let source = extract("0xabc", &rec);
        assert_eq!(
            source.constructor_arguments.as_deref(),
            Some(rec.constructor_arguments.as_str())
        );

        rec.constructor_arguments = String::new();
        assert!(extract("0xabc", &rec).constructor_arguments.is_none());
    }

    #[test]
    fn test_record_from_upstream_json() {
        let value = serde_json::json!({
            "SourceCode": "contract A {}",
            "ABI": "Contract source code not verified",
            "ContractName": "A",
            "CompilerVersion": "v0.8.0",
            "ConstructorArguments": "",
            "Implementation": "0xdef",
            "Proxy": "1"
        });
        let rec = RawContractRecord::from_value(value).unwrap();
        assert_eq!(rec.contract_name, "A");
        assert_eq!(rec.implementation, "0xdef");
        assert_eq!(rec.abi, "Contract source code not verified");
    }
}
