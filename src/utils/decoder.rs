//! Constructor argument decoder
//! Turns ABI + encoded constructor bytes into named, display-ready params

use alloy_dyn_abi::{DynSolType, DynSolValue};
use alloy_json_abi::JsonAbi;
use serde_json::Value;
use tracing::{debug, warn};

use crate::models::errors::{AppError, AppResult, ErrorCode};
use crate::models::types::DecodedParam;

/// Type-directed ABI decoding collaborator
pub trait AbiDecoder: Send + Sync {
    /// Decode `data` (hex, optional 0x) as the parameter list `types`
    fn decode(&self, types: &[String], data: &str) -> AppResult<Vec<DynSolValue>>;
}

/// Default decoder backed by alloy's dynamic ABI support
#[derive(Debug, Clone, Copy, Default)]
pub struct AlloyAbiDecoder;

impl AbiDecoder for AlloyAbiDecoder {
    fn decode(&self, types: &[String], data: &str) -> AppResult<Vec<DynSolValue>> {
        let resolved = types
            .iter()
            .map(|ty| {
                DynSolType::parse(ty)
                    .map_err(|e| decode_error(format!("Unknown type {}: {}", ty, e)))
            })
            .collect::<AppResult<Vec<_>>>()?;

        let bytes = hex::decode(data.trim().trim_start_matches("0x"))
            .map_err(|e| decode_error(format!("Constructor arguments are not hex: {}", e)))?;

        match DynSolType::Tuple(resolved).abi_decode_params(&bytes) {
            Ok(DynSolValue::Tuple(values)) => Ok(values),
            Ok(other) => Ok(vec![other]),
            Err(e) => Err(decode_error(format!("ABI decode failed: {}", e))),
        }
    }
}

fn decode_error(msg: String) -> AppError {
    AppError::new(ErrorCode::DecodeFailure, msg)
}

/// Constructor decoder
pub struct ConstructorDecoder<D: AbiDecoder = AlloyAbiDecoder> {
    abi_decoder: D,
}

impl ConstructorDecoder {
    /// Decoder backed by alloy's dynamic ABI support
    pub fn alloy() -> Self {
        Self::new(AlloyAbiDecoder)
    }
}

impl Default for ConstructorDecoder {
    fn default() -> Self {
        Self::alloy()
    }
}

impl<D: AbiDecoder> ConstructorDecoder<D> {
    pub fn new(abi_decoder: D) -> Self {
        Self { abi_decoder }
    }

    /// Decode constructor arguments.
    ///
    /// Returns None when there is nothing to decode (no constructor, no
    /// inputs, empty arguments) and when decoding fails; the caller then
    /// shows the raw hex instead.
    pub fn decode(&self, abi: &Value, encoded_args: Option<&str>) -> Option<Vec<DecodedParam>> {
        let encoded = encoded_args.map(str::trim).unwrap_or_default();
        if encoded.is_empty() || encoded == "0x" {
            return None;
        }

        match self.try_decode(abi, encoded) {
            Ok(params) => params,
            Err(e) => {
                warn!("⚠️ Error decoding constructor arguments: {}", e);
                None
            }
        }
    }

    fn try_decode(&self, abi: &Value, encoded: &str) -> AppResult<Option<Vec<DecodedParam>>> {
        let abi: JsonAbi = serde_json::from_value(abi.clone())
            .map_err(|e| decode_error(format!("Invalid ABI: {}", e)))?;

        let Some(constructor) = abi.constructor() else {
            debug!("ABI has no constructor");
            return Ok(None);
        };
        if constructor.inputs.is_empty() {
            return Ok(None);
        }

        let types: Vec<String> = constructor
            .inputs
            .iter()
            .map(|input| input.selector_type().into_owned())
            .collect();
        let values = self.abi_decoder.decode(&types, encoded)?;
        if values.len() != constructor.inputs.len() {
            return Err(decode_error(format!(
                "Decoded {} values for {} inputs",
                values.len(),
                constructor.inputs.len()
            )));
        }

        let params = constructor
            .inputs
            .iter()
            .zip(values.iter())
            .enumerate()
            .map(|(index, (input, value))| DecodedParam {
                name: if input.name.is_empty() {
                    format!("param{}", index)
                } else {
                    input.name.clone()
                },
                ty: input.ty.clone(),
                value: format_value(value),
            })
            .collect();

        Ok(Some(params))
    }
}

/// Display form of a decoded value
pub fn format_value(value: &DynSolValue) -> String {
    match value {
        DynSolValue::Array(items) | DynSolValue::FixedArray(items) | DynSolValue::Tuple(items) => {
            let inner: Vec<String> = items.iter().map(format_value).collect();
            format!("[{}]", inner.join(", "))
        }
        DynSolValue::Uint(v, _) => v.to_string(),
        DynSolValue::Int(v, _) => v.to_string(),
        DynSolValue::Address(addr) => addr.to_checksum(None),
        DynSolValue::FixedBytes(word, size) => format!("0x{}", hex::encode(&word[..*size])),
        DynSolValue::Bytes(bytes) => format!("0x{}", hex::encode(bytes)),
        DynSolValue::Function(f) => format!("0x{}", hex::encode(f.as_slice())),
        DynSolValue::String(s) => format!("\"{}\"", s),
        DynSolValue::Bool(b) => if *b { "true" } else { "false" }.to_string(),
        #[allow(unreachable_patterns)]
        other => format!("{:?}", other),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy_primitives::{Address, U256};
    use alloy_sol_types::SolValue;
    use serde_json::json;

    fn owner_amount_abi() -> Value {
        json!([
            {
                "type": "constructor",
                "stateMutability": "nonpayable",
                "inputs": [
                    { "name": "_owner", "type": "address", "internalType": "address" },
                    { "name": "_amount", "type": "uint256", "internalType": "uint256" }
                ]
            }
        ])
    }

    #[test]
    fn test_decode_address_and_uint() {
        let owner = Address::repeat_byte(0xAA);
        let encoded = hex::encode((owner, U256::from(42)).abi_encode_params());

        let params = ConstructorDecoder::alloy()
            .decode(&owner_amount_abi(), Some(&encoded))
            .unwrap();

        assert_eq!(params.len(), 2);
        assert_eq!(params[0].name, "_owner");
        assert_eq!(params[0].ty, "address");
        assert_eq!(params[0].value.to_lowercase(), format!("0x{}", "aa".repeat(20)));
        assert_eq!(params[1].name, "_amount");
        assert_eq!(params[1].ty, "uint256");
        assert_eq!(params[1].value, "42");
    }

    #[test]
    fn test_no_arguments_returns_none() {
        let decoder = ConstructorDecoder::alloy();
        assert!(decoder.decode(&owner_amount_abi(), None).is_none());
        assert!(decoder.decode(&owner_amount_abi(), Some("")).is_none());
        assert!(decoder.decode(&owner_amount_abi(), Some("0x")).is_none());
    }

    #[test]
    fn test_no_constructor_returns_none() {
        let abi = json!([{
            "type": "function",
            "name": "f",
            "inputs": [],
            "outputs": [],
            "stateMutability": "view"
        }]);
        assert!(ConstructorDecoder::alloy().decode(&abi, Some("0x00")).is_none());

        let abi = json!([{ "type": "constructor", "inputs": [], "stateMutability": "nonpayable" }]);
        assert!(ConstructorDecoder::alloy().decode(&abi, Some("0x00")).is_none());
    }

    #[test]
    fn test_malformed_bytes_return_none() {
        let decoder = ConstructorDecoder::alloy();
        assert!(decoder.decode(&owner_amount_abi(), Some("zz")).is_none());
        // Too short for (address, uint256)
        assert!(decoder.decode(&owner_amount_abi(), Some("0x01")).is_none());
    }

    #[test]
    fn test_unnamed_inputs_get_positional_names() {
        let abi = json!([{ "type": "constructor", "stateMutability": "nonpayable",
            "inputs": [{ "name": "", "type": "bool" }] }]);
        let encoded = hex::encode((true,).abi_encode_params());
        let params = ConstructorDecoder::alloy().decode(&abi, Some(&encoded)).unwrap();
        assert_eq!(params[0].name, "param0");
        assert_eq!(params[0].value, "true");
    }

    #[test]
    fn test_format_values() {
        assert_eq!(format_value(&DynSolValue::String("hi".into())), "\"hi\"");
        assert_eq!(format_value(&DynSolValue::Bool(false)), "false");
        assert_eq!(format_value(&DynSolValue::Bytes(vec![0xde, 0xad])), "0xdead");
        assert_eq!(
            format_value(&DynSolValue::Array(vec![
                DynSolValue::Uint(U256::from(1), 256),
                DynSolValue::Uint(U256::from(2), 256),
            ])),
            "[1, 2]"
        );
        assert_eq!(
            format_value(&DynSolValue::Array(vec![
                DynSolValue::Array(vec![DynSolValue::Bool(true)]),
                DynSolValue::Array(vec![]),
            ])),
            "[[true], []]"
        );
    }

    #[test]
    fn test_decode_string_array() {
        let abi = json!([{ "type": "constructor", "stateMutability": "nonpayable",
            "inputs": [{ "name": "names", "type": "string[]" }] }]);
        let names = vec!["a".to_string(), "b".to_string()];
        let encoded = hex::encode((names,).abi_encode_params());
        let params = ConstructorDecoder::alloy().decode(&abi, Some(&encoded)).unwrap();
        assert_eq!(params[0].ty, "string[]");
        assert_eq!(params[0].value, "[\"a\", \"b\"]");
    }
}
