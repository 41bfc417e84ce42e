#![forbid(unsafe_code)]

use std::str::FromStr;

use anyhow::anyhow;
use serde_json::{json, Value};
use trellis_protocol::{
    decode_thread_info, encode_thread_info, identify_thread_info, parse_any_thread_info,
    parse_thread_info_document, permission_registry_manifest, AnyThreadInfo, EncodeOptions,
    EncodingError, SchemaError, MAX_THREAD_INFO_BYTES,
};

pub const DEFAULT_MAX_INPUT_BYTES: usize = MAX_THREAD_INFO_BYTES;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CodecMode {
    /// Legacy thread info in, minimally encoded thread info out.
    #[default]
    Encode,
    Decode,
    /// Reports which record variant the input satisfies.
    Validate,
    /// Prints the embedded permission registry manifest. Ignores input.
    Manifest,
}

impl CodecMode {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Encode => "encode",
            Self::Decode => "decode",
            Self::Validate => "validate",
            Self::Manifest => "manifest",
        }
    }

    #[must_use]
    pub const fn reads_input(self) -> bool {
        !matches!(self, Self::Manifest)
    }
}

impl FromStr for CodecMode {
    type Err = anyhow::Error;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "encode" => Ok(Self::Encode),
            "decode" => Ok(Self::Decode),
            "validate" => Ok(Self::Validate),
            "manifest" => Ok(Self::Manifest),
            other => Err(anyhow!(
                "unknown mode {other:?}, expected encode, decode, validate or manifest"
            )),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CodecConfig {
    pub mode: CodecMode,
    pub encode_options: EncodeOptions,
    pub max_input_bytes: usize,
}

impl Default for CodecConfig {
    fn default() -> Self {
        Self {
            mode: CodecMode::default(),
            encode_options: EncodeOptions::default(),
            max_input_bytes: DEFAULT_MAX_INPUT_BYTES,
        }
    }
}

impl CodecConfig {
    /// # Errors
    /// Returns an error naming the variable when a `TRELLIS_*` value is
    /// invalid.
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Builds a config from any variable source. Unset variables keep their
    /// defaults.
    ///
    /// # Errors
    /// Returns an error naming the variable when a value is invalid.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> anyhow::Result<Self> {
        let defaults = Self::default();

        let mode = lookup("TRELLIS_MODE").map_or(Ok(defaults.mode), |value| {
            value
                .parse::<CodecMode>()
                .map_err(|e| anyhow!("invalid TRELLIS_MODE value {value:?}: {e}"))
        })?;
        let strip_member_permissions = lookup("TRELLIS_STRIP_MEMBER_PERMISSIONS").map_or(
            Ok(defaults.encode_options.strip_member_permissions),
            |value| {
                value.parse::<bool>().map_err(|e| {
                    anyhow!("invalid TRELLIS_STRIP_MEMBER_PERMISSIONS value {value:?}: {e}")
                })
            },
        )?;
        let max_input_bytes = lookup("TRELLIS_MAX_INPUT_BYTES").map_or(
            Ok(defaults.max_input_bytes),
            |value| {
                let bytes = value
                    .parse::<usize>()
                    .map_err(|e| anyhow!("invalid TRELLIS_MAX_INPUT_BYTES value {value:?}: {e}"))?;
                if bytes == 0 || bytes > MAX_THREAD_INFO_BYTES {
                    return Err(anyhow!(
                        "invalid TRELLIS_MAX_INPUT_BYTES value {value:?}: \
                         must be between 1 and {MAX_THREAD_INFO_BYTES}"
                    ));
                }
                Ok(bytes)
            },
        )?;

        Ok(Self {
            mode,
            encode_options: EncodeOptions {
                strip_member_permissions,
            },
            max_input_bytes,
        })
    }
}

/// Runs one codec pass over `input` and returns the JSON document to print.
///
/// # Errors
/// Returns an error when the input is oversized, is not a thread info of the
/// shape the mode expects, or carries codes that do not decode.
pub fn run(config: &CodecConfig, input: &[u8]) -> anyhow::Result<Value> {
    if config.mode == CodecMode::Manifest {
        return Ok(serde_json::to_value(permission_registry_manifest())?);
    }
    if input.len() > config.max_input_bytes {
        return Err(anyhow!(
            "input exceeds TRELLIS_MAX_INPUT_BYTES: max={} bytes actual={} bytes",
            config.max_input_bytes,
            input.len()
        ));
    }

    match config.mode {
        CodecMode::Encode => match parse_thread_info_document(input)? {
            AnyThreadInfo::Legacy(thread) => {
                let encoded = encode_thread_info(thread, &config.encode_options)?;
                tracing::info!(
                    event = "thread_info.encode",
                    thread_id = %encoded.id,
                    members = encoded.members.len()
                );
                Ok(serde_json::to_value(encoded)?)
            }
            AnyThreadInfo::MinimallyEncoded(_) => {
                Err(EncodingError::AlreadyMinimallyEncoded.into())
            }
        },
        CodecMode::Decode => match parse_thread_info_document(input)? {
            AnyThreadInfo::MinimallyEncoded(thread) => {
                let decoded = decode_thread_info(thread)?;
                tracing::info!(
                    event = "thread_info.decode",
                    thread_id = %decoded.id,
                    members = decoded.members.len()
                );
                Ok(serde_json::to_value(decoded)?)
            }
            AnyThreadInfo::Legacy(_) => {
                Err(EncodingError::Schema(SchemaError::MissingMarker).into())
            }
        },
        CodecMode::Validate => {
            let value: Value = serde_json::from_slice(input).map_err(SchemaError::from)?;
            let Some(variant) = identify_thread_info(&value) else {
                return Err(match parse_any_thread_info(&value) {
                    Err(error) => error.into(),
                    Ok(_) => anyhow!("document matches no thread info variant"),
                });
            };
            tracing::info!(event = "thread_info.validate", variant = variant.as_str());
            Ok(json!({ "variant": variant.as_str() }))
        }
        CodecMode::Manifest => Ok(serde_json::to_value(permission_registry_manifest())?),
    }
}

pub fn init_tracing() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));

    tracing_subscriber::fmt()
        .json()
        .with_env_filter(filter)
        .with_current_span(true)
        .with_span_list(true)
        .with_writer(std::io::stderr)
        .init();
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::{CodecConfig, CodecMode, DEFAULT_MAX_INPUT_BYTES};

    fn config_from(vars: &[(&str, &str)]) -> anyhow::Result<CodecConfig> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(name, value)| ((*name).to_owned(), (*value).to_owned()))
            .collect();
        CodecConfig::from_lookup(|name| vars.get(name).cloned())
    }

    #[test]
    fn unset_variables_keep_defaults() {
        let config = config_from(&[]).unwrap();
        assert_eq!(config, CodecConfig::default());
        assert_eq!(config.mode, CodecMode::Encode);
        assert!(!config.encode_options.strip_member_permissions);
        assert_eq!(config.max_input_bytes, DEFAULT_MAX_INPUT_BYTES);
    }

    #[test]
    fn variables_override_defaults() {
        let config = config_from(&[
            ("TRELLIS_MODE", "decode"),
            ("TRELLIS_STRIP_MEMBER_PERMISSIONS", "true"),
            ("TRELLIS_MAX_INPUT_BYTES", "1024"),
        ])
        .unwrap();
        assert_eq!(config.mode, CodecMode::Decode);
        assert!(config.encode_options.strip_member_permissions);
        assert_eq!(config.max_input_bytes, 1024);
    }

    #[test]
    fn invalid_values_name_the_variable() {
        for (name, value) in [
            ("TRELLIS_MODE", "transcode"),
            ("TRELLIS_STRIP_MEMBER_PERMISSIONS", "yes"),
            ("TRELLIS_MAX_INPUT_BYTES", "0"),
            ("TRELLIS_MAX_INPUT_BYTES", "lots"),
            ("TRELLIS_MAX_INPUT_BYTES", "999999999"),
        ] {
            let error = config_from(&[(name, value)]).unwrap_err();
            assert!(error.to_string().contains(name), "{error}");
        }
    }

    #[test]
    fn only_manifest_mode_ignores_input() {
        assert!(CodecMode::Encode.reads_input());
        assert!(CodecMode::Validate.reads_input());
        assert!(!CodecMode::Manifest.reads_input());
    }
}
