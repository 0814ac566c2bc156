use std::time::Duration;

use bytes::{BufMut, BytesMut};

use crate::error::{Result, WireError};

/// Default maximum payload size: 1 MiB.
pub const DEFAULT_MAX_MESSAGE_SIZE: usize = 1024 * 1024;

/// Default bound on blocking reads and writes of a single message.
pub const DEFAULT_IO_TIMEOUT: Duration = Duration::from_secs(5);

/// Encode an argument list into the wire format.
///
/// Wire format: the UTF-8 JSON array of the arguments, in order.
/// ```text
/// ["--flag","value","päth with spaces"]
/// ```
/// The message ends where the sender closes its write side.
pub fn encode_args<S: AsRef<str>>(args: &[S], dst: &mut BytesMut) -> Result<()> {
    let args: Vec<&str> = args.iter().map(AsRef::as_ref).collect();
    serde_json::to_writer(dst.writer(), &args).map_err(WireError::Encode)
}

/// Decode a complete payload into an argument list.
///
/// Anything other than a JSON array of strings (including an empty payload
/// and `null`) is [`WireError::Malformed`].
pub fn decode_args(payload: &[u8]) -> Result<Vec<String>> {
    serde_json::from_slice(payload).map_err(WireError::Malformed)
}

/// Configuration for message readers and writers.
#[derive(Debug, Clone)]
pub struct WireConfig {
    /// Maximum payload size in bytes. Default: 1 MiB.
    pub max_message_size: usize,
    /// Read timeout for blocking operations. Default: 5 s.
    pub read_timeout: Option<Duration>,
    /// Write timeout for blocking operations. Default: 5 s.
    pub write_timeout: Option<Duration>,
}

impl Default for WireConfig {
    fn default() -> Self {
        Self {
            max_message_size: DEFAULT_MAX_MESSAGE_SIZE,
            read_timeout: Some(DEFAULT_IO_TIMEOUT),
            write_timeout: Some(DEFAULT_IO_TIMEOUT),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn roundtrip(args: &[&str]) -> Vec<String> {
        let mut buf = BytesMut::new();
        encode_args(args, &mut buf).unwrap();
        decode_args(&buf).unwrap()
    }

    #[test]
    fn encodes_as_json_array() {
        let mut buf = BytesMut::new();
        encode_args(&["--flag", "value"], &mut buf).unwrap();
        assert_eq!(buf.as_ref(), br#"["--flag","value"]"#);
    }

    #[test]
    fn empty_list_is_empty_array() {
        let mut buf = BytesMut::new();
        encode_args::<&str>(&[], &mut buf).unwrap();
        assert_eq!(buf.as_ref(), b"[]");
        assert!(decode_args(&buf).unwrap().is_empty());
    }

    #[test]
    fn preserves_json_significant_and_unicode_text() {
        let args = [
            r#"quote " and backslash \"#,
            "[not, an, array]",
            "{\"k\": 1}",
            "  leading and trailing  ",
            "tab\tnewline\n",
            "日本語 — ünïcödé 🚀",
            "",
        ];
        assert_eq!(roundtrip(&args), args);
    }

    #[test]
    fn accepts_whitespace_around_array() {
        let args = decode_args(b" \n[ \"a\" , \"b\" ]\r\n").unwrap();
        assert_eq!(args, ["a", "b"]);
    }

    #[test]
    fn rejects_non_array_payloads() {
        let payloads: [&[u8]; 7] = [b"", b"null", b"\"x\"", b"{}", b"[1,2]", b"[\"a\"", b"\xff\xfe"];
        for payload in payloads {
            let result = decode_args(payload);
            assert!(
                matches!(result, Err(WireError::Malformed(_))),
                "{payload:?} should be malformed"
            );
        }
    }

    #[test]
    fn default_config_values() {
        let config = WireConfig::default();
        assert_eq!(config.max_message_size, DEFAULT_MAX_MESSAGE_SIZE);
        assert_eq!(config.read_timeout, Some(DEFAULT_IO_TIMEOUT));
    }
}
