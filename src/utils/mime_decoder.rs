// Copyright (c) 2025 TexasFortress.AI
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use regex::Regex;

lazy_static::lazy_static! {
    static ref ENCODED_WORD_RE: Regex = Regex::new(
        r"=\?([^?\s]+)\?([BbQq])\?([^?\s]*)\?="
    ).expect("encoded-word pattern is valid");
}

/// Decode a raw envelope header value (subject, display name) to text.
///
/// Envelope strings arrive as bytes; invalid UTF-8 is replaced rather than
/// rejected so a listing never fails on one bad header.
pub fn decode_header_bytes(raw: &[u8]) -> String {
    decode_mime_header(&String::from_utf8_lossy(raw))
}

/// Decode RFC 2047 encoded words (`=?charset?B|Q?text?=`) in a header value.
///
/// Whitespace between two adjacent encoded words is dropped, as the RFC
/// requires; unknown charsets and malformed payloads are left verbatim.
pub fn decode_mime_header(input: &str) -> String {
    let mut result = String::with_capacity(input.len());
    let mut last_end = 0;
    let mut previous_was_encoded = false;

    for cap in ENCODED_WORD_RE.captures_iter(input) {
        let Some(whole) = cap.get(0) else { continue };
        let between = &input[last_end..whole.start()];

        match decode_word(&cap[1], &cap[2], &cap[3]) {
            Some(decoded) => {
                if !(previous_was_encoded && between.trim().is_empty()) {
                    result.push_str(between);
                }
                result.push_str(&decoded);
                previous_was_encoded = true;
            }
            None => {
                result.push_str(between);
                result.push_str(whole.as_str());
                previous_was_encoded = false;
            }
        }
        last_end = whole.end();
    }

    result.push_str(&input[last_end..]);
    result
}

fn decode_word(charset: &str, encoding: &str, text: &str) -> Option<String> {
    let bytes = match encoding {
        "B" | "b" => BASE64.decode(text).ok()?,
        _ => decode_q(text),
    };
    // RFC 2231 language suffix: "utf-8*en"
    let charset = charset.split('*').next().unwrap_or(charset).to_ascii_lowercase();
    match charset.as_str() {
        "utf-8" | "utf8" | "us-ascii" => String::from_utf8(bytes).ok(),
        "iso-8859-1" | "latin1" => Some(bytes.iter().map(|&b| b as char).collect()),
        _ => None,
    }
}

fn decode_q(text: &str) -> Vec<u8> {
    let bytes = text.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        match bytes[i] {
            b'_' => {
                out.push(b' ');
                i += 1;
            }
            b'=' if i + 2 < bytes.len() => {
                match (hex_value(bytes[i + 1]), hex_value(bytes[i + 2])) {
                    (Some(hi), Some(lo)) => {
                        out.push((hi << 4) | lo);
                        i += 3;
                    }
                    _ => {
                        out.push(b'=');
                        i += 1;
                    }
                }
            }
            other => {
                out.push(other);
                i += 1;
            }
        }
    }
    out
}

fn hex_value(b: u8) -> Option<u8> {
    (b as char).to_digit(16).map(|d| d as u8)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_q_encoding() {
        let input = "=?UTF-8?Q?We=E2=80=99re_Updating_our_Terms?=";
        assert_eq!(decode_mime_header(input), "We\u{2019}re Updating our Terms");
    }

    #[test]
    fn test_decode_b_encoding() {
        let input = "=?UTF-8?B?SGVsbG8gV29ybGQ=?=";
        assert_eq!(decode_mime_header(input), "Hello World");
    }

    #[test]
    fn test_plain_text_untouched() {
        assert_eq!(decode_mime_header("Quarterly report"), "Quarterly report");
    }

    #[test]
    fn test_adjacent_words_join_without_space() {
        let input = "=?UTF-8?Q?Caf=C3=A9?= =?UTF-8?Q?_cr=C3=A8me?=";
        assert_eq!(decode_mime_header(input), "Café crème");
    }

    #[test]
    fn test_mixed_encoded_and_plain() {
        let input = "Re: =?UTF-8?Q?Test=20Message?= from sender";
        assert_eq!(decode_mime_header(input), "Re: Test Message from sender");
    }

    #[test]
    fn test_latin1_charset() {
        assert_eq!(decode_mime_header("=?ISO-8859-1?Q?Gr=FC=DFe?="), "Grüße");
    }

    #[test]
    fn test_unknown_charset_left_verbatim() {
        let input = "=?x-unknown?B?SGVsbG8=?=";
        assert_eq!(decode_mime_header(input), input);
    }

    #[test]
    fn test_invalid_utf8_bytes_are_replaced() {
        let decoded = decode_header_bytes(b"Invoice \xff 2024");
        assert!(decoded.starts_with("Invoice "));
        assert!(decoded.ends_with(" 2024"));
    }
}
