/*!
 * SHA-256 integrity checksums for translation records.
 *
 * A checksum is computed over one of two fixed field sets. The fields are
 * rendered as a Python dict literal before hashing so that digests match the
 * ones produced by existing dashboard and provider clients.
 */

use sha2::{Digest, Sha256};
use std::fmt::{self, Write};

use crate::errors::ChecksumError;

/// Length of a SHA-256 digest in bytes
pub const CHECKSUM_LEN: usize = 32;

/// The field sets a checksum can cover
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChecksumFields<'a> {
    /// First-pass provider output: text and article id
    FirstPass {
        /// Translated body text
        text: Option<&'a str>,
        /// Article id
        id: i64,
    },
    /// Reviewed translation: article id, title and text
    Final {
        /// Article id
        id: i64,
        /// Edited title
        title: Option<&'a str>,
        /// Edited body text
        text: Option<&'a str>,
    },
}

impl ChecksumFields<'_> {
    /// Render the field set in its canonical form
    pub fn canonical(&self) -> String {
        let mut out = String::from("{");
        match *self {
            ChecksumFields::FirstPass { text, id } => {
                push_entry(&mut out, "text", PyValue::from(text));
                out.push_str(", ");
                push_entry(&mut out, "id", PyValue::Int(id));
            }
            ChecksumFields::Final { id, title, text } => {
                push_entry(&mut out, "id", PyValue::Int(id));
                out.push_str(", ");
                push_entry(&mut out, "title", PyValue::from(title));
                out.push_str(", ");
                push_entry(&mut out, "text", PyValue::from(text));
            }
        }
        out.push('}');
        out
    }
}

enum PyValue<'a> {
    Int(i64),
    Str(&'a str),
    None,
}

impl<'a> From<Option<&'a str>> for PyValue<'a> {
    fn from(value: Option<&'a str>) -> Self {
        value.map_or(PyValue::None, PyValue::Str)
    }
}

fn push_entry(out: &mut String, key: &str, value: PyValue<'_>) {
    push_repr_str(out, key);
    out.push_str(": ");
    match value {
        PyValue::Int(n) => {
            let _ = write!(out, "{}", n);
        }
        PyValue::Str(s) => push_repr_str(out, s),
        PyValue::None => out.push_str("None"),
    }
}

/// Append a string literal using Python's repr quoting rules
fn push_repr_str(out: &mut String, s: &str) {
    let quote = if s.contains('\'') && !s.contains('"') { '"' } else { '\'' };

    out.push(quote);
    for c in s.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '\t' => out.push_str("\\t"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            c if c == quote => {
                out.push('\\');
                out.push(c);
            }
            c if c == ' ' || (c.is_ascii() && !c.is_ascii_control()) => out.push(c),
            c if is_printable(c) => out.push(c),
            c => {
                let code = c as u32;
                let _ = if code < 0x100 {
                    write!(out, "\\x{:02x}", code)
                } else if code < 0x10000 {
                    write!(out, "\\u{:04x}", code)
                } else {
                    write!(out, "\\U{:08x}", code)
                };
            }
        }
    }
    out.push(quote);
}

/// Approximation of `str.isprintable` for a single non-ASCII character
fn is_printable(c: char) -> bool {
    if c.is_control() || c.is_whitespace() {
        return false;
    }
    let code = c as u32;
    let format_or_private = matches!(
        code,
        0x00AD
            | 0x0600..=0x0605
            | 0x061C
            | 0x06DD
            | 0x070F
            | 0x180E
            | 0x200B..=0x200F
            | 0x202A..=0x202E
            | 0x2060..=0x2064
            | 0x2066..=0x206F
            | 0xFEFF
            | 0xFFF9..=0xFFFB
            | 0xE000..=0xF8FF
            | 0xE0001
            | 0xE0020..=0xE007F
            | 0xF0000..
    );
    !format_or_private
}

/// A SHA-256 digest over a [`ChecksumFields`] rendering
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Checksum([u8; CHECKSUM_LEN]);

impl Checksum {
    /// Compute the checksum of a field set
    pub fn compute(fields: &ChecksumFields<'_>) -> Self {
        let digest = Sha256::digest(fields.canonical().as_bytes());
        let mut bytes = [0u8; CHECKSUM_LEN];
        bytes.copy_from_slice(&digest);
        Self(bytes)
    }

    /// Wrap raw digest bytes read from storage
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, ChecksumError> {
        let array: [u8; CHECKSUM_LEN] = bytes
            .try_into()
            .map_err(|_| ChecksumError::Malformed(format!("expected {} bytes, got {}", CHECKSUM_LEN, bytes.len())))?;
        Ok(Self(array))
    }

    /// Parse a 64 character hex digest
    pub fn from_hex(hex: &str) -> Result<Self, ChecksumError> {
        let hex = hex.trim();
        if hex.len() != CHECKSUM_LEN * 2 || !hex.is_ascii() {
            return Err(ChecksumError::Malformed(hex.to_string()));
        }

        let mut bytes = [0u8; CHECKSUM_LEN];
        for (i, byte) in bytes.iter_mut().enumerate() {
            *byte = u8::from_str_radix(&hex[i * 2..i * 2 + 2], 16)
                .map_err(|_| ChecksumError::Malformed(hex.to_string()))?;
        }
        Ok(Self(bytes))
    }

    /// Raw digest bytes
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// Lowercase hex rendering
    pub fn to_hex(&self) -> String {
        self.0.iter().fold(String::with_capacity(CHECKSUM_LEN * 2), |mut acc, b| {
            let _ = write!(acc, "{:02x}", b);
            acc
        })
    }

    /// Recompute the checksum of `fields` and compare it with a claimed hex digest
    pub fn verify(fields: &ChecksumFields<'_>, claimed: &str) -> Result<Self, ChecksumError> {
        let computed = Self::compute(fields);
        let claimed_sum = Self::from_hex(claimed)?;

        if claimed_sum != computed {
            return Err(ChecksumError::Mismatch {
                claimed: claimed.trim().to_lowercase(),
                computed: computed.to_hex(),
            });
        }
        Ok(computed)
    }
}

impl fmt::Display for Checksum {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}
