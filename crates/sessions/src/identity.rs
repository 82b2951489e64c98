//! Identity decoding: recover the caller's identity from the encrypted
//! cookie issued by the student portal.
//!
//! The token format is fixed by the portal and must be reproduced byte for
//! byte: a URL-encoded, base64-encoded AES-128-ECB ciphertext whose key is a
//! short secret zero-padded to 16 bytes.  The plaintext carries a trailing
//! length byte that is stripped after decryption.
//!
//! ECB with a static key leaks plaintext patterns and offers no integrity;
//! the scheme is kept only for compatibility with existing cookies.

use std::fmt;

use aes::cipher::generic_array::GenericArray;
use aes::cipher::{BlockDecrypt, BlockEncrypt, KeyInit};
use aes::Aes128;
use base64::alphabet;
use base64::engine::general_purpose::{GeneralPurpose, STANDARD};
use base64::engine::{DecodePaddingMode, GeneralPurposeConfig};
use base64::Engine;
use percent_encoding::{percent_decode_str, utf8_percent_encode, AsciiSet, CONTROLS};

use tl_domain::config::IdentityConfig;
use tl_domain::error::{Error, Result};
use tl_domain::trace::{redact, TraceEvent};

const BLOCK_LEN: usize = 16;

/// Legacy secret used when neither `identity.key` nor `$key_env` is set.
const LEGACY_SECRET: &str = "key";

/// Standard alphabet, tolerant of non-canonical trailing bits and of
/// missing or extra padding.
const LENIENT_B64: GeneralPurpose = GeneralPurpose::new(
    &alphabet::STANDARD,
    GeneralPurposeConfig::new()
        .with_decode_allow_trailing_bits(true)
        .with_decode_padding_mode(DecodePaddingMode::Indifferent),
);

/// Characters escaped when issuing a cookie value.
const COOKIE_VALUE: &AsciiSet = &CONTROLS
    .add(b' ')
    .add(b'"')
    .add(b'%')
    .add(b'+')
    .add(b',')
    .add(b'/')
    .add(b';')
    .add(b'=');

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Identity
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Plaintext caller identifier recovered from the cookie.
///
/// `Debug` output is redacted so identities do not end up in logs.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct Identity(String);

impl Identity {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Identity").field(&redact(&self.0)).finish()
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Decoder
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Decodes (and, for tooling, issues) identity cookies.
#[derive(Clone)]
pub struct IdentityDecoder {
    cookie_name: String,
    cipher: Aes128,
}

impl fmt::Debug for IdentityDecoder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IdentityDecoder")
            .field("cookie_name", &self.cookie_name)
            .finish_non_exhaustive()
    }
}

impl IdentityDecoder {
    /// Build a decoder for `cookie_name`.  The secret is zero-padded or
    /// truncated to the 16-byte AES-128 key length.
    pub fn new(cookie_name: impl Into<String>, secret: &[u8]) -> Self {
        let mut key = [0u8; BLOCK_LEN];
        let n = secret.len().min(BLOCK_LEN);
        key[..n].copy_from_slice(&secret[..n]);

        Self {
            cookie_name: cookie_name.into(),
            cipher: Aes128::new(&GenericArray::from(key)),
        }
    }

    /// Build a decoder from config, resolving the secret once.
    pub fn from_config(cfg: &IdentityConfig) -> Self {
        let secret = match (&cfg.key, std::env::var(&cfg.key_env)) {
            (Some(key), _) => {
                tracing::warn!(
                    "identity key loaded from plaintext config field 'key'; \
                     prefer 'key_env' instead"
                );
                key.clone()
            }
            (None, Ok(key)) if !key.is_empty() => key,
            _ => {
                tracing::warn!(
                    env_var = %cfg.key_env,
                    "no identity key configured, falling back to the legacy default"
                );
                LEGACY_SECRET.to_owned()
            }
        };

        Self::new(cfg.cookie_name.clone(), secret.as_bytes())
    }

    pub fn cookie_name(&self) -> &str {
        &self.cookie_name
    }

    /// Decode the identity carried by a raw cookie header.
    ///
    /// * `MissingCredential`: no header, no cookie with the configured
    ///   name, or an empty value.
    /// * `InvalidIdentity`: any later step fails.
    pub fn decode(&self, cookie_header: Option<&str>) -> Result<Identity> {
        let header = cookie_header.ok_or(Error::MissingCredential)?;
        let raw = cookie_value(header, &self.cookie_name)
            .filter(|v| !v.is_empty())
            .ok_or(Error::MissingCredential)?;

        let unquoted = percent_decode_str(raw).decode_utf8_lossy();
        let padded = fix_base64_padding(&unquoted);

        let mut buf = LENIENT_B64.decode(padded.as_bytes()).map_err(|e| {
            tracing::debug!(error = %e, "identity cookie is not valid base64");
            Error::InvalidIdentity
        })?;

        if buf.is_empty() || buf.len() % BLOCK_LEN != 0 {
            tracing::debug!(len = buf.len(), "identity ciphertext is not block aligned");
            return Err(Error::InvalidIdentity);
        }

        for block in buf.chunks_exact_mut(BLOCK_LEN) {
            self.cipher.decrypt_block(GenericArray::from_mut_slice(block));
        }

        strip_trailing_pad(&mut buf);

        let identity = String::from_utf8(buf).map_err(|_| {
            tracing::debug!("decrypted identity is not valid UTF-8");
            Error::InvalidIdentity
        })?;
        if identity.is_empty() {
            return Err(Error::InvalidIdentity);
        }

        TraceEvent::IdentityDecoded {
            identity_prefix: redact(&identity),
            cookie_chars: raw.len(),
        }
        .emit();

        Ok(Identity(identity))
    }

    /// Produce the cookie value the portal would issue for `identity`
    /// (PKCS#7 padding, ECB encryption, base64, URL encoding).
    pub fn encode(&self, identity: &str) -> String {
        let mut buf = identity.as_bytes().to_vec();
        let pad = BLOCK_LEN - buf.len() % BLOCK_LEN;
        buf.resize(buf.len() + pad, pad as u8);

        for block in buf.chunks_exact_mut(BLOCK_LEN) {
            self.cipher.encrypt_block(GenericArray::from_mut_slice(block));
        }

        let b64 = STANDARD.encode(&buf);
        utf8_percent_encode(&b64, COOKIE_VALUE).to_string()
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Helpers
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Find `name` in a `k=v; k2=v2` cookie header.  Pairs are split on the
/// first `=`; pairs without one are ignored and the last duplicate wins.
pub fn cookie_value<'a>(header: &'a str, name: &str) -> Option<&'a str> {
    header
        .split(';')
        .filter_map(|pair| pair.trim().split_once('='))
        .filter(|(k, _)| *k == name)
        .map(|(_, v)| v)
        .last()
}

fn fix_base64_padding(value: &str) -> String {
    let mut out = value.to_owned();
    let missing = out.len() % 4;
    if missing != 0 {
        out.extend(std::iter::repeat('=').take(4 - missing));
    }
    out
}

/// Drop as many trailing bytes as the last byte says.  A zero or oversized
/// count empties the buffer.
fn strip_trailing_pad(buf: &mut Vec<u8>) {
    let Some(&last) = buf.last() else {
        return;
    };
    let n = last as usize;
    if n == 0 || n >= buf.len() {
        buf.clear();
    } else {
        buf.truncate(buf.len() - n);
    }
}
