//! Passphrase-based encryption for cached secrets.
//!
//! Keys are derived with PBKDF2-HMAC-SHA256 from an 8-byte random salt and
//! the data is sealed with AES-256-GCM under a 12-byte random IV. The output
//! is a self-describing `:`-separated envelope:
//!
//! | version | layout |
//! |---|---|
//! | 4 | `4:<encoding>:<iterations>:<salt>-<iv>-<ciphertext>` |
//! | 3 | `<encoding>:<iterations>:<salt>-<iv>-<ciphertext>` |
//! | 2 | `<encoding>:<salt>-<iv>-<ciphertext>` |
//! | 1 | `<salt>-<iv>-<ciphertext>` (hex) |
//!
//! The version is the number of colon-separated fields. Writers emit v4;
//! readers accept all four.

use std::fmt;
use std::str::FromStr;

use aes_gcm::Aes256Gcm;
use aes_gcm::Key;
use aes_gcm::Nonce;
use aes_gcm::aead::Aead;
use aes_gcm::aead::KeyInit;
use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use rand::Rng;
use sha2::Sha256;
use zeroize::Zeroizing;

pub const SALT_LEN: usize = 8;
pub const IV_LEN: usize = 12;
pub const KEY_LEN: usize = 32;

/// Iterations used for every newly written envelope.
pub const DEFAULT_ITERATIONS: u32 = 500_000;

/// Iterations implied by v1 and v2 envelopes, which do not record them.
pub const LEGACY_ITERATIONS: u32 = 50_000;

#[derive(Debug, thiserror::Error)]
pub enum CryptoError {
    #[error("malformed ciphertext: {0}")]
    Malformed(String),

    #[error("unable to decode {field}: {reason}")]
    Decode { field: &'static str, reason: String },

    #[error("invalid {field} length: expected {expected} bytes, got {actual}")]
    Length {
        field: &'static str,
        expected: usize,
        actual: usize,
    },

    /// Wrong passphrase or tampered ciphertext.
    #[error("unable to decrypt: authentication failed")]
    Authentication,

    #[error("unable to encrypt")]
    Encrypt,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Encoding {
    Base64,
    Hex,
}

impl Encoding {
    pub fn as_str(self) -> &'static str {
        match self {
            Encoding::Base64 => "base64",
            Encoding::Hex => "hex",
        }
    }

    fn encode(self, bytes: &[u8]) -> String {
        match self {
            Encoding::Base64 => BASE64.encode(bytes),
            Encoding::Hex => hex::encode(bytes),
        }
    }

    fn decode(self, field: &'static str, text: &str) -> Result<Vec<u8>, CryptoError> {
        let decoded = match self {
            Encoding::Base64 => BASE64.decode(text).map_err(|err| err.to_string()),
            Encoding::Hex => hex::decode(text).map_err(|err| err.to_string()),
        };
        decoded.map_err(|reason| CryptoError::Decode { field, reason })
    }
}

impl FromStr for Encoding {
    type Err = CryptoError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "base64" => Ok(Encoding::Base64),
            "hex" => Ok(Encoding::Hex),
            other => Err(CryptoError::Malformed(format!("unknown encoding {other}"))),
        }
    }
}

impl fmt::Display for Encoding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Envelope layout, see the module docs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnvelopeVersion {
    V1,
    V2,
    V3,
    V4,
}

/// Parameters for [`encrypt_with`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EncryptOptions {
    pub version: EnvelopeVersion,
    pub encoding: Encoding,
    /// Ignored for v1 and v2, which always use [`LEGACY_ITERATIONS`].
    pub iterations: u32,
}

impl Default for EncryptOptions {
    fn default() -> Self {
        Self {
            version: EnvelopeVersion::V4,
            encoding: Encoding::Base64,
            iterations: DEFAULT_ITERATIONS,
        }
    }
}

pub fn derive_key(passphrase: &str, salt: &[u8], iterations: u32) -> Zeroizing<[u8; KEY_LEN]> {
    let mut key = Zeroizing::new([0u8; KEY_LEN]);
    pbkdf2::pbkdf2_hmac::<Sha256>(passphrase.as_bytes(), salt, iterations, &mut key[..]);
    key
}

/// Encrypts `plaintext` into a v4 base64 envelope.
pub fn encrypt(passphrase: &str, plaintext: &[u8]) -> Result<String, CryptoError> {
    encrypt_with(passphrase, plaintext, EncryptOptions::default())
}

pub fn encrypt_with(
    passphrase: &str,
    plaintext: &[u8],
    options: EncryptOptions,
) -> Result<String, CryptoError> {
    let (encoding, iterations) = match options.version {
        EnvelopeVersion::V1 => (Encoding::Hex, LEGACY_ITERATIONS),
        EnvelopeVersion::V2 => (options.encoding, LEGACY_ITERATIONS),
        EnvelopeVersion::V3 | EnvelopeVersion::V4 => (options.encoding, options.iterations),
    };
    if iterations == 0 {
        return Err(CryptoError::Malformed("iteration count must be positive".to_string()));
    }

    let mut rng = rand::rng();
    let mut salt = [0u8; SALT_LEN];
    let mut iv = [0u8; IV_LEN];
    rng.fill(&mut salt[..]);
    rng.fill(&mut iv[..]);

    let key = derive_key(passphrase, &salt, iterations);
    let cipher = Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(&key[..]));
    let ciphertext = cipher
        .encrypt(Nonce::from_slice(&iv), plaintext)
        .map_err(|_| CryptoError::Encrypt)?;

    let payload = format!(
        "{}-{}-{}",
        encoding.encode(&salt),
        encoding.encode(&iv),
        encoding.encode(&ciphertext)
    );
    Ok(match options.version {
        EnvelopeVersion::V1 => payload,
        EnvelopeVersion::V2 => format!("{encoding}:{payload}"),
        EnvelopeVersion::V3 => format!("{encoding}:{iterations}:{payload}"),
        EnvelopeVersion::V4 => format!("4:{encoding}:{iterations}:{payload}"),
    })
}

/// Parsed header of an envelope.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Header<'a> {
    version: EnvelopeVersion,
    encoding: Encoding,
    iterations: u32,
    payload: &'a str,
}

fn parse_header(envelope: &str) -> Result<Header<'_>, CryptoError> {
    let fields: Vec<&str> = envelope.trim().split(':').collect();
    match fields[..] {
        [payload] => Ok(Header {
            version: EnvelopeVersion::V1,
            encoding: Encoding::Hex,
            iterations: LEGACY_ITERATIONS,
            payload,
        }),
        [encoding, payload] => Ok(Header {
            version: EnvelopeVersion::V2,
            encoding: encoding.parse()?,
            iterations: LEGACY_ITERATIONS,
            payload,
        }),
        [encoding, iterations, payload] => Ok(Header {
            version: EnvelopeVersion::V3,
            encoding: encoding.parse()?,
            iterations: parse_iterations(iterations)?,
            payload,
        }),
        [version, encoding, iterations, payload] => {
            if version != "4" {
                return Err(CryptoError::Malformed(format!("unsupported version {version}")));
            }
            Ok(Header {
                version: EnvelopeVersion::V4,
                encoding: encoding.parse()?,
                iterations: parse_iterations(iterations)?,
                payload,
            })
        }
        _ => Err(CryptoError::Malformed(format!(
            "unexpected number of fields ({})",
            fields.len()
        ))),
    }
}

fn parse_iterations(text: &str) -> Result<u32, CryptoError> {
    match text.parse::<u32>() {
        Ok(n) if n > 0 => Ok(n),
        _ => Err(CryptoError::Malformed(format!("invalid iteration count {text}"))),
    }
}

fn expect_len(field: &'static str, bytes: &[u8], expected: usize) -> Result<(), CryptoError> {
    if bytes.len() == expected {
        Ok(())
    } else {
        Err(CryptoError::Length {
            field,
            expected,
            actual: bytes.len(),
        })
    }
}

/// The envelope version of `envelope`, without decrypting it.
pub fn envelope_version(envelope: &str) -> Result<EnvelopeVersion, CryptoError> {
    parse_header(envelope).map(|header| header.version)
}

pub fn decrypt(passphrase: &str, envelope: &str) -> Result<Vec<u8>, CryptoError> {
    let header = parse_header(envelope)?;
    let parts: Vec<&str> = header.payload.split('-').collect();
    let [salt, iv, ciphertext] = parts.as_slice() else {
        return Err(CryptoError::Malformed(
            "expected <salt>-<iv>-<ciphertext>".to_string(),
        ));
    };

    let salt = header.encoding.decode("salt", salt)?;
    let iv = header.encoding.decode("iv", iv)?;
    let ciphertext = header.encoding.decode("ciphertext", ciphertext)?;
    expect_len("salt", &salt, SALT_LEN)?;
    expect_len("iv", &iv, IV_LEN)?;

    let key = derive_key(passphrase, &salt, header.iterations);
    let cipher = Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(&key[..]));
    cipher
        .decrypt(Nonce::from_slice(&iv), ciphertext.as_slice())
        .map_err(|_| CryptoError::Authentication)
}
