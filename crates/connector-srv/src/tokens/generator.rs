//! Token generation via `ring::rand`.

use connector_core::{ConnectorError, Result};
use ring::rand::{SecureRandom, SystemRandom};

/// Default token length (characters).
pub const DEFAULT_TOKEN_LENGTH: usize = 64;

/// Default token alphabet: URL-safe alphanumerics.
pub const DEFAULT_ALPHABET: &str =
    "ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789";

/// Random bytes drawn per CSPRNG call.
const BATCH: usize = 64;

/// Produces unpredictable token strings.
#[derive(Debug, Clone)]
pub struct TokenGenerator {
    rng: SystemRandom,
    alphabet: Vec<u8>,
    length: usize,
    /// Bytes at or above this value are rejected to keep symbols uniform.
    limit: usize,
}

impl TokenGenerator {
    /// Create a generator for `length` characters drawn from `alphabet`.
    ///
    /// The alphabet must be distinct ASCII characters.
    pub fn new(length: usize, alphabet: &str) -> Result<Self> {
        if length == 0 {
            return Err(ConnectorError::Config("token length must be positive".into()));
        }
        if alphabet.is_empty() || !alphabet.is_ascii() {
            return Err(ConnectorError::Config(
                "token alphabet must be non-empty ASCII".into(),
            ));
        }
        let mut symbols = alphabet.as_bytes().to_vec();
        symbols.sort_unstable();
        symbols.dedup();
        if symbols.len() != alphabet.len() {
            return Err(ConnectorError::Config(
                "token alphabet must not repeat characters".into(),
            ));
        }

        Ok(Self::build(length, alphabet))
    }

    /// Generator with the default length and alphabet.
    #[must_use]
    pub fn with_defaults() -> Self {
        Self::build(DEFAULT_TOKEN_LENGTH, DEFAULT_ALPHABET)
    }

    // Callers have checked `alphabet` is non-empty, distinct ASCII.
    fn build(length: usize, alphabet: &str) -> Self {
        Self {
            rng: SystemRandom::new(),
            alphabet: alphabet.as_bytes().to_vec(),
            length,
            limit: 256 - (256 % alphabet.len()),
        }
    }

    /// Token length in characters.
    pub const fn length(&self) -> usize {
        self.length
    }

    /// Generate a fresh token.
    ///
    /// A failing random source is a [`ConnectorError::TokenGeneration`];
    /// it is never retried here.
    pub fn new_token(&self) -> Result<String> {
        let n = self.alphabet.len();
        let mut token = String::with_capacity(self.length);
        let mut buf = [0u8; BATCH];

        while token.len() < self.length {
            self.rng.fill(&mut buf).map_err(|_| {
                ConnectorError::TokenGeneration("system random source failed".into())
            })?;
            for &byte in &buf {
                let byte = usize::from(byte);
                if byte >= self.limit {
                    continue;
                }
                token.push(char::from(self.alphabet[byte % n]));
                if token.len() == self.length {
                    break;
                }
            }
        }
        Ok(token)
    }
}
