//! Certificate signing request decoding and identity checks.

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use connector_core::{ConnectorError, Result};
use rcgen::CertificateSigningRequestParams;
use x509_parser::prelude::{FromDer, X509CertificationRequest};
use x509_parser::public_key::PublicKey;

const PEM_PREFIX: &[u8] = b"-----BEGIN";

/// A decoded CSR whose self-signature has been verified.
pub struct SigningRequest {
    params: CertificateSigningRequestParams,
    common_name: Option<String>,
    rsa_key_bits: Option<usize>,
}

impl std::fmt::Debug for SigningRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SigningRequest")
            .field("common_name", &self.common_name)
            .field("rsa_key_bits", &self.rsa_key_bits)
            .finish_non_exhaustive()
    }
}

impl SigningRequest {
    /// Decode a CSR from PEM, or from base64-wrapped PEM as sent over the wire.
    ///
    /// Every decoding problem, including a bad self-signature, is
    /// [`ConnectorError::CsrInvalid`].
    pub fn decode(input: &[u8]) -> Result<Self> {
        let pem_bytes = unwrap_wire_encoding(input)?;

        let block = pem::parse(&pem_bytes).map_err(|e| csr_invalid(format!("not PEM: {e}")))?;
        if !block.tag().ends_with("CERTIFICATE REQUEST") {
            return Err(csr_invalid(format!("unexpected PEM block {}", block.tag())));
        }

        let (_, csr) = X509CertificationRequest::from_der(block.contents())
            .map_err(|e| csr_invalid(format!("malformed DER: {e}")))?;
        let info = &csr.certification_request_info;

        let common_name = info
            .subject
            .iter_common_name()
            .next()
            .and_then(|cn| cn.as_str().ok())
            .map(str::to_string);

        let rsa_key_bits = match info.subject_pki.parsed() {
            Ok(PublicKey::RSA(rsa)) => Some(modulus_bits(rsa.modulus)),
            _ => None,
        };

        let params = CertificateSigningRequestParams::from_pem(&pem::encode(&block))
            .map_err(|e| csr_invalid(format!("signature check failed: {e}")))?;

        Ok(Self {
            params,
            common_name,
            rsa_key_bits,
        })
    }

    /// Common name the caller asked for, if any
    pub fn common_name(&self) -> Option<&str> {
        self.common_name.as_deref()
    }

    /// Reject the request unless its CN is exactly `expected`.
    pub fn ensure_common_name(&self, expected: &str) -> Result<()> {
        match self.common_name() {
            Some(cn) if cn == expected => Ok(()),
            Some(cn) => Err(csr_invalid(format!(
                "common name {cn:?} does not match bound identity {expected:?}"
            ))),
            None => Err(csr_invalid("subject has no common name")),
        }
    }

    /// Reject RSA keys shorter than `min_rsa_bits`. Non-RSA keys pass.
    pub fn ensure_key_strength(&self, min_rsa_bits: usize) -> Result<()> {
        match self.rsa_key_bits {
            Some(bits) if bits < min_rsa_bits => Err(csr_invalid(format!(
                "RSA key of {bits} bits is below the {min_rsa_bits} bit minimum"
            ))),
            _ => Ok(()),
        }
    }

    pub(crate) fn into_params(self) -> CertificateSigningRequestParams {
        self.params
    }
}

/// Strip the optional base64 layer the public API wraps PEM in.
fn unwrap_wire_encoding(input: &[u8]) -> Result<Vec<u8>> {
    let trimmed = input.trim_ascii();
    if trimmed.is_empty() {
        return Err(csr_invalid("empty payload"));
    }
    if trimmed.starts_with(PEM_PREFIX) {
        return Ok(trimmed.to_vec());
    }
    STANDARD
        .decode(trimmed)
        .map_err(|e| csr_invalid(format!("neither PEM nor base64: {e}")))
}

/// Bit length of a big-endian RSA modulus, ignoring DER sign padding.
fn modulus_bits(modulus: &[u8]) -> usize {
    let significant = modulus.iter().position(|&b| b != 0).map_or(&[][..], |i| &modulus[i..]);
    significant.first().map_or(0, |&top| {
        (significant.len() - 1) * 8 + (8 - top.leading_zeros() as usize)
    })
}

fn csr_invalid(detail: impl Into<String>) -> ConnectorError {
    ConnectorError::CsrInvalid(detail.into())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testdata::{with_corrupted_signature, RSA_2048_ORDERS_CSR};
    use rcgen::{CertificateParams, DistinguishedName, DnType, KeyPair};

    fn csr_pem(common_name: Option<&str>) -> String {
        let key = KeyPair::generate().unwrap();
        let mut params = CertificateParams::new(vec![]).unwrap();
        let mut dn = DistinguishedName::new();
        if let Some(cn) = common_name {
            dn.push(DnType::CommonName, cn);
        }
        dn.push(DnType::OrganizationName, "Caller Supplied Org");
        params.distinguished_name = dn;
        params.serialize_request(&key).unwrap().pem().unwrap()
    }

    #[test]
    fn test_decode_pem() {
        let request = SigningRequest::decode(csr_pem(Some("orders")).as_bytes()).unwrap();
        assert_eq!(request.common_name(), Some("orders"));
        request.ensure_common_name("orders").unwrap();
    }

    #[test]
    fn test_decode_base64_wrapped() {
        let wrapped = STANDARD.encode(csr_pem(Some("orders")));
        let request = SigningRequest::decode(wrapped.as_bytes()).unwrap();
        assert_eq!(request.common_name(), Some("orders"));
    }

    #[test]
    fn test_common_name_mismatch() {
        let request = SigningRequest::decode(csr_pem(Some("billing")).as_bytes()).unwrap();
        let err = request.ensure_common_name("orders").unwrap_err();
        assert!(matches!(err, ConnectorError::CsrInvalid(_)));
    }

    #[test]
    fn test_missing_common_name() {
        let request = SigningRequest::decode(csr_pem(None).as_bytes()).unwrap();
        assert!(request.common_name().is_none());
        assert!(request.ensure_common_name("orders").is_err());
    }

    #[test]
    fn test_garbage_is_invalid() {
        for input in [&b""[..], b"   ", b"%%% not base64 %%%", b"aGVsbG8="] {
            let err = SigningRequest::decode(input).unwrap_err();
            assert!(matches!(err, ConnectorError::CsrInvalid(_)), "{input:?}");
        }
    }

    #[test]
    fn test_certificate_is_not_a_csr() {
        let key = KeyPair::generate().unwrap();
        let cert = CertificateParams::new(vec![])
            .unwrap()
            .self_signed(&key)
            .unwrap();
        let err = SigningRequest::decode(cert.pem().as_bytes()).unwrap_err();
        assert!(err.to_string().contains("unexpected PEM block"));
    }

    #[test]
    fn test_ecdsa_passes_rsa_minimum() {
        let request = SigningRequest::decode(csr_pem(Some("orders")).as_bytes()).unwrap();
        request.ensure_key_strength(4096).unwrap();
    }

    #[test]
    fn test_weak_rsa_key_is_rejected() {
        let request = SigningRequest::decode(RSA_2048_ORDERS_CSR.as_bytes()).unwrap();
        assert_eq!(request.common_name(), Some("orders"));

        let err = request.ensure_key_strength(4096).unwrap_err();
        assert!(matches!(err, ConnectorError::CsrInvalid(_)));
        assert!(err.to_string().contains("2048 bits"));
        request.ensure_key_strength(2048).unwrap();
    }

    #[test]
    fn test_corrupted_signature_is_rejected() {
        for pem_text in [RSA_2048_ORDERS_CSR.to_string(), csr_pem(Some("orders"))] {
            let tampered = with_corrupted_signature(&pem_text);
            let err = SigningRequest::decode(tampered.as_bytes()).unwrap_err();
            assert!(matches!(err, ConnectorError::CsrInvalid(_)));
            assert!(err.to_string().contains("signature check failed"));
        }
    }

    #[test]
    fn test_modulus_bits() {
        assert_eq!(modulus_bits(&[]), 0);
        assert_eq!(modulus_bits(&[0x00, 0x80, 0x00]), 16);
        assert_eq!(modulus_bits(&[0x01, 0xff]), 9);
        let mut padded = vec![0x00, 0xc1];
        padded.extend([0u8; 255]);
        assert_eq!(modulus_bits(&padded), 2048);
    }
}
