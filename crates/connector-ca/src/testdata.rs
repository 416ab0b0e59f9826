//! Fixed CSRs the generators used elsewhere in the tests cannot produce.

/// RSA 2048 CSR for CN=orders, signed with sha256WithRSAEncryption.
pub const RSA_2048_ORDERS_CSR: &str = "\
-----BEGIN CERTIFICATE REQUEST-----\n\
MIICVjCCAT4CAQAwETEPMA0GA1UEAwwGb3JkZXJzMIIBIjANBgkqhkiG9w0BAQEF\n\
AAOCAQ8AMIIBCgKCAQEA1ZNmvc/D0yCvhzwUVXNYsAmlgdYzQca+ssU/7djcfh1L\n\
ddb+RRoqbwl2UzY4wOPR9m6oqEuPFKAGuKFEKTI9zptt2rR1+uUsyRBNXd8N06Ly\n\
ebedbq/HnO0rOvzj2sZcWOibua0rLWxvOngxQyWSh11gnPNIFUOKQLczISMYmDW0\n\
TIRLv5e6OEFdGvSs+5kphUBQX2EY/6/tJXHPf1eYLOWvjSIwIKllICazFQLH31I4\n\
HcaWIM+lvSZ1HBFHygs0alvj7F1V4bOsbUJca5bQHgFe491b81xIPJWDrsonHBlh\n\
cAgsoJKcQwaHnYa6Lz0eXW5VHFiCQHakyJY+XVNNVwIDAQABoAAwDQYJKoZIhvcN\n\
AQELBQADggEBACuyliXTCrG1Kg7tR8rzUi5/GAhvy4gAixF3lXaLph0LgFvXdEqE\n\
ipnBv/oJj/Xo2kAvLPTOPtFpQLxuMTqwoUL48XksaB+5rA2UVSqQxUi416daXZSI\n\
TTFWn7aCfS6kd8y1zaTM9HG4Cy/aSbsbgLlPA5Fnx8tSDcVA8M5lWazha27UN0Gf\n\
upiogcqDleiP3d0Tx7bkFtpBgn96FNMgeavF8BmdxJ8arjPDt/cS2C3X0K0t4moR\n\
0QImeUsV8PzpzQGJSqlGbP5Sil2SFoHLT6Lc0h+rByRjSApMvtnwTBDh/qyUl/Pk\n\
42oqcY+rxN3K6mYtL9K6OgMgmUNDH1o2cGk=\n\
-----END CERTIFICATE REQUEST-----\n\
";

/// Re-encode `csr_pem` with the last signature byte flipped.
pub fn with_corrupted_signature(csr_pem: &str) -> String {
    let block = pem::parse(csr_pem).unwrap();
    let mut der = block.contents().to_vec();
    let last = der.len() - 1;
    der[last] ^= 0x01;
    pem::encode(&pem::Pem::new(block.tag(), der))
}
