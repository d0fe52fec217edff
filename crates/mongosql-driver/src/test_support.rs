//! Certificate generation helpers shared by unit tests

use openssl::asn1::Asn1Time;
use openssl::bn::BigNum;
use openssl::hash::MessageDigest;
use openssl::pkey::{PKey, Private};
use openssl::rsa::Rsa;
use openssl::symm::Cipher;
use openssl::x509::{X509, X509Builder, X509NameBuilder};

pub(crate) const PASSPHRASE: &str = "correct horse";

pub(crate) fn rsa_key() -> PKey<Private> {
    PKey::from_rsa(Rsa::generate(2048).unwrap()).unwrap()
}

pub(crate) fn self_signed(common_name: &str, key: &PKey<Private>) -> X509 {
    let mut name = X509NameBuilder::new().unwrap();
    name.append_entry_by_text("CN", common_name).unwrap();
    let name = name.build();

    let mut builder = X509Builder::new().unwrap();
    builder.set_version(2).unwrap();
    let serial = BigNum::from_u32(1).unwrap().to_asn1_integer().unwrap();
    builder.set_serial_number(&serial).unwrap();
    builder.set_subject_name(&name).unwrap();
    builder.set_issuer_name(&name).unwrap();
    builder.set_pubkey(key).unwrap();
    builder.set_not_before(&Asn1Time::days_from_now(0).unwrap()).unwrap();
    builder.set_not_after(&Asn1Time::days_from_now(30).unwrap()).unwrap();
    builder.sign(key, MessageDigest::sha256()).unwrap();
    builder.build()
}

pub(crate) fn cert_pem(cert: &X509) -> String {
    String::from_utf8(cert.to_pem().unwrap()).unwrap()
}

/// Key encodings used to build client identity fixtures
#[derive(Debug, Clone, Copy)]
pub(crate) enum KeyForm {
    Pkcs1,
    Pkcs8,
    EncryptedPkcs1,
    EncryptedPkcs8,
}

pub(crate) fn key_pem(key: &PKey<Private>, form: KeyForm) -> String {
    let bytes = match form {
        KeyForm::Pkcs1 => key.rsa().unwrap().private_key_to_pem().unwrap(),
        KeyForm::Pkcs8 => key.private_key_to_pem_pkcs8().unwrap(),
        KeyForm::EncryptedPkcs1 => key
            .rsa()
            .unwrap()
            .private_key_to_pem_passphrase(Cipher::aes_256_cbc(), PASSPHRASE.as_bytes())
            .unwrap(),
        KeyForm::EncryptedPkcs8 => key
            .private_key_to_pem_pkcs8_passphrase(Cipher::aes_256_cbc(), PASSPHRASE.as_bytes())
            .unwrap(),
    };
    String::from_utf8(bytes).unwrap()
}

/// A client certificate and key in one PEM document
pub(crate) fn identity_pem(common_name: &str, form: KeyForm) -> String {
    let key = rsa_key();
    let cert = self_signed(common_name, &key);
    format!("{}{}", cert_pem(&cert), key_pem(&key, form))
}
