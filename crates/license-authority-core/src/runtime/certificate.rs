// crates/license-authority-core/src/runtime/certificate.rs
// ============================================================================
// Module: License Credential Encoding
// Description: Build, sign, and parse X.509 license credentials.
// Purpose: Map licenses to certificate fields and read them back for reuse.
// Dependencies: rcgen, x509-parser, yasna, base64, rand, sha2
// ============================================================================

//! ## Overview
//! A license credential is a client-auth certificate whose subject carries the
//! license terms:
//!
//! | Attribute | Content |
//! |---|---|
//! | CN | cluster id |
//! | O | product feature list |
//! | OU | product id |
//! | ST | product tier |
//! | C | product line |
//! | L | one `key=value` feature flag per attribute (omitted when empty) |
//!
//! SANs carry the cluster DNS name and the requester email. rcgen builds and
//! signs the certificate; the subject is then rewritten with the full
//! attribute list (rcgen keeps one value per attribute type) and the
//! `TBSCertificate` is signed again with the root key.
//!
//! Stored credentials are parsed into a [`ParseResult`]. Anything unreadable,
//! including a private key that does not match the certificate, is reported
//! as [`ParseResult::Corrupt`] and treated as absent by the issuer.

// ============================================================================
// SECTION: Imports
// ============================================================================

use base64::Engine;
use base64::engine::general_purpose::STANDARD as Base64;
use rand::RngCore;
use rand::rngs::OsRng;
use rcgen::CertificateParams;
use rcgen::DistinguishedName;
use rcgen::DnType;
use rcgen::ExtendedKeyUsagePurpose;
use rcgen::IsCa;
use rcgen::KeyPair;
use rcgen::KeyUsagePurpose;
use rcgen::PublicKeyData;
use rcgen::SanType;
use rcgen::SerialNumber;
use sha2::Digest;
use sha2::Sha256;
use time::OffsetDateTime;
use x509_parser::pem::parse_x509_pem;
use yasna::ASN1Error;
use yasna::models::ObjectIdentifier;

use crate::core::flags::FeatureFlags;
use crate::core::identifiers::ClusterId;
use crate::core::identifiers::EmailAddress;
use crate::core::products::ProductDefinition;
use crate::runtime::authority::AuthorityError;
use crate::runtime::authority::CertificateAuthority;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// PEM boundary marking the start of a certificate block.
const PEM_CERTIFICATE_BEGIN: &str = "-----BEGIN CERTIFICATE-----";
/// PEM label of certificate blocks.
pub(crate) const PEM_CERTIFICATE_LABEL: &str = "CERTIFICATE";
/// Base64 characters per PEM body line.
const PEM_LINE_WIDTH: usize = 64;
/// Serial number length in bytes.
const SERIAL_LENGTH: usize = 16;
/// Position of `subject` among the fields of a v3 `TBSCertificate`.
const TBS_SUBJECT_INDEX: usize = 5;

/// X.520 `commonName`.
const OID_COMMON_NAME: &[u64] = &[2, 5, 4, 3];
/// X.520 `countryName`.
const OID_COUNTRY_NAME: &[u64] = &[2, 5, 4, 6];
/// X.520 `localityName`.
const OID_LOCALITY_NAME: &[u64] = &[2, 5, 4, 7];
/// X.520 `stateOrProvinceName`.
const OID_STATE_OR_PROVINCE_NAME: &[u64] = &[2, 5, 4, 8];
/// X.520 `organizationName`.
const OID_ORGANIZATION_NAME: &[u64] = &[2, 5, 4, 10];
/// X.520 `organizationalUnitName`.
const OID_ORGANIZATIONAL_UNIT_NAME: &[u64] = &[2, 5, 4, 11];

// ============================================================================
// SECTION: Types
// ============================================================================

/// Inputs that determine a credential's subject and validity.
#[derive(Debug, Clone, Copy)]
pub struct CredentialFields<'a> {
    /// Cluster the credential is bound to.
    pub cluster: &'a ClusterId,
    /// Licensed product.
    pub product: &'a ProductDefinition,
    /// Requester email.
    pub email: &'a EmailAddress,
    /// Embedded feature flags.
    pub flags: &'a FeatureFlags,
    /// Validity start.
    pub not_before: OffsetDateTime,
    /// Validity end.
    pub not_after: OffsetDateTime,
}

/// Freshly signed credential material.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignedCredential {
    /// Certificate PEM.
    pub certificate_pem: String,
    /// Private key PEM.
    pub private_key_pem: String,
}

/// Stored credential that parsed cleanly.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredCredential {
    /// Certificate PEM as stored.
    pub certificate_pem: String,
    /// Private key PEM as stored.
    pub private_key_pem: String,
    /// Certificate expiry.
    pub not_after: OffsetDateTime,
    /// Flags embedded in the certificate.
    pub flags: FeatureFlags,
}

/// Result of reading a stored credential.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParseResult {
    /// Certificate and matching key parsed cleanly.
    Valid(StoredCredential),
    /// No certificate is stored.
    Absent,
    /// Stored material is unusable.
    Corrupt(String),
}

// ============================================================================
// SECTION: Signing
// ============================================================================

/// Generates a key pair and signs a credential for `fields`.
///
/// # Errors
///
/// Returns [`AuthorityError::Crypto`] when key generation, field encoding, or
/// signing fails.
pub fn sign_credential(
    authority: &CertificateAuthority,
    fields: &CredentialFields<'_>,
) -> Result<SignedCredential, AuthorityError> {
    let key_pair = KeyPair::generate()?;
    let params = credential_params(fields)?;
    let certificate = authority.sign(&params, &key_pair)?;
    let subject = encode_name(&subject_attributes(fields));
    let der = replace_subject(authority, certificate.der().as_ref(), &subject)?;
    Ok(SignedCredential {
        certificate_pem: pem_encode(PEM_CERTIFICATE_LABEL, &der),
        private_key_pem: key_pair.serialize_pem(),
    })
}

/// Builds certificate parameters for a credential.
///
/// Only the common name is set here; the full subject is written by
/// [`replace_subject`].
fn credential_params(fields: &CredentialFields<'_>) -> Result<CertificateParams, AuthorityError> {
    let mut name = DistinguishedName::new();
    name.push(DnType::CommonName, fields.cluster.as_str());

    let dns_name = fields.cluster.as_str().try_into().map_err(|err: rcgen::Error| {
        AuthorityError::Crypto(format!("cluster is not a valid dns name: {err}"))
    })?;
    let email = fields.email.as_str().try_into().map_err(|err: rcgen::Error| {
        AuthorityError::Crypto(format!("email is not a valid rfc822 name: {err}"))
    })?;

    let mut params = CertificateParams::default();
    params.distinguished_name = name;
    params.subject_alt_names = vec![SanType::DnsName(dns_name), SanType::Rfc822Name(email)];
    params.is_ca = IsCa::NoCa;
    params.key_usages = vec![KeyUsagePurpose::DigitalSignature];
    params.extended_key_usages = vec![ExtendedKeyUsagePurpose::ClientAuth];
    params.not_before = fields.not_before;
    params.not_after = fields.not_after;
    params.serial_number = Some(random_serial());
    Ok(params)
}

/// Lists subject attributes in certificate order.
fn subject_attributes(fields: &CredentialFields<'_>) -> Vec<(&'static [u64], String)> {
    let mut attributes = vec![(OID_COMMON_NAME, fields.cluster.to_string())];
    let features = fields.product.feature_list();
    if !features.is_empty() {
        attributes.push((OID_ORGANIZATION_NAME, features));
    }
    attributes.push((OID_ORGANIZATIONAL_UNIT_NAME, fields.product.id.to_string()));
    attributes.push((OID_STATE_OR_PROVINCE_NAME, fields.product.tier.as_str().to_string()));
    attributes.push((OID_COUNTRY_NAME, fields.product.product_line.clone()));
    attributes.extend(fields.flags.entries().map(|entry| (OID_LOCALITY_NAME, entry)));
    attributes
}

/// DER-encodes a distinguished name with one attribute per RDN.
fn encode_name(attributes: &[(&'static [u64], String)]) -> Vec<u8> {
    yasna::construct_der(|writer| {
        writer.write_sequence(|writer| {
            for (oid, value) in attributes {
                writer.next().write_set(|writer| {
                    writer.next().write_sequence(|writer| {
                        writer.next().write_oid(&ObjectIdentifier::from_slice(oid));
                        writer.next().write_utf8_string(value);
                    });
                });
            }
        });
    })
}

/// Swaps the subject of a signed certificate and signs it again.
fn replace_subject(
    authority: &CertificateAuthority,
    certificate_der: &[u8],
    subject_der: &[u8],
) -> Result<Vec<u8>, AuthorityError> {
    let (tbs, algorithm) = yasna::parse_der(certificate_der, |reader| {
        reader.read_sequence(|reader| {
            let tbs = reader.next().read_der()?;
            let algorithm = reader.next().read_der()?;
            reader.next().read_der()?;
            Ok((tbs, algorithm))
        })
    })
    .map_err(der_error)?;
    let mut elements = yasna::parse_der(&tbs, |reader| {
        reader.read_sequence(|reader| {
            let mut elements = Vec::new();
            while let Some(element) = reader.read_optional(|reader| reader.read_der())? {
                elements.push(element);
            }
            Ok(elements)
        })
    })
    .map_err(der_error)?;
    let subject = elements
        .get_mut(TBS_SUBJECT_INDEX)
        .ok_or_else(|| AuthorityError::Crypto("certificate has no subject field".to_string()))?;
    *subject = subject_der.to_vec();

    let tbs = yasna::construct_der(|writer| {
        writer.write_sequence(|writer| {
            for element in &elements {
                writer.next().write_der(element);
            }
        });
    });
    let signature = authority.sign_bytes(&tbs)?;
    Ok(yasna::construct_der(|writer| {
        writer.write_sequence(|writer| {
            writer.next().write_der(&tbs);
            writer.next().write_der(&algorithm);
            writer.next().write_bitvec_bytes(&signature, signature.len() * 8);
        });
    }))
}

/// Maps DER errors raised while rewriting a certificate.
fn der_error(error: ASN1Error) -> AuthorityError {
    AuthorityError::Crypto(format!("certificate encoding failed: {error}"))
}

/// Wraps DER bytes in a PEM block.
fn pem_encode(label: &str, der: &[u8]) -> String {
    let body = Base64.encode(der);
    let mut out = String::with_capacity(body.len() + body.len() / PEM_LINE_WIDTH + 64);
    out.push_str("-----BEGIN ");
    out.push_str(label);
    out.push_str("-----\n");
    for start in (0 .. body.len()).step_by(PEM_LINE_WIDTH) {
        let end = (start + PEM_LINE_WIDTH).min(body.len());
        out.push_str(&body[start .. end]);
        out.push('\n');
    }
    out.push_str("-----END ");
    out.push_str(label);
    out.push_str("-----\n");
    out
}

/// Returns a random positive serial number.
pub(crate) fn random_serial() -> SerialNumber {
    let mut bytes = [0_u8; SERIAL_LENGTH];
    OsRng.fill_bytes(&mut bytes);
    bytes[0] = (bytes[0] & 0x7f) | 0x01;
    SerialNumber::from_slice(&bytes)
}

// ============================================================================
// SECTION: Parsing
// ============================================================================

/// Parses stored certificate and key bytes.
///
/// A missing certificate is [`ParseResult::Absent`]. A certificate with a
/// missing, unreadable, or mismatched key, more than one certificate block, or
/// unreadable subject fields is [`ParseResult::Corrupt`].
#[must_use]
pub fn parse_credential(certificate: Option<&[u8]>, key: Option<&[u8]>) -> ParseResult {
    let Some(certificate) = certificate else {
        return ParseResult::Absent;
    };
    match parse_stored(certificate, key) {
        Ok(stored) => ParseResult::Valid(stored),
        Err(reason) => ParseResult::Corrupt(reason),
    }
}

/// Parses a stored certificate and key, returning a reason on failure.
fn parse_stored(certificate: &[u8], key: Option<&[u8]>) -> Result<StoredCredential, String> {
    let certificate_pem = std::str::from_utf8(certificate)
        .map_err(|_| "certificate is not utf-8".to_string())?
        .to_string();
    let blocks = certificate_pem.matches(PEM_CERTIFICATE_BEGIN).count();
    if blocks != 1 {
        return Err(format!("expected one certificate block, found {blocks}"));
    }
    let (_, pem) =
        parse_x509_pem(certificate).map_err(|err| format!("certificate pem decode failed: {err}"))?;
    if pem.label != PEM_CERTIFICATE_LABEL {
        return Err(format!("unexpected pem label {}", pem.label));
    }
    let x509 = pem.parse_x509().map_err(|err| format!("certificate parse failed: {err}"))?;
    let entries = x509
        .subject()
        .iter_locality()
        .map(|attribute| {
            attribute.as_str().map_err(|err| format!("locality is not a string: {err}"))
        })
        .collect::<Result<Vec<_>, _>>()?;
    let flags = FeatureFlags::from_entries(entries).map_err(|err| err.to_string())?;
    let not_after = x509.validity().not_after.to_datetime();

    let key = key.ok_or("private key missing")?;
    let private_key_pem =
        std::str::from_utf8(key).map_err(|_| "private key is not utf-8".to_string())?.to_string();
    let key_pair = KeyPair::from_pem(&private_key_pem)
        .map_err(|err| format!("private key parse failed: {err}"))?;
    if key_pair.subject_public_key_info() != x509.public_key().raw {
        return Err("private key does not match certificate".to_string());
    }

    Ok(StoredCredential {
        certificate_pem,
        private_key_pem,
        not_after,
        flags,
    })
}

// ============================================================================
// SECTION: Digests
// ============================================================================

/// Returns the lowercase hex SHA-256 of `bytes`.
#[must_use]
pub fn sha256_hex(bytes: &[u8]) -> String {
    const HEX: &[u8; 16] = b"0123456789abcdef";
    let digest = Sha256::digest(bytes);
    let mut out = String::with_capacity(digest.len() * 2);
    for byte in digest {
        out.push(HEX[usize::from(byte >> 4)] as char);
        out.push(HEX[usize::from(byte & 0x0f)] as char);
    }
    out
}

// ============================================================================
// SECTION: Tests
// ============================================================================

#[cfg(test)]
mod tests {
    //! Credential encoding and parsing tests.
    #![allow(
        clippy::unwrap_used,
        clippy::expect_used,
        clippy::panic,
        clippy::use_debug,
        reason = "Test-only assertions."
    )]

    use time::Duration;

    use super::*;
    use crate::core::identifiers::ProductId;
    use crate::core::products::ProductRegistry;
    use crate::core::time::ManualClock;
    use crate::runtime::audit::NoopAuditSink;
    use crate::runtime::authority::AuthorityOptions;
    use crate::runtime::store::InMemoryBlobStore;

    fn now() -> OffsetDateTime {
        OffsetDateTime::from_unix_timestamp(1_700_000_000).expect("timestamp")
    }

    fn authority() -> CertificateAuthority {
        CertificateAuthority::get_or_init(
            &InMemoryBlobStore::new(),
            &AuthorityOptions::default(),
            &ManualClock::new(now()),
            &NoopAuditSink,
        )
        .expect("authority")
    }

    fn signed_by(authority: &CertificateAuthority, flags: &FeatureFlags) -> SignedCredential {
        let registry = ProductRegistry::builtin();
        let product = registry.get(&ProductId::new("platform-enterprise")).expect("product");
        let cluster = ClusterId::new("c1.example.com");
        let email = EmailAddress::parse("ops@example.com").expect("email");
        sign_credential(
            authority,
            &CredentialFields {
                cluster: &cluster,
                product,
                email: &email,
                flags,
                not_before: now(),
                not_after: now() + Duration::days(30),
            },
        )
        .expect("sign")
    }

    fn signed(flags: &FeatureFlags) -> SignedCredential {
        signed_by(&authority(), flags)
    }

    #[test]
    fn signed_credential_round_trips_flags_and_expiry() {
        let flags = FeatureFlags::from_pairs([("seats", "10"), ("audit", "on")]).expect("flags");
        let credential = signed(&flags);
        let parsed = parse_credential(
            Some(credential.certificate_pem.as_bytes()),
            Some(credential.private_key_pem.as_bytes()),
        );
        let ParseResult::Valid(stored) = parsed else {
            panic!("expected valid credential, got {parsed:?}");
        };
        assert_eq!(stored.flags, flags);
        assert_eq!(stored.not_after, now() + Duration::days(30));
    }

    #[test]
    fn each_flag_is_a_separate_locality_attribute() {
        let flags = FeatureFlags::from_pairs([("seats", "10"), ("audit", "on"), ("region", "eu")])
            .expect("flags");
        let credential = signed(&flags);
        let (_, pem) = parse_x509_pem(credential.certificate_pem.as_bytes()).expect("pem");
        let x509 = pem.parse_x509().expect("x509");
        let localities: Vec<&str> =
            x509.subject().iter_locality().map(|attr| attr.as_str().expect("utf8")).collect();
        assert_eq!(localities, vec!["audit=on", "region=eu", "seats=10"]);
        let common_names: Vec<&str> =
            x509.subject().iter_common_name().map(|attr| attr.as_str().expect("utf8")).collect();
        assert_eq!(common_names, vec!["c1.example.com"]);
        let units: Vec<&str> = x509
            .subject()
            .iter_organizational_unit()
            .map(|attr| attr.as_str().expect("utf8"))
            .collect();
        assert_eq!(units, vec!["platform-enterprise"]);
    }

    #[test]
    fn rewritten_certificate_verifies_against_root() {
        let authority = authority();
        let credential = signed_by(&authority, &FeatureFlags::from_pairs([("a", "1")]).expect("flags"));
        let (_, leaf_pem) = parse_x509_pem(credential.certificate_pem.as_bytes()).expect("pem");
        let leaf = leaf_pem.parse_x509().expect("leaf");
        let (_, root_pem) = parse_x509_pem(authority.certificate_pem().as_bytes()).expect("pem");
        let root = root_pem.parse_x509().expect("root");
        assert!(leaf.verify_signature(Some(root.public_key())).is_ok());
        assert_eq!(leaf.issuer().to_string(), root.subject().to_string());
    }

    #[test]
    fn empty_flags_round_trip() {
        let credential = signed(&FeatureFlags::new());
        let parsed = parse_credential(
            Some(credential.certificate_pem.as_bytes()),
            Some(credential.private_key_pem.as_bytes()),
        );
        assert!(matches!(parsed, ParseResult::Valid(stored) if stored.flags.is_empty()));
    }

    #[test]
    fn malformed_material_is_corrupt() {
        assert_eq!(parse_credential(None, None), ParseResult::Absent);
        assert!(matches!(parse_credential(Some(b"junk"), None), ParseResult::Corrupt(_)));
        let credential = signed(&FeatureFlags::new());
        let doubled = format!("{}{}", credential.certificate_pem, credential.certificate_pem);
        assert!(matches!(
            parse_credential(Some(doubled.as_bytes()), Some(credential.private_key_pem.as_bytes())),
            ParseResult::Corrupt(_)
        ));
        assert!(matches!(
            parse_credential(Some(credential.certificate_pem.as_bytes()), None),
            ParseResult::Corrupt(_)
        ));
    }

    #[test]
    fn key_from_another_credential_is_corrupt() {
        let authority = authority();
        let first = signed_by(&authority, &FeatureFlags::new());
        let second = signed_by(&authority, &FeatureFlags::new());
        let parsed = parse_credential(
            Some(second.certificate_pem.as_bytes()),
            Some(first.private_key_pem.as_bytes()),
        );
        assert!(matches!(parsed, ParseResult::Corrupt(reason) if reason.contains("does not match")));
    }

    #[test]
    fn pem_lines_are_wrapped() {
        let pem = pem_encode("TEST", &[0_u8; 100]);
        let lines: Vec<&str> = pem.lines().collect();
        assert_eq!(lines.first(), Some(&"-----BEGIN TEST-----"));
        assert_eq!(lines.last(), Some(&"-----END TEST-----"));
        assert!(lines[1 .. lines.len() - 1].iter().all(|line| line.len() <= PEM_LINE_WIDTH));
    }

    #[test]
    fn sha256_hex_matches_known_vector() {
        assert_eq!(
            sha256_hex(b"abc"),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }
}
