//! Signer certificate extraction from a module's `certificates.p7b`.

use cms::content_info::ContentInfo;
use cms::signed_data::{SignedData, SignerIdentifier};
use const_oid::db::{rfc4519::CN, rfc5911::ID_SIGNED_DATA};
use der::asn1::AnyRef;
use der::{Decode, Encode, Reader, SliceReader, Tag, TagNumber, Tagged};
use sha1::{Digest, Sha1};
use x509_cert::Certificate;

use crate::error::GwInitError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignerCertificate {
    /// Common name of the certificate subject.
    pub subject_name: String,
    /// SHA-1 over the DER certificate, lower-case hex without separators.
    pub thumbprint: String,
}

const CERTIFICATES_FIELD: Tag = Tag::ContextSpecific {
    constructed: true,
    number: TagNumber::N0,
};

/// Certificates of the `[0] certificates` field in the order the bundle lists them.
///
/// `SignedData` decodes that field as a SET OF and re-sorts it, so the raw field is walked
/// here instead. Non-X.509 certificate choices are skipped.
fn certificates_in_bundle_order(signed_data: &[u8]) -> Result<Vec<Certificate>, GwInitError> {
    let mut fields = SliceReader::new(signed_data)?;
    // version, digestAlgorithms, encapContentInfo
    for _ in 0..3 {
        fields.decode::<AnyRef<'_>>()?;
    }

    let mut certificates = Vec::new();
    if fields.is_finished() || fields.peek_tag()? != CERTIFICATES_FIELD {
        return Ok(certificates);
    }
    let field: AnyRef<'_> = fields.decode()?;
    let mut entries = SliceReader::new(field.value())?;
    while !entries.is_finished() {
        if entries.peek_tag()? == Tag::Sequence {
            certificates.push(entries.decode::<Certificate>()?);
        } else {
            entries.decode::<AnyRef<'_>>()?;
        }
    }
    Ok(certificates)
}

/// Decodes a DER PKCS#7 `SignedData` bundle and describes the certificate that signed it.
///
/// The certificate named by the first signer's issuer and serial wins; bundles without
/// signer infos (plain certificate chains) fall back to the first certificate.
pub fn signer_certificate(p7b: &[u8]) -> Result<SignerCertificate, GwInitError> {
    let content_info = ContentInfo::from_der(p7b)?;
    if content_info.content_type != ID_SIGNED_DATA {
        return Err(GwInitError::Certificate(format!(
            "expected signedData content, got {}",
            content_info.content_type
        )));
    }
    let signed_data = SignedData::from_der(&content_info.content.to_der()?)?;
    let certificates = certificates_in_bundle_order(content_info.content.value())?;

    let signer = signed_data
        .signer_infos
        .0
        .iter()
        .next()
        .and_then(|info| match &info.sid {
            SignerIdentifier::IssuerAndSerialNumber(id) => certificates.iter().find(|cert| {
                cert.tbs_certificate.issuer == id.issuer
                    && cert.tbs_certificate.serial_number == id.serial_number
            }),
            SignerIdentifier::SubjectKeyIdentifier(_) => None,
        })
        .or_else(|| certificates.first())
        .ok_or_else(|| GwInitError::Certificate("bundle carries no certificate".to_string()))?;

    Ok(SignerCertificate {
        subject_name: common_name(signer)?,
        thumbprint: thumbprint(signer)?,
    })
}

fn thumbprint(cert: &Certificate) -> Result<String, GwInitError> {
    Ok(hex::encode(Sha1::digest(cert.to_der()?)))
}

// Most specific CN is the last one in DER order.
fn common_name(cert: &Certificate) -> Result<String, GwInitError> {
    let value = cert
        .tbs_certificate
        .subject
        .0
        .iter()
        .flat_map(|rdn| rdn.0.iter())
        .filter(|atv| atv.oid == CN)
        .last()
        .ok_or_else(|| GwInitError::Certificate("subject has no common name".to_string()))?;

    let raw = value.value.value();
    match value.value.tag() {
        Tag::Utf8String | Tag::PrintableString | Tag::Ia5String => std::str::from_utf8(raw)
            .map(str::to_string)
            .map_err(|e| GwInitError::Certificate(format!("common name is not text: {e}"))),
        Tag::TeletexString => Ok(raw.iter().copied().map(char::from).collect()),
        Tag::BmpString => bmp_string(raw),
        tag => Err(GwInitError::Certificate(format!(
            "unsupported common name encoding {tag}"
        ))),
    }
}

// BMPString is UCS-2, big endian.
fn bmp_string(raw: &[u8]) -> Result<String, GwInitError> {
    if raw.len() % 2 != 0 {
        return Err(GwInitError::Certificate(
            "odd-length BMPString common name".to_string(),
        ));
    }
    char::decode_utf16(
        raw.chunks_exact(2)
            .map(|pair| u16::from_be_bytes([pair[0], pair[1]])),
    )
    .collect::<Result<String, _>>()
    .map_err(|e| GwInitError::Certificate(format!("common name is not text: {e}")))
}
