use crate::{
    utils::{first_node, parse_strict, split_chunks, xpath_context},
    ShimError, NS_SAML_METADATA, NS_XMLDSIG,
};

const PEM_HEADER: &str = "-----BEGIN CERTIFICATE-----";
const PEM_FOOTER: &str = "-----END CERTIFICATE-----";
const PEM_LINE_LENGTH: usize = 64;

/// Only encryption certificates are ever pulled out of IdP metadata.
const ENCRYPTION_CERTIFICATE_XPATH: &str =
    "//md:KeyDescriptor[@use=\"encryption\"]/ds:KeyInfo/ds:X509Data/ds:X509Certificate";

/// Base64 body of an IdP encryption certificate, exactly as it appears in the metadata.
#[derive(Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub struct EncryptionCertificate {
    pub content: String,
}

impl EncryptionCertificate {
    pub fn to_pem(&self) -> String {
        format_pem(&self.content)
    }
}

pub fn extract_encryption_certificate(
    input: &[u8],
) -> Result<Option<EncryptionCertificate>, ShimError> {
    let document = parse_strict(input).map_err(ShimError::InvalidXml)?;

    let context = xpath_context(&document, &[("md", NS_SAML_METADATA), ("ds", NS_XMLDSIG)])?;

    Ok(
        first_node(&context, ENCRYPTION_CERTIFICATE_XPATH)?.map(|node| EncryptionCertificate {
            content: node.get_content().trim().to_string(),
        }),
    )
}

/// Wraps raw certificate content into 64 character lines between PEM markers.
pub fn format_pem(content: &str) -> String {
    let mut lines = vec![PEM_HEADER.to_string()];
    lines.extend(split_chunks(content, PEM_LINE_LENGTH));
    lines.push(PEM_FOOTER.to_string());
    lines.join("\n")
}
