use libxml::parser::XmlParseError;

pub mod config;
mod error_response;
mod idp_metadata;
mod location;
pub mod server;
mod sp_metadata;
mod utils;

pub use error_response::translate_error;
pub use idp_metadata::{extract_encryption_certificate, format_pem, EncryptionCertificate};
pub use location::ParsedLocation;
pub use sp_metadata::{
    locate_sp_metadata, parse_admin_response, rewrite_locations, RewriteConfig, SpMetadata,
};

/// Path of the SP metadata resource on the backing admin API.
pub const URI_SP_METADATA: &str = "/services/admin/SAML-sp-metadata";

pub const NS_SPLUNK_REST: &str = "http://dev.splunk.com/ns/rest";
pub const NS_SAML_METADATA: &str = "urn:oasis:names:tc:SAML:2.0:metadata";
pub const NS_XMLDSIG: &str = "http://www.w3.org/2000/09/xmldsig#";

#[derive(Debug, thiserror::Error)]
pub enum ShimError {
    #[error("invalid XML: {0:?}")]
    InvalidXml(XmlParseError),
    #[error("XPath failure: {0}")]
    XPath(String),
    #[error("embedded SP metadata is not a valid XML document")]
    InvalidMetadataPayload,
    #[error("failed to update attribute: {0}")]
    Attribute(String),
}
