use libxml::{
    parser::Parser as XmlParser,
    tree::{Document, Node},
};
use tracing::debug;

use crate::{
    location::ParsedLocation,
    utils::{first_node, parse_strict, xpath_context},
    ShimError, NS_SAML_METADATA, NS_SPLUNK_REST,
};

/// How service locations in the SP metadata should be rewritten.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct RewriteConfig {
    pub enabled: bool,
    pub host: Option<String>,
    pub scheme: Option<String>,
}

/// The SP metadata as it will be served.
pub enum SpMetadata {
    /// The untouched `spMetadata` key from the admin API response.
    Embedded(Node),
    /// The payload re-parsed as its own document, with locations rewritten.
    Rewritten(Document),
}

impl SpMetadata {
    pub fn to_xml(&self) -> String {
        match self {
            SpMetadata::Embedded(node) => node.get_content(),
            SpMetadata::Rewritten(document) => match document.get_root_element() {
                Some(root) => document.node_to_string(&root),
                None => String::new(),
            },
        }
    }
}

const LOCATION_ELEMENTS: [&str; 2] = ["md:SingleLogoutService", "md:AssertionConsumerService"];

pub fn parse_admin_response(input: &[u8]) -> Result<Document, ShimError> {
    XmlParser::default()
        .parse_string(input)
        .map_err(ShimError::InvalidXml)
}

/// Finds the `spMetadata` key holding the escaped SP metadata document.
pub fn locate_sp_metadata(document: &Document) -> Result<Option<Node>, ShimError> {
    let context = xpath_context(document, &[("s", NS_SPLUNK_REST)])?;
    first_node(&context, "//s:key[@name=\"spMetadata\"]")
}

/// Rewrites the `Location` of the first SLO and ACS elements in the embedded metadata.
///
/// The metadata lives in the key as escaped text, so it has to be parsed a second time
/// before any element can be touched. Missing elements or attributes are skipped.
pub fn rewrite_locations(
    metadata: &Node,
    config: &RewriteConfig,
) -> Result<SpMetadata, ShimError> {
    if !config.enabled {
        return Ok(SpMetadata::Embedded(metadata.clone()));
    }

    let payload = metadata.get_content();
    let document =
        parse_strict(payload.trim()).map_err(|_| ShimError::InvalidMetadataPayload)?;
    if document.get_root_element().is_none() {
        return Err(ShimError::InvalidMetadataPayload);
    }
    debug!("before rewrite:\n{}", payload.trim());

    let context = xpath_context(&document, &[("md", NS_SAML_METADATA)])?;
    for element in LOCATION_ELEMENTS {
        let Some(mut node) = first_node(&context, &format!("//{element}"))? else {
            debug!("Couldn't find {element} element");
            continue;
        };
        let Some(location) = node.get_attribute("Location") else {
            debug!("Couldn't find Location attribute in {element} element");
            continue;
        };
        let parsed = ParsedLocation::parse(&location);
        debug!(?parsed, "{element} Location: {location}");
        node.set_attribute("Location", &parsed.rewrite(config))
            .map_err(|e| ShimError::Attribute(e.to_string()))?;
    }

    let rewritten = SpMetadata::Rewritten(document);
    debug!("after rewrite:\n{}", rewritten.to_xml());
    Ok(rewritten)
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    const SAMPLE_RESPONSE: &[u8] = include_bytes!("../static/sp_metadata_response.xml");

    fn escape(text: &str) -> String {
        text.replace('&', "&amp;")
            .replace('<', "&lt;")
            .replace('>', "&gt;")
            .replace('"', "&quot;")
    }

    fn admin_response(payload: &str) -> String {
        format!(
            r#"<?xml version="1.0" encoding="UTF-8"?>
<feed xmlns="http://www.w3.org/2005/Atom" xmlns:s="http://dev.splunk.com/ns/rest">
  <entry>
    <content type="text/xml">
      <s:dict>
        <s:key name="other">ignored</s:key>
        <s:key name="spMetadata">{}</s:key>
      </s:dict>
    </content>
  </entry>
</feed>"#,
            escape(payload)
        )
    }

    fn rewrite_host(host: &str) -> RewriteConfig {
        RewriteConfig {
            enabled: true,
            host: Some(host.into()),
            scheme: None,
        }
    }

    fn locations(xml: &str) -> Vec<(String, Option<String>)> {
        let document = XmlParser::default().parse_string(xml).unwrap();
        let context = xpath_context(&document, &[("md", NS_SAML_METADATA)]).unwrap();
        LOCATION_ELEMENTS
            .iter()
            .map(|element| {
                let location = first_node(&context, &format!("//{element}"))
                    .unwrap()
                    .and_then(|node| node.get_attribute("Location"));
                (element.to_string(), location)
            })
            .collect()
    }

    #[test]
    fn locates_sp_metadata_key() {
        let document = parse_admin_response(SAMPLE_RESPONSE).unwrap();
        let metadata = locate_sp_metadata(&document).unwrap().unwrap();
        assert_eq!(metadata.get_attribute("name").as_deref(), Some("spMetadata"));
        assert!(metadata.get_content().contains("<md:EntityDescriptor"));
    }

    #[test]
    fn missing_key_is_none() {
        let document = parse_admin_response(
            br#"<feed xmlns:s="http://dev.splunk.com/ns/rest"><s:key name="acsUrl">x</s:key></feed>"#,
        )
        .unwrap();
        assert!(locate_sp_metadata(&document).unwrap().is_none());
    }

    #[test]
    fn key_in_wrong_namespace_is_ignored() {
        let document = parse_admin_response(
            br#"<feed xmlns:s="urn:example:other"><s:key name="spMetadata">x</s:key></feed>"#,
        )
        .unwrap();
        assert!(locate_sp_metadata(&document).unwrap().is_none());
    }

    #[test]
    fn disabled_rewrite_returns_original() {
        let document = parse_admin_response(SAMPLE_RESPONSE).unwrap();
        let metadata = locate_sp_metadata(&document).unwrap().unwrap();

        let result = rewrite_locations(&metadata, &RewriteConfig::default()).unwrap();
        assert!(matches!(result, SpMetadata::Embedded(_)));
        assert_eq!(result.to_xml(), metadata.get_content());

        let ignored = RewriteConfig {
            enabled: false,
            host: Some("proxy.example.com".into()),
            scheme: Some("http".into()),
        };
        let result = rewrite_locations(&metadata, &ignored).unwrap();
        assert_eq!(result.to_xml(), metadata.get_content());
    }

    #[test]
    fn rewrites_both_locations() {
        let document = parse_admin_response(SAMPLE_RESPONSE).unwrap();
        let metadata = locate_sp_metadata(&document).unwrap().unwrap();
        let config = RewriteConfig {
            enabled: true,
            host: Some("splunk.example.com".into()),
            scheme: Some("https".into()),
        };

        let xml = rewrite_locations(&metadata, &config).unwrap().to_xml();
        assert_eq!(
            locations(&xml),
            vec![
                (
                    "md:SingleLogoutService".to_string(),
                    Some("https://splunk.example.com/saml/logout".to_string())
                ),
                (
                    "md:AssertionConsumerService".to_string(),
                    Some("https://splunk.example.com/saml/acs".to_string())
                ),
            ]
        );
        assert!(xml.contains("entityID=\"splunk-sp\""));
    }

    #[test]
    fn only_first_match_is_rewritten() {
        let payload = r#"<md:EntityDescriptor xmlns:md="urn:oasis:names:tc:SAML:2.0:metadata" entityID="sp">
  <md:SPSSODescriptor protocolSupportEnumeration="urn:oasis:names:tc:SAML:2.0:protocol">
    <md:AssertionConsumerService Binding="urn:oasis:names:tc:SAML:2.0:bindings:HTTP-POST" Location="https://old.example.com/acs/first" index="0"/>
    <md:AssertionConsumerService Binding="urn:oasis:names:tc:SAML:2.0:bindings:HTTP-POST" Location="https://old.example.com/acs/second" index="1"/>
  </md:SPSSODescriptor>
</md:EntityDescriptor>"#;
        let document = parse_admin_response(admin_response(payload).as_bytes()).unwrap();
        let metadata = locate_sp_metadata(&document).unwrap().unwrap();

        let xml = rewrite_locations(&metadata, &rewrite_host("new.example.com"))
            .unwrap()
            .to_xml();
        assert!(xml.contains("Location=\"https://new.example.com/acs/first\""));
        assert!(xml.contains("Location=\"https://old.example.com/acs/second\""));
    }

    #[test]
    fn missing_slo_leaves_acs_rewrite_intact() {
        let payload = r#"<md:EntityDescriptor xmlns:md="urn:oasis:names:tc:SAML:2.0:metadata" entityID="sp">
  <md:SPSSODescriptor protocolSupportEnumeration="urn:oasis:names:tc:SAML:2.0:protocol">
    <md:AssertionConsumerService Binding="urn:oasis:names:tc:SAML:2.0:bindings:HTTP-POST" Location="https://old.example.com/saml/acs?foo=bar#frag" index="0"/>
  </md:SPSSODescriptor>
</md:EntityDescriptor>"#;
        let document = parse_admin_response(admin_response(payload).as_bytes()).unwrap();
        let metadata = locate_sp_metadata(&document).unwrap().unwrap();

        let xml = rewrite_locations(&metadata, &rewrite_host("new.example.com"))
            .unwrap()
            .to_xml();
        assert_eq!(
            locations(&xml),
            vec![
                ("md:SingleLogoutService".to_string(), None),
                (
                    "md:AssertionConsumerService".to_string(),
                    Some("https://new.example.com/saml/acs?foo=bar#frag".to_string())
                ),
            ]
        );
    }

    #[test]
    fn element_without_location_is_skipped() {
        let payload = r#"<md:EntityDescriptor xmlns:md="urn:oasis:names:tc:SAML:2.0:metadata" entityID="sp">
  <md:SPSSODescriptor protocolSupportEnumeration="urn:oasis:names:tc:SAML:2.0:protocol">
    <md:SingleLogoutService Binding="urn:oasis:names:tc:SAML:2.0:bindings:HTTP-POST"/>
    <md:AssertionConsumerService Binding="urn:oasis:names:tc:SAML:2.0:bindings:HTTP-POST" Location="http://old.example.com/acs" index="0"/>
  </md:SPSSODescriptor>
</md:EntityDescriptor>"#;
        let document = parse_admin_response(admin_response(payload).as_bytes()).unwrap();
        let metadata = locate_sp_metadata(&document).unwrap().unwrap();

        let xml = rewrite_locations(&metadata, &rewrite_host("new.example.com"))
            .unwrap()
            .to_xml();
        let found = locations(&xml);
        assert_eq!(found[0].1, None);
        assert_eq!(found[1].1.as_deref(), Some("http://new.example.com/acs"));
    }

    #[test]
    fn unparseable_payload_is_an_error() {
        for payload in [
            "definitely not xml",
            r#"<md:EntityDescriptor xmlns:md="urn:oasis:names:tc:SAML:2.0:metadata">
  <md:SPSSODescriptor>
    <md:AssertionConsumerService Location="https://old.example.com/acs"/>"#,
        ] {
            let response = admin_response(payload);
            let document = parse_admin_response(response.as_bytes()).unwrap();
            let metadata = locate_sp_metadata(&document).unwrap().unwrap();

            assert!(matches!(
                rewrite_locations(&metadata, &rewrite_host("new.example.com")),
                Err(ShimError::InvalidMetadataPayload)
            ));
        }
    }
}
