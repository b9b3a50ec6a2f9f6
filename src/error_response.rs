use libxml::parser::Parser as XmlParser;

use crate::utils::{first_node, xpath_context};

const ERROR_MESSAGE_XPATH: &str = "//*[local-name()=\"msg\"][@type=\"ERROR\"]";

/// Pulls the `<msg type="ERROR">` text out of an admin API error body.
///
/// Anything that isn't a parseable error document comes back as the body itself.
pub fn translate_error(content: &[u8]) -> String {
    find_error_message(content).unwrap_or_else(|| String::from_utf8_lossy(content).into_owned())
}

fn find_error_message(content: &[u8]) -> Option<String> {
    let document = XmlParser::default().parse_string(content).ok()?;
    let context = xpath_context(&document, &[]).ok()?;
    let node = first_node(&context, ERROR_MESSAGE_XPATH).ok()??;
    Some(node.get_content().trim().to_string())
}
