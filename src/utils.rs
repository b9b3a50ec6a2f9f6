use libxml::{
    parser::{Parser as XmlParser, ParserOptions, XmlParseError},
    tree::{Document, Node},
    xpath::Context,
};

use crate::ShimError;

/// Parses without libxml's recovery mode, so truncated or malformed input is rejected.
pub fn parse_strict<Bytes: AsRef<[u8]>>(input: Bytes) -> Result<Document, XmlParseError> {
    let options = ParserOptions {
        recover: false,
        ..Default::default()
    };
    XmlParser::default().parse_string_with_options(input, options)
}

/// Builds an XPath context over `document` with the given `(prefix, href)` pairs registered.
pub fn xpath_context(
    document: &Document,
    namespaces: &[(&str, &str)],
) -> Result<Context, ShimError> {
    let context = Context::new(document)
        .map_err(|_| ShimError::XPath("failed to create XPath context".into()))?;
    for (prefix, href) in namespaces {
        context
            .register_namespace(prefix, href)
            .map_err(|_| ShimError::XPath(format!("failed to register namespace {prefix}")))?;
    }
    Ok(context)
}

/// First node matched by `xpath`, in document order.
pub fn first_node(context: &Context, xpath: &str) -> Result<Option<Node>, ShimError> {
    let object = context
        .evaluate(xpath)
        .map_err(|_| ShimError::XPath(format!("failed to evaluate {xpath}")))?;
    Ok(object.get_nodes_as_vec().into_iter().next())
}

/// Splits `input` into chunks of at most `size` characters.
pub fn split_chunks(input: &str, size: usize) -> Vec<String> {
    let chars: Vec<char> = input.chars().collect();
    chars.chunks(size).map(|chunk| chunk.iter().collect()).collect()
}
