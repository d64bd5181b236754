//! Targeted extraction from S3's small fixed-tag XML replies
//!
//! S3 answers in a handful of flat documents (`ListBucketResult`, `Error`)
//! whose tags never nest under the same name, so substring search is
//! enough and no XML parser is pulled in.

/// Text of the first `<name>…</name>` element, unescaped
pub fn tag(body: &str, name: &str) -> Option<String> {
    raw_tag(body, name).map(unescape)
}

fn raw_tag<'a>(body: &'a str, name: &str) -> Option<&'a str> {
    let open = format!("<{name}>");
    let close = format!("</{name}>");

    let start = body.find(&open)? + open.len();
    let end = body[start..].find(&close)? + start;
    Some(&body[start..end])
}

/// Inner text of every `<name>…</name>` element, in document order
pub fn blocks<'a>(body: &'a str, name: &str) -> Vec<&'a str> {
    let open = format!("<{name}>");
    let close = format!("</{name}>");

    let mut found = Vec::new();
    let mut rest = body;
    while let Some(start) = rest.find(&open) {
        let inner = &rest[start + open.len()..];
        let Some(end) = inner.find(&close) else { break };
        found.push(&inner[..end]);
        rest = &inner[end + close.len()..];
    }
    found
}

/// Decode the five predefined XML entities
pub fn unescape(text: &str) -> String {
    if !text.contains('&') {
        return text.to_owned();
    }

    text.replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&apos;", "'")
        .replace("&amp;", "&")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_tag_is_unescaped() {
        let body = "<Error><Code>NoSuchKey</Code><Message>a &amp; b &lt;c&gt;</Message></Error>";
        assert_eq!(tag(body, "Code").as_deref(), Some("NoSuchKey"));
        assert_eq!(tag(body, "Message").as_deref(), Some("a & b <c>"));
        assert_eq!(tag(body, "RequestId"), None);
    }

    #[test]
    fn blocks_are_returned_in_order() {
        let body = "<R><Contents><Key>a</Key></Contents><Contents><Key>b</Key></Contents></R>";
        let keys: Vec<_> = blocks(body, "Contents")
            .into_iter()
            .filter_map(|b| tag(b, "Key"))
            .collect();
        assert_eq!(keys, ["a", "b"]);
    }

    #[test]
    fn unterminated_block_is_ignored() {
        assert!(blocks("<Contents><Key>a</Key>", "Contents").is_empty());
    }

    #[test]
    fn escaped_ampersand_is_decoded_once() {
        assert_eq!(unescape("&amp;lt;"), "&lt;");
    }
}
