//! Targeted scans over domain XML.

/// Extract the domain name from a definition XML document.
///
/// Looks for the text of the first `<name>` element, e.g.
/// `<domain type='qemu'><name>alpha</name>...</domain>`. The element carries
/// no attributes in domain XML, but an attributed form is tolerated.
/// Returns `None` when the element is missing or empty.
pub fn domain_name(xml: &str) -> Option<String> {
    let mut search = xml;
    loop {
        let open = search.find("<name")?;
        let rest = &search[open..];
        // Reject longer element names sharing the prefix (e.g. <nameserver>).
        match rest.as_bytes().get("<name".len()).copied() {
            Some(b'>') | Some(b'/') | Some(b' ') | Some(b'\t') | Some(b'\n') => {
                // End of the opening tag; a self-closing <name/> has no text.
                let tag_end = rest.find('>')?;
                if rest[..tag_end].ends_with('/') {
                    return None;
                }
                let text_start = tag_end + 1;
                let text_end = rest[text_start..].find("</name>")? + text_start;
                let name = rest[text_start..text_end].trim();
                return if name.is_empty() {
                    None
                } else {
                    Some(name.to_string())
                };
            }
            _ => search = &search[open + "<name".len()..],
        }
    }
}
