//! Element and entity tables for the lenient HTML dialect.

/// Returns true if the given tag name (lowercase) is a void element that
/// must not have content.
pub(crate) fn is_void_element(tag: &str) -> bool {
    matches!(
        tag,
        "area"
            | "base"
            | "br"
            | "col"
            | "embed"
            | "hr"
            | "img"
            | "input"
            | "link"
            | "meta"
            | "param"
            | "source"
            | "track"
            | "wbr"
            | "basefont"
            | "frame"
            | "isindex"
    )
}

/// Returns true if `tag` is an element whose opening auto-closes `open_tag`.
///
/// For example, a `<p>` auto-closes a previous `<p>`, and a `<li>` auto-closes
/// a previous `<li>`. See the HTML 4.01 DTD for the optional end tag rules.
pub(crate) fn auto_closes(open_tag: &str, tag: &str) -> bool {
    match open_tag {
        "p" => matches!(
            tag,
            "p" | "div"
                | "ul"
                | "ol"
                | "dl"
                | "pre"
                | "table"
                | "blockquote"
                | "address"
                | "h1"
                | "h2"
                | "h3"
                | "h4"
                | "h5"
                | "h6"
                | "hr"
                | "form"
                | "fieldset"
                | "section"
                | "article"
                | "aside"
                | "header"
                | "footer"
                | "nav"
                | "figure"
                | "main"
                | "details"
        ),
        "li" => tag == "li",
        "dt" => matches!(tag, "dt" | "dd"),
        "dd" => matches!(tag, "dt" | "dd"),
        "tr" => tag == "tr",
        "td" | "th" => matches!(tag, "td" | "th" | "tr"),
        "thead" | "tbody" => matches!(tag, "tbody" | "tfoot"),
        "tfoot" => tag == "tbody",
        "option" => matches!(tag, "option" | "optgroup"),
        "optgroup" => tag == "optgroup",
        "colgroup" => matches!(tag, "thead" | "tbody" | "tfoot" | "tr" | "colgroup"),
        "head" => matches!(tag, "body" | "frameset"),
        _ => false,
    }
}

/// Returns true if the end tag of `tag` may be omitted, so closing it
/// implicitly is not worth a diagnostic.
pub(crate) fn has_optional_end(tag: &str) -> bool {
    matches!(
        tag,
        "p" | "li"
            | "dt"
            | "dd"
            | "tr"
            | "td"
            | "th"
            | "thead"
            | "tbody"
            | "tfoot"
            | "option"
            | "optgroup"
            | "colgroup"
            | "head"
            | "body"
            | "html"
    )
}

/// Returns true if `tag` is a raw text element whose content is not parsed
/// as markup.
pub(crate) fn is_raw_text_element(tag: &str) -> bool {
    matches!(tag, "script" | "style")
}

/// Looks up an HTML named character reference (without `&` and `;`).
///
/// Covers the XML built-ins and the Latin-1 and typographic entities that
/// show up in practice.
pub(crate) fn lookup_entity(name: &str) -> Option<&'static str> {
    Some(match name {
        "amp" => "&",
        "lt" => "<",
        "gt" => ">",
        "quot" => "\"",
        "apos" => "'",
        "nbsp" => "\u{A0}",
        "iexcl" => "\u{A1}",
        "cent" => "\u{A2}",
        "pound" => "\u{A3}",
        "curren" => "\u{A4}",
        "yen" => "\u{A5}",
        "sect" => "\u{A7}",
        "uml" => "\u{A8}",
        "copy" => "\u{A9}",
        "laquo" => "\u{AB}",
        "not" => "\u{AC}",
        "shy" => "\u{AD}",
        "reg" => "\u{AE}",
        "deg" => "\u{B0}",
        "plusmn" => "\u{B1}",
        "sup2" => "\u{B2}",
        "sup3" => "\u{B3}",
        "acute" => "\u{B4}",
        "micro" => "\u{B5}",
        "para" => "\u{B6}",
        "middot" => "\u{B7}",
        "raquo" => "\u{BB}",
        "frac14" => "\u{BC}",
        "frac12" => "\u{BD}",
        "frac34" => "\u{BE}",
        "iquest" => "\u{BF}",
        "Agrave" => "\u{C0}",
        "Aacute" => "\u{C1}",
        "Auml" => "\u{C4}",
        "Ccedil" => "\u{C7}",
        "Eacute" => "\u{C9}",
        "Ouml" => "\u{D6}",
        "times" => "\u{D7}",
        "Uuml" => "\u{DC}",
        "szlig" => "\u{DF}",
        "agrave" => "\u{E0}",
        "aacute" => "\u{E1}",
        "acirc" => "\u{E2}",
        "auml" => "\u{E4}",
        "ccedil" => "\u{E7}",
        "egrave" => "\u{E8}",
        "eacute" => "\u{E9}",
        "ecirc" => "\u{EA}",
        "euml" => "\u{EB}",
        "iuml" => "\u{EF}",
        "ntilde" => "\u{F1}",
        "oacute" => "\u{F3}",
        "ouml" => "\u{F6}",
        "divide" => "\u{F7}",
        "uuml" => "\u{FC}",
        "ndash" => "\u{2013}",
        "mdash" => "\u{2014}",
        "lsquo" => "\u{2018}",
        "rsquo" => "\u{2019}",
        "ldquo" => "\u{201C}",
        "rdquo" => "\u{201D}",
        "bull" => "\u{2022}",
        "hellip" => "\u{2026}",
        "euro" => "\u{20AC}",
        "trade" => "\u{2122}",
        "larr" => "\u{2190}",
        "rarr" => "\u{2192}",
        _ => return None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_void_and_raw_text() {
        assert!(is_void_element("br"));
        assert!(!is_void_element("div"));
        assert!(is_raw_text_element("script"));
        assert!(!is_raw_text_element("pre"));
    }

    #[test]
    fn test_auto_close_rules() {
        assert!(auto_closes("p", "div"));
        assert!(auto_closes("li", "li"));
        assert!(auto_closes("td", "tr"));
        assert!(!auto_closes("div", "p"));
        assert!(!auto_closes("li", "ul"));
        assert!(has_optional_end("li"));
        assert!(!has_optional_end("span"));
    }

    #[test]
    fn test_entity_lookup() {
        assert_eq!(lookup_entity("copy"), Some("\u{A9}"));
        assert_eq!(lookup_entity("amp"), Some("&"));
        assert_eq!(lookup_entity("bogus"), None);
    }
}
