//! Entity-safe escaping of character data.

/// Escapes `&`, `<` and `>`, and (when `quotes` is set) `"` as `&#34;`.
///
/// Escaping quotes is only required for text that ends up inside attribute
/// values.
pub fn escape(text: &str, quotes: bool) -> String {
    let mut out = String::with_capacity(text.len());
    for ch in text.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' if quotes => out.push_str("&#34;"),
            _ => out.push(ch),
        }
    }
    out
}

/// Reverses [`escape`]: replaces the core entities with their characters.
pub fn unescape(text: &str) -> String {
    text.replace("&#34;", "\"")
        .replace("&quot;", "\"")
        .replace("&gt;", ">")
        .replace("&lt;", "<")
        .replace("&amp;", "&")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_escape_text() {
        assert_eq!(escape("<b>\"&\"</b>", false), "&lt;b&gt;\"&amp;\"&lt;/b&gt;");
    }

    #[test]
    fn test_escape_attribute() {
        assert_eq!(escape("say \"hi\"", true), "say &#34;hi&#34;");
    }

    #[test]
    fn test_unescape_round_trip() {
        let text = "a < b & \"c\" > d";
        assert_eq!(unescape(&escape(text, true)), text);
    }
}
