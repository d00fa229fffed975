//! Document type declarations.

use weft_core::escape;

/// A `(name, pubid, sysid)` document type declaration, emitted at most
/// once at the top of the output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocType {
    pub name: String,
    pub pubid: Option<String>,
    pub sysid: Option<String>,
}

impl DocType {
    pub fn new(name: impl Into<String>, pubid: Option<String>, sysid: Option<String>) -> Self {
        DocType {
            name: name.into(),
            pubid,
            sysid,
        }
    }

    pub fn html_strict() -> Self {
        DocType::new(
            "html",
            Some("-//W3C//DTD HTML 4.01//EN".into()),
            Some("http://www.w3.org/TR/html4/strict.dtd".into()),
        )
    }

    pub fn html_transitional() -> Self {
        DocType::new(
            "html",
            Some("-//W3C//DTD HTML 4.01 Transitional//EN".into()),
            Some("http://www.w3.org/TR/html4/loose.dtd".into()),
        )
    }

    pub fn xhtml_strict() -> Self {
        DocType::new(
            "html",
            Some("-//W3C//DTD XHTML 1.0 Strict//EN".into()),
            Some("http://www.w3.org/TR/xhtml1/DTD/xhtml1-strict.dtd".into()),
        )
    }

    pub fn xhtml_transitional() -> Self {
        DocType::new(
            "html",
            Some("-//W3C//DTD XHTML 1.0 Transitional//EN".into()),
            Some("http://www.w3.org/TR/xhtml1/DTD/xhtml1-transitional.dtd".into()),
        )
    }

    /// The serialized declaration, ending in a newline.
    pub(crate) fn chunk(&self) -> String {
        render(&self.name, self.pubid.as_deref(), self.sysid.as_deref())
    }
}

/// Serializes a doctype declaration from its parts.
pub(crate) fn render(name: &str, pubid: Option<&str>, sysid: Option<&str>) -> String {
    let mut out = format!("<!DOCTYPE {name}");
    if let Some(pubid) = pubid {
        out.push_str(&format!(" PUBLIC \"{}\"", escape(pubid, true)));
    } else if sysid.is_some() {
        out.push_str(" SYSTEM");
    }
    if let Some(sysid) = sysid {
        out.push_str(&format!(" \"{}\"", escape(sysid, true)));
    }
    out.push_str(">\n");
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_public_doctype() {
        assert_eq!(
            DocType::html_strict().chunk(),
            "<!DOCTYPE html PUBLIC \"-//W3C//DTD HTML 4.01//EN\" \
             \"http://www.w3.org/TR/html4/strict.dtd\">\n"
        );
    }

    #[test]
    fn test_system_only_doctype() {
        assert_eq!(
            render("html", None, Some("about:legacy-compat")),
            "<!DOCTYPE html SYSTEM \"about:legacy-compat\">\n"
        );
    }

    #[test]
    fn test_bare_doctype() {
        assert_eq!(render("html", None, None), "<!DOCTYPE html>\n");
    }
}
