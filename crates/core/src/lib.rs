//! Core data types for markup processing: qualified names, attribute lists,
//! source positions and the stream event model that every other crate in the
//! workspace produces, transforms or consumes.

pub mod attrs;
pub mod escape;
pub mod events;
pub mod qname;

pub use attrs::Attributes;
pub use escape::{escape, unescape};
pub use events::{Event, Position};
pub use qname::{Namespace, QName};

/// The XHTML namespace, used by the HTML-flavored serializers.
pub const XHTML_NAMESPACE: &str = "http://www.w3.org/1999/xhtml";
