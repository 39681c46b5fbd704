//! HTML and URL sanitization for rendered chat output.
//!
//! The markdown pipeline treats sanitization as a pure function over an
//! allow-list [`Policy`]: only listed tags and attributes survive, URLs must
//! match an allow-listed scheme set, and everything else is either dropped or
//! entity-escaped. Sanitized HTML is the only representation that may reach
//! the rendering host.

mod escape;
mod html;
mod policy;
mod url;

pub use escape::escape_attr;
pub use escape::escape_text;
pub use html::sanitize;
pub use policy::Policy;
pub use url::is_allowed_uri;
pub use url::sanitize_url;
