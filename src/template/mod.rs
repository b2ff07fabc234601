//! Template loading and per-request rendering.
//!
//! ```text
//! startup:  TemplateStore::load(name, fragments) ──► Arc<TemplateSet>
//! request:  TemplateSet::execute(&RenderContext, &data, &errors) ──► Response
//! ```

mod render;
mod store;

pub use render::{RenderContext, TEMPLATE_FAILURE_MESSAGE};
pub use store::{TemplateSet, TemplateStore};

/// Escape text for inclusion in HTML content or a quoted attribute.
pub fn html_escape(s: &str) -> String {
    let mut result = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => result.push_str("&amp;"),
            '<' => result.push_str("&lt;"),
            '>' => result.push_str("&gt;"),
            '"' => result.push_str("&quot;"),
            '\'' => result.push_str("&#x27;"),
            _ => result.push(c),
        }
    }
    result
}
