//! Rendered HTML to visible plain text.

use crate::utils::collapse_whitespace;
use scraper::{Html, Node};

/// Elements whose text never reaches the reader.
const HIDDEN: &[&str] = &["script", "style", "noscript", "template", "head", "svg", "iframe"];

/// Visible text of an HTML document, whitespace normalised.
pub fn html_to_text(html: &str) -> String {
    let document = Html::parse_document(html);
    let mut out = String::new();

    for node in document.root_element().descendants() {
        let Node::Text(text) = node.value() else {
            continue;
        };
        let hidden = node.ancestors().any(|ancestor| {
            ancestor
                .value()
                .as_element()
                .is_some_and(|el| HIDDEN.contains(&el.name()))
        });
        if hidden {
            continue;
        }
        out.push_str(text);
        // Block boundaries in the source do not always carry whitespace
        out.push('\n');
    }

    collapse_whitespace(&out)
}
