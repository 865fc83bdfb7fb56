use anyhow::{anyhow, Result};
use blitz_dom::BaseDocument;
use html_escape::encode_text;

use crate::bridge::NodeId;

/// Replace the content of `node` with a visible start-up failure message.
pub fn render_error_overlay(document: &mut BaseDocument, node: NodeId, message: &str) -> Result<()> {
    document
        .get_node(node)
        .ok_or_else(|| anyhow!("missing overlay node {node}"))?;

    let markup = format!(
        "<div style=\"color: red; padding: 20px;\">Failed to load engine: {}</div>",
        encode_text(message)
    );
    document.mutate().set_inner_html(node, &markup);
    Ok(())
}
