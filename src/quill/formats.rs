//! Treeviz dump of template ASTs
//!
//! One line per node, nesting drawn with box characters:
//!
//!     ├─ Expression: "Hi "
//!     ├─ SanitizedTag
//!     │ └─ Expression: "$name"
//!     └─ Directive
//!       ├─ DirectiveName: "if"
//!       └─ Expression: "($a)"
//!
//! Text is quoted and truncated to 30 characters.

use crate::quill::parsing::{Ast, NodeId, NodeKind};

fn truncate(s: &str, max_chars: usize) -> String {
    if s.chars().count() > max_chars {
        let mut truncated = s.chars().take(max_chars).collect::<String>();
        truncated.push_str("...");
        truncated
    } else {
        s.to_string()
    }
}

pub fn to_treeviz_str(ast: &Ast) -> String {
    let mut result = String::new();
    append_children(&mut result, ast, &ast.root().children, "");
    result
}

fn append_node(result: &mut String, ast: &Ast, id: NodeId, prefix: &str, is_last: bool) {
    let connector = if is_last { "└─" } else { "├─" };
    let node = ast.node(id);

    let label = match &node.kind {
        NodeKind::Expression(text) | NodeKind::DirectiveName(text) => format!(
            "{}: {}",
            node.kind.label(),
            truncate(&format!("{:?}", text), 30)
        ),
        kind => kind.label().to_string(),
    };
    result.push_str(&format!("{}{} {}\n", prefix, connector, label));

    let new_prefix = format!("{}{}", prefix, if is_last { "  " } else { "│ " });
    append_children(result, ast, &node.children, &new_prefix);
}

fn append_children(result: &mut String, ast: &Ast, children: &[NodeId], prefix: &str) {
    for (i, child) in children.iter().enumerate() {
        let is_last = i == children.len() - 1;
        append_node(result, ast, *child, prefix, is_last);
    }
}
