use colored::Colorize;

use crate::tree::{ViewNode, directory_first};

const INDENT: &str = "  ";

/// Renders the projected forest as an indented tree, directories first.
pub fn render_tree(view: &[ViewNode], styled: bool) -> String {
    let mut out = String::new();
    render_level(&mut out, view, 0, styled);
    out
}

fn render_level(out: &mut String, nodes: &[ViewNode], depth: usize, styled: bool) {
    let mut ordered = nodes.iter().collect::<Vec<_>>();
    ordered.sort_by(|a, b| directory_first(a, b));

    for node in ordered {
        out.push_str(&INDENT.repeat(depth));
        out.push_str(&render_line(node, styled));
        out.push('\n');
        if let Some(children) = &node.children {
            render_level(out, children, depth + 1, styled);
        }
    }
}

fn render_line(node: &ViewNode, styled: bool) -> String {
    match node.children_count {
        Some(count) => {
            let name = format!("{}/", node.name);
            let count = format!("({count})");
            if styled {
                format!("{} {}", name.blue().bold(), count.dimmed())
            } else {
                format!("{name} {count}")
            }
        }
        None => {
            let icon = format!("[{}]", node.icon);
            if styled {
                format!("{} {}", node.name, icon.dimmed())
            } else {
                format!("{} {icon}", node.name)
            }
        }
    }
}

/// Whether stdout can show colors, unless the user opted out.
pub fn stdout_supports_color(no_color: bool) -> bool {
    !no_color && supports_color::on(supports_color::Stream::Stdout).is_some()
}
