use crate::ast::{NodeId, NodeKind, Tree};

/// Renders a completed tree to the generated output text.
///
/// The render is bottom-up: a node's children are rendered and concatenated
/// in child order before being wrapped in the node's own template. Section
/// declarations end up as a flat set at the top level, which is what lets an
/// `\include` reference a section declared later in the output.
pub(crate) fn generate(tree: &Tree) -> String {
    render_node(tree, Tree::ROOT)
}

fn render_children(tree: &Tree, id: NodeId) -> String {
    let mut out = String::new();
    for &child in &tree.node(id).children {
        out.push_str(&render_node(tree, child));
    }
    out
}

/// Style bodies are joined and stripped of newlines before being embedded.
fn join_styles(styles: &[String]) -> String {
    styles.join(" ").replace('\n', "")
}

fn render_node(tree: &Tree, id: NodeId) -> String {
    match &tree.node(id).kind {
        NodeKind::Root {
            variables,
            scripts,
            styles,
            ..
        } => {
            let mut out = String::new();
            for statement in variables {
                out.push_str(statement);
                out.push('\n');
            }
            for script in scripts {
                out.push_str(script);
                out.push('\n');
            }
            if !styles.is_empty() {
                out.push_str("registerStyle(`");
                out.push_str(&join_styles(styles));
                out.push_str("`);\n");
            }
            for &child in &tree.node(id).children {
                out.push_str(&render_node(tree, child));
                out.push('\n');
            }
            out
        }
        NodeKind::Section {
            name,
            params,
            variables,
            scripts,
            styles,
        } => {
            let mut body = String::new();
            for script in scripts {
                body.push_str(script.trim());
                body.push(' ');
            }
            for statement in variables {
                body.push_str(statement);
                body.push(' ');
            }
            let mut markup = String::new();
            if !styles.is_empty() {
                markup.push_str("<style>");
                markup.push_str(&join_styles(styles));
                markup.push_str("</style>");
            }
            markup.push_str(&render_children(tree, id));
            format!(
                "function {}({}) {{ {}return `{}`; }}",
                name,
                params.join(", "),
                body,
                markup
            )
        }
        NodeKind::Text { text } => text.clone(),
        NodeKind::LineBreak => "<br>".to_string(),
        NodeKind::Heading1 => format!("<h1>{}</h1>", render_children(tree, id)),
        NodeKind::Heading2 => format!("<h2>{}</h2>", render_children(tree, id)),
        NodeKind::Bold => format!("<strong>{}</strong>", render_children(tree, id)),
        NodeKind::Emphasis => format!("<em>{}</em>", render_children(tree, id)),
        NodeKind::If {
            condition,
            else_branch,
        } => {
            // The condition is evaluated by the host at display time; the
            // generator only emits the interpolation slot.
            let if_content = render_children(tree, id);
            let else_content = match else_branch {
                Some(else_id) => render_children(tree, *else_id),
                None => String::new(),
            };
            if if_content.trim().is_empty() && else_content.trim().is_empty() {
                return String::new();
            }
            format!(
                "${{{} ? `{}` : `{}`}}",
                condition, if_content, else_content
            )
        }
        // An Else renders nothing standalone; its content is consumed by the
        // matched If's conditional slot.
        NodeKind::Else { .. } => String::new(),
        NodeKind::Navigate { target, args } => {
            format!(
                "<a onclick=\"navigate({}, [{}])\">{}</a>",
                target,
                args.join(", "),
                render_children(tree, id)
            )
        }
        NodeKind::Show {
            target,
            args,
            preserve,
        } => {
            format!(
                "<a onclick=\"show({}, [{}], {})\">{}</a>",
                target,
                args.join(", "),
                preserve,
                render_children(tree, id)
            )
        }
        NodeKind::Choices => {
            format!("<div class=\"choices\">{}</div>", render_children(tree, id))
        }
        NodeKind::Choice {
            target,
            args,
            preserve,
        } => {
            format!(
                "<a onclick=\"choice({}, [{}], {})\">{}</a>",
                target,
                args.join(", "),
                preserve,
                render_children(tree, id)
            )
        }
        NodeKind::Include { target, args } => {
            // Lazy call expression: evaluated when the including section's
            // function runs, so forward references are fine.
            format!("${{{}({})}}", target, args.join(", "))
        }
        NodeKind::Print { expr } => format!("${{{}}}", expr),
        NodeKind::Image {
            url,
            height,
            width,
            alt,
        } => {
            format!(
                "<img src=\"${{{}}}\" height=\"${{{}}}\" width=\"${{{}}}\" alt=\"${{{}}}\">",
                url, height, width, alt
            )
        }
        NodeKind::Input {
            kind,
            binding,
            placeholder,
        } => match placeholder {
            Some(placeholder) => format!(
                "<input type=\"{}\" onchange=\"{} = this.value\" placeholder=\"{}\" />",
                kind, binding, placeholder
            ),
            None => format!(
                "<input type=\"{}\" onchange=\"{} = this.value\" />",
                kind, binding
            ),
        },
    }
}
