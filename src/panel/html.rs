//! Listbox markup

use std::fmt::Write;

use super::Panel;

/// Escape text for HTML content and double-quoted attributes
pub fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            c => out.push(c),
        }
    }
    out
}

pub(super) fn render_listbox(panel: &Panel) -> String {
    let mut html = String::new();
    let state = if panel.is_open() { " open" } else { "" };
    let _ = write!(
        html,
        r#"<ul id="{}" class="lookup-panel{}" role="listbox">"#,
        escape_html(panel.id()),
        state
    );

    for (i, row) in panel.rows().iter().enumerate() {
        let mut class = String::from("lookup-option");
        if row.active {
            class.push_str(" active");
        }
        if row.disabled {
            class.push_str(" disabled");
        }

        let _ = write!(
            html,
            r#"<li id="{}" class="{}" role="option" aria-selected="{}""#,
            escape_html(&row.option_id),
            class,
            row.active
        );
        if row.disabled {
            html.push_str(r#" aria-disabled="true">"#);
        } else {
            let _ = write!(html, r#" data-index="{}">"#, i);
        }

        let _ = write!(
            html,
            r#"<span class="lookup-primary">{}</span>"#,
            escape_html(&row.primary)
        );
        if let Some(secondary) = &row.secondary {
            let _ = write!(
                html,
                r#"<span class="lookup-secondary">{}</span>"#,
                escape_html(secondary)
            );
        }
        html.push_str("</li>");
    }

    html.push_str("</ul>");
    html
}
