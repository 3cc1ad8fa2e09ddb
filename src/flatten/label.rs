const BLOCK_ELEMENTS: &[&str] = &[
    "address",
    "article",
    "blockquote",
    "dd",
    "div",
    "dl",
    "dt",
    "figcaption",
    "footer",
    "h1",
    "h2",
    "h3",
    "h4",
    "h5",
    "h6",
    "header",
    "hr",
    "li",
    "ol",
    "p",
    "pre",
    "section",
    "table",
    "tr",
    "ul",
];

/// Collects the label text of an island as trimmed lines.
///
/// Literal newlines, `<br>` and block element boundaries start a new line.
/// The whole text is trimmed first, so blank lines survive only between
/// content. Whitespace-only text nodes between elements count as a single
/// space and never break a line.
pub fn label_lines(island: roxmltree::Node) -> Vec<String> {
    let mut raw = String::new();
    collect_text(island, &mut raw);
    let raw = raw.trim();
    if raw.is_empty() {
        return Vec::new();
    }
    raw.lines().map(|line| line.trim().to_string()).collect()
}

/// The first element inside the island, whose style stands for the whole label.
pub fn first_element_descendant<'a, 'input>(
    island: roxmltree::Node<'a, 'input>,
) -> Option<roxmltree::Node<'a, 'input>> {
    island.descendants().skip(1).find(|n| n.is_element())
}

fn collect_text(node: roxmltree::Node, out: &mut String) {
    for child in node.children() {
        if child.is_text() {
            match child.text() {
                Some(text) if text.trim().is_empty() => out.push(' '),
                Some(text) => out.push_str(text),
                None => {}
            }
            continue;
        }
        if !child.is_element() {
            continue;
        }
        let name = child.tag_name().name().to_ascii_lowercase();
        if matches!(name.as_str(), "style" | "script") {
            continue;
        }
        if name == "br" {
            out.push('\n');
            continue;
        }
        let block = BLOCK_ELEMENTS.contains(&name.as_str());
        if block {
            break_line(out);
        }
        collect_text(child, out);
        if block {
            break_line(out);
        }
    }
}

fn break_line(out: &mut String) {
    let current = out.rsplit('\n').next().unwrap_or_default();
    if !current.trim().is_empty() {
        out.push('\n');
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn island_lines(svg: &str) -> Vec<String> {
        let doc = roxmltree::Document::parse(svg).unwrap();
        let island = doc
            .descendants()
            .find(|n| n.has_tag_name("foreignObject"))
            .unwrap();
        label_lines(island)
    }

    #[test]
    fn single_paragraph() {
        let lines = island_lines(
            r#"<svg><foreignObject><div><span class="nodeLabel"><p>  Input </p></span></div></foreignObject></svg>"#,
        );
        assert_eq!(lines, vec!["Input"]);
    }

    #[test]
    fn br_and_blocks_split_lines() {
        let lines = island_lines(
            r#"<svg><foreignObject><div>first<br/>second<p>third</p>fourth<br></br></div></foreignObject></svg>"#,
        );
        assert_eq!(lines, vec!["first", "second", "third", "fourth"]);
    }

    #[test]
    fn literal_newlines_and_indentation() {
        let lines = island_lines(
            "<svg><foreignObject>\n  <div>\n    alpha\r\n   beta  \n  </div>\n</foreignObject></svg>",
        );
        assert_eq!(lines, vec!["alpha", "beta"]);
    }

    #[test]
    fn inline_elements_join_text() {
        let lines = island_lines(
            r#"<svg><foreignObject><div>a <b>bold</b> <i>move</i></div></foreignObject></svg>"#,
        );
        assert_eq!(lines, vec!["a bold move"]);
    }

    #[test]
    fn blank_interior_lines_are_kept() {
        let lines = island_lines("<svg><foreignObject><div>\n a\n\n b \n</div></foreignObject></svg>");
        assert_eq!(lines, vec!["a", "", "b"]);

        let lines = island_lines(
            r#"<svg><foreignObject><div>top<br/><br/>bottom</div></foreignObject></svg>"#,
        );
        assert_eq!(lines, vec!["top", "", "bottom"]);
    }

    #[test]
    fn indented_blocks_do_not_add_blank_lines() {
        let lines = island_lines(
            "<svg><foreignObject>\n  <div>\n    <p>one</p>\n    <p>two</p>\n  </div>\n</foreignObject></svg>",
        );
        assert_eq!(lines, vec!["one", "two"]);
    }

    #[test]
    fn whitespace_only_island_is_empty() {
        let lines = island_lines("<svg><foreignObject><div>  \n </div></foreignObject></svg>");
        assert!(lines.is_empty());
    }

    #[test]
    fn first_element_skips_text() {
        let doc =
            roxmltree::Document::parse("<svg><foreignObject> x <div id=\"d\"/></foreignObject></svg>")
                .unwrap();
        let island = doc
            .descendants()
            .find(|n| n.has_tag_name("foreignObject"))
            .unwrap();
        let first = first_element_descendant(island).unwrap();
        assert_eq!(first.attribute("id"), Some("d"));
    }
}
