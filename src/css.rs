//! A static CSS cascade over a parsed SVG document.
//!
//! Style sheets come from every `<style>` element. For each element the
//! cascade yields declarations in ascending priority: SVG presentation
//! attributes, matching rules (ordered by specificity), the inline `style`
//! attribute, then `!important` rules and inline `!important`. Later entries
//! win. Shorthands the label resolver cares about are expanded on the way in.
//!
//! simplecss rejects identifiers starting with `--`, so custom property
//! names are rewritten to `-_-name` before parsing and restored afterwards.

use std::borrow::Cow;
use std::str::FromStr;

use once_cell::sync::Lazy;
use regex::Regex;
use simplecss::{Declaration, DeclarationTokenizer, StyleSheet};

pub(crate) const SVG_NS: &str = "http://www.w3.org/2000/svg";

const PRESENTATION_ATTRIBUTES: &[&str] = &[
    "color",
    "display",
    "dominant-baseline",
    "fill",
    "fill-opacity",
    "fill-rule",
    "font-family",
    "font-size",
    "font-style",
    "font-weight",
    "opacity",
    "stroke",
    "stroke-dasharray",
    "stroke-linecap",
    "stroke-linejoin",
    "stroke-miterlimit",
    "stroke-opacity",
    "stroke-width",
    "text-anchor",
    "visibility",
];

const INHERITED: &[&str] = &[
    "color",
    "dominant-baseline",
    "fill",
    "fill-opacity",
    "fill-rule",
    "font-family",
    "font-size",
    "font-style",
    "font-weight",
    "line-height",
    "stroke",
    "stroke-dasharray",
    "stroke-linecap",
    "stroke-linejoin",
    "stroke-miterlimit",
    "stroke-opacity",
    "stroke-width",
    "text-anchor",
    "visibility",
];

const MAX_VAR_DEPTH: usize = 16;

static CUSTOM_PROPERTY_NAME: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(^|[{;])(\s*)--([A-Za-z0-9_-]+)(\s*):").unwrap());

const CUSTOM_PROPERTY_MARK: &str = "-_";

fn encode_custom_properties(css: &str) -> Cow<'_, str> {
    CUSTOM_PROPERTY_NAME.replace_all(css, "${1}${2}-_-${3}${4}:")
}

fn decode_property_name(name: &str) -> Cow<'_, str> {
    match name.strip_prefix(CUSTOM_PROPERTY_MARK) {
        Some(rest) => Cow::Owned(format!("-{rest}")),
        None => Cow::Borrowed(name),
    }
}

/// The text of every `<style>` element in a document, ready for [`Cascade::new`].
#[derive(Debug, Clone, Default)]
pub struct StyleSources {
    texts: Vec<String>,
}

impl StyleSources {
    pub fn collect(doc: &roxmltree::Document) -> Self {
        let mut texts = Vec::new();
        for node in doc.descendants().filter(|n| n.has_tag_name("style")) {
            match node.attribute("type") {
                Some("text/css") | None => {}
                Some(_) => continue,
            }
            // CDATA and plain text both surface as text children.
            for text in node.children().filter_map(|child| child.text()) {
                texts.push(encode_custom_properties(text).into_owned());
            }
        }
        Self { texts }
    }
}

pub struct Cascade<'a> {
    sheet: StyleSheet<'a>,
}

impl<'a> Cascade<'a> {
    pub fn new(sources: &'a StyleSources) -> Self {
        let mut sheet = StyleSheet::new();
        for text in &sources.texts {
            sheet.parse_more(text);
        }
        Self { sheet }
    }

    pub fn rule_count(&self) -> usize {
        self.sheet.rules.len()
    }

    /// All declarations that apply to `node`, lowest priority first.
    pub fn declarations(&self, node: roxmltree::Node) -> Vec<(String, String)> {
        let mut out = Vec::new();
        if !node.is_element() {
            return out;
        }

        if node.tag_name().namespace() == Some(SVG_NS) {
            for attr in node.attributes() {
                if attr.namespace().is_none() && PRESENTATION_ATTRIBUTES.contains(&attr.name()) {
                    push_expanded(&mut out, attr.name(), attr.value());
                }
            }
        }

        let element = XmlNode(node);
        let matched: Vec<&Declaration> = self
            .sheet
            .rules
            .iter()
            .filter(|rule| rule.selector.matches(&element))
            .flat_map(|rule| rule.declarations.iter())
            .collect();
        let inline_text = node
            .attribute("style")
            .map(encode_custom_properties)
            .unwrap_or_default();
        let inline: Vec<Declaration> = DeclarationTokenizer::from(&*inline_text).collect();

        for important in [false, true] {
            for decl in matched.iter().filter(|d| d.important == important) {
                push_expanded(&mut out, &decode_property_name(decl.name), decl.value);
            }
            for decl in inline.iter().filter(|d| d.important == important) {
                push_expanded(&mut out, &decode_property_name(decl.name), decl.value);
            }
        }
        out
    }

    /// The cascaded value of `name` on `node` itself, before inheritance.
    pub fn specified(&self, node: roxmltree::Node, name: &str) -> Option<String> {
        self.declarations(node)
            .into_iter()
            .rev()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v)
    }

    /// Like [`Cascade::specified`] with `var()` references substituted.
    pub fn specified_with_vars(&self, node: roxmltree::Node, name: &str) -> Option<String> {
        let raw = self.specified(node, name)?;
        self.substitute_vars(node, &raw, 0)
    }

    /// The value of `name` after inheritance and `var()` substitution.
    pub fn computed(&self, node: roxmltree::Node, name: &str) -> Option<String> {
        let raw = self.computed_raw(node, name)?;
        self.substitute_vars(node, &raw, 0)
    }

    fn computed_raw(&self, node: roxmltree::Node, name: &str) -> Option<String> {
        let inherits = INHERITED.contains(&name) || name.starts_with("--");
        let mut current = Some(node);
        while let Some(element) = current {
            match self.specified(element, name).as_deref().map(str::trim) {
                Some("inherit") => {}
                Some("unset") if inherits => {}
                Some("initial") | Some("unset") => return None,
                Some(value) => return Some(value.to_string()),
                None if inherits => {}
                None => return None,
            }
            current = element.parent_element();
        }
        None
    }

    fn substitute_vars(&self, node: roxmltree::Node, value: &str, depth: usize) -> Option<String> {
        let Some(start) = value.find("var(") else {
            return Some(value.to_string());
        };
        if depth >= MAX_VAR_DEPTH {
            log::debug!("var() nesting too deep in '{value}'");
            return None;
        }
        let end = matching_paren(value, start + 3)?;
        let inner = &value[start + 4..end];
        let (var_name, fallback) = match split_top_level_comma(inner) {
            Some((name, fallback)) => (name.trim(), Some(fallback.trim())),
            None => (inner.trim(), None),
        };
        let replacement = match self.computed_raw(node, var_name) {
            Some(v) => self.substitute_vars(node, v.trim(), depth + 1)?,
            None => self.substitute_vars(node, fallback?, depth + 1)?,
        };
        let rest = self.substitute_vars(node, &value[end + 1..], depth + 1)?;
        Some(format!("{}{}{}", &value[..start], replacement, rest))
    }
}

fn matching_paren(value: &str, open: usize) -> Option<usize> {
    let mut depth = 0usize;
    for (idx, ch) in value[open..].char_indices() {
        match ch {
            '(' => depth += 1,
            ')' => {
                depth -= 1;
                if depth == 0 {
                    return Some(open + idx);
                }
            }
            _ => {}
        }
    }
    None
}

fn split_top_level_comma(value: &str) -> Option<(&str, &str)> {
    let mut depth = 0usize;
    for (idx, ch) in value.char_indices() {
        match ch {
            '(' => depth += 1,
            ')' => depth = depth.saturating_sub(1),
            ',' if depth == 0 => return Some((&value[..idx], &value[idx + 1..])),
            _ => {}
        }
    }
    None
}

fn push(out: &mut Vec<(String, String)>, name: &str, value: &str) {
    out.push((name.to_string(), value.trim().to_string()));
}

fn push_expanded(out: &mut Vec<(String, String)>, name: &str, value: &str) {
    let value = value.trim();
    match name {
        "font" => match svgtypes::FontShorthand::from_str(value) {
            Ok(font) => {
                push(out, "font-style", font.font_style.unwrap_or("normal"));
                push(out, "font-weight", font.font_weight.unwrap_or("normal"));
                push(out, "font-size", font.font_size);
                push(out, "font-family", font.font_family);
            }
            Err(_) => log::debug!("failed to parse font shorthand '{value}'"),
        },
        "background" => {
            let color = split_css_tokens(value)
                .into_iter()
                .rev()
                .find(|token| is_color_token(token));
            push(out, "background-color", color.unwrap_or("transparent"));
        }
        "padding" => {
            let parts = split_css_tokens(value);
            let [top, right, bottom, left] = expand_box(&parts);
            push(out, "padding-top", top);
            push(out, "padding-right", right);
            push(out, "padding-bottom", bottom);
            push(out, "padding-left", left);
        }
        "border" => {
            let mut width = "medium";
            let mut style = "none";
            let mut color = "currentColor";
            for token in split_css_tokens(value) {
                if BORDER_STYLES.contains(&token) {
                    style = token;
                } else if is_length_token(token) {
                    width = token;
                } else {
                    color = token;
                }
            }
            push(out, "border-width", width);
            push(out, "border-style", style);
            push(out, "border-color", color);
        }
        _ => push(out, name, value),
    }
}

const BORDER_STYLES: &[&str] = &[
    "none", "hidden", "dotted", "dashed", "solid", "double", "groove", "ridge", "inset", "outset",
];

fn is_length_token(token: &str) -> bool {
    matches!(token, "thin" | "medium" | "thick")
        || token
            .chars()
            .next()
            .is_some_and(|c| c.is_ascii_digit() || c == '.')
}

fn is_color_token(token: &str) -> bool {
    token.eq_ignore_ascii_case("transparent")
        || token.eq_ignore_ascii_case("currentcolor")
        || token.starts_with("var(")
        || svgtypes::Color::from_str(token).is_ok()
}

fn expand_box<'v>(parts: &[&'v str]) -> [&'v str; 4] {
    match parts {
        [] => ["0", "0", "0", "0"],
        [all] => [all, all, all, all],
        [v, h] => [v, h, v, h],
        [t, h, b] => [t, h, b, h],
        [t, r, b, l, ..] => [t, r, b, l],
    }
}

/// Splits on whitespace outside of parentheses.
pub(crate) fn split_css_tokens(value: &str) -> Vec<&str> {
    let mut out = Vec::new();
    let mut depth = 0usize;
    let mut start: Option<usize> = None;
    for (idx, ch) in value.char_indices() {
        match ch {
            '(' => {
                depth += 1;
                start.get_or_insert(idx);
            }
            ')' => {
                depth = depth.saturating_sub(1);
            }
            c if c.is_whitespace() && depth == 0 => {
                if let Some(s) = start.take() {
                    out.push(&value[s..idx]);
                }
            }
            _ => {
                start.get_or_insert(idx);
            }
        }
    }
    if let Some(s) = start {
        out.push(&value[s..]);
    }
    out
}

struct XmlNode<'a, 'input: 'a>(roxmltree::Node<'a, 'input>);

impl simplecss::Element for XmlNode<'_, '_> {
    fn parent_element(&self) -> Option<Self> {
        self.0.parent_element().map(XmlNode)
    }

    fn prev_sibling_element(&self) -> Option<Self> {
        self.0.prev_sibling_element().map(XmlNode)
    }

    fn has_local_name(&self, local_name: &str) -> bool {
        self.0.tag_name().name() == local_name
    }

    fn attribute_matches(&self, local_name: &str, operator: simplecss::AttributeOperator) -> bool {
        match self.0.attribute(local_name) {
            Some(value) => operator.matches(value),
            None => false,
        }
    }

    fn pseudo_class_matches(&self, class: simplecss::PseudoClass) -> bool {
        match class {
            simplecss::PseudoClass::FirstChild => self.prev_sibling_element().is_none(),
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn find<'a, 'i>(doc: &'a roxmltree::Document<'i>, id: &str) -> roxmltree::Node<'a, 'i> {
        doc.descendants()
            .find(|n| n.attribute("id") == Some(id))
            .unwrap()
    }

    const DOC: &str = r##"<svg xmlns="http://www.w3.org/2000/svg" id="root" style="--accent: #ff0000">
  <style>
    #root .label { color: #333333; font-family: "trebuchet ms", verdana, sans-serif; }
    #root .nodeLabel { color: #111111 !important; }
    .edgeLabel p { background-color: rgba(232,232,232, 0.8); }
    .tinted { color: var(--accent); border-color: var(--missing, #00ff00); }
  </style>
  <g class="label" id="g1" fill="#abcdef">
    <foreignObject width="80" height="24">
      <div xmlns="http://www.w3.org/1999/xhtml" id="d1" style="color: blue">
        <span class="nodeLabel" id="s1" style="color: green">x</span>
      </div>
    </foreignObject>
  </g>
  <g class="edgeLabel"><foreignObject width="10" height="10">
    <div xmlns="http://www.w3.org/1999/xhtml"><p id="p1" class="tinted" style="font: bold 12pt serif">y</p></div>
  </foreignObject></g>
</svg>"##;

    #[test]
    fn presentation_attributes_rank_below_rules_and_inline() {
        let doc = roxmltree::Document::parse(DOC).unwrap();
        let styles = StyleSources::collect(&doc);
        let cascade = Cascade::new(&styles);
        assert!(cascade.rule_count() >= 4);
        let g = find(&doc, "g1");
        assert_eq!(cascade.specified(g, "fill").as_deref(), Some("#abcdef"));
        assert_eq!(cascade.specified(g, "color").as_deref(), Some("#333333"));
    }

    #[test]
    fn inline_beats_rules_and_important_beats_inline() {
        let doc = roxmltree::Document::parse(DOC).unwrap();
        let styles = StyleSources::collect(&doc);
        let cascade = Cascade::new(&styles);
        assert_eq!(
            cascade.computed(find(&doc, "d1"), "color").as_deref(),
            Some("blue")
        );
        assert_eq!(
            cascade.computed(find(&doc, "s1"), "color").as_deref(),
            Some("#111111")
        );
    }

    #[test]
    fn inherited_properties_walk_up_through_svg_ancestors() {
        let doc = roxmltree::Document::parse(DOC).unwrap();
        let styles = StyleSources::collect(&doc);
        let cascade = Cascade::new(&styles);
        let div = find(&doc, "d1");
        assert_eq!(
            cascade.computed(div, "font-family").as_deref(),
            Some("\"trebuchet ms\", verdana, sans-serif")
        );
        assert_eq!(cascade.computed(div, "background-color"), None);
    }

    #[test]
    fn shorthands_and_custom_properties() {
        let doc = roxmltree::Document::parse(DOC).unwrap();
        let styles = StyleSources::collect(&doc);
        let cascade = Cascade::new(&styles);
        let p = find(&doc, "p1");
        assert_eq!(
            cascade.computed(p, "background-color").as_deref(),
            Some("rgba(232,232,232, 0.8)")
        );
        assert_eq!(cascade.computed(p, "font-weight").as_deref(), Some("bold"));
        assert_eq!(cascade.computed(p, "font-size").as_deref(), Some("12pt"));
        assert_eq!(cascade.computed(p, "font-family").as_deref(), Some("serif"));
        assert_eq!(cascade.computed(p, "color").as_deref(), Some("#ff0000"));
        assert_eq!(
            cascade.computed(p, "border-color").as_deref(),
            Some("#00ff00")
        );
    }

    #[test]
    fn box_and_border_shorthands_expand() {
        let mut out = Vec::new();
        push_expanded(&mut out, "padding", "2px 4px");
        push_expanded(&mut out, "border", "1.5px solid rgba(0, 0, 0, 0.5)");
        push_expanded(&mut out, "background", "url(x.png) no-repeat #fafafa");
        let get = |name: &str| {
            out.iter()
                .rev()
                .find(|(n, _)| n == name)
                .map(|(_, v)| v.as_str())
        };
        assert_eq!(get("padding-top"), Some("2px"));
        assert_eq!(get("padding-left"), Some("4px"));
        assert_eq!(get("border-width"), Some("1.5px"));
        assert_eq!(get("border-style"), Some("solid"));
        assert_eq!(get("border-color"), Some("rgba(0, 0, 0, 0.5)"));
        assert_eq!(get("background-color"), Some("#fafafa"));
    }

    #[test]
    fn custom_properties_in_rules_inherit() {
        let svg = r#"<svg xmlns="http://www.w3.org/2000/svg"><style>.wrap { --tone: #123456; fill: red } .leaf { color: var(--tone) }</style><g class="wrap" id="w"><g><text class="leaf" id="t">x</text></g></g></svg>"#;
        let doc = roxmltree::Document::parse(svg).unwrap();
        let styles = StyleSources::collect(&doc);
        let cascade = Cascade::new(&styles);
        assert_eq!(
            cascade.specified(find(&doc, "w"), "--tone").as_deref(),
            Some("#123456")
        );
        assert_eq!(cascade.specified(find(&doc, "w"), "fill").as_deref(), Some("red"));
        assert_eq!(
            cascade.computed(find(&doc, "t"), "color").as_deref(),
            Some("#123456")
        );
    }

    #[test]
    fn custom_property_names_round_trip() {
        assert_eq!(
            encode_custom_properties("--a: 1; b: var(--a)"),
            "-_-a: 1; b: var(--a)"
        );
        assert_eq!(decode_property_name("-_-a"), "--a");
        assert_eq!(decode_property_name("fill"), "fill");
    }

    #[test]
    fn tokens_respect_parentheses() {
        assert_eq!(
            split_css_tokens("1px  solid rgb(1, 2, 3)"),
            vec!["1px", "solid", "rgb(1, 2, 3)"]
        );
    }
}
