// src/extract/html.rs
//! Tag-name + class selector over raw HTML.
//! Naive on purpose: no DOM, just balanced open/close scanning for one tag name.

use once_cell::sync::OnceCell;
use regex::{Captures, Regex};

use crate::source::SelectorRule;

/// Comments and script/style/template bodies. Their contents never render as
/// elements; whichever of them starts first wins.
fn re_hidden() -> &'static Regex {
    static RE: OnceCell<Regex> = OnceCell::new();
    RE.get_or_init(|| {
        Regex::new(
            r"(?is)<!--.*?-->|<(script)\b[^>]*>.*?</script\s*>|<(style)\b[^>]*>.*?</style\s*>|<(template)\b[^>]*>.*?</template\s*>",
        )
        .unwrap()
    })
}

fn re_tags() -> &'static Regex {
    static RE: OnceCell<Regex> = OnceCell::new();
    RE.get_or_init(|| Regex::new(r#"(?s)</?[A-Za-z!](?:[^"'>]|"[^"]*"|'[^']*')*>"#).unwrap())
}

fn re_ws() -> &'static Regex {
    static RE: OnceCell<Regex> = OnceCell::new();
    RE.get_or_init(|| Regex::new(r"\s+").unwrap())
}

fn re_class_attr() -> &'static Regex {
    static RE: OnceCell<Regex> = OnceCell::new();
    RE.get_or_init(|| {
        Regex::new(r#"(?i)(?:^|\s)class\s*=\s*(?:"([^"]*)"|'([^']*)'|([^\s"'=<>`]+))"#).unwrap()
    })
}

#[derive(Debug)]
struct Element {
    open_start: usize,
    content_start: usize,
    content_end: Option<usize>,
    matches: bool,
}

enum Mark<'a> {
    Open {
        start: usize,
        end: usize,
        attrs: &'a str,
    },
    Close {
        start: usize,
    },
}

impl Mark<'_> {
    fn pos(&self) -> usize {
        match self {
            Mark::Open { start, .. } | Mark::Close { start } => *start,
        }
    }
}

/// Text of every element matching `rule`, in document order.
/// Text is tag-stripped, entity-decoded, whitespace-collapsed and trimmed;
/// elements with no text are skipped.
pub fn select_texts(html: &str, rule: &SelectorRule) -> Result<Vec<String>, regex::Error> {
    let wanted = rule.tag.trim();
    let html = re_hidden().replace_all(html, |caps: &Captures| {
        let block = caps.get(1).or_else(|| caps.get(2)).or_else(|| caps.get(3));
        match block {
            // the rule itself targets this raw-text element
            Some(name) if name.as_str().eq_ignore_ascii_case(wanted) => caps[0].to_string(),
            _ => String::new(),
        }
    });
    let tag = regex::escape(wanted);
    // attribute values may contain `>` when quoted
    let open_re = Regex::new(&format!(
        r#"(?i)<{tag}((?:\s+[^\s"'>/=]+(?:\s*=\s*(?:"[^"]*"|'[^']*'|[^\s"'>]+))?)*\s*/?)>"#
    ))?;
    let close_re = Regex::new(&format!(r"(?i)</{tag}\s*>"))?;

    let mut marks: Vec<Mark> = open_re
        .captures_iter(&html)
        .filter_map(|c| {
            let m = c.get(0)?;
            Some(Mark::Open {
                start: m.start(),
                end: m.end(),
                attrs: c.get(1).map_or("", |a| a.as_str()),
            })
        })
        .chain(close_re.find_iter(&html).map(|m| Mark::Close { start: m.start() }))
        .collect();
    marks.sort_by_key(Mark::pos);

    let mut elements: Vec<Element> = Vec::new();
    let mut stack: Vec<usize> = Vec::new();
    for mark in marks {
        match mark {
            Mark::Open { start, end, attrs } => {
                let self_closing = attrs.trim_end().ends_with('/');
                elements.push(Element {
                    open_start: start,
                    content_start: end,
                    content_end: self_closing.then_some(end),
                    matches: class_matches(attrs, &rule.class),
                });
                if !self_closing {
                    stack.push(elements.len() - 1);
                }
            }
            Mark::Close { start } => {
                // stray closers are ignored
                if let Some(idx) = stack.pop() {
                    elements[idx].content_end = Some(start);
                }
            }
        }
    }

    // Unclosed elements run up to the next element of the same name.
    let mut texts = Vec::new();
    for (i, el) in elements.iter().enumerate() {
        if !el.matches {
            continue;
        }
        let end = el.content_end.unwrap_or_else(|| {
            elements
                .get(i + 1)
                .map_or(html.len(), |next| next.open_start)
        });
        let text = element_text(&html[el.content_start..end]);
        if !text.is_empty() {
            texts.push(text);
        }
    }
    Ok(texts)
}

/// Single-word rules match one class token; multi-word rules must match the
/// whole attribute value (whitespace-normalized).
fn class_matches(attrs: &str, wanted: &str) -> bool {
    let wanted = wanted.split_whitespace().collect::<Vec<_>>();
    let Some(caps) = re_class_attr().captures(attrs) else {
        return wanted.is_empty();
    };
    let value = caps
        .get(1)
        .or_else(|| caps.get(2))
        .or_else(|| caps.get(3))
        .map_or("", |m| m.as_str());
    let have = value.split_whitespace().collect::<Vec<_>>();
    match wanted.as_slice() {
        [] => true,
        [one] => have.contains(one),
        many => have == many,
    }
}

fn element_text(inner: &str) -> String {
    let stripped = re_tags().replace_all(inner, "");
    let decoded = html_escape::decode_html_entities(&stripped);
    re_ws().replace_all(&decoded, " ").trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rule(tag: &str, class: &str) -> SelectorRule {
        SelectorRule::new(tag, class)
    }

    #[test]
    fn picks_matching_class_in_document_order() {
        let html = r#"
            <ul>
              <li class="card"><h2 class="title big">Flat 12</h2></li>
              <li class="card"><h2 class="subtitle">ignore me</h2></li>
              <li class="card"><H2 CLASS='title'>Flat 13</H2></li>
            </ul>"#;
        let out = select_texts(html, &rule("h2", "title")).unwrap();
        assert_eq!(out, vec!["Flat 12", "Flat 13"]);
    }

    #[test]
    fn quoted_gt_in_attribute_stays_in_the_tag() {
        let html = r#"<h2 class="title" x-show="n > 0">Flat 12</h2>
            <h2 data-cond='a>b' class=title>Flat 13 <span title="x > y">(new)</span></h2>"#;
        let out = select_texts(html, &rule("h2", "title")).unwrap();
        assert_eq!(out, vec!["Flat 12", "Flat 13 (new)"]);
    }

    #[test]
    fn script_style_and_template_bodies_are_not_elements() {
        let html = r#"<script>var t = '<h2 class="title">Template</h2>';</script>
            <style>h2.title::after { content: "<h2 class='title'>x</h2>"; }</style>
            <template id="card"><h2 class="title">Placeholder</h2></template>
            <h2 class="title">Flat 12</h2>"#;
        let out = select_texts(html, &rule("h2", "title")).unwrap();
        assert_eq!(out, vec!["Flat 12"]);
    }

    #[test]
    fn raw_text_element_can_itself_be_selected() {
        let html = r#"<template class="row">Flat 9</template><p class="row">Flat 10</p>"#;
        let out = select_texts(html, &rule("template", "row")).unwrap();
        assert_eq!(out, vec!["Flat 9"]);
    }

    #[test]
    fn nested_markup_and_entities_are_flattened() {
        let html = r#"<div class="addr">Main&nbsp;St <b>12</b>,
            <span>Utrecht &amp; co</span></div>"#;
        let out = select_texts(html, &rule("div", "addr")).unwrap();
        assert_eq!(out, vec!["Main St 12, Utrecht & co"]);
    }

    #[test]
    fn same_name_nesting_is_balanced() {
        let html = r#"<div class="item"><div class="price">100</div>Flat A</div><div class="item">Flat B</div>"#;
        let out = select_texts(html, &rule("div", "item")).unwrap();
        assert_eq!(out, vec!["100Flat A", "Flat B"]);
    }

    #[test]
    fn tag_name_prefix_does_not_match() {
        let html = r#"<h2x class="t">no</h2x><h2 class="t">yes</h2>"#;
        assert_eq!(select_texts(html, &rule("h2", "t")).unwrap(), vec!["yes"]);
    }

    #[test]
    fn comments_and_empty_elements_are_skipped() {
        let html = r#"<!-- <p class="x">old</p> --><p class="x">  </p><p class="x">new</p>"#;
        assert_eq!(select_texts(html, &rule("p", "x")).unwrap(), vec!["new"]);
    }

    #[test]
    fn unclosed_element_stops_at_next_sibling() {
        let html = r#"<p class="x">one<p class="x">two"#;
        assert_eq!(select_texts(html, &rule("p", "x")).unwrap(), vec!["one", "two"]);
    }

    #[test]
    fn multi_word_class_matches_whole_value() {
        let html = r#"<a class="result  link">A</a><a class="result">B</a>"#;
        assert_eq!(
            select_texts(html, &rule("a", "result link")).unwrap(),
            vec!["A"]
        );
    }

    #[test]
    fn nothing_matched_is_empty() {
        let html = "<html><body><p>hello</p></body></html>";
        assert!(select_texts(html, &rule("h2", "title")).unwrap().is_empty());
    }
}
