//! Section-level HTML rewrites.
//!
//! All transformations run as streaming rewrites over the serialized
//! document; the working buffers are request-scoped and discarded after the
//! final pass.

use std::{cell::RefCell, rc::Rc};

use lol_html::{RewriteStrSettings, element, html_content::ContentType, rewrite_str, text};
use thiserror::Error;
use url::form_urlencoded;

use crate::domain::slug::AnchorSlugger;

const HEADING_SELECTOR: &str = "h1, h2, h3, h4, h5, h6";

#[derive(Debug, Error)]
pub enum FilterError {
    #[error("content rewriting failed: {message}")]
    Rewrite { message: String },
}

impl FilterError {
    fn rewrite(err: impl std::fmt::Display) -> Self {
        Self::Rewrite {
            message: err.to_string(),
        }
    }
}

/// Give every heading a stable anchor id derived from its text.
///
/// Existing ids are kept and reserved so generated ids cannot collide with
/// them; duplicate heading texts receive `-2`, `-3` suffixes in document
/// order.
pub(crate) fn inject_section_ids(html: &str) -> Result<String, FilterError> {
    // First pass: collect (existing id, text) per heading in document order.
    let headings: Rc<RefCell<Vec<(Option<String>, String)>>> = Rc::new(RefCell::new(Vec::new()));

    rewrite_str(
        html,
        RewriteStrSettings {
            element_content_handlers: vec![
                element!(HEADING_SELECTOR, {
                    let headings = Rc::clone(&headings);
                    move |el| {
                        headings
                            .borrow_mut()
                            .push((el.get_attribute("id"), String::new()));
                        Ok(())
                    }
                }),
                text!(HEADING_SELECTOR, {
                    let headings = Rc::clone(&headings);
                    move |chunk| {
                        if let Some(last) = headings.borrow_mut().last_mut() {
                            last.1.push_str(chunk.as_str());
                        }
                        Ok(())
                    }
                }),
            ],
            ..RewriteStrSettings::default()
        },
    )
    .map_err(FilterError::rewrite)?;

    let collected = headings.borrow();
    let mut slugger = AnchorSlugger::new();
    for (existing, _) in collected.iter() {
        if let Some(id) = existing {
            slugger.reserve(id);
        }
    }

    let mut assigned: Vec<Option<String>> = Vec::with_capacity(collected.len());
    for (existing, heading_text) in collected.iter() {
        if existing.is_some() {
            assigned.push(None);
            continue;
        }
        let normalized = heading_text.split_whitespace().collect::<Vec<_>>().join(" ");
        let id = slugger
            .anchor_for(&normalized)
            .or_else(|_| slugger.anchor_for("section"))
            .map_err(FilterError::rewrite)?;
        assigned.push(Some(id));
    }
    drop(collected);

    // Second pass: assign the precomputed ids by heading index.
    let assigned = Rc::new(assigned);
    let index = Rc::new(RefCell::new(0usize));

    rewrite_str(
        html,
        RewriteStrSettings {
            element_content_handlers: vec![element!(HEADING_SELECTOR, {
                let assigned = Rc::clone(&assigned);
                let index = Rc::clone(&index);
                move |el| {
                    let mut idx = index.borrow_mut();
                    let slot = assigned.get(*idx).cloned().flatten();
                    *idx += 1;
                    if let Some(id) = slot {
                        el.set_attribute("id", &id)?;
                    }
                    Ok(())
                }
            })],
            ..RewriteStrSettings::default()
        },
    )
    .map_err(FilterError::rewrite)
}

/// Neutralize markup that must not reach raw consumers such as editors:
/// script/style elements, inline event handlers, and `javascript:` URLs.
pub(crate) fn filter_editor_safety(html: &str) -> Result<String, FilterError> {
    rewrite_str(
        html,
        RewriteStrSettings {
            element_content_handlers: vec![
                element!("script, style", |el| {
                    el.remove();
                    Ok(())
                }),
                element!("*", |el| {
                    let handler_names: Vec<String> = el
                        .attributes()
                        .iter()
                        .map(|attr| attr.name())
                        .filter(|name| name.starts_with("on"))
                        .collect();
                    for name in handler_names {
                        el.remove_attribute(&name);
                    }

                    for attr in ["href", "src"] {
                        if let Some(value) = el.get_attribute(attr) {
                            if value.trim().to_ascii_lowercase().starts_with("javascript:") {
                                el.set_attribute(attr, "#")?;
                            }
                        }
                    }
                    Ok(())
                }),
            ],
            ..RewriteStrSettings::default()
        },
    )
    .map_err(FilterError::rewrite)
}

/// Replace the document with the subtree of the heading carrying
/// `section_id`: the heading itself plus everything up to the next heading of
/// the same or a shallower level. An unknown id yields an empty document.
pub(crate) fn extract_section(html: &str, section_id: &str) -> String {
    let Some((start, level, id_end)) = locate_section_heading(html, section_id) else {
        return String::new();
    };

    let mut end = html.len();
    for boundary_level in 1..=level {
        if let Some(next) = find_heading_start(html, id_end, boundary_level) {
            end = end.min(next);
        }
    }

    html[start..end].to_string()
}

/// Find the opening heading tag that carries `id="{section_id}"`. Returns the
/// tag's start offset, its level, and the offset just past the id attribute.
fn locate_section_heading(html: &str, section_id: &str) -> Option<(usize, u8, usize)> {
    let needles = [
        format!("id=\"{section_id}\""),
        format!("id='{section_id}'"),
    ];

    let mut cursor = 0;
    while cursor < html.len() {
        let (id_index, needle_len) = needles
            .iter()
            .filter_map(|needle| html[cursor..].find(needle).map(|idx| (idx + cursor, needle.len())))
            .min()?;

        let tag_start = html[..id_index].rfind("<h");
        if let Some(tag_start) = tag_start {
            let level = heading_level_at(html, tag_start);
            let tag_close = html[tag_start..].find('>').map(|idx| idx + tag_start);
            if let (Some(level), Some(tag_close)) = (level, tag_close) {
                // The id must sit inside this opening tag, not in later markup.
                if id_index < tag_close {
                    return Some((tag_start, level, id_index + needle_len));
                }
            }
        }

        cursor = id_index + needle_len;
    }

    None
}

fn heading_level_at(html: &str, tag_start: usize) -> Option<u8> {
    let digit = html.as_bytes().get(tag_start + 2)?;
    if digit.is_ascii_digit() && (b'1'..=b'6').contains(digit) {
        // Reject tags like <header>.
        let after = html.as_bytes().get(tag_start + 3)?;
        if *after == b' ' || *after == b'>' {
            return Some(digit - b'0');
        }
    }
    None
}

fn find_heading_start(html: &str, from: usize, level: u8) -> Option<usize> {
    let open_spaced = format!("<h{level} ");
    let open_bare = format!("<h{level}>");

    let spaced = html[from..].find(&open_spaced).map(|idx| idx + from);
    let bare = html[from..].find(&open_bare).map(|idx| idx + from);

    match (spaced, bare) {
        (Some(a), Some(b)) => Some(a.min(b)),
        (Some(a), None) => Some(a),
        (None, Some(b)) => Some(b),
        (None, None) => None,
    }
}

/// Append an inline "edit this section" affordance to every anchored heading.
pub(crate) fn inject_section_edit_links(
    html: &str,
    locale: &str,
    slug: &str,
) -> Result<String, FilterError> {
    rewrite_str(
        html,
        RewriteStrSettings {
            element_content_handlers: vec![element!(HEADING_SELECTOR, |el| {
                if let Some(id) = el.get_attribute("id") {
                    let query = form_urlencoded::Serializer::new(String::new())
                        .append_pair("section", &id)
                        .finish();
                    let link = format!(
                        "<a class=\"edit-section\" data-section-id=\"{id}\" \
                         href=\"/docs/{locale}/{slug}/edit?{query}\">Edit</a>"
                    );
                    el.append(&link, ContentType::Html);
                }
                Ok(())
            })],
            ..RewriteStrSettings::default()
        },
    )
    .map_err(FilterError::rewrite)
}

/// Strip blocks marked as excluded from transclusion.
pub(crate) fn filter_out_noinclude(html: &str) -> Result<String, FilterError> {
    rewrite_str(
        html,
        RewriteStrSettings {
            element_content_handlers: vec![element!(".noinclude", |el| {
                el.remove();
                Ok(())
            })],
            ..RewriteStrSettings::default()
        },
    )
    .map_err(FilterError::rewrite)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn inject_ids_dedupes_and_keeps_existing() {
        let html = "<h2>Setup</h2><h2>Setup</h2><h3 id=\"custom\">Named</h3>";
        let out = inject_section_ids(html).expect("rewrite");
        assert!(out.contains("<h2 id=\"setup\">"));
        assert!(out.contains("<h2 id=\"setup-2\">"));
        assert!(out.contains("<h3 id=\"custom\">"));
    }

    #[test]
    fn editor_safety_strips_handlers_and_script_urls() {
        let html = "<p onclick=\"x()\" data-keep=\"1\">t</p>\
                    <a href=\" JavaScript:alert(1)\">link</a>\
                    <style>p{}</style>";
        let out = filter_editor_safety(html).expect("rewrite");
        assert!(!out.contains("onclick"));
        assert!(out.contains("data-keep=\"1\""));
        assert!(out.contains("href=\"#\""));
        assert!(!out.contains("<style>"));
    }

    #[test]
    fn extract_section_stops_at_same_level_heading() {
        let html = "<h2 id=\"a\">A</h2><p>1</p><h3 id=\"a-sub\">S</h3><p>2</p><h2 id=\"b\">B</h2>";
        let out = extract_section(html, "a");
        assert!(out.starts_with("<h2 id=\"a\">"));
        assert!(out.contains("a-sub"));
        assert!(!out.contains("id=\"b\""));
    }

    #[test]
    fn extract_section_ignores_ids_outside_headings() {
        let html = "<h2 id=\"a\">A</h2><div id=\"b\">not a section</div>";
        assert_eq!(extract_section(html, "b"), "");
    }

    #[test]
    fn edit_links_reference_the_section_id() {
        let html = "<h2 id=\"syntax\">Syntax</h2>";
        let out = inject_section_edit_links(html, "fr", "Web/CSS").expect("rewrite");
        assert!(out.contains("/docs/fr/Web/CSS/edit?section=syntax"));
        assert!(out.contains("</a></h2>"));
    }

    #[test]
    fn noinclude_blocks_are_removed_with_their_content() {
        let html = "<p>a</p><section class=\"noinclude extra\"><p>b</p></section>";
        let out = filter_out_noinclude(html).expect("rewrite");
        assert_eq!(out, "<p>a</p>");
    }
}
