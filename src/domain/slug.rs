//! Hierarchical slug handling.
//!
//! Document slugs are `/`-separated paths within a locale (`Web/CSS/Syntax`).
//! The helpers here split a slug into its addressing parts, validate
//! move-target slugs, and derive deterministic per-document anchor ids for
//! section headings.

use std::collections::HashMap;

use slug::slugify;
use thiserror::Error;

/// Roots too generic to anchor SEO parent titles on their own; the SEO root
/// widens to the first two segments under these.
const GENERIC_SEO_ROOTS: &[&str] = &["Web"];

/// Characters rejected in move-target slugs.
const RESERVED_SLUG_CHARS: &[char] = &[
    '?', '%', '"', '$', '&', '+', ',', ':', ';', '=', '@', '<', '>', '#', '{', '}', '|', '\\', '^',
    '~', '[', ']',
];

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SlugError {
    #[error("slug is empty")]
    Empty,
    #[error("slug contains an empty segment")]
    EmptySegment,
    #[error("slug contains reserved character `{ch}`")]
    ReservedCharacter { ch: char },
    #[error("heading text produced no anchor id")]
    Unanchorable,
}

/// Addressing parts of a hierarchical slug.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SlugParts {
    /// Last segment.
    pub specific: String,
    /// Joined prefix before the last segment; empty for top-level slugs.
    pub parent: String,
    /// Segment count.
    pub length: usize,
    /// First segment when the slug is nested; `None` for top-level slugs.
    pub root: Option<String>,
    /// Ancestor slug used for SEO parent titles; empty when there is none.
    pub seo_root: String,
}

/// Split a slug into `{specific, parent, length, root, seo_root}`.
///
/// Pure: any input splits, including empty strings and slugs with a single
/// segment.
pub fn split_slug(slug: &str) -> SlugParts {
    let segments: Vec<&str> = slug.split('/').collect();
    let length = segments.len();

    let (root, seo_root) = if length > 1 {
        let root = segments[0];
        let seo_root = if GENERIC_SEO_ROOTS.contains(&root) {
            if length > 2 {
                segments[0..2].join("/")
            } else {
                String::new()
            }
        } else {
            root.to_string()
        };
        (Some(root.to_string()), seo_root)
    } else {
        (None, String::new())
    };

    let specific = segments[length - 1].to_string();
    let parent = segments[..length - 1].join("/");

    SlugParts {
        specific,
        parent,
        length,
        root,
        seo_root,
    }
}

/// Validate a slug supplied as a tree-move target.
pub fn validate_move_slug(slug: &str) -> Result<(), SlugError> {
    if slug.is_empty() {
        return Err(SlugError::Empty);
    }
    if slug.split('/').any(str::is_empty) {
        return Err(SlugError::EmptySegment);
    }
    if let Some(ch) = slug.chars().find(|ch| RESERVED_SLUG_CHARS.contains(ch)) {
        return Err(SlugError::ReservedCharacter { ch });
    }
    Ok(())
}

/// Deterministically generate unique anchor ids within a single document.
///
/// Headings processed in order receive monotonic suffixes when duplicates
/// occur (`section`, `section-2`, `section-3`).
#[derive(Default, Debug)]
pub struct AnchorSlugger {
    occurrences: HashMap<String, usize>,
}

impl AnchorSlugger {
    pub fn new() -> Self {
        Self {
            occurrences: HashMap::new(),
        }
    }

    /// Register an id that already exists in the markup so generated ids
    /// cannot collide with it.
    pub fn reserve(&mut self, id: &str) {
        *self.occurrences.entry(id.to_string()).or_insert(0) += 1;
    }

    /// Generate an anchor id for the provided heading text, unique within
    /// this slugger.
    pub fn anchor_for(&mut self, heading: &str) -> Result<String, SlugError> {
        let base = slugify(heading);
        if base.is_empty() {
            return Err(SlugError::Unanchorable);
        }

        let count = self.occurrences.entry(base.clone()).or_insert(0);
        *count += 1;

        if *count == 1 {
            Ok(base)
        } else {
            Ok(format!("{base}-{}", *count))
        }
    }
}
