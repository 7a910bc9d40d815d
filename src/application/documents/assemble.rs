//! Assembling page contexts and JSON document payloads.

use std::collections::BTreeSet;

use serde::Serialize;
use time::format_description::well_known::Rfc3339;
use uuid::Uuid;

use crate::application::error::AppError;
use crate::application::render::MacroError;
use crate::application::repos::DocumentsRepo;
use crate::domain::entities::{DocumentBundle, DocumentStub};
use crate::domain::locales::{self, DEFAULT_LOCALE};
use crate::domain::slug::SlugParts;
use crate::domain::types::{FallbackReason, TRANSLATION_OUTDATED_AGE, TranslationStatus};

use super::{ExperimentInfo, SiteContext, map_repo};

/// One sibling translation of a document.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct TranslationData {
    pub language: String,
    #[serde(rename = "hrefLang")]
    pub href_lang: String,
    #[serde(rename = "localizedLanguage")]
    pub localized_language: String,
    pub locale: String,
    pub url: String,
    pub title: String,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct HrefLangLink {
    pub href: String,
    pub hreflang: String,
}

/// The JSON document payload (`documentData`).
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct DocumentData {
    pub locale: String,
    pub slug: String,
    #[serde(rename = "enSlug")]
    pub en_slug: String,
    pub id: Uuid,
    pub title: String,
    pub summary: String,
    pub language: String,
    #[serde(rename = "hrefLang")]
    pub href_lang: String,
    #[serde(rename = "absoluteURL")]
    pub absolute_url: String,
    #[serde(rename = "editURL")]
    pub edit_url: String,
    #[serde(rename = "translateURL")]
    pub translate_url: Option<String>,
    #[serde(rename = "translationStatus")]
    pub translation_status: Option<TranslationStatus>,
    #[serde(rename = "bodyHTML")]
    pub body_html: String,
    #[serde(rename = "quickLinksHTML")]
    pub quick_links_html: String,
    #[serde(rename = "tocHTML")]
    pub toc_html: String,
    pub raw: String,
    pub parents: Vec<ParentLink>,
    pub translations: Vec<TranslationData>,
    #[serde(rename = "lastModified")]
    pub last_modified: Option<String>,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct ParentLink {
    pub url: String,
    pub title: String,
}

/// Envelope returned by the document API: either a payload or a redirect.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct DocumentApiData {
    #[serde(rename = "documentData")]
    pub document_data: Option<DocumentData>,
    #[serde(rename = "redirectURL")]
    pub redirect_url: Option<String>,
}

impl DocumentApiData {
    pub fn redirect(url: impl Into<String>) -> Self {
        Self {
            document_data: None,
            redirect_url: Some(url.into()),
        }
    }
}

/// Everything the HTML page template renders.
#[derive(Debug, Clone)]
pub struct DocumentPageContext {
    pub title: String,
    pub locale: String,
    pub slug: String,
    pub document_html: String,
    pub toc_html: Option<String>,
    pub body_html: String,
    pub quick_links_html: String,
    pub contributors: Vec<String>,
    pub contributors_count: usize,
    pub has_contributors: bool,
    pub fallback_reason: Option<FallbackReason>,
    pub macro_errors: Option<Vec<MacroError>>,
    pub render_raw_fallback: bool,
    pub seo_summary: String,
    pub seo_parent_title: String,
    pub share_text: String,
    pub analytics_page_revision: Option<Uuid>,
    pub analytics_en_slug: String,
    pub content_experiment: Option<ExperimentInfo>,
    pub other_translations: Vec<TranslationData>,
    pub all_locales: BTreeSet<String>,
    pub canonical_url: String,
    pub hreflang_links: Vec<HrefLangLink>,
    pub redirected_from: Option<String>,
}

pub(crate) struct PageContextInputs<'a> {
    pub original: &'a DocumentBundle,
    pub serving: &'a DocumentBundle,
    pub document_html: String,
    pub toc_html: Option<String>,
    pub fallback_reason: Option<FallbackReason>,
    pub macro_errors: Option<Vec<MacroError>>,
    pub raw_fallback: bool,
    pub experiment: Option<ExperimentInfo>,
    pub redirected_from: Option<String>,
    pub parts: &'a SlugParts,
}

/// The slug reported to cross-locale analytics: the document's own slug when
/// it lives in the default locale, its parent's when the parent does, else
/// empty.
pub(crate) fn analytics_en_slug(bundle: &DocumentBundle) -> String {
    if bundle.document.locale == DEFAULT_LOCALE {
        return bundle.document.slug.clone();
    }
    if let Some(parent) = &bundle.parent {
        if parent.locale == DEFAULT_LOCALE {
            return parent.slug.clone();
        }
    }
    String::new()
}

/// Sibling translations of a bundle plus the set of locales its family
/// covers (the document's own locale included).
async fn translation_family(
    repo: &dyn DocumentsRepo,
    site: &SiteContext,
    bundle: &DocumentBundle,
) -> Result<(Vec<TranslationData>, BTreeSet<String>), AppError> {
    let siblings = repo
        .list_other_translations(bundle.document.id, bundle.document.parent_id)
        .await
        .map_err(map_repo)?;

    let mut all_locales: BTreeSet<String> = BTreeSet::new();
    all_locales.insert(bundle.document.locale.clone());
    for sibling in &siblings {
        all_locales.insert(sibling.locale.clone());
    }

    let translations = siblings
        .iter()
        .map(|sibling| translation_entry(site, sibling, &all_locales))
        .collect();

    Ok((translations, all_locales))
}

fn translation_entry(
    site: &SiteContext,
    stub: &DocumentStub,
    all_locales: &BTreeSet<String>,
) -> TranslationData {
    TranslationData {
        language: locales::native_name(&stub.locale).to_string(),
        href_lang: locales::hreflang(&stub.locale, all_locales),
        localized_language: locales::english_name(&stub.locale).to_string(),
        locale: stub.locale.clone(),
        url: site.doc_path(&stub.locale, &stub.slug),
        title: stub.title.clone(),
    }
}

/// Ordered ancestor chain (`parents` in the payload), nearest last. The walk
/// follows parent-topic references and is bounded by the slug's segment
/// count so a miswired hierarchy cannot cycle.
async fn ancestor_chain(
    repo: &dyn DocumentsRepo,
    site: &SiteContext,
    bundle: &DocumentBundle,
) -> Result<Vec<ParentLink>, AppError> {
    let max_hops = bundle.document.slug.split('/').count();
    let mut chain = Vec::new();
    let mut cursor = bundle.parent_topic.clone();
    let mut hops = 0;

    while let Some(stub) = cursor {
        chain.push(ParentLink {
            url: site.doc_path(&stub.locale, &stub.slug),
            title: stub.title.clone(),
        });
        hops += 1;
        if hops >= max_hops {
            break;
        }
        cursor = match stub.parent_topic_id {
            Some(id) => repo.find_stub_by_id(id).await.map_err(map_repo)?,
            None => None,
        };
    }

    chain.reverse();
    Ok(chain)
}

fn translation_status(bundle: &DocumentBundle) -> Option<TranslationStatus> {
    let revision = bundle.current_revision.as_ref()?;
    if bundle.document.parent_id.is_none() || !revision.localization_in_progress {
        return None;
    }
    if revision.translation_age >= TRANSLATION_OUTDATED_AGE {
        Some(TranslationStatus::Outdated)
    } else {
        Some(TranslationStatus::InProgress)
    }
}

/// Build the JSON document payload. `body_override` substitutes a freshly
/// rendered body for the stored hunk.
pub(crate) async fn document_api_data(
    repo: &dyn DocumentsRepo,
    site: &SiteContext,
    bundle: &DocumentBundle,
    body_override: Option<&str>,
) -> Result<DocumentApiData, AppError> {
    let (translations, all_locales) = translation_family(repo, site, bundle).await?;
    let parents = ancestor_chain(repo, site, bundle).await?;

    let document = &bundle.document;
    let absolute_path = site.doc_path(&document.locale, &document.slug);
    let last_modified = bundle
        .current_revision
        .as_ref()
        .and_then(|revision| revision.created.format(&Rfc3339).ok());

    Ok(DocumentApiData {
        document_data: Some(DocumentData {
            locale: document.locale.clone(),
            slug: document.slug.clone(),
            en_slug: analytics_en_slug(bundle),
            id: document.id,
            title: document.title.clone(),
            summary: document.summary_html.clone(),
            language: locales::native_name(&document.locale).to_string(),
            href_lang: locales::hreflang(&document.locale, &all_locales),
            absolute_url: absolute_path.clone(),
            edit_url: site.absolutify(&format!("{absolute_path}/edit")),
            translate_url: document
                .is_localizable
                .then(|| site.absolutify(&format!("{absolute_path}/locales"))),
            translation_status: translation_status(bundle),
            body_html: body_override
                .map(str::to_string)
                .unwrap_or_else(|| document.body_html.clone()),
            quick_links_html: document.quick_links_html.clone(),
            toc_html: document.toc_html.clone(),
            raw: document.html.clone(),
            parents,
            translations,
            last_modified,
        }),
        redirect_url: None,
    })
}

/// Assemble the HTML-page context from the resolved triple.
pub(crate) async fn build_page_context(
    repo: &dyn DocumentsRepo,
    site: &SiteContext,
    inputs: PageContextInputs<'_>,
) -> Result<DocumentPageContext, AppError> {
    let PageContextInputs {
        original,
        serving,
        document_html,
        toc_html,
        fallback_reason,
        macro_errors,
        raw_fallback,
        experiment,
        redirected_from,
        parts,
    } = inputs;

    let contributors: Vec<String> = repo
        .list_contributors(serving.document.id)
        .await
        .map_err(map_repo)?
        .into_iter()
        .map(|creator| creator.username)
        .collect();
    let contributors_count = contributors.len();

    let (other_translations, all_locales) = translation_family(repo, site, original).await?;

    let canonical_path = site.doc_path(&original.document.locale, &original.document.slug);
    let canonical_url = site.absolutify(&canonical_path);
    let hreflang_links = std::iter::once(HrefLangLink {
        href: canonical_url.clone(),
        hreflang: locales::hreflang(&original.document.locale, &all_locales),
    })
    .chain(other_translations.iter().map(|translation| HrefLangLink {
        href: site.absolutify(&translation.url),
        hreflang: translation.href_lang.clone(),
    }))
    .collect();

    let seo_parent_title = seo_parent_title(repo, original, parts).await?;

    Ok(DocumentPageContext {
        title: serving.document.title.clone(),
        locale: serving.document.locale.clone(),
        slug: serving.document.slug.clone(),
        document_html,
        toc_html,
        body_html: serving.document.body_html.clone(),
        quick_links_html: serving.document.quick_links_html.clone(),
        has_contributors: contributors_count > 0,
        contributors,
        contributors_count,
        fallback_reason,
        macro_errors,
        render_raw_fallback: raw_fallback,
        seo_summary: serving.document.summary_text.clone(),
        seo_parent_title,
        share_text: format!("I learned about {} on Foglio.", serving.document.title),
        analytics_page_revision: serving.document.current_revision_id,
        analytics_en_slug: analytics_en_slug(original),
        content_experiment: experiment,
        other_translations,
        all_locales,
        canonical_url,
        hreflang_links,
        redirected_from,
    })
}

/// SEO parent-title suffix (` - {title}`), empty when the slug has no SEO
/// root. When the immediate parent topic already matches the SEO root its
/// cached stub is used instead of a second lookup.
async fn seo_parent_title(
    repo: &dyn DocumentsRepo,
    bundle: &DocumentBundle,
    parts: &SlugParts,
) -> Result<String, AppError> {
    if parts.seo_root.is_empty() {
        return Ok(String::new());
    }

    let cached = bundle
        .parent_topic
        .as_ref()
        .filter(|topic| topic.slug == parts.seo_root)
        .cloned();

    let root = match cached {
        Some(stub) => Some(stub),
        None => repo
            .find_stub(&bundle.document.locale, &parts.seo_root)
            .await
            .map_err(map_repo)?,
    };

    Ok(root
        .map(|stub| format!(" - {}", stub.title))
        .unwrap_or_default())
}
