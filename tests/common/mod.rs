//! In-memory repository fixtures for pipeline tests.

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use time::OffsetDateTime;
use uuid::Uuid;

use foglio::application::documents::{DocumentService, SiteContext};
use foglio::application::moves::TreeMoveService;
use foglio::application::render::{
    MacroRender, MacroService, MacroServiceError, RenderPipeline,
};
use foglio::application::repos::{
    DeletionLogRepo, DocumentsRepo, HealthRepo, JobsRepo, NewJobRecord, RepoError,
    SubscriptionsRepo,
};
use foglio::application::subscriptions::SubscriptionService;
use foglio::domain::entities::{
    CreatorRecord, DeletionLogRecord, DocumentBundle, DocumentRecord, DocumentStub,
    RevisionRecord,
};
use foglio::domain::experiments::ExperimentCatalog;
use foglio::infra::http::HttpState;

pub fn record(locale: &str, slug: &str) -> DocumentRecord {
    DocumentRecord {
        id: Uuid::new_v4(),
        locale: locale.to_string(),
        slug: slug.to_string(),
        title: slug.rsplit('/').next().unwrap_or(slug).to_string(),
        html: format!("<p>source of {slug}</p>"),
        rendered_html: String::new(),
        rendered_errors: None,
        body_html: format!("<p>body of {slug}</p>"),
        toc_html: String::new(),
        summary_html: format!("<p>summary of {slug}</p>"),
        summary_text: format!("summary of {slug}"),
        quick_links_html: String::new(),
        is_redirect: false,
        is_localizable: true,
        parent_id: None,
        parent_topic_id: None,
        current_revision_id: None,
        deleted_at: None,
    }
}

pub fn stub_of(bundle: &DocumentBundle) -> DocumentStub {
    let doc = &bundle.document;
    DocumentStub {
        id: doc.id,
        locale: doc.locale.clone(),
        slug: doc.slug.clone(),
        title: doc.title.clone(),
        is_redirect: doc.is_redirect,
        parent_id: doc.parent_id,
        parent_topic_id: doc.parent_topic_id,
        current_revision_id: doc.current_revision_id,
    }
}

pub fn revision_for(document: &DocumentRecord) -> RevisionRecord {
    RevisionRecord {
        id: document.current_revision_id.unwrap_or_else(Uuid::new_v4),
        document_id: document.id,
        creator: CreatorRecord {
            id: Uuid::new_v4(),
            username: "author".to_string(),
            is_active: true,
        },
        created: OffsetDateTime::UNIX_EPOCH + time::Duration::days(19_000),
        toc_depth: 1,
        translation_age: 0,
        localization_in_progress: false,
    }
}

/// Builder for a fixed document graph.
#[derive(Default)]
pub struct MemoryRepoBuilder {
    live: Vec<DocumentBundle>,
    deleted: Vec<DocumentBundle>,
    deletion_log: Vec<DeletionLogRecord>,
    contributors: HashMap<Uuid, Vec<CreatorRecord>>,
}

impl MemoryRepoBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an approved live document and return its bundle.
    pub fn approved(&mut self, mut document: DocumentRecord) -> DocumentBundle {
        document.current_revision_id = Some(Uuid::new_v4());
        let revision = revision_for(&document);
        self.push_live(document, Some(revision))
    }

    /// Add a live document without an approved revision.
    pub fn unapproved(&mut self, mut document: DocumentRecord) -> DocumentBundle {
        document.current_revision_id = None;
        self.push_live(document, None)
    }

    pub fn with_revision(
        &mut self,
        mut document: DocumentRecord,
        revision: RevisionRecord,
    ) -> DocumentBundle {
        document.current_revision_id = Some(revision.id);
        self.push_live(document, Some(revision))
    }

    fn push_live(
        &mut self,
        document: DocumentRecord,
        revision: Option<RevisionRecord>,
    ) -> DocumentBundle {
        let bundle = DocumentBundle {
            document,
            current_revision: revision,
            parent: None,
            parent_topic: None,
        };
        self.live.push(bundle.clone());
        bundle
    }

    pub fn soft_deleted(&mut self, mut document: DocumentRecord) -> DocumentBundle {
        document.deleted_at = Some(OffsetDateTime::UNIX_EPOCH + time::Duration::days(19_500));
        let bundle = DocumentBundle {
            document,
            current_revision: None,
            parent: None,
            parent_topic: None,
        };
        self.deleted.push(bundle.clone());
        bundle
    }

    pub fn deletion_log(&mut self, locale: &str, slug: &str) {
        self.deletion_log.push(DeletionLogRecord {
            id: Uuid::new_v4(),
            locale: locale.to_string(),
            slug: slug.to_string(),
            parent_slug: None,
            deleted_by: "moderator".to_string(),
            reason: "spam".to_string(),
            created: OffsetDateTime::UNIX_EPOCH + time::Duration::days(19_500),
        });
    }

    pub fn contributors(&mut self, document_id: Uuid, usernames: &[&str]) {
        let creators = usernames
            .iter()
            .map(|username| CreatorRecord {
                id: Uuid::new_v4(),
                username: (*username).to_string(),
                is_active: true,
            })
            .collect();
        self.contributors.insert(document_id, creators);
    }

    /// Point `child.parent` at `parent` (translation/redirect target).
    pub fn link_parent(&mut self, child_id: Uuid, parent: &DocumentBundle) {
        let parent_stub = stub_of(parent);
        for bundle in self.live.iter_mut().chain(self.deleted.iter_mut()) {
            if bundle.document.id == child_id {
                bundle.document.parent_id = Some(parent_stub.id);
                bundle.parent = Some(parent_stub.clone());
            }
        }
    }

    /// Point `child.parent_topic` at `parent` (hierarchical parent).
    pub fn link_parent_topic(&mut self, child_id: Uuid, parent: &DocumentBundle) {
        let parent_stub = stub_of(parent);
        for bundle in self.live.iter_mut() {
            if bundle.document.id == child_id {
                bundle.document.parent_topic_id = Some(parent_stub.id);
                bundle.parent_topic = Some(parent_stub.clone());
            }
        }
    }

    pub fn build(self) -> Arc<MemoryRepo> {
        Arc::new(MemoryRepo {
            live: self.live,
            deleted: self.deleted,
            deletion_log: self.deletion_log,
            contributors: self.contributors,
            subscriptions: Mutex::new(Vec::new()),
            jobs: Mutex::new(Vec::new()),
        })
    }
}

pub struct MemoryRepo {
    live: Vec<DocumentBundle>,
    deleted: Vec<DocumentBundle>,
    deletion_log: Vec<DeletionLogRecord>,
    contributors: HashMap<Uuid, Vec<CreatorRecord>>,
    subscriptions: Mutex<Vec<(String, Uuid, bool)>>,
    jobs: Mutex<Vec<NewJobRecord>>,
}

impl MemoryRepo {
    pub fn enqueued_jobs(&self) -> Vec<NewJobRecord> {
        self.jobs.lock().unwrap().clone()
    }

    fn live_by<'a>(
        &'a self,
        predicate: impl Fn(&DocumentBundle) -> bool + 'a,
    ) -> impl Iterator<Item = &'a DocumentBundle> {
        self.live.iter().filter(move |bundle| predicate(bundle))
    }
}

#[async_trait]
impl DocumentsRepo for MemoryRepo {
    async fn find_bundle(
        &self,
        locale: &str,
        slug: &str,
    ) -> Result<Option<DocumentBundle>, RepoError> {
        Ok(self
            .live_by(|b| b.document.locale == locale && b.document.slug == slug)
            .next()
            .cloned())
    }

    async fn find_bundle_by_id(&self, id: Uuid) -> Result<Option<DocumentBundle>, RepoError> {
        Ok(self.live_by(|b| b.document.id == id).next().cloned())
    }

    async fn find_bundle_by_title(
        &self,
        locale: &str,
        title: &str,
    ) -> Result<Option<DocumentBundle>, RepoError> {
        Ok(self
            .live_by(|b| b.document.locale == locale && b.document.title == title)
            .next()
            .cloned())
    }

    async fn find_stub(&self, locale: &str, slug: &str) -> Result<Option<DocumentStub>, RepoError> {
        Ok(self
            .live_by(|b| b.document.locale == locale && b.document.slug == slug)
            .next()
            .map(stub_of))
    }

    async fn find_stub_by_id(&self, id: Uuid) -> Result<Option<DocumentStub>, RepoError> {
        Ok(self.live_by(|b| b.document.id == id).next().map(stub_of))
    }

    async fn find_translation(
        &self,
        source_id: Uuid,
        locale: &str,
    ) -> Result<Option<DocumentStub>, RepoError> {
        Ok(self
            .live_by(|b| b.document.parent_id == Some(source_id) && b.document.locale == locale)
            .next()
            .map(stub_of))
    }

    async fn list_other_translations(
        &self,
        document_id: Uuid,
        parent_id: Option<Uuid>,
    ) -> Result<Vec<DocumentStub>, RepoError> {
        let family_root = parent_id.unwrap_or(document_id);
        Ok(self
            .live_by(|b| {
                (b.document.id == family_root || b.document.parent_id == Some(family_root))
                    && b.document.id != document_id
            })
            .map(stub_of)
            .collect())
    }

    async fn list_children(
        &self,
        parent_topic_id: Uuid,
    ) -> Result<Vec<DocumentBundle>, RepoError> {
        Ok(self
            .live_by(|b| b.document.parent_topic_id == Some(parent_topic_id))
            .cloned()
            .collect())
    }

    async fn list_contributors(&self, document_id: Uuid) -> Result<Vec<CreatorRecord>, RepoError> {
        Ok(self.contributors.get(&document_id).cloned().unwrap_or_default())
    }

    async fn deleted_document_exists(&self, locale: &str, slug: &str) -> Result<bool, RepoError> {
        Ok(self
            .deleted
            .iter()
            .any(|b| b.document.locale == locale && b.document.slug == slug))
    }

    async fn deleted_document_parents(
        &self,
        locale: &str,
        slug: &str,
    ) -> Result<Vec<DocumentStub>, RepoError> {
        Ok(self
            .deleted
            .iter()
            .filter(|b| b.document.locale == locale && b.document.slug == slug)
            .filter_map(|b| b.parent.clone())
            .collect())
    }

    async fn list_tree_slugs(&self, root_id: Uuid) -> Result<Vec<String>, RepoError> {
        let mut slugs = Vec::new();
        let mut queue = vec![root_id];
        while let Some(id) = queue.pop() {
            if let Some(bundle) = self.live_by(|b| b.document.id == id).next() {
                slugs.push(bundle.document.slug.clone());
            }
            for child in self.live_by(|b| b.document.parent_topic_id == Some(id)) {
                queue.push(child.document.id);
            }
        }
        Ok(slugs)
    }

    async fn find_live_slugs(
        &self,
        locale: &str,
        slugs: &[String],
    ) -> Result<Vec<String>, RepoError> {
        Ok(self
            .live_by(|b| b.document.locale == locale && slugs.contains(&b.document.slug))
            .map(|b| b.document.slug.clone())
            .collect())
    }
}

#[async_trait]
impl DeletionLogRepo for MemoryRepo {
    async fn list_entries(
        &self,
        locale: &str,
        slug: &str,
    ) -> Result<Vec<DeletionLogRecord>, RepoError> {
        let mut entries: Vec<DeletionLogRecord> = self
            .deletion_log
            .iter()
            .filter(|entry| entry.locale == locale && entry.slug == slug)
            .cloned()
            .collect();
        entries.sort_by(|a, b| b.created.cmp(&a.created));
        Ok(entries)
    }
}

#[async_trait]
impl SubscriptionsRepo for MemoryRepo {
    async fn toggle(
        &self,
        username: &str,
        document_id: Uuid,
        in_tree: bool,
    ) -> Result<bool, RepoError> {
        let mut subscriptions = self.subscriptions.lock().unwrap();
        let key = (username.to_string(), document_id, in_tree);
        if let Some(position) = subscriptions.iter().position(|entry| *entry == key) {
            subscriptions.remove(position);
            Ok(false)
        } else {
            subscriptions.push(key);
            Ok(true)
        }
    }
}

#[async_trait]
impl JobsRepo for MemoryRepo {
    async fn enqueue_job(&self, job: NewJobRecord) -> Result<String, RepoError> {
        self.jobs.lock().unwrap().push(job);
        Ok(Uuid::new_v4().to_string())
    }
}

#[async_trait]
impl HealthRepo for MemoryRepo {
    async fn ping(&self) -> Result<(), RepoError> {
        Ok(())
    }
}

/// Macro service stub with a scripted response.
pub struct ScriptedMacros {
    pub enabled: bool,
    pub response: Option<MacroRender>,
}

#[async_trait]
impl MacroService for ScriptedMacros {
    fn is_enabled(&self) -> bool {
        self.enabled
    }

    async fn render(
        &self,
        _document: &DocumentRecord,
        _cache_control: Option<&str>,
        _base_url: &str,
    ) -> Result<MacroRender, MacroServiceError> {
        match &self.response {
            Some(render) => Ok(render.clone()),
            None => Err(MacroServiceError::Unavailable("scripted outage".to_string())),
        }
    }
}

pub fn site() -> SiteContext {
    SiteContext {
        default_locale: "en-US".to_string(),
        public_url: "https://wiki.example.org".to_string(),
    }
}

pub fn document_service(repo: Arc<MemoryRepo>) -> DocumentService {
    document_service_with(repo, ExperimentCatalog::empty(), disabled_macros())
}

pub fn document_service_with(
    repo: Arc<MemoryRepo>,
    catalog: ExperimentCatalog,
    macros: Arc<dyn MacroService>,
) -> DocumentService {
    DocumentService::new(
        repo.clone(),
        repo,
        Arc::new(catalog),
        Arc::new(RenderPipeline::new(macros)),
        site(),
    )
}

pub fn disabled_macros() -> Arc<dyn MacroService> {
    Arc::new(ScriptedMacros {
        enabled: false,
        response: None,
    })
}

pub fn http_state(repo: Arc<MemoryRepo>) -> HttpState {
    HttpState {
        documents: Arc::new(document_service(repo.clone())),
        moves: Arc::new(TreeMoveService::new(repo.clone(), repo.clone())),
        subscriptions: Arc::new(SubscriptionService::new(repo.clone())),
        health: repo,
    }
}
