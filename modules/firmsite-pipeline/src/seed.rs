//! Upsert scraped entities into the content store.
//!
//! Items are written one at a time: a later item's relations may point at an
//! entity an earlier item just created. Relation names are only ever resolved
//! against entities that already exist; nothing is created from free text.

use std::collections::HashSet;
use std::fmt;
use std::path::Path;

use anyhow::{Context, Result};
use serde::de::DeserializeOwned;
use serde_json::{json, Map, Value};
use tracing::{debug, error, info};

use firmsite_common::{
    normalize_slug, AttorneyExtract, IndustryExtract, PracticeAreaExtract, ScrapeOutput,
    ScrapeRecord, Taxonomy, TaxonomyKind,
};
use payload_client::{DocId, Document, Where};

use crate::documents::read_document;
use crate::traits::ContentStore;

/// Collection holding the entities of a taxonomy.
pub fn collection_for(kind: TaxonomyKind) -> &'static str {
    match kind {
        TaxonomyKind::PracticeAreas => "practice-areas",
        TaxonomyKind::Industries => "industries",
    }
}

/// Minimal Lexical rich-text document holding one paragraph.
pub fn rich_text(text: &str) -> Value {
    json!({
        "root": {
            "type": "root",
            "children": [{
                "type": "paragraph",
                "version": 1,
                "children": [{ "type": "text", "text": text, "version": 1 }]
            }],
            "direction": "ltr",
            "format": "",
            "indent": 0,
            "version": 1
        }
    })
}

/// Existing IDs in their order, then new ones, without repeats.
pub fn merge_relation_ids(existing: &[DocId], new: &[DocId]) -> Vec<DocId> {
    let mut seen = HashSet::new();
    existing
        .iter()
        .chain(new)
        .filter(|id| seen.insert((*id).clone()))
        .cloned()
        .collect()
}

fn ids_value(ids: &[DocId]) -> Value {
    Value::Array(ids.iter().map(DocId::to_value).collect())
}

fn first_text<'a>(candidates: &[&'a Option<String>]) -> Option<&'a str> {
    candidates
        .iter()
        .filter_map(|c| c.as_deref())
        .map(str::trim)
        .find(|s| !s.is_empty())
}

// ---------------------------------------------------------------------------
// Targets
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct SeedOptions {
    pub dry_run: bool,
    /// Domain for attorney emails the page didn't list.
    pub email_domain: String,
}

/// A relationship field filled from names in the extract.
#[derive(Debug)]
pub struct Relation<'a> {
    pub field: &'static str,
    pub names: &'a [String],
    pub target: TaxonomyKind,
}

/// An extract type that can be upserted into a collection.
pub trait SeedTarget: DeserializeOwned + Send + Sync {
    const COLLECTION: &'static str;

    /// Display name the entity is stored and slugged under.
    fn canonical_name(&self, taxonomy: &Taxonomy) -> Option<String>;

    fn relations(&self) -> Vec<Relation<'_>>;

    /// Document fields other than the relationship fields.
    fn document_data(&self, name: &str, slug: &str, opts: &SeedOptions) -> Map<String, Value>;
}

fn resolved_name(raw: &Option<String>, taxonomy: &Taxonomy, kind: TaxonomyKind) -> Option<String> {
    let raw = raw.as_deref().map(str::trim).filter(|s| !s.is_empty())?;
    Some(taxonomy.table(kind).resolve(raw))
}

impl SeedTarget for PracticeAreaExtract {
    const COLLECTION: &'static str = "practice-areas";

    fn canonical_name(&self, taxonomy: &Taxonomy) -> Option<String> {
        resolved_name(&self.name, taxonomy, TaxonomyKind::PracticeAreas)
    }

    fn relations(&self) -> Vec<Relation<'_>> {
        let names = if self.related_industries.is_empty() {
            &self.industries
        } else {
            &self.related_industries
        };
        vec![Relation {
            field: "industries",
            names,
            target: TaxonomyKind::Industries,
        }]
    }

    fn document_data(&self, name: &str, slug: &str, _opts: &SeedOptions) -> Map<String, Value> {
        let description = first_text(&[&self.description, &self.overview_markdown]).unwrap_or("");
        let content = first_text(&[&self.overview_markdown, &self.description]).unwrap_or(name);
        let sub_areas: Vec<Value> = self
            .services
            .iter()
            .map(|s| s.trim())
            .filter(|s| !s.is_empty())
            .map(|s| json!({ "name": s }))
            .collect();

        let mut map = Map::new();
        map.insert("title".into(), json!(name));
        map.insert("slug".into(), json!(slug));
        map.insert("description".into(), json!(description));
        map.insert("content".into(), rich_text(content));
        map.insert("richContent".into(), rich_text(content));
        map.insert("leadMagnetType".into(), json!("none"));
        map.insert("icon".into(), json!(self.icon));
        map.insert("featuredImage".into(), Value::Null);
        map.insert("featuredAttorneys".into(), json!([]));
        map.insert("subAreas".into(), Value::Array(sub_areas));
        map.insert("caseStudies".into(), json!([]));
        map.insert("tags".into(), json!([]));
        map
    }
}

impl SeedTarget for IndustryExtract {
    const COLLECTION: &'static str = "industries";

    fn canonical_name(&self, taxonomy: &Taxonomy) -> Option<String> {
        resolved_name(&self.name, taxonomy, TaxonomyKind::Industries)
    }

    fn relations(&self) -> Vec<Relation<'_>> {
        vec![Relation {
            field: "practiceAreas",
            names: &self.related_practice_areas,
            target: TaxonomyKind::PracticeAreas,
        }]
    }

    fn document_data(&self, name: &str, slug: &str, _opts: &SeedOptions) -> Map<String, Value> {
        let description = first_text(&[&self.description, &self.overview_markdown]).unwrap_or("");
        let mut map = Map::new();
        map.insert("title".into(), json!(name));
        map.insert("slug".into(), json!(slug));
        map.insert("description".into(), json!(description));
        map.insert("icon".into(), json!(self.icon));
        map
    }
}

impl SeedTarget for AttorneyExtract {
    const COLLECTION: &'static str = "attorneys";

    fn canonical_name(&self, _taxonomy: &Taxonomy) -> Option<String> {
        self.name
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
    }

    fn relations(&self) -> Vec<Relation<'_>> {
        vec![
            Relation {
                field: "practices",
                names: &self.practice_areas,
                target: TaxonomyKind::PracticeAreas,
            },
            Relation {
                field: "industries",
                names: &self.industries,
                target: TaxonomyKind::Industries,
            },
        ]
    }

    fn document_data(&self, name: &str, slug: &str, opts: &SeedOptions) -> Map<String, Value> {
        let role = first_text(&[&self.role])
            .map(str::to_string)
            .or_else(|| first_text(&[&self.title]).map(normalize_slug))
            .filter(|r| !r.is_empty())
            .unwrap_or_else(|| "associate".to_string());
        let email = first_text(&[&self.email])
            .map(str::to_string)
            .unwrap_or_else(|| format!("{slug}@{}", opts.email_domain));
        let bio = first_text(&[&self.bio, &self.overview_markdown, &self.description]).unwrap_or("");

        let mut map = Map::new();
        map.insert("name".into(), json!(name));
        map.insert("slug".into(), json!(slug));
        map.insert(
            "jobType".into(),
            json!(first_text(&[&self.job_type]).unwrap_or("attorney")),
        );
        map.insert("role".into(), json!(role));
        map.insert("email".into(), json!(email));
        map.insert("phone".into(), json!(first_text(&[&self.phone])));
        map.insert("bio".into(), rich_text(bio));
        map.insert("education".into(), json!([]));
        map.insert(
            "quickFacts".into(),
            json!({ "barAdmissions": [], "languages": [] }),
        );
        for empty in ["awards", "representativeMatters", "publications", "videos"] {
            map.insert(empty.into(), json!([]));
        }
        map
    }
}

// ---------------------------------------------------------------------------
// Relation resolution
// ---------------------------------------------------------------------------

pub struct RelationResolver<'a, S: ContentStore> {
    store: &'a S,
    taxonomy: &'a Taxonomy,
}

impl<'a, S: ContentStore> RelationResolver<'a, S> {
    pub fn new(store: &'a S, taxonomy: &'a Taxonomy) -> Self {
        Self { store, taxonomy }
    }

    /// Existing entity whose title is the canonical name or whose slug matches it.
    pub async fn find_by_name(&self, name: &str, kind: TaxonomyKind) -> Result<Option<Document>> {
        let canonical = self.taxonomy.table(kind).resolve(name);
        let slug = normalize_slug(&canonical);
        if canonical.is_empty() || slug.is_empty() {
            return Ok(None);
        }

        let filter = Where::or(vec![
            Where::equals("title", &canonical),
            Where::equals("slug", &slug),
        ]);
        let docs = self
            .store
            .find(collection_for(kind), &filter, 1)
            .await
            .with_context(|| format!("Looking up {} {canonical:?}", collection_for(kind)))?;
        Ok(docs.into_iter().next())
    }

    /// IDs for `names` in order, without repeats. Names with no existing
    /// entity are dropped.
    pub async fn resolve_ids(&self, names: &[String], kind: TaxonomyKind) -> Result<Vec<DocId>> {
        let mut ids = Vec::new();
        let mut seen = HashSet::new();
        for name in names.iter().map(|n| n.trim()).filter(|n| !n.is_empty()) {
            match self.find_by_name(name, kind).await? {
                Some(doc) => {
                    if seen.insert(doc.id.clone()) {
                        ids.push(doc.id);
                    }
                }
                None => debug!(name, collection = collection_for(kind), "Unresolved relation dropped"),
            }
        }
        Ok(ids)
    }
}

// ---------------------------------------------------------------------------
// Writer
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SeedAction {
    Created,
    Updated,
    Skipped,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SeedStats {
    pub created: usize,
    pub updated: usize,
    pub skipped: usize,
    pub errors: usize,
}

impl SeedStats {
    pub fn has_errors(&self) -> bool {
        self.errors > 0
    }

    fn record(&mut self, action: SeedAction) {
        match action {
            SeedAction::Created => self.created += 1,
            SeedAction::Updated => self.updated += 1,
            SeedAction::Skipped => self.skipped += 1,
        }
    }
}

impl fmt::Display for SeedStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "created: {}, updated: {}, skipped: {}, errors: {}",
            self.created, self.updated, self.skipped, self.errors
        )
    }
}

pub struct SeedWriter<'a, S: ContentStore> {
    store: &'a S,
    taxonomy: &'a Taxonomy,
    opts: SeedOptions,
}

impl<'a, S: ContentStore> SeedWriter<'a, S> {
    pub fn new(store: &'a S, taxonomy: &'a Taxonomy, opts: SeedOptions) -> Self {
        Self {
            store,
            taxonomy,
            opts,
        }
    }

    /// Upsert every item in order. A failing item is logged and counted.
    pub async fn seed<E: SeedTarget>(&self, items: &[ScrapeRecord<E>]) -> SeedStats {
        let mut stats = SeedStats::default();
        // Slugs a dry run has reported as created, so repeats count as updates.
        let mut planned = HashSet::new();
        for item in items {
            match self.seed_one(item, &mut planned).await {
                Ok(action) => stats.record(action),
                Err(e) => {
                    error!(url = %item.url, collection = E::COLLECTION, error = %format!("{e:#}"), "Seed failed");
                    stats.errors += 1;
                }
            }
        }
        stats
    }

    async fn seed_one<E: SeedTarget>(
        &self,
        item: &ScrapeRecord<E>,
        planned: &mut HashSet<String>,
    ) -> Result<SeedAction> {
        let Some(extract) = &item.extracted else {
            info!(url = %item.url, "Skipping, no extracted data");
            return Ok(SeedAction::Skipped);
        };
        let Some(name) = extract.canonical_name(self.taxonomy) else {
            info!(url = %item.url, "Skipping, missing name");
            return Ok(SeedAction::Skipped);
        };
        let slug = normalize_slug(&name);
        if slug.is_empty() {
            info!(url = %item.url, name = %name, "Skipping, name has no slug");
            return Ok(SeedAction::Skipped);
        }

        let resolver = RelationResolver::new(self.store, self.taxonomy);
        let mut relations = Vec::new();
        for relation in extract.relations() {
            let ids = resolver.resolve_ids(relation.names, relation.target).await?;
            relations.push((relation.field, ids));
        }

        let existing = self
            .store
            .find(E::COLLECTION, &Where::equals("slug", &slug), 1)
            .await
            .with_context(|| format!("Looking up {} {slug}", E::COLLECTION))?
            .into_iter()
            .next();

        let mut data = extract.document_data(&name, &slug, &self.opts);
        let collection = E::COLLECTION;
        if existing.is_none() && self.opts.dry_run && !planned.insert(slug.clone()) {
            info!(collection, name = %name, "Would update, created earlier in this run");
            return Ok(SeedAction::Updated);
        }
        match existing {
            Some(doc) => {
                for (field, ids) in relations {
                    let merged = merge_relation_ids(&doc.relation_ids(field), &ids);
                    data.insert(field.to_string(), ids_value(&merged));
                }
                if self.opts.dry_run {
                    info!(collection, name = %name, id = %doc.id, "Would update");
                } else {
                    self.store
                        .update(collection, &doc.id, &Value::Object(data))
                        .await
                        .with_context(|| format!("Updating {collection} {slug}"))?;
                    info!(collection, name = %name, id = %doc.id, "Updated");
                }
                Ok(SeedAction::Updated)
            }
            None => {
                for (field, ids) in relations {
                    data.insert(field.to_string(), ids_value(&ids));
                }
                if self.opts.dry_run {
                    info!(collection, name = %name, "Would create");
                } else {
                    let created = self
                        .store
                        .create(collection, &Value::Object(data))
                        .await
                        .with_context(|| format!("Creating {collection} {slug}"))?;
                    info!(collection, name = %name, id = %created.id, "Created");
                }
                Ok(SeedAction::Created)
            }
        }
    }
}

/// Seed the scrape output document at `input`.
pub async fn seed_file<E, S>(writer: &SeedWriter<'_, S>, input: &Path) -> Result<SeedStats>
where
    E: SeedTarget,
    S: ContentStore,
{
    let doc: ScrapeOutput<E> = read_document(input)
        .await
        .context("Run the matching scrape first")?;
    info!(
        collection = E::COLLECTION,
        items = doc.items.len(),
        dry_run = writer.opts.dry_run,
        "Seeding"
    );
    Ok(writer.seed(&doc.items).await)
}
