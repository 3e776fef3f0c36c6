use anyhow::{anyhow, Result};
use async_trait::async_trait;
use serde_json::{json, Value};

use firmsite_common::{
    AliasTable, AttorneyExtract, IndustryExtract, PracticeAreaExtract, ScrapeOutput, ScrapeRecord,
    Taxonomy, TaxonomyKind,
};
use firmsite_pipeline::seed::{seed_file, RelationResolver, SeedOptions, SeedStats, SeedWriter};
use firmsite_pipeline::testing::InMemoryStore;
use firmsite_pipeline::traits::ContentStore;
use payload_client::{DocId, Document, Where};

fn taxonomy() -> Taxonomy {
    Taxonomy {
        practice_areas: AliasTable::from_pairs([("tax law", "Tax")]),
        industries: AliasTable::from_pairs([
            ("healthcare", "Health Care"),
            ("real-estate", "Real Estate"),
        ]),
    }
}

fn opts(dry_run: bool) -> SeedOptions {
    SeedOptions {
        dry_run,
        email_domain: "rbelaw.com".into(),
    }
}

fn items<E: serde::de::DeserializeOwned>(value: serde_json::Value) -> Vec<ScrapeRecord<E>> {
    serde_json::from_value::<ScrapeOutput<E>>(value).unwrap().items
}

#[tokio::test]
async fn unresolvable_relation_is_dropped_not_fatal() {
    let store = InMemoryStore::new();
    let taxonomy = taxonomy();
    let writer = SeedWriter::new(&store, &taxonomy, opts(false));

    let stats = writer
        .seed(&items::<PracticeAreaExtract>(json!({
            "items": [{ "extracted": { "name": "Acme Co", "relatedIndustries": ["Healthcare"] } }]
        })))
        .await;

    assert_eq!(
        stats,
        SeedStats {
            created: 1,
            updated: 0,
            skipped: 0,
            errors: 0
        }
    );
    let doc = store.find_by_slug("practice-areas", "acme-co").unwrap();
    assert_eq!(doc.fields["title"], json!("Acme Co"));
    assert_eq!(doc.fields["industries"], json!([]));
}

#[tokio::test]
async fn relations_resolve_through_aliases_by_title_or_slug() {
    let store = InMemoryStore::new()
        .with_doc("industries", json!({ "title": "Health Care", "slug": "health-care" }))
        .with_doc("industries", json!({ "title": "Property", "slug": "real-estate" }));
    let taxonomy = taxonomy();
    let resolver = RelationResolver::new(&store, &taxonomy);

    let ids = resolver
        .resolve_ids(
            &[
                "healthcare".to_string(),
                "Real-Estate".to_string(),
                "HEALTH CARE".to_string(),
                "Agriculture".to_string(),
                "  ".to_string(),
            ],
            TaxonomyKind::Industries,
        )
        .await
        .unwrap();

    assert_eq!(ids, vec![DocId::Int(1), DocId::Int(2)]);
}

#[tokio::test]
async fn reseeding_is_idempotent() {
    let store = InMemoryStore::new()
        .with_doc("industries", json!({ "title": "Health Care", "slug": "health-care" }))
        .with_doc("industries", json!({ "title": "Real Estate", "slug": "real-estate" }));
    let taxonomy = taxonomy();
    let writer = SeedWriter::new(&store, &taxonomy, opts(false));
    let input = items::<PracticeAreaExtract>(json!({
        "items": [
            { "url": "https://rbelaw.com/practice-areas/tax/",
              "extracted": { "name": "Tax Law", "relatedIndustries": ["Healthcare", "Real Estate"] } },
            { "url": "https://rbelaw.com/practice-areas/x/", "extracted": null },
            { "url": "https://rbelaw.com/practice-areas/y/", "extracted": { "description": "no name" } }
        ]
    }));

    let first = writer.seed(&input).await;
    assert_eq!((first.created, first.updated, first.skipped), (1, 0, 2));

    let second = writer.seed(&input).await;
    assert_eq!((second.created, second.updated, second.skipped), (0, 1, 2));

    let docs = store.docs("practice-areas");
    assert_eq!(docs.len(), 1);
    assert_eq!(docs[0].fields["title"], json!("Tax"));
    assert_eq!(docs[0].fields["slug"], json!("tax"));
    assert_eq!(docs[0].relation_ids("industries"), vec![DocId::Int(1), DocId::Int(2)]);
}

#[tokio::test]
async fn update_merges_existing_relations() {
    let store = InMemoryStore::new()
        .with_doc("industries", json!({ "title": "Health Care", "slug": "health-care" }))
        .with_doc("industries", json!({ "title": "Energy", "slug": "energy" }))
        .with_doc(
            "practice-areas",
            json!({ "title": "Tax", "slug": "tax", "industries": [{ "id": 2, "title": "Energy" }] }),
        );
    let taxonomy = taxonomy();
    let writer = SeedWriter::new(&store, &taxonomy, opts(false));

    let stats = writer
        .seed(&items::<PracticeAreaExtract>(json!({
            "items": [{ "extracted": { "name": "Tax", "industries": ["Healthcare", "Energy"] } }]
        })))
        .await;

    assert_eq!(stats.updated, 1);
    let doc = store.find_by_slug("practice-areas", "tax").unwrap();
    assert_eq!(doc.relation_ids("industries"), vec![DocId::Int(2), DocId::Int(1)]);
}

#[tokio::test]
async fn dry_run_writes_nothing() {
    let store = InMemoryStore::new()
        .with_doc("industries", json!({ "title": "Energy", "slug": "energy" }));
    let taxonomy = taxonomy();
    let writer = SeedWriter::new(&store, &taxonomy, opts(true));

    let stats = writer
        .seed(&items::<IndustryExtract>(json!({
            "items": [
                { "extracted": { "name": "Energy" } },
                { "extracted": { "name": "Banking" } }
            ]
        })))
        .await;

    assert_eq!((stats.created, stats.updated), (1, 1));
    assert_eq!(store.create_calls(), 0);
    assert_eq!(store.update_calls(), 0);
    assert_eq!(store.docs("industries").len(), 1);
}

#[tokio::test]
async fn dry_run_counts_repeated_slug_as_update() {
    let store = InMemoryStore::new();
    let taxonomy = taxonomy();
    let input = items::<PracticeAreaExtract>(json!({
        "items": [
            { "extracted": { "name": "Tax Law" } },
            { "extracted": { "name": "Tax" } },
            { "extracted": { "name": "Litigation" } }
        ]
    }));

    let dry = SeedWriter::new(&store, &taxonomy, opts(true)).seed(&input).await;
    assert_eq!((dry.created, dry.updated), (2, 1));
    assert_eq!(store.create_calls(), 0);

    let real = SeedWriter::new(&store, &taxonomy, opts(false)).seed(&input).await;
    assert_eq!((real.created, real.updated), (dry.created, dry.updated));
}

#[tokio::test]
async fn later_items_see_earlier_creations() {
    let store = InMemoryStore::new();
    let taxonomy = taxonomy();
    let writer = SeedWriter::new(&store, &taxonomy, opts(false));

    writer
        .seed(&items::<PracticeAreaExtract>(json!({
            "items": [{ "extracted": { "name": "Tax" } }]
        })))
        .await;
    let stats = writer
        .seed(&items::<AttorneyExtract>(json!({
            "items": [{ "extracted": {
                "name": "Jane Roe",
                "practiceAreas": ["Tax Law", "Underwater Basket Weaving"],
                "email": "jroe@rbelaw.com"
            } }]
        })))
        .await;

    assert_eq!(stats.created, 1);
    let attorney = store.find_by_slug("attorneys", "jane-roe").unwrap();
    assert_eq!(attorney.relation_ids("practices"), vec![DocId::Int(1)]);
    assert_eq!(attorney.fields["email"], json!("jroe@rbelaw.com"));
    assert_eq!(attorney.fields["industries"], json!([]));
}

#[tokio::test]
async fn missing_input_file_is_fatal() {
    let dir = tempfile::tempdir().unwrap();
    let store = InMemoryStore::new();
    let taxonomy = taxonomy();
    let writer = SeedWriter::new(&store, &taxonomy, opts(false));

    let result = seed_file::<PracticeAreaExtract, _>(&writer, &dir.path().join("nope.json")).await;
    assert!(result.is_err());
}

/// Rejects creates whose title is "Broken".
struct RejectingStore(InMemoryStore);

#[async_trait]
impl ContentStore for RejectingStore {
    async fn find(&self, collection: &str, filter: &Where, limit: u32) -> Result<Vec<Document>> {
        self.0.find(collection, filter, limit).await
    }

    async fn create(&self, collection: &str, data: &Value) -> Result<Document> {
        if data["title"] == json!("Broken") {
            return Err(anyhow!("validation failed: title"));
        }
        self.0.create(collection, data).await
    }

    async fn update(&self, collection: &str, id: &DocId, data: &Value) -> Result<Document> {
        self.0.update(collection, id, data).await
    }
}

#[tokio::test]
async fn failing_item_is_counted_and_run_continues() {
    let store = RejectingStore(InMemoryStore::new());
    let taxonomy = taxonomy();
    let writer = SeedWriter::new(&store, &taxonomy, opts(false));

    let stats = writer
        .seed(&items::<IndustryExtract>(json!({
            "items": [
                { "extracted": { "name": "Broken" } },
                { "extracted": { "name": "Energy" } }
            ]
        })))
        .await;

    assert_eq!((stats.created, stats.errors), (1, 1));
    assert!(stats.has_errors());
    assert!(store.0.find_by_slug("industries", "energy").is_some());
}
