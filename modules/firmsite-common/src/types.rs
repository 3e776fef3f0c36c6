use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

use crate::aliases::Taxonomy;
use crate::normalize::{normalize_list, Normalize};

// --- URL categories ---

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Category {
    Attorneys,
    PracticeAreas,
    Industries,
    BlogPosts,
    Misc,
}

impl Category {
    pub const ALL: [Category; 5] = [
        Category::Attorneys,
        Category::PracticeAreas,
        Category::Industries,
        Category::BlogPosts,
        Category::Misc,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Attorneys => "attorneys",
            Category::PracticeAreas => "practiceAreas",
            Category::Industries => "industries",
            Category::BlogPosts => "blogPosts",
            Category::Misc => "misc",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CategoryCounts {
    pub total: usize,
    pub attorneys: usize,
    pub practice_areas: usize,
    pub industries: usize,
    pub blog_posts: usize,
    pub misc: usize,
}

impl CategoryCounts {
    pub fn get(&self, category: Category) -> usize {
        match category {
            Category::Attorneys => self.attorneys,
            Category::PracticeAreas => self.practice_areas,
            Category::Industries => self.industries,
            Category::BlogPosts => self.blog_posts,
            Category::Misc => self.misc,
        }
    }
}

/// URLs bucketed by category. Buckets are kept sorted and free of duplicates.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CategorizedUrls {
    #[serde(default)]
    pub attorneys: Vec<String>,
    #[serde(default)]
    pub practice_areas: Vec<String>,
    #[serde(default)]
    pub industries: Vec<String>,
    #[serde(default)]
    pub blog_posts: Vec<String>,
    #[serde(default)]
    pub misc: Vec<String>,
}

impl CategorizedUrls {
    pub fn get(&self, category: Category) -> &[String] {
        match category {
            Category::Attorneys => &self.attorneys,
            Category::PracticeAreas => &self.practice_areas,
            Category::Industries => &self.industries,
            Category::BlogPosts => &self.blog_posts,
            Category::Misc => &self.misc,
        }
    }

    fn bucket_mut(&mut self, category: Category) -> &mut Vec<String> {
        match category {
            Category::Attorneys => &mut self.attorneys,
            Category::PracticeAreas => &mut self.practice_areas,
            Category::Industries => &mut self.industries,
            Category::BlogPosts => &mut self.blog_posts,
            Category::Misc => &mut self.misc,
        }
    }

    pub fn push(&mut self, category: Category, url: String) {
        self.bucket_mut(category).push(url);
    }

    /// Sort every bucket lexically and drop duplicates.
    pub fn finish(mut self) -> Self {
        for category in Category::ALL {
            let bucket = self.bucket_mut(category);
            bucket.sort();
            bucket.dedup();
        }
        self
    }

    pub fn counts(&self) -> CategoryCounts {
        CategoryCounts {
            total: Category::ALL.iter().map(|c| self.get(*c).len()).sum(),
            attorneys: self.attorneys.len(),
            practice_areas: self.practice_areas.len(),
            industries: self.industries.len(),
            blog_posts: self.blog_posts.len(),
            misc: self.misc.len(),
        }
    }

    pub fn all_urls(&self) -> impl Iterator<Item = &String> {
        Category::ALL.into_iter().flat_map(move |c| self.get(c).iter())
    }
}

/// The discovery output document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SiteMap {
    pub base_url: String,
    pub generated_at: DateTime<Utc>,
    pub counts: CategoryCounts,
    #[serde(flatten)]
    pub urls: CategorizedUrls,
}

impl SiteMap {
    pub fn new(base_url: &str, urls: CategorizedUrls) -> Self {
        let urls = urls.finish();
        Self {
            base_url: base_url.to_string(),
            generated_at: Utc::now(),
            counts: urls.counts(),
            urls,
        }
    }
}

// --- Scrape records ---

/// One URL's extraction result. `extracted` is `None` whenever `errors` explains why.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScrapeRecord<E> {
    #[serde(default)]
    pub url: String,
    pub extracted: Option<E>,
    #[serde(default)]
    pub raw_markdown: Option<String>,
    #[serde(default)]
    pub metadata: Option<Value>,
    #[serde(default)]
    pub errors: Vec<String>,
    #[serde(default)]
    pub cached: bool,
}

impl<E> ScrapeRecord<E> {
    pub fn failed(url: &str, error: impl Into<String>) -> Self {
        Self {
            url: url.to_string(),
            extracted: None,
            raw_markdown: None,
            metadata: None,
            errors: vec![error.into()],
            cached: false,
        }
    }

    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }
}

impl<E: Normalize> ScrapeRecord<E> {
    pub fn normalized(mut self, taxonomy: &Taxonomy) -> Self {
        self.extracted = self.extracted.map(|e| e.normalized(taxonomy));
        self
    }
}

/// A scraper output document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScrapeOutput<E> {
    #[serde(default)]
    pub base_url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub generated_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub total: usize,
    pub items: Vec<ScrapeRecord<E>>,
}

impl<E> ScrapeOutput<E> {
    pub fn new(base_url: &str, items: Vec<ScrapeRecord<E>>) -> Self {
        Self {
            base_url: base_url.to_string(),
            generated_at: Some(Utc::now()),
            total: items.len(),
            items,
        }
    }
}

// --- Extracts ---
//
// List fields accept a lone string or a mixed array; unknown fields ride along
// in `extra` so cached provider output round-trips untouched.

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PracticeAreaExtract {
    #[serde(default, deserialize_with = "lenient_string", skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, deserialize_with = "lenient_string", skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, deserialize_with = "lenient_string", skip_serializing_if = "Option::is_none")]
    pub overview_markdown: Option<String>,
    #[serde(default, deserialize_with = "lenient_list")]
    pub services: Vec<String>,
    #[serde(default, deserialize_with = "lenient_list")]
    pub related_industries: Vec<String>,
    /// Some pages label the relation plainly; used when `related_industries` is empty.
    #[serde(default, deserialize_with = "lenient_list", skip_serializing_if = "Vec::is_empty")]
    pub industries: Vec<String>,
    #[serde(default, deserialize_with = "lenient_list")]
    pub attorneys: Vec<String>,
    #[serde(default, deserialize_with = "lenient_string", skip_serializing_if = "Option::is_none")]
    pub icon: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Normalize for PracticeAreaExtract {
    fn normalized(mut self, taxonomy: &Taxonomy) -> Self {
        self.related_industries = normalize_list(&self.related_industries, &taxonomy.industries);
        self.industries = normalize_list(&self.industries, &taxonomy.industries);
        self
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IndustryExtract {
    #[serde(default, deserialize_with = "lenient_string", skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, deserialize_with = "lenient_string", skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, deserialize_with = "lenient_string", skip_serializing_if = "Option::is_none")]
    pub overview_markdown: Option<String>,
    #[serde(default, deserialize_with = "lenient_list")]
    pub services: Vec<String>,
    #[serde(default, deserialize_with = "lenient_list")]
    pub related_practice_areas: Vec<String>,
    #[serde(default, deserialize_with = "lenient_list")]
    pub attorneys: Vec<String>,
    #[serde(default, deserialize_with = "lenient_string", skip_serializing_if = "Option::is_none")]
    pub icon: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Normalize for IndustryExtract {
    fn normalized(mut self, taxonomy: &Taxonomy) -> Self {
        self.related_practice_areas =
            normalize_list(&self.related_practice_areas, &taxonomy.practice_areas);
        self
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttorneyExtract {
    #[serde(default, deserialize_with = "lenient_string", skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Display title, e.g. "Partner".
    #[serde(default, deserialize_with = "lenient_string", skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, deserialize_with = "lenient_string", skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
    #[serde(default, deserialize_with = "lenient_string", skip_serializing_if = "Option::is_none")]
    pub job_type: Option<String>,
    #[serde(default, deserialize_with = "lenient_string", skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default, deserialize_with = "lenient_string", skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    #[serde(default, deserialize_with = "lenient_string", skip_serializing_if = "Option::is_none")]
    pub bio: Option<String>,
    #[serde(default, deserialize_with = "lenient_string", skip_serializing_if = "Option::is_none")]
    pub overview_markdown: Option<String>,
    #[serde(default, deserialize_with = "lenient_string", skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, deserialize_with = "lenient_list")]
    pub practice_areas: Vec<String>,
    #[serde(default, deserialize_with = "lenient_list")]
    pub industries: Vec<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Normalize for AttorneyExtract {
    fn normalized(mut self, taxonomy: &Taxonomy) -> Self {
        self.practice_areas = normalize_list(&self.practice_areas, &taxonomy.practice_areas);
        self.industries = normalize_list(&self.industries, &taxonomy.industries);
        self
    }
}

/// A string field, or `None` for anything that isn't a non-blank string.
fn lenient_string<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Value::deserialize(deserializer)? {
        Value::String(s) if !s.trim().is_empty() => Some(s),
        _ => None,
    })
}

/// A list of strings from a lone string, an array, or nothing.
fn lenient_list<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Value::deserialize(deserializer)? {
        Value::String(s) => vec![s],
        Value::Array(items) => items
            .into_iter()
            .filter_map(|v| match v {
                Value::String(s) => Some(s),
                _ => None,
            })
            .collect(),
        _ => Vec::new(),
    })
}
