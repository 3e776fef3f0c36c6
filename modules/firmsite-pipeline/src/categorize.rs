use std::sync::LazyLock;

use regex::Regex;
use url::Url;

use firmsite_common::{Category, CategorizedUrls};

static ATTORNEYS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"/(team|attorneys?)/").expect("valid regex"));

static PRACTICE_AREAS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"/practice-areas/").expect("valid regex"));

static INDUSTRIES: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"/industr(ies|y)/").expect("valid regex"));

static BLOG_POSTS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"/(blog|insights|news|article|posts|category/blog|category/blog-post|tag)(/|$)")
        .expect("valid regex")
});

/// Bucket for one URL, by its lowercased path. Precedence: attorneys,
/// practice areas, industries, blog posts, then misc.
pub fn categorize(url: &str) -> Category {
    let Ok(parsed) = Url::parse(url) else {
        return Category::Misc;
    };
    let path = parsed.path().to_lowercase();

    if ATTORNEYS.is_match(&path) {
        Category::Attorneys
    } else if PRACTICE_AREAS.is_match(&path) {
        Category::PracticeAreas
    } else if INDUSTRIES.is_match(&path) {
        Category::Industries
    } else if BLOG_POSTS.is_match(&path) {
        Category::BlogPosts
    } else {
        Category::Misc
    }
}

pub fn categorize_all<I, S>(urls: I) -> CategorizedUrls
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut out = CategorizedUrls::default();
    for url in urls {
        let url = url.as_ref();
        out.push(categorize(url), url.to_string());
    }
    out.finish()
}
