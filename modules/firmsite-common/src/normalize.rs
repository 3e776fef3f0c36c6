use std::collections::HashSet;
use std::sync::LazyLock;

use regex::Regex;

use crate::aliases::{AliasTable, Taxonomy};

static DELIMITERS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\r?\n|•|·|▪|–|—|-\s+| {2,}|\t|;|,").expect("valid regex")
});

static CAMEL_BOUNDARY: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"([a-z])([A-Z])").expect("valid regex"));

/// Split, canonicalize, and de-duplicate a scraped list of taxonomy labels.
///
/// Elements may hold several labels glued together by bullets, dashes,
/// newlines, or camelCase. Output order is first occurrence; two outputs never
/// share a lowercased canonical form.
pub fn normalize_list<S: AsRef<str>>(raw: &[S], table: &AliasTable) -> Vec<String> {
    let mut seen = HashSet::new();
    let mut out = Vec::new();

    for value in raw {
        for item in split_concatenated(value.as_ref(), table) {
            let canonical = table.resolve(&item);
            let key = canonical.to_lowercase();
            if !key.is_empty() && seen.insert(key) {
                out.push(canonical);
            }
        }
    }

    out
}

fn split_concatenated(item: &str, table: &AliasTable) -> Vec<String> {
    DELIMITERS
        .split(item)
        .flat_map(|part| split_camel(part.trim(), table))
        .map(|p| p.trim().to_string())
        .filter(|p| !p.is_empty())
        .collect()
}

/// Break `"TaxLitigation"` into its words, but only when every word is itself
/// a known label. Anything else stays as scraped.
fn split_camel(piece: &str, table: &AliasTable) -> Vec<String> {
    if table.is_empty() {
        return vec![piece.to_string()];
    }

    let spaced = CAMEL_BOUNDARY.replace_all(piece, "$1 $2");
    let words: Vec<&str> = spaced.split_whitespace().collect();
    if words.len() > 1 && words.iter().all(|w| table.is_known(w)) {
        words.into_iter().map(str::to_string).collect()
    } else {
        vec![piece.to_string()]
    }
}

/// Re-canonicalize an extract's taxonomy lists.
pub trait Normalize {
    fn normalized(self, taxonomy: &Taxonomy) -> Self;
}
