//! Title/price projection handed back to the LLM.
//!
//! The projection never carries description, category, brand or stock,
//! and the number of entries is capped, so the payload stays small no
//! matter how large the catalog grows.

use crate::models::ProductSummary;

/// Deterministic keyword filter over product titles.
///
/// Every token must occur in the title, case-insensitively.
#[derive(Debug, Clone, Default)]
pub struct KeywordFilter {
    tokens: Vec<String>,
}

impl KeywordFilter {
    pub fn parse(query: Option<&str>) -> Self {
        let tokens = query
            .unwrap_or("")
            .split_whitespace()
            .map(|t| fold_case(t.trim_matches(|c: char| !c.is_alphanumeric())))
            .filter(|t| !t.is_empty())
            .collect();
        Self { tokens }
    }

    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }

    pub fn matches(&self, title: &str) -> bool {
        let title = fold_case(title);
        self.tokens.iter().all(|t| title.contains(t.as_str()))
    }

    /// Human-readable form for error messages.
    pub fn describe(&self) -> String {
        if self.is_empty() {
            "the catalog (it is empty)".to_string()
        } else {
            format!("\"{}\"", self.tokens.join(" "))
        }
    }
}

/// Lowercase for matching. The Turkish dotted and dotless i forms all fold
/// to `i`, so `incir` matches `İncir` and `ISPANAK` matches `ıspanak`.
fn fold_case(text: &str) -> String {
    text.chars()
        .flat_map(char::to_lowercase)
        .filter(|&c| c != '\u{307}')
        .map(|c| if c == 'ı' { 'i' } else { c })
        .collect()
}

/// Filtered, capped list of summaries.
#[derive(Debug, Clone, PartialEq)]
pub struct Projection {
    pub items: Vec<ProductSummary>,
    /// Matches before the cap was applied.
    pub matched: usize,
}

impl Projection {
    pub fn is_truncated(&self) -> bool {
        self.matched > self.items.len()
    }

    /// Render as a JSON array, followed by a note when capped.
    pub fn render(&self) -> Result<String, serde_json::Error> {
        let mut out = serde_json::to_string(&self.items)?;
        if self.is_truncated() {
            out.push_str(&format!(
                "\n(showing {} of {} matching products; refine the query)",
                self.items.len(),
                self.matched
            ));
        }
        Ok(out)
    }
}

/// Filter `summaries` by `filter` and keep at most `limit` entries.
pub fn project<I>(summaries: I, filter: &KeywordFilter, limit: usize) -> Projection
where
    I: IntoIterator<Item = ProductSummary>,
{
    let mut items = Vec::new();
    let mut matched = 0;

    for summary in summaries {
        if !filter.matches(&summary.title) {
            continue;
        }
        matched += 1;
        if items.len() < limit {
            items.push(summary);
        }
    }

    Projection { items, matched }
}
