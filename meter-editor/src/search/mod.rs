pub mod debounce;

pub use debounce::Debouncer;

use feature_client::MeterRecord;
use serde::Serialize;

use crate::classify::Classification;
use crate::config::SearchConfig;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchHit {
    pub object_id: i64,
    pub address: Option<String>,
    pub account_number: Option<String>,
    pub customer_name: Option<String>,
    pub status: Classification,
}

impl From<&MeterRecord> for SearchHit {
    fn from(r: &MeterRecord) -> Self {
        Self {
            object_id: r.object_id,
            address: r.address.clone(),
            account_number: r.account_number.clone(),
            customer_name: r.customer_name.clone(),
            status: Classification::of(r),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum SearchOutcome {
    /// Query too short; any previous result list is cleared.
    Cleared,
    /// Nothing loaded yet, so an empty result would be misleading.
    Loading,
    NoMatches,
    Matches { hits: Vec<SearchHit> },
}

impl SearchOutcome {
    pub fn hits(&self) -> &[SearchHit] {
        match self {
            SearchOutcome::Matches { hits } => hits,
            _ => &[],
        }
    }
}

fn contains_folded(field: Option<&str>, needle: &str) -> bool {
    field.is_some_and(|f| f.to_lowercase().contains(needle))
}

/// Case-insensitive substring filter over address and account identifiers.
/// Hits keep collection order and are capped at `max_results`.
pub fn search(records: &[MeterRecord], raw_query: &str, cfg: &SearchConfig) -> SearchOutcome {
    let query = raw_query.trim();
    if query.chars().count() < cfg.min_chars {
        return SearchOutcome::Cleared;
    }
    if records.is_empty() {
        return SearchOutcome::Loading;
    }

    let needle = query.to_lowercase();
    let hits: Vec<SearchHit> = records
        .iter()
        .filter(|r| {
            contains_folded(r.address.as_deref(), &needle)
                || contains_folded(r.account_number.as_deref(), &needle)
                || contains_folded(r.customer_account_number.as_deref(), &needle)
        })
        .take(cfg.max_results)
        .map(SearchHit::from)
        .collect();

    if hits.is_empty() {
        SearchOutcome::NoMatches
    } else {
        SearchOutcome::Matches { hits }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn meter(id: i64, address: &str, account: &str) -> MeterRecord {
        let mut r = MeterRecord::new(id);
        r.address = Some(address.to_string());
        r.account_number = Some(account.to_string());
        r
    }

    fn cfg() -> SearchConfig {
        SearchConfig::default()
    }

    #[test]
    fn short_queries_clear_results() {
        let records = vec![meter(1, "123 Main St", "A-1")];
        assert_eq!(search(&records, "", &cfg()), SearchOutcome::Cleared);
        assert_eq!(search(&records, " M ", &cfg()), SearchOutcome::Cleared);
    }

    #[test]
    fn matches_address_substring_case_insensitively() {
        let records = vec![meter(1, "9 Oak Ave", "A-1"), meter(2, "123 Main St", "A-2")];

        let outcome = search(&records, "main", &cfg());
        let ids: Vec<i64> = outcome.hits().iter().map(|h| h.object_id).collect();
        assert_eq!(ids, vec![2]);

        let outcome = search(&records, "Main", &cfg());
        assert_eq!(outcome.hits()[0].address.as_deref(), Some("123 Main St"));
    }

    #[test]
    fn matches_account_identifiers() {
        let mut r = meter(3, "1 Elm", "ACC-0042");
        r.customer_account_number = Some("CUST-77".to_string());
        let records = vec![meter(1, "9 Oak Ave", "ACC-0001"), r];

        assert_eq!(search(&records, "acc-0042", &cfg()).hits().len(), 1);
        assert_eq!(search(&records, "cust-77", &cfg()).hits()[0].object_id, 3);
    }

    #[test]
    fn no_match_is_distinguished_from_loading() {
        let records = vec![meter(1, "9 Oak Ave", "A-1")];
        assert_eq!(search(&records, "zzz", &cfg()), SearchOutcome::NoMatches);
        assert_eq!(search(&[], "zzz", &cfg()), SearchOutcome::Loading);
    }

    #[test]
    fn results_are_truncated_in_collection_order() {
        let records: Vec<MeterRecord> = (1..=25)
            .map(|i| meter(i, &format!("{i} Main St"), &format!("A-{i}")))
            .collect();

        let outcome = search(&records, "main", &cfg());
        let ids: Vec<i64> = outcome.hits().iter().map(|h| h.object_id).collect();
        assert_eq!(ids, (1..=10).collect::<Vec<i64>>());
    }
}
