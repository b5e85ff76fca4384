use crate::models::Submission;

/// Derive the subset of records whose company identifier or sales manager
/// contains the query, case-insensitively. An empty query passes everything.
/// Pure over its inputs; the underlying set is never mutated.
pub fn filter_submissions<'a>(records: &'a [Submission], query: &str) -> Vec<&'a Submission> {
    if query.is_empty() {
        return records.iter().collect();
    }
    let needle = query.to_lowercase();
    records
        .iter()
        .filter(|s| {
            s.company_uuid.to_lowercase().contains(&needle)
                || s.sales_manager.to_lowercase().contains(&needle)
        })
        .collect()
}
