use crate::domain::model::CatalogRecord;

/// Case-insensitive substring filter over title, slug, excerpt and description.
///
/// A blank query returns every record in its original order. Never touches
/// the network, so it keeps working when the remote search is down.
pub fn filter<'a>(records: &'a [CatalogRecord], query: &str) -> Vec<&'a CatalogRecord> {
    let needle = query.trim().to_lowercase();
    if needle.is_empty() {
        return records.iter().collect();
    }

    records
        .iter()
        .filter(|record| matches(record, &needle))
        .collect()
}

fn matches(record: &CatalogRecord, needle: &str) -> bool {
    [
        Some(record.title.as_str()),
        Some(record.slug.as_str()),
        record.excerpt.as_deref(),
        record.description.as_deref(),
    ]
    .into_iter()
    .flatten()
    .any(|field| field.to_lowercase().contains(needle))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn records() -> Vec<CatalogRecord> {
        vec![
            CatalogRecord::new(1, "Split AC 1 Ton"),
            CatalogRecord::new(2, "Window AC 1.5 Ton"),
            CatalogRecord {
                slug: "portable-cooler".to_string(),
                excerpt: Some("Quiet evaporative cooler for small rooms".to_string()),
                ..CatalogRecord::new(3, "Air Cooler")
            },
        ]
    }

    #[test]
    fn empty_query_is_identity() {
        let records = records();
        let result = filter(&records, "");
        assert_eq!(result.len(), 3);
        for (got, want) in result.iter().zip(records.iter()) {
            assert!(std::ptr::eq(*got, want));
        }
    }

    #[test]
    fn blank_query_is_identity() {
        let records = records();
        assert_eq!(filter(&records, "   ").len(), 3);
    }

    #[test]
    fn matches_title_case_insensitively() {
        let records = records();
        let result = filter(&records, "window");
        assert_eq!(result.len(), 1);
        assert_eq!(result[0].title, "Window AC 1.5 Ton");
    }

    #[test]
    fn matches_slug_and_excerpt() {
        let records = records();
        assert_eq!(filter(&records, "PORTABLE")[0].title, "Air Cooler");
        assert_eq!(filter(&records, "evaporative")[0].title, "Air Cooler");
    }

    #[test]
    fn falls_back_to_description() {
        let records = vec![CatalogRecord {
            description: Some("Copper condenser, five star rating".to_string()),
            ..CatalogRecord::new(4, "Split AC 2 Ton")
        }];
        assert_eq!(filter(&records, "copper").len(), 1);
    }

    #[test]
    fn keeps_original_order() {
        let records = records();
        let result = filter(&records, "ton");
        let ids: Vec<String> = result.iter().filter_map(|r| r.identity()).collect();
        assert_eq!(ids, vec!["1", "2"]);
    }

    #[test]
    fn no_match_is_empty() {
        let records = records();
        assert!(filter(&records, "refrigerator").is_empty());
    }
}
