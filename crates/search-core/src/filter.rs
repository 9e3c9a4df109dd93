use common::{MedicineHit, MedicineRecord, SearchFilters};

/// Exact match on form and category; `None` accepts anything.
pub fn matches_categorical(record: &MedicineRecord, form: Option<&str>, category: Option<&str>) -> bool {
    form.is_none_or(|f| record.form == f) && category.is_none_or(|c| record.category == c)
}

/// Inclusive price and quantity bounds. Quantity means total stock on hand.
pub fn matches_ranges(record: &MedicineRecord, filters: &SearchFilters) -> bool {
    filters.min_price.is_none_or(|min| record.price >= min)
        && filters.max_price.is_none_or(|max| record.price <= max)
        && filters.min_quantity.is_none_or(|min| record.total_quantity >= min)
        && filters.max_quantity.is_none_or(|max| record.total_quantity <= max)
}

pub fn matches(record: &MedicineRecord, filters: &SearchFilters) -> bool {
    matches_categorical(record, filters.form.as_deref(), filters.category.as_deref())
        && matches_ranges(record, filters)
}

/// Drops hits outside the requested ranges and categories. Order and
/// scores of the remaining hits are untouched.
pub fn apply_filters(hits: Vec<MedicineHit>, filters: &SearchFilters) -> Vec<MedicineHit> {
    if filters.is_empty() {
        return hits;
    }
    hits.into_iter()
        .filter(|hit| matches(&hit.record, filters))
        .collect()
}

#[cfg(test)]
mod tests {
    use common::{MedicineHit, MedicineRecord, SearchFilters};
    use proptest::prelude::*;

    use super::{apply_filters, matches_categorical};

    fn hit(batch_id: &str, form: &str, price: f64, total_quantity: u64, relevance_score: f64) -> MedicineHit {
        MedicineHit {
            record: MedicineRecord {
                batch_id: batch_id.to_string(),
                form: form.to_string(),
                category: "Analgesics".to_string(),
                price,
                total_quantity,
                ..MedicineRecord::default()
            },
            relevance_score,
        }
    }

    fn hits() -> Vec<MedicineHit> {
        vec![
            hit("BATCH_1", "Tablet", 25.0, 100, 2.0),
            hit("BATCH_2", "Syrup", 80.0, 10, 2.0),
            hit("BATCH_3", "Tablet", 40.0, 0, 0.7),
        ]
    }

    #[test]
    fn price_bounds_are_inclusive() {
        let filters = SearchFilters {
            min_price: Some(25.0),
            max_price: Some(40.0),
            ..SearchFilters::default()
        };
        let kept = apply_filters(hits(), &filters);
        let ids = kept.iter().map(|h| h.record.batch_id.as_str()).collect::<Vec<_>>();
        assert_eq!(ids, vec!["BATCH_1", "BATCH_3"]);
        assert!((kept[1].relevance_score - 0.7).abs() < 1e-9);
    }

    #[test]
    fn quantity_bounds_use_total_stock() {
        let filters = SearchFilters {
            min_quantity: Some(1),
            max_quantity: Some(10),
            ..SearchFilters::default()
        };
        let kept = apply_filters(hits(), &filters);
        assert_eq!(kept.len(), 1);
        assert_eq!(kept[0].record.batch_id, "BATCH_2");
    }

    #[test]
    fn categorical_match_is_exact() {
        let record = &hits()[0].record;
        assert!(matches_categorical(record, Some("Tablet"), Some("Analgesics")));
        assert!(!matches_categorical(record, Some("tablet"), None));
        assert!(matches_categorical(record, None, None));
    }

    #[test]
    fn empty_filters_pass_everything_through() {
        assert_eq!(apply_filters(hits(), &SearchFilters::default()), hits());
    }

    proptest! {
        #[test]
        fn filters_never_add_or_reorder(
            min_price in proptest::option::of(0.0f64..100.0),
            max_quantity in proptest::option::of(0u64..200),
            form in proptest::option::of(prop_oneof![Just("Tablet".to_string()), Just("Syrup".to_string())]),
        ) {
            let filters = SearchFilters {
                form,
                min_price,
                max_quantity,
                ..SearchFilters::default()
            };
            let input = hits();
            let kept = apply_filters(input.clone(), &filters);
            prop_assert!(kept.len() <= input.len());
            let mut cursor = input.iter();
            for hit in &kept {
                prop_assert!(cursor.any(|h| h == hit));
            }
        }
    }
}
