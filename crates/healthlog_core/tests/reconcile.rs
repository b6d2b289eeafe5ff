use healthlog_core::{
    FieldPatch, MemoryStore, ReconcileEntry, ReconcileError, Reconciler, SourceGroup,
};

fn patch(pairs: &[(&str, Option<f64>)]) -> FieldPatch {
    pairs.iter().map(|(k, v)| (k.to_string(), *v)).collect()
}

fn reconciler() -> Reconciler<MemoryStore> {
    Reconciler::new(MemoryStore::new())
}

#[tokio::test]
async fn null_never_overwrites_a_stored_value() {
    let rec = reconciler();
    rec.reconcile("2026-02-09", SourceGroup::Wearable, &patch(&[("steps", Some(8000.0))]))
        .await
        .expect("first write");
    let updated = rec
        .reconcile("2026-02-09", SourceGroup::Wearable, &patch(&[("steps", None)]))
        .await
        .expect("null write");
    assert_eq!(updated.steps, Some(8000.0));
}

#[tokio::test]
async fn reapplying_identical_input_is_idempotent() {
    let rec = reconciler();
    let fields = patch(&[("steps", Some(8000.0)), ("sleep_score", Some(75.0))]);
    let first = rec
        .reconcile("2026-02-09", SourceGroup::Wearable, &fields)
        .await
        .expect("first");
    let second = rec
        .reconcile("2026-02-09", SourceGroup::Wearable, &fields)
        .await
        .expect("second");
    assert_eq!(first, second);

    let stored = rec
        .get_range("2026-02-09", "2026-02-09")
        .await
        .expect("range");
    assert_eq!(stored, vec![second]);
}

#[tokio::test]
async fn wearable_update_never_touches_nutrition_fields() {
    let rec = reconciler();
    rec.reconcile("2026-02-09", SourceGroup::Nutrition, &patch(&[("calories", Some(2100.0))]))
        .await
        .expect("nutrition write");
    let updated = rec
        .reconcile("2026-02-09", SourceGroup::Wearable, &patch(&[("sleep_score", Some(60.0))]))
        .await
        .expect("wearable write");
    assert_eq!(updated.calories, Some(2100.0));
    assert_eq!(updated.sleep_score, Some(60.0));
}

#[tokio::test]
async fn non_null_value_overwrites_last_writer_wins() {
    let rec = reconciler();
    rec.reconcile("2026-02-09", SourceGroup::Nutrition, &patch(&[("calories", Some(1800.0))]))
        .await
        .expect("first import");
    let updated = rec
        .reconcile("2026-02-09", SourceGroup::Nutrition, &patch(&[("calories", Some(2100.0))]))
        .await
        .expect("second import");
    assert_eq!(updated.calories, Some(2100.0));
}

#[tokio::test]
async fn derived_fields_track_merged_state() {
    let rec = reconciler();
    let after_wearable = rec
        .reconcile("2026-02-09", SourceGroup::Wearable, &patch(&[("steps", Some(8000.0))]))
        .await
        .expect("wearable");
    assert!(!after_wearable.nutrition_logged);
    assert!(!after_wearable.data_complete);

    let after_nutrition = rec
        .reconcile("2026-02-09", SourceGroup::Nutrition, &patch(&[("calories", Some(2100.0))]))
        .await
        .expect("nutrition");
    assert!(after_nutrition.nutrition_logged);
    assert!(after_nutrition.data_complete);
}

#[tokio::test]
async fn two_source_merge_end_to_end() {
    let rec = reconciler();
    rec.reconcile(
        "2026-02-09",
        SourceGroup::Wearable,
        &patch(&[("steps", Some(8000.0)), ("sleep_score", Some(75.0))]),
    )
    .await
    .expect("wearable");
    rec.reconcile(
        "2026-02-09",
        SourceGroup::Nutrition,
        &patch(&[("calories", Some(2100.0)), ("weight_kg", None)]),
    )
    .await
    .expect("nutrition");

    let records = rec
        .get_range("2026-02-09", "2026-02-09")
        .await
        .expect("range");
    assert_eq!(records.len(), 1);
    let day = &records[0];
    assert_eq!(day.steps, Some(8000.0));
    assert_eq!(day.sleep_score, Some(75.0));
    assert_eq!(day.calories, Some(2100.0));
    assert_eq!(day.weight_kg, None);
    assert!(day.nutrition_logged);
    assert!(day.data_complete);
}

#[tokio::test]
async fn foreign_field_is_rejected_before_any_mutation() {
    let rec = reconciler();
    let err = rec
        .reconcile("2026-02-09", SourceGroup::Wearable, &patch(&[("calories", Some(2000.0))]))
        .await
        .unwrap_err();
    assert!(matches!(err, ReconcileError::InvalidField { .. }));

    // Nothing was created for the date.
    let records = rec
        .get_range("2026-02-09", "2026-02-09")
        .await
        .expect("range");
    assert!(records.is_empty());
}

#[tokio::test]
async fn malformed_date_is_rejected() {
    let rec = reconciler();
    let err = rec
        .reconcile("02/09/2026", SourceGroup::Wearable, &patch(&[("steps", Some(1.0))]))
        .await
        .unwrap_err();
    assert!(matches!(err, ReconcileError::InvalidDate { .. }));
}

#[tokio::test]
async fn range_is_sorted_inclusive_and_bounded() {
    let rec = reconciler();
    for day in ["2026-02-12", "2026-02-09", "2026-02-15", "2026-02-01"] {
        rec.reconcile(day, SourceGroup::Wearable, &patch(&[("steps", Some(1000.0))]))
            .await
            .expect("write");
    }
    let records = rec
        .get_range("2026-02-09", "2026-02-14")
        .await
        .expect("range");
    let dates: Vec<String> = records.iter().map(|r| r.date.to_string()).collect();
    assert_eq!(dates, vec!["2026-02-09", "2026-02-12"]);
}

#[tokio::test]
async fn empty_and_inverted_ranges_are_empty_not_errors() {
    let rec = reconciler();
    assert!(rec.get_range("2026-02-09", "2026-02-15").await.expect("empty").is_empty());
    assert!(rec.get_range("2026-02-15", "2026-02-09").await.expect("inverted").is_empty());
}

#[tokio::test]
async fn batch_applies_in_order_and_collects_failures() {
    let rec = reconciler();
    let entries = vec![
        ReconcileEntry {
            date: "2026-02-09".into(),
            group: SourceGroup::Wearable,
            fields: patch(&[("steps", Some(8000.0))]),
        },
        ReconcileEntry {
            date: "2026-02-09".into(),
            group: SourceGroup::Wearable,
            fields: patch(&[("calories", Some(2000.0))]),
        },
        ReconcileEntry {
            date: "2026-02-10".into(),
            group: SourceGroup::Wearable,
            fields: patch(&[("steps", Some(9000.0))]),
        },
    ];
    let outcome = rec.reconcile_batch(&entries).await;
    assert_eq!(outcome.applied.len(), 2);
    assert_eq!(outcome.failures.len(), 1);
    assert_eq!(outcome.failures[0].index, 1);
    assert!(matches!(
        outcome.failures[0].error,
        ReconcileError::InvalidField { .. }
    ));

    // The bad entry did not disturb the good ones.
    let records = rec
        .get_range("2026-02-09", "2026-02-10")
        .await
        .expect("range");
    assert_eq!(records.len(), 2);
    assert_eq!(records[0].steps, Some(8000.0));
    assert_eq!(records[0].calories, None);
}

#[tokio::test]
async fn batch_tolerates_duplicate_entries() {
    let rec = reconciler();
    let entry = ReconcileEntry {
        date: "2026-02-09".into(),
        group: SourceGroup::Wearable,
        fields: patch(&[("steps", Some(8000.0))]),
    };
    let outcome = rec.reconcile_batch(&[entry.clone(), entry]).await;
    assert_eq!(outcome.applied.len(), 2);
    assert_eq!(outcome.applied[0], outcome.applied[1]);
}
