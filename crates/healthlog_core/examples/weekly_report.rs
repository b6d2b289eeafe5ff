use healthlog_core::{FieldPatch, MemoryStore, Reconciler, SourceGroup};

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let rec = Reconciler::new(MemoryStore::new());

    for (day, readiness, calories) in [
        ("2026-02-09", Some(70.0), Some(2100.0)),
        ("2026-02-10", None, Some(1950.0)),
        ("2026-02-11", Some(90.0), None),
    ] {
        let mut wearable = FieldPatch::new();
        wearable.insert("readiness_score".into(), readiness);
        rec.reconcile(day, SourceGroup::Wearable, &wearable).await?;

        let mut nutrition = FieldPatch::new();
        nutrition.insert("calories".into(), calories);
        rec.reconcile(day, SourceGroup::Nutrition, &nutrition).await?;
    }

    let agg = rec.weekly_aggregate("2026-02-09").await?;
    println!(
        "week {} ({} - {}): avg readiness {:?}, {} nutrition days, compliance {:.0}%",
        agg.iso_week,
        agg.week_start,
        agg.week_end,
        agg.mean("readiness_score"),
        agg.days_nutrition_logged,
        agg.compliance_pct
    );
    Ok(())
}
