use healthlog_core::{FieldPatch, MemoryStore, Reconciler, SourceGroup};

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let rec = Reconciler::new(MemoryStore::new());

    let mut wearable = FieldPatch::new();
    wearable.insert("steps".into(), Some(8432.0));
    wearable.insert("sleep_score".into(), Some(81.0));
    rec.reconcile("2026-02-09", SourceGroup::Wearable, &wearable)
        .await?;

    let mut nutrition = FieldPatch::new();
    nutrition.insert("calories".into(), Some(2150.0));
    nutrition.insert("weight_kg".into(), Some(84.6));
    let day = rec
        .reconcile("2026-02-09", SourceGroup::Nutrition, &nutrition)
        .await?;

    println!(
        "{}: steps={:?} calories={:?} complete={}",
        day.date, day.steps, day.calories, day.data_complete
    );
    Ok(())
}
