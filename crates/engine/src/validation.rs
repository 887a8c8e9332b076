//! Optional quantity-bound checks.
//!
//! Conservation of mass is deliberately *not* a hard invariant of the core
//! (quantities are immutable and depletion is status-driven). These checks
//! are the optional policy layer collaborators can switch on via
//! [`ExecutorConfig::enforce_quantity_bounds`](crate::ExecutorConfig):
//! unit agreement plus tolerance-bounded totals, matching the interchange
//! format's allowance for rounding and processing waste.

use tracelot_core::{Batch, Quantity, TraceError, TraceResult};

use crate::executor::OutputSpec;

/// Rounding slack allowed when split outputs are compared to their source.
pub const SPLIT_TOLERANCE: f64 = 0.01;

/// Processing-waste slack allowed when a merge output is compared to the
/// sum of its inputs.
pub const MERGE_TOLERANCE: f64 = 0.05;

/// Split outputs must share the source's unit and must not exceed the
/// source amount by more than [`SPLIT_TOLERANCE`].
pub fn split_within_bounds(source: &Batch, outputs: &[OutputSpec]) -> TraceResult<()> {
    let Some(source_qty) = &source.quantity else {
        // Untracked source quantity: nothing to bound against.
        return Ok(());
    };

    let mut total = 0.0;
    for spec in outputs {
        let Some(qty) = &spec.quantity else { continue };
        if !qty.same_unit(source_qty) {
            return Err(TraceError::validation(format!(
                "output unit '{}' does not match source unit '{}'",
                qty.unit(),
                source_qty.unit()
            )));
        }
        total += qty.amount();
    }

    let limit = source_qty.amount() * (1.0 + SPLIT_TOLERANCE);
    if total > limit {
        return Err(TraceError::validation(format!(
            "split outputs ({total} {unit}) exceed source quantity ({source} {unit})",
            unit = source_qty.unit(),
            source = source_qty.amount()
        )));
    }
    Ok(())
}

/// Merge sources must share one unit; the output must not exceed their sum
/// by more than [`MERGE_TOLERANCE`].
pub fn merge_within_bounds(sources: &[Batch], output: Option<&Quantity>) -> TraceResult<()> {
    let mut total = 0.0;
    let mut common_unit: Option<&str> = None;

    for batch in sources {
        let Some(qty) = &batch.quantity else { continue };
        match common_unit {
            None => common_unit = Some(qty.unit()),
            Some(unit) if unit != qty.unit() => {
                return Err(TraceError::validation(format!(
                    "cannot merge batches with different units: {unit} vs {}",
                    qty.unit()
                )));
            }
            Some(_) => {}
        }
        total += qty.amount();
    }

    let (Some(out), Some(unit)) = (output, common_unit) else {
        return Ok(());
    };
    if out.unit() != unit {
        return Err(TraceError::validation(format!(
            "output unit '{}' does not match input unit '{unit}'",
            out.unit()
        )));
    }
    let limit = total * (1.0 + MERGE_TOLERANCE);
    if out.amount() > limit {
        return Err(TraceError::validation(format!(
            "merge output ({} {unit}) exceeds total inputs ({total} {unit})",
            out.amount()
        )));
    }
    Ok(())
}

/// A cited input amount must match the batch's unit and fit within its
/// recorded quantity.
pub fn cited_amount_within_stock(batch: &Batch, cited: &Quantity) -> TraceResult<()> {
    let Some(stock) = &batch.quantity else {
        return Ok(());
    };
    if !cited.same_unit(stock) {
        return Err(TraceError::validation(format!(
            "cited unit '{}' does not match batch {} unit '{}'",
            cited.unit(),
            batch.id,
            stock.unit()
        )));
    }
    if cited.amount() > stock.amount() {
        return Err(TraceError::validation(format!(
            "cited amount ({cited}) exceeds available quantity ({stock}) for batch {}",
            batch.id
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use tracelot_core::{ActorId, BatchId, ItemId};

    fn batch_with(amount: f64, unit: &str) -> Batch {
        let mut b = Batch::new(
            BatchId::new("src").unwrap(),
            ActorId::new("acme").unwrap(),
            ItemId::new("garlic").unwrap(),
            Utc::now(),
        );
        b.quantity = Some(Quantity::new(amount, unit).unwrap());
        b
    }

    fn out(id: &str, amount: f64, unit: &str) -> OutputSpec {
        OutputSpec {
            batch_id: BatchId::new(id).unwrap(),
            item_id: None,
            quantity: Some(Quantity::new(amount, unit).unwrap()),
        }
    }

    #[test]
    fn split_within_tolerance_passes() {
        let source = batch_with(50.0, "kg");
        let outputs = [out("a", 30.0, "kg"), out("b", 20.0, "kg")];
        split_within_bounds(&source, &outputs).unwrap();

        // 1% slack is allowed.
        let outputs = [out("a", 30.0, "kg"), out("b", 20.4, "kg")];
        split_within_bounds(&source, &outputs).unwrap();
    }

    #[test]
    fn split_over_tolerance_fails() {
        let source = batch_with(50.0, "kg");
        let outputs = [out("a", 40.0, "kg"), out("b", 20.0, "kg")];
        assert!(split_within_bounds(&source, &outputs).is_err());
    }

    #[test]
    fn split_unit_mismatch_fails() {
        let source = batch_with(50.0, "kg");
        let outputs = [out("a", 10.0, "jar")];
        assert!(split_within_bounds(&source, &outputs).is_err());
    }

    #[test]
    fn untracked_source_is_unbounded() {
        let mut source = batch_with(50.0, "kg");
        source.quantity = None;
        let outputs = [out("a", 1000.0, "kg")];
        split_within_bounds(&source, &outputs).unwrap();
    }

    #[test]
    fn merge_mixed_units_fail() {
        let sources = [batch_with(10.0, "kg"), batch_with(5.0, "jar")];
        assert!(merge_within_bounds(&sources, None).is_err());
    }

    #[test]
    fn merge_output_bounded_with_waste_allowance() {
        let sources = [batch_with(10.0, "kg"), batch_with(5.0, "kg")];
        let ok = Quantity::new(15.5, "kg").unwrap();
        merge_within_bounds(&sources, Some(&ok)).unwrap();

        let too_much = Quantity::new(16.0, "kg").unwrap();
        assert!(merge_within_bounds(&sources, Some(&too_much)).is_err());
    }

    #[test]
    fn cited_amount_checks() {
        let batch = batch_with(50.0, "kg");
        cited_amount_within_stock(&batch, &Quantity::new(8.0, "kg").unwrap()).unwrap();
        assert!(cited_amount_within_stock(&batch, &Quantity::new(60.0, "kg").unwrap()).is_err());
        assert!(cited_amount_within_stock(&batch, &Quantity::new(8.0, "jar").unwrap()).is_err());
    }
}
