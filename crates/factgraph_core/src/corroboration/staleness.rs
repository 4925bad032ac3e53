//! Source staleness sweep.
//!
//! Before a source's new batch is applied, its active edges on the batch's
//! labels are withdrawn. Entities the batch re-asserts win them back through
//! `corroborate`; the rest stay inactive for this source. Other sources'
//! edges are never touched.

use crate::model::entity::EntityLabel;
use crate::store::{PropertyStore, StoreResult};
use log::info;

/// Deactivates every active edge from `source_id` on entities of `labels`.
///
/// Returns the number of edges flipped.
pub fn mark_stale(
    store: &impl PropertyStore,
    source_id: &str,
    labels: &[EntityLabel],
) -> StoreResult<usize> {
    let swept = store.deactivate_source_assertions(source_id, labels)?;
    let label_list = labels
        .iter()
        .map(|label| label.as_str())
        .collect::<Vec<_>>()
        .join("|");
    info!(
        "event=staleness_sweep module=corroboration status=ok source={source_id} labels={label_list} deactivated={swept}"
    );
    Ok(swept)
}
