/*!
 * Window filtering on the visit date
 */

use tracing::debug;

use crate::data_types::{DateWindow, VisitRecord};

/// Keep the records whose visit day falls inside `window`, in input order.
///
/// Registration and signing dates play no part here. An inverted window
/// yields an empty set.
pub fn filter_window(records: &[VisitRecord], window: &DateWindow) -> Vec<VisitRecord> {
    let kept: Vec<VisitRecord> = records
        .iter()
        .filter(|r| window.contains(r.visit_day()))
        .cloned()
        .collect();

    debug!(%window, total = records.len(), kept = kept.len(), "applied visit window");
    kept
}
