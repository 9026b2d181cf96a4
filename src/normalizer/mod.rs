//! Record normalizer
//!
//! Turns raw field lists into [`NormalizedEvent`]s. Decides the category,
//! applies the accept condition and flags short records as unparsed.

pub mod detail;
pub mod reader;

pub use reader::RecordReader;

use crate::models::{EventCategory, EventOutcome, NormalizedEvent, RawRecord};
use crate::utils::truncate_to_seconds;

/// Smallest record that still names its operation
const MIN_CLASSIFIABLE_FIELDS: usize = RawRecord::OPERATION + 1;

/// Outcome of classifying one raw record
#[derive(Debug, Clone)]
pub enum Classification {
    Accepted(NormalizedEvent),
    /// Operation has no transform, or failed its accept condition
    Ignored,
    /// Record is too short for its category
    Unparsed(String),
}

pub fn classify(record: &RawRecord) -> Classification {
    if record.fields.len() < MIN_CLASSIFIABLE_FIELDS {
        return Classification::Unparsed(format!(
            "{} fields, operation column missing",
            record.fields.len()
        ));
    }

    let operation = &record.fields[RawRecord::OPERATION];
    let Some(category) = EventCategory::from_operation(operation) else {
        return Classification::Ignored;
    };

    let outcome = match record.field(RawRecord::RESULT) {
        Some(result) => EventOutcome::from_result(result),
        None if category.requires_success() => {
            return Classification::Unparsed(format!("{} record has no result column", operation));
        }
        None => EventOutcome::Other,
    };

    if category.requires_success() && outcome != EventOutcome::Success {
        return Classification::Ignored;
    }

    if record.fields.len() < category.min_fields() {
        return Classification::Unparsed(format!(
            "{} record has {} fields, needs {}",
            operation,
            record.fields.len(),
            category.min_fields()
        ));
    }

    let text = |index| record.field(index).unwrap_or_default().to_string();
    Classification::Accepted(NormalizedEvent {
        category,
        timestamp: truncate_to_seconds(&record.fields[RawRecord::TIMESTAMP]),
        process_name: text(RawRecord::PROCESS_NAME),
        process_id: text(RawRecord::PROCESS_ID),
        target: text(RawRecord::TARGET),
        detail: text(RawRecord::DETAIL),
        outcome,
    })
}
