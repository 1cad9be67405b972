mod labels;
mod page;
mod zone;

pub use labels::{filter_and_sort, BannedTokens, Label};
pub use page::{plan_spans, segment, Segment, SegmentSpan};
pub use zone::{extract_zone, Zone};
