use chrono::{DateTime, FixedOffset, Utc};

pub fn utc_to_fixed_offset(utc_dt: &DateTime<Utc>) -> DateTime<FixedOffset> {
    let offset = FixedOffset::east_opt(0).unwrap(); // always safe
    utc_dt.with_timezone(&offset)
}

/// The current instant in the fixed-offset form the entity columns use.
pub fn now_fixed() -> DateTime<FixedOffset> {
    utc_to_fixed_offset(&Utc::now())
}
