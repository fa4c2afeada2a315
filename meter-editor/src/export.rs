use std::io::Write;

use feature_client::MeterRecord;
use serde::Serialize;

#[derive(Debug, Serialize)]
struct PendingMeterRow<'a> {
    object_id: i64,
    address: Option<&'a str>,
    account_number: Option<&'a str>,
    customer_name: Option<&'a str>,
    customer_account_number: Option<&'a str>,
    x: Option<f64>,
    y: Option<f64>,
}

/// Write every meter that still needs an account update as CSV, in collection
/// order. Returns the number of rows written.
pub fn write_pending_csv<W: Write>(
    records: &[MeterRecord],
    writer: W,
) -> Result<usize, csv::Error> {
    let mut wtr = csv::Writer::from_writer(writer);
    let mut rows = 0;

    for r in records.iter().filter(|r| r.needs_account_update()) {
        wtr.serialize(PendingMeterRow {
            object_id: r.object_id,
            address: r.address.as_deref(),
            account_number: r.account_number.as_deref(),
            customer_name: r.customer_name.as_deref(),
            customer_account_number: r.customer_account_number.as_deref(),
            x: r.location.map(|p| p.x),
            y: r.location.map(|p| p.y),
        })?;
        rows += 1;
    }

    wtr.flush()?;
    Ok(rows)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_meters_needing_update_are_exported() {
        let mut done = MeterRecord::new(1);
        done.account_update = Some("Updated".to_string());
        let mut pending = MeterRecord::new(2);
        pending.address = Some("12 Main St, Apt 4".to_string());

        let mut out = Vec::new();
        let rows = write_pending_csv(&[done, pending], &mut out).expect("csv");
        let text = String::from_utf8(out).expect("utf8");

        assert_eq!(rows, 1);
        let mut lines = text.lines();
        assert_eq!(
            lines.next(),
            Some("object_id,address,account_number,customer_name,customer_account_number,x,y")
        );
        assert_eq!(lines.next(), Some("2,\"12 Main St, Apt 4\",,,,,"));
        assert_eq!(lines.next(), None);
    }
}
