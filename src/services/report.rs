//! CSV export of reconciliation issues for operators.

use csv::Writer;
use serde::Serialize;
use std::io::Write;

use crate::domain::ReconciliationIssue;

#[derive(Debug, Serialize)]
struct IssueCsvRow {
    id: String,
    created_at: String,
    kind: &'static str,
    transaction_id: String,
    provider_order_code: String,
    campaign_id: String,
    amount: i64,
    detail: String,
    resolved: bool,
    resolved_note: String,
    resolved_at: String,
}

impl From<&ReconciliationIssue> for IssueCsvRow {
    fn from(issue: &ReconciliationIssue) -> Self {
        IssueCsvRow {
            id: issue.id.to_string(),
            created_at: issue.created_at.to_rfc3339(),
            kind: issue.kind.as_str(),
            transaction_id: issue.transaction_id.to_string(),
            provider_order_code: issue.provider_order_code.clone(),
            campaign_id: issue.campaign_id.map(|id| id.to_string()).unwrap_or_default(),
            amount: issue.amount,
            detail: issue.detail.clone(),
            resolved: issue.resolved,
            resolved_note: issue.resolved_note.clone().unwrap_or_default(),
            resolved_at: issue.resolved_at.map(|t| t.to_rfc3339()).unwrap_or_default(),
        }
    }
}

pub fn write_issues_csv<W: Write>(issues: &[ReconciliationIssue], writer: W) -> Result<(), csv::Error> {
    let mut wtr = Writer::from_writer(writer);
    if issues.is_empty() {
        wtr.write_record([
            "id",
            "created_at",
            "kind",
            "transaction_id",
            "provider_order_code",
            "campaign_id",
            "amount",
            "detail",
            "resolved",
            "resolved_note",
            "resolved_at",
        ])?;
    }
    for issue in issues {
        wtr.serialize(IssueCsvRow::from(issue))?;
    }
    wtr.flush()?;
    Ok(())
}

pub fn issues_csv_string(issues: &[ReconciliationIssue]) -> Result<String, csv::Error> {
    let mut buf = Vec::new();
    write_issues_csv(issues, &mut buf)?;
    String::from_utf8(buf).map_err(|e| csv::Error::from(std::io::Error::new(std::io::ErrorKind::InvalidData, e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::IssueKind;
    use uuid::Uuid;

    #[test]
    fn test_csv_has_header_and_row() {
        let issue = ReconciliationIssue::open(
            Uuid::new_v4(),
            "261018_000007",
            None,
            25_000,
            IssueKind::PartialCredit,
            "connection reset, during increment",
        );
        let csv = issues_csv_string(&[issue]).unwrap();
        let mut lines = csv.lines();
        assert!(lines.next().unwrap().starts_with("id,created_at,kind,"));
        let row = lines.next().unwrap();
        assert!(row.contains("partial_credit"));
        assert!(row.contains("261018_000007"));
        assert!(row.contains("\"connection reset, during increment\""));
        assert!(lines.next().is_none());
    }

    #[test]
    fn test_empty_report_still_has_header() {
        let csv = issues_csv_string(&[]).unwrap();
        assert_eq!(csv.lines().count(), 1);
    }
}
