pub mod csv;
pub mod parser;

use std::collections::HashMap;
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::models::NewContact;

static EMAIL_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").unwrap());

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum SerialValue {
    Number(i64),
    Text(String),
}

/// One row of an upload as received, before validation.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct ImportRow {
    #[serde(default, alias = "serial", alias = "serialNumber")]
    pub serial_number: Option<SerialValue>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub company: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RowIssue {
    pub row: usize,
    pub reason: String,
}

#[derive(Debug, Default)]
pub struct ImportBatch {
    pub contacts: Vec<NewContact>,
    pub skipped: Vec<RowIssue>,
    /// Rows whose email appeared earlier in the same upload; the later row wins.
    pub duplicates: usize,
}

/// Validate rows and fold them into one contact per email address.
/// Rows without a serial number take their position in the upload.
pub fn normalize(rows: Vec<ImportRow>) -> ImportBatch {
    let mut batch = ImportBatch::default();
    let mut seen: HashMap<String, usize> = HashMap::new();

    for (index, row) in rows.into_iter().enumerate() {
        let row_number = index + 1;
        match validate_row(row, row_number) {
            Ok(contact) => {
                if let Some(&existing) = seen.get(&contact.email) {
                    batch.contacts[existing] = contact;
                    batch.duplicates += 1;
                } else {
                    seen.insert(contact.email.clone(), batch.contacts.len());
                    batch.contacts.push(contact);
                }
            }
            Err(reason) => batch.skipped.push(RowIssue {
                row: row_number,
                reason,
            }),
        }
    }

    batch
}

fn validate_row(row: ImportRow, row_number: usize) -> Result<NewContact, String> {
    let email = clean(row.email)
        .map(|e| e.to_lowercase())
        .ok_or_else(|| "missing email".to_string())?;
    if !EMAIL_RE.is_match(&email) {
        return Err(format!("invalid email: {email}"));
    }

    let name = clean(row.name).ok_or_else(|| "missing name".to_string())?;

    let serial_number = match row.serial_number {
        None => i32::try_from(row_number).unwrap_or(i32::MAX),
        Some(SerialValue::Number(n)) => {
            i32::try_from(n).map_err(|_| format!("serial number out of range: {n}"))?
        }
        Some(SerialValue::Text(s)) if s.trim().is_empty() => {
            i32::try_from(row_number).unwrap_or(i32::MAX)
        }
        Some(SerialValue::Text(s)) => s
            .trim()
            .parse()
            .map_err(|_| format!("invalid serial number: {s}"))?,
    };

    Ok(NewContact {
        serial_number,
        name,
        email,
        title: clean(row.title),
        company: clean(row.company),
    })
}

fn clean(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(name: &str, email: &str) -> ImportRow {
        ImportRow {
            name: Some(name.into()),
            email: Some(email.into()),
            ..ImportRow::default()
        }
    }

    #[test]
    fn duplicate_email_collapses_to_last_row() {
        let batch = normalize(vec![
            row("Alice", "alice@acme.test"),
            row("Bob", "bob@acme.test"),
            row("Alice Again", " ALICE@acme.test "),
        ]);
        assert_eq!(batch.contacts.len(), 2);
        assert_eq!(batch.duplicates, 1);
        assert_eq!(batch.contacts[0].name, "Alice Again");
        assert_eq!(batch.contacts[0].email, "alice@acme.test");
    }

    #[test]
    fn invalid_rows_are_reported_not_fatal() {
        let batch = normalize(vec![
            row("Alice", "not-an-email"),
            ImportRow {
                email: Some("nameless@acme.test".into()),
                ..ImportRow::default()
            },
            row("Bob", "bob@acme.test"),
        ]);
        assert_eq!(batch.contacts.len(), 1);
        assert_eq!(
            batch.skipped,
            vec![
                RowIssue { row: 1, reason: "invalid email: not-an-email".into() },
                RowIssue { row: 2, reason: "missing name".into() },
            ]
        );
    }

    #[test]
    fn serial_numbers() {
        let mut explicit = row("A", "a@x.test");
        explicit.serial_number = Some(SerialValue::Number(0));
        let mut text = row("B", "b@x.test");
        text.serial_number = Some(SerialValue::Text(" 12 ".into()));
        let mut bad = row("C", "c@x.test");
        bad.serial_number = Some(SerialValue::Text("twelve".into()));
        let implicit = row("D", "d@x.test");

        let batch = normalize(vec![explicit, text, bad, implicit]);
        let serials: Vec<i32> = batch.contacts.iter().map(|c| c.serial_number).collect();
        assert_eq!(serials, vec![0, 12, 4]);
        assert_eq!(batch.skipped[0].row, 3);
    }

    #[test]
    fn blank_optional_fields_become_none() {
        let mut r = row("A", "a@x.test");
        r.title = Some("  ".into());
        r.company = Some("Acme ".into());
        let batch = normalize(vec![r]);
        assert_eq!(batch.contacts[0].title, None);
        assert_eq!(batch.contacts[0].company.as_deref(), Some("Acme"));
    }
}
