use super::ImportRow;

#[derive(Debug, Clone, Copy, PartialEq)]
enum Column {
    Serial,
    Name,
    Email,
    Title,
    Company,
}

impl Column {
    fn label(&self) -> &'static str {
        match self {
            Column::Serial => "serial number",
            Column::Name => "name",
            Column::Email => "email",
            Column::Title => "title",
            Column::Company => "company",
        }
    }
}

/// Map a header cell to a known column, ignoring case, spacing and punctuation.
fn column_for(header: &str) -> Option<Column> {
    let key: String = header
        .chars()
        .filter(|c| c.is_alphanumeric())
        .flat_map(char::to_lowercase)
        .collect();

    match key.as_str() {
        "serialnumber" | "serial" | "serialno" | "sno" | "srno" | "no" => Some(Column::Serial),
        "name" | "fullname" | "hrname" | "contactname" => Some(Column::Name),
        "email" | "emailaddress" | "emailid" | "mail" => Some(Column::Email),
        "title" | "jobtitle" | "designation" | "role" | "position" => Some(Column::Title),
        "company" | "companyname" | "organization" | "organisation" => Some(Column::Company),
        _ => None,
    }
}

/// Split CSV text into records. Handles quoted fields with embedded commas, quotes and
/// newlines; blank lines are dropped.
pub fn parse_records(text: &str) -> Result<Vec<Vec<String>>, String> {
    let text = text.strip_prefix('\u{feff}').unwrap_or(text);

    let mut records = Vec::new();
    let mut record = Vec::new();
    let mut field = String::new();
    let mut in_quotes = false;
    let mut chars = text.chars().peekable();

    while let Some(c) = chars.next() {
        if in_quotes {
            match c {
                '"' if chars.peek() == Some(&'"') => {
                    field.push('"');
                    chars.next();
                }
                '"' => in_quotes = false,
                _ => field.push(c),
            }
            continue;
        }

        match c {
            '"' if field.is_empty() => in_quotes = true,
            ',' => record.push(std::mem::take(&mut field)),
            '\r' if chars.peek() == Some(&'\n') => {}
            '\n' | '\r' => {
                record.push(std::mem::take(&mut field));
                push_record(&mut records, std::mem::take(&mut record));
            }
            _ => field.push(c),
        }
    }

    if in_quotes {
        return Err("Unterminated quoted field".to_string());
    }

    if !field.is_empty() || !record.is_empty() {
        record.push(field);
        push_record(&mut records, record);
    }

    Ok(records)
}

fn push_record(records: &mut Vec<Vec<String>>, record: Vec<String>) {
    if record.iter().any(|f| !f.trim().is_empty()) {
        records.push(record);
    }
}

/// Read contact rows from CSV with a header line.
pub fn parse_contacts(text: &str) -> Result<Vec<ImportRow>, String> {
    let mut records = parse_records(text)?.into_iter();

    let header = records
        .next()
        .ok_or_else(|| "CSV is empty".to_string())?;
    let columns: Vec<Option<Column>> = header.iter().map(|h| column_for(h)).collect();

    for required in [Column::Name, Column::Email] {
        if !columns.contains(&Some(required)) {
            return Err(format!("CSV header is missing the {} column", required.label()));
        }
    }

    let rows = records
        .map(|record| {
            let mut row = ImportRow::default();
            for (column, value) in columns.iter().zip(record) {
                let value = Some(value.trim().to_string()).filter(|v| !v.is_empty());
                match column {
                    Some(Column::Serial) => row.serial_number = value.map(super::SerialValue::Text),
                    Some(Column::Name) => row.name = value,
                    Some(Column::Email) => row.email = value,
                    Some(Column::Title) => row.title = value,
                    Some(Column::Company) => row.company = value,
                    None => {}
                }
            }
            row
        })
        .collect();

    Ok(rows)
}
