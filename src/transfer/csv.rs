//! Minimal RFC 4180 reader and writer for the key table.

/// Quote a field, doubling embedded quotes.
pub fn quote(field: &str) -> String {
    format!("\"{}\"", field.replace('"', "\"\""))
}

/// Split CSV text into records. Quoted fields may contain commas, doubled
/// quotes and line breaks. Blank lines are dropped.
pub fn parse_records(text: &str) -> Vec<Vec<String>> {
    let mut records = Vec::new();
    let mut record: Vec<String> = Vec::new();
    let mut field = String::new();
    let mut in_quotes = false;
    let mut field_was_quoted = false;
    let mut chars = text.chars().peekable();

    let finish_field = |record: &mut Vec<String>, field: &mut String, quoted: bool| {
        let value = std::mem::take(field);
        record.push(if quoted { value } else { value.trim().to_string() });
    };

    while let Some(c) = chars.next() {
        if in_quotes {
            match c {
                '"' if chars.peek() == Some(&'"') => {
                    chars.next();
                    field.push('"');
                }
                '"' => in_quotes = false,
                _ => field.push(c),
            }
            continue;
        }

        match c {
            '"' if field.trim().is_empty() => {
                field.clear();
                in_quotes = true;
                field_was_quoted = true;
            }
            ',' => {
                finish_field(&mut record, &mut field, field_was_quoted);
                field_was_quoted = false;
            }
            '\r' if chars.peek() == Some(&'\n') => {}
            '\n' | '\r' => {
                finish_field(&mut record, &mut field, field_was_quoted);
                field_was_quoted = false;
                let done = std::mem::take(&mut record);
                if !is_blank(&done) {
                    records.push(done);
                }
            }
            _ => field.push(c),
        }
    }

    if !field.is_empty() || field_was_quoted || !record.is_empty() {
        finish_field(&mut record, &mut field, field_was_quoted);
        if !is_blank(&record) {
            records.push(record);
        }
    }
    records
}

fn is_blank(record: &[String]) -> bool {
    record.iter().all(|f| f.is_empty())
}
