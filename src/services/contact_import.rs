// src/services/contact_import.rs

use crate::models::contact::{ContactStatus, ParsedContact};

const DELIMITERS: [char; 4] = [',', ';', '\t', '|'];

const FIRST_NAME_KEYS: &[&str] = &["first_name", "firstname", "first", "fname", "name", "given_name", "nickname"];
const LAST_NAME_KEYS: &[&str] = &["last_name", "lastname", "last", "lname", "surname", "family_name"];
const PHONE_KEYS: &[&str] = &[
    "phone", "phone_number", "phonenumber", "telephone", "mobile", "tel", "cell", "contact_number",
];
const EMAIL_KEYS: &[&str] = &["email", "email_address", "emailaddress", "e-mail", "mail"];
const STATUS_KEYS: &[&str] = &["status"];
const DO_NOT_CALL_KEYS: &[&str] = &["do_not_call", "dnd", "do_not_phone"];
const FULL_NAME_KEYS: &[&str] = &["name", "full_name", "fullname"];

/// Converte o texto de um CSV de contatos. Linhas sem primeiro nome ou sem
/// telefone e e-mail são descartadas; o arquivo nunca é rejeitado por inteiro.
pub fn parse_contact_csv(text: &str) -> Vec<ParsedContact> {
    let lines: Vec<&str> = text
        .split('\n')
        .map(|line| line.strip_suffix('\r').unwrap_or(line))
        .filter(|line| !line.trim().is_empty())
        .collect();

    let Some((header_line, rows)) = lines.split_first() else {
        return Vec::new();
    };
    if rows.is_empty() {
        return Vec::new();
    }

    let delimiter = detect_delimiter(header_line);
    let headers: Vec<String> = header_line.split(delimiter).map(normalize_header).collect();

    rows.iter()
        .filter_map(|line| {
            let row = Row::new(&headers, split_fields(line, delimiter));
            row.to_contact()
        })
        .collect()
}

/// O delimitador que mais divide o cabeçalho; empate fica com a vírgula.
fn detect_delimiter(header: &str) -> char {
    DELIMITERS.iter().fold(',', |best, &candidate| {
        if header.split(candidate).count() > header.split(best).count() {
            candidate
        } else {
            best
        }
    })
}

fn normalize_header(raw: &str) -> String {
    let cleaned: String = raw
        .trim()
        .to_lowercase()
        .chars()
        .filter(|c| *c != '"' && *c != '\'')
        .collect();
    cleaned.split_whitespace().collect::<Vec<_>>().join("_")
}

/// Divide respeitando aspas; `""` dentro de aspas vira uma aspa literal.
fn split_fields(line: &str, delimiter: char) -> Vec<String> {
    let mut fields = Vec::new();
    let mut current = String::new();
    let mut in_quotes = false;
    let mut chars = line.chars().peekable();

    while let Some(c) = chars.next() {
        if c == '"' {
            if in_quotes && chars.peek() == Some(&'"') {
                current.push('"');
                chars.next();
            } else {
                in_quotes = !in_quotes;
            }
        } else if c == delimiter && !in_quotes {
            fields.push(current.trim().to_string());
            current.clear();
        } else {
            current.push(c);
        }
    }
    fields.push(current.trim().to_string());
    fields
}

struct Row {
    // Ordem do cabeçalho; coluna repetida fica com o último valor
    cells: Vec<(String, String)>,
}

impl Row {
    fn new(headers: &[String], values: Vec<String>) -> Self {
        let mut cells: Vec<(String, String)> = Vec::with_capacity(headers.len());
        for (index, header) in headers.iter().enumerate() {
            let mut value = values.get(index).cloned().unwrap_or_default();
            if value.len() >= 2 && value.starts_with('"') && value.ends_with('"') {
                value = value[1..value.len() - 1].to_string();
            }
            match cells.iter_mut().find(|(h, _)| h == header) {
                Some(cell) => cell.1 = value,
                None => cells.push((header.clone(), value)),
            }
        }
        Self { cells }
    }

    fn cell(&self, header: &str) -> Option<&str> {
        self.cells
            .iter()
            .find(|(h, _)| h == header)
            .map(|(_, v)| v.as_str())
    }

    /// Para cada alias, em ordem: nome exato, sem sublinhados e por fim
    /// correspondência parcial com qualquer coluna.
    fn value(&self, keys: &[&str]) -> String {
        for key in keys {
            let normalized = key.to_lowercase().split_whitespace().collect::<Vec<_>>().join("_");
            if let Some(v) = self.cell(&normalized) {
                return v.to_string();
            }

            let collapsed = normalized.replace('_', "");
            if let Some(v) = self.cell(&collapsed) {
                return v.to_string();
            }

            let partial = self
                .cells
                .iter()
                .filter(|(h, _)| !h.is_empty())
                .find(|(h, _)| h.contains(&collapsed) || collapsed.contains(h.as_str()));
            if let Some((_, v)) = partial {
                return v.clone();
            }
        }
        String::new()
    }

    fn to_contact(&self) -> Option<ParsedContact> {
        let mut first_name = self.value(FIRST_NAME_KEYS);
        let mut last_name = self.value(LAST_NAME_KEYS);
        let status = self.value(STATUS_KEYS);
        let do_not_call = matches!(
            self.value(DO_NOT_CALL_KEYS).trim().to_lowercase().as_str(),
            "true" | "1" | "yes" | "y"
        );

        // Coluna de nome completo: separa primeiro nome e sobrenome
        let full_name = self.value(FULL_NAME_KEYS);
        if !full_name.is_empty() && (first_name.is_empty() || first_name == full_name) {
            let mut parts = full_name.split_whitespace();
            if let Some(first) = parts.next() {
                first_name = first.to_string();
                let rest = parts.collect::<Vec<_>>().join(" ");
                if !rest.is_empty() && (last_name.is_empty() || last_name == full_name) {
                    last_name = rest;
                } else if last_name == full_name {
                    last_name.clear();
                }
            }
        }

        let contact = ParsedContact {
            first_name,
            last_name,
            phone: self.value(PHONE_KEYS),
            email: self.value(EMAIL_KEYS),
            status: if status.is_empty() { ContactStatus::Active } else { ContactStatus::parse(&status) },
            do_not_call,
        };

        let reachable = !contact.phone.is_empty() || !contact.email.is_empty();
        (!contact.first_name.is_empty() && reachable).then_some(contact)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn parses_a_standard_quoted_file() {
        let csv = "First Name,Last Name,Phone,Email\n\"Jane\",\"Doe\",\"+15551234567\",\"jane@x.com\"";

        let contacts = parse_contact_csv(csv);
        assert_eq!(
            contacts,
            vec![ParsedContact {
                first_name: "Jane".into(),
                last_name: "Doe".into(),
                phone: "+15551234567".into(),
                email: "jane@x.com".into(),
                status: ContactStatus::Active,
                do_not_call: false,
            }]
        );
    }

    #[test]
    fn header_only_or_empty_input_yields_nothing() {
        assert!(parse_contact_csv("").is_empty());
        assert!(parse_contact_csv("first_name,phone\n\n  \n").is_empty());
    }

    #[test]
    fn detects_semicolons_and_crlf() {
        let csv = "nome;first_name;phone\r\nx;Ana;+5511999990000\r\n";
        let contacts = parse_contact_csv(csv);
        assert_eq!(contacts.len(), 1);
        assert_eq!(contacts[0].first_name, "Ana");
        assert_eq!(contacts[0].phone, "+5511999990000");
    }

    #[test]
    fn tab_and_pipe_delimiters() {
        assert_eq!(detect_delimiter("a\tb\tc"), '\t');
        assert_eq!(detect_delimiter("a|b|c"), '|');
        // empate fica com a vírgula
        assert_eq!(detect_delimiter("a,b;c"), ',');
        assert_eq!(detect_delimiter("single"), ',');
    }

    #[test]
    fn quoted_fields_keep_delimiters_and_escaped_quotes() {
        assert_eq!(
            split_fields(r#""Doe, Jane","say ""hi""", plain "#, ','),
            vec!["Doe, Jane", r#"say "hi""#, "plain"]
        );
    }

    #[test]
    fn full_name_column_is_split() {
        let csv = "Full Name,Mobile\nMaria da Silva,07700900123";
        let contacts = parse_contact_csv(csv);

        assert_eq!(contacts.len(), 1);
        assert_eq!(contacts[0].first_name, "Maria");
        assert_eq!(contacts[0].last_name, "da Silva");
        assert_eq!(contacts[0].phone, "07700900123");
    }

    #[test]
    fn single_name_column_does_not_leak_into_last_name() {
        let contacts = parse_contact_csv("name,email\nPrince,p@x.com");
        assert_eq!(contacts[0].first_name, "Prince");
        assert_eq!(contacts[0].last_name, "");
    }

    #[test]
    fn status_and_do_not_call_flags() {
        let csv = "first_name,phone,status,dnd\nA,111,inactive,yes\nB,222,,0\nC,333,do-not-call,Y";
        let contacts = parse_contact_csv(csv);

        let flags: Vec<(ContactStatus, bool)> = contacts.iter().map(|c| (c.status, c.do_not_call)).collect();
        assert_eq!(
            flags,
            vec![
                (ContactStatus::Inactive, true),
                (ContactStatus::Active, false),
                (ContactStatus::DoNotCall, true),
            ]
        );
    }

    #[test]
    fn rows_without_name_or_contact_are_dropped() {
        let csv = "first_name,phone,email\n,111,\nBob,,\nCarl,,carl@x.com";
        let contacts = parse_contact_csv(csv);
        assert_eq!(contacts.len(), 1);
        assert_eq!(contacts[0].first_name, "Carl");
    }

    #[test]
    fn headers_are_normalized() {
        assert_eq!(normalize_header("  \"Phone  Number\" "), "phone_number");
        assert_eq!(normalize_header("E-Mail"), "e-mail");
    }
}
