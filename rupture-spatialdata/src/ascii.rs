//! Shared reader for the ASCII formats of simple databases and time histories.
//!
//! Both formats consist of a magic line, a `Name { key = value ... }` header with optional
//! nested blocks (`cs-data = cartesian { ... }`) and a free-form block of numbers.
use crate::error::ParseError;
use std::collections::BTreeMap;
use std::str::FromStr;

fn strip_comment(line: &str) -> &str {
    match line.find("//") {
        Some(idx) => line[..idx].trim(),
        None => line.trim(),
    }
}

pub(crate) struct AsciiDocument<'a> {
    /// Keys of nested blocks are joined with `.`, e.g. `cs-data.to-meters`.
    entries: BTreeMap<String, (usize, String)>,
    header_end_line: usize,
    data: Vec<(usize, &'a str)>,
}

impl<'a> AsciiDocument<'a> {
    pub fn parse(text: &'a str, magic: &str, block: &str) -> Result<Self, ParseError> {
        let mut lines = text
            .lines()
            .enumerate()
            .map(|(idx, line)| (idx + 1, strip_comment(line)))
            .filter(|(_, line)| !line.is_empty());

        let (line_no, first) = lines.next().ok_or_else(|| ParseError::new(0, "empty input"))?;
        if !first.starts_with(magic) {
            return Err(ParseError::new(line_no, format!("expected magic header '{}'", magic)));
        }

        let (line_no, opening) = lines
            .next()
            .ok_or_else(|| ParseError::new(0, format!("missing '{}' block", block)))?;
        let opening: Vec<_> = opening.split_whitespace().collect();
        if opening != [block, "{"] {
            return Err(ParseError::new(line_no, format!("expected '{} {{'", block)));
        }

        let mut prefixes: Vec<String> = Vec::new();
        let mut entries = BTreeMap::new();
        let mut header_end_line = None;
        for (line_no, line) in lines.by_ref() {
            if line == "}" {
                if prefixes.pop().is_none() {
                    header_end_line = Some(line_no);
                    break;
                }
                continue;
            }

            let (key, value) = line
                .split_once('=')
                .ok_or_else(|| ParseError::new(line_no, "expected 'key = value'"))?;
            let key = key.trim();
            let value = value.trim();
            let mut full_key = String::new();
            for prefix in &prefixes {
                full_key.push_str(prefix);
                full_key.push('.');
            }
            full_key.push_str(key);

            if let Some(kind) = value.strip_suffix('{') {
                entries.insert(full_key, (line_no, kind.trim().to_string()));
                prefixes.push(key.to_string());
            } else {
                entries.insert(full_key, (line_no, value.to_string()));
            }
        }

        let header_end_line =
            header_end_line.ok_or_else(|| ParseError::new(0, format!("unterminated '{}' block", block)))?;

        Ok(Self {
            entries,
            header_end_line,
            data: lines.collect(),
        })
    }

    pub fn get(&self, key: &str) -> Result<(usize, &str), ParseError> {
        self.entries
            .get(key)
            .map(|(line, value)| (*line, value.as_str()))
            .ok_or_else(|| ParseError::new(self.header_end_line, format!("missing header entry '{}'", key)))
    }

    pub fn get_parsed<V: FromStr>(&self, key: &str) -> Result<V, ParseError> {
        let (line, value) = self.get(key)?;
        value
            .parse()
            .map_err(|_| ParseError::new(line, format!("invalid value '{}' for '{}'", value, key)))
    }

    pub fn get_parsed_or<V: FromStr>(&self, key: &str, default: V) -> Result<V, ParseError> {
        if self.entries.contains_key(key) {
            self.get_parsed(key)
        } else {
            Ok(default)
        }
    }

    /// Whitespace-separated tokens of a header entry.
    pub fn get_list(&self, key: &str) -> Result<(usize, Vec<&str>), ParseError> {
        let (line, value) = self.get(key)?;
        Ok((line, value.split_whitespace().collect()))
    }

    /// Splits the data section into rows of `row_len` numbers each.
    ///
    /// Rows may span or share lines, only the total count of numbers matters.
    pub fn data_rows(&self, row_len: usize, num_rows: usize) -> Result<Vec<Vec<f64>>, ParseError> {
        let mut numbers = Vec::with_capacity(row_len * num_rows);
        for (line_no, line) in &self.data {
            for token in line.split_whitespace() {
                let value: f64 = token
                    .parse()
                    .map_err(|_| ParseError::new(*line_no, format!("invalid number '{}'", token)))?;
                numbers.push(value);
            }
        }

        if numbers.len() != row_len * num_rows {
            let last_line = self.data.last().map(|(line, _)| *line).unwrap_or(self.header_end_line);
            return Err(ParseError::new(
                last_line,
                format!(
                    "expected {} rows of {} numbers ({} in total), found {} numbers",
                    num_rows,
                    row_len,
                    row_len * num_rows,
                    numbers.len()
                ),
            ));
        }

        Ok(numbers.chunks(row_len.max(1)).map(|row| row.to_vec()).collect())
    }
}
