use std::path::Path;

use super::RawAlignment;
use crate::libs::error::Result;
use crate::libs::seqcode::rm_illegal;

/// `>name` headers followed by wrapped sequence lines
pub fn parse(lines: &[String], _path: &Path) -> Result<RawAlignment> {
    let mut raw = RawAlignment::default();
    let mut current: Option<(String, String)> = None;

    for line in lines {
        let line = line.trim();
        if let Some(header) = line.strip_prefix('>') {
            if let Some(record) = current.take() {
                raw.records.push(record);
            }
            current = Some((rm_illegal(header.trim()), String::new()));
        } else if !line.is_empty() {
            if let Some((_, seq)) = current.as_mut() {
                seq.extend(line.chars().filter(|c| *c != ' ' && *c != '*'));
            }
        }
    }
    if let Some(record) = current.take() {
        raw.records.push(record);
    }

    Ok(raw)
}
