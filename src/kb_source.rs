use std::{path::Path, time::UNIX_EPOCH};

use rayon::prelude::*;

use crate::{
    error::{Error, Result},
    kb::{AltNameRecord, EntityRecord, KbBuilder, KnowledgeBase},
};

/// Column positions in the LoReHLT entities file.
pub mod columns {
    pub const ORIGIN: usize = 0;
    pub const ENTITY_TYPE: usize = 1;
    pub const ENTITY_ID: usize = 2;
    pub const NAME: usize = 3;
    pub const LATITUDE: usize = 5;
    pub const LONGITUDE: usize = 6;
    pub const COUNTRY_CODE: usize = 12;
    pub const POPULATION: usize = 21;
    pub const EXTERNAL_LINK: usize = 46;

    pub const ALT_ENTITY_ID: usize = 0;
    pub const ALT_NAME: usize = 1;
}

/// Parse one data line of the entities file. `line` is 1-indexed.
pub fn parse_entity_line(
    source_name: &str,
    line: usize,
    raw: &str,
) -> Result<EntityRecord> {
    let cols: Vec<&str> = raw.split('\t').collect();
    if cols.len() <= columns::NAME {
        return Err(Error::malformed(
            source_name,
            line,
            format!("expected at least 4 columns, found {}", cols.len()),
        ));
    }
    let get = |i: usize| cols.get(i).map(|s| s.trim()).unwrap_or("");
    let non_empty = |i: usize| {
        let v = get(i);
        (!v.is_empty()).then(|| v.to_string())
    };

    let urls = get(columns::EXTERNAL_LINK)
        .split('|')
        .filter(|u| !u.is_empty())
        .map(str::to_string)
        .collect();

    Ok(EntityRecord {
        line,
        origin: get(columns::ORIGIN).to_string(),
        entity_type: get(columns::ENTITY_TYPE).to_string(),
        id: get(columns::ENTITY_ID).to_string(),
        name: get(columns::NAME).to_string(),
        latitude: get(columns::LATITUDE).parse().ok(),
        longitude: get(columns::LONGITUDE).parse().ok(),
        country_code: non_empty(columns::COUNTRY_CODE),
        population: get(columns::POPULATION).parse().ok(),
        urls,
    })
}

/// Parse one data line of the alternate-names file.
pub fn parse_alt_name_line(
    source_name: &str,
    line: usize,
    raw: &str,
) -> Result<AltNameRecord> {
    let cols: Vec<&str> = raw.split('\t').collect();
    match (cols.get(columns::ALT_ENTITY_ID), cols.get(columns::ALT_NAME)) {
        (Some(id), Some(name)) => Ok(AltNameRecord {
            line,
            entity_id: id.trim().to_string(),
            name: name.trim().to_string(),
        }),
        _ => Err(Error::malformed(
            source_name,
            line,
            "expected entity id and name columns",
        )),
    }
}

/// Read a TSV file, skip the header, and parse the data lines in parallel.
///
/// Blank lines are ignored. The output keeps file order.
fn read_tsv<T, F>(path: &Path, parse: F) -> Result<Vec<T>>
where
    T: Send,
    F: Fn(&str, usize, &str) -> Result<T> + Sync,
{
    let content = std::fs::read_to_string(path)?;
    let source_name = path.display().to_string();
    let lines: Vec<(usize, &str)> = content
        .lines()
        .enumerate()
        .skip(1)
        .filter(|(_, l)| !l.trim().is_empty())
        .map(|(i, l)| (i + 1, l))
        .collect();

    lines
        .par_iter()
        .map(|(line, raw)| parse(&source_name, *line, *raw))
        .collect()
}

pub fn read_entity_records(path: &Path) -> Result<Vec<EntityRecord>> {
    read_tsv(path, parse_entity_line)
}

pub fn read_alt_name_records(path: &Path) -> Result<Vec<AltNameRecord>> {
    read_tsv(path, parse_alt_name_line)
}

/// Load a knowledge base from the entities and alternate-names files.
pub fn load_kb(
    builder: &KbBuilder,
    entities_path: &Path,
    alt_names_path: &Path,
) -> Result<KnowledgeBase> {
    let entities = read_entity_records(entities_path)?;
    let names = read_alt_name_records(alt_names_path)?;
    builder.build(entities, names)
}

/// Identity of the source files and filters, used as a cache key.
///
/// Changes whenever a file's size or modification time changes. The
/// time is taken to the nanosecond, so rewriting a file with the same
/// size within one second still invalidates the cache.
pub fn fingerprint(
    builder: &KbBuilder,
    entities_path: &Path,
    alt_names_path: &Path,
) -> Result<String> {
    let mut parts = Vec::new();
    for path in [entities_path, alt_names_path] {
        let meta = std::fs::metadata(path)?;
        let mtime = meta
            .modified()?
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_nanos())
            .unwrap_or(0);
        let abs = path.canonicalize()?;
        parts.push(format!("{}:{}:{}", abs.display(), meta.len(), mtime));
    }
    parts.push(builder.describe());
    Ok(parts.join("\n"))
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::ids::EntityId;

    fn entity_line(cols: &[(usize, &str)]) -> String {
        let mut row = vec![""; 47];
        for (i, v) in cols {
            row[*i] = v;
        }
        row.join("\t")
    }

    #[test]
    fn parse_entity_line_full_row() {
        let raw = entity_line(&[
            (columns::ORIGIN, "WLL"),
            (columns::ENTITY_TYPE, "GPE"),
            (columns::ENTITY_ID, "344979"),
            (columns::NAME, "Addis Ababa"),
            (columns::LATITUDE, "9.02497"),
            (columns::LONGITUDE, "38.74689"),
            (columns::COUNTRY_CODE, "ET"),
            (columns::POPULATION, "2757729"),
            (
                columns::EXTERNAL_LINK,
                "http://en.wikipedia.org/wiki/Addis_Ababa|http://x.org/aa",
            ),
        ]);
        let rec = parse_entity_line("entities", 2, &raw).unwrap();
        assert_eq!(rec.id, "344979");
        assert_eq!(rec.entity_type, "GPE");
        assert_eq!(rec.latitude, Some(9.02497));
        assert_eq!(rec.country_code.as_deref(), Some("ET"));
        assert_eq!(rec.population, Some(2757729));
        assert_eq!(rec.urls.len(), 2);
        assert_eq!(rec.line, 2);
    }

    #[test]
    fn parse_entity_line_short_row() {
        let rec = parse_entity_line("entities", 3, "APB\tPER\t7\tAbebe")
            .unwrap();
        assert_eq!(rec.name, "Abebe");
        assert!(rec.urls.is_empty());
        assert_eq!(rec.population, None);
    }

    #[test]
    fn parse_entity_line_too_few_columns() {
        let err = parse_entity_line("entities", 9, "APB\tPER").unwrap_err();
        assert!(err.to_string().contains("line 9"));
    }

    #[test]
    fn parse_alt_name_requires_two_columns() {
        assert!(parse_alt_name_line("names", 2, "10\tJDawg").is_ok());
        assert!(parse_alt_name_line("names", 3, "10").is_err());
    }

    #[test]
    fn load_kb_from_files() {
        let tmp = tempfile::tempdir().unwrap();
        let entities = tmp.path().join("entities.tab");
        let names = tmp.path().join("alternate_names.tab");
        std::fs::write(
            &entities,
            format!(
                "origin\ttype\tid\tname\n{}\n\n{}\n",
                entity_line(&[
                    (columns::ORIGIN, "WLL"),
                    (columns::ENTITY_TYPE, "GPE"),
                    (columns::ENTITY_ID, "Q1"),
                    (columns::NAME, "Addis Ababa"),
                ]),
                entity_line(&[
                    (columns::ORIGIN, "WLL"),
                    (columns::ENTITY_TYPE, "PER"),
                    (columns::ENTITY_ID, "Q2"),
                    (columns::NAME, "Abebe Bikila"),
                ]),
            ),
        )
        .unwrap();
        std::fs::write(&names, "id\tname\nQ1\tAA\nQ9\tNobody\n").unwrap();

        let kb = load_kb(&KbBuilder::new(), &entities, &names).unwrap();
        assert_eq!(kb.len(), 2);
        let q1 = kb.lookup(&EntityId::new("Q1")).unwrap();
        assert_eq!(q1.names, vec!["Addis Ababa", "AA"]);
    }

    #[test]
    fn fingerprint_changes_with_content() {
        let tmp = tempfile::tempdir().unwrap();
        let entities = tmp.path().join("e.tab");
        let names = tmp.path().join("n.tab");
        std::fs::write(&entities, "h\n").unwrap();
        std::fs::write(&names, "h\n").unwrap();
        let builder = KbBuilder::new();
        let a = fingerprint(&builder, &entities, &names).unwrap();
        std::fs::write(&names, "h\nQ1\tAA\n").unwrap();
        let b = fingerprint(&builder, &entities, &names).unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn fingerprint_sees_sub_second_rewrites() {
        let tmp = tempfile::tempdir().unwrap();
        let entities = tmp.path().join("e.tab");
        let names = tmp.path().join("n.tab");
        std::fs::write(&entities, "h\n").unwrap();
        std::fs::write(&names, "h\nQ1\tAA\n").unwrap();
        let touch = |nanos: u32| {
            let file = std::fs::File::options().write(true).open(&names)?;
            file.set_modified(UNIX_EPOCH + Duration::new(1_700_000_000, nanos))
        };

        let builder = KbBuilder::new();
        touch(100).unwrap();
        let a = fingerprint(&builder, &entities, &names).unwrap();
        std::fs::write(&names, "h\nQ1\tBB\n").unwrap();
        touch(900).unwrap();
        let b = fingerprint(&builder, &entities, &names).unwrap();
        assert_ne!(a, b);
    }
}
