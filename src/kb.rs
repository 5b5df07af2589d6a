//! In-memory knowledge base.
//!
//! A [`KnowledgeBase`] is built once from two correlated record streams
//! (entity attributes and alternate names) and is read-only afterwards.
//! Share it behind an `Arc` with the stages that need it.

use std::{
    collections::{HashMap, HashSet},
    fs::File,
    io::{BufRead, BufReader},
    path::Path,
};

use tracing::{debug, info};

use crate::{
    error::{Error, Result},
    ids::EntityId,
    lang::Lang,
    model::{Entity, EntityType},
    text,
};

const ENTITY_SOURCE: &str = "entities";
const NAME_SOURCE: &str = "alternate names";

/// One row of the entity attribute source, before validation.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EntityRecord {
    /// 1-indexed line in the source, for error messages.
    pub line: usize,
    pub origin: String,
    pub entity_type: String,
    pub id: String,
    pub name: String,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub country_code: Option<String>,
    pub population: Option<u64>,
    pub urls: Vec<String>,
}

impl EntityRecord {
    pub fn new(id: &str, entity_type: &str, name: &str) -> Self {
        Self {
            id: id.to_string(),
            entity_type: entity_type.to_string(),
            name: name.to_string(),
            ..Self::default()
        }
    }

    fn into_entity(self, entity_type: EntityType) -> Entity {
        let mut entity = Entity::new(self.id, entity_type, &self.name);
        entity.origin = self.origin;
        entity.latitude = self.latitude;
        entity.longitude = self.longitude;
        entity.country_code = self.country_code;
        entity.population = self.population;
        entity.urls = self.urls;
        entity
    }
}

/// One row of the alternate-name source.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AltNameRecord {
    pub line: usize,
    pub entity_id: String,
    pub name: String,
}

impl AltNameRecord {
    pub fn new(entity_id: &str, name: &str) -> Self {
        Self {
            line: 0,
            entity_id: entity_id.to_string(),
            name: name.to_string(),
        }
    }
}

/// Decides whether an entity record is loaded.
///
/// `Some(true)` keeps, `Some(false)` drops, `None` defers to the next
/// filter of a cascade. At the top level an undecided record is dropped.
pub trait EntityFilter: Send + Sync {
    fn filter(&self, record: &EntityRecord) -> Option<bool>;

    /// Short description, part of the KB cache fingerprint.
    fn describe(&self) -> String;
}

/// Runs filters in order; the first decisive answer wins.
pub struct CascadeEntityFilter {
    filters: Vec<Box<dyn EntityFilter>>,
}

impl CascadeEntityFilter {
    pub fn new(filters: Vec<Box<dyn EntityFilter>>) -> Self {
        Self { filters }
    }
}

impl EntityFilter for CascadeEntityFilter {
    fn filter(&self, record: &EntityRecord) -> Option<bool> {
        let decision = self.filters.iter().find_map(|f| f.filter(record));
        Some(decision.unwrap_or(false))
    }

    fn describe(&self) -> String {
        let parts: Vec<String> =
            self.filters.iter().map(|f| f.describe()).collect();
        format!("cascade({})", parts.join(","))
    }
}

/// Keeps entities whose origin starts with one of the given codes
/// (`WLL`, `APB`, `AUG`).
pub struct OriginFilter {
    origins: Vec<String>,
}

impl OriginFilter {
    pub fn new<S: AsRef<str>>(origins: &[S]) -> Self {
        Self {
            origins: origins.iter().map(|o| o.as_ref().to_string()).collect(),
        }
    }
}

impl EntityFilter for OriginFilter {
    fn filter(&self, record: &EntityRecord) -> Option<bool> {
        self.origins
            .iter()
            .any(|o| record.origin.starts_with(o.as_str()))
            .then_some(true)
    }

    fn describe(&self) -> String {
        format!("origin({})", self.origins.join("|"))
    }
}

/// Keeps entities that carry at least one external link.
pub struct ExternalLinkFilter;

impl EntityFilter for ExternalLinkFilter {
    fn filter(&self, record: &EntityRecord) -> Option<bool> {
        (!record.urls.is_empty()).then_some(true)
    }

    fn describe(&self) -> String {
        "links".to_string()
    }
}

/// Keeps entities from the given two-letter country codes.
pub struct CountryFilter {
    codes: Vec<String>,
}

impl CountryFilter {
    pub fn new<S: AsRef<str>>(codes: &[S]) -> Self {
        Self {
            codes: codes
                .iter()
                .map(|c| c.as_ref().to_ascii_uppercase())
                .collect(),
        }
    }
}

impl EntityFilter for CountryFilter {
    fn filter(&self, record: &EntityRecord) -> Option<bool> {
        let code = record.country_code.as_deref()?;
        self.codes.iter().any(|c| c == code).then_some(true)
    }

    fn describe(&self) -> String {
        format!("country({})", self.codes.join("|"))
    }
}

/// Decides whether an alternate name is loaded.
///
/// Answers like [`EntityFilter`]: `None` defers to the next filter of a
/// cascade, and an undecided name is dropped at the top level.
pub trait NameFilter: Send + Sync {
    fn filter(&self, name: &str) -> Option<bool>;

    fn describe(&self) -> String;
}

/// Runs name filters in order; the first decisive answer wins.
pub struct CascadeNameFilter {
    filters: Vec<Box<dyn NameFilter>>,
}

impl CascadeNameFilter {
    pub fn new(filters: Vec<Box<dyn NameFilter>>) -> Self {
        Self { filters }
    }
}

impl NameFilter for CascadeNameFilter {
    fn filter(&self, name: &str) -> Option<bool> {
        let decision = self.filters.iter().find_map(|f| f.filter(name));
        Some(decision.unwrap_or(false))
    }

    fn describe(&self) -> String {
        let parts: Vec<String> =
            self.filters.iter().map(|f| f.describe()).collect();
        format!("cascade({})", parts.join(","))
    }
}

/// Writing systems recognised by [`ScriptNameFilter`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Script {
    Geez,
    Arabic,
    Sinhala,
}

impl Script {
    fn contains(self, c: char) -> bool {
        let range = match self {
            Script::Geez => '\u{1200}'..='\u{137F}',
            Script::Arabic => '\u{0600}'..='\u{06FF}',
            Script::Sinhala => '\u{0D80}'..='\u{0DFF}',
        };
        range.contains(&c)
    }

    pub fn parse(label: &str) -> Option<Self> {
        match label.to_ascii_lowercase().as_str() {
            "geez" | "ge'ez" => Some(Script::Geez),
            "arabic" => Some(Script::Arabic),
            "sinhala" => Some(Script::Sinhala),
            _ => None,
        }
    }
}

/// Keeps ASCII names plus names written entirely in one of the scripts.
/// Other names are left to the next filter.
pub struct ScriptNameFilter {
    scripts: Vec<Script>,
}

impl ScriptNameFilter {
    pub fn new(scripts: Vec<Script>) -> Self {
        Self { scripts }
    }
}

impl NameFilter for ScriptNameFilter {
    fn filter(&self, name: &str) -> Option<bool> {
        let cleaned = text::replace_punctuation(name);
        let keep = text::is_ascii(&cleaned)
            || self.scripts.iter().any(|script| {
                cleaned
                    .chars()
                    .all(|c| c.is_whitespace() || script.contains(c))
            });
        keep.then_some(true)
    }

    fn describe(&self) -> String {
        format!("scripts({:?})", self.scripts)
    }
}

/// Column positions of a GeoNames `alternateNamesV2.txt` row.
pub mod geonames_columns {
    pub const LANG: usize = 2;
    pub const NAME: usize = 3;
}

/// Judges names by the language GeoNames records for them.
///
/// Names GeoNames lists in English, in the language of interest or
/// without a language are kept, names it lists only in other languages
/// are dropped, and names it does not know are left to the next filter.
/// A name listed in several languages keeps the first wanted one.
pub struct LanguageNameFilter {
    lang: Lang,
    wanted: HashSet<String>,
    names: HashMap<String, String>,
}

impl LanguageNameFilter {
    /// Read an unzipped `alternateNamesV2.txt`.
    pub fn open(path: &Path, lang: Lang) -> Result<Self> {
        let file = File::open(path)?;
        let source_name = path.display().to_string();
        Self::from_reader(BufReader::new(file), lang, &source_name)
    }

    pub fn from_reader<R: BufRead>(
        reader: R,
        lang: Lang,
        source_name: &str,
    ) -> Result<Self> {
        let wanted: HashSet<String> = [
            "",
            Lang::ENGLISH.two_letter(),
            Lang::ENGLISH.code(),
            lang.two_letter(),
            lang.code(),
        ]
        .into_iter()
        .map(str::to_string)
        .collect();

        let mut names: HashMap<String, String> = HashMap::new();
        for (i, line) in reader.lines().enumerate() {
            let line = line?;
            if line.is_empty() {
                continue;
            }
            let cols: Vec<&str> = line.split('\t').collect();
            if cols.len() <= geonames_columns::NAME {
                let reason = format!("expected 4 columns, got {}", cols.len());
                return Err(Error::malformed(source_name, i + 1, reason));
            }
            let code = cols[geonames_columns::LANG];
            let name = cols[geonames_columns::NAME].to_lowercase();
            if names.get(&name).is_some_and(|known| wanted.contains(known)) {
                continue;
            }
            names.insert(name, code.to_string());
        }
        debug!(names = names.len(), %lang, "read GeoNames name languages");
        Ok(Self {
            lang,
            wanted,
            names,
        })
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}

impl NameFilter for LanguageNameFilter {
    fn filter(&self, name: &str) -> Option<bool> {
        let code = self.names.get(&name.to_lowercase())?;
        Some(self.wanted.contains(code))
    }

    fn describe(&self) -> String {
        format!("lang({},{})", self.lang, self.names.len())
    }
}

/// Configures filtering, then builds a [`KnowledgeBase`] from records.
#[derive(Default)]
pub struct KbBuilder {
    entity_filter: Option<Box<dyn EntityFilter>>,
    name_filter: Option<Box<dyn NameFilter>>,
}

impl KbBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn entity_filter(mut self, filter: Box<dyn EntityFilter>) -> Self {
        self.entity_filter = Some(filter);
        self
    }

    pub fn name_filter(mut self, filter: Box<dyn NameFilter>) -> Self {
        self.name_filter = Some(filter);
        self
    }

    /// Description of the active filters, used to fingerprint caches.
    pub fn describe(&self) -> String {
        let entity = self
            .entity_filter
            .as_ref()
            .map(|f| f.describe())
            .unwrap_or_else(|| "all".to_string());
        let names = self
            .name_filter
            .as_ref()
            .map(|f| f.describe())
            .unwrap_or_else(|| "all".to_string());
        format!("entities={entity};names={names}")
    }

    /// Validate and load both record streams.
    ///
    /// Fails with [`Error::MalformedRecord`] on a missing id, an unknown
    /// entity type or a duplicate id. Alternate names pointing at ids that
    /// were not loaded are skipped.
    pub fn build<E, N>(&self, entities: E, names: N) -> Result<KnowledgeBase>
    where
        E: IntoIterator<Item = EntityRecord>,
        N: IntoIterator<Item = AltNameRecord>,
    {
        let mut seen: HashSet<String> = HashSet::new();
        let mut loaded = Vec::new();
        let mut filtered = 0usize;

        for record in entities {
            if record.id.trim().is_empty() {
                return Err(Error::malformed(
                    ENTITY_SOURCE,
                    record.line,
                    "missing entity id",
                ));
            }
            let entity_type = EntityType::parse(&record.entity_type)
                .ok_or_else(|| {
                    Error::malformed(
                        ENTITY_SOURCE,
                        record.line,
                        format!("unknown entity type {:?}", record.entity_type),
                    )
                })?;
            if !seen.insert(record.id.clone()) {
                return Err(Error::malformed(
                    ENTITY_SOURCE,
                    record.line,
                    format!("duplicate entity id {}", record.id),
                ));
            }
            if let Some(filter) = &self.entity_filter
                && filter.filter(&record) != Some(true)
            {
                filtered += 1;
                continue;
            }
            loaded.push(record.into_entity(entity_type));
        }
        info!(
            entities = loaded.len(),
            filtered, "loaded knowledge base entities"
        );

        let mut kb = KnowledgeBase::index_entities(loaded);

        let mut added = 0usize;
        let mut orphaned = 0usize;
        for record in names {
            if record.entity_id.trim().is_empty() {
                return Err(Error::malformed(
                    NAME_SOURCE,
                    record.line,
                    "missing entity id",
                ));
            }
            let Some(&pos) = kb.by_id.get(&EntityId::new(&*record.entity_id))
            else {
                orphaned += 1;
                continue;
            };
            if let Some(filter) = &self.name_filter
                && filter.filter(&record.name) != Some(true)
            {
                continue;
            }
            if kb.entities[pos].add_name(&record.name) {
                added += 1;
            }
        }
        debug!(orphaned, "skipped names of entities that were not loaded");
        info!(names = added, "loaded alternate names");

        kb.index_names();
        Ok(kb)
    }
}

/// Immutable collection of entities plus a case-folded name → id map.
#[derive(Debug, Clone, Default)]
pub struct KnowledgeBase {
    entities: Vec<Entity>,
    by_id: HashMap<EntityId, usize>,
    by_name: HashMap<String, Vec<usize>>,
}

impl KnowledgeBase {
    pub fn builder() -> KbBuilder {
        KbBuilder::new()
    }

    /// Build without filtering.
    pub fn from_records<E, N>(entities: E, names: N) -> Result<Self>
    where
        E: IntoIterator<Item = EntityRecord>,
        N: IntoIterator<Item = AltNameRecord>,
    {
        KbBuilder::new().build(entities, names)
    }

    /// Rebuild from already validated entities (e.g. from a cache).
    pub fn from_entities(entities: Vec<Entity>) -> Result<Self> {
        let mut seen = HashSet::new();
        for (i, entity) in entities.iter().enumerate() {
            if !seen.insert(&entity.id) {
                return Err(Error::malformed(
                    ENTITY_SOURCE,
                    i + 1,
                    format!("duplicate entity id {}", entity.id),
                ));
            }
        }
        let mut kb = Self::index_entities(entities);
        kb.index_names();
        Ok(kb)
    }

    fn index_entities(entities: Vec<Entity>) -> Self {
        let by_id = entities
            .iter()
            .enumerate()
            .map(|(i, e)| (e.id.clone(), i))
            .collect();
        Self {
            entities,
            by_id,
            by_name: HashMap::new(),
        }
    }

    fn index_names(&mut self) {
        let mut by_name: HashMap<String, Vec<usize>> = HashMap::new();
        for (pos, entity) in self.entities.iter().enumerate() {
            for name in &entity.names {
                let slot = by_name.entry(text::name_key(name)).or_default();
                if slot.last() != Some(&pos) {
                    slot.push(pos);
                }
            }
        }
        self.by_name = by_name;
    }

    pub fn len(&self) -> usize {
        self.entities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    /// Fetch an entity, failing with [`Error::NotFound`] if absent.
    pub fn lookup(&self, id: &EntityId) -> Result<&Entity> {
        self.get(id).ok_or_else(|| Error::NotFound {
            kind: "entity",
            name: id.to_string(),
        })
    }

    pub fn get(&self, id: &EntityId) -> Option<&Entity> {
        self.by_id.get(id).map(|&pos| &self.entities[pos])
    }

    pub fn contains(&self, id: &EntityId) -> bool {
        self.by_id.contains_key(id)
    }

    /// Entities that exist among `ids`, in the requested order.
    pub fn get_entities(&self, ids: &[EntityId]) -> Vec<&Entity> {
        ids.iter().filter_map(|id| self.get(id)).collect()
    }

    /// Load-order position of an entity.
    pub fn position(&self, id: &EntityId) -> Option<usize> {
        self.by_id.get(id).copied()
    }

    /// Every entity in load order. Call again to restart.
    pub fn all_entities(&self) -> impl Iterator<Item = &Entity> + '_ {
        self.entities.iter()
    }

    /// Ids of entities with a name equal to `name`, ignoring case and
    /// extra whitespace, in load order.
    pub fn ids_for_name(&self, name: &str) -> Vec<&EntityId> {
        self.by_name
            .get(&text::name_key(name))
            .map(|positions| {
                positions.iter().map(|&p| &self.entities[p].id).collect()
            })
            .unwrap_or_default()
    }

    pub fn entities(&self) -> &[Entity] {
        &self.entities
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn small_kb_records() -> (Vec<EntityRecord>, Vec<AltNameRecord>) {
        let mut e1 = EntityRecord::new("10", "PER", "John Smith");
        e1.origin = "WLL".to_string();
        e1.country_code = Some("ET".to_string());
        let mut e2 = EntityRecord::new("11", "PER", "John");
        e2.origin = "APB".to_string();
        let mut e3 = EntityRecord::new("12", "GPE", "Addis Ababa");
        e3.origin = "AUG".to_string();
        e3.urls = vec!["http://en.wikipedia.org/wiki/Addis_Ababa".into()];
        let e4 = EntityRecord::new("14", "ORG", "African Union");
        let names = vec![
            AltNameRecord::new("10", "JDawg"),
            AltNameRecord::new("10", "John"),
            AltNameRecord::new("12", "AA"),
            AltNameRecord::new("13", "Ghost"),
            AltNameRecord::new("12", "አዲስ አበባ"),
            AltNameRecord::new("12", "Аддис-Абеба"),
        ];
        (vec![e1, e2, e3, e4], names)
    }

    fn small_kb() -> KnowledgeBase {
        let (entities, names) = small_kb_records();
        KnowledgeBase::from_records(entities, names).unwrap()
    }

    #[test]
    fn lookup_person() {
        let kb = small_kb();
        let entity = kb.lookup(&EntityId::new("10")).unwrap();
        assert_eq!(entity.id.as_str(), "10");
        assert!(entity.names.iter().any(|n| n == "JDawg"));
    }

    #[test]
    fn lookup_missing_is_not_found() {
        let kb = small_kb();
        let err = kb.lookup(&EntityId::new("13")).unwrap_err();
        assert!(matches!(err, Error::NotFound { kind: "entity", .. }));
    }

    #[test]
    fn get_entities_skips_missing() {
        let kb = small_kb();
        let ids = ["1", "10", "12"].map(EntityId::from);
        let found = kb.get_entities(&ids);
        assert_eq!(found.len(), 2);
        assert_eq!(found[0].id.as_str(), "10");
    }

    #[test]
    fn iteration_is_restartable_and_ordered() {
        let kb = small_kb();
        let first: Vec<_> = kb.all_entities().map(|e| e.id.clone()).collect();
        let second: Vec<_> = kb.all_entities().map(|e| e.id.clone()).collect();
        assert_eq!(first.len(), 4);
        assert_eq!(first, second);
        assert_eq!(first[0].as_str(), "10");
    }

    #[test]
    fn reverse_name_map_is_case_insensitive() {
        let kb = small_kb();
        let ids: Vec<_> =
            kb.ids_for_name("john").iter().map(|i| i.as_str()).collect();
        assert_eq!(ids, vec!["10", "11"]);
        assert_eq!(kb.ids_for_name("aa")[0].as_str(), "12");
        assert!(kb.ids_for_name("Ghost").is_empty());
    }

    #[test]
    fn missing_id_is_malformed() {
        let err = KnowledgeBase::from_records(
            vec![EntityRecord::new("", "PER", "Nobody")],
            Vec::new(),
        )
        .unwrap_err();
        assert!(matches!(err, Error::MalformedRecord { .. }));
    }

    #[test]
    fn duplicate_id_is_malformed() {
        let err = KnowledgeBase::from_records(
            vec![
                EntityRecord::new("1", "PER", "A"),
                EntityRecord::new("1", "ORG", "B"),
            ],
            Vec::new(),
        )
        .unwrap_err();
        assert!(err.to_string().contains("duplicate entity id 1"));
    }

    #[test]
    fn unknown_type_is_malformed() {
        let err = KnowledgeBase::from_records(
            vec![EntityRecord::new("1", "DOG", "Rex")],
            Vec::new(),
        )
        .unwrap_err();
        assert!(matches!(err, Error::MalformedRecord { .. }));
    }

    #[test]
    fn cascade_filter_first_decision_wins() {
        let (entities, names) = small_kb_records();
        let filter = CascadeEntityFilter::new(vec![
            Box::new(CountryFilter::new(&["et"])),
            Box::new(ExternalLinkFilter),
        ]);
        let kb = KnowledgeBase::builder()
            .entity_filter(Box::new(filter))
            .build(entities, names)
            .unwrap();
        let ids: Vec<_> = kb.all_entities().map(|e| e.id.as_str()).collect();
        assert_eq!(ids, vec!["10", "12"]);
    }

    #[test]
    fn origin_filter_matches_prefix() {
        let (entities, names) = small_kb_records();
        let kb = KnowledgeBase::builder()
            .entity_filter(Box::new(OriginFilter::new(&["WLL", "AUG"])))
            .build(entities, names)
            .unwrap();
        assert_eq!(kb.len(), 2);
        assert!(!kb.contains(&EntityId::new("11")));
    }

    #[test]
    fn script_filter_keeps_ascii_and_selected_scripts() {
        let (entities, names) = small_kb_records();
        let kb = KnowledgeBase::builder()
            .name_filter(Box::new(ScriptNameFilter::new(vec![Script::Geez])))
            .build(entities, names)
            .unwrap();
        let addis = kb.lookup(&EntityId::new("12")).unwrap();
        assert!(addis.has_name("AA"));
        assert!(addis.has_name("አዲስ አበባ"));
        assert!(!addis.has_name("Аддис-Абеба"));
    }

    const ALTERNATE_NAMES: &str = "1\t12\tam\tአዲስ አበባ\t\t\t\t\t\t\n\
        2\t12\tru\tАддис-Абеба\t\t\t\t\t\t\n\
        3\t12\ten\tAA\t\t\t\t\t\t\n\
        4\t12\tru\tAA\t\t\t\t\t\t\n\
        5\t12\t\tFinfinne\t\t\t\t\t\t\n";

    fn language_filter(code: &str) -> LanguageNameFilter {
        let lang = Lang::from_code(code).unwrap();
        LanguageNameFilter::from_reader(ALTERNATE_NAMES.as_bytes(), lang, "alt")
            .unwrap()
    }

    #[test]
    fn language_filter_uses_geonames_languages() {
        let filter = language_filter("am");
        assert_eq!(filter.len(), 4);
        assert_eq!(filter.filter("አዲስ አበባ"), Some(true));
        assert_eq!(filter.filter("Аддис-Абеба"), Some(false));
        // Listed in English first, so the Russian row does not count.
        assert_eq!(filter.filter("aa"), Some(true));
        assert_eq!(filter.filter("Finfinne"), Some(true));
        assert_eq!(filter.filter("JDawg"), None);
        assert_eq!(filter.describe(), "lang(amh,4)");
    }

    #[test]
    fn short_geonames_row_is_malformed() {
        let lang = Lang::ENGLISH;
        let err = LanguageNameFilter::from_reader(
            "1\t12\ten\n".as_bytes(),
            lang,
            "alt",
        )
        .err()
        .unwrap();
        assert!(matches!(err, Error::MalformedRecord { line: 1, .. }));
    }

    #[test]
    fn cascade_name_filter_falls_through_to_scripts() {
        let (entities, names) = small_kb_records();
        let filter = CascadeNameFilter::new(vec![
            Box::new(language_filter("ru")),
            Box::new(ScriptNameFilter::new(Vec::new())),
        ]);
        let kb = KnowledgeBase::builder()
            .name_filter(Box::new(filter))
            .build(entities, names)
            .unwrap();
        let addis = kb.lookup(&EntityId::new("12")).unwrap();
        assert!(addis.has_name("AA"));
        assert!(addis.has_name("Аддис-Абеба"));
        assert!(!addis.has_name("አዲስ አበባ"));
        assert!(kb.lookup(&EntityId::new("10")).unwrap().has_name("JDawg"));
    }

    #[test]
    fn undecided_names_are_dropped() {
        let (entities, names) = small_kb_records();
        let kb = KnowledgeBase::builder()
            .name_filter(Box::new(language_filter("am")))
            .build(entities, names)
            .unwrap();
        assert!(!kb.lookup(&EntityId::new("10")).unwrap().has_name("JDawg"));
        assert!(kb.lookup(&EntityId::new("12")).unwrap().has_name("AA"));
    }

    #[test]
    fn builder_description_names_filters() {
        let builder = KnowledgeBase::builder()
            .entity_filter(Box::new(ExternalLinkFilter));
        assert_eq!(builder.describe(), "entities=links;names=all");
    }
}
