use std::{
    fs::File,
    io::{BufWriter, Write},
    sync::Arc,
};

use clap::Parser;
use elink::{
    DataDir,
    Error,
    KnowledgeBase,
    Pipeline,
    Result,
    candidates::{
        CachingSource,
        CandidateSource,
        CascadeSource,
        ChainGenerator,
        CombiningSource,
        IndexSource,
    },
    coref::{ExactMatchCoref, SieveCoref, UnchainedCoref},
    fuzzy_index::FuzzyNameIndex,
    input::ConllReader,
    kb::{
        CascadeEntityFilter,
        CascadeNameFilter,
        CountryFilter,
        EntityFilter,
        ExternalLinkFilter,
        KbBuilder,
        LanguageNameFilter,
        NameFilter,
        OriginFilter,
        Script,
        ScriptNameFilter,
    },
    kb_cache::KbCache,
    kb_source,
    lang::{FixedLang, NgramLangDetector},
    model::EntityType,
    name_index::{ExactMatchIndex, NameIndex, TieBreak},
    ngram_index::NgramIndex,
    output::{GroundTruth, TabWriter},
    pipeline::RunStatus,
    preprocess::{
        CascadePreprocessor,
        PassThrough,
        TextNormalizer,
        TypeOverride,
    },
    resolve::{
        BestMatchResolver,
        CascadeResolver,
        ChainResolver,
        EditDistanceResolver,
        ExactNameResolver,
        WikipediaResolver,
    },
    stage::{CoReferencer, Preprocessor, Resolver},
};
use tracing::info;
use tracing_subscriber::EnvFilter;

mod cli;

use cli::{
    Cli,
    Command,
    CorefKind,
    IndexArgs,
    IndexKind,
    KbAction,
    KbArgs,
    QueryArgs,
    ResolverKind,
    RunArgs,
};

fn init_tracing(verbose: u8, quiet: bool) {
    let filter = if let Ok(env) = std::env::var("ELINK_LOG") {
        EnvFilter::new(env)
    } else if quiet {
        EnvFilter::new("warn")
    } else {
        match verbose {
            0 => EnvFilter::new("info"),
            1 => EnvFilter::new("debug"),
            _ => EnvFilter::new("trace"),
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .without_time()
        .init();
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose, cli.quiet);

    match cli.command {
        Command::Run(args) => {
            let data_dir = DataDir::resolve(cli.data_dir.as_deref())?;
            cmd_run(&data_dir, &args)?;
        }
        Command::Query(args) => {
            let data_dir = DataDir::resolve(cli.data_dir.as_deref())?;
            cmd_query(&data_dir, &args)?;
        }
        Command::Kb { action } => {
            let data_dir = DataDir::resolve(cli.data_dir.as_deref())?;
            match action {
                KbAction::Load(args) => cmd_kb_load(&data_dir, &args)?,
                KbAction::Clear if !data_dir.has_kb_cache() => {
                    println!("No cache at {}", data_dir.kb_cache().display());
                }
                KbAction::Clear => {
                    KbCache::open(&data_dir.kb_cache())?.clear()?;
                    println!("Cleared {}", data_dir.kb_cache().display());
                }
            }
        }
        Command::Completions(args) => args.generate(),
    }

    Ok(())
}

fn kb_builder(args: &KbArgs) -> Result<KbBuilder> {
    let mut filters: Vec<Box<dyn EntityFilter>> = Vec::new();
    if !args.origins.is_empty() {
        filters.push(Box::new(OriginFilter::new(&args.origins)));
    }
    if !args.countries.is_empty() {
        filters.push(Box::new(CountryFilter::new(&args.countries)));
    }
    if args.require_link {
        filters.push(Box::new(ExternalLinkFilter));
    }

    let mut builder = KbBuilder::new();
    if !filters.is_empty() {
        builder = builder
            .entity_filter(Box::new(CascadeEntityFilter::new(filters)));
    }

    // Language first: names GeoNames does not know fall through to the
    // script check.
    let mut name_filters: Vec<Box<dyn NameFilter>> = Vec::new();
    if let (Some(lang), Some(path)) = (args.name_lang, &args.geonames_names) {
        let filter = LanguageNameFilter::open(path, lang)?;
        info!(names = filter.len(), %lang, "loaded GeoNames name languages");
        name_filters.push(Box::new(filter));
    }
    if !args.scripts.is_empty() {
        let scripts = args
            .scripts
            .iter()
            .map(|s| {
                Script::parse(s).ok_or_else(|| {
                    Error::Config(format!("unknown script '{s}'"))
                })
            })
            .collect::<Result<Vec<_>>>()?;
        name_filters.push(Box::new(ScriptNameFilter::new(scripts)));
    }
    match name_filters.len() {
        0 => {}
        1 => builder = builder.name_filter(name_filters.remove(0)),
        _ => {
            builder = builder
                .name_filter(Box::new(CascadeNameFilter::new(name_filters)));
        }
    }
    Ok(builder)
}

/// Load the KB, going through the cache unless `--no-cache` is given.
///
/// Returns whether the cache was used.
fn load_kb(
    data_dir: &DataDir,
    args: &KbArgs,
) -> Result<(KnowledgeBase, bool)> {
    let builder = kb_builder(args)?;
    let parse =
        || kb_source::load_kb(&builder, &args.entities, &args.alt_names);
    if args.no_cache {
        return Ok((parse()?, false));
    }

    let fingerprint =
        kb_source::fingerprint(&builder, &args.entities, &args.alt_names)?;
    let cache = KbCache::open(&data_dir.kb_cache())?;
    if let Some(entities) = cache.load(&fingerprint)? {
        return Ok((KnowledgeBase::from_entities(entities)?, true));
    }

    let kb = parse()?;
    cache.store(&fingerprint, kb.entities())?;
    Ok((kb, false))
}

fn build_index(
    kind: IndexKind,
    kb: &Arc<KnowledgeBase>,
    args: &IndexArgs,
) -> Result<Arc<dyn NameIndex>> {
    let tie_break = TieBreak::from(args.tie_break);
    let index: Arc<dyn NameIndex> = match kind {
        IndexKind::Exact => {
            Arc::new(ExactMatchIndex::with_tie_break(kb.clone(), tie_break))
        }
        IndexKind::Ngram => Arc::new(NgramIndex::build(
            kb.clone(),
            args.ngram_size,
            tie_break,
        )?),
        IndexKind::Fuzzy => {
            Arc::new(FuzzyNameIndex::with_tie_break(kb.clone(), tie_break)?)
        }
    };
    Ok(index)
}

fn candidate_source(
    kb: &Arc<KnowledgeBase>,
    args: &IndexArgs,
    typed: bool,
) -> Result<Box<dyn CandidateSource>> {
    let mut sources: Vec<Box<dyn CandidateSource>> = Vec::new();
    for &kind in &args.indexes {
        let index = build_index(kind, kb, args)?;
        sources.push(if typed {
            Box::new(IndexSource::new(index))
        } else {
            Box::new(IndexSource::untyped(index))
        });
    }
    let source: Box<dyn CandidateSource> = match sources.len() {
        1 => sources.remove(0),
        _ if args.combine => Box::new(CombiningSource::new(sources)),
        _ => Box::new(CascadeSource::new(sources)),
    };
    Ok(Box::new(CachingSource::new(source)))
}

fn preprocessor(args: &RunArgs) -> Box<dyn Preprocessor> {
    let mut stages: Vec<Box<dyn Preprocessor>> = Vec::new();
    if args.normalize {
        stages.push(Box::new(TextNormalizer));
    }
    if !args.type_fixes.is_empty() {
        let fixes = args
            .type_fixes
            .iter()
            .fold(TypeOverride::new(), |fixes, (surface, entity_type)| {
                fixes.with(surface, *entity_type)
            });
        stages.push(Box::new(fixes));
    }
    match stages.len() {
        0 => Box::new(PassThrough),
        _ => Box::new(CascadePreprocessor::new(stages)),
    }
}

fn coreferencer(kind: CorefKind) -> Box<dyn CoReferencer> {
    match kind {
        CorefKind::None => Box::new(UnchainedCoref),
        CorefKind::Exact => Box::new(ExactMatchCoref),
        CorefKind::Sieve => Box::new(SieveCoref::default()),
    }
}

fn resolver(
    kind: ResolverKind,
    kb: &Arc<KnowledgeBase>,
) -> Box<dyn Resolver> {
    match kind {
        ResolverKind::Best => Box::new(BestMatchResolver),
        ResolverKind::Cascade => {
            let resolvers: Vec<Box<dyn ChainResolver>> = vec![
                Box::new(ExactNameResolver::new(kb.clone())),
                Box::new(WikipediaResolver::new(kb.clone())),
                Box::new(EditDistanceResolver::new(kb.clone())),
                Box::new(BestMatchResolver),
            ];
            Box::new(CascadeResolver::new(resolvers))
        }
    }
}

fn cmd_run(data_dir: &DataDir, args: &RunArgs) -> Result<()> {
    let (kb, cached) = load_kb(data_dir, &args.kb)?;
    info!(entities = kb.len(), cached, "loaded knowledge base");
    let kb = Arc::new(kb);

    let source = candidate_source(&kb, &args.index, !args.untyped)?;
    let mut builder = Pipeline::builder()
        .preprocessor(preprocessor(args))
        .coref(coreferencer(args.coref))
        .candidates(Box::new(ChainGenerator::new(source, args.limit)))
        .resolver(resolver(args.resolver, &kb))
        .profile(args.profile)
        .progress_every(args.progress);
    let gold = match &args.gold {
        Some(path) => Some(Arc::new(GroundTruth::read(path)?)),
        None => None,
    };
    if let Some(gold) = &gold {
        builder = builder.gold(gold.clone());
    }
    let mut pipeline = builder.build()?;

    let out: Box<dyn Write> = match &args.output {
        Some(path) => Box::new(BufWriter::new(File::create(path)?)),
        None => Box::new(BufWriter::new(std::io::stdout().lock())),
    };
    let mut writer =
        TabWriter::new(out, &args.system).with_confidence(args.confidence);
    if args.header {
        writer = writer.with_header();
    }

    let mut documents = ConllReader::open(&args.input)?;
    if let Some(lang) = args.lang {
        documents = documents.with_lang_detector(Box::new(FixedLang(lang)));
    } else if args.detect_lang {
        documents = documents.with_lang_detector(Box::new(NgramLangDetector));
    }
    if args.gold_mentions
        && let Some(gold) = gold
    {
        documents = documents.with_gold_mentions(gold);
    }
    let report = pipeline.run(documents, &mut writer)?;
    eprint!("{report}");
    if report.status() == RunStatus::CompletedWithErrors {
        eprintln!("Completed with {} failed documents", report.failed);
    }
    Ok(())
}

fn cmd_query(data_dir: &DataDir, args: &QueryArgs) -> Result<()> {
    let (kb, _) = load_kb(data_dir, &args.kb)?;
    let kb = Arc::new(kb);
    let typed = args.entity_type.is_some();
    let mut source = candidate_source(&kb, &args.index, typed)?;

    // Without a type the source is untyped and ignores this one.
    let entity_type = args.entity_type.unwrap_or(EntityType::Person);
    let candidates = source.find(&args.name, entity_type, args.count)?;

    if args.json {
        let rows: Vec<serde_json::Value> = candidates
            .iter()
            .enumerate()
            .filter_map(|(i, c)| {
                let entity = kb.get(&c.entity_id)?;
                Some(serde_json::json!({
                    "rank": i + 1,
                    "id": entity.id.as_str(),
                    "type": entity.entity_type,
                    "name": entity.name,
                    "score": c.score,
                }))
            })
            .collect();
        println!("{}", serde_json::to_string_pretty(&rows)?);
    } else if candidates.is_empty() {
        println!("No matches.");
    } else {
        for (i, c) in candidates.iter().enumerate() {
            let entity = kb.lookup(&c.entity_id)?;
            let score = c
                .score
                .map(|s| format!("{s:.3}"))
                .unwrap_or_else(|| "-".to_string());
            println!(
                "{:>3}. {}\t{}\t{}\t{score}",
                i + 1,
                entity.id,
                entity.entity_type,
                entity.name
            );
        }
    }
    Ok(())
}

fn cmd_kb_load(data_dir: &DataDir, args: &KbArgs) -> Result<()> {
    let (kb, cached) = load_kb(data_dir, args)?;
    let names: usize = kb.all_entities().map(|e| e.names.len()).sum();
    println!(
        "{} entities, {} names ({})",
        kb.len(),
        names,
        if cached { "from cache" } else { "parsed" }
    );
    Ok(())
}
