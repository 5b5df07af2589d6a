use std::path::PathBuf;

use clap::{Args, CommandFactory, Parser, Subcommand, ValueEnum};
use clap_complete::Shell;
use elink::{
    Lang,
    candidates::DEFAULT_LIMIT,
    model::EntityType,
    name_index::TieBreak,
    output::DEFAULT_CONFIDENCE,
    text::DEFAULT_NGRAM_SIZE,
};

#[derive(Debug, Parser)]
#[command(
    name = "elink",
    about = "Link named-entity mentions to a knowledge base"
)]
pub struct Cli {
    /// Override the XDG data directory
    #[arg(long, global = true)]
    pub data_dir: Option<PathBuf>,

    /// Increase log verbosity (can be repeated: -v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Only log warnings and errors
    #[arg(short, long, global = true)]
    pub quiet: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Link the mentions of a tagged CoNLL file
    Run(RunArgs),
    /// Look up a name in the knowledge base
    Query(QueryArgs),
    /// Manage the knowledge base cache
    Kb {
        #[command(subcommand)]
        action: KbAction,
    },
    /// Generate shell completions
    #[command(hide = true)]
    Completions(CompletionsArgs),
}

// -- Knowledge base --

#[derive(Debug, Args)]
pub struct KbArgs {
    /// Entities TSV file
    #[arg(long)]
    pub entities: PathBuf,

    /// Alternate names TSV file
    #[arg(long)]
    pub alt_names: PathBuf,

    /// Keep entities whose origin starts with this code (repeatable)
    #[arg(long = "origin")]
    pub origins: Vec<String>,

    /// Keep entities from this country code (repeatable)
    #[arg(long = "country")]
    pub countries: Vec<String>,

    /// Keep entities that have an external link
    #[arg(long)]
    pub require_link: bool,

    /// Keep non-ASCII alternate names only in these scripts
    /// (geez, arabic, sinhala)
    #[arg(long = "script")]
    pub scripts: Vec<String>,

    /// Drop alternate names GeoNames lists only in languages other than
    /// English and this one (needs --geonames-names)
    #[arg(long, value_parser = parse_lang, requires = "geonames_names")]
    pub name_lang: Option<Lang>,

    /// Unzipped GeoNames alternateNamesV2.txt used by --name-lang
    #[arg(long, requires = "name_lang")]
    pub geonames_names: Option<PathBuf>,

    /// Parse the TSV files even if a cached copy exists
    #[arg(long)]
    pub no_cache: bool,
}

#[derive(Debug, Subcommand)]
pub enum KbAction {
    /// Load the knowledge base, refreshing the cache, and print counts
    Load(KbArgs),
    /// Delete the cached knowledge base
    Clear,
}

// -- Stage choices --

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum IndexKind {
    /// Case-insensitive exact names
    Exact,
    /// Character n-gram overlap
    Ngram,
    /// Edit distance of one per token
    Fuzzy,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum CorefKind {
    /// Every mention on its own
    None,
    /// Same type and same text
    Exact,
    /// Exact match, acronyms, then person surnames
    Sieve,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ResolverKind {
    /// Highest scoring candidate
    Best,
    /// Exact name, Wikipedia title, edit distance, then best match
    Cascade,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum TieBreakArg {
    Insertion,
    EntityId,
}

impl From<TieBreakArg> for TieBreak {
    fn from(arg: TieBreakArg) -> Self {
        match arg {
            TieBreakArg::Insertion => TieBreak::InsertionOrder,
            TieBreakArg::EntityId => TieBreak::EntityId,
        }
    }
}

#[derive(Debug, Args)]
pub struct IndexArgs {
    /// Name index used for candidates; repeat to fall back in order
    #[arg(long = "index", value_enum, default_values_t = [IndexKind::Exact])]
    pub indexes: Vec<IndexKind>,

    /// Merge the results of every index instead of falling back
    #[arg(long)]
    pub combine: bool,

    /// N-gram size for the n-gram index
    #[arg(
        long,
        default_value_t = DEFAULT_NGRAM_SIZE,
        value_parser = parse_positive
    )]
    pub ngram_size: usize,

    /// Order of equally ranked candidates
    #[arg(long, value_enum, default_value = "insertion")]
    pub tie_break: TieBreakArg,
}

// -- Run --

#[derive(Debug, Parser)]
pub struct RunArgs {
    /// Tagged CoNLL input file
    pub input: PathBuf,

    /// Write links here instead of stdout
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    #[command(flatten)]
    pub kb: KbArgs,

    #[command(flatten)]
    pub index: IndexArgs,

    /// Maximum candidates per chain
    #[arg(
        long,
        default_value_t = DEFAULT_LIMIT,
        value_parser = parse_positive
    )]
    pub limit: usize,

    /// Ignore mention types when looking up candidates
    #[arg(long)]
    pub untyped: bool,

    /// Normalize mention text before coreference
    #[arg(long)]
    pub normalize: bool,

    /// Force the type of mentions with this text (SURFACE=TYPE, repeatable)
    #[arg(long = "fix-type", value_parser = parse_type_fix)]
    pub type_fixes: Vec<(String, EntityType)>,

    /// Coreference strategy
    #[arg(long, value_enum, default_value = "exact")]
    pub coref: CorefKind,

    /// Resolution strategy
    #[arg(long, value_enum, default_value = "best")]
    pub resolver: ResolverKind,

    /// System label written in the first output column
    #[arg(long, default_value = "elink")]
    pub system: String,

    /// Confidence written in the last output column
    #[arg(long, default_value_t = DEFAULT_CONFIDENCE)]
    pub confidence: f64,

    /// Write a column header before the first line
    #[arg(long)]
    pub header: bool,

    /// Score the run against this ground truth file
    #[arg(long)]
    pub gold: Option<PathBuf>,

    /// Take mentions from the --gold offsets instead of the BIO tags
    #[arg(long, requires = "gold")]
    pub gold_mentions: bool,

    /// Language of every input document (ISO 639 code)
    #[arg(long, value_parser = parse_lang, conflicts_with = "detect_lang")]
    pub lang: Option<Lang>,

    /// Detect the language of each document from its tokens
    #[arg(long)]
    pub detect_lang: bool,

    /// Report time spent in each stage
    #[arg(long)]
    pub profile: bool,

    /// Log progress every N documents
    #[arg(long, default_value_t = 0)]
    pub progress: usize,
}

// -- Query --

#[derive(Debug, Parser)]
pub struct QueryArgs {
    /// Name to look up
    pub name: String,

    #[command(flatten)]
    pub kb: KbArgs,

    #[command(flatten)]
    pub index: IndexArgs,

    /// Restrict results to this entity type (PER, ORG, GPE, LOC)
    #[arg(short = 't', long = "type", value_parser = parse_entity_type)]
    pub entity_type: Option<EntityType>,

    /// Number of results to return
    #[arg(
        short = 'n',
        long,
        default_value = "10",
        value_parser = parse_positive
    )]
    pub count: usize,

    /// Output results as JSON
    #[arg(long)]
    pub json: bool,
}

fn parse_entity_type(label: &str) -> Result<EntityType, String> {
    EntityType::parse(label)
        .ok_or_else(|| format!("unknown entity type '{label}'"))
}

fn parse_lang(code: &str) -> Result<Lang, String> {
    Lang::from_code(code).ok_or_else(|| format!("unknown language '{code}'"))
}

fn parse_positive(value: &str) -> Result<usize, String> {
    match value.parse::<usize>() {
        Ok(0) => Err("must be at least 1".to_string()),
        Ok(n) => Ok(n),
        Err(e) => Err(e.to_string()),
    }
}

fn parse_type_fix(value: &str) -> Result<(String, EntityType), String> {
    let (surface, label) = value
        .rsplit_once('=')
        .ok_or_else(|| format!("expected SURFACE=TYPE, got '{value}'"))?;
    Ok((surface.to_string(), parse_entity_type(label)?))
}

// -- Completions --

#[derive(Debug, Parser)]
pub struct CompletionsArgs {
    /// Shell to generate completions for
    #[arg(value_enum)]
    pub shell: Shell,
}

impl CompletionsArgs {
    /// Generate shell completions and print to stdout.
    pub fn generate(&self) {
        let mut cmd = Cli::command();
        clap_complete::generate(
            self.shell,
            &mut cmd,
            "elink",
            &mut std::io::stdout(),
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const KB: [&str; 4] =
        ["--entities", "entities.tab", "--alt-names", "alternate_names.tab"];

    fn run_args(extra: &[&str]) -> RunArgs {
        let argv = ["elink", "run", "input.conll"]
            .into_iter()
            .chain(KB)
            .chain(extra.iter().copied());
        match Cli::parse_from(argv).command {
            Command::Run(args) => args,
            _ => panic!("expected run command"),
        }
    }

    #[test]
    fn run_defaults() {
        let args = run_args(&[]);
        assert_eq!(args.index.indexes, vec![IndexKind::Exact]);
        assert_eq!(args.limit, 25);
        assert_eq!(args.coref, CorefKind::Exact);
        assert_eq!(args.resolver, ResolverKind::Best);
        assert_eq!(args.system, "elink");
        assert_eq!(args.confidence, 0.1);
        assert_eq!(args.index.tie_break, TieBreakArg::Insertion);
        assert!(args.gold.is_none());
        assert!(!args.kb.no_cache);
    }

    #[test]
    fn repeated_indexes_keep_order() {
        let args = run_args(&["--index", "fuzzy", "--index", "ngram"]);
        assert_eq!(
            args.index.indexes,
            vec![IndexKind::Fuzzy, IndexKind::Ngram]
        );
    }

    #[test]
    fn type_fixes_parse() {
        let args = run_args(&["--fix-type", "Ethiopia=gpe"]);
        assert_eq!(
            args.type_fixes,
            vec![("Ethiopia".to_string(), EntityType::GeoPolitical)]
        );
        let bad = Cli::try_parse_from(
            ["elink", "run", "in"]
                .into_iter()
                .chain(KB)
                .chain(["--fix-type", "Ethiopia"]),
        );
        assert!(bad.is_err());
    }

    #[test]
    fn query_type_filter() {
        let argv = ["elink", "query", "Addis Ababa"]
            .into_iter()
            .chain(KB)
            .chain(["-t", "GPE", "-n", "3"]);
        match Cli::parse_from(argv).command {
            Command::Query(args) => {
                assert_eq!(args.entity_type, Some(EntityType::GeoPolitical));
                assert_eq!(args.count, 3);
            }
            _ => panic!("expected query command"),
        }
    }

    #[test]
    fn zero_sizes_are_rejected() {
        for flag in ["--ngram-size", "--limit"] {
            let argv = ["elink", "run", "in"]
                .into_iter()
                .chain(KB)
                .chain([flag, "0"]);
            assert!(Cli::try_parse_from(argv).is_err(), "{flag} 0 accepted");
        }
        assert_eq!(run_args(&["--ngram-size", "2"]).index.ngram_size, 2);
    }

    #[test]
    fn language_options() {
        let args = run_args(&["--lang", "am"]);
        assert_eq!(args.lang.map(Lang::code), Some("amh"));
        assert!(!args.detect_lang);

        let both = ["--lang", "am", "--detect-lang"];
        let argv = ["elink", "run", "in"].into_iter().chain(KB).chain(both);
        assert!(Cli::try_parse_from(argv).is_err());

        let unknown = ["--lang", "xx"];
        let argv = ["elink", "run", "in"].into_iter().chain(KB).chain(unknown);
        assert!(Cli::try_parse_from(argv).is_err());
    }

    #[test]
    fn gold_mentions_need_gold() {
        let argv = ["elink", "run", "in"]
            .into_iter()
            .chain(KB)
            .chain(["--gold-mentions"]);
        assert!(Cli::try_parse_from(argv).is_err());
        let args = run_args(&["--gold", "gold.tab", "--gold-mentions"]);
        assert!(args.gold_mentions);
    }

    #[test]
    fn name_language_needs_geonames_file() {
        let argv = ["elink", "run", "in"]
            .into_iter()
            .chain(KB)
            .chain(["--name-lang", "ti"]);
        assert!(Cli::try_parse_from(argv).is_err());
        let args = run_args(&[
            "--name-lang",
            "ti",
            "--geonames-names",
            "alternateNamesV2.txt",
        ]);
        assert_eq!(args.kb.name_lang.map(Lang::code), Some("tir"));
    }

    #[test]
    fn tie_break_maps_to_policy() {
        assert_eq!(TieBreak::from(TieBreakArg::EntityId), TieBreak::EntityId);
    }
}
