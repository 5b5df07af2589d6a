//! Document language: ISO 639 codes and detectors.

use std::fmt;

use tracing::debug;

use crate::ids::DocumentId;

/// `(ISO 639-3, ISO 639-1, English name)`, sorted by the 639-3 code.
const LANGUAGES: &[(&str, &str, &str)] = &[
    ("aar", "aa", "Afar"),
    ("abk", "ab", "Abkhaz"),
    ("afr", "af", "Afrikaans"),
    ("aka", "ak", "Akan"),
    ("amh", "am", "Amharic"),
    ("ara", "ar", "Arabic"),
    ("arg", "an", "Aragonese"),
    ("asm", "as", "Assamese"),
    ("ava", "av", "Avaric"),
    ("ave", "ae", "Avestan"),
    ("aym", "ay", "Aymara"),
    ("aze", "az", "Azerbaijani"),
    ("bak", "ba", "Bashkir"),
    ("bam", "bm", "Bambara"),
    ("bel", "be", "Belarusian"),
    ("ben", "bn", "Bengali"),
    ("bih", "bh", "Bihari"),
    ("bis", "bi", "Bislama"),
    ("bod", "bo", "Tibetan"),
    ("bos", "bs", "Bosnian"),
    ("bre", "br", "Breton"),
    ("bul", "bg", "Bulgarian"),
    ("cat", "ca", "Catalan"),
    ("ces", "cs", "Czech"),
    ("cha", "ch", "Chamorro"),
    ("che", "ce", "Chechen"),
    ("chu", "cu", "Old Church Slavonic"),
    ("chv", "cv", "Chuvash"),
    ("cor", "kw", "Cornish"),
    ("cos", "co", "Corsican"),
    ("cre", "cr", "Cree"),
    ("cym", "cy", "Welsh"),
    ("dan", "da", "Danish"),
    ("deu", "de", "German"),
    ("div", "dv", "Maldivian"),
    ("dzo", "dz", "Dzongkha"),
    ("ell", "el", "Greek"),
    ("eng", "en", "English"),
    ("epo", "eo", "Esperanto"),
    ("est", "et", "Estonian"),
    ("eus", "eu", "Basque"),
    ("ewe", "ee", "Ewe"),
    ("fao", "fo", "Faroese"),
    ("fas", "fa", "Persian"),
    ("fij", "fj", "Fijian"),
    ("fin", "fi", "Finnish"),
    ("fra", "fr", "French"),
    ("fry", "fy", "Western Frisian"),
    ("ful", "ff", "Fula"),
    ("gla", "gd", "Scottish Gaelic"),
    ("gle", "ga", "Irish"),
    ("glg", "gl", "Galician"),
    ("glv", "gv", "Manx"),
    ("grn", "gn", "Guaraní"),
    ("guj", "gu", "Gujarati"),
    ("hat", "ht", "Haitian"),
    ("hau", "ha", "Hausa"),
    ("heb", "he", "Hebrew"),
    ("her", "hz", "Herero"),
    ("hin", "hi", "Hindi"),
    ("hmo", "ho", "Hiri Motu"),
    ("hrv", "hr", "Croatian"),
    ("hun", "hu", "Hungarian"),
    ("hye", "hy", "Armenian"),
    ("ibo", "ig", "Igbo"),
    ("ido", "io", "Ido"),
    ("iii", "ii", "Nuosu"),
    ("iku", "iu", "Inuktitut"),
    ("ile", "ie", "Interlingue"),
    ("ina", "ia", "Interlingua"),
    ("ind", "id", "Indonesian"),
    ("ipk", "ik", "Inupiaq"),
    ("isl", "is", "Icelandic"),
    ("ita", "it", "Italian"),
    ("jav", "jv", "Javanese"),
    ("jpn", "ja", "Japanese"),
    ("kal", "kl", "Kalaallisut"),
    ("kan", "kn", "Kannada"),
    ("kas", "ks", "Kashmiri"),
    ("kat", "ka", "Georgian"),
    ("kau", "kr", "Kanuri"),
    ("kaz", "kk", "Kazakh"),
    ("khm", "km", "Khmer"),
    ("kik", "ki", "Kikuyu"),
    ("kin", "rw", "Kinyarwanda"),
    ("kir", "ky", "Kyrgyz"),
    ("kom", "kv", "Komi"),
    ("kon", "kg", "Kongo"),
    ("kor", "ko", "Korean"),
    ("kua", "kj", "Kwanyama"),
    ("kur", "ku", "Kurdish"),
    ("lao", "lo", "Lao"),
    ("lat", "la", "Latin"),
    ("lav", "lv", "Latvian"),
    ("lim", "li", "Limburgish"),
    ("lin", "ln", "Lingala"),
    ("lit", "lt", "Lithuanian"),
    ("ltz", "lb", "Luxembourgish"),
    ("lub", "lu", "Luba-Katanga"),
    ("lug", "lg", "Luganda"),
    ("mah", "mh", "Marshallese"),
    ("mal", "ml", "Malayalam"),
    ("mar", "mr", "Marathi"),
    ("mkd", "mk", "Macedonian"),
    ("mlg", "mg", "Malagasy"),
    ("mlt", "mt", "Maltese"),
    ("mon", "mn", "Mongolian"),
    ("mri", "mi", "Māori"),
    ("msa", "ms", "Malay"),
    ("mya", "my", "Burmese"),
    ("nau", "na", "Nauru"),
    ("nav", "nv", "Navajo"),
    ("nbl", "nr", "South Ndebele"),
    ("nde", "nd", "North Ndebele"),
    ("ndo", "ng", "Ndonga"),
    ("nep", "ne", "Nepali"),
    ("nld", "nl", "Dutch"),
    ("nno", "nn", "Norwegian Nynorsk"),
    ("nob", "nb", "Norwegian Bokmål"),
    ("nor", "no", "Norwegian"),
    ("nya", "ny", "Chichewa"),
    ("oci", "oc", "Occitan"),
    ("oji", "oj", "Ojibwe"),
    ("ori", "or", "Oriya"),
    ("orm", "om", "Oromo"),
    ("oss", "os", "Ossetian"),
    ("pan", "pa", "Panjabi"),
    ("pli", "pi", "Pāli"),
    ("pol", "pl", "Polish"),
    ("por", "pt", "Portuguese"),
    ("pus", "ps", "Pashto"),
    ("que", "qu", "Quechua"),
    ("roh", "rm", "Romansh"),
    ("ron", "ro", "Romanian"),
    ("run", "rn", "Kirundi"),
    ("rus", "ru", "Russian"),
    ("sag", "sg", "Sango"),
    ("san", "sa", "Sanskrit"),
    ("sin", "si", "Sinhala"),
    ("slk", "sk", "Slovak"),
    ("slv", "sl", "Slovene"),
    ("sme", "se", "Northern Sami"),
    ("smo", "sm", "Samoan"),
    ("sna", "sn", "Shona"),
    ("snd", "sd", "Sindhi"),
    ("som", "so", "Somali"),
    ("sot", "st", "Southern Sotho"),
    ("spa", "es", "Spanish"),
    ("sqi", "sq", "Albanian"),
    ("srd", "sc", "Sardinian"),
    ("srp", "sr", "Serbian"),
    ("ssw", "ss", "Swati"),
    ("sun", "su", "Sundanese"),
    ("swa", "sw", "Swahili"),
    ("swe", "sv", "Swedish"),
    ("tah", "ty", "Tahitian"),
    ("tam", "ta", "Tamil"),
    ("tat", "tt", "Tatar"),
    ("tel", "te", "Telugu"),
    ("tgk", "tg", "Tajik"),
    ("tgl", "tl", "Tagalog"),
    ("tha", "th", "Thai"),
    ("tir", "ti", "Tigrinya"),
    ("ton", "to", "Tonga"),
    ("tsn", "tn", "Tswana"),
    ("tso", "ts", "Tsonga"),
    ("tuk", "tk", "Turkmen"),
    ("tur", "tr", "Turkish"),
    ("twi", "tw", "Twi"),
    ("uig", "ug", "Uyghur"),
    ("ukr", "uk", "Ukrainian"),
    ("urd", "ur", "Urdu"),
    ("uzb", "uz", "Uzbek"),
    ("ven", "ve", "Venda"),
    ("vie", "vi", "Vietnamese"),
    ("vol", "vo", "Volapük"),
    ("wln", "wa", "Walloon"),
    ("wol", "wo", "Wolof"),
    ("xho", "xh", "Xhosa"),
    ("yid", "yi", "Yiddish"),
    ("yor", "yo", "Yoruba"),
    ("zha", "za", "Zhuang"),
    ("zho", "zh", "Chinese"),
    ("zul", "zu", "Zulu"),
];

/// Codes detectors report for individual languages of a macrolanguage.
const ALIASES: &[(&str, &str)] =
    &[("cmn", "zho"), ("pes", "fas"), ("zh-cn", "zho"), ("zh-tw", "zho")];

/// A language, identified by its ISO 639-3 code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Lang(&'static str);

impl Lang {
    pub const ENGLISH: Lang = Lang("eng");

    /// Look up a two- or three-letter code, case-insensitively.
    pub fn from_code(code: &str) -> Option<Self> {
        let code = code.trim().to_ascii_lowercase();
        let code = ALIASES
            .iter()
            .find(|(alias, _)| *alias == code)
            .map_or(code.as_str(), |(_, target)| *target);
        LANGUAGES
            .iter()
            .find(|(three, two, _)| *three == code || *two == code)
            .map(|(three, _, _)| Lang(*three))
    }

    /// The ISO 639-3 code.
    pub fn code(self) -> &'static str {
        self.0
    }

    /// The ISO 639-1 code.
    pub fn two_letter(self) -> &'static str {
        self.entry().1
    }

    pub fn name(self) -> &'static str {
        self.entry().2
    }

    fn entry(self) -> &'static (&'static str, &'static str, &'static str) {
        let pos = LANGUAGES
            .binary_search_by(|entry| entry.0.cmp(self.0))
            .unwrap_or_default();
        &LANGUAGES[pos]
    }
}

impl fmt::Display for Lang {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.0)
    }
}

/// Guesses the language of a document from its id and tokens.
pub trait LanguageDetector: Send {
    fn detect(&self, doc_id: &DocumentId, tokens: &[String]) -> Option<Lang>;
}

/// Every document is in the same, known language.
#[derive(Debug, Clone, Copy)]
pub struct FixedLang(pub Lang);

impl LanguageDetector for FixedLang {
    fn detect(&self, _doc_id: &DocumentId, _tokens: &[String]) -> Option<Lang> {
        Some(self.0)
    }
}

/// Character trigram profiles, through `whatlang`.
///
/// Languages the detector knows but [`Lang`] does not are reported as
/// unknown.
#[derive(Debug, Default, Clone, Copy)]
pub struct NgramLangDetector;

impl LanguageDetector for NgramLangDetector {
    fn detect(&self, doc_id: &DocumentId, tokens: &[String]) -> Option<Lang> {
        if tokens.is_empty() {
            return None;
        }
        let info = whatlang::detect(&tokens.join(" "))?;
        debug!(
            document = %doc_id,
            detected = info.lang().code(),
            confidence = info.confidence(),
            "detected language"
        );
        Lang::from_code(info.lang().code())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tokens(text: &str) -> Vec<String> {
        text.split_whitespace().map(str::to_string).collect()
    }

    #[test]
    fn codes_of_either_length_resolve() {
        let amharic = Lang::from_code("am").unwrap();
        assert_eq!(amharic, Lang::from_code("AMH").unwrap());
        assert_eq!(amharic.code(), "amh");
        assert_eq!(amharic.two_letter(), "am");
        assert_eq!(amharic.name(), "Amharic");
        assert_eq!(Lang::from_code("en"), Some(Lang::ENGLISH));
    }

    #[test]
    fn macrolanguage_members_map_to_the_macrolanguage() {
        assert_eq!(Lang::from_code("cmn").map(Lang::code), Some("zho"));
        assert_eq!(Lang::from_code("zh-tw").map(Lang::code), Some("zho"));
    }

    #[test]
    fn unknown_codes_are_rejected() {
        assert_eq!(Lang::from_code("xx"), None);
        assert_eq!(Lang::from_code("klingon"), None);
        assert_eq!(Lang::from_code(""), None);
    }

    #[test]
    fn table_is_sorted_for_lookup() {
        assert!(LANGUAGES.windows(2).all(|w| w[0].0 < w[1].0));
    }

    #[test]
    fn fixed_language_ignores_the_text() {
        let swahili = Lang::from_code("sw").unwrap();
        let found = FixedLang(swahili).detect(&DocumentId::new("d"), &[]);
        assert_eq!(found, Some(swahili));
    }

    #[test]
    fn ngram_detector_reads_the_tokens() {
        let text = tokens(
            "The president of the African Union arrived in the capital on \
             Monday morning and met with the prime minister for talks about \
             the drought that has affected the region since last summer",
        );
        let found = NgramLangDetector.detect(&DocumentId::new("d"), &text);
        assert_eq!(found, Some(Lang::ENGLISH));
        assert_eq!(NgramLangDetector.detect(&DocumentId::new("d"), &[]), None);
    }
}
