use colored::Colorize;
use ps1_memcard::{Allocation, BlockType, CardFormat, MemoryCard, SaveFormat};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

pub const CONFIG_FILE_NAME: &str = "ps1vmc.toml";

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Config {
    /// Wrapper used when writing the card back; `None` keeps the loaded one.
    pub format: Option<CardFormat>,
    pub fix_data: bool,
    pub output_dir: Option<PathBuf>,
    /// GME comments keyed by slot, applied before every write.
    pub comments: BTreeMap<usize, String>,
}

#[derive(Debug, Default, Deserialize, Serialize)]
struct ConfigFile {
    #[serde(default)]
    card: CardSection,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    export: Option<ExportSection>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    comments: BTreeMap<String, String>,
}

#[derive(Debug, Default, Deserialize, Serialize)]
struct CardSection {
    #[serde(skip_serializing_if = "Option::is_none")]
    format: Option<String>,
    #[serde(default)]
    fix_data: bool,
}

#[derive(Debug, Deserialize, Serialize)]
struct ExportSection {
    output_dir: PathBuf,
}

impl TryFrom<ConfigFile> for Config {
    type Error = Error;

    fn try_from(file: ConfigFile) -> Result<Self, Error> {
        let ConfigFile {
            card,
            export,
            comments,
        } = file;

        let format = card
            .format
            .map(|name| name.parse::<CardFormat>())
            .transpose()
            .map_err(|err| Error::ConfigError(err.to_string()))?;

        let comments = comments
            .into_iter()
            .map(|(slot, text)| match slot.parse::<usize>() {
                Ok(index) if index < ps1_memcard::layout::SLOT_COUNT => Ok((index, text)),
                _ => Err(Error::ConfigError(format!("invalid comment slot `{slot}`"))),
            })
            .collect::<Result<_, _>>()?;

        Ok(Self {
            format,
            fix_data: card.fix_data,
            output_dir: export.map(|export| export.output_dir),
            comments,
        })
    }
}

impl Config {
    pub fn to_toml_string(&self) -> Result<String, toml::ser::Error> {
        let config_file = ConfigFile {
            card: CardSection {
                format: self.format.map(|format| format.extension().to_string()),
                fix_data: self.fix_data,
            },
            export: self.output_dir.clone().map(|output_dir| ExportSection { output_dir }),
            comments: self
                .comments
                .iter()
                .map(|(slot, text)| (slot.to_string(), text.clone()))
                .collect(),
        };

        toml::to_string_pretty(&config_file)
    }
}

pub fn load_config(path: &Path) -> Result<Config, Error> {
    let str = std::fs::read_to_string(path)?;
    let config_file =
        toml::from_str::<ConfigFile>(&str).map_err(|e| Error::ConfigError(e.to_string()))?;
    config_file.try_into()
}

/// Loads `explicit` if given, otherwise `ps1vmc.toml` beside the card when present.
pub fn resolve_config(card_path: &Path, explicit: Option<&Path>) -> Result<Config, Error> {
    if let Some(path) = explicit {
        return load_config(path);
    }
    let folder = card_path.parent().unwrap_or_else(|| Path::new("."));
    let candidate = folder.join(CONFIG_FILE_NAME);
    if candidate.is_file() {
        log::debug!("using config {}", candidate.display());
        load_config(&candidate)
    } else {
        Ok(Config::default())
    }
}

/// A card loaded from disk together with the settings used to write it back.
pub struct Session {
    pub card: MemoryCard,
    path: PathBuf,
    config: Config,
}

impl Session {
    pub fn open(path: &Path, config: Config) -> Result<Self, Error> {
        let card = MemoryCard::open_path(path, config.fix_data)?;
        Ok(Self {
            card,
            path: path.to_path_buf(),
            config,
        })
    }

    /// Starts from a freshly formatted card that does not exist on disk yet.
    pub fn create(path: &Path, config: Config) -> Self {
        Self {
            card: MemoryCard::new(),
            path: path.to_path_buf(),
            config,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn target_format(&self) -> CardFormat {
        self.config.format.unwrap_or(self.card.format())
    }

    /// Writes the card back to its own path.
    pub fn commit(&mut self) -> Result<(), Error> {
        let path = self.path.clone();
        let format = self.target_format();
        self.write_image(&path, format)
    }

    pub fn write_image(&mut self, path: &Path, format: CardFormat) -> Result<(), Error> {
        for (slot, text) in &self.config.comments {
            self.card.set_comment(*slot, text.as_bytes())?;
        }
        self.card.save_path(path, format, self.config.fix_data)?;
        println!(
            "{} {} ({format})",
            "Wrote".green(),
            path.display().to_string().bold()
        );
        Ok(())
    }

    pub fn print_info(&self) {
        let stats = self.card.stats();
        println!("{} {}", "Card".bold(), self.path.display());
        println!("  format     {}", self.card.format());
        println!("  used       {}", stats.used);
        println!("  free       {}", stats.free.to_string().green());
        if stats.corrupted > 0 {
            println!("  corrupted  {}", stats.corrupted.to_string().red());
        }
    }

    pub fn print_free(&self) {
        println!("{}", self.card.stats().free);
    }

    pub fn print_list(&self) {
        for slot in self.card.slots() {
            let kind = match slot.block_type {
                BlockType::Formatted => slot.block_type.to_string().dimmed(),
                BlockType::Corrupted => slot.block_type.to_string().red(),
                kind if kind.is_deleted() => kind.to_string().yellow(),
                kind => kind.to_string().normal(),
            };
            let details = self.slot_details(slot.index).unwrap_or_default();
            println!("{:2} {:<18}{details}", slot.index, kind);
        }
    }

    /// Listing columns after the block type: size, product code and region
    /// for used blocks, plus name, length, title and comment for save starts.
    pub fn slot_details(&self, index: usize) -> Result<String, Error> {
        let slot = self.card.slot(index)?;
        if matches!(slot.block_type, BlockType::Formatted | BlockType::Corrupted) {
            return Ok(String::new());
        }

        let mut line = format!(
            " {:>6}  {:<10} {:<2}",
            slot.size,
            slot.product_code,
            slot.region_code()
        );
        if slot.block_type.is_save_start() {
            let blocks = match self.card.find_save_links(index) {
                Ok(chain) => chain.len(),
                Err(_) => 0,
            };
            line.push_str(&format!(
                "  {:<20} {:>2} blk  {}",
                slot.name,
                blocks,
                slot.title_lossy()
            ));
            let comment = self.card.comment(index)?;
            if !comment.is_empty() {
                line.push_str(&format!("  # {}", String::from_utf8_lossy(comment)));
            }
        }
        Ok(line)
    }

    pub fn format_card(&mut self) {
        self.card.format_card();
        println!("{}", "Formatted all slots".green());
    }

    /// Frees the save starting at `slot`.
    pub fn remove(&mut self, slot: usize) -> Result<(), Error> {
        self.require_save_start(slot, false)?;
        let chain = self.card.format_save(slot)?;
        println!("{} slots {:?}", "Removed".green(), chain.slots);
        Ok(())
    }

    /// Deletes or restores the save starting at `slot`.
    pub fn toggle(&mut self, slot: usize) -> Result<BlockType, Error> {
        self.require_save_start(slot, true)?;
        self.card.toggle_delete_save(slot)?;
        let now = self.card.slot(slot)?.block_type;
        let verb = if now.is_deleted() { "Deleted" } else { "Restored" };
        println!("{} slot {slot}", verb.green());
        Ok(now)
    }

    pub fn inject(&mut self, save: &Path) -> Result<Allocation, Error> {
        let allocation = self.card.open_single_save(save)?;
        println!(
            "{} {} into slots {:?}",
            "Imported".green(),
            save.display(),
            allocation.slots
        );
        Ok(allocation)
    }

    /// Exports a single save; the destination defaults to the save name in the
    /// configured output directory.
    pub fn export(
        &self,
        slot: usize,
        format: SaveFormat,
        output: Option<&Path>,
    ) -> Result<PathBuf, Error> {
        self.require_save_start(slot, false)?;
        let output = match output {
            Some(output) => output.to_path_buf(),
            None => {
                let info = self.card.slot(slot)?;
                let file_name = match format {
                    SaveFormat::Psv => info.psv_file_name(),
                    _ => format!("{}.{}", sanitize_file_name(&info.name), format.extension()),
                };
                let folder = self
                    .config
                    .output_dir
                    .clone()
                    .unwrap_or_else(|| PathBuf::from("."));
                std::fs::create_dir_all(&folder)?;
                folder.join(file_name)
            }
        };
        self.card.save_single_save(&output, slot, format)?;
        println!("{} {}", "Exported".green(), output.display());
        Ok(output)
    }

    pub fn set_comment(&mut self, slot: usize, text: &str) -> Result<(), Error> {
        self.card.set_comment(slot, text.as_bytes())?;
        self.config.comments.insert(slot, text.to_string());
        if self.target_format() != CardFormat::Gme {
            eprintln!("{}", "Comments are only stored in GME cards".yellow());
        }
        Ok(())
    }

    fn require_save_start(&self, slot: usize, allow_deleted: bool) -> Result<(), Error> {
        let kind = self.card.slot(slot)?.block_type;
        let ok = kind == BlockType::Initial || (allow_deleted && kind.is_save_start());
        if ok {
            Ok(())
        } else {
            Err(Error::NotASave(slot))
        }
    }
}

fn sanitize_file_name(name: &str) -> String {
    let cleaned: String = name
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.') {
                c
            } else {
                '_'
            }
        })
        .collect();
    if cleaned.is_empty() {
        "save".to_string()
    } else {
        cleaned
    }
}

#[derive(Debug)]
pub enum Error {
    Card(ps1_memcard::Error),
    IOError(std::io::Error),
    ConfigError(String),
    NotASave(usize),
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self {
            Error::Card(err) => write!(f, "{err}"),
            Error::IOError(err) => write!(f, "{err:?}"),
            Error::ConfigError(err) => write!(f, "{err}"),
            Error::NotASave(slot) => write!(f, "Slot {slot} does not start a save"),
        }
    }
}

impl std::error::Error for Error {}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Error::IOError(err)
    }
}

impl From<ps1_memcard::Error> for Error {
    fn from(err: ps1_memcard::Error) -> Self {
        Error::Card(err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_parses_all_sections() {
        let config_file: ConfigFile = toml::from_str(
            r#"
            [card]
            format = "gme"
            fix_data = true

            [export]
            output_dir = "saves"

            [comments]
            0 = "first"
            14 = "last"
            "#,
        )
        .expect("parse config");
        let config = Config::try_from(config_file).expect("valid config");
        assert_eq!(config.format, Some(CardFormat::Gme));
        assert!(config.fix_data);
        assert_eq!(config.output_dir, Some(PathBuf::from("saves")));
        assert_eq!(config.comments.get(&14).map(String::as_str), Some("last"));
    }

    #[test]
    fn empty_config_is_default() {
        let config_file: ConfigFile = toml::from_str("").expect("parse empty");
        assert_eq!(Config::try_from(config_file).expect("valid"), Config::default());
    }

    #[test]
    fn bad_values_are_config_errors() {
        for text in ["[card]\nformat = \"mcx\"", "[comments]\n15 = \"x\"", "[comments]\nabc = \"x\""] {
            let config_file: ConfigFile = toml::from_str(text).expect("parse");
            assert!(
                matches!(Config::try_from(config_file), Err(Error::ConfigError(_))),
                "{text}"
            );
        }
    }

    #[test]
    fn toml_roundtrip() {
        let mut config = Config {
            format: Some(CardFormat::Vgs),
            fix_data: true,
            output_dir: Some(PathBuf::from("out")),
            comments: BTreeMap::new(),
        };
        config.comments.insert(3, "boss".to_string());

        let text = config.to_toml_string().expect("serialize");
        let parsed: ConfigFile = toml::from_str(&text).expect("reparse");
        assert_eq!(Config::try_from(parsed).expect("valid"), config);
    }

    #[test]
    fn file_names_are_sanitized() {
        assert_eq!(sanitize_file_name("BASLUS-00001 SAVE/1"), "BASLUS-00001_SAVE_1");
        assert_eq!(sanitize_file_name(""), "save");
    }
}
