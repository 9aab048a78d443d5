use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use log::debug;
use regex::Regex;

use crate::command::{Command, CommandGetter};
use crate::error::Error;

/// Placeholder replaced by the collision counter in [`RegexReplaceFormatter`] templates.
pub const COUNT_PLACEHOLDER: &str = "{count}";

static NON_ALPHANUMERIC: LazyLock<Regex> =
    LazyLock::new(|| Regex::new("[^0-9a-zA-Z]+").expect("static regex is valid"));

/// Computes a new file name for a file.
pub trait FileNameFormatter {
    /// Returns the new file name (not a path) for `file`, or `None` when the
    /// rule leaves the name as it is.
    fn format(&self, file: &Path) -> Option<String>;
}

impl<F: Fn(&Path) -> Option<String>> FileNameFormatter for F {
    fn format(&self, file: &Path) -> Option<String> {
        self(file)
    }
}

/// Lower-cased, trimmed extension including its leading dot, or empty.
fn normalized_suffix(file: &Path) -> String {
    file.extension()
        .map(|ext| format!(".{}", ext.to_string_lossy().trim().to_lowercase()))
        .unwrap_or_default()
}

fn file_name(file: &Path) -> String {
    file.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default()
}

/// Title Case for the stem, lower case for the extension, every run of
/// special characters collapsed to one space.
///
/// `"my_song--(final)!!.WAV"` becomes `"My Song Final.wav"`.
#[derive(Debug, Default, Clone, Copy)]
pub struct TitleCaseSanitizer;

impl TitleCaseSanitizer {
    /// `None` when nothing is left of the stem once special characters are gone.
    pub fn sanitize(file: &Path) -> Option<String> {
        let stem = file
            .file_stem()
            .map(|stem| stem.to_string_lossy().into_owned())
            .unwrap_or_default();
        let stem = title_case(NON_ALPHANUMERIC.replace_all(&stem, " ").trim());
        if stem.is_empty() {
            return None;
        }
        Some(stem + &normalized_suffix(file))
    }
}

impl FileNameFormatter for TitleCaseSanitizer {
    fn format(&self, file: &Path) -> Option<String> {
        Self::sanitize(file)
    }
}

/// Upper-cases letters that follow a non-letter, lower-cases the others.
fn title_case(text: &str) -> String {
    let mut previous_is_letter = false;
    text.chars()
        .map(|c| {
            let mapped = if previous_is_letter {
                c.to_ascii_lowercase()
            } else {
                c.to_ascii_uppercase()
            };
            previous_is_letter = c.is_ascii_alphabetic();
            mapped
        })
        .collect()
}

/// Renames files matching one of an ordered list of patterns.
///
/// The first pattern matching the file name wins; every match of it is
/// replaced like [`Regex::replace_all`] (so `$1` and `${name}` work) and then every
/// `{count}` is replaced by a counter starting at 1, bumped until the name
/// does not collide with an existing file.
#[derive(Debug, Clone)]
pub struct RegexReplaceFormatter {
    patterns: Vec<(Regex, String)>,
}

impl RegexReplaceFormatter {
    pub fn new(patterns: Vec<(Regex, String)>) -> Self {
        RegexReplaceFormatter { patterns }
    }

    /// Builds the formatter from `PATTERN=TEMPLATE` specifications, keeping their order.
    pub fn parse<S: AsRef<str>>(specs: &[S]) -> Result<Self, Error> {
        let patterns = specs
            .iter()
            .map(|spec| {
                let spec = spec.as_ref();
                let (pattern, template) = spec.split_once('=').ok_or_else(|| {
                    Error::InvalidOptions(format!(
                        "Expected PATTERN=TEMPLATE, got {:?}",
                        spec
                    ))
                })?;
                let regex = Regex::new(pattern).map_err(|e| {
                    Error::InvalidOptions(format!("Invalid pattern {:?}: {}", pattern, e))
                })?;
                Ok((regex, template.to_string()))
            })
            .collect::<Result<Vec<_>, Error>>()?;
        Ok(Self::new(patterns))
    }
}

impl FileNameFormatter for RegexReplaceFormatter {
    fn format(&self, file: &Path) -> Option<String> {
        let name = file_name(file);
        let template = self
            .patterns
            .iter()
            .find(|(pattern, _)| pattern.is_match(&name))
            .map(|(pattern, template)| {
                pattern.replace_all(&name, template.as_str()).into_owned()
            })?;

        let suffix = normalized_suffix(file);
        let build = |count: u32| {
            let stem = template.replace(COUNT_PLACEHOLDER, &count.to_string());
            if stem.ends_with(&suffix) {
                stem
            } else {
                stem + &suffix
            }
        };

        if !template.contains(COUNT_PLACEHOLDER) {
            return Some(build(1));
        }
        let mut count = 1;
        let mut candidate = build(count);
        while candidate != name && file.with_file_name(&candidate).exists() {
            count += 1;
            candidate = build(count);
        }
        Some(candidate)
    }
}

/// Renames `file` to `file_new`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenameFile {
    pub file: PathBuf,
    pub file_new: PathBuf,
}

impl Command for RenameFile {
    fn description(&self) -> String {
        format!(
            "Rename '{}' -> '{}'",
            self.file.display(),
            file_name(&self.file_new)
        )
    }

    fn execute(&self) -> Result<(), Error> {
        let io_error = |source: io::Error| Error::Io {
            path: self.file.clone(),
            source,
        };
        let source_exists = self.file.try_exists().map_err(io_error)?;
        let destination_exists = self.file_new.try_exists().map_err(io_error)?;
        if !source_exists && destination_exists {
            debug!("{:?} was already renamed", self.file_new);
            return Ok(());
        }
        if destination_exists {
            if !is_same_file(&self.file, &self.file_new).map_err(io_error)? {
                return Err(io_error(already_exists(&self.file_new)));
            }
            return fs::rename(&self.file, &self.file_new).map_err(io_error);
        }
        rename_no_replace(&self.file, &self.file_new).map_err(io_error)
    }
}

fn already_exists(path: &Path) -> io::Error {
    io::Error::new(
        io::ErrorKind::AlreadyExists,
        format!("destination {} already exists", path.display()),
    )
}

/// Moves `from` to `to`, failing if `to` appears in the meantime.
///
/// Creating the hard link fails when `to` exists. Filesystems without hard
/// links (FAT, exFAT) fall back to a plain rename.
fn rename_no_replace(from: &Path, to: &Path) -> io::Result<()> {
    match fs::hard_link(from, to) {
        Ok(()) => fs::remove_file(from),
        Err(e) if e.kind() == io::ErrorKind::AlreadyExists => Err(already_exists(to)),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Err(e),
        Err(e) => {
            debug!("Cannot hard link {:?} ({}), renaming instead", to, e);
            fs::rename(from, to)
        }
    }
}

/// Case-only renames on case-insensitive filesystems see the destination as existing.
fn is_same_file(a: &Path, b: &Path) -> io::Result<bool> {
    #[cfg(unix)]
    {
        use std::os::unix::fs::MetadataExt;
        let (a, b) = (fs::metadata(a)?, fs::metadata(b)?);
        Ok(a.dev() == b.dev() && a.ino() == b.ino())
    }
    #[cfg(not(unix))]
    {
        Ok(a.to_string_lossy()
            .eq_ignore_ascii_case(&b.to_string_lossy()))
    }
}

/// Applies a chain of [`FileNameFormatter`]s, each one seeing the name
/// produced by the previous one.
pub struct RenameFileCommandGetter {
    chain: Vec<Box<dyn FileNameFormatter>>,
}

impl RenameFileCommandGetter {
    pub fn new(chain: Vec<Box<dyn FileNameFormatter>>) -> Self {
        RenameFileCommandGetter { chain }
    }

    /// The destination `file` would be renamed to, which is `file` itself
    /// when no rule changes the name.
    pub fn new_path(&self, file: &Path) -> PathBuf {
        self.chain
            .iter()
            .fold(file.to_path_buf(), |current, formatter| {
                match formatter.format(&current) {
                    Some(name) => file.with_file_name(name),
                    None => current,
                }
            })
    }
}

impl CommandGetter for RenameFileCommandGetter {
    type Command = RenameFile;

    fn get_command(&self, file: &Path) -> Result<Option<RenameFile>, Error> {
        let file_new = self.new_path(file);
        if file_new.file_name() == file.file_name() {
            return Ok(None);
        }
        Ok(Some(RenameFile {
            file: file.to_path_buf(),
            file_new,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn sanitize(name: &str) -> String {
        TitleCaseSanitizer::sanitize(Path::new(name)).unwrap_or_else(|| name.to_string())
    }

    #[test]
    fn title_case_sanitizer() {
        assert_eq!(sanitize("My Song!!.wav"), "My Song.wav");
        assert_eq!(sanitize("my_song--(final)!!.WAV"), "My Song Final.wav");
        assert_eq!(sanitize("  KICK   drum 01 .Wav"), "Kick Drum 01.wav");
        assert_eq!(sanitize("snare2b.wav"), "Snare2B.wav");
        assert_eq!(sanitize("noext"), "Noext");
        assert_eq!(TitleCaseSanitizer::sanitize(Path::new("!!!.wav")), None);
    }

    #[test]
    fn title_case_sanitizer_is_idempotent() {
        for name in [
            "My Song!!.wav",
            "a-b_c.d.WAV",
            "HELLO world__.Wav",
            "808 cowbell (v2).wav",
            "élan vital.wav",
            "x.tar.GZ",
        ] {
            let once = sanitize(name);
            assert_eq!(sanitize(&once), once, "{name}");
        }
    }

    #[test]
    fn regex_first_match_wins() {
        let formatter = RegexReplaceFormatter::parse(&[
            r"^kick.*\.wav$=Kick",
            r"^k.*\.wav$=K",
        ])
        .unwrap();
        let dir = tempfile::tempdir().unwrap();
        assert_eq!(
            formatter.format(&dir.path().join("kick 1.wav")).as_deref(),
            Some("Kick.wav")
        );
        assert_eq!(formatter.format(&dir.path().join("kx.wav")).as_deref(), Some("K.wav"));
        assert_eq!(formatter.format(&dir.path().join("snare.wav")), None);
    }

    #[test]
    fn regex_replaces_every_match() {
        let formatter = RegexReplaceFormatter::parse(&["_=-"]).unwrap();
        let dir = tempfile::tempdir().unwrap();
        assert_eq!(
            formatter.format(&dir.path().join("a_b_c.wav")).as_deref(),
            Some("a-b-c.wav")
        );
    }

    #[test]
    fn regex_capture_groups_and_suffix() {
        let formatter =
            RegexReplaceFormatter::parse(&[r"^(\w+)-(\d+)\.WAV$=${2}_$1"]).unwrap();
        let dir = tempfile::tempdir().unwrap();
        assert_eq!(
            formatter.format(&dir.path().join("tom-12.WAV")).as_deref(),
            Some("12_tom.wav")
        );
    }

    #[test]
    fn regex_count_bumps_past_existing_names() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("take_1.wav"), b"").unwrap();
        fs::write(dir.path().join("take.wav"), b"").unwrap();
        let formatter = RegexReplaceFormatter::parse(&[r"^take\.wav$=take_{count}.wav"]).unwrap();

        assert_eq!(
            formatter.format(&dir.path().join("take.wav")).as_deref(),
            Some("take_2.wav")
        );
    }

    #[test]
    fn regex_count_accepts_own_name() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("take_1.wav"), b"").unwrap();
        let formatter = RegexReplaceFormatter::parse(&[r"^take.*=take_{count}"]).unwrap();

        assert_eq!(
            formatter.format(&dir.path().join("take_1.wav")).as_deref(),
            Some("take_1.wav")
        );
    }

    #[test]
    fn parse_rejects_bad_specs() {
        assert!(RegexReplaceFormatter::parse(&["no separator"]).is_err());
        assert!(RegexReplaceFormatter::parse(&["(unclosed=x"]).is_err());
    }

    #[test]
    fn getter_returns_none_for_normalized_names() {
        let getter = RenameFileCommandGetter::new(vec![Box::new(TitleCaseSanitizer)]);
        assert_eq!(getter.get_command(Path::new("dir/Clean.wav")).unwrap(), None);
    }

    #[cfg(unix)]
    #[test]
    fn getter_keeps_non_utf8_names_no_rule_touches() {
        use std::ffi::OsStr;
        use std::os::unix::ffi::OsStrExt;

        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join(OsStr::from_bytes(b"kick\xff.wav"));
        fs::write(&file, b"").unwrap();
        let getter = RenameFileCommandGetter::new(vec![Box::new(
            RegexReplaceFormatter::parse(&["^snare=Snare"]).unwrap(),
        )]);

        assert_eq!(getter.new_path(&file), file);
        assert_eq!(getter.get_command(&file).unwrap(), None);
    }

    #[test]
    fn getter_chains_formatters_in_order() {
        let dir = tempfile::tempdir().unwrap();
        let getter = RenameFileCommandGetter::new(vec![
            Box::new(TitleCaseSanitizer),
            Box::new(RegexReplaceFormatter::parse(&[r"^Kick=BD"]).unwrap()),
        ]);
        let command = getter
            .get_command(&dir.path().join("kick_hard!.WAV"))
            .unwrap()
            .unwrap();

        assert_eq!(command.file_new, dir.path().join("BD Hard.wav"));
        assert!(command.description().contains("kick_hard!.WAV"));
        assert!(command.description().ends_with("-> 'BD Hard.wav'"));
    }

    #[test]
    fn rename_refuses_to_overwrite() {
        let dir = tempfile::tempdir().unwrap();
        let command = RenameFile {
            file: dir.path().join("a.wav"),
            file_new: dir.path().join("b.wav"),
        };
        fs::write(&command.file, b"a").unwrap();
        fs::write(&command.file_new, b"b").unwrap();

        let err = command.execute().unwrap_err();
        assert!(err.to_string().contains("a.wav"));
        assert_eq!(fs::read(&command.file_new).unwrap(), b"b");
    }

    #[test]
    fn rename_no_replace_keeps_an_existing_destination() {
        let dir = tempfile::tempdir().unwrap();
        let (from, to) = (dir.path().join("a.wav"), dir.path().join("b.wav"));
        fs::write(&from, b"a").unwrap();
        fs::write(&to, b"b").unwrap();

        let err = rename_no_replace(&from, &to).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::AlreadyExists);
        assert_eq!(fs::read(&from).unwrap(), b"a");
        assert_eq!(fs::read(&to).unwrap(), b"b");
    }

    #[test]
    fn rename_twice_is_harmless() {
        let dir = tempfile::tempdir().unwrap();
        let command = RenameFile {
            file: dir.path().join("a.wav"),
            file_new: dir.path().join("b.wav"),
        };
        fs::write(&command.file, b"a").unwrap();

        command.execute().unwrap();
        command.execute().unwrap();
        assert!(!command.file.exists());
        assert_eq!(fs::read(&command.file_new).unwrap(), b"a");
    }

    #[test]
    fn rename_of_vanished_file_fails() {
        let dir = tempfile::tempdir().unwrap();
        let command = RenameFile {
            file: dir.path().join("gone.wav"),
            file_new: dir.path().join("Gone.wav"),
        };
        assert!(command.execute().is_err());
    }
}
