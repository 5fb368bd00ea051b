use crate::script::{placeholders, PLACEHOLDERS};
use globset::Glob;
use serde::{Deserialize, Serialize};
use std::{
    fmt, fs, io,
    num::NonZeroUsize,
    path::{Path, PathBuf},
    str::FromStr,
    time::Duration,
};
use thiserror::Error;
use tracing::{debug, error, info, warn};

/// config file picked up from the invocation directory when `--config` is absent
pub const DEFAULT_CONFIG_FILE: &str = "volley.yaml";

const DEFAULT_CHUNK_SIZE: NonZeroUsize = match NonZeroUsize::new(500) {
    Some(size) => size,
    None => panic!("chunk size must be positive"),
};

#[derive(Error, Debug)]
pub enum ConfigErrors {
    #[error("Failed to read config file {path:?}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("Failed to parse config file: {0}")]
    Parse(#[from] serde_yaml::Error),
    #[error("Config failed preflight checks")]
    Preflight,
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum WallTimeError {
    #[error("wall time is empty")]
    Empty,
    #[error("'{0}' is not a Slurm time specification")]
    Malformed(String),
}

#[derive(Deserialize, Serialize, Clone, Debug, Default, PartialEq, Eq)]
#[serde(default, deny_unknown_fields)]
pub struct PlannerConfig {
    // resource request written into every artifact header
    pub slurm: SlurmConfig,
    pub discovery: DiscoveryConfig,
    pub artifact: ArtifactConfig,
    pub submit: SubmitConfig,
    pub cleanup: CleanupConfig,
    // numeric subdirectory layout shared by `sweep` and `combine`
    pub sweep: SweepConfig,
}

#[derive(Deserialize, Serialize, Clone, Debug, PartialEq, Eq)]
#[serde(default, deny_unknown_fields)]
pub struct SlurmConfig {
    pub time: WallTime,
    pub partition: String,
    pub account: String,
    pub nodes: u32,
    pub tasks: u32,
    // additional raw `#SBATCH` options, written verbatim after the resource request
    pub options: Vec<String>,
    pub submit_command: String,
}

impl Default for SlurmConfig {
    fn default() -> Self {
        Self {
            time: WallTime::from_secs(24 * 3600),
            partition: "pbatch".to_owned(),
            account: "wbronze".to_owned(),
            nodes: 1,
            tasks: 16,
            options: Vec::new(),
            submit_command: "sbatch".to_owned(),
        }
    }
}

#[derive(Deserialize, Serialize, Clone, Copy, Debug, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    #[default]
    Ascending,
    Descending,
}

#[derive(Deserialize, Serialize, Clone, Debug, PartialEq, Eq)]
#[serde(default, deny_unknown_fields)]
pub struct DiscoveryConfig {
    // substring every input deck name contains, stripped from the end to form the stem
    pub input_marker: String,
    // names containing this are never picked up
    pub disabled_marker: String,
    pub order: SortOrder,
}

impl Default for DiscoveryConfig {
    fn default() -> Self {
        Self {
            input_marker: ".i".to_owned(),
            disabled_marker: "#".to_owned(),
            order: SortOrder::Ascending,
        }
    }
}

#[derive(Deserialize, Serialize, Clone, Debug, PartialEq, Eq)]
#[serde(default, deny_unknown_fields)]
pub struct Suffixes {
    pub output: String,
    pub srctp: String,
    pub runtpe: String,
    pub result: String,
}

impl Default for Suffixes {
    fn default() -> Self {
        Self {
            output: ".o".to_owned(),
            srctp: ".srctp".to_owned(),
            runtpe: ".runtpe".to_owned(),
            result: ".txt".to_owned(),
        }
    }
}

#[derive(Deserialize, Serialize, Clone, Debug, PartialEq, Eq)]
#[serde(default, deny_unknown_fields)]
pub struct ArtifactConfig {
    pub prefix: String,
    pub chunk_size: NonZeroUsize,
    // lines between the resource request and the first command block
    pub preamble: Vec<String>,
    // simulation invocation, one per work item
    pub run: String,
    // lines following every simulation invocation
    pub post: Vec<String>,
    pub suffixes: Suffixes,
}

impl Default for ArtifactConfig {
    fn default() -> Self {
        Self {
            prefix: "pbatch".to_owned(),
            chunk_size: DEFAULT_CHUNK_SIZE,
            preamble: vec!["date".to_owned(), "cd \"{workdir}\"".to_owned()],
            run: "srun -N {nodes} -n {tasks} /usr/apps/mcnp/bin/mcnp6.2.mpi inp={input} \
                  out={output} srctp={srctp} runtpe={runtpe} tasks {tasks}"
                .to_owned(),
            post: vec![
                "python single.py {output} {result}".to_owned(),
                "rm slurm*".to_owned(),
            ],
            suffixes: Suffixes::default(),
        }
    }
}

/// How `submit` finds the artifacts it hands to the scheduler
#[derive(Deserialize, Serialize, Clone, Debug, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum SubmitStrategy {
    /// every file named `<prefix><index>` in the directory
    #[default]
    Pattern,
    /// `<prefix>start` up to and including `<prefix>end`
    Range { start: usize, end: usize },
}

#[derive(Deserialize, Serialize, Clone, Debug, Default, PartialEq, Eq)]
#[serde(default, deny_unknown_fields)]
pub struct SubmitConfig {
    // `pattern` or `range: {start, end}` rather than a `!range` tag
    #[serde(with = "serde_yaml::with::singleton_map")]
    pub strategy: SubmitStrategy,
}

#[derive(Deserialize, Serialize, Clone, Copy, Debug, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum CleanupScope {
    /// the directory being planned
    #[default]
    Target,
    /// the directory the tool was started from
    Invocation,
}

#[derive(Deserialize, Serialize, Clone, Debug, PartialEq, Eq)]
#[serde(default, deny_unknown_fields)]
pub struct CleanupConfig {
    pub enabled: bool,
    pub scope: CleanupScope,
    // `<prefix>*` is always appended, see `Cleaner::new`
    pub patterns: Vec<String>,
}

impl Default for CleanupConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            scope: CleanupScope::Target,
            patterns: ["*.o", "*.srctp", "*.runtpe", "quartz*", "slurm*"]
                .into_iter()
                .map(str::to_owned)
                .collect(),
        }
    }
}

/// Numeric range of subdirectory names, `end` is exclusive
#[derive(Deserialize, Serialize, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct Sequence {
    pub start: u64,
    pub end: u64,
    pub step: u64,
}

impl Sequence {
    pub fn iter(&self) -> impl Iterator<Item = u64> + Clone {
        // a zero step is rejected by preflight, treat it as 1 here instead of panicking
        let step = usize::try_from(self.step).unwrap_or(usize::MAX).max(1);

        (self.start..self.end).step_by(step)
    }

    pub fn directories(&self) -> impl Iterator<Item = String> + Clone {
        self.iter().map(|value| value.to_string())
    }
}

impl Default for Sequence {
    fn default() -> Self {
        Self {
            start: 25,
            end: 4025,
            step: 25,
        }
    }
}

#[derive(Deserialize, Serialize, Clone, Debug, PartialEq, Eq)]
#[serde(default, deny_unknown_fields)]
pub struct SweepConfig {
    pub sequence: Sequence,
    // copied into every sweep directory before it is planned
    pub support_files: Vec<PathBuf>,
    pub result_marker: String,
    pub output: PathBuf,
}

impl Default for SweepConfig {
    fn default() -> Self {
        Self {
            sequence: Sequence::default(),
            support_files: vec![PathBuf::from("single.py")],
            result_marker: ".txt".to_owned(),
            output: PathBuf::from("output.txt"),
        }
    }
}

/// Slurm wall-time limit, kept at second resolution
#[derive(Deserialize, Serialize, Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
#[serde(try_from = "String", into = "String")]
pub struct WallTime {
    seconds: u64,
}

impl WallTime {
    pub const fn from_secs(seconds: u64) -> Self {
        Self { seconds }
    }

    pub fn as_duration(&self) -> Duration {
        Duration::from_secs(self.seconds)
    }
}

fn clock(days: u64, hours: u64, minutes: u64, seconds: u64) -> u64 {
    days.saturating_mul(86_400)
        .saturating_add(hours.saturating_mul(3600))
        .saturating_add(minutes.saturating_mul(60))
        .saturating_add(seconds)
}

impl FromStr for WallTime {
    type Err = WallTimeError;

    /// accepts the formats of `sbatch -t`: `M`, `M:S`, `H:M:S`, `D-H`, `D-H:M` and `D-H:M:S`
    fn from_str(input: &str) -> Result<Self, Self::Err> {
        let input = input.trim();

        if input.is_empty() {
            return Err(WallTimeError::Empty);
        }

        let malformed = || WallTimeError::Malformed(input.to_owned());
        let parse = |part: &str| part.parse::<u64>().map_err(|_| malformed());
        let sixty = |value: u64| if value < 60 { Ok(value) } else { Err(malformed()) };

        let seconds = match input.split_once('-') {
            Some((days, rest)) => {
                let days = parse(days)?;
                let parts = rest.split(':').map(parse).collect::<Result<Vec<_>, _>>()?;

                match parts.as_slice() {
                    [hours] => clock(days, *hours, 0, 0),
                    [hours, minutes] => clock(days, *hours, sixty(*minutes)?, 0),
                    [hours, minutes, seconds] => {
                        clock(days, *hours, sixty(*minutes)?, sixty(*seconds)?)
                    }
                    _ => return Err(malformed()),
                }
            }
            None => {
                let parts = input.split(':').map(parse).collect::<Result<Vec<_>, _>>()?;

                match parts.as_slice() {
                    [minutes] => clock(0, 0, *minutes, 0),
                    [minutes, seconds] => clock(0, 0, *minutes, sixty(*seconds)?),
                    [hours, minutes, seconds] => {
                        clock(0, *hours, sixty(*minutes)?, sixty(*seconds)?)
                    }
                    _ => return Err(malformed()),
                }
            }
        };

        Ok(Self { seconds })
    }
}

impl fmt::Display for WallTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let hours = self.seconds / 3600;
        let minutes = (self.seconds % 3600) / 60;
        let seconds = self.seconds % 60;

        write!(f, "{hours:02}:{minutes:02}:{seconds:02}")
    }
}

impl TryFrom<String> for WallTime {
    type Error = WallTimeError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<WallTime> for String {
    fn from(value: WallTime) -> Self {
        value.to_string()
    }
}

fn valid_prefix(prefix: &str) -> bool {
    !prefix.is_empty()
        && prefix
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.'))
}

impl PlannerConfig {
    pub fn from_yaml(text: &str) -> Result<Self, ConfigErrors> {
        // an empty document has no mapping to deserialize from
        if text.trim().is_empty() {
            return Ok(Self::default());
        }

        Ok(serde_yaml::from_str::<Option<Self>>(text)?.unwrap_or_default())
    }

    /// load the given file, `./volley.yaml` if it exists, or fall back to built-in defaults
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigErrors> {
        let path = match path {
            Some(path) => path.to_path_buf(),
            None => {
                let default = PathBuf::from(DEFAULT_CONFIG_FILE);

                if !default.is_file() {
                    info!("No {DEFAULT_CONFIG_FILE} found, using built-in defaults");

                    return Ok(Self::default());
                }

                default
            }
        };

        let text = fs::read_to_string(&path).map_err(|source| ConfigErrors::Read {
            path: path.clone(),
            source,
        })?;
        debug!(path = ?path, "Loaded config file");

        Self::from_yaml(&text)
    }

    /// Returns `true` if any problem was found. Every problem is logged before returning
    /// so a broken config can be fixed in one go.
    pub fn preflight_checks(&self) -> bool {
        let mut contains_error = false;
        let slurm = &self.slurm;

        for (field, value) in [
            ("slurm.partition", &slurm.partition),
            ("slurm.account", &slurm.account),
            ("slurm.submit_command", &slurm.submit_command),
            ("discovery.input_marker", &self.discovery.input_marker),
            ("discovery.disabled_marker", &self.discovery.disabled_marker),
        ] {
            if value.trim().is_empty() {
                error!("{field} cannot be empty");
                contains_error = true;
            }
        }

        if slurm.nodes == 0 {
            error!("slurm.nodes must be at least 1");
            contains_error = true;
        }

        if slurm.tasks == 0 {
            error!("slurm.tasks must be at least 1");
            contains_error = true;
        }

        if slurm.time.as_duration().is_zero() {
            error!("slurm.time cannot be 0, the scheduler would reject every job");
            contains_error = true;
        }

        if !valid_prefix(&self.artifact.prefix) {
            error!(
                "artifact.prefix '{}' may only contain ASCII letters, digits, '_', '-' and '.'",
                self.artifact.prefix
            );
            contains_error = true;
        }

        let templates = std::iter::once(&self.artifact.run)
            .chain(self.artifact.preamble.iter())
            .chain(self.artifact.post.iter());

        for template in templates {
            for key in placeholders(template) {
                if !PLACEHOLDERS.contains(&key) {
                    warn!("Placeholder {{{key}}} in '{template}' is unknown and will be written verbatim");
                }
            }
        }

        if let SubmitStrategy::Range { start, end } = self.submit.strategy {
            if start > end {
                error!("submit.strategy.range start ({start}) is larger than end ({end})");
                contains_error = true;
            }
        }

        for pattern in self.cleanup.patterns.iter() {
            if let Err(e) = Glob::new(pattern) {
                error!("cleanup.patterns '{pattern}' is not a valid glob: {e}");
                contains_error = true;
            }
        }

        let sequence = &self.sweep.sequence;

        if sequence.step == 0 {
            error!("sweep.sequence.step cannot be 0");
            contains_error = true;
        } else if sequence.start >= sequence.end {
            warn!(
                "sweep.sequence {}..{} is empty, sweep and combine will do nothing",
                sequence.start, sequence.end
            );
        }

        if self.sweep.result_marker.is_empty() {
            error!("sweep.result_marker cannot be empty");
            contains_error = true;
        }

        contains_error
    }
}
