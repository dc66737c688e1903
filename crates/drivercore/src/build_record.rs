//! Build record — the previous run's per-input status and argument hash
//! (spec §4.F). Text-based, order-preserving; read permissively, write
//! canonically (sorted paths), mirroring the load/save shape of
//! `atlas-build::incremental::BuildState`.

use crate::error::{Error, Result};
use std::collections::{BTreeMap, HashSet};
use std::fmt::Write as _;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimePoint {
    pub sec: i64,
    pub nsec: u32,
}

impl TimePoint {
    pub fn new(sec: i64, nsec: u32) -> Self {
        Self { sec, nsec }
    }
}

impl PartialOrd for TimePoint {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for TimePoint {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        (self.sec, self.nsec).cmp(&(other.sec, other.nsec))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputStatus {
    UpToDate,
    NeedsCascadingBuild,
    NeedsNonCascadingBuild,
    NewlyAdded,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InputInfo {
    pub status: InputStatus,
    pub previous_mod_time: TimePoint,
}

#[derive(Debug, Clone)]
pub struct BuildRecord {
    pub compiler_version: String,
    pub args_hash: String,
    pub start_time: TimePoint,
    pub end_time: TimePoint,
    pub inputs: BTreeMap<PathBuf, InputInfo>,
}

impl BuildRecord {
    pub fn new(compiler_version: impl Into<String>, args_hash: impl Into<String>) -> Self {
        Self {
            compiler_version: compiler_version.into(),
            args_hash: args_hash.into(),
            start_time: TimePoint::new(0, 0),
            end_time: TimePoint::new(0, 0),
            inputs: BTreeMap::new(),
        }
    }

    /// Inputs present in `self` but absent from `current`, and vice versa.
    /// Grounded in `BuildState::diff_modules`'s added/removed/retained
    /// shape, specialized to the pre-flight gate that cares only about
    /// "missing" inputs.
    pub fn diff(&self, current: &HashSet<PathBuf>) -> BuildRecordDiff {
        let previous: HashSet<PathBuf> = self.inputs.keys().cloned().collect();
        BuildRecordDiff {
            added: current.difference(&previous).cloned().collect(),
            removed: previous.difference(current).cloned().collect(),
            retained: current.intersection(&previous).cloned().collect(),
        }
    }

    pub fn read(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path).map_err(|e| Error::io(path, e))?;
        Self::parse(&text, path)
    }

    pub fn write(&self, path: &Path) -> Result<()> {
        std::fs::write(path, self.emit()).map_err(|e| Error::io(path, e))
    }

    pub fn parse(text: &str, path: &Path) -> Result<Self> {
        let fail = |reason: &str| Error::MalformedBuildRecord {
            path: path.to_path_buf(),
            reason: reason.to_string(),
        };

        let mut compiler_version = None;
        let mut args_hash = None;
        let mut start_time = None;
        let mut end_time = None;
        let mut inputs = BTreeMap::new();

        let mut lines = text.lines().peekable();
        while let Some(line) = lines.next() {
            let trimmed = line.trim_end();
            if trimmed.is_empty() {
                continue;
            }
            if let Some(rest) = trimmed.strip_prefix("version:") {
                compiler_version = Some(parse_quoted(rest.trim()).ok_or_else(|| fail("malformed version"))?);
            } else if let Some(rest) = trimmed.strip_prefix("options:") {
                args_hash = Some(parse_quoted(rest.trim()).ok_or_else(|| fail("malformed options"))?);
            } else if let Some(rest) = trimmed.strip_prefix("build_start_time:") {
                start_time = Some(parse_time_tuple(rest.trim()).ok_or_else(|| fail("malformed build_start_time"))?);
            } else if let Some(rest) = trimmed.strip_prefix("build_end_time:") {
                end_time = Some(parse_time_tuple(rest.trim()).ok_or_else(|| fail("malformed build_end_time"))?);
            } else if trimmed.trim_start() == "inputs:" {
                while let Some(next) = lines.peek() {
                    let next_trimmed = next.trim_end();
                    if next_trimmed.is_empty() || !next_trimmed.starts_with(char::is_whitespace) {
                        break;
                    }
                    let (path_str, status, time) = parse_input_line(next_trimmed.trim())
                        .ok_or_else(|| fail("malformed input entry"))?;
                    inputs.insert(
                        PathBuf::from(path_str),
                        InputInfo {
                            status,
                            previous_mod_time: time,
                        },
                    );
                    lines.next();
                }
            } else {
                return Err(fail(&format!("unrecognized line: {trimmed}")));
            }
        }

        Ok(Self {
            compiler_version: compiler_version.ok_or_else(|| fail("missing version"))?,
            args_hash: args_hash.ok_or_else(|| fail("missing options"))?,
            start_time: start_time.ok_or_else(|| fail("missing build_start_time"))?,
            end_time: end_time.ok_or_else(|| fail("missing build_end_time"))?,
            inputs,
        })
    }

    pub fn emit(&self) -> String {
        let mut out = String::new();
        writeln!(out, "version:         \"{}\"", self.compiler_version).unwrap();
        writeln!(out, "options:         \"{}\"", self.args_hash).unwrap();
        writeln!(
            out,
            "build_start_time:[{}, {}]",
            self.start_time.sec, self.start_time.nsec
        )
        .unwrap();
        writeln!(
            out,
            "build_end_time:  [{}, {}]",
            self.end_time.sec, self.end_time.nsec
        )
        .unwrap();
        writeln!(out, "inputs:").unwrap();
        for (path, info) in &self.inputs {
            let sentinel = match info.status {
                InputStatus::UpToDate => "",
                InputStatus::NeedsCascadingBuild => "!dirty ",
                InputStatus::NeedsNonCascadingBuild => "!private ",
                InputStatus::NewlyAdded => "",
            };
            writeln!(
                out,
                "  \"{}\": {}[{}, {}]",
                path.display(),
                sentinel,
                info.previous_mod_time.sec,
                info.previous_mod_time.nsec
            )
            .unwrap();
        }
        out
    }
}

#[derive(Debug, Default)]
pub struct BuildRecordDiff {
    pub added: Vec<PathBuf>,
    pub removed: Vec<PathBuf>,
    pub retained: Vec<PathBuf>,
}

fn parse_quoted(s: &str) -> Option<String> {
    let s = s.trim();
    let s = s.strip_prefix('"')?;
    let s = s.strip_suffix('"')?;
    Some(s.to_string())
}

fn parse_time_tuple(s: &str) -> Option<TimePoint> {
    let s = s.trim().strip_prefix('[')?.strip_suffix(']')?;
    let (sec, nsec) = s.split_once(',')?;
    Some(TimePoint::new(
        sec.trim().parse().ok()?,
        nsec.trim().parse().ok()?,
    ))
}

fn parse_input_line(line: &str) -> Option<(String, InputStatus, TimePoint)> {
    let rest = line.strip_prefix('"')?;
    let (path, rest) = rest.split_once("\":")?;
    let rest = rest.trim();
    let (status, time_str) = if let Some(r) = rest.strip_prefix("!dirty") {
        (InputStatus::NeedsCascadingBuild, r.trim())
    } else if let Some(r) = rest.strip_prefix("!private") {
        (InputStatus::NeedsNonCascadingBuild, r.trim())
    } else {
        (InputStatus::UpToDate, rest)
    };
    let time = parse_time_tuple(time_str)?;
    Some((path.to_string(), status, time))
}
