use crate::{batch::Chunk, collector::WorkItem, config::PlannerConfig};
use std::{borrow::Cow, fmt::Write as _, path::Path};

/// placeholders understood by `ScriptBuilder`
pub const PLACEHOLDERS: [&str; 9] = [
    "stem", "input", "output", "srctp", "runtpe", "result", "tasks", "nodes", "workdir",
];

pub fn artifact_name(prefix: &str, index: usize) -> String {
    format!("{prefix}{index}")
}

/// Replace every `{key}` that `lookup` knows in a single pass.
///
/// Anything else in braces, e.g. a shell `${VAR}`, stays as it is. Substituted values are not
/// scanned again.
pub fn render<'v, F>(template: &str, lookup: F) -> String
where
    F: Fn(&str) -> Option<Cow<'v, str>>,
{
    let mut rendered = String::with_capacity(template.len());
    let mut rest = template;

    while let Some(open) = rest.find('{') {
        rendered.push_str(&rest[..open]);
        let after = &rest[open + 1..];

        match after
            .find('}')
            .and_then(|close| lookup(&after[..close]).map(|value| (value, close)))
        {
            Some((value, close)) => {
                rendered.push_str(&value);
                rest = &after[close + 1..];
            }
            None => {
                rendered.push('{');
                rest = after;
            }
        }
    }

    rendered.push_str(rest);

    rendered
}

/// placeholder-looking keys (`{lower_case}`) used in a template
pub fn placeholders(template: &str) -> Vec<&str> {
    let mut keys = Vec::new();
    let mut rest = template;

    while let Some(open) = rest.find('{') {
        let after = &rest[open + 1..];

        let Some(close) = after.find('}') else {
            break;
        };

        let key = &after[..close];

        if !key.is_empty() && key.chars().all(|c| c.is_ascii_lowercase() || c == '_') {
            keys.push(key);
            rest = &after[close + 1..];
        } else {
            rest = after;
        }
    }

    keys
}

/// Composes the text of one submission artifact per chunk
#[derive(Debug, Clone)]
pub struct ScriptBuilder<'a> {
    config: &'a PlannerConfig,
    workdir: Cow<'a, str>,
}

impl<'a> ScriptBuilder<'a> {
    pub fn new(config: &'a PlannerConfig, workdir: &'a Path) -> Self {
        Self {
            config,
            workdir: workdir.to_string_lossy(),
        }
    }

    fn value<'s>(&'s self, item: Option<&'s WorkItem>, key: &str) -> Option<Cow<'s, str>> {
        let slurm = &self.config.slurm;
        let suffixes = &self.config.artifact.suffixes;
        let suffixed = |item: &WorkItem, suffix: &str| -> Cow<'s, str> {
            Cow::Owned(format!("{}{suffix}", item.stem()))
        };

        let value: Cow<'s, str> = match (key, item) {
            ("tasks", _) => Cow::Owned(slurm.tasks.to_string()),
            ("nodes", _) => Cow::Owned(slurm.nodes.to_string()),
            ("workdir", _) => Cow::Borrowed(&*self.workdir),
            ("stem", Some(item)) => Cow::Borrowed(item.stem()),
            ("input", Some(item)) => Cow::Borrowed(item.file_name()),
            ("output", Some(item)) => suffixed(item, &suffixes.output),
            ("srctp", Some(item)) => suffixed(item, &suffixes.srctp),
            ("runtpe", Some(item)) => suffixed(item, &suffixes.runtpe),
            ("result", Some(item)) => suffixed(item, &suffixes.result),
            _ => return None,
        };

        Some(value)
    }

    /// resource request followed by the preamble lines
    pub fn header(&self) -> String {
        let slurm = &self.config.slurm;
        let mut header = String::from("#!/bin/bash\n");

        let _ = writeln!(header, "#SBATCH -t {}", slurm.time);
        let _ = writeln!(header, "#SBATCH -p {}", slurm.partition);
        let _ = writeln!(header, "#SBATCH -A {}", slurm.account);
        let _ = writeln!(header, "#SBATCH -N {}", slurm.nodes);
        let _ = writeln!(header, "#SBATCH -n {}", slurm.tasks);

        for option in &slurm.options {
            let _ = writeln!(header, "#SBATCH {option}");
        }

        header.push('\n');

        for line in &self.config.artifact.preamble {
            header.push_str(&render(line, |key| self.value(None, key)));
            header.push('\n');
        }

        header
    }

    /// simulation invocation plus post-processing for a single work item
    pub fn command_block(&self, item: &WorkItem) -> String {
        let artifact = &self.config.artifact;
        let mut block = render(&artifact.run, |key| self.value(Some(item), key));
        block.push('\n');

        for line in &artifact.post {
            block.push_str(&render(line, |key| self.value(Some(item), key)));
            block.push('\n');
        }

        block
    }

    pub fn build(&self, chunk: &Chunk<'_, WorkItem>) -> String {
        chunk
            .items
            .iter()
            .fold(self.header(), |mut script, item| {
                script.push_str(&self.command_block(item));
                script
            })
    }
}
