//! Atelier configuration stored under `.atelier/config.toml`.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use anyhow::{Context, Result, anyhow};
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::core::skills::{SkillCatalog, SkillSpec};

static SKILL_NAME: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[a-z][a-z0-9_]*$").expect("valid skill name pattern"));

/// Atelier configuration (TOML).
///
/// Missing fields fall back to defaults, so an empty file is a valid config.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct AtelierConfig {
    /// SQLite database backing the durable store.
    pub data_file: PathBuf,

    pub runs: RunsConfig,

    pub server: ServerConfig,

    /// Skills appended to the built-in catalog.
    pub skills: Vec<SkillSpec>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct RunsConfig {
    /// Create runs directly in `running` instead of `queued`.
    pub start_immediately: bool,

    /// Skill used by the chat trigger when the request names none.
    pub default_chat_skill: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct ServerConfig {
    pub bind: String,
    pub port: u16,
}

impl Default for AtelierConfig {
    fn default() -> Self {
        Self {
            data_file: PathBuf::from(".atelier/state/atelier.db"),
            runs: RunsConfig::default(),
            server: ServerConfig::default(),
            skills: Vec::new(),
        }
    }
}

impl Default for RunsConfig {
    fn default() -> Self {
        Self {
            start_immediately: true,
            default_chat_skill: "ppt_revise".to_string(),
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: "127.0.0.1".to_string(),
            port: 8000,
        }
    }
}

impl AtelierConfig {
    pub fn validate(&self) -> Result<()> {
        if self.data_file.as_os_str().is_empty() {
            return Err(anyhow!("data_file must not be empty"));
        }
        if self.server.bind.trim().is_empty() {
            return Err(anyhow!("server.bind must not be empty"));
        }
        if self.server.port == 0 {
            return Err(anyhow!("server.port must be > 0"));
        }
        for skill in &self.skills {
            if !SKILL_NAME.is_match(&skill.name) {
                return Err(anyhow!(
                    "skills: name '{}' must match {}",
                    skill.name,
                    SKILL_NAME.as_str()
                ));
            }
            if skill.output_types.is_empty() {
                return Err(anyhow!(
                    "skills: '{}' must declare at least one output type",
                    skill.name
                ));
            }
        }
        let catalog = self.catalog()?;
        if !catalog.contains(&self.runs.default_chat_skill) {
            return Err(anyhow!(
                "runs.default_chat_skill '{}' is not in the skill catalog",
                self.runs.default_chat_skill
            ));
        }
        Ok(())
    }

    /// Built-in skills plus the configured extras.
    pub fn catalog(&self) -> Result<SkillCatalog> {
        SkillCatalog::with_extra(self.skills.iter().cloned()).context("build skill catalog")
    }

    /// Resolve `data_file` against the project root.
    pub fn data_file_under(&self, base: &Path) -> PathBuf {
        if self.data_file.is_absolute() {
            return self.data_file.clone();
        }
        base.join(&self.data_file)
    }
}

/// Load config from a TOML file.
///
/// If the file is missing, returns `AtelierConfig::default()`.
pub fn load_config(path: &Path) -> Result<AtelierConfig> {
    if !path.exists() {
        let cfg = AtelierConfig::default();
        cfg.validate()?;
        return Ok(cfg);
    }
    let contents = fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
    let cfg: AtelierConfig =
        toml::from_str(&contents).with_context(|| format!("parse {}", path.display()))?;
    cfg.validate()?;
    Ok(cfg)
}

/// Atomically write config to disk (temp file + rename).
pub fn write_config(path: &Path, cfg: &AtelierConfig) -> Result<()> {
    cfg.validate()?;
    let mut buf = toml::to_string_pretty(cfg).context("serialize config toml")?;
    buf.push('\n');
    write_atomic(path, &buf)
}

fn write_atomic(path: &Path, contents: &str) -> Result<()> {
    let parent = path
        .parent()
        .with_context(|| format!("config path missing parent {}", path.display()))?;
    fs::create_dir_all(parent).with_context(|| format!("create directory {}", parent.display()))?;
    let tmp_path = path.with_extension("toml.tmp");
    fs::write(&tmp_path, contents)
        .with_context(|| format!("write temp config {}", tmp_path.display()))?;
    fs::rename(&tmp_path, path).with_context(|| format!("replace config {}", path.display()))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn load_missing_returns_default() {
        let temp = tempfile::tempdir().expect("tempdir");
        let cfg = load_config(&temp.path().join("missing.toml")).expect("load");
        assert_eq!(cfg, AtelierConfig::default());
    }

    #[test]
    fn write_then_load_round_trips() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = temp.path().join("config.toml");
        let mut cfg = AtelierConfig::default();
        cfg.skills
            .push(SkillSpec::new("sheet_summarize", "0.1", &["xlsx"], &["text"]));
        write_config(&path, &cfg).expect("write");
        let loaded = load_config(&path).expect("load");
        assert_eq!(loaded, cfg);
    }

    /// Partial files keep defaults for everything they omit.
    #[test]
    fn partial_file_fills_defaults() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = temp.path().join("config.toml");
        fs::write(&path, "[runs]\nstart_immediately = false\n").expect("write");
        let cfg = load_config(&path).expect("load");
        assert!(!cfg.runs.start_immediately);
        assert_eq!(cfg.runs.default_chat_skill, "ppt_revise");
        assert_eq!(cfg.server.port, 8000);
    }

    #[test]
    fn extra_skills_join_the_catalog() {
        let mut cfg = AtelierConfig::default();
        cfg.skills
            .push(SkillSpec::new("sheet_summarize", "0.1", &["xlsx"], &["text"]));
        let catalog = cfg.catalog().expect("catalog");
        assert!(catalog.contains("sheet_summarize"));
        assert!(catalog.contains("ppt_revise"));
    }

    #[test]
    fn validate_rejects_bad_values() {
        let mut cfg = AtelierConfig::default();
        cfg.server.port = 0;
        assert!(cfg.validate().is_err());

        let mut cfg = AtelierConfig::default();
        cfg.skills
            .push(SkillSpec::new("Bad-Name", "0.1", &["pdf"], &["text"]));
        assert!(cfg.validate().is_err());

        let mut cfg = AtelierConfig::default();
        cfg.skills.push(SkillSpec::new("no_output", "0.1", &["pdf"], &[]));
        assert!(cfg.validate().is_err());

        let mut cfg = AtelierConfig::default();
        cfg.skills
            .push(SkillSpec::new("ppt_revise", "0.2", &["pdf"], &["pptx"]));
        assert!(cfg.validate().is_err());

        let mut cfg = AtelierConfig::default();
        cfg.runs.default_chat_skill = "unknown".to_string();
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn relative_data_file_resolves_under_base() {
        let cfg = AtelierConfig::default();
        assert_eq!(
            cfg.data_file_under(Path::new("/srv/project")),
            PathBuf::from("/srv/project/.atelier/state/atelier.db")
        );
    }
}
