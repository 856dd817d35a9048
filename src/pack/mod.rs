//! Language pack manifests
//!
//! A pack is a YAML file naming one topic and the documentation sources
//! that feed it.

use crate::error::{Error, Result};
use crate::store::SourceKind;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;

const DEFAULT_PATTERN: &str = "**/*.md";

/// A topic and its sources
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LanguagePack {
    pub language: String,
    #[serde(default)]
    pub display_name: String,
    #[serde(default)]
    pub sources: Vec<SourceDef>,
}

/// One documentation source within a pack
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceDef {
    pub name: String,
    #[serde(rename = "type")]
    pub kind: SourceKind,
    pub url: String,
    /// Subdirectories of a repository to index
    #[serde(default)]
    pub paths: Vec<String>,
    /// File globs for repositories, URL patterns for web sources
    #[serde(default)]
    pub patterns: Vec<String>,
    /// Priority tier (1 = official)
    #[serde(default)]
    pub tier: Option<u8>,
}

impl LanguagePack {
    /// Load and validate a manifest
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let pack = Self::from_yaml(&content)
            .map_err(|e| Error::Config(format!("{}: {}", path.display(), e)))?;
        Ok(pack)
    }

    pub fn from_yaml(content: &str) -> Result<Self> {
        let mut pack: LanguagePack = serde_yaml::from_str(content)?;
        pack.normalize();
        pack.validate()?;
        Ok(pack)
    }

    fn normalize(&mut self) {
        if self.display_name.trim().is_empty() {
            self.display_name = self.language.clone();
        }
        for source in &mut self.sources {
            if source.kind == SourceKind::Repository && source.patterns.is_empty() {
                source.patterns.push(DEFAULT_PATTERN.to_string());
            }
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.language.trim().is_empty() {
            return Err(Error::Config("language is required".to_string()));
        }
        if self.sources.is_empty() {
            return Err(Error::Config(format!(
                "pack '{}' has no sources",
                self.language
            )));
        }

        let mut seen = HashSet::new();
        for (i, source) in self.sources.iter().enumerate() {
            if source.name.trim().is_empty() {
                return Err(Error::Config(format!("source[{}]: name is required", i)));
            }
            if source.url.trim().is_empty() {
                return Err(Error::Config(format!(
                    "source[{}] ({}): url is required",
                    i, source.name
                )));
            }
            if !seen.insert(source.name.as_str()) {
                return Err(Error::Config(format!(
                    "duplicate source name '{}'",
                    source.name
                )));
            }
        }

        Ok(())
    }

    /// Sources selected by an optional name filter
    pub fn select_sources(&self, name: Option<&str>) -> Result<Vec<&SourceDef>> {
        match name {
            None => Ok(self.sources.iter().collect()),
            Some(name) => self
                .sources
                .iter()
                .find(|s| s.name == name)
                .map(|s| vec![s])
                .ok_or_else(|| {
                    Error::NotFound(format!("source '{}' in pack '{}'", name, self.language))
                }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PACK: &str = r#"
language: go
display_name: Go
sources:
  - name: go-wiki
    type: git
    url: https://github.com/golang/go.wiki.git
    tier: 1
  - name: uber-style-guide
    type: git
    url: https://github.com/uber-go/guide.git
    paths: [src]
    patterns: ["*.md"]
  - name: go-blog
    type: web
    url: https://go.dev/blog
    patterns: ["https://go.dev/blog/*"]
"#;

    #[test]
    fn test_parse_pack() {
        let pack = LanguagePack::from_yaml(PACK).unwrap();

        assert_eq!(pack.language, "go");
        assert_eq!(pack.display_name, "Go");
        assert_eq!(pack.sources.len(), 3);
        assert_eq!(pack.sources[0].kind, SourceKind::Repository);
        assert_eq!(pack.sources[0].patterns, vec!["**/*.md"]);
        assert_eq!(pack.sources[0].tier, Some(1));
        assert_eq!(pack.sources[1].paths, vec!["src"]);
        assert_eq!(pack.sources[2].kind, SourceKind::Web);
    }

    #[test]
    fn test_display_name_defaults_to_language() {
        let pack = LanguagePack::from_yaml(
            "language: zig\nsources:\n  - {name: a, type: repository, url: u}\n",
        )
        .unwrap();
        assert_eq!(pack.display_name, "zig");
    }

    #[test]
    fn test_invalid_packs() {
        let cases = [
            "language: ''\nsources:\n  - {name: a, type: git, url: u}\n",
            "language: go\nsources: []\n",
            "language: go\nsources:\n  - {name: '', type: git, url: u}\n",
            "language: go\nsources:\n  - {name: a, type: git, url: ''}\n",
            "language: go\nsources:\n  - {name: a, type: git, url: u}\n  - {name: a, type: web, url: v}\n",
        ];
        for case in cases {
            let err = LanguagePack::from_yaml(case).unwrap_err();
            assert!(matches!(err, Error::Config(_)), "{}: {:?}", case, err);
        }

        let bad_type = LanguagePack::from_yaml(
            "language: go\nsources:\n  - {name: a, type: ftp, url: u}\n",
        );
        assert!(bad_type.is_err());
    }

    #[test]
    fn test_select_sources() {
        let pack = LanguagePack::from_yaml(PACK).unwrap();
        assert_eq!(pack.select_sources(None).unwrap().len(), 3);
        assert_eq!(
            pack.select_sources(Some("go-blog")).unwrap()[0].url,
            "https://go.dev/blog"
        );
        assert!(pack.select_sources(Some("nope")).unwrap_err().is_not_found());
    }

    #[test]
    fn test_bundled_go_pack() {
        let path = Path::new(env!("CARGO_MANIFEST_DIR")).join("langpacks/go.yaml");
        let pack = LanguagePack::load(&path).unwrap();
        assert_eq!(pack.language, "go");
        for name in ["go-wiki", "uber-style-guide", "learn-go-with-tests"] {
            assert!(pack.sources.iter().any(|s| s.name == name), "{}", name);
        }
    }
}
