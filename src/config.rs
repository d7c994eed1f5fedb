//! Configuração de site do ecfjob carregada a partir de `ecfjob.toml`.
//!
//! A struct [`SiteConfig`] contém as raízes de sistema de arquivos, a
//! localização do `ecflow_client`, o layout do arquivo de drop e os valores
//! de placeholder que o passe de template do agendador produz.
//! Valores não presentes no arquivo usam defaults do site de produção.
//! A variável de ambiente `ECFLOW_CLIENT` tem precedência sobre o arquivo.

use anyhow::{Context, Result, bail};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use crate::envir::Environment;

/// Nome do arquivo procurado no diretório atual.
pub const CONFIG_FILE: &str = "ecfjob.toml";

/// Configuração de nível superior carregada de `ecfjob.toml`.
#[derive(Debug, Clone, Deserialize)]
pub struct SiteConfig {
    /// Tier usado quando nem `--envir` nem `$envir` estão definidos.
    #[serde(default = "default_envir")]
    pub default_envir: String,

    /// Raiz do prod_util quando `$UTILROOT` não vem do ambiente.
    #[serde(default = "default_util_root")]
    pub util_root: String,

    /// Raiz COM operacional usada pelo tier `eval` quando `$COMROOT` falta.
    #[serde(default = "default_com_root")]
    pub com_root: String,

    /// Caminho explícito do `ecflow_client`.
    #[serde(default)]
    pub client: Option<String>,

    /// Diretórios consultados depois do `PATH` para achar o cliente.
    #[serde(default)]
    pub client_search_dirs: Vec<PathBuf>,

    #[serde(default)]
    pub drop: DropConfig,

    #[serde(default)]
    pub model: ModelConfig,

    #[serde(default)]
    pub placeholders: Placeholders,

    /// Exports fixos do site (PARA_CONFIG, gfs_ver, HOMEgfs...), aplicados por último.
    #[serde(default)]
    pub exports: BTreeMap<String, String>,
}

/// Localização do arquivo de drop lido pelo post-exec do LSF.
#[derive(Debug, Clone, Deserialize)]
pub struct DropConfig {
    /// Existe apenas nos nós IBM iDataPlex.
    #[serde(default = "default_lsf_dir")]
    pub lsf_dir: PathBuf,

    /// Diretório usado nos nós Cray XC40.
    #[serde(default = "default_tmpfs_dir")]
    pub tmpfs_dir: PathBuf,

    #[serde(default = "default_drop_prefix")]
    pub prefix: String,
}

/// Arquivo de versões do modelo (`<versions_dir>/<name>.ver`).
#[derive(Debug, Clone, Deserialize)]
pub struct ModelConfig {
    /// Nome do modelo; `$model` no ambiente tem precedência.
    #[serde(default)]
    pub name: Option<String>,

    #[serde(default = "default_versions_dir")]
    pub versions_dir: PathBuf,
}

/// Valores `%NAME%` resolvidos pelo agendador antes do job rodar.
///
/// Cada campo é opcional; vazio equivale a ausente.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub struct Placeholders {
    #[serde(default)]
    pub emcpen: Option<String>,
    #[serde(default)]
    pub senddbn: Option<String>,
    #[serde(default)]
    pub senddbn_ntc: Option<String>,
    #[serde(default)]
    pub pdy: Option<String>,
    #[serde(default)]
    pub compath: Option<String>,
    #[serde(default)]
    pub mailto: Option<String>,
    #[serde(default)]
    pub dbnlog: Option<String>,
}

impl Placeholders {
    // Placeholder vazio (`%PDY:%`) conta como não definido.
    pub fn non_empty(value: &Option<String>) -> Option<&str> {
        value.as_deref().map(str::trim).filter(|v| !v.is_empty())
    }
}

fn default_envir() -> String {
    "prod".to_string()
}

fn default_util_root() -> String {
    "/gpfs/hps/nco/ops/nwprod/prod_util.v1.0.0".to_string()
}

fn default_com_root() -> String {
    "/gpfs/hps/nco/ops/com".to_string()
}

fn default_lsf_dir() -> PathBuf {
    PathBuf::from("/var/lsf")
}

fn default_tmpfs_dir() -> PathBuf {
    PathBuf::from("/gpfs/hps/tmpfs/ecflow")
}

fn default_drop_prefix() -> String {
    "ecflow_post_in.".to_string()
}

fn default_versions_dir() -> PathBuf {
    PathBuf::from("/gpfs/hps/nco/ops/nwprod/versions")
}

impl Default for DropConfig {
    fn default() -> Self {
        Self {
            lsf_dir: default_lsf_dir(),
            tmpfs_dir: default_tmpfs_dir(),
            prefix: default_drop_prefix(),
        }
    }
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            name: None,
            versions_dir: default_versions_dir(),
        }
    }
}

impl Default for SiteConfig {
    fn default() -> Self {
        Self {
            default_envir: default_envir(),
            util_root: default_util_root(),
            com_root: default_com_root(),
            client: None,
            client_search_dirs: Vec::new(),
            drop: DropConfig::default(),
            model: ModelConfig::default(),
            placeholders: Placeholders::default(),
            exports: BTreeMap::new(),
        }
    }
}

impl SiteConfig {
    /// Carrega a configuração de `explicit`, `$ECFJOB_CONFIG` ou `ecfjob.toml`
    /// no diretório atual, nessa ordem.
    ///
    /// Um caminho explícito (flag ou variável) precisa existir; o arquivo do
    /// diretório atual é opcional e os defaults são usados na sua ausência.
    pub fn load(explicit: Option<&Path>, env: &Environment) -> Result<Self> {
        let chosen = explicit
            .map(Path::to_path_buf)
            .or_else(|| env.get("ECFJOB_CONFIG").map(PathBuf::from));

        let mut config = match chosen {
            Some(path) => {
                if !path.exists() {
                    bail!("config file {} does not exist", path.display());
                }
                Self::from_file(&path)?
            }
            None => {
                let local = Path::new(CONFIG_FILE);
                if local.exists() {
                    Self::from_file(local)?
                } else {
                    Self::default()
                }
            }
        };

        // Variável de ambiente tem precedência sobre o arquivo para o cliente.
        if let Some(client) = env.get("ECFLOW_CLIENT") {
            config.client = Some(client.to_string());
        }

        Ok(config)
    }

    fn from_file(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        let config = toml::from_str::<SiteConfig>(&contents)
            .with_context(|| format!("failed to parse {}", path.display()))?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_values() {
        let config = SiteConfig::default();
        assert_eq!(config.default_envir, "prod");
        assert_eq!(config.drop.lsf_dir, PathBuf::from("/var/lsf"));
        assert_eq!(config.drop.prefix, "ecflow_post_in.");
        assert!(config.client.is_none());
        assert!(config.model.name.is_none());
        assert!(config.exports.is_empty());
    }

    #[test]
    fn deserialize_partial_toml() {
        let toml_str = r#"
            default_envir = "para"

            [placeholders]
            EMCPEN = "mypen"
            PDY = ""

            [exports]
            gfs_ver = "v15.0.0"
        "#;
        let config: SiteConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(config.default_envir, "para");
        assert_eq!(config.placeholders.emcpen.as_deref(), Some("mypen"));
        assert_eq!(Placeholders::non_empty(&config.placeholders.pdy), None);
        assert_eq!(config.exports["gfs_ver"], "v15.0.0");
        assert_eq!(config.util_root, default_util_root());
        assert_eq!(config.drop.tmpfs_dir, default_tmpfs_dir());
    }

    #[test]
    fn example_config_parses() {
        let config: SiteConfig =
            toml::from_str(include_str!("../ecfjob.example.toml")).unwrap();
        assert_eq!(config.model.name.as_deref(), Some("gfs"));
        assert!(config.exports.contains_key("HOMEgfs"));
    }

    #[test]
    fn load_from_explicit_path_and_client_override() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("site.toml");
        std::fs::write(&path, "client = \"/opt/ecflow/bin/ecflow_client\"\n").unwrap();

        let env = Environment::from_pairs([("ECFLOW_CLIENT", "/usr/local/bin/ecflow_client")]);
        let config = SiteConfig::load(Some(&path), &env).unwrap();
        assert_eq!(config.client.as_deref(), Some("/usr/local/bin/ecflow_client"));

        let config = SiteConfig::load(Some(&path), &Environment::default()).unwrap();
        assert_eq!(config.client.as_deref(), Some("/opt/ecflow/bin/ecflow_client"));
    }

    #[test]
    fn load_from_env_variable() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("site.toml");
        std::fs::write(&path, "default_envir = \"test\"\n").unwrap();

        let env = Environment::from_pairs([("ECFJOB_CONFIG", path.to_str().unwrap())]);
        let config = SiteConfig::load(None, &env).unwrap();
        assert_eq!(config.default_envir, "test");
    }

    #[test]
    fn load_rejects_missing_explicit_path() {
        let result = SiteConfig::load(
            Some(Path::new("/definitely/not/here/ecfjob.toml")),
            &Environment::default(),
        );
        assert!(result.is_err());
    }
}
