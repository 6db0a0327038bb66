//! 配置加载模块
//!
//! 从 YAML/JSON 文件加载 [`ControllerConfig`]，叠加 `XPOSER__*` 环境变量，
//! 最后应用命令行覆盖。

use anyhow::{anyhow, Context, Result};
use config::{Case, Config, Environment, File, FileFormat};
use std::path::Path;
use tracing::{info, warn};
use xposer_controller::ControllerConfig;

/// 默认配置文件路径
pub const DEFAULT_CONFIG_PATH: &str = "configs/config.yaml";

/// 环境变量前缀
const ENV_PREFIX: &str = "XPOSER";

/// 命令行覆盖项
#[derive(Debug, Default, Clone)]
pub struct Overrides {
    /// 监听的命名空间，空字符串表示全部
    pub namespace: Option<String>,
    /// 工作者数量
    pub workers: Option<usize>,
}

/// 加载配置
///
/// 未显式指定路径且默认文件不存在时使用内置默认值。
pub fn load(path: Option<&Path>, overrides: &Overrides) -> Result<ControllerConfig> {
    let (path, required) = match path {
        Some(path) => (path, true),
        None => (Path::new(DEFAULT_CONFIG_PATH), false),
    };
    if !required && !path.exists() {
        warn!("未找到配置文件 {:?}，使用默认配置", path);
    }

    let mut config = load_file(path, required)?;
    apply_overrides(&mut config, overrides);
    info!("已加载配置: {:?}", config);
    Ok(config)
}

/// 加载配置文件并叠加环境变量
fn load_file(path: &Path, required: bool) -> Result<ControllerConfig> {
    let config_file = path.to_str().ok_or_else(|| anyhow!("配置路径无效"))?;

    // 确定配置文件格式
    let format = match path.extension().and_then(|ext| ext.to_str()) {
        Some("yaml") | Some("yml") => FileFormat::Yaml,
        Some("json") => FileFormat::Json,
        _ => return Err(anyhow!("不支持的配置文件格式，仅支持 YAML 或 JSON")),
    };

    let config = Config::builder()
        .add_source(File::with_name(config_file).format(format).required(required))
        .add_source(
            Environment::with_prefix(ENV_PREFIX)
                .prefix_separator("__")
                .separator("__")
                .convert_case(Case::Camel)
                .try_parsing(true),
        )
        .build()
        .with_context(|| format!("无法加载配置文件: {:?}", path))?;

    config
        .try_deserialize::<ControllerConfig>()
        .context("配置格式错误")
}

/// 应用命令行覆盖
pub fn apply_overrides(config: &mut ControllerConfig, overrides: &Overrides) {
    if let Some(namespace) = &overrides.namespace {
        config.namespace_scope = namespace.trim().to_string();
    }
    if let Some(workers) = overrides.workers {
        config.worker_count = workers;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::Builder;

    fn write_config(suffix: &str, content: &str) -> tempfile::NamedTempFile {
        let mut file = Builder::new().suffix(suffix).tempfile().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file
    }

    #[test_log::test]
    fn test_load_yaml() {
        let file = write_config(
            ".yaml",
            "namespaceScope: team-a\nhostTemplate: \"{name}.{namespace}.apps.local\"\nworkerCount: 4\ntlsEnabledDefault: true\n",
        );

        let config = load(Some(file.path()), &Overrides::default()).unwrap();
        assert_eq!(config.namespace_scope, "team-a");
        assert_eq!(config.host_template, "{name}.{namespace}.apps.local");
        assert_eq!(config.worker_count, 4);
        assert!(config.tls_enabled_default);
        assert_eq!(config.expose_annotation_key, "xposer.stakater.com/expose");
    }

    #[test]
    fn test_load_json() {
        let file = write_config(".json", r#"{"domain": "apps.example.org", "maxRetries": 3}"#);

        let config = load(Some(file.path()), &Overrides::default()).unwrap();
        assert_eq!(config.domain, "apps.example.org");
        assert_eq!(config.max_retries, 3);
    }

    #[test]
    fn test_missing_explicit_file_is_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("missing.yaml");
        assert!(load(Some(&path), &Overrides::default()).is_err());
    }

    #[test]
    fn test_unsupported_format() {
        let file = write_config(".toml", "workerCount = 2\n");
        assert!(load(Some(file.path()), &Overrides::default()).is_err());
    }

    #[test]
    fn test_overrides() {
        let file = write_config(".yaml", "namespaceScope: team-a\nworkerCount: 4\n");
        let overrides = Overrides {
            namespace: Some(String::new()),
            workers: Some(8),
        };

        let config = load(Some(file.path()), &overrides).unwrap();
        assert!(config.watches_all_namespaces());
        assert_eq!(config.worker_count, 8);
    }
}
