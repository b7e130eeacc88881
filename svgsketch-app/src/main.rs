use std::path::PathBuf;

use svgsketch_config::{AppConfig, CONFIG_ENV_VAR, ConfigError, ConfigSource};
use tracing::{error, info, warn};
use tracing_subscriber::{EnvFilter, fmt};

fn main() {
    let (config_override, positional) = match split_arguments(std::env::args().skip(1)) {
        Ok(split) => split,
        Err(message) => {
            eprintln!("{message}");
            std::process::exit(2);
        }
    };

    let loaded = load_configuration(config_override);
    init_logging(&loaded.config);
    report_configuration(&loaded);
    info!("启动 svgsketch");

    let outcome = svgsketch_frontend::run(&positional, &loaded.config);
    if let Some(err) = &outcome.error {
        error!(error = %err, exit_code = outcome.exit_code, "运行失败");
    }
    std::process::exit(outcome.exit_code);
}

/// 已生效的配置，以及加载失败时被替换成默认值的原因。
struct LoadedConfig {
    config: AppConfig,
    source: ConfigSource,
    fallback: Option<ConfigError>,
}

/// 仅识别出现在最前面的 `--config <path>`，其余参数原样作为位置参数。
fn split_arguments(
    args: impl IntoIterator<Item = String>,
) -> Result<(Option<PathBuf>, Vec<String>), String> {
    let mut args = args.into_iter().peekable();
    let mut config_override = None;
    while args.peek().map(String::as_str) == Some("--config") {
        args.next();
        let Some(path) = args.next() else {
            return Err("`--config` 需要提供配置文件路径".to_string());
        };
        config_override = Some(PathBuf::from(path));
    }
    Ok((config_override, args.collect()))
}

fn load_configuration(override_path: Option<PathBuf>) -> LoadedConfig {
    let attempt = match override_path {
        Some(path) => AppConfig::from_file(&path).map(|cfg| (cfg, ConfigSource::Argument(path))),
        None => AppConfig::discover(),
    };
    match attempt {
        Ok((config, source)) => LoadedConfig {
            config,
            source,
            fallback: None,
        },
        Err(err) => LoadedConfig {
            config: AppConfig::default(),
            source: ConfigSource::BuiltIn,
            fallback: Some(err),
        },
    }
}

/// 日志初始化之后再输出配置来源。
fn report_configuration(loaded: &LoadedConfig) {
    if let Some(err) = &loaded.fallback {
        match err {
            ConfigError::Io { path, .. } | ConfigError::Parse { path, .. } => {
                warn!(path = %path.display(), error = %err, "加载配置失败，使用内建默认值");
            }
            ConfigError::Context { .. } => {
                warn!(error = %err, "加载配置失败，使用内建默认值");
            }
        }
        return;
    }
    match &loaded.source {
        ConfigSource::Argument(path) => info!(path = %path.display(), "使用 --config 指定的配置"),
        ConfigSource::Environment(path) => {
            info!(path = %path.display(), variable = CONFIG_ENV_VAR, "使用环境变量指定的配置");
        }
        ConfigSource::WorkingDirectory(path) => {
            info!(path = %path.display(), "使用工作目录下的配置");
        }
        ConfigSource::BuiltIn => info!("未找到配置文件，使用内建默认值"),
    }
}

fn init_logging(config: &AppConfig) {
    let filter =
        EnvFilter::try_new(config.logging.level.clone()).unwrap_or_else(|_| EnvFilter::new("info"));
    let subscriber = fmt().with_env_filter(filter);
    if subscriber.try_init().is_err() {
        // 已初始化，忽略
    }
}
