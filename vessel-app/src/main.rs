use std::path::PathBuf;

use tracing::{error, info, warn};
use tracing_subscriber::{EnvFilter, fmt};
use vessel_config::{AppConfig, ConfigError};

mod demo;

use demo::DemoTargets;

fn main() {
    let mut args = std::env::args().skip(1);
    let mut config_override: Option<PathBuf> = None;
    let mut shells: Option<usize> = None;
    let mut end_caps: Option<usize> = None;

    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--config" => {
                let Some(path) = args.next() else {
                    eprintln!("`--config` 需要提供配置文件路径");
                    std::process::exit(1);
                };
                config_override = Some(PathBuf::from(path));
            }
            "--shells" => shells = Some(count_argument(&arg, args.next())),
            "--end-caps" => end_caps = Some(count_argument(&arg, args.next())),
            other => {
                eprintln!("未知参数：{other}");
                std::process::exit(1);
            }
        }
    }

    let config = load_configuration(config_override);
    init_logging(&config);
    info!("启动容器装配自动化演示");

    let defaults = DemoTargets::from_config(&config);
    let targets = DemoTargets {
        shells: shells.unwrap_or(defaults.shells),
        end_caps: end_caps.unwrap_or(defaults.end_caps),
    };
    if let Err(err) = demo::run_demo(&config, targets) {
        error!(error = %err, "执行演示失败");
        std::process::exit(1);
    }
}

fn count_argument(flag: &str, value: Option<String>) -> usize {
    let Some(value) = value else {
        eprintln!("`{flag}` 需要提供数量");
        std::process::exit(1);
    };
    value.parse().unwrap_or_else(|_| {
        eprintln!("`{flag}` 的数量无效：{value}");
        std::process::exit(1);
    })
}

fn load_configuration(override_path: Option<PathBuf>) -> AppConfig {
    match override_path {
        Some(path) => AppConfig::from_file(&path).unwrap_or_else(|err| {
            warn!(path = %path.display(), error = %err, "加载指定配置失败，使用默认配置");
            AppConfig::default()
        }),
        None => match AppConfig::discover() {
            Ok(cfg) => cfg,
            Err(err) => {
                match &err {
                    ConfigError::Io { path, .. } | ConfigError::Parse { path, .. } => {
                        warn!(path = %path.display(), error = %err, "加载默认配置失败，使用内建默认值");
                    }
                    ConfigError::Context { .. } => {
                        warn!(error = %err, "加载默认配置失败，使用内建默认值");
                    }
                }
                AppConfig::default()
            }
        },
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
