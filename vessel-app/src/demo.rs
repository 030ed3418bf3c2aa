use tracing::{info, warn};
use vessel_config::{AlignmentSetting, AppConfig};
use vessel_engine::chains::{ChainDefaults, EndCapChain, ShellChain};
use vessel_engine::command::{CommandBus, CommandContext, CommandRequest};
use vessel_engine::errors::EngineError;
use vessel_engine::host::{HostEngine, Session};
use vessel_engine::scene::Scene;
use vessel_engine::segments::{EndCapAlignment, Segment};
use vessel_engine::warnings::WarningService;

/// 演示的目标数量。
#[derive(Debug, Clone, Copy)]
pub struct DemoTargets {
    pub shells: usize,
    pub end_caps: usize,
}

impl DemoTargets {
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            shells: config.defaults.shell_count,
            end_caps: config.defaults.end_cap_count,
        }
    }
}

pub fn chain_defaults(config: &AppConfig) -> ChainDefaults {
    ChainDefaults {
        shell_length: config.defaults.shell_length,
        end_cap_alignment: match config.defaults.end_cap_alignment {
            AlignmentSetting::Left => EndCapAlignment::Left,
            AlignmentSetting::Right => EndCapAlignment::Right,
        },
        end_cap_distance: config.defaults.end_cap_distance,
    }
}

/// 在内存宿主中分别搭建壳体链与端盖链，通过命令总线调整数量并打印概览。
pub fn run_demo(config: &AppConfig, targets: DemoTargets) -> Result<(), EngineError> {
    let defaults = chain_defaults(config);
    let bus = CommandBus::new();
    let mut commands: Vec<&str> = bus.available_commands().copied().collect();
    commands.sort_unstable();
    println!("支持的命令: {}", commands.join(", "));

    let mut shells = Scene::new();
    shells.populate_shell_demo(&config.templates.shell_path, defaults.shell_length)?;
    let mut warnings = WarningService::new();
    {
        let mut context = CommandContext::new(&mut shells, &mut warnings, &defaults);
        let request = CommandRequest::new("set_shell_count").with_arg(targets.shells.to_string());
        if let Err(err) = dispatch_cli_command(&bus, request, &mut context) {
            warn!("CLI 命令执行失败: {err}");
        }
    }
    print_shells(&mut shells, &mut warnings);
    print_warnings("壳体", &warnings);

    let mut end_caps = Scene::new();
    end_caps.populate_end_cap_demo(&config.templates.end_cap_path, defaults.end_cap_distance)?;
    let mut warnings = WarningService::new();
    {
        let mut context = CommandContext::new(&mut end_caps, &mut warnings, &defaults);
        let request =
            CommandRequest::new("set_end_cap_count").with_arg(targets.end_caps.to_string());
        if let Err(err) = dispatch_cli_command(&bus, request, &mut context) {
            warn!("CLI 命令执行失败: {err}");
        }
    }
    print_end_caps(&mut end_caps, &mut warnings);
    print_warnings("端盖", &warnings);
    Ok(())
}

fn print_shells(scene: &mut Scene, warnings: &mut WarningService) {
    let mut session = Session::new(scene, warnings);
    let chain = match ShellChain::rehydrate(&mut session) {
        Ok(chain) => chain,
        Err(err) => {
            warn!(error = %err, "无法读取壳体链");
            return;
        }
    };
    let host: &dyn HostEngine = &*session.host;
    info!(count = chain.len(), "壳体链统计");
    println!("{}：壳体链（{} 段）：", host.title(), chain.len());
    for segment in chain.segments() {
        let length = segment
            .length(host)
            .map_or_else(|| "?".to_string(), |length| format!("{length:.3}"));
        let joined = segment
            .lateral()
            .entities(host)
            .map_or_else(|| "?".to_string(), |[_, other]| other.to_string());
        println!(
            "  - {}，长度={length}，左端面接 {joined}",
            segment.component()
        );
    }
}

fn print_end_caps(scene: &mut Scene, warnings: &mut WarningService) {
    let mut session = Session::new(scene, warnings);
    let chain = match EndCapChain::rehydrate(&mut session) {
        Ok(chain) => chain,
        Err(err) => {
            warn!(error = %err, "无法读取端盖链");
            return;
        }
    };
    let host: &dyn HostEngine = &*session.host;
    info!(interior = chain.interior().len(), "端盖链统计");
    println!(
        "{}：端盖链（中间端盖 {} 个）：",
        host.title(),
        chain.interior().len()
    );
    let caps = std::iter::once(chain.left())
        .chain(chain.interior())
        .chain(std::iter::once(chain.right()));
    for cap in caps {
        let alignment = cap
            .alignment(host)
            .map_or_else(|| "?".to_string(), |alignment| alignment.to_string());
        let reference = cap
            .reference(host)
            .map_or_else(|| "?".to_string(), |reference| reference.to_string());
        let distance = cap.distance(host).unwrap_or_default();
        println!(
            "  - {}，朝向={alignment}，定位面参照 {reference}，距离={distance:.3}",
            cap.component()
        );
    }
}

fn print_warnings(label: &str, warnings: &WarningService) {
    if warnings.is_error_free() && warnings.warnings().is_empty() {
        println!("{label}：没有告警。");
        return;
    }
    for message in warnings.warnings() {
        println!("  [告警] {message}");
    }
    for message in warnings.errors() {
        println!("  [错误] {message}");
    }
}

fn dispatch_cli_command(
    bus: &CommandBus,
    request: CommandRequest,
    context: &mut CommandContext<'_>,
) -> Result<(), String> {
    let response = bus.dispatch(&request, context);
    if response.success {
        if let Some(message) = response.message {
            println!("[命令] {message}");
        }
        Ok(())
    } else {
        Err(response.message.unwrap_or_else(|| "未知错误".to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_alignment_maps_to_engine_alignment() {
        let mut config = AppConfig::default();
        config.defaults.end_cap_alignment = AlignmentSetting::Left;
        config.defaults.shell_length = 2.0;
        let defaults = chain_defaults(&config);
        assert_eq!(defaults.end_cap_alignment, EndCapAlignment::Left);
        assert_eq!(defaults.shell_length, 2.0);
    }

    #[test]
    fn demo_runs_with_defaults() {
        let config = AppConfig::default();
        let targets = DemoTargets {
            shells: 3,
            end_caps: 2,
        };
        run_demo(&config, targets).expect("demo should run");
    }
}
