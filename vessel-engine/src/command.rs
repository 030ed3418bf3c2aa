use std::collections::HashMap;

use tracing::debug;

use crate::chains::{ChainDefaults, EndCapChain, EndCapPosition, ShellChain};
use crate::host::{HostEngine, Session};
use crate::segments::{EndCapAlignment, FlipOutcome, Segment};
use crate::warnings::WarningService;

#[derive(Debug, Clone)]
pub struct CommandRequest {
    pub name: String,
    pub args: Vec<String>,
}

impl CommandRequest {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            args: Vec::new(),
        }
    }

    pub fn with_arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }
}

#[derive(Debug, Clone)]
pub struct CommandResponse {
    pub success: bool,
    pub message: Option<String>,
}

impl CommandResponse {
    pub fn ok(message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: Some(message.into()),
        }
    }

    pub fn err(message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: Some(message.into()),
        }
    }
}

pub trait CommandHandler: Send + Sync {
    fn name(&self) -> &'static str;
    fn execute(
        &self,
        request: &CommandRequest,
        context: &mut CommandContext<'_>,
    ) -> CommandResponse;
}

pub struct CommandContext<'a> {
    pub host: &'a mut dyn HostEngine,
    pub warnings: &'a mut WarningService,
    pub defaults: &'a ChainDefaults,
}

impl<'a> CommandContext<'a> {
    pub fn new(
        host: &'a mut dyn HostEngine,
        warnings: &'a mut WarningService,
        defaults: &'a ChainDefaults,
    ) -> Self {
        Self {
            host,
            warnings,
            defaults,
        }
    }

    fn session(&mut self) -> Session<'_> {
        Session::new(&mut *self.host, &mut *self.warnings)
    }
}

pub struct CommandBus {
    handlers: HashMap<&'static str, Box<dyn CommandHandler>>,
}

impl Default for CommandBus {
    fn default() -> Self {
        Self::new()
    }
}

impl CommandBus {
    pub fn new() -> Self {
        let mut bus = Self {
            handlers: HashMap::new(),
        };
        bus.register(SetShellCountCommand);
        bus.register(AddShellCommand);
        bus.register(RemoveShellCommand);
        bus.register(SetEndCapCountCommand);
        bus.register(FlipEndCapCommand);
        bus
    }

    pub fn register<H: CommandHandler + 'static>(&mut self, handler: H) {
        self.handlers.insert(handler.name(), Box::new(handler));
    }

    pub fn dispatch(
        &self,
        request: &CommandRequest,
        context: &mut CommandContext<'_>,
    ) -> CommandResponse {
        if let Some(handler) = self.handlers.get(request.name.as_str()) {
            debug!(command = %request.name, args = ?request.args, "执行命令");
            handler.execute(request, context)
        } else {
            CommandResponse::err(format!("未知命令: {}", request.name))
        }
    }

    pub fn available_commands(&self) -> impl Iterator<Item = &&'static str> {
        self.handlers.keys()
    }
}

fn count_arg(request: &CommandRequest) -> Result<usize, CommandResponse> {
    let Some(raw) = request.args.first() else {
        return Err(CommandResponse::err(format!("{} 需要提供数量", request.name)));
    };
    raw.parse()
        .map_err(|_| CommandResponse::err(format!("无效的数量：{raw}")))
}

fn length_arg(request: &CommandRequest, index: usize, default: f64) -> Result<f64, CommandResponse> {
    match request.args.get(index) {
        None => Ok(default),
        Some(raw) => match raw.parse::<f64>() {
            Ok(value) if value.is_finite() && value > 0.0 => Ok(value),
            _ => Err(CommandResponse::err(format!("无效的长度：{raw}"))),
        },
    }
}

fn alignment_arg(
    request: &CommandRequest,
    index: usize,
    default: EndCapAlignment,
) -> Result<EndCapAlignment, CommandResponse> {
    request
        .args
        .get(index)
        .map_or(Ok(default), |raw| raw.parse().map_err(CommandResponse::err))
}

fn rehydrate_shells(context: &mut CommandContext<'_>) -> Result<ShellChain, CommandResponse> {
    ShellChain::rehydrate(&mut context.session())
        .map_err(|err| CommandResponse::err(format!("无法读取壳体链：{err}")))
}

fn rehydrate_end_caps(context: &mut CommandContext<'_>) -> Result<EndCapChain, CommandResponse> {
    EndCapChain::rehydrate(&mut context.session())
        .map_err(|err| CommandResponse::err(format!("无法读取端盖链：{err}")))
}

/// `set_shell_count <数量> [长度]`
struct SetShellCountCommand;

impl CommandHandler for SetShellCountCommand {
    fn name(&self) -> &'static str {
        "set_shell_count"
    }

    fn execute(
        &self,
        request: &CommandRequest,
        context: &mut CommandContext<'_>,
    ) -> CommandResponse {
        let (target, length) = match (
            count_arg(request),
            length_arg(request, 1, context.defaults.shell_length),
        ) {
            (Ok(target), Ok(length)) => (target, length),
            (Err(response), _) | (_, Err(response)) => return response,
        };
        let mut chain = match rehydrate_shells(context) {
            Ok(chain) => chain,
            Err(response) => return response,
        };
        if chain.set_count(&mut context.session(), target, length) {
            CommandResponse::ok(format!("圆柱壳体数量：{}", chain.len()))
        } else {
            CommandResponse::err(format!("圆柱壳体数量调整中止，当前 {} 个", chain.len()))
        }
    }
}

/// `add_shell [长度]`
struct AddShellCommand;

impl CommandHandler for AddShellCommand {
    fn name(&self) -> &'static str {
        "add_shell"
    }

    fn execute(
        &self,
        request: &CommandRequest,
        context: &mut CommandContext<'_>,
    ) -> CommandResponse {
        let length = match length_arg(request, 0, context.defaults.shell_length) {
            Ok(length) => length,
            Err(response) => return response,
        };
        let mut chain = match rehydrate_shells(context) {
            Ok(chain) => chain,
            Err(response) => return response,
        };
        match chain.add(&mut context.session(), length) {
            Ok(segment) => CommandResponse::ok(format!("已添加 {}", segment.component())),
            Err(err) => CommandResponse::err(format!("添加圆柱壳体失败：{err}")),
        }
    }
}

/// `remove_shell [序号]`，不带序号时移除链尾。
struct RemoveShellCommand;

impl CommandHandler for RemoveShellCommand {
    fn name(&self) -> &'static str {
        "remove_shell"
    }

    fn execute(
        &self,
        request: &CommandRequest,
        context: &mut CommandContext<'_>,
    ) -> CommandResponse {
        let index = match request.args.first().map(|raw| raw.parse::<usize>()) {
            None => None,
            Some(Ok(index)) => Some(index),
            Some(Err(_)) => return CommandResponse::err("无效的壳体序号"),
        };
        let mut chain = match rehydrate_shells(context) {
            Ok(chain) => chain,
            Err(response) => return response,
        };
        let removed = match index {
            Some(index) => chain.remove_at(&mut context.session(), index),
            None => chain.remove(&mut context.session()),
        };
        if removed {
            CommandResponse::ok(format!("圆柱壳体数量：{}", chain.len()))
        } else {
            CommandResponse::err("没有移除任何圆柱壳体")
        }
    }
}

/// `set_end_cap_count <数量> [left|right] [距离] [模板零件]`
struct SetEndCapCountCommand;

impl CommandHandler for SetEndCapCountCommand {
    fn name(&self) -> &'static str {
        "set_end_cap_count"
    }

    fn execute(
        &self,
        request: &CommandRequest,
        context: &mut CommandContext<'_>,
    ) -> CommandResponse {
        let defaults = *context.defaults;
        let parsed = count_arg(request).and_then(|target| {
            let alignment = alignment_arg(request, 1, defaults.end_cap_alignment)?;
            let distance = length_arg(request, 2, defaults.end_cap_distance)?;
            Ok((target, alignment, distance))
        });
        let (target, alignment, distance) = match parsed {
            Ok(parsed) => parsed,
            Err(response) => return response,
        };
        let mut chain = match rehydrate_end_caps(context) {
            Ok(chain) => chain,
            Err(response) => return response,
        };
        if let Some(template) = request.args.get(3) {
            chain = chain.with_template(template.as_str());
        }
        if chain.set_count(&mut context.session(), target, alignment, distance) {
            CommandResponse::ok(format!("中间端盖数量：{}", chain.interior().len()))
        } else {
            CommandResponse::err(format!(
                "中间端盖数量调整中止，当前 {} 个",
                chain.interior().len()
            ))
        }
    }
}

/// `flip_end_cap <left|right|序号>`
struct FlipEndCapCommand;

impl CommandHandler for FlipEndCapCommand {
    fn name(&self) -> &'static str {
        "flip_end_cap"
    }

    fn execute(
        &self,
        request: &CommandRequest,
        context: &mut CommandContext<'_>,
    ) -> CommandResponse {
        let Some(raw) = request.args.first() else {
            return CommandResponse::err("flip_end_cap 需要指定端盖位置");
        };
        let position = match raw.parse::<EndCapPosition>() {
            Ok(position) => position,
            Err(message) => return CommandResponse::err(message),
        };
        let mut chain = match rehydrate_end_caps(context) {
            Ok(chain) => chain,
            Err(response) => return response,
        };
        let Some(segment) = chain.get_mut(position) else {
            return CommandResponse::err(format!("找不到端盖：{raw}"));
        };
        match segment.change_alignment(&mut context.session()) {
            FlipOutcome::Flipped => CommandResponse::ok(format!("已翻转 {}", segment.component())),
            FlipOutcome::Unchanged => CommandResponse::ok(format!("{} 无需翻转", segment.component())),
            FlipOutcome::Indeterminate { failed, .. } => CommandResponse::err(format!(
                "{} 翻转在 {failed:?} 步骤中止，请检查朝向",
                segment.component()
            )),
            FlipOutcome::Unresolved => {
                CommandResponse::err(format!("无法读取 {} 的朝向", segment.component()))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scene::Scene;

    const SHELL_PATH: &str = "C:/parts/Cylindrical Shell.SLDPRT";
    const END_CAP_PATH: &str = "C:/parts/End Cap.SLDPRT";

    #[test]
    fn unknown_command_is_rejected() {
        let mut scene = Scene::new();
        let mut warnings = WarningService::new();
        let defaults = ChainDefaults::default();
        let bus = CommandBus::new();
        let mut context = CommandContext::new(&mut scene, &mut warnings, &defaults);

        let response = bus.dispatch(&CommandRequest::new("explode"), &mut context);
        assert!(!response.success);
        assert_eq!(response.message.as_deref(), Some("未知命令: explode"));
        assert_eq!(bus.available_commands().count(), 5);
    }

    #[test]
    fn shell_commands_grow_and_shrink_chain() {
        let mut scene = Scene::new();
        scene.populate_shell_demo(SHELL_PATH, 2.0).expect("demo");
        let mut warnings = WarningService::new();
        let defaults = ChainDefaults::default();
        let bus = CommandBus::new();
        let mut context = CommandContext::new(&mut scene, &mut warnings, &defaults);

        let response = bus.dispatch(
            &CommandRequest::new("set_shell_count").with_arg("3"),
            &mut context,
        );
        assert!(response.success, "{:?}", response.message);
        assert_eq!(response.message.as_deref(), Some("圆柱壳体数量：3"));

        let response = bus.dispatch(&CommandRequest::new("add_shell").with_arg("0.5"), &mut context);
        assert_eq!(response.message.as_deref(), Some("已添加 Cylindrical Shell 4"));

        let response = bus.dispatch(
            &CommandRequest::new("remove_shell").with_arg("2"),
            &mut context,
        );
        assert!(response.success, "{:?}", response.message);
        assert_eq!(context.host.top_level_components().len(), 3);
        assert!(context.warnings.is_error_free());
    }

    #[test]
    fn bad_arguments_do_not_touch_document() {
        let mut scene = Scene::new();
        scene.populate_shell_demo(SHELL_PATH, 2.0).expect("demo");
        let mut warnings = WarningService::new();
        let defaults = ChainDefaults::default();
        let bus = CommandBus::new();
        let mut context = CommandContext::new(&mut scene, &mut warnings, &defaults);

        for request in [
            CommandRequest::new("set_shell_count"),
            CommandRequest::new("set_shell_count").with_arg("many"),
            CommandRequest::new("add_shell").with_arg("-1"),
            CommandRequest::new("flip_end_cap"),
        ] {
            assert!(!bus.dispatch(&request, &mut context).success);
        }
        assert_eq!(context.host.top_level_components().len(), 1);
    }

    #[test]
    fn end_cap_commands_set_count_and_flip() {
        let mut scene = Scene::new();
        scene.populate_end_cap_demo(END_CAP_PATH, 1.2).expect("demo");
        let mut warnings = WarningService::new();
        let defaults = ChainDefaults::default();
        let bus = CommandBus::new();
        let mut context = CommandContext::new(&mut scene, &mut warnings, &defaults);

        let response = bus.dispatch(
            &CommandRequest::new("set_end_cap_count")
                .with_arg("2")
                .with_arg("left")
                .with_arg("0.6"),
            &mut context,
        );
        assert!(response.success, "{:?}", response.message);

        let response = bus.dispatch(&CommandRequest::new("flip_end_cap").with_arg("1"), &mut context);
        assert_eq!(response.message.as_deref(), Some("已翻转 Compartment End 2"));

        let response = bus.dispatch(&CommandRequest::new("flip_end_cap").with_arg("7"), &mut context);
        assert!(!response.success);
        assert!(context.warnings.is_error_free());
    }

    #[test]
    fn end_cap_count_accepts_template_override() {
        let mut scene = Scene::new();
        scene.populate_end_cap_demo(END_CAP_PATH, 1.2).expect("demo");
        let mut warnings = WarningService::new();
        let defaults = ChainDefaults::default();
        let bus = CommandBus::new();
        let mut context = CommandContext::new(&mut scene, &mut warnings, &defaults);

        let request = |template: &str| {
            CommandRequest::new("set_end_cap_count")
                .with_arg("1")
                .with_arg("right")
                .with_arg("1.0")
                .with_arg(template)
        };
        let response = bus.dispatch(&request("C:/parts/Missing.SLDPRT"), &mut context);
        assert!(!response.success);
        assert_eq!(context.host.top_level_components().len(), 2);
        assert!(context.host.find_feature("Compartment End 1 Position Plane").is_none());
        assert_eq!(context.warnings.errors().len(), 1);
        context.warnings.clear();

        let response = bus.dispatch(&request(END_CAP_PATH), &mut context);
        assert!(response.success, "{:?}", response.message);
        assert_eq!(response.message.as_deref(), Some("中间端盖数量：1"));
        assert_eq!(context.host.top_level_components().len(), 3);
    }

    #[test]
    fn end_cap_command_reports_missing_document() {
        let mut scene = Scene::without_document();
        let mut warnings = WarningService::new();
        let defaults = ChainDefaults::default();
        let bus = CommandBus::new();
        let mut context = CommandContext::new(&mut scene, &mut warnings, &defaults);

        let response = bus.dispatch(
            &CommandRequest::new("set_end_cap_count").with_arg("1"),
            &mut context,
        );
        assert!(!response.success);
        assert!(context.warnings.has_errors());
    }
}
