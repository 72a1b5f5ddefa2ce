use std::collections::HashMap;

use homeplan_core::document::{EntityId, OpeningKind, OpeningRotation, TreeKind};
use homeplan_core::geometry::Point2;

use crate::selection::EntityKind;
use crate::session::EditorSession;

#[derive(Debug, Clone)]
pub struct CommandRequest {
    pub name: String,
    pub args: Vec<String>,
}

impl CommandRequest {
    pub fn new(name: impl Into<String>, args: &[&str]) -> Self {
        Self {
            name: name.into(),
            args: args.iter().map(|arg| arg.to_string()).collect(),
        }
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
    pub session: &'a mut EditorSession,
}

pub struct CommandBus {
    handlers: HashMap<&'static str, Box<dyn CommandHandler>>,
}

impl CommandBus {
    pub fn new() -> Self {
        let mut bus = Self {
            handlers: HashMap::new(),
        };
        bus.register(AddTreeCommand);
        bus.register(AddOpeningCommand);
        bus.register(AddSurfaceCommand);
        bus.register(ClearSelectionCommand);
        bus.register(BringToFrontCommand);
        bus.register(SetDiameterCommand);
        bus.register(SetWidthCommand);
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
            handler.execute(request, context)
        } else {
            CommandResponse::err(format!("未知命令: {}", request.name))
        }
    }

    pub fn available_commands(&self) -> impl Iterator<Item = &&'static str> {
        self.handlers.keys()
    }
}

impl Default for CommandBus {
    fn default() -> Self {
        Self::new()
    }
}

fn number(request: &CommandRequest, index: usize) -> Result<f64, CommandResponse> {
    let raw = request
        .args
        .get(index)
        .ok_or_else(|| CommandResponse::err(format!("{}: 缺少第 {} 个参数", request.name, index + 1)))?;
    raw.parse::<f64>()
        .ok()
        .filter(|value| value.is_finite())
        .ok_or_else(|| CommandResponse::err(format!("{}: 无法解析数值 {raw}", request.name)))
}

fn word<'a>(request: &'a CommandRequest, index: usize) -> Result<&'a str, CommandResponse> {
    request
        .args
        .get(index)
        .map(String::as_str)
        .ok_or_else(|| CommandResponse::err(format!("{}: 缺少第 {} 个参数", request.name, index + 1)))
}

fn parse_kind(raw: &str) -> Option<EntityKind> {
    EntityKind::ALL
        .into_iter()
        .find(|kind| kind.slot_name() == format!("active_{raw}_entity"))
}

/// `add_tree <conical|round|oval> <x> <y>`
struct AddTreeCommand;

impl CommandHandler for AddTreeCommand {
    fn name(&self) -> &'static str {
        "add_tree"
    }

    fn execute(
        &self,
        request: &CommandRequest,
        context: &mut CommandContext<'_>,
    ) -> CommandResponse {
        let parsed = word(request, 0).and_then(|kind| {
            let kind = TreeKind::parse(kind)
                .ok_or_else(|| CommandResponse::err(format!("未知树形: {kind}")))?;
            Ok((kind, number(request, 1)?, number(request, 2)?))
        });
        let (kind, x, y) = match parsed {
            Ok(parsed) => parsed,
            Err(response) => return response,
        };
        match context.session.add_tree(kind, x, y) {
            Ok(id) => CommandResponse::ok(format!("已添加树 {id}")),
            Err(err) => CommandResponse::err(err.to_string()),
        }
    }
}

/// `add_opening <empty|door|window> <x> <y> [horizontal|vertical]`
struct AddOpeningCommand;

impl CommandHandler for AddOpeningCommand {
    fn name(&self) -> &'static str {
        "add_opening"
    }

    fn execute(
        &self,
        request: &CommandRequest,
        context: &mut CommandContext<'_>,
    ) -> CommandResponse {
        let parsed = word(request, 0).and_then(|kind| {
            let kind = OpeningKind::parse(kind)
                .ok_or_else(|| CommandResponse::err(format!("未知开口类型: {kind}")))?;
            let rotation = match request.args.get(3).map(String::as_str) {
                None | Some("horizontal") => OpeningRotation::Horizontal,
                Some("vertical") => OpeningRotation::Vertical,
                Some(other) => {
                    return Err(CommandResponse::err(format!("未知开口方向: {other}")));
                }
            };
            Ok((kind, rotation, number(request, 1)?, number(request, 2)?))
        });
        let (kind, rotation, x, y) = match parsed {
            Ok(parsed) => parsed,
            Err(response) => return response,
        };
        match context.session.add_opening(kind, rotation, x, y) {
            Ok(id) => CommandResponse::ok(format!("已添加开口 {id}")),
            Err(err) => CommandResponse::err(err.to_string()),
        }
    }
}

/// `add_surface <x> <y> <width> <height>`：添加矩形区域。
struct AddSurfaceCommand;

impl CommandHandler for AddSurfaceCommand {
    fn name(&self) -> &'static str {
        "add_surface"
    }

    fn execute(
        &self,
        request: &CommandRequest,
        context: &mut CommandContext<'_>,
    ) -> CommandResponse {
        let parsed = (|| {
            Ok::<_, CommandResponse>((
                number(request, 0)?,
                number(request, 1)?,
                number(request, 2)?,
                number(request, 3)?,
            ))
        })();
        let (x, y, width, height) = match parsed {
            Ok(parsed) => parsed,
            Err(response) => return response,
        };
        let points = vec![
            Point2::new(0.0, 0.0),
            Point2::new(width, 0.0),
            Point2::new(width, height),
            Point2::new(0.0, height),
        ];
        match context.session.add_surface(x, y, points) {
            Ok(id) => CommandResponse::ok(format!("已添加区域 {id}")),
            Err(err) => CommandResponse::err(err.to_string()),
        }
    }
}

struct ClearSelectionCommand;

impl CommandHandler for ClearSelectionCommand {
    fn name(&self) -> &'static str {
        "clear_selection"
    }

    fn execute(
        &self,
        _request: &CommandRequest,
        context: &mut CommandContext<'_>,
    ) -> CommandResponse {
        match context.session.deactivate_all() {
            Ok(()) => CommandResponse::ok("选中已清空"),
            Err(err) => CommandResponse::err(err.to_string()),
        }
    }
}

/// `bring_to_front <kind> <id>`
struct BringToFrontCommand;

impl CommandHandler for BringToFrontCommand {
    fn name(&self) -> &'static str {
        "bring_to_front"
    }

    fn execute(
        &self,
        request: &CommandRequest,
        context: &mut CommandContext<'_>,
    ) -> CommandResponse {
        let parsed = word(request, 0).and_then(|kind| {
            let kind = parse_kind(kind)
                .ok_or_else(|| CommandResponse::err(format!("未知实体种类: {kind}")))?;
            Ok((kind, EntityId::new(word(request, 1)?)))
        });
        let (kind, id) = match parsed {
            Ok(parsed) => parsed,
            Err(response) => return response,
        };
        match context.session.bring_to_front(kind, &id) {
            Ok(()) => CommandResponse::ok(format!("{id} 已置顶")),
            Err(err) => CommandResponse::err(err.to_string()),
        }
    }
}

/// `set_diameter <tree-id> <diameter>`
struct SetDiameterCommand;

impl CommandHandler for SetDiameterCommand {
    fn name(&self) -> &'static str {
        "set_diameter"
    }

    fn execute(
        &self,
        request: &CommandRequest,
        context: &mut CommandContext<'_>,
    ) -> CommandResponse {
        let parsed = word(request, 0)
            .and_then(|id| Ok((EntityId::new(id), number(request, 1)?)));
        let (id, diameter) = match parsed {
            Ok(parsed) => parsed,
            Err(response) => return response,
        };
        match context.session.set_diameter(&id, diameter) {
            Ok(()) => CommandResponse::ok(format!("{id} 直径已更新")),
            Err(err) => CommandResponse::err(err.to_string()),
        }
    }
}

/// `set_width <opening-id> <width>`
struct SetWidthCommand;

impl CommandHandler for SetWidthCommand {
    fn name(&self) -> &'static str {
        "set_width"
    }

    fn execute(
        &self,
        request: &CommandRequest,
        context: &mut CommandContext<'_>,
    ) -> CommandResponse {
        let parsed = word(request, 0)
            .and_then(|id| Ok((EntityId::new(id), number(request, 1)?)));
        let (id, width) = match parsed {
            Ok(parsed) => parsed,
            Err(response) => return response,
        };
        match context.session.set_width(&id, width) {
            Ok(()) => CommandResponse::ok(format!("{id} 宽度已更新")),
            Err(err) => CommandResponse::err(err.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::demo::sample_home;
    use crate::session::EditorSettings;

    #[test]
    fn add_and_clear_commands_work() {
        let mut session =
            EditorSession::new(sample_home(), EditorSettings::default()).expect("session");
        let bus = CommandBus::new();
        let mut context = CommandContext {
            session: &mut session,
        };

        let add = CommandRequest::new("add_tree", &["oval", "120", "360"]);
        let response = bus.dispatch(&add, &mut context);
        assert!(response.success, "{:?}", response.message);
        assert!(context.session.selection().slot(EntityKind::Tree).is_some());

        let clear = CommandRequest::new("clear_selection", &[]);
        let response = bus.dispatch(&clear, &mut context);
        assert!(response.success);
        assert!(context.session.active().is_none());
    }

    #[test]
    fn set_width_resizes_added_opening() {
        let mut session =
            EditorSession::new(sample_home(), EditorSettings::default()).expect("session");
        let bus = CommandBus::new();
        let mut context = CommandContext {
            session: &mut session,
        };

        let add = CommandRequest::new("add_opening", &["window", "240", "240", "vertical"]);
        assert!(bus.dispatch(&add, &mut context).success);
        let id = context
            .session
            .active()
            .map(|active| active.id.clone())
            .expect("opening active");

        let resize = CommandRequest::new("set_width", &[id.as_str(), "60"]);
        assert!(bus.dispatch(&resize, &mut context).success);
        let opening = context.session.plan().groups[0]
            .openings
            .iter()
            .find(|opening| opening.opening_id == id)
            .expect("opening stored");
        assert_eq!(opening.width, 60.0);
    }

    #[test]
    fn malformed_arguments_are_reported() {
        let mut session =
            EditorSession::new(sample_home(), EditorSettings::default()).expect("session");
        let bus = CommandBus::new();
        let mut context = CommandContext {
            session: &mut session,
        };

        for request in [
            CommandRequest::new("add_tree", &["palm", "0", "0"]),
            CommandRequest::new("add_opening", &["door", "x", "0"]),
            CommandRequest::new("add_opening", &["door", "0", "0", "diagonal"]),
            CommandRequest::new("add_surface", &["0", "0", "10"]),
            CommandRequest::new("bring_to_front", &["tree", "missing"]),
            CommandRequest::new("set_width", &["missing", "48"]),
            CommandRequest::new("set_diameter", &["missing"]),
            CommandRequest::new("rotate", &[]),
        ] {
            let response = bus.dispatch(&request, &mut context);
            assert!(!response.success, "{} should fail", request.name);
        }
    }

    #[test]
    fn bring_to_front_accepts_slot_kinds() {
        assert_eq!(parse_kind("room"), Some(EntityKind::Room));
        assert_eq!(parse_kind("opening"), Some(EntityKind::Opening));
        assert_eq!(parse_kind("chair"), None);
    }
}
