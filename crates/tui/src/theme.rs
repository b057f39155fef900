//! Color palette for the timeline view.

use ratatui::style::{Color, Modifier, Style};
use threadview_core::model::{Role, ToolStatus};

pub struct Theme;

impl Theme {
    pub const USER: Color = Color::Cyan;
    pub const AGENT: Color = Color::White;
    pub const SYSTEM: Color = Color::DarkGray;
    pub const TOOL: Color = Color::Yellow;
    pub const TOOL_ERROR: Color = Color::Red;
    pub const TOOL_PENDING: Color = Color::DarkGray;
    pub const EVENT: Color = Color::Green;
    pub const COMPACTION: Color = Color::Magenta;
    pub const PLAN: Color = Color::Blue;
    pub const DIM: Color = Color::DarkGray;
    pub const STATUS_BAR: Color = Color::DarkGray;

    pub fn role(role: Role) -> Style {
        let color = match role {
            Role::User => Self::USER,
            Role::Agent => Self::AGENT,
            Role::System => Self::SYSTEM,
        };
        Style::default().fg(color).add_modifier(Modifier::BOLD)
    }

    pub fn tool(status: ToolStatus) -> Style {
        let color = match status {
            ToolStatus::Pending => Self::TOOL_PENDING,
            ToolStatus::Ok => Self::TOOL,
            ToolStatus::Error => Self::TOOL_ERROR,
        };
        Style::default().fg(color)
    }

    pub fn dim() -> Style {
        Style::default().fg(Self::DIM)
    }
}
