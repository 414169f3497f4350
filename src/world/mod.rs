pub mod block;
pub mod events;
pub mod link;
pub mod sim;

pub use block::{required_tool, Tool, ToolClass};
pub use events::{Notification, Notifier, WorldEvent};
pub use link::{AgentState, ControlState, WorldLink};
pub use sim::SimWorld;
