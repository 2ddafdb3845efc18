//! Agent loop state machine
//!
//! Elm-style: a pure `transition` turns (state, event) into a new state plus
//! effects. The runtime performs the effects and feeds their outcomes back
//! in as events.

mod effect;
pub mod event;
pub mod state;
pub(crate) mod transition;


pub use effect::Effect;
pub use event::Event;
pub use state::{AgentContext, AgentState, ToolCall};
pub use transition::transition;
