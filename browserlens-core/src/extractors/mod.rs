//! C3 — Extractors: produce a normalized `StateTree` from a page handle.
//! One submodule per representation kind, §4.3.

pub mod a11y;
pub mod dom;
pub mod hybrid;
pub mod vision;

use crate::config::SessionConfig;
use crate::error::Result;
use crate::model::{StateFlag, StateTree};
use crate::page::PageHandle;
use async_trait::async_trait;

#[async_trait]
pub trait Extractor: Send + Sync {
    async fn extract(&self, page: &dyn PageHandle, config: &SessionConfig) -> Result<StateTree>;
}

/// Maps a boolean accessibility property name to a `StateFlag`, shared by
/// the a11y and hybrid extractors.
pub(crate) fn parse_state_flag(name: &str) -> Option<StateFlag> {
    match name {
        "disabled" => Some(StateFlag::Disabled),
        "focused" => Some(StateFlag::Focused),
        "checked" => Some(StateFlag::Checked),
        "pressed" => Some(StateFlag::Pressed),
        "selected" => Some(StateFlag::Selected),
        "expanded" => Some(StateFlag::Expanded),
        "readonly" => Some(StateFlag::Readonly),
        "required" => Some(StateFlag::Required),
        "invalid" => Some(StateFlag::Invalid),
        "hidden" => Some(StateFlag::Hidden),
        _ => None,
    }
}
