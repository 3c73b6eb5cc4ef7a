//! The closed set of change actions a client can submit.

use serde::{Deserialize, Serialize};
use shelfsync_model::Collection;
use std::fmt;
use std::str::FromStr;

use crate::error::ProtocolError;

/// Broad category of an action, which decides how it is applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ActionKind {
    /// Parse the payload and append the entity.
    Add,
    /// Remove the entity named by `isarId`.
    Remove,
    /// Empty a whole collection.
    Clear,
    /// Overwrite the entity named by `isarId`, subject to the staleness check.
    Update,
}

/// A change action submitted in an incremental sync batch.
///
/// Wire names are the SCREAMING_SNAKE_CASE strings used by clients
/// (`"ADD_ITEM"`, `"RENAME_CATEGORY"`, ...).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ActionType {
    /// Add a manga.
    AddItem,
    /// Remove a manga and everything referencing it.
    RemoveItem,
    /// Overwrite a manga.
    UpdateItem,
    /// Add a category.
    AddCategory,
    /// Remove a category.
    RemoveCategory,
    /// Overwrite a category (rename).
    RenameCategory,
    /// Add a chapter.
    AddChapter,
    /// Remove a chapter.
    RemoveChapter,
    /// Overwrite a chapter.
    UpdateChapter,
    /// Empty the history.
    ClearHistory,
    /// Add a history row.
    AddHistory,
    /// Remove a history row and the manga it belongs to.
    RemoveHistory,
    /// Overwrite a history row.
    UpdateHistory,
    /// Empty the feed.
    ClearUpdates,
    /// Add a feed item.
    AddUpdate,
    /// Remove all extensions and their preferences.
    ClearExtension,
    /// Add an extension.
    AddExtension,
    /// Remove an extension.
    RemoveExtension,
    /// Overwrite an extension.
    UpdateExtension,
    /// Add a tracker link.
    AddTrack,
    /// Remove a tracker link.
    RemoveTrack,
    /// Overwrite a tracker link.
    UpdateTrack,
}

impl ActionType {
    /// Every action, in wire-definition order.
    pub const ALL: [ActionType; 22] = [
        ActionType::AddItem,
        ActionType::RemoveItem,
        ActionType::UpdateItem,
        ActionType::AddCategory,
        ActionType::RemoveCategory,
        ActionType::RenameCategory,
        ActionType::AddChapter,
        ActionType::RemoveChapter,
        ActionType::UpdateChapter,
        ActionType::ClearHistory,
        ActionType::AddHistory,
        ActionType::RemoveHistory,
        ActionType::UpdateHistory,
        ActionType::ClearUpdates,
        ActionType::AddUpdate,
        ActionType::ClearExtension,
        ActionType::AddExtension,
        ActionType::RemoveExtension,
        ActionType::UpdateExtension,
        ActionType::AddTrack,
        ActionType::RemoveTrack,
        ActionType::UpdateTrack,
    ];

    /// Returns the wire name.
    pub fn as_str(&self) -> &'static str {
        match self {
            ActionType::AddItem => "ADD_ITEM",
            ActionType::RemoveItem => "REMOVE_ITEM",
            ActionType::UpdateItem => "UPDATE_ITEM",
            ActionType::AddCategory => "ADD_CATEGORY",
            ActionType::RemoveCategory => "REMOVE_CATEGORY",
            ActionType::RenameCategory => "RENAME_CATEGORY",
            ActionType::AddChapter => "ADD_CHAPTER",
            ActionType::RemoveChapter => "REMOVE_CHAPTER",
            ActionType::UpdateChapter => "UPDATE_CHAPTER",
            ActionType::ClearHistory => "CLEAR_HISTORY",
            ActionType::AddHistory => "ADD_HISTORY",
            ActionType::RemoveHistory => "REMOVE_HISTORY",
            ActionType::UpdateHistory => "UPDATE_HISTORY",
            ActionType::ClearUpdates => "CLEAR_UPDATES",
            ActionType::AddUpdate => "ADD_UPDATE",
            ActionType::ClearExtension => "CLEAR_EXTENSION",
            ActionType::AddExtension => "ADD_EXTENSION",
            ActionType::RemoveExtension => "REMOVE_EXTENSION",
            ActionType::UpdateExtension => "UPDATE_EXTENSION",
            ActionType::AddTrack => "ADD_TRACK",
            ActionType::RemoveTrack => "REMOVE_TRACK",
            ActionType::UpdateTrack => "UPDATE_TRACK",
        }
    }

    /// Parses a wire name, returning `None` for unknown actions.
    pub fn parse(name: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|a| a.as_str() == name)
    }

    /// Returns how the action is applied.
    pub fn kind(&self) -> ActionKind {
        match self {
            ActionType::AddItem
            | ActionType::AddCategory
            | ActionType::AddChapter
            | ActionType::AddHistory
            | ActionType::AddUpdate
            | ActionType::AddExtension
            | ActionType::AddTrack => ActionKind::Add,
            ActionType::RemoveItem
            | ActionType::RemoveCategory
            | ActionType::RemoveChapter
            | ActionType::RemoveHistory
            | ActionType::RemoveExtension
            | ActionType::RemoveTrack => ActionKind::Remove,
            ActionType::ClearHistory | ActionType::ClearUpdates | ActionType::ClearExtension => {
                ActionKind::Clear
            }
            ActionType::UpdateItem
            | ActionType::RenameCategory
            | ActionType::UpdateChapter
            | ActionType::UpdateHistory
            | ActionType::UpdateExtension
            | ActionType::UpdateTrack => ActionKind::Update,
        }
    }

    /// Returns the document collection the action targets.
    pub fn collection(&self) -> Collection {
        match self {
            ActionType::AddItem | ActionType::RemoveItem | ActionType::UpdateItem => {
                Collection::Manga
            }
            ActionType::AddCategory | ActionType::RemoveCategory | ActionType::RenameCategory => {
                Collection::Categories
            }
            ActionType::AddChapter | ActionType::RemoveChapter | ActionType::UpdateChapter => {
                Collection::Chapters
            }
            ActionType::ClearHistory
            | ActionType::AddHistory
            | ActionType::RemoveHistory
            | ActionType::UpdateHistory => Collection::History,
            ActionType::ClearUpdates | ActionType::AddUpdate => Collection::Updates,
            ActionType::ClearExtension
            | ActionType::AddExtension
            | ActionType::RemoveExtension
            | ActionType::UpdateExtension => Collection::Extensions,
            ActionType::AddTrack | ActionType::RemoveTrack | ActionType::UpdateTrack => {
                Collection::Tracks
            }
        }
    }
}

impl fmt::Display for ActionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ActionType {
    type Err = ProtocolError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s).ok_or_else(|| ProtocolError::UnknownAction(s.to_string()))
    }
}
