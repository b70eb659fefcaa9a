//! Per-row editing state for the key table.
//!
//! The editor holds no connection to the store. Each transition returns a
//! [`RowEffect`] describing the write the caller should perform; a new row
//! only becomes a regular row once the caller reports it persisted.

use crate::error::{Error, Result};
use crate::keys::KeyUpdate;
use crate::model::KeyView;
use serde::Serialize;
use std::collections::BTreeMap;

pub const PLACEHOLDER_PREFIX: &str = "new-";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "language", rename_all = "snake_case")]
pub enum EditField {
    Key,
    Description,
    Translation(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NewRowField {
    Key,
    Description,
    BaseText,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NewKeyDraft {
    pub key: String,
    pub description: String,
    pub base_text: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RowState {
    Viewing,
    Editing {
        field: EditField,
        original: String,
        draft: String,
    },
    NewRow {
        placeholder_id: String,
        draft: NewKeyDraft,
    },
    /// Saving this base text would overwrite the listed translations.
    ConfirmAutoTranslate {
        draft: String,
        overwritten: Vec<String>,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RowEffect {
    None,
    Commit(KeyUpdate),
    /// Commit, then re-translate the key from its new base text.
    CommitAndTranslate(KeyUpdate),
    Create(NewKeyDraft),
    /// Drop the unsaved row from the table.
    Discard,
}

#[derive(Debug, Clone)]
pub struct RowEditor {
    id: String,
    base_language: String,
    key: String,
    description: String,
    translations: BTreeMap<String, String>,
    state: RowState,
}

fn invalid(action: &str, state: &RowState) -> Error {
    Error::Malformed(format!("cannot {} while {:?}", action, state))
}

impl RowEditor {
    /// Editor for a persisted key, starting in `Viewing`.
    pub fn for_key(view: &KeyView, base_language: &str) -> Self {
        Self {
            id: view.key.id.clone(),
            base_language: base_language.to_string(),
            key: view.key.key.clone(),
            description: view.key.description.clone(),
            translations: view.translations.clone(),
            state: RowState::Viewing,
        }
    }

    /// Editor for a row that has no id yet. `now_millis` builds the
    /// placeholder id `new-<millis>`.
    pub fn new_row(base_language: &str, now_millis: i64) -> Self {
        let placeholder_id = format!("{}{}", PLACEHOLDER_PREFIX, now_millis);
        Self {
            id: placeholder_id.clone(),
            base_language: base_language.to_string(),
            key: String::new(),
            description: String::new(),
            translations: BTreeMap::new(),
            state: RowState::NewRow {
                placeholder_id,
                draft: NewKeyDraft {
                    key: String::new(),
                    description: String::new(),
                    base_text: String::new(),
                },
            },
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn state(&self) -> &RowState {
        &self.state
    }

    pub fn is_placeholder(&self) -> bool {
        self.id.starts_with(PLACEHOLDER_PREFIX)
    }

    pub fn translations(&self) -> &BTreeMap<String, String> {
        &self.translations
    }

    fn current_value(&self, field: &EditField) -> String {
        match field {
            EditField::Key => self.key.clone(),
            EditField::Description => self.description.clone(),
            EditField::Translation(lang) => self.translations.get(lang).cloned().unwrap_or_default(),
        }
    }

    pub fn begin_edit(&mut self, field: EditField) -> Result<()> {
        if self.state != RowState::Viewing {
            return Err(invalid("start editing", &self.state));
        }
        let original = self.current_value(&field);
        self.state = RowState::Editing {
            field,
            draft: original.clone(),
            original,
        };
        Ok(())
    }

    /// Replace the draft of the field being edited.
    pub fn set_draft(&mut self, text: &str) -> Result<()> {
        match &mut self.state {
            RowState::Editing { draft, .. } => {
                *draft = text.to_string();
                Ok(())
            }
            other => Err(invalid("edit", other)),
        }
    }

    pub fn set_new_row_field(&mut self, field: NewRowField, text: &str) -> Result<()> {
        match &mut self.state {
            RowState::NewRow { draft, .. } => {
                let target = match field {
                    NewRowField::Key => &mut draft.key,
                    NewRowField::Description => &mut draft.description,
                    NewRowField::BaseText => &mut draft.base_text,
                };
                *target = text.to_string();
                Ok(())
            }
            other => Err(invalid("fill the new row", other)),
        }
    }

    fn derived_translations(&self) -> Vec<String> {
        self.translations
            .iter()
            .filter(|(lang, value)| **lang != self.base_language && !value.trim().is_empty())
            .map(|(lang, _)| lang.clone())
            .collect()
    }

    fn update_for(&self, field: &EditField, value: String) -> KeyUpdate {
        match field {
            EditField::Key => KeyUpdate::Rename { key: value },
            EditField::Description => KeyUpdate::UpdateDescription { description: value },
            EditField::Translation(lang) => KeyUpdate::UpdateTranslation {
                language: lang.clone(),
                value,
            },
        }
    }

    fn remember(&mut self, update: &KeyUpdate) {
        match update {
            KeyUpdate::Rename { key } => self.key = key.clone(),
            KeyUpdate::UpdateDescription { description } => self.description = description.clone(),
            KeyUpdate::UpdateTranslation { language, value } => {
                self.translations.insert(language.clone(), value.clone());
            }
        }
    }

    /// Save the current edit. Validation errors leave the state unchanged.
    pub fn save(&mut self) -> Result<RowEffect> {
        match self.state.clone() {
            RowState::Editing {
                field,
                original,
                draft,
            } => {
                if draft == original {
                    self.state = RowState::Viewing;
                    return Ok(RowEffect::None);
                }
                let is_base = matches!(&field, EditField::Translation(l) if *l == self.base_language);
                if field == EditField::Key && draft.trim().is_empty() {
                    return Err(Error::EmptyKeyName);
                }
                if is_base && draft.trim().is_empty() {
                    return Err(Error::EmptyBaseText);
                }

                if is_base {
                    let overwritten = self.derived_translations();
                    if !overwritten.is_empty() {
                        self.state = RowState::ConfirmAutoTranslate { draft, overwritten };
                        return Ok(RowEffect::None);
                    }
                }

                let update = self.update_for(&field, draft);
                self.remember(&update);
                self.state = RowState::Viewing;
                Ok(if is_base {
                    RowEffect::CommitAndTranslate(update)
                } else {
                    RowEffect::Commit(update)
                })
            }
            RowState::NewRow { draft, .. } => {
                if draft.key.trim().is_empty() {
                    return Err(Error::EmptyKeyName);
                }
                if draft.base_text.trim().is_empty() {
                    return Err(Error::EmptyBaseText);
                }
                Ok(RowEffect::Create(draft))
            }
            other => Err(invalid("save", &other)),
        }
    }

    /// Answer the overwrite prompt. Accepting re-translates the derived
    /// languages; declining saves the base text alone.
    pub fn resolve_auto_translate(&mut self, accept: bool) -> Result<RowEffect> {
        let RowState::ConfirmAutoTranslate { draft, .. } = self.state.clone() else {
            return Err(invalid("answer the auto-translate prompt", &self.state));
        };
        let update = KeyUpdate::UpdateTranslation {
            language: self.base_language.clone(),
            value: draft,
        };
        self.remember(&update);
        self.state = RowState::Viewing;
        Ok(if accept {
            RowEffect::CommitAndTranslate(update)
        } else {
            RowEffect::Commit(update)
        })
    }

    /// A new row was stored; it now behaves like any other row.
    pub fn mark_persisted(&mut self, view: &KeyView) -> Result<()> {
        if !matches!(self.state, RowState::NewRow { .. }) {
            return Err(invalid("mark persisted", &self.state));
        }
        let base = self.base_language.clone();
        *self = Self::for_key(view, &base);
        Ok(())
    }

    /// Abandon the current edit. Cancelling a new row discards it.
    pub fn cancel(&mut self) -> RowEffect {
        let effect = match self.state {
            RowState::NewRow { .. } => RowEffect::Discard,
            _ => RowEffect::None,
        };
        if effect == RowEffect::None {
            self.state = RowState::Viewing;
        }
        effect
    }
}
