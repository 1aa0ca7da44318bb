//! Callback dispatcher.
//!
//! The traversal never calls the application directly. It *triggers* a
//! phase, and the session loop *invokes* it: the request is rebuilt from the
//! cursor on every invocation, so a busy callback is re-invoked with
//! identical arguments until it completes.
//!
//! ```text
//!  traversal ── trigger(phase) ──▶ callback slot
//!                                      │
//!  session loop ── invoke ─────────────┘
//!        │   build CallbackRequest from cursor
//!        │   handler.handle(&request, &mut response)
//!        ├── Continue ─▶ apply side effects ─▶ Done
//!        ├── Busy ─────▶ Pending (slot kept)
//!        └── Abort ────▶ Failed
//! ```

use log::{debug, info, warn};

use crate::app::ports::RemoteConfigHandler;
use crate::error::{Error, Result};

use super::cursor::{Instance, LockedCollection, Path};
use super::parser::{Action, QueryAttributes};
use super::schema::{Access, Collection, GroupType, RciDescriptor, ValueType};
use super::session::{ErrorSlot, RciSession};
use super::value::{ElementValue, ValueLimit};

// ── Request ───────────────────────────────────────────────────

/// Context shared by every tree-walking phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ActionInfo {
    pub action: Action,
    pub group_type: GroupType,
    pub attributes: QueryAttributes,
}

/// Context of a group or list phase.
#[derive(Debug, Clone, Copy)]
pub struct CollectionInfo<'a> {
    pub action: ActionInfo,
    /// Group id/instance and enclosing list ids/instances.
    pub path: Path<'a>,
    pub name: &'a str,
    pub collection: Collection,
}

#[derive(Debug, Clone, Copy)]
pub struct ElementInfo<'a> {
    pub collection: CollectionInfo<'a>,
    pub id: u32,
    pub name: &'a str,
    pub value_type: ValueType,
    pub access: Access,
    pub limit: Option<ValueLimit>,
    /// Decoded request value on set, `None` on query.
    pub value: Option<&'a ElementValue>,
}

/// One remote-configuration request to the application.
#[derive(Debug, Clone, Copy)]
pub enum CallbackRequest<'a> {
    SessionStart,
    SessionEnd,
    /// The transport lost the session. Collections still locked are listed
    /// and must be treated as unlocked.
    SessionCancel {
        locked: &'a [LockedCollection],
    },
    ActionStart(ActionInfo),
    ActionEnd(ActionInfo),
    GroupStart(CollectionInfo<'a>),
    GroupEnd(CollectionInfo<'a>),
    GroupInstancesLock(CollectionInfo<'a>),
    GroupInstancesUnlock(CollectionInfo<'a>),
    GroupInstancesSet {
        collection: CollectionInfo<'a>,
        count: u32,
        /// Dictionary key being created.
        key: Option<&'a str>,
    },
    GroupInstanceRemove {
        collection: CollectionInfo<'a>,
        instance: &'a Instance,
    },
    ListStart(CollectionInfo<'a>),
    ListEnd(CollectionInfo<'a>),
    ListInstancesLock(CollectionInfo<'a>),
    ListInstancesUnlock(CollectionInfo<'a>),
    ListInstancesSet {
        collection: CollectionInfo<'a>,
        count: u32,
        key: Option<&'a str>,
    },
    ListInstanceRemove {
        collection: CollectionInfo<'a>,
        instance: &'a Instance,
    },
    ElementProcess(ElementInfo<'a>),
    DoCommand {
        target: Option<&'a str>,
        payload: &'a str,
    },
    Reboot,
    SetFactoryDefault,
}

impl CallbackRequest<'_> {
    pub fn name(&self) -> &'static str {
        match self {
            Self::SessionStart => "session_start",
            Self::SessionEnd => "session_end",
            Self::SessionCancel { .. } => "session_cancel",
            Self::ActionStart(_) => "action_start",
            Self::ActionEnd(_) => "action_end",
            Self::GroupStart(_) => "group_start",
            Self::GroupEnd(_) => "group_end",
            Self::GroupInstancesLock(_) => "group_instances_lock",
            Self::GroupInstancesUnlock(_) => "group_instances_unlock",
            Self::GroupInstancesSet { .. } => "group_instances_set",
            Self::GroupInstanceRemove { .. } => "group_instance_remove",
            Self::ListStart(_) => "list_start",
            Self::ListEnd(_) => "list_end",
            Self::ListInstancesLock(_) => "list_instances_lock",
            Self::ListInstancesUnlock(_) => "list_instances_unlock",
            Self::ListInstancesSet { .. } => "list_instances_set",
            Self::ListInstanceRemove { .. } => "list_instance_remove",
            Self::ElementProcess(_) => "element_process",
            Self::DoCommand { .. } => "do_command",
            Self::Reboot => "reboot",
            Self::SetFactoryDefault => "set_factory_default",
        }
    }

    /// Collection context of group and list phases.
    pub fn collection(&self) -> Option<&CollectionInfo<'_>> {
        match self {
            Self::GroupStart(c)
            | Self::GroupEnd(c)
            | Self::GroupInstancesLock(c)
            | Self::GroupInstancesUnlock(c)
            | Self::ListStart(c)
            | Self::ListEnd(c)
            | Self::ListInstancesLock(c)
            | Self::ListInstancesUnlock(c)
            | Self::GroupInstancesSet { collection: c, .. }
            | Self::GroupInstanceRemove { collection: c, .. }
            | Self::ListInstancesSet { collection: c, .. }
            | Self::ListInstanceRemove { collection: c, .. } => Some(c),
            Self::ElementProcess(e) => Some(&e.collection),
            _ => None,
        }
    }
}

// ── Response ──────────────────────────────────────────────────

/// What the application hands back. Rebuilt empty before every invocation.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CallbackResponse {
    /// Global or group-local error id; `None` or `Some(0)` means success.
    pub error_id: Option<u32>,
    pub error_hint: Option<String>,
    /// Queried element value.
    pub value: Option<ElementValue>,
    /// Query with compare_to: the value (or whole collection) equals the
    /// baseline and is left out of the response.
    pub compare_matches: bool,
    /// Instance count of a locked or resized array.
    pub count: Option<u32>,
    /// Keys of a locked dictionary.
    pub keys: Option<Vec<String>>,
    /// do_command response text.
    pub payload: Option<String>,
}

impl CallbackResponse {
    pub fn set_error(&mut self, id: u32, hint: Option<&str>) {
        self.error_id = Some(id);
        self.error_hint = hint.map(Into::into);
    }

    pub fn set_value(&mut self, value: impl Into<ElementValue>) {
        self.value = Some(value.into());
    }

    pub fn set_count(&mut self, count: u32) {
        self.count = Some(count);
    }

    pub fn set_keys<I, S>(&mut self, keys: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.keys = Some(keys.into_iter().map(Into::into).collect());
    }

    pub fn set_payload(&mut self, payload: &str) {
        self.payload = Some(payload.into());
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallbackStatus {
    Continue,
    /// Not finished; call again later with the same request.
    Busy,
    /// Give up on the session.
    Abort,
}

// ── Dispatcher ────────────────────────────────────────────────

/// Phases the traversal can trigger. Group or list flavour is picked from
/// the cursor depth when the request is built.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    SessionStart,
    SessionEnd,
    SessionCancel,
    ActionStart,
    ActionEnd,
    CollectionStart,
    CollectionEnd,
    InstancesLock,
    InstancesUnlock,
    InstancesSet,
    InstanceRemove,
    ElementProcess,
    DoCommand,
    Reboot,
    SetFactoryDefault,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dispatch {
    /// Callback returned busy.
    Pending,
    Done,
    /// Callback aborted the session.
    Failed,
}

impl RciSession {
    pub(crate) fn trigger(&mut self, phase: Phase) {
        debug!("RCI[{}]: trigger {:?}", self.id, phase);
        self.callback = Some(phase);
    }

    /// Perform the triggered callback once.
    pub(crate) fn invoke<H>(&mut self, desc: &RciDescriptor, handler: &mut H) -> Result<Dispatch>
    where
        H: RemoteConfigHandler + ?Sized,
    {
        let Some(phase) = self.callback else {
            return Ok(Dispatch::Done);
        };
        let locked = if phase == Phase::SessionCancel {
            self.cursor.locked_collections()
        } else {
            Vec::new()
        };
        let mut response = CallbackResponse::default();
        let status = {
            let request = self
                .request(desc, phase, &locked)
                .ok_or(Error::Internal("callback context out of sync with schema"))?;
            handler.handle(&request, &mut response)
        };
        match status {
            CallbackStatus::Continue => {
                self.callback = None;
                self.response = response;
                self.apply(phase);
                Ok(Dispatch::Done)
            }
            CallbackStatus::Busy => {
                debug!("RCI[{}]: callback busy ({:?})", self.id, phase);
                Ok(Dispatch::Pending)
            }
            CallbackStatus::Abort => {
                self.callback = None;
                Ok(Dispatch::Failed)
            }
        }
    }

    fn action_info(&self) -> Option<ActionInfo> {
        let (action, group_type) = self.command.id?.action()?;
        Some(ActionInfo {
            action,
            group_type,
            attributes: self.command.attributes,
        })
    }

    fn collection_info<'s>(&'s self, desc: &'s RciDescriptor) -> Option<CollectionInfo<'s>> {
        let def = self.cursor.top_def(&desc.schema)?;
        Some(CollectionInfo {
            action: self.action_info()?,
            path: self.cursor.path(),
            name: def.name,
            collection: def.collection,
        })
    }

    fn element_info<'s>(&'s self, desc: &'s RciDescriptor) -> Option<ElementInfo<'s>> {
        let id = self.cursor.top()?.element?;
        let def = self.cursor.top_def(&desc.schema)?.elements.get(id as usize)?;
        Some(ElementInfo {
            collection: self.collection_info(desc)?,
            id,
            name: &def.name,
            value_type: def.value_type,
            access: def.access,
            limit: def.limit,
            value: self.cursor.value.as_ref(),
        })
    }

    fn request<'s>(
        &'s self,
        desc: &'s RciDescriptor,
        phase: Phase,
        locked: &'s [LockedCollection],
    ) -> Option<CallbackRequest<'s>> {
        let list = self.cursor.depth() > 1;
        let request = match phase {
            Phase::SessionStart => CallbackRequest::SessionStart,
            Phase::SessionEnd => CallbackRequest::SessionEnd,
            Phase::SessionCancel => CallbackRequest::SessionCancel { locked },
            Phase::ActionStart => CallbackRequest::ActionStart(self.action_info()?),
            Phase::ActionEnd => CallbackRequest::ActionEnd(self.action_info()?),
            Phase::CollectionStart => {
                let info = self.collection_info(desc)?;
                if list { CallbackRequest::ListStart(info) } else { CallbackRequest::GroupStart(info) }
            }
            Phase::CollectionEnd => {
                let info = self.collection_info(desc)?;
                if list { CallbackRequest::ListEnd(info) } else { CallbackRequest::GroupEnd(info) }
            }
            Phase::InstancesLock => {
                let info = self.collection_info(desc)?;
                if list {
                    CallbackRequest::ListInstancesLock(info)
                } else {
                    CallbackRequest::GroupInstancesLock(info)
                }
            }
            Phase::InstancesUnlock => {
                let info = self.collection_info(desc)?;
                if list {
                    CallbackRequest::ListInstancesUnlock(info)
                } else {
                    CallbackRequest::GroupInstancesUnlock(info)
                }
            }
            Phase::InstancesSet => {
                let collection = self.collection_info(desc)?;
                let count = self.cursor.pending_count;
                let key = self.cursor.pending_instance.as_ref().and_then(Instance::key);
                if list {
                    CallbackRequest::ListInstancesSet { collection, count, key }
                } else {
                    CallbackRequest::GroupInstancesSet { collection, count, key }
                }
            }
            Phase::InstanceRemove => {
                let collection = self.collection_info(desc)?;
                let instance = self.cursor.pending_instance.as_ref()?;
                if list {
                    CallbackRequest::ListInstanceRemove { collection, instance }
                } else {
                    CallbackRequest::GroupInstanceRemove { collection, instance }
                }
            }
            Phase::ElementProcess => CallbackRequest::ElementProcess(self.element_info(desc)?),
            Phase::DoCommand => CallbackRequest::DoCommand {
                target: self.command.target.as_deref(),
                payload: &self.command.payload,
            },
            Phase::Reboot => CallbackRequest::Reboot,
            Phase::SetFactoryDefault => CallbackRequest::SetFactoryDefault,
        };
        Some(request)
    }

    /// Protocol side effects of a completed callback.
    fn apply(&mut self, phase: Phase) {
        if let Some(id) = self.response.error_id.filter(|&id| id != 0) {
            debug!("RCI[{}]: {:?} reported error {}", self.id, phase, id);
            self.error = Some(ErrorSlot {
                id,
                hint: self.response.error_hint.take(),
            });
        }
        let failed = self.error.is_some();
        let session = self.id;
        let requested = self.cursor.pending_count;
        let pending = self.cursor.pending_instance.clone();
        let Some(level) = self.cursor.top_mut() else {
            return;
        };

        match phase {
            Phase::InstancesLock if !failed => {
                if level.collection.is_dictionary() {
                    level.keys = self.response.keys.take().unwrap_or_default();
                    level.count = level.keys.len() as u32;
                } else {
                    level.count = self.response.count.unwrap_or(0);
                }
                level.locked = true;
                info!("RCI[{}]: collection {} locked (count={})", session, level.id, level.count);
            }
            // A lock that completed with an error is still held by the
            // application and is released by the unwind.
            Phase::InstancesLock => {
                level.count = 0;
                level.locked = true;
            }
            Phase::InstancesUnlock => {
                level.locked = false;
                debug!("RCI[{}]: collection {} unlocked", session, level.id);
            }
            Phase::InstancesSet if !failed => match pending {
                Some(Instance::Key(key)) => {
                    if !level.keys.contains(&key) {
                        level.keys.push(key);
                    }
                    level.count = level.keys.len() as u32;
                }
                _ => {
                    let offered = self.response.count.unwrap_or(requested);
                    let grows = offered > requested && level.collection.dont_shrink();
                    if offered == requested || grows {
                        level.count = offered;
                    } else {
                        warn!(
                            "RCI[{}]: collection {} count {} refused (asked {}), treating as empty",
                            session, level.id, offered, requested
                        );
                        level.count = 0;
                    }
                }
            },
            Phase::InstanceRemove if !failed => match pending {
                Some(Instance::Key(key)) => {
                    level.keys.retain(|k| *k != key);
                    level.count = level.keys.len() as u32;
                }
                Some(Instance::Index(_)) => level.count = level.count.saturating_sub(1),
                None => {}
            },
            _ => {}
        }
    }
}
