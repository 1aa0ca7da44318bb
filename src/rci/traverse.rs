//! Traversal state machine.
//!
//! One `step` performs one transition: it may read one token, emit output,
//! push or pop a collection level, and trigger at most one callback. A step
//! that triggers a callback always moves to a state that inspects the
//! result, so a busy callback never repeats the work that led to it.
//!
//! ```text
//!  SessionStart ─▶ CommandId ─▶ [Attribute*] ─▶ CommandReady
//!                     ▲                            │ action_start
//!                     │                            ▼
//!                     │            ┌──── GroupId | AllGroups ◀───────────┐
//!                     │            ▼                                     │
//!                     │     CollectionStart ─▶ CollectionCount ─▶ Lock   │
//!                     │            ▲                               │     │
//!                     │   list     │                               ▼     │
//!                     │   element  │    ┌──────────────────── Instances  │
//!                     │            │    ▼                          │     │
//!                     │     ElementId | AllElements ─▶ Process ─▶ End    │
//!                     │            │                                     │
//!                     │            └─ InstanceEnd ─▶ CollectionEnd ──────┘
//!                     │                              (unlock, end, pop)
//!                     └──────── ActionEnd ◀── no more groups
//! ```
//!
//! Groups and lists share the collection states; the cursor depth tells
//! them apart. Legacy commands (do_command, reboot, set_factory_default)
//! leave the tree walk out entirely.

use log::{debug, info, warn};

use crate::error::{Error, ProtocolError, Result};

use super::callback::Phase;
use super::codec::{Marker, Token};
use super::cursor::{Instance, Level, Skip, TraversalCursor, Walk};
use super::errors::GlobalError;
use super::generator::ErrorReport;
use super::parser::{CommandId, MAX_ATTRIBUTES};
use super::schema::{Collection, GroupType, RciDescriptor};
use super::session::{ErrorSlot, ParserState, RciSession};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TraverseState {
    SessionStart,
    SessionStarted,
    CommandId,
    AttributeCount,
    AttributeId,
    AttributeValue,
    CommandReady,
    ActionStarted,
    GroupId,
    AllGroups,
    // ---- collection walk (group at depth 0, lists above)
    CollectionStart,
    CollectionStarted,
    CollectionCount,
    CollectionCountValue,
    CollectionLock,
    CollectionLocked,
    CollectionCountSet,
    Instances,
    InstanceKey,
    InstanceRemove,
    InstanceRemoveKey,
    InstanceRemoved,
    InstanceGrown,
    InstanceOpen,
    ElementId,
    AllElements,
    ElementValue,
    ElementProcess,
    ElementEnd,
    InstanceEnd,
    CollectionEnd,
    CollectionUnlocked,
    CollectionClose,
    CollectionClosed,
    ActionEnd,
    ActionEnded,
    // ---- legacy commands
    DoCommandPayload,
    LegacyDone,
    // ---- command failure
    ErrorReport,
    ErrorUnwind,
    SessionEnd,
    SessionEnded,
    Done,
}

impl TraverseState {
    /// States owned by the error sub-machine.
    pub fn is_error(self) -> bool {
        matches!(self, Self::ErrorReport | Self::ErrorUnwind)
    }
}

/// Outcome of one step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Flow {
    Continue,
    /// The chunk ran out in the middle of a token.
    NeedInput,
}

/// Unwrap a parser read, or stop the step until more input arrives.
macro_rules! ready {
    ($read:expr) => {
        match $read? {
            Some(value) => value,
            None => return Ok(Flow::NeedInput),
        }
    };
}

fn top(cursor: &mut TraversalCursor) -> Result<&mut Level> {
    cursor.top_mut().ok_or(Error::Internal("no open collection"))
}

/// Where element iteration continues after one element.
fn after_element(walk: Walk) -> TraverseState {
    match walk {
        Walk::All => TraverseState::AllElements,
        Walk::Requested => TraverseState::ElementId,
    }
}

impl RciSession {
    pub(crate) fn step(&mut self, desc: &RciDescriptor) -> Result<Flow> {
        use TraverseState as S;

        match self.state {
            S::SessionStart => {
                self.trigger(Phase::SessionStart);
                self.goto(S::SessionStarted)
            }
            S::SessionStarted => self.after_callback(S::CommandId),
            S::CommandId => self.on_command_id(),
            S::AttributeCount => {
                let count = ready!(self.parser.integer());
                if count > MAX_ATTRIBUTES {
                    return Err(ProtocolError::TooManyAttributes(count).into());
                }
                self.command.attributes_left = count;
                self.goto(S::AttributeId)
            }
            S::AttributeId => {
                if self.command.attributes_left == 0 {
                    return self.goto(S::CommandReady);
                }
                let id = ready!(self.parser.integer());
                self.command.attribute_id = Some(id);
                self.goto(S::AttributeValue)
            }
            S::AttributeValue => {
                ready!(self.parser.attribute(&mut self.command));
                self.command.attributes_left -= 1;
                self.goto(S::AttributeId)
            }
            S::CommandReady => self.on_command_ready(),
            S::ActionStarted => {
                if self.error.is_some() {
                    return self.goto(S::ErrorReport);
                }
                self.action_started = true;
                self.goto(S::GroupId)
            }
            S::GroupId => self.on_group_id(desc),
            S::AllGroups => self.on_all_groups(desc),
            S::CollectionStart => self.on_collection_start(),
            S::CollectionStarted => self.on_collection_started(),
            S::CollectionCount => self.on_collection_count(),
            S::CollectionCountValue => {
                let count = ready!(self.parser.integer());
                top(&mut self.cursor)?.requested_count = Some(count);
                self.goto(S::CollectionLock)
            }
            S::CollectionLock => self.on_collection_lock(),
            S::CollectionLocked => self.on_collection_locked(),
            S::CollectionCountSet => {
                if self.error.is_some() {
                    return self.goto(S::ErrorReport);
                }
                let count = top(&mut self.cursor)?.count;
                self.generator.count(count);
                self.goto(S::Instances)
            }
            S::Instances => self.on_instances(),
            S::InstanceKey => {
                let key = ready!(self.parser.string());
                self.select_instance(Instance::Key(key))
            }
            S::InstanceRemove => self.on_instance_remove(),
            S::InstanceRemoveKey => {
                let key = ready!(self.parser.string());
                self.remove_instance(Instance::Key(key))
            }
            S::InstanceRemoved => {
                if self.error.is_some() {
                    return self.goto(S::ErrorReport);
                }
                if let Some(instance) = self.cursor.pending_instance.take() {
                    self.generator.removed(&instance);
                }
                self.goto(S::Instances)
            }
            S::InstanceGrown => self.on_instance_grown(),
            S::InstanceOpen => self.on_instance_open(),
            S::ElementId => self.on_element_id(desc),
            S::AllElements => self.on_all_elements(desc),
            S::ElementValue => self.on_element_value(desc),
            S::ElementProcess => {
                let level = top(&mut self.cursor)?;
                if level.skipping() {
                    let next = after_element(level.element_walk);
                    return self.goto(next);
                }
                self.trigger(Phase::ElementProcess);
                self.goto(S::ElementEnd)
            }
            S::ElementEnd => self.on_element_end(desc),
            S::InstanceEnd => {
                if !top(&mut self.cursor)?.skipping() {
                    self.generator.close();
                }
                self.goto(S::Instances)
            }
            S::CollectionEnd => {
                if top(&mut self.cursor)?.locked {
                    self.trigger(Phase::InstancesUnlock);
                    self.goto(S::CollectionUnlocked)
                } else {
                    self.goto(S::CollectionClose)
                }
            }
            S::CollectionUnlocked => self.after_callback(S::CollectionClose),
            S::CollectionClose => {
                let level = top(&mut self.cursor)?;
                if level.skip == Skip::Inherited {
                    return self.goto(S::CollectionClosed);
                }
                level.started = false;
                self.trigger(Phase::CollectionEnd);
                self.goto(S::CollectionClosed)
            }
            S::CollectionClosed => self.on_collection_closed(),
            S::ActionEnd => {
                self.action_started = false;
                self.trigger(Phase::ActionEnd);
                self.goto(S::ActionEnded)
            }
            S::ActionEnded => {
                if self.error.is_some() {
                    return self.goto(S::ErrorReport);
                }
                self.generator.close();
                self.goto(S::CommandId)
            }
            S::DoCommandPayload => {
                let payload = ready!(self.parser.string());
                self.command.payload = payload;
                self.trigger(Phase::DoCommand);
                self.goto(S::LegacyDone)
            }
            S::LegacyDone => self.on_legacy_done(),
            S::ErrorReport => self.on_error_report(desc),
            S::ErrorUnwind => self.on_error_unwind(),
            S::SessionEnd => {
                self.trigger(Phase::SessionEnd);
                self.goto(S::SessionEnded)
            }
            S::SessionEnded => {
                if let Some(slot) = self.error.take() {
                    warn!("RCI[{}]: session_end reported error {}", self.id, slot.id);
                }
                self.goto(S::Done)
            }
            S::Done => Ok(Flow::Continue),
        }
    }

    fn goto(&mut self, next: TraverseState) -> Result<Flow> {
        debug!("RCI[{}]: traverse {:?} -> {:?}", self.id, self.state, next);
        self.state = next;
        Ok(Flow::Continue)
    }

    fn after_callback(&mut self, next: TraverseState) -> Result<Flow> {
        if self.error.is_some() {
            self.goto(TraverseState::ErrorReport)
        } else {
            self.goto(next)
        }
    }

    fn push_level(&mut self, id: u32, collection: Collection, walk: Walk) -> Result<()> {
        if self.cursor.push(Level::new(id, collection, walk)) {
            Ok(())
        } else {
            Err(Error::Internal("list nesting exceeds cursor stack"))
        }
    }

    /// Description for an error id, if descriptions are enabled.
    fn describe<'d>(&self, desc: &'d RciDescriptor, id: u32) -> Option<&'d str> {
        if !self.config.error_descriptions {
            return None;
        }
        let group = self
            .cursor
            .levels
            .first()
            .and_then(|level| desc.schema.group(self.cursor.group_type, level.id));
        desc.describe_error(group, id)
    }

    /// Report an error in place of one element's value.
    fn inline_error(&mut self, desc: &RciDescriptor, element: u32, id: u32, hint: Option<&str>) {
        debug!("RCI[{}]: element {} error {}", self.id, element, id);
        let description = self.describe(desc, id);
        self.generator.element_error(
            element,
            &ErrorReport {
                id,
                description,
                hint,
            },
        );
    }

    // ---- commands -----------------------------------------------------------

    fn on_command_id(&mut self) -> Result<Flow> {
        if self.parser.input().at_end() {
            return self.goto(TraverseState::SessionEnd);
        }
        if self.parser.input().is_exhausted() {
            return Ok(Flow::NeedInput);
        }
        let (id, has_attributes) = ready!(self.parser.command(self.config.legacy_commands));
        info!("RCI[{}]: command {:?}", self.id, id);
        self.command.reset();
        self.command.id = Some(id);
        self.cursor
            .reset(id.action().map_or(GroupType::Setting, |(_, group_type)| group_type));
        self.generator.open(id.wire());
        if has_attributes {
            self.goto(TraverseState::AttributeCount)
        } else {
            self.goto(TraverseState::CommandReady)
        }
    }

    fn on_command_ready(&mut self) -> Result<Flow> {
        match self.command.id {
            Some(CommandId::DoCommand) => self.goto(TraverseState::DoCommandPayload),
            Some(CommandId::Reboot) => {
                self.trigger(Phase::Reboot);
                self.goto(TraverseState::LegacyDone)
            }
            Some(CommandId::SetFactoryDefault) => {
                self.trigger(Phase::SetFactoryDefault);
                self.goto(TraverseState::LegacyDone)
            }
            Some(_) => {
                self.trigger(Phase::ActionStart);
                self.goto(TraverseState::ActionStarted)
            }
            None => Err(Error::Internal("command ready without a command")),
        }
    }

    fn on_legacy_done(&mut self) -> Result<Flow> {
        if let Some(slot) = self.error.take() {
            let failed = match self.command.id {
                Some(CommandId::DoCommand) => GlobalError::DoCommandFailed,
                Some(CommandId::Reboot) => GlobalError::RebootFailed,
                _ => GlobalError::SetFactoryDefaultFailed,
            };
            warn!("RCI[{}]: {} (application error {})", self.id, failed.name(), slot.id);
            self.error = Some(ErrorSlot {
                id: failed.id(),
                hint: slot.hint,
            });
            return self.goto(TraverseState::ErrorReport);
        }
        if self.command.id == Some(CommandId::DoCommand) {
            let payload = self.response.payload.take().unwrap_or_default();
            self.generator.string(&payload);
        }
        self.generator.close();
        self.goto(TraverseState::CommandId)
    }

    // ---- groups -------------------------------------------------------------

    fn on_group_id(&mut self, desc: &RciDescriptor) -> Result<Flow> {
        match ready!(self.parser.peek()) {
            Token::Marker(Marker::Terminator) => {
                self.parser.consume();
                if !self.cursor.groups_seen && self.command.is_query() {
                    self.cursor.all_groups = true;
                    self.goto(TraverseState::AllGroups)
                } else {
                    self.goto(TraverseState::ActionEnd)
                }
            }
            Token::Integer(id) => {
                self.parser.consume();
                self.cursor.groups_seen = true;
                let group = desc
                    .schema
                    .group(self.cursor.group_type, id)
                    .ok_or(ProtocolError::BadGroupId(id))?;
                self.push_level(id, group.collection, Walk::Requested)?;
                self.goto(TraverseState::CollectionStart)
            }
            Token::Marker(_) => Err(ProtocolError::UnexpectedMarker.into()),
        }
    }

    fn on_all_groups(&mut self, desc: &RciDescriptor) -> Result<Flow> {
        let id = self.cursor.next_group;
        match desc.schema.group(self.cursor.group_type, id) {
            Some(group) => {
                self.cursor.next_group += 1;
                self.push_level(id, group.collection, Walk::All)?;
                self.goto(TraverseState::CollectionStart)
            }
            None => self.goto(TraverseState::ActionEnd),
        }
    }

    // ---- collections --------------------------------------------------------

    fn on_collection_start(&mut self) -> Result<Flow> {
        if self.cursor.parent_skipping() {
            top(&mut self.cursor)?.skip = Skip::Inherited;
        } else {
            self.trigger(Phase::CollectionStart);
        }
        self.goto(TraverseState::CollectionStarted)
    }

    fn on_collection_started(&mut self) -> Result<Flow> {
        if self.error.is_some() {
            return self.goto(TraverseState::ErrorReport);
        }
        let compares = self.command.compares();
        let matched = self.response.compare_matches;
        let session = self.id;
        let level = top(&mut self.cursor)?;
        if level.skip != Skip::Inherited {
            level.started = true;
            if compares && matched {
                debug!("RCI[{}]: collection {} matches baseline, skipped", session, level.id);
                level.skip = Skip::Own;
            } else {
                level.emitted = true;
                let id = level.id;
                self.generator.open(id);
            }
        }
        self.goto(TraverseState::CollectionCount)
    }

    fn on_collection_count(&mut self) -> Result<Flow> {
        let level = top(&mut self.cursor)?;
        let collection = level.collection;
        if level.instance_walk == Walk::All {
            return self.goto(TraverseState::CollectionLock);
        }
        if ready!(self.parser.peek()) != Token::Marker(Marker::Count) {
            return self.goto(TraverseState::CollectionLock);
        }
        self.parser.consume();
        if !self.command.is_set() || !matches!(collection, Collection::VariableArray { .. }) {
            return Err(ProtocolError::BadCollectionEdit.into());
        }
        self.goto(TraverseState::CollectionCountValue)
    }

    fn on_collection_lock(&mut self) -> Result<Flow> {
        let level = top(&mut self.cursor)?;
        if level.skipping() {
            level.count = 0;
            return self.goto(TraverseState::Instances);
        }
        if let Collection::FixedArray(count) = level.collection {
            level.count = count;
            return self.goto(TraverseState::Instances);
        }
        self.trigger(Phase::InstancesLock);
        self.goto(TraverseState::CollectionLocked)
    }

    fn on_collection_locked(&mut self) -> Result<Flow> {
        if self.error.is_some() {
            return self.goto(TraverseState::ErrorReport);
        }
        let query = self.command.is_query();
        let level = top(&mut self.cursor)?;
        if let Some(count) = level.requested_count.take() {
            self.cursor.pending_count = count;
            self.cursor.pending_instance = None;
            self.trigger(Phase::InstancesSet);
            return self.goto(TraverseState::CollectionCountSet);
        }
        let count = level.count;
        if query {
            self.generator.count(count);
        }
        self.goto(TraverseState::Instances)
    }

    fn on_collection_closed(&mut self) -> Result<Flow> {
        if self.error.is_some() {
            return self.goto(TraverseState::ErrorReport);
        }
        let level = self
            .cursor
            .pop()
            .ok_or(Error::Internal("no open collection"))?;
        if level.emitted {
            self.generator.close();
        }
        let next = match self.cursor.top() {
            None if self.cursor.all_groups => TraverseState::AllGroups,
            None => TraverseState::GroupId,
            Some(parent) => after_element(parent.element_walk),
        };
        self.goto(next)
    }

    // ---- instances ----------------------------------------------------------

    fn on_instances(&mut self) -> Result<Flow> {
        let query = self.command.is_query();
        let set = self.command.is_set();
        let level = top(&mut self.cursor)?;

        if level.instance_walk == Walk::All {
            if level.next_instance >= level.count {
                return self.goto(TraverseState::CollectionEnd);
            }
            let i = level.next_instance;
            level.next_instance += 1;
            let instance = if level.collection.is_dictionary() {
                match level.keys.get(i as usize) {
                    Some(key) => Instance::Key(key.clone()),
                    None => return self.goto(TraverseState::CollectionEnd),
                }
            } else {
                Instance::Index(i + 1)
            };
            level.instance = Some(instance);
            return self.goto(TraverseState::InstanceOpen);
        }

        let dynamic = level.collection.is_dynamic();
        let token = ready!(self.parser.peek());
        match token {
            Token::Marker(Marker::Terminator) => {
                self.parser.consume();
                if !level.instances_seen && query {
                    level.instance_walk = Walk::All;
                    self.goto(TraverseState::Instances)
                } else {
                    self.goto(TraverseState::CollectionEnd)
                }
            }
            Token::Marker(Marker::Remove) => {
                self.parser.consume();
                level.instances_seen = true;
                if !(set && dynamic) {
                    return Err(ProtocolError::BadCollectionEdit.into());
                }
                self.goto(TraverseState::InstanceRemove)
            }
            Token::Marker(Marker::Key) => {
                self.parser.consume();
                level.instances_seen = true;
                self.goto(TraverseState::InstanceKey)
            }
            Token::Integer(index) => {
                self.parser.consume();
                level.instances_seen = true;
                self.select_instance(Instance::Index(index))
            }
            Token::Marker(_) => Err(ProtocolError::UnexpectedMarker.into()),
        }
    }

    /// Validate a requested instance, growing the collection on set.
    fn select_instance(&mut self, instance: Instance) -> Result<Flow> {
        let set = self.command.is_set();
        let level = top(&mut self.cursor)?;
        if level.skipping() {
            level.instance = Some(instance);
            return self.goto(TraverseState::InstanceOpen);
        }
        let grow_to = match (level.collection, &instance) {
            (Collection::FixedArray(count), Instance::Index(i)) => {
                if *i == 0 || *i > count {
                    return Err(ProtocolError::BadInstance.into());
                }
                None
            }
            (Collection::VariableArray { .. }, Instance::Index(i)) => {
                if *i == 0 {
                    return Err(ProtocolError::BadInstance.into());
                }
                if *i <= level.count {
                    None
                } else if set {
                    Some(*i)
                } else {
                    return Err(ProtocolError::BadInstance.into());
                }
            }
            (Collection::VariableDictionary { .. }, Instance::Key(key)) => {
                if level.keys.contains(key) {
                    None
                } else if set {
                    Some(level.count + 1)
                } else {
                    return Err(ProtocolError::BadInstance.into());
                }
            }
            _ => return Err(ProtocolError::BadLocator.into()),
        };
        level.instance = Some(instance.clone());
        match grow_to {
            None => self.goto(TraverseState::InstanceOpen),
            Some(count) => {
                self.cursor.pending_count = count;
                self.cursor.pending_instance = Some(instance);
                self.trigger(Phase::InstancesSet);
                self.goto(TraverseState::InstanceGrown)
            }
        }
    }

    fn on_instance_grown(&mut self) -> Result<Flow> {
        if self.error.is_some() {
            return self.goto(TraverseState::ErrorReport);
        }
        self.cursor.pending_instance = None;
        let level = top(&mut self.cursor)?;
        let present = match &level.instance {
            Some(Instance::Index(i)) => *i <= level.count,
            Some(Instance::Key(key)) => level.keys.contains(key),
            None => false,
        };
        if !present {
            return Err(ProtocolError::BadInstance.into());
        }
        self.goto(TraverseState::InstanceOpen)
    }

    fn on_instance_remove(&mut self) -> Result<Flow> {
        match ready!(self.parser.peek()) {
            Token::Marker(Marker::Key) => {
                self.parser.consume();
                self.goto(TraverseState::InstanceRemoveKey)
            }
            Token::Integer(index) => {
                self.parser.consume();
                self.remove_instance(Instance::Index(index))
            }
            Token::Marker(_) => Err(ProtocolError::UnexpectedMarker.into()),
        }
    }

    fn remove_instance(&mut self, instance: Instance) -> Result<Flow> {
        let level = top(&mut self.cursor)?;
        let known = match (level.collection, &instance) {
            (Collection::VariableArray { .. }, Instance::Index(i)) => (1..=level.count).contains(i),
            (Collection::VariableDictionary { .. }, Instance::Key(key)) => level.keys.contains(key),
            _ => return Err(ProtocolError::BadLocator.into()),
        };
        if !known {
            return Err(ProtocolError::BadInstance.into());
        }
        self.cursor.pending_instance = Some(instance);
        self.trigger(Phase::InstanceRemove);
        self.goto(TraverseState::InstanceRemoved)
    }

    fn on_instance_open(&mut self) -> Result<Flow> {
        let level = top(&mut self.cursor)?;
        level.element_walk = level.instance_walk;
        level.items_seen = false;
        level.next_element = 0;
        level.element = None;
        let walk = level.element_walk;
        if !level.skipping() {
            let instance = level
                .instance
                .clone()
                .ok_or(Error::Internal("instance not selected"))?;
            self.generator.open_instance(&instance);
        }
        self.goto(after_element(walk))
    }

    // ---- elements -----------------------------------------------------------

    fn on_element_id(&mut self, desc: &RciDescriptor) -> Result<Flow> {
        let query = self.command.is_query();
        let set = self.command.is_set();
        match ready!(self.parser.peek()) {
            Token::Marker(Marker::Terminator) => {
                self.parser.consume();
                let level = top(&mut self.cursor)?;
                if !level.items_seen && query {
                    level.element_walk = Walk::All;
                    level.next_element = 0;
                    self.goto(TraverseState::AllElements)
                } else {
                    self.goto(TraverseState::InstanceEnd)
                }
            }
            Token::Integer(id) => {
                self.parser.consume();
                let def = self
                    .cursor
                    .top_def(&desc.schema)
                    .ok_or(Error::Internal("cursor outside schema"))?;
                let element = def
                    .elements
                    .get(id as usize)
                    .ok_or(ProtocolError::BadElementId(id))?;
                let level = top(&mut self.cursor)?;
                level.items_seen = true;
                level.element = Some(id);
                if let Some(list) = element.as_collection() {
                    self.push_level(id, list.collection, Walk::Requested)?;
                    return self.goto(TraverseState::CollectionStart);
                }
                self.cursor.value = None;
                if set {
                    self.goto(TraverseState::ElementValue)
                } else if element.access.readable() {
                    self.goto(TraverseState::ElementProcess)
                } else {
                    debug!("RCI[{}]: write-only element {} not queried", self.id, id);
                    self.goto(TraverseState::ElementId)
                }
            }
            Token::Marker(_) => Err(ProtocolError::UnexpectedMarker.into()),
        }
    }

    fn on_all_elements(&mut self, desc: &RciDescriptor) -> Result<Flow> {
        let query = self.command.is_query();
        let def = self
            .cursor
            .top_def(&desc.schema)
            .ok_or(Error::Internal("cursor outside schema"))?;
        let level = top(&mut self.cursor)?;
        let id = level.next_element;
        let Some(element) = def.elements.get(id as usize) else {
            return self.goto(TraverseState::InstanceEnd);
        };
        level.next_element += 1;
        level.element = Some(id);
        if let Some(list) = element.as_collection() {
            self.push_level(id, list.collection, Walk::All)?;
            return self.goto(TraverseState::CollectionStart);
        }
        if query && !element.access.readable() {
            return self.goto(TraverseState::AllElements);
        }
        self.cursor.value = None;
        self.goto(TraverseState::ElementProcess)
    }

    fn on_element_value(&mut self, desc: &RciDescriptor) -> Result<Flow> {
        let def = self
            .cursor
            .top_def(&desc.schema)
            .ok_or(Error::Internal("cursor outside schema"))?;
        let id = top(&mut self.cursor)?
            .element
            .ok_or(Error::Internal("no element selected"))?;
        let element = def
            .elements
            .get(id as usize)
            .ok_or(Error::Internal("element outside schema"))?;
        let value = ready!(self.parser.value(element.value_type));

        if top(&mut self.cursor)?.skipping() {
            return self.goto(TraverseState::ElementId);
        }
        if !element.access.writable() {
            self.inline_error(desc, id, GlobalError::BadDescriptor.id(), Some("read only"));
            return self.goto(TraverseState::ElementId);
        }
        if element.limit.is_some_and(|limit| !limit.check(&value)) {
            self.inline_error(desc, id, GlobalError::BadValue.id(), None);
            return self.goto(TraverseState::ElementId);
        }
        self.cursor.value = Some(value);
        self.goto(TraverseState::ElementProcess)
    }

    fn on_element_end(&mut self, desc: &RciDescriptor) -> Result<Flow> {
        let def = self
            .cursor
            .top_def(&desc.schema)
            .ok_or(Error::Internal("cursor outside schema"))?;
        let level = top(&mut self.cursor)?;
        let id = level.element.ok_or(Error::Internal("no element selected"))?;
        let next = after_element(level.element_walk);
        self.cursor.value = None;

        if let Some(slot) = self.error.take() {
            self.inline_error(desc, id, slot.id, slot.hint.as_deref());
            return self.goto(next);
        }
        if !self.command.is_query() {
            self.generator.element_no_value(id);
            return self.goto(next);
        }
        if self.command.compares() && self.response.compare_matches {
            debug!("RCI[{}]: element {} matches baseline, skipped", self.id, id);
            return self.goto(next);
        }
        let value_type = def
            .elements
            .get(id as usize)
            .ok_or(Error::Internal("element outside schema"))?
            .value_type;
        match self.response.value.take() {
            Some(value) if value.matches(value_type) => self.generator.element_value(id, &value),
            Some(value) => {
                warn!("RCI[{}]: element {} returned {:?} for {:?}", self.id, id, value, value_type);
                return Err(Error::Internal("element value does not match its type"));
            }
            None => {
                warn!("RCI[{}]: element {} returned no value", self.id, id);
                self.generator.element_no_value(id);
            }
        }
        self.goto(next)
    }

    // ---- errors -------------------------------------------------------------

    fn on_error_report(&mut self, desc: &RciDescriptor) -> Result<Flow> {
        let slot = self.error.take().unwrap_or(ErrorSlot {
            id: GlobalError::BadCommand.id(),
            hint: None,
        });
        warn!("RCI[{}]: command failed with error {}", self.id, slot.id);
        let description = self.describe(desc, slot.id);
        self.generator.error(&ErrorReport {
            id: slot.id,
            description,
            hint: slot.hint.as_deref(),
        });
        self.parser.discard();
        self.parser_state = ParserState::Error;
        self.goto(TraverseState::ErrorUnwind)
    }

    /// Release what the failed command still holds, innermost first.
    fn on_error_unwind(&mut self) -> Result<Flow> {
        self.error = None;
        if let Some(level) = self.cursor.top_mut() {
            if level.locked {
                self.trigger(Phase::InstancesUnlock);
            } else if level.started {
                level.started = false;
                self.trigger(Phase::CollectionEnd);
            } else {
                self.cursor.pop();
            }
            return self.goto(TraverseState::ErrorUnwind);
        }
        if self.action_started {
            self.action_started = false;
            self.trigger(Phase::ActionEnd);
            return self.goto(TraverseState::ErrorUnwind);
        }
        self.generator.close_all();
        self.goto(TraverseState::SessionEnd)
    }
}
