//! Synchronous message bus and typed messages
//!
//! Immediate-dispatch publish/subscribe: every listener registered for a
//! message kind runs to completion, in registration order, before `publish`
//! returns. A listener may itself publish further messages; request →
//! allocation → job-creation routinely chains inside one call stack.
//!
//! Request messages carry a single-shot continuation that the resolver
//! invokes exactly once, synchronously, with `Some(result)` or `None`.
//! "Nothing found" is a `None` result, never an error; a handler receiving
//! a message variant it is not typed for is a programming error and panics.

use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;

use crate::settlement::allocation::{HaulingAllocation, LiquidAllocation, PositionKind};
use crate::settlement::dictionaries::{ItemTypeId, MaterialId, PlantSpeciesId};
use crate::settlement::session::SettlementState;
use crate::settlement::types::{EntityId, JobId, TileCoord};

/// Discriminant used for listener registration
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum MessageKind {
    JobCreated,
    JobCompleted,
    JobCancelled,
    JobRemoved,
    RequestHaulingAllocation,
    RequestLiquidAllocation,
    RequestLiquidTransfer,
    RequestPlantRemoval,
    RequestFurnitureAssignment,
}

impl MessageKind {
    /// Request kinds must always have a resolver registered
    pub fn is_request(&self) -> bool {
        matches!(
            self,
            MessageKind::RequestHaulingAllocation
                | MessageKind::RequestLiquidAllocation
                | MessageKind::RequestLiquidTransfer
                | MessageKind::RequestPlantRemoval
                | MessageKind::RequestFurnitureAssignment
        )
    }
}

type Continuation<T> = Box<dyn FnOnce(&MessageBus, &mut SettlementState, Option<T>)>;

/// A continuation invoked exactly once, synchronously, by a resolver
pub struct SingleShot<T> {
    continuation: RefCell<Option<Continuation<T>>>,
}

impl<T> SingleShot<T> {
    pub fn new(f: impl FnOnce(&MessageBus, &mut SettlementState, Option<T>) + 'static) -> Self {
        SingleShot {
            continuation: RefCell::new(Some(Box::new(f))),
        }
    }

    /// Invoke the continuation. Panics if already resolved.
    pub fn resolve(&self, bus: &MessageBus, state: &mut SettlementState, result: Option<T>) {
        let continuation = self
            .continuation
            .borrow_mut()
            .take()
            .expect("request continuation resolved twice");
        continuation(bus, state, result);
    }

    pub fn is_resolved(&self) -> bool {
        self.continuation.borrow().is_none()
    }
}

impl<T> fmt::Debug for SingleShot<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_resolved() {
            write!(f, "SingleShot(resolved)")
        } else {
            write!(f, "SingleShot(pending)")
        }
    }
}

/// Request for a claim on a stack to haul somewhere
#[derive(Debug)]
pub struct HaulingAllocationRequest {
    pub requester: EntityId,
    /// Claim exactly this stack instead of searching by constraints
    pub specific_item: Option<EntityId>,
    pub required_item_type: Option<ItemTypeId>,
    pub required_material: Option<MaterialId>,
    pub quantity: u32,
    pub target_position: TileCoord,
    pub target_kind: PositionKind,
    pub target_id: Option<EntityId>,
    pub callback: SingleShot<HaulingAllocation>,
}

/// Request for a claim on a volume of liquid, wherever it is held
#[derive(Debug)]
pub struct LiquidAllocationRequest {
    pub requester: EntityId,
    pub material: MaterialId,
    pub volume: f32,
    pub callback: SingleShot<LiquidAllocation>,
}

/// Resolution of a transfer request: the source claim plus where it sits
#[derive(Clone, Debug)]
pub struct LiquidTransfer {
    pub allocation: LiquidAllocation,
    pub source_position: TileCoord,
}

/// Request to move a volume of liquid into a target container
#[derive(Debug)]
pub struct LiquidTransferRequest {
    pub requester: EntityId,
    pub material: MaterialId,
    pub volume: f32,
    pub target_container: EntityId,
    pub target_position: TileCoord,
    pub callback: SingleShot<LiquidTransfer>,
}

/// Resolution of a plant-removal request
#[derive(Clone, Copy, Debug)]
pub struct PlantToRemove {
    pub location: TileCoord,
    pub species: PlantSpeciesId,
}

/// Request to clear an unwanted plant from a tile
#[derive(Debug)]
pub struct PlantRemovalRequest {
    pub location: TileCoord,
    pub callback: SingleShot<PlantToRemove>,
}

/// Resolution of a furniture-assignment request
#[derive(Clone, Copy, Debug)]
pub struct FurnitureAssignment {
    pub furniture: EntityId,
    pub position: TileCoord,
    pub workspace: TileCoord,
}

/// Request to reserve a piece of tagged furniture for an entity
///
/// The resolver commits the assignment before invoking the callback, so a
/// second request in the same tick cannot reserve the same furniture.
#[derive(Debug)]
pub struct FurnitureAssignmentRequest {
    pub required_tag: String,
    pub assign_to: EntityId,
    pub near: TileCoord,
    /// Restrict candidates to these tiles (a room footprint), if set
    pub within: Option<Vec<TileCoord>>,
    pub callback: SingleShot<FurnitureAssignment>,
}

/// A typed message dispatched over the bus
#[derive(Debug)]
pub enum Message {
    JobCreated { job_id: JobId },
    JobCompleted { job_id: JobId },
    JobCancelled { job_id: JobId },
    JobRemoved { job_id: JobId },
    RequestHaulingAllocation(HaulingAllocationRequest),
    RequestLiquidAllocation(LiquidAllocationRequest),
    RequestLiquidTransfer(LiquidTransferRequest),
    RequestPlantRemoval(PlantRemovalRequest),
    RequestFurnitureAssignment(FurnitureAssignmentRequest),
}

impl Message {
    pub fn kind(&self) -> MessageKind {
        match self {
            Message::JobCreated { .. } => MessageKind::JobCreated,
            Message::JobCompleted { .. } => MessageKind::JobCompleted,
            Message::JobCancelled { .. } => MessageKind::JobCancelled,
            Message::JobRemoved { .. } => MessageKind::JobRemoved,
            Message::RequestHaulingAllocation(_) => MessageKind::RequestHaulingAllocation,
            Message::RequestLiquidAllocation(_) => MessageKind::RequestLiquidAllocation,
            Message::RequestLiquidTransfer(_) => MessageKind::RequestLiquidTransfer,
            Message::RequestPlantRemoval(_) => MessageKind::RequestPlantRemoval,
            Message::RequestFurnitureAssignment(_) => MessageKind::RequestFurnitureAssignment,
        }
    }
}

/// Listener signature: handlers may publish further messages via the bus
pub type MessageHandler = Rc<dyn Fn(&MessageBus, &mut SettlementState, &Message)>;

/// Synchronous, immediate-dispatch publish/subscribe channel
#[derive(Default)]
pub struct MessageBus {
    listeners: RefCell<HashMap<MessageKind, Vec<MessageHandler>>>,
}

impl MessageBus {
    pub fn new() -> Self {
        MessageBus::default()
    }

    /// Register a listener; listeners for one kind run in registration order
    pub fn subscribe(
        &self,
        kind: MessageKind,
        handler: impl Fn(&MessageBus, &mut SettlementState, &Message) + 'static,
    ) {
        self.listeners
            .borrow_mut()
            .entry(kind)
            .or_default()
            .push(Rc::new(handler));
    }

    /// Dispatch to every listener of the message's kind before returning
    pub fn publish(&self, state: &mut SettlementState, message: Message) {
        let kind = message.kind();
        // Snapshot so a listener subscribing mid-dispatch cannot invalidate
        // the iteration.
        let handlers: Vec<MessageHandler> = self
            .listeners
            .borrow()
            .get(&kind)
            .cloned()
            .unwrap_or_default();
        debug_assert!(
            !(kind.is_request() && handlers.is_empty()),
            "no resolver registered for {:?}",
            kind
        );
        for handler in &handlers {
            handler(self, state, &message);
        }
    }

    pub fn listener_count(&self, kind: MessageKind) -> usize {
        self.listeners
            .borrow()
            .get(&kind)
            .map(|l| l.len())
            .unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::settlement::test_support::empty_state;

    #[test]
    fn test_listeners_run_in_registration_order() {
        let bus = MessageBus::new();
        let mut state = empty_state();
        let order = Rc::new(RefCell::new(Vec::new()));

        for label in ["first", "second", "third"] {
            let order = Rc::clone(&order);
            bus.subscribe(MessageKind::JobCreated, move |_, _, _| {
                order.borrow_mut().push(label);
            });
        }

        bus.publish(&mut state, Message::JobCreated { job_id: JobId(1) });
        assert_eq!(*order.borrow(), vec!["first", "second", "third"]);
    }

    #[test]
    fn test_reentrant_publish() {
        let bus = MessageBus::new();
        let mut state = empty_state();
        let seen = Rc::new(RefCell::new(Vec::new()));

        {
            let seen = Rc::clone(&seen);
            bus.subscribe(MessageKind::JobCreated, move |bus, state, message| {
                let Message::JobCreated { job_id } = message else {
                    panic!("job-created listener received unexpected message");
                };
                seen.borrow_mut().push(*job_id);
                if job_id.0 == 1 {
                    bus.publish(state, Message::JobCreated { job_id: JobId(2) });
                }
            });
        }

        bus.publish(&mut state, Message::JobCreated { job_id: JobId(1) });
        assert_eq!(*seen.borrow(), vec![JobId(1), JobId(2)]);
    }

    #[test]
    fn test_single_shot_resolves_once() {
        let bus = MessageBus::new();
        let mut state = empty_state();
        let hits = Rc::new(RefCell::new(0u32));
        let hits_inner = Rc::clone(&hits);

        let shot: SingleShot<u32> = SingleShot::new(move |_, _, result| {
            assert_eq!(result, Some(7));
            *hits_inner.borrow_mut() += 1;
        });
        assert!(!shot.is_resolved());
        shot.resolve(&bus, &mut state, Some(7));
        assert!(shot.is_resolved());
        assert_eq!(*hits.borrow(), 1);
    }

    #[test]
    #[should_panic(expected = "resolved twice")]
    fn test_single_shot_panics_on_double_resolve() {
        let bus = MessageBus::new();
        let mut state = empty_state();
        let shot: SingleShot<u32> = SingleShot::new(|_, _, _| {});
        shot.resolve(&bus, &mut state, None);
        shot.resolve(&bus, &mut state, None);
    }
}
