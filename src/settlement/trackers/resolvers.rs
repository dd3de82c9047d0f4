//! Request resolvers
//!
//! One resolver per request kind, registered at session setup. A resolver
//! searches candidates honoring every constraint, commits the claim against
//! the source, and only then invokes the request callback, so a nested
//! query inside the callback (or a second request in the same tick) sees
//! the reduced remainder. On no match the callback gets `None`; the caller
//! retries on its own next reconciliation pass, the resolver never queues.
//!
//! Tie-break policy: candidates matching the requested material exactly are
//! tried before any-material candidates; within a band candidates are
//! shuffled with the session RNG and the first full match wins, so stacks
//! at map edges are not starved. The furniture resolver instead picks the
//! nearest candidate (spatial affinity matters for burial).

use rand::seq::SliceRandom;

use crate::settlement::allocation::{
    AllocationPurpose, HauledEntityKind, HaulingAllocation, LiquidAllocation, PositionKind,
};
use crate::settlement::messages::{
    FurnitureAssignment, FurnitureAssignmentRequest, HaulingAllocationRequest,
    LiquidAllocationRequest, LiquidTransfer, LiquidTransferRequest, Message, MessageBus,
    MessageKind, PlantRemovalRequest, PlantToRemove,
};
use crate::settlement::session::SettlementState;
use crate::settlement::types::{EntityId, TileCoord};

/// Register all request resolvers on the bus
pub fn register(bus: &MessageBus) {
    bus.subscribe(MessageKind::RequestHaulingAllocation, |bus, state, message| {
        let Message::RequestHaulingAllocation(request) = message else {
            panic!("hauling resolver received unexpected message");
        };
        resolve_hauling(bus, state, request);
    });
    bus.subscribe(MessageKind::RequestLiquidAllocation, |bus, state, message| {
        let Message::RequestLiquidAllocation(request) = message else {
            panic!("liquid allocation resolver received unexpected message");
        };
        resolve_liquid_allocation(bus, state, request);
    });
    bus.subscribe(MessageKind::RequestLiquidTransfer, |bus, state, message| {
        let Message::RequestLiquidTransfer(request) = message else {
            panic!("liquid transfer resolver received unexpected message");
        };
        resolve_liquid_transfer(bus, state, request);
    });
    bus.subscribe(MessageKind::RequestPlantRemoval, |bus, state, message| {
        let Message::RequestPlantRemoval(request) = message else {
            panic!("plant removal resolver received unexpected message");
        };
        resolve_plant_removal(bus, state, request);
    });
    bus.subscribe(MessageKind::RequestFurnitureAssignment, |bus, state, message| {
        let Message::RequestFurnitureAssignment(request) = message else {
            panic!("furniture assignment resolver received unexpected message");
        };
        resolve_furniture_assignment(bus, state, request);
    });
}

fn resolve_hauling(bus: &MessageBus, state: &mut SettlementState, request: &HaulingAllocationRequest) {
    if let Some(item) = request.specific_item {
        let satisfiable = state.items.get(item).map_or(false, |record| {
            record.num_unallocated() >= request.quantity
                && request.required_item_type.map_or(true, |t| record.item_type == t)
        });
        if satisfiable {
            commit_hauling(bus, state, request, item);
        } else {
            request.callback.resolve(bus, state, None);
        }
        return;
    }

    let Some(item_type) = request.required_item_type else {
        log::warn!("hauling request from {} names no item type", request.requester);
        request.callback.resolve(bus, state, None);
        return;
    };

    let mut bands: Vec<Vec<EntityId>> = Vec::new();
    if let Some(material) = request.required_material {
        bands.push(state.items.unallocated_matching(item_type, Some(material)));
    }
    bands.push(state.items.unallocated_matching(item_type, None));

    let mut chosen = None;
    for mut band in bands {
        band.shuffle(&mut state.rng);
        if let Some(item) = band
            .into_iter()
            .find(|id| state.items.num_unallocated(*id) >= request.quantity)
        {
            chosen = Some(item);
            break;
        }
    }

    match chosen {
        Some(item) => commit_hauling(bus, state, request, item),
        None => request.callback.resolve(bus, state, None),
    }
}

fn commit_hauling(
    bus: &MessageBus,
    state: &mut SettlementState,
    request: &HaulingAllocationRequest,
    item: EntityId,
) {
    let Some(record) = state.items.get(item) else {
        request.callback.resolve(bus, state, None);
        return;
    };
    let (location, container, item_type) = (record.location, record.container, record.item_type);
    let allocation = state.items.allocate(
        item,
        request.quantity,
        AllocationPurpose::DueToBeHauled,
        request.requester,
    );
    let hauling = HaulingAllocation {
        source_position: location,
        source_kind: if container.is_some() {
            PositionKind::FurnitureSlot
        } else {
            PositionKind::Floor
        },
        source_container: container,
        target_position: request.target_position,
        target_kind: request.target_kind,
        target_id: request.target_id,
        hauled_entity: item,
        hauled_entity_kind: HauledEntityKind::ItemStack,
        hauled_item_type: Some(item_type),
        item_allocation: Some(allocation),
    };
    request.callback.resolve(bus, state, Some(hauling));
}

fn resolve_liquid_allocation(
    bus: &MessageBus,
    state: &mut SettlementState,
    request: &LiquidAllocationRequest,
) {
    let mut candidates = state
        .liquids
        .sources_with_unallocated(request.material, request.volume, None);
    candidates.shuffle(&mut state.rng);
    let Some(container) = candidates.first().copied() else {
        request.callback.resolve(bus, state, None);
        return;
    };
    let allocation =
        state
            .liquids
            .allocate(container, request.material, request.volume, request.requester);
    request.callback.resolve(bus, state, Some(allocation));
}

fn resolve_liquid_transfer(
    bus: &MessageBus,
    state: &mut SettlementState,
    request: &LiquidTransferRequest,
) {
    let mut candidates: Vec<(EntityId, TileCoord)> = state
        .liquids
        .sources_with_unallocated(request.material, request.volume, Some(request.target_container))
        .into_iter()
        .filter_map(|id| state.furniture.get(id).map(|f| (id, f.location)))
        .collect();
    candidates.shuffle(&mut state.rng);
    let Some((container, source_position)) = candidates.first().copied() else {
        request.callback.resolve(bus, state, None);
        return;
    };
    let allocation =
        state
            .liquids
            .allocate(container, request.material, request.volume, request.requester);
    let transfer = LiquidTransfer {
        allocation,
        source_position,
    };
    request.callback.resolve(bus, state, Some(transfer));
}

fn resolve_plant_removal(
    bus: &MessageBus,
    state: &mut SettlementState,
    request: &PlantRemovalRequest,
) {
    let result = state
        .map
        .tile_at(request.location)
        .and_then(|tile| tile.plant)
        .map(|plant| PlantToRemove {
            location: request.location,
            species: plant.species,
        });
    request.callback.resolve(bus, state, result);
}

fn resolve_furniture_assignment(
    bus: &MessageBus,
    state: &mut SettlementState,
    request: &FurnitureAssignmentRequest,
) {
    let candidates =
        state
            .furniture
            .find_by_tag(&state.dictionaries.furniture_types, &request.required_tag, true);
    // Nearest workable candidate, lowest id on ties.
    let mut eligible: Vec<(usize, EntityId)> = candidates
        .into_iter()
        .filter_map(|id| {
            let record = state.furniture.get(id)?;
            if let Some(within) = &request.within {
                if !within.contains(&record.location) {
                    return None;
                }
            }
            if !state.map.is_navigable(record.workspace) {
                return None;
            }
            Some((record.location.distance_to(&request.near), id))
        })
        .collect();
    eligible.sort();
    let Some((_, furniture)) = eligible.first().copied() else {
        request.callback.resolve(bus, state, None);
        return;
    };

    state.furniture.assign(furniture, request.assign_to);
    let Some(record) = state.furniture.get(furniture) else {
        request.callback.resolve(bus, state, None);
        return;
    };
    let assignment = FurnitureAssignment {
        furniture,
        position: record.location,
        workspace: record.workspace,
    };
    request.callback.resolve(bus, state, Some(assignment));
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::rc::Rc;

    use crate::settlement::messages::SingleShot;
    use crate::settlement::test_support::{empty_state, names};

    fn request_bus() -> MessageBus {
        let bus = MessageBus::new();
        register(&bus);
        bus
    }

    #[test]
    fn test_second_request_sees_reduced_remainder() {
        let bus = request_bus();
        let mut state = empty_state();
        let grain = names::item_type(&state, "grain");
        let stack = state.spawn_item(grain, names::material(&state, "oak"), 5, TileCoord::new(1, 1));

        let results = Rc::new(RefCell::new(Vec::new()));
        for _ in 0..2 {
            let results = Rc::clone(&results);
            bus.publish(
                &mut state,
                Message::RequestHaulingAllocation(HaulingAllocationRequest {
                    requester: EntityId(100),
                    specific_item: None,
                    required_item_type: Some(grain),
                    required_material: None,
                    quantity: 3,
                    target_position: TileCoord::new(5, 5),
                    target_kind: PositionKind::Floor,
                    target_id: None,
                    callback: SingleShot::new(move |_, _, result| {
                        results.borrow_mut().push(result.is_some());
                    }),
                }),
            );
        }

        // 5 in the stack: the first claim of 3 leaves 2, so the second
        // request of 3 must come back empty.
        assert_eq!(*results.borrow(), vec![true, false]);
        assert_eq!(state.items.num_unallocated(stack), 2);
    }

    #[test]
    fn test_exact_material_band_preferred() {
        let bus = request_bus();
        let mut state = empty_state();
        let grain = names::item_type(&state, "grain");
        let oak = names::material(&state, "oak");
        let soil = names::material(&state, "soil");
        state.spawn_item(grain, soil, 5, TileCoord::new(0, 0));
        let oak_stack = state.spawn_item(grain, oak, 5, TileCoord::new(7, 7));

        let chosen = Rc::new(RefCell::new(None));
        let chosen_inner = Rc::clone(&chosen);
        bus.publish(
            &mut state,
            Message::RequestHaulingAllocation(HaulingAllocationRequest {
                requester: EntityId(100),
                specific_item: None,
                required_item_type: Some(grain),
                required_material: Some(oak),
                quantity: 2,
                target_position: TileCoord::new(4, 4),
                target_kind: PositionKind::Floor,
                target_id: None,
                callback: SingleShot::new(move |_, _, result: Option<HaulingAllocation>| {
                    *chosen_inner.borrow_mut() = result.map(|h| h.hauled_entity);
                }),
            }),
        );

        assert_eq!(*chosen.borrow(), Some(oak_stack));
    }

    #[test]
    fn test_furniture_assignment_committed_before_callback() {
        let bus = request_bus();
        let mut state = empty_state();
        let grave = state.spawn_furniture(
            names::furniture_type(&state, "sarcophagus"),
            TileCoord::new(3, 3),
            TileCoord::new(3, 4),
        );
        let corpse = state.spawn_creature("dwarf", TileCoord::new(0, 0));
        state.creatures.mark_dead(corpse);

        let observed = Rc::new(RefCell::new(None));
        let observed_inner = Rc::clone(&observed);
        bus.publish(
            &mut state,
            Message::RequestFurnitureAssignment(FurnitureAssignmentRequest {
                required_tag: "grave".to_string(),
                assign_to: corpse,
                near: TileCoord::new(0, 0),
                within: None,
                callback: SingleShot::new(move |_, state, result: Option<FurnitureAssignment>| {
                    // The reservation must already be visible here.
                    let assignment = result.expect("assignment expected");
                    *observed_inner.borrow_mut() =
                        state.furniture.get(assignment.furniture).and_then(|f| f.assigned_to);
                }),
            }),
        );

        assert_eq!(*observed.borrow(), Some(corpse));
        assert_eq!(state.furniture.get(grave).and_then(|f| f.assigned_to), Some(corpse));
    }

    #[test]
    fn test_unreachable_workspace_is_skipped() {
        let bus = request_bus();
        let mut state = empty_state();
        state.spawn_furniture(
            names::furniture_type(&state, "sarcophagus"),
            TileCoord::new(3, 3),
            TileCoord::new(3, 4),
        );
        state.map.set_navigable(TileCoord::new(3, 4), false);
        let corpse = state.spawn_creature("dwarf", TileCoord::new(0, 0));
        state.creatures.mark_dead(corpse);

        let resolved = Rc::new(RefCell::new(true));
        let resolved_inner = Rc::clone(&resolved);
        bus.publish(
            &mut state,
            Message::RequestFurnitureAssignment(FurnitureAssignmentRequest {
                required_tag: "grave".to_string(),
                assign_to: corpse,
                near: TileCoord::new(0, 0),
                within: None,
                callback: SingleShot::new(move |_, _, result| {
                    *resolved_inner.borrow_mut() = result.is_some();
                }),
            }),
        );
        assert!(!*resolved.borrow());
    }

    #[test]
    fn test_plant_removal_on_bare_tile_resolves_none() {
        let bus = request_bus();
        let mut state = empty_state();

        let resolved = Rc::new(RefCell::new(true));
        let resolved_inner = Rc::clone(&resolved);
        bus.publish(
            &mut state,
            Message::RequestPlantRemoval(PlantRemovalRequest {
                location: TileCoord::new(2, 2),
                callback: SingleShot::new(move |_, _, result| {
                    *resolved_inner.borrow_mut() = result.is_some();
                }),
            }),
        );
        assert!(!*resolved.borrow());
    }

    #[test]
    fn test_liquid_allocation_commits_before_callback() {
        let bus = request_bus();
        let mut state = empty_state();
        let water = names::material(&state, "water");
        let barrel = state.spawn_liquid_container(
            names::furniture_type(&state, "barrel"),
            TileCoord::new(6, 6),
            TileCoord::new(6, 5),
            10.0,
        );
        state.liquids.add_volume(barrel, water, 5.0);

        let remaining = Rc::new(RefCell::new(0.0f32));
        let remaining_inner = Rc::clone(&remaining);
        bus.publish(
            &mut state,
            Message::RequestLiquidAllocation(LiquidAllocationRequest {
                requester: EntityId(100),
                material: water,
                volume: 3.0,
                callback: SingleShot::new(move |_, state, result: Option<LiquidAllocation>| {
                    let allocation = result.expect("allocation expected");
                    // The claim is already visible inside the callback.
                    *remaining_inner.borrow_mut() = state
                        .liquids
                        .get(allocation.container)
                        .map(|c| c.num_unallocated())
                        .unwrap_or(-1.0);
                }),
            }),
        );
        assert!((*remaining.borrow() - 2.0).abs() < 1e-3);
    }

    #[test]
    fn test_liquid_transfer_excludes_target_container() {
        let bus = request_bus();
        let mut state = empty_state();
        let water = names::material(&state, "water");
        let target = state.spawn_liquid_container(
            names::furniture_type(&state, "cauldron"),
            TileCoord::new(2, 2),
            TileCoord::new(2, 3),
            10.0,
        );
        state.liquids.add_volume(target, water, 4.0);

        // The only candidate holds the liquid already at the target.
        let resolved = Rc::new(RefCell::new(true));
        let resolved_inner = Rc::clone(&resolved);
        bus.publish(
            &mut state,
            Message::RequestLiquidTransfer(LiquidTransferRequest {
                requester: target,
                material: water,
                volume: 2.0,
                target_container: target,
                target_position: TileCoord::new(2, 2),
                callback: SingleShot::new(move |_, _, result| {
                    *resolved_inner.borrow_mut() = result.is_some();
                }),
            }),
        );
        assert!(!*resolved.borrow());
    }
}
