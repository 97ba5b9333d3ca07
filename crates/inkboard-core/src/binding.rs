//! Connector-to-shape attachment.
//!
//! A binding stores where along the bound shape's diagonal the endpoint
//! projects (`focus`) and how far it floats off the outline (`gap`). The
//! endpoint position is recomputed from those two numbers whenever the shape
//! moves, resizes or rotates, so connectors follow their shapes without
//! re-running hit tests.

use crate::element::{Binding, Element, ElementId, Endpoint, anchor_world_points};
use crate::store::{ElementPatch, Scene};
use kurbo::{Point, Vec2};
use std::collections::{HashMap, HashSet};

/// Topmost active bindable element whose bounds, grown by `margin / zoom`,
/// contain the point.
pub fn find_bind_candidate<'a>(
    point: Point,
    elements: &'a [Element],
    exclude: &[ElementId],
    zoom: f64,
    margin: f64,
) -> Option<&'a Element> {
    let grow = margin / zoom.max(f64::EPSILON);
    elements.iter().rev().find(|e| {
        if !e.is_active() || !e.is_bindable() || exclude.contains(&e.id()) {
            return false;
        }
        let local = e.to_local(point);
        let half = e.half_extents();
        local.x.abs() <= half.x + grow && local.y.abs() <= half.y + grow
    })
}

/// Projection of a point onto the shape's diagonal, `0` at the centre and
/// `±1` at the corners.
pub fn focus_for(shape: &Element, point: Point) -> f64 {
    let half = shape.half_extents();
    let len_sq = half.hypot2();
    if len_sq < f64::EPSILON {
        return 0.0;
    }
    shape.to_local(point).dot(half) / len_sq
}

/// Binding describing where `point` sits relative to `shape`.
pub fn binding_for(shape: &Element, point: Point) -> Binding {
    Binding {
        element_id: shape.id(),
        focus: focus_for(shape, point),
        gap: shape.distance_to_outline(point),
    }
}

/// Scene position of an endpoint bound to `shape`.
///
/// All candidates lie on the line through the focus point perpendicular to
/// the diagonal, which keeps the focus invariant. The endpoint lands on the
/// side facing `adjacent` at `gap` from the outline.
pub fn bound_point(shape: &Element, binding: &Binding, adjacent: Point) -> Point {
    let half = shape.half_extents();
    let diag = half.hypot();
    if diag < f64::EPSILON {
        return shape.center();
    }
    let foot = half * binding.focus;
    let normal = Vec2::new(-half.y, half.x) / diag;
    let side = if shape.to_local(adjacent).dot(normal) < 0.0 {
        -1.0
    } else {
        1.0
    };
    let dir = normal * side;
    let gap = binding.gap.max(0.0);
    let dist = |s: f64| shape.local_distance_to_outline(foot + dir * s);

    // Distance to a convex outline is convex along a line: find the minimum,
    // then walk outwards to where the distance reaches the gap.
    let reach = 2.0 * diag + gap + 1.0;
    let (mut lo, mut hi) = (-reach, reach);
    for _ in 0..100 {
        let m1 = lo + (hi - lo) / 3.0;
        let m2 = hi - (hi - lo) / 3.0;
        if dist(m1) <= dist(m2) {
            hi = m2;
        } else {
            lo = m1;
        }
    }
    let start = (lo + hi) / 2.0;
    if dist(start) > gap {
        return shape.from_local(foot + dir * start);
    }
    let (mut lo, mut hi) = (start, reach);
    for _ in 0..80 {
        let mid = (lo + hi) / 2.0;
        if dist(mid) <= gap {
            lo = mid;
        } else {
            hi = mid;
        }
    }
    shape.from_local(foot + dir * ((lo + hi) / 2.0))
}

/// Active connectors with at least one end bound to `target`.
pub fn bound_connectors(elements: &[Element], target: ElementId) -> Vec<ElementId> {
    elements
        .iter()
        .filter(|e| e.is_active() && e.is_connector() && e.is_bound_to(target))
        .map(|e| e.id())
        .collect()
}

fn binding_patch(patch: ElementPatch, endpoint: Endpoint, binding: Option<Binding>) -> ElementPatch {
    match endpoint {
        Endpoint::Start => patch.start_binding(binding),
        Endpoint::End => patch.end_binding(binding),
    }
}

fn other(endpoint: Endpoint) -> Endpoint {
    match endpoint {
        Endpoint::Start => Endpoint::End,
        Endpoint::End => Endpoint::Start,
    }
}

/// A straight two-point connector never binds both ends to the same shape.
pub fn can_bind(connector: &Element, endpoint: Endpoint, candidate: ElementId) -> bool {
    let simple = connector.points().is_some_and(|p| p.len() == 2);
    let other_bound = connector
        .binding(other(endpoint))
        .is_some_and(|b| b.element_id == candidate);
    !(simple && other_bound)
}

/// Bind one end of a connector to `candidate_id` from the current geometry.
pub fn establish_binding(
    scene: &mut Scene,
    connector_id: ElementId,
    endpoint: Endpoint,
    candidate_id: ElementId,
) -> Option<Binding> {
    let connector = scene
        .get_active_by_id(connector_id)
        .filter(|e| e.is_connector())?;
    let candidate = scene
        .get_active_by_id(candidate_id)
        .filter(|e| e.is_bindable())?;
    if !can_bind(connector, endpoint, candidate_id) {
        return None;
    }
    let point = connector.endpoint_world(endpoint)?;
    let binding = binding_for(candidate, point);
    if connector.binding(endpoint) == Some(&binding) {
        return Some(binding);
    }
    log::debug!(
        "Binding {:?} of {} to {} (focus {:.3}, gap {:.2})",
        endpoint,
        connector_id,
        candidate_id,
        binding.focus,
        binding.gap
    );
    scene.mutate(
        connector_id,
        binding_patch(ElementPatch::new(), endpoint, Some(binding)),
    );
    Some(binding)
}

/// Clear one end's binding. Returns whether there was one.
pub fn release_binding(scene: &mut Scene, connector_id: ElementId, endpoint: Endpoint) -> bool {
    let bound = scene
        .get(connector_id)
        .is_some_and(|c| c.binding(endpoint).is_some());
    if bound {
        log::debug!("Releasing {:?} binding of {}", endpoint, connector_id);
        scene.mutate(connector_id, binding_patch(ElementPatch::new(), endpoint, None));
    }
    bound
}

/// Reposition every connector endpoint bound to `moved_id` against the
/// element's current geometry. Returns the connectors that were updated.
pub fn propagate_bound_movement(scene: &mut Scene, moved_id: ElementId) -> Vec<ElementId> {
    let Some(shape) = scene
        .get_active_by_id(moved_id)
        .filter(|e| e.is_bindable())
        .cloned()
    else {
        return Vec::new();
    };
    let connectors = bound_connectors(scene.get_all(), moved_id);
    for id in &connectors {
        let Some(connector) = scene.get(*id) else {
            continue;
        };
        let mut world = connector.world_points();
        if world.is_empty() {
            continue;
        }
        for endpoint in Endpoint::BOTH {
            let Some(binding) = connector
                .binding(endpoint)
                .filter(|b| b.element_id == moved_id)
                .copied()
            else {
                continue;
            };
            let len = world.len();
            let adjacent = world[endpoint.adjacent_index(len)];
            world[endpoint.index(len)] = bound_point(&shape, &binding, adjacent);
        }
        let (origin, points) = anchor_world_points(connector.angle, &world);
        scene.mutate(
            *id,
            ElementPatch::new().position(origin.x, origin.y).points(points),
        );
    }
    connectors
}

/// Rebind or release both ends of a connector based on where they are now.
/// With binding disabled every end is released.
///
/// Both ends are resolved together, so a connector whose ends swapped shapes
/// is rebound in one step.
pub fn bind_or_unbind_connector(
    scene: &mut Scene,
    connector_id: ElementId,
    zoom: f64,
    margin: f64,
    enabled: bool,
) {
    let Some(connector) = scene
        .get_active_by_id(connector_id)
        .filter(|e| e.is_connector())
    else {
        return;
    };
    let simple = connector.points().is_some_and(|p| p.len() == 2);
    let mut bindings: [Option<Binding>; 2] = [None, None];
    if enabled {
        for (slot, endpoint) in bindings.iter_mut().zip(Endpoint::BOTH) {
            *slot = connector.endpoint_world(endpoint).and_then(|point| {
                find_bind_candidate(point, scene.get_all(), &[connector_id], zoom, margin)
                    .map(|shape| binding_for(shape, point))
            });
        }
        let same_target = matches!(
            (&bindings[0], &bindings[1]),
            (Some(a), Some(b)) if a.element_id == b.element_id
        );
        if simple && same_target {
            bindings[1] = None;
        }
    }

    let mut patch = ElementPatch::new();
    for (endpoint, binding) in Endpoint::BOTH.into_iter().zip(bindings) {
        if connector.binding(endpoint) != binding.as_ref() {
            log::debug!(
                "{:?} of {} now bound to {:?}",
                endpoint,
                connector_id,
                binding.map(|b| b.element_id)
            );
            patch = binding_patch(patch, endpoint, binding);
        }
    }
    if !patch.is_empty() {
        scene.mutate(connector_id, patch);
    }
}

/// Element an endpoint would bind to if released at its current position.
pub fn suggested_binding(
    scene: &Scene,
    connector: &Element,
    endpoint: Endpoint,
    zoom: f64,
    margin: f64,
) -> Option<ElementId> {
    let point = connector.endpoint_world(endpoint)?;
    find_bind_candidate(point, scene.get_all(), &[connector.id()], zoom, margin)
        .map(|e| e.id())
        .filter(|target| can_bind(connector, endpoint, *target))
}

/// Point bindings of duplicated connectors at the duplicated shapes. Bindings
/// to shapes that were not duplicated stay on the originals.
pub fn remap_bindings_on_duplication(scene: &mut Scene, original_to_new: &HashMap<ElementId, ElementId>) {
    for new_id in original_to_new.values() {
        let Some(connector) = scene.get(*new_id).filter(|e| e.is_connector()) else {
            continue;
        };
        let mut patch = ElementPatch::new();
        for endpoint in Endpoint::BOTH {
            let Some(binding) = connector.binding(endpoint) else {
                continue;
            };
            if let Some(target) = original_to_new.get(&binding.element_id) {
                let remapped = Binding {
                    element_id: *target,
                    ..*binding
                };
                patch = binding_patch(patch, endpoint, Some(remapped));
            }
        }
        if !patch.is_empty() {
            scene.mutate(*new_id, patch);
        }
    }
}

/// Detach connectors from deleted elements without moving them. Returns the
/// connectors that changed.
pub fn clear_bindings_on_deletion(scene: &mut Scene, deleted_ids: &[ElementId]) -> Vec<ElementId> {
    let deleted: HashSet<ElementId> = deleted_ids.iter().copied().collect();
    let affected: Vec<(ElementId, ElementPatch)> = scene
        .get_active()
        .filter(|e| e.is_connector() && !deleted.contains(&e.id()))
        .filter_map(|connector| {
            let mut patch = ElementPatch::new();
            for endpoint in Endpoint::BOTH {
                if connector
                    .binding(endpoint)
                    .is_some_and(|b| deleted.contains(&b.element_id))
                {
                    patch = binding_patch(patch, endpoint, None);
                }
            }
            (!patch.is_empty()).then_some((connector.id(), patch))
        })
        .collect();
    affected
        .into_iter()
        .map(|(id, patch)| {
            scene.mutate(id, patch);
            id
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f64::consts::FRAC_PI_2;

    const MARGIN: f64 = 32.0;

    fn two_rects_and_connector() -> (Scene, ElementId, ElementId, ElementId) {
        let mut scene = Scene::new();
        let left = scene.insert(Element::rectangle(0.0, 0.0, 200.0, 500.0));
        let right = scene.insert(Element::rectangle(400.0, 0.0, 200.0, 500.0));
        let connector = scene.insert(Element::connector(
            Point::new(220.0, 250.0),
            Point::new(380.0, 250.0),
        ));
        (scene, left, right, connector)
    }

    fn assert_close(a: Point, b: Point, tol: f64) {
        assert!(
            (a - b).hypot() < tol,
            "expected {:?} to be within {} of {:?}",
            a,
            tol,
            b
        );
    }

    #[test]
    fn test_find_candidate_within_margin() {
        let (scene, left, right, connector) = two_rects_and_connector();
        let hit = find_bind_candidate(Point::new(220.0, 250.0), scene.get_all(), &[connector], 1.0, MARGIN);
        assert_eq!(hit.map(|e| e.id()), Some(left));
        let hit = find_bind_candidate(Point::new(380.0, 250.0), scene.get_all(), &[connector], 1.0, MARGIN);
        assert_eq!(hit.map(|e| e.id()), Some(right));
        let miss = find_bind_candidate(Point::new(300.0, 250.0), scene.get_all(), &[connector], 1.0, MARGIN);
        assert!(miss.is_none());
    }

    #[test]
    fn test_find_candidate_margin_scales_with_zoom() {
        let (scene, _, _, connector) = two_rects_and_connector();
        // 20 units away: inside a 32px margin at zoom 1, outside at zoom 2.
        let p = Point::new(220.0, 250.0);
        assert!(find_bind_candidate(p, scene.get_all(), &[connector], 1.0, MARGIN).is_some());
        assert!(find_bind_candidate(p, scene.get_all(), &[connector], 2.0, MARGIN).is_none());
    }

    #[test]
    fn test_find_candidate_topmost_and_exclusion() {
        let mut scene = Scene::new();
        let bottom = scene.insert(Element::rectangle(0.0, 0.0, 100.0, 100.0));
        let top = scene.insert(Element::ellipse(20.0, 20.0, 100.0, 100.0));
        let p = Point::new(50.0, 50.0);
        assert_eq!(find_bind_candidate(p, scene.get_all(), &[], 1.0, MARGIN).map(|e| e.id()), Some(top));
        assert_eq!(
            find_bind_candidate(p, scene.get_all(), &[top], 1.0, MARGIN).map(|e| e.id()),
            Some(bottom)
        );
    }

    #[test]
    fn test_connectors_are_not_bindable() {
        let mut scene = Scene::new();
        let other = scene.insert(Element::connector(Point::ZERO, Point::new(100.0, 0.0)));
        let hit = find_bind_candidate(Point::new(50.0, 0.0), scene.get_all(), &[], 1.0, MARGIN);
        assert!(hit.is_none());
        assert!(scene.contains(other));
    }

    #[test]
    fn test_establish_computes_focus_and_gap() {
        let (mut scene, left, _, connector) = two_rects_and_connector();
        let binding = establish_binding(&mut scene, connector, Endpoint::Start, left).unwrap();
        assert!((binding.gap - 20.0).abs() < 1e-9);
        // Local point (120, 0) against half extents (100, 250).
        assert!((binding.focus - 12_000.0 / 72_500.0).abs() < 1e-12);
        let stored = scene.get(connector).unwrap().binding(Endpoint::Start).copied();
        assert_eq!(stored, Some(binding));
    }

    #[test]
    fn test_bound_point_reproduces_original_position() {
        let (scene, left, _, connector) = two_rects_and_connector();
        let shape = scene.get(left).unwrap();
        let c = scene.get(connector).unwrap();
        let start = c.endpoint_world(Endpoint::Start).unwrap();
        let end = c.endpoint_world(Endpoint::End).unwrap();
        let binding = binding_for(shape, start);
        assert_close(bound_point(shape, &binding, end), start, 1e-6);
    }

    #[test]
    fn test_moving_shape_drags_endpoint_and_keeps_focus() {
        let (mut scene, left, _, connector) = two_rects_and_connector();
        let binding = establish_binding(&mut scene, connector, Endpoint::Start, left).unwrap();
        scene.mutate(left, ElementPatch::new().position(-50.0, 30.0));
        assert_eq!(propagate_bound_movement(&mut scene, left), vec![connector]);

        let shape = scene.get(left).unwrap();
        let start = scene.get(connector).unwrap().endpoint_world(Endpoint::Start).unwrap();
        // Pure translation moves the endpoint by the same offset.
        assert_close(start, Point::new(170.0, 280.0), 1e-6);
        assert!((focus_for(shape, start) - binding.focus).abs() < 1e-9);
        assert!((shape.distance_to_outline(start) - binding.gap).abs() < 1e-6);
    }

    #[test]
    fn test_resizing_shape_keeps_focus_and_gap() {
        let (mut scene, left, _, connector) = two_rects_and_connector();
        let binding = establish_binding(&mut scene, connector, Endpoint::Start, left).unwrap();
        scene.mutate(left, ElementPatch::new().size(120.0, 300.0));
        propagate_bound_movement(&mut scene, left);

        let shape = scene.get(left).unwrap();
        let start = scene.get(connector).unwrap().endpoint_world(Endpoint::Start).unwrap();
        assert!((focus_for(shape, start) - binding.focus).abs() < 1e-9);
        assert!((shape.distance_to_outline(start) - binding.gap).abs() < 1e-6);
        // Still on the side facing the other end.
        assert!(start.x > 120.0);
    }

    #[test]
    fn test_rotating_ellipse_keeps_focus() {
        let mut scene = Scene::new();
        let shape = scene.insert(Element::ellipse(0.0, 0.0, 200.0, 100.0));
        let connector = scene.insert(Element::connector(
            Point::new(210.0, 40.0),
            Point::new(400.0, 40.0),
        ));
        let binding = establish_binding(&mut scene, connector, Endpoint::Start, shape).unwrap();
        scene.mutate(shape, ElementPatch::new().angle(FRAC_PI_2 / 3.0));
        propagate_bound_movement(&mut scene, shape);

        let shape = scene.get(shape).unwrap();
        let start = scene.get(connector).unwrap().endpoint_world(Endpoint::Start).unwrap();
        assert!((focus_for(shape, start) - binding.focus).abs() < 1e-9);
        assert!((shape.distance_to_outline(start) - binding.gap).abs() < 1e-4);
    }

    #[test]
    fn test_release_binding() {
        let (mut scene, left, _, connector) = two_rects_and_connector();
        establish_binding(&mut scene, connector, Endpoint::Start, left);
        assert!(release_binding(&mut scene, connector, Endpoint::Start));
        assert!(!release_binding(&mut scene, connector, Endpoint::Start));
        assert!(scene.get(connector).unwrap().binding(Endpoint::Start).is_none());
    }

    #[test]
    fn test_simple_connector_does_not_bind_both_ends_to_one_shape() {
        let mut scene = Scene::new();
        let rect = scene.insert(Element::rectangle(0.0, 0.0, 100.0, 100.0));
        let connector = scene.insert(Element::connector(Point::new(10.0, 10.0), Point::new(90.0, 90.0)));
        bind_or_unbind_connector(&mut scene, connector, 1.0, MARGIN, true);
        let c = scene.get(connector).unwrap();
        assert_eq!(c.binding(Endpoint::Start).map(|b| b.element_id), Some(rect));
        assert!(c.binding(Endpoint::End).is_none());
    }

    #[test]
    fn test_bind_or_unbind_follows_endpoint_position() {
        let (mut scene, left, right, connector) = two_rects_and_connector();
        bind_or_unbind_connector(&mut scene, connector, 1.0, MARGIN, true);
        let c = scene.get(connector).unwrap();
        assert_eq!(c.binding(Endpoint::Start).map(|b| b.element_id), Some(left));
        assert_eq!(c.binding(Endpoint::End).map(|b| b.element_id), Some(right));

        // Move the whole connector into empty space.
        scene.mutate(connector, ElementPatch::new().position(220.0, 700.0));
        bind_or_unbind_connector(&mut scene, connector, 1.0, MARGIN, true);
        let c = scene.get(connector).unwrap();
        assert!(c.binding(Endpoint::Start).is_none());
        assert!(c.binding(Endpoint::End).is_none());
    }

    #[test]
    fn test_rebinding_swapped_ends() {
        let (mut scene, left, right, connector) = two_rects_and_connector();
        bind_or_unbind_connector(&mut scene, connector, 1.0, MARGIN, true);
        scene.mutate(
            connector,
            ElementPatch::new()
                .position(380.0, 250.0)
                .points(vec![Point::ZERO, Point::new(-160.0, 0.0)]),
        );
        bind_or_unbind_connector(&mut scene, connector, 1.0, MARGIN, true);
        let c = scene.get(connector).unwrap();
        assert_eq!(c.binding(Endpoint::Start).map(|b| b.element_id), Some(right));
        assert_eq!(c.binding(Endpoint::End).map(|b| b.element_id), Some(left));
    }

    #[test]
    fn test_disabled_binding_releases() {
        let (mut scene, _, _, connector) = two_rects_and_connector();
        bind_or_unbind_connector(&mut scene, connector, 1.0, MARGIN, true);
        bind_or_unbind_connector(&mut scene, connector, 1.0, MARGIN, false);
        let c = scene.get(connector).unwrap();
        assert!(c.binding(Endpoint::Start).is_none());
        assert!(c.binding(Endpoint::End).is_none());
    }

    #[test]
    fn test_remap_on_duplication() {
        let (mut scene, left, right, connector) = two_rects_and_connector();
        bind_or_unbind_connector(&mut scene, connector, 1.0, MARGIN, true);

        let left_copy = scene.get(left).unwrap().duplicate();
        let connector_copy = scene.get(connector).unwrap().duplicate();
        let new_left = scene.insert(left_copy);
        let new_connector = scene.insert(connector_copy);
        let map: HashMap<ElementId, ElementId> =
            [(left, new_left), (connector, new_connector)].into_iter().collect();
        remap_bindings_on_duplication(&mut scene, &map);

        let copy = scene.get(new_connector).unwrap();
        assert_eq!(copy.binding(Endpoint::Start).map(|b| b.element_id), Some(new_left));
        // The right shape was not duplicated, so the copy shares it.
        assert_eq!(copy.binding(Endpoint::End).map(|b| b.element_id), Some(right));
        // The original connector is untouched.
        let original = scene.get(connector).unwrap();
        assert_eq!(original.binding(Endpoint::Start).map(|b| b.element_id), Some(left));
    }

    #[test]
    fn test_clear_on_deletion_keeps_geometry() {
        let (mut scene, left, right, connector) = two_rects_and_connector();
        bind_or_unbind_connector(&mut scene, connector, 1.0, MARGIN, true);
        let before = scene.get(connector).unwrap().world_points();

        scene.mutate(left, ElementPatch::new().deleted(true));
        assert_eq!(clear_bindings_on_deletion(&mut scene, &[left]), vec![connector]);

        let c = scene.get(connector).unwrap();
        assert_eq!(c.world_points(), before);
        assert!(c.binding(Endpoint::Start).is_none());
        assert_eq!(c.binding(Endpoint::End).map(|b| b.element_id), Some(right));
    }

    #[test]
    fn test_bound_connectors_is_derived() {
        let (mut scene, left, right, connector) = two_rects_and_connector();
        assert!(bound_connectors(scene.get_all(), left).is_empty());
        bind_or_unbind_connector(&mut scene, connector, 1.0, MARGIN, true);
        assert_eq!(bound_connectors(scene.get_all(), left), vec![connector]);
        assert_eq!(bound_connectors(scene.get_all(), right), vec![connector]);
    }

    #[test]
    fn test_missing_target_is_treated_as_unbound() {
        let (mut scene, _, _, connector) = two_rects_and_connector();
        assert!(establish_binding(&mut scene, connector, Endpoint::Start, ElementId::new_v4()).is_none());
        assert!(propagate_bound_movement(&mut scene, ElementId::new_v4()).is_empty());
    }
}
