//! End-to-end binding scenarios driven through pointer gestures.

use inkboard_core::selection::ROTATE_HANDLE_OFFSET;
use inkboard_core::{
    Editor, Element, ElementId, Endpoint, GestureMode, Modifiers, PointerEvent, Scene, ToolKind,
};
use kurbo::Point;

fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// Two tall rectangles with a connector drawn between them.
fn scenario() -> (Editor, ElementId, ElementId, ElementId) {
    init_logging();
    let left = Element::rectangle(0.0, 0.0, 200.0, 500.0);
    let right = Element::rectangle(400.0, 0.0, 200.0, 500.0);
    let (a, b) = (left.id(), right.id());
    let mut editor = Editor::with_scene(Scene::from_elements(vec![left, right]), Default::default());

    editor.set_tool(ToolKind::Connector);
    editor.pointer_down(PointerEvent::at(220.0, 250.0));
    editor.pointer_move(PointerEvent::at(380.0, 250.0));
    editor.pointer_up(PointerEvent::at(380.0, 250.0));
    let connector = editor.selected_ids()[0];
    (editor, a, b, connector)
}

fn bound_to(editor: &Editor, connector: ElementId, endpoint: Endpoint) -> Option<ElementId> {
    editor
        .scene()
        .get(connector)
        .and_then(|c| c.binding(endpoint))
        .map(|b| b.element_id)
}

#[test]
fn test_connector_binds_both_ends() {
    let (editor, a, b, connector) = scenario();
    assert_eq!(bound_to(&editor, connector, Endpoint::Start), Some(a));
    assert_eq!(bound_to(&editor, connector, Endpoint::End), Some(b));
    let binding = *editor
        .scene()
        .get(connector)
        .unwrap()
        .binding(Endpoint::Start)
        .unwrap();
    assert!((binding.gap - 20.0).abs() < 1e-9);
}

#[test]
fn test_rotating_half_turn_swaps_bindings() {
    let (mut editor, a, b, connector) = scenario();
    editor.set_selection(&[connector]);

    // Rotation handle sits above the connector's midpoint (300, 250).
    let handle = (300.0, 250.0 - ROTATE_HANDLE_OFFSET);
    editor.pointer_down(PointerEvent::at(handle.0, handle.1).with_time(10_000));
    assert_eq!(editor.mode(), GestureMode::Rotating);
    editor.pointer_move(PointerEvent::at(330.0, 250.0));
    editor.pointer_move(PointerEvent::at(300.0, 275.0));
    editor.pointer_up(PointerEvent::at(300.0, 275.0));

    let c = editor.scene().get(connector).unwrap();
    let start = c.endpoint_world(Endpoint::Start).unwrap();
    let end = c.endpoint_world(Endpoint::End).unwrap();
    assert!((start - Point::new(380.0, 250.0)).hypot() < 1e-6);
    assert!((end - Point::new(220.0, 250.0)).hypot() < 1e-6);
    assert_eq!(bound_to(&editor, connector, Endpoint::Start), Some(b));
    assert_eq!(bound_to(&editor, connector, Endpoint::End), Some(a));

    // One undo brings back the original orientation and bindings.
    assert!(editor.undo());
    assert_eq!(bound_to(&editor, connector, Endpoint::Start), Some(a));
    assert_eq!(bound_to(&editor, connector, Endpoint::End), Some(b));
}

#[test]
fn test_moving_bound_shape_keeps_focus() {
    let (mut editor, a, _, connector) = scenario();
    let focus = editor
        .scene()
        .get(connector)
        .unwrap()
        .binding(Endpoint::Start)
        .unwrap()
        .focus;

    editor.pointer_down(PointerEvent::at(100.0, 100.0).with_time(10_000));
    editor.pointer_move(PointerEvent::at(60.0, 180.0));
    editor.pointer_up(PointerEvent::at(60.0, 180.0));

    let c = editor.scene().get(connector).unwrap();
    let binding = c.binding(Endpoint::Start).unwrap();
    assert_eq!(binding.element_id, a);
    assert!((binding.focus - focus).abs() < 1e-12);
    let start = c.endpoint_world(Endpoint::Start).unwrap();
    let shape = editor.scene().get(a).unwrap();
    assert!((shape.distance_to_outline(start) - binding.gap).abs() < 1e-6);
}

#[test]
fn test_resizing_bound_shape_moves_endpoint() {
    let (mut editor, a, _, connector) = scenario();
    editor.set_selection(&[a]);
    // Right edge handle of the left rectangle.
    editor.pointer_down(PointerEvent::at(200.0, 250.0).with_time(10_000));
    assert!(matches!(editor.mode(), GestureMode::Resizing(_)));
    editor.pointer_move(PointerEvent::at(150.0, 250.0));
    editor.pointer_up(PointerEvent::at(150.0, 250.0));

    let c = editor.scene().get(connector).unwrap();
    let start = c.endpoint_world(Endpoint::Start).unwrap();
    assert!(start.x < 220.0);
    let shape = editor.scene().get(a).unwrap();
    let gap = c.binding(Endpoint::Start).unwrap().gap;
    assert!((shape.distance_to_outline(start) - gap).abs() < 1e-6);
}

#[test]
fn test_dragging_endpoint_out_and_back() {
    let (mut editor, a, _, connector) = scenario();
    assert!(editor.enter_connector_editing(connector));

    editor.pointer_down(PointerEvent::at(220.0, 250.0).with_time(10_000));
    editor.pointer_move(PointerEvent::at(220.0, 700.0));
    editor.pointer_up(PointerEvent::at(220.0, 700.0));
    assert_eq!(bound_to(&editor, connector, Endpoint::Start), None);

    editor.pointer_down(PointerEvent::at(220.0, 700.0).with_time(20_000));
    editor.pointer_move(PointerEvent::at(210.0, 300.0));
    editor.pointer_up(PointerEvent::at(210.0, 300.0));
    assert_eq!(bound_to(&editor, connector, Endpoint::Start), Some(a));
}

#[test]
fn test_ctrl_drag_of_endpoint_releases_binding() {
    let (mut editor, _, _, connector) = scenario();
    assert!(editor.enter_connector_editing(connector));
    let ctrl = Modifiers::ctrl();
    editor.pointer_down(PointerEvent::at(380.0, 250.0).with_modifiers(ctrl).with_time(10_000));
    editor.pointer_move(PointerEvent::at(385.0, 240.0).with_modifiers(ctrl));
    editor.pointer_move(PointerEvent::at(390.0, 230.0).with_modifiers(ctrl));
    assert!(editor.state.suggested_bindings.is_empty());
    editor.pointer_up(PointerEvent::at(390.0, 230.0).with_modifiers(ctrl));
    assert_eq!(bound_to(&editor, connector, Endpoint::End), None);
}

#[test]
fn test_duplicate_all_binds_copy_to_copies() {
    let (mut editor, a, b, connector) = scenario();
    editor.select_all();
    editor.duplicate_selected();

    let copies = editor.selected_ids().to_vec();
    let copy = copies
        .iter()
        .filter_map(|id| editor.scene().get(*id))
        .find(|e| e.is_connector())
        .unwrap()
        .id();
    let start = bound_to(&editor, copy, Endpoint::Start).unwrap();
    let end = bound_to(&editor, copy, Endpoint::End).unwrap();
    assert!(copies.contains(&start) && copies.contains(&end));
    assert_ne!(start, a);
    assert_ne!(end, b);
    assert_eq!(bound_to(&editor, connector, Endpoint::Start), Some(a));
}

#[test]
fn test_deleting_bound_shape_keeps_geometry() {
    let (mut editor, _, b, connector) = scenario();
    let before = editor.scene().get(connector).unwrap().world_points();
    editor.set_selection(&[b]);
    editor.delete_selected();

    let c = editor.scene().get(connector).unwrap();
    assert_eq!(c.world_points(), before);
    assert!(c.binding(Endpoint::End).is_none());
    assert!(c.binding(Endpoint::Start).is_some());
}
