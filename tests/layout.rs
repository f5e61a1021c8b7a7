use dumpity_rs::error::LayoutError;
use dumpity_rs::layout::{
    CollisionPolicy, Degradation, LayoutEngine, LayoutOptions, RecordState, Resolved,
};
use dumpity_rs::types::classify::ExclusionReason;
use dumpity_rs::types::members::FieldRef;
use dumpity_rs::types::primitive::PrimitiveKind;
use dumpity_rs::types::{Metadata, TypeDef, TypeRef};

fn int() -> TypeRef {
    TypeRef::primitive(PrimitiveKind::Int32)
}

fn float() -> TypeRef {
    TypeRef::primitive(PrimitiveKind::Float)
}

fn record_text(engine: &LayoutEngine, resolved: Resolved) -> String {
    match resolved {
        Resolved::Record(id) => engine.record(id).text().unwrap().to_string(),
        other => panic!("expected a record, got {:?}", other),
    }
}

#[test]
fn test_class_with_leading_padding() {
    let player = TypeRef::class(Some("Game"), "Player");
    let metadata: Metadata = [TypeDef::new(player.clone())
        .with_field(FieldRef::new(&player, "X", int()).at("16"))]
    .into_iter()
    .collect();

    let mut engine = LayoutEngine::default();
    let resolved = engine.resolve_struct(&metadata, &player).unwrap();
    assert_eq!(
        record_text(&engine, resolved),
        "struct Player;\n\
         typedef struct __attribute__((__packed__)) {\n\
         \tchar _unused_data_useless[16];\n\
         \tint X;\n\
         } Player;\n"
    );
}

#[test]
fn test_hex_offset_and_zero_padding() {
    let a = TypeRef::class(Some("Game"), "A");
    let b = TypeRef::class(Some("Game"), "B");
    let metadata: Metadata = [
        TypeDef::new(a.clone()).with_field(FieldRef::new(&a, "x", int()).at("0x10")),
        TypeDef::new(b.clone()).with_field(FieldRef::new(&b, "y", int()).at("0")),
    ]
    .into_iter()
    .collect();

    let mut engine = LayoutEngine::default();
    let ra = engine.resolve_struct(&metadata, &a).unwrap();
    let rb = engine.resolve_struct(&metadata, &b).unwrap();
    assert!(record_text(&engine, ra).contains("char _unused_data_useless[16];"));
    assert!(!record_text(&engine, rb).contains("_unused_data_useless"));
}

#[test]
fn test_cycle_degrades_to_opaque_pointer() {
    let a = TypeRef::class(Some("Game"), "A");
    let b = TypeRef::class(Some("Game"), "B");
    let metadata: Metadata = [
        TypeDef::new(a.clone()).with_field(FieldRef::new(&a, "b", b.clone()).at("0x10")),
        TypeDef::new(b.clone()).with_field(FieldRef::new(&b, "a", a.clone()).at("0x10")),
    ]
    .into_iter()
    .collect();

    let mut engine = LayoutEngine::default();
    let resolved = engine.resolve_struct(&metadata, &a).unwrap();

    assert!(record_text(&engine, resolved).contains("\tB* b;\n"));
    let names: Vec<&str> = engine.written().map(|r| r.name.as_str()).collect();
    assert_eq!(names, ["B", "A"]);
    let b_text = engine.written().next().unwrap().text().unwrap();
    assert!(b_text.contains("\tvoid* a;\n"));
    assert!(engine.stats().degraded >= 1);
}

#[test]
fn test_self_reference_terminates() {
    let node = TypeRef::class(Some("Game"), "Node");
    let metadata: Metadata = [TypeDef::new(node.clone())
        .with_field(FieldRef::new(&node, "value", int()).at("0x10"))
        .with_field(FieldRef::new(&node, "next", node.clone()))]
    .into_iter()
    .collect();

    let mut engine = LayoutEngine::default();
    let resolved = engine.resolve_struct(&metadata, &node).unwrap();
    assert!(record_text(&engine, resolved).contains("\tvoid* next;\n"));
}

#[test]
fn test_field_filtering_preserves_order() {
    let t = TypeRef::class(Some("Game"), "Stats");
    let def = TypeDef::new(t.clone())
        .with_field(FieldRef::new(&t, "Count", int()).static_member())
        .with_field(FieldRef::new(&t, "hp", int()).at("0x18"))
        .with_field(FieldRef::new(&t, "Max", int()).constant())
        .with_field(FieldRef::new(&t, "<Speed>k__BackingField", float()))
        .with_field(FieldRef::new(&t, "internal", int()).special())
        .with_field(FieldRef::new(&t, "speed", float()))
        .with_field(FieldRef::new(&t, "armor", int()));
    let metadata: Metadata = [def].into_iter().collect();

    let mut engine = LayoutEngine::default();
    let Resolved::Record(id) = engine.resolve_struct(&metadata, &t).unwrap() else {
        panic!("expected a record");
    };
    let names: Vec<&str> = engine.record(id).fields.iter().map(|f| f.name.as_str()).collect();
    assert_eq!(names, ["hp", "speed", "armor"]);
    assert!(engine
        .record(id)
        .text()
        .unwrap()
        .contains("\tint hp;\n\tfloat speed;\n\tint armor;\n"));
}

#[test]
fn test_resolution_is_idempotent() {
    let vec3 = TypeRef::value(Some("Game"), "Vector3");
    let holder = TypeRef::class(Some("Game"), "Holder");
    let metadata: Metadata = [
        TypeDef::new(vec3.clone())
            .with_field(FieldRef::new(&vec3, "x", float()))
            .with_field(FieldRef::new(&vec3, "y", float()))
            .with_field(FieldRef::new(&vec3, "z", float())),
        TypeDef::new(holder.clone())
            .with_field(FieldRef::new(&holder, "position", vec3.clone()).at("0x10"))
            .with_field(FieldRef::new(&holder, "velocity", vec3.clone())),
    ]
    .into_iter()
    .collect();

    let mut engine = LayoutEngine::default();
    let first = engine.resolve_struct(&metadata, &holder).unwrap();
    let second = engine.resolve_struct(&metadata, &holder).unwrap();
    assert_eq!(first, second);

    let defs = engine.definitions();
    assert_eq!(defs.matches("} Vector3;").count(), 1);
    assert_eq!(defs.matches("} Holder;").count(), 1);
    assert!(defs.contains("\tVector3 position;\n\tVector3 velocity;\n"));
    // structs carry no leading padding and no forward declaration
    assert!(!defs.contains("struct Vector3;"));
    assert_eq!(engine.stats().written, 2);
}

#[test]
fn test_missing_offset_is_fatal() {
    let t = TypeRef::class(Some("Game"), "Player");
    let metadata: Metadata = [TypeDef::new(t.clone()).with_field(FieldRef::new(&t, "X", int()))]
        .into_iter()
        .collect();

    let mut engine = LayoutEngine::default();
    assert_eq!(
        engine.resolve_struct(&metadata, &t),
        Err(LayoutError::MissingOffsetAnnotation {
            type_name: "Game.Player".into(),
            field: "X".into(),
        })
    );
}

#[test]
fn test_unparseable_offset_is_fatal() {
    let t = TypeRef::class(Some("Game"), "Player");
    let metadata: Metadata = [TypeDef::new(t.clone()).with_field(FieldRef::new(&t, "X", int()).at("sixteen"))]
        .into_iter()
        .collect();

    let mut engine = LayoutEngine::default();
    assert!(matches!(
        engine.resolve_struct(&metadata, &t),
        Err(LayoutError::InvalidOffset { .. })
    ));
}

#[test]
fn test_empty_struct_is_discarded() {
    let empty = TypeRef::class(Some("Game"), "Empty");
    let holder = TypeRef::class(Some("Game"), "Holder");
    let metadata: Metadata = [
        TypeDef::new(empty.clone()).with_field(FieldRef::new(&empty, "Instance", int()).static_member()),
        TypeDef::new(holder.clone())
            .with_field(FieldRef::new(&holder, "e", empty.clone()).at("0x10")),
    ]
    .into_iter()
    .collect();

    let mut engine = LayoutEngine::default();
    let resolved = engine.resolve_struct(&metadata, &holder).unwrap();
    assert!(record_text(&engine, resolved).contains("\tvoid* e;\n"));
    assert_eq!(
        engine.resolve_struct(&metadata, &empty).unwrap(),
        Resolved::Degraded(Degradation::Empty)
    );
    let discarded = engine.records().iter().find(|r| r.name == "Empty").unwrap();
    assert_eq!(discarded.state, RecordState::Discarded);
    assert!(!engine.definitions().contains("Empty"));
    assert_eq!(engine.stats().discarded, 1);
}

#[test]
fn test_enum_members_are_prefixed() {
    let color = TypeRef::enumeration(Some("Game"), "Color");
    let holder = TypeRef::class(Some("Game"), "Holder");
    let metadata: Metadata = [
        TypeDef::new(color.clone())
            .with_field(FieldRef::new(&color, "value__", int()).special())
            .with_field(FieldRef::new(&color, "Red", color.clone()).constant())
            .with_field(FieldRef::new(&color, "Blue", color.clone()).constant()),
        TypeDef::new(holder.clone())
            .with_field(FieldRef::new(&holder, "tint", color.clone()).at("0x10")),
    ]
    .into_iter()
    .collect();

    let mut engine = LayoutEngine::default();
    engine.resolve_struct(&metadata, &holder).unwrap();
    let defs = engine.definitions();
    assert!(defs.contains("typedef enum {\n\tColor_Red,\n\tColor_Blue\n} Color;\n"));
    assert!(defs.contains("\tColor tint;\n"));
}

#[test]
fn test_platform_array_and_generic_fields_are_opaque() {
    let holder = TypeRef::class(Some("Game"), "Holder");
    let metadata: Metadata = [TypeDef::new(holder.clone())
        .with_field(FieldRef::new(&holder, "name", TypeRef::primitive(PrimitiveKind::String)).at("0x10"))
        .with_field(FieldRef::new(&holder, "tag", TypeRef::class(Some("System"), "Object")))
        .with_field(FieldRef::new(&holder, "scores", TypeRef::array_of(&int())))
        .with_field(FieldRef::new(
            &holder,
            "items",
            TypeRef::class(Some("Game"), "List`1").generic(),
        ))]
    .into_iter()
    .collect();

    let mut engine = LayoutEngine::default();
    let resolved = engine.resolve_struct(&metadata, &holder).unwrap();
    assert!(record_text(&engine, resolved).contains(
        "\tIl2CppString* name;\n\tvoid* tag;\n\tvoid* scores;\n\tvoid* items;\n"
    ));

    let generic = TypeRef::class(Some("Game"), "List`1").generic();
    assert_eq!(
        engine.resolve_struct(&metadata, &generic).unwrap(),
        Resolved::Degraded(Degradation::Excluded(ExclusionReason::Generic))
    );
}

#[test]
fn test_unresolved_reference_is_opaque() {
    let holder = TypeRef::class(Some("Game"), "Holder");
    let metadata: Metadata = [TypeDef::new(holder.clone())
        .with_field(FieldRef::new(&holder, "other", TypeRef::class(Some("Game"), "Missing")).at("0x10"))]
    .into_iter()
    .collect();

    let mut engine = LayoutEngine::default();
    let resolved = engine.resolve_struct(&metadata, &holder).unwrap();
    assert!(record_text(&engine, resolved).contains("\tvoid* other;\n"));
}

fn colliding_metadata() -> (Metadata, TypeRef) {
    let a = TypeRef::class(Some("Alpha"), "Item");
    let b = TypeRef::class(Some("Beta"), "Item");
    let holder = TypeRef::class(Some("Game"), "Holder");
    let metadata: Metadata = [
        TypeDef::new(a.clone()).with_field(FieldRef::new(&a, "id", int()).at("0x10")),
        TypeDef::new(b.clone()).with_field(FieldRef::new(&b, "weight", float()).at("0x10")),
        TypeDef::new(holder.clone())
            .with_field(FieldRef::new(&holder, "first", a).at("0x10"))
            .with_field(FieldRef::new(&holder, "second", b)),
    ]
    .into_iter()
    .collect();
    (metadata, holder)
}

#[test]
fn test_name_collision_reuses_by_default() {
    let (metadata, holder) = colliding_metadata();
    let mut engine = LayoutEngine::default();
    engine.resolve_struct(&metadata, &holder).unwrap();

    let defs = engine.definitions();
    assert!(defs.contains("\tItem* first;\n\tItem* second;\n"));
    assert_eq!(defs.matches("} Item;").count(), 1);
    assert!(!defs.contains("weight"));
}

#[test]
fn test_name_collision_strict_keeps_types_apart() {
    let (metadata, holder) = colliding_metadata();
    let mut engine = LayoutEngine::new(LayoutOptions {
        collision: CollisionPolicy::Strict,
        ..LayoutOptions::default()
    });
    engine.resolve_struct(&metadata, &holder).unwrap();

    let defs = engine.definitions();
    assert!(defs.contains("\tItem* first;\n\tItem_1* second;\n"));
    assert!(defs.contains("} Item_1;"));
    assert!(defs.contains("\tfloat weight;\n"));
}

#[test]
fn test_strict_suffix_never_reuses_a_literal_name() {
    let a = TypeRef::class(Some("Alpha"), "Item");
    let b = TypeRef::class(Some("Beta"), "Item");
    let c = TypeRef::class(Some("Game"), "Item_1");
    let holder = TypeRef::class(Some("Game"), "Holder");
    let metadata: Metadata = [
        TypeDef::new(a.clone()).with_field(FieldRef::new(&a, "id", int()).at("0x10")),
        TypeDef::new(b.clone()).with_field(FieldRef::new(&b, "weight", float()).at("0x10")),
        TypeDef::new(c.clone()).with_field(FieldRef::new(&c, "count", int()).at("0x10")),
        TypeDef::new(holder.clone())
            .with_field(FieldRef::new(&holder, "first", a).at("0x10"))
            .with_field(FieldRef::new(&holder, "second", b))
            .with_field(FieldRef::new(&holder, "third", c)),
    ]
    .into_iter()
    .collect();

    let mut engine = LayoutEngine::new(LayoutOptions {
        collision: CollisionPolicy::Strict,
        ..LayoutOptions::default()
    });
    engine.resolve_struct(&metadata, &holder).unwrap();

    let names: Vec<&str> = engine.written().map(|r| r.name.as_str()).collect();
    assert_eq!(names, ["Item", "Item_1", "Item_1_1", "Holder"]);
    let defs = engine.definitions();
    assert_eq!(defs.matches("} Item_1;").count(), 1);
    assert!(defs.contains("\tItem* first;\n\tItem_1* second;\n\tItem_1_1* third;\n"));
}
